use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use validator::Validate;

use crate::{
    error::Result,
    middleware::AuthUser,
    state::AppState,
    user::{
        user_dto::{CreateUserRequest, UpdateUserRequest},
        user_models::User,
    },
};

/// Create the account of the authenticated identity
#[utoipa::path(
    post,
    path = "/api/users",
    tag = "users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreateUserRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;

    let user = state.user_service.create_user(&user_id, payload).await?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// Get current user profile
#[utoipa::path(
    get,
    path = "/api/users/me",
    tag = "users",
    responses(
        (status = 200, description = "User profile retrieved successfully", body = User),
        (status = 404, description = "User not found"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_current_user(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<User>> {
    Ok(Json(state.user_service.get_current_user(&user_id).await?))
}

/// Update current user profile
#[utoipa::path(
    put,
    path = "/api/users/me",
    tag = "users",
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Profile updated successfully", body = User),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_current_user(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<User>> {
    payload.validate()?;

    let user = state
        .user_service
        .update_current_user(&user_id, payload)
        .await?;

    Ok(Json(user))
}

/// Delete the current user and everything they own
#[utoipa::path(
    delete,
    path = "/api/users/me",
    tag = "users",
    responses(
        (status = 204, description = "User deleted"),
        (status = 404, description = "User not found"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_current_user(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<StatusCode> {
    state.user_service.delete_current_user(&user_id).await?;

    Ok(StatusCode::NO_CONTENT)
}
