use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use validator::Validate;

use crate::{
    error::{AppError, Result},
    middleware::AuthUser,
    state::AppState,
};

use super::{push_token_dto::RegisterPushTokenRequest, push_token_models::PushToken};

/// Register the device push token of the authenticated user
#[utoipa::path(
    post,
    path = "/api/push-tokens",
    request_body = RegisterPushTokenRequest,
    responses(
        (status = 201, description = "Token registered", body = PushToken),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Unauthorized")
    ),
    tag = "push-tokens",
    security(("bearer_auth" = []))
)]
pub async fn register_push_token(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<RegisterPushTokenRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;

    let push_token = state
        .push_token_repository
        .register(&user_id, payload.token.trim())
        .await?;

    Ok((StatusCode::CREATED, Json(push_token)))
}

/// Remove a device push token
#[utoipa::path(
    delete,
    path = "/api/push-tokens/{token}",
    params(("token" = String, Path, description = "Device push token")),
    responses(
        (status = 204, description = "Token removed"),
        (status = 404, description = "Token not found"),
        (status = 401, description = "Unauthorized")
    ),
    tag = "push-tokens",
    security(("bearer_auth" = []))
)]
pub async fn delete_push_token(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(token): Path<String>,
) -> Result<StatusCode> {
    let rows_affected = state.push_token_repository.delete(&user_id, &token).await?;

    if rows_affected == 0 {
        return Err(AppError::NotFound("Push token not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
