use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::{AppError, Result},
    middleware::AuthUser,
    state::AppState,
};

use super::{
    plant_dto::{
        AnyOverdueResponse, AnyPlantResponse, CreatePlantRequest, ImageUrlResponse, SearchQuery,
        UpdatePlantRequest, WaterPlantRequest, WateredResponse, WateringDayQuery,
    },
    plant_models::Plant,
};

/// List all plants of the authenticated user
#[utoipa::path(
    get,
    path = "/api/plants",
    responses(
        (status = 200, description = "List of plants", body = Vec<Plant>),
        (status = 401, description = "Unauthorized")
    ),
    tag = "plants",
    security(("bearer_auth" = []))
)]
pub async fn list_plants(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<Plant>>> {
    Ok(Json(state.plant_service.list_plants(&user_id).await?))
}

/// Ids of all plants of the authenticated user
#[utoipa::path(
    get,
    path = "/api/plants/ids",
    responses(
        (status = 200, description = "Plant ids", body = Vec<Uuid>),
        (status = 401, description = "Unauthorized")
    ),
    tag = "plants",
    security(("bearer_auth" = []))
)]
pub async fn list_plant_ids(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<Uuid>>> {
    Ok(Json(state.plant_service.list_plant_ids(&user_id).await?))
}

/// Whether the authenticated user has any plant
#[utoipa::path(
    get,
    path = "/api/plants/any",
    responses(
        (status = 200, description = "Plant presence flag", body = AnyPlantResponse),
        (status = 401, description = "Unauthorized")
    ),
    tag = "plants",
    security(("bearer_auth" = []))
)]
pub async fn any_plant(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<AnyPlantResponse>> {
    let any = state.plant_service.has_plants(&user_id).await?;
    Ok(Json(AnyPlantResponse { any }))
}

/// Get a single plant
#[utoipa::path(
    get,
    path = "/api/plants/{id}",
    params(("id" = Uuid, Path, description = "Plant ID")),
    responses(
        (status = 200, description = "Plant", body = Plant),
        (status = 404, description = "Plant not found"),
        (status = 401, description = "Unauthorized")
    ),
    tag = "plants",
    security(("bearer_auth" = []))
)]
pub async fn get_plant(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(plant_id): Path<Uuid>,
) -> Result<Json<Plant>> {
    Ok(Json(state.plant_service.get_plant(&user_id, plant_id).await?))
}

/// Search plants by name prefix
#[utoipa::path(
    get,
    path = "/api/plants/search",
    params(SearchQuery),
    responses(
        (status = 200, description = "Matching plants", body = Vec<Plant>),
        (status = 401, description = "Unauthorized")
    ),
    tag = "plants",
    security(("bearer_auth" = []))
)]
pub async fn search_plants(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Plant>>> {
    Ok(Json(state.plant_service.search_plants(&user_id, &query.q).await?))
}

/// Plants due for watering on a given day
#[utoipa::path(
    get,
    path = "/api/plants/by-date",
    params(WateringDayQuery),
    responses(
        (status = 200, description = "Plants due that day", body = Vec<Plant>),
        (status = 401, description = "Unauthorized")
    ),
    tag = "plants",
    security(("bearer_auth" = []))
)]
pub async fn plants_by_date(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(query): Query<WateringDayQuery>,
) -> Result<Json<Vec<Plant>>> {
    Ok(Json(state.plant_service.plants_for_day(&user_id, query.date).await?))
}

/// Plants whose watering is overdue
#[utoipa::path(
    get,
    path = "/api/plants/overdue",
    responses(
        (status = 200, description = "Overdue plants", body = Vec<Plant>),
        (status = 401, description = "Unauthorized")
    ),
    tag = "plants",
    security(("bearer_auth" = []))
)]
pub async fn overdue_plants(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<Plant>>> {
    Ok(Json(state.plant_service.overdue_plants(&user_id).await?))
}

/// Whether any plant is overdue
#[utoipa::path(
    get,
    path = "/api/plants/overdue/any",
    responses(
        (status = 200, description = "Overdue flag", body = AnyOverdueResponse),
        (status = 401, description = "Unauthorized")
    ),
    tag = "plants",
    security(("bearer_auth" = []))
)]
pub async fn any_overdue(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<AnyOverdueResponse>> {
    let any = state.plant_service.has_overdue_plants(&user_id).await?;
    Ok(Json(AnyOverdueResponse { any }))
}

/// Next watering date of every plant, for the calendar view
#[utoipa::path(
    get,
    path = "/api/plants/watering-days",
    responses(
        (status = 200, description = "Upcoming watering instants", body = Vec<DateTime<Utc>>),
        (status = 401, description = "Unauthorized")
    ),
    tag = "plants",
    security(("bearer_auth" = []))
)]
pub async fn watering_days(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<DateTime<Utc>>>> {
    Ok(Json(state.plant_service.watering_days(&user_id).await?))
}

/// Public URL of the plant image
#[utoipa::path(
    get,
    path = "/api/plants/{id}/image",
    params(("id" = Uuid, Path, description = "Plant ID")),
    responses(
        (status = 200, description = "Image URL, null when absent", body = ImageUrlResponse),
        (status = 401, description = "Unauthorized")
    ),
    tag = "plants",
    security(("bearer_auth" = []))
)]
pub async fn plant_image(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(plant_id): Path<Uuid>,
) -> Result<Json<ImageUrlResponse>> {
    let url = state.plant_service.image_url(&user_id, plant_id).await?;
    Ok(Json(ImageUrlResponse { url }))
}

/// Whether the plant's next watering is still ahead
#[utoipa::path(
    get,
    path = "/api/plants/{id}/watered",
    params(("id" = Uuid, Path, description = "Plant ID")),
    responses(
        (status = 200, description = "Watered flag", body = WateredResponse),
        (status = 401, description = "Unauthorized")
    ),
    tag = "plants",
    security(("bearer_auth" = []))
)]
pub async fn plant_watered(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(plant_id): Path<Uuid>,
) -> Result<Json<WateredResponse>> {
    let watered = state.plant_service.is_watered(&user_id, plant_id).await?;
    Ok(Json(WateredResponse { watered }))
}

/// Create a plant
#[utoipa::path(
    post,
    path = "/api/plants",
    request_body = CreatePlantRequest,
    responses(
        (status = 201, description = "Plant created", body = Plant),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Unauthorized"),
        (status = 502, description = "Image upload failed")
    ),
    tag = "plants",
    security(("bearer_auth" = []))
)]
pub async fn create_plant(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreatePlantRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;

    let plant = state.plant_service.create_plant(&user_id, payload).await?;

    Ok((StatusCode::CREATED, Json(plant)))
}

/// Update a plant
#[utoipa::path(
    put,
    path = "/api/plants/{id}",
    params(("id" = Uuid, Path, description = "Plant ID")),
    request_body = UpdatePlantRequest,
    responses(
        (status = 200, description = "Plant updated", body = Plant),
        (status = 400, description = "Validation error"),
        (status = 404, description = "Plant not found"),
        (status = 401, description = "Unauthorized")
    ),
    tag = "plants",
    security(("bearer_auth" = []))
)]
pub async fn update_plant(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(plant_id): Path<Uuid>,
    Json(payload): Json<UpdatePlantRequest>,
) -> Result<Json<Plant>> {
    payload.validate()?;

    let plant = state
        .plant_service
        .update_plant(&user_id, plant_id, payload)
        .await?;

    Ok(Json(plant))
}

/// Record a watering and move the next watering date forward
#[utoipa::path(
    post,
    path = "/api/plants/{id}/water",
    params(("id" = Uuid, Path, description = "Plant ID")),
    request_body = WaterPlantRequest,
    responses(
        (status = 200, description = "Plant watered", body = Plant),
        (status = 404, description = "Plant not found"),
        (status = 401, description = "Unauthorized")
    ),
    tag = "plants",
    security(("bearer_auth" = []))
)]
pub async fn water_plant(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(plant_id): Path<Uuid>,
    payload: Option<Json<WaterPlantRequest>>,
) -> Result<Json<Plant>> {
    let Json(payload) = payload.unwrap_or_default();

    let plant = state
        .plant_service
        .water_plant(&user_id, plant_id, payload.last_watering)
        .await?;

    Ok(Json(plant))
}

/// Delete a plant
#[utoipa::path(
    delete,
    path = "/api/plants/{id}",
    params(("id" = Uuid, Path, description = "Plant ID")),
    responses(
        (status = 204, description = "Plant deleted"),
        (status = 404, description = "Plant not found"),
        (status = 401, description = "Unauthorized")
    ),
    tag = "plants",
    security(("bearer_auth" = []))
)]
pub async fn delete_plant(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(plant_id): Path<Uuid>,
) -> Result<StatusCode> {
    let rows_affected = state.plant_service.delete_plant(&user_id, plant_id).await?;

    if rows_affected == 0 {
        return Err(AppError::NotFound("Plant not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
