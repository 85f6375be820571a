use crate::{
    dispatch::{
        dispatch_handlers::{self, DispatchResponse},
        dispatch_job::DispatchReport,
    },
    middleware::auth_middleware,
    notification::{
        notification_handlers,
        notification_models::{Notification, NotificationWithPlants},
    },
    plant::{
        plant_dto::{
            AnyOverdueResponse, AnyPlantResponse, CreatePlantRequest, ImageUpload, ImageUrlResponse,
            UpdatePlantRequest, WaterPlantRequest, WateredResponse,
        },
        plant_handlers,
        plant_models::{Plant, WateringInterval},
    },
    push_token::{
        push_token_dto::RegisterPushTokenRequest, push_token_handlers,
        push_token_models::PushToken,
    },
    state::AppState,
    user::{
        user_dto::{CreateUserRequest, UpdateUserRequest},
        user_handlers,
        user_models::User,
    },
};
use axum::{
    middleware,
    routing::{delete, get, patch, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        plant_handlers::list_plants,
        plant_handlers::list_plant_ids,
        plant_handlers::any_plant,
        plant_handlers::get_plant,
        plant_handlers::search_plants,
        plant_handlers::plants_by_date,
        plant_handlers::overdue_plants,
        plant_handlers::any_overdue,
        plant_handlers::watering_days,
        plant_handlers::plant_image,
        plant_handlers::plant_watered,
        plant_handlers::create_plant,
        plant_handlers::update_plant,
        plant_handlers::water_plant,
        plant_handlers::delete_plant,
        user_handlers::create_user,
        user_handlers::get_current_user,
        user_handlers::update_current_user,
        user_handlers::delete_current_user,
        notification_handlers::get_notifications,
        notification_handlers::notification_stream,
        notification_handlers::mark_notification_read,
        notification_handlers::check_read_receipt,
        push_token_handlers::register_push_token,
        push_token_handlers::delete_push_token,
        dispatch_handlers::trigger_dispatch,
    ),
    components(
        schemas(
            Plant,
            WateringInterval,
            CreatePlantRequest,
            UpdatePlantRequest,
            WaterPlantRequest,
            ImageUpload,
            ImageUrlResponse,
            WateredResponse,
            AnyOverdueResponse,
            AnyPlantResponse,
            User,
            CreateUserRequest,
            UpdateUserRequest,
            Notification,
            NotificationWithPlants,
            PushToken,
            RegisterPushTokenRequest,
            DispatchReport,
            DispatchResponse,
        )
    ),
    tags(
        (name = "plants", description = "Plant management endpoints"),
        (name = "users", description = "User profile endpoints"),
        (name = "notifications", description = "Notification endpoints"),
        (name = "push-tokens", description = "Device push token endpoints"),
        (name = "dispatch", description = "Watering reminder dispatch")
    ),
    modifiers(&SecurityAddon)
)]
struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::Http::new(
                        utoipa::openapi::security::HttpAuthScheme::Bearer,
                    ),
                ),
            )
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Static segments are registered before `/:id`.
    let plant_routes = Router::new()
        .route(
            "/",
            get(plant_handlers::list_plants).post(plant_handlers::create_plant),
        )
        .route("/ids", get(plant_handlers::list_plant_ids))
        .route("/any", get(plant_handlers::any_plant))
        .route("/search", get(plant_handlers::search_plants))
        .route("/by-date", get(plant_handlers::plants_by_date))
        .route("/overdue", get(plant_handlers::overdue_plants))
        .route("/overdue/any", get(plant_handlers::any_overdue))
        .route("/watering-days", get(plant_handlers::watering_days))
        .route(
            "/:id",
            get(plant_handlers::get_plant)
                .put(plant_handlers::update_plant)
                .delete(plant_handlers::delete_plant),
        )
        .route("/:id/image", get(plant_handlers::plant_image))
        .route("/:id/watered", get(plant_handlers::plant_watered))
        .route("/:id/water", post(plant_handlers::water_plant))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let user_routes = Router::new()
        .route("/", post(user_handlers::create_user))
        .route(
            "/me",
            get(user_handlers::get_current_user)
                .put(user_handlers::update_current_user)
                .delete(user_handlers::delete_current_user),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let notification_routes = Router::new()
        .route("/", get(notification_handlers::get_notifications))
        .route("/stream", get(notification_handlers::notification_stream))
        .route("/:id/read", patch(notification_handlers::mark_notification_read))
        .route(
            "/:id/read-receipt",
            post(notification_handlers::check_read_receipt),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let push_token_routes = Router::new()
        .route("/", post(push_token_handlers::register_push_token))
        .route("/:token", delete(push_token_handlers::delete_push_token))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // Authenticated by the shared trigger secret instead of a user token.
    let dispatch_routes =
        Router::new().route("/run", post(dispatch_handlers::trigger_dispatch));

    let api_routes = Router::new()
        .nest("/plants", plant_routes)
        .nest("/users", user_routes)
        .nest("/notifications", notification_routes)
        .nest("/push-tokens", push_token_routes)
        .nest("/dispatch", dispatch_routes);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::jwt::create_test_token,
        dispatch::{DispatchJob, DispatchSettings, PgDispatchStore},
        notification::{NotificationRepository, NotificationService},
        plant::{PlantRepository, PlantService},
        push::ExpoClient,
        push_token::PushTokenRepository,
        state::Config,
        storage::ObjectStore,
        user::{UserRepository, UserService},
    };
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
    };
    use serde_json::Value;
    use sqlx::postgres::PgPoolOptions;
    use std::{sync::Arc, time::Duration};
    use tokio::sync::broadcast;
    use tower::ServiceExt;

    const SECRET: &str = "test-jwt-secret";

    fn test_config(trigger_secret: Option<&str>) -> Config {
        Config {
            host: "127.0.0.1".into(),
            port: 0,
            database_url: "postgres://localhost/plant_reminder_test".into(),
            database_max_connections: 1,
            jwt_secret: SECRET.into(),
            jwt_issuer: None,
            expo_api_url: "http://127.0.0.1:9".into(),
            expo_access_token: None,
            object_store_url: "http://127.0.0.1:9".into(),
            object_store_public_url: "http://127.0.0.1:9".into(),
            object_store_api_key: None,
            watering_timezone: chrono_tz::Europe::Paris,
            dispatch_cron: "0 0 * * * *".into(),
            dispatch_concurrency: 1,
            dispatch_deadline: Duration::from_secs(5),
            dispatch_send_reserve: Duration::from_secs(1),
            dispatch_trigger_secret: trigger_secret.map(str::to_string),
        }
    }

    /// State over a pool that never connects; routes under test must not reach the database.
    fn test_state(trigger_secret: Option<&str>) -> AppState {
        let config = test_config(trigger_secret);
        let db = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_millis(200))
            .connect_lazy(&config.database_url)
            .unwrap();
        let (notification_tx, _) = broadcast::channel(16);

        let plant_repository = PlantRepository::new(db.clone());
        let notification_repository = NotificationRepository::new(db.clone());
        let push_token_repository = PushTokenRepository::new(db.clone());
        let object_store = ObjectStore::new(&config.object_store_url, &config.object_store_public_url, None);

        let dispatch_job = DispatchJob::new(
            PgDispatchStore::new(
                push_token_repository.clone(),
                plant_repository.clone(),
                notification_repository.clone(),
                notification_tx.clone(),
            ),
            ExpoClient::new(&config.expo_api_url, None),
            DispatchSettings {
                concurrency: config.dispatch_concurrency,
                deadline: config.dispatch_deadline,
                send_reserve: config.dispatch_send_reserve,
            },
        );

        AppState {
            db: db.clone(),
            notification_tx,
            plant_service: PlantService::new(plant_repository, object_store, config.watering_timezone),
            user_service: UserService::new(UserRepository::new(db)),
            notification_service: NotificationService::new(notification_repository),
            push_token_repository,
            dispatch_job: Arc::new(dispatch_job),
            config: Arc::new(config),
        }
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_plant_routes_require_bearer_token() {
        let app = create_router(test_state(None));

        let response = app
            .oneshot(Request::get("/api/plants").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_token_signed_with_other_secret_is_rejected() {
        let app = create_router(test_state(None));
        let token = create_test_token("user_1", "someone-else", None);

        let response = app
            .oneshot(
                Request::get("/api/notifications")
                    .header(header::AUTHORIZATION, format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_invalid_plant_payload_is_rejected_before_storage() {
        let app = create_router(test_state(None));
        let token = create_test_token("user_1", SECRET, None);

        let response = app
            .oneshot(
                Request::post("/api/plants")
                    .header(header::AUTHORIZATION, format!("Bearer {}", token))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        r#"{"name":"","day_between_watering":0,"watering_interval":"days"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["fields"]["name"].is_array());
        assert!(body["fields"]["day_between_watering"].is_array());
    }

    #[tokio::test]
    async fn test_static_plant_segments_are_not_parsed_as_ids() {
        let token = create_test_token("user_1", SECRET, None);

        for uri in ["/api/plants/ids", "/api/plants/any"] {
            let app = create_router(test_state(None));
            let response = app
                .oneshot(
                    Request::get(uri)
                        .header(header::AUTHORIZATION, format!("Bearer {}", token))
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();

            // Reaches the handler and fails on the unreachable database,
            // instead of a 400 from `/:id` rejecting the segment as a UUID.
            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR, "{}", uri);
            assert_eq!(body_json(response).await["error"], "Database error occurred");
        }
    }

    #[tokio::test]
    async fn test_dispatch_trigger_is_disabled_without_secret() {
        let app = create_router(test_state(None));

        let response = app
            .oneshot(Request::post("/api/dispatch/run").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_dispatch_trigger_rejects_wrong_secret() {
        let app = create_router(test_state(Some("cron-secret")));

        let response = app
            .oneshot(
                Request::post("/api/dispatch/run")
                    .header("x-dispatch-secret", "guess")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_openapi_lists_plant_routes() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;

        assert!(paths.contains_key("/api/plants/{id}/water"));
        assert!(paths.contains_key("/api/plants/ids"));
        assert!(paths.contains_key("/api/plants/any"));
        assert!(paths.contains_key("/api/notifications/{id}/read-receipt"));
        assert!(paths.contains_key("/api/dispatch/run"));
    }
}
