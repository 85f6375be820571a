mod auth;
mod db;
mod dispatch;
mod error;
mod middleware;
mod notification;
mod plant;
mod push;
mod push_token;
mod routes;
mod state;
mod storage;
mod user;

use anyhow::Context;
use db::{create_pool, run_migrations};
use dispatch::{start_dispatch_scheduler, DispatchJob, DispatchSettings, PgDispatchStore};
use notification::{NotificationRepository, NotificationService};
use plant::{PlantRepository, PlantService};
use push::ExpoClient;
use push_token::PushTokenRepository;
use routes::create_router;
use state::{AppState, Config};
use std::sync::Arc;
use storage::ObjectStore;
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use user::{UserRepository, UserService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,plant_reminder=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Arc::new(Config::from_env()?);

    tracing::info!("Connecting to database...");
    let db = create_pool(&config.database_url, config.database_max_connections)
        .await
        .context("failed to connect to the database")?;

    tracing::info!("Running migrations...");
    run_migrations(&db).await.context("failed to run migrations")?;

    // Create notification broadcaster
    let (notification_tx, _) = broadcast::channel(100);

    // Create repositories
    let user_repository = UserRepository::new(db.clone());
    let plant_repository = PlantRepository::new(db.clone());
    let notification_repository = NotificationRepository::new(db.clone());
    let push_token_repository = PushTokenRepository::new(db.clone());

    // External clients
    let object_store = ObjectStore::new(
        &config.object_store_url,
        &config.object_store_public_url,
        config.object_store_api_key.clone(),
    );
    let expo_client = ExpoClient::new(&config.expo_api_url, config.expo_access_token.clone());

    // Create services
    let plant_service = PlantService::new(
        plant_repository.clone(),
        object_store,
        config.watering_timezone,
    );
    let user_service = UserService::new(user_repository);
    let notification_service = NotificationService::new(notification_repository.clone());

    let dispatch_job = DispatchJob::new(
        PgDispatchStore::new(
            push_token_repository.clone(),
            plant_repository,
            notification_repository,
            notification_tx.clone(),
        ),
        expo_client,
        DispatchSettings {
            concurrency: config.dispatch_concurrency,
            deadline: config.dispatch_deadline,
            send_reserve: config.dispatch_send_reserve,
        },
    );

    // Create application state
    let state = AppState {
        db: db.clone(),
        config: config.clone(),
        notification_tx,
        plant_service,
        user_service,
        notification_service,
        push_token_repository,
        dispatch_job: Arc::new(dispatch_job),
    };

    // Start the reminder dispatch schedule
    let mut scheduler = start_dispatch_scheduler(state.clone()).await?;

    // Create router
    let app = create_router(state);

    // Start server
    let addr = format!("{}:{}", config.host, config.port);

    tracing::info!("Server starting on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Err(e) = scheduler.shutdown().await {
        tracing::warn!("Dispatch scheduler did not shut down cleanly: {:?}", e);
    }
    db.close().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
