use crate::{
    db::DbPool,
    dispatch::{DispatchJob, PgDispatchStore},
    notification::{notification_models::NotificationEvent, NotificationService},
    plant::PlantService,
    push::ExpoClient,
    push_token::PushTokenRepository,
    user::UserService,
};
use anyhow::{anyhow, Context};
use chrono_tz::Tz;
use std::{str::FromStr, sync::Arc, time::Duration};
use tokio::sync::broadcast;

pub type AppDispatchJob = DispatchJob<PgDispatchStore, ExpoClient>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Arc<Config>,
    pub notification_tx: broadcast::Sender<NotificationEvent>,
    pub plant_service: PlantService,
    pub user_service: UserService,
    pub notification_service: NotificationService,
    pub push_token_repository: PushTokenRepository,
    pub dispatch_job: Arc<AppDispatchJob>,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    pub jwt_issuer: Option<String>,
    pub expo_api_url: String,
    pub expo_access_token: Option<String>,
    pub object_store_url: String,
    pub object_store_public_url: String,
    pub object_store_api_key: Option<String>,
    pub watering_timezone: Tz,
    pub dispatch_cron: String,
    pub dispatch_concurrency: usize,
    pub dispatch_deadline: Duration,
    pub dispatch_send_reserve: Duration,
    pub dispatch_trigger_secret: Option<String>,
}

fn required(name: &str) -> anyhow::Result<String> {
    std::env::var(name).with_context(|| format!("{} must be set", name))
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T>(name: &str, default: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = std::env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse::<T>()
        .map_err(|e| anyhow!("{} has an invalid value {:?}: {}", name, raw, e))
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let object_store_url = required("OBJECT_STORE_URL")?;
        let object_store_public_url =
            optional("OBJECT_STORE_PUBLIC_URL").unwrap_or_else(|| object_store_url.clone());

        let dispatch_concurrency: usize = parsed("DISPATCH_CONCURRENCY", "4")?;
        if dispatch_concurrency == 0 {
            return Err(anyhow!("DISPATCH_CONCURRENCY must be at least 1"));
        }

        let dispatch_deadline = Duration::from_secs(parsed("DISPATCH_DEADLINE_SECS", "240")?);
        let dispatch_send_reserve =
            Duration::from_secs(parsed("DISPATCH_SEND_RESERVE_SECS", "60")?);
        if dispatch_send_reserve >= dispatch_deadline {
            return Err(anyhow!(
                "DISPATCH_SEND_RESERVE_SECS must be lower than DISPATCH_DEADLINE_SECS"
            ));
        }

        Ok(Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parsed("PORT", "3000")?,
            database_url: required("DATABASE_URL")?,
            database_max_connections: parsed("DATABASE_MAX_CONNECTIONS", "5")?,
            jwt_secret: required("JWT_SECRET")?,
            jwt_issuer: optional("JWT_ISSUER"),
            expo_api_url: std::env::var("EXPO_API_URL")
                .unwrap_or_else(|_| "https://exp.host".to_string()),
            expo_access_token: optional("EXPO_ACCESS_TOKEN"),
            object_store_url,
            object_store_public_url,
            object_store_api_key: optional("OBJECT_STORE_API_KEY"),
            watering_timezone: parsed("WATERING_TIMEZONE", "Europe/Paris")?,
            dispatch_cron: std::env::var("DISPATCH_CRON")
                .unwrap_or_else(|_| "0 0 * * * *".to_string()),
            dispatch_concurrency,
            dispatch_deadline,
            dispatch_send_reserve,
            dispatch_trigger_secret: optional("DISPATCH_TRIGGER_SECRET"),
        })
    }
}
