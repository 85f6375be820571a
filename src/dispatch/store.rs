use chrono::{DateTime, Utc};
use std::future::Future;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::{
    error::Result,
    notification::{notification_models::NotificationEvent, NotificationRepository},
    plant::PlantRepository,
    push_token::{push_token_models::PushToken, PushTokenRepository},
};

/// The slice of a plant the dispatch job needs.
#[derive(Debug, Clone, PartialEq)]
pub struct OverduePlant {
    pub id: Uuid,
    pub name: String,
    pub next_watering: DateTime<Utc>,
}

/// Persistence the dispatch job reads from and writes to.
pub trait DispatchStore: Send + Sync {
    /// Registered tokens in registration order.
    fn push_tokens(&self) -> impl Future<Output = Result<Vec<PushToken>>> + Send;

    fn overdue_plants(
        &self,
        user_id: &str,
        as_of: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<OverduePlant>>> + Send;

    /// Unread notification of `user_id` linked to exactly `plant_ids` (sorted).
    fn find_open_notification(
        &self,
        user_id: &str,
        plant_ids: &[Uuid],
    ) -> impl Future<Output = Result<Option<Uuid>>> + Send;

    /// Inserts a notification and one link per plant as a single unit.
    fn create_notification(
        &self,
        user_id: &str,
        content: &str,
        plant_ids: &[Uuid],
    ) -> impl Future<Output = Result<Uuid>> + Send;
}

#[derive(Clone)]
pub struct PgDispatchStore {
    push_tokens: PushTokenRepository,
    plants: PlantRepository,
    notifications: NotificationRepository,
    notification_tx: broadcast::Sender<NotificationEvent>,
}

impl PgDispatchStore {
    pub fn new(
        push_tokens: PushTokenRepository,
        plants: PlantRepository,
        notifications: NotificationRepository,
        notification_tx: broadcast::Sender<NotificationEvent>,
    ) -> Self {
        Self {
            push_tokens,
            plants,
            notifications,
            notification_tx,
        }
    }
}

impl DispatchStore for PgDispatchStore {
    async fn push_tokens(&self) -> Result<Vec<PushToken>> {
        self.push_tokens.find_all().await
    }

    async fn overdue_plants(&self, user_id: &str, as_of: DateTime<Utc>) -> Result<Vec<OverduePlant>> {
        let plants = self.plants.find_overdue(user_id, as_of).await?;
        Ok(plants
            .into_iter()
            .map(|p| OverduePlant {
                id: p.id,
                name: p.name,
                next_watering: p.next_watering,
            })
            .collect())
    }

    async fn find_open_notification(&self, user_id: &str, plant_ids: &[Uuid]) -> Result<Option<Uuid>> {
        self.notifications.find_open_for_plants(user_id, plant_ids).await
    }

    async fn create_notification(&self, user_id: &str, content: &str, plant_ids: &[Uuid]) -> Result<Uuid> {
        let notification = self
            .notifications
            .create_with_plants(user_id, content, plant_ids)
            .await?;
        let id = notification.id;

        // No SSE subscribers is fine.
        let _ = self.notification_tx.send(NotificationEvent {
            user_id: user_id.to_string(),
            notification,
        });

        Ok(id)
    }
}
