use crate::error::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::notification_models::{Notification, NotificationWithPlants};

#[derive(Clone)]
pub struct NotificationRepository {
    pool: PgPool,
}

impl NotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_all_by_user(&self, user_id: &str) -> Result<Vec<NotificationWithPlants>> {
        let notifications = sqlx::query_as::<_, NotificationWithPlants>(
            "SELECT n.id, n.user_id, n.content, n.is_read, n.created_at,
                    COALESCE(
                        array_agg(np.plant_id) FILTER (WHERE np.plant_id IS NOT NULL),
                        '{}'
                    ) AS plant_ids
             FROM notifications n
             LEFT JOIN notification_plants np ON np.notification_id = n.id
             WHERE n.user_id = $1
             GROUP BY n.id
             ORDER BY n.created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(notifications)
    }

    pub async fn find_by_id(&self, id: Uuid, user_id: &str) -> Result<Option<Notification>> {
        let notification = sqlx::query_as::<_, Notification>(
            "SELECT * FROM notifications WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(notification)
    }

    /// `next_watering` of every plant still linked to the notification.
    pub async fn linked_next_waterings(&self, id: Uuid, user_id: &str) -> Result<Vec<DateTime<Utc>>> {
        let next_waterings = sqlx::query_scalar::<_, DateTime<Utc>>(
            "SELECT p.next_watering
             FROM notification_plants np
             JOIN plants p ON p.id = np.plant_id
             WHERE np.notification_id = $1 AND p.user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(next_waterings)
    }

    /// Flips `is_read` only if it is still false; `None` means nothing changed.
    pub async fn mark_as_read(&self, id: Uuid, user_id: &str) -> Result<Option<Notification>> {
        let notification = sqlx::query_as::<_, Notification>(
            "UPDATE notifications SET is_read = true
             WHERE id = $1 AND user_id = $2 AND is_read = false
             RETURNING *",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(notification)
    }

    /// Latest unread notification of the user linked to exactly `plant_ids`.
    /// `plant_ids` must be sorted.
    pub async fn find_open_for_plants(&self, user_id: &str, plant_ids: &[Uuid]) -> Result<Option<Uuid>> {
        let id = sqlx::query_scalar::<_, Uuid>(
            "SELECT n.id
             FROM notifications n
             WHERE n.user_id = $1
               AND n.is_read = false
               AND (SELECT array_agg(np.plant_id ORDER BY np.plant_id)
                    FROM notification_plants np
                    WHERE np.notification_id = n.id) = $2
             ORDER BY n.created_at DESC
             LIMIT 1",
        )
        .bind(user_id)
        .bind(plant_ids)
        .fetch_optional(&self.pool)
        .await?;

        Ok(id)
    }

    /// Inserts the notification and its plant links atomically.
    pub async fn create_with_plants(
        &self,
        user_id: &str,
        content: &str,
        plant_ids: &[Uuid],
    ) -> Result<Notification> {
        let mut tx = self.pool.begin().await?;

        let notification = sqlx::query_as::<_, Notification>(
            "INSERT INTO notifications (user_id, content, is_read)
             VALUES ($1, $2, false)
             RETURNING *",
        )
        .bind(user_id)
        .bind(content)
        .fetch_one(&mut *tx)
        .await?;

        for plant_id in plant_ids {
            sqlx::query("INSERT INTO notification_plants (notification_id, plant_id) VALUES ($1, $2)")
                .bind(notification.id)
                .bind(plant_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(notification)
    }
}
