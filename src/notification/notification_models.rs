use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: String,
    pub content: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// A notification together with the plants that triggered it.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct NotificationWithPlants {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub notification: Notification,
    pub plant_ids: Vec<Uuid>,
}

/// Broadcast to SSE subscribers whenever the dispatch job records a notification.
#[derive(Debug, Clone)]
pub struct NotificationEvent {
    pub user_id: String,
    pub notification: Notification,
}

/// True when every linked plant has its next watering strictly after `now`.
/// A notification whose plants were all deleted has nothing left to wait for.
pub fn all_plants_watered(next_waterings: &[DateTime<Utc>], now: DateTime<Utc>) -> bool {
    next_waterings.iter().all(|next| *next > now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_read_receipt_needs_every_plant_watered() {
        let now = Utc::now();
        let watered = now + Duration::days(3);
        let overdue = now - Duration::hours(1);

        assert!(all_plants_watered(&[watered, watered + Duration::days(1)], now));
        assert!(!all_plants_watered(&[watered, overdue], now));
    }

    #[test]
    fn test_read_receipt_boundary_is_strict() {
        let now = Utc::now();
        assert!(!all_plants_watered(&[now], now));
    }

    #[test]
    fn test_read_receipt_without_plants() {
        assert!(all_plants_watered(&[], Utc::now()));
    }
}
