use chrono::{DateTime, Utc};
use std::future::Future;
use uuid::Uuid;

use crate::error::{AppError, Result};

use super::{
    notification_models::{all_plants_watered, Notification, NotificationWithPlants},
    notification_repository::NotificationRepository,
};

/// Reads and writes the read-state flows need.
pub trait NotificationStore: Send + Sync {
    fn list(&self, user_id: &str) -> impl Future<Output = Result<Vec<NotificationWithPlants>>> + Send;

    fn get(&self, id: Uuid, user_id: &str) -> impl Future<Output = Result<Option<Notification>>> + Send;

    fn linked_next_waterings(
        &self,
        id: Uuid,
        user_id: &str,
    ) -> impl Future<Output = Result<Vec<DateTime<Utc>>>> + Send;

    /// Conditional flip; `None` when missing or already read.
    fn mark_read(&self, id: Uuid, user_id: &str) -> impl Future<Output = Result<Option<Notification>>> + Send;
}

impl NotificationStore for NotificationRepository {
    async fn list(&self, user_id: &str) -> Result<Vec<NotificationWithPlants>> {
        self.find_all_by_user(user_id).await
    }

    async fn get(&self, id: Uuid, user_id: &str) -> Result<Option<Notification>> {
        self.find_by_id(id, user_id).await
    }

    async fn linked_next_waterings(&self, id: Uuid, user_id: &str) -> Result<Vec<DateTime<Utc>>> {
        NotificationRepository::linked_next_waterings(self, id, user_id).await
    }

    async fn mark_read(&self, id: Uuid, user_id: &str) -> Result<Option<Notification>> {
        self.mark_as_read(id, user_id).await
    }
}

#[derive(Clone)]
pub struct NotificationService<R = NotificationRepository> {
    repo: R,
}

impl<R: NotificationStore> NotificationService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub async fn list_notifications(&self, user_id: &str) -> Result<Vec<NotificationWithPlants>> {
        self.repo.list(user_id).await
    }

    pub async fn mark_as_read(&self, user_id: &str, notification_id: Uuid) -> Result<Notification> {
        if let Some(notification) = self.repo.mark_read(notification_id, user_id).await? {
            return Ok(notification);
        }

        // Either missing or already read.
        self.repo
            .get(notification_id, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Notification not found".to_string()))
    }

    /// Marks the notification read once none of its plants is overdue any more.
    pub async fn check_read_receipt(&self, user_id: &str, notification_id: Uuid) -> Result<Notification> {
        let notification = self
            .repo
            .get(notification_id, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Notification not found".to_string()))?;

        if notification.is_read {
            return Ok(notification);
        }

        let next_waterings = self.repo.linked_next_waterings(notification_id, user_id).await?;
        if !all_plants_watered(&next_waterings, Utc::now()) {
            return Ok(notification);
        }

        let updated = self.repo.mark_read(notification_id, user_id).await?;
        tracing::debug!(%notification_id, user_id, "notification marked read after re-watering");

        // A concurrent check may have flipped it first.
        Ok(updated.unwrap_or(Notification {
            is_read: true,
            ..notification
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::Mutex;

    struct FakeNotifications {
        notification: Mutex<Option<Notification>>,
        next_waterings: Vec<DateTime<Utc>>,
        /// Someone else flips the row between our read and our update.
        flipped_elsewhere: bool,
        mark_calls: Mutex<usize>,
    }

    impl FakeNotifications {
        fn new(is_read: bool, next_waterings: Vec<DateTime<Utc>>) -> Self {
            Self {
                notification: Mutex::new(Some(Notification {
                    id: Uuid::new_v4(),
                    user_id: "user_u".into(),
                    content: "A plant needs watering".into(),
                    is_read,
                    created_at: Utc::now(),
                })),
                next_waterings,
                flipped_elsewhere: false,
                mark_calls: Mutex::new(0),
            }
        }

        fn empty() -> Self {
            let fake = Self::new(false, Vec::new());
            *fake.notification.lock().unwrap() = None;
            fake
        }

        fn id(&self) -> Uuid {
            self.notification.lock().unwrap().as_ref().map(|n| n.id).unwrap_or_default()
        }

        fn owned(&self, id: Uuid, user_id: &str) -> Option<Notification> {
            self.notification
                .lock()
                .unwrap()
                .clone()
                .filter(|n| n.id == id && n.user_id == user_id)
        }
    }

    impl NotificationStore for FakeNotifications {
        async fn list(&self, user_id: &str) -> Result<Vec<NotificationWithPlants>> {
            Ok(self
                .notification
                .lock()
                .unwrap()
                .clone()
                .filter(|n| n.user_id == user_id)
                .map(|notification| NotificationWithPlants {
                    notification,
                    plant_ids: Vec::new(),
                })
                .into_iter()
                .collect())
        }

        async fn get(&self, id: Uuid, user_id: &str) -> Result<Option<Notification>> {
            Ok(self.owned(id, user_id))
        }

        async fn linked_next_waterings(&self, _id: Uuid, _user_id: &str) -> Result<Vec<DateTime<Utc>>> {
            Ok(self.next_waterings.clone())
        }

        async fn mark_read(&self, id: Uuid, user_id: &str) -> Result<Option<Notification>> {
            *self.mark_calls.lock().unwrap() += 1;
            if self.flipped_elsewhere {
                return Ok(None);
            }

            let mut stored = self.notification.lock().unwrap();
            match stored.as_mut() {
                Some(n) if n.id == id && n.user_id == user_id && !n.is_read => {
                    n.is_read = true;
                    Ok(Some(n.clone()))
                }
                _ => Ok(None),
            }
        }
    }

    fn watered() -> DateTime<Utc> {
        Utc::now() + Duration::days(3)
    }

    fn overdue() -> DateTime<Utc> {
        Utc::now() - Duration::hours(2)
    }

    #[tokio::test]
    async fn test_read_receipt_marks_read_once_all_plants_watered() {
        let service = NotificationService::new(FakeNotifications::new(false, vec![watered(), watered()]));
        let id = service.repo.id();

        let notification = service.check_read_receipt("user_u", id).await.unwrap();

        assert!(notification.is_read);
        assert_eq!(*service.repo.mark_calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_read_receipt_waits_while_a_plant_is_overdue() {
        let service = NotificationService::new(FakeNotifications::new(false, vec![watered(), overdue()]));
        let id = service.repo.id();

        let notification = service.check_read_receipt("user_u", id).await.unwrap();

        assert!(!notification.is_read);
        assert_eq!(*service.repo.mark_calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_read_receipt_leaves_read_notification_untouched() {
        let service = NotificationService::new(FakeNotifications::new(true, vec![overdue()]));
        let id = service.repo.id();

        let notification = service.check_read_receipt("user_u", id).await.unwrap();

        assert!(notification.is_read);
        assert_eq!(*service.repo.mark_calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_read_receipt_without_linked_plants_marks_read() {
        let service = NotificationService::new(FakeNotifications::new(false, Vec::new()));
        let id = service.repo.id();

        assert!(service.check_read_receipt("user_u", id).await.unwrap().is_read);
    }

    #[tokio::test]
    async fn test_read_receipt_reports_read_when_flipped_concurrently() {
        let mut repo = FakeNotifications::new(false, vec![watered()]);
        repo.flipped_elsewhere = true;
        let service = NotificationService::new(repo);
        let id = service.repo.id();

        let notification = service.check_read_receipt("user_u", id).await.unwrap();

        assert!(notification.is_read);
        assert_eq!(notification.id, id);
    }

    #[tokio::test]
    async fn test_read_receipt_for_missing_or_foreign_notification_is_not_found() {
        let service = NotificationService::new(FakeNotifications::empty());
        let err = service.check_read_receipt("user_u", Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let service = NotificationService::new(FakeNotifications::new(false, vec![watered()]));
        let id = service.repo.id();
        let err = service.check_read_receipt("someone_else", id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_mark_as_read_returns_already_read_notification() {
        let service = NotificationService::new(FakeNotifications::new(true, Vec::new()));
        let id = service.repo.id();

        let notification = service.mark_as_read("user_u", id).await.unwrap();

        assert!(notification.is_read);
        assert_eq!(notification.id, id);
    }

    #[tokio::test]
    async fn test_mark_as_read_missing_is_not_found() {
        let service = NotificationService::new(FakeNotifications::empty());

        let err = service.mark_as_read("user_u", Uuid::new_v4()).await.unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_is_scoped_to_caller() {
        let service = NotificationService::new(FakeNotifications::new(false, Vec::new()));

        assert_eq!(service.list_notifications("user_u").await.unwrap().len(), 1);
        assert!(service.list_notifications("someone_else").await.unwrap().is_empty());
    }
}
