use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    storage::ObjectStore,
};

use super::{
    plant_dto::{CreatePlantRequest, ImageUpload, UpdatePlantRequest},
    plant_models::{next_watering, Plant, WateringInterval},
    plant_repository::{NewPlant, PlantChanges, PlantRepository},
};

fn owned_object_key(user_id: &str, key: &str) -> String {
    format!("{}/{}", user_id, key)
}

/// Service layer for plant-related business logic.
#[derive(Clone)]
pub struct PlantService {
    repo: PlantRepository,
    object_store: ObjectStore,
    timezone: Tz,
}

impl PlantService {
    pub fn new(repo: PlantRepository, object_store: ObjectStore, timezone: Tz) -> Self {
        Self {
            repo,
            object_store,
            timezone,
        }
    }

    fn compute_next_watering(
        &self,
        last_watering: DateTime<Utc>,
        day_between_watering: i32,
        interval: WateringInterval,
    ) -> Result<DateTime<Utc>> {
        let every = u32::try_from(day_between_watering)
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| AppError::BadRequest("Watering cadence must be positive".into()))?;

        next_watering(last_watering, every, interval, self.timezone)
            .ok_or_else(|| AppError::BadRequest("Watering cadence is out of range".into()))
    }

    /// Stores the image under the caller's own prefix and returns that key.
    async fn upload(&self, user_id: &str, image: Option<&ImageUpload>) -> Result<Option<String>> {
        let Some(image) = image else {
            return Ok(None);
        };

        let key = owned_object_key(user_id, &image.key);
        Ok(Some(self.object_store.upload_base64(&key, &image.base64).await?))
    }

    pub async fn list_plants(&self, user_id: &str) -> Result<Vec<Plant>> {
        self.repo.find_all(user_id).await
    }

    pub async fn list_plant_ids(&self, user_id: &str) -> Result<Vec<Uuid>> {
        self.repo.find_ids(user_id).await
    }

    pub async fn has_plants(&self, user_id: &str) -> Result<bool> {
        self.repo.any_plant(user_id).await
    }

    pub async fn get_plant(&self, user_id: &str, plant_id: Uuid) -> Result<Plant> {
        self.repo
            .find_by_id(plant_id, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Plant not found".into()))
    }

    pub async fn search_plants(&self, user_id: &str, prefix: &str) -> Result<Vec<Plant>> {
        self.repo.search_by_name_prefix(user_id, prefix).await
    }

    /// Plants due on the given calendar day, taken in UTC.
    pub async fn plants_for_day(&self, user_id: &str, day: NaiveDate) -> Result<Vec<Plant>> {
        let from = day.and_hms_opt(0, 0, 0).ok_or(AppError::InternalError)?.and_utc();
        let until = from + Duration::days(1);
        self.repo.find_by_watering_window(user_id, from, until).await
    }

    pub async fn overdue_plants(&self, user_id: &str) -> Result<Vec<Plant>> {
        self.repo.find_overdue(user_id, Utc::now()).await
    }

    pub async fn has_overdue_plants(&self, user_id: &str) -> Result<bool> {
        self.repo.any_overdue(user_id, Utc::now()).await
    }

    pub async fn watering_days(&self, user_id: &str) -> Result<Vec<DateTime<Utc>>> {
        self.repo.watering_days(user_id).await
    }

    /// `false` for plants the caller does not own, like the missing case.
    pub async fn is_watered(&self, user_id: &str, plant_id: Uuid) -> Result<bool> {
        let plant = self.repo.find_by_id(plant_id, user_id).await?;
        Ok(plant.map_or(false, |p| p.is_watered(Utc::now())))
    }

    pub async fn image_url(&self, user_id: &str, plant_id: Uuid) -> Result<Option<String>> {
        let plant = self.repo.find_by_id(plant_id, user_id).await?;
        Ok(plant
            .and_then(|p| p.image_url)
            .map(|key| self.object_store.public_url(&key)))
    }

    pub async fn create_plant(&self, user_id: &str, payload: CreatePlantRequest) -> Result<Plant> {
        let last_watering = payload.last_watering.unwrap_or_else(Utc::now);
        let next_watering = self.compute_next_watering(
            last_watering,
            payload.day_between_watering,
            payload.watering_interval,
        )?;
        let image_url = self.upload(user_id, payload.image.as_ref()).await?;

        let plant = self
            .repo
            .create(
                user_id,
                NewPlant {
                    name: &payload.name,
                    description: payload.description.as_deref(),
                    image_url: image_url.as_deref(),
                    day_between_watering: payload.day_between_watering,
                    watering_interval: payload.watering_interval,
                    last_watering,
                    next_watering,
                },
            )
            .await?;

        tracing::debug!(plant_id = %plant.id, user_id, "plant created");
        Ok(plant)
    }

    /// Cadence edits re-derive the next watering from the stored last watering.
    pub async fn update_plant(
        &self,
        user_id: &str,
        plant_id: Uuid,
        payload: UpdatePlantRequest,
    ) -> Result<Plant> {
        let current = self.get_plant(user_id, plant_id).await?;
        let next_watering = self.compute_next_watering(
            current.last_watering,
            payload.day_between_watering,
            payload.watering_interval,
        )?;
        let image_url = self.upload(user_id, payload.image.as_ref()).await?;

        self.repo
            .update(
                plant_id,
                user_id,
                PlantChanges {
                    name: &payload.name,
                    description: payload.description.as_deref(),
                    image_url: image_url.as_deref(),
                    day_between_watering: payload.day_between_watering,
                    watering_interval: payload.watering_interval,
                    next_watering,
                },
            )
            .await?
            .ok_or_else(|| AppError::NotFound("Plant not found".into()))
    }

    pub async fn water_plant(
        &self,
        user_id: &str,
        plant_id: Uuid,
        last_watering: Option<DateTime<Utc>>,
    ) -> Result<Plant> {
        let plant = self.get_plant(user_id, plant_id).await?;
        let last_watering = last_watering.unwrap_or_else(Utc::now);
        let next_watering = self.compute_next_watering(
            last_watering,
            plant.day_between_watering,
            plant.watering_interval,
        )?;

        let plant = self
            .repo
            .record_watering(plant_id, user_id, last_watering, next_watering)
            .await?
            .ok_or_else(|| AppError::NotFound("Plant not found".into()))?;

        tracing::debug!(plant_id = %plant.id, next_watering = %plant.next_watering, "plant watered");
        Ok(plant)
    }

    pub async fn delete_plant(&self, user_id: &str, plant_id: Uuid) -> Result<u64> {
        self.repo.delete(plant_id, user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service(store_url: &str) -> PlantService {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/plant_reminder_test")
            .unwrap();
        PlantService::new(
            PlantRepository::new(pool),
            ObjectStore::new(store_url, "https://cdn.example", None),
            chrono_tz::Europe::Paris,
        )
    }

    #[test]
    fn test_object_key_is_prefixed_with_owner() {
        assert_eq!(owned_object_key("user_a", "fern.png"), "user_a/fern.png");
        assert_eq!(
            owned_object_key("user_a", "user_b/fern.png"),
            "user_a/user_b/fern.png"
        );
    }

    #[tokio::test]
    async fn test_upload_lands_under_callers_prefix() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/user_a/user_b/fern.png"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let image = ImageUpload {
            base64: "aGVsbG8=".into(),
            key: "user_b/fern.png".into(),
        };
        let key = service(&mock_server.uri())
            .upload("user_a", Some(&image))
            .await
            .unwrap();

        assert_eq!(key.as_deref(), Some("user_a/user_b/fern.png"));
    }

    #[tokio::test]
    async fn test_no_image_skips_upload() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let key = service(&mock_server.uri()).upload("user_a", None).await.unwrap();
        assert!(key.is_none());
    }
}
