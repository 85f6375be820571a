use crate::error::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::plant_models::{Plant, WateringInterval};

/// Column values for a new plant; `next_watering` is already derived.
pub struct NewPlant<'a> {
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub image_url: Option<&'a str>,
    pub day_between_watering: i32,
    pub watering_interval: WateringInterval,
    pub last_watering: DateTime<Utc>,
    pub next_watering: DateTime<Utc>,
}

pub struct PlantChanges<'a> {
    pub name: &'a str,
    pub description: Option<&'a str>,
    /// `None` keeps the stored image.
    pub image_url: Option<&'a str>,
    pub day_between_watering: i32,
    pub watering_interval: WateringInterval,
    pub next_watering: DateTime<Utc>,
}

/// Escapes `LIKE` metacharacters so user input only ever matches literally.
pub(crate) fn like_prefix(input: &str) -> String {
    let mut pattern = String::with_capacity(input.len() + 1);
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[derive(Clone)]
pub struct PlantRepository {
    pool: PgPool,
}

impl PlantRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_all(&self, user_id: &str) -> Result<Vec<Plant>> {
        let plants = sqlx::query_as::<_, Plant>(
            "SELECT * FROM plants WHERE user_id = $1 ORDER BY next_watering ASC, name ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(plants)
    }

    pub async fn find_ids(&self, user_id: &str) -> Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM plants WHERE user_id = $1 ORDER BY created_at ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    pub async fn any_plant(&self, user_id: &str) -> Result<bool> {
        let any = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM plants WHERE user_id = $1)",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(any)
    }

    pub async fn find_by_id(&self, id: Uuid, user_id: &str) -> Result<Option<Plant>> {
        let plant = sqlx::query_as::<_, Plant>("SELECT * FROM plants WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(plant)
    }

    pub async fn search_by_name_prefix(&self, user_id: &str, prefix: &str) -> Result<Vec<Plant>> {
        let plants = sqlx::query_as::<_, Plant>(
            "SELECT * FROM plants WHERE user_id = $1 AND name LIKE $2 ESCAPE '\\' ORDER BY name ASC",
        )
        .bind(user_id)
        .bind(like_prefix(prefix))
        .fetch_all(&self.pool)
        .await?;

        Ok(plants)
    }

    /// Plants whose next watering falls in `[from, until)`.
    pub async fn find_by_watering_window(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Plant>> {
        let plants = sqlx::query_as::<_, Plant>(
            "SELECT * FROM plants
             WHERE user_id = $1 AND next_watering >= $2 AND next_watering < $3
             ORDER BY next_watering ASC",
        )
        .bind(user_id)
        .bind(from)
        .bind(until)
        .fetch_all(&self.pool)
        .await?;

        Ok(plants)
    }

    pub async fn find_overdue(&self, user_id: &str, as_of: DateTime<Utc>) -> Result<Vec<Plant>> {
        let plants = sqlx::query_as::<_, Plant>(
            "SELECT * FROM plants
             WHERE user_id = $1 AND next_watering <= $2
             ORDER BY next_watering ASC, id ASC",
        )
        .bind(user_id)
        .bind(as_of)
        .fetch_all(&self.pool)
        .await?;

        Ok(plants)
    }

    pub async fn any_overdue(&self, user_id: &str, as_of: DateTime<Utc>) -> Result<bool> {
        let any = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM plants WHERE user_id = $1 AND next_watering <= $2)",
        )
        .bind(user_id)
        .bind(as_of)
        .fetch_one(&self.pool)
        .await?;

        Ok(any)
    }

    pub async fn watering_days(&self, user_id: &str) -> Result<Vec<DateTime<Utc>>> {
        let days = sqlx::query_scalar::<_, DateTime<Utc>>(
            "SELECT next_watering FROM plants WHERE user_id = $1 ORDER BY next_watering ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(days)
    }

    pub async fn create(&self, user_id: &str, plant: NewPlant<'_>) -> Result<Plant> {
        let plant = sqlx::query_as::<_, Plant>(
            "INSERT INTO plants
                (user_id, name, description, image_url, day_between_watering,
                 watering_interval, last_watering, next_watering)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING *",
        )
        .bind(user_id)
        .bind(plant.name)
        .bind(plant.description)
        .bind(plant.image_url)
        .bind(plant.day_between_watering)
        .bind(plant.watering_interval)
        .bind(plant.last_watering)
        .bind(plant.next_watering)
        .fetch_one(&self.pool)
        .await?;

        Ok(plant)
    }

    pub async fn update(
        &self,
        id: Uuid,
        user_id: &str,
        changes: PlantChanges<'_>,
    ) -> Result<Option<Plant>> {
        let plant = sqlx::query_as::<_, Plant>(
            "UPDATE plants SET
                name = $1,
                description = $2,
                image_url = COALESCE($3, image_url),
                day_between_watering = $4,
                watering_interval = $5,
                next_watering = $6,
                updated_at = NOW()
             WHERE id = $7 AND user_id = $8
             RETURNING *",
        )
        .bind(changes.name)
        .bind(changes.description)
        .bind(changes.image_url)
        .bind(changes.day_between_watering)
        .bind(changes.watering_interval)
        .bind(changes.next_watering)
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(plant)
    }

    /// Records a watering event; the only write path for the watering timestamps.
    pub async fn record_watering(
        &self,
        id: Uuid,
        user_id: &str,
        last_watering: DateTime<Utc>,
        next_watering: DateTime<Utc>,
    ) -> Result<Option<Plant>> {
        let plant = sqlx::query_as::<_, Plant>(
            "UPDATE plants SET last_watering = $1, next_watering = $2, updated_at = NOW()
             WHERE id = $3 AND user_id = $4
             RETURNING *",
        )
        .bind(last_watering)
        .bind(next_watering)
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(plant)
    }

    pub async fn delete(&self, id: Uuid, user_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM plants WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_prefix_escapes_metacharacters() {
        assert_eq!(like_prefix("Mon"), "Mon%");
        assert_eq!(like_prefix("50%_off"), "50\\%\\_off%");
        assert_eq!(like_prefix("a\\b"), "a\\\\b%");
        assert_eq!(like_prefix(""), "%");
    }
}
