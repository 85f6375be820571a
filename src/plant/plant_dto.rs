use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

use super::plant_models::WateringInterval;

fn validate_object_key(key: &str) -> Result<(), ValidationError> {
    let well_formed = !key.starts_with('/')
        && key.split('/').all(|part| !part.is_empty() && part != "." && part != "..")
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/'));

    if well_formed {
        Ok(())
    } else {
        Err(ValidationError::new("object_key"))
    }
}

/// Base64 image sent along with a plant, stored under `<user id>/<key>` in the object store.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ImageUpload {
    #[validate(length(min = 1))]
    pub base64: String,
    #[validate(length(min = 1, max = 255), custom(function = "validate_object_key"))]
    pub key: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreatePlantRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"))]
    pub name: String,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    #[validate(range(min = 1, max = 3650, message = "Must be a positive number"))]
    pub day_between_watering: i32,
    pub watering_interval: WateringInterval,
    pub last_watering: Option<DateTime<Utc>>,
    #[validate(nested)]
    pub image: Option<ImageUpload>,
}

/// Full replacement of the editable fields. `image: null` keeps the current image.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdatePlantRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"))]
    pub name: String,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    #[validate(range(min = 1, max = 3650, message = "Must be a positive number"))]
    pub day_between_watering: i32,
    pub watering_interval: WateringInterval,
    #[validate(nested)]
    pub image: Option<ImageUpload>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct WaterPlantRequest {
    pub last_watering: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct SearchQuery {
    /// Name prefix
    pub q: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct WateringDayQuery {
    /// Calendar day (UTC), `YYYY-MM-DD`
    pub date: NaiveDate,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ImageUrlResponse {
    pub url: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WateredResponse {
    pub watered: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AnyOverdueResponse {
    pub any: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AnyPlantResponse {
    pub any: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_key_rules() {
        assert!(validate_object_key("plants/user_1/fern.jpg").is_ok());
        assert!(validate_object_key("../secrets").is_err());
        assert!(validate_object_key("/absolute.png").is_err());
        assert!(validate_object_key("a//b").is_err());
        assert!(validate_object_key("with space.png").is_err());
    }

    #[test]
    fn test_create_request_rejects_non_positive_cadence() {
        let request: CreatePlantRequest = serde_json::from_value(serde_json::json!({
            "name": "Monstera",
            "day_between_watering": 0,
            "watering_interval": "weeks",
        }))
        .unwrap();

        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("day_between_watering"));
    }

    #[test]
    fn test_create_request_validates_nested_image() {
        let request: CreatePlantRequest = serde_json::from_value(serde_json::json!({
            "name": "Monstera",
            "day_between_watering": 1,
            "watering_interval": "weeks",
            "image": { "base64": "aGVsbG8=", "key": "../escape" },
        }))
        .unwrap();

        assert!(request.validate().is_err());
    }
}
