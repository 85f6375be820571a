use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

/// Device token handed out by the push gateway to the mobile app.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterPushTokenRequest {
    #[validate(length(min = 1, max = 255))]
    pub token: String,
}
