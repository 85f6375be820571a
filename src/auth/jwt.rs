use crate::error::{AppError, Result};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// Claims issued by the identity provider. `sub` is the user id.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

/// Verify a bearer token and extract its claims.
pub fn verify_jwt(token: &str, secret: &str, issuer: Option<&str>) -> Result<Claims> {
    let mut validation = Validation::default();
    if let Some(issuer) = issuer {
        validation.set_issuer(&[issuer]);
    }

    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::Unauthorized("Invalid token".to_string()))?;

    if claims.sub.trim().is_empty() {
        return Err(AppError::Unauthorized("Invalid token".to_string()));
    }

    Ok(claims)
}

#[cfg(test)]
pub fn create_test_token(user_id: &str, secret: &str, issuer: Option<&str>) -> String {
    use chrono::{Duration, Utc};
    use jsonwebtoken::{encode, EncodingKey, Header};

    let claims = Claims {
        sub: user_id.to_string(),
        exp: (Utc::now() + Duration::minutes(15)).timestamp(),
        iss: issuer.map(str::to_string),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}
