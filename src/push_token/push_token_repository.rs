use crate::error::Result;
use sqlx::PgPool;

use super::push_token_models::PushToken;

#[derive(Clone)]
pub struct PushTokenRepository {
    pool: PgPool,
}

impl PushTokenRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A device that signs in with another account moves its token over.
    pub async fn register(&self, user_id: &str, token: &str) -> Result<PushToken> {
        let push_token = sqlx::query_as::<_, PushToken>(
            "INSERT INTO push_tokens (token, user_id)
             VALUES ($1, $2)
             ON CONFLICT (token) DO UPDATE SET user_id = EXCLUDED.user_id
             RETURNING *",
        )
        .bind(token)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(push_token)
    }

    pub async fn delete(&self, user_id: &str, token: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM push_tokens WHERE token = $1 AND user_id = $2")
            .bind(token)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Every registered token, oldest registration first.
    pub async fn find_all(&self) -> Result<Vec<PushToken>> {
        let tokens = sqlx::query_as::<_, PushToken>(
            "SELECT * FROM push_tokens ORDER BY created_at ASC, token ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(tokens)
    }
}
