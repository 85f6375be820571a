use crate::{
    error::{AppError, Result},
    user::{
        user_dto::{CreateUserRequest, UpdateUserRequest},
        user_models::User,
        user_repository::UserRepository,
    },
};

/// `users.email` is unique; a clash is the caller's mistake, not a server error.
fn email_conflict(err: AppError) -> AppError {
    match err {
        AppError::Database(sqlx::Error::Database(ref db_err)) if db_err.is_unique_violation() => {
            AppError::BadRequest("Email already in use".to_string())
        }
        other => other,
    }
}

#[derive(Clone)]
pub struct UserService {
    user_repository: UserRepository,
}

impl UserService {
    pub fn new(user_repository: UserRepository) -> Self {
        Self { user_repository }
    }

    pub async fn create_user(&self, user_id: &str, payload: CreateUserRequest) -> Result<User> {
        let user = self
            .user_repository
            .upsert(user_id, &payload.email, payload.username.as_deref())
            .await
            .map_err(email_conflict)?;

        tracing::info!(user_id, "user registered");
        Ok(user)
    }

    pub async fn get_current_user(&self, user_id: &str) -> Result<User> {
        self.user_repository
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    pub async fn update_current_user(&self, user_id: &str, payload: UpdateUserRequest) -> Result<User> {
        self.user_repository
            .update(user_id, payload.email.as_deref(), payload.username.as_deref())
            .await
            .map_err(email_conflict)?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    pub async fn delete_current_user(&self, user_id: &str) -> Result<()> {
        if self.user_repository.delete(user_id).await? == 0 {
            return Err(AppError::NotFound("User not found".to_string()));
        }

        tracing::info!(user_id, "user deleted");
        Ok(())
    }
}
