use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::password_reset::PasswordReset;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[async_trait::async_trait]
pub trait PasswordResetRepository: Send + Sync {
    async fn create_password_reset(&self, user_id: &Uuid, token_hash: &str, expires_at: DateTime<Utc>) -> Result<PasswordReset, AppError>;
    async fn get_password_reset_by_token_hash(&self, token_hash: &str) -> Result<Option<PasswordReset>, AppError>;
    /// Marks the reset used and stores the new password hash atomically.
    ///
    /// Returns `false` when the reset was already consumed or has expired by the
    /// time the claim runs, in which case nothing is written.
    async fn complete_password_reset(&self, reset_id: &Uuid, user_id: &Uuid, password_hash: &str) -> Result<bool, AppError>;
    async fn delete_expired_password_resets(&self) -> Result<u64, AppError>;
}

#[async_trait::async_trait]
impl PasswordResetRepository for PostgresRepository {
    async fn create_password_reset(&self, user_id: &Uuid, token_hash: &str, expires_at: DateTime<Utc>) -> Result<PasswordReset, AppError> {
        let reset = sqlx::query_as::<_, PasswordReset>(
            r#"
            INSERT INTO password_reset_tokens (user_id, token_hash, expires_at)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, token_hash, expires_at, used, created_at
            "#,
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(reset)
    }

    async fn get_password_reset_by_token_hash(&self, token_hash: &str) -> Result<Option<PasswordReset>, AppError> {
        let reset = sqlx::query_as::<_, PasswordReset>(
            r#"
            SELECT id, user_id, token_hash, expires_at, used, created_at
            FROM password_reset_tokens
            WHERE token_hash = $1
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(reset)
    }

    async fn complete_password_reset(&self, reset_id: &Uuid, user_id: &Uuid, password_hash: &str) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        let claimed = sqlx::query(
            r#"
            UPDATE password_reset_tokens
            SET used = TRUE
            WHERE id = $1 AND used = FALSE AND expires_at > now()
            "#,
        )
        .bind(reset_id)
        .execute(&mut *tx)
        .await?;

        if claimed.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query("UPDATE users SET password_hash = $2, updated_at = now() WHERE id = $1")
            .bind(user_id)
            .bind(password_hash)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn delete_expired_password_resets(&self) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM password_reset_tokens WHERE expires_at <= now() OR used = TRUE")
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
