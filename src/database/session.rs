use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::session::{NewSession, Session};
use uuid::Uuid;

#[async_trait::async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create_session(&self, session: &NewSession) -> Result<Session, AppError>;
    async fn get_session_by_token_hash(&self, token_hash: &str) -> Result<Option<Session>, AppError>;
    async fn get_session_by_id(&self, id: &Uuid) -> Result<Option<Session>, AppError>;
    async fn delete_session(&self, id: &Uuid) -> Result<(), AppError>;
    async fn delete_session_by_token_hash(&self, token_hash: &str) -> Result<(), AppError>;
    async fn delete_sessions_for_user(&self, user_id: &Uuid) -> Result<u64, AppError>;
    async fn delete_expired_sessions(&self) -> Result<u64, AppError>;
}

#[async_trait::async_trait]
impl SessionRepository for PostgresRepository {
    async fn create_session(&self, session: &NewSession) -> Result<Session, AppError> {
        let created = sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions (user_id, token_hash, expires_at, ip_address, user_agent)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, token_hash, expires_at, ip_address, user_agent, created_at
            "#,
        )
        .bind(session.user_id)
        .bind(&session.token_hash)
        .bind(session.expires_at)
        .bind(&session.ip_address)
        .bind(&session.user_agent)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn get_session_by_token_hash(&self, token_hash: &str) -> Result<Option<Session>, AppError> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            SELECT id, user_id, token_hash, expires_at, ip_address, user_agent, created_at
            FROM sessions
            WHERE token_hash = $1
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    async fn get_session_by_id(&self, id: &Uuid) -> Result<Option<Session>, AppError> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            SELECT id, user_id, token_hash, expires_at, ip_address, user_agent, created_at
            FROM sessions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    async fn delete_session(&self, id: &Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM sessions WHERE id = $1").bind(id).execute(&self.pool).await?;

        Ok(())
    }

    async fn delete_session_by_token_hash(&self, token_hash: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM sessions WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn delete_sessions_for_user(&self, user_id: &Uuid) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = $1").bind(user_id).execute(&self.pool).await?;

        Ok(result.rows_affected())
    }

    async fn delete_expired_sessions(&self) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= now()").execute(&self.pool).await?;

        Ok(result.rows_affected())
    }
}
