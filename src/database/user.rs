use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::user::{NewUser, ProfileUpdate, User};
use uuid::Uuid;

const USER_COLUMNS: &str = "id, email, username, password_hash, role, is_active, email_verified, name, bio, avatar, created_at, updated_at";

#[async_trait::async_trait]
pub trait UserRepository: Send + Sync {
    async fn create_user(&self, user: &NewUser) -> Result<User, AppError>;
    async fn get_user_by_id(&self, id: &Uuid) -> Result<Option<User>, AppError>;
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, AppError>;
    async fn update_profile(&self, id: &Uuid, profile: &ProfileUpdate) -> Result<User, AppError>;
    async fn update_password(&self, id: &Uuid, password_hash: &str) -> Result<(), AppError>;
    async fn set_user_active(&self, id: &Uuid, active: bool) -> Result<User, AppError>;
    /// Insert or refresh an account keyed by email; used by the bootstrap task.
    async fn upsert_user(&self, user: &NewUser) -> Result<User, AppError>;
}

#[async_trait::async_trait]
impl UserRepository for PostgresRepository {
    async fn create_user(&self, user: &NewUser) -> Result<User, AppError> {
        let query = format!(
            r#"
            INSERT INTO users (email, username, password_hash, role, email_verified, name, bio)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {USER_COLUMNS}
            "#
        );
        let created = sqlx::query_as::<_, User>(&query)
            .bind(&user.email)
            .bind(&user.username)
            .bind(&user.password_hash)
            .bind(user.role)
            .bind(user.email_verified)
            .bind(&user.name)
            .bind(&user.bio)
            .fetch_one(&self.pool)
            .await?;

        Ok(created)
    }

    async fn get_user_by_id(&self, id: &Uuid) -> Result<Option<User>, AppError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&query).bind(id).fetch_optional(&self.pool).await?;

        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER($1)");
        let user = sqlx::query_as::<_, User>(&query).bind(email).fetch_optional(&self.pool).await?;

        Ok(user)
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE LOWER(username) = LOWER($1)");
        let user = sqlx::query_as::<_, User>(&query).bind(username).fetch_optional(&self.pool).await?;

        Ok(user)
    }

    async fn update_profile(&self, id: &Uuid, profile: &ProfileUpdate) -> Result<User, AppError> {
        let query = format!(
            r#"
            UPDATE users
            SET name = $2, bio = $3, avatar = $4, updated_at = now()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(&profile.name)
            .bind(&profile.bio)
            .bind(&profile.avatar)
            .fetch_one(&self.pool)
            .await?;

        Ok(user)
    }

    async fn update_password(&self, id: &Uuid, password_hash: &str) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE users SET password_hash = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("User not found".to_string()));
        }
        Ok(())
    }

    async fn set_user_active(&self, id: &Uuid, active: bool) -> Result<User, AppError> {
        let query = format!("UPDATE users SET is_active = $2, updated_at = now() WHERE id = $1 RETURNING {USER_COLUMNS}");
        let user = sqlx::query_as::<_, User>(&query).bind(id).bind(active).fetch_one(&self.pool).await?;

        Ok(user)
    }

    async fn upsert_user(&self, user: &NewUser) -> Result<User, AppError> {
        let query = format!(
            r#"
            INSERT INTO users (email, username, password_hash, role, email_verified, name, bio)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (email) DO UPDATE
            SET password_hash = EXCLUDED.password_hash,
                role = EXCLUDED.role,
                email_verified = EXCLUDED.email_verified,
                is_active = TRUE,
                updated_at = now()
            RETURNING {USER_COLUMNS}
            "#
        );
        let upserted = sqlx::query_as::<_, User>(&query)
            .bind(&user.email)
            .bind(&user.username)
            .bind(&user.password_hash)
            .bind(user.role)
            .bind(user.email_verified)
            .bind(&user.name)
            .bind(&user.bio)
            .fetch_one(&self.pool)
            .await?;

        Ok(upserted)
    }
}
