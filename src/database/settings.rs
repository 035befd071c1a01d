use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::settings::{Setting, SettingType};

#[async_trait::async_trait]
pub trait SettingRepository: Send + Sync {
    async fn list_settings(&self) -> Result<Vec<Setting>, AppError>;
    async fn get_setting(&self, key: &str) -> Result<Option<Setting>, AppError>;
    async fn upsert_setting(&self, key: &str, value: &str, setting_type: SettingType) -> Result<Setting, AppError>;
    /// Inserts only when the key is absent; existing values win.
    async fn seed_setting(&self, key: &str, value: &str, setting_type: SettingType) -> Result<(), AppError>;
}

#[async_trait::async_trait]
impl SettingRepository for PostgresRepository {
    async fn list_settings(&self) -> Result<Vec<Setting>, AppError> {
        let settings = sqlx::query_as::<_, Setting>("SELECT key, value, setting_type FROM settings ORDER BY key ASC")
            .fetch_all(&self.pool)
            .await?;

        Ok(settings)
    }

    async fn get_setting(&self, key: &str) -> Result<Option<Setting>, AppError> {
        let setting = sqlx::query_as::<_, Setting>("SELECT key, value, setting_type FROM settings WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(setting)
    }

    async fn upsert_setting(&self, key: &str, value: &str, setting_type: SettingType) -> Result<Setting, AppError> {
        let setting = sqlx::query_as::<_, Setting>(
            r#"
            INSERT INTO settings (key, value, setting_type)
            VALUES ($1, $2, $3)
            ON CONFLICT (key) DO UPDATE
            SET value = EXCLUDED.value, setting_type = EXCLUDED.setting_type, updated_at = now()
            RETURNING key, value, setting_type
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(setting_type.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(setting)
    }

    async fn seed_setting(&self, key: &str, value: &str, setting_type: SettingType) -> Result<(), AppError> {
        sqlx::query("INSERT INTO settings (key, value, setting_type) VALUES ($1, $2, $3) ON CONFLICT (key) DO NOTHING")
            .bind(key)
            .bind(value)
            .bind(setting_type.as_str())
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
