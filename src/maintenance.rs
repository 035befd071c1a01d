use crate::Config;
use crate::config::DEFAULT_ADMIN_PASSWORD;
use crate::database::password_reset::PasswordResetRepository;
use crate::database::postgres_repository::PostgresRepository;
use crate::database::session::SessionRepository;
use crate::database::settings::SettingRepository;
use crate::database::taxonomy::TaxonomyRepository;
use crate::database::user::UserRepository;
use crate::db::{init_pool, run_migrations};
use crate::error::app_error::AppError;
use crate::models::settings::DEFAULT_SETTINGS;
use crate::models::taxonomy::{NewTerm, Taxonomy};
use crate::models::user::{NewUser, Role};
use crate::service::auth::normalize_email;
use crate::service::credentials::{CredentialService, check_password_strength};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

const DEFAULT_TAGS: &[(&str, &str, &str)] = &[
    ("Technology", "technology", "Posts about technology and programming"),
    ("Web Development", "web-development", "Posts about web development"),
    ("Tutorial", "tutorial", "Tutorial posts"),
    ("News", "news", "News and updates"),
];

const DEFAULT_CATEGORIES: &[(&str, &str, &str)] = &[
    ("Programming", "programming", "Programming related content"),
    ("Design", "design", "Design related content"),
    ("Tutorials", "tutorials", "Step-by-step tutorials"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupResult {
    pub sessions_deleted: u64,
    pub resets_deleted: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapResult {
    pub admin_id: Uuid,
    pub tags: usize,
    pub categories: usize,
    pub settings: usize,
}

/// Deletes expired sessions and expired or consumed reset tokens.
pub async fn cleanup<R>(repository: &R) -> Result<CleanupResult, AppError>
where
    R: SessionRepository + PasswordResetRepository,
{
    let sessions_deleted = repository.delete_expired_sessions().await?;
    let resets_deleted = repository.delete_expired_password_resets().await?;
    info!(sessions_deleted, resets_deleted, "expired credentials removed");

    Ok(CleanupResult {
        sessions_deleted,
        resets_deleted,
    })
}

/// Upserts the configured administrator and seeds default taxonomy and settings.
/// Existing terms and settings are left untouched.
pub async fn bootstrap<R>(repository: &R, credentials: &CredentialService, config: &Config) -> Result<BootstrapResult, AppError>
where
    R: UserRepository + TaxonomyRepository + SettingRepository,
{
    let admin = &config.admin;
    if !config.environment.is_development() && admin.password == DEFAULT_ADMIN_PASSWORD {
        return Err(AppError::InvalidConfiguration(
            "admin.password must be changed from the default outside development".to_string(),
        ));
    }
    if !config.environment.is_development() && !check_password_strength(&admin.password).valid {
        return Err(AppError::InvalidConfiguration("admin.password does not meet the password policy".to_string()));
    }

    let password_hash = credentials.hash_password(&admin.password).await?;
    let user = repository
        .upsert_user(&NewUser {
            email: normalize_email(&admin.email),
            username: admin.username.trim().to_string(),
            password_hash,
            role: Role::Admin,
            email_verified: true,
            name: Some("Administrator".to_string()),
            bio: None,
        })
        .await?;
    info!(security_event = "admin_bootstrapped", user_id = %user.id, "administrator account ensured");

    for (taxonomy, defaults) in [(Taxonomy::Tag, DEFAULT_TAGS), (Taxonomy::Category, DEFAULT_CATEGORIES)] {
        for (name, slug, description) in defaults {
            let term = NewTerm {
                name: name.to_string(),
                slug: slug.to_string(),
                description: Some(description.to_string()),
            };
            repository.upsert_term(taxonomy, &term).await?;
        }
    }

    for (key, value, setting_type) in DEFAULT_SETTINGS {
        repository.seed_setting(key, value, *setting_type).await?;
    }

    Ok(BootstrapResult {
        admin_id: user.id,
        tags: DEFAULT_TAGS.len(),
        categories: DEFAULT_CATEGORIES.len(),
        settings: DEFAULT_SETTINGS.len(),
    })
}

async fn connect(config: &Config) -> Result<PgPool, AppError> {
    let pool = init_pool(&config.database, &config.logging, false).await?;
    if config.database.run_migrations {
        run_migrations(&pool).await?;
    }
    Ok(pool)
}

pub async fn run_cleanup(config: &Config) -> Result<CleanupResult, AppError> {
    let pool = connect(config).await?;
    let result = cleanup(&PostgresRepository::new(&pool)).await;
    pool.close().await;
    result
}

pub async fn run_bootstrap(config: &Config) -> Result<BootstrapResult, AppError> {
    let credentials = CredentialService::new(&config.auth)?;
    let pool = connect(config).await?;
    let result = bootstrap(&PostgresRepository::new(&pool), &credentials, config).await;
    pool.close().await;
    result
}
