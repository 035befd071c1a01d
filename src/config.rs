use crate::error::app_error::AppError;
use rocket::figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_API_BASE_PATH: &str = "/api/v1";
pub const DEFAULT_TOKEN_SECRET: &str = "change-me-in-production";
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

const MIN_TOKEN_SECRET_LEN: usize = 32;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Test,
    Production,
}

impl Environment {
    pub fn is_development(self) -> bool {
        matches!(self, Environment::Development)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub cors: CorsConfig,
    pub api: ApiConfig,
    pub rate_limit: RateLimitConfig,
    pub auth: AuthConfig,
    pub admin: AdminConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: u64,
    pub run_migrations: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub address: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub json_format: bool,
    pub slow_query_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ApiConfig {
    pub base_path: String,
    pub additional_base_paths: Vec<String>,
    pub enable_swagger: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RateLimitConfig {
    pub read_limit: u32,
    pub mutation_limit: u32,
    pub auth_limit: u32,
    pub window_ms: u64,
    pub cleanup_interval_seconds: u64,
    pub require_client_ip: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AuthConfig {
    pub token_secret: String,
    pub token_ttl_seconds: i64,
    pub session_ttl_seconds: i64,
    pub reset_token_ttl_seconds: i64,
    pub hash_memory_kib: u32,
    pub hash_iterations: u32,
    pub hash_parallelism: u32,
    pub cookie_secure: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AdminConfig {
    pub email: String,
    pub username: String,
    pub password: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/inkpress_db".to_string(),
            max_connections: 16,
            min_connections: 4,
            acquire_timeout: 5,
            run_migrations: true,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            address: "127.0.0.1".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            slow_query_ms: 500,
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["http://localhost:4321".to_string()],
            allow_credentials: true,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_path: DEFAULT_API_BASE_PATH.to_string(),
            additional_base_paths: Vec::new(),
            enable_swagger: true,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            read_limit: 300,
            mutation_limit: 60,
            auth_limit: 10,
            window_ms: 60_000,
            cleanup_interval_seconds: 60,
            require_client_ip: false,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_secret: DEFAULT_TOKEN_SECRET.to_string(),
            token_ttl_seconds: 7 * 24 * 60 * 60,
            session_ttl_seconds: 7 * 24 * 60 * 60,
            reset_token_ttl_seconds: 60 * 60,
            hash_memory_kib: 19 * 1024,
            hash_iterations: 2,
            hash_parallelism: 1,
            cookie_secure: true,
        }
    }
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            email: "admin@example.com".to_string(),
            username: "admin".to_string(),
            password: DEFAULT_ADMIN_PASSWORD.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from multiple sources in priority order:
    /// 1. Built-in defaults
    /// 2. Inkpress.toml (if present)
    /// 3. Environment variables prefixed with INKPRESS_ (sections split on `__`,
    ///    e.g. INKPRESS_AUTH__TOKEN_SECRET)
    /// 4. DATABASE_URL
    pub fn load() -> Result<Self, AppError> {
        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("Inkpress.toml"))
            .merge(Env::prefixed("INKPRESS_").split("__"))
            .merge(Env::raw().only(&["DATABASE_URL"]).map(|_| "database.url".into()));

        let config: Config = figment.extract()?;
        Ok(config)
    }

    /// TTLs are checked in every environment. Secret strength is enforced outside
    /// development; a development run with the default secret only warns.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.auth.session_ttl_seconds <= 0 || self.auth.token_ttl_seconds <= 0 || self.auth.reset_token_ttl_seconds <= 0 {
            return Err(AppError::InvalidConfiguration("auth TTLs must be positive".to_string()));
        }

        let secret = self.auth.token_secret.trim();
        if secret.is_empty() {
            return Err(AppError::InvalidConfiguration("auth.token_secret must not be empty".to_string()));
        }

        if self.environment.is_development() {
            if secret == DEFAULT_TOKEN_SECRET {
                tracing::warn!(
                    security_event = "default_token_secret",
                    "auth.token_secret is the built-in default; set INKPRESS_AUTH__TOKEN_SECRET before deploying"
                );
            }
            return Ok(());
        }

        if secret == DEFAULT_TOKEN_SECRET {
            return Err(AppError::InvalidConfiguration(
                "auth.token_secret must be set to a non-default value outside development".to_string(),
            ));
        }
        if secret.len() < MIN_TOKEN_SECRET_LEN {
            return Err(AppError::InvalidConfiguration(format!(
                "auth.token_secret must be at least {} characters",
                MIN_TOKEN_SECRET_LEN
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn production() -> Config {
        Config {
            environment: Environment::Production,
            ..Config::default()
        }
    }

    #[test]
    fn development_accepts_default_secret() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn development_still_rejects_non_positive_ttls() {
        let adjustments: [fn(&mut AuthConfig); 3] = [
            |auth| auth.session_ttl_seconds = 0,
            |auth| auth.token_ttl_seconds = -1,
            |auth| auth.reset_token_ttl_seconds = 0,
        ];
        for adjust in adjustments {
            let mut config = Config::default();
            adjust(&mut config.auth);
            assert!(matches!(config.validate(), Err(AppError::InvalidConfiguration(_))));
        }
    }

    #[test]
    fn development_rejects_empty_secret() {
        let mut config = Config::default();
        config.auth.token_secret = String::new();
        assert!(matches!(config.validate(), Err(AppError::InvalidConfiguration(_))));
    }

    #[test]
    fn production_rejects_default_secret() {
        let config = production();
        assert!(matches!(config.validate(), Err(AppError::InvalidConfiguration(_))));
    }

    #[test]
    fn production_rejects_empty_secret() {
        let mut config = production();
        config.auth.token_secret = "   ".to_string();
        assert!(matches!(config.validate(), Err(AppError::InvalidConfiguration(_))));
    }

    #[test]
    fn production_rejects_short_secret() {
        let mut config = production();
        config.auth.token_secret = "short-secret".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn production_accepts_strong_secret() {
        let mut config = production();
        config.auth.token_secret = "a".repeat(48);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn defaults_match_token_lifetimes() {
        let auth = AuthConfig::default();
        assert_eq!(auth.token_ttl_seconds, 604_800);
        assert_eq!(auth.session_ttl_seconds, 604_800);
        assert_eq!(auth.reset_token_ttl_seconds, 3_600);
    }

    #[test]
    fn environment_deserializes_lowercase() {
        let env: Environment = serde_json::from_str("\"production\"").unwrap();
        assert_eq!(env, Environment::Production);
    }
}
