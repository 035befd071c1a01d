use crate::config::{DatabaseConfig, LoggingConfig};
use crate::error::app_error::AppError;
use rocket::fairing::AdHoc;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{ConnectOptions, PgPool};
use std::str::FromStr;
use std::time::Duration;

fn connect_options(db_config: &DatabaseConfig, logging: &LoggingConfig, log_statements: bool) -> Result<PgConnectOptions, AppError> {
    let statement_level = if log_statements { log::LevelFilter::Debug } else { log::LevelFilter::Off };

    let options = PgConnectOptions::from_str(&db_config.url)
        .map_err(|e| AppError::db("Invalid database url", e))?
        .log_statements(statement_level)
        .log_slow_statements(log::LevelFilter::Warn, Duration::from_millis(logging.slow_query_ms));

    Ok(options)
}

pub async fn init_pool(db_config: &DatabaseConfig, logging: &LoggingConfig, log_statements: bool) -> Result<PgPool, AppError> {
    let options = connect_options(db_config, logging, log_statements)?;

    let pool = PgPoolOptions::new()
        .max_connections(db_config.max_connections)
        .min_connections(db_config.min_connections)
        .acquire_timeout(Duration::from_secs(db_config.acquire_timeout))
        .idle_timeout(Duration::from_secs(30))
        .max_lifetime(Duration::from_secs(1800))
        .connect_with(options)
        .await?;

    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), AppError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub fn stage_db(db_config: DatabaseConfig, logging: LoggingConfig, log_statements: bool) -> AdHoc {
    AdHoc::try_on_ignite("Postgres (sqlx)", move |rocket| async move {
        let pool = match init_pool(&db_config, &logging, log_statements).await {
            Ok(pool) => pool,
            Err(e) => {
                tracing::error!(error = ?e, "Failed to initialize database pool");
                return Err(rocket);
            }
        };
        tracing::info!("Database pool initialized successfully");

        if db_config.run_migrations {
            if let Err(e) = run_migrations(&pool).await {
                tracing::error!(error = ?e, "Failed to run database migrations");
                return Err(rocket);
            }
            tracing::info!("Database migrations applied");
        }

        Ok(rocket.manage(pool))
    })
}

pub fn stage_db_shutdown() -> AdHoc {
    AdHoc::on_shutdown("Postgres (sqlx) shutdown", |rocket| {
        Box::pin(async move {
            if let Some(pool) = rocket.state::<PgPool>() {
                pool.close().await;
                tracing::info!("Database pool closed");
            }
        })
    })
}
