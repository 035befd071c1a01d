mod auth;
mod config;
mod database;
mod db;
mod error;
pub mod maintenance;
mod middleware;
mod models;
mod routes;
mod service;

#[cfg(test)]
pub mod test_utils;

pub use config::Config;
pub use error::app_error::AppError;
pub use middleware::rate_limit::{Bucket, RateLimitDecision, RateLimiter};

use crate::db::{stage_db, stage_db_shutdown};
use crate::middleware::RequestLogger;
use crate::middleware::security_headers::SecureHeaders;
use crate::routes as app_routes;
use crate::service::credentials::CredentialService;
use rocket::fairing::AdHoc;
use rocket::{Build, Catcher, Rocket, catchers, http::Method};
use rocket_cors::{AllowedOrigins, CorsOptions};
use rocket_okapi::swagger_ui::{SwaggerUIConfig, make_swagger_ui};
use rocket_okapi::{get_openapi_route, okapi::merge::marge_spec_list};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. `RUST_LOG` overrides the configured level, e.g.
/// `RUST_LOG=info,inkpress::routes=debug`. Repeated calls are ignored.
pub fn init_tracing(log_level: &str, json_format: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_line_number(true);

    let _ = if json_format {
        subscriber.json().try_init()
    } else {
        subscriber.try_init()
    };
}

fn ensure_rocket_secret_key(config: &Config) -> Result<(), AppError> {
    if !config.environment.is_development() && std::env::var("ROCKET_SECRET_KEY").is_err() {
        return Err(AppError::InvalidConfiguration(
            "ROCKET_SECRET_KEY is required outside development. Generate one with: openssl rand -base64 32".to_string(),
        ));
    }
    Ok(())
}

fn build_cors(cors_config: &config::CorsConfig) -> Result<CorsOptions, AppError> {
    let is_wildcard = cors_config.allowed_origins.len() == 1 && cors_config.allowed_origins[0] == "*";

    if is_wildcard && cors_config.allow_credentials {
        return Err(AppError::InvalidConfiguration(
            "Cannot use wildcard origins (*) with credentials enabled. Either set specific origins or disable credentials."
                .to_string(),
        ));
    }

    let allowed_origins = if cors_config.allowed_origins.is_empty() {
        AllowedOrigins::some_exact::<&str>(&[])
    } else if is_wildcard {
        AllowedOrigins::all()
    } else {
        AllowedOrigins::some_exact(&cors_config.allowed_origins.iter().map(String::as_str).collect::<Vec<_>>())
    };

    Ok(CorsOptions {
        allowed_origins,
        allowed_methods: vec![Method::Get, Method::Post, Method::Put, Method::Delete, Method::Options, Method::Head]
            .into_iter()
            .map(From::from)
            .collect(),
        allowed_headers: rocket_cors::AllowedHeaders::some(&["Content-Type", "Authorization", "Accept"]),
        allow_credentials: cors_config.allow_credentials,
        expose_headers: [middleware::REQUEST_ID_HEADER.to_string(), "Retry-After".to_string()].into(),
        ..Default::default()
    })
}

fn get_swagger_config(openapi_url: &str) -> SwaggerUIConfig {
    SwaggerUIConfig {
        url: openapi_url.to_string(),
        ..Default::default()
    }
}

fn normalize_base_path(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return config::DEFAULT_API_BASE_PATH.to_string();
    }

    let mut normalized = if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    };

    while normalized.ends_with('/') && normalized.len() > 1 {
        normalized.pop();
    }

    normalized
}

fn join_base_path(base_path: &str, path: &str) -> String {
    let base = base_path.trim_end_matches('/');
    let suffix = path.trim_start_matches('/');

    if base.is_empty() {
        format!("/{}", suffix)
    } else {
        format!("{}/{}", base, suffix)
    }
}

fn collect_base_paths(api_config: &config::ApiConfig) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::new();
    let mut push_unique = |path: String| {
        if !normalized.contains(&path) {
            normalized.push(path);
        }
    };

    push_unique(normalize_base_path(&api_config.base_path));

    for extra in &api_config.additional_base_paths {
        push_unique(normalize_base_path(extra));
    }

    normalized
}

struct RouteSpec {
    path: &'static str,
    routes: Vec<rocket::Route>,
    openapi: rocket_okapi::okapi::openapi3::OpenApi,
}

fn collect_route_specs() -> Vec<RouteSpec> {
    let specs = [
        ("/auth", app_routes::auth::routes()),
        ("/password-reset", app_routes::password_reset::routes()),
        ("/users", app_routes::user::routes()),
        ("/posts", app_routes::post::routes()),
        ("/comments", app_routes::comment::routes()),
        ("/tags", app_routes::taxonomy::tag_routes()),
        ("/categories", app_routes::taxonomy::category_routes()),
        ("/settings", app_routes::settings::routes()),
    ];

    specs
        .into_iter()
        .map(|(path, (routes, openapi))| RouteSpec { path, routes, openapi })
        .collect()
}

fn api_catchers() -> Vec<Catcher> {
    catchers![
        app_routes::error::bad_request,
        app_routes::error::unauthorized,
        app_routes::error::forbidden,
        app_routes::error::not_found,
        app_routes::error::conflict,
        app_routes::error::unprocessable_entity,
        app_routes::error::too_many_requests,
        app_routes::error::internal_error,
    ]
}

fn mount_api_routes(mut rocket: Rocket<Build>, base_path: &str, enable_swagger: bool) -> Result<Rocket<Build>, AppError> {
    let route_specs = collect_route_specs();

    rocket = rocket.mount(join_base_path(base_path, "health"), app_routes::health::routes());

    if enable_swagger {
        let mut openapi_list = Vec::new();
        for spec in route_specs {
            rocket = rocket.mount(format!("{}{}", base_path, spec.path), spec.routes);
            openapi_list.push((spec.path, spec.openapi));
        }

        let openapi_docs = marge_spec_list(&openapi_list)
            .map_err(|err| AppError::InvalidConfiguration(format!("Could not merge OpenAPI spec: {}", err)))?;

        let settings = rocket_okapi::settings::OpenApiSettings::default();
        rocket = rocket.mount(base_path, vec![get_openapi_route(openapi_docs, &settings)]);

        let docs_path = join_base_path(base_path, "docs");
        let openapi_url = join_base_path(base_path, "openapi.json");
        rocket = rocket.mount(docs_path, make_swagger_ui(&get_swagger_config(&openapi_url)));
    } else {
        for spec in route_specs {
            rocket = rocket.mount(format!("{}{}", base_path, spec.path), spec.routes);
        }
    }

    Ok(rocket.register(base_path, api_catchers()))
}

fn stage_rate_limiter(rate_limit_config: config::RateLimitConfig) -> AdHoc {
    AdHoc::on_ignite("Rate Limiter", move |rocket| {
        let limiter = Arc::new(RateLimiter::new(rate_limit_config));
        limiter.clone().spawn_sweeper();

        Box::pin(async move { rocket.manage(limiter) })
    })
}

/// Assembles the application from a loaded configuration. Invalid configuration is
/// reported before anything is attached.
pub fn build_rocket(config: Config) -> Result<Rocket<Build>, AppError> {
    init_tracing(&config.logging.level, config.logging.json_format);
    config.validate()?;
    ensure_rocket_secret_key(&config)?;

    let cors = build_cors(&config.cors)?
        .to_cors()
        .map_err(|err| AppError::InvalidConfiguration(format!("Failed to create CORS fairing: {}", err)))?;
    let credentials = CredentialService::new(&config.auth)?;
    let base_paths = collect_base_paths(&config.api);

    let figment = rocket::Config::figment()
        .merge(("port", config.server.port))
        .merge(("address", config.server.address.clone()));

    let mut rocket = rocket::custom(figment)
        .attach(stage_rate_limiter(config.rate_limit.clone()))
        .attach(cors)
        .attach(RequestLogger)
        .attach(SecureHeaders::new())
        .attach(stage_db(config.database.clone(), config.logging.clone(), config.environment.is_development()))
        .attach(stage_db_shutdown())
        .manage(credentials);

    for base_path in &base_paths {
        rocket = mount_api_routes(rocket, base_path, config.api.enable_swagger)?;
    }

    tracing::info!(environment = ?config.environment, base_paths = ?base_paths, "application assembled");
    Ok(rocket.manage(config))
}
