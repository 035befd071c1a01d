use crate::auth::CurrentUser;
use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::middleware::rate_limit::RateLimit;
use crate::models::settings::{SettingRequest, SettingResponse};
use crate::service::content::ContentService;
use crate::service::validation::validate_input;
use rocket::serde::json::Json;
use rocket::{State, get, put};
use rocket_okapi::openapi;
use sqlx::PgPool;

/// List site settings
#[openapi(tag = "Settings")]
#[get("/")]
pub async fn list_settings(pool: &State<PgPool>, _rate_limit: RateLimit) -> Result<Json<Vec<SettingResponse>>, AppError> {
    let repo = PostgresRepository::new(pool);
    let settings = ContentService::new(&repo).list_settings().await?;
    Ok(Json(settings.iter().map(SettingResponse::from).collect()))
}

#[openapi(tag = "Settings")]
#[get("/<key>")]
pub async fn get_setting(pool: &State<PgPool>, _rate_limit: RateLimit, key: &str) -> Result<Json<SettingResponse>, AppError> {
    let repo = PostgresRepository::new(pool);
    let setting = ContentService::new(&repo).get_setting(key).await?;
    Ok(Json(SettingResponse::from(&setting)))
}

/// Create or replace a setting (admin); the value must parse as the declared type
#[openapi(tag = "Settings")]
#[put("/<key>", data = "<payload>")]
pub async fn put_setting(
    pool: &State<PgPool>,
    _rate_limit: RateLimit,
    current_user: CurrentUser,
    key: &str,
    payload: Json<SettingRequest>,
) -> Result<Json<SettingResponse>, AppError> {
    let payload = validate_input(payload.into_inner()).into_result()?;

    let repo = PostgresRepository::new(pool);
    let setting = ContentService::new(&repo).set_setting(&current_user.identity, key, &payload).await?;
    Ok(Json(SettingResponse::from(&setting)))
}

pub fn routes() -> (Vec<rocket::Route>, okapi::openapi3::OpenApi) {
    rocket_okapi::openapi_get_routes_spec![list_settings, get_setting, put_setting]
}
