use crate::auth::AdminUser;
use crate::config::Config;
use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::middleware::rate_limit::RateLimit;
use crate::models::user::{UserActiveRequest, UserResponse};
use crate::service::auth::AuthService;
use crate::service::credentials::CredentialService;
use rocket::serde::json::Json;
use rocket::{State, get, put};
use rocket_okapi::openapi;
use sqlx::PgPool;
use uuid::Uuid;

/// Get any user's account (admin)
#[openapi(tag = "Users")]
#[get("/<id>")]
pub async fn get_user(
    pool: &State<PgPool>,
    credentials: &State<CredentialService>,
    config: &State<Config>,
    _rate_limit: RateLimit,
    _admin: AdminUser,
    id: &str,
) -> Result<Json<UserResponse>, AppError> {
    let uuid = Uuid::parse_str(id)?;
    let repo = PostgresRepository::new(pool);
    let user = AuthService::new(&repo, credentials, &config.auth).get_user(&uuid).await?;
    Ok(Json(UserResponse::from(&user)))
}

/// Activate or deactivate an account (admin); deactivation revokes its sessions
#[openapi(tag = "Users")]
#[put("/<id>/active", data = "<payload>")]
pub async fn put_user_active(
    pool: &State<PgPool>,
    credentials: &State<CredentialService>,
    config: &State<Config>,
    _rate_limit: RateLimit,
    admin: AdminUser,
    id: &str,
    payload: Json<UserActiveRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let uuid = Uuid::parse_str(id)?;
    let repo = PostgresRepository::new(pool);
    let service = AuthService::new(&repo, credentials, &config.auth);
    Ok(Json(service.set_user_active(&admin.0.identity, &uuid, payload.active).await?))
}

pub fn routes() -> (Vec<rocket::Route>, okapi::openapi3::OpenApi) {
    rocket_okapi::openapi_get_routes_spec![get_user, put_user_active]
}
