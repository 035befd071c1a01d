use crate::config::Config;
use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::middleware::rate_limit::AuthRateLimit;
use crate::models::password_reset::{PasswordResetConfirmRequest, PasswordResetRequest, PasswordResetResponse, RESET_REQUESTED_MESSAGE};
use crate::service::auth::AuthService;
use crate::service::credentials::CredentialService;
use crate::service::validation::validate_input;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{State, post};
use rocket_okapi::openapi;
use sqlx::PgPool;

/// Request a password reset token
///
/// The answer is identical whether or not the account exists. Delivering the token is left
/// to an external mailer; in development it is echoed back in the response.
#[openapi(tag = "Password Reset")]
#[post("/request", data = "<payload>")]
pub async fn request_password_reset(
    pool: &State<PgPool>,
    credentials: &State<CredentialService>,
    config: &State<Config>,
    _rate_limit: AuthRateLimit,
    payload: Json<PasswordResetRequest>,
) -> Result<Json<PasswordResetResponse>, AppError> {
    let payload = validate_input(payload.into_inner()).into_result()?;

    let repo = PostgresRepository::new(pool);
    let service = AuthService::new(&repo, credentials, &config.auth);
    let token = match service.request_reset(&payload.email).await {
        Ok(token) => Some(token),
        Err(AppError::NotFound(_)) => None,
        Err(err) => return Err(err),
    };

    Ok(Json(PasswordResetResponse {
        message: RESET_REQUESTED_MESSAGE.to_string(),
        token: token.filter(|_| config.environment.is_development()),
    }))
}

/// Set a new password with a reset token; all sessions of the account are revoked
#[openapi(tag = "Password Reset")]
#[post("/confirm", data = "<payload>")]
pub async fn confirm_password_reset(
    pool: &State<PgPool>,
    credentials: &State<CredentialService>,
    config: &State<Config>,
    _rate_limit: AuthRateLimit,
    payload: Json<PasswordResetConfirmRequest>,
) -> Result<Status, AppError> {
    let payload = validate_input(payload.into_inner()).into_result()?;

    let repo = PostgresRepository::new(pool);
    AuthService::new(&repo, credentials, &config.auth)
        .consume_reset(&payload.token, &payload.new_password)
        .await?;

    Ok(Status::NoContent)
}

pub fn routes() -> (Vec<rocket::Route>, okapi::openapi3::OpenApi) {
    rocket_okapi::openapi_get_routes_spec![request_password_reset, confirm_password_reset]
}
