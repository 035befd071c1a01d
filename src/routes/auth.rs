use crate::auth::{CurrentUser, SESSION_COOKIE};
use crate::config::Config;
use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::middleware::rate_limit::{AuthRateLimit, RateLimit};
use crate::models::session::{AuthResponse, AuthSession, ClientMetadata, TokenVerifyRequest, TokenVerifyResponse};
use crate::models::user::{LoginRequest, PasswordChangeRequest, PasswordStrengthRequest, ProfileRequest, RegisterRequest, UserResponse};
use crate::service::auth::AuthService;
use crate::service::credentials::{CredentialService, PasswordStrength, check_password_strength};
use crate::service::validation::validate_input;
use rocket::http::{Cookie, CookieJar, SameSite, Status};
use rocket::response::status;
use rocket::serde::json::Json;
use rocket::{State, get, post, put};
use rocket_okapi::openapi;
use sqlx::PgPool;

fn session_cookie(token: String, config: &Config) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.auth.cookie_secure)
        .max_age(rocket::time::Duration::seconds(config.auth.session_ttl_seconds))
        .build()
}

fn start_cookie_session(cookies: &CookieJar<'_>, config: &Config, session: &AuthSession) -> Json<AuthResponse> {
    cookies.add_private(session_cookie(session.session_token.clone(), config));
    Json(AuthResponse::from(session))
}

/// Create an account and start a session
#[openapi(tag = "Auth")]
#[post("/register", data = "<payload>")]
pub async fn register(
    pool: &State<PgPool>,
    credentials: &State<CredentialService>,
    config: &State<Config>,
    cookies: &CookieJar<'_>,
    _rate_limit: AuthRateLimit,
    client: ClientMetadata,
    payload: Json<RegisterRequest>,
) -> Result<status::Created<Json<AuthResponse>>, AppError> {
    let payload = validate_input(payload.into_inner()).into_result()?;

    let repo = PostgresRepository::new(pool);
    let service = AuthService::new(&repo, credentials, &config.auth);
    let session = service.register(&payload, &client).await?;

    Ok(status::Created::new("/auth/me").body(start_cookie_session(cookies, config, &session)))
}

/// Log in with email and password
#[openapi(tag = "Auth")]
#[post("/login", data = "<payload>")]
pub async fn login(
    pool: &State<PgPool>,
    credentials: &State<CredentialService>,
    config: &State<Config>,
    cookies: &CookieJar<'_>,
    _rate_limit: AuthRateLimit,
    client: ClientMetadata,
    payload: Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let payload = validate_input(payload.into_inner()).into_result()?;

    let repo = PostgresRepository::new(pool);
    let service = AuthService::new(&repo, credentials, &config.auth);
    let session = match service.login(&payload.email, &payload.password, &client).await {
        Ok(session) => session,
        Err(AppError::NotFound(_)) => return Err(AppError::BadCredential),
        Err(err) => return Err(err),
    };

    Ok(start_cookie_session(cookies, config, &session))
}

/// End the current cookie session
#[openapi(tag = "Auth")]
#[post("/logout")]
pub async fn logout(
    pool: &State<PgPool>,
    credentials: &State<CredentialService>,
    config: &State<Config>,
    cookies: &CookieJar<'_>,
    _rate_limit: RateLimit,
    current_user: CurrentUser,
) -> Result<Status, AppError> {
    if let Some(token) = current_user.session_token.as_deref() {
        let repo = PostgresRepository::new(pool);
        AuthService::new(&repo, credentials, &config.auth).logout(token).await?;
    }
    cookies.remove_private(Cookie::build(SESSION_COOKIE).path("/").build());

    Ok(Status::NoContent)
}

/// Get the authenticated user's profile
#[openapi(tag = "Auth")]
#[get("/me")]
pub async fn get_me(
    pool: &State<PgPool>,
    credentials: &State<CredentialService>,
    config: &State<Config>,
    _rate_limit: RateLimit,
    current_user: CurrentUser,
) -> Result<Json<UserResponse>, AppError> {
    let repo = PostgresRepository::new(pool);
    let user = AuthService::new(&repo, credentials, &config.auth).get_user(&current_user.identity.id).await?;
    Ok(Json(UserResponse::from(&user)))
}

/// Update name, bio and avatar
#[openapi(tag = "Auth")]
#[put("/me", data = "<payload>")]
pub async fn put_me(
    pool: &State<PgPool>,
    credentials: &State<CredentialService>,
    config: &State<Config>,
    _rate_limit: RateLimit,
    current_user: CurrentUser,
    payload: Json<ProfileRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let payload = validate_input(payload.into_inner()).into_result()?;

    let repo = PostgresRepository::new(pool);
    let service = AuthService::new(&repo, credentials, &config.auth);
    Ok(Json(service.update_profile(&current_user.identity.id, &payload).await?))
}

/// Change password; requires the current password
#[openapi(tag = "Auth")]
#[put("/me/password", data = "<payload>")]
pub async fn put_password(
    pool: &State<PgPool>,
    credentials: &State<CredentialService>,
    config: &State<Config>,
    _rate_limit: AuthRateLimit,
    current_user: CurrentUser,
    payload: Json<PasswordChangeRequest>,
) -> Result<Status, AppError> {
    let payload = validate_input(payload.into_inner()).into_result()?;

    let repo = PostgresRepository::new(pool);
    AuthService::new(&repo, credentials, &config.auth)
        .change_password(&current_user.identity.id, &payload.current_password, &payload.new_password)
        .await?;

    Ok(Status::NoContent)
}

/// Check a signed identity token without touching the database
#[openapi(tag = "Auth")]
#[post("/token/verify", data = "<payload>")]
pub async fn verify_token(credentials: &State<CredentialService>, _rate_limit: RateLimit, payload: Json<TokenVerifyRequest>) -> Json<TokenVerifyResponse> {
    let identity = credentials.validate_token(&payload.token);
    Json(TokenVerifyResponse {
        valid: identity.is_some(),
        identity,
    })
}

/// Report which password rules a candidate password violates
#[openapi(tag = "Auth")]
#[post("/password-strength", data = "<payload>")]
pub async fn password_strength(_rate_limit: RateLimit, payload: Json<PasswordStrengthRequest>) -> Json<PasswordStrength> {
    Json(check_password_strength(&payload.password))
}

pub fn routes() -> (Vec<rocket::Route>, okapi::openapi3::OpenApi) {
    rocket_okapi::openapi_get_routes_spec![register, login, logout, get_me, put_me, put_password, verify_token, password_strength]
}
