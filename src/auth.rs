use crate::config::Config;
use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::session::Identity;
use crate::models::user::Role;
use crate::service::auth::{AuthService, Credential};
use crate::service::credentials::CredentialService;
use rocket::http::Status;
use rocket::outcome::Outcome;
use rocket::request::{FromRequest, Outcome as RequestOutcome, Request};
use rocket_okapi::r#gen::OpenApiGenerator;
use rocket_okapi::okapi::openapi3::{Object, RefOr, Response, Responses, SecurityRequirement, SecurityScheme, SecuritySchemeData};
use rocket_okapi::request::{OpenApiFromRequest, RequestHeaderInput};
use sqlx::PgPool;

/// Name of the private cookie carrying the opaque session token.
pub const SESSION_COOKIE: &str = "session";

/// Authenticated caller. `session_token` is set whenever the request carried a
/// session cookie.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub identity: Identity,
    pub session_token: Option<String>,
}

/// Caller holding the ADMIN role.
#[derive(Debug, Clone)]
pub struct AdminUser(pub CurrentUser);

/// Caller that may or may not be authenticated.
#[derive(Debug, Clone)]
pub struct OptionalUser(pub Option<CurrentUser>);

impl OptionalUser {
    pub fn identity(&self) -> Option<&Identity> {
        self.0.as_ref().map(|user| &user.identity)
    }
}

/// Authentication result for one request, computed once and shared by every
/// guard and by the error responder.
#[derive(Debug, Clone)]
pub(crate) enum AuthState {
    Anonymous,
    Authenticated(CurrentUser),
    Failed(String),
}

impl AuthState {
    pub(crate) fn user(&self) -> Option<&CurrentUser> {
        match self {
            AuthState::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    fn from_result(result: Result<Option<CurrentUser>, AppError>) -> Self {
        match result {
            Ok(Some(user)) => AuthState::Authenticated(user),
            Ok(None) => AuthState::Anonymous,
            Err(err) => {
                tracing::error!(error = ?err, "authentication lookup failed");
                AuthState::Failed(format!("{:?}", err))
            }
        }
    }
}

pub(crate) fn parse_bearer(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() { None } else { Some(token) }
}

/// Resolves the cookie session and bearer token, in that order. `required_role`
/// switches from `require_auth` to `require_role`. A request without credentials
/// never touches the database.
async fn authenticate(req: &Request<'_>, required_role: Option<Role>) -> Result<Option<CurrentUser>, AppError> {
    let session_token = req.cookies().get_private(SESSION_COOKIE).map(|cookie| cookie.value().to_string());
    let bearer = req.headers().get_one("Authorization").and_then(parse_bearer);

    let presented: Vec<Credential<'_>> = session_token
        .as_deref()
        .map(Credential::Session)
        .into_iter()
        .chain(bearer.map(Credential::Bearer))
        .collect();
    if presented.is_empty() {
        return Ok(None);
    }

    let rocket = req.rocket();
    let (Some(pool), Some(credentials), Some(config)) = (rocket.state::<PgPool>(), rocket.state::<CredentialService>(), rocket.state::<Config>())
    else {
        return Err(AppError::InvalidConfiguration("authentication state not managed".to_string()));
    };
    let repository = PostgresRepository::new(pool);
    let service = AuthService::new(&repository, credentials, &config.auth);

    let resolved = match required_role {
        Some(role) => service.require_role(&presented, role).await,
        None => service.require_auth(&presented).await,
    };

    match resolved {
        Ok(identity) => Ok(Some(CurrentUser {
            identity,
            session_token: session_token.clone(),
        })),
        Err(AppError::Unauthenticated) => Ok(None),
        Err(err) => Err(err),
    }
}

fn rejection(state: &AuthState) -> (Status, AppError) {
    match state {
        AuthState::Failed(message) => (Status::InternalServerError, AppError::Internal(message.clone())),
        _ => (Status::Unauthorized, AppError::Unauthenticated),
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for CurrentUser {
    type Error = AppError;

    async fn from_request(req: &'r Request<'_>) -> RequestOutcome<Self, Self::Error> {
        let state = req
            .local_cache_async(async { AuthState::from_result(authenticate(req, None).await) })
            .await;

        match state.user() {
            Some(user) => Outcome::Success(user.clone()),
            None => Outcome::Error(rejection(state)),
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AdminUser {
    type Error = AppError;

    async fn from_request(req: &'r Request<'_>) -> RequestOutcome<Self, Self::Error> {
        match authenticate(req, Some(Role::Admin)).await {
            Ok(Some(user)) => {
                req.local_cache(|| AuthState::Authenticated(user.clone()));
                Outcome::Success(AdminUser(user))
            }
            Ok(None) => Outcome::Error((Status::Unauthorized, AppError::Unauthenticated)),
            Err(AppError::Forbidden) => {
                tracing::warn!(security_event = "admin_denied", uri = %req.uri(), "admin route denied");
                Outcome::Error((Status::Forbidden, AppError::Forbidden))
            }
            Err(err) => {
                tracing::error!(error = ?err, "authentication lookup failed");
                Outcome::Error((Status::from(&err), err))
            }
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for OptionalUser {
    type Error = AppError;

    async fn from_request(req: &'r Request<'_>) -> RequestOutcome<Self, Self::Error> {
        match req.guard::<CurrentUser>().await {
            Outcome::Success(user) => Outcome::Success(OptionalUser(Some(user))),
            Outcome::Error((status, err)) if status.class().is_server_error() => Outcome::Error((status, err)),
            _ => Outcome::Success(OptionalUser(None)),
        }
    }
}

fn security_input(required: bool) -> RequestHeaderInput {
    let security_scheme = SecurityScheme {
        description: Some(
            "Session cookie set by POST /auth/login, or `Authorization: Bearer <token>` with the token from the login response."
                .to_string(),
        ),
        data: SecuritySchemeData::ApiKey {
            name: SESSION_COOKIE.to_string(),
            location: "cookie".to_string(),
        },
        extensions: Object::default(),
    };

    let mut security_req = SecurityRequirement::new();
    if required {
        security_req.insert("cookieAuth".to_string(), Vec::new());
    }

    RequestHeaderInput::Security("cookieAuth".to_string(), security_scheme, security_req)
}

fn auth_responses(codes: &[(&str, &str)]) -> rocket_okapi::Result<Responses> {
    let mut responses = Responses::default();
    for (code, description) in codes {
        responses.responses.insert(
            code.to_string(),
            RefOr::Object(Response {
                description: description.to_string(),
                ..Default::default()
            }),
        );
    }
    Ok(responses)
}

impl<'a> OpenApiFromRequest<'a> for CurrentUser {
    fn from_request_input(_gen: &mut OpenApiGenerator, _name: String, _required: bool) -> rocket_okapi::Result<RequestHeaderInput> {
        Ok(security_input(true))
    }

    fn get_responses(_gen: &mut OpenApiGenerator) -> rocket_okapi::Result<Responses> {
        auth_responses(&[("401", "Unauthorized - Authentication required")])
    }
}

impl<'a> OpenApiFromRequest<'a> for AdminUser {
    fn from_request_input(_gen: &mut OpenApiGenerator, _name: String, _required: bool) -> rocket_okapi::Result<RequestHeaderInput> {
        Ok(security_input(true))
    }

    fn get_responses(_gen: &mut OpenApiGenerator) -> rocket_okapi::Result<Responses> {
        auth_responses(&[("401", "Unauthorized - Authentication required"), ("403", "Forbidden - Administrator role required")])
    }
}

impl<'a> OpenApiFromRequest<'a> for OptionalUser {
    fn from_request_input(_gen: &mut OpenApiGenerator, _name: String, _required: bool) -> rocket_okapi::Result<RequestHeaderInput> {
        Ok(security_input(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{test_auth_config, test_credentials};
    use rocket::http::Header;
    use rocket::local::asynchronous::Client;
    use rocket::{get, routes};
    use uuid::Uuid;

    #[get("/me")]
    fn me(user: CurrentUser) -> String {
        user.identity.username
    }

    #[get("/admin")]
    fn admin(user: AdminUser) -> String {
        user.0.identity.username
    }

    #[get("/maybe")]
    fn maybe(user: OptionalUser) -> String {
        user.identity().map(|identity| identity.username.clone()).unwrap_or_else(|| "anonymous".to_string())
    }

    #[get("/twice")]
    fn twice(first: Option<CurrentUser>, second: CurrentUser) -> String {
        format!("{} {}", first.is_some(), second.identity.username)
    }

    async fn client() -> Client {
        let config = Config {
            auth: test_auth_config(),
            ..Config::default()
        };
        let rocket = rocket::build()
            .manage(test_credentials())
            .manage(config)
            .mount("/", routes![me, admin, maybe, twice]);
        Client::tracked(rocket).await.expect("valid rocket instance")
    }

    fn bearer() -> Header<'static> {
        let identity = Identity {
            id: Uuid::new_v4(),
            email: "writer@example.com".to_string(),
            username: "writer".to_string(),
            role: Role::Admin,
            name: None,
        };
        let token = test_credentials().issue_token(&identity, Uuid::new_v4()).unwrap();
        Header::new("Authorization", format!("Bearer {}", token))
    }

    #[test]
    fn parse_bearer_accepts_case_insensitive_scheme() {
        assert_eq!(parse_bearer("Bearer abc"), Some("abc"));
        assert_eq!(parse_bearer("bearer  abc "), Some("abc"));
    }

    #[test]
    fn parse_bearer_rejects_other_schemes() {
        assert_eq!(parse_bearer("Basic abc"), None);
        assert_eq!(parse_bearer("Bearer"), None);
        assert_eq!(parse_bearer("Bearer   "), None);
    }

    #[rocket::async_test]
    async fn missing_credentials_are_unauthorized() {
        let client = client().await;
        assert_eq!(client.get("/me").dispatch().await.status(), Status::Unauthorized);
        assert_eq!(client.get("/admin").dispatch().await.status(), Status::Unauthorized);

        let basic = client.get("/me").header(Header::new("Authorization", "Basic abc")).dispatch().await;
        assert_eq!(basic.status(), Status::Unauthorized);
    }

    #[rocket::async_test]
    async fn optional_user_falls_back_to_anonymous() {
        let client = client().await;
        let anonymous = client.get("/maybe").dispatch().await;
        assert_eq!(anonymous.status(), Status::Ok);
        assert_eq!(anonymous.into_string().await.unwrap(), "anonymous");
    }

    #[rocket::async_test]
    async fn bearer_token_is_checked_against_stored_session() {
        let client = client().await;
        assert_eq!(client.get("/me").header(bearer()).dispatch().await.status(), Status::InternalServerError);
        assert_eq!(client.get("/admin").header(bearer()).dispatch().await.status(), Status::InternalServerError);
        assert_eq!(client.get("/maybe").header(bearer()).dispatch().await.status(), Status::InternalServerError);
    }

    #[rocket::async_test]
    async fn lookup_failure_is_reported_to_every_guard() {
        let client = client().await;
        let response = client.get("/twice").header(bearer()).dispatch().await;
        assert_eq!(response.status(), Status::InternalServerError);
    }

    #[test]
    fn auth_state_exposes_only_authenticated_user() {
        let user = CurrentUser {
            identity: Identity {
                id: Uuid::new_v4(),
                email: "writer@example.com".to_string(),
                username: "writer".to_string(),
                role: Role::User,
                name: None,
            },
            session_token: None,
        };
        assert!(AuthState::Authenticated(user).user().is_some());
        assert!(AuthState::Anonymous.user().is_none());
        assert!(AuthState::Failed("db down".to_string()).user().is_none());
        assert_eq!(rejection(&AuthState::Anonymous).0, Status::Unauthorized);
        assert_eq!(rejection(&AuthState::Failed("db down".to_string())).0, Status::InternalServerError);
    }
}
