use rocket::http::{ContentType, Status};
use rocket::response::Responder;
use rocket::{Request, Response};
use rocket_okapi::OpenApiError;
use rocket_okapi::r#gen::OpenApiGenerator;
use rocket_okapi::okapi::openapi3::Responses;
use rocket_okapi::response::OpenApiResponderInner;
use serde::Serialize;
use std::io::Cursor;
use thiserror::Error;
use tracing::{error, warn};
use validator::ValidationErrors;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Invalid email or password")]
    BadCredential,
    #[error("Account is deactivated")]
    Deactivated,
    #[error("Authentication required")]
    Unauthenticated,
    #[error("Insufficient permissions")]
    Forbidden,
    #[error("Invalid or expired reset token")]
    InvalidOrExpired,
    #[error("Validation failed")]
    Validation(Vec<String>),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Internal server error")]
    Db {
        message: String,
        #[source]
        source: sqlx::error::Error,
    },
    #[error("Internal server error")]
    Migration {
        message: String,
        #[source]
        source: sqlx::migrate::MigrateError,
    },
    #[error("Internal server error")]
    PasswordHash { message: String },
    #[error("Internal server error")]
    Token {
        message: String,
        #[source]
        source: jsonwebtoken::errors::Error,
    },
    #[error("Invalid identifier")]
    UuidError {
        message: String,
        #[source]
        source: uuid::Error,
    },
    #[error("Internal server error")]
    ConfigurationError {
        message: String,
        #[source]
        source: figment::Error,
    },
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Internal server error")]
    Internal(String),
}

impl AppError {
    pub fn db(message: impl Into<String>, source: sqlx::error::Error) -> Self {
        Self::Db {
            message: message.into(),
            source,
        }
    }

    pub fn uuid(message: impl Into<String>, source: uuid::Error) -> Self {
        Self::UuidError {
            message: message.into(),
            source,
        }
    }

    pub fn password_hash(message: impl Into<String>, source: password_hash::Error) -> Self {
        Self::PasswordHash {
            message: format!("{}: {}", message.into(), source),
        }
    }

    pub fn token(message: impl Into<String>, source: jsonwebtoken::errors::Error) -> Self {
        Self::Token {
            message: message.into(),
            source,
        }
    }

    /// Individual constraint messages, populated only for validation failures.
    pub fn details(&self) -> &[String] {
        match self {
            AppError::Validation(errors) => errors,
            _ => &[],
        }
    }
}

impl From<password_hash::Error> for AppError {
    fn from(e: password_hash::Error) -> Self {
        AppError::password_hash("Password hashing failed", e)
    }
}

impl From<uuid::Error> for AppError {
    fn from(e: uuid::Error) -> Self {
        AppError::uuid("Invalid UUID", e)
    }
}

impl From<ValidationErrors> for AppError {
    fn from(e: ValidationErrors) -> Self {
        AppError::Validation(crate::service::validation::collect_messages(&e))
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        AppError::Migration {
            message: "Failed to run migrations".to_string(),
            source: e,
        }
    }
}

impl From<&AppError> for Status {
    fn from(e: &AppError) -> Self {
        match e {
            AppError::NotFound(_) => Status::NotFound,
            AppError::Conflict(_) => Status::Conflict,
            AppError::BadCredential => Status::Unauthorized,
            AppError::Deactivated => Status::Forbidden,
            AppError::Unauthenticated => Status::Unauthorized,
            AppError::Forbidden => Status::Forbidden,
            AppError::InvalidOrExpired => Status::BadRequest,
            AppError::Validation(_) => Status::BadRequest,
            AppError::BadRequest(_) => Status::BadRequest,
            AppError::UuidError { .. } => Status::BadRequest,
            AppError::Db { .. } => Status::InternalServerError,
            AppError::Migration { .. } => Status::InternalServerError,
            AppError::PasswordHash { .. } => Status::InternalServerError,
            AppError::Token { .. } => Status::InternalServerError,
            AppError::ConfigurationError { .. } => Status::InternalServerError,
            AppError::InvalidConfiguration(_) => Status::InternalServerError,
            AppError::Internal(_) => Status::InternalServerError,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<String>,
}

impl<'r> Responder<'r, 'static> for AppError {
    fn respond_to(self, req: &Request<'_>) -> rocket::response::Result<'static> {
        let method = req.method();
        let uri = req.uri();

        let request_id = req
            .local_cache(|| None::<crate::middleware::RequestId>)
            .as_ref()
            .map(|r| r.0.as_str())
            .unwrap_or("unknown");

        let user_id = req
            .local_cache(|| crate::auth::AuthState::Anonymous)
            .user()
            .map(|u| u.identity.id.to_string())
            .unwrap_or_else(|| "anonymous".to_string());

        let status = Status::from(&self);
        if status.class().is_server_error() {
            error!(
                error = ?self,
                request_id = %request_id,
                user_id = %user_id,
                method = %method,
                uri = %uri,
                "request failed"
            );
        } else {
            warn!(
                error = %self,
                request_id = %request_id,
                user_id = %user_id,
                method = %method,
                uri = %uri,
                "request rejected"
            );
        }

        let body = serde_json::to_string(&ErrorBody {
            message: self.to_string(),
            errors: self.details().to_vec(),
        })
        .map_err(|_| Status::InternalServerError)?;

        Response::build()
            .status(status)
            .header(ContentType::JSON)
            .sized_body(body.len(), Cursor::new(body))
            .ok()
    }
}

impl OpenApiResponderInner for AppError {
    fn responses(_gen: &mut OpenApiGenerator) -> Result<Responses, OpenApiError> {
        use rocket_okapi::okapi::openapi3::{RefOr, Response as OpenApiResponse};
        let mut responses = Responses::default();
        for (code, description) in [
            ("400", "Bad Request"),
            ("401", "Unauthorized"),
            ("403", "Forbidden"),
            ("404", "Not Found"),
            ("409", "Conflict"),
            ("500", "Internal Server Error"),
        ] {
            responses.responses.insert(
                code.to_string(),
                RefOr::Object(OpenApiResponse {
                    description: description.to_string(),
                    ..Default::default()
                }),
            );
        }
        Ok(responses)
    }
}

impl From<figment::Error> for AppError {
    fn from(e: figment::Error) -> Self {
        AppError::ConfigurationError {
            message: "Failed to read configuration".to_string(),
            source: e,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => AppError::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(db_err.constraint().unwrap_or("unique constraint").to_string())
            }
            _ => AppError::db("Database error", e),
        }
    }
}
