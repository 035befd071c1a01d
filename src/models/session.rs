use chrono::{DateTime, Utc};
use rocket::serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use uuid::Uuid;

use crate::error::app_error::AppError;
use crate::models::user::{Role, User, UserResponse};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Clone)]
pub struct NewSession {
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Client details recorded alongside a new session.
#[derive(Debug, Clone, Default)]
pub struct ClientMetadata {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Minimal identifying fields shared by sessions and signed tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Identity {
    /// Administrators satisfy every role requirement.
    pub fn has_role(&self, role: Role) -> bool {
        self.role == role || self.role == Role::Admin
    }

    pub fn ensure_role(&self, role: Role) -> Result<(), AppError> {
        if self.has_role(role) { Ok(()) } else { Err(AppError::Forbidden) }
    }
}

impl From<&User> for Identity {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            username: user.username.clone(),
            role: user.role,
            name: user.name.clone(),
        }
    }
}

/// Result of a successful login or registration.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user: UserResponse,
    pub identity: Identity,
    pub session_token: String,
    pub signed_token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Serialize, Debug, JsonSchema)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl From<&AuthSession> for AuthResponse {
    fn from(session: &AuthSession) -> Self {
        Self {
            user: session.user.clone(),
            token: session.signed_token.clone(),
            expires_at: session.expires_at,
        }
    }
}

#[derive(Deserialize, Debug, JsonSchema)]
pub struct TokenVerifyRequest {
    pub token: String,
}

#[derive(Serialize, Debug, JsonSchema)]
pub struct TokenVerifyResponse {
    pub valid: bool,
    pub identity: Option<Identity>,
}
