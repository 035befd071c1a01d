use chrono::{DateTime, Utc};
use rocket::serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use uuid::Uuid;
use validator::Validate;

/// Password reset record; only the SHA-256 digest of the token is stored.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PasswordReset {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub created_at: DateTime<Utc>,
}

impl PasswordReset {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Usable only while unexpired and unused.
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        !self.used && !self.is_expired(now)
    }
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
pub struct PasswordResetRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
pub struct PasswordResetConfirmRequest {
    #[validate(length(equal = 64, message = "Invalid or expired reset token"))]
    pub token: String,
    #[validate(custom(function = "crate::models::user::validate_password_strength"))]
    pub new_password: String,
}

/// Same message whether or not the email exists.
#[derive(Debug, Serialize, JsonSchema)]
pub struct PasswordResetResponse {
    pub message: String,
    /// Only populated in development so the flow can be exercised without a mailer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

pub const RESET_REQUESTED_MESSAGE: &str = "If your email address exists in our system, you will receive a password reset link shortly.";
