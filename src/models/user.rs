use chrono::{DateTime, Utc};
use rocket::serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use std::borrow::Cow;
use std::fmt;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::service::credentials::check_password_strength;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(type_name = "user_role", rename_all = "UPPERCASE")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => f.write_str("USER"),
            Role::Admin => f.write_str("ADMIN"),
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
    pub email_verified: bool,
    pub name: Option<String>,
    pub bio: Option<String>,
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload; the password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub email_verified: bool,
    pub name: Option<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub bio: Option<String>,
    pub avatar: Option<String>,
}

#[derive(Serialize, Debug, Clone, JsonSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub name: Option<String>,
    pub bio: Option<String>,
    pub avatar: Option<String>,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            username: user.username.clone(),
            name: user.name.clone(),
            bio: user.bio.clone(),
            avatar: user.avatar.clone(),
            role: user.role,
            is_active: user.is_active,
            created_at: user.created_at,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Validate, JsonSchema)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 3, max = 30, message = "Username must be between 3 and 30 characters"))]
    #[validate(custom(function = "validate_username"))]
    pub username: String,
    #[validate(custom(function = "validate_password_strength"))]
    pub password: String,
    #[validate(length(max = 100, message = "Name must be less than 100 characters"))]
    pub name: Option<String>,
    #[validate(length(max = 500, message = "Bio must be less than 500 characters"))]
    pub bio: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Validate, JsonSchema)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Deserialize, Debug, Clone, Validate, JsonSchema)]
pub struct ProfileRequest {
    #[validate(length(max = 100, message = "Name must be less than 100 characters"))]
    pub name: Option<String>,
    #[validate(length(max = 500, message = "Bio must be less than 500 characters"))]
    pub bio: Option<String>,
    #[validate(url(message = "Avatar must be a valid URL"))]
    pub avatar: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Validate, JsonSchema)]
pub struct PasswordChangeRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,
    #[validate(custom(function = "validate_password_strength"))]
    pub new_password: String,
}

#[derive(Deserialize, Debug, Clone, JsonSchema)]
pub struct UserActiveRequest {
    pub active: bool,
}

#[derive(Deserialize, Debug, Clone, JsonSchema)]
pub struct PasswordStrengthRequest {
    pub password: String,
}

pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_username").with_message(Cow::Borrowed(
            "Username may only contain letters, numbers and underscores",
        )))
    }
}

pub fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    let strength = check_password_strength(password);
    if strength.valid {
        Ok(())
    } else {
        Err(ValidationError::new("weak_password").with_message(Cow::Owned(strength.violations.join("; "))))
    }
}
