use crate::config::AuthConfig;
use crate::error::app_error::AppError;
use crate::models::session::Identity;
use crate::models::user::Role;
use argon2::{Algorithm, Argon2, Params, Version};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use password_hash::rand_core::OsRng;
use password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use rand::RngCore;
use rocket::serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Characters that satisfy the "special character" password rule.
pub const SPECIAL_CHARACTERS: &str = "!@#$%^&*(),.?\":{}|<>";
pub const MIN_PASSWORD_LENGTH: usize = 8;

const SECRET_TOKEN_BYTES: usize = 32;
const DECOY_PASSWORD: &[u8] = b"decoy-password-never-matches";

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: Uuid,
    email: String,
    username: String,
    role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sid: Option<Uuid>,
    iat: i64,
    exp: i64,
}

impl Claims {
    fn into_identity(self) -> Identity {
        Identity {
            id: self.sub,
            email: self.email,
            username: self.username,
            role: self.role,
            name: self.name,
        }
    }
}

/// Password hashing and signed identity tokens.
///
/// Keys and hashing parameters are fixed at construction; the service is shared
/// through Rocket state and never mutated.
pub struct CredentialService {
    params: Params,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_ttl: Duration,
    decoy_hash: String,
}

impl CredentialService {
    pub fn new(config: &AuthConfig) -> Result<Self, AppError> {
        let params = Params::new(config.hash_memory_kib, config.hash_iterations, config.hash_parallelism, None)
            .map_err(|e| AppError::PasswordHash {
                message: format!("Invalid Argon2 parameters: {}", e),
            })?;

        // Unknown-user logins verify against this so they cost the same as real ones.
        let decoy_hash = hash_with(&params, DECOY_PASSWORD)?;

        Ok(Self {
            params,
            encoding_key: EncodingKey::from_secret(config.token_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.token_secret.as_bytes()),
            token_ttl: Duration::seconds(config.token_ttl_seconds),
            decoy_hash,
        })
    }

    pub async fn hash_password(&self, password: &str) -> Result<String, AppError> {
        let params = self.params.clone();
        let password = password.to_owned();
        tokio::task::spawn_blocking(move || hash_with(&params, password.as_bytes()))
            .await
            .map_err(|e| AppError::PasswordHash {
                message: format!("Hashing task failed: {}", e),
            })?
    }

    /// `Ok(false)` on mismatch; a stored hash that cannot be parsed is an error.
    pub async fn verify_password(&self, password: &str, hash: &str) -> Result<bool, AppError> {
        let params = self.params.clone();
        let password = password.to_owned();
        let hash = hash.to_owned();
        tokio::task::spawn_blocking(move || verify_with(&params, password.as_bytes(), &hash))
            .await
            .map_err(|e| AppError::PasswordHash {
                message: format!("Verification task failed: {}", e),
            })?
    }

    /// Burns one verification against the decoy hash.
    pub async fn dummy_verify(&self, password: &str) {
        let _ = self.verify_password(password, &self.decoy_hash).await;
    }

    /// Tokens are bound to the session they were issued with and stop
    /// authenticating once that session is gone.
    pub fn issue_token(&self, identity: &Identity, session_id: Uuid) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = Claims {
            sub: identity.id,
            email: identity.email.clone(),
            username: identity.username.clone(),
            role: identity.role,
            name: identity.name.clone(),
            sid: Some(session_id),
            iat: now.timestamp(),
            exp: (now + self.token_ttl).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| AppError::token("Failed to sign identity token", e))
    }

    /// Any failure (signature, shape, expiry) yields `None`.
    pub fn validate_token(&self, token: &str) -> Option<Identity> {
        self.decode_claims(token).map(Claims::into_identity)
    }

    /// Identity snapshot plus the session the token was issued with.
    pub fn validate_session_token(&self, token: &str) -> Option<(Identity, Uuid)> {
        let mut claims = self.decode_claims(token)?;
        let session_id = claims.sid.take()?;
        Some((claims.into_identity(), session_id))
    }

    fn decode_claims(&self, token: &str) -> Option<Claims> {
        let mut validation = Validation::default();
        validation.leeway = 0;

        decode::<Claims>(token, &self.decoding_key, &validation).ok().map(|data| data.claims)
    }
}

fn argon2(params: &Params) -> Argon2<'static> {
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params.clone())
}

fn hash_with(params: &Params, password: &[u8]) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = argon2(params).hash_password(password, &salt)?;
    Ok(hash.to_string())
}

fn verify_with(params: &Params, password: &[u8], hash: &str) -> Result<bool, AppError> {
    let parsed = PasswordHash::new(hash).map_err(|e| AppError::password_hash("Failed to parse stored password hash", e))?;
    match argon2(params).verify_password(password, &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct PasswordStrength {
    pub valid: bool,
    pub violations: Vec<String>,
}

/// Reports every rule the password breaks, in a fixed order.
pub fn check_password_strength(password: &str) -> PasswordStrength {
    let mut violations = Vec::new();

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        violations.push(format!("Password must be at least {} characters long", MIN_PASSWORD_LENGTH));
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        violations.push("Password must contain at least one uppercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        violations.push("Password must contain at least one lowercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        violations.push("Password must contain at least one number".to_string());
    }
    if !password.chars().any(|c| SPECIAL_CHARACTERS.contains(c)) {
        violations.push("Password must contain at least one special character".to_string());
    }

    PasswordStrength {
        valid: violations.is_empty(),
        violations,
    }
}

/// 32 random bytes, hex encoded.
pub fn generate_secret_token() -> String {
    let mut bytes = [0u8; SECRET_TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// SHA-256 digest (hex) used as the stored form of session and reset tokens.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
