use crate::config::AuthConfig;
use crate::database::password_reset::PasswordResetRepository;
use crate::database::session::SessionRepository;
use crate::database::user::UserRepository;
use crate::error::app_error::AppError;
use crate::models::session::{AuthSession, ClientMetadata, Identity, NewSession, Session};
use crate::models::user::{NewUser, ProfileRequest, ProfileUpdate, RegisterRequest, Role, User, UserResponse};
use crate::service::credentials::{CredentialService, check_password_strength, generate_secret_token, hash_token};
use crate::service::validation::sanitize_optional;
use chrono::{Duration, Utc};
use tracing::{info, warn};
use uuid::Uuid;

/// Credential a client presents with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Credential<'t> {
    /// Opaque token from the session cookie.
    Session(&'t str),
    /// Signed token from an `Authorization: Bearer` header.
    Bearer(&'t str),
}

/// Session lifecycle, login/registration and password reset.
///
/// Opaque session tokens are handed to the client; only their SHA-256 digest is
/// persisted. Expired and missing sessions are indistinguishable to callers.
pub struct AuthService<'a, R> {
    repository: &'a R,
    credentials: &'a CredentialService,
    config: &'a AuthConfig,
}

impl<'a, R> AuthService<'a, R>
where
    R: UserRepository + SessionRepository + PasswordResetRepository,
{
    pub fn new(repository: &'a R, credentials: &'a CredentialService, config: &'a AuthConfig) -> Self {
        AuthService {
            repository,
            credentials,
            config,
        }
    }

    pub async fn login(&self, email: &str, password: &str, client: &ClientMetadata) -> Result<AuthSession, AppError> {
        let email = normalize_email(email);

        let Some(user) = self.repository.get_user_by_email(&email).await? else {
            self.credentials.dummy_verify(password).await;
            warn!(security_event = "login_failed", reason = "unknown_email", "login failed");
            return Err(AppError::NotFound("User not found".to_string()));
        };

        if !user.is_active {
            warn!(security_event = "login_failed", reason = "deactivated", user_id = %user.id, "login failed");
            return Err(AppError::Deactivated);
        }

        if !self.credentials.verify_password(password, &user.password_hash).await? {
            warn!(security_event = "login_failed", reason = "bad_password", user_id = %user.id, "login failed");
            return Err(AppError::BadCredential);
        }

        let session = self.start_session(&user, client).await?;
        info!(security_event = "login_success", user_id = %user.id, "user logged in");
        Ok(session)
    }

    pub async fn register(&self, request: &RegisterRequest, client: &ClientMetadata) -> Result<AuthSession, AppError> {
        let email = normalize_email(&request.email);
        let username = request.username.trim().to_string();

        if self.repository.get_user_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict("Email is already registered".to_string()));
        }
        if self.repository.get_user_by_username(&username).await?.is_some() {
            return Err(AppError::Conflict("Username is already taken".to_string()));
        }

        let password_hash = self.credentials.hash_password(&request.password).await?;
        let user = self
            .repository
            .create_user(&NewUser {
                email,
                username,
                password_hash,
                role: Role::User,
                email_verified: false,
                name: sanitize_optional(request.name.as_deref()),
                bio: sanitize_optional(request.bio.as_deref()),
            })
            .await?;

        let session = self.start_session(&user, client).await?;
        info!(security_event = "user_registered", user_id = %user.id, "user registered");
        Ok(session)
    }

    /// Deleting an unknown token is not an error.
    pub async fn logout(&self, session_token: &str) -> Result<(), AppError> {
        self.repository.delete_session_by_token_hash(&hash_token(session_token)).await?;
        info!(security_event = "logout", "session ended");
        Ok(())
    }

    pub async fn resolve_session(&self, session_token: &str) -> Result<Option<Identity>, AppError> {
        let session = self.repository.get_session_by_token_hash(&hash_token(session_token)).await?;
        self.identity_for(session).await
    }

    /// Signed tokens authenticate only while the session they were issued with is
    /// live. The identity comes from the stored user, never from the token claims.
    pub async fn resolve_bearer(&self, signed_token: &str) -> Result<Option<Identity>, AppError> {
        let Some((snapshot, session_id)) = self.credentials.validate_session_token(signed_token) else {
            return Ok(None);
        };

        let session = self.repository.get_session_by_id(&session_id).await?;
        self.identity_for(session.filter(|s| s.user_id == snapshot.id)).await
    }

    pub async fn resolve(&self, credential: Credential<'_>) -> Result<Option<Identity>, AppError> {
        match credential {
            Credential::Session(token) => self.resolve_session(token).await,
            Credential::Bearer(token) => self.resolve_bearer(token).await,
        }
    }

    /// First credential that resolves wins.
    pub async fn require_auth(&self, credentials: &[Credential<'_>]) -> Result<Identity, AppError> {
        for credential in credentials {
            if let Some(identity) = self.resolve(*credential).await? {
                return Ok(identity);
            }
        }
        Err(AppError::Unauthenticated)
    }

    pub async fn require_role(&self, credentials: &[Credential<'_>], role: Role) -> Result<Identity, AppError> {
        let identity = self.require_auth(credentials).await?;
        identity.ensure_role(role)?;
        Ok(identity)
    }

    async fn identity_for(&self, session: Option<Session>) -> Result<Option<Identity>, AppError> {
        let Some(session) = session else {
            return Ok(None);
        };

        if session.is_expired(Utc::now()) {
            self.repository.delete_session(&session.id).await?;
            return Ok(None);
        }

        let user = self.repository.get_user_by_id(&session.user_id).await?;
        Ok(user.filter(|u| u.is_active).map(|u| Identity::from(&u)))
    }

    /// Issues a single-use reset token for the account; the caller delivers it.
    pub async fn request_reset(&self, email: &str) -> Result<String, AppError> {
        let email = normalize_email(email);
        let user = self
            .repository
            .get_user_by_email(&email)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        let token = generate_secret_token();
        let expires_at = Utc::now() + Duration::seconds(self.config.reset_token_ttl_seconds);
        self.repository.create_password_reset(&user.id, &hash_token(&token), expires_at).await?;

        info!(security_event = "password_reset_requested", user_id = %user.id, "password reset requested");
        Ok(token)
    }

    pub async fn consume_reset(&self, token: &str, new_password: &str) -> Result<bool, AppError> {
        let strength = check_password_strength(new_password);
        if !strength.valid {
            return Err(AppError::Validation(strength.violations));
        }

        let reset = self
            .repository
            .get_password_reset_by_token_hash(&hash_token(token))
            .await?
            .filter(|reset| reset.is_valid(Utc::now()))
            .ok_or(AppError::InvalidOrExpired)?;

        let password_hash = self.credentials.hash_password(new_password).await?;
        if !self.repository.complete_password_reset(&reset.id, &reset.user_id, &password_hash).await? {
            warn!(security_event = "password_reset_failed", user_id = %reset.user_id, "reset token lost race");
            return Err(AppError::InvalidOrExpired);
        }

        let revoked = self.repository.delete_sessions_for_user(&reset.user_id).await?;
        info!(
            security_event = "password_reset_completed",
            user_id = %reset.user_id,
            revoked_sessions = revoked,
            "password reset completed"
        );
        Ok(true)
    }

    pub async fn get_user(&self, user_id: &Uuid) -> Result<User, AppError> {
        self.repository
            .get_user_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    pub async fn change_password(&self, user_id: &Uuid, current_password: &str, new_password: &str) -> Result<(), AppError> {
        let user = self.get_user(user_id).await?;

        if !self.credentials.verify_password(current_password, &user.password_hash).await? {
            warn!(security_event = "password_change_failed", user_id = %user.id, "current password mismatch");
            return Err(AppError::BadCredential);
        }

        let password_hash = self.credentials.hash_password(new_password).await?;
        self.repository.update_password(&user.id, &password_hash).await?;
        info!(security_event = "password_changed", user_id = %user.id, "password changed");
        Ok(())
    }

    pub async fn update_profile(&self, user_id: &Uuid, profile: &ProfileRequest) -> Result<UserResponse, AppError> {
        let update = ProfileUpdate {
            name: sanitize_optional(profile.name.as_deref()),
            bio: sanitize_optional(profile.bio.as_deref()),
            avatar: profile.avatar.clone().filter(|a| !a.trim().is_empty()),
        };
        let user = self.repository.update_profile(user_id, &update).await?;
        Ok(UserResponse::from(&user))
    }

    /// Deactivation also revokes every session the user holds.
    pub async fn set_user_active(&self, actor: &Identity, user_id: &Uuid, active: bool) -> Result<UserResponse, AppError> {
        actor.ensure_role(Role::Admin)?;
        if actor.id == *user_id && !active {
            return Err(AppError::BadRequest("Administrators cannot deactivate themselves".to_string()));
        }

        let user = self.repository.set_user_active(user_id, active).await?;
        if !active {
            let revoked = self.repository.delete_sessions_for_user(user_id).await?;
            warn!(
                security_event = "user_deactivated",
                user_id = %user_id,
                actor_id = %actor.id,
                revoked_sessions = revoked,
                "user deactivated"
            );
        } else {
            info!(security_event = "user_activated", user_id = %user_id, actor_id = %actor.id, "user activated");
        }
        Ok(UserResponse::from(&user))
    }

    async fn start_session(&self, user: &User, client: &ClientMetadata) -> Result<AuthSession, AppError> {
        let session_token = generate_secret_token();
        let expires_at = Utc::now() + Duration::seconds(self.config.session_ttl_seconds);

        let session = self
            .repository
            .create_session(&NewSession {
                user_id: user.id,
                token_hash: hash_token(&session_token),
                expires_at,
                ip_address: client.ip_address.clone(),
                user_agent: client.user_agent.clone(),
            })
            .await?;

        let identity = Identity::from(user);
        let signed_token = self.credentials.issue_token(&identity, session.id)?;

        Ok(AuthSession {
            user: UserResponse::from(user),
            identity,
            session_token,
            signed_token,
            expires_at,
        })
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
