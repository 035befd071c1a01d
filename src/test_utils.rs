use crate::config::AuthConfig;
use crate::database::comment::CommentRepository;
use crate::database::password_reset::PasswordResetRepository;
use crate::database::post::PostRepository;
use crate::database::session::SessionRepository;
use crate::database::settings::SettingRepository;
use crate::database::taxonomy::TaxonomyRepository;
use crate::database::user::UserRepository;
use crate::error::app_error::AppError;
use crate::models::comment::{Comment, CommentRequest, NewComment};
use crate::models::pagination::PaginationParams;
use crate::models::password_reset::PasswordReset;
use crate::models::post::{Post, PostDraft, PostRequest, PostStatus};
use crate::models::session::{Identity, NewSession, Session};
use crate::models::settings::{Setting, SettingType};
use crate::models::taxonomy::{NewTerm, Taxonomy, Term};
use crate::models::user::{NewUser, ProfileUpdate, RegisterRequest, Role, User};
use crate::service::credentials::{CredentialService, hash_token};
use chrono::{Duration, Utc};
use std::sync::Mutex;
use uuid::Uuid;

pub fn test_auth_config() -> AuthConfig {
    AuthConfig {
        token_secret: "test-secret-that-is-long-enough-for-hs256".to_string(),
        hash_memory_kib: 1024,
        hash_iterations: 1,
        hash_parallelism: 1,
        ..AuthConfig::default()
    }
}

pub fn test_credentials() -> CredentialService {
    CredentialService::new(&test_auth_config()).expect("valid test credential config")
}

pub fn register_request(username: &str, password: &str) -> RegisterRequest {
    RegisterRequest {
        email: "writer@example.com".to_string(),
        username: username.to_string(),
        password: password.to_string(),
        name: None,
        bio: None,
    }
}

pub fn post_request(title: &str, status: &str) -> PostRequest {
    PostRequest {
        title: title.to_string(),
        content: format!("# {}\n\nBody text.", title),
        excerpt: None,
        featured_image: None,
        status: Some(status.to_string()),
        tags: vec![],
        categories: vec![],
    }
}

pub fn comment_request(post_id: Uuid, content: &str) -> CommentRequest {
    CommentRequest {
        content: content.to_string(),
        post_id,
        parent_id: None,
    }
}

#[derive(Default)]
struct MockState {
    users: Vec<User>,
    sessions: Vec<Session>,
    resets: Vec<PasswordReset>,
    posts: Vec<PostRow>,
    comments: Vec<CommentRow>,
    tags: Vec<Term>,
    categories: Vec<Term>,
    post_tags: Vec<(Uuid, Uuid)>,
    post_categories: Vec<(Uuid, Uuid)>,
    settings: Vec<Setting>,
}

struct PostRow {
    id: Uuid,
    draft: PostDraft,
    created_at: chrono::DateTime<Utc>,
    updated_at: chrono::DateTime<Utc>,
}

struct CommentRow {
    id: Uuid,
    comment: NewComment,
    created_at: chrono::DateTime<Utc>,
}

impl MockState {
    fn username(&self, id: &Uuid) -> String {
        self.users.iter().find(|u| u.id == *id).map(|u| u.username.clone()).unwrap_or_default()
    }

    fn post(&self, row: &PostRow) -> Post {
        Post {
            id: row.id,
            title: row.draft.title.clone(),
            slug: row.draft.slug.clone(),
            content: row.draft.content.clone(),
            excerpt: row.draft.excerpt.clone(),
            featured_image: row.draft.featured_image.clone(),
            status: row.draft.status,
            author_id: row.draft.author_id,
            author_username: self.username(&row.draft.author_id),
            published_at: row.draft.published_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
            comment_count: self.comments.iter().filter(|c| c.comment.post_id == row.id && c.comment.is_approved).count() as i64,
        }
    }

    fn comment(&self, row: &CommentRow) -> Comment {
        Comment {
            id: row.id,
            content: row.comment.content.clone(),
            author_id: row.comment.author_id,
            author_username: self.username(&row.comment.author_id),
            post_id: row.comment.post_id,
            parent_id: row.comment.parent_id,
            is_approved: row.comment.is_approved,
            created_at: row.created_at,
        }
    }

    fn terms(&mut self, taxonomy: Taxonomy) -> &mut Vec<Term> {
        match taxonomy {
            Taxonomy::Tag => &mut self.tags,
            Taxonomy::Category => &mut self.categories,
        }
    }

    fn links(&mut self, taxonomy: Taxonomy) -> &mut Vec<(Uuid, Uuid)> {
        match taxonomy {
            Taxonomy::Tag => &mut self.post_tags,
            Taxonomy::Category => &mut self.post_categories,
        }
    }

    fn published_newest_first(&self) -> Vec<Post> {
        let mut posts: Vec<Post> = self
            .posts
            .iter()
            .filter(|row| row.draft.status == PostStatus::Published)
            .map(|row| self.post(row))
            .collect();
        posts.sort_by(|a, b| b.published_at.cmp(&a.published_at).then(b.created_at.cmp(&a.created_at)));
        posts
    }
}

/// In-memory stand-in for Postgres implementing every repository trait.
#[derive(Default)]
pub struct MockRepository {
    state: Mutex<MockState>,
}

impl MockRepository {
    /// Inserts an active user directly and returns its identity.
    pub fn add_user(&self, username: &str, role: Role) -> Identity {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: format!("{}@example.com", username),
            username: username.to_string(),
            password_hash: String::new(),
            role,
            is_active: true,
            email_verified: true,
            name: None,
            bio: None,
            avatar: None,
            created_at: now,
            updated_at: now,
        };
        let identity = Identity::from(&user);
        self.state.lock().unwrap().users.push(user);
        identity
    }

    pub fn promote(&self, user_id: &Uuid) {
        let mut state = self.state.lock().unwrap();
        if let Some(user) = state.users.iter_mut().find(|u| u.id == *user_id) {
            user.role = Role::Admin;
        }
    }

    pub fn demote(&self, user_id: &Uuid) {
        let mut state = self.state.lock().unwrap();
        if let Some(user) = state.users.iter_mut().find(|u| u.id == *user_id) {
            user.role = Role::User;
        }
    }

    pub fn set_active(&self, user_id: &Uuid, active: bool) {
        let mut state = self.state.lock().unwrap();
        if let Some(user) = state.users.iter_mut().find(|u| u.id == *user_id) {
            user.is_active = active;
        }
    }

    pub fn expire_session(&self, session_token: &str) {
        let digest = hash_token(session_token);
        let mut state = self.state.lock().unwrap();
        for session in state.sessions.iter_mut().filter(|s| s.token_hash == digest) {
            session.expires_at = Utc::now() - Duration::seconds(1);
        }
    }

    pub fn expire_resets(&self) {
        let mut state = self.state.lock().unwrap();
        for reset in state.resets.iter_mut() {
            reset.expires_at = Utc::now() - Duration::seconds(1);
        }
    }

    pub fn session_id_for(&self, session_token: &str) -> Uuid {
        let digest = hash_token(session_token);
        let state = self.state.lock().unwrap();
        state.sessions.iter().find(|s| s.token_hash == digest).map(|s| s.id).unwrap()
    }

    pub fn session_count(&self) -> usize {
        self.state.lock().unwrap().sessions.len()
    }

    pub fn has_session_digest(&self, digest: &str) -> bool {
        self.state.lock().unwrap().sessions.iter().any(|s| s.token_hash == digest)
    }
}

fn conflict(what: &str) -> AppError {
    AppError::Conflict(what.to_string())
}

fn paginate(posts: Vec<Post>, params: &PaginationParams) -> (Vec<Post>, i64) {
    let total = posts.len() as i64;
    let page = posts
        .into_iter()
        .skip(params.offset() as usize)
        .take(params.effective_limit() as usize)
        .collect();
    (page, total)
}

#[async_trait::async_trait]
impl UserRepository for MockRepository {
    async fn create_user(&self, user: &NewUser) -> Result<User, AppError> {
        let mut state = self.state.lock().unwrap();
        if state.users.iter().any(|u| u.email.eq_ignore_ascii_case(&user.email)) {
            return Err(conflict("users_email_key"));
        }
        if state.users.iter().any(|u| u.username.eq_ignore_ascii_case(&user.username)) {
            return Err(conflict("users_username_key"));
        }

        let now = Utc::now();
        let created = User {
            id: Uuid::new_v4(),
            email: user.email.clone(),
            username: user.username.clone(),
            password_hash: user.password_hash.clone(),
            role: user.role,
            is_active: true,
            email_verified: user.email_verified,
            name: user.name.clone(),
            bio: user.bio.clone(),
            avatar: None,
            created_at: now,
            updated_at: now,
        };
        state.users.push(created.clone());
        Ok(created)
    }

    async fn get_user_by_id(&self, id: &Uuid) -> Result<Option<User>, AppError> {
        Ok(self.state.lock().unwrap().users.iter().find(|u| u.id == *id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self.state.lock().unwrap().users.iter().find(|u| u.email.eq_ignore_ascii_case(email)).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .users
            .iter()
            .find(|u| u.username.eq_ignore_ascii_case(username))
            .cloned())
    }

    async fn update_profile(&self, id: &Uuid, profile: &ProfileUpdate) -> Result<User, AppError> {
        let mut state = self.state.lock().unwrap();
        let user = state.users.iter_mut().find(|u| u.id == *id).ok_or(AppError::NotFound("User not found".to_string()))?;
        user.name = profile.name.clone();
        user.bio = profile.bio.clone();
        user.avatar = profile.avatar.clone();
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn update_password(&self, id: &Uuid, password_hash: &str) -> Result<(), AppError> {
        let mut state = self.state.lock().unwrap();
        let user = state.users.iter_mut().find(|u| u.id == *id).ok_or(AppError::NotFound("User not found".to_string()))?;
        user.password_hash = password_hash.to_string();
        Ok(())
    }

    async fn set_user_active(&self, id: &Uuid, active: bool) -> Result<User, AppError> {
        let mut state = self.state.lock().unwrap();
        let user = state.users.iter_mut().find(|u| u.id == *id).ok_or(AppError::NotFound("User not found".to_string()))?;
        user.is_active = active;
        Ok(user.clone())
    }

    async fn upsert_user(&self, user: &NewUser) -> Result<User, AppError> {
        let existing = {
            let mut state = self.state.lock().unwrap();
            state.users.iter_mut().find(|u| u.email.eq_ignore_ascii_case(&user.email)).map(|existing| {
                existing.password_hash = user.password_hash.clone();
                existing.role = user.role;
                existing.email_verified = user.email_verified;
                existing.is_active = true;
                existing.clone()
            })
        };
        match existing {
            Some(existing) => Ok(existing),
            None => self.create_user(user).await,
        }
    }
}

#[async_trait::async_trait]
impl SessionRepository for MockRepository {
    async fn create_session(&self, session: &NewSession) -> Result<Session, AppError> {
        let mut state = self.state.lock().unwrap();
        if state.sessions.iter().any(|s| s.token_hash == session.token_hash) {
            return Err(conflict("sessions_token_hash_key"));
        }
        let created = Session {
            id: Uuid::new_v4(),
            user_id: session.user_id,
            token_hash: session.token_hash.clone(),
            expires_at: session.expires_at,
            ip_address: session.ip_address.clone(),
            user_agent: session.user_agent.clone(),
            created_at: Utc::now(),
        };
        state.sessions.push(created.clone());
        Ok(created)
    }

    async fn get_session_by_token_hash(&self, token_hash: &str) -> Result<Option<Session>, AppError> {
        Ok(self.state.lock().unwrap().sessions.iter().find(|s| s.token_hash == token_hash).cloned())
    }

    async fn get_session_by_id(&self, id: &Uuid) -> Result<Option<Session>, AppError> {
        Ok(self.state.lock().unwrap().sessions.iter().find(|s| s.id == *id).cloned())
    }

    async fn delete_session(&self, id: &Uuid) -> Result<(), AppError> {
        self.state.lock().unwrap().sessions.retain(|s| s.id != *id);
        Ok(())
    }

    async fn delete_session_by_token_hash(&self, token_hash: &str) -> Result<(), AppError> {
        self.state.lock().unwrap().sessions.retain(|s| s.token_hash != token_hash);
        Ok(())
    }

    async fn delete_sessions_for_user(&self, user_id: &Uuid) -> Result<u64, AppError> {
        let mut state = self.state.lock().unwrap();
        let before = state.sessions.len();
        state.sessions.retain(|s| s.user_id != *user_id);
        Ok((before - state.sessions.len()) as u64)
    }

    async fn delete_expired_sessions(&self) -> Result<u64, AppError> {
        let now = Utc::now();
        let mut state = self.state.lock().unwrap();
        let before = state.sessions.len();
        state.sessions.retain(|s| !s.is_expired(now));
        Ok((before - state.sessions.len()) as u64)
    }
}

#[async_trait::async_trait]
impl PasswordResetRepository for MockRepository {
    async fn create_password_reset(&self, user_id: &Uuid, token_hash: &str, expires_at: chrono::DateTime<Utc>) -> Result<PasswordReset, AppError> {
        let reset = PasswordReset {
            id: Uuid::new_v4(),
            user_id: *user_id,
            token_hash: token_hash.to_string(),
            expires_at,
            used: false,
            created_at: Utc::now(),
        };
        self.state.lock().unwrap().resets.push(reset.clone());
        Ok(reset)
    }

    async fn get_password_reset_by_token_hash(&self, token_hash: &str) -> Result<Option<PasswordReset>, AppError> {
        Ok(self.state.lock().unwrap().resets.iter().find(|r| r.token_hash == token_hash).cloned())
    }

    async fn complete_password_reset(&self, reset_id: &Uuid, user_id: &Uuid, password_hash: &str) -> Result<bool, AppError> {
        let now = Utc::now();
        let mut state = self.state.lock().unwrap();
        let Some(reset) = state.resets.iter_mut().find(|r| r.id == *reset_id && r.is_valid(now)) else {
            return Ok(false);
        };
        reset.used = true;
        if let Some(user) = state.users.iter_mut().find(|u| u.id == *user_id) {
            user.password_hash = password_hash.to_string();
        }
        Ok(true)
    }

    async fn delete_expired_password_resets(&self) -> Result<u64, AppError> {
        let now = Utc::now();
        let mut state = self.state.lock().unwrap();
        let before = state.resets.len();
        state.resets.retain(|r| r.is_valid(now));
        Ok((before - state.resets.len()) as u64)
    }
}

#[async_trait::async_trait]
impl PostRepository for MockRepository {
    async fn slug_exists(&self, slug: &str) -> Result<bool, AppError> {
        Ok(self.state.lock().unwrap().posts.iter().any(|row| row.draft.slug == slug))
    }

    async fn create_post(&self, draft: &PostDraft) -> Result<Post, AppError> {
        let mut state = self.state.lock().unwrap();
        if state.posts.iter().any(|row| row.draft.slug == draft.slug) {
            return Err(conflict("posts_slug_key"));
        }
        let now = Utc::now();
        let row = PostRow {
            id: Uuid::new_v4(),
            draft: draft.clone(),
            created_at: now,
            updated_at: now,
        };
        let post = state.post(&row);
        state.posts.push(row);
        Ok(post)
    }

    async fn update_post(&self, id: &Uuid, draft: &PostDraft) -> Result<Post, AppError> {
        let mut state = self.state.lock().unwrap();
        let index = state
            .posts
            .iter()
            .position(|row| row.id == *id)
            .ok_or(AppError::NotFound("Post not found".to_string()))?;
        let slug = state.posts[index].draft.slug.clone();
        state.posts[index].draft = PostDraft { slug, ..draft.clone() };
        state.posts[index].updated_at = Utc::now();
        Ok(state.post(&state.posts[index]))
    }

    async fn delete_post(&self, id: &Uuid) -> Result<(), AppError> {
        let mut state = self.state.lock().unwrap();
        let before = state.posts.len();
        state.posts.retain(|row| row.id != *id);
        if state.posts.len() == before {
            return Err(AppError::NotFound("Post not found".to_string()));
        }
        state.comments.retain(|c| c.comment.post_id != *id);
        state.post_tags.retain(|(post_id, _)| post_id != id);
        state.post_categories.retain(|(post_id, _)| post_id != id);
        Ok(())
    }

    async fn get_post_by_id(&self, id: &Uuid) -> Result<Option<Post>, AppError> {
        let state = self.state.lock().unwrap();
        Ok(state.posts.iter().find(|row| row.id == *id).map(|row| state.post(row)))
    }

    async fn get_post_by_slug(&self, slug: &str) -> Result<Option<Post>, AppError> {
        let state = self.state.lock().unwrap();
        Ok(state.posts.iter().find(|row| row.draft.slug == slug).map(|row| state.post(row)))
    }

    async fn list_published_posts(&self, params: &PaginationParams) -> Result<(Vec<Post>, i64), AppError> {
        let posts = self.state.lock().unwrap().published_newest_first();
        Ok(paginate(posts, params))
    }

    async fn search_published_posts(&self, query: &str, params: &PaginationParams) -> Result<(Vec<Post>, i64), AppError> {
        let needle = query.to_lowercase();
        let matches = |text: &str| text.to_lowercase().contains(&needle);
        let posts = self
            .state
            .lock()
            .unwrap()
            .published_newest_first()
            .into_iter()
            .filter(|p| matches(&p.title) || matches(&p.content) || p.excerpt.as_deref().is_some_and(matches))
            .collect();
        Ok(paginate(posts, params))
    }
}

#[async_trait::async_trait]
impl CommentRepository for MockRepository {
    async fn create_comment(&self, comment: &NewComment) -> Result<Comment, AppError> {
        let mut state = self.state.lock().unwrap();
        let row = CommentRow {
            id: Uuid::new_v4(),
            comment: comment.clone(),
            created_at: Utc::now(),
        };
        let created = state.comment(&row);
        state.comments.push(row);
        Ok(created)
    }

    async fn get_comment_by_id(&self, id: &Uuid) -> Result<Option<Comment>, AppError> {
        let state = self.state.lock().unwrap();
        Ok(state.comments.iter().find(|row| row.id == *id).map(|row| state.comment(row)))
    }

    async fn list_comments_for_post(&self, post_id: &Uuid, include_unapproved: bool) -> Result<Vec<Comment>, AppError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .comments
            .iter()
            .filter(|row| row.comment.post_id == *post_id && (include_unapproved || row.comment.is_approved))
            .map(|row| state.comment(row))
            .collect())
    }

    async fn approve_comment(&self, id: &Uuid) -> Result<Comment, AppError> {
        let mut state = self.state.lock().unwrap();
        let index = state
            .comments
            .iter()
            .position(|row| row.id == *id)
            .ok_or(AppError::NotFound("Comment not found".to_string()))?;
        state.comments[index].comment.is_approved = true;
        Ok(state.comment(&state.comments[index]))
    }

    async fn delete_comment(&self, id: &Uuid) -> Result<(), AppError> {
        let mut state = self.state.lock().unwrap();
        let before = state.comments.len();
        state.comments.retain(|row| row.id != *id && row.comment.parent_id != Some(*id));
        if state.comments.len() == before {
            return Err(AppError::NotFound("Comment not found".to_string()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl TaxonomyRepository for MockRepository {
    async fn list_terms(&self, taxonomy: Taxonomy) -> Result<Vec<Term>, AppError> {
        let mut terms = self.state.lock().unwrap().terms(taxonomy).clone();
        terms.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(terms)
    }

    async fn create_term(&self, taxonomy: Taxonomy, term: &NewTerm) -> Result<Term, AppError> {
        let mut state = self.state.lock().unwrap();
        let terms = state.terms(taxonomy);
        if terms.iter().any(|t| t.slug == term.slug) {
            return Err(conflict("slug"));
        }
        let created = Term {
            id: Uuid::new_v4(),
            name: term.name.clone(),
            slug: term.slug.clone(),
            description: term.description.clone(),
        };
        terms.push(created.clone());
        Ok(created)
    }

    async fn upsert_term(&self, taxonomy: Taxonomy, term: &NewTerm) -> Result<Term, AppError> {
        let existing = self.state.lock().unwrap().terms(taxonomy).iter().find(|t| t.slug == term.slug).cloned();
        match existing {
            Some(existing) => Ok(existing),
            None => self.create_term(taxonomy, term).await,
        }
    }

    async fn delete_term(&self, taxonomy: Taxonomy, id: &Uuid) -> Result<(), AppError> {
        let mut state = self.state.lock().unwrap();
        let terms = state.terms(taxonomy);
        let before = terms.len();
        terms.retain(|t| t.id != *id);
        if terms.len() == before {
            return Err(AppError::NotFound(format!("{} not found", taxonomy.label())));
        }
        state.links(taxonomy).retain(|(_, term_id)| term_id != id);
        Ok(())
    }

    async fn set_post_terms(&self, taxonomy: Taxonomy, post_id: &Uuid, term_ids: &[Uuid]) -> Result<(), AppError> {
        let mut state = self.state.lock().unwrap();
        let links = state.links(taxonomy);
        links.retain(|(linked_post, _)| linked_post != post_id);
        for term_id in term_ids {
            if !links.contains(&(*post_id, *term_id)) {
                links.push((*post_id, *term_id));
            }
        }
        Ok(())
    }

    async fn list_post_terms(&self, taxonomy: Taxonomy, post_id: &Uuid) -> Result<Vec<Term>, AppError> {
        let mut state = self.state.lock().unwrap();
        let ids: Vec<Uuid> = state
            .links(taxonomy)
            .iter()
            .filter(|(linked_post, _)| linked_post == post_id)
            .map(|(_, term_id)| *term_id)
            .collect();
        let mut terms: Vec<Term> = state.terms(taxonomy).iter().filter(|t| ids.contains(&t.id)).cloned().collect();
        terms.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(terms)
    }
}

#[async_trait::async_trait]
impl SettingRepository for MockRepository {
    async fn list_settings(&self) -> Result<Vec<Setting>, AppError> {
        let mut settings = self.state.lock().unwrap().settings.clone();
        settings.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(settings)
    }

    async fn get_setting(&self, key: &str) -> Result<Option<Setting>, AppError> {
        Ok(self.state.lock().unwrap().settings.iter().find(|s| s.key == key).cloned())
    }

    async fn upsert_setting(&self, key: &str, value: &str, setting_type: SettingType) -> Result<Setting, AppError> {
        let mut state = self.state.lock().unwrap();
        let setting = Setting {
            key: key.to_string(),
            value: value.to_string(),
            setting_type: setting_type.as_str().to_string(),
        };
        state.settings.retain(|s| s.key != key);
        state.settings.push(setting.clone());
        Ok(setting)
    }

    async fn seed_setting(&self, key: &str, value: &str, setting_type: SettingType) -> Result<(), AppError> {
        let mut state = self.state.lock().unwrap();
        if !state.settings.iter().any(|s| s.key == key) {
            state.settings.push(Setting {
                key: key.to_string(),
                value: value.to_string(),
                setting_type: setting_type.as_str().to_string(),
            });
        }
        Ok(())
    }
}
