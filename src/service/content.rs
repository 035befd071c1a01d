use crate::database::comment::CommentRepository;
use crate::database::post::PostRepository;
use crate::database::settings::SettingRepository;
use crate::database::taxonomy::TaxonomyRepository;
use crate::error::app_error::AppError;
use crate::models::comment::{Comment, CommentRequest, CommentResponse, NewComment};
use crate::models::pagination::{PaginatedResponse, PaginationParams};
use crate::models::post::{Post, PostDetailResponse, PostDraft, PostRequest, PostResponse, PostStatus};
use crate::models::session::Identity;
use crate::models::settings::{ENABLE_COMMENTS, Setting, SettingRequest};
use crate::models::taxonomy::{NewTerm, Taxonomy, Term, TermRequest, TermResponse};
use crate::models::user::Role;
use crate::service::validation::{sanitize_input, sanitize_optional};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

const MAX_SLUG_ATTEMPTS: u32 = 1000;

/// Posts, comments, taxonomy and site settings.
pub struct ContentService<'a, R> {
    repository: &'a R,
}

impl<'a, R> ContentService<'a, R>
where
    R: PostRepository + CommentRepository + TaxonomyRepository + SettingRepository,
{
    pub fn new(repository: &'a R) -> Self {
        ContentService { repository }
    }

    pub async fn create_post(&self, author: &Identity, request: &PostRequest) -> Result<Post, AppError> {
        let title = sanitize_input(&request.title);
        let slug = self.unique_slug(&title).await?;
        let status = parse_status(request.status.as_deref())?;

        let post = self
            .repository
            .create_post(&PostDraft {
                title,
                slug,
                content: request.content.clone(),
                excerpt: sanitize_optional(request.excerpt.as_deref()),
                featured_image: request.featured_image.clone(),
                status,
                author_id: author.id,
                published_at: (status == PostStatus::Published).then(Utc::now),
            })
            .await?;

        self.link_terms(&post.id, request).await?;
        info!(post_id = %post.id, author_id = %author.id, slug = %post.slug, "post created");
        Ok(post)
    }

    /// Slug stays as first generated; `published_at` is stamped on the first publish.
    pub async fn update_post(&self, actor: &Identity, id: &Uuid, request: &PostRequest) -> Result<Post, AppError> {
        let existing = self.get_post(id).await?;
        ensure_owner_or_admin(actor, &existing.author_id)?;

        let status = match request.status.as_deref() {
            Some(status) => status.parse::<PostStatus>()?,
            None => existing.status,
        };
        let published_at = match (status, existing.published_at) {
            (PostStatus::Published, None) => Some(Utc::now()),
            (_, published_at) => published_at,
        };

        let post = self
            .repository
            .update_post(
                id,
                &PostDraft {
                    title: sanitize_input(&request.title),
                    slug: existing.slug.clone(),
                    content: request.content.clone(),
                    excerpt: sanitize_optional(request.excerpt.as_deref()),
                    featured_image: request.featured_image.clone(),
                    status,
                    author_id: existing.author_id,
                    published_at,
                },
            )
            .await?;

        self.link_terms(&post.id, request).await?;
        info!(post_id = %post.id, actor_id = %actor.id, "post updated");
        Ok(post)
    }

    pub async fn delete_post(&self, actor: &Identity, id: &Uuid) -> Result<(), AppError> {
        let existing = self.get_post(id).await?;
        ensure_owner_or_admin(actor, &existing.author_id)?;

        self.repository.delete_post(id).await?;
        info!(post_id = %id, actor_id = %actor.id, "post deleted");
        Ok(())
    }

    pub async fn list_published(&self, params: &PaginationParams) -> Result<PaginatedResponse<PostResponse>, AppError> {
        let (posts, total) = self.repository.list_published_posts(params).await?;
        Ok(PaginatedResponse::new(posts.iter().map(PostResponse::from).collect(), params, total))
    }

    pub async fn search(&self, query: &str, params: &PaginationParams) -> Result<PaginatedResponse<PostResponse>, AppError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::BadRequest("Search query must not be empty".to_string()));
        }

        let (posts, total) = self.repository.search_published_posts(query, params).await?;
        Ok(PaginatedResponse::new(posts.iter().map(PostResponse::from).collect(), params, total))
    }

    /// Unpublished posts are visible only to their author or an admin; everyone
    /// else gets the same not-found as for a missing slug.
    pub async fn get_post_detail(&self, slug: &str, viewer: Option<&Identity>) -> Result<PostDetailResponse, AppError> {
        let post = self
            .repository
            .get_post_by_slug(slug)
            .await?
            .filter(|post| can_view(post, viewer))
            .ok_or_else(|| AppError::NotFound("Post not found".to_string()))?;

        let tags = self.repository.list_post_terms(Taxonomy::Tag, &post.id).await?;
        let categories = self.repository.list_post_terms(Taxonomy::Category, &post.id).await?;
        let comments = self.repository.list_comments_for_post(&post.id, false).await?;

        Ok(PostDetailResponse {
            post: PostResponse::from(&post),
            tags: tags.iter().map(TermResponse::from).collect(),
            categories: categories.iter().map(TermResponse::from).collect(),
            comments: comments.iter().map(CommentResponse::from).collect(),
        })
    }

    pub async fn create_comment(&self, author: &Identity, request: &CommentRequest) -> Result<Comment, AppError> {
        if !self.comments_enabled().await? {
            return Err(AppError::Forbidden);
        }

        let post = self
            .repository
            .get_post_by_id(&request.post_id)
            .await?
            .filter(|post| post.status == PostStatus::Published)
            .ok_or_else(|| AppError::NotFound("Post not found".to_string()))?;

        if let Some(parent_id) = request.parent_id {
            let parent = self
                .repository
                .get_comment_by_id(&parent_id)
                .await?
                .ok_or_else(|| AppError::NotFound("Parent comment not found".to_string()))?;
            if parent.post_id != post.id {
                return Err(AppError::BadRequest("Parent comment belongs to a different post".to_string()));
            }
        }

        let content = sanitize_input(&request.content);
        if content.is_empty() {
            return Err(AppError::Validation(vec!["content: Comment must not be empty".to_string()]));
        }

        let comment = self
            .repository
            .create_comment(&NewComment {
                content,
                author_id: author.id,
                post_id: post.id,
                parent_id: request.parent_id,
                is_approved: author.role == Role::Admin,
            })
            .await?;

        info!(comment_id = %comment.id, post_id = %post.id, approved = comment.is_approved, "comment created");
        Ok(comment)
    }

    /// Moderators see pending comments too.
    pub async fn list_comments(&self, post_id: &Uuid, viewer: Option<&Identity>) -> Result<Vec<Comment>, AppError> {
        let include_unapproved = viewer.is_some_and(|v| v.role == Role::Admin);
        self.repository.list_comments_for_post(post_id, include_unapproved).await
    }

    pub async fn approve_comment(&self, actor: &Identity, id: &Uuid) -> Result<Comment, AppError> {
        actor.ensure_role(Role::Admin)?;
        let comment = self.repository.approve_comment(id).await?;
        info!(comment_id = %id, actor_id = %actor.id, "comment approved");
        Ok(comment)
    }

    pub async fn delete_comment(&self, actor: &Identity, id: &Uuid) -> Result<(), AppError> {
        let comment = self
            .repository
            .get_comment_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))?;
        ensure_owner_or_admin(actor, &comment.author_id)?;

        self.repository.delete_comment(id).await?;
        info!(comment_id = %id, actor_id = %actor.id, "comment deleted");
        Ok(())
    }

    pub async fn list_terms(&self, taxonomy: Taxonomy) -> Result<Vec<Term>, AppError> {
        self.repository.list_terms(taxonomy).await
    }

    pub async fn create_term(&self, actor: &Identity, taxonomy: Taxonomy, request: &TermRequest) -> Result<Term, AppError> {
        actor.ensure_role(Role::Admin)?;
        let term = new_term(&request.name, request.description.as_deref())?;
        self.repository.create_term(taxonomy, &term).await
    }

    pub async fn delete_term(&self, actor: &Identity, taxonomy: Taxonomy, id: &Uuid) -> Result<(), AppError> {
        actor.ensure_role(Role::Admin)?;
        self.repository.delete_term(taxonomy, id).await
    }

    pub async fn list_settings(&self) -> Result<Vec<Setting>, AppError> {
        self.repository.list_settings().await
    }

    pub async fn get_setting(&self, key: &str) -> Result<Setting, AppError> {
        self.repository
            .get_setting(key)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Setting '{}' not found", key)))
    }

    pub async fn set_setting(&self, actor: &Identity, key: &str, request: &SettingRequest) -> Result<Setting, AppError> {
        actor.ensure_role(Role::Admin)?;
        let key = key.trim();
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.') {
            return Err(AppError::BadRequest("Setting keys may contain letters, digits, '_' and '.'".to_string()));
        }

        let setting = self.repository.upsert_setting(key, &request.value, request.setting_type).await?;
        info!(key = %key, actor_id = %actor.id, "setting updated");
        Ok(setting)
    }

    async fn comments_enabled(&self) -> Result<bool, AppError> {
        Ok(self.repository.get_setting(ENABLE_COMMENTS).await?.is_none_or(|s| s.as_bool()))
    }

    async fn get_post(&self, id: &Uuid) -> Result<Post, AppError> {
        self.repository
            .get_post_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Post not found".to_string()))
    }

    async fn unique_slug(&self, title: &str) -> Result<String, AppError> {
        let base = slugify(title);
        if !self.repository.slug_exists(&base).await? {
            return Ok(base);
        }

        for suffix in 2..=MAX_SLUG_ATTEMPTS {
            let candidate = format!("{}-{}", base, suffix);
            if !self.repository.slug_exists(&candidate).await? {
                return Ok(candidate);
            }
        }
        Err(AppError::Conflict(format!("Could not allocate a unique slug for '{}'", base)))
    }

    async fn link_terms(&self, post_id: &Uuid, request: &PostRequest) -> Result<(), AppError> {
        for (taxonomy, names) in [(Taxonomy::Tag, &request.tags), (Taxonomy::Category, &request.categories)] {
            let mut known = self.repository.list_terms(taxonomy).await?;
            let mut ids = Vec::with_capacity(names.len());
            for name in names {
                let Ok(term) = new_term(name, None) else { continue };
                let id = self.resolve_term(taxonomy, &mut known, term).await?;
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
            self.repository.set_post_terms(taxonomy, post_id, &ids).await?;
        }
        Ok(())
    }

    /// Reuses the term whose name matches case-insensitively. A slug already held by a
    /// differently named term is suffixed `-2`, `-3`, ... instead of being shared.
    async fn resolve_term(&self, taxonomy: Taxonomy, known: &mut Vec<Term>, term: NewTerm) -> Result<Uuid, AppError> {
        let wanted = term.name.to_lowercase();
        if let Some(existing) = known.iter().find(|t| t.name.to_lowercase() == wanted) {
            return Ok(existing.id);
        }

        for attempt in 1..=MAX_SLUG_ATTEMPTS {
            let slug = if attempt == 1 { term.slug.clone() } else { format!("{}-{}", term.slug, attempt) };
            if known.iter().any(|t| t.slug == slug) {
                continue;
            }

            let created = self.repository.create_term(taxonomy, &NewTerm { slug, ..term }).await?;
            let id = created.id;
            known.push(created);
            return Ok(id);
        }
        Err(AppError::Conflict(format!("Could not allocate a unique slug for '{}'", term.name)))
    }
}

fn parse_status(status: Option<&str>) -> Result<PostStatus, AppError> {
    match status {
        Some(status) => status.parse(),
        None => Ok(PostStatus::default()),
    }
}

fn can_view(post: &Post, viewer: Option<&Identity>) -> bool {
    post.status == PostStatus::Published || viewer.is_some_and(|v| v.id == post.author_id || v.role == Role::Admin)
}

fn ensure_owner_or_admin(actor: &Identity, owner_id: &Uuid) -> Result<(), AppError> {
    if actor.id == *owner_id || actor.role == Role::Admin {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

fn new_term(name: &str, description: Option<&str>) -> Result<NewTerm, AppError> {
    let name = sanitize_input(name);
    let slug = term_slug(&name);
    if name.is_empty() {
        return Err(AppError::Validation(vec!["name: Name must not be empty".to_string()]));
    }
    Ok(NewTerm {
        name,
        slug,
        description: sanitize_optional(description),
    })
}

/// Lowercase ASCII words joined by single hyphens; falls back to `post`.
pub fn slugify(text: &str) -> String {
    let slug = hyphenate(text.chars().map(|c| c.is_ascii_alphanumeric().then(|| c.to_ascii_lowercase().to_string())));
    if slug.is_empty() { "post".to_string() } else { slug }
}

/// Like [`slugify`], but symbols common in tag names are spelled out and other
/// non-ASCII letters become `u<hex>` so that `C++`, `C#` and `日本` stay apart.
pub fn term_slug(name: &str) -> String {
    let slug = hyphenate(name.chars().map(|c| match c {
        c if c.is_ascii_alphanumeric() => Some(c.to_ascii_lowercase().to_string()),
        '+' => Some("plus".to_string()),
        '#' => Some("sharp".to_string()),
        '&' => Some("and".to_string()),
        '@' => Some("at".to_string()),
        c if c.is_alphanumeric() => Some(format!("u{:x}", c as u32)),
        _ => None,
    }));
    if slug.is_empty() { "term".to_string() } else { slug }
}

/// Joins the `Some` pieces with single hyphens wherever a `None` separated them or
/// two spelled-out symbols meet.
fn hyphenate(pieces: impl Iterator<Item = Option<String>>) -> String {
    let mut slug = String::new();
    let mut pending_hyphen = false;
    let mut last_was_word = false;

    for piece in pieces {
        match piece {
            Some(piece) => {
                let is_char = piece.len() == 1;
                if !slug.is_empty() && (pending_hyphen || !is_char || !last_was_word) {
                    slug.push('-');
                }
                slug.push_str(&piece);
                pending_hyphen = false;
                last_was_word = is_char;
            }
            None => pending_hyphen = true,
        }
    }
    slug
}
