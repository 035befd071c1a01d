use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::pagination::PaginationParams;
use crate::models::post::{Post, PostDraft};
use uuid::Uuid;

const POST_SELECT: &str = r#"
    SELECT p.id, p.title, p.slug, p.content, p.excerpt, p.featured_image, p.status, p.author_id,
           u.username AS author_username, p.published_at, p.created_at, p.updated_at,
           (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id AND c.is_approved) AS comment_count
    FROM posts p
    JOIN users u ON u.id = p.author_id
"#;

const SEARCH_FILTER: &str = r#"
    p.status = 'PUBLISHED'
    AND (p.title ILIKE $1 ESCAPE '\' OR p.content ILIKE $1 ESCAPE '\' OR p.excerpt ILIKE $1 ESCAPE '\')
"#;

#[async_trait::async_trait]
pub trait PostRepository: Send + Sync {
    async fn slug_exists(&self, slug: &str) -> Result<bool, AppError>;
    async fn create_post(&self, draft: &PostDraft) -> Result<Post, AppError>;
    async fn update_post(&self, id: &Uuid, draft: &PostDraft) -> Result<Post, AppError>;
    async fn delete_post(&self, id: &Uuid) -> Result<(), AppError>;
    async fn get_post_by_id(&self, id: &Uuid) -> Result<Option<Post>, AppError>;
    async fn get_post_by_slug(&self, slug: &str) -> Result<Option<Post>, AppError>;
    /// Published posts, newest first, with the total count for pagination.
    async fn list_published_posts(&self, params: &PaginationParams) -> Result<(Vec<Post>, i64), AppError>;
    async fn search_published_posts(&self, query: &str, params: &PaginationParams) -> Result<(Vec<Post>, i64), AppError>;
}

/// Escapes LIKE wildcards so user input matches literally.
pub fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait::async_trait]
impl PostRepository for PostgresRepository {
    async fn slug_exists(&self, slug: &str) -> Result<bool, AppError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM posts WHERE slug = $1)")
            .bind(slug)
            .fetch_one(&self.pool)
            .await?;

        Ok(exists)
    }

    async fn create_post(&self, draft: &PostDraft) -> Result<Post, AppError> {
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO posts (title, slug, content, excerpt, featured_image, status, author_id, published_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(&draft.title)
        .bind(&draft.slug)
        .bind(&draft.content)
        .bind(&draft.excerpt)
        .bind(&draft.featured_image)
        .bind(draft.status)
        .bind(draft.author_id)
        .bind(draft.published_at)
        .fetch_one(&self.pool)
        .await?;

        self.get_post_by_id(&id)
            .await?
            .ok_or_else(|| AppError::NotFound("Post not found".to_string()))
    }

    async fn update_post(&self, id: &Uuid, draft: &PostDraft) -> Result<Post, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE posts
            SET title = $2, content = $3, excerpt = $4, featured_image = $5, status = $6,
                published_at = $7, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&draft.title)
        .bind(&draft.content)
        .bind(&draft.excerpt)
        .bind(&draft.featured_image)
        .bind(draft.status)
        .bind(draft.published_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Post not found".to_string()));
        }

        self.get_post_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Post not found".to_string()))
    }

    async fn delete_post(&self, id: &Uuid) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1").bind(id).execute(&self.pool).await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Post not found".to_string()));
        }
        Ok(())
    }

    async fn get_post_by_id(&self, id: &Uuid) -> Result<Option<Post>, AppError> {
        let query = format!("{POST_SELECT} WHERE p.id = $1");
        let post = sqlx::query_as::<_, Post>(&query).bind(id).fetch_optional(&self.pool).await?;

        Ok(post)
    }

    async fn get_post_by_slug(&self, slug: &str) -> Result<Option<Post>, AppError> {
        let query = format!("{POST_SELECT} WHERE p.slug = $1");
        let post = sqlx::query_as::<_, Post>(&query).bind(slug).fetch_optional(&self.pool).await?;

        Ok(post)
    }

    async fn list_published_posts(&self, params: &PaginationParams) -> Result<(Vec<Post>, i64), AppError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE status = 'PUBLISHED'")
            .fetch_one(&self.pool)
            .await?;

        let query = format!("{POST_SELECT} WHERE p.status = 'PUBLISHED' ORDER BY p.published_at DESC NULLS LAST, p.created_at DESC LIMIT $1 OFFSET $2");
        let posts = sqlx::query_as::<_, Post>(&query)
            .bind(params.effective_limit())
            .bind(params.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok((posts, total))
    }

    async fn search_published_posts(&self, query: &str, params: &PaginationParams) -> Result<(Vec<Post>, i64), AppError> {
        let pattern = format!("%{}%", escape_like(query));

        let count_query = format!("SELECT COUNT(*) FROM posts p WHERE {SEARCH_FILTER}");
        let total: i64 = sqlx::query_scalar(&count_query).bind(&pattern).fetch_one(&self.pool).await?;

        let select = format!("{POST_SELECT} WHERE {SEARCH_FILTER} ORDER BY p.published_at DESC NULLS LAST, p.created_at DESC LIMIT $2 OFFSET $3");
        let posts = sqlx::query_as::<_, Post>(&select)
            .bind(&pattern)
            .bind(params.effective_limit())
            .bind(params.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok((posts, total))
    }
}
