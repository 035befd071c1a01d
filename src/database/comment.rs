use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::comment::{Comment, NewComment};
use uuid::Uuid;

const COMMENT_SELECT: &str = r#"
    SELECT c.id, c.content, c.author_id, u.username AS author_username, c.post_id, c.parent_id,
           c.is_approved, c.created_at
    FROM comments c
    JOIN users u ON u.id = c.author_id
"#;

#[async_trait::async_trait]
pub trait CommentRepository: Send + Sync {
    async fn create_comment(&self, comment: &NewComment) -> Result<Comment, AppError>;
    async fn get_comment_by_id(&self, id: &Uuid) -> Result<Option<Comment>, AppError>;
    /// Oldest first; unapproved comments are included only when asked for.
    async fn list_comments_for_post(&self, post_id: &Uuid, include_unapproved: bool) -> Result<Vec<Comment>, AppError>;
    async fn approve_comment(&self, id: &Uuid) -> Result<Comment, AppError>;
    async fn delete_comment(&self, id: &Uuid) -> Result<(), AppError>;
}

#[async_trait::async_trait]
impl CommentRepository for PostgresRepository {
    async fn create_comment(&self, comment: &NewComment) -> Result<Comment, AppError> {
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO comments (content, author_id, post_id, parent_id, is_approved)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(&comment.content)
        .bind(comment.author_id)
        .bind(comment.post_id)
        .bind(comment.parent_id)
        .bind(comment.is_approved)
        .fetch_one(&self.pool)
        .await?;

        self.get_comment_by_id(&id)
            .await?
            .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))
    }

    async fn get_comment_by_id(&self, id: &Uuid) -> Result<Option<Comment>, AppError> {
        let query = format!("{COMMENT_SELECT} WHERE c.id = $1");
        let comment = sqlx::query_as::<_, Comment>(&query).bind(id).fetch_optional(&self.pool).await?;

        Ok(comment)
    }

    async fn list_comments_for_post(&self, post_id: &Uuid, include_unapproved: bool) -> Result<Vec<Comment>, AppError> {
        let query = format!("{COMMENT_SELECT} WHERE c.post_id = $1 AND (c.is_approved OR $2) ORDER BY c.created_at ASC");
        let comments = sqlx::query_as::<_, Comment>(&query)
            .bind(post_id)
            .bind(include_unapproved)
            .fetch_all(&self.pool)
            .await?;

        Ok(comments)
    }

    async fn approve_comment(&self, id: &Uuid) -> Result<Comment, AppError> {
        let result = sqlx::query("UPDATE comments SET is_approved = TRUE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Comment not found".to_string()));
        }

        self.get_comment_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))
    }

    async fn delete_comment(&self, id: &Uuid) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1").bind(id).execute(&self.pool).await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Comment not found".to_string()));
        }
        Ok(())
    }
}
