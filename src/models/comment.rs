use chrono::{DateTime, Utc};
use rocket::serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Comment {
    pub id: Uuid,
    pub content: String,
    pub author_id: Uuid,
    pub author_username: String,
    pub post_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub content: String,
    pub author_id: Uuid,
    pub post_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub is_approved: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, Validate, JsonSchema)]
pub struct CommentRequest {
    #[validate(length(min = 1, max = 1000, message = "Comment must be between 1 and 1000 characters"))]
    pub content: String,
    pub post_id: Uuid,
    pub parent_id: Option<Uuid>,
}

#[derive(Serialize, Debug, Clone, JsonSchema)]
pub struct CommentResponse {
    pub id: Uuid,
    pub content: String,
    pub author_id: Uuid,
    pub author_username: String,
    pub post_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&Comment> for CommentResponse {
    fn from(comment: &Comment) -> Self {
        Self {
            id: comment.id,
            content: comment.content.clone(),
            author_id: comment.author_id,
            author_username: comment.author_username.clone(),
            post_id: comment.post_id,
            parent_id: comment.parent_id,
            is_approved: comment.is_approved,
            created_at: comment.created_at,
        }
    }
}
