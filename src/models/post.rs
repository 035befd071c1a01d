use chrono::{DateTime, Utc};
use rocket::serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::error::app_error::AppError;
use crate::models::comment::CommentResponse;
use crate::models::taxonomy::TermResponse;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(type_name = "post_status", rename_all = "UPPERCASE")]
pub enum PostStatus {
    #[default]
    Draft,
    Published,
    Archived,
}

impl FromStr for PostStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DRAFT" => Ok(PostStatus::Draft),
            "PUBLISHED" => Ok(PostStatus::Published),
            "ARCHIVED" => Ok(PostStatus::Archived),
            other => Err(AppError::BadRequest(format!("Unknown post status: {}", other))),
        }
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            PostStatus::Draft => "DRAFT",
            PostStatus::Published => "PUBLISHED",
            PostStatus::Archived => "ARCHIVED",
        };
        f.write_str(value)
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Post {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub featured_image: Option<String>,
    pub status: PostStatus,
    pub author_id: Uuid,
    pub author_username: String,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub comment_count: i64,
}

/// Column values written on insert and update.
#[derive(Debug, Clone)]
pub struct PostDraft {
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub featured_image: Option<String>,
    pub status: PostStatus,
    pub author_id: Uuid,
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize, Debug, Clone, Validate, JsonSchema)]
pub struct PostRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: String,
    #[validate(length(min = 1, message = "Content is required"))]
    pub content: String,
    #[validate(length(max = 500, message = "Excerpt must be less than 500 characters"))]
    pub excerpt: Option<String>,
    #[validate(url(message = "Featured image must be a valid URL"))]
    pub featured_image: Option<String>,
    #[validate(custom(function = "validate_post_status"))]
    pub status: Option<String>,
    #[serde(default)]
    #[validate(length(max = 20, message = "A post can have at most 20 tags"))]
    pub tags: Vec<String>,
    #[serde(default)]
    #[validate(length(max = 10, message = "A post can have at most 10 categories"))]
    pub categories: Vec<String>,
}

#[derive(Serialize, Debug, Clone, JsonSchema)]
pub struct PostResponse {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub featured_image: Option<String>,
    pub status: PostStatus,
    pub author_id: Uuid,
    pub author_username: String,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub comment_count: i64,
}

impl From<&Post> for PostResponse {
    fn from(post: &Post) -> Self {
        Self {
            id: post.id,
            title: post.title.clone(),
            slug: post.slug.clone(),
            content: post.content.clone(),
            excerpt: post.excerpt.clone(),
            featured_image: post.featured_image.clone(),
            status: post.status,
            author_id: post.author_id,
            author_username: post.author_username.clone(),
            published_at: post.published_at,
            created_at: post.created_at,
            updated_at: post.updated_at,
            comment_count: post.comment_count,
        }
    }
}

#[derive(Serialize, Debug, JsonSchema)]
pub struct PostDetailResponse {
    pub post: PostResponse,
    pub tags: Vec<TermResponse>,
    pub categories: Vec<TermResponse>,
    pub comments: Vec<CommentResponse>,
}

fn validate_post_status(status: &str) -> Result<(), ValidationError> {
    if status.parse::<PostStatus>().is_ok() {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_status").with_message(Cow::Borrowed("Status must be one of DRAFT, PUBLISHED, ARCHIVED")))
    }
}
