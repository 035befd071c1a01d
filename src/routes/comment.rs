use crate::auth::{CurrentUser, OptionalUser};
use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::middleware::rate_limit::RateLimit;
use crate::models::comment::{CommentRequest, CommentResponse};
use crate::service::content::ContentService;
use crate::service::validation::validate_input;
use rocket::http::Status;
use rocket::response::status;
use rocket::serde::json::Json;
use rocket::{State, delete, get, post};
use rocket_okapi::openapi;
use sqlx::PgPool;
use uuid::Uuid;

/// Comment on a published post; comments await approval unless posted by an admin
#[openapi(tag = "Comments")]
#[post("/", data = "<payload>")]
pub async fn create_comment(
    pool: &State<PgPool>,
    _rate_limit: RateLimit,
    current_user: CurrentUser,
    payload: Json<CommentRequest>,
) -> Result<status::Created<Json<CommentResponse>>, AppError> {
    let payload = validate_input(payload.into_inner()).into_result()?;

    let repo = PostgresRepository::new(pool);
    let comment = ContentService::new(&repo).create_comment(&current_user.identity, &payload).await?;
    Ok(status::Created::new(format!("/comments/post/{}", comment.post_id)).body(Json(CommentResponse::from(&comment))))
}

/// Comments of a post in posting order; admins also see pending ones
#[openapi(tag = "Comments")]
#[get("/post/<post_id>")]
pub async fn list_post_comments(
    pool: &State<PgPool>,
    _rate_limit: RateLimit,
    viewer: OptionalUser,
    post_id: &str,
) -> Result<Json<Vec<CommentResponse>>, AppError> {
    let uuid = Uuid::parse_str(post_id)?;
    let repo = PostgresRepository::new(pool);
    let comments = ContentService::new(&repo).list_comments(&uuid, viewer.identity()).await?;
    Ok(Json(comments.iter().map(CommentResponse::from).collect()))
}

#[openapi(tag = "Comments")]
#[post("/<id>/approve")]
pub async fn approve_comment(pool: &State<PgPool>, _rate_limit: RateLimit, current_user: CurrentUser, id: &str) -> Result<Json<CommentResponse>, AppError> {
    let uuid = Uuid::parse_str(id)?;
    let repo = PostgresRepository::new(pool);
    let comment = ContentService::new(&repo).approve_comment(&current_user.identity, &uuid).await?;
    Ok(Json(CommentResponse::from(&comment)))
}

#[openapi(tag = "Comments")]
#[delete("/<id>")]
pub async fn delete_comment(pool: &State<PgPool>, _rate_limit: RateLimit, current_user: CurrentUser, id: &str) -> Result<Status, AppError> {
    let uuid = Uuid::parse_str(id)?;
    let repo = PostgresRepository::new(pool);
    ContentService::new(&repo).delete_comment(&current_user.identity, &uuid).await?;
    Ok(Status::NoContent)
}

pub fn routes() -> (Vec<rocket::Route>, okapi::openapi3::OpenApi) {
    rocket_okapi::openapi_get_routes_spec![create_comment, list_post_comments, approve_comment, delete_comment]
}
