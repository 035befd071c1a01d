use crate::auth::{CurrentUser, OptionalUser};
use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::middleware::rate_limit::RateLimit;
use crate::models::pagination::{PaginatedResponse, PaginationParams};
use crate::models::post::{PostDetailResponse, PostRequest, PostResponse};
use crate::service::content::ContentService;
use crate::service::validation::validate_input;
use rocket::http::Status;
use rocket::response::status;
use rocket::serde::json::Json;
use rocket::{State, delete, get, post, put};
use rocket_okapi::openapi;
use sqlx::PgPool;
use uuid::Uuid;

/// List published posts, newest first
#[openapi(tag = "Posts")]
#[get("/?<page>&<limit>")]
pub async fn list_posts(
    pool: &State<PgPool>,
    _rate_limit: RateLimit,
    page: Option<i64>,
    limit: Option<i64>,
) -> Result<Json<PaginatedResponse<PostResponse>>, AppError> {
    let repo = PostgresRepository::new(pool);
    let params = PaginationParams::new(page, limit);
    Ok(Json(ContentService::new(&repo).list_published(&params).await?))
}

/// Case-insensitive search over title, content and excerpt of published posts
#[openapi(tag = "Posts")]
#[get("/search?<q>&<page>&<limit>")]
pub async fn search_posts(
    pool: &State<PgPool>,
    _rate_limit: RateLimit,
    q: &str,
    page: Option<i64>,
    limit: Option<i64>,
) -> Result<Json<PaginatedResponse<PostResponse>>, AppError> {
    let repo = PostgresRepository::new(pool);
    let params = PaginationParams::new(page, limit);
    Ok(Json(ContentService::new(&repo).search(q, &params).await?))
}

/// Get a post with its tags, categories and approved comments
///
/// Drafts and archived posts are only visible to their author and administrators.
#[openapi(tag = "Posts")]
#[get("/<slug>")]
pub async fn get_post(pool: &State<PgPool>, _rate_limit: RateLimit, viewer: OptionalUser, slug: &str) -> Result<Json<PostDetailResponse>, AppError> {
    let repo = PostgresRepository::new(pool);
    Ok(Json(ContentService::new(&repo).get_post_detail(slug, viewer.identity()).await?))
}

#[openapi(tag = "Posts")]
#[post("/", data = "<payload>")]
pub async fn create_post(
    pool: &State<PgPool>,
    _rate_limit: RateLimit,
    current_user: CurrentUser,
    payload: Json<PostRequest>,
) -> Result<status::Created<Json<PostResponse>>, AppError> {
    let payload = validate_input(payload.into_inner()).into_result()?;

    let repo = PostgresRepository::new(pool);
    let post = ContentService::new(&repo).create_post(&current_user.identity, &payload).await?;
    Ok(status::Created::new(format!("/posts/{}", post.slug)).body(Json(PostResponse::from(&post))))
}

/// Update a post (author or admin); the slug never changes
#[openapi(tag = "Posts")]
#[put("/<id>", data = "<payload>")]
pub async fn put_post(
    pool: &State<PgPool>,
    _rate_limit: RateLimit,
    current_user: CurrentUser,
    id: &str,
    payload: Json<PostRequest>,
) -> Result<Json<PostResponse>, AppError> {
    let payload = validate_input(payload.into_inner()).into_result()?;

    let uuid = Uuid::parse_str(id)?;
    let repo = PostgresRepository::new(pool);
    let post = ContentService::new(&repo).update_post(&current_user.identity, &uuid, &payload).await?;
    Ok(Json(PostResponse::from(&post)))
}

#[openapi(tag = "Posts")]
#[delete("/<id>")]
pub async fn delete_post(pool: &State<PgPool>, _rate_limit: RateLimit, current_user: CurrentUser, id: &str) -> Result<Status, AppError> {
    let uuid = Uuid::parse_str(id)?;
    let repo = PostgresRepository::new(pool);
    ContentService::new(&repo).delete_post(&current_user.identity, &uuid).await?;
    Ok(Status::NoContent)
}

pub fn routes() -> (Vec<rocket::Route>, okapi::openapi3::OpenApi) {
    rocket_okapi::openapi_get_routes_spec![list_posts, search_posts, get_post, create_post, put_post, delete_post]
}
