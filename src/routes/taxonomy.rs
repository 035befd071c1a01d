use crate::auth::CurrentUser;
use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::middleware::rate_limit::RateLimit;
use crate::models::session::Identity;
use crate::models::taxonomy::{Taxonomy, TermRequest, TermResponse};
use crate::service::content::ContentService;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{State, delete, get, post};
use rocket_okapi::openapi;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

async fn list(pool: &PgPool, taxonomy: Taxonomy) -> Result<Json<Vec<TermResponse>>, AppError> {
    let repo = PostgresRepository::new(pool);
    let terms = ContentService::new(&repo).list_terms(taxonomy).await?;
    Ok(Json(terms.iter().map(TermResponse::from).collect()))
}

async fn create(pool: &PgPool, actor: &Identity, taxonomy: Taxonomy, payload: &TermRequest) -> Result<Json<TermResponse>, AppError> {
    payload.validate()?;

    let repo = PostgresRepository::new(pool);
    let term = ContentService::new(&repo).create_term(actor, taxonomy, payload).await?;
    Ok(Json(TermResponse::from(&term)))
}

async fn remove(pool: &PgPool, actor: &Identity, taxonomy: Taxonomy, id: &str) -> Result<Status, AppError> {
    let uuid = Uuid::parse_str(id)?;
    let repo = PostgresRepository::new(pool);
    ContentService::new(&repo).delete_term(actor, taxonomy, &uuid).await?;
    Ok(Status::NoContent)
}

#[openapi(tag = "Tags")]
#[get("/")]
pub async fn list_tags(pool: &State<PgPool>, _rate_limit: RateLimit) -> Result<Json<Vec<TermResponse>>, AppError> {
    list(pool, Taxonomy::Tag).await
}

/// Create a tag (admin); the slug is derived from the name
#[openapi(tag = "Tags")]
#[post("/", data = "<payload>")]
pub async fn create_tag(
    pool: &State<PgPool>,
    _rate_limit: RateLimit,
    current_user: CurrentUser,
    payload: Json<TermRequest>,
) -> Result<Json<TermResponse>, AppError> {
    create(pool, &current_user.identity, Taxonomy::Tag, &payload).await
}

#[openapi(tag = "Tags")]
#[delete("/<id>")]
pub async fn delete_tag(pool: &State<PgPool>, _rate_limit: RateLimit, current_user: CurrentUser, id: &str) -> Result<Status, AppError> {
    remove(pool, &current_user.identity, Taxonomy::Tag, id).await
}

#[openapi(tag = "Categories")]
#[get("/")]
pub async fn list_categories(pool: &State<PgPool>, _rate_limit: RateLimit) -> Result<Json<Vec<TermResponse>>, AppError> {
    list(pool, Taxonomy::Category).await
}

/// Create a category (admin); the slug is derived from the name
#[openapi(tag = "Categories")]
#[post("/", data = "<payload>")]
pub async fn create_category(
    pool: &State<PgPool>,
    _rate_limit: RateLimit,
    current_user: CurrentUser,
    payload: Json<TermRequest>,
) -> Result<Json<TermResponse>, AppError> {
    create(pool, &current_user.identity, Taxonomy::Category, &payload).await
}

#[openapi(tag = "Categories")]
#[delete("/<id>")]
pub async fn delete_category(pool: &State<PgPool>, _rate_limit: RateLimit, current_user: CurrentUser, id: &str) -> Result<Status, AppError> {
    remove(pool, &current_user.identity, Taxonomy::Category, id).await
}

pub fn tag_routes() -> (Vec<rocket::Route>, okapi::openapi3::OpenApi) {
    rocket_okapi::openapi_get_routes_spec![list_tags, create_tag, delete_tag]
}

pub fn category_routes() -> (Vec<rocket::Route>, okapi::openapi3::OpenApi) {
    rocket_okapi::openapi_get_routes_spec![list_categories, create_category, delete_category]
}
