use crate::models::health::HealthResponse;
use rocket::serde::json::Json;
use rocket::{State, http::Status, routes};
use sqlx::PgPool;

#[rocket::get("/")]
pub async fn healthcheck(pool: &State<PgPool>) -> (Status, Json<HealthResponse>) {
    let database_up = match sqlx::query("SELECT 1").execute(pool.inner()).await {
        Ok(_) => true,
        Err(err) => {
            tracing::error!(error = %err, "health check could not reach the database");
            false
        }
    };

    let status = if database_up { Status::Ok } else { Status::ServiceUnavailable };
    (status, Json(HealthResponse::new(database_up)))
}

pub fn routes() -> Vec<rocket::Route> {
    routes![healthcheck]
}
