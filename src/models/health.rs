use rocket::serde::Serialize;

#[derive(Serialize, Debug)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
    pub version: &'static str,
}

impl HealthResponse {
    pub fn new(database_up: bool) -> Self {
        Self {
            status: if database_up { "ok" } else { "degraded" },
            database: if database_up { "up" } else { "down" },
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}
