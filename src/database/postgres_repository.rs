use sqlx::PgPool;

/// sqlx-backed implementation of every repository trait; cheap to clone per request.
#[derive(Clone)]
pub struct PostgresRepository {
    pub pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: &PgPool) -> Self {
        Self { pool: pool.clone() }
    }
}
