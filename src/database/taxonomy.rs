use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::taxonomy::{NewTerm, Taxonomy, Term};
use uuid::Uuid;

/// Storage for tags and categories. Table names come from the closed
/// `Taxonomy` enum, never from input.
#[async_trait::async_trait]
pub trait TaxonomyRepository: Send + Sync {
    async fn list_terms(&self, taxonomy: Taxonomy) -> Result<Vec<Term>, AppError>;
    async fn create_term(&self, taxonomy: Taxonomy, term: &NewTerm) -> Result<Term, AppError>;
    /// Returns the existing term with the same slug or inserts a new one.
    async fn upsert_term(&self, taxonomy: Taxonomy, term: &NewTerm) -> Result<Term, AppError>;
    async fn delete_term(&self, taxonomy: Taxonomy, id: &Uuid) -> Result<(), AppError>;
    /// Replaces the post's links in this taxonomy.
    async fn set_post_terms(&self, taxonomy: Taxonomy, post_id: &Uuid, term_ids: &[Uuid]) -> Result<(), AppError>;
    async fn list_post_terms(&self, taxonomy: Taxonomy, post_id: &Uuid) -> Result<Vec<Term>, AppError>;
}

#[async_trait::async_trait]
impl TaxonomyRepository for PostgresRepository {
    async fn list_terms(&self, taxonomy: Taxonomy) -> Result<Vec<Term>, AppError> {
        let query = format!("SELECT id, name, slug, description FROM {} ORDER BY name ASC", taxonomy.table());
        let terms = sqlx::query_as::<_, Term>(&query).fetch_all(&self.pool).await?;

        Ok(terms)
    }

    async fn create_term(&self, taxonomy: Taxonomy, term: &NewTerm) -> Result<Term, AppError> {
        let query = format!(
            "INSERT INTO {} (name, slug, description) VALUES ($1, $2, $3) RETURNING id, name, slug, description",
            taxonomy.table()
        );
        let created = sqlx::query_as::<_, Term>(&query)
            .bind(&term.name)
            .bind(&term.slug)
            .bind(&term.description)
            .fetch_one(&self.pool)
            .await?;

        Ok(created)
    }

    async fn upsert_term(&self, taxonomy: Taxonomy, term: &NewTerm) -> Result<Term, AppError> {
        // The no-op update makes RETURNING yield the existing row on conflict.
        let query = format!(
            r#"
            INSERT INTO {} (name, slug, description) VALUES ($1, $2, $3)
            ON CONFLICT (slug) DO UPDATE SET slug = EXCLUDED.slug
            RETURNING id, name, slug, description
            "#,
            taxonomy.table()
        );
        let upserted = sqlx::query_as::<_, Term>(&query)
            .bind(&term.name)
            .bind(&term.slug)
            .bind(&term.description)
            .fetch_one(&self.pool)
            .await?;

        Ok(upserted)
    }

    async fn delete_term(&self, taxonomy: Taxonomy, id: &Uuid) -> Result<(), AppError> {
        let query = format!("DELETE FROM {} WHERE id = $1", taxonomy.table());
        let result = sqlx::query(&query).bind(id).execute(&self.pool).await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("{} not found", taxonomy.label())));
        }
        Ok(())
    }

    async fn set_post_terms(&self, taxonomy: Taxonomy, post_id: &Uuid, term_ids: &[Uuid]) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        let delete = format!("DELETE FROM {} WHERE post_id = $1", taxonomy.link_table());
        sqlx::query(&delete).bind(post_id).execute(&mut *tx).await?;

        let insert = format!(
            "INSERT INTO {} (post_id, {}) SELECT $1, UNNEST($2::uuid[]) ON CONFLICT DO NOTHING",
            taxonomy.link_table(),
            taxonomy.link_column()
        );
        sqlx::query(&insert).bind(post_id).bind(term_ids).execute(&mut *tx).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn list_post_terms(&self, taxonomy: Taxonomy, post_id: &Uuid) -> Result<Vec<Term>, AppError> {
        let query = format!(
            r#"
            SELECT t.id, t.name, t.slug, t.description
            FROM {table} t
            JOIN {link} l ON l.{column} = t.id
            WHERE l.post_id = $1
            ORDER BY t.name ASC
            "#,
            table = taxonomy.table(),
            link = taxonomy.link_table(),
            column = taxonomy.link_column()
        );
        let terms = sqlx::query_as::<_, Term>(&query).bind(post_id).fetch_all(&self.pool).await?;

        Ok(terms)
    }
}
