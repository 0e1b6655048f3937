use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::error::AppResult;

/// Creates a PostgreSQL connection pool
pub async fn create_pool(database_url: &str) -> AppResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// Creates the movies, users and ratings tables if they do not exist
pub async fn run_migrations(pool: &PgPool) -> AppResult<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
