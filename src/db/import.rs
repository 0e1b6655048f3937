//! Bulk import of the dataset into PostgreSQL.
//!
//! Movies and users are upserted by identity. Ratings are appended in capped
//! batches, each committed in its own transaction and retried a bounded
//! number of times. Resetting a table deletes in fixed-size chunks until a
//! chunk removes nothing.

use async_trait::async_trait;
use serde::Serialize;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::{
    config::Config,
    data,
    error::{AppError, AppResult},
    models::{Interaction, Item, User},
};

use super::postgres::{create_pool, run_migrations};

/// Rows per multi-row upsert statement, well under the bind parameter limit
const UPSERT_CHUNK: usize = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Movies,
    Users,
    Ratings,
}

impl Table {
    pub const ALL: [Table; 3] = [Table::Movies, Table::Users, Table::Ratings];

    pub fn name(&self) -> &'static str {
        match self {
            Table::Movies => "movies",
            Table::Users => "users",
            Table::Ratings => "ratings",
        }
    }
}

/// Removes up to `limit` rows from a table and reports how many went
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BatchDeleter: Send + Sync {
    async fn delete_batch(&self, table: Table, limit: usize) -> AppResult<u64>;
}

/// Commits one batch of ratings atomically
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RatingsSink: Send + Sync {
    async fn commit_batch(&self, batch: &[Interaction]) -> AppResult<()>;
}

/// Empties `table` chunk by chunk, stopping at the first chunk that deletes nothing.
pub async fn clear_table(
    deleter: &dyn BatchDeleter,
    table: Table,
    batch_size: usize,
) -> AppResult<u64> {
    if batch_size == 0 {
        return Err(AppError::InvalidInput(
            "Delete batch size must be positive".to_string(),
        ));
    }

    let mut total = 0;
    loop {
        let deleted = deleter.delete_batch(table, batch_size).await?;
        if deleted == 0 {
            break;
        }
        total += deleted;
        tracing::debug!(table = table.name(), deleted, total, "Deleted batch");
    }

    tracing::info!(table = table.name(), total, "Cleared table");
    Ok(total)
}

/// Writes ratings in sequential batches of at most `batch_size` rows.
///
/// A failing batch is retried up to `max_attempts` times in total; batches
/// already committed stay committed if a later one gives up.
pub async fn write_in_batches(
    sink: &dyn RatingsSink,
    ratings: &[Interaction],
    batch_size: usize,
    max_attempts: u32,
) -> AppResult<usize> {
    if batch_size == 0 || max_attempts == 0 {
        return Err(AppError::InvalidInput(
            "Batch size and attempts must be positive".to_string(),
        ));
    }

    let mut written = 0;
    for batch in ratings.chunks(batch_size) {
        let mut attempt = 1;
        loop {
            match sink.commit_batch(batch).await {
                Ok(()) => break,
                Err(e) if attempt < max_attempts => {
                    tracing::warn!(attempt, error = %e, "Ratings batch failed, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
        written += batch.len();
        tracing::info!(written, total = ratings.len(), "Committed ratings batch");
    }

    Ok(written)
}

/// PostgreSQL-backed store for imported records
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn upsert_movies(&self, items: &[Item]) -> AppResult<usize> {
        for chunk in items.chunks(UPSERT_CHUNK) {
            let mut builder: QueryBuilder<Postgres> =
                QueryBuilder::new("INSERT INTO movies (movie_id, title, year, genres) ");
            builder.push_values(chunk, |mut row, item| {
                row.push_bind(i64::from(item.id))
                    .push_bind(item.title.clone())
                    .push_bind(item.year)
                    .push_bind(item.tags.clone());
            });
            builder.push(
                " ON CONFLICT (movie_id) DO UPDATE SET title = EXCLUDED.title, \
                 year = EXCLUDED.year, genres = EXCLUDED.genres",
            );
            builder.build().execute(&self.pool).await?;
        }
        Ok(items.len())
    }

    pub async fn upsert_users(&self, users: &[User]) -> AppResult<usize> {
        for chunk in users.chunks(UPSERT_CHUNK) {
            let mut builder: QueryBuilder<Postgres> =
                QueryBuilder::new("INSERT INTO users (user_id, gender, age, occupation, zipcode) ");
            builder.push_values(chunk, |mut row, user| {
                row.push_bind(i64::from(user.id))
                    .push_bind(user.gender.code().to_string())
                    .push_bind(user.age as i32)
                    .push_bind(user.occupation as i32)
                    .push_bind(user.zip.clone());
            });
            builder.push(
                " ON CONFLICT (user_id) DO UPDATE SET gender = EXCLUDED.gender, \
                 age = EXCLUDED.age, occupation = EXCLUDED.occupation, zipcode = EXCLUDED.zipcode",
            );
            builder.build().execute(&self.pool).await?;
        }
        Ok(users.len())
    }
}

#[async_trait]
impl BatchDeleter for PgStore {
    async fn delete_batch(&self, table: Table, limit: usize) -> AppResult<u64> {
        let sql = format!(
            "DELETE FROM {name} WHERE ctid IN (SELECT ctid FROM {name} LIMIT $1)",
            name = table.name()
        );
        let result = sqlx::query(&sql)
            .bind(limit as i64)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl RatingsSink for PgStore {
    async fn commit_batch(&self, batch: &[Interaction]) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO ratings (user_id, movie_id, rating, rated_at) ");
        builder.push_values(batch, |mut row, rating| {
            row.push_bind(i64::from(rating.user_id))
                .push_bind(i64::from(rating.item_id))
                .push_bind(i16::from(rating.rating))
                .push_bind(rating.timestamp);
        });
        builder.build().execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ImportOptions {
    /// Empty all three tables before loading
    pub reset: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub deleted: u64,
    pub movies: usize,
    pub users: usize,
    pub ratings: usize,
    pub skipped_rows: usize,
}

/// Loads the dataset files and mirrors them into PostgreSQL.
pub async fn run_import(config: &Config, options: ImportOptions) -> AppResult<ImportReport> {
    let pool = create_pool(&config.database_url).await?;
    run_migrations(&pool).await?;
    let store = PgStore::new(pool);
    let mut report = ImportReport::default();

    if options.reset {
        for table in Table::ALL {
            report.deleted += clear_table(&store, table, config.delete_batch_size).await?;
        }
    }

    let items = data::read_items(&config.movies_path())?;
    let users = data::read_users(&config.users_path())?;
    let ratings = data::read_interactions(&config.ratings_path())?;
    report.skipped_rows = items.skipped + users.skipped + ratings.skipped;

    report.movies = store.upsert_movies(&items.records).await?;
    tracing::info!(movies = report.movies, "Imported movies");

    report.users = store.upsert_users(&users.records).await?;
    tracing::info!(users = report.users, "Imported users");

    report.ratings = write_in_batches(
        &store,
        &ratings.records,
        config.import_batch_size,
        config.import_max_attempts,
    )
    .await?;
    tracing::info!(ratings = report.ratings, "Imported ratings");

    Ok(report)
}
