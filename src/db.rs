//! Database module - SQLite prediction log connection and migrations

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

/// Create database connection pool, creating the file if needed
pub async fn create_pool(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let in_memory = database_url.contains(":memory:");
    let mut options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
    if !in_memory {
        options = options.journal_mode(SqliteJournalMode::Wal);
    }

    SqlitePoolOptions::new()
        // Each in-memory connection is its own database
        .max_connections(if in_memory { 1 } else { 5 })
        .connect_with(options)
        .await
}

/// Run database migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA_SQL.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        sqlx::query(statement).execute(pool).await?;
    }

    tracing::info!("Database schema applied successfully");
    Ok(())
}

/// Database schema SQL
const SCHEMA_SQL: &str = r#"
-- Prediction log (append-only)
CREATE TABLE IF NOT EXISTS predictions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    sepal_length REAL NOT NULL,
    sepal_width REAL NOT NULL,
    petal_length REAL NOT NULL,
    petal_width REAL NOT NULL,
    prediction TEXT NOT NULL,
    probability REAL NOT NULL,
    all_probabilities TEXT NOT NULL
);

-- Indexes
CREATE INDEX IF NOT EXISTS idx_predictions_timestamp ON predictions(timestamp);
CREATE INDEX IF NOT EXISTS idx_predictions_prediction ON predictions(prediction)
"#;

#[cfg(test)]
pub(crate) async fn memory_pool() -> SqlitePool {
    let pool = create_pool("sqlite::memory:").await.expect("in-memory pool");
    run_migrations(&pool).await.expect("migrations");
    pool
}
