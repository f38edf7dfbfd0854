//! Database module for SQLite persistence.
//!
//! Products are stored as documents: scalar columns plus JSON-encoded lists.
//! The connection pool is created on first use and shared for the lifetime
//! of the process.

mod repository;

pub use repository::*;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio::sync::OnceCell;

use crate::errors::AppError;

/// Lazily connected, process-wide database handle.
pub struct Database {
    path: PathBuf,
    pool: OnceCell<SqlitePool>,
}

impl Database {
    /// Create a handle without connecting. The first [`Database::pool`] call connects.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            pool: OnceCell::new(),
        }
    }

    /// Get the shared pool, connecting and migrating on first use.
    ///
    /// Concurrent first callers wait on a single initialization; a failed
    /// attempt leaves the cell empty so the next call retries.
    pub async fn pool(&self) -> Result<&SqlitePool, AppError> {
        let pool = self
            .pool
            .get_or_try_init(|| async {
                let pool = init_database(&self.path).await?;
                tracing::info!("Database connected: {:?}", self.path);
                Ok::<_, AppError>(pool)
            })
            .await?;
        Ok(pool)
    }
}

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    // Run embedded migrations
    run_migrations(&pool).await?;

    Ok(pool)
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS products (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            brand TEXT,
            category TEXT,
            sku TEXT,
            stock INTEGER NOT NULL DEFAULT 0,
            price REAL NOT NULL CHECK (price >= 0),
            discount_price REAL CHECK (discount_price IS NULL OR discount_price >= 0),
            color TEXT,
            size TEXT,
            material TEXT,
            tags TEXT NOT NULL DEFAULT '[]',
            features TEXT NOT NULL DEFAULT '[]',
            warranty TEXT,
            shipping_info TEXT,
            description TEXT NOT NULL,
            image_url TEXT NOT NULL,
            image_public_id TEXT NOT NULL,
            search_text TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes for common queries
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_products_created_at ON products(created_at);
        CREATE INDEX IF NOT EXISTS idx_products_price ON products(price);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
