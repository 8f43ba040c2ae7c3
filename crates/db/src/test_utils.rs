//! Test utilities for database operations.
//!
//! Provides an in-memory `SQLite` database with the schema migrated, so
//! integration tests can exercise real SQL including transactions.

use std::sync::Arc;

use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, Statement};
use sea_orm_migration::MigratorTrait;
use tracing::info;

use crate::migrations::Migrator;

/// Test database configuration.
#[derive(Debug, Clone)]
pub struct TestDbConfig {
    /// Connection URL.
    pub url: String,
}

impl Default for TestDbConfig {
    fn default() -> Self {
        Self {
            url: std::env::var("TEST_DATABASE_URL")
                .unwrap_or_else(|_| "sqlite::memory:".to_string()),
        }
    }
}

impl TestDbConfig {
    /// Whether the URL points at a private in-memory database.
    #[must_use]
    pub fn is_in_memory(&self) -> bool {
        self.url.starts_with("sqlite::memory:")
    }
}

/// A migrated test database.
pub struct TestDatabase {
    /// Shared database connection.
    pub conn: Arc<DatabaseConnection>,
    /// Database configuration.
    pub config: TestDbConfig,
}

impl TestDatabase {
    /// Create a fresh in-memory database with all migrations applied.
    pub async fn in_memory() -> Result<Self, DbErr> {
        Self::with_config(TestDbConfig {
            url: "sqlite::memory:".to_string(),
        })
        .await
    }

    /// Create a test database from the default configuration.
    pub async fn new() -> Result<Self, DbErr> {
        Self::with_config(TestDbConfig::default()).await
    }

    /// Create a test database with custom configuration.
    ///
    /// In-memory `SQLite` lives and dies with its connection, so the pool
    /// is pinned to a single one.
    pub async fn with_config(config: TestDbConfig) -> Result<Self, DbErr> {
        let mut opt = ConnectOptions::new(&config.url);
        if config.is_in_memory() {
            opt.max_connections(1).min_connections(1);
        }
        opt.sqlx_logging(false);

        let conn = Database::connect(opt).await?;
        Migrator::up(&conn, None).await?;

        info!(url = %config.url, "Migrated test database");

        Ok(Self {
            conn: Arc::new(conn),
            config,
        })
    }

    /// Get the database connection.
    #[must_use]
    pub fn connection(&self) -> &DatabaseConnection {
        self.conn.as_ref()
    }

    /// Count rows in a table.
    pub async fn count_rows(&self, table: &str) -> Result<i64, DbErr> {
        let backend = self.conn.get_database_backend();
        let row = self
            .conn
            .query_one(Statement::from_string(
                backend,
                format!("SELECT COUNT(*) AS n FROM {table}"),
            ))
            .await?;

        row.map_or(Ok(0), |r| r.try_get::<i64>("", "n"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_db_config_in_memory() {
        let config = TestDbConfig {
            url: "sqlite::memory:".to_string(),
        };
        assert!(config.is_in_memory());

        let config = TestDbConfig {
            url: "postgres://localhost/lgu_test".to_string(),
        };
        assert!(!config.is_in_memory());
    }

    #[tokio::test]
    async fn test_in_memory_database_is_migrated() {
        let db = TestDatabase::in_memory().await.unwrap();

        assert_eq!(db.count_rows("items").await.unwrap(), 0);
        assert_eq!(db.count_rows("transactions").await.unwrap(), 0);
        assert_eq!(db.count_rows("transaction_audit_logs").await.unwrap(), 0);
    }
}
