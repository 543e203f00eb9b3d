//! Database module for handling SQLite connections and operations
//!
//! This module provides connection pooling, configuration, and health checks
//! for the embedded SQLite database. The database file is created on first
//! run.

use crate::error::{DatabaseError, DatabaseResult};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite, SqlitePool};
use std::env;

/// Database configuration struct
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database connection URL
    pub database_url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
}

impl DatabaseConfig {
    /// Create a new DatabaseConfig from environment variables
    pub fn from_env() -> DatabaseResult<Self> {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://coplur_users.db".to_string());

        let max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);

        Ok(Self {
            database_url,
            max_connections,
        })
    }
}

/// Initialize a SQLite connection pool
///
/// Creates the database file if it does not exist yet.
///
/// # Arguments
///
/// * `config` - Database configuration
///
/// # Returns
///
/// * `DatabaseResult<Pool<Sqlite>>` - SQLite connection pool or error
pub async fn init_pool(config: &DatabaseConfig) -> DatabaseResult<Pool<Sqlite>> {
    let options: SqliteConnectOptions = config
        .database_url
        .parse()
        .map_err(|e| DatabaseError::Configuration(format!("Invalid database URL: {}", e)))?;

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options.create_if_missing(true))
        .await
        .map_err(DatabaseError::Connection)?;

    Ok(pool)
}

/// Check database connectivity
///
/// # Arguments
///
/// * `pool` - SQLite connection pool
///
/// # Returns
///
/// * `DatabaseResult<bool>` - True if connection is successful, false otherwise
pub async fn health_check(pool: &SqlitePool) -> DatabaseResult<bool> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map_err(DatabaseError::Query)?;

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_database_config_defaults() {
        unsafe {
            std::env::remove_var("DATABASE_URL");
            std::env::remove_var("DATABASE_MAX_CONNECTIONS");
        }

        let config = DatabaseConfig::from_env().expect("Failed to create database config");
        assert_eq!(config.database_url, "sqlite://coplur_users.db");
        assert_eq!(config.max_connections, 5);
    }

    #[test]
    #[serial]
    fn test_database_config_from_env() {
        unsafe {
            std::env::set_var("DATABASE_URL", "sqlite::memory:");
            std::env::set_var("DATABASE_MAX_CONNECTIONS", "2");
        }

        let config = DatabaseConfig::from_env().expect("Failed to create database config");
        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.max_connections, 2);

        unsafe {
            std::env::remove_var("DATABASE_URL");
            std::env::remove_var("DATABASE_MAX_CONNECTIONS");
        }
    }

    #[tokio::test]
    #[serial]
    async fn test_in_memory_pool() {
        let config = DatabaseConfig {
            database_url: "sqlite::memory:".to_string(),
            max_connections: 1,
        };

        let pool = init_pool(&config).await.expect("Failed to open pool");
        assert!(health_check(&pool).await.expect("Health check errored"));
    }
}
