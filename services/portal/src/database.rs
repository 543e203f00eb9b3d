//! Schema initialization and default-admin seeding for the portal service

use anyhow::Result;
use tracing::info;

use sqlx::SqlitePool;

use crate::models::{NewUser, Role};
use crate::repositories::UserRepository;

/// Demo credentials seeded when the store has no admin account
pub const DEFAULT_ADMIN_USERNAME: &str = "admin";
pub const DEFAULT_ADMIN_EMAIL: &str = "admin@coplur.com";
pub const DEFAULT_ADMIN_PASSWORD: &str = "Admin123!";

/// Create the users table if missing and seed the default admin account
/// when no admin exists yet.
pub async fn init(pool: &SqlitePool, users: &UserRepository) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT UNIQUE NOT NULL,
            email TEXT UNIQUE NOT NULL,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL CHECK (role IN ('admin', 'student')),
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    if users.count_by_role(Role::Admin).await? == 0 {
        users
            .create(&NewUser {
                username: DEFAULT_ADMIN_USERNAME.to_string(),
                email: DEFAULT_ADMIN_EMAIL.to_string(),
                password: DEFAULT_ADMIN_PASSWORD.to_string(),
                role: Role::Admin,
            })
            .await?;
        info!("Seeded default admin account");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("failed to open in-memory database")
    }

    #[tokio::test]
    async fn test_init_is_idempotent() {
        let pool = memory_pool().await;
        let users = UserRepository::new(pool.clone());

        init(&pool, &users).await.expect("first init failed");
        init(&pool, &users).await.expect("second init failed");

        // Only one seeded admin, regardless of how often init runs
        assert_eq!(users.count_by_role(Role::Admin).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_seed_skipped_when_admin_exists() {
        let pool = memory_pool().await;
        let users = UserRepository::new(pool.clone());
        init(&pool, &users).await.expect("init failed");

        users
            .create(&NewUser {
                username: "root2".to_string(),
                email: "root2@coplur.com".to_string(),
                password: "Admin456!".to_string(),
                role: Role::Admin,
            })
            .await
            .expect("create failed");

        init(&pool, &users).await.expect("re-init failed");
        assert_eq!(users.count_by_role(Role::Admin).await.unwrap(), 2);
    }
}
