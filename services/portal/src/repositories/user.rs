//! User repository for database operations
//!
//! This is the account service proper: all user CRUD goes through here, and
//! the uniqueness and last-admin invariants are enforced at this layer.

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::info;

use crate::error::{AccountError, AccountResult};
use crate::models::{NewUser, Role, User, UserUpdate};
use crate::validation;

/// Hash a password with a fresh random salt
pub(crate) fn hash_password(password: &str) -> AccountResult<String> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AccountError::Hash(e.to_string()))?
        .to_string();
    Ok(password_hash)
}

/// Verify a password against a stored PHC hash string
pub(crate) fn verify_password(password: &str, password_hash: &str) -> AccountResult<bool> {
    let parsed_hash =
        PasswordHash::new(password_hash).map_err(|e| AccountError::Hash(e.to_string()))?;
    let argon2 = Argon2::default();
    Ok(argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// User repository
#[derive(Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    /// Create a new user repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn map_row(row: &SqliteRow) -> Result<User, sqlx::Error> {
        let role_str: String = row.try_get("role")?;
        let role = Role::parse(&role_str).ok_or_else(|| sqlx::Error::ColumnDecode {
            index: "role".to_string(),
            source: format!("unknown role '{}'", role_str).into(),
        })?;

        Ok(User {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            role,
            created_at: row.try_get("created_at")?,
        })
    }

    /// Create a new user
    ///
    /// Trims the username, normalizes the email to lowercase, validates all
    /// fields, and rejects username/email collisions.
    pub async fn create(&self, new_user: &NewUser) -> AccountResult<User> {
        let username = new_user.username.trim().to_string();
        let email = new_user.email.trim().to_lowercase();

        validation::validate_username(&username).map_err(AccountError::Validation)?;
        validation::validate_email(&email).map_err(AccountError::Validation)?;
        validation::validate_password(&new_user.password).map_err(AccountError::Validation)?;

        info!("Creating new user: {}", username);

        let password_hash = hash_password(&new_user.password)?;

        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS count FROM users
            WHERE username = ?1 OR email = ?2
            "#,
        )
        .bind(&username)
        .bind(&email)
        .fetch_one(&mut *tx)
        .await?;

        let collisions: i64 = row.get("count");
        if collisions > 0 {
            return Err(AccountError::AlreadyExists);
        }

        let row = sqlx::query(
            r#"
            INSERT INTO users (username, email, password_hash, role, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            RETURNING id, username, email, password_hash, role, created_at
            "#,
        )
        .bind(&username)
        .bind(&email)
        .bind(&password_hash)
        .bind(new_user.role.as_str())
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        let user = Self::map_row(&row)?;
        tx.commit().await?;

        Ok(user)
    }

    /// Authenticate a user by exact username and password
    ///
    /// Returns `Ok(None)` both for unknown usernames and wrong passwords.
    pub async fn authenticate(&self, username: &str, password: &str) -> AccountResult<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT id, username, email, password_hash, role, created_at
            FROM users
            WHERE username = ?1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let user = Self::map_row(&row)?;
        if verify_password(password, &user.password_hash)? {
            Ok(Some(user))
        } else {
            Ok(None)
        }
    }

    /// List all users, newest first
    pub async fn list(&self) -> AccountResult<Vec<User>> {
        let rows = sqlx::query(
            r#"
            SELECT id, username, email, password_hash, role, created_at
            FROM users
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let users = rows
            .iter()
            .map(Self::map_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(users)
    }

    /// Find a user by ID
    pub async fn find_by_id(&self, id: i64) -> AccountResult<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT id, username, email, password_hash, role, created_at
            FROM users
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(Self::map_row(&row)?)),
            None => Ok(None),
        }
    }

    /// Count users with the given role
    pub async fn count_by_role(&self, role: Role) -> AccountResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM users WHERE role = ?1")
            .bind(role.as_str())
            .fetch_one(&self.pool)
            .await?;

        Ok(row.get("count"))
    }

    /// Update a user's username, email, and role
    ///
    /// Rejects demoting the last admin, and username/email collisions with
    /// other users. The last-admin check is re-validated at write time inside
    /// the operation's transaction.
    pub async fn update(&self, id: i64, update: &UserUpdate) -> AccountResult<User> {
        let username = update.username.trim().to_string();
        let email = update.email.trim().to_lowercase();

        validation::validate_username(&username).map_err(AccountError::Validation)?;
        validation::validate_email(&email).map_err(AccountError::Validation)?;

        info!("Updating user {}", id);

        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT role FROM users WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(row) = row else {
            return Err(AccountError::NotFound);
        };

        let current_role_str: String = row.get("role");
        let current_role = Role::parse(&current_role_str);

        if current_role == Some(Role::Admin) && update.role != Role::Admin {
            let row = sqlx::query("SELECT COUNT(*) AS count FROM users WHERE role = 'admin'")
                .fetch_one(&mut *tx)
                .await?;
            let admins: i64 = row.get("count");

            if admins <= 1 {
                return Err(AccountError::LastAdminDemote);
            }
        }

        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS count FROM users
            WHERE (username = ?1 OR email = ?2) AND id != ?3
            "#,
        )
        .bind(&username)
        .bind(&email)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        let collisions: i64 = row.get("count");
        if collisions > 0 {
            return Err(AccountError::AlreadyExists);
        }

        let row = sqlx::query(
            r#"
            UPDATE users SET username = ?1, email = ?2, role = ?3
            WHERE id = ?4
            RETURNING id, username, email, password_hash, role, created_at
            "#,
        )
        .bind(&username)
        .bind(&email)
        .bind(update.role.as_str())
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        let user = Self::map_row(&row)?;
        tx.commit().await?;

        Ok(user)
    }

    /// Delete a user by ID, refusing to remove the last admin
    pub async fn delete(&self, id: i64) -> AccountResult<()> {
        info!("Deleting user {}", id);

        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT role FROM users WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(row) = row else {
            return Err(AccountError::NotFound);
        };

        let role_str: String = row.get("role");
        if Role::parse(&role_str) == Some(Role::Admin) {
            let row = sqlx::query("SELECT COUNT(*) AS count FROM users WHERE role = 'admin'")
                .fetch_one(&mut *tx)
                .await?;
            let admins: i64 = row.get("count");

            if admins <= 1 {
                return Err(AccountError::LastAdminDelete);
            }
        }

        sqlx::query("DELETE FROM users WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(())
    }

    /// Update a user's password by username
    pub async fn update_password(&self, username: &str, new_password: &str) -> AccountResult<()> {
        if new_password.len() < 8 {
            return Err(AccountError::Validation(
                "Password must be at least 8 characters".to_string(),
            ));
        }

        info!("Updating password for user: {}", username);

        let password_hash = hash_password(new_password)?;

        let result = sqlx::query("UPDATE users SET password_hash = ?1 WHERE username = ?2")
            .bind(&password_hash)
            .bind(username)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AccountError::NotFound);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn seeded_repo() -> UserRepository {
        // A single connection keeps every query on the same in-memory database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("failed to open in-memory database");

        let repo = UserRepository::new(pool.clone());
        database::init(&pool, &repo)
            .await
            .expect("failed to initialize schema");
        repo
    }

    fn new_user(username: &str, email: &str, role: Role) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password: "longenough1".to_string(),
            role,
        }
    }

    #[tokio::test]
    async fn test_seeded_admin_authenticates() {
        let repo = seeded_repo().await;

        let user = repo
            .authenticate("admin", "Admin123!")
            .await
            .expect("authenticate errored")
            .expect("seeded admin missing");
        assert_eq!(user.username, "admin");
        assert_eq!(user.email, "admin@coplur.com");
        assert_eq!(user.role, Role::Admin);

        assert!(repo
            .authenticate("admin", "wrong")
            .await
            .expect("authenticate errored")
            .is_none());
        assert!(repo
            .authenticate("nobody", "Admin123!")
            .await
            .expect("authenticate errored")
            .is_none());
    }

    #[tokio::test]
    async fn test_create_validates_fields() {
        let repo = seeded_repo().await;

        let mut bad = new_user("alice", "alice@example.com", Role::Student);
        bad.password = "short1".to_string();
        assert!(matches!(
            repo.create(&bad).await,
            Err(AccountError::Validation(msg)) if msg.contains("at least 8")
        ));

        let mut bad = new_user("alice", "alice@example.com", Role::Student);
        bad.password = "nodigitshere".to_string();
        assert!(matches!(
            repo.create(&bad).await,
            Err(AccountError::Validation(_))
        ));

        let bad = new_user("al", "alice@example.com", Role::Student);
        assert!(matches!(
            repo.create(&bad).await,
            Err(AccountError::Validation(msg)) if msg.contains("at least 3")
        ));

        let bad = new_user("alice", "alice.example.com", Role::Student);
        assert!(matches!(
            repo.create(&bad).await,
            Err(AccountError::Validation(msg)) if msg.contains("valid email")
        ));

        let ok = new_user("alice", "alice@example.com", Role::Student);
        let user = repo.create(&ok).await.expect("create failed");
        assert_eq!(user.role, Role::Student);
    }

    #[tokio::test]
    async fn test_create_normalizes_and_rejects_duplicates() {
        let repo = seeded_repo().await;

        let user = repo
            .create(&new_user("  alice ", "Alice@Example.COM", Role::Student))
            .await
            .expect("create failed");
        assert_eq!(user.username, "alice");
        assert_eq!(user.email, "alice@example.com");

        // Same username
        assert!(matches!(
            repo.create(&new_user("alice", "other@example.com", Role::Student))
                .await,
            Err(AccountError::AlreadyExists)
        ));

        // Same email regardless of case
        assert!(matches!(
            repo.create(&new_user("alice2", "ALICE@example.com", Role::Student))
                .await,
            Err(AccountError::AlreadyExists)
        ));
    }

    #[tokio::test]
    async fn test_last_admin_delete_protection() {
        let repo = seeded_repo().await;
        let admin = repo
            .authenticate("admin", "Admin123!")
            .await
            .unwrap()
            .unwrap();

        assert!(matches!(
            repo.delete(admin.id).await,
            Err(AccountError::LastAdminDelete)
        ));

        // With a second admin, deletion succeeds
        let second = repo
            .create(&new_user("root2", "root2@example.com", Role::Admin))
            .await
            .expect("create failed");
        repo.delete(second.id).await.expect("delete failed");
        assert!(repo.find_by_id(second.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_last_admin_demote_protection() {
        let repo = seeded_repo().await;
        let admin = repo
            .authenticate("admin", "Admin123!")
            .await
            .unwrap()
            .unwrap();

        let demote = UserUpdate {
            username: admin.username.clone(),
            email: admin.email.clone(),
            role: Role::Student,
        };
        assert!(matches!(
            repo.update(admin.id, &demote).await,
            Err(AccountError::LastAdminDemote)
        ));

        // With two admins the demotion goes through
        repo.create(&new_user("root2", "root2@example.com", Role::Admin))
            .await
            .expect("create failed");
        let updated = repo.update(admin.id, &demote).await.expect("update failed");
        assert_eq!(updated.role, Role::Student);
        assert_eq!(repo.count_by_role(Role::Admin).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_checks_collisions_against_others() {
        let repo = seeded_repo().await;
        let alice = repo
            .create(&new_user("alice", "alice@example.com", Role::Student))
            .await
            .unwrap();
        repo.create(&new_user("bob", "bob@example.com", Role::Student))
            .await
            .unwrap();

        // Taking bob's email is a collision
        let update = UserUpdate {
            username: "alice".to_string(),
            email: "bob@example.com".to_string(),
            role: Role::Student,
        };
        assert!(matches!(
            repo.update(alice.id, &update).await,
            Err(AccountError::AlreadyExists)
        ));

        // Keeping her own identity is not
        let update = UserUpdate {
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            role: Role::Student,
        };
        repo.update(alice.id, &update).await.expect("update failed");

        // Unknown target
        assert!(matches!(
            repo.update(9999, &update).await,
            Err(AccountError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_update_password() {
        let repo = seeded_repo().await;
        repo.create(&new_user("alice", "alice@example.com", Role::Student))
            .await
            .unwrap();

        assert!(matches!(
            repo.update_password("alice", "short1").await,
            Err(AccountError::Validation(_))
        ));
        assert!(matches!(
            repo.update_password("nobody", "longenough2").await,
            Err(AccountError::NotFound)
        ));

        repo.update_password("alice", "longenough2")
            .await
            .expect("password update failed");
        assert!(repo
            .authenticate("alice", "longenough2")
            .await
            .unwrap()
            .is_some());
        assert!(repo
            .authenticate("alice", "longenough1")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_list_orders_newest_first() {
        let repo = seeded_repo().await;
        repo.create(&new_user("alice", "alice@example.com", Role::Student))
            .await
            .unwrap();
        repo.create(&new_user("bob", "bob@example.com", Role::Student))
            .await
            .unwrap();

        let users = repo.list().await.expect("list failed");
        assert_eq!(users.len(), 3);
        assert_eq!(users[0].username, "bob");
        assert_eq!(users[1].username, "alice");
        assert_eq!(users[2].username, "admin");
    }

    #[test]
    fn test_hash_and_verify_password() {
        let hash = hash_password("longenough1").expect("hashing failed");
        assert_ne!(hash, "longenough1");
        assert!(verify_password("longenough1", &hash).expect("verify errored"));
        assert!(!verify_password("wrongpass1", &hash).expect("verify errored"));
    }

    #[test]
    fn test_verify_rejects_malformed_hash() {
        assert!(matches!(
            verify_password("anything1", "not-a-phc-string"),
            Err(AccountError::Hash(_))
        ));
    }
}
