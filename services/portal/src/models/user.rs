//! User model and related functionality

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Role;

/// User entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// New user creation payload; the password is still in clear form and is
/// hashed by the repository on insert.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

/// Admin edit payload; passwords change through their own operation.
#[derive(Debug, Clone)]
pub struct UserUpdate {
    pub username: String,
    pub email: String,
    pub role: Role,
}
