//! In-memory session store
//!
//! Each browser session is an explicit entry keyed by a UUID carried in a
//! cookie. The entry tracks the authenticated user (if any), the count of
//! consecutive failed logins, and transient flash messages displayed on the
//! next page render. Nothing here survives a process restart.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::models::Role;

/// Snapshot of the logged-in user kept in the session
#[derive(Debug, Clone)]
pub struct SessionUser {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: Role,
}

/// Flash message severity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashKind {
    Success,
    Error,
    Info,
}

/// Flash message shown once on the next rendered page
#[derive(Debug, Clone)]
pub struct Flash {
    pub kind: FlashKind,
    pub message: String,
}

/// Session store configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Idle seconds after which a session is dropped
    pub ttl_seconds: u64,
    /// Consecutive failed logins before further attempts are rejected
    pub max_login_attempts: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: 3600,
            max_login_attempts: 5,
        }
    }
}

impl SessionConfig {
    /// Create a SessionConfig from environment variables, falling back to
    /// defaults
    pub fn from_env() -> Self {
        let ttl_seconds = std::env::var("PORTAL_SESSION_TTL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3600);

        Self {
            ttl_seconds,
            ..Self::default()
        }
    }
}

#[derive(Debug)]
struct SessionEntry {
    user: Option<SessionUser>,
    login_attempts: u32,
    flashes: Vec<Flash>,
    last_seen: Instant,
}

impl SessionEntry {
    fn new() -> Self {
        Self {
            user: None,
            login_attempts: 0,
            flashes: Vec::new(),
            last_seen: Instant::now(),
        }
    }
}

/// Session store
#[derive(Clone)]
pub struct SessionStore {
    config: SessionConfig,
    entries: Arc<Mutex<HashMap<Uuid, SessionEntry>>>,
}

impl SessionStore {
    /// Create a new session store
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn ttl(&self) -> Duration {
        Duration::from_secs(self.config.ttl_seconds)
    }

    /// Create a fresh anonymous session and return its id
    pub async fn create(&self) -> Uuid {
        let id = Uuid::new_v4();
        let mut entries = self.entries.lock().await;

        // Opportunistic sweep of idle sessions
        let ttl = self.ttl();
        let now = Instant::now();
        entries.retain(|_, entry| now.duration_since(entry.last_seen) < ttl);

        entries.insert(id, SessionEntry::new());
        id
    }

    /// Whether the session id refers to a live session
    pub async fn exists(&self, id: Uuid) -> bool {
        let mut entries = self.entries.lock().await;
        match entries.get_mut(&id) {
            Some(entry) if entry.last_seen.elapsed() < self.ttl() => {
                entry.last_seen = Instant::now();
                true
            }
            Some(_) => {
                entries.remove(&id);
                false
            }
            None => false,
        }
    }

    /// Current authenticated user of the session, if any
    pub async fn current_user(&self, id: Uuid) -> Option<SessionUser> {
        let mut entries = self.entries.lock().await;
        let entry = entries.get_mut(&id)?;
        entry.last_seen = Instant::now();
        entry.user.clone()
    }

    /// Mark the session as authenticated and reset the failure counter
    pub async fn login(&self, id: Uuid, user: SessionUser) {
        let mut entries = self.entries.lock().await;
        let entry = entries.entry(id).or_insert_with(SessionEntry::new);
        info!("Session {} authenticated as {}", id, user.username);
        entry.user = Some(user);
        entry.login_attempts = 0;
        entry.last_seen = Instant::now();
    }

    /// Tear the session down entirely
    pub async fn logout(&self, id: Uuid) {
        let mut entries = self.entries.lock().await;
        if entries.remove(&id).is_some() {
            info!("Session {} logged out", id);
        }
    }

    /// Record a failed login attempt and return the new count
    pub async fn record_failed_login(&self, id: Uuid) -> u32 {
        let mut entries = self.entries.lock().await;
        let entry = entries.entry(id).or_insert_with(SessionEntry::new);
        entry.login_attempts += 1;
        entry.last_seen = Instant::now();
        entry.login_attempts
    }

    /// Whether the session has exhausted its login attempts
    pub async fn attempts_exhausted(&self, id: Uuid) -> bool {
        let entries = self.entries.lock().await;
        entries
            .get(&id)
            .map(|entry| entry.login_attempts >= self.config.max_login_attempts)
            .unwrap_or(false)
    }

    /// Queue a flash message for the next page render
    pub async fn push_flash(&self, id: Uuid, kind: FlashKind, message: impl Into<String>) {
        let mut entries = self.entries.lock().await;
        let entry = entries.entry(id).or_insert_with(SessionEntry::new);
        entry.flashes.push(Flash {
            kind,
            message: message.into(),
        });
    }

    /// Take (and clear) the pending flash messages
    pub async fn take_flashes(&self, id: Uuid) -> Vec<Flash> {
        let mut entries = self.entries.lock().await;
        entries
            .get_mut(&id)
            .map(|entry| std::mem::take(&mut entry.flashes))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_session_config_from_env() {
        unsafe {
            std::env::set_var("PORTAL_SESSION_TTL_SECS", "60");
        }

        let config = SessionConfig::from_env();
        assert_eq!(config.ttl_seconds, 60);
        assert_eq!(config.max_login_attempts, 5);

        unsafe {
            std::env::remove_var("PORTAL_SESSION_TTL_SECS");
        }
    }

    fn student() -> SessionUser {
        SessionUser {
            id: 2,
            username: "student".to_string(),
            email: "student@coplur.com".to_string(),
            role: Role::Student,
        }
    }

    #[tokio::test]
    async fn test_login_logout_cycle() {
        let store = SessionStore::new(SessionConfig::default());
        let sid = store.create().await;

        assert!(store.current_user(sid).await.is_none());

        store.login(sid, student()).await;
        let user = store.current_user(sid).await.expect("user missing");
        assert_eq!(user.username, "student");
        assert_eq!(user.role, Role::Student);

        store.logout(sid).await;
        assert!(store.current_user(sid).await.is_none());
        assert!(!store.exists(sid).await);
    }

    #[tokio::test]
    async fn test_login_attempt_limit() {
        let store = SessionStore::new(SessionConfig::default());
        let sid = store.create().await;

        for attempt in 1..=5 {
            assert!(!store.attempts_exhausted(sid).await);
            assert_eq!(store.record_failed_login(sid).await, attempt);
        }

        // Sixth attempt is rejected even before credential lookup
        assert!(store.attempts_exhausted(sid).await);

        // A successful login on a different session is unaffected
        let other = store.create().await;
        assert!(!store.attempts_exhausted(other).await);
    }

    #[tokio::test]
    async fn test_successful_login_resets_attempts() {
        let store = SessionStore::new(SessionConfig::default());
        let sid = store.create().await;

        store.record_failed_login(sid).await;
        store.record_failed_login(sid).await;
        store.login(sid, student()).await;
        assert!(!store.attempts_exhausted(sid).await);
    }

    #[tokio::test]
    async fn test_flashes_are_taken_once() {
        let store = SessionStore::new(SessionConfig::default());
        let sid = store.create().await;

        store
            .push_flash(sid, FlashKind::Success, "User created successfully")
            .await;
        store.push_flash(sid, FlashKind::Info, "You can now log in").await;

        let flashes = store.take_flashes(sid).await;
        assert_eq!(flashes.len(), 2);
        assert_eq!(flashes[0].kind, FlashKind::Success);
        assert!(store.take_flashes(sid).await.is_empty());
    }

    #[tokio::test]
    async fn test_idle_sessions_expire() {
        let store = SessionStore::new(SessionConfig {
            ttl_seconds: 0,
            ..SessionConfig::default()
        });
        let sid = store.create().await;

        assert!(!store.exists(sid).await);
    }
}
