//! Session extraction and role gating for handlers

use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use uuid::Uuid;

use crate::error::{PortalError, PortalResult};
use crate::models::Role;
use crate::session::{SessionStore, SessionUser};

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "coplur_session";

/// Resolve the browser session from the cookie jar, creating a fresh
/// anonymous session (and cookie) when none is live.
pub async fn establish_session(store: &SessionStore, jar: CookieJar) -> (CookieJar, Uuid) {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if let Ok(id) = cookie.value().parse::<Uuid>() {
            if store.exists(id).await {
                return (jar, id);
            }
        }
    }

    let id = store.create().await;
    let cookie = Cookie::build((SESSION_COOKIE, id.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();

    (jar.add(cookie), id)
}

/// Require any authenticated user
pub async fn require_user(store: &SessionStore, session_id: Uuid) -> PortalResult<SessionUser> {
    store
        .current_user(session_id)
        .await
        .ok_or(PortalError::Unauthorized)
}

/// Require an authenticated user with the given role
pub async fn require_role(
    store: &SessionStore,
    session_id: Uuid,
    role: Role,
) -> PortalResult<SessionUser> {
    let user = require_user(store, session_id).await?;
    if user.role != role {
        return Err(PortalError::Forbidden(role));
    }
    Ok(user)
}
