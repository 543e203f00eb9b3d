//! Portal routes
//!
//! All state changes are POST + redirect; outcome messages travel as
//! session flashes and are displayed on the next rendered page.

use axum::{
    Form, Json, Router,
    extract::{Path, State},
    response::{Html, IntoResponse, Redirect},
    routing::{get, post},
};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use serde::Deserialize;
use tracing::info;

use crate::error::{PortalError, PortalResult};
use crate::middleware::{SESSION_COOKIE, establish_session, require_role, require_user};
use crate::models::{NewUser, Role, UserUpdate};
use crate::session::{FlashKind, SessionUser};
use crate::views;
use crate::AppState;

/// Request for user login
#[derive(Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// Request for student self-registration
#[derive(Deserialize)]
pub struct RegisterForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

/// Request for changing the current user's password
#[derive(Deserialize)]
pub struct PasswordForm {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

/// Request for admin user creation
#[derive(Deserialize)]
pub struct CreateUserForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: String,
}

/// Request for admin user edit
#[derive(Deserialize)]
pub struct EditUserForm {
    pub username: String,
    pub email: String,
    pub role: String,
}

/// Create the router for the portal service
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/health", get(health_check))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/register", post(register))
        .route("/profile", get(profile))
        .route("/password", get(password_form).post(change_password))
        .route("/student", get(student_dashboard))
        .route("/admin", get(admin_dashboard))
        .route("/admin/users", post(admin_create_user))
        .route("/admin/users/:id/edit", get(admin_edit_user))
        .route("/admin/users/:id", post(admin_update_user))
        .route("/admin/users/:id/delete", post(admin_delete_user))
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = common::database::health_check(&state.db_pool)
        .await
        .unwrap_or(false);

    Json(serde_json::json!({
        "status": if database { "ok" } else { "degraded" },
        "service": "portal",
        "database": database
    }))
}

/// Home page: public landing for anonymous visitors, welcome page otherwise
pub async fn home(
    State(state): State<AppState>,
    jar: CookieJar,
) -> PortalResult<impl IntoResponse> {
    let (jar, sid) = establish_session(&state.sessions, jar).await;
    let flashes = state.sessions.take_flashes(sid).await;

    let html = match state.sessions.current_user(sid).await {
        Some(user) => views::home_page(&user, &flashes),
        None => views::public_page(&flashes),
    };

    Ok((jar, Html(html)))
}

/// User login endpoint
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> PortalResult<impl IntoResponse> {
    let (jar, sid) = establish_session(&state.sessions, jar).await;

    if state.sessions.attempts_exhausted(sid).await {
        state
            .sessions
            .push_flash(sid, FlashKind::Error, "Too many login attempts. Please refresh.")
            .await;
        return Ok((jar, Redirect::to("/")));
    }

    if form.username.is_empty() || form.password.is_empty() {
        state
            .sessions
            .push_flash(sid, FlashKind::Error, "Please enter both username and password")
            .await;
        return Ok((jar, Redirect::to("/")));
    }

    info!("Login attempt for user: {}", form.username);

    match state
        .user_repository
        .authenticate(&form.username, &form.password)
        .await
    {
        Ok(Some(user)) => {
            let message = format!("Welcome back, {}!", user.username);
            state
                .sessions
                .login(
                    sid,
                    SessionUser {
                        id: user.id,
                        username: user.username,
                        email: user.email,
                        role: user.role,
                    },
                )
                .await;
            state.sessions.push_flash(sid, FlashKind::Success, message).await;
        }
        Ok(None) => {
            state.sessions.record_failed_login(sid).await;
            state
                .sessions
                .push_flash(sid, FlashKind::Error, "Invalid credentials")
                .await;
        }
        Err(e) => {
            state
                .sessions
                .push_flash(sid, FlashKind::Error, e.to_string())
                .await;
        }
    }

    Ok((jar, Redirect::to("/")))
}

/// Logout endpoint; tears the session down entirely
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> PortalResult<impl IntoResponse> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if let Ok(sid) = cookie.value().parse() {
            state.sessions.logout(sid).await;
        }
    }

    Ok((jar.remove(Cookie::from(SESSION_COOKIE)), Redirect::to("/")))
}

/// Student self-registration; always creates a student account
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<RegisterForm>,
) -> PortalResult<impl IntoResponse> {
    let (jar, sid) = establish_session(&state.sessions, jar).await;

    if let Err(message) =
        crate::validation::validate_new_password(&form.password, &form.confirm_password)
    {
        state.sessions.push_flash(sid, FlashKind::Error, message).await;
        return Ok((jar, Redirect::to("/")));
    }

    let new_user = NewUser {
        username: form.username,
        email: form.email,
        password: form.password,
        role: Role::Student,
    };

    match state.user_repository.create(&new_user).await {
        Ok(user) => {
            info!("Registered new student: {}", user.username);
            state
                .sessions
                .push_flash(sid, FlashKind::Success, "User created successfully")
                .await;
            state
                .sessions
                .push_flash(sid, FlashKind::Info, "You can now log in with your new account!")
                .await;
        }
        Err(e) => {
            state
                .sessions
                .push_flash(sid, FlashKind::Error, e.to_string())
                .await;
        }
    }

    Ok((jar, Redirect::to("/")))
}

/// Profile page for the current user
pub async fn profile(
    State(state): State<AppState>,
    jar: CookieJar,
) -> PortalResult<impl IntoResponse> {
    let (jar, sid) = establish_session(&state.sessions, jar).await;
    let user = require_user(&state.sessions, sid).await?;
    let flashes = state.sessions.take_flashes(sid).await;

    Ok((jar, Html(views::profile_page(&user, &flashes))))
}

/// Password change form
pub async fn password_form(
    State(state): State<AppState>,
    jar: CookieJar,
) -> PortalResult<impl IntoResponse> {
    let (jar, sid) = establish_session(&state.sessions, jar).await;
    let user = require_user(&state.sessions, sid).await?;
    let flashes = state.sessions.take_flashes(sid).await;

    Ok((jar, Html(views::password_page(&user, &flashes))))
}

/// Change the current user's password, verifying the old one first
pub async fn change_password(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<PasswordForm>,
) -> PortalResult<impl IntoResponse> {
    let (jar, sid) = establish_session(&state.sessions, jar).await;
    let user = require_user(&state.sessions, sid).await?;

    let current = state
        .user_repository
        .authenticate(&user.username, &form.current_password)
        .await;
    match current {
        Ok(Some(_)) => {}
        Ok(None) => {
            state
                .sessions
                .push_flash(sid, FlashKind::Error, "Current password is incorrect")
                .await;
            return Ok((jar, Redirect::to("/password")));
        }
        Err(e) => {
            state
                .sessions
                .push_flash(sid, FlashKind::Error, e.to_string())
                .await;
            return Ok((jar, Redirect::to("/password")));
        }
    }

    if let Err(message) =
        crate::validation::validate_new_password(&form.new_password, &form.confirm_password)
    {
        state.sessions.push_flash(sid, FlashKind::Error, message).await;
        return Ok((jar, Redirect::to("/password")));
    }

    match state
        .user_repository
        .update_password(&user.username, &form.new_password)
        .await
    {
        Ok(()) => {
            state.sessions.logout(sid).await;
            // New session carries the messages across the forced re-login
            let sid = state.sessions.create().await;
            state
                .sessions
                .push_flash(sid, FlashKind::Success, "Password updated successfully")
                .await;
            state
                .sessions
                .push_flash(sid, FlashKind::Info, "Please log in again with your new password")
                .await;
            let cookie = Cookie::build((SESSION_COOKIE, sid.to_string()))
                .path("/")
                .http_only(true)
                .same_site(SameSite::Lax)
                .build();
            Ok((jar.add(cookie), Redirect::to("/")))
        }
        Err(e) => {
            state
                .sessions
                .push_flash(sid, FlashKind::Error, e.to_string())
                .await;
            Ok((jar, Redirect::to("/password")))
        }
    }
}

/// Student dashboard
pub async fn student_dashboard(
    State(state): State<AppState>,
    jar: CookieJar,
) -> PortalResult<impl IntoResponse> {
    let (jar, sid) = establish_session(&state.sessions, jar).await;
    let user = require_role(&state.sessions, sid, Role::Student).await?;
    let flashes = state.sessions.take_flashes(sid).await;

    Ok((jar, Html(views::student_page(&user, &flashes))))
}

/// Admin dashboard: stats, user table, create form
pub async fn admin_dashboard(
    State(state): State<AppState>,
    jar: CookieJar,
) -> PortalResult<impl IntoResponse> {
    let (jar, sid) = establish_session(&state.sessions, jar).await;
    let user = require_role(&state.sessions, sid, Role::Admin).await?;

    let users = state.user_repository.list().await?;
    let flashes = state.sessions.take_flashes(sid).await;

    Ok((jar, Html(views::admin_page(&user, &users, &flashes))))
}

/// Admin user creation
pub async fn admin_create_user(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<CreateUserForm>,
) -> PortalResult<impl IntoResponse> {
    let (jar, sid) = establish_session(&state.sessions, jar).await;
    require_role(&state.sessions, sid, Role::Admin).await?;

    let Some(role) = Role::parse(&form.role) else {
        state
            .sessions
            .push_flash(sid, FlashKind::Error, "Invalid role specified")
            .await;
        return Ok((jar, Redirect::to("/admin")));
    };

    let new_user = NewUser {
        username: form.username,
        email: form.email,
        password: form.password,
        role,
    };

    match state.user_repository.create(&new_user).await {
        Ok(user) => {
            state
                .sessions
                .push_flash(
                    sid,
                    FlashKind::Success,
                    format!("User created successfully: {}", user.username),
                )
                .await;
        }
        Err(e) => {
            state
                .sessions
                .push_flash(sid, FlashKind::Error, e.to_string())
                .await;
        }
    }

    Ok((jar, Redirect::to("/admin")))
}

/// Admin edit form for a single user
pub async fn admin_edit_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    jar: CookieJar,
) -> PortalResult<impl IntoResponse> {
    let (jar, sid) = establish_session(&state.sessions, jar).await;
    let current = require_role(&state.sessions, sid, Role::Admin).await?;

    let target = state
        .user_repository
        .find_by_id(id)
        .await?
        .ok_or(PortalError::NotFound)?;

    let is_last_admin = target.role == Role::Admin
        && state.user_repository.count_by_role(Role::Admin).await? <= 1;

    let flashes = state.sessions.take_flashes(sid).await;

    Ok((
        jar,
        Html(views::edit_user_page(&current, &target, is_last_admin, &flashes)),
    ))
}

/// Apply an admin edit to a user
pub async fn admin_update_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    jar: CookieJar,
    Form(form): Form<EditUserForm>,
) -> PortalResult<impl IntoResponse> {
    let (jar, sid) = establish_session(&state.sessions, jar).await;
    require_role(&state.sessions, sid, Role::Admin).await?;

    let Some(role) = Role::parse(&form.role) else {
        state
            .sessions
            .push_flash(sid, FlashKind::Error, "Invalid role specified")
            .await;
        return Ok((jar, Redirect::to("/admin")));
    };

    let update = UserUpdate {
        username: form.username,
        email: form.email,
        role,
    };

    match state.user_repository.update(id, &update).await {
        Ok(_) => {
            state
                .sessions
                .push_flash(sid, FlashKind::Success, "User updated successfully")
                .await;
            Ok((jar, Redirect::to("/admin")))
        }
        Err(e) => {
            state
                .sessions
                .push_flash(sid, FlashKind::Error, e.to_string())
                .await;
            Ok((jar, Redirect::to(&format!("/admin/users/{}/edit", id))))
        }
    }
}

/// Delete a user; self-deletion is blocked here rather than in the store
pub async fn admin_delete_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    jar: CookieJar,
) -> PortalResult<impl IntoResponse> {
    let (jar, sid) = establish_session(&state.sessions, jar).await;
    let current = require_role(&state.sessions, sid, Role::Admin).await?;

    if id == current.id {
        state
            .sessions
            .push_flash(sid, FlashKind::Error, "You cannot delete your own account")
            .await;
        return Ok((jar, Redirect::to("/admin")));
    }

    match state.user_repository.delete(id).await {
        Ok(()) => {
            state
                .sessions
                .push_flash(sid, FlashKind::Success, "User deleted successfully")
                .await;
        }
        Err(e) => {
            state
                .sessions
                .push_flash(sid, FlashKind::Error, e.to_string())
                .await;
        }
    }

    Ok((jar, Redirect::to("/admin")))
}
