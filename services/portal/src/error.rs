//! Custom error types for the portal service

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

use crate::models::Role;
use crate::views;

/// Account service errors. The display strings double as the messages shown
/// to the user, so their wording is part of the contract.
#[derive(Error, Debug)]
pub enum AccountError {
    /// Bad input shape; carries the field-specific message
    #[error("{0}")]
    Validation(String),

    /// Username or email collides with an existing user
    #[error("Username or email already exists")]
    AlreadyExists,

    /// Deleting the target would leave the system without admins
    #[error("Cannot delete the last admin user")]
    LastAdminDelete,

    /// Demoting the target would leave the system without admins
    #[error("Cannot change role: This is the last admin user in the system")]
    LastAdminDemote,

    /// No user with the given id or username
    #[error("User not found")]
    NotFound,

    /// Password hashing or verification failed
    #[error("Password hashing error: {0}")]
    Hash(String),

    /// Generic storage failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Type alias for account service results
pub type AccountResult<T> = Result<T, AccountError>;

/// Top-level handler errors, rendered as HTML error pages
#[derive(Error, Debug)]
pub enum PortalError {
    /// Page requires a logged-in user
    #[error("Please log in to access this page")]
    Unauthorized,

    /// Page requires a specific role
    #[error("{} access required", .0.title())]
    Forbidden(Role),

    /// Unknown resource
    #[error("Not found")]
    NotFound,

    /// Anything unexpected; details are logged, not shown
    #[error("An unexpected error occurred. Please refresh the page.")]
    Internal(#[from] anyhow::Error),
}

impl From<AccountError> for PortalError {
    fn from(e: AccountError) -> Self {
        PortalError::Internal(e.into())
    }
}

impl IntoResponse for PortalError {
    fn into_response(self) -> Response {
        let (status, offer_logout) = match &self {
            PortalError::Unauthorized => (StatusCode::UNAUTHORIZED, false),
            PortalError::Forbidden(_) => (StatusCode::FORBIDDEN, true),
            PortalError::NotFound => (StatusCode::NOT_FOUND, false),
            PortalError::Internal(e) => {
                tracing::error!("Unhandled portal error: {:#}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, true)
            }
        };

        let body = views::error_page(&self.to_string(), offer_logout);
        (status, Html(body)).into_response()
    }
}

/// Type alias for handler results
pub type PortalResult<T> = Result<T, PortalError>;
