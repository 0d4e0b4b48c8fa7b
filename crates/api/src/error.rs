//! Unified error handling for the API.
//!
//! Every failure leaves the server as `{ "error": "<message>" }` with a
//! matching status code. Validation failures add a `fields` object keyed by
//! the request field name.

use std::collections::BTreeMap;

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;

/// Per-field validation messages.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<&'static str, String>);

impl FieldErrors {
    /// Empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a problem with `field`. The first message per field wins.
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_insert_with(|| message.into());
    }

    /// Record `message` for `field` when `failed` is true.
    pub fn check(&mut self, failed: bool, field: &'static str, message: &str) {
        if failed {
            self.add(field, message);
        }
    }

    /// Whether any field failed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `Ok(())` when empty, otherwise a validation error.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] carrying every recorded field.
    pub fn finish(self) -> Result<(), AppError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self))
        }
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fields: Vec<&str> = self.0.keys().copied().collect();
        write!(f, "{}", fields.join(", "))
    }
}

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication failed.
    #[error("{0}")]
    Auth(#[from] AuthError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User lacks permission.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request conflicts with current state.
    #[error("{0}")]
    Conflict(String),

    /// One or more fields failed validation.
    #[error("Validation failed: {0}")]
    Validation(FieldErrors),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub(crate) fn status(&self) -> StatusCode {
        match self {
            Self::Database(err) => repository_status(err),
            Self::Auth(err) => auth_status(err),
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
        }
    }

    /// Message safe to show a client.
    pub(crate) fn public_message(&self) -> String {
        match self {
            Self::Database(RepositoryError::NotFound) => "Not found".to_string(),
            Self::Database(
                err @ (RepositoryError::Conflict(_)
                | RepositoryError::Stock(_)
                | RepositoryError::Transition(_)
                | RepositoryError::Coupon(_)
                | RepositoryError::InvalidValue(_)),
            ) => err.to_string(),
            Self::Auth(err) if auth_status(err) != StatusCode::INTERNAL_SERVER_ERROR => {
                err.to_string()
            }
            Self::Validation(_) => "Validation failed".to_string(),
            Self::NotFound(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::BadRequest(msg)
            | Self::Conflict(msg) => msg.clone(),
            _ => "Internal server error".to_string(),
        }
    }
}

fn repository_status(err: &RepositoryError) -> StatusCode {
    match err {
        RepositoryError::NotFound => StatusCode::NOT_FOUND,
        RepositoryError::Conflict(_)
        | RepositoryError::Stock(_)
        | RepositoryError::Transition(_) => StatusCode::CONFLICT,
        RepositoryError::Coupon(_) | RepositoryError::InvalidValue(_) => StatusCode::BAD_REQUEST,
        RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn auth_status(err: &AuthError) -> StatusCode {
    match err {
        AuthError::InvalidCredentials
        | AuthError::MissingToken
        | AuthError::InvalidToken
        | AuthError::ExpiredToken
        | AuthError::AccountDisabled => StatusCode::UNAUTHORIZED,
        AuthError::InvalidEmail(_)
        | AuthError::WeakPassword(_)
        | AuthError::InvalidResetToken => StatusCode::BAD_REQUEST,
        AuthError::Repository(inner) => repository_status(inner),
        AuthError::PasswordHash | AuthError::TokenGeneration(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Log server errors with Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "API request error"
            );
        }

        let body = match &self {
            Self::Validation(fields) => json!({
                "error": "Validation failed",
                "fields": fields.0,
            }),
            _ => json!({ "error": self.public_message() }),
        };

        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

/// Set the Sentry user context from a staff ID.
pub fn set_sentry_user(staff_id: i32, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(staff_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::to_bytes;
    use emporium_core::stock::StockError;
    use emporium_core::{OrderStatus, StatusTransitionError};
    use serde_json::Value;

    use super::*;

    async fn body_json(err: AppError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("order 12".to_string());
        assert_eq!(err.to_string(), "Not found: order 12");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        fn get_status(err: AppError) -> StatusCode {
            err.into_response().status()
        }

        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Forbidden("test".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::Conflict("test".to_string())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::Database(RepositoryError::NotFound)),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Database(RepositoryError::Stock(
                StockError::Insufficient {
                    available: 1,
                    requested: 2
                }
            ))),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::Database(RepositoryError::InvalidValue(
                "numeric value out of range".to_string()
            ))),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Auth(AuthError::ExpiredToken)),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_error_body_shape() {
        let (status, body) = body_json(AppError::Database(RepositoryError::Transition(
            StatusTransitionError {
                from: OrderStatus::Delivered,
                to: OrderStatus::Pending,
            },
        )))
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "cannot move order from delivered to pending");
    }

    #[tokio::test]
    async fn test_internal_details_hidden() {
        let (_, body) = body_json(AppError::Database(RepositoryError::DataCorruption(
            "bad enum in row 7".to_string(),
        )))
        .await;
        assert_eq!(body["error"], "Internal server error");
    }

    #[tokio::test]
    async fn test_validation_body_lists_fields() {
        let mut fields = FieldErrors::new();
        fields.add("sku", "is required");
        fields.add("sku", "ignored second message");
        fields.check(true, "sellingPrice", "must not be negative");
        fields.check(false, "name", "unused");

        let (status, body) = body_json(fields.finish().unwrap_err()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Validation failed");
        assert_eq!(body["fields"]["sku"], "is required");
        assert_eq!(body["fields"]["sellingPrice"], "must not be negative");
        assert!(body["fields"].get("name").is_none());
    }
}
