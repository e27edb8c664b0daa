//! Application Error Types
//!
//! Every handler and guard returns [`AppError`]. Rendering to the JSON error
//! envelope happens in one place, the [`ErrorClassifier`].

mod classifier;

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::auth::RequiredRole;
use crate::config::Environment;

pub use classifier::{error_envelope, ErrorBody, ErrorClassifier, ErrorEnvelope};

/// Application error taxonomy.
#[derive(Debug, Error)]
pub enum AppError {
    /// Request data failed a business rule.
    #[error("{message}")]
    Validation {
        message: String,
        details: Option<String>,
    },

    /// No valid session.
    #[error("Authentication required")]
    Authentication,

    /// Authenticated but not allowed.
    #[error(transparent)]
    Authorization(#[from] AuthorizationError),

    /// Resource not found.
    #[error("{resource} not found")]
    NotFound { resource: String },

    /// Conflicting state.
    #[error("{0}")]
    Conflict(String),

    /// Too many requests. Normally produced by the rate limit guard directly.
    #[error("Too many requests, retry in {retry_after} seconds")]
    RateLimited { retry_after: u64 },

    /// Known internal failure with a safe message.
    #[error("{0}")]
    Internal(String),

    /// Request body failed schema validation.
    #[error("Validation failed")]
    Schema(#[from] validator::ValidationErrors),

    /// Database error.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// Anything else.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Reasons an authenticated caller is refused.
#[derive(Debug, Error)]
pub enum AuthorizationError {
    #[error("{0}")]
    Forbidden(String),

    #[error("Your account has been banned")]
    Banned,

    #[error("{required} access required")]
    InsufficientPermissions { required: RequiredRole },
}

/// Database failures, classified at the point of conversion.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Unique constraint violation.
    #[error("duplicate value for {field}")]
    DuplicateKey { field: String },

    /// Check, not-null or foreign key constraint violation.
    #[error("document validation failed: {0}")]
    DocumentValidation(String),

    /// A value could not be cast to the column or identifier type.
    #[error("invalid value for {path}")]
    Cast { path: String },

    #[error(transparent)]
    Database(sqlx::Error),
}

/// `PostgreSQL` `invalid_text_representation`, raised for malformed UUIDs.
const PG_INVALID_TEXT_REPRESENTATION: &str = "22P02";

impl From<sqlx::Error> for PersistenceError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db_err) => {
                if db_err.is_unique_violation() {
                    return Self::DuplicateKey {
                        field: duplicate_field(db_err.constraint(), db_err.table()),
                    };
                }
                if db_err.is_check_violation()
                    || db_err.is_foreign_key_violation()
                    || matches!(db_err.kind(), sqlx::error::ErrorKind::NotNullViolation)
                {
                    return Self::DocumentValidation(db_err.message().to_string());
                }
                if db_err.code().as_deref() == Some(PG_INVALID_TEXT_REPRESENTATION) {
                    return Self::Cast {
                        path: db_err.table().unwrap_or("value").to_string(),
                    };
                }
                Self::Database(e)
            }
            sqlx::Error::ColumnDecode { index, .. } => Self::Cast {
                path: index.clone(),
            },
            sqlx::Error::Decode(_) | sqlx::Error::TypeNotFound { .. } => Self::Cast {
                path: "value".to_string(),
            },
            _ => Self::Database(e),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        Self::Persistence(e.into())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation {
            message: "Invalid request body".to_string(),
            details: Some(rejection.body_text()),
        }
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Validation {
            message: "Invalid query parameters".to_string(),
            details: Some(rejection.body_text()),
        }
    }
}

impl AppError {
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            details: None,
        }
    }
}

/// Derives the offending field from a unique constraint name.
///
/// `users_username_key` on table `users` yields `username`.
fn duplicate_field(constraint: Option<&str>, table: Option<&str>) -> String {
    let Some(constraint) = constraint else {
        return "value".to_string();
    };
    let name = table
        .and_then(|t| constraint.strip_prefix(t))
        .and_then(|rest| rest.strip_prefix('_'))
        .unwrap_or(constraint);
    let name = ["_key", "_unique", "_idx"]
        .iter()
        .find_map(|suffix| name.strip_suffix(suffix))
        .unwrap_or(name);
    name.to_string()
}

/// Error carried in response extensions until `error_envelope` renders it.
#[derive(Debug, Clone)]
pub(crate) struct PendingError(pub Arc<AppError>);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Production-safe rendering in case no envelope layer is installed
        let mut response = ErrorClassifier::new(Environment::Production).render(&self, None);
        response.extensions_mut().insert(PendingError(Arc::new(self)));
        response
    }
}
