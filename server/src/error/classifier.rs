//! Maps errors to the JSON error envelope.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};
use uuid::Uuid;

use super::{AppError, AuthorizationError, PendingError, PersistenceError};
use crate::api::AppState;
use crate::config::Environment;

const GENERIC_MESSAGE: &str = "An unexpected error occurred";

/// Error response body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
    /// Correlation id, only exposed outside production.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Converts [`AppError`]s into responses for one deployment environment.
#[derive(Debug, Clone, Copy)]
pub struct ErrorClassifier {
    environment: Environment,
}

impl ErrorClassifier {
    pub const fn new(environment: Environment) -> Self {
        Self { environment }
    }

    const fn expose_internals(&self) -> bool {
        !self.environment.is_production()
    }

    /// Classifies an error into status, code, message and details.
    pub fn classify(&self, err: &AppError) -> ErrorBody {
        let (status, code, message, details) = match err {
            AppError::Validation { message, details } => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                message.clone(),
                details.clone(),
            ),
            AppError::Authentication => (
                StatusCode::UNAUTHORIZED,
                "AUTHENTICATION_ERROR",
                err.to_string(),
                None,
            ),
            AppError::Authorization(reason) => {
                let code = match reason {
                    AuthorizationError::Forbidden(_) => "AUTHORIZATION_ERROR",
                    AuthorizationError::Banned => "USER_BANNED",
                    AuthorizationError::InsufficientPermissions { .. } => {
                        "INSUFFICIENT_PERMISSIONS"
                    }
                };
                (StatusCode::FORBIDDEN, code, reason.to_string(), None)
            }
            AppError::NotFound { .. } => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string(), None)
            }
            AppError::Conflict(message) => {
                (StatusCode::CONFLICT, "CONFLICT", message.clone(), None)
            }
            AppError::RateLimited { .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                "RATE_LIMIT_EXCEEDED",
                err.to_string(),
                None,
            ),
            AppError::Internal(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                message.clone(),
                None,
            ),
            AppError::Schema(errors) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                "Validation failed".to_string(),
                Some(field_report(errors)),
            ),
            AppError::Persistence(e) => self.classify_persistence(e),
            AppError::Other(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                GENERIC_MESSAGE.to_string(),
                self.expose_internals().then(|| format!("{e:?}")),
            ),
        };

        ErrorBody {
            message,
            code: Some(code.to_string()),
            status_code: status.as_u16(),
            details,
        }
    }

    fn classify_persistence(
        &self,
        err: &PersistenceError,
    ) -> (StatusCode, &'static str, String, Option<String>) {
        match err {
            PersistenceError::DuplicateKey { field } => (
                StatusCode::CONFLICT,
                "DUPLICATE_KEY",
                format!("A record with this {field} already exists"),
                None,
            ),
            PersistenceError::DocumentValidation(reason) => (
                StatusCode::BAD_REQUEST,
                "DOCUMENT_VALIDATION_ERROR",
                "The submitted data is invalid".to_string(),
                self.expose_internals().then(|| reason.clone()),
            ),
            // Never echo the raw value back
            PersistenceError::Cast { .. } => (
                StatusCode::BAD_REQUEST,
                "INVALID_ID",
                "Invalid identifier format".to_string(),
                None,
            ),
            PersistenceError::Database(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                GENERIC_MESSAGE.to_string(),
                self.expose_internals().then(|| format!("{e:?}")),
            ),
        }
    }

    /// Renders an error without logging.
    pub fn render(&self, err: &AppError, request_id: Option<&str>) -> Response {
        let body = self.classify(err);
        let status =
            StatusCode::from_u16(body.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let envelope = ErrorEnvelope {
            error: body,
            request_id: request_id
                .filter(|_| self.expose_internals())
                .map(str::to_string),
        };
        (status, Json(envelope)).into_response()
    }

    /// Logs the error with a fresh request id and renders it.
    pub fn handle_error(&self, err: &AppError) -> Response {
        let request_id = Uuid::now_v7().to_string();
        let body = self.classify(err);

        if body.status_code >= 500 {
            error!(
                request_id = %request_id,
                status = body.status_code,
                code = body.code.as_deref().unwrap_or_default(),
                error = ?err,
                "Request failed"
            );
        } else {
            warn!(
                request_id = %request_id,
                status = body.status_code,
                code = body.code.as_deref().unwrap_or_default(),
                error = %err,
                "Request rejected"
            );
        }

        self.render(err, Some(&request_id))
    }
}

/// Field-level report, one `field: message` line per failure, sorted by field.
fn field_report(errors: &validator::ValidationErrors) -> String {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));

    let mut lines = Vec::new();
    for (field, field_errors) in fields {
        for e in field_errors {
            let reason = e
                .message
                .as_ref()
                .map_or_else(|| e.code.to_string(), ToString::to_string);
            lines.push(format!("{field}: {reason}"));
        }
    }
    lines.join("\n")
}

/// Middleware rendering [`AppError`]s through the configured classifier.
///
/// Headers already present on the failed response (rate limit headers, for
/// instance) are carried over.
pub async fn error_envelope(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    let Some(PendingError(err)) = response.extensions().get::<PendingError>().cloned() else {
        return response;
    };

    let (parts, _) = response.into_parts();
    let mut rendered = state.errors.handle_error(&err);
    let headers = rendered.headers_mut();
    for (name, value) in &parts.headers {
        if name == header::CONTENT_TYPE || name == header::CONTENT_LENGTH {
            continue;
        }
        if !headers.contains_key(name) {
            headers.insert(name.clone(), value.clone());
        }
    }
    rendered
}
