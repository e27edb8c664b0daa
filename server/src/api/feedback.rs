//! Feedback submission and review.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use super::AppState;
use crate::auth::{require_admin_or_moderator, require_auth, CurrentSession};
use crate::db::{Feedback, FeedbackCategory, NewFeedback};
use crate::error::AppError;

const DEFAULT_LIST_LIMIT: i64 = 50;
const MAX_LIST_LIMIT: i64 = 100;

/// Feedback submission.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateFeedbackRequest {
    pub category: FeedbackCategory,
    #[validate(length(min = 10, max = 2000))]
    pub message: String,
    /// Page the feedback refers to.
    #[validate(length(max = 200))]
    pub page: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListFeedbackQuery {
    pub limit: Option<i64>,
}

/// Submit feedback, signed in or not.
///
/// Signed-in callers must pass the account checks, so banned users cannot
/// post anonymously with their session attached.
///
/// POST /api/feedback
#[tracing::instrument(skip_all)]
pub async fn create_feedback(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    WithRejection(Json(body), _): WithRejection<Json<CreateFeedbackRequest>, AppError>,
) -> Result<(StatusCode, Json<Feedback>), AppError> {
    let user_id = match session {
        Some(session) => Some(require_auth(state.users.as_ref(), Some(session)).await?.user.id),
        None => None,
    };
    body.validate()?;

    let feedback = state
        .feedback
        .create_feedback(NewFeedback {
            user_id,
            category: body.category,
            message: body.message,
            page: body.page,
        })
        .await?;

    info!(feedback_id = %feedback.id, anonymous = user_id.is_none(), "Feedback received");
    Ok((StatusCode::CREATED, Json(feedback)))
}

/// List recent feedback for review.
///
/// GET /api/feedback?limit=50
#[tracing::instrument(skip_all)]
pub async fn list_feedback(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    WithRejection(Query(query), _): WithRejection<Query<ListFeedbackQuery>, AppError>,
) -> Result<Json<Vec<Feedback>>, AppError> {
    require_admin_or_moderator(state.users.as_ref(), session).await?;

    let limit = query
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);
    Ok(Json(state.feedback.list_feedback(limit).await?))
}
