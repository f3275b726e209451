use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::core::state::AppState;
use crate::core::time::{format_primitive, primitive_now_utc};
use crate::db::models::{Attempt, AttemptBody};
use crate::db::types::AttemptStatus;
use crate::repositories;
use crate::schemas::attempt::{
    AnswerPayload, AttemptHistoryItem, CheckResponse, ElapsedTime, SubmitRequest, SubmitResponse,
};
use crate::services::answers::CanonicalAnswer;
use crate::services::grading;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_attempts))
        .route("/:attempt_id/answer", post(check_answer))
        .route("/:attempt_id/submit", post(submit_attempt))
}

/// Read-only single-question probe for instant feedback. Never mutates the
/// attempt and deliberately ignores the finished-state guard, so it stays
/// usable any number of times.
async fn check_answer(
    Path(attempt_id): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<AnswerPayload>,
) -> Result<Json<CheckResponse>, ApiError> {
    let attempt = fetch_attempt(&state, &attempt_id).await?;

    let question = attempt
        .questions
        .0
        .iter()
        .find(|question| question.question_id == payload.question_id)
        .ok_or_else(|| ApiError::NotFound("Question not found in this attempt".to_string()))?;

    let (canonical, outcome) = grading::grade_payload(question, &payload);

    let reveals_tokens =
        matches!(question.body, AttemptBody::Single { .. } | AttemptBody::Multi { .. });
    let selected_matrix = match &canonical {
        CanonicalAnswer::Cells(cells) => cells.clone(),
        _ => Vec::new(),
    };
    let mapping = match canonical {
        CanonicalAnswer::Mapping(mapping) => mapping,
        _ => Default::default(),
    };

    Ok(Json(CheckResponse {
        question_id: payload.question_id,
        correct: outcome.is_correct,
        correct_tokens: if reveals_tokens { outcome.correct_tokens } else { Vec::new() },
        selected_matrix,
        mapping,
    }))
}

/// Terminal, single-shot submission: grades every answer against the frozen
/// snapshot and finalizes the attempt. The status check plus the conditional
/// update in the repository make a concurrent double-submit lose cleanly.
async fn submit_attempt(
    Path(attempt_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let attempt = fetch_attempt(&state, &attempt_id).await?;

    if attempt.user_id != user.id {
        return Err(ApiError::Forbidden("Access denied"));
    }

    if attempt.submitted_at.is_some() || attempt.status == AttemptStatus::Finished {
        return Err(ApiError::Conflict("Attempt already submitted".to_string()));
    }

    let (score, details) = grading::grade_submission(&attempt.questions.0, &payload.answers);
    let total = attempt.questions.0.len() as i32;
    let submitted_at = primitive_now_utc();

    let finalized = repositories::attempts::finalize(
        state.db(),
        &attempt.id,
        score,
        total,
        submitted_at,
        submitted_at,
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to finalize attempt"))?;

    if !finalized {
        return Err(ApiError::Conflict("Attempt already submitted".to_string()));
    }

    let elapsed_seconds = (submitted_at - attempt.started_at).whole_seconds().max(0);

    metrics::counter!("attempts_submitted_total").increment(1);
    tracing::info!(
        attempt_id = %attempt.id,
        user_id = %user.id,
        score,
        total,
        elapsed_seconds,
        "Attempt submitted"
    );

    Ok(Json(SubmitResponse {
        msg: "Submitted successfully".to_string(),
        correct_count: score,
        total,
        score10: grading::score10(score, total),
        submitted_at: format_primitive(submitted_at),
        elapsed_time: ElapsedTime { seconds: elapsed_seconds, minutes: elapsed_seconds / 60 },
        details,
    }))
}

async fn list_attempts(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<AttemptHistoryItem>>, ApiError> {
    let rows = repositories::attempts::list_for_user(state.db(), &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list attempts"))?;

    let items = rows
        .into_iter()
        .map(|row| AttemptHistoryItem {
            id: row.id,
            exam_title: row.exam_title,
            mode: row.mode,
            status: row.status,
            correct_count: row.score,
            total: row.total,
            score10: grading::score10(row.score, row.total),
            submitted_at: row.submitted_at.map(format_primitive),
        })
        .collect();

    Ok(Json(items))
}

async fn fetch_attempt(state: &AppState, attempt_id: &str) -> Result<Attempt, ApiError> {
    repositories::attempts::find_by_id(state.db(), attempt_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load attempt"))?
        .ok_or_else(|| ApiError::NotFound("Attempt not found".to_string()))
}
