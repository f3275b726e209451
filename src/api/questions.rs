use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    routing::post,
    Json, Router,
};
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentAdmin;
use crate::api::validation::validate_payload;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::Question;
use crate::repositories;
use crate::schemas::question::{QuestionCreate, QuestionResponse};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_question).get(list_questions))
        .route(
            "/:question_id",
            get(get_question).put(update_question).delete(delete_question),
        )
}

async fn create_question(
    State(state): State<AppState>,
    CurrentAdmin(_admin): CurrentAdmin,
    Json(payload): Json<QuestionCreate>,
) -> Result<(StatusCode, Json<QuestionResponse>), ApiError> {
    validate_payload(&payload)?;

    let now = primitive_now_utc();
    let question = repositories::questions::create(
        state.db(),
        repositories::questions::CreateQuestion {
            id: &Uuid::new_v4().to_string(),
            content: &payload.content,
            body: &payload.body,
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create question"))?;

    Ok((StatusCode::CREATED, Json(QuestionResponse::from_db(question))))
}

async fn list_questions(
    State(state): State<AppState>,
    CurrentAdmin(_admin): CurrentAdmin,
) -> Result<Json<Vec<QuestionResponse>>, ApiError> {
    let questions = repositories::questions::list(state.db())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list questions"))?;

    Ok(Json(questions.into_iter().map(QuestionResponse::from_db).collect()))
}

async fn get_question(
    Path(question_id): Path<String>,
    State(state): State<AppState>,
    CurrentAdmin(_admin): CurrentAdmin,
) -> Result<Json<QuestionResponse>, ApiError> {
    let question = fetch_question(&state, &question_id).await?;
    Ok(Json(QuestionResponse::from_db(question)))
}

async fn update_question(
    Path(question_id): Path<String>,
    State(state): State<AppState>,
    CurrentAdmin(_admin): CurrentAdmin,
    Json(payload): Json<QuestionCreate>,
) -> Result<Json<QuestionResponse>, ApiError> {
    validate_payload(&payload)?;

    let updated = repositories::questions::update(
        state.db(),
        &question_id,
        &payload.content,
        &payload.body,
        primitive_now_utc(),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to update question"))?;

    let Some(question) = updated else {
        return Err(ApiError::NotFound("Question not found".to_string()));
    };

    Ok(Json(QuestionResponse::from_db(question)))
}

async fn delete_question(
    Path(question_id): Path<String>,
    State(state): State<AppState>,
    CurrentAdmin(_admin): CurrentAdmin,
) -> Result<Json<serde_json::Value>, ApiError> {
    let question = fetch_question(&state, &question_id).await?;

    let referenced = repositories::questions::used_by_exam(state.db(), &question.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to check question references"))?;
    if referenced {
        return Err(ApiError::Conflict(
            "Question cannot be deleted while an exam references it".to_string(),
        ));
    }

    repositories::questions::delete_by_id(state.db(), &question.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete question"))?;

    Ok(Json(serde_json::json!({ "message": "Question deleted" })))
}

async fn fetch_question(state: &AppState, question_id: &str) -> Result<Question, ApiError> {
    repositories::questions::find_by_id(state.db(), question_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load question"))?
        .ok_or_else(|| ApiError::NotFound("Question not found".to_string()))
}
