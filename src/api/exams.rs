use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::api::guards::{CurrentAdmin, MaybeUser};
use crate::api::validation::validate_payload;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::Exam;
use crate::db::types::{AttemptMode, UserRole};
use crate::repositories;
use crate::schemas::attempt::{PublicQuestion, SessionResponse};
use crate::schemas::exam::{ExamCreate, ExamResponse, ExamUpdate, ExamWithQuestions};
use crate::schemas::question::QuestionResponse;
use crate::services::materialize;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_exam).get(list_exams))
        .route("/:exam_id", get(get_exam).put(update_exam).delete(delete_exam))
        .route("/:exam_id/start", post(start_session))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    #[serde(default, alias = "courseId")]
    course_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GetQuery {
    #[serde(default, alias = "withQuestions")]
    with_questions: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct StartQuery {
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    shuffle: Option<bool>,
}

async fn create_exam(
    State(state): State<AppState>,
    CurrentAdmin(_admin): CurrentAdmin,
    Json(payload): Json<ExamCreate>,
) -> Result<(StatusCode, Json<ExamResponse>), ApiError> {
    validate_payload(&payload)?;
    ensure_course_exists(&state, &payload.course_id).await?;
    ensure_questions_exist(&state, &payload.question_ids).await?;

    let now = primitive_now_utc();
    let exam = repositories::exams::create(
        state.db(),
        repositories::exams::CreateExam {
            id: &Uuid::new_v4().to_string(),
            course_id: &payload.course_id,
            title: &payload.title,
            description: payload.description.as_deref(),
            time_limit_minutes: payload.time_limit_minutes,
            num_questions: payload.num_questions,
            random: payload.random,
            question_ids: &payload.question_ids,
            show_answers_after_submit: payload.show_answers_after_submit,
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create exam"))?;

    Ok((StatusCode::CREATED, Json(ExamResponse::from_db(exam))))
}

async fn list_exams(
    Query(query): Query<ListQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<ExamResponse>>, ApiError> {
    let exams = repositories::exams::list(state.db(), query.course_id.as_deref())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list exams"))?;

    Ok(Json(exams.into_iter().map(ExamResponse::from_db).collect()))
}

async fn get_exam(
    Path(exam_id): Path<String>,
    Query(query): Query<GetQuery>,
    MaybeUser(user): MaybeUser,
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let exam = fetch_exam(&state, &exam_id).await?;

    if query.with_questions.unwrap_or(false) {
        // the authoring payload carries correctness flags, so only admins
        // may resolve the referenced questions
        let is_admin = user.map(|user| user.role == UserRole::Admin).unwrap_or(false);
        if !is_admin {
            return Err(ApiError::Forbidden("Admin access required"));
        }

        let fetched = repositories::questions::find_by_ids(state.db(), &exam.question_ids.0)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to load questions"))?;
        let ordered = materialize::sequence_questions(&exam.question_ids.0, fetched);

        let response = ExamWithQuestions {
            exam: ExamResponse::from_db(exam),
            questions: ordered.into_iter().map(QuestionResponse::from_db).collect(),
        };
        return serde_json::to_value(response)
            .map(Json)
            .map_err(|e| ApiError::internal(e, "Failed to serialize exam"));
    }

    serde_json::to_value(ExamResponse::from_db(exam))
        .map(Json)
        .map_err(|e| ApiError::internal(e, "Failed to serialize exam"))
}

async fn update_exam(
    Path(exam_id): Path<String>,
    State(state): State<AppState>,
    CurrentAdmin(_admin): CurrentAdmin,
    Json(payload): Json<ExamUpdate>,
) -> Result<Json<ExamResponse>, ApiError> {
    validate_payload(&payload)?;

    if let Some(course_id) = &payload.course_id {
        ensure_course_exists(&state, course_id).await?;
    }
    if let Some(question_ids) = &payload.question_ids {
        ensure_questions_exist(&state, question_ids).await?;
    }

    let updated = repositories::exams::update(
        state.db(),
        &exam_id,
        repositories::exams::UpdateExam {
            course_id: payload.course_id,
            title: payload.title,
            description: payload.description,
            time_limit_minutes: payload.time_limit_minutes,
            num_questions: payload.num_questions,
            random: payload.random,
            question_ids: payload.question_ids,
            show_answers_after_submit: payload.show_answers_after_submit,
            updated_at: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to update exam"))?;

    let Some(exam) = updated else {
        return Err(ApiError::NotFound("Exam not found".to_string()));
    };

    Ok(Json(ExamResponse::from_db(exam)))
}

async fn delete_exam(
    Path(exam_id): Path<String>,
    State(state): State<AppState>,
    CurrentAdmin(_admin): CurrentAdmin,
) -> Result<Json<serde_json::Value>, ApiError> {
    let exam = fetch_exam(&state, &exam_id).await?;

    if !exam.question_ids.0.is_empty() {
        return Err(ApiError::Conflict(
            "Exam cannot be deleted while it still references questions".to_string(),
        ));
    }

    let has_attempts = repositories::attempts::exists_for_exam(state.db(), &exam.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to check exam attempts"))?;
    if has_attempts {
        return Err(ApiError::Conflict(
            "Exam cannot be deleted while attempts reference it".to_string(),
        ));
    }

    repositories::exams::delete_by_id(state.db(), &exam.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete exam"))?;

    Ok(Json(serde_json::json!({ "message": "Exam deleted" })))
}

/// Materialize a randomized, answer-hidden session from the exam's question
/// set. Training mode is stateless; testing mode persists the attempt
/// snapshot, gated on authentication when the owning course is paid.
async fn start_session(
    Path(exam_id): Path<String>,
    Query(query): Query<StartQuery>,
    MaybeUser(user): MaybeUser,
    State(state): State<AppState>,
) -> Result<Json<SessionResponse>, ApiError> {
    let exam = fetch_exam(&state, &exam_id).await?;
    let course = repositories::courses::find_by_id(state.db(), &exam.course_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load course"))?
        .ok_or_else(|| ApiError::NotFound("Course not found".to_string()))?;

    let mode = match query.mode.as_deref() {
        Some("testing") => AttemptMode::Testing,
        _ => AttemptMode::Training,
    };
    let effective_shuffle = exam.random || query.shuffle.unwrap_or(false);

    let mut rng = StdRng::from_entropy();
    let retained_ids = materialize::select_question_ids(&exam, effective_shuffle, &mut rng);
    let fetched = repositories::questions::find_by_ids(state.db(), &retained_ids)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load questions"))?;
    let ordered = materialize::sequence_questions(&retained_ids, fetched);
    let attempt_questions =
        materialize::build_attempt_questions(&ordered, effective_shuffle, &mut rng);

    let mut attempt_id = None;
    if mode == AttemptMode::Testing {
        let is_free = course.price == 0;
        if !is_free && user.is_none() {
            return Err(ApiError::Unauthorized(
                "Login required for testing mode on a paid course",
            ));
        }

        if let Some(user) = &user {
            let now = primitive_now_utc();
            let attempt = repositories::attempts::create(
                state.db(),
                repositories::attempts::CreateAttempt {
                    id: &Uuid::new_v4().to_string(),
                    exam_id: &exam.id,
                    user_id: &user.id,
                    mode,
                    questions: &attempt_questions,
                    time_limit_minutes: exam.time_limit_minutes,
                    total: attempt_questions.len() as i32,
                    started_at: now,
                    created_at: now,
                    updated_at: now,
                },
            )
            .await
            .map_err(|e| ApiError::internal(e, "Failed to create attempt"))?;

            metrics::counter!("attempts_started_total").increment(1);
            tracing::info!(
                exam_id = %exam.id,
                attempt_id = %attempt.id,
                user_id = %user.id,
                shuffled = effective_shuffle,
                questions = attempt_questions.len(),
                "Attempt started"
            );
            attempt_id = Some(attempt.id);
        }
    }

    let questions = attempt_questions.iter().map(PublicQuestion::from_attempt).collect();

    Ok(Json(SessionResponse {
        attempt_id,
        course: course.name,
        exam_title: exam.title,
        mode,
        time_limit_minutes: exam.time_limit_minutes,
        questions,
    }))
}

async fn fetch_exam(state: &AppState, exam_id: &str) -> Result<Exam, ApiError> {
    repositories::exams::find_by_id(state.db(), exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load exam"))?
        .ok_or_else(|| ApiError::NotFound("Exam not found".to_string()))
}

async fn ensure_course_exists(state: &AppState, course_id: &str) -> Result<(), ApiError> {
    let course = repositories::courses::find_by_id(state.db(), course_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load course"))?;
    if course.is_none() {
        return Err(ApiError::BadRequest("Invalid course_id".to_string()));
    }
    Ok(())
}

async fn ensure_questions_exist(state: &AppState, question_ids: &[String]) -> Result<(), ApiError> {
    if question_ids.is_empty() {
        return Ok(());
    }

    let found = repositories::questions::count_by_ids(state.db(), question_ids)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to check questions"))?;
    if found != question_ids.len() as i64 {
        return Err(ApiError::BadRequest("Some question ids are invalid".to_string()));
    }
    Ok(())
}
