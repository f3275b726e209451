use std::collections::HashMap;

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
use crate::db::models::Course;
use crate::repositories;
use crate::schemas::course::{CourseCreate, CourseResponse, CourseUpdate, CourseWithExams};
use crate::schemas::exam::ExamSummary;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_course).get(list_courses))
        .route(
            "/:course_id",
            get(get_course).put(update_course).delete(delete_course),
        )
}

async fn create_course(
    State(state): State<AppState>,
    CurrentAdmin(_admin): CurrentAdmin,
    Json(payload): Json<CourseCreate>,
) -> Result<(StatusCode, Json<CourseResponse>), ApiError> {
    validate_payload(&payload)?;

    let existing = repositories::courses::exists_by_name(state.db(), &payload.name)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to check existing course"))?;
    if existing.is_some() {
        return Err(ApiError::Conflict("Course with this name already exists".to_string()));
    }

    let now = primitive_now_utc();
    let course = repositories::courses::create(
        state.db(),
        repositories::courses::CreateCourse {
            id: &Uuid::new_v4().to_string(),
            name: &payload.name,
            description: payload.description.as_deref(),
            price: payload.price,
            duration_days: payload.duration_days,
            is_trial_available: payload.is_trial_available,
            active: payload.active,
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create course"))?;

    Ok((StatusCode::CREATED, Json(CourseResponse::from_db(course))))
}

async fn list_courses(
    State(state): State<AppState>,
) -> Result<Json<Vec<CourseWithExams>>, ApiError> {
    let courses = repositories::courses::list(state.db())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list courses"))?;

    let course_ids: Vec<String> = courses.iter().map(|course| course.id.clone()).collect();
    let exams = repositories::exams::list_by_course_ids(state.db(), &course_ids)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list exams"))?;

    let mut exams_by_course: HashMap<String, Vec<ExamSummary>> = HashMap::new();
    for exam in exams {
        exams_by_course
            .entry(exam.course_id.clone())
            .or_default()
            .push(ExamSummary::from_db(exam));
    }

    let response = courses
        .into_iter()
        .map(|course| {
            let exams = exams_by_course.remove(&course.id).unwrap_or_default();
            CourseWithExams { course: CourseResponse::from_db(course), exams }
        })
        .collect();

    Ok(Json(response))
}

async fn get_course(
    Path(course_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<CourseWithExams>, ApiError> {
    let course = fetch_course(&state, &course_id).await?;

    let exams = repositories::exams::list(state.db(), Some(&course.id))
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list exams"))?;

    Ok(Json(CourseWithExams {
        course: CourseResponse::from_db(course),
        exams: exams.into_iter().map(ExamSummary::from_db).collect(),
    }))
}

async fn update_course(
    Path(course_id): Path<String>,
    State(state): State<AppState>,
    CurrentAdmin(_admin): CurrentAdmin,
    Json(payload): Json<CourseUpdate>,
) -> Result<Json<CourseResponse>, ApiError> {
    validate_payload(&payload)?;

    let updated = repositories::courses::update(
        state.db(),
        &course_id,
        repositories::courses::UpdateCourse {
            name: payload.name,
            description: payload.description,
            price: payload.price,
            duration_days: payload.duration_days,
            is_trial_available: payload.is_trial_available,
            active: payload.active,
            updated_at: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to update course"))?;

    let Some(course) = updated else {
        return Err(ApiError::NotFound("Course not found".to_string()));
    };

    Ok(Json(CourseResponse::from_db(course)))
}

async fn delete_course(
    Path(course_id): Path<String>,
    State(state): State<AppState>,
    CurrentAdmin(_admin): CurrentAdmin,
) -> Result<Json<serde_json::Value>, ApiError> {
    let course = fetch_course(&state, &course_id).await?;

    let exam_count = repositories::exams::count_by_course(state.db(), &course.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count exams"))?;
    if exam_count > 0 {
        return Err(ApiError::Conflict(
            "Course cannot be deleted while it still has exams".to_string(),
        ));
    }

    repositories::courses::delete_by_id(state.db(), &course.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete course"))?;

    Ok(Json(serde_json::json!({ "message": "Course deleted" })))
}

async fn fetch_course(state: &AppState, course_id: &str) -> Result<Course, ApiError> {
    repositories::courses::find_by_id(state.db(), course_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load course"))?
        .ok_or_else(|| ApiError::NotFound("Course not found".to_string()))
}
