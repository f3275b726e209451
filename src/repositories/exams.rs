use sqlx::types::Json;
use sqlx::PgPool;

use crate::db::models::Exam;

const COLUMNS: &str = "\
    id, course_id, title, description, time_limit_minutes, num_questions, random, \
    question_ids, show_answers_after_submit, created_at, updated_at";

pub(crate) struct CreateExam<'a> {
    pub(crate) id: &'a str,
    pub(crate) course_id: &'a str,
    pub(crate) title: &'a str,
    pub(crate) description: Option<&'a str>,
    pub(crate) time_limit_minutes: i32,
    pub(crate) num_questions: i32,
    pub(crate) random: bool,
    pub(crate) question_ids: &'a [String],
    pub(crate) show_answers_after_submit: bool,
    pub(crate) created_at: time::PrimitiveDateTime,
    pub(crate) updated_at: time::PrimitiveDateTime,
}

pub(crate) struct UpdateExam {
    pub(crate) course_id: Option<String>,
    pub(crate) title: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) time_limit_minutes: Option<i32>,
    pub(crate) num_questions: Option<i32>,
    pub(crate) random: Option<bool>,
    pub(crate) question_ids: Option<Vec<String>>,
    pub(crate) show_answers_after_submit: Option<bool>,
    pub(crate) updated_at: time::PrimitiveDateTime,
}

pub(crate) async fn create(pool: &PgPool, params: CreateExam<'_>) -> Result<Exam, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!(
        "INSERT INTO exams (
            id, course_id, title, description, time_limit_minutes, num_questions, random,
            question_ids, show_answers_after_submit, created_at, updated_at
         ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11)
         RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.course_id)
    .bind(params.title)
    .bind(params.description)
    .bind(params.time_limit_minutes)
    .bind(params.num_questions)
    .bind(params.random)
    .bind(Json(params.question_ids))
    .bind(params.show_answers_after_submit)
    .bind(params.created_at)
    .bind(params.updated_at)
    .fetch_one(pool)
    .await
}

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Exam>, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!("SELECT {COLUMNS} FROM exams WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn list(pool: &PgPool, course_id: Option<&str>) -> Result<Vec<Exam>, sqlx::Error> {
    match course_id {
        Some(course_id) => {
            sqlx::query_as::<_, Exam>(&format!(
                "SELECT {COLUMNS} FROM exams WHERE course_id = $1 ORDER BY created_at DESC"
            ))
            .bind(course_id)
            .fetch_all(pool)
            .await
        }
        None => {
            sqlx::query_as::<_, Exam>(&format!(
                "SELECT {COLUMNS} FROM exams ORDER BY created_at DESC"
            ))
            .fetch_all(pool)
            .await
        }
    }
}

pub(crate) async fn list_by_course_ids(
    pool: &PgPool,
    course_ids: &[String],
) -> Result<Vec<Exam>, sqlx::Error> {
    if course_ids.is_empty() {
        return Ok(Vec::new());
    }

    sqlx::query_as::<_, Exam>(&format!(
        "SELECT {COLUMNS} FROM exams WHERE course_id = ANY($1) ORDER BY created_at DESC"
    ))
    .bind(course_ids)
    .fetch_all(pool)
    .await
}

pub(crate) async fn count_by_course(pool: &PgPool, course_id: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM exams WHERE course_id = $1")
        .bind(course_id)
        .fetch_one(pool)
        .await
}

pub(crate) async fn update(
    pool: &PgPool,
    id: &str,
    params: UpdateExam,
) -> Result<Option<Exam>, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!(
        "UPDATE exams SET
            course_id = COALESCE($1, course_id),
            title = COALESCE($2, title),
            description = COALESCE($3, description),
            time_limit_minutes = COALESCE($4, time_limit_minutes),
            num_questions = COALESCE($5, num_questions),
            random = COALESCE($6, random),
            question_ids = COALESCE($7, question_ids),
            show_answers_after_submit = COALESCE($8, show_answers_after_submit),
            updated_at = $9
         WHERE id = $10
         RETURNING {COLUMNS}",
    ))
    .bind(params.course_id)
    .bind(params.title)
    .bind(params.description)
    .bind(params.time_limit_minutes)
    .bind(params.num_questions)
    .bind(params.random)
    .bind(params.question_ids.map(Json))
    .bind(params.show_answers_after_submit)
    .bind(params.updated_at)
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn delete_by_id(pool: &PgPool, id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM exams WHERE id = $1").bind(id).execute(pool).await?;
    Ok(())
}
