use sqlx::types::Json;
use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::{Attempt, AttemptQuestion};
use crate::db::types::{AttemptMode, AttemptStatus};

const COLUMNS: &str = "\
    id, exam_id, user_id, mode, questions, time_limit_minutes, score, total, \
    started_at, submitted_at, status, created_at, updated_at";

pub(crate) struct CreateAttempt<'a> {
    pub(crate) id: &'a str,
    pub(crate) exam_id: &'a str,
    pub(crate) user_id: &'a str,
    pub(crate) mode: AttemptMode,
    pub(crate) questions: &'a [AttemptQuestion],
    pub(crate) time_limit_minutes: i32,
    pub(crate) total: i32,
    pub(crate) started_at: PrimitiveDateTime,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct AttemptHistoryRow {
    pub(crate) id: String,
    pub(crate) exam_title: String,
    pub(crate) mode: AttemptMode,
    pub(crate) status: AttemptStatus,
    pub(crate) score: i32,
    pub(crate) total: i32,
    pub(crate) submitted_at: Option<PrimitiveDateTime>,
}

pub(crate) async fn create(pool: &PgPool, params: CreateAttempt<'_>) -> Result<Attempt, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(&format!(
        "INSERT INTO attempts (
            id, exam_id, user_id, mode, questions, time_limit_minutes, score, total,
            started_at, submitted_at, status, created_at, updated_at
         ) VALUES ($1,$2,$3,$4,$5,$6,0,$7,$8,NULL,$9,$10,$11)
         RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.exam_id)
    .bind(params.user_id)
    .bind(params.mode)
    .bind(Json(params.questions))
    .bind(params.time_limit_minutes)
    .bind(params.total)
    .bind(params.started_at)
    .bind(AttemptStatus::InProgress)
    .bind(params.created_at)
    .bind(params.updated_at)
    .fetch_one(pool)
    .await
}

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Attempt>, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(&format!("SELECT {COLUMNS} FROM attempts WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn list_for_user(
    pool: &PgPool,
    user_id: &str,
) -> Result<Vec<AttemptHistoryRow>, sqlx::Error> {
    sqlx::query_as::<_, AttemptHistoryRow>(
        "SELECT a.id, e.title AS exam_title, a.mode, a.status, a.score, a.total, a.submitted_at
         FROM attempts a
         JOIN exams e ON e.id = a.exam_id
         WHERE a.user_id = $1
         ORDER BY a.submitted_at DESC NULLS LAST, a.started_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

/// Conditional finalization: only an in-progress attempt transitions, so two
/// racing submits cannot both win. Returns whether this call made the
/// transition.
pub(crate) async fn finalize(
    pool: &PgPool,
    id: &str,
    score: i32,
    total: i32,
    submitted_at: PrimitiveDateTime,
    updated_at: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE attempts
         SET score = $1, total = $2, submitted_at = $3, status = $4, updated_at = $5
         WHERE id = $6 AND status = $7 AND submitted_at IS NULL",
    )
    .bind(score)
    .bind(total)
    .bind(submitted_at)
    .bind(AttemptStatus::Finished)
    .bind(updated_at)
    .bind(id)
    .bind(AttemptStatus::InProgress)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub(crate) async fn exists_for_exam(pool: &PgPool, exam_id: &str) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM attempts WHERE exam_id = $1)")
        .bind(exam_id)
        .fetch_one(pool)
        .await
}
