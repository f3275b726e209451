use sqlx::types::Json;
use sqlx::PgPool;

use crate::db::models::{Question, QuestionBody};

const COLUMNS: &str = "id, content, body, created_at, updated_at";

pub(crate) struct CreateQuestion<'a> {
    pub(crate) id: &'a str,
    pub(crate) content: &'a str,
    pub(crate) body: &'a QuestionBody,
    pub(crate) created_at: time::PrimitiveDateTime,
    pub(crate) updated_at: time::PrimitiveDateTime,
}

pub(crate) async fn create(
    pool: &PgPool,
    params: CreateQuestion<'_>,
) -> Result<Question, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "INSERT INTO questions (id, content, body, created_at, updated_at)
         VALUES ($1,$2,$3,$4,$5)
         RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.content)
    .bind(Json(params.body))
    .bind(params.created_at)
    .bind(params.updated_at)
    .fetch_one(pool)
    .await
}

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!("SELECT {COLUMNS} FROM questions WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn list(pool: &PgPool) -> Result<Vec<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "SELECT {COLUMNS} FROM questions ORDER BY created_at DESC"
    ))
    .fetch_all(pool)
    .await
}

/// Returns matching questions in arbitrary order; missing ids are simply
/// absent from the result.
pub(crate) async fn find_by_ids(
    pool: &PgPool,
    ids: &[String],
) -> Result<Vec<Question>, sqlx::Error> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    sqlx::query_as::<_, Question>(&format!(
        "SELECT {COLUMNS} FROM questions WHERE id = ANY($1)"
    ))
    .bind(ids)
    .fetch_all(pool)
    .await
}

pub(crate) async fn count_by_ids(pool: &PgPool, ids: &[String]) -> Result<i64, sqlx::Error> {
    if ids.is_empty() {
        return Ok(0);
    }

    sqlx::query_scalar("SELECT COUNT(*) FROM questions WHERE id = ANY($1)")
        .bind(ids)
        .fetch_one(pool)
        .await
}

pub(crate) async fn update(
    pool: &PgPool,
    id: &str,
    content: &str,
    body: &QuestionBody,
    updated_at: time::PrimitiveDateTime,
) -> Result<Option<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "UPDATE questions SET content = $1, body = $2, updated_at = $3
         WHERE id = $4
         RETURNING {COLUMNS}",
    ))
    .bind(content)
    .bind(Json(body))
    .bind(updated_at)
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn delete_by_id(pool: &PgPool, id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM questions WHERE id = $1").bind(id).execute(pool).await?;
    Ok(())
}

/// True when any exam's ordered id list references the question.
pub(crate) async fn used_by_exam(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM exams WHERE question_ids @> jsonb_build_array($1::text))",
    )
    .bind(id)
    .fetch_one(pool)
    .await
}
