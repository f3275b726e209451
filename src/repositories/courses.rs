use sqlx::PgPool;

use crate::db::models::Course;

const COLUMNS: &str = "\
    id, name, description, price, duration_days, is_trial_available, active, \
    created_at, updated_at";

pub(crate) struct CreateCourse<'a> {
    pub(crate) id: &'a str,
    pub(crate) name: &'a str,
    pub(crate) description: Option<&'a str>,
    pub(crate) price: i64,
    pub(crate) duration_days: i32,
    pub(crate) is_trial_available: bool,
    pub(crate) active: bool,
    pub(crate) created_at: time::PrimitiveDateTime,
    pub(crate) updated_at: time::PrimitiveDateTime,
}

pub(crate) struct UpdateCourse {
    pub(crate) name: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) price: Option<i64>,
    pub(crate) duration_days: Option<i32>,
    pub(crate) is_trial_available: Option<bool>,
    pub(crate) active: Option<bool>,
    pub(crate) updated_at: time::PrimitiveDateTime,
}

pub(crate) async fn create(pool: &PgPool, params: CreateCourse<'_>) -> Result<Course, sqlx::Error> {
    sqlx::query_as::<_, Course>(&format!(
        "INSERT INTO courses (
            id, name, description, price, duration_days, is_trial_available, active,
            created_at, updated_at
         ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9)
         RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.name)
    .bind(params.description)
    .bind(params.price)
    .bind(params.duration_days)
    .bind(params.is_trial_available)
    .bind(params.active)
    .bind(params.created_at)
    .bind(params.updated_at)
    .fetch_one(pool)
    .await
}

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>(&format!("SELECT {COLUMNS} FROM courses WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn exists_by_name(
    pool: &PgPool,
    name: &str,
) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>("SELECT id FROM courses WHERE name = $1")
        .bind(name)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn list(pool: &PgPool) -> Result<Vec<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>(&format!(
        "SELECT {COLUMNS} FROM courses ORDER BY created_at DESC"
    ))
    .fetch_all(pool)
    .await
}

pub(crate) async fn update(
    pool: &PgPool,
    id: &str,
    params: UpdateCourse,
) -> Result<Option<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>(&format!(
        "UPDATE courses SET
            name = COALESCE($1, name),
            description = COALESCE($2, description),
            price = COALESCE($3, price),
            duration_days = COALESCE($4, duration_days),
            is_trial_available = COALESCE($5, is_trial_available),
            active = COALESCE($6, active),
            updated_at = $7
         WHERE id = $8
         RETURNING {COLUMNS}",
    ))
    .bind(params.name)
    .bind(params.description)
    .bind(params.price)
    .bind(params.duration_days)
    .bind(params.is_trial_available)
    .bind(params.active)
    .bind(params.updated_at)
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn delete_by_id(pool: &PgPool, id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM courses WHERE id = $1").bind(id).execute(pool).await?;
    Ok(())
}
