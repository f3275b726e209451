use uuid::Uuid;

use crate::core::security;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::types::UserRole;
use crate::repositories;

pub(crate) async fn ensure_superuser(state: &AppState) -> anyhow::Result<()> {
    let admin = state.settings().admin();
    if admin.first_superuser_password.is_empty() {
        tracing::warn!("FIRST_SUPERUSER_PASSWORD not configured; skipping superuser creation");
        return Ok(());
    }

    let username = &admin.first_superuser_username;
    let user = repositories::users::find_by_username(state.db(), username).await?;
    let now = primitive_now_utc();

    if let Some(user) = user {
        let verified =
            security::verify_password(&admin.first_superuser_password, &user.hashed_password)
                .unwrap_or(false);
        let needs_update = !verified || user.role != UserRole::Admin || !user.is_active;

        if needs_update {
            let hashed_password = if verified {
                user.hashed_password.clone()
            } else {
                security::hash_password(&admin.first_superuser_password)?
            };

            sqlx::query(
                "UPDATE users
                 SET hashed_password = $1, role = $2, is_active = $3, updated_at = $4
                 WHERE id = $5",
            )
            .bind(hashed_password)
            .bind(UserRole::Admin)
            .bind(true)
            .bind(now)
            .bind(user.id)
            .execute(state.db())
            .await?;

            tracing::info!("Updated default superuser {username}");
        } else {
            tracing::info!("Default superuser already up to date");
        }

        return Ok(());
    }

    let hashed_password = security::hash_password(&admin.first_superuser_password)?;

    repositories::users::create(
        state.db(),
        repositories::users::CreateUser {
            id: &Uuid::new_v4().to_string(),
            username,
            hashed_password,
            full_name: "Super Admin",
            role: UserRole::Admin,
            is_active: true,
            created_at: now,
            updated_at: now,
        },
    )
    .await?;

    tracing::info!("Created default superuser {username}");
    Ok(())
}
