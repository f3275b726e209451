use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::api::validation::{validate_password_len, validate_payload};
use crate::core::security;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::User;
use crate::db::types::UserRole;
use crate::repositories;
use crate::schemas::auth::TokenResponse;
use crate::schemas::user::{UserCreate, UserLogin, UserResponse};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me))
}

async fn register(
    State(state): State<AppState>,
    Json(payload): Json<UserCreate>,
) -> Result<(StatusCode, Json<TokenResponse>), ApiError> {
    validate_payload(&payload)?;
    validate_password_len(&payload.password)?;

    let existing = repositories::users::exists_by_username(state.db(), &payload.username)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to check existing user"))?;

    if existing.is_some() {
        return Err(ApiError::Conflict("User with this username already exists".to_string()));
    }

    // the very first account becomes the platform admin
    let user_count = repositories::users::count(state.db())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count users"))?;
    let role = if user_count == 0 { UserRole::Admin } else { UserRole::Student };

    let hashed_password = security::hash_password(&payload.password)
        .map_err(|e| ApiError::internal(e, "Failed to hash password"))?;

    let now = primitive_now_utc();
    let full_name = if payload.full_name.is_empty() {
        payload.username.clone()
    } else {
        payload.full_name.clone()
    };

    let user = repositories::users::create(
        state.db(),
        repositories::users::CreateUser {
            id: &Uuid::new_v4().to_string(),
            username: &payload.username,
            hashed_password,
            full_name: &full_name,
            role,
            is_active: true,
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create user"))?;

    tracing::info!(username = %user.username, role = ?user.role, "User registered");

    let token = security::create_access_token(&user.id, state.settings(), None)
        .map_err(|e| ApiError::internal(e, "Failed to create access token"))?;

    let response = TokenResponse {
        access_token: token,
        token_type: "bearer".to_string(),
        user: UserResponse::from_db(user),
    };

    Ok((StatusCode::CREATED, Json(response)))
}

async fn login(
    State(state): State<AppState>,
    Json(payload): Json<UserLogin>,
) -> Result<Json<TokenResponse>, ApiError> {
    let user = fetch_user_by_username(&state, &payload.username).await?;

    let verified = security::verify_password(&payload.password, &user.hashed_password)
        .map_err(|_| ApiError::Unauthorized("Incorrect username or password"))?;

    if !verified {
        return Err(ApiError::Unauthorized("Incorrect username or password"));
    }

    if !user.is_active {
        return Err(ApiError::BadRequest("Inactive user".to_string()));
    }

    let token = security::create_access_token(&user.id, state.settings(), None)
        .map_err(|e| ApiError::internal(e, "Failed to create access token"))?;

    Ok(Json(TokenResponse {
        access_token: token,
        token_type: "bearer".to_string(),
        user: UserResponse::from_db(user),
    }))
}

async fn me(CurrentUser(user): CurrentUser) -> Json<UserResponse> {
    Json(UserResponse::from_db(user))
}

async fn fetch_user_by_username(state: &AppState, username: &str) -> Result<User, ApiError> {
    repositories::users::find_by_username(state.db(), username)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load user"))?
        .ok_or(ApiError::Unauthorized("Incorrect username or password"))
}
