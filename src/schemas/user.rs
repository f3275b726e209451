use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::User;
use crate::db::types::UserRole;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct UserCreate {
    #[validate(length(min = 3, max = 64, message = "username must be 3 to 64 characters"))]
    pub(crate) username: String,
    #[serde(default, alias = "fullName")]
    pub(crate) full_name: String,
    pub(crate) password: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserLogin {
    pub(crate) username: String,
    pub(crate) password: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct UserResponse {
    pub(crate) id: String,
    pub(crate) username: String,
    pub(crate) full_name: String,
    pub(crate) role: UserRole,
    pub(crate) is_active: bool,
    pub(crate) created_at: String,
}

impl UserResponse {
    pub(crate) fn from_db(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            full_name: user.full_name,
            role: user.role,
            is_active: user.is_active,
            created_at: format_primitive(user.created_at),
        }
    }
}
