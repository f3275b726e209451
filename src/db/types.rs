use serde::{Deserialize, Serialize};
use sqlx::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "userrole", rename_all = "lowercase")]
pub(crate) enum UserRole {
    Admin,
    Student,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "attemptmode", rename_all = "lowercase")]
pub(crate) enum AttemptMode {
    Training,
    Testing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "kebab-case")]
#[sqlx(type_name = "attemptstatus", rename_all = "snake_case")]
pub(crate) enum AttemptStatus {
    InProgress,
    Finished,
}
