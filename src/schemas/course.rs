use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::Course;
use crate::schemas::exam::ExamSummary;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct CourseCreate {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) description: Option<String>,
    #[serde(default)]
    #[validate(range(min = 0, message = "price must be non-negative"))]
    pub(crate) price: i64,
    #[serde(default = "default_duration_days", alias = "durationDays")]
    #[validate(range(min = 1, message = "duration_days must be positive"))]
    pub(crate) duration_days: i32,
    #[serde(default = "default_true", alias = "isTrialAvailable")]
    pub(crate) is_trial_available: bool,
    #[serde(default = "default_true")]
    pub(crate) active: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct CourseUpdate {
    #[serde(default)]
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub(crate) name: Option<String>,
    #[serde(default)]
    pub(crate) description: Option<String>,
    #[serde(default)]
    #[validate(range(min = 0, message = "price must be non-negative"))]
    pub(crate) price: Option<i64>,
    #[serde(default, alias = "durationDays")]
    #[validate(range(min = 1, message = "duration_days must be positive"))]
    pub(crate) duration_days: Option<i32>,
    #[serde(default, alias = "isTrialAvailable")]
    pub(crate) is_trial_available: Option<bool>,
    #[serde(default)]
    pub(crate) active: Option<bool>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CourseResponse {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) description: Option<String>,
    pub(crate) price: i64,
    pub(crate) duration_days: i32,
    pub(crate) is_trial_available: bool,
    pub(crate) active: bool,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl CourseResponse {
    pub(crate) fn from_db(course: Course) -> Self {
        Self {
            id: course.id,
            name: course.name,
            description: course.description,
            price: course.price,
            duration_days: course.duration_days,
            is_trial_available: course.is_trial_available,
            active: course.active,
            created_at: format_primitive(course.created_at),
            updated_at: format_primitive(course.updated_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct CourseWithExams {
    #[serde(flatten)]
    pub(crate) course: CourseResponse,
    pub(crate) exams: Vec<ExamSummary>,
}

fn default_duration_days() -> i32 {
    30
}

fn default_true() -> bool {
    true
}
