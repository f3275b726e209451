use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::Exam;
use crate::schemas::question::QuestionResponse;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ExamCreate {
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub(crate) title: String,
    #[serde(default)]
    pub(crate) description: Option<String>,
    #[serde(default = "default_time_limit", alias = "timeLimit", alias = "timeLimitMinutes")]
    #[validate(range(min = 0, message = "time_limit_minutes must be non-negative"))]
    pub(crate) time_limit_minutes: i32,
    #[serde(default = "default_num_questions", alias = "numQuestions")]
    #[validate(range(min = 0, message = "num_questions must be non-negative"))]
    pub(crate) num_questions: i32,
    #[serde(default)]
    pub(crate) random: bool,
    #[serde(default, alias = "questionIds")]
    pub(crate) question_ids: Vec<String>,
    #[serde(alias = "courseId")]
    pub(crate) course_id: String,
    #[serde(default, alias = "showAnswersAfterSubmit")]
    pub(crate) show_answers_after_submit: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ExamUpdate {
    #[serde(default)]
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub(crate) title: Option<String>,
    #[serde(default)]
    pub(crate) description: Option<String>,
    #[serde(default, alias = "timeLimit", alias = "timeLimitMinutes")]
    #[validate(range(min = 0, message = "time_limit_minutes must be non-negative"))]
    pub(crate) time_limit_minutes: Option<i32>,
    #[serde(default, alias = "numQuestions")]
    #[validate(range(min = 0, message = "num_questions must be non-negative"))]
    pub(crate) num_questions: Option<i32>,
    #[serde(default)]
    pub(crate) random: Option<bool>,
    #[serde(default, alias = "questionIds")]
    pub(crate) question_ids: Option<Vec<String>>,
    #[serde(default, alias = "courseId")]
    pub(crate) course_id: Option<String>,
    #[serde(default, alias = "showAnswersAfterSubmit")]
    pub(crate) show_answers_after_submit: Option<bool>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ExamResponse {
    pub(crate) id: String,
    pub(crate) course_id: String,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) time_limit_minutes: i32,
    pub(crate) num_questions: i32,
    pub(crate) random: bool,
    pub(crate) question_ids: Vec<String>,
    pub(crate) show_answers_after_submit: bool,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl ExamResponse {
    pub(crate) fn from_db(exam: Exam) -> Self {
        Self {
            id: exam.id,
            course_id: exam.course_id,
            title: exam.title,
            description: exam.description,
            time_limit_minutes: exam.time_limit_minutes,
            num_questions: exam.num_questions,
            random: exam.random,
            question_ids: exam.question_ids.0,
            show_answers_after_submit: exam.show_answers_after_submit,
            created_at: format_primitive(exam.created_at),
            updated_at: format_primitive(exam.updated_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ExamWithQuestions {
    #[serde(flatten)]
    pub(crate) exam: ExamResponse,
    pub(crate) questions: Vec<QuestionResponse>,
}

/// Shortened form embedded into course listings.
#[derive(Debug, Serialize)]
pub(crate) struct ExamSummary {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) num_questions: i32,
    pub(crate) time_limit_minutes: i32,
}

impl ExamSummary {
    pub(crate) fn from_db(exam: Exam) -> Self {
        Self {
            id: exam.id,
            title: exam.title,
            description: exam.description,
            num_questions: exam.num_questions,
            time_limit_minutes: exam.time_limit_minutes,
        }
    }
}

fn default_time_limit() -> i32 {
    10
}

fn default_num_questions() -> i32 {
    5
}
