use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::{Question, QuestionBody};

/// Authoring payload: `content` plus the flattened tagged body, so clients
/// post the flat `{content, type, options | pairs | ...}` document. Updates
/// replace the whole document; partial edits of a typed body are not a thing.
#[derive(Debug, Deserialize, Validate)]
pub(crate) struct QuestionCreate {
    #[validate(length(min = 1, message = "content must not be empty"))]
    pub(crate) content: String,
    #[serde(flatten)]
    pub(crate) body: QuestionBody,
}

#[derive(Debug, Serialize)]
pub(crate) struct QuestionResponse {
    pub(crate) id: String,
    pub(crate) content: String,
    #[serde(flatten)]
    pub(crate) body: QuestionBody,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl QuestionResponse {
    pub(crate) fn from_db(question: Question) -> Self {
        Self {
            id: question.id,
            content: question.content,
            body: question.body.0,
            created_at: format_primitive(question.created_at),
            updated_at: format_primitive(question.updated_at),
        }
    }
}
