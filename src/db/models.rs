use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::{AttemptMode, AttemptStatus, UserRole};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct User {
    pub(crate) id: String,
    pub(crate) username: String,
    pub(crate) hashed_password: String,
    pub(crate) full_name: String,
    pub(crate) role: UserRole,
    pub(crate) is_active: bool,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Course {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) description: Option<String>,
    pub(crate) price: i64,
    pub(crate) duration_days: i32,
    pub(crate) is_trial_available: bool,
    pub(crate) active: bool,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Question {
    pub(crate) id: String,
    pub(crate) content: String,
    pub(crate) body: Json<QuestionBody>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Exam {
    pub(crate) id: String,
    pub(crate) course_id: String,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) time_limit_minutes: i32,
    pub(crate) num_questions: i32,
    pub(crate) random: bool,
    pub(crate) question_ids: Json<Vec<String>>,
    pub(crate) show_answers_after_submit: bool,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Attempt {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) user_id: String,
    pub(crate) mode: AttemptMode,
    pub(crate) questions: Json<Vec<AttemptQuestion>>,
    pub(crate) time_limit_minutes: i32,
    pub(crate) score: i32,
    pub(crate) total: i32,
    pub(crate) started_at: PrimitiveDateTime,
    pub(crate) submitted_at: Option<PrimitiveDateTime>,
    pub(crate) status: AttemptStatus,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

/// Authoring payload of a question bank entry. This is the authoritative,
/// correctness-bearing form; it is stored as JSONB on `questions.body` and
/// frozen verbatim into every attempt snapshot as the `raw` grading block.
///
/// Arrays the author never filled in decode as empty instead of failing, so
/// an incomplete entry materializes into a structurally valid (but
/// ungradeable, hence always-incorrect) question.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub(crate) enum QuestionBody {
    Single {
        #[serde(default)]
        options: Vec<ChoiceOption>,
    },
    Multi {
        #[serde(default)]
        options: Vec<ChoiceOption>,
    },
    DropMatch {
        #[serde(default)]
        pairs: Vec<MatchPair>,
    },
    ImageArea {
        #[serde(default, alias = "imageUrl")]
        image_url: Option<String>,
        #[serde(default)]
        areas: Vec<ImageRegion>,
    },
    Matrix {
        #[serde(default)]
        rows: Vec<String>,
        #[serde(default)]
        columns: Vec<String>,
        #[serde(default)]
        correct: Vec<Vec<bool>>,
    },
    DragDrop {
        #[serde(default)]
        draggables: Vec<String>,
        #[serde(default)]
        dropzones: Vec<String>,
        #[serde(default, alias = "correctMapping")]
        correct_mapping: Vec<DragMapping>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ChoiceOption {
    pub(crate) text: String,
    #[serde(default, alias = "isCorrect")]
    pub(crate) is_correct: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct MatchPair {
    pub(crate) left: String,
    pub(crate) right: String,
}

/// Percentage-based rectangle on the question image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ImageRegion {
    pub(crate) x: f64,
    pub(crate) y: f64,
    pub(crate) width: f64,
    pub(crate) height: f64,
    #[serde(default, alias = "isCorrect")]
    pub(crate) is_correct: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct DragMapping {
    pub(crate) draggable: String,
    pub(crate) dropzone: String,
}

/// One question of an attempt snapshot: the tokenized, shuffled form shown
/// to the client (minus correctness, see the public schema) plus the frozen
/// `raw` authoring payload grading runs against. Later edits to the question
/// bank never affect an existing attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct AttemptQuestion {
    pub(crate) question_id: String,
    pub(crate) content: String,
    pub(crate) body: AttemptBody,
    pub(crate) raw: QuestionBody,
}

/// Tokenized selectable units per question type. `orig_index` maps a unit
/// back to its position in the authoring payload; it is kept server-side
/// only, both for grading and for resolving legacy index-based answer
/// payloads. Matrix cells keep row/column identity and are never shuffled.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub(crate) enum AttemptBody {
    Single {
        options: Vec<TokenOption>,
    },
    Multi {
        options: Vec<TokenOption>,
    },
    DropMatch {
        pairs: Vec<TokenPair>,
    },
    ImageArea {
        image_url: Option<String>,
        areas: Vec<TokenArea>,
    },
    Matrix {
        rows: Vec<String>,
        columns: Vec<String>,
        cells: Vec<TokenCell>,
    },
    DragDrop {
        items: Vec<TokenItem>,
        dropzones: Vec<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct TokenOption {
    pub(crate) token: String,
    pub(crate) text: String,
    pub(crate) orig_index: usize,
    pub(crate) is_correct: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct TokenPair {
    pub(crate) token: String,
    pub(crate) left: String,
    pub(crate) right: String,
    pub(crate) orig_index: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct TokenArea {
    pub(crate) token: String,
    pub(crate) region: ImageRegion,
    pub(crate) orig_index: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct TokenCell {
    pub(crate) token: String,
    pub(crate) row: usize,
    pub(crate) col: usize,
    pub(crate) is_correct: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct TokenItem {
    pub(crate) token: String,
    pub(crate) text: String,
    pub(crate) orig_index: usize,
}

impl QuestionBody {
    pub(crate) fn type_str(&self) -> &'static str {
        match self {
            QuestionBody::Single { .. } => "single",
            QuestionBody::Multi { .. } => "multi",
            QuestionBody::DropMatch { .. } => "drop-match",
            QuestionBody::ImageArea { .. } => "image-area",
            QuestionBody::Matrix { .. } => "matrix",
            QuestionBody::DragDrop { .. } => "drag-drop",
        }
    }
}

impl AttemptBody {
    pub(crate) fn type_str(&self) -> &'static str {
        match self {
            AttemptBody::Single { .. } => "single",
            AttemptBody::Multi { .. } => "multi",
            AttemptBody::DropMatch { .. } => "drop-match",
            AttemptBody::ImageArea { .. } => "image-area",
            AttemptBody::Matrix { .. } => "matrix",
            AttemptBody::DragDrop { .. } => "drag-drop",
        }
    }
}
