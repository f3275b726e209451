use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::models::{AttemptBody, AttemptQuestion};
use crate::db::types::{AttemptMode, AttemptStatus};
use crate::services::answers::SelectedCell;
use crate::services::grading::AnswerDetail;

/// One client answer in whatever shape the client (or an older client)
/// produces. Every field is an untyped `Value`; the normalizer sorts out the
/// shapes and nothing here can fail to deserialize short of invalid JSON.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct AnswerPayload {
    #[serde(default, alias = "questionId")]
    pub(crate) question_id: String,
    #[serde(default)]
    pub(crate) token: Option<Value>,
    #[serde(default, alias = "selectedTokens")]
    pub(crate) selected_tokens: Option<Value>,
    #[serde(default, alias = "selectedIndexes")]
    pub(crate) selected_indexes: Option<Value>,
    #[serde(default, alias = "selectedPairs")]
    pub(crate) selected_pairs: Option<Value>,
    #[serde(default)]
    pub(crate) pairs: Option<Value>,
    #[serde(default, alias = "pairsMap")]
    pub(crate) pairs_map: Option<Value>,
    #[serde(default, alias = "selectedMatrix")]
    pub(crate) selected_matrix: Option<Value>,
    #[serde(default)]
    pub(crate) mapping: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SubmitRequest {
    #[serde(default)]
    pub(crate) answers: Vec<AnswerPayload>,
}

/// Client-visible question: tokens and display content only. Derived from an
/// attempt question by dropping `is_correct`, `orig_index` and the whole
/// `raw` block; what the client can see is exactly what this type can hold.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct PublicQuestion {
    pub(crate) question_id: String,
    pub(crate) content: String,
    #[serde(flatten)]
    pub(crate) body: PublicBody,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub(crate) enum PublicBody {
    Single { options: Vec<PublicOption> },
    Multi { options: Vec<PublicOption> },
    DropMatch { pairs: Vec<PublicPair> },
    ImageArea { image_url: Option<String>, areas: Vec<PublicArea> },
    Matrix { rows: Vec<String>, columns: Vec<String>, cells: Vec<PublicCell> },
    DragDrop { items: Vec<PublicOption>, dropzones: Vec<String> },
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct PublicOption {
    pub(crate) token: String,
    pub(crate) text: String,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct PublicPair {
    pub(crate) token: String,
    pub(crate) left: String,
    pub(crate) right: String,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct PublicArea {
    pub(crate) token: String,
    pub(crate) x: f64,
    pub(crate) y: f64,
    pub(crate) width: f64,
    pub(crate) height: f64,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct PublicCell {
    pub(crate) token: String,
    pub(crate) row: usize,
    pub(crate) col: usize,
}

impl PublicQuestion {
    pub(crate) fn from_attempt(question: &AttemptQuestion) -> Self {
        let body = match &question.body {
            AttemptBody::Single { options } => {
                PublicBody::Single { options: public_options(options) }
            }
            AttemptBody::Multi { options } => {
                PublicBody::Multi { options: public_options(options) }
            }
            AttemptBody::DropMatch { pairs } => PublicBody::DropMatch {
                pairs: pairs
                    .iter()
                    .map(|pair| PublicPair {
                        token: pair.token.clone(),
                        left: pair.left.clone(),
                        right: pair.right.clone(),
                    })
                    .collect(),
            },
            AttemptBody::ImageArea { image_url, areas } => PublicBody::ImageArea {
                image_url: image_url.clone(),
                areas: areas
                    .iter()
                    .map(|area| PublicArea {
                        token: area.token.clone(),
                        x: area.region.x,
                        y: area.region.y,
                        width: area.region.width,
                        height: area.region.height,
                    })
                    .collect(),
            },
            AttemptBody::Matrix { rows, columns, cells } => PublicBody::Matrix {
                rows: rows.clone(),
                columns: columns.clone(),
                cells: cells
                    .iter()
                    .map(|cell| PublicCell {
                        token: cell.token.clone(),
                        row: cell.row,
                        col: cell.col,
                    })
                    .collect(),
            },
            AttemptBody::DragDrop { items, dropzones } => PublicBody::DragDrop {
                items: items
                    .iter()
                    .map(|item| PublicOption {
                        token: item.token.clone(),
                        text: item.text.clone(),
                    })
                    .collect(),
                dropzones: dropzones.clone(),
            },
        };

        Self {
            question_id: question.question_id.clone(),
            content: question.content.clone(),
            body,
        }
    }
}

fn public_options(options: &[crate::db::models::TokenOption]) -> Vec<PublicOption> {
    options
        .iter()
        .map(|option| PublicOption { token: option.token.clone(), text: option.text.clone() })
        .collect()
}

#[derive(Debug, Serialize)]
pub(crate) struct SessionResponse {
    pub(crate) attempt_id: Option<String>,
    pub(crate) course: String,
    pub(crate) exam_title: String,
    pub(crate) mode: AttemptMode,
    pub(crate) time_limit_minutes: i32,
    pub(crate) questions: Vec<PublicQuestion>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CheckResponse {
    pub(crate) question_id: String,
    pub(crate) correct: bool,
    pub(crate) correct_tokens: Vec<String>,
    pub(crate) selected_matrix: Vec<SelectedCell>,
    pub(crate) mapping: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmitResponse {
    pub(crate) msg: String,
    pub(crate) correct_count: i32,
    pub(crate) total: i32,
    pub(crate) score10: f64,
    pub(crate) submitted_at: String,
    pub(crate) elapsed_time: ElapsedTime,
    pub(crate) details: Vec<AnswerDetail>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ElapsedTime {
    pub(crate) seconds: i64,
    pub(crate) minutes: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct AttemptHistoryItem {
    pub(crate) id: String,
    pub(crate) exam_title: String,
    pub(crate) mode: AttemptMode,
    pub(crate) status: AttemptStatus,
    pub(crate) correct_count: i32,
    pub(crate) total: i32,
    pub(crate) score10: f64,
    pub(crate) submitted_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::Value;
    use sqlx::types::Json;

    use super::*;
    use crate::db::models::{
        ChoiceOption, DragMapping, ImageRegion, MatchPair, Question, QuestionBody,
    };
    use crate::services::materialize::materialize_question;

    fn all_type_questions() -> Vec<Question> {
        let now = crate::core::time::primitive_now_utc();
        let question = |id: &str, body: QuestionBody| Question {
            id: id.to_string(),
            content: format!("content {id}"),
            body: Json(body),
            created_at: now,
            updated_at: now,
        };

        vec![
            question(
                "q-single",
                QuestionBody::Single {
                    options: vec![
                        ChoiceOption { text: "A".to_string(), is_correct: false },
                        ChoiceOption { text: "B".to_string(), is_correct: true },
                    ],
                },
            ),
            question(
                "q-multi",
                QuestionBody::Multi {
                    options: vec![
                        ChoiceOption { text: "x".to_string(), is_correct: true },
                        ChoiceOption { text: "y".to_string(), is_correct: true },
                    ],
                },
            ),
            question(
                "q-pairs",
                QuestionBody::DropMatch {
                    pairs: vec![MatchPair { left: "1".to_string(), right: "A".to_string() }],
                },
            ),
            question(
                "q-area",
                QuestionBody::ImageArea {
                    image_url: Some("https://example.test/map.png".to_string()),
                    areas: vec![ImageRegion {
                        x: 0.0,
                        y: 0.0,
                        width: 50.0,
                        height: 50.0,
                        is_correct: true,
                    }],
                },
            ),
            question(
                "q-matrix",
                QuestionBody::Matrix {
                    rows: vec!["r".to_string()],
                    columns: vec!["c".to_string()],
                    correct: vec![vec![true]],
                },
            ),
            question(
                "q-drag",
                QuestionBody::DragDrop {
                    draggables: vec!["x".to_string()],
                    dropzones: vec!["zone".to_string()],
                    correct_mapping: vec![DragMapping {
                        draggable: "x".to_string(),
                        dropzone: "zone".to_string(),
                    }],
                },
            ),
        ]
    }

    fn forbidden_keys(value: &Value, path: &str, errors: &mut Vec<String>) {
        const FORBIDDEN: &[&str] = &[
            "is_correct",
            "isCorrect",
            "orig_index",
            "origIndex",
            "raw",
            "correct",
            "correct_mapping",
            "correctMapping",
        ];
        match value {
            Value::Object(map) => {
                for (key, nested) in map {
                    if FORBIDDEN.contains(&key.as_str()) {
                        errors.push(format!("{path}.{key}"));
                    }
                    forbidden_keys(nested, &format!("{path}.{key}"), errors);
                }
            }
            Value::Array(items) => {
                for (index, nested) in items.iter().enumerate() {
                    forbidden_keys(nested, &format!("{path}[{index}]"), errors);
                }
            }
            _ => {}
        }
    }

    #[test]
    fn public_view_never_leaks_correctness_or_ordering() {
        let mut rng = StdRng::seed_from_u64(99);
        for question in all_type_questions() {
            let attempt_question = materialize_question(&question, &mut rng);
            let public = PublicQuestion::from_attempt(&attempt_question);
            let json = serde_json::to_value(&public).expect("serialize public question");

            let mut errors = Vec::new();
            forbidden_keys(&json, &public.question_id, &mut errors);
            assert!(errors.is_empty(), "leaked fields: {errors:?}");
        }
    }

    #[test]
    fn public_view_keeps_tokens_and_display_content() {
        let mut rng = StdRng::seed_from_u64(7);
        let questions = all_type_questions();
        let attempt_question = materialize_question(&questions[0], &mut rng);
        let public = PublicQuestion::from_attempt(&attempt_question);
        let json = serde_json::to_value(&public).unwrap();

        assert_eq!(json["type"], "single");
        let options = json["options"].as_array().expect("options");
        assert_eq!(options.len(), 2);
        for option in options {
            assert!(option["token"].as_str().unwrap().len() == 16);
            assert!(option["text"].is_string());
        }
    }

    #[test]
    fn matrix_public_view_keeps_structural_cell_identity() {
        let mut rng = StdRng::seed_from_u64(7);
        let questions = all_type_questions();
        let attempt_question = materialize_question(&questions[4], &mut rng);
        let public = PublicQuestion::from_attempt(&attempt_question);
        let json = serde_json::to_value(&public).unwrap();

        assert_eq!(json["type"], "matrix");
        assert_eq!(json["cells"][0]["row"], 0);
        assert_eq!(json["cells"][0]["col"], 0);
    }
}
