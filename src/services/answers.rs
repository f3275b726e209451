use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::db::models::{AttemptBody, AttemptQuestion, TokenPair};
use crate::schemas::attempt::AnswerPayload;

/// Canonical submitted answer after payload-shape reconciliation. Exactly one
/// variant applies per question type; every decoder below is total, so an
/// unrecognized client shape degrades to the empty value instead of failing.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum CanonicalAnswer {
    Tokens(Vec<String>),
    Pairs(Vec<SelectedPair>),
    Cells(Vec<SelectedCell>),
    Mapping(BTreeMap<String, Vec<String>>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct SelectedPair {
    pub(crate) left: String,
    pub(crate) right: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub(crate) struct SelectedCell {
    pub(crate) row: i64,
    pub(crate) col: i64,
}

pub(crate) fn normalize_answer(
    question: &AttemptQuestion,
    payload: &AnswerPayload,
) -> CanonicalAnswer {
    match &question.body {
        AttemptBody::Single { options } | AttemptBody::Multi { options } => {
            let units: Vec<(usize, &str)> =
                options.iter().map(|option| (option.orig_index, option.token.as_str())).collect();
            CanonicalAnswer::Tokens(normalize_tokens(&units, payload))
        }
        AttemptBody::ImageArea { areas, .. } => {
            let units: Vec<(usize, &str)> =
                areas.iter().map(|area| (area.orig_index, area.token.as_str())).collect();
            CanonicalAnswer::Tokens(normalize_tokens(&units, payload))
        }
        AttemptBody::DropMatch { pairs } => {
            CanonicalAnswer::Pairs(normalize_pairs(pairs, payload))
        }
        AttemptBody::Matrix { .. } => CanonicalAnswer::Cells(normalize_cells(payload)),
        AttemptBody::DragDrop { .. } => CanonicalAnswer::Mapping(normalize_mapping(payload)),
    }
}

/// Token resolution order: explicit token list, then a single scalar token,
/// then legacy index lists. An index first matches a unit's `orig_index`
/// (numeric or string form) and only then falls back to the position in the
/// shuffled unit list.
fn normalize_tokens(units: &[(usize, &str)], payload: &AnswerPayload) -> Vec<String> {
    if let Some(items) = payload.selected_tokens.as_ref().and_then(Value::as_array) {
        if !items.is_empty() {
            return items.iter().map(value_to_string).collect();
        }
    }

    if let Some(token) = payload.token.as_ref().filter(|value| !value.is_null()) {
        return vec![value_to_string(token)];
    }

    if let Some(items) = payload.selected_indexes.as_ref().and_then(Value::as_array) {
        let mut tokens = Vec::new();
        for index in items {
            if let Some(token) = resolve_index(units, index) {
                tokens.push(token);
            }
        }
        return tokens;
    }

    Vec::new()
}

fn resolve_index(units: &[(usize, &str)], index: &Value) -> Option<String> {
    if let Some((_, token)) = units.iter().find(|(orig, _)| index_matches(*orig, index)) {
        return Some((*token).to_string());
    }

    let position = value_to_i64(index)?;
    if position < 0 {
        return None;
    }
    units.get(position as usize).map(|(_, token)| (*token).to_string())
}

fn index_matches(orig_index: usize, index: &Value) -> bool {
    match index {
        Value::Number(number) => number.as_i64() == Some(orig_index as i64),
        Value::String(text) => text.trim().parse::<i64>().ok() == Some(orig_index as i64),
        _ => false,
    }
}

/// Pairs arrive as `[{left, right}, ...]`, as an object keyed by left index,
/// or as a bare array of right values aligned positionally with the
/// attempt's pair order.
fn normalize_pairs(attempt_pairs: &[TokenPair], payload: &AnswerPayload) -> Vec<SelectedPair> {
    let raw = payload
        .selected_pairs
        .as_ref()
        .filter(|value| !value.is_null())
        .or_else(|| payload.pairs.as_ref().filter(|value| !value.is_null()))
        .or_else(|| payload.pairs_map.as_ref().filter(|value| !value.is_null()));

    let Some(raw) = raw else {
        return Vec::new();
    };

    match raw {
        Value::Array(items) if !items.is_empty() => {
            let object_shaped = items[0]
                .as_object()
                .map(|obj| obj.contains_key("left") || obj.contains_key("right"))
                .unwrap_or(false);

            if object_shaped {
                items
                    .iter()
                    .map(|item| SelectedPair {
                        left: value_to_string(item.get("left").unwrap_or(&Value::Null)),
                        right: value_to_string(item.get("right").unwrap_or(&Value::Null)),
                    })
                    .collect()
            } else if !attempt_pairs.is_empty() {
                items
                    .iter()
                    .enumerate()
                    .map(|(index, right)| SelectedPair {
                        left: attempt_pairs
                            .get(index)
                            .map(|pair| pair.left.clone())
                            .unwrap_or_else(|| index.to_string()),
                        right: value_to_string(right),
                    })
                    .collect()
            } else {
                Vec::new()
            }
        }
        Value::Object(map) => map
            .iter()
            .map(|(key, right)| {
                let left = key
                    .trim()
                    .parse::<usize>()
                    .ok()
                    .and_then(|index| attempt_pairs.get(index))
                    .map(|pair| pair.left.clone())
                    .unwrap_or_else(|| key.clone());
                SelectedPair { left, right: value_to_string(right) }
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// `[{row, col}, ...]` with numeric coercion; malformed entries are dropped.
fn normalize_cells(payload: &AnswerPayload) -> Vec<SelectedCell> {
    let Some(items) = payload.selected_matrix.as_ref().and_then(Value::as_array) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let row = value_to_i64(item.get("row")?)?;
            let col = value_to_i64(item.get("col")?)?;
            Some(SelectedCell { row, col })
        })
        .collect()
}

/// Dropzone-index keyed object; every entry is coerced to a list of strings
/// (non-array entries count as nothing placed in that zone).
fn normalize_mapping(payload: &AnswerPayload) -> BTreeMap<String, Vec<String>> {
    let Some(map) = payload.mapping.as_ref().and_then(Value::as_object) else {
        return BTreeMap::new();
    };

    map.iter()
        .map(|(zone, entries)| {
            let values = entries
                .as_array()
                .map(|items| items.iter().map(value_to_string).collect())
                .unwrap_or_default();
            (zone.clone(), values)
        })
        .collect()
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => "null".to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        other => other.to_string(),
    }
}

fn value_to_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().filter(|float| float.fract() == 0.0).map(|float| float as i64)),
        Value::String(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;
    use sqlx::types::Json;

    use super::*;
    use crate::db::models::{ChoiceOption, MatchPair, Question, QuestionBody};
    use crate::services::materialize::materialize_question;

    fn single_question() -> AttemptQuestion {
        let now = crate::core::time::primitive_now_utc();
        let question = Question {
            id: "q1".to_string(),
            content: "pick one".to_string(),
            body: Json(QuestionBody::Single {
                options: vec![
                    ChoiceOption { text: "A".to_string(), is_correct: false },
                    ChoiceOption { text: "B".to_string(), is_correct: true },
                    ChoiceOption { text: "C".to_string(), is_correct: false },
                ],
            }),
            created_at: now,
            updated_at: now,
        };
        materialize_question(&question, &mut StdRng::seed_from_u64(17))
    }

    fn pairs_question() -> AttemptQuestion {
        let now = crate::core::time::primitive_now_utc();
        let question = Question {
            id: "q2".to_string(),
            content: "match".to_string(),
            body: Json(QuestionBody::DropMatch {
                pairs: vec![
                    MatchPair { left: "1".to_string(), right: "A".to_string() },
                    MatchPair { left: "2".to_string(), right: "B".to_string() },
                ],
            }),
            created_at: now,
            updated_at: now,
        };
        materialize_question(&question, &mut StdRng::seed_from_u64(17))
    }

    fn payload(value: serde_json::Value) -> AnswerPayload {
        serde_json::from_value(value).expect("payload")
    }

    fn question_tokens(question: &AttemptQuestion) -> Vec<(usize, String)> {
        match &question.body {
            AttemptBody::Single { options } => {
                options.iter().map(|o| (o.orig_index, o.token.clone())).collect()
            }
            _ => panic!("expected single"),
        }
    }

    #[test]
    fn explicit_token_list_wins() {
        let question = single_question();
        let answer = normalize_answer(
            &question,
            &payload(json!({ "questionId": "q1", "selectedTokens": ["tok-a", 7] })),
        );
        assert_eq!(
            answer,
            CanonicalAnswer::Tokens(vec!["tok-a".to_string(), "7".to_string()])
        );
    }

    #[test]
    fn scalar_token_wraps_into_a_list() {
        let question = single_question();
        let answer =
            normalize_answer(&question, &payload(json!({ "questionId": "q1", "token": "tok-b" })));
        assert_eq!(answer, CanonicalAnswer::Tokens(vec!["tok-b".to_string()]));
    }

    #[test]
    fn index_list_resolves_via_orig_index_before_position() {
        let question = single_question();
        let units = question_tokens(&question);
        let expected = units.iter().find(|(orig, _)| *orig == 1).unwrap().1.clone();

        let answer = normalize_answer(
            &question,
            &payload(json!({ "questionId": "q1", "selectedIndexes": [1] })),
        );
        assert_eq!(answer, CanonicalAnswer::Tokens(vec![expected]));
    }

    #[test]
    fn string_indexes_are_accepted() {
        let question = single_question();
        let units = question_tokens(&question);
        let expected = units.iter().find(|(orig, _)| *orig == 2).unwrap().1.clone();

        let answer = normalize_answer(
            &question,
            &payload(json!({ "questionId": "q1", "selectedIndexes": ["2"] })),
        );
        assert_eq!(answer, CanonicalAnswer::Tokens(vec![expected]));
    }

    #[test]
    fn out_of_range_indexes_are_dropped() {
        let question = single_question();
        let answer = normalize_answer(
            &question,
            &payload(json!({ "questionId": "q1", "selectedIndexes": [99, "nope"] })),
        );
        assert_eq!(answer, CanonicalAnswer::Tokens(Vec::new()));
    }

    #[test]
    fn unrecognized_shape_degrades_to_nothing_answered() {
        let question = single_question();
        let answer = normalize_answer(
            &question,
            &payload(json!({ "questionId": "q1", "selectedTokens": { "weird": true } })),
        );
        assert_eq!(answer, CanonicalAnswer::Tokens(Vec::new()));
    }

    #[test]
    fn pair_objects_pass_through_stringified() {
        let question = pairs_question();
        let answer = normalize_answer(
            &question,
            &payload(json!({
                "questionId": "q2",
                "selectedPairs": [
                    { "left": "2", "right": "B" },
                    { "left": 1, "right": "A" }
                ]
            })),
        );
        assert_eq!(
            answer,
            CanonicalAnswer::Pairs(vec![
                SelectedPair { left: "2".to_string(), right: "B".to_string() },
                SelectedPair { left: "1".to_string(), right: "A".to_string() },
            ])
        );
    }

    #[test]
    fn pair_object_map_resolves_left_by_attempt_index() {
        let question = pairs_question();
        let AttemptBody::DropMatch { pairs } = &question.body else { panic!("expected pairs") };

        let answer = normalize_answer(
            &question,
            &payload(json!({ "questionId": "q2", "selectedPairs": { "0": "B", "7": "A" } })),
        );
        let CanonicalAnswer::Pairs(selected) = answer else { panic!("expected pairs") };

        assert!(selected.contains(&SelectedPair {
            left: pairs[0].left.clone(),
            right: "B".to_string()
        }));
        // out-of-range left index falls back to the index itself
        assert!(selected.contains(&SelectedPair { left: "7".to_string(), right: "A".to_string() }));
    }

    #[test]
    fn bare_right_values_align_positionally() {
        let question = pairs_question();
        let AttemptBody::DropMatch { pairs } = &question.body else { panic!("expected pairs") };

        let answer = normalize_answer(
            &question,
            &payload(json!({ "questionId": "q2", "pairs": ["X", "Y"] })),
        );
        assert_eq!(
            answer,
            CanonicalAnswer::Pairs(vec![
                SelectedPair { left: pairs[0].left.clone(), right: "X".to_string() },
                SelectedPair { left: pairs[1].left.clone(), right: "Y".to_string() },
            ])
        );
    }

    #[test]
    fn empty_pair_payload_normalizes_to_no_pairs() {
        let question = pairs_question();
        let answer =
            normalize_answer(&question, &payload(json!({ "questionId": "q2", "pairs": 42 })));
        assert_eq!(answer, CanonicalAnswer::Pairs(Vec::new()));
    }

    #[test]
    fn matrix_cells_coerce_numbers_and_drop_malformed() {
        let now = crate::core::time::primitive_now_utc();
        let question = Question {
            id: "m1".to_string(),
            content: "grid".to_string(),
            body: Json(QuestionBody::Matrix {
                rows: vec!["r".to_string()],
                columns: vec!["c".to_string()],
                correct: vec![vec![true]],
            }),
            created_at: now,
            updated_at: now,
        };
        let question = materialize_question(&question, &mut StdRng::seed_from_u64(1));

        let answer = normalize_answer(
            &question,
            &payload(json!({
                "questionId": "m1",
                "selectedMatrix": [
                    { "row": 0, "col": "1" },
                    { "row": 1.0, "col": 0 },
                    { "row": "x", "col": 0 },
                    { "col": 2 }
                ]
            })),
        );
        assert_eq!(
            answer,
            CanonicalAnswer::Cells(vec![
                SelectedCell { row: 0, col: 1 },
                SelectedCell { row: 1, col: 0 },
            ])
        );
    }

    #[test]
    fn mapping_coerces_entries_to_string_lists() {
        let now = crate::core::time::primitive_now_utc();
        let question = Question {
            id: "d1".to_string(),
            content: "drag".to_string(),
            body: Json(QuestionBody::DragDrop {
                draggables: vec!["x".to_string()],
                dropzones: vec!["zone".to_string()],
                correct_mapping: Vec::new(),
            }),
            created_at: now,
            updated_at: now,
        };
        let question = materialize_question(&question, &mut StdRng::seed_from_u64(1));

        let answer = normalize_answer(
            &question,
            &payload(json!({
                "questionId": "d1",
                "mapping": { "0": ["x", 3], "1": "not-an-array" }
            })),
        );
        let CanonicalAnswer::Mapping(mapping) = answer else { panic!("expected mapping") };
        assert_eq!(mapping.get("0"), Some(&vec!["x".to_string(), "3".to_string()]));
        assert_eq!(mapping.get("1"), Some(&Vec::new()));
    }
}
