use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::db::models::{AttemptBody, AttemptQuestion, QuestionBody};
use crate::schemas::attempt::AnswerPayload;
use crate::services::answers::{normalize_answer, CanonicalAnswer, SelectedCell, SelectedPair};

/// Result of grading one question. `correct_tokens` is populated for
/// single/multi only; other types have no meaningful token list to reveal.
#[derive(Debug, Clone)]
pub(crate) struct GradeOutcome {
    pub(crate) is_correct: bool,
    pub(crate) correct_tokens: Vec<String>,
}

/// Per-question record returned from submission for client-side review.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct AnswerDetail {
    pub(crate) question_id: String,
    pub(crate) is_correct: bool,
    pub(crate) correct_tokens: Vec<String>,
    pub(crate) selected_tokens: Vec<String>,
    pub(crate) selected_pairs: Vec<SelectedPair>,
    pub(crate) selected_matrix: Vec<SelectedCell>,
    pub(crate) mapping: BTreeMap<String, Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) reason: Option<&'static str>,
}

/// Grade one canonical answer against the attempt snapshot. Pure and
/// idempotent: the check-one path and the submit path both go through here.
///
/// A question whose snapshot defines no correct answer (no flagged option,
/// no pairs, no true matrix cell, no mapping) always grades incorrect.
pub(crate) fn grade(question: &AttemptQuestion, answer: &CanonicalAnswer) -> GradeOutcome {
    match &question.body {
        AttemptBody::Single { options } => {
            let correct_tokens: Vec<String> = options
                .iter()
                .filter(|option| option.is_correct)
                .map(|option| option.token.clone())
                .collect();
            let submitted = tokens_of(answer);
            let is_correct = !correct_tokens.is_empty()
                && submitted.len() == 1
                && correct_tokens.contains(&submitted[0]);
            GradeOutcome { is_correct, correct_tokens }
        }
        AttemptBody::Multi { options } => {
            let correct_tokens: Vec<String> = options
                .iter()
                .filter(|option| option.is_correct)
                .map(|option| option.token.clone())
                .collect();
            let correct_set: BTreeSet<&str> =
                correct_tokens.iter().map(String::as_str).collect();
            let submitted_set: BTreeSet<&str> =
                tokens_of(answer).iter().map(String::as_str).collect();
            let is_correct = !correct_set.is_empty() && submitted_set == correct_set;
            GradeOutcome { is_correct, correct_tokens }
        }
        AttemptBody::ImageArea { areas, .. } => {
            let correct_set: BTreeSet<&str> = areas
                .iter()
                .filter(|area| area.region.is_correct)
                .map(|area| area.token.as_str())
                .collect();
            let submitted_set: BTreeSet<&str> =
                tokens_of(answer).iter().map(String::as_str).collect();
            let is_correct = !correct_set.is_empty() && submitted_set == correct_set;
            GradeOutcome { is_correct, correct_tokens: Vec::new() }
        }
        AttemptBody::DropMatch { .. } => {
            let QuestionBody::DropMatch { pairs: correct_pairs } = &question.raw else {
                return incorrect();
            };
            if correct_pairs.is_empty() {
                return incorrect();
            }
            let submitted = pairs_of(answer);
            let is_correct = submitted.len() == correct_pairs.len()
                && correct_pairs.iter().all(|correct| {
                    submitted.iter().any(|selected| {
                        selected.left == correct.left && selected.right == correct.right
                    })
                });
            GradeOutcome { is_correct, correct_tokens: Vec::new() }
        }
        AttemptBody::Matrix { .. } => {
            let QuestionBody::Matrix { correct, .. } = &question.raw else {
                return incorrect();
            };
            let correct_cells: BTreeSet<(i64, i64)> = correct
                .iter()
                .enumerate()
                .flat_map(|(row, cols)| {
                    cols.iter()
                        .enumerate()
                        .filter(|(_, flagged)| **flagged)
                        .map(move |(col, _)| (row as i64, col as i64))
                })
                .collect();
            if correct_cells.is_empty() {
                return incorrect();
            }
            let submitted: BTreeSet<(i64, i64)> =
                cells_of(answer).iter().map(|cell| (cell.row, cell.col)).collect();
            GradeOutcome { is_correct: submitted == correct_cells, correct_tokens: Vec::new() }
        }
        AttemptBody::DragDrop { .. } => {
            let QuestionBody::DragDrop { dropzones, correct_mapping, .. } = &question.raw else {
                return incorrect();
            };
            if dropzones.is_empty() || correct_mapping.is_empty() {
                return incorrect();
            }
            let mapping = mapping_of(answer);
            let mut is_correct = true;
            for (index, zone) in dropzones.iter().enumerate() {
                let expected: BTreeSet<&str> = correct_mapping
                    .iter()
                    .filter(|entry| entry.dropzone == *zone)
                    .map(|entry| entry.draggable.as_str())
                    .collect();
                // zones with nothing expected are not required to be empty
                if expected.is_empty() {
                    continue;
                }
                let submitted: BTreeSet<&str> = mapping
                    .get(&index.to_string())
                    .map(|values| values.iter().map(String::as_str).collect())
                    .unwrap_or_default();
                if submitted != expected {
                    is_correct = false;
                    break;
                }
            }
            GradeOutcome { is_correct, correct_tokens: Vec::new() }
        }
    }
}

/// Normalize and grade a raw client payload in one step (check-one path).
pub(crate) fn grade_payload(
    question: &AttemptQuestion,
    payload: &AnswerPayload,
) -> (CanonicalAnswer, GradeOutcome) {
    let canonical = normalize_answer(question, payload);
    let outcome = grade(question, &canonical);
    (canonical, outcome)
}

/// Grade a whole submission against the attempt snapshot. Answers referencing
/// questions outside the snapshot are recorded as unmatched instead of
/// failing the submission. Returns the correct-count tally and the
/// per-question details in submission order.
pub(crate) fn grade_submission(
    questions: &[AttemptQuestion],
    answers: &[AnswerPayload],
) -> (i32, Vec<AnswerDetail>) {
    let mut score = 0;
    let mut details = Vec::with_capacity(answers.len());

    for payload in answers {
        let Some(question) =
            questions.iter().find(|question| question.question_id == payload.question_id)
        else {
            details.push(AnswerDetail {
                question_id: payload.question_id.clone(),
                is_correct: false,
                correct_tokens: Vec::new(),
                selected_tokens: Vec::new(),
                selected_pairs: Vec::new(),
                selected_matrix: Vec::new(),
                mapping: BTreeMap::new(),
                reason: Some("not-in-attempt"),
            });
            continue;
        };

        let (canonical, outcome) = grade_payload(question, payload);
        if outcome.is_correct {
            score += 1;
        }
        details.push(build_detail(question, canonical, outcome));
    }

    (score, details)
}

pub(crate) fn build_detail(
    question: &AttemptQuestion,
    canonical: CanonicalAnswer,
    outcome: GradeOutcome,
) -> AnswerDetail {
    let reveals_tokens =
        matches!(question.body, AttemptBody::Single { .. } | AttemptBody::Multi { .. });

    let mut detail = AnswerDetail {
        question_id: question.question_id.clone(),
        is_correct: outcome.is_correct,
        correct_tokens: if reveals_tokens { outcome.correct_tokens } else { Vec::new() },
        selected_tokens: Vec::new(),
        selected_pairs: Vec::new(),
        selected_matrix: Vec::new(),
        mapping: BTreeMap::new(),
        reason: None,
    };

    match canonical {
        CanonicalAnswer::Tokens(tokens) => detail.selected_tokens = tokens,
        CanonicalAnswer::Pairs(pairs) => detail.selected_pairs = pairs,
        CanonicalAnswer::Cells(cells) => detail.selected_matrix = cells,
        CanonicalAnswer::Mapping(mapping) => detail.mapping = mapping,
    }

    detail
}

/// Ten-point-scale score rounded to two decimals. A zero-question attempt
/// scores 0 rather than dividing by zero.
pub(crate) fn score10(score: i32, total: i32) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    ((score as f64 / total as f64) * 10.0 * 100.0).round() / 100.0
}

fn incorrect() -> GradeOutcome {
    GradeOutcome { is_correct: false, correct_tokens: Vec::new() }
}

fn tokens_of(answer: &CanonicalAnswer) -> &[String] {
    match answer {
        CanonicalAnswer::Tokens(tokens) => tokens,
        _ => &[],
    }
}

fn pairs_of(answer: &CanonicalAnswer) -> &[SelectedPair] {
    match answer {
        CanonicalAnswer::Pairs(pairs) => pairs,
        _ => &[],
    }
}

fn cells_of(answer: &CanonicalAnswer) -> &[SelectedCell] {
    match answer {
        CanonicalAnswer::Cells(cells) => cells,
        _ => &[],
    }
}

fn mapping_of(answer: &CanonicalAnswer) -> &BTreeMap<String, Vec<String>> {
    static EMPTY: std::sync::OnceLock<BTreeMap<String, Vec<String>>> = std::sync::OnceLock::new();
    match answer {
        CanonicalAnswer::Mapping(mapping) => mapping,
        _ => EMPTY.get_or_init(BTreeMap::new),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::db::models::{
        ChoiceOption, DragMapping, ImageRegion, MatchPair, TokenArea, TokenCell, TokenItem,
        TokenOption, TokenPair,
    };

    fn option(token: &str, text: &str, orig_index: usize, is_correct: bool) -> TokenOption {
        TokenOption {
            token: token.to_string(),
            text: text.to_string(),
            orig_index,
            is_correct,
        }
    }

    fn single_question() -> AttemptQuestion {
        AttemptQuestion {
            question_id: "q1".to_string(),
            content: "pick one".to_string(),
            body: AttemptBody::Single {
                options: vec![
                    option("tok-b", "B", 1, true),
                    option("tok-a", "A", 0, false),
                ],
            },
            raw: QuestionBody::Single {
                options: vec![
                    ChoiceOption { text: "A".to_string(), is_correct: false },
                    ChoiceOption { text: "B".to_string(), is_correct: true },
                ],
            },
        }
    }

    fn multi_question() -> AttemptQuestion {
        AttemptQuestion {
            question_id: "q2".to_string(),
            content: "pick all".to_string(),
            body: AttemptBody::Multi {
                options: vec![
                    option("tok-1", "one", 0, true),
                    option("tok-2", "two", 1, false),
                    option("tok-3", "three", 2, true),
                ],
            },
            raw: QuestionBody::Multi {
                options: vec![
                    ChoiceOption { text: "one".to_string(), is_correct: true },
                    ChoiceOption { text: "two".to_string(), is_correct: false },
                    ChoiceOption { text: "three".to_string(), is_correct: true },
                ],
            },
        }
    }

    fn pairs_question() -> AttemptQuestion {
        AttemptQuestion {
            question_id: "q3".to_string(),
            content: "match".to_string(),
            body: AttemptBody::DropMatch {
                pairs: vec![
                    TokenPair {
                        token: "tok-p2".to_string(),
                        left: "2".to_string(),
                        right: "B".to_string(),
                        orig_index: 1,
                    },
                    TokenPair {
                        token: "tok-p1".to_string(),
                        left: "1".to_string(),
                        right: "A".to_string(),
                        orig_index: 0,
                    },
                ],
            },
            raw: QuestionBody::DropMatch {
                pairs: vec![
                    MatchPair { left: "1".to_string(), right: "A".to_string() },
                    MatchPair { left: "2".to_string(), right: "B".to_string() },
                ],
            },
        }
    }

    fn area_question() -> AttemptQuestion {
        let region = |is_correct: bool| ImageRegion {
            x: 1.0,
            y: 2.0,
            width: 10.0,
            height: 10.0,
            is_correct,
        };
        AttemptQuestion {
            question_id: "q4".to_string(),
            content: "click the part".to_string(),
            body: AttemptBody::ImageArea {
                image_url: None,
                areas: vec![
                    TokenArea { token: "area-0".to_string(), region: region(true), orig_index: 0 },
                    TokenArea { token: "area-1".to_string(), region: region(false), orig_index: 1 },
                    TokenArea { token: "area-2".to_string(), region: region(true), orig_index: 2 },
                ],
            },
            raw: QuestionBody::ImageArea {
                image_url: None,
                areas: vec![region(true), region(false), region(true)],
            },
        }
    }

    fn matrix_question(correct: Vec<Vec<bool>>) -> AttemptQuestion {
        let rows = vec!["r0".to_string(), "r1".to_string()];
        let columns = vec!["c0".to_string(), "c1".to_string()];
        let mut cells = Vec::new();
        for row in 0..rows.len() {
            for col in 0..columns.len() {
                cells.push(TokenCell {
                    token: format!("cell-{row}-{col}"),
                    row,
                    col,
                    is_correct: correct
                        .get(row)
                        .and_then(|cols| cols.get(col))
                        .copied()
                        .unwrap_or(false),
                });
            }
        }
        AttemptQuestion {
            question_id: "q5".to_string(),
            content: "grid".to_string(),
            body: AttemptBody::Matrix { rows: rows.clone(), columns: columns.clone(), cells },
            raw: QuestionBody::Matrix { rows, columns, correct },
        }
    }

    fn drag_question() -> AttemptQuestion {
        AttemptQuestion {
            question_id: "q6".to_string(),
            content: "drag".to_string(),
            body: AttemptBody::DragDrop {
                items: vec![
                    TokenItem { token: "drag-x".to_string(), text: "x".to_string(), orig_index: 0 },
                    TokenItem { token: "drag-y".to_string(), text: "y".to_string(), orig_index: 1 },
                    TokenItem { token: "drag-z".to_string(), text: "z".to_string(), orig_index: 2 },
                ],
                dropzones: vec!["alpha".to_string(), "beta".to_string(), "spare".to_string()],
            },
            raw: QuestionBody::DragDrop {
                draggables: vec!["x".to_string(), "y".to_string(), "z".to_string()],
                dropzones: vec!["alpha".to_string(), "beta".to_string(), "spare".to_string()],
                correct_mapping: vec![
                    DragMapping { draggable: "x".to_string(), dropzone: "alpha".to_string() },
                    DragMapping { draggable: "y".to_string(), dropzone: "alpha".to_string() },
                    DragMapping { draggable: "z".to_string(), dropzone: "beta".to_string() },
                ],
            },
        }
    }

    fn tokens(values: &[&str]) -> CanonicalAnswer {
        CanonicalAnswer::Tokens(values.iter().map(|value| value.to_string()).collect())
    }

    fn pairs(values: &[(&str, &str)]) -> CanonicalAnswer {
        CanonicalAnswer::Pairs(
            values
                .iter()
                .map(|(left, right)| SelectedPair {
                    left: left.to_string(),
                    right: right.to_string(),
                })
                .collect(),
        )
    }

    fn cells(values: &[(i64, i64)]) -> CanonicalAnswer {
        CanonicalAnswer::Cells(
            values.iter().map(|(row, col)| SelectedCell { row: *row, col: *col }).collect(),
        )
    }

    fn mapping(values: &[(&str, &[&str])]) -> CanonicalAnswer {
        CanonicalAnswer::Mapping(
            values
                .iter()
                .map(|(zone, items)| {
                    (zone.to_string(), items.iter().map(|item| item.to_string()).collect())
                })
                .collect(),
        )
    }

    #[test]
    fn single_choice_requires_exactly_the_correct_token() {
        let question = single_question();
        assert!(grade(&question, &tokens(&["tok-b"])).is_correct);
        assert!(!grade(&question, &tokens(&["tok-a"])).is_correct);
        assert!(!grade(&question, &tokens(&["tok-a", "tok-b"])).is_correct);
        assert!(!grade(&question, &tokens(&[])).is_correct);
    }

    #[test]
    fn single_choice_reports_correct_tokens() {
        let question = single_question();
        let outcome = grade(&question, &tokens(&["tok-a"]));
        assert_eq!(outcome.correct_tokens, vec!["tok-b".to_string()]);
    }

    #[test]
    fn multi_choice_is_order_and_duplicate_insensitive() {
        let question = multi_question();
        assert!(grade(&question, &tokens(&["tok-3", "tok-1"])).is_correct);
        assert!(grade(&question, &tokens(&["tok-1", "tok-3", "tok-1"])).is_correct);
        // strict subset and superset both fail
        assert!(!grade(&question, &tokens(&["tok-1"])).is_correct);
        assert!(!grade(&question, &tokens(&["tok-1", "tok-2", "tok-3"])).is_correct);
    }

    #[test]
    fn question_without_correct_data_never_grades_correct() {
        let question = AttemptQuestion {
            question_id: "q0".to_string(),
            content: "broken".to_string(),
            body: AttemptBody::Multi { options: vec![option("tok-1", "one", 0, false)] },
            raw: QuestionBody::Multi {
                options: vec![ChoiceOption { text: "one".to_string(), is_correct: false }],
            },
        };
        assert!(!grade(&question, &tokens(&[])).is_correct);
        assert!(!grade(&question, &tokens(&["tok-1"])).is_correct);
    }

    #[test]
    fn drop_match_compares_pairs_as_an_unordered_set() {
        let question = pairs_question();
        assert!(grade(&question, &pairs(&[("2", "B"), ("1", "A")])).is_correct);
        assert!(!grade(&question, &pairs(&[("1", "B"), ("2", "A")])).is_correct);
        assert!(!grade(&question, &pairs(&[("1", "A")])).is_correct);
    }

    #[test]
    fn drop_match_without_pairs_is_always_incorrect() {
        let mut question = pairs_question();
        question.raw = QuestionBody::DropMatch { pairs: Vec::new() };
        assert!(!grade(&question, &pairs(&[])).is_correct);
    }

    #[test]
    fn image_area_requires_exact_area_set() {
        let question = area_question();
        assert!(grade(&question, &tokens(&["area-2", "area-0"])).is_correct);
        assert!(!grade(&question, &tokens(&["area-0"])).is_correct);
        assert!(!grade(&question, &tokens(&["area-0", "area-1", "area-2"])).is_correct);
    }

    #[test]
    fn matrix_requires_complete_cell_set() {
        let question = matrix_question(vec![vec![true, false], vec![false, true]]);
        assert!(grade(&question, &cells(&[(0, 0), (1, 1)])).is_correct);
        assert!(grade(&question, &cells(&[(1, 1), (0, 0)])).is_correct);
        assert!(!grade(&question, &cells(&[(0, 0)])).is_correct);
        assert!(!grade(&question, &cells(&[(0, 0), (1, 1), (0, 1)])).is_correct);
    }

    #[test]
    fn matrix_with_no_true_cells_is_ungradeable() {
        let question = matrix_question(vec![vec![false, false], vec![false, false]]);
        assert!(!grade(&question, &cells(&[])).is_correct);
    }

    #[test]
    fn drag_drop_grades_each_expected_zone_as_a_set() {
        let question = drag_question();
        assert!(grade(
            &question,
            &mapping(&[("0", &["y", "x"]), ("1", &["z"])]),
        )
        .is_correct);
        // zone "spare" expects nothing and may hold anything
        assert!(grade(
            &question,
            &mapping(&[("0", &["x", "y"]), ("1", &["z"]), ("2", &["junk"])]),
        )
        .is_correct);
        assert!(!grade(&question, &mapping(&[("0", &["x"]), ("1", &["z"])])).is_correct);
        assert!(!grade(&question, &mapping(&[("0", &["x", "y", "z"]), ("1", &["z"])])).is_correct);
    }

    #[test]
    fn grading_is_idempotent() {
        let question = multi_question();
        let answer = tokens(&["tok-1", "tok-3"]);
        let first = grade(&question, &answer);
        let second = grade(&question, &answer);
        assert_eq!(first.is_correct, second.is_correct);
        assert_eq!(first.correct_tokens, second.correct_tokens);
    }

    #[test]
    fn submission_tallies_and_records_unmatched_questions() {
        let questions = vec![single_question(), multi_question()];
        let answers: Vec<AnswerPayload> = vec![
            serde_json::from_value(json!({ "questionId": "q1", "selectedTokens": ["tok-b"] }))
                .unwrap(),
            serde_json::from_value(json!({ "questionId": "q2", "selectedTokens": ["tok-1"] }))
                .unwrap(),
            serde_json::from_value(json!({ "questionId": "ghost", "selectedTokens": ["x"] }))
                .unwrap(),
        ];

        let (score, details) = grade_submission(&questions, &answers);
        assert_eq!(score, 1);
        assert_eq!(details.len(), 3);
        assert!(details[0].is_correct);
        assert!(!details[1].is_correct);
        assert_eq!(details[2].reason, Some("not-in-attempt"));
        assert!((0..=questions.len() as i32).contains(&score));
    }

    #[test]
    fn score10_rounds_and_guards_zero_total() {
        assert_eq!(score10(0, 0), 0.0);
        assert_eq!(score10(5, 5), 10.0);
        assert_eq!(score10(1, 3), 3.33);
        assert_eq!(score10(2, 3), 6.67);
    }

    #[test]
    fn details_reveal_correct_tokens_only_for_choice_questions() {
        let questions = vec![single_question(), pairs_question()];
        let answers: Vec<AnswerPayload> = vec![
            serde_json::from_value(json!({ "questionId": "q1", "selectedTokens": ["tok-a"] }))
                .unwrap(),
            serde_json::from_value(json!({
                "questionId": "q3",
                "selectedPairs": [{ "left": "1", "right": "A" }, { "left": "2", "right": "B" }]
            }))
            .unwrap(),
        ];

        let (score, details) = grade_submission(&questions, &answers);
        assert_eq!(score, 1);
        assert_eq!(details[0].correct_tokens, vec!["tok-b".to_string()]);
        assert!(details[1].correct_tokens.is_empty());
        assert_eq!(details[1].selected_pairs.len(), 2);
    }
}
