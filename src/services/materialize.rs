use std::collections::HashMap;

use rand::Rng;

use crate::db::models::{
    AttemptBody, AttemptQuestion, Exam, Question, QuestionBody, TokenArea, TokenCell, TokenItem,
    TokenOption, TokenPair,
};
use crate::services::shuffle::{generate_token, shuffle};

/// Resolve which question ids a session will use, in order: shuffle first
/// when requested (so truncation samples a different first-N each time),
/// then cap at `num_questions`.
pub(crate) fn select_question_ids(
    exam: &Exam,
    effective_shuffle: bool,
    rng: &mut impl Rng,
) -> Vec<String> {
    let mut ids = exam.question_ids.0.clone();
    if effective_shuffle {
        ids = shuffle(&ids, rng);
    }
    let cap = exam.num_questions.max(0) as usize;
    if cap > 0 && cap < ids.len() {
        ids.truncate(cap);
    }
    ids
}

/// Re-sequence fetched documents to match the retained id order. The fetch
/// layer returns rows in arbitrary order and may return fewer than asked;
/// unknown ids are silently dropped.
pub(crate) fn sequence_questions(ids: &[String], fetched: Vec<Question>) -> Vec<Question> {
    let mut by_id: HashMap<String, Question> =
        fetched.into_iter().map(|question| (question.id.clone(), question)).collect();
    ids.iter().filter_map(|id| by_id.remove(id)).collect()
}

/// Materialize the full attempt question list: tokenize every question, then
/// apply the global shuffle pass (question order plus a second unit shuffle
/// inside each question) when the session is randomized.
pub(crate) fn build_attempt_questions(
    questions: &[Question],
    effective_shuffle: bool,
    rng: &mut impl Rng,
) -> Vec<AttemptQuestion> {
    let mut out: Vec<AttemptQuestion> =
        questions.iter().map(|question| materialize_question(question, rng)).collect();
    if effective_shuffle {
        out = shuffle(&out, rng);
        for question in &mut out {
            reshuffle_units(question, rng);
        }
    }
    out
}

/// Turn one stored question into an attempt question: every selectable unit
/// gets a fresh token, unit order is shuffled (matrix cells keep their
/// structural row/column identity instead), and the untouched authoring
/// payload is frozen alongside as the `raw` grading block.
pub(crate) fn materialize_question(question: &Question, rng: &mut impl Rng) -> AttemptQuestion {
    let raw = question.body.0.clone();

    let body = match &question.body.0 {
        QuestionBody::Single { options } => {
            AttemptBody::Single { options: tokenize_options(options, rng) }
        }
        QuestionBody::Multi { options } => {
            AttemptBody::Multi { options: tokenize_options(options, rng) }
        }
        QuestionBody::DropMatch { pairs } => {
            let indexed: Vec<(usize, &crate::db::models::MatchPair)> =
                pairs.iter().enumerate().collect();
            let pairs = shuffle(&indexed, rng)
                .into_iter()
                .map(|(orig_index, pair)| TokenPair {
                    token: generate_token(rng),
                    left: pair.left.clone(),
                    right: pair.right.clone(),
                    orig_index,
                })
                .collect();
            AttemptBody::DropMatch { pairs }
        }
        QuestionBody::ImageArea { image_url, areas } => {
            let indexed: Vec<(usize, &crate::db::models::ImageRegion)> =
                areas.iter().enumerate().collect();
            let areas = shuffle(&indexed, rng)
                .into_iter()
                .map(|(orig_index, region)| TokenArea {
                    token: generate_token(rng),
                    region: region.clone(),
                    orig_index,
                })
                .collect();
            AttemptBody::ImageArea { image_url: image_url.clone(), areas }
        }
        QuestionBody::Matrix { rows, columns, correct } => {
            let mut cells = Vec::with_capacity(rows.len() * columns.len());
            for row in 0..rows.len() {
                for col in 0..columns.len() {
                    let is_correct =
                        correct.get(row).and_then(|cols| cols.get(col)).copied().unwrap_or(false);
                    cells.push(TokenCell { token: generate_token(rng), row, col, is_correct });
                }
            }
            AttemptBody::Matrix { rows: rows.clone(), columns: columns.clone(), cells }
        }
        QuestionBody::DragDrop { draggables, dropzones, .. } => {
            let indexed: Vec<(usize, &String)> = draggables.iter().enumerate().collect();
            let items = shuffle(&indexed, rng)
                .into_iter()
                .map(|(orig_index, text)| TokenItem {
                    token: generate_token(rng),
                    text: text.clone(),
                    orig_index,
                })
                .collect();
            AttemptBody::DragDrop { items, dropzones: dropzones.clone() }
        }
    };

    AttemptQuestion {
        question_id: question.id.clone(),
        content: question.content.clone(),
        body,
        raw,
    }
}

fn tokenize_options(
    options: &[crate::db::models::ChoiceOption],
    rng: &mut impl Rng,
) -> Vec<TokenOption> {
    let indexed: Vec<(usize, &crate::db::models::ChoiceOption)> =
        options.iter().enumerate().collect();
    shuffle(&indexed, rng)
        .into_iter()
        .map(|(orig_index, option)| TokenOption {
            token: generate_token(rng),
            text: option.text.clone(),
            orig_index,
            is_correct: option.is_correct,
        })
        .collect()
}

fn reshuffle_units(question: &mut AttemptQuestion, rng: &mut impl Rng) {
    match &mut question.body {
        AttemptBody::Single { options } | AttemptBody::Multi { options } => {
            *options = shuffle(options, rng);
        }
        AttemptBody::DropMatch { pairs } => {
            *pairs = shuffle(pairs, rng);
        }
        AttemptBody::ImageArea { areas, .. } => {
            *areas = shuffle(areas, rng);
        }
        AttemptBody::Matrix { .. } => {}
        AttemptBody::DragDrop { items, .. } => {
            *items = shuffle(items, rng);
        }
    }
}
