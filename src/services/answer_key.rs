use rust_decimal::prelude::ToPrimitive;

use crate::dto::test_dto::{AnswerKey, PositionMap};
use crate::models::answer::{answer_letter, Answer};
use crate::models::question::QuestionWithAnswers;

/// Marker for a correct answer beyond the lettered choices.
pub const UNLETTERED: &str = "?";
/// Marker for a question without any answer flagged correct.
pub const NO_CORRECT_ANSWER: &str = "N/A";

/// Letter of the first correct answer, answers taken in id order.
pub fn correct_letter(answers: &[Answer]) -> String {
    match answers.iter().position(|a| a.is_correct) {
        Some(idx) => answer_letter(idx).unwrap_or(UNLETTERED).to_string(),
        None => NO_CORRECT_ANSWER.to_string(),
    }
}

/// Builds the answer key for placements already sorted by position.
pub fn build_answer_key<'a, I>(placements: I) -> AnswerKey
where
    I: IntoIterator<Item = (i32, &'a QuestionWithAnswers)>,
{
    let mut correct_answers = Vec::new();
    let mut points = Vec::new();

    for (position, entry) in placements {
        correct_answers.push((position, correct_letter(&entry.answers)));
        points.push((position, entry.question.default_score.to_f64().unwrap_or(0.0)));
    }

    AnswerKey {
        correct_answers: PositionMap(correct_answers),
        points: PositionMap(points),
    }
}
