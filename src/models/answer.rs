use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Answer {
    pub id: i64,
    pub question_id: i64,
    pub text: String,
    pub is_correct: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Labels for the answer choices printed on an exam sheet, in answer-id order.
pub const ANSWER_LETTERS: [&str; 5] = ["A", "B", "C", "D", "E"];

pub fn answer_letter(index: usize) -> Option<&'static str> {
    ANSWER_LETTERS.get(index).copied()
}
