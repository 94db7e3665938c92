use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::models::answer::Answer;
use crate::models::question::QuestionWithAnswers;
use crate::models::question_pool::{QuestionPool, QuestionPoolSummary};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateQuestionPoolPayload {
    /// Subject id.
    pub subject: i64,
    pub instructor_id: i64,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(max = 255))]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
pub struct UpdateQuestionPoolPayload {
    pub instructor_id: Option<i64>,
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(length(max = 255))]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct QuestionPoolListQuery {
    pub subject: Option<i64>,
    pub instructor_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionPoolResponse {
    pub id: i64,
    pub subject: i64,
    pub instructor_id: i64,
    pub name: String,
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_count: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<QuestionPool> for QuestionPoolResponse {
    fn from(value: QuestionPool) -> Self {
        Self {
            id: value.id,
            subject: value.subject_id,
            instructor_id: value.instructor_id,
            name: value.name,
            description: value.description,
            question_count: None,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

impl From<QuestionPoolSummary> for QuestionPoolResponse {
    fn from(value: QuestionPoolSummary) -> Self {
        Self {
            id: value.id,
            subject: value.subject_id,
            instructor_id: value.instructor_id,
            name: value.name,
            description: value.description,
            question_count: Some(value.question_count),
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateAnswer {
    #[validate(length(min = 1))]
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

/// Question body shared by the single and bulk creation payloads.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct QuestionContent {
    #[validate(length(min = 1))]
    pub text: String,
    #[serde(default)]
    #[validate(custom(function = "validate_score"))]
    pub default_score: Decimal,
    #[validate(length(min = 1), nested)]
    pub answers: Vec<CreateAnswer>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateQuestionPayload {
    pub question_pool: i64,
    #[serde(flatten)]
    #[validate(nested)]
    pub content: QuestionContent,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BulkCreateQuestionsPayload {
    #[validate(length(min = 1), nested)]
    pub questions: Vec<QuestionContent>,
}

fn validate_score(score: &Decimal) -> Result<(), ValidationError> {
    if score.is_sign_negative() && !score.is_zero() {
        return Err(ValidationError::new("negative_score"));
    }
    if score.scale() > 2 {
        return Err(ValidationError::new("score_precision"));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerResponse {
    pub id: i64,
    pub text: String,
    pub is_correct: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Answer> for AnswerResponse {
    fn from(value: Answer) -> Self {
        Self {
            id: value.id,
            text: value.text,
            is_correct: value.is_correct,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionResponse {
    pub id: i64,
    pub question_pool: i64,
    pub text: String,
    pub default_score: Decimal,
    pub answers: Vec<AnswerResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<QuestionWithAnswers> for QuestionResponse {
    fn from(value: QuestionWithAnswers) -> Self {
        let QuestionWithAnswers { question, answers } = value;
        Self {
            id: question.id,
            question_pool: question.question_pool_id,
            text: question.text,
            default_score: question.default_score,
            answers: answers.into_iter().map(Into::into).collect(),
            created_at: question.created_at,
            updated_at: question.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkQuestionsResponse {
    pub questions: Vec<QuestionResponse>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn question_payload_accepts_numeric_score_and_defaults_is_correct() {
        let payload: CreateQuestionPayload = serde_json::from_value(json!({
            "question_pool": 3,
            "text": "What is 2 + 2?",
            "default_score": 1.5,
            "answers": [{"text": "3"}, {"text": "4", "is_correct": true}]
        }))
        .unwrap();

        assert_eq!(payload.question_pool, 3);
        assert_eq!(payload.content.default_score, Decimal::new(15, 1));
        assert!(!payload.content.answers[0].is_correct);
        assert!(payload.content.answers[1].is_correct);
        assert!(payload.validate().is_ok());
    }

    #[test]
    fn missing_score_defaults_to_zero() {
        let content: QuestionContent = serde_json::from_value(json!({
            "text": "Capital of France?",
            "answers": [{"text": "Paris", "is_correct": true}]
        }))
        .unwrap();
        assert!(content.default_score.is_zero());
        assert!(content.validate().is_ok());
    }

    #[test]
    fn question_without_answers_is_rejected() {
        let content = QuestionContent {
            text: "Empty?".into(),
            default_score: Decimal::ONE,
            answers: vec![],
        };
        assert!(content.validate().is_err());
    }

    #[test]
    fn negative_or_overly_precise_scores_are_rejected() {
        let answers = vec![CreateAnswer {
            text: "yes".into(),
            is_correct: true,
        }];
        let negative = QuestionContent {
            text: "q".into(),
            default_score: Decimal::new(-1, 0),
            answers: answers.clone(),
        };
        assert!(negative.validate().is_err());

        let precise = QuestionContent {
            text: "q".into(),
            default_score: Decimal::new(1234, 3),
            answers,
        };
        assert!(precise.validate().is_err());
    }

    #[test]
    fn bulk_payload_validates_nested_answers() {
        let payload: BulkCreateQuestionsPayload = serde_json::from_value(json!({
            "questions": [
                {"text": "ok", "answers": [{"text": "a", "is_correct": true}]},
                {"text": "bad", "answers": [{"text": ""}]}
            ]
        }))
        .unwrap();
        assert!(payload.validate().is_err());
    }
}
