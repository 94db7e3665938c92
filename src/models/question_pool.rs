use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QuestionPool {
    pub id: i64,
    pub subject_id: i64,
    pub instructor_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Pool row joined with the number of questions it currently holds.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QuestionPoolSummary {
    pub id: i64,
    pub subject_id: i64,
    pub instructor_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub question_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
