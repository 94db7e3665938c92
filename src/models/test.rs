use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Test {
    pub id: i64,
    pub subject_id: i64,
    pub instructor_id: i64,
    pub assessment_id: String,
    pub group_id: Option<String>,
    pub name: String,
    pub variant: String,
    pub notes: Option<String>,
    pub instructions: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TestQuestion {
    pub id: i64,
    pub test_id: i64,
    pub question_id: i64,
    pub position: i32,
    pub created_at: DateTime<Utc>,
}
