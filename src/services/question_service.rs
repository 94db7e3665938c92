use std::collections::HashMap;

use crate::dto::question_dto::{CreateQuestionPayload, QuestionContent};
use crate::error::{Error, Result};
use crate::models::answer::Answer;
use crate::models::question::{Question, QuestionWithAnswers};
use sqlx::{PgConnection, PgPool};

const QUESTION_COLUMNS: &str = "id, question_pool_id, text, default_score, created_at, updated_at";
const ANSWER_COLUMNS: &str = "id, question_id, text, is_correct, created_at, updated_at";

#[derive(Clone)]
pub struct QuestionService {
    pool: PgPool,
}

impl QuestionService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, payload: CreateQuestionPayload) -> Result<QuestionWithAnswers> {
        let mut tx = self.pool.begin().await?;
        ensure_pool_exists(&mut tx, payload.question_pool).await?;
        let created = insert_question(&mut tx, payload.question_pool, &payload.content).await?;
        tx.commit().await?;

        tracing::info!(
            question_id = created.question.id,
            question_pool_id = payload.question_pool,
            answers = created.answers.len(),
            "Question created"
        );
        Ok(created)
    }

    /// Insert many questions into one pool atomically.
    pub async fn bulk_create(
        &self,
        pool_id: i64,
        questions: &[QuestionContent],
    ) -> Result<Vec<QuestionWithAnswers>> {
        let mut tx = self.pool.begin().await?;
        ensure_pool_exists(&mut tx, pool_id).await?;

        let mut created = Vec::with_capacity(questions.len());
        for content in questions {
            created.push(insert_question(&mut tx, pool_id, content).await?);
        }
        tx.commit().await?;

        tracing::info!(
            question_pool_id = pool_id,
            count = created.len(),
            "Questions bulk created"
        );
        Ok(created)
    }

    pub async fn list_for_pool(&self, pool_id: i64) -> Result<Vec<QuestionWithAnswers>> {
        let mut conn = self.pool.acquire().await?;
        ensure_pool_exists(&mut conn, pool_id).await?;

        let sql = format!(
            "SELECT {} FROM questions WHERE question_pool_id = $1 ORDER BY id",
            QUESTION_COLUMNS
        );
        let questions = sqlx::query_as::<_, Question>(&sql)
            .bind(pool_id)
            .fetch_all(&mut *conn)
            .await?;
        attach_answers(&mut conn, questions).await
    }

    pub async fn get_by_id(&self, id: i64) -> Result<QuestionWithAnswers> {
        let mut conn = self.pool.acquire().await?;
        let mut found = fetch_questions_with_answers(&mut conn, &[id]).await?;
        found
            .remove(&id)
            .ok_or_else(|| Error::NotFound(format!("Question {} not found", id)))
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM questions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Question {} not found", id)));
        }
        Ok(())
    }
}

async fn ensure_pool_exists(conn: &mut PgConnection, pool_id: i64) -> Result<()> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM question_pools WHERE id = $1)")
            .bind(pool_id)
            .fetch_one(&mut *conn)
            .await?;
    if !exists {
        return Err(Error::NotFound(format!(
            "Question pool {} not found",
            pool_id
        )));
    }
    Ok(())
}

async fn insert_question(
    conn: &mut PgConnection,
    pool_id: i64,
    content: &QuestionContent,
) -> Result<QuestionWithAnswers> {
    let sql = format!(
        "INSERT INTO questions (question_pool_id, text, default_score)
         VALUES ($1, $2, $3)
         RETURNING {}",
        QUESTION_COLUMNS
    );
    let question = sqlx::query_as::<_, Question>(&sql)
        .bind(pool_id)
        .bind(&content.text)
        .bind(content.default_score)
        .fetch_one(&mut *conn)
        .await?;

    if content.answers.iter().filter(|a| a.is_correct).count() != 1 {
        tracing::warn!(
            question_id = question.id,
            "Question does not have exactly one correct answer"
        );
    }

    let answer_sql = format!(
        "INSERT INTO answers (question_id, text, is_correct)
         VALUES ($1, $2, $3)
         RETURNING {}",
        ANSWER_COLUMNS
    );
    let mut answers = Vec::with_capacity(content.answers.len());
    for answer in &content.answers {
        let created = sqlx::query_as::<_, Answer>(&answer_sql)
            .bind(question.id)
            .bind(&answer.text)
            .bind(answer.is_correct)
            .fetch_one(&mut *conn)
            .await?;
        answers.push(created);
    }

    Ok(QuestionWithAnswers { question, answers })
}

async fn attach_answers(
    conn: &mut PgConnection,
    questions: Vec<Question>,
) -> Result<Vec<QuestionWithAnswers>> {
    let ids: Vec<i64> = questions.iter().map(|q| q.id).collect();
    let sql = format!(
        "SELECT {} FROM answers WHERE question_id = ANY($1) ORDER BY id",
        ANSWER_COLUMNS
    );
    let answers = sqlx::query_as::<_, Answer>(&sql)
        .bind(&ids)
        .fetch_all(&mut *conn)
        .await?;

    let mut by_question: HashMap<i64, Vec<Answer>> = HashMap::new();
    for answer in answers {
        by_question.entry(answer.question_id).or_default().push(answer);
    }

    Ok(questions
        .into_iter()
        .map(|question| {
            let answers = by_question.remove(&question.id).unwrap_or_default();
            QuestionWithAnswers { question, answers }
        })
        .collect())
}

/// Loads the given questions with their answers (in id order), keyed by question id.
pub async fn fetch_questions_with_answers(
    conn: &mut PgConnection,
    ids: &[i64],
) -> Result<HashMap<i64, QuestionWithAnswers>> {
    let sql = format!(
        "SELECT {} FROM questions WHERE id = ANY($1) ORDER BY id",
        QUESTION_COLUMNS
    );
    let questions = sqlx::query_as::<_, Question>(&sql)
        .bind(ids)
        .fetch_all(&mut *conn)
        .await?;

    Ok(attach_answers(conn, questions)
        .await?
        .into_iter()
        .map(|entry| (entry.question.id, entry))
        .collect())
}
