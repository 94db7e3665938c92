use crate::dto::question_dto::{
    CreateQuestionPoolPayload, QuestionPoolListQuery, UpdateQuestionPoolPayload,
};
use crate::error::{Error, Result};
use crate::models::question_pool::{QuestionPool, QuestionPoolSummary};
use sqlx::PgPool;

const POOL_COLUMNS: &str =
    "id, subject_id, instructor_id, name, description, created_at, updated_at";

#[derive(Clone)]
pub struct QuestionPoolService {
    pool: PgPool,
}

impl QuestionPoolService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, payload: CreateQuestionPoolPayload) -> Result<QuestionPool> {
        let subject_exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM subjects WHERE id = $1)")
                .bind(payload.subject)
                .fetch_one(&self.pool)
                .await?;
        if !subject_exists {
            return Err(Error::NotFound(format!(
                "Subject {} not found",
                payload.subject
            )));
        }

        let sql = format!(
            "INSERT INTO question_pools (subject_id, instructor_id, name, description)
             VALUES ($1, $2, $3, $4)
             RETURNING {}",
            POOL_COLUMNS
        );
        let created = sqlx::query_as::<_, QuestionPool>(&sql)
            .bind(payload.subject)
            .bind(payload.instructor_id)
            .bind(payload.name)
            .bind(payload.description)
            .fetch_one(&self.pool)
            .await?;

        tracing::info!(
            question_pool_id = created.id,
            subject_id = created.subject_id,
            "Question pool created"
        );
        Ok(created)
    }

    pub async fn list(&self, query: QuestionPoolListQuery) -> Result<Vec<QuestionPoolSummary>> {
        let pools = sqlx::query_as::<_, QuestionPoolSummary>(
            r#"
            SELECT
                qp.id, qp.subject_id, qp.instructor_id, qp.name, qp.description,
                COUNT(q.id) AS question_count,
                qp.created_at, qp.updated_at
            FROM question_pools qp
            LEFT JOIN questions q ON q.question_pool_id = qp.id
            WHERE ($1::bigint IS NULL OR qp.subject_id = $1)
              AND ($2::bigint IS NULL OR qp.instructor_id = $2)
            GROUP BY qp.id
            ORDER BY qp.id
            "#,
        )
        .bind(query.subject)
        .bind(query.instructor_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(pools)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<QuestionPoolSummary> {
        sqlx::query_as::<_, QuestionPoolSummary>(
            r#"
            SELECT
                qp.id, qp.subject_id, qp.instructor_id, qp.name, qp.description,
                (SELECT COUNT(*) FROM questions q WHERE q.question_pool_id = qp.id) AS question_count,
                qp.created_at, qp.updated_at
            FROM question_pools qp
            WHERE qp.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Question pool {} not found", id)))
    }

    pub async fn update(&self, id: i64, payload: UpdateQuestionPoolPayload) -> Result<QuestionPool> {
        let sql = format!(
            "UPDATE question_pools
             SET
                instructor_id = COALESCE($2, instructor_id),
                name = COALESCE($3, name),
                description = COALESCE($4, description),
                updated_at = NOW()
             WHERE id = $1
             RETURNING {}",
            POOL_COLUMNS
        );
        sqlx::query_as::<_, QuestionPool>(&sql)
            .bind(id)
            .bind(payload.instructor_id)
            .bind(payload.name)
            .bind(payload.description)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Question pool {} not found", id)))
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM question_pools WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Question pool {} not found", id)));
        }
        Ok(())
    }
}
