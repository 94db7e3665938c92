use crate::dto::subject_dto::{CreateSubjectPayload, SubjectListQuery, UpdateSubjectPayload};
use crate::error::{Error, Result};
use crate::models::subject::Subject;
use sqlx::PgPool;

const SUBJECT_COLUMNS: &str =
    "id, institution_id, name, description, created_by, created_at, updated_at";

#[derive(Clone)]
pub struct SubjectService {
    pool: PgPool,
}

impl SubjectService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, payload: CreateSubjectPayload) -> Result<Subject> {
        let query = format!(
            "INSERT INTO subjects (institution_id, name, description, created_by)
             VALUES ($1, $2, $3, $4)
             RETURNING {}",
            SUBJECT_COLUMNS
        );
        let subject = sqlx::query_as::<_, Subject>(&query)
            .bind(payload.institution_id)
            .bind(payload.name)
            .bind(payload.description)
            .bind(payload.created_by)
            .fetch_one(&self.pool)
            .await?;

        tracing::info!(subject_id = subject.id, "Subject created");
        Ok(subject)
    }

    pub async fn list(&self, query: SubjectListQuery) -> Result<Vec<Subject>> {
        let sql = format!(
            "SELECT {} FROM subjects
             WHERE ($1::bigint IS NULL OR institution_id = $1)
             ORDER BY id",
            SUBJECT_COLUMNS
        );
        let subjects = sqlx::query_as::<_, Subject>(&sql)
            .bind(query.institution_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(subjects)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Subject> {
        let sql = format!("SELECT {} FROM subjects WHERE id = $1", SUBJECT_COLUMNS);
        sqlx::query_as::<_, Subject>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Subject {} not found", id)))
    }

    pub async fn update(&self, id: i64, payload: UpdateSubjectPayload) -> Result<Subject> {
        let sql = format!(
            "UPDATE subjects
             SET
                institution_id = COALESCE($2, institution_id),
                name = COALESCE($3, name),
                description = COALESCE($4, description),
                updated_at = NOW()
             WHERE id = $1
             RETURNING {}",
            SUBJECT_COLUMNS
        );
        sqlx::query_as::<_, Subject>(&sql)
            .bind(id)
            .bind(payload.institution_id)
            .bind(payload.name)
            .bind(payload.description)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Subject {} not found", id)))
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM subjects WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Subject {} not found", id)));
        }
        tracing::info!(subject_id = id, "Subject deleted");
        Ok(())
    }
}
