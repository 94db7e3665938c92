use std::collections::{BTreeSet, HashMap};

use rand::rngs::StdRng;
use rand::SeedableRng;
use sqlx::{PgConnection, PgPool};

use crate::dto::test_dto::{
    AnswerKey, GenerateTestPayload, GenerateTestResponse, GeneratedTestSummary, TestListQuery,
    VariantAnswerKey,
};
use crate::error::{Error, Result};
use crate::models::generated_test_link::GeneratedTestLink;
use crate::models::question::QuestionWithAnswers;
use crate::models::subject::Subject;
use crate::models::test::{Test, TestQuestion};
use crate::services::answer_key::build_answer_key;
use crate::services::export_service::{ExamSheet, ExportService, SheetItem};
use crate::services::generation::{self, PoolInventory, VariantPlan};
use crate::services::question_service::fetch_questions_with_answers;
use crate::utils::token::{generate_assessment_id, generate_group_id};

const TEST_COLUMNS: &str = "id, subject_id, instructor_id, assessment_id, group_id, name, variant, notes, instructions, created_at, updated_at";
const ID_ATTEMPTS: usize = 64;

#[derive(Clone)]
pub struct TestService {
    pool: PgPool,
}

impl TestService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Generate one test per requested variant, all sharing a group id.
    ///
    /// Runs in a single transaction: either every variant with its placements
    /// and document is stored, or nothing is.
    pub async fn generate(&self, payload: GenerateTestPayload) -> Result<GenerateTestResponse> {
        generation::check_positions(&payload.question_selections)?;

        let mut tx = self.pool.begin().await?;

        let subject = fetch_subject(&mut tx, payload.subject).await?;
        let inventory = load_inventory(&mut tx, &payload).await?;

        let mut rng = StdRng::from_entropy();
        let plans = generation::plan_variants(
            &payload.question_selections,
            &payload.variants,
            &inventory,
            payload.resample_per_variant,
            &mut rng,
        )?;

        let group_id = match payload.group_id.as_deref() {
            Some(requested) => {
                lock_group(&mut tx, requested).await?;
                if group_exists(&mut tx, requested).await? {
                    return Err(Error::Conflict(format!(
                        "Group {} already exists",
                        requested
                    )));
                }
                requested.to_string()
            }
            None => allocate_group_id(&mut tx, &mut rng).await?,
        };

        let question_ids: Vec<i64> = plans
            .iter()
            .flat_map(VariantPlan::question_ids)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let questions = fetch_questions_with_answers(&mut tx, &question_ids).await?;

        let mut generated_tests = Vec::with_capacity(plans.len());
        for plan in &plans {
            let test = insert_test(&mut tx, &payload, &group_id, &plan.variant, &mut rng).await?;

            let positions: Vec<i32> = plan.placements.iter().map(|p| p.position).collect();
            let ids: Vec<i64> = plan.question_ids().collect();
            sqlx::query(
                "INSERT INTO test_questions (test_id, question_id, position)
                 SELECT $1, q, p FROM UNNEST($2::bigint[], $3::int[]) AS t(q, p)",
            )
            .bind(test.id)
            .bind(&ids)
            .bind(&positions)
            .execute(&mut *tx)
            .await?;

            let placements: Vec<(i32, i64)> = positions.into_iter().zip(ids).collect();
            let sheet = build_sheet(&subject.name, &test, &placements, &questions)?;
            let document = ExportService::render_exam_docx(&sheet)?;
            store_document(&mut tx, test.id, &document).await?;

            tracing::info!(
                test_id = test.id,
                assessment_id = %test.assessment_id,
                variant = %test.variant,
                group_id = %group_id,
                questions = placements.len(),
                "Test variant generated"
            );

            generated_tests.push(GeneratedTestSummary {
                test_id: test.id,
                assessment_id: test.assessment_id,
                variant: test.variant,
            });
        }

        tx.commit().await?;

        Ok(GenerateTestResponse {
            group_id,
            generated_tests,
        })
    }

    pub async fn get_by_id(&self, id: i64) -> Result<(Test, Vec<TestQuestion>)> {
        let mut conn = self.pool.acquire().await?;
        let test = fetch_test(&mut conn, id).await?;
        let placements = fetch_placements(&mut conn, id).await?;
        Ok((test, placements))
    }

    pub async fn list(&self, query: TestListQuery) -> Result<Vec<Test>> {
        let sql = format!(
            "SELECT {} FROM tests
             WHERE ($1::bigint IS NULL OR subject_id = $1)
               AND ($2::bigint IS NULL OR instructor_id = $2)
               AND ($3::text IS NULL OR group_id = $3)
             ORDER BY id",
            TEST_COLUMNS
        );
        let tests = sqlx::query_as::<_, Test>(&sql)
            .bind(query.subject)
            .bind(query.instructor_id)
            .bind(query.group_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(tests)
    }

    pub async fn list_group(&self, group_id: &str) -> Result<Vec<Test>> {
        let tests = self
            .list(TestListQuery {
                group_id: Some(group_id.to_string()),
                ..Default::default()
            })
            .await?;
        if tests.is_empty() {
            return Err(Error::NotFound(format!("Group {} not found", group_id)));
        }
        Ok(tests)
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM tests WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Test {} not found", id)));
        }
        Ok(())
    }

    /// Re-render the document of an existing test from its stored placements.
    pub async fn regenerate_document(&self, test_id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let test = fetch_test(&mut tx, test_id).await?;
        let placements = fetch_placements(&mut tx, test_id).await?;
        if placements.is_empty() {
            return Err(Error::BadRequest(
                "No test questions found for this test.".to_string(),
            ));
        }

        let subject = fetch_subject(&mut tx, test.subject_id).await?;
        let ids: Vec<i64> = placements.iter().map(|p| p.question_id).collect();
        let questions = fetch_questions_with_answers(&mut tx, &ids).await?;
        let pairs: Vec<(i32, i64)> = placements
            .iter()
            .map(|p| (p.position, p.question_id))
            .collect();

        let sheet = build_sheet(&subject.name, &test, &pairs, &questions)?;
        let document = ExportService::render_exam_docx(&sheet)?;
        store_document(&mut tx, test.id, &document).await?;
        tx.commit().await?;

        tracing::info!(test_id, assessment_id = %test.assessment_id, "Test document regenerated");
        Ok(())
    }

    pub async fn document(&self, test_id: i64) -> Result<Vec<u8>> {
        let link = sqlx::query_as::<_, GeneratedTestLink>(
            "SELECT id, test_id, exam_file, created_at, updated_at
             FROM generated_test_links WHERE test_id = $1",
        )
        .bind(test_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Word file not found for this test.".to_string()))?;
        Ok(link.exam_file)
    }

    /// Zip every stored document of a group, one entry per variant.
    pub async fn group_archive(&self, group_id: &str) -> Result<Vec<u8>> {
        let rows = sqlx::query_as::<_, (String, String, Vec<u8>)>(
            r#"
            SELECT t.assessment_id, t.variant, l.exam_file
            FROM tests t
            JOIN generated_test_links l ON l.test_id = t.id
            WHERE t.group_id = $1
            ORDER BY t.id
            "#,
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Err(Error::NotFound(format!(
                "No generated documents found for group {}",
                group_id
            )));
        }

        let entries: Vec<(String, Vec<u8>)> = rows
            .into_iter()
            .map(|(assessment_id, variant, bytes)| {
                (archive_entry_name(&assessment_id, &variant), bytes)
            })
            .collect();
        ExportService::bundle_zip(&entries)
    }

    pub async fn answer_key(&self, assessment_id: &str) -> Result<AnswerKey> {
        let mut conn = self.pool.acquire().await?;
        let sql = format!("SELECT {} FROM tests WHERE assessment_id = $1", TEST_COLUMNS);
        let test = sqlx::query_as::<_, Test>(&sql)
            .bind(assessment_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Assessment {} not found", assessment_id)))?;
        answer_key_for(&mut conn, test.id).await
    }

    pub async fn group_answer_keys(&self, group_id: &str) -> Result<Vec<VariantAnswerKey>> {
        let tests = self.list_group(group_id).await?;
        let mut conn = self.pool.acquire().await?;

        let mut keys = Vec::with_capacity(tests.len());
        for test in tests {
            let key = answer_key_for(&mut conn, test.id).await?;
            keys.push(VariantAnswerKey {
                test_id: test.id,
                assessment_id: test.assessment_id,
                variant: test.variant,
                key,
            });
        }
        Ok(keys)
    }
}

pub fn archive_entry_name(assessment_id: &str, variant: &str) -> String {
    format!("test_{}_{}.docx", assessment_id, variant)
}

/// Assemble the printable sheet for a test from `(position, question_id)` pairs
/// sorted by position.
pub fn build_sheet(
    subject_name: &str,
    test: &Test,
    placements: &[(i32, i64)],
    questions: &HashMap<i64, QuestionWithAnswers>,
) -> Result<ExamSheet> {
    let items = placements
        .iter()
        .map(|(position, question_id)| {
            let entry = questions.get(question_id).ok_or_else(|| {
                Error::Internal(format!("Question {} missing while rendering", question_id))
            })?;
            Ok(SheetItem {
                position: *position,
                text: entry.question.text.clone(),
                score: entry.question.default_score,
                answers: entry.answers.iter().map(|a| a.text.clone()).collect(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ExamSheet {
        subject_name: subject_name.to_string(),
        test_name: test.name.clone(),
        assessment_id: test.assessment_id.clone(),
        variant: test.variant.clone(),
        instructions: test.instructions.clone(),
        notes: test.notes.clone(),
        items,
    })
}

async fn fetch_subject(conn: &mut PgConnection, id: i64) -> Result<Subject> {
    sqlx::query_as::<_, Subject>(
        "SELECT id, institution_id, name, description, created_by, created_at, updated_at
         FROM subjects WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| Error::NotFound(format!("Subject {} not found", id)))
}

async fn fetch_test(conn: &mut PgConnection, id: i64) -> Result<Test> {
    let sql = format!("SELECT {} FROM tests WHERE id = $1", TEST_COLUMNS);
    sqlx::query_as::<_, Test>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Test {} not found", id)))
}

async fn fetch_placements(conn: &mut PgConnection, test_id: i64) -> Result<Vec<TestQuestion>> {
    let placements = sqlx::query_as::<_, TestQuestion>(
        "SELECT id, test_id, question_id, position, created_at
         FROM test_questions WHERE test_id = $1 ORDER BY position",
    )
    .bind(test_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(placements)
}

/// Question ids of every referenced pool, in id order. Unknown pools are 404.
async fn load_inventory(conn: &mut PgConnection, payload: &GenerateTestPayload) -> Result<PoolInventory> {
    let pool_ids: Vec<i64> = payload
        .question_selections
        .iter()
        .map(|s| s.question_pool)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let existing: Vec<i64> =
        sqlx::query_scalar("SELECT id FROM question_pools WHERE id = ANY($1)")
            .bind(&pool_ids)
            .fetch_all(&mut *conn)
            .await?;
    if let Some(missing) = pool_ids.iter().find(|id| !existing.contains(id)) {
        return Err(Error::NotFound(format!("Question pool {} not found", missing)));
    }

    let rows = sqlx::query_as::<_, (i64, i64)>(
        "SELECT question_pool_id, id FROM questions WHERE question_pool_id = ANY($1) ORDER BY id",
    )
    .bind(&pool_ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut inventory: PoolInventory = pool_ids.iter().map(|id| (*id, Vec::new())).collect();
    for (pool_id, question_id) in rows {
        inventory.entry(pool_id).or_default().push(question_id);
    }
    Ok(inventory)
}

/// Serializes generators that use the same group id until the transaction ends.
async fn lock_group(conn: &mut PgConnection, group_id: &str) -> Result<()> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(group_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn group_exists(conn: &mut PgConnection, group_id: &str) -> Result<bool> {
    let exists = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM tests WHERE group_id = $1)")
        .bind(group_id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(exists)
}

async fn allocate_group_id(conn: &mut PgConnection, rng: &mut StdRng) -> Result<String> {
    for _ in 0..ID_ATTEMPTS {
        let candidate = generate_group_id(rng);
        lock_group(conn, &candidate).await?;
        if !group_exists(conn, &candidate).await? {
            return Ok(candidate);
        }
    }
    Err(Error::Internal("Could not allocate a unique group id".to_string()))
}

/// Inserts the test under a fresh random assessment id. A taken id, including
/// one held by a concurrent uncommitted generation, yields no row and another
/// id is drawn.
async fn insert_test(
    conn: &mut PgConnection,
    payload: &GenerateTestPayload,
    group_id: &str,
    variant: &str,
    rng: &mut StdRng,
) -> Result<Test> {
    let sql = format!(
        "INSERT INTO tests (subject_id, instructor_id, assessment_id, group_id, name, variant, notes, instructions)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         ON CONFLICT (assessment_id) DO NOTHING
         RETURNING {}",
        TEST_COLUMNS
    );
    for _ in 0..ID_ATTEMPTS {
        let assessment_id = generate_assessment_id(rng);
        let inserted = sqlx::query_as::<_, Test>(&sql)
            .bind(payload.subject)
            .bind(payload.instructor_id)
            .bind(&assessment_id)
            .bind(group_id)
            .bind(&payload.name)
            .bind(variant)
            .bind(&payload.notes)
            .bind(&payload.instructions)
            .fetch_optional(&mut *conn)
            .await?;
        match inserted {
            Some(test) => return Ok(test),
            None => tracing::debug!(assessment_id = %assessment_id, "Assessment id taken, drawing another"),
        }
    }
    Err(Error::Internal(
        "Could not allocate a unique assessment id".to_string(),
    ))
}

async fn store_document(conn: &mut PgConnection, test_id: i64, document: &[u8]) -> Result<()> {
    sqlx::query(
        "INSERT INTO generated_test_links (test_id, exam_file)
         VALUES ($1, $2)
         ON CONFLICT (test_id) DO UPDATE SET exam_file = EXCLUDED.exam_file, updated_at = NOW()",
    )
    .bind(test_id)
    .bind(document)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn answer_key_for(conn: &mut PgConnection, test_id: i64) -> Result<AnswerKey> {
    let placements = fetch_placements(conn, test_id).await?;
    let ids: Vec<i64> = placements.iter().map(|p| p.question_id).collect();
    let questions = fetch_questions_with_answers(conn, &ids).await?;

    let mut entries = Vec::with_capacity(placements.len());
    for placement in &placements {
        let entry = questions.get(&placement.question_id).ok_or_else(|| {
            Error::Internal(format!(
                "Question {} missing while building answer key",
                placement.question_id
            ))
        })?;
        entries.push((placement.position, entry));
    }
    Ok(build_answer_key(entries))
}
