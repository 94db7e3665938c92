use std::env;
use std::io::{Cursor, Read};
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value as JsonValue};
use sqlx::{postgres::PgPoolOptions, PgPool};
use tower::ServiceExt;

use exam_backend::utils::token::generate_group_id;

/// Builds the full router against the database in `DATABASE_URL`.
/// Returns `None` when no database is configured so the suite can be skipped.
async fn setup() -> Option<(Router, PgPool)> {
    dotenvy::dotenv().ok();
    let Ok(database_url) = env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set; skipping API test");
        return None;
    };

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("pool");
    exam_backend::database::pool::run_migrations(&pool)
        .await
        .expect("migrations");

    let state = exam_backend::AppState::new(pool.clone());
    let app = exam_backend::routes::base_router()
        .merge(exam_backend::routes::api_router(10_000))
        .with_state(state);
    Some((app, pool))
}

async fn setup_app() -> Option<Router> {
    setup().await.map(|(app, _)| app)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<JsonValue>) -> (StatusCode, Vec<u8>) {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), 16 * 1024 * 1024).await.unwrap();
    (status, bytes.to_vec())
}

async fn send_json(app: &Router, method: &str, uri: &str, body: Option<JsonValue>) -> (StatusCode, JsonValue) {
    let (status, bytes) = send(app, method, uri, body).await;
    let value = if bytes.is_empty() {
        JsonValue::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

/// Creates a subject and a pool holding `count` questions whose correct answer is "B".
async fn seed_pool(app: &Router, count: usize) -> (i64, i64) {
    let (status, subject) = send_json(
        app,
        "POST",
        "/api/subjects",
        Some(json!({
            "institution_id": 1,
            "name": "Mathematics",
            "description": "Algebra and geometry",
            "created_by": 42
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let subject_id = subject["id"].as_i64().unwrap();

    let (status, pool) = send_json(
        app,
        "POST",
        "/api/question-pools",
        Some(json!({
            "subject": subject_id,
            "instructor_id": 42,
            "name": "Arithmetic"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let pool_id = pool["id"].as_i64().unwrap();

    let questions: Vec<JsonValue> = (0..count)
        .map(|i| {
            json!({
                "text": format!("What is {} + 1?", i),
                "default_score": "1.50",
                "answers": [
                    {"text": format!("{}", i)},
                    {"text": format!("{}", i + 1), "is_correct": true},
                    {"text": format!("{}", i + 2)}
                ]
            })
        })
        .collect();
    let (status, created) = send_json(
        app,
        "POST",
        &format!("/api/question-pools/{}/questions", pool_id),
        Some(json!({ "questions": questions })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["questions"].as_array().unwrap().len(), count);

    (subject_id, pool_id)
}

#[tokio::test]
async fn generation_flow_end_to_end() {
    let Some(app) = setup_app().await else { return };
    let (subject_id, pool_id) = seed_pool(&app, 6).await;

    let (status, listed) = send_json(
        &app,
        "GET",
        &format!("/api/question-pools/{}", pool_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["question_count"], 6);

    let (status, generated) = send_json(
        &app,
        "POST",
        "/api/generate-test",
        Some(json!({
            "subject": subject_id,
            "instructor_id": 42,
            "name": "Midterm",
            "variants": ["A", "B"],
            "question_selections": [
                {"question_pool": pool_id, "positions": [1, 2, 3]},
                {"question_pool": pool_id, "positions": [4]}
            ],
            "instructions": "Choose one answer"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", generated);

    let group_id = generated["group_id"].as_str().unwrap().to_string();
    assert_eq!(group_id.len(), 6);
    let tests = generated["generated_tests"].as_array().unwrap();
    assert_eq!(tests.len(), 2);
    assert_eq!(tests[0]["variant"], "A");
    assert_eq!(tests[1]["variant"], "B");
    let test_id = tests[0]["test_id"].as_i64().unwrap();
    let assessment_id = tests[0]["assessment_id"].as_str().unwrap().to_string();
    assert_eq!(assessment_id.len(), 5);

    let (status, test) = send_json(&app, "GET", &format!("/api/tests/{}", test_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(test["group_id"], group_id.as_str());
    let positions: Vec<i64> = test["questions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|q| q["position"].as_i64().unwrap())
        .collect();
    assert_eq!(positions, vec![1, 2, 3, 4]);

    let (status, key) = send_json(
        &app,
        "GET",
        &format!("/api/assessments/{}/correct-answers", assessment_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    for position in ["1", "2", "3", "4"] {
        assert_eq!(key["correct_answers"][position], "B");
        assert_eq!(key["points"][position], 1.5);
    }

    let (status, group) = send_json(&app, "GET", &format!("/api/groups/{}", group_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(group["tests"].as_array().unwrap().len(), 2);

    let (status, keys) = send_json(
        &app,
        "GET",
        &format!("/api/groups/{}/correct-answers", group_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(keys["variants"].as_array().unwrap().len(), 2);

    let req = Request::builder()
        .method("GET")
        .uri(format!("/api/tests/{}/document", test_id))
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()[header::CONTENT_DISPOSITION],
        format!("attachment; filename=\"test_{}.docx\"", test_id).as_str()
    );
    let document = to_bytes(resp.into_body(), 16 * 1024 * 1024).await.unwrap();
    let mut docx = zip::ZipArchive::new(Cursor::new(document.to_vec())).unwrap();
    let mut xml = String::new();
    docx.by_name("word/document.xml")
        .unwrap()
        .read_to_string(&mut xml)
        .unwrap();
    assert!(xml.contains(&format!("Assessment ID: {}", assessment_id)));
    assert!(xml.contains("Mathematics - Midterm"));
    assert!(xml.contains("(1.50 pt.)"));

    let (status, archive) = send(&app, "GET", &format!("/api/groups/{}/archive", group_id), None).await;
    assert_eq!(status, StatusCode::OK);
    let bundle = zip::ZipArchive::new(Cursor::new(archive)).unwrap();
    assert_eq!(bundle.len(), 2);
    assert!(bundle
        .file_names()
        .any(|name| name == format!("test_{}_A.docx", assessment_id)));

    let (status, body) = send_json(
        &app,
        "POST",
        &format!("/api/tests/{}/regenerate", test_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["detail"], "Test regenerated successfully.");

    let (status, _) = send_json(&app, "DELETE", &format!("/api/subjects/{}", subject_id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send_json(&app, "GET", &format!("/api/tests/{}", test_id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn generation_rejects_invalid_requests() {
    let Some(app) = setup_app().await else { return };
    let (subject_id, pool_id) = seed_pool(&app, 2).await;

    let request = |selections: JsonValue| {
        json!({
            "subject": subject_id,
            "instructor_id": 42,
            "name": "Quiz",
            "variants": ["A"],
            "question_selections": selections
        })
    };

    let (status, body) = send_json(
        &app,
        "POST",
        "/api/generate-test",
        Some(request(json!([{"question_pool": pool_id, "positions": [1, 2, 3]}]))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Not enough questions"));

    let (status, body) = send_json(
        &app,
        "POST",
        "/api/generate-test",
        Some(request(json!([
            {"question_pool": pool_id, "positions": [1]},
            {"question_pool": pool_id, "positions": [1]}
        ]))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"],
        "Duplicate position 1 specified across question selections."
    );

    let (status, _) = send_json(
        &app,
        "POST",
        "/api/generate-test",
        Some(request(json!([{"question_pool": i64::MAX, "positions": [1]}]))),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, tests) = send_json(
        &app,
        "GET",
        &format!("/api/tests?subject={}", subject_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(tests.as_array().unwrap().is_empty());

    let (status, _) = send_json(&app, "GET", "/api/assessments/00000/correct-answers", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send_json(&app, "GET", "/api/tests/0/document", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Word file not found for this test.");
}

#[tokio::test]
async fn question_crud_round_trip() {
    let Some(app) = setup_app().await else { return };
    let (_, pool_id) = seed_pool(&app, 1).await;

    let (status, created) = send_json(
        &app,
        "POST",
        "/api/questions",
        Some(json!({
            "question_pool": pool_id,
            "text": "Largest planet?",
            "default_score": 2,
            "answers": [
                {"text": "Jupiter", "is_correct": true},
                {"text": "Mars"}
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let question_id = created["id"].as_i64().unwrap();
    assert_eq!(created["answers"].as_array().unwrap().len(), 2);

    let (status, listed) = send_json(
        &app,
        "GET",
        &format!("/api/question-pools/{}/questions", pool_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 2);

    let (status, _) = send_json(
        &app,
        "POST",
        "/api/questions",
        Some(json!({
            "question_pool": pool_id,
            "text": "No answers",
            "answers": []
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send_json(&app, "DELETE", &format!("/api/questions/{}", question_id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send_json(&app, "GET", &format!("/api/questions/{}", question_id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

fn fresh_group_id() -> String {
    generate_group_id(&mut rand::thread_rng())
}

async fn placement_ids(app: &Router, test_id: i64) -> Vec<(i64, i64)> {
    let (status, test) = send_json(app, "GET", &format!("/api/tests/{}", test_id), None).await;
    assert_eq!(status, StatusCode::OK);
    test["questions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|q| (q["position"].as_i64().unwrap(), q["question_id"].as_i64().unwrap()))
        .collect()
}

#[tokio::test]
async fn group_lookups_and_document_regeneration_edge_cases() {
    let Some(app) = setup_app().await else { return };

    // '0' is outside the group id charset, so no generated or accepted group can match.
    for uri in ["/api/groups/00000", "/api/groups/00000/archive", "/api/groups/00000/correct-answers"] {
        let (status, _) = send(&app, "GET", uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
    }

    let (subject_id, pool_id) = seed_pool(&app, 3).await;
    let group_id = fresh_group_id();
    let body = json!({
        "subject": subject_id,
        "instructor_id": 42,
        "name": "Resampled quiz",
        "variants": ["A", "B"],
        "group_id": group_id,
        "resample_per_variant": true,
        "question_selections": [{"question_pool": pool_id, "positions": [1, 2]}]
    });

    let (status, generated) = send_json(&app, "POST", "/api/generate-test", Some(body.clone())).await;
    assert_eq!(status, StatusCode::CREATED, "{}", generated);
    assert_eq!(generated["group_id"], group_id.as_str());
    for test in generated["generated_tests"].as_array().unwrap() {
        let placements = placement_ids(&app, test["test_id"].as_i64().unwrap()).await;
        let positions: Vec<i64> = placements.iter().map(|(p, _)| *p).collect();
        assert_eq!(positions, vec![1, 2]);
        assert_ne!(placements[0].1, placements[1].1);
    }

    let (status, body) = send_json(&app, "POST", "/api/generate-test", Some(body)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], format!("Group {} already exists", group_id));

    let (status, group) = send_json(&app, "GET", &format!("/api/groups/{}", group_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(group["tests"].as_array().unwrap().len(), 2);

    let (small_subject, small_pool) = seed_pool(&app, 1).await;
    let (status, generated) = send_json(
        &app,
        "POST",
        "/api/generate-test",
        Some(json!({
            "subject": small_subject,
            "instructor_id": 42,
            "name": "Single",
            "variants": ["A"],
            "question_selections": [{"question_pool": small_pool, "positions": [1]}]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let test_id = generated["generated_tests"][0]["test_id"].as_i64().unwrap();
    let placements = placement_ids(&app, test_id).await;
    assert_eq!(placements.len(), 1);

    let (status, _) = send_json(&app, "DELETE", &format!("/api/questions/{}", placements[0].1), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, body) = send_json(&app, "POST", &format!("/api/tests/{}/regenerate", test_id), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No test questions found for this test.");

    let (status, body) = send_json(
        &app,
        "POST",
        "/api/generate-test",
        Some(json!({
            "subject": small_subject,
            "instructor_id": 42,
            "name": "Bad group",
            "variants": ["A"],
            "group_id": "   ",
            "question_selections": [{"question_pool": small_pool, "positions": [1]}]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);

    for subject in [subject_id, small_subject] {
        let (status, _) = send_json(&app, "DELETE", &format!("/api/subjects/{}", subject), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }
}

#[tokio::test]
async fn concurrent_generation_cannot_reuse_a_group_id() {
    let Some((app, pool)) = setup().await else { return };
    let (subject_id, pool_id) = seed_pool(&app, 2).await;
    let group_id = fresh_group_id();

    // Another generation holding the group id, still uncommitted.
    let mut holder = pool.begin().await.unwrap();
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(&group_id)
        .execute(&mut *holder)
        .await
        .unwrap();
    sqlx::query(
        "INSERT INTO tests (subject_id, instructor_id, assessment_id, group_id, name, variant)
         VALUES ($1, 42, $2, $2, 'Held', 'A')",
    )
    .bind(subject_id)
    .bind(&group_id)
    .execute(&mut *holder)
    .await
    .unwrap();

    let request = json!({
        "subject": subject_id,
        "instructor_id": 42,
        "name": "Racing",
        "variants": ["A"],
        "group_id": group_id,
        "question_selections": [{"question_pool": pool_id, "positions": [1]}]
    });
    let racer = app.clone();
    let pending = tokio::spawn(async move {
        send_json(&racer, "POST", "/api/generate-test", Some(request)).await
    });

    tokio::time::sleep(Duration::from_millis(300)).await;
    holder.commit().await.unwrap();

    let (status, body) = pending.await.unwrap();
    assert_eq!(status, StatusCode::CONFLICT, "{}", body);

    let (status, group) = send_json(&app, "GET", &format!("/api/groups/{}", group_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(group["tests"].as_array().unwrap().len(), 1);

    let (status, _) = send_json(&app, "DELETE", &format!("/api/subjects/{}", subject_id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}
