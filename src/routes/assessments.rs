use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};
use bytes::Bytes;
use serde_json::json;
use validator::Validate;

use crate::{
    dto::test_dto::{
        GenerateTestPayload, GroupAnswerKeysResponse, GroupResponse, TestListQuery,
        TestResponse,
    },
    error::Result,
    services::export_service::{DOCX_CONTENT_TYPE, ZIP_CONTENT_TYPE},
    AppState,
};

fn attachment(content_type: &str, filename: String, body: Vec<u8>) -> impl IntoResponse {
    let disposition = format!("attachment; filename=\"{}\"", filename);
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Bytes::from(body),
    )
}

#[utoipa::path(
    post,
    path = "/api/generate-test",
    request_body = GenerateTestPayload,
    responses(
        (status = 201, description = "Variants generated", body = Json<GenerateTestResponse>),
        (status = 400, description = "Invalid payload, duplicate position or pool too small"),
        (status = 404, description = "Subject or question pool not found"),
        (status = 409, description = "Requested group id already in use")
    )
)]
#[axum::debug_handler]
pub async fn generate_test(
    State(state): State<AppState>,
    Json(payload): Json<GenerateTestPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let generated = state.test_service.generate(payload).await?;
    Ok((StatusCode::CREATED, Json(generated)))
}

#[utoipa::path(
    get,
    path = "/api/tests",
    params(
        ("subject" = Option<i64>, Query, description = "Filter by subject"),
        ("instructor_id" = Option<i64>, Query, description = "Filter by instructor"),
        ("group_id" = Option<String>, Query, description = "Filter by group")
    ),
    responses(
        (status = 200, description = "List of tests", body = Json<Vec<TestResponse>>)
    )
)]
#[axum::debug_handler]
pub async fn list_tests(
    State(state): State<AppState>,
    Query(query): Query<TestListQuery>,
) -> Result<impl IntoResponse> {
    let tests = state.test_service.list(query).await?;
    let items: Vec<TestResponse> = tests.into_iter().map(Into::into).collect();
    Ok(Json(items))
}

#[utoipa::path(
    get,
    path = "/api/tests/{id}",
    params(
        ("id" = i64, Path, description = "Test ID")
    ),
    responses(
        (status = 200, description = "Test with its placements", body = Json<TestResponse>),
        (status = 404, description = "Test not found")
    )
)]
#[axum::debug_handler]
pub async fn get_test(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let (test, placements) = state.test_service.get_by_id(id).await?;
    Ok(Json(TestResponse::from(test).with_placements(placements)))
}

#[utoipa::path(
    delete,
    path = "/api/tests/{id}",
    params(
        ("id" = i64, Path, description = "Test ID")
    ),
    responses(
        (status = 204, description = "Test deleted"),
        (status = 404, description = "Test not found")
    )
)]
#[axum::debug_handler]
pub async fn delete_test(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    state.test_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/tests/{id}/regenerate",
    params(
        ("id" = i64, Path, description = "Test ID")
    ),
    responses(
        (status = 200, description = "Document rebuilt from stored placements"),
        (status = 400, description = "Test has no questions"),
        (status = 404, description = "Test not found")
    )
)]
#[axum::debug_handler]
pub async fn regenerate_test_document(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    state.test_service.regenerate_document(id).await?;
    Ok(Json(json!({ "detail": "Test regenerated successfully." })))
}

#[utoipa::path(
    get,
    path = "/api/tests/{id}/document",
    params(
        ("id" = i64, Path, description = "Test ID")
    ),
    responses(
        (status = 200, description = "Word document attachment"),
        (status = 404, description = "Word file not found for this test")
    )
)]
pub async fn download_test_document(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let document = state.test_service.document(id).await?;
    Ok(attachment(
        DOCX_CONTENT_TYPE,
        format!("test_{}.docx", id),
        document,
    ))
}

#[utoipa::path(
    get,
    path = "/api/assessments/{assessment_id}/correct-answers",
    params(
        ("assessment_id" = String, Path, description = "Five digit assessment id")
    ),
    responses(
        (status = 200, description = "Correct letter and points per position"),
        (status = 404, description = "Assessment not found")
    )
)]
#[axum::debug_handler]
pub async fn correct_answers(
    State(state): State<AppState>,
    Path(assessment_id): Path<String>,
) -> Result<impl IntoResponse> {
    let key = state.test_service.answer_key(&assessment_id).await?;
    Ok(Json(key))
}

#[utoipa::path(
    get,
    path = "/api/groups/{group_id}",
    params(
        ("group_id" = String, Path, description = "Group id shared by the variants")
    ),
    responses(
        (status = 200, description = "Tests of the group", body = Json<GroupResponse>),
        (status = 404, description = "Group not found")
    )
)]
#[axum::debug_handler]
pub async fn get_group(
    State(state): State<AppState>,
    Path(group_id): Path<String>,
) -> Result<impl IntoResponse> {
    let tests = state.test_service.list_group(&group_id).await?;
    Ok(Json(GroupResponse {
        group_id,
        tests: tests.into_iter().map(Into::into).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/groups/{group_id}/correct-answers",
    params(
        ("group_id" = String, Path, description = "Group id shared by the variants")
    ),
    responses(
        (status = 200, description = "Answer key of every variant", body = Json<GroupAnswerKeysResponse>),
        (status = 404, description = "Group not found")
    )
)]
#[axum::debug_handler]
pub async fn group_correct_answers(
    State(state): State<AppState>,
    Path(group_id): Path<String>,
) -> Result<impl IntoResponse> {
    let variants = state.test_service.group_answer_keys(&group_id).await?;
    Ok(Json(GroupAnswerKeysResponse { group_id, variants }))
}

#[utoipa::path(
    get,
    path = "/api/groups/{group_id}/archive",
    params(
        ("group_id" = String, Path, description = "Group id shared by the variants")
    ),
    responses(
        (status = 200, description = "Zip with one document per variant"),
        (status = 404, description = "No documents for this group")
    )
)]
pub async fn download_group_archive(
    State(state): State<AppState>,
    Path(group_id): Path<String>,
) -> Result<impl IntoResponse> {
    let archive = state.test_service.group_archive(&group_id).await?;
    Ok(attachment(
        ZIP_CONTENT_TYPE,
        format!("group_{}.zip", group_id),
        archive,
    ))
}
