use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use validator::Validate;

use crate::{
    dto::subject_dto::{
        CreateSubjectPayload, SubjectListQuery, SubjectResponse, UpdateSubjectPayload,
    },
    error::Result,
    AppState,
};

#[utoipa::path(
    post,
    path = "/api/subjects",
    request_body = CreateSubjectPayload,
    responses(
        (status = 201, description = "Subject created", body = Json<SubjectResponse>),
        (status = 400, description = "Invalid payload")
    )
)]
#[axum::debug_handler]
pub async fn create_subject(
    State(state): State<AppState>,
    Json(payload): Json<CreateSubjectPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let subject = state.subject_service.create(payload).await?;
    Ok((StatusCode::CREATED, Json(SubjectResponse::from(subject))))
}

#[utoipa::path(
    get,
    path = "/api/subjects",
    params(
        ("institution_id" = Option<i64>, Query, description = "Filter by institution")
    ),
    responses(
        (status = 200, description = "List of subjects", body = Json<Vec<SubjectResponse>>)
    )
)]
#[axum::debug_handler]
pub async fn list_subjects(
    State(state): State<AppState>,
    Query(query): Query<SubjectListQuery>,
) -> Result<impl IntoResponse> {
    let subjects = state.subject_service.list(query).await?;
    let items: Vec<SubjectResponse> = subjects.into_iter().map(Into::into).collect();
    Ok(Json(items))
}

#[utoipa::path(
    get,
    path = "/api/subjects/{id}",
    params(
        ("id" = i64, Path, description = "Subject ID")
    ),
    responses(
        (status = 200, description = "Subject found", body = Json<SubjectResponse>),
        (status = 404, description = "Subject not found")
    )
)]
#[axum::debug_handler]
pub async fn get_subject(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let subject = state.subject_service.get_by_id(id).await?;
    Ok(Json(SubjectResponse::from(subject)))
}

#[utoipa::path(
    patch,
    path = "/api/subjects/{id}",
    params(
        ("id" = i64, Path, description = "Subject ID")
    ),
    request_body = UpdateSubjectPayload,
    responses(
        (status = 200, description = "Subject updated", body = Json<SubjectResponse>),
        (status = 400, description = "Invalid payload"),
        (status = 404, description = "Subject not found")
    )
)]
#[axum::debug_handler]
pub async fn update_subject(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateSubjectPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let subject = state.subject_service.update(id, payload).await?;
    Ok(Json(SubjectResponse::from(subject)))
}

#[utoipa::path(
    delete,
    path = "/api/subjects/{id}",
    params(
        ("id" = i64, Path, description = "Subject ID")
    ),
    responses(
        (status = 204, description = "Subject deleted"),
        (status = 404, description = "Subject not found")
    )
)]
#[axum::debug_handler]
pub async fn delete_subject(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    state.subject_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
