use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use validator::Validate;

use crate::{
    dto::question_dto::{CreateQuestionPayload, QuestionResponse},
    error::Result,
    AppState,
};

#[utoipa::path(
    post,
    path = "/api/questions",
    request_body = CreateQuestionPayload,
    responses(
        (status = 201, description = "Question created with its answers", body = Json<QuestionResponse>),
        (status = 400, description = "Invalid payload"),
        (status = 404, description = "Question pool not found")
    )
)]
#[axum::debug_handler]
pub async fn create_question(
    State(state): State<AppState>,
    Json(payload): Json<CreateQuestionPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let created = state.question_service.create(payload).await?;
    Ok((StatusCode::CREATED, Json(QuestionResponse::from(created))))
}

#[utoipa::path(
    get,
    path = "/api/questions/{id}",
    params(
        ("id" = i64, Path, description = "Question ID")
    ),
    responses(
        (status = 200, description = "Question found", body = Json<QuestionResponse>),
        (status = 404, description = "Question not found")
    )
)]
#[axum::debug_handler]
pub async fn get_question(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let question = state.question_service.get_by_id(id).await?;
    Ok(Json(QuestionResponse::from(question)))
}

#[utoipa::path(
    delete,
    path = "/api/questions/{id}",
    params(
        ("id" = i64, Path, description = "Question ID")
    ),
    responses(
        (status = 204, description = "Question deleted"),
        (status = 404, description = "Question not found")
    )
)]
#[axum::debug_handler]
pub async fn delete_question(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    state.question_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
