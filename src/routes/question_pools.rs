use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use validator::Validate;

use crate::{
    dto::question_dto::{
        BulkCreateQuestionsPayload, BulkQuestionsResponse, CreateQuestionPoolPayload,
        QuestionPoolListQuery, QuestionPoolResponse, QuestionResponse, UpdateQuestionPoolPayload,
    },
    error::Result,
    AppState,
};

#[utoipa::path(
    post,
    path = "/api/question-pools",
    request_body = CreateQuestionPoolPayload,
    responses(
        (status = 201, description = "Question pool created", body = Json<QuestionPoolResponse>),
        (status = 400, description = "Invalid payload"),
        (status = 404, description = "Subject not found")
    )
)]
#[axum::debug_handler]
pub async fn create_question_pool(
    State(state): State<AppState>,
    Json(payload): Json<CreateQuestionPoolPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let created = state.question_pool_service.create(payload).await?;
    Ok((StatusCode::CREATED, Json(QuestionPoolResponse::from(created))))
}

#[utoipa::path(
    get,
    path = "/api/question-pools",
    params(
        ("subject" = Option<i64>, Query, description = "Filter by subject"),
        ("instructor_id" = Option<i64>, Query, description = "Filter by instructor")
    ),
    responses(
        (status = 200, description = "List of question pools", body = Json<Vec<QuestionPoolResponse>>)
    )
)]
#[axum::debug_handler]
pub async fn list_question_pools(
    State(state): State<AppState>,
    Query(query): Query<QuestionPoolListQuery>,
) -> Result<impl IntoResponse> {
    let pools = state.question_pool_service.list(query).await?;
    let items: Vec<QuestionPoolResponse> = pools.into_iter().map(Into::into).collect();
    Ok(Json(items))
}

#[utoipa::path(
    get,
    path = "/api/question-pools/{id}",
    params(
        ("id" = i64, Path, description = "Question pool ID")
    ),
    responses(
        (status = 200, description = "Question pool found", body = Json<QuestionPoolResponse>),
        (status = 404, description = "Question pool not found")
    )
)]
#[axum::debug_handler]
pub async fn get_question_pool(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let pool = state.question_pool_service.get_by_id(id).await?;
    Ok(Json(QuestionPoolResponse::from(pool)))
}

#[utoipa::path(
    patch,
    path = "/api/question-pools/{id}",
    params(
        ("id" = i64, Path, description = "Question pool ID")
    ),
    request_body = UpdateQuestionPoolPayload,
    responses(
        (status = 200, description = "Question pool updated", body = Json<QuestionPoolResponse>),
        (status = 404, description = "Question pool not found")
    )
)]
#[axum::debug_handler]
pub async fn update_question_pool(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateQuestionPoolPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let pool = state.question_pool_service.update(id, payload).await?;
    Ok(Json(QuestionPoolResponse::from(pool)))
}

#[utoipa::path(
    delete,
    path = "/api/question-pools/{id}",
    params(
        ("id" = i64, Path, description = "Question pool ID")
    ),
    responses(
        (status = 204, description = "Question pool deleted"),
        (status = 404, description = "Question pool not found")
    )
)]
#[axum::debug_handler]
pub async fn delete_question_pool(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    state.question_pool_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/question-pools/{id}/questions",
    params(
        ("id" = i64, Path, description = "Question pool ID")
    ),
    responses(
        (status = 200, description = "Questions of the pool", body = Json<Vec<QuestionResponse>>),
        (status = 404, description = "Question pool not found")
    )
)]
#[axum::debug_handler]
pub async fn list_pool_questions(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let questions = state.question_service.list_for_pool(id).await?;
    let items: Vec<QuestionResponse> = questions.into_iter().map(Into::into).collect();
    Ok(Json(items))
}

#[utoipa::path(
    post,
    path = "/api/question-pools/{id}/questions",
    params(
        ("id" = i64, Path, description = "Question pool ID")
    ),
    request_body = BulkCreateQuestionsPayload,
    responses(
        (status = 201, description = "Questions created", body = Json<BulkQuestionsResponse>),
        (status = 400, description = "Invalid payload"),
        (status = 404, description = "Question pool not found")
    )
)]
#[axum::debug_handler]
pub async fn bulk_create_questions(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<BulkCreateQuestionsPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let created = state
        .question_service
        .bulk_create(id, &payload.questions)
        .await?;
    let response = BulkQuestionsResponse {
        questions: created.into_iter().map(Into::into).collect(),
    };
    Ok((StatusCode::CREATED, Json(response)))
}
