pub mod assessments;
pub mod health;
pub mod question_pools;
pub mod questions;
pub mod subjects;

use axum::{
    routing::{get, post},
    Router,
};

use crate::middleware::rate_limit::{new_rps_state, rps_middleware};
use crate::AppState;

/// Every `/api` route behind a shared requests-per-second budget.
pub fn api_router(rps: u32) -> Router<AppState> {
    Router::new()
        .route(
            "/api/subjects",
            get(subjects::list_subjects).post(subjects::create_subject),
        )
        .route(
            "/api/subjects/:id",
            get(subjects::get_subject)
                .patch(subjects::update_subject)
                .delete(subjects::delete_subject),
        )
        .route(
            "/api/question-pools",
            get(question_pools::list_question_pools).post(question_pools::create_question_pool),
        )
        .route(
            "/api/question-pools/:id",
            get(question_pools::get_question_pool)
                .patch(question_pools::update_question_pool)
                .delete(question_pools::delete_question_pool),
        )
        .route(
            "/api/question-pools/:id/questions",
            get(question_pools::list_pool_questions).post(question_pools::bulk_create_questions),
        )
        .route("/api/questions", post(questions::create_question))
        .route(
            "/api/questions/:id",
            get(questions::get_question).delete(questions::delete_question),
        )
        .route("/api/generate-test", post(assessments::generate_test))
        .route("/api/tests", get(assessments::list_tests))
        .route(
            "/api/tests/:id",
            get(assessments::get_test).delete(assessments::delete_test),
        )
        .route(
            "/api/tests/:id/regenerate",
            post(assessments::regenerate_test_document),
        )
        .route(
            "/api/tests/:id/document",
            get(assessments::download_test_document),
        )
        .route(
            "/api/assessments/:assessment_id/correct-answers",
            get(assessments::correct_answers),
        )
        .route("/api/groups/:group_id", get(assessments::get_group))
        .route(
            "/api/groups/:group_id/correct-answers",
            get(assessments::group_correct_answers),
        )
        .route(
            "/api/groups/:group_id/archive",
            get(assessments::download_group_archive),
        )
        .layer(axum::middleware::from_fn_with_state(
            new_rps_state(rps),
            rps_middleware,
        ))
}

pub fn base_router() -> Router<AppState> {
    Router::new().route("/health", get(health::health))
}
