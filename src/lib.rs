pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use crate::services::{
    question_pool_service::QuestionPoolService, question_service::QuestionService,
    subject_service::SubjectService, test_service::TestService,
};
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub subject_service: SubjectService,
    pub question_pool_service: QuestionPoolService,
    pub question_service: QuestionService,
    pub test_service: TestService,
}

impl AppState {
    pub fn new(pool: PgPool) -> Self {
        let subject_service = SubjectService::new(pool.clone());
        let question_pool_service = QuestionPoolService::new(pool.clone());
        let question_service = QuestionService::new(pool.clone());
        let test_service = TestService::new(pool.clone());

        Self {
            pool,
            subject_service,
            question_pool_service,
            question_service,
            test_service,
        }
    }
}
