pub mod answer_key;
pub mod export_service;
pub mod generation;
pub mod question_pool_service;
pub mod question_service;
pub mod subject_service;
pub mod test_service;
