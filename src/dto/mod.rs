pub mod question_dto;
pub mod subject_dto;
pub mod test_dto;
