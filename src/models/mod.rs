pub mod answer;
pub mod generated_test_link;
pub mod question;
pub mod question_pool;
pub mod subject;
pub mod test;
