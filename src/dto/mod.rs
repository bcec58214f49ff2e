pub mod auth_dto;
pub mod question_dto;
pub mod student_dto;
pub mod test_dto;
