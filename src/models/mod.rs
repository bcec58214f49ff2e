pub mod profile;
pub mod question;
pub mod report;
pub mod student;
