pub mod api_client;
pub mod auth_service;
pub mod cache_service;
pub mod export_service;
pub mod listing_service;
pub mod profile_service;
pub mod question_service;
pub mod result_service;
pub mod status_service;
pub mod student_service;
pub mod sync_service;
pub mod test_service;
pub mod wizard_service;
