pub mod config;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod services;
pub mod storage;
pub mod utils;

use crate::config::Config;
use crate::error::Result;
use crate::services::{
    api_client::ApiClient, auth_service::AuthService, profile_service::HttpProfileSource,
    profile_service::ProfileService, question_service::QuestionService,
    result_service::ResultService, status_service::StatusTicker, student_service::StudentService,
    sync_service::ChangeFeed, test_service::TestService,
};
use crate::storage::{LocalStore, SessionCache};
use std::sync::Arc;

/// Everything a front end needs, wired to one HTTP client, one store and
/// one change feed.
#[derive(Clone)]
pub struct Portal {
    pub config: Config,
    pub api: ApiClient,
    pub feed: ChangeFeed,
    pub session: SessionCache,
    pub auth_service: AuthService,
    pub test_service: TestService,
    pub question_service: QuestionService,
    pub student_service: StudentService,
    pub profile_service: ProfileService,
    pub result_service: ResultService,
    pub status_ticker: StatusTicker,
}

impl Portal {
    /// Opens the store at `config.store_path` (in memory when empty).
    pub async fn new(config: Config) -> Result<Self> {
        let feed = ChangeFeed::default();
        let store = LocalStore::open(&config.store_path, feed.clone()).await?;
        let api = ApiClient::new(&config)?;
        Ok(Self::with_parts(config, api, store, feed))
    }

    pub fn with_parts(config: Config, api: ApiClient, store: LocalStore, feed: ChangeFeed) -> Self {
        let session = SessionCache::new(store);

        let auth_service = AuthService::new(api.clone(), session.clone(), feed.clone());
        let test_service = TestService::new(api.clone(), session.clone(), feed.clone(), config.cache_ttl);
        let question_service = QuestionService::new(api.clone(), session.clone());
        let student_service = StudentService::new(api.clone(), session.clone(), feed.clone());
        let profile_service = ProfileService::new(
            Arc::new(HttpProfileSource::new(api.clone())),
            session.clone(),
            feed.clone(),
            config.cache_ttl,
            config.api_base_url.clone(),
        );
        let result_service = ResultService::new(api.clone());
        let status_ticker = StatusTicker::new(feed.clone(), config.status_poll_interval);

        Self {
            config,
            api,
            feed,
            session,
            auth_service,
            test_service,
            question_service,
            student_service,
            profile_service,
            result_service,
            status_ticker,
        }
    }
}
