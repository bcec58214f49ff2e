use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::dto::test_dto::{AssessmentDocument, StartContestPayload, StartContestResponse};
use crate::error::{Error, Result};
use crate::models::student::StudentStats;
use crate::models::test::{Assessment, ContestList, TestDetail, TestType};
use crate::services::api_client::ApiClient;
use crate::services::cache_service::FetchCache;
use crate::services::listing_service::{
    build_cards, compute_stats, staff_dashboard_page, DashboardStats, Page, StatusFilter, TestCard,
};
use crate::services::sync_service::{ChangeFeed, PortalEvent};
use crate::services::wizard_service::{AssessmentWizard, WizardMode};
use crate::storage::SessionCache;
use crate::utils::token::generate_contest_id;

const CODING_KEY: &str = "tests:coding";
const MCQ_KEY: &str = "tests:mcq";

#[derive(Debug, Clone, Serialize)]
pub struct StaffDashboard {
    pub stats: DashboardStats,
    pub page: Page<TestCard>,
}

/// Staff-side test management.
///
/// Lists are cached for the configured TTL; every successful write drops
/// the cached lists and announces [`PortalEvent::TestsChanged`].
#[derive(Clone)]
pub struct TestService {
    api: ApiClient,
    session: SessionCache,
    feed: ChangeFeed,
    lists: FetchCache<Arc<Vec<Assessment>>>,
}

impl TestService {
    pub fn new(api: ApiClient, session: SessionCache, feed: ChangeFeed, ttl: Duration) -> Self {
        Self {
            api,
            session,
            feed,
            lists: FetchCache::new(ttl),
        }
    }

    async fn fetch_list(&self, path: &'static str, test_type: TestType) -> Result<Vec<Assessment>> {
        let list: ContestList = self.api.get(path, "Failed to fetch tests").await?;
        // Newest first.
        Ok(list
            .contests
            .into_iter()
            .rev()
            .map(|mut t| {
                t.test_type = test_type;
                t
            })
            .collect())
    }

    pub async fn coding_tests(&self) -> Result<Arc<Vec<Assessment>>> {
        self.lists
            .get_or_fetch(CODING_KEY, async {
                self.fetch_list("/contests", TestType::Coding).await.map(Arc::new)
            })
            .await
    }

    pub async fn mcq_tests(&self) -> Result<Arc<Vec<Assessment>>> {
        self.lists
            .get_or_fetch(MCQ_KEY, async {
                self.fetch_list("/mcq", TestType::Mcq).await.map(Arc::new)
            })
            .await
    }

    /// Coding and MCQ tests in one list, coding first.
    pub async fn all_tests(&self) -> Result<Vec<Assessment>> {
        let (coding, mcq) = tokio::try_join!(self.coding_tests(), self.mcq_tests())?;
        Ok(coding.iter().chain(mcq.iter()).cloned().collect())
    }

    /// A failed stats call shows zero students rather than failing the page.
    pub async fn student_count(&self) -> u32 {
        match self
            .api
            .get::<StudentStats>("/students/stats", "Failed to fetch student stats")
            .await
        {
            Ok(stats) => stats.total_students.unwrap_or(0),
            Err(e) => {
                warn!(error = %e, "student stats unavailable");
                0
            }
        }
    }

    pub async fn dashboard(
        &self,
        filter: StatusFilter,
        query: &str,
        page: usize,
        now: DateTime<Utc>,
    ) -> Result<StaffDashboard> {
        let tests = self.all_tests().await?;
        let cards = build_cards(&tests, now);
        let total_students = self.student_count().await;
        Ok(StaffDashboard {
            stats: compute_stats(&cards, total_students),
            page: staff_dashboard_page(&cards, filter, query, page),
        })
    }

    async fn detail_json(&self, test_id: &str) -> Result<JsonValue> {
        self.api
            .get(&format!("/api/contests/{}/", test_id), "Failed to fetch test details")
            .await
    }

    pub async fn get_detail(&self, test_id: &str) -> Result<TestDetail> {
        let body = self.detail_json(test_id).await?;
        let detail: TestDetail = serde_json::from_value(body)?;
        if let Some(config) = &detail.assessment.test_configuration {
            self.session.set_test_flags(test_id, &config.into()).await?;
        }
        Ok(detail)
    }

    /// Loads an existing test into an edit form.
    pub async fn open_editor(&self, test_id: &str) -> Result<AssessmentWizard> {
        let body = self.detail_json(test_id).await?;
        let doc: AssessmentDocument = serde_json::from_value(body)?;
        let overview = doc
            .assessment_overview
            .ok_or_else(|| Error::NotFound("Assessment overview missing".into()))?;
        Ok(AssessmentWizard::edit(
            test_id,
            overview,
            doc.test_configuration.unwrap_or_default(),
        ))
    }

    /// Validates the whole form, saves it under a fresh contest id and starts
    /// the contest. The contest token is stored only after both calls succeed.
    pub async fn create(&self, wizard: &mut AssessmentWizard, now: DateTime<Utc>) -> Result<String> {
        wizard.validate_all(now)?;
        let contest_id = generate_contest_id();

        self.api
            .request(reqwest::Method::POST, "/api/mcq/save-data/")?
            .json(&wizard.save_payload(contest_id.clone()))
            .send_empty("Failed to save assessment")
            .await?;
        let started: StartContestResponse = self
            .api
            .post(
                "/api/mcq/start-contest/",
                &StartContestPayload {
                    contest_id: contest_id.clone(),
                },
                "Failed to start contest",
            )
            .await?;

        self.session.set_contest_token(&started.token).await?;
        wizard.mark_submitted();
        info!(%contest_id, "assessment created");
        self.after_write(Some(contest_id.clone())).await;
        Ok(contest_id)
    }

    /// Sends the edit form. Returns `false` without a request when nothing
    /// changed since it was loaded.
    pub async fn update(&self, wizard: &mut AssessmentWizard, now: DateTime<Utc>) -> Result<bool> {
        let test_id = match wizard.mode() {
            WizardMode::Edit { test_id } => test_id.clone(),
            _ => return Err(Error::BadRequest("Only existing tests can be updated.".into())),
        };
        if !wizard.has_changed() {
            return Ok(false);
        }
        wizard.validate_all(now)?;

        let result = self
            .api
            .request(reqwest::Method::PUT, &format!("/api/mcq/update-assessment/{}/", test_id))?
            .json(&wizard.update_payload())
            .send_empty("Failed to update test.")
            .await;
        if let Err(e) = result {
            if e.requires_login() {
                self.feed.publish(PortalEvent::SessionExpired);
            }
            return Err(e);
        }

        wizard.mark_submitted();
        self.session
            .set_test_flags(&test_id, &wizard.configuration().into())
            .await?;
        info!(%test_id, "assessment updated");
        self.after_write(Some(test_id)).await;
        Ok(true)
    }

    pub async fn close(&self, test_id: &str) -> Result<()> {
        self.write(
            reqwest::Method::POST,
            format!("/api/mcq/close-session/{}/", test_id),
            "Failed to close the test.",
            test_id,
        )
        .await
    }

    pub async fn publish_results(&self, test_id: &str) -> Result<()> {
        self.write(
            reqwest::Method::POST,
            format!("/api/mcq/publish-result/{}/", test_id),
            "Failed to publish results.",
            test_id,
        )
        .await
    }

    pub async fn delete(&self, test_id: &str) -> Result<()> {
        self.write(
            reqwest::Method::DELETE,
            format!("/api/mcq/delete-contest/{}/", test_id),
            "Failed to delete the test.",
            test_id,
        )
        .await?;
        self.session
            .store()
            .remove(&crate::storage::session::test_flags_key(test_id))
            .await?;
        Ok(())
    }

    async fn write(
        &self,
        method: reqwest::Method,
        path: String,
        fallback: &str,
        test_id: &str,
    ) -> Result<()> {
        self.api.request(method, &path)?.send_empty(fallback).await?;
        info!(%test_id, %path, "test updated on server");
        self.after_write(Some(test_id.to_string())).await;
        Ok(())
    }

    async fn after_write(&self, test_id: Option<String>) {
        self.lists.invalidate(CODING_KEY).await;
        self.lists.invalidate(MCQ_KEY).await;
        self.feed.publish(PortalEvent::TestsChanged { test_id });
    }
}
