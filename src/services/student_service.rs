use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::{info, warn};

use crate::dto::auth_dto::SetStudentPasswordPayload;
use crate::dto::student_dto::RegnoQuery;
use crate::dto::test_dto::{PublishStatusRequest, PublishStatusResponse};
use crate::error::Result;
use crate::models::profile::Role;
use crate::models::report::ReportEntry;
use crate::models::student::{RosterResponse, Student};
use crate::models::test::{Assessment, TestType};
use crate::services::api_client::ApiClient;
use crate::services::listing_service::{
    partition_student_tests, roster_page, Page, RosterFilter, SortState, StudentDashboard,
};
use crate::services::sync_service::{ChangeFeed, PortalEvent};
use crate::storage::SessionCache;
use crate::utils::validation::validate;

/// Roster for staff, tests and reports for students.
#[derive(Clone)]
pub struct StudentService {
    api: ApiClient,
    session: SessionCache,
    feed: ChangeFeed,
}

impl StudentService {
    pub fn new(api: ApiClient, session: SessionCache, feed: ChangeFeed) -> Self {
        Self { api, session, feed }
    }

    pub async fn roster(&self) -> Result<RosterResponse> {
        self.api
            .get("/studentprofile/", "Failed to fetch students")
            .await
    }

    pub async fn roster_view(
        &self,
        filter: &RosterFilter,
        sort: SortState,
        page: usize,
    ) -> Result<Page<Student>> {
        let response = self.roster().await?;
        Ok(roster_page(&response, filter, sort, page))
    }

    /// Coding tests open to the student, newest first.
    pub async fn coding_tests(&self, regno: &str) -> Result<Vec<Assessment>> {
        self.tests_for("/api/student/tests", regno, TestType::Coding).await
    }

    /// MCQ tests assigned to the student, newest first.
    pub async fn mcq_tests(&self, regno: &str) -> Result<Vec<Assessment>> {
        self.tests_for("/api/student/mcq-tests", regno, TestType::Mcq).await
    }

    async fn tests_for(&self, path: &str, regno: &str, test_type: TestType) -> Result<Vec<Assessment>> {
        let tests: Vec<Assessment> = self
            .api
            .request(reqwest::Method::GET, path)?
            .query(&RegnoQuery { regno })
            .send("Failed to fetch tests")
            .await?;

        let mut out = Vec::with_capacity(tests.len());
        for mut test in tests.into_iter().rev() {
            test.test_type = test_type;
            // MCQ screens address tests by their document id.
            if test_type == TestType::Mcq {
                if let Some(object_id) = test.object_id.clone() {
                    test.id = object_id;
                }
            }
            if let Some(config) = &test.test_configuration {
                self.session.set_test_flags(&test.id, &config.into()).await?;
            }
            out.push(test);
        }
        Ok(out)
    }

    /// Ids of the contests the student has a completed report for. A failed
    /// report list counts as no reports.
    pub async fn completed_contests(&self) -> HashSet<String> {
        let mut ids = HashSet::new();
        for (path, fallback) in [
            ("/api/student/coding-reports/", "Failed to fetch coding reports"),
            ("/api/student/mcq-reports/", "Failed to fetch MCQ reports"),
        ] {
            match self.api.get::<Vec<ReportEntry>>(path, fallback).await {
                Ok(entries) => ids.extend(
                    entries
                        .into_iter()
                        .filter(ReportEntry::is_completed)
                        .map(|e| e.contest_id),
                ),
                Err(e) => warn!(error = %e, %path, "reports unavailable"),
            }
        }
        ids
    }

    pub async fn publish_status(&self, test_ids: Vec<String>) -> Result<PublishStatusResponse> {
        if test_ids.is_empty() {
            return Ok(PublishStatusResponse::new());
        }
        self.api
            .post(
                "/api/student/check-publish-status/",
                &PublishStatusRequest { test_ids },
                "Failed to fetch publish status",
            )
            .await
    }

    /// Ongoing and completed tests for the student dashboard. Completed
    /// entries carry whether results were published.
    pub async fn dashboard(&self, regno: &str, now: DateTime<Utc>) -> Result<StudentDashboard> {
        let (coding, mcq, completed_ids) = tokio::join!(
            self.coding_tests(regno),
            self.mcq_tests(regno),
            self.completed_contests()
        );
        let tests: Vec<Assessment> = coding?.into_iter().chain(mcq?).collect();
        let mut dashboard = partition_student_tests(&tests, &completed_ids, now);

        let ids = dashboard
            .completed
            .iter()
            .map(|e| e.card.assessment.id.clone())
            .collect();
        let published = match self.publish_status(ids).await {
            Ok(map) => map,
            Err(e) => {
                warn!(error = %e, "publish status unavailable");
                PublishStatusResponse::new()
            }
        };
        for entry in &mut dashboard.completed {
            entry.published = published
                .get(&entry.card.assessment.id)
                .copied()
                .unwrap_or(false);
        }
        Ok(dashboard)
    }

    /// First-login password change. The cached profile is dropped so the
    /// next read sees the server's `setpassword` flag.
    pub async fn set_new_password(&self, email: &str, new_password: &str) -> Result<()> {
        let payload = SetStudentPasswordPayload {
            email: email.trim().to_string(),
            new_password: new_password.to_string(),
        };
        validate(&payload)?;
        self.api
            .request(reqwest::Method::POST, "/api/student/set_new_password/")?
            .json(&payload)
            .send_empty("Failed to update password.")
            .await?;
        self.session.invalidate_profile(Role::Student).await?;
        self.feed.publish(PortalEvent::ProfileUpdated { role: Role::Student });
        info!("student password updated");
        Ok(())
    }
}
