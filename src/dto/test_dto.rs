use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::test::{AssessmentOverview, TestConfiguration};

/// Body of `POST /api/mcq/save-data/`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveAssessmentPayload {
    pub contest_id: String,
    pub assessment_overview: AssessmentOverview,
    pub test_configuration: TestConfiguration,
}

/// Body of `PUT /api/mcq/update-assessment/{id}/`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAssessmentPayload {
    pub assessment_overview: AssessmentOverview,
    pub test_configuration: TestConfiguration,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartContestPayload {
    pub contest_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StartContestResponse {
    #[serde(alias = "contestToken")]
    pub token: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishStatusRequest {
    pub test_ids: Vec<String>,
}

/// `POST /api/student/check-publish-status/` answers with `{ testId: bool }`.
pub type PublishStatusResponse = HashMap<String, bool>;

/// The editable part of `GET /api/contests/{id}/`, as loaded into the edit form.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentDocument {
    #[serde(default)]
    pub assessment_overview: Option<AssessmentOverview>,
    #[serde(default)]
    pub test_configuration: Option<TestConfiguration>,
}
