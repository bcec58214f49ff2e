use serde::{Deserialize, Serialize};

use crate::models::test::DEFAULT_PASS_PERCENTAGE;
use crate::utils::flexible::{deserialize_bool_flexible, deserialize_opt_u32_flexible};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendedQuestion {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub user_answer: Option<String>,
    #[serde(default)]
    pub correct_answer: Option<String>,
    #[serde(default, deserialize_with = "deserialize_bool_flexible")]
    pub is_correct: bool,
}

impl AttendedQuestion {
    /// `null`, `""` and the `"notattended"` marker all mean no answer.
    pub fn is_answered(&self) -> bool {
        match self.user_answer.as_deref().map(str::trim) {
            None | Some("") => false,
            Some(answer) => !answer.eq_ignore_ascii_case("notattended"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionSummary {
    pub section_name: String,
    #[serde(default, deserialize_with = "crate::utils::flexible::deserialize_u32_flexible")]
    pub num_questions: u32,
}

/// Body of `GET /api/mcq/student-report/{contest}/{student}/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentReport {
    #[serde(default)]
    pub contest_id: Option<String>,
    #[serde(default)]
    pub contest_name: Option<String>,
    #[serde(default)]
    pub student_id: Option<String>,
    #[serde(default)]
    pub attended_questions: Vec<AttendedQuestion>,
    #[serde(default)]
    pub correct_answers: u32,
    #[serde(default)]
    pub total_questions: u32,
    #[serde(default, rename = "passPercentage", deserialize_with = "deserialize_opt_u32_flexible")]
    pub pass_percentage: Option<u32>,
    #[serde(default, rename = "percentageScored")]
    pub percentage_scored: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_bool_flexible")]
    pub is_section: bool,
    #[serde(default)]
    pub sections: Vec<SectionSummary>,
}

impl StudentReport {
    pub fn pass_threshold(&self) -> u32 {
        self.pass_percentage.filter(|p| *p > 0).unwrap_or(DEFAULT_PASS_PERCENTAGE)
    }
}

/// An entry from `/api/student/mcq-reports/` or `/coding-reports/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    #[serde(alias = "contestId")]
    pub contest_id: String,
    #[serde(default)]
    pub status: Option<String>,
}

impl ReportEntry {
    pub fn is_completed(&self) -> bool {
        self.status
            .as_deref()
            .map_or(false, |s| s.eq_ignore_ascii_case("completed"))
    }
}
