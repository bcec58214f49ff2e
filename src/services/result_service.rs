use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::Result;
use crate::models::report::{AttendedQuestion, StudentReport};
use crate::services::api_client::ApiClient;
use crate::services::listing_service::{paginate, Page};

/// Questions shown per page on the result screen.
pub const RESULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum QuestionFilter {
    #[default]
    All,
    Answered,
    NotAnswered,
    Correct,
    Incorrect,
}

impl QuestionFilter {
    /// Incorrect means answered and wrong; skipped questions are not counted.
    pub fn matches(&self, q: &AttendedQuestion) -> bool {
        match self {
            QuestionFilter::All => true,
            QuestionFilter::Answered => q.is_answered(),
            QuestionFilter::NotAnswered => !q.is_answered(),
            QuestionFilter::Correct => q.is_correct,
            QuestionFilter::Incorrect => q.is_answered() && !q.is_correct,
        }
    }
}

impl FromStr for QuestionFilter {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" | "" => Ok(QuestionFilter::All),
            "answered" => Ok(QuestionFilter::Answered),
            "not_answered" | "unanswered" => Ok(QuestionFilter::NotAnswered),
            "correct" => Ok(QuestionFilter::Correct),
            "incorrect" => Ok(QuestionFilter::Incorrect),
            other => Err(format!("Unknown question filter: {}", other)),
        }
    }
}

/// A question with the section it was asked in.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionedQuestion {
    #[serde(flatten)]
    pub question: AttendedQuestion,
    pub section_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSummary {
    pub total_questions: usize,
    pub answered: usize,
    pub not_answered: usize,
    pub correct: u32,
    pub percentage: f64,
    pub pass_percentage: u32,
    pub passed: bool,
}

pub fn score_percentage(correct: u32, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    f64::from(correct) * 100.0 / total as f64
}

pub fn summarize(report: &StudentReport) -> ResultSummary {
    let total = report.attended_questions.len();
    let answered = report
        .attended_questions
        .iter()
        .filter(|q| q.is_answered())
        .count();
    let percentage = report
        .percentage_scored
        .unwrap_or_else(|| score_percentage(report.correct_answers, total));
    let pass_percentage = report.pass_threshold();
    ResultSummary {
        total_questions: total,
        answered,
        not_answered: total - answered,
        correct: report.correct_answers,
        percentage,
        pass_percentage,
        passed: percentage >= f64::from(pass_percentage),
    }
}

/// Assigns questions to sections in order, `numQuestions` at a time.
/// Questions beyond the declared sections keep no section.
pub fn map_sections(report: &StudentReport) -> Vec<SectionedQuestion> {
    let total = report.attended_questions.len();
    let mut names = Vec::with_capacity(total);
    if report.is_section {
        for section in &report.sections {
            let room = total - names.len();
            if room == 0 {
                break;
            }
            let take = usize::try_from(section.num_questions).map_or(room, |n| n.min(room));
            names.extend(std::iter::repeat(section.section_name.clone()).take(take));
        }
    }
    report
        .attended_questions
        .iter()
        .enumerate()
        .map(|(i, q)| SectionedQuestion {
            question: q.clone(),
            section_name: names.get(i).cloned(),
        })
        .collect()
}

pub fn filter_questions(
    questions: &[SectionedQuestion],
    filter: QuestionFilter,
    section: Option<&str>,
) -> Vec<SectionedQuestion> {
    questions
        .iter()
        .filter(|q| section.map_or(true, |s| q.section_name.as_deref() == Some(s)))
        .filter(|q| filter.matches(&q.question))
        .cloned()
        .collect()
}

pub fn question_page(
    report: &StudentReport,
    filter: QuestionFilter,
    section: Option<&str>,
    page: usize,
) -> Page<SectionedQuestion> {
    let mapped = map_sections(report);
    let section = section.filter(|_| report.is_section);
    paginate(&filter_questions(&mapped, filter, section), page, RESULT_PAGE_SIZE)
}

#[derive(Clone)]
pub struct ResultService {
    api: ApiClient,
}

impl ResultService {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub async fn student_report(&self, contest_id: &str, student_id: &str) -> Result<StudentReport> {
        self.api
            .get(
                &format!("/api/mcq/student-report/{}/{}/", contest_id, student_id),
                "Failed to fetch the report",
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::report::SectionSummary;

    fn q(answer: Option<&str>, correct: bool) -> AttendedQuestion {
        AttendedQuestion {
            title: None,
            user_answer: answer.map(str::to_string),
            correct_answer: Some("A".into()),
            is_correct: correct,
        }
    }

    fn report() -> StudentReport {
        StudentReport {
            contest_id: Some("c1".into()),
            contest_name: None,
            student_id: Some("s1".into()),
            attended_questions: vec![
                q(Some("A"), true),
                q(Some("B"), false),
                q(Some("notattended"), false),
                q(Some(""), false),
                q(None, false),
            ],
            correct_answers: 1,
            total_questions: 5,
            pass_percentage: Some(0),
            percentage_scored: None,
            is_section: true,
            sections: vec![
                SectionSummary { section_name: "Aptitude".into(), num_questions: 2 },
                SectionSummary { section_name: "Verbal".into(), num_questions: 2 },
            ],
        }
    }

    #[test]
    fn summary_counts_skipped_markers_as_unanswered() {
        let s = summarize(&report());
        assert_eq!((s.answered, s.not_answered), (2, 3));
        assert_eq!(s.percentage, 20.0);
        assert_eq!(s.pass_percentage, 50);
        assert!(!s.passed);
    }

    #[test]
    fn incorrect_excludes_unanswered() {
        let mapped = map_sections(&report());
        let wrong = filter_questions(&mapped, QuestionFilter::Incorrect, None);
        assert_eq!(wrong.len(), 1);
        assert_eq!(wrong[0].question.user_answer.as_deref(), Some("B"));
    }

    #[test]
    fn sections_are_assigned_in_order() {
        let mapped = map_sections(&report());
        let names: Vec<_> = mapped.iter().map(|m| m.section_name.as_deref()).collect();
        assert_eq!(names, vec![Some("Aptitude"), Some("Aptitude"), Some("Verbal"), Some("Verbal"), None]);
        let verbal = filter_questions(&mapped, QuestionFilter::NotAnswered, Some("Verbal"));
        assert_eq!(verbal.len(), 2);
    }

    #[test]
    fn oversized_section_counts_stop_at_the_attended_questions() {
        let mut report = report();
        report.sections = vec![
            SectionSummary { section_name: "Aptitude".into(), num_questions: u32::MAX },
            SectionSummary { section_name: "Verbal".into(), num_questions: 3 },
        ];
        let mapped = map_sections(&report);
        assert_eq!(mapped.len(), 5);
        assert!(mapped.iter().all(|m| m.section_name.as_deref() == Some("Aptitude")));
    }
}
