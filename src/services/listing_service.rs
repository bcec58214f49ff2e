use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::str::FromStr;

use crate::models::question::{BloomLevel, Difficulty, Question};
use crate::models::student::{RosterResponse, Student};
use crate::models::test::{Assessment, TestStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Live,
    Completed,
    Upcoming,
    Closed,
}

impl StatusFilter {
    /// `Completed` also lists closed tests; `Closed` lists only those.
    pub fn matches(&self, status: TestStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Live => status == TestStatus::Live,
            StatusFilter::Upcoming => status == TestStatus::Upcoming,
            StatusFilter::Completed => {
                matches!(status, TestStatus::Completed | TestStatus::Closed)
            }
            StatusFilter::Closed => status == TestStatus::Closed,
        }
    }
}

impl FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "all" => Ok(StatusFilter::All),
            "live" => Ok(StatusFilter::Live),
            "completed" => Ok(StatusFilter::Completed),
            "upcoming" => Ok(StatusFilter::Upcoming),
            "closed" => Ok(StatusFilter::Closed),
            other => Err(format!("Unknown status filter: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListView {
    StaffDashboard,
    StudentDashboard,
    Roster,
}

pub fn page_size_for(view: ListView, filter: StatusFilter) -> usize {
    match (view, filter) {
        (ListView::StaffDashboard, StatusFilter::All) => 8,
        (ListView::StaffDashboard, _) => 9,
        (ListView::StudentDashboard, _) => 9,
        (ListView::Roster, _) => 6,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
    pub total_pages: usize,
}

pub fn total_pages(total: usize, per_page: usize) -> usize {
    if per_page == 0 {
        return 0;
    }
    (total + per_page - 1) / per_page
}

/// Slices one 1-based page out of `items`. Pages past the end are empty.
pub fn paginate<T: Clone>(items: &[T], page: usize, per_page: usize) -> Page<T> {
    let page = page.max(1);
    let per_page = per_page.max(1);
    let start = (page - 1).saturating_mul(per_page);
    let slice = if start >= items.len() {
        &[][..]
    } else {
        &items[start..(start + per_page).min(items.len())]
    };
    Page {
        items: slice.to_vec(),
        total: items.len(),
        page,
        per_page,
        total_pages: total_pages(items.len(), per_page),
    }
}

/// Case-insensitive substring match against any of `fields`. An empty
/// query matches everything.
pub fn matches_query<'a>(fields: impl IntoIterator<Item = &'a str>, query: &str) -> bool {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return true;
    }
    fields
        .into_iter()
        .any(|field| field.to_lowercase().contains(&query))
}

/// Names starting with the query first, then the rest, each group
/// alphabetical.
pub fn rank_by_prefix<T, F>(items: &mut [T], query: &str, name: F)
where
    F: Fn(&T) -> &str,
{
    let query = query.trim().to_lowercase();
    items.sort_by(|a, b| {
        let (an, bn) = (name(a).to_lowercase(), name(b).to_lowercase());
        let (ap, bp) = (an.starts_with(&query), bn.starts_with(&query));
        bp.cmp(&ap).then_with(|| an.cmp(&bn))
    });
}

/// A test together with the status it shows at evaluation time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestCard {
    #[serde(flatten)]
    pub assessment: Assessment,
    #[serde(rename = "displayStatus")]
    pub status: TestStatus,
}

/// Dashboard cards also treat a server status of `Completed` as final,
/// even while the window is still open.
pub fn build_cards(tests: &[Assessment], now: DateTime<Utc>) -> Vec<TestCard> {
    tests
        .iter()
        .map(|t| TestCard {
            assessment: t.clone(),
            status: t.dashboard_status_at(now),
        })
        .collect()
}

pub fn filter_cards(cards: &[TestCard], filter: StatusFilter, query: &str) -> Vec<TestCard> {
    cards
        .iter()
        .filter(|c| filter.matches(c.status))
        .filter(|c| matches_query([c.assessment.name.as_str()], query))
        .cloned()
        .collect()
}

/// Staff dashboard page: status filter, name search, then the view's page size.
pub fn staff_dashboard_page(
    cards: &[TestCard],
    filter: StatusFilter,
    query: &str,
    page: usize,
) -> Page<TestCard> {
    let filtered = filter_cards(cards, filter, query);
    paginate(&filtered, page, page_size_for(ListView::StaffDashboard, filter))
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub total_tests: usize,
    pub total_students: u32,
    pub live: usize,
    pub completed: usize,
    pub upcoming: usize,
}

pub fn compute_stats(cards: &[TestCard], total_students: u32) -> DashboardStats {
    let count = |f: StatusFilter| cards.iter().filter(|c| f.matches(c.status)).count();
    DashboardStats {
        total_tests: cards.len(),
        total_students,
        live: count(StatusFilter::Live),
        completed: count(StatusFilter::Completed),
        upcoming: count(StatusFilter::Upcoming),
    }
}

// Roster

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortKey {
    Name,
    Regno,
    Dept,
    College,
    Year,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SortState {
    pub key: Option<SortKey>,
    pub direction: SortDirection,
}

impl SortState {
    /// Clicking the column already sorted ascending flips it; any other
    /// click sorts ascending by that column.
    pub fn toggle(&mut self, key: SortKey) {
        let flip = self.key == Some(key) && self.direction == SortDirection::Ascending;
        self.key = Some(key);
        self.direction = if flip {
            SortDirection::Descending
        } else {
            SortDirection::Ascending
        };
    }
}

/// What the signed-in staff member may see when no explicit filter is set.
/// An empty department list leaves the roster unscoped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaffScope {
    pub role: String,
    pub departments: Vec<String>,
}

impl StaffScope {
    pub fn is_admin(&self) -> bool {
        self.role.eq_ignore_ascii_case("admin")
    }

    fn sees_all_departments(&self) -> bool {
        self.is_admin() || self.role.eq_ignore_ascii_case("principal")
    }
}

impl From<&RosterResponse> for StaffScope {
    fn from(r: &RosterResponse) -> Self {
        Self {
            role: r.staff_role.clone().unwrap_or_default(),
            departments: r.staff_department.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RosterFilter {
    pub departments: Vec<String>,
    /// Only honoured for admins.
    pub colleges: Vec<String>,
    pub years: Vec<String>,
    pub query: String,
}

fn eq_ci(value: Option<&str>, wanted: &str) -> bool {
    value.map_or(false, |v| v.trim().eq_ignore_ascii_case(wanted.trim()))
}

pub fn filter_roster(students: &[Student], scope: &StaffScope, filter: &RosterFilter) -> Vec<Student> {
    students
        .iter()
        .filter(|s| {
            let dept = s.dept.as_deref();
            if !filter.departments.is_empty() {
                filter.departments.iter().any(|d| eq_ci(dept, d))
            } else if scope.sees_all_departments() || scope.departments.is_empty() {
                true
            } else {
                scope.departments.iter().any(|d| eq_ci(dept, d))
            }
        })
        .filter(|s| {
            !scope.is_admin()
                || filter.colleges.is_empty()
                || filter.colleges.iter().any(|c| eq_ci(s.college.as_deref(), c))
        })
        .filter(|s| {
            filter.years.is_empty()
                || filter.years.iter().any(|y| eq_ci(s.year.as_deref(), y))
        })
        .filter(|s| matches_query([s.name.as_str(), s.regno.as_str()], &filter.query))
        .cloned()
        .collect()
}

fn sort_field(student: &Student, key: SortKey) -> Option<String> {
    let value = match key {
        SortKey::Name => Some(student.name.as_str()),
        SortKey::Regno => Some(student.regno.as_str()),
        SortKey::Dept => student.dept.as_deref(),
        SortKey::College => student.college.as_deref(),
        SortKey::Year => student.year.as_deref(),
    }?;
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_lowercase())
}

/// Column sort with missing values last in either direction. With a search
/// query and no column picked, prefix matches on the name come first.
pub fn sort_roster(students: &mut [Student], sort: SortState, query: &str) {
    let Some(key) = sort.key else {
        if !query.trim().is_empty() {
            rank_by_prefix(students, query, |s| s.name.as_str());
        }
        return;
    };
    students.sort_by(|a, b| match (sort_field(a, key), sort_field(b, key)) {
        (Some(x), Some(y)) => match sort.direction {
            SortDirection::Ascending => x.cmp(&y),
            SortDirection::Descending => y.cmp(&x),
        },
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

pub fn roster_page(
    response: &RosterResponse,
    filter: &RosterFilter,
    sort: SortState,
    page: usize,
) -> Page<Student> {
    let scope = StaffScope::from(response);
    let mut students = filter_roster(&response.students, &scope, filter);
    sort_roster(&mut students, sort, &filter.query);
    paginate(&students, page, page_size_for(ListView::Roster, StatusFilter::All))
}

// Question library

/// Tag shown for questions saved without any.
pub const NO_TAGS: &str = "No tags";

/// Gives untagged questions the [`NO_TAGS`] tag so they stay filterable.
pub fn normalize_library(questions: Vec<Question>) -> Vec<Question> {
    questions
        .into_iter()
        .map(|mut q| {
            if q.tags.is_empty() {
                q.tags.push(NO_TAGS.to_string());
            }
            q
        })
        .collect()
}

/// Multi-select filter over the question bank. Every empty list matches
/// everything; tags match when the question carries any selected tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionBankFilter {
    pub query: String,
    pub levels: Vec<Difficulty>,
    pub tags: Vec<String>,
    pub blooms: Vec<BloomLevel>,
}

impl QuestionBankFilter {
    pub fn matches(&self, question: &Question) -> bool {
        let text = std::iter::once(question.question.as_str())
            .chain(question.options.iter().map(String::as_str));
        matches_query(text, &self.query)
            && (self.levels.is_empty() || self.levels.contains(&question.difficulty))
            && (self.tags.is_empty() || self.tags.iter().any(|t| question.tags.contains(t)))
            && (self.blooms.is_empty() || self.blooms.contains(&question.blooms))
    }

    pub fn apply(&self, questions: &[Question]) -> Vec<Question> {
        questions.iter().filter(|q| self.matches(q)).cloned().collect()
    }
}

/// Tags offered by the filter sidebar, in first-seen order.
pub fn available_tags(questions: &[Question]) -> Vec<String> {
    let mut seen = HashSet::new();
    questions
        .iter()
        .flat_map(|q| q.tags.iter())
        .filter(|t| seen.insert(t.as_str()))
        .cloned()
        .collect()
}

pub fn available_blooms(questions: &[Question]) -> Vec<BloomLevel> {
    let mut levels: Vec<BloomLevel> = questions.iter().map(|q| q.blooms).collect();
    levels.sort();
    levels.dedup();
    levels
}

// Student dashboard

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentTestEntry {
    #[serde(flatten)]
    pub card: TestCard,
    pub published: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StudentDashboard {
    pub ongoing: Vec<TestCard>,
    pub completed: Vec<StudentTestEntry>,
}

/// A test is done for the student once they have a completed report for
/// it, its window has ended, or it was closed.
pub fn is_completed_for_student(test: &Assessment, completed_ids: &HashSet<String>, now: DateTime<Utc>) -> bool {
    let reported = completed_ids.contains(&test.id)
        || test
            .object_id
            .as_ref()
            .map_or(false, |id| completed_ids.contains(id));
    reported || test.end_date.map_or(false, |end| now > end) || test.is_closed()
}

pub fn partition_student_tests(
    tests: &[Assessment],
    completed_ids: &HashSet<String>,
    now: DateTime<Utc>,
) -> StudentDashboard {
    let mut dashboard = StudentDashboard::default();
    for test in tests {
        let card = TestCard {
            assessment: test.clone(),
            status: test.status_at(now),
        };
        if is_completed_for_student(test, completed_ids, now) {
            dashboard.completed.push(StudentTestEntry {
                card,
                published: false,
            });
        } else {
            dashboard.ongoing.push(card);
        }
    }
    dashboard
}
