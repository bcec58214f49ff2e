use assessment_portal::models::question::{BloomLevel, Difficulty, Question};
use assessment_portal::models::student::{RosterResponse, Student};
use assessment_portal::models::test::{Assessment, TestStatus};
use assessment_portal::services::listing_service::{
    available_blooms, available_tags, build_cards, compute_stats, filter_roster, normalize_library,
    roster_page, sort_roster, QuestionBankFilter, RosterFilter, SortDirection, SortKey, SortState,
    StaffScope, StatusFilter, NO_TAGS,
};
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};

fn roster(role: &str, departments: Value) -> RosterResponse {
    serde_json::from_value(json!({
        "students": [
            { "studentId": "1", "name": "Arun", "regno": "21CS001", "dept": "CSE", "collegename": "Anna", "year": "III" },
            { "studentId": "2", "name": "Banu", "regno": "21CS002", "dept": "cse", "collegename": "Anna", "year": "II" },
            { "studentId": "3", "name": "Chitra", "regno": "21AI001", "dept": "CSE-AI", "collegename": "Anna", "year": "III" },
            { "studentId": "4", "name": "Deepak", "regno": "21IT001", "dept": "IT", "collegename": "PSG", "year": 3 },
            { "studentId": "5", "name": "Esha", "regno": "21IT002", "dept": "IT", "collegename": "PSG" },
            { "studentId": "6", "name": "Farid", "regno": "21ME001", "collegename": "PSG", "year": "I" },
            { "studentId": "7", "name": "Gita", "regno": "21CS003", "dept": "CSE", "collegename": "PSG", "year": "III" },
            { "studentId": "8", "name": "Hari", "regno": "21EE001", "dept": "EEE", "collegename": "Anna", "year": "IV" }
        ],
        "staffRole": role,
        "staffDepartment": departments,
        "staffCollege": "Anna"
    }))
    .expect("roster body")
}

fn names(students: &[Student]) -> Vec<&str> {
    students.iter().map(|s| s.name.as_str()).collect()
}

fn scoped(response: &RosterResponse, filter: &RosterFilter) -> Vec<Student> {
    filter_roster(&response.students, &StaffScope::from(response), filter)
}

#[test]
fn staff_see_their_departments_by_exact_name() {
    let hod = roster("HOD", json!("CSE"));
    assert_eq!(names(&scoped(&hod, &RosterFilter::default())), vec!["Arun", "Banu", "Gita"]);

    let unassigned = roster("Staff", json!([]));
    assert_eq!(scoped(&unassigned, &RosterFilter::default()).len(), 8);

    let principal = roster("Principal", json!(["IT"]));
    assert_eq!(scoped(&principal, &RosterFilter::default()).len(), 8);
}

#[test]
fn explicit_filters_override_scope_and_colleges_are_admin_only() {
    let filter = RosterFilter {
        departments: vec!["cse".into()],
        colleges: vec!["psg".into()],
        ..Default::default()
    };

    let staff = roster("Staff", json!(["IT"]));
    assert_eq!(names(&scoped(&staff, &filter)), vec!["Arun", "Banu", "Gita"]);

    let admin = roster("Admin", json!([]));
    assert_eq!(names(&scoped(&admin, &filter)), vec!["Gita"]);

    let third_years = RosterFilter {
        years: vec!["iii".into(), "3".into()],
        ..Default::default()
    };
    assert_eq!(names(&scoped(&admin, &third_years)), vec!["Arun", "Chitra", "Deepak", "Gita"]);

    let by_regno = RosterFilter {
        query: "21it".into(),
        ..Default::default()
    };
    assert_eq!(names(&scoped(&admin, &by_regno)), vec!["Deepak", "Esha"]);
}

#[test]
fn missing_values_sort_last_both_ways() {
    let admin = roster("Admin", json!([]));
    let mut students = scoped(&admin, &RosterFilter::default());

    let mut sort = SortState::default();
    sort.toggle(SortKey::Year);
    sort_roster(&mut students, sort, "");
    assert_eq!(
        names(&students),
        vec!["Deepak", "Farid", "Banu", "Arun", "Chitra", "Gita", "Hari", "Esha"]
    );

    sort.toggle(SortKey::Year);
    assert_eq!(sort.direction, SortDirection::Descending);
    sort_roster(&mut students, sort, "");
    assert_eq!(students.first().map(|s| s.name.as_str()), Some("Hari"));
    assert_eq!(students.last().map(|s| s.name.as_str()), Some("Esha"));

    let by_dept = SortState {
        key: Some(SortKey::Dept),
        direction: SortDirection::Descending,
    };
    sort_roster(&mut students, by_dept, "");
    assert_eq!(students.last().map(|s| s.name.as_str()), Some("Farid"));
    assert_eq!(students.first().map(|s| s.name.as_str()), Some("Deepak"));
}

#[test]
fn roster_pages_hold_six_students() {
    let admin = roster("Admin", json!([]));
    let by_name = SortState {
        key: Some(SortKey::Name),
        direction: SortDirection::Ascending,
    };

    let first = roster_page(&admin, &RosterFilter::default(), by_name, 1);
    assert_eq!((first.items.len(), first.total, first.total_pages), (6, 8, 2));

    let second = roster_page(&admin, &RosterFilter::default(), by_name, 2);
    assert_eq!(names(&second.items), vec!["Gita", "Hari"]);
    assert!(roster_page(&admin, &RosterFilter::default(), by_name, 3).items.is_empty());
}

#[test]
fn server_completed_ends_a_test_on_the_dashboard() {
    let now = Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap();
    let tests: Vec<Assessment> = serde_json::from_value(json!([
        {
            "contestId": "finished-early",
            "assessmentName": "Sorting",
            "registrationStart": "2024-01-01T00:00:00Z",
            "endDate": "2024-01-10T00:00:00Z",
            "status": "Completed"
        },
        {
            "contestId": "running",
            "assessmentName": "Graphs",
            "registrationStart": "2024-01-01T00:00:00Z",
            "endDate": "2024-01-10T00:00:00Z",
            "status": "Live"
        }
    ]))
    .expect("tests");

    assert_eq!(tests[0].status_at(now), TestStatus::Live);

    let cards = build_cards(&tests, now);
    assert_eq!(cards[0].status, TestStatus::Completed);
    assert_eq!(cards[1].status, TestStatus::Live);
    assert!(StatusFilter::Completed.matches(cards[0].status));

    let stats = compute_stats(&cards, 40);
    assert_eq!((stats.live, stats.completed, stats.upcoming), (1, 1, 0));
}

fn bank() -> Vec<Question> {
    serde_json::from_value(json!([
        {
            "_id": "q1", "question": "Which structure is LIFO?", "options": ["Stack", "Queue"],
            "answer": "Stack", "level": "Easy", "blooms": "L1", "tags": "stacks, basics"
        },
        {
            "_id": "q2", "question": "Best case of quicksort?", "options": ["O(n log n)", "O(n^2)"],
            "answer": "O(n log n)", "level": "Medium", "blooms": "L4", "tags": ["sorting"]
        },
        {
            "_id": "q3", "question": "Pick the queue operation", "options": ["push", "enqueue"],
            "answer": "enqueue", "level": "Hard", "blooms": "L2"
        }
    ]))
    .expect("question bank")
}

#[test]
fn question_bank_filters_combine() {
    let bank = normalize_library(bank());
    assert_eq!(bank[2].tags, vec![NO_TAGS]);
    assert_eq!(available_tags(&bank), vec!["stacks", "basics", "sorting", NO_TAGS]);
    assert_eq!(
        available_blooms(&bank),
        vec![BloomLevel::Remembering, BloomLevel::Understanding, BloomLevel::Analyzing]
    );

    let ids = |filter: &QuestionBankFilter| -> Vec<String> {
        filter.apply(&bank).into_iter().map(|q| q.id).collect()
    };

    assert_eq!(ids(&QuestionBankFilter::default()).len(), 3);
    let queue = QuestionBankFilter {
        query: "QUEUE".into(),
        ..Default::default()
    };
    assert_eq!(ids(&queue), vec!["q1", "q3"]);

    let narrowed = QuestionBankFilter {
        levels: vec![Difficulty::Hard],
        ..queue
    };
    assert_eq!(ids(&narrowed), vec!["q3"]);

    let tagged = QuestionBankFilter {
        tags: vec!["sorting".into(), NO_TAGS.into()],
        blooms: vec![BloomLevel::Analyzing],
        ..Default::default()
    };
    assert_eq!(ids(&tagged), vec!["q2"]);
}
