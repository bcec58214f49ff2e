use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use assessment_portal::config::Config;
use assessment_portal::dto::auth_dto::StudentSignupPayload;
use assessment_portal::error::Error;
use assessment_portal::models::profile::Role;
use assessment_portal::services::listing_service::StatusFilter;
use assessment_portal::services::sync_service::PortalEvent;
use assessment_portal::Portal;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};

#[derive(Clone, Default)]
struct Backend {
    contest_hits: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
    signups: Arc<AtomicUsize>,
}

async fn staff_login(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    match body["password"].as_str() {
        Some("wrong") => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Invalid credentials" })),
        ),
        Some("spam") => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "error": "Too many attempts", "lockout_time": 90 })),
        ),
        _ => (
            StatusCode::OK,
            Json(json!({
                "tokens": { "jwt": "staff-jwt" },
                "name": "Priya",
                "profileImage": "https://cdn.example.com/p.png"
            })),
        ),
    }
}

async fn coding(State(b): State<Backend>) -> Json<Value> {
    b.contest_hits.fetch_add(1, Ordering::SeqCst);
    Json(json!({
        "contests": [
            {
                "contestId": "c-old",
                "assessmentName": "Arrays",
                "registrationStart": "2024-01-01T00:00:00Z",
                "endDate": "2024-01-10T00:00:00Z"
            },
            {
                "contestId": "c-new",
                "assessmentName": "Graphs",
                "registrationStart": "2024-02-01T00:00:00Z",
                "endDate": "2024-02-10T00:00:00Z"
            }
        ]
    }))
}

async fn mcq() -> Json<Value> {
    Json(json!({
        "assessments": [
            {
                "_id": { "$oid": "m-1" },
                "contestId": "m-1",
                "name": "OS Basics",
                "registrationStart": "2024-01-03T00:00:00Z",
                "endDate": "2024-01-04T00:00:00Z",
                "status": "Closed"
            }
        ]
    }))
}

async fn stats() -> Json<Value> {
    Json(json!({ "total_students": "12" }))
}

async fn close_session(State(b): State<Backend>, Path(id): Path<String>) -> (StatusCode, Json<Value>) {
    if id == "missing" {
        return (StatusCode::NOT_FOUND, Json(json!({ "detail": "No such test" })));
    }
    b.closed.fetch_add(1, Ordering::SeqCst);
    (StatusCode::OK, Json(json!({ "message": "closed" })))
}

async fn student_signup(State(b): State<Backend>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    b.signups.fetch_add(1, Ordering::SeqCst);
    if body["regno"] == "21CS001" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Registration number already exists" })),
        );
    }
    (StatusCode::CREATED, Json(json!({ "message": "Student registered" })))
}

async fn spawn_backend() -> (String, Backend) {
    let backend = Backend::default();
    let app = Router::new()
        .route("/api/staff/login/", post(staff_login))
        .route("/contests", get(coding))
        .route("/mcq", get(mcq))
        .route("/students/stats", get(stats))
        .route("/api/mcq/close-session/:id/", post(close_session))
        .route("/api/student/signup/", post(student_signup))
        .with_state(backend.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub backend");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("stub backend");
    });
    (format!("http://{}", addr), backend)
}

async fn portal(base: &str) -> Portal {
    let config = Config::with_base_url(base).expect("config");
    Portal::new(config).await.expect("portal")
}

#[tokio::test]
async fn login_errors_map_to_categories_and_lock_locally() {
    let (base, _backend) = spawn_backend().await;
    let portal = portal(&base).await;

    let err = portal
        .auth_service
        .staff_login("staff@college.edu", "wrong")
        .await
        .expect_err("401");
    assert!(matches!(err, Error::Unauthorized(ref m) if m == "Invalid credentials"));
    assert!(portal.session.token(Role::Staff).await.is_none());

    let err = portal
        .auth_service
        .staff_login("staff@college.edu", "spam")
        .await
        .expect_err("429");
    assert!(matches!(err, Error::Locked { lockout_secs: 90 }));
    assert_eq!(err.notice(), "Account temporarily locked. Try again in 1m 30s");

    // Refused without reaching the backend while the lock holds.
    let err = portal
        .auth_service
        .staff_login("staff@college.edu", "right")
        .await
        .expect_err("still locked");
    assert!(matches!(err, Error::Locked { .. }));

    portal.auth_service.lockout().clear();
    let session = portal
        .auth_service
        .staff_login("staff@college.edu", "right")
        .await
        .expect("login");
    assert_eq!(session.name, "Priya");
    assert_eq!(portal.session.token(Role::Staff).await.as_deref(), Some("staff-jwt"));
    assert_eq!(portal.api.bearer().await.as_deref(), Some("staff-jwt"));
}

#[tokio::test]
async fn dashboard_uses_cached_lists_until_a_write() {
    let (base, backend) = spawn_backend().await;
    let portal = portal(&base).await;
    let mut events = portal.feed.subscribe();
    let now = Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap();

    let dashboard = portal
        .test_service
        .dashboard(StatusFilter::All, "", 1, now)
        .await
        .expect("dashboard");
    assert_eq!(dashboard.stats.total_tests, 3);
    assert_eq!(dashboard.stats.total_students, 12);
    assert_eq!(dashboard.stats.live, 1);
    assert_eq!(dashboard.stats.upcoming, 1);
    assert_eq!(dashboard.stats.completed, 1);
    let ids: Vec<_> = dashboard.page.items.iter().map(|c| c.assessment.id.as_str()).collect();
    assert_eq!(ids, vec!["c-new", "c-old", "m-1"]);

    portal
        .test_service
        .dashboard(StatusFilter::Live, "", 1, now)
        .await
        .expect("cached dashboard");
    assert_eq!(backend.contest_hits.load(Ordering::SeqCst), 1);

    portal.test_service.close("c-old").await.expect("close");
    assert_eq!(backend.closed.load(Ordering::SeqCst), 1);
    loop {
        match events.recv().await.expect("event") {
            PortalEvent::TestsChanged { test_id } => {
                assert_eq!(test_id.as_deref(), Some("c-old"));
                break;
            }
            _ => continue,
        }
    }

    portal.test_service.coding_tests().await.expect("refetch");
    assert_eq!(backend.contest_hits.load(Ordering::SeqCst), 2);

    let err = portal.test_service.close("missing").await.expect_err("404");
    assert!(matches!(err, Error::NotFound(ref m) if m == "No such test"));
    assert_eq!(backend.closed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn student_signup_validates_before_sending() {
    let (base, backend) = spawn_backend().await;
    let portal = portal(&base).await;
    let mut payload = StudentSignupPayload {
        name: "Arun".into(),
        email: "arun@college.edu".into(),
        password: "secret1".into(),
        collegename: "Anna College".into(),
        dept: "CSE".into(),
        regno: "21CS002".into(),
        year: "III".into(),
        phone: "12345".into(),
    };

    let err = portal.auth_service.student_signup(&payload).await.expect_err("bad phone");
    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(err.notice(), "Invalid phone number");
    assert_eq!(backend.signups.load(Ordering::SeqCst), 0);

    payload.phone = "9876543210".into();
    portal.auth_service.student_signup(&payload).await.expect("registered");
    assert!(portal.session.token(Role::Student).await.is_none());

    payload.regno = "21CS001".into();
    let err = portal.auth_service.student_signup(&payload).await.expect_err("duplicate");
    assert_eq!(err.notice(), "Registration number already exists");
    assert_eq!(backend.signups.load(Ordering::SeqCst), 2);
}
