use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use assessment_portal::error::{Error, Result};
use assessment_portal::models::profile::{ProfileImage, Role, StaffProfile, StudentProfile};
use assessment_portal::services::profile_service::{ProfileService, ProfileSource};
use assessment_portal::services::sync_service::{ChangeFeed, PortalEvent};
use assessment_portal::storage::{LocalStore, SessionCache};
use async_trait::async_trait;
use mockall::mock;
use url::Url;

mock! {
    pub Source {}

    #[async_trait]
    impl ProfileSource for Source {
        async fn staff_profile(&self) -> Result<StaffProfile>;
        async fn student_profile(&self) -> Result<StudentProfile>;
        async fn upload_picture(&self, role: Role, data_url: &str) -> Result<()>;
    }
}

const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

fn service(source: MockSource) -> (ProfileService, SessionCache, ChangeFeed) {
    let feed = ChangeFeed::default();
    let session = SessionCache::new(LocalStore::in_memory(feed.clone()));
    let service = ProfileService::new(
        Arc::new(source),
        session.clone(),
        feed.clone(),
        Duration::from_secs(300),
        Url::parse("http://portal.test/").expect("base url"),
    );
    (service, session, feed)
}

fn staff(image: Option<&str>) -> StaffProfile {
    StaffProfile {
        name: "Priya".into(),
        email: "priya@college.edu".into(),
        profile_image: image.map(str::to_string),
        ..Default::default()
    }
}

#[tokio::test]
async fn stored_avatar_wins_over_the_network() {
    let mut source = MockSource::new();
    source.expect_staff_profile().times(0);
    let (service, session, _) = service(source);

    session
        .set_avatar(Role::Staff, &ProfileImage::Inline("data:image/png;base64,AAAA".into()))
        .await
        .expect("seed avatar");
    let avatar = service.avatar(Role::Staff).await.expect("avatar");
    assert_eq!(avatar.as_deref(), Some("data:image/png;base64,AAAA"));
}

#[tokio::test]
async fn missing_avatar_is_fetched_once_and_written_back() {
    let mut source = MockSource::new();
    source
        .expect_staff_profile()
        .times(1)
        .returning(|| Ok(staff(Some("/media/avatars/priya.png"))));
    let (service, session, _) = service(source);

    let (a, b) = tokio::join!(service.avatar(Role::Staff), service.avatar(Role::Staff));
    let expected = Some("http://portal.test/media/avatars/priya.png".to_string());
    assert_eq!(a.expect("first"), expected);
    assert_eq!(b.expect("second"), expected);

    assert_eq!(
        session.avatar(Role::Staff).await,
        Some(ProfileImage::Url("/media/avatars/priya.png".into()))
    );
    let cached: Option<StaffProfile> = session.profile(Role::Staff).await;
    assert_eq!(cached.map(|p| p.name).as_deref(), Some("Priya"));
}

#[tokio::test]
async fn profile_without_image_has_no_avatar() {
    let mut source = MockSource::new();
    source
        .expect_staff_profile()
        .times(1)
        .returning(|| Ok(staff(Some("undefined"))));
    let (service, session, _) = service(source);

    assert_eq!(service.avatar(Role::Staff).await.expect("avatar"), None);
    assert!(session.avatar(Role::Staff).await.is_none());
}

#[tokio::test]
async fn upload_changes_the_store_only_after_the_server_accepts() {
    let mut source = MockSource::new();
    let mut seq = mockall::Sequence::new();
    source
        .expect_upload_picture()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| {
            Err(Error::Api {
                status: 500,
                message: "Failed to update profile picture".into(),
            })
        });
    source
        .expect_upload_picture()
        .withf(|role, data_url| *role == Role::Student && data_url.starts_with("data:image/png;base64,"))
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(()));
    let (service, session, feed) = service(source);
    let mut events = feed.subscribe();

    assert!(service.upload_avatar(Role::Student, PNG).await.is_err());
    assert!(session.avatar(Role::Student).await.is_none());

    let err = service.upload_avatar(Role::Student, b"not an image").await.expect_err("rejected locally");
    assert_eq!(err.notice(), "Please select an image file");

    let data_url = service.upload_avatar(Role::Student, PNG).await.expect("upload");
    assert_eq!(
        session.avatar(Role::Student).await,
        Some(ProfileImage::Inline(data_url))
    );
    loop {
        if let PortalEvent::ProfileUpdated { role } = events.recv().await.expect("event") {
            assert_eq!(role, Role::Student);
            break;
        }
    }
}

#[derive(Default)]
struct CountingSource {
    calls: AtomicUsize,
}

#[async_trait]
impl ProfileSource for CountingSource {
    async fn staff_profile(&self) -> Result<StaffProfile> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(staff(Some("https://cdn.example.com/p=s96-c")))
    }

    async fn student_profile(&self) -> Result<StudentProfile> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(StudentProfile::default())
    }

    async fn upload_picture(&self, _role: Role, _data_url: &str) -> Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn refresh_ticks_read_the_store_not_the_network() {
    let source = Arc::new(CountingSource::default());
    let feed = ChangeFeed::default();
    let session = SessionCache::new(LocalStore::in_memory(feed.clone()));
    let service = ProfileService::new(
        source.clone(),
        session.clone(),
        feed.clone(),
        Duration::from_secs(300),
        Url::parse("http://portal.test/").expect("base url"),
    );
    let mut events = feed.subscribe();

    service.profile(Role::Staff).await.expect("first fetch");
    service.profile(Role::Staff).await.expect("cached");
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);

    let _ticker = service.clone().spawn_refresh(Role::Staff, Duration::from_millis(20));
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);

    session
        .set_avatar(Role::Staff, &ProfileImage::Url("https://cdn.example.com/new.png".into()))
        .await
        .expect("avatar written elsewhere");
    let updated = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if let PortalEvent::ProfileUpdated { role } = events.recv().await.expect("event") {
                return role;
            }
        }
    })
    .await
    .expect("avatar change announced");
    assert_eq!(updated, Role::Staff);
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);
}
