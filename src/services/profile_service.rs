use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};
use url::Url;

use crate::dto::student_dto::ProfilePicturePayload;
use crate::error::Result;
use crate::models::profile::{ProfileImage, ProfileSummary, Role, StaffProfile, StudentProfile};
use crate::services::api_client::ApiClient;
use crate::services::cache_service::FetchCache;
use crate::services::status_service::TickerHandle;
use crate::services::sync_service::{ChangeFeed, PortalEvent};
use crate::storage::SessionCache;
use crate::utils::image::{encode_data_url, resolve_avatar_url};

/// Where canonical profiles come from.
#[async_trait]
pub trait ProfileSource: Send + Sync {
    async fn staff_profile(&self) -> Result<StaffProfile>;
    async fn student_profile(&self) -> Result<StudentProfile>;
    async fn upload_picture(&self, role: Role, data_url: &str) -> Result<()>;
}

pub struct HttpProfileSource {
    api: ApiClient,
}

impl HttpProfileSource {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl ProfileSource for HttpProfileSource {
    async fn staff_profile(&self) -> Result<StaffProfile> {
        self.api
            .get("/api/staff/profile/", "Failed to fetch profile")
            .await
    }

    async fn student_profile(&self) -> Result<StudentProfile> {
        self.api
            .get("/api/student/profile/", "Failed to fetch profile")
            .await
    }

    async fn upload_picture(&self, role: Role, data_url: &str) -> Result<()> {
        self.api
            .request(
                reqwest::Method::POST,
                &format!("/api/{}/update-profile-picture/", role),
            )?
            .json(&ProfilePicturePayload {
                profile_image_base64: data_url.to_string(),
            })
            .send_empty("Failed to update profile picture")
            .await
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Profile {
    Staff(StaffProfile),
    Student(StudentProfile),
}

impl Profile {
    pub fn summary(&self) -> &dyn ProfileSummary {
        match self {
            Profile::Staff(p) => p as &dyn ProfileSummary,
            Profile::Student(p) => p as &dyn ProfileSummary,
        }
    }
}

/// Profiles and avatars for the signed-in user.
///
/// Profile fetches are cached with a TTL and coalesced; avatar lookups go
/// to the store first and only hit the network when nothing usable is
/// stored.
#[derive(Clone)]
pub struct ProfileService {
    source: Arc<dyn ProfileSource>,
    session: SessionCache,
    feed: ChangeFeed,
    cache: FetchCache<Profile>,
    base_url: Url,
}

impl ProfileService {
    pub fn new(
        source: Arc<dyn ProfileSource>,
        session: SessionCache,
        feed: ChangeFeed,
        ttl: Duration,
        base_url: Url,
    ) -> Self {
        Self {
            source,
            session,
            feed,
            cache: FetchCache::new(ttl),
            base_url,
        }
    }

    fn cache_key(role: Role) -> String {
        crate::storage::session::profile_key(role)
    }

    pub async fn profile(&self, role: Role) -> Result<Profile> {
        let source = self.source.clone();
        let profile = self
            .cache
            .get_or_fetch(&Self::cache_key(role), async move {
                match role {
                    Role::Staff => source.staff_profile().await.map(Profile::Staff),
                    Role::Student => source.student_profile().await.map(Profile::Student),
                }
            })
            .await?;

        match &profile {
            Profile::Staff(p) => self.session.set_profile(role, p).await?,
            Profile::Student(p) => self.session.set_profile(role, p).await?,
        }
        Ok(profile)
    }

    pub async fn staff_profile(&self) -> Result<StaffProfile> {
        match self.profile(Role::Staff).await? {
            Profile::Staff(p) => Ok(p),
            Profile::Student(_) => unreachable_role(),
        }
    }

    pub async fn student_profile(&self) -> Result<StudentProfile> {
        match self.profile(Role::Student).await? {
            Profile::Student(p) => Ok(p),
            Profile::Staff(_) => unreachable_role(),
        }
    }

    /// Drops the cached profile so the next read goes to the server.
    pub async fn invalidate(&self, role: Role) -> Result<()> {
        self.cache.invalidate(&Self::cache_key(role)).await;
        self.session.invalidate_profile(role).await
    }

    /// Loadable avatar for `role`: stored inline image, then stored URL,
    /// then the server's profile, whose image is written back to the store.
    pub async fn avatar(&self, role: Role) -> Result<Option<String>> {
        if let Some(stored) = self.session.avatar(role).await {
            if let Some(url) = resolve_avatar_url(stored.as_str(), &self.base_url) {
                return Ok(Some(url));
            }
        }

        let profile = self.profile(role).await?;
        let Some(image) = profile.summary().image() else {
            debug!(%role, "profile has no image");
            return Ok(None);
        };
        self.session.set_avatar(role, &image).await?;
        Ok(resolve_avatar_url(image.as_str(), &self.base_url))
    }

    /// Sends a new avatar. The store only changes once the server accepted it.
    pub async fn upload_avatar(&self, role: Role, bytes: &[u8]) -> Result<String> {
        let data_url = encode_data_url(bytes)?;
        self.source.upload_picture(role, &data_url).await?;

        self.session
            .set_avatar(role, &ProfileImage::Inline(data_url.clone()))
            .await?;
        self.cache.invalidate(&Self::cache_key(role)).await;
        self.feed.publish(PortalEvent::ProfileUpdated { role });
        info!(%role, bytes = bytes.len(), "profile picture updated");
        Ok(data_url)
    }

    /// Watches the stored avatar on an interval and publishes
    /// [`PortalEvent::ProfileUpdated`] when another writer changed it.
    /// Only the store is read; profiles reach the network through the TTL
    /// cache in [`profile`](Self::profile).
    pub fn spawn_refresh(self, role: Role, every: Duration) -> TickerHandle {
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval.tick().await;
            let mut seen = self.session.avatar(role).await;
            loop {
                interval.tick().await;
                let current = self.session.avatar(role).await;
                if current != seen {
                    debug!(%role, "stored avatar changed");
                    self.feed.publish(PortalEvent::ProfileUpdated { role });
                    seen = current;
                }
            }
        });
        TickerHandle::from_task(handle)
    }
}

fn unreachable_role<T>() -> Result<T> {
    Err(crate::error::Error::Internal(
        "profile cache returned the wrong role".into(),
    ))
}
