use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::Result;
use crate::models::profile::{ProfileImage, Role};
use crate::models::test::{ResultVisibility, TestConfiguration};
use crate::services::listing_service::StatusFilter;
use crate::storage::LocalStore;

pub const USERNAME_KEY: &str = "username";
pub const CONTEST_TOKEN_KEY: &str = "contestToken";
const TEST_FLAGS_PREFIX: &str = "testFlags:";
const UI_PREFIX: &str = "ui:";

pub fn token_key(role: Role) -> String {
    format!("{}Token", role)
}

pub fn avatar_base64_key(role: Role) -> String {
    format!("{}ProfilePictureBase64", role)
}

pub fn avatar_url_key(role: Role) -> String {
    format!("{}ProfilePicture", role)
}

pub fn profile_key(role: Role) -> String {
    format!("profile:{}", role)
}

pub fn test_flags_key(test_id: &str) -> String {
    format!("{}{}", TEST_FLAGS_PREFIX, test_id)
}

pub fn ui_key(view: &str) -> String {
    format!("{}{}", UI_PREFIX, view)
}

/// Proctoring and timing settings the instruction screen needs before the
/// test itself is loaded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestFlags {
    pub duration_secs: i64,
    pub full_screen_mode: bool,
    pub full_screen_mode_count: u32,
    pub face_detection: bool,
    pub face_detection_count: u32,
    pub noise_detection: bool,
    pub noise_detection_count: u32,
    pub device_restriction: bool,
    pub pass_percentage: u32,
    pub result_visibility: Option<ResultVisibility>,
}

impl From<&TestConfiguration> for TestFlags {
    fn from(config: &TestConfiguration) -> Self {
        Self {
            duration_secs: config.duration.total_minutes() * 60,
            full_screen_mode: config.full_screen_mode,
            full_screen_mode_count: config.full_screen_mode_count.unwrap_or(0),
            face_detection: config.face_detection,
            face_detection_count: config.face_detection_count.unwrap_or(0),
            noise_detection: config.noise_detection,
            noise_detection_count: config.noise_detection_count.unwrap_or(0),
            device_restriction: config.device_restriction,
            pass_percentage: config.pass_percentage.unwrap_or(0),
            result_visibility: config.result_visibility,
        }
    }
}

/// Filter, query and page a list view was left on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiFilterState {
    pub status: StatusFilter,
    pub query: String,
    pub page: usize,
}

impl Default for UiFilterState {
    fn default() -> Self {
        Self {
            status: StatusFilter::All,
            query: String::new(),
            page: 1,
        }
    }
}

/// Typed view over the [`LocalStore`] keys that make up a session.
#[derive(Debug, Clone)]
pub struct SessionCache {
    store: LocalStore,
}

impl SessionCache {
    pub fn new(store: LocalStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub async fn username(&self) -> Option<String> {
        self.store.get_string(USERNAME_KEY).await
    }

    pub async fn set_username(&self, name: &str) -> Result<()> {
        self.store.set(USERNAME_KEY, &name).await
    }

    pub async fn token(&self, role: Role) -> Option<String> {
        self.store
            .get_string(&token_key(role))
            .await
            .filter(|t| !t.is_empty())
    }

    pub async fn set_token(&self, role: Role, token: &str) -> Result<()> {
        self.store.set(&token_key(role), &token).await
    }

    pub async fn contest_token(&self) -> Option<String> {
        self.store
            .get_string(CONTEST_TOKEN_KEY)
            .await
            .filter(|t| !t.is_empty())
    }

    pub async fn set_contest_token(&self, token: &str) -> Result<()> {
        self.store.set(CONTEST_TOKEN_KEY, &token).await
    }

    /// Stored avatar, inline data first, ignoring placeholder values.
    pub async fn avatar(&self, role: Role) -> Option<ProfileImage> {
        if let Some(image) = self
            .store
            .get_string(&avatar_base64_key(role))
            .await
            .and_then(|v| ProfileImage::from_raw(&v))
        {
            return Some(image);
        }
        self.store
            .get_string(&avatar_url_key(role))
            .await
            .and_then(|v| ProfileImage::from_raw(&v))
    }

    /// Writes the avatar under the key matching its kind and drops the other
    /// so the next read cannot resurrect a stale image.
    pub async fn set_avatar(&self, role: Role, image: &ProfileImage) -> Result<()> {
        let (keep, drop_key) = match image {
            ProfileImage::Inline(_) => (avatar_base64_key(role), avatar_url_key(role)),
            ProfileImage::Url(_) => (avatar_url_key(role), avatar_base64_key(role)),
        };
        self.store.set(&keep, &image.as_str()).await?;
        self.store.remove(&drop_key).await?;
        Ok(())
    }

    pub async fn profile<T: DeserializeOwned>(&self, role: Role) -> Option<T> {
        self.store.get_as(&profile_key(role)).await
    }

    pub async fn set_profile<T: Serialize>(&self, role: Role, profile: &T) -> Result<()> {
        self.store.set(&profile_key(role), profile).await
    }

    pub async fn invalidate_profile(&self, role: Role) -> Result<()> {
        self.store.remove(&profile_key(role)).await?;
        Ok(())
    }

    pub async fn test_flags(&self, test_id: &str) -> Option<TestFlags> {
        self.store.get_as(&test_flags_key(test_id)).await
    }

    pub async fn set_test_flags(&self, test_id: &str, flags: &TestFlags) -> Result<()> {
        self.store.set(&test_flags_key(test_id), flags).await
    }

    pub async fn ui_state(&self, view: &str) -> UiFilterState {
        self.store.get_as(&ui_key(view)).await.unwrap_or_default()
    }

    pub async fn set_ui_state(&self, view: &str, state: &UiFilterState) -> Result<()> {
        self.store.set(&ui_key(view), state).await
    }

    /// Whether a login for `role` is on record.
    pub async fn is_logged_in(&self, role: Role) -> bool {
        match role {
            Role::Staff => self.token(role).await.is_some(),
            Role::Student => self.profile::<serde_json::Value>(role).await.is_some(),
        }
    }

    /// Logout: drops every session key, keeping only UI filter state.
    pub async fn invalidate(&self) -> Result<()> {
        let ui: Vec<(String, serde_json::Value)> = {
            let mut kept = Vec::new();
            for key in self.store.keys().await {
                if key.starts_with(UI_PREFIX) {
                    if let Some(v) = self.store.get(&key).await {
                        kept.push((key, v));
                    }
                }
            }
            kept
        };
        self.store.clear().await?;
        for (key, value) in ui {
            self.store.set(&key, &value).await?;
        }
        Ok(())
    }
}
