use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::utils::image::{is_data_url, is_placeholder};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Staff,
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Staff => "staff",
            Role::Student => "student",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "staff" => Ok(Role::Staff),
            "student" => Ok(Role::Student),
            other => Err(format!("unknown role '{}', expected staff or student", other)),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an avatar can be loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileImage {
    /// `data:image/...;base64,...`
    Inline(String),
    Url(String),
}

impl ProfileImage {
    /// Classifies a raw value; placeholders such as `"undefined"` yield `None`.
    pub fn from_raw(raw: &str) -> Option<Self> {
        if is_placeholder(raw) {
            return None;
        }
        let raw = raw.trim().to_string();
        if is_data_url(&raw) {
            Some(ProfileImage::Inline(raw))
        } else {
            Some(ProfileImage::Url(raw))
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ProfileImage::Inline(s) | ProfileImage::Url(s) => s,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffProfile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub collegename: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<String>,
    #[serde(default, rename = "profilepicture", skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentProfile {
    #[serde(default, alias = "student_id")]
    pub student_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub regno: String,
    #[serde(default)]
    pub dept: Option<String>,
    #[serde(default)]
    pub collegename: Option<String>,
    #[serde(default)]
    pub year: Option<String>,
    #[serde(default, alias = "setpassword")]
    pub set_password: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<String>,
}

/// The fields the avatar and navbar logic need from either profile shape.
pub trait ProfileSummary {
    fn display_name(&self) -> &str;
    fn image(&self) -> Option<ProfileImage>;
}

impl ProfileSummary for StaffProfile {
    fn display_name(&self) -> &str {
        &self.name
    }

    fn image(&self) -> Option<ProfileImage> {
        self.profile_image
            .as_deref()
            .and_then(ProfileImage::from_raw)
            .or_else(|| self.profile_picture.as_deref().and_then(ProfileImage::from_raw))
    }
}

impl ProfileSummary for StudentProfile {
    fn display_name(&self) -> &str {
        &self.name
    }

    fn image(&self) -> Option<ProfileImage> {
        self.profile_image.as_deref().and_then(ProfileImage::from_raw)
    }
}
