use crate::error::{Error, Result};
use crate::models::profile::Role;
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;
use url::Url;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";

#[derive(Debug, Clone)]
pub struct Config {
    pub api_base_url: Url,
    pub http_timeout: Duration,
    pub store_path: PathBuf,
    pub cache_ttl: Duration,
    pub status_poll_interval: Duration,
    pub profile_poll_interval: Duration,
    pub role: Role,
    pub email: Option<String>,
    pub password: Option<String>,
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let base = env::var("PORTAL_API_BASE_URL").unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string());

        Ok(Self {
            api_base_url: parse_base_url(&base)?,
            http_timeout: Duration::from_secs(get_env_parse_or("PORTAL_HTTP_TIMEOUT_SECS", 30)?),
            store_path: env::var("PORTAL_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".portal-store.json")),
            cache_ttl: Duration::from_secs(get_env_parse_or("PORTAL_CACHE_TTL_SECS", 300)?),
            status_poll_interval: Duration::from_secs(get_env_parse_or("PORTAL_STATUS_POLL_SECS", 60)?),
            profile_poll_interval: Duration::from_secs(get_env_parse_or("PORTAL_PROFILE_POLL_SECS", 3)?),
            role: get_env_parse_or("PORTAL_ROLE", Role::Staff)?,
            email: non_empty_env("PORTAL_EMAIL"),
            password: non_empty_env("PORTAL_PASSWORD"),
        })
    }

    /// Defaults pointed at an explicit backend, with an in-memory store.
    pub fn with_base_url(base: &str) -> Result<Self> {
        Ok(Self {
            api_base_url: parse_base_url(base)?,
            http_timeout: Duration::from_secs(30),
            store_path: PathBuf::new(),
            cache_ttl: Duration::from_secs(300),
            status_poll_interval: Duration::from_secs(60),
            profile_poll_interval: Duration::from_secs(3),
            role: Role::Staff,
            email: None,
            password: None,
        })
    }
}

// `Url::join` drops the last path segment unless the base ends with '/'.
fn parse_base_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    let normalized = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    };
    Url::parse(&normalized).map_err(|e| Error::Config(format!("Invalid PORTAL_API_BASE_URL: {}", e)))
}

fn non_empty_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn get_env_parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
        Err(_) => Ok(default),
    }
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> Result<&'static Config> {
    CONFIG
        .get()
        .ok_or_else(|| Error::Config("Configuration has not been initialized".to_string()))
}
