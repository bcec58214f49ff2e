use reqwest::{Client, Method, RequestBuilder};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use url::Url;

use crate::config::Config;
use crate::error::{Error, Result};

/// JSON client for the portal backend.
///
/// Cookies set by the backend are kept and replayed, so cookie sessions
/// work the same as in a browser. A default bearer token, when set, is
/// attached to every request unless the request supplies its own.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
    bearer: Arc<RwLock<Option<String>>>,
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .cookie_store(true)
            .timeout(config.http_timeout)
            .build()?;
        Ok(Self::with_client(client, config.api_base_url.clone()))
    }

    pub fn with_client(client: Client, base_url: Url) -> Self {
        Self {
            client,
            base_url,
            bearer: Arc::new(RwLock::new(None)),
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    pub async fn set_bearer(&self, token: Option<String>) {
        *self.bearer.write().await = token;
    }

    pub async fn bearer(&self) -> Option<String> {
        self.bearer.read().await.clone()
    }

    pub fn request(&self, method: Method, path: &str) -> Result<ApiRequest<'_>> {
        let url = self.endpoint(path)?;
        Ok(ApiRequest {
            api: self,
            inner: self.client.request(method.clone(), url),
            method,
            path: path.to_string(),
            bearer: None,
        })
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str, fallback: &str) -> Result<T> {
        self.request(Method::GET, path)?.send(fallback).await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B, fallback: &str) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request(Method::POST, path)?.json(body).send(fallback).await
    }

    pub async fn put<B, T>(&self, path: &str, body: &B, fallback: &str) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request(Method::PUT, path)?.json(body).send(fallback).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str, fallback: &str) -> Result<T> {
        self.request(Method::DELETE, path)?.send(fallback).await
    }
}

pub struct ApiRequest<'a> {
    api: &'a ApiClient,
    inner: RequestBuilder,
    method: Method,
    path: String,
    bearer: Option<String>,
}

impl<'a> ApiRequest<'a> {
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Self {
        self.inner = self.inner.json(body);
        self
    }

    pub fn query<Q: Serialize + ?Sized>(mut self, query: &Q) -> Self {
        self.inner = self.inner.query(query);
        self
    }

    /// Overrides the client's default bearer token for this request.
    pub fn bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }

    async fn execute(self, fallback: &str) -> Result<JsonValue> {
        let token = match self.bearer {
            Some(token) => Some(token),
            None => self.api.bearer().await,
        };
        let mut builder = self.inner;
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }

        let res = builder.send().await?;
        let status = res.status();
        let bytes = res.bytes().await?;
        let body = if bytes.is_empty() {
            JsonValue::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                JsonValue::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };

        if !status.is_success() {
            warn!(method = %self.method, path = %self.path, status = status.as_u16(), "request failed");
            return Err(Error::from_response(status, &body, fallback));
        }
        debug!(method = %self.method, path = %self.path, status = status.as_u16(), "request ok");
        Ok(body)
    }

    pub async fn send<T: DeserializeOwned>(self, fallback: &str) -> Result<T> {
        let body = self.execute(fallback).await?;
        Ok(serde_json::from_value(body)?)
    }

    /// For endpoints whose success body carries nothing the caller needs.
    pub async fn send_empty(self, fallback: &str) -> Result<()> {
        self.execute(fallback).await.map(|_| ())
    }
}
