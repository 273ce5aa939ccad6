use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{Client, Response};
use std::time::Duration;

use crate::error::{AppError, AppResult};

const GITHUB_ACCEPT: &str = "application/vnd.github+json";
const GITHUB_API_VERSION: &str = "2022-11-28";

/// Shared reqwest client: bounded timeout and a user agent (both the
/// contents API and the geocoder refuse requests without one).
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(timeout: Duration) -> AppResult<Self> {
        Self::build(timeout, HeaderMap::new())
    }

    /// Adds the hosted contents API's accept and version headers
    pub fn github(timeout: Duration) -> AppResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(GITHUB_ACCEPT));
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static(GITHUB_API_VERSION),
        );
        Self::build(timeout, headers)
    }

    fn build(timeout: Duration, headers: HeaderMap) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    pub async fn get_public(&self, url: &str, query: &[(&str, &str)]) -> AppResult<Response> {
        Ok(self.client.get(url).query(query).send().await?)
    }

    pub async fn get(
        &self,
        url: &str,
        token: &str,
        query: &[(&str, &str)],
    ) -> AppResult<Response> {
        Ok(self
            .client
            .get(url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await?)
    }

    pub async fn put_json<T: serde::Serialize>(
        &self,
        url: &str,
        token: &str,
        body: &T,
    ) -> AppResult<Response> {
        Ok(self
            .client
            .put(url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await?)
    }
}
