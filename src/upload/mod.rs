//! Push a record bundle to a hosted repository through the contents API.

pub mod bundle;

pub use bundle::{build_bundle, slugify_path_component, storage_path, ReportBundle, BUNDLE_VERSION};

use std::future::Future;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::Utc;
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;

use crate::config::{UploadSettings, DEFAULT_BRANCH};
use crate::error::{AppError, AppResult};
use crate::http_client::HttpClient;
use crate::models::InstallationRecord;

/// Largest encoded file the contents API accepts, the default limit
pub const MAX_CONTENT_BYTES: usize = 100 * 1024 * 1024;

/// Where the bundle landed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadReceipt {
    pub path: String,
    pub commit_sha: Option<String>,
    pub html_url: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct UploadRequest<'a> {
    /// `owner/name`
    pub repo: &'a str,
    pub branch: &'a str,
    pub folder: &'a str,
    pub record: &'a InstallationRecord,
    pub pdf: &'a [u8],
}

#[derive(Serialize)]
struct ContentsPut<'a> {
    message: String,
    content: &'a str,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

pub struct UploadClient {
    http: HttpClient,
    api_url: String,
    token: Option<String>,
    max_retries: u32,
    retry_backoff: Duration,
    max_content_bytes: usize,
}

impl UploadClient {
    pub fn new(settings: &UploadSettings) -> AppResult<Self> {
        Ok(Self {
            http: HttpClient::github(settings.timeout)?,
            api_url: settings.api_url.trim_end_matches('/').to_string(),
            token: settings.token.clone(),
            max_retries: settings.max_retries,
            retry_backoff: settings.retry_backoff,
            max_content_bytes: settings.max_content_bytes,
        })
    }

    pub async fn upload(&self, request: &UploadRequest<'_>) -> AppResult<UploadReceipt> {
        let token = self.token.as_deref().ok_or_else(|| {
            AppError::Auth("no upload token configured (set GITHUB_REPORT_TOKEN)".to_string())
        })?;
        let (owner, name) = parse_repo(request.repo)?;
        request.record.validate_identity()?;

        let branch = match request.branch.trim() {
            "" => DEFAULT_BRANCH,
            trimmed => trimmed,
        };
        let path = storage_path(request.record, request.folder);
        let bundle = build_bundle(request.record, request.pdf, Utc::now())?;
        let bundle_json = serde_json::to_vec(&bundle)
            .map_err(|e| AppError::Internal(format!("bundle serialization failed: {}", e)))?;
        let content = BASE64.encode(bundle_json);
        if content.len() > self.max_content_bytes {
            return Err(AppError::Validation(format!(
                "bundle is {} bytes encoded, the remote accepts at most {}",
                content.len(),
                self.max_content_bytes
            )));
        }

        let url = self.contents_url(owner, name, &path);
        let site = request.record.site_name.trim();

        tracing::info!("Uploading report: repo={}, branch={}, path={}", request.repo, branch, path);

        let mut sha = self
            .with_retry("fetch sha", || self.fetch_sha(&url, token, branch))
            .await?;
        let mut refreshed = false;

        loop {
            let outcome = {
                let body = ContentsPut {
                    message: commit_message(site, sha.is_some()),
                    content: &content,
                    branch,
                    sha: sha.as_deref(),
                };
                self.with_retry("put contents", || self.put_contents(&url, token, &body))
                    .await
            };

            match outcome {
                Ok(response) => {
                    let receipt = receipt_from(&response, &path);
                    tracing::info!(
                        "Report uploaded: path={}, commit={}",
                        receipt.path,
                        receipt.commit_sha.as_deref().unwrap_or("-")
                    );
                    return Ok(receipt);
                }
                Err(AppError::Conflict(detail)) if !refreshed => {
                    tracing::warn!("Remote sha rejected, refetching: path={}, detail={}", path, detail);
                    refreshed = true;
                    sha = self
                        .with_retry("refetch sha", || self.fetch_sha(&url, token, branch))
                        .await?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn contents_url(&self, owner: &str, name: &str, path: &str) -> String {
        let encoded_path = path
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        format!(
            "{}/repos/{}/{}/contents/{}",
            self.api_url,
            urlencoding::encode(owner),
            urlencoding::encode(name),
            encoded_path
        )
    }

    async fn fetch_sha(&self, url: &str, token: &str, branch: &str) -> AppResult<Option<String>> {
        let response = self.http.get(url, token, &[("ref", branch)]).await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            tracing::debug!("No remote file yet: url={}", url);
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        let existing: Value = response.json().await?;
        let sha = existing
            .get("sha")
            .and_then(Value::as_str)
            .or_else(|| existing.pointer("/content/sha").and_then(Value::as_str))
            .map(str::to_string);
        tracing::debug!("Remote file exists: url={}, sha={:?}", url, sha);
        Ok(sha)
    }

    async fn put_contents(&self, url: &str, token: &str, body: &ContentsPut<'_>) -> AppResult<Value> {
        let response = self.http.put_json(url, token, body).await?;
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(status, &text));
        }

        Ok(response.json().await?)
    }

    /// Run `operation` again on transient failures, doubling the delay each time
    async fn with_retry<T, F, Fut>(&self, label: &str, mut operation: F) -> AppResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match operation().await {
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let delay = self.retry_backoff.saturating_mul(1 << attempt.min(16));
                    tracing::warn!(
                        "Retrying {}: attempt={}, delay_ms={}, error={}",
                        label,
                        attempt + 1,
                        delay.as_millis(),
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

/// Split `owner/name`, rejecting anything else
pub fn parse_repo(repo: &str) -> AppResult<(&str, &str)> {
    let invalid = || {
        AppError::Validation(format!(
            "repository must look like 'owner/name', got '{}'",
            repo
        ))
    };
    let (owner, name) = repo.trim().split_once('/').ok_or_else(invalid)?;
    let valid_part =
        |part: &str| !part.is_empty() && !part.contains('/') && !part.contains(char::is_whitespace);
    if valid_part(owner) && valid_part(name) {
        Ok((owner, name))
    } else {
        Err(invalid())
    }
}

fn commit_message(site: &str, exists: bool) -> String {
    let prefix = if exists { "Update" } else { "Add" };
    format!("{} installation report for {}", prefix, site)
}

fn receipt_from(response: &Value, requested_path: &str) -> UploadReceipt {
    let text_at = |pointer: &str| {
        response
            .pointer(pointer)
            .and_then(Value::as_str)
            .map(str::to_string)
    };
    UploadReceipt {
        path: text_at("/content/path").unwrap_or_else(|| requested_path.to_string()),
        commit_sha: text_at("/commit/sha"),
        html_url: text_at("/content/html_url"),
    }
}

/// The API's own `message` field when present, otherwise the raw body
fn api_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.chars().take(200).collect())
}

fn status_error(status: StatusCode, body: &str) -> AppError {
    let detail = api_message(body);
    let lower = detail.to_lowercase();

    match status.as_u16() {
        401 => AppError::Auth(format!("token rejected ({}): {}", status, detail)),
        403 if lower.contains("rate limit") => {
            AppError::Network(format!("rate limited ({}): {}", status, detail))
        }
        403 => AppError::Auth(format!("access denied ({}): {}", status, detail)),
        404 => AppError::NotFound(format!("repository or branch not found: {}", detail)),
        409 => AppError::Conflict(detail),
        422 if lower.contains("sha") => AppError::Conflict(detail),
        413 | 422 => AppError::Validation(format!("rejected by remote ({}): {}", status, detail)),
        429 => AppError::Network(format!("rate limited ({}): {}", status, detail)),
        500..=599 => AppError::Network(format!("remote unavailable ({}): {}", status, detail)),
        _ => AppError::Internal(format!("unexpected response {}: {}", status, detail)),
    }
}
