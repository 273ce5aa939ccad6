use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::geocode::DEFAULT_GEOCODER_URL;
use crate::upload::MAX_CONTENT_BYTES;

pub const DEFAULT_REPORTS_DIR: &str = "data/reports";
pub const DEFAULT_BRANCH: &str = "main";
pub const DEFAULT_FOLDER: &str = "reports";
pub const DEFAULT_API_URL: &str = "https://api.github.com";

#[derive(Clone, Debug)]
pub struct Config {
    pub reports_dir: PathBuf,
    pub github_token: Option<String>,
    pub github_repo: Option<String>,
    pub github_branch: String,
    pub github_folder: String,
    pub github_api_url: String,
    pub upload_timeout_secs: u64,
    pub upload_max_retries: u32,
    pub geocoder_url: String,
}

/// Plain parameters handed to the upload client
#[derive(Clone, Debug)]
pub struct UploadSettings {
    pub api_url: String,
    pub token: Option<String>,
    pub default_repo: Option<String>,
    pub default_branch: String,
    pub default_folder: String,
    pub timeout: Duration,
    pub max_retries: u32,
    /// Base delay between retries, doubled on each attempt
    pub retry_backoff: Duration,
    /// Largest base64-encoded bundle the client will send
    pub max_content_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenvy::dotenv().ok();

        Ok(Config {
            reports_dir: env::var("REPORTS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_REPORTS_DIR)),
            github_token: non_empty_var("GITHUB_REPORT_TOKEN")
                .or_else(|| non_empty_var("GITHUB_TOKEN")),
            github_repo: non_empty_var("GITHUB_REPORT_REPO"),
            github_branch: non_empty_var("GITHUB_REPORT_BRANCH")
                .unwrap_or_else(|| DEFAULT_BRANCH.to_string()),
            github_folder: non_empty_var("GITHUB_REPORT_FOLDER")
                .unwrap_or_else(|| DEFAULT_FOLDER.to_string()),
            github_api_url: env::var("GITHUB_API_URL")
                .unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            upload_timeout_secs: env::var("UPLOAD_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30),
            upload_max_retries: env::var("UPLOAD_MAX_RETRIES")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .unwrap_or(3),
            geocoder_url: non_empty_var("GEOCODER_URL")
                .unwrap_or_else(|| DEFAULT_GEOCODER_URL.to_string()),
        })
    }

    pub fn upload_settings(&self) -> UploadSettings {
        UploadSettings {
            api_url: self.github_api_url.trim_end_matches('/').to_string(),
            token: self.github_token.clone(),
            default_repo: self.github_repo.clone(),
            default_branch: self.github_branch.clone(),
            default_folder: self.github_folder.clone(),
            timeout: Duration::from_secs(self.upload_timeout_secs),
            max_retries: self.upload_max_retries,
            retry_backoff: Duration::from_millis(500),
            max_content_bytes: MAX_CONTENT_BYTES,
        }
    }
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            token: None,
            default_repo: None,
            default_branch: DEFAULT_BRANCH.to_string(),
            default_folder: DEFAULT_FOLDER.to_string(),
            timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_backoff: Duration::from_millis(500),
            max_content_bytes: MAX_CONTENT_BYTES,
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
