use std::sync::Arc;

use crate::config::UploadSettings;
use crate::error::{AppError, AppResult};
use crate::storage::RecordStore;
use crate::upload::{UploadClient, UploadReceipt, UploadRequest};

/// Push a stored record and its rendered PDF. Unset destination fields fall
/// back to the configured defaults.
#[derive(Debug, Clone, Default)]
pub struct UploadRecordCommand {
    pub filename: String,
    pub pdf: Vec<u8>,
    pub repo: Option<String>,
    pub branch: Option<String>,
    pub folder: Option<String>,
}

pub struct UploadService<S: RecordStore> {
    store: Arc<S>,
    client: UploadClient,
    settings: UploadSettings,
}

impl<S: RecordStore> UploadService<S> {
    pub fn new(store: Arc<S>, settings: UploadSettings) -> AppResult<Self> {
        let client = UploadClient::new(&settings)?;
        Ok(Self {
            store,
            client,
            settings,
        })
    }

    pub async fn upload(&self, command: UploadRecordCommand) -> AppResult<UploadReceipt> {
        let repo = command
            .repo
            .or_else(|| self.settings.default_repo.clone())
            .ok_or_else(|| {
                AppError::Validation(
                    "no repository given and GITHUB_REPORT_REPO is not set".to_string(),
                )
            })?;
        let branch = command
            .branch
            .unwrap_or_else(|| self.settings.default_branch.clone());
        let folder = command
            .folder
            .unwrap_or_else(|| self.settings.default_folder.clone());

        let record = self.store.load(&command.filename)?;

        self.client
            .upload(&UploadRequest {
                repo: &repo,
                branch: &branch,
                folder: &folder,
                record: &record,
                pdf: &command.pdf,
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use tempfile::TempDir;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::models::InstallationRecord;
    use crate::storage::LocalFileStore;

    fn settings(server: &MockServer) -> UploadSettings {
        UploadSettings {
            api_url: server.uri(),
            token: Some("test-token".to_string()),
            default_repo: Some("acme/flow-reports".to_string()),
            default_branch: "field-data".to_string(),
            default_folder: "installs".to_string(),
            timeout: Duration::from_secs(5),
            max_retries: 0,
            retry_backoff: Duration::from_millis(1),
            max_content_bytes: crate::upload::MAX_CONTENT_BYTES,
        }
    }

    fn stored_record(dir: &TempDir) -> (Arc<LocalFileStore>, String) {
        let store = Arc::new(LocalFileStore::new(dir.path()));
        let filename = store
            .save(&mut InstallationRecord::new("Logan", "PS4"))
            .unwrap();
        (store, filename)
    }

    #[tokio::test]
    async fn test_upload_uses_configured_defaults() {
        let server = MockServer::start().await;
        let contents = "/repos/acme/flow-reports/contents/installs/logan/ps4.json";
        Mock::given(method("GET"))
            .and(path(contents))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path(contents))
            .and(body_partial_json(json!({ "branch": "field-data" })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "content": { "path": "installs/logan/ps4.json" },
                "commit": { "sha": "d00d" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let (store, filename) = stored_record(&dir);
        let service = UploadService::new(store, settings(&server)).unwrap();

        let receipt = service
            .upload(UploadRecordCommand {
                filename,
                pdf: b"%PDF-1.4".to_vec(),
                ..UploadRecordCommand::default()
            })
            .await
            .unwrap();

        assert_eq!(receipt.path, "installs/logan/ps4.json");
        assert_eq!(receipt.commit_sha.as_deref(), Some("d00d"));
        assert_eq!(receipt.html_url, None);
    }

    #[tokio::test]
    async fn test_explicit_destination_overrides_defaults() {
        let server = MockServer::start().await;
        let contents = "/repos/other/archive/contents/2024/logan/ps4.json";
        Mock::given(method("GET"))
            .and(path(contents))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path(contents))
            .and(body_partial_json(json!({ "branch": "main" })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let (store, filename) = stored_record(&dir);
        let service = UploadService::new(store, settings(&server)).unwrap();

        let receipt = service
            .upload(UploadRecordCommand {
                filename,
                pdf: b"%PDF-1.4".to_vec(),
                repo: Some("other/archive".to_string()),
                branch: Some("main".to_string()),
                folder: Some("2024".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(receipt.path, "2024/logan/ps4.json");
    }

    #[tokio::test]
    async fn test_missing_repository_is_validation_error() {
        let server = MockServer::start().await;
        let mut settings = settings(&server);
        settings.default_repo = None;

        let dir = TempDir::new().unwrap();
        let (store, filename) = stored_record(&dir);
        let service = UploadService::new(store, settings).unwrap();

        let err = service
            .upload(UploadRecordCommand {
                filename,
                pdf: b"%PDF-1.4".to_vec(),
                ..UploadRecordCommand::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_unknown_record_is_not_found() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        let store = Arc::new(LocalFileStore::new(dir.path()));
        let service = UploadService::new(store, settings(&server)).unwrap();

        let err = service
            .upload(UploadRecordCommand {
                filename: "Logan_PS4_20240101_000000.json".to_string(),
                pdf: b"%PDF-1.4".to_vec(),
                ..UploadRecordCommand::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
