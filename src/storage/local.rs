use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};
use crate::models::InstallationRecord;

use super::{
    query, sanitize_filename, saved_order_key, Clock, ListWarning, Listing, RecordListing,
    RecordStore, SortKey, StoredRecord, SystemClock, TIMESTAMP_FORMAT,
};

/// Directory of `<project>_<site>_<timestamp>.json` files, one per record.
///
/// No locking: a concurrent writer on the same directory wins the last write.
pub struct LocalFileStore<C: Clock = SystemClock> {
    root: PathBuf,
    clock: C,
}

impl LocalFileStore<SystemClock> {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_clock(root, SystemClock)
    }
}

impl<C: Clock> LocalFileStore<C> {
    pub fn with_clock(root: impl Into<PathBuf>, clock: C) -> Self {
        Self {
            root: root.into(),
            clock,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn ensure_root(&self) -> AppResult<()> {
        fs::create_dir_all(&self.root).map_err(|e| {
            AppError::Write(format!(
                "cannot create reports directory {}: {}",
                self.root.display(),
                e
            ))
        })
    }

    /// Map a caller-supplied filename to a path inside the root
    fn resolve(&self, filename: &str) -> AppResult<PathBuf> {
        let invalid = filename.is_empty()
            || filename.starts_with('.')
            || filename.contains(['/', '\\'])
            || !filename.ends_with(".json");
        if invalid {
            return Err(AppError::Validation(format!(
                "'{}' is not a report filename",
                filename
            )));
        }
        Ok(self.root.join(filename))
    }

    /// First `<stem>.json`, `<stem>_001.json`, ... not already on disk.
    /// The counter is zero-padded so names keep sorting in save order.
    fn unused_filename(&self, stem: &str) -> String {
        let mut candidate = format!("{}.json", stem);
        let mut n = 1;
        while self.root.join(&candidate).exists() {
            candidate = format!("{}_{:03}.json", stem, n);
            n += 1;
        }
        candidate
    }

    /// Write through a temporary sibling and rename, so readers never see a
    /// half-written file and a failed write leaves the old content in place.
    fn write_atomic(&self, path: &Path, record: &InstallationRecord) -> AppResult<()> {
        let json = serde_json::to_vec_pretty(record)
            .map_err(|e| AppError::Internal(format!("record serialization failed: {}", e)))?;

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("report.json");
        let tmp = self
            .root
            .join(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4().simple()));

        if let Err(e) = fs::write(&tmp, &json) {
            let _ = fs::remove_file(&tmp);
            return Err(AppError::Write(format!("{}: {}", path.display(), e)));
        }
        if let Err(e) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(AppError::Write(format!("{}: {}", path.display(), e)));
        }
        Ok(())
    }

    fn read_record(path: &Path, filename: &str) -> AppResult<InstallationRecord> {
        let content = fs::read_to_string(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => AppError::NotFound(filename.to_string()),
            _ => AppError::Storage(format!("{}: {}", filename, e)),
        })?;
        serde_json::from_str(&content).map_err(|e| AppError::Parse(format!("{}: {}", filename, e)))
    }

    /// Report files in the root
    fn report_files(&self) -> AppResult<Vec<(String, PathBuf)>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(AppError::Storage(format!(
                    "cannot read reports directory {}: {}",
                    self.root.display(),
                    e
                )))
            }
        };

        let mut files: Vec<(String, PathBuf)> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter_map(|entry| {
                let name = entry.file_name().to_str()?.to_string();
                let is_report = name.ends_with(".json") && !name.starts_with('.');
                is_report.then(|| (name, entry.path()))
            })
            .collect();
        Ok(files)
    }

    fn scan<T>(
        &self,
        mut convert: impl FnMut(String, InstallationRecord) -> T,
    ) -> AppResult<Listing<T>> {
        let mut listing = Listing::default();
        for (filename, path) in self.report_files()? {
            match Self::read_record(&path, &filename) {
                Ok(record) => listing.items.push(convert(filename, record)),
                Err(e) => {
                    tracing::warn!("Skipping unreadable report: file={}, error={}", filename, e);
                    listing.warnings.push(ListWarning {
                        filename,
                        message: e.to_string(),
                    });
                }
            }
        }
        Ok(listing)
    }
}

impl<C: Clock> RecordStore for LocalFileStore<C> {
    fn save(&self, record: &mut InstallationRecord) -> AppResult<String> {
        record.validate_identity()?;
        self.ensure_root()?;

        let now = self.clock.now();
        let stem = format!(
            "{}_{}_{}",
            sanitize_filename(&record.project_name),
            sanitize_filename(&record.site_name),
            now.format(TIMESTAMP_FORMAT)
        );
        let filename = self.unused_filename(&stem);

        let previous = (record.created_at, record.updated_at);
        record.created_at = Some(now);
        record.updated_at = Some(now);
        if let Err(e) = self.write_atomic(&self.root.join(&filename), record) {
            (record.created_at, record.updated_at) = previous;
            return Err(e);
        }

        tracing::info!(
            "Report saved: file={}, project={}, site={}",
            filename,
            record.project_name,
            record.site_name
        );
        Ok(filename)
    }

    fn update(&self, filename: &str, record: &mut InstallationRecord) -> AppResult<()> {
        let path = self.resolve(filename)?;
        if !path.is_file() {
            return Err(AppError::NotFound(filename.to_string()));
        }
        record.validate_identity()?;

        let previous = (record.created_at, record.updated_at);
        if record.created_at.is_none() {
            record.created_at = Self::read_record(&path, filename)
                .ok()
                .and_then(|stored| stored.created_at);
        }
        record.updated_at = Some(self.clock.now());
        if let Err(e) = self.write_atomic(&path, record) {
            (record.created_at, record.updated_at) = previous;
            return Err(e);
        }

        tracing::info!("Report updated: file={}", filename);
        Ok(())
    }

    fn load(&self, filename: &str) -> AppResult<InstallationRecord> {
        let path = self.resolve(filename)?;
        tracing::debug!("Loading report: file={}", filename);
        Self::read_record(&path, filename)
    }

    fn list(&self) -> AppResult<RecordListing> {
        let mut listing = self.scan(|filename, record| record.summary(&filename))?;
        query::sort(&mut listing.items, SortKey::Newest);
        Ok(listing)
    }

    fn load_all(&self) -> AppResult<Listing<StoredRecord>> {
        let mut listing = self.scan(|filename, record| StoredRecord { filename, record })?;
        listing.items.sort_by(|a, b| {
            saved_order_key(&b.filename, b.record.created_at)
                .cmp(&saved_order_key(&a.filename, a.record.created_at))
        });
        Ok(listing)
    }

    fn delete(&self, filename: &str) -> AppResult<()> {
        let path = self.resolve(filename)?;
        fs::remove_file(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => AppError::NotFound(filename.to_string()),
            _ => AppError::Write(format!("cannot delete {}: {}", filename, e)),
        })?;

        tracing::info!("Report deleted: file={}", filename);
        Ok(())
    }
}
