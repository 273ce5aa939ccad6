// Storage abstraction for report records

pub mod local;
pub mod query;

pub use local::LocalFileStore;
pub use query::SortKey;

use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use serde::Serialize;

use crate::error::AppResult;
use crate::models::{InstallationRecord, ReportSummary};

/// Filename timestamp; sorts lexicographically in chronological order
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Longest sanitized project/site component kept in a filename
const MAX_COMPONENT_CHARS: usize = 50;

static RE_UNSAFE_CHARS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s-]").unwrap());

static RE_SEPARATORS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[-\s]+").unwrap());

/// `_<YYYYMMDD_HHMMSS>[_<n>].json` at the end of a stored filename
static RE_FILENAME_STAMP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_(\d{8}_\d{6})(?:_(\d+))?\.json$").unwrap());

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A file that could not be read during a bulk scan
#[derive(Debug, Clone, PartialEq)]
pub struct ListWarning {
    pub filename: String,
    pub message: String,
}

impl fmt::Display for ListWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Could not load {}: {}", self.filename, self.message)
    }
}

/// Result of a bulk scan: everything readable, plus one warning per skipped file
#[derive(Debug, Clone, PartialEq)]
pub struct Listing<T> {
    pub items: Vec<T>,
    pub warnings: Vec<ListWarning>,
}

impl<T> Default for Listing<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

pub type RecordListing = Listing<ReportSummary>;

/// A stored record together with the filename it lives under
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredRecord {
    pub filename: String,
    pub record: InstallationRecord,
}

/// Record persistence. Filenames are bare names relative to the store root.
pub trait RecordStore {
    /// Write a new file and return its name. Stamps `created_at`/`updated_at`.
    fn save(&self, record: &mut InstallationRecord) -> AppResult<String>;

    /// Overwrite an existing file. Stamps `updated_at`.
    fn update(&self, filename: &str, record: &mut InstallationRecord) -> AppResult<()>;

    fn load(&self, filename: &str) -> AppResult<InstallationRecord>;

    fn list(&self) -> AppResult<RecordListing>;

    fn load_all(&self) -> AppResult<Listing<StoredRecord>>;

    fn delete(&self, filename: &str) -> AppResult<()>;
}

/// Make free text safe for use in a filename
pub fn sanitize_filename(text: &str) -> String {
    let stripped = RE_UNSAFE_CHARS.replace_all(text, "");
    let joined = RE_SEPARATORS.replace_all(&stripped, "_");
    let truncated: String = joined.chars().take(MAX_COMPONENT_CHARS).collect();
    if truncated.is_empty() {
        "unknown".to_string()
    } else {
        truncated
    }
}

/// Save time and collision counter encoded in a stored filename
pub fn filename_timestamp(filename: &str) -> Option<(DateTime<Utc>, u32)> {
    let caps = RE_FILENAME_STAMP.captures(filename)?;
    let saved_at = NaiveDateTime::parse_from_str(&caps[1], TIMESTAMP_FORMAT)
        .ok()?
        .and_utc();
    let counter = caps
        .get(2)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0);
    Some((saved_at, counter))
}

/// Chronological sort key. Files written without `created_at` fall back to
/// the timestamp in their name; files with neither sort oldest.
pub fn saved_order_key(
    filename: &str,
    created_at: Option<DateTime<Utc>>,
) -> (Option<DateTime<Utc>>, u32, &str) {
    let stamp = filename_timestamp(filename);
    (
        created_at.or(stamp.map(|(saved_at, _)| saved_at)),
        stamp.map_or(0, |(_, counter)| counter),
        filename,
    )
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("Test Project #123!"), "Test_Project_123");
        assert_eq!(
            sanitize_filename("Project with spaces and-dashes"),
            "Project_with_spaces_and_dashes"
        );
        assert_eq!(sanitize_filename("MH-27 / River Road"), "MH_27_River_Road");
    }

    #[test]
    fn test_sanitize_filename_limits_length() {
        let long_name = "a".repeat(100);
        assert_eq!(sanitize_filename(&long_name).chars().count(), 50);
    }

    #[test]
    fn test_sanitize_filename_never_empty() {
        assert_eq!(sanitize_filename("###"), "unknown");
        assert_eq!(sanitize_filename(""), "unknown");
    }

    #[test]
    fn test_filename_timestamp() {
        let at = Utc.with_ymd_and_hms(2024, 11, 3, 9, 15, 0).unwrap();
        assert_eq!(
            filename_timestamp("Brisbane_MH123_20241103_091500.json"),
            Some((at, 0))
        );
        assert_eq!(
            filename_timestamp("Brisbane_MH123_20241103_091500_012.json"),
            Some((at, 12))
        );
        assert_eq!(filename_timestamp("notes.json"), None);
        assert_eq!(filename_timestamp("Bad_MH1_20241399_999999.json"), None);
    }

    #[test]
    fn test_saved_order_key_prefers_created_at() {
        let created = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let legacy = saved_order_key("Zeta_MH1_20200101_080000.json", None);
        let recent = saved_order_key("Alpha_MH2_20241231_080000.json", None);
        let stamped = saved_order_key("Alpha_MH2_20190101_080000.json", Some(created));

        assert!(legacy < recent);
        assert!(recent < stamped);
        assert!(saved_order_key("undated.json", None) < legacy);
    }

    #[test]
    fn test_list_warning_display() {
        let warning = ListWarning {
            filename: "broken.json".to_string(),
            message: "expected value at line 1".to_string(),
        };
        assert_eq!(
            warning.to_string(),
            "Could not load broken.json: expected value at line 1"
        );
    }
}
