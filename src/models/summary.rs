use chrono::{DateTime, Utc};
use serde::Serialize;

use super::record::CalibrationRating;

/// Lightweight listing entry for a stored record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSummary {
    pub filename: String,
    pub project: String,
    pub site: String,
    pub site_id: String,
    pub client: String,
    pub date: String,
    pub calibration_rating: CalibrationRating,
    pub created_at: Option<DateTime<Utc>>,
}

fn or_unknown<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}

impl ReportSummary {
    /// "<project> - <site> (<date>)"
    pub fn display_line(&self) -> String {
        format!(
            "{} - {} ({})",
            or_unknown(&self.project, "Unknown Project"),
            or_unknown(&self.site, "Unknown Site"),
            or_unknown(&self.date, "Unknown Date"),
        )
    }
}
