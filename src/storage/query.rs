//! In-memory search and ordering over listed summaries. There is no index;
//! every call works on a fresh `list()` of the directory.

use std::cmp::Ordering;
use std::str::FromStr;

use crate::error::AppError;
use crate::models::ReportSummary;
use crate::storage::saved_order_key;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Newest,
    Oldest,
    Project,
    Site,
}

impl FromStr for SortKey {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "newest" | "date" => Ok(SortKey::Newest),
            "oldest" => Ok(SortKey::Oldest),
            "project" => Ok(SortKey::Project),
            "site" => Ok(SortKey::Site),
            other => Err(AppError::Validation(format!(
                "unknown sort key '{}' (expected newest, oldest, project or site)",
                other
            ))),
        }
    }
}

/// Case-insensitive substring match on project, site, client and site ID.
/// An empty term matches everything.
pub fn matches_term(summary: &ReportSummary, term: &str) -> bool {
    let needle = term.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    [
        &summary.project,
        &summary.site,
        &summary.client,
        &summary.site_id,
    ]
    .iter()
    .any(|field| field.to_lowercase().contains(&needle))
}

pub fn filter<P>(summaries: Vec<ReportSummary>, predicate: P) -> Vec<ReportSummary>
where
    P: Fn(&ReportSummary) -> bool,
{
    summaries.into_iter().filter(|s| predicate(s)).collect()
}

pub fn search(summaries: Vec<ReportSummary>, term: &str) -> Vec<ReportSummary> {
    filter(summaries, |s| matches_term(s, term))
}

fn chronological(a: &ReportSummary, b: &ReportSummary) -> Ordering {
    saved_order_key(&a.filename, a.created_at).cmp(&saved_order_key(&b.filename, b.created_at))
}

pub fn sort(summaries: &mut [ReportSummary], key: SortKey) {
    match key {
        SortKey::Newest => summaries.sort_by(|a, b| chronological(b, a)),
        SortKey::Oldest => summaries.sort_by(chronological),
        SortKey::Project => summaries.sort_by_key(|s| (s.project.to_lowercase(), s.site.to_lowercase())),
        SortKey::Site => summaries.sort_by_key(|s| (s.site.to_lowercase(), s.project.to_lowercase())),
    }
}
