//! Upload payload: record metadata without image bytes, plus the rendered PDF.

use std::sync::LazyLock;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::config::DEFAULT_FOLDER;
use crate::error::{AppError, AppResult};
use crate::models::{InstallationRecord, Photo};

pub const BUNDLE_VERSION: u32 = 1;

static RE_NON_ALNUM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^A-Za-z0-9]+").unwrap());

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportBundle {
    pub bundle_version: u32,
    pub site: Map<String, Value>,
    pub pdf_base64: String,
}

/// Lowercase, dash-separated path component; `fallback` when nothing is left
pub fn slugify_path_component(value: &str, fallback: &str) -> String {
    let text = match value.trim() {
        "" => fallback,
        trimmed => trimmed,
    };
    let slug = RE_NON_ALNUM
        .replace_all(text, "-")
        .trim_matches('-')
        .to_lowercase();
    if slug.is_empty() {
        fallback.to_lowercase()
    } else {
        slug
    }
}

/// `<folder>/<project-slug>/<site-slug>.json`
pub fn storage_path(record: &InstallationRecord, base_folder: &str) -> String {
    let folder = base_folder.trim().trim_matches('/');
    let folder = if folder.is_empty() { DEFAULT_FOLDER } else { folder };
    format!(
        "{}/{}/{}.json",
        folder,
        slugify_path_component(&record.project_name, "project"),
        slugify_path_component(&record.site_name, "site")
    )
}

fn image_metadata(photo: &Photo, fallback_caption: &str) -> AppResult<Value> {
    let caption = match photo.caption.trim() {
        "" => fallback_caption,
        trimmed => trimmed,
    };
    let mut entry = json!({
        "caption": caption,
        "mime": photo.mime,
    });
    if photo.has_image() {
        let (sha256, size_bytes) = photo
            .digest()
            .map_err(|e| AppError::Validation(format!("cannot bundle image: {}", e)))?;
        entry["sha256"] = json!(sha256);
        entry["size_bytes"] = json!(size_bytes);
    }
    Ok(entry)
}

pub fn build_bundle(
    record: &InstallationRecord,
    pdf: &[u8],
    generated_at: DateTime<Utc>,
) -> AppResult<ReportBundle> {
    if pdf.is_empty() {
        return Err(AppError::Validation("rendered PDF is empty".to_string()));
    }

    let mut site = match serde_json::to_value(record) {
        Ok(Value::Object(map)) => map,
        Ok(_) => return Err(AppError::Internal("record did not serialize to an object".to_string())),
        Err(e) => return Err(AppError::Internal(format!("record serialization failed: {}", e))),
    };
    site.remove("photos");
    site.remove("diagram");

    if !record.photos.is_empty() {
        let photos = record
            .photos
            .iter()
            .map(|p| image_metadata(p, "Site photo"))
            .collect::<AppResult<Vec<_>>>()?;
        site.insert("photos_metadata".to_string(), Value::Array(photos));
    }
    if let Some(diagram) = &record.diagram {
        site.insert(
            "diagram_metadata".to_string(),
            image_metadata(diagram, "Site diagram")?,
        );
    }
    site.insert(
        "bundle_generated_at_utc".to_string(),
        json!(generated_at.to_rfc3339()),
    );

    Ok(ReportBundle {
        bundle_version: BUNDLE_VERSION,
        site,
        pdf_base64: BASE64.encode(pdf),
    })
}
