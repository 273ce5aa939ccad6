use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::models::InstallationRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    ProjectName,
    Client,
    SiteName,
    SiteId,
    ClientAssetId,
    GisId,
    InstallDate,
    InstallTime,
    GpsLat,
    GpsLon,
    LocationDesc,
    PreparedBy,
}

/// Label variants as printed on generated reports, longest first so that
/// "Project name" wins over "Project" on the same line
const LABELS: &[(Field, &[&str])] = &[
    (Field::ProjectName, &["Project name", "Project"]),
    (Field::Client, &["Client"]),
    (Field::SiteName, &["Site / manhole name", "Site name", "Site"]),
    (Field::SiteId, &["Manhole number", "Site ID", "SiteID", "Manhole"]),
    (Field::ClientAssetId, &["Client asset ID"]),
    (Field::GisId, &["GIS ID"]),
    (Field::InstallDate, &["Install date", "Installed on"]),
    (Field::InstallTime, &["Install time"]),
    (Field::GpsLat, &["GPS latitude", "Lat"]),
    (Field::GpsLon, &["GPS longitude", "Lon"]),
    (Field::LocationDesc, &["Location description", "Location"]),
    (Field::PreparedBy, &["Prepared by"]),
];

struct LabelPattern {
    field: Field,
    /// `Label: value`
    with_colon: Regex,
    /// `Label value`, table layout
    bare: Regex,
}

static LABEL_PATTERNS: LazyLock<Vec<LabelPattern>> = LazyLock::new(|| {
    LABELS
        .iter()
        .map(|(field, variants)| {
            let alternatives = variants
                .iter()
                .map(|v| regex::escape(v))
                .collect::<Vec<_>>()
                .join("|");
            LabelPattern {
                field: *field,
                with_colon: Regex::new(&format!(r"(?im)^[ \t]*(?:{})[ \t]*:[ \t]*(.+)$", alternatives))
                    .unwrap(),
                bare: Regex::new(&format!(r"(?im)^[ \t]*(?:{})[ \t]+(.+)$", alternatives)).unwrap(),
            }
        })
        .collect()
});

/// Bare `lat, lon` decimal pair anywhere in the text
static RE_COORDINATE_PAIR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([+-]?\d+\.\d+)\s*[,:\s]\s*([+-]?\d+\.\d+)").unwrap()
});

/// Values recovered from a previously generated report. Only fields that
/// were found are set.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportedFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_asset_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gis_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub install_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub install_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gps_lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gps_lon: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manhole_location_desc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prepared_by: Option<String>,
}

impl ImportedFields {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn set(&mut self, field: Field, value: String) {
        match field {
            Field::ProjectName => self.project_name = Some(value),
            Field::Client => self.client = Some(value),
            Field::SiteName => self.site_name = Some(value),
            Field::SiteId => self.site_id = Some(value),
            Field::ClientAssetId => self.client_asset_id = Some(value),
            Field::GisId => self.gis_id = Some(value),
            Field::InstallDate => self.install_date = Some(value),
            Field::InstallTime => self.install_time = Some(value),
            Field::GpsLat => self.gps_lat = value.parse().ok(),
            Field::GpsLon => self.gps_lon = value.parse().ok(),
            Field::LocationDesc => self.manhole_location_desc = Some(value),
            Field::PreparedBy => self.prepared_by = Some(value),
        }
    }

    /// Copy every found value onto `record`, leaving the rest untouched
    pub fn apply_to(&self, record: &mut InstallationRecord) {
        fn copy(target: &mut String, value: &Option<String>) {
            if let Some(v) = value {
                *target = v.clone();
            }
        }

        copy(&mut record.project_name, &self.project_name);
        copy(&mut record.client, &self.client);
        copy(&mut record.site_name, &self.site_name);
        copy(&mut record.site_id, &self.site_id);
        copy(&mut record.client_asset_id, &self.client_asset_id);
        copy(&mut record.gis_id, &self.gis_id);
        copy(&mut record.install_date, &self.install_date);
        copy(&mut record.install_time, &self.install_time);
        copy(&mut record.manhole_location_desc, &self.manhole_location_desc);
        copy(&mut record.prepared_by, &self.prepared_by);
        if self.gps_lat.is_some() {
            record.gps_lat = self.gps_lat;
        }
        if self.gps_lon.is_some() {
            record.gps_lon = self.gps_lon;
        }
    }
}

fn clean_value(raw: &str) -> String {
    raw.trim().trim_end_matches([';', '.', ',']).trim_end().to_string()
}

fn find_label(text: &str, pattern: &LabelPattern) -> Option<String> {
    [&pattern.with_colon, &pattern.bare]
        .into_iter()
        .find_map(|re| re.captures(text))
        .map(|caps| clean_value(&caps[1]))
        .filter(|v| !v.is_empty())
}

/// Recover prefill values from the text of a generated report
pub fn parse_report_text(text: &str) -> ImportedFields {
    let mut fields = ImportedFields::default();

    for pattern in LABEL_PATTERNS.iter() {
        if let Some(value) = find_label(text, pattern) {
            fields.set(pattern.field, value);
        }
    }

    if fields.gps_lat.is_none() || fields.gps_lon.is_none() {
        if let Some(caps) = RE_COORDINATE_PAIR.captures(text) {
            if fields.gps_lat.is_none() {
                fields.gps_lat = caps[1].parse().ok();
            }
            if fields.gps_lon.is_none() {
                fields.gps_lon = caps[2].parse().ok();
            }
        }
    }

    fields
}

/// Extract the text of a PDF report and parse it
pub fn parse_pdf_report(pdf: &[u8]) -> AppResult<ImportedFields> {
    let text = pdf_extract::extract_text_from_mem(pdf)
        .map_err(|e| AppError::Parse(format!("could not read PDF text: {}", e)))?;

    if text.trim().is_empty() {
        tracing::debug!("PDF has no extractable text, nothing to import");
        return Ok(ImportedFields::default());
    }

    let fields = parse_report_text(&text);
    tracing::info!(
        "Imported report fields: project={:?}, site={:?}",
        fields.project_name,
        fields.site_name
    );
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT_TEXT: &str = "\
Sewer Flow Meter Installation Report
Project name: Northside Expansion
Client: Urban Utilities
Site / manhole name: River Road
Site ID: MH-27
Client asset ID: UU-4411
GIS ID: 99812
Install date: 2024-11-03.
Install time: 09:15
GPS latitude: -27.4705
GPS longitude: 153.0260
Location description: Footpath outside no. 14;
Prepared by: J. Citizen
";

    #[test]
    fn test_parse_labelled_report() {
        let fields = parse_report_text(REPORT_TEXT);

        assert_eq!(fields.project_name.as_deref(), Some("Northside Expansion"));
        assert_eq!(fields.client.as_deref(), Some("Urban Utilities"));
        assert_eq!(fields.site_name.as_deref(), Some("River Road"));
        assert_eq!(fields.site_id.as_deref(), Some("MH-27"));
        assert_eq!(fields.client_asset_id.as_deref(), Some("UU-4411"));
        assert_eq!(fields.gis_id.as_deref(), Some("99812"));
        assert_eq!(fields.install_date.as_deref(), Some("2024-11-03"));
        assert_eq!(fields.install_time.as_deref(), Some("09:15"));
        assert_eq!(fields.gps_lat, Some(-27.4705));
        assert_eq!(fields.gps_lon, Some(153.026));
        assert_eq!(
            fields.manhole_location_desc.as_deref(),
            Some("Footpath outside no. 14")
        );
        assert_eq!(fields.prepared_by.as_deref(), Some("J. Citizen"));
    }

    #[test]
    fn test_labels_are_case_insensitive_and_table_layout_works() {
        let fields = parse_report_text("PROJECT   Logan Upgrade\nsite name    PS4 inlet\n");
        assert_eq!(fields.project_name.as_deref(), Some("Logan Upgrade"));
        assert_eq!(fields.site_name.as_deref(), Some("PS4 inlet"));
    }

    #[test]
    fn test_site_id_line_does_not_fill_site_name() {
        let fields = parse_report_text("Site ID: MH-27\nSite: River Road\n");
        assert_eq!(fields.site_id.as_deref(), Some("MH-27"));
        assert_eq!(fields.site_name.as_deref(), Some("River Road"));
    }

    #[test]
    fn test_coordinate_pair_fallback() {
        let fields = parse_report_text("Project: Northside\nMap pin -27.4705, 153.0260\n");
        assert_eq!(fields.gps_lat, Some(-27.4705));
        assert_eq!(fields.gps_lon, Some(153.026));
    }

    #[test]
    fn test_fallback_only_fills_missing_coordinate() {
        let fields = parse_report_text("GPS latitude: -27.5\nnear -1.25, 2.75\n");
        assert_eq!(fields.gps_lat, Some(-27.5));
        assert_eq!(fields.gps_lon, Some(2.75));
    }

    #[test]
    fn test_unrelated_text_yields_nothing() {
        assert!(parse_report_text("Quarterly invoice\nTotal 42\n").is_empty());
    }

    #[test]
    fn test_apply_to_fills_only_found_fields() {
        let mut record = InstallationRecord::new("Old project", "Old site");
        record.client = "Keep me".to_string();
        record.gps_lon = Some(150.0);

        let fields = ImportedFields {
            project_name: Some("Northside".to_string()),
            gps_lat: Some(-27.0),
            ..ImportedFields::default()
        };
        fields.apply_to(&mut record);

        assert_eq!(record.project_name, "Northside");
        assert_eq!(record.site_name, "Old site");
        assert_eq!(record.client, "Keep me");
        assert_eq!(record.gps_lat, Some(-27.0));
        assert_eq!(record.gps_lon, Some(150.0));
    }

    #[test]
    fn test_unreadable_pdf_is_parse_error() {
        let result = parse_pdf_report(b"not a pdf at all");
        assert!(matches!(result, Err(AppError::Parse(_))));
    }
}
