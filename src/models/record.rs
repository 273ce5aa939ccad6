use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::lenient;
use super::photo::Photo;
use super::summary::ReportSummary;
use crate::error::{AppError, AppResult};
use crate::hydraulics::{self, PrimaryReadings};

/// Overall suitability of a site for model calibration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CalibrationRating {
    #[default]
    Unrated,
    Good,
    Fair,
    Poor,
}

impl CalibrationRating {
    pub fn as_str(&self) -> &'static str {
        match self {
            CalibrationRating::Unrated => "",
            CalibrationRating::Good => "Good",
            CalibrationRating::Fair => "Fair",
            CalibrationRating::Poor => "Poor",
        }
    }
}

impl From<String> for CalibrationRating {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "good" => CalibrationRating::Good,
            "fair" => CalibrationRating::Fair,
            "poor" => CalibrationRating::Poor,
            _ => CalibrationRating::Unrated,
        }
    }
}

impl Serialize for CalibrationRating {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CalibrationRating {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.map(CalibrationRating::from).unwrap_or_default())
    }
}

/// One additional depth/velocity comparison taken during commissioning
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationReading {
    #[serde(deserialize_with = "lenient::f64")]
    pub depth_meas_mm: f64,
    #[serde(deserialize_with = "lenient::f64")]
    pub depth_meter_mm: f64,
    #[serde(deserialize_with = "lenient::f64")]
    pub vel_meas_ms: f64,
    #[serde(deserialize_with = "lenient::f64")]
    pub vel_meter_ms: f64,
    #[serde(deserialize_with = "lenient::string")]
    pub comment: String,
}

/// A flow-meter installation report, stored as one flat JSON object.
///
/// Every field has a default so partially filled or older files load; keys
/// this version does not know about are kept in `extra` and written back.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallationRecord {
    // Identity
    #[serde(deserialize_with = "lenient::string")]
    pub project_name: String,
    #[serde(deserialize_with = "lenient::string")]
    pub client: String,
    #[serde(deserialize_with = "lenient::string")]
    pub catchment: String,
    #[serde(deserialize_with = "lenient::string")]
    pub site_name: String,
    #[serde(deserialize_with = "lenient::string")]
    pub site_id: String,
    #[serde(deserialize_with = "lenient::string")]
    pub client_asset_id: String,
    #[serde(deserialize_with = "lenient::string")]
    pub gis_id: String,
    #[serde(deserialize_with = "lenient::string")]
    pub install_date: String,
    #[serde(deserialize_with = "lenient::string")]
    pub install_time: String,

    // Location
    #[serde(deserialize_with = "lenient::opt_f64")]
    pub gps_lat: Option<f64>,
    #[serde(deserialize_with = "lenient::opt_f64")]
    pub gps_lon: Option<f64>,
    #[serde(deserialize_with = "lenient::string")]
    pub site_address: String,
    #[serde(deserialize_with = "lenient::string")]
    pub manhole_location_desc: String,

    // Access
    #[serde(deserialize_with = "lenient::string")]
    pub access_type: String,
    #[serde(deserialize_with = "lenient::bool")]
    pub confined_space_required: bool,
    #[serde(deserialize_with = "lenient::bool")]
    pub traffic_control_required: bool,
    #[serde(deserialize_with = "lenient::string")]
    pub access_safety_constraints: String,
    #[serde(deserialize_with = "lenient::string")]
    pub other_permits_required: String,

    // Pipe & hydraulics
    #[serde(deserialize_with = "lenient::f64")]
    pub pipe_diameter_mm: f64,
    #[serde(deserialize_with = "lenient::string")]
    pub pipe_material: String,
    #[serde(deserialize_with = "lenient::string")]
    pub pipe_shape: String,
    #[serde(deserialize_with = "lenient::f64")]
    pub depth_to_invert_mm: f64,
    #[serde(deserialize_with = "lenient::f64")]
    pub depth_to_soffit_mm: f64,
    #[serde(deserialize_with = "lenient::string")]
    pub hydro_turbulence_level: String,
    #[serde(deserialize_with = "lenient::string")]
    pub upstream_config: String,
    #[serde(deserialize_with = "lenient::string")]
    pub downstream_config: String,
    #[serde(deserialize_with = "lenient::bool")]
    pub hydro_drops: bool,
    #[serde(deserialize_with = "lenient::bool")]
    pub hydro_bends: bool,
    #[serde(deserialize_with = "lenient::bool")]
    pub hydro_junctions: bool,
    #[serde(deserialize_with = "lenient::bool")]
    pub hydro_surcharge_risk: bool,
    #[serde(deserialize_with = "lenient::bool")]
    pub hydro_backwater_risk: bool,
    #[serde(deserialize_with = "lenient::string")]
    pub hydraulic_notes: String,

    // Meter & logger
    #[serde(deserialize_with = "lenient::string")]
    pub meter_model: String,
    #[serde(deserialize_with = "lenient::string")]
    pub logger_serial: String,
    #[serde(deserialize_with = "lenient::string")]
    pub sensor_serial: String,
    #[serde(deserialize_with = "lenient::f64")]
    pub sensor_distance_from_manhole_m: f64,
    #[serde(deserialize_with = "lenient::string")]
    pub sensor_orientation: String,
    #[serde(deserialize_with = "lenient::string")]
    pub sensor_mount_type: String,
    #[serde(deserialize_with = "lenient::string")]
    pub datum_reference_desc: String,
    #[serde(deserialize_with = "lenient::f64")]
    pub level_range_min_mm: f64,
    #[serde(deserialize_with = "lenient::f64")]
    pub level_range_max_mm: f64,
    #[serde(deserialize_with = "lenient::f64")]
    pub velocity_range_min_ms: f64,
    #[serde(deserialize_with = "lenient::f64")]
    pub velocity_range_max_ms: f64,
    #[serde(deserialize_with = "lenient::string")]
    pub output_scaling_desc: String,
    #[serde(deserialize_with = "lenient::u32")]
    pub logging_interval_min: u32,
    #[serde(deserialize_with = "lenient::string")]
    pub timezone: String,
    #[serde(deserialize_with = "lenient::string")]
    pub comms_method: String,
    #[serde(deserialize_with = "lenient::string")]
    pub telemetry_logger_id: String,
    #[serde(deserialize_with = "lenient::string")]
    pub telemetry_server: String,
    #[serde(deserialize_with = "lenient::string")]
    pub telemetry_notes: String,

    // Commissioning checks
    #[serde(deserialize_with = "lenient::f64")]
    pub depth_check_meas_mm: f64,
    #[serde(deserialize_with = "lenient::f64")]
    pub depth_check_meter_mm: f64,
    #[serde(deserialize_with = "lenient::f64")]
    pub depth_check_tolerance_mm: f64,
    #[serde(deserialize_with = "lenient::f64")]
    pub depth_check_diff_mm: f64,
    #[serde(deserialize_with = "lenient::bool")]
    pub depth_check_within_tol: bool,
    #[serde(deserialize_with = "lenient::f64")]
    pub vel_check_meas_ms: f64,
    #[serde(deserialize_with = "lenient::f64")]
    pub vel_check_meter_ms: f64,
    #[serde(deserialize_with = "lenient::f64")]
    pub vel_check_diff_ms: f64,
    #[serde(deserialize_with = "lenient::string")]
    pub comms_verified: String,
    #[serde(deserialize_with = "lenient::string")]
    pub comms_verified_at: String,
    #[serde(deserialize_with = "lenient::bool")]
    pub zero_depth_check_done: bool,
    #[serde(deserialize_with = "lenient::string")]
    pub zero_depth_check_notes: String,
    #[serde(deserialize_with = "lenient::string")]
    pub reference_device_type: String,
    #[serde(deserialize_with = "lenient::string")]
    pub reference_device_id: String,
    #[serde(deserialize_with = "lenient::string")]
    pub reference_reading_desc: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub verification_readings: Vec<VerificationReading>,

    // Derived flow
    #[serde(deserialize_with = "lenient::f64")]
    pub avg_depth_meas_mm: f64,
    #[serde(deserialize_with = "lenient::f64")]
    pub avg_depth_meter_mm: f64,
    #[serde(deserialize_with = "lenient::f64")]
    pub avg_vel_meas_ms: f64,
    #[serde(deserialize_with = "lenient::f64")]
    pub avg_vel_meter_ms: f64,
    #[serde(deserialize_with = "lenient::f64")]
    pub flow_meas_lps: f64,
    #[serde(deserialize_with = "lenient::f64")]
    pub flow_meter_lps: f64,
    #[serde(deserialize_with = "lenient::f64")]
    pub flow_diff_lps: f64,
    #[serde(deserialize_with = "lenient::f64")]
    pub flow_diff_percent: f64,

    // Calibration suitability
    pub calibration_rating: CalibrationRating,
    #[serde(deserialize_with = "lenient::string")]
    pub calibration_comment: String,
    #[serde(deserialize_with = "lenient::string")]
    pub modelling_notes: String,
    #[serde(deserialize_with = "lenient::string")]
    pub data_quality_risks: String,

    // Installation checklist
    #[serde(deserialize_with = "lenient::bool")]
    pub chk_sensor_in_main_flow: bool,
    #[serde(deserialize_with = "lenient::bool")]
    pub chk_no_immediate_drops: bool,
    #[serde(deserialize_with = "lenient::bool")]
    pub chk_depth_range_ok: bool,
    #[serde(deserialize_with = "lenient::bool")]
    pub chk_logging_started: bool,
    #[serde(deserialize_with = "lenient::bool")]
    pub chk_comms_checked_platform: bool,

    // Images
    pub diagram: Option<Photo>,
    #[serde(deserialize_with = "lenient::or_default")]
    pub photos: Vec<Photo>,

    // Sign-off
    #[serde(deserialize_with = "lenient::string")]
    pub prepared_by: String,
    #[serde(deserialize_with = "lenient::string")]
    pub prepared_position: String,
    #[serde(deserialize_with = "lenient::string")]
    pub prepared_date: String,
    #[serde(deserialize_with = "lenient::string")]
    pub reviewed_by: String,
    #[serde(deserialize_with = "lenient::string")]
    pub reviewed_position: String,
    #[serde(deserialize_with = "lenient::string")]
    pub reviewed_date: String,

    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl InstallationRecord {
    pub fn new(project_name: impl Into<String>, site_name: impl Into<String>) -> Self {
        Self {
            project_name: project_name.into(),
            site_name: site_name.into(),
            ..Default::default()
        }
    }

    /// Project and site name are required before a record can be stored or sent
    pub fn validate_identity(&self) -> AppResult<()> {
        if self.project_name.trim().is_empty() {
            return Err(AppError::Validation("project name is required".to_string()));
        }
        if self.site_name.trim().is_empty() {
            return Err(AppError::Validation("site name is required".to_string()));
        }
        Ok(())
    }

    /// Recompute the check differences and averaged flow figures
    pub fn refresh_derived(&mut self) {
        self.depth_check_diff_mm = self.depth_check_meter_mm - self.depth_check_meas_mm;
        self.depth_check_within_tol =
            self.depth_check_diff_mm.abs() <= self.depth_check_tolerance_mm;
        self.vel_check_diff_ms = self.vel_check_meter_ms - self.vel_check_meas_ms;

        let figures = hydraulics::calculate_flow(
            self.pipe_diameter_mm,
            PrimaryReadings {
                depth_meas_mm: self.depth_check_meas_mm,
                depth_meter_mm: self.depth_check_meter_mm,
                vel_meas_ms: self.vel_check_meas_ms,
                vel_meter_ms: self.vel_check_meter_ms,
            },
            &self.verification_readings,
        );
        self.avg_depth_meas_mm = figures.avg_depth_meas_mm;
        self.avg_depth_meter_mm = figures.avg_depth_meter_mm;
        self.avg_vel_meas_ms = figures.avg_vel_meas_ms;
        self.avg_vel_meter_ms = figures.avg_vel_meter_ms;
        self.flow_meas_lps = figures.flow_meas_lps;
        self.flow_meter_lps = figures.flow_meter_lps;
        self.flow_diff_lps = figures.flow_diff_lps;
        self.flow_diff_percent = figures.flow_diff_percent;
    }

    pub fn summary(&self, filename: &str) -> ReportSummary {
        ReportSummary {
            filename: filename.to_string(),
            project: self.project_name.clone(),
            site: self.site_name.clone(),
            site_id: self.site_id.clone(),
            client: self.client.clone(),
            date: self.install_date.clone(),
            calibration_rating: self.calibration_rating,
            created_at: self.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_default() {
        let record: InstallationRecord =
            serde_json::from_str(r#"{"project_name": "Brisbane", "site_name": "MH123"}"#).unwrap();
        assert_eq!(record.project_name, "Brisbane");
        assert_eq!(record.pipe_diameter_mm, 0.0);
        assert_eq!(record.gps_lat, None);
        assert!(record.photos.is_empty());
        assert_eq!(record.calibration_rating, CalibrationRating::Unrated);
    }

    #[test]
    fn test_unknown_keys_survive_round_trip() {
        let json = r#"{"project_name": "Brisbane", "site_name": "MH123", "legacy_flag": {"a": 1}}"#;
        let record: InstallationRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.extra.get("legacy_flag"), Some(&serde_json::json!({"a": 1})));

        let written = serde_json::to_value(&record).unwrap();
        assert_eq!(written["legacy_flag"], serde_json::json!({"a": 1}));
        assert_eq!(written["site_name"], "MH123");
    }

    #[test]
    fn test_string_typed_gps_from_older_files() {
        let record: InstallationRecord =
            serde_json::from_str(r#"{"gps_lat": "-27.470000", "gps_lon": "153.025100"}"#).unwrap();
        assert_eq!(record.gps_lat, Some(-27.47));
        assert_eq!(record.gps_lon, Some(153.0251));
    }

    #[test]
    fn test_calibration_rating_parsing() {
        let record: InstallationRecord =
            serde_json::from_str(r#"{"calibration_rating": "Good"}"#).unwrap();
        assert_eq!(record.calibration_rating, CalibrationRating::Good);

        let record: InstallationRecord =
            serde_json::from_str(r#"{"calibration_rating": "Excellent"}"#).unwrap();
        assert_eq!(record.calibration_rating, CalibrationRating::Unrated);

        let written = serde_json::to_value(CalibrationRating::Fair).unwrap();
        assert_eq!(written, "Fair");
    }

    #[test]
    fn test_null_values_from_older_files_load() {
        let record: InstallationRecord = serde_json::from_str(
            r#"{
                "project_name": "Logan",
                "site_name": "PS4",
                "client": null,
                "site_address": null,
                "photos": [{"name": "Lid", "data": null, "mime": null}],
                "verification_readings": null
            }"#,
        )
        .unwrap();

        assert_eq!(record.client, "");
        assert_eq!(record.site_address, "");
        assert_eq!(record.photos.len(), 1);
        assert_eq!(record.photos[0].caption, "Lid");
        assert!(!record.photos[0].has_image());
        assert!(record.verification_readings.is_empty());
    }

    #[test]
    fn test_identity_validation() {
        assert!(InstallationRecord::new("Brisbane", "MH123").validate_identity().is_ok());
        assert!(matches!(
            InstallationRecord::new("  ", "MH123").validate_identity(),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            InstallationRecord::new("Brisbane", "").validate_identity(),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_refresh_derived_checks() {
        let mut record = InstallationRecord::new("Brisbane", "MH123");
        record.pipe_diameter_mm = 300.0;
        record.depth_check_meas_mm = 100.0;
        record.depth_check_meter_mm = 104.0;
        record.depth_check_tolerance_mm = 5.0;
        record.vel_check_meas_ms = 0.5;
        record.vel_check_meter_ms = 0.5;

        record.refresh_derived();

        assert_eq!(record.depth_check_diff_mm, 4.0);
        assert!(record.depth_check_within_tol);
        assert_eq!(record.vel_check_diff_ms, 0.0);
        assert!(record.flow_meas_lps > 0.0);
        assert!(record.flow_meter_lps > record.flow_meas_lps);
    }
}
