//! Street address lookup for a GPS fix. Lookups are best effort: a failure
//! is logged and yields an empty address.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::http_client::HttpClient;
use crate::models::InstallationRecord;

pub const DEFAULT_GEOCODER_URL: &str = "https://nominatim.openstreetmap.org";

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

pub struct Geocoder {
    http: HttpClient,
    base_url: String,
}

impl Geocoder {
    pub fn new(base_url: &str, timeout: Duration) -> AppResult<Self> {
        Ok(Self {
            http: HttpClient::new(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Address for `lat`/`lon`, or an empty string when none could be found
    pub async fn reverse_geocode(&self, lat: f64, lon: f64) -> String {
        match self.lookup(lat, lon).await {
            Ok(address) => address,
            Err(e) => {
                tracing::warn!("Reverse geocoding failed for {}, {}: {}", lat, lon, e);
                String::new()
            }
        }
    }

    async fn lookup(&self, lat: f64, lon: f64) -> AppResult<String> {
        if !lat.is_finite() || !lon.is_finite() || lat.abs() > 90.0 || lon.abs() > 180.0 {
            return Err(AppError::Validation(format!(
                "coordinates out of range: {}, {}",
                lat, lon
            )));
        }

        let url = format!("{}/reverse", self.base_url);
        let (lat, lon) = (lat.to_string(), lon.to_string());
        let response = self
            .http
            .get_public(
                &url,
                &[
                    ("format", "jsonv2"),
                    ("lat", &lat),
                    ("lon", &lon),
                    ("accept-language", "en"),
                ],
            )
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Network(format!("geocoder returned {}", status)));
        }

        let body: ReverseResponse = response.json().await?;
        if let Some(error) = body.error {
            return Err(AppError::NotFound(error));
        }
        Ok(body.display_name.map(|s| s.trim().to_string()).unwrap_or_default())
    }

    /// Fill an empty site address from the record's GPS fix. Returns whether
    /// the address was changed.
    pub async fn fill_site_address(&self, record: &mut InstallationRecord) -> bool {
        if !record.site_address.trim().is_empty() {
            return false;
        }
        let (Some(lat), Some(lon)) = (record.gps_lat, record.gps_lon) else {
            return false;
        };

        let address = self.reverse_geocode(lat, lon).await;
        if address.is_empty() {
            return false;
        }
        tracing::info!("Site address filled from GPS: {}", address);
        record.site_address = address;
        true
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    const RIVER_ROAD: &str = "14 River Road, Kangaroo Point, Brisbane QLD 4169, Australia";

    fn geocoder(server: &MockServer) -> Geocoder {
        Geocoder::new(&server.uri(), Duration::from_secs(5)).unwrap()
    }

    fn located_record() -> InstallationRecord {
        let mut record = InstallationRecord::new("Northside", "River Road");
        record.gps_lat = Some(-27.4705);
        record.gps_lon = Some(153.026);
        record
    }

    async fn mount_address(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/reverse"))
            .and(query_param("format", "jsonv2"))
            .and(query_param("lat", "-27.4705"))
            .and(query_param("lon", "153.026"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "place_id": 1,
                "display_name": RIVER_ROAD
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_reverse_geocode_returns_display_name() {
        let server = MockServer::start().await;
        mount_address(&server).await;

        let address = geocoder(&server).reverse_geocode(-27.4705, 153.026).await;
        assert_eq!(address, RIVER_ROAD);
    }

    #[tokio::test]
    async fn test_server_error_yields_empty_address() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        assert_eq!(geocoder(&server).reverse_geocode(-27.4705, 153.026).await, "");
    }

    #[tokio::test]
    async fn test_unable_to_geocode_yields_empty_address() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "error": "Unable to geocode" })),
            )
            .mount(&server)
            .await;

        assert_eq!(geocoder(&server).reverse_geocode(0.0, 0.0).await, "");
    }

    #[tokio::test]
    async fn test_out_of_range_coordinates_skip_the_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let geocoder = geocoder(&server);
        assert_eq!(geocoder.reverse_geocode(95.0, 10.0).await, "");
        assert_eq!(geocoder.reverse_geocode(f64::NAN, 10.0).await, "");
    }

    #[tokio::test]
    async fn test_fill_site_address_from_gps() {
        let server = MockServer::start().await;
        mount_address(&server).await;

        let mut record = located_record();
        assert!(geocoder(&server).fill_site_address(&mut record).await);
        assert_eq!(record.site_address, RIVER_ROAD);
    }

    #[tokio::test]
    async fn test_existing_address_or_missing_gps_left_alone() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let geocoder = geocoder(&server);

        let mut addressed = located_record();
        addressed.site_address = "Depot gate".to_string();
        assert!(!geocoder.fill_site_address(&mut addressed).await);
        assert_eq!(addressed.site_address, "Depot gate");

        let mut no_fix = located_record();
        no_fix.gps_lon = None;
        assert!(!geocoder.fill_site_address(&mut no_fix).await);
        assert_eq!(no_fix.site_address, "");
    }

    #[tokio::test]
    async fn test_failed_lookup_keeps_address_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let mut record = located_record();
        assert!(!geocoder(&server).fill_site_address(&mut record).await);
        assert_eq!(record.site_address, "");
    }
}
