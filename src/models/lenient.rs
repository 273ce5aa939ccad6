//! Number parsing that tolerates the string-typed values older report files
//! were written with (`"gps_lat": "-27.470000"`, `"pipe_diameter_mm": ""`).

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

pub fn opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::Number(n) => Ok(n.as_f64()),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("expected a number, found {:?}", s))),
        other => Err(D::Error::custom(format!(
            "expected a number, found {}",
            other
        ))),
    }
}

pub fn f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(opt_f64(deserializer)?.unwrap_or_default())
}

pub fn u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = opt_f64(deserializer)?.unwrap_or_default();
    if value < 0.0 || value > u32::MAX as f64 {
        return Err(D::Error::custom(format!("{} is out of range", value)));
    }
    Ok(value.round() as u32)
}

/// Text field that older files may hold as `null` or as a bare number
pub fn string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(String::new()),
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(D::Error::custom(format!(
            "expected a string, found {}",
            other
        ))),
    }
}

/// `null` reads as the type's default
pub fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

pub fn bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(false),
        Value::Bool(b) => Ok(b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "" | "false" | "no" | "0" => Ok(false),
            "true" | "yes" | "1" => Ok(true),
            _ => Err(D::Error::custom(format!("expected a boolean, found {:?}", s))),
        },
        Value::Number(n) => Ok(n.as_f64().map(|v| v != 0.0).unwrap_or(false)),
        other => Err(D::Error::custom(format!(
            "expected a boolean, found {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct LegacyFields {
        #[serde(default, deserialize_with = "super::opt_f64")]
        lat: Option<f64>,
        #[serde(default, deserialize_with = "super::f64")]
        diameter: f64,
        #[serde(default, deserialize_with = "super::u32")]
        interval: u32,
        #[serde(default, deserialize_with = "super::bool")]
        flag: bool,
        #[serde(default, deserialize_with = "super::string")]
        note: String,
    }

    #[test]
    fn test_accepts_numbers_and_numeric_strings() {
        let fields: LegacyFields = serde_json::from_str(
            r#"{"lat": "-27.470000", "diameter": 375, "interval": "5", "flag": "Yes"}"#,
        )
        .unwrap();
        assert_eq!(fields.lat, Some(-27.47));
        assert_eq!(fields.diameter, 375.0);
        assert_eq!(fields.interval, 5);
        assert!(fields.flag);
    }

    #[test]
    fn test_empty_and_missing_values_default() {
        let fields: LegacyFields = serde_json::from_str(r#"{"lat": "", "diameter": null}"#).unwrap();
        assert_eq!(fields.lat, None);
        assert_eq!(fields.diameter, 0.0);
        assert_eq!(fields.interval, 0);
        assert!(!fields.flag);
    }

    #[test]
    fn test_null_and_numeric_text() {
        let fields: LegacyFields = serde_json::from_str(r#"{"note": null}"#).unwrap();
        assert_eq!(fields.note, "");

        let fields: LegacyFields = serde_json::from_str(r#"{"note": 1234}"#).unwrap();
        assert_eq!(fields.note, "1234");

        let result: Result<LegacyFields, _> = serde_json::from_str(r#"{"note": ["a"]}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_garbage() {
        let result: Result<LegacyFields, _> = serde_json::from_str(r#"{"diameter": "wide"}"#);
        assert!(result.is_err());
    }
}
