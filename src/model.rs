/// Shared data types for the level monitoring pipeline.
///
/// Everything that crosses a stage boundary lives here: the raw provider
/// reading, the calibrated level, the two output records (local snapshot and
/// published payload) and the per-stage error taxonomy.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::Serialize;

// ---------------------------------------------------------------------------
// Readings
// ---------------------------------------------------------------------------

/// The newest telemetric item selected from an ANA series response.
///
/// Values are kept exactly as the provider reported them; parsing happens in
/// the level converter so that a bad value surfaces as a conversion failure
/// rather than a fetch failure.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    /// `Cota_Adotada`, centimeters. `None` when the station reported null.
    pub raw_gauge_value: Option<String>,
    /// `Data_Hora_Medicao`, e.g. `"2024-06-01 10:00:00.123"`.
    pub measured_at: String,
}

/// A gauge reading converted to meters with the deployment offset applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibratedLevel {
    pub meters: Decimal,
    pub measured_at: NaiveDateTime,
}

// ---------------------------------------------------------------------------
// Output records
// ---------------------------------------------------------------------------

/// `nivel` in the local cache file: either the raw meters as a JSON number or
/// the `"X.XXm"` text used by the Guaíba collector.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SnapshotLevel {
    Number(f64),
    Text(String),
}

/// Local diagnostic cache, overwritten every cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub nivel: SnapshotLevel,
    /// `DD/MM/YYYY HH:MM`
    pub data_medicao: String,
}

/// The single record written to the remote store on every publish.
///
/// Field names are the ones the consumer app reads.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishedPayload {
    pub nivel: f64,
    /// `HH:MM DD-MM-YYYY`, wall clock at publish time.
    pub timestamp: String,
    #[serde(rename = "labelVersao")]
    pub label_version: String,
    #[serde(rename = "labelCotaAlerta")]
    pub label_alert: String,
    #[serde(rename = "labelCotaInundacao")]
    pub label_flood: String,
    #[serde(rename = "labelEstacao")]
    pub label_station: String,
    #[serde(rename = "labelFree")]
    pub label_disclaimer: String,
    #[serde(rename = "gAlerta")]
    pub alert_threshold: f64,
    #[serde(rename = "gInundacao")]
    pub flood_threshold: f64,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure of a single pipeline stage. Every variant carries enough context
/// to tell which input broke it.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorError {
    /// Token request rejected, unreachable, or missing `tokenautenticacao`.
    AuthFailure(String),
    /// Transport error, timeout, non-success status, or malformed body.
    FetchFailure(String),
    /// The series endpoint returned an empty `items` list.
    NoDataAvailable(String),
    /// Raw gauge value or measurement timestamp could not be parsed.
    ConversionFailure(String),
    /// Remote store unreachable or rejected the write.
    PublishFailure(String),
    /// Local cache file could not be written.
    LocalWriteFailure(String),
}

impl MonitorError {
    /// Short stage name used as a structured log field.
    pub fn stage(&self) -> &'static str {
        match self {
            MonitorError::AuthFailure(_) => "authenticate",
            MonitorError::FetchFailure(_) => "fetch",
            MonitorError::NoDataAvailable(_) => "fetch",
            MonitorError::ConversionFailure(_) => "convert",
            MonitorError::PublishFailure(_) => "publish",
            MonitorError::LocalWriteFailure(_) => "snapshot",
        }
    }
}

impl std::fmt::Display for MonitorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MonitorError::AuthFailure(msg) => write!(f, "Authentication failed: {}", msg),
            MonitorError::FetchFailure(msg) => write!(f, "Fetch failed: {}", msg),
            MonitorError::NoDataAvailable(msg) => write!(f, "No data available: {}", msg),
            MonitorError::ConversionFailure(msg) => write!(f, "Conversion failed: {}", msg),
            MonitorError::PublishFailure(msg) => write!(f, "Publish failed: {}", msg),
            MonitorError::LocalWriteFailure(msg) => write!(f, "Local snapshot write failed: {}", msg),
        }
    }
}

impl std::error::Error for MonitorError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names() {
        assert_eq!(MonitorError::AuthFailure("x".into()).stage(), "authenticate");
        assert_eq!(MonitorError::NoDataAvailable("x".into()).stage(), "fetch");
        assert_eq!(MonitorError::LocalWriteFailure("x".into()).stage(), "snapshot");
    }

    #[test]
    fn test_display_includes_context() {
        let err = MonitorError::ConversionFailure("bad value 'abc'".to_string());
        assert_eq!(err.to_string(), "Conversion failed: bad value 'abc'");
    }

    #[test]
    fn test_snapshot_level_serializes_untagged() {
        let number = serde_json::to_string(&SnapshotLevel::Number(3.15)).unwrap();
        let text = serde_json::to_string(&SnapshotLevel::Text("2.77m".into())).unwrap();
        assert_eq!(number, "3.15");
        assert_eq!(text, "\"2.77m\"");
    }

    #[test]
    fn test_payload_uses_consumer_field_names() {
        let payload = PublishedPayload {
            nivel: 3.15,
            timestamp: "10:00 01-06-2024".into(),
            label_version: "v".into(),
            label_alert: "a".into(),
            label_flood: "f".into(),
            label_station: "s".into(),
            label_disclaimer: "d".into(),
            alert_threshold: 3.15,
            flood_threshold: 3.6,
        };
        let value = serde_json::to_value(&payload).unwrap();
        for key in [
            "nivel", "timestamp", "labelVersao", "labelCotaAlerta", "labelCotaInundacao",
            "labelEstacao", "labelFree", "gAlerta", "gInundacao",
        ] {
            assert!(value.get(key).is_some(), "payload missing '{}'", key);
        }
    }
}
