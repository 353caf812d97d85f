/// Remote real-time store publishing (Firebase Realtime Database REST).
///
/// The store is a set-and-overwrite sink: each publish replaces the whole
/// monitored record with the current level plus the static labels. There is
/// no merge, history or partial update.
///
/// The store target (database URL and optional auth secret) lives in its own
/// JSON file. If it cannot be loaded at startup the publisher keeps trying on
/// every publish attempt instead of stopping the service.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, LabelConfig};
use crate::model::{MonitorError, PublishedPayload};

const PUBLISH_TIMESTAMP_FORMAT: &str = "%H:%M %d-%m-%Y";

// ---------------------------------------------------------------------------
// Store target
// ---------------------------------------------------------------------------

/// Contents of the store target file.
#[derive(Clone, Deserialize)]
pub struct StoreTarget {
    #[serde(rename = "databaseURL")]
    pub database_url: String,
    #[serde(default)]
    pub auth: Option<String>,
}

impl std::fmt::Debug for StoreTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreTarget")
            .field("database_url", &self.database_url)
            .field("auth", &self.auth.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl StoreTarget {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let target: StoreTarget = serde_json::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        if target.database_url.trim().is_empty() {
            return Err(ConfigError::Invalid(format!("{}: databaseURL is empty", path.display())));
        }
        Ok(target)
    }

    /// REST URL of the record at `record_path` (empty = database root).
    pub fn record_url(&self, record_path: &str) -> String {
        format!(
            "{}/{}.json",
            self.database_url.trim().trim_end_matches('/'),
            record_path.trim_matches('/')
        )
    }
}

// ---------------------------------------------------------------------------
// Sink
// ---------------------------------------------------------------------------

pub trait RemoteStore {
    /// Replaces the monitored record with `record`.
    fn set(&self, record: &serde_json::Value) -> Result<(), MonitorError>;
}

/// Firebase RTDB REST sink: `PUT {record_url}[?auth=…]`.
pub struct FirebaseStore {
    http: reqwest::blocking::Client,
    url: String,
    auth: Option<String>,
}

impl FirebaseStore {
    pub fn new(target: &StoreTarget, record_path: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            url: target.record_url(record_path),
            auth: target.auth.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl RemoteStore for FirebaseStore {
    fn set(&self, record: &serde_json::Value) -> Result<(), MonitorError> {
        let mut request = self.http.put(&self.url).json(record);
        if let Some(auth) = &self.auth {
            request = request.query(&[("auth", auth.as_str())]);
        }

        let response = request
            .send()
            .map_err(|e| MonitorError::PublishFailure(format!("PUT {} failed: {}", self.url, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(MonitorError::PublishFailure(format!(
                "store rejected write to {}: {} {}",
                self.url,
                status,
                body.trim()
            )));
        }

        Ok(())
    }
}

/// Connects to the store described by the target file.
pub fn connect_firebase(
    target_path: &Path,
    record_path: &str,
    timeout: Duration,
) -> Result<Box<dyn RemoteStore>, MonitorError> {
    let target = StoreTarget::load(target_path)
        .map_err(|e| MonitorError::PublishFailure(format!("store target unavailable: {}", e)))?;
    let store = FirebaseStore::new(&target, record_path, timeout)
        .map_err(|e| MonitorError::PublishFailure(format!("building store client failed: {}", e)))?;
    info!(url = %store.url(), "Remote store initialized");
    Ok(Box::new(store))
}

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// Full record for a publish at `now`.
pub fn build_payload(meters: Decimal, now: NaiveDateTime, labels: &LabelConfig) -> PublishedPayload {
    PublishedPayload {
        nivel: meters.to_f64().unwrap_or(f64::NAN),
        timestamp: now.format(PUBLISH_TIMESTAMP_FORMAT).to_string(),
        label_version: labels.version.clone(),
        label_alert: labels.alert_label(),
        label_flood: labels.flood_label(),
        label_station: labels.station.clone(),
        label_disclaimer: labels.disclaimer.clone(),
        alert_threshold: labels.alert_threshold_m,
        flood_threshold: labels.flood_threshold_m,
    }
}

/// Serializes the payload, optionally wrapping every string field in literal
/// double quotes as the deployed consumer app expects.
pub fn to_record(payload: &PublishedPayload, quote_strings: bool) -> Result<serde_json::Value, MonitorError> {
    let mut record = serde_json::to_value(payload)
        .map_err(|e| MonitorError::PublishFailure(format!("serializing payload failed: {}", e)))?;

    if quote_strings {
        if let Some(fields) = record.as_object_mut() {
            for value in fields.values_mut() {
                if let serde_json::Value::String(s) = value {
                    *s = format!("\"{}\"", s);
                }
            }
        }
    }

    Ok(record)
}

// ---------------------------------------------------------------------------
// Publisher
// ---------------------------------------------------------------------------

/// Builds the store sink; called again after a failed connection.
pub type Connector = Box<dyn Fn() -> Result<Box<dyn RemoteStore>, MonitorError>>;

/// Pushes snapshots to the remote store. Never fails past its boundary:
/// `publish` reports success as a boolean and logs the reason otherwise.
pub struct Publisher {
    store: Option<Box<dyn RemoteStore>>,
    connect: Connector,
    labels: LabelConfig,
    quote_strings: bool,
}

impl Publisher {
    /// Tries to connect immediately; on failure the connection is retried
    /// by the next publish.
    pub fn new(connect: Connector, labels: LabelConfig, quote_strings: bool) -> Self {
        let store = match connect() {
            Ok(store) => Some(store),
            Err(e) => {
                warn!(error = %e, "Remote store not initialized, will retry on publish");
                None
            }
        };

        Self {
            store,
            connect,
            labels,
            quote_strings,
        }
    }

    /// Production publisher for the configured Firebase target.
    pub fn firebase(
        target_path: PathBuf,
        record_path: String,
        timeout: Duration,
        labels: LabelConfig,
        quote_strings: bool,
    ) -> Self {
        let connect: Connector = Box::new(move || connect_firebase(&target_path, &record_path, timeout));
        Self::new(connect, labels, quote_strings)
    }

    pub fn is_connected(&self) -> bool {
        self.store.is_some()
    }

    /// Overwrites the remote record with `meters` and the static labels.
    pub fn try_publish(&mut self, meters: Decimal, now: NaiveDateTime) -> Result<(), MonitorError> {
        if self.store.is_none() {
            self.store = Some((self.connect)()?);
        }

        let record = to_record(&build_payload(meters, now, &self.labels), self.quote_strings)?;
        debug!(%record, "Publishing record");

        match &self.store {
            Some(store) => store.set(&record),
            None => Err(MonitorError::PublishFailure("remote store not initialized".to_string())),
        }
    }

    /// `try_publish`, with the failure logged and reduced to `false`.
    pub fn publish(&mut self, meters: Decimal, now: NaiveDateTime) -> bool {
        match self.try_publish(meters, now) {
            Ok(()) => true,
            Err(e) => {
                warn!(stage = e.stage(), error = %e, level = %meters, "Publish failed");
                false
            }
        }
    }
}
