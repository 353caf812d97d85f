/// Telemetry ingestion.
///
/// `TelemetrySource` is the seam between the daemon and the provider: the
/// daemon only ever asks for a token and for the newest reading of a station.

pub mod ana;
pub mod fixtures;

use chrono::NaiveDate;

use crate::config::{Credentials, SearchInterval};
use crate::model::{MonitorError, Reading};

pub trait TelemetrySource {
    /// Exchanges credentials for a short-lived bearer token.
    fn authenticate(&self, credentials: &Credentials) -> Result<String, MonitorError>;

    /// Newest reading for `station_code` on `date`.
    fn fetch_latest(
        &self,
        token: &str,
        station_code: &str,
        date: NaiveDate,
        interval: SearchInterval,
    ) -> Result<Reading, MonitorError>;
}
