/// guaiba_service: water level monitoring service for ANA telemetric stations.
///
/// # Module structure
///
/// ```text
/// guaiba_service
/// ├── model     — shared data types (Reading, CalibratedLevel, PublishedPayload, MonitorError, …)
/// ├── config    — monitor.toml loader, deployment presets, credential file
/// ├── ingest
/// │   ├── ana   — ANA HidroWebService: token exchange, series URL + JSON parsing
/// │   └── fixtures (test only) — representative API response payloads
/// ├── level     — raw gauge value → calibrated meters, timestamp normalization
/// ├── monitor   — change detection over the last published level
/// ├── snapshot  — local nivel.json cache writer
/// ├── store     — remote store payload + Firebase REST publisher
/// └── daemon    — poll cycle orchestration and scheduling
/// ```

/// Public modules
pub mod config;
pub mod daemon;
pub mod ingest;
pub mod level;
pub mod model;
pub mod monitor;
pub mod snapshot;
pub mod store;
