/// Monitor configuration loader - parses monitor.toml and the credential file
///
/// Separates deployment settings (poll interval, calibration offset, labels,
/// thresholds, output paths) from code, so the 15-minute "cota" collector and
/// the 30-minute Guaíba collector are the same binary with different files.
/// Everything here is loaded once at startup; there is no reconfiguration at
/// runtime.

use rust_decimal::Decimal;
use serde::Deserialize;
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "monitor.toml";

/// Environment variable overriding the configuration file path.
pub const CONFIG_PATH_ENV: &str = "GUAIBA_CONFIG";

/// Environment variable overriding `[credentials].path`.
pub const CREDENTIALS_PATH_ENV: &str = "GUAIBA_CREDENTIALS";

const DEFAULT_DISCLAIMER: &str = "Aplicativo experimental de uso livre sem fins lucrativos, \
    desenvolvido como critério de avaliação da faculdade Estácio no curso de Programacão Para \
    Dispositivos Móveis em Android. Os dados coletados podem conter erros e não nos \
    responsabilizamos pelo mau uso dessas informações, para tomada de decisão recomendamos \
    consultar diretamente a fonte confiável com o SNIRH/ANA.";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Startup configuration error. Unlike `MonitorError` these are fatal.
#[derive(Debug)]
pub enum ConfigError {
    /// File missing or unreadable
    Read { path: PathBuf, message: String },
    /// File present but not valid TOML/JSON for the expected shape
    Parse { path: PathBuf, message: String },
    /// Parsed but semantically invalid
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read { path, message } => {
                write!(f, "Failed to read {}: {}\n\n", path.display(), message)?;
                write!(f, "  Set {} to point at the monitor configuration,\n", CONFIG_PATH_ENV)?;
                write!(f, "  or {} for the ANA credential file.", CREDENTIALS_PATH_ENV)
            }
            ConfigError::Parse { path, message } => {
                write!(f, "Failed to parse {}: {}", path.display(), message)
            }
            ConfigError::Invalid(message) => write!(f, "Invalid configuration: {}", message),
        }
    }
}

impl std::error::Error for ConfigError {}

// ---------------------------------------------------------------------------
// monitor.toml
// ---------------------------------------------------------------------------

/// ANA "Range Intervalo de busca" selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum SearchInterval {
    #[serde(rename = "MINUTO_15")]
    Minute15,
    #[serde(rename = "MINUTO_30")]
    Minute30,
}

impl SearchInterval {
    /// Query parameter value expected by the series endpoint.
    pub fn as_param(&self) -> &'static str {
        match self {
            SearchInterval::Minute15 => "MINUTO_15",
            SearchInterval::Minute30 => "MINUTO_30",
        }
    }
}

/// How `nivel` is rendered in the local cache file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelFormat {
    /// Raw meters as a JSON number
    Number,
    /// `"X.XXm"` text
    MetersText,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Minutes between cycles (15 or 30 in the known deployments)
    pub interval_minutes: u64,
    /// Sleep granularity of the scheduling loop
    pub tick_seconds: u64,
    pub search_interval: SearchInterval,
    /// Upper bound on every HTTP call
    pub request_timeout_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_minutes: 15,
            tick_seconds: 60,
            search_interval: SearchInterval::Minute15,
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnaConfig {
    pub api_base: String,
}

impl Default for AnaConfig {
    fn default() -> Self {
        Self {
            api_base: "https://www.ana.gov.br/hidrowebservice".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Subtracted from the converted level, in meters
    pub offset_m: f64,
}

/// Static metadata shipped with every publish.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LabelConfig {
    pub version: String,
    pub station: String,
    pub disclaimer: String,
    pub alert_threshold_m: f64,
    pub flood_threshold_m: f64,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            version: "Versão 2.1.1".to_string(),
            station: "Estação: Cais Mauá C6".to_string(),
            disclaimer: DEFAULT_DISCLAIMER.to_string(),
            alert_threshold_m: 3.15,
            flood_threshold_m: 3.60,
        }
    }
}

impl LabelConfig {
    pub fn alert_label(&self) -> String {
        format!("Cota de alerta {:.2}m", self.alert_threshold_m)
    }

    pub fn flood_label(&self) -> String {
        format!("Cota de inundação {:.2}m", self.flood_threshold_m)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    pub path: PathBuf,
    pub level_format: LevelFormat,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("nivel.json"),
            level_format: LevelFormat::Number,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// JSON file holding `databaseURL` and an optional `auth` secret
    pub target_path: PathBuf,
    /// Record path under the database root; empty means the root itself
    pub record_path: String,
    /// Wrap string fields in literal double quotes (legacy consumer format)
    pub quote_strings: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            target_path: PathBuf::from("firebase.json"),
            record_path: String::new(),
            quote_strings: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    pub path: PathBuf,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("caisMaua.json"),
        }
    }
}

/// Root configuration structure for TOML parsing. Missing sections fall
/// back to the 15-minute publishing deployment.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub poll: PollConfig,
    pub ana: AnaConfig,
    pub calibration: CalibrationConfig,
    pub labels: LabelConfig,
    pub snapshot: SnapshotConfig,
    pub store: StoreConfig,
    pub credentials: CredentialsConfig,
}

impl MonitorConfig {
    /// The 15-minute collector publishing the raw adopted gauge level.
    pub fn cota_15min() -> Self {
        Self::default()
    }

    /// The 30-minute collector reporting the Guaíba level (gauge minus 0.38 m).
    pub fn guaiba_30min() -> Self {
        Self {
            poll: PollConfig {
                interval_minutes: 30,
                search_interval: SearchInterval::Minute30,
                ..PollConfig::default()
            },
            calibration: CalibrationConfig { offset_m: 0.38 },
            snapshot: SnapshotConfig {
                level_format: LevelFormat::MetersText,
                ..SnapshotConfig::default()
            },
            ..Self::default()
        }
    }

    /// Parses a TOML document and validates it.
    pub fn from_toml_str(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: MonitorConfig = toml::from_str(contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a configuration file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&contents, path)
    }

    /// Loads `.env`, resolves the configuration path from `GUAIBA_CONFIG`
    /// (default `monitor.toml`) and applies the credential path override.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let path = match explicit_path {
            Some(p) => p.to_path_buf(),
            None => env::var(CONFIG_PATH_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH)),
        };

        let mut config = Self::load_from(&path)?;
        if let Ok(credentials) = env::var(CREDENTIALS_PATH_ENV) {
            config.credentials.path = PathBuf::from(credentials);
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll.interval_minutes == 0 {
            return Err(ConfigError::Invalid("poll.interval_minutes must be > 0".into()));
        }
        if self.poll.interval_minutes.checked_mul(60).is_none() {
            return Err(ConfigError::Invalid(format!(
                "poll.interval_minutes ({}) is too large",
                self.poll.interval_minutes
            )));
        }
        if self.poll.tick_seconds == 0 {
            return Err(ConfigError::Invalid("poll.tick_seconds must be > 0".into()));
        }
        if self.poll.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid("poll.request_timeout_secs must be > 0".into()));
        }
        if self.calibration.offset_m.to_string().parse::<Decimal>().is_err() {
            return Err(ConfigError::Invalid(format!(
                "calibration.offset_m ({}) is not a representable decimal",
                self.calibration.offset_m
            )));
        }
        let (alert, flood) = (self.labels.alert_threshold_m, self.labels.flood_threshold_m);
        if !alert.is_finite() || !flood.is_finite() {
            return Err(ConfigError::Invalid(format!(
                "labels thresholds must be finite (alert {alert}, flood {flood})"
            )));
        }
        if alert >= flood {
            return Err(ConfigError::Invalid(format!(
                "labels.alert_threshold_m ({}) must be below labels.flood_threshold_m ({})",
                self.labels.alert_threshold_m, self.labels.flood_threshold_m
            )));
        }
        Ok(())
    }

    /// Calibration offset as an exact decimal (`0.38`, not its binary approximation).
    pub fn calibration_offset(&self) -> Decimal {
        self.calibration
            .offset_m
            .to_string()
            .parse()
            .unwrap_or(Decimal::ZERO)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll.interval_minutes.saturating_mul(60))
    }

    pub fn tick(&self) -> Duration {
        Duration::from_secs(self.poll.tick_seconds)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.poll.request_timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// Credential file
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct CredentialFile {
    identificador: String,
    senha: String,
    codigo_estacao: serde_json::Value,
}

/// ANA HidroWebService credentials plus the station they are scoped to.
#[derive(Clone, PartialEq)]
pub struct Credentials {
    pub identifier: String,
    pub password: String,
    pub station_code: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identifier", &self.identifier)
            .field("password", &"<redacted>")
            .field("station_code", &self.station_code)
            .finish()
    }
}

impl Credentials {
    /// Parses the credential JSON. Identifier and password are sometimes
    /// stored with their surrounding quotes; those are stripped.
    pub fn from_json(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        let parse_err = |message: String| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        };

        let file: CredentialFile =
            serde_json::from_str(contents).map_err(|e| parse_err(e.to_string()))?;

        let station_code = match file.codigo_estacao {
            serde_json::Value::String(s) => s.trim().to_string(),
            serde_json::Value::Number(n) => n.to_string(),
            other => return Err(parse_err(format!("codigo_estacao must be a string or number, got {}", other))),
        };
        if station_code.is_empty() {
            return Err(parse_err("codigo_estacao is empty".to_string()));
        }

        Ok(Self {
            identifier: file.identificador.trim_matches('"').to_string(),
            password: file.senha.trim_matches('"').to_string(),
            station_code,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_json(&contents, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path() -> PathBuf {
        PathBuf::from("test.toml")
    }

    #[test]
    fn test_empty_file_gives_cota_defaults() {
        let config = MonitorConfig::from_toml_str("", &path()).unwrap();
        assert_eq!(config.poll.interval_minutes, 15);
        assert_eq!(config.poll.tick_seconds, 60);
        assert_eq!(config.poll.search_interval, SearchInterval::Minute15);
        assert_eq!(config.calibration_offset(), Decimal::ZERO);
        assert_eq!(config.snapshot.level_format, LevelFormat::Number);
        assert!(config.store.quote_strings);
    }

    #[test]
    fn test_shipped_monitor_toml_parses() {
        let config = MonitorConfig::load_from(Path::new(DEFAULT_CONFIG_PATH))
            .expect("monitor.toml in the project root should be valid");
        assert_eq!(config.poll.interval_minutes, 15);
        assert_eq!(config.labels.flood_label(), "Cota de inundação 3.60m");
    }

    #[test]
    fn test_guaiba_preset() {
        let config = MonitorConfig::guaiba_30min();
        assert_eq!(config.poll_interval(), Duration::from_secs(1800));
        assert_eq!(config.poll.search_interval.as_param(), "MINUTO_30");
        assert_eq!(config.calibration_offset(), Decimal::new(38, 2));
        assert_eq!(config.snapshot.level_format, LevelFormat::MetersText);
    }

    #[test]
    fn test_full_file_parses() {
        let toml = r#"
            [poll]
            interval_minutes = 30
            search_interval = "MINUTO_30"
            request_timeout_secs = 10

            [calibration]
            offset_m = 0.38

            [labels]
            station = "Estação: Usina do Gasômetro"
            alert_threshold_m = 2.5
            flood_threshold_m = 3.0

            [snapshot]
            path = "/var/lib/guaiba/nivel.json"
            level_format = "meters_text"

            [store]
            record_path = "guaiba"
            quote_strings = false
        "#;
        let config = MonitorConfig::from_toml_str(toml, &path()).unwrap();
        assert_eq!(config.poll.interval_minutes, 30);
        assert_eq!(config.poll.tick_seconds, 60, "unset fields keep defaults");
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.calibration_offset().to_string(), "0.38");
        assert_eq!(config.labels.station, "Estação: Usina do Gasômetro");
        assert_eq!(config.snapshot.path, PathBuf::from("/var/lib/guaiba/nivel.json"));
        assert_eq!(config.store.record_path, "guaiba");
        assert!(!config.store.quote_strings);
    }

    #[test]
    fn test_unknown_search_interval_rejected() {
        let result = MonitorConfig::from_toml_str("[poll]\nsearch_interval = \"HORA_1\"\n", &path());
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let result = MonitorConfig::from_toml_str("[poll]\ninterval_minutes = 0\n", &path());
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_thresholds_must_be_ordered() {
        let toml = "[labels]\nalert_threshold_m = 4.0\nflood_threshold_m = 3.6\n";
        let result = MonitorConfig::from_toml_str(toml, &path());
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_nan_threshold_rejected() {
        let result = MonitorConfig::from_toml_str("[labels]\nalert_threshold_m = nan\n", &path());
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_infinite_flood_threshold_rejected() {
        let result = MonitorConfig::from_toml_str("[labels]\nflood_threshold_m = inf\n", &path());
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_interval_overflowing_seconds_rejected() {
        let toml = "[poll]\ninterval_minutes = 9223372036854775807\n";
        let result = MonitorConfig::from_toml_str(toml, &path());
        assert!(matches!(result, Err(ConfigError::Invalid(msg)) if msg.contains("interval_minutes")));
    }

    #[test]
    fn test_default_disclaimer_is_complete() {
        let labels = LabelConfig::default();
        assert!(labels.disclaimer.contains("faculdade Estácio"));
        assert!(labels.disclaimer.ends_with("com o SNIRH/ANA."));
    }

    #[test]
    fn test_threshold_labels_use_two_decimals() {
        let labels = LabelConfig::default();
        assert_eq!(labels.alert_label(), "Cota de alerta 3.15m");
        assert_eq!(labels.flood_label(), "Cota de inundação 3.60m");
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let result = MonitorConfig::load_from(Path::new("/nonexistent/monitor.toml"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_credentials_strip_quotes() {
        let json = r#"{"identificador": "\"12345678900\"", "senha": "\"s3nh@\"", "codigo_estacao": "87450004"}"#;
        let creds = Credentials::from_json(json, Path::new("c.json")).unwrap();
        assert_eq!(creds.identifier, "12345678900");
        assert_eq!(creds.password, "s3nh@");
        assert_eq!(creds.station_code, "87450004");
    }

    #[test]
    fn test_credentials_accept_numeric_station_code() {
        let json = r#"{"identificador": "id", "senha": "pw", "codigo_estacao": 87450004}"#;
        let creds = Credentials::from_json(json, Path::new("c.json")).unwrap();
        assert_eq!(creds.station_code, "87450004");
    }

    #[test]
    fn test_credentials_missing_field_rejected() {
        let json = r#"{"identificador": "id", "codigo_estacao": "1"}"#;
        assert!(Credentials::from_json(json, Path::new("c.json")).is_err());
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let json = r#"{"identificador": "id", "senha": "hunter2", "codigo_estacao": "1"}"#;
        let creds = Credentials::from_json(json, Path::new("c.json")).unwrap();
        assert!(!format!("{:?}", creds).contains("hunter2"));
    }
}
