/// ANA HidroWebService client.
///
/// Handles token exchange, URL construction and JSON response parsing for
/// the telemetric station endpoints:
///   {api_base}/EstacoesTelemetricas/OAUth/v1
///   {api_base}/EstacoesTelemetricas/HidroinfoanaSerieTelemetricaDetalhada/v1
///
/// See `fixtures.rs` for annotated examples of both response bodies.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};
use std::time::Duration;
use tracing::debug;

use crate::config::{Credentials, SearchInterval};
use crate::ingest::TelemetrySource;
use crate::model::{MonitorError, Reading};

// ---------------------------------------------------------------------------
// Serde structures
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    items: Option<TokenItems>,
}

#[derive(Deserialize)]
struct TokenItems {
    #[serde(default)]
    tokenautenticacao: Option<String>,
}

#[derive(Deserialize)]
struct SeriesResponse {
    // Outer `None`: key absent. Inner `None`: `"items": null`.
    #[serde(default, deserialize_with = "present")]
    items: Option<Option<Vec<TelemetryItem>>>,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// One row of the detailed telemetric series.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TelemetryItem {
    #[serde(rename = "Cota_Adotada", default, deserialize_with = "string_or_number")]
    pub cota_adotada: Option<String>,
    #[serde(rename = "Data_Hora_Medicao", default)]
    pub data_hora_medicao: Option<String>,
}

/// The service is inconsistent about quoting numbers; accept both.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

// ---------------------------------------------------------------------------
// URL construction
// ---------------------------------------------------------------------------

const TOKEN_PATH: &str = "EstacoesTelemetricas/OAUth/v1";
const SERIES_PATH: &str = "EstacoesTelemetricas/HidroinfoanaSerieTelemetricaDetalhada/v1";

/// Only filter kind used: rows updated on the search date.
pub const DATE_FILTER_LAST_UPDATE: &str = "DATA_ULTIMA_ATUALIZACAO";

pub fn build_token_url(api_base: &str) -> String {
    format!("{}/{}", api_base.trim_end_matches('/'), TOKEN_PATH)
}

/// Builds the series URL. Parameter names are the provider's literal labels
/// (with spaces, accents and parentheses), so every key and value is
/// percent-encoded.
pub fn build_series_url(
    api_base: &str,
    station_code: &str,
    date: NaiveDate,
    interval: SearchInterval,
) -> String {
    let date_param = date.format("%Y-%m-%d").to_string();
    let params = [
        ("Código da Estação", station_code),
        ("Tipo Filtro Data", DATE_FILTER_LAST_UPDATE),
        ("Data de Busca (yyyy-MM-dd)", date_param.as_str()),
        ("Range Intervalo de busca", interval.as_param()),
    ];

    let query = params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");

    format!("{}/{}?{}", api_base.trim_end_matches('/'), SERIES_PATH, query)
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

/// Extracts `items.tokenautenticacao`.
///
/// # Errors
/// `MonitorError::AuthFailure` on malformed JSON or a missing/empty token.
pub fn parse_token_response(json: &str) -> Result<String, MonitorError> {
    let response: TokenResponse = serde_json::from_str(json)
        .map_err(|e| MonitorError::AuthFailure(format!("token response is not valid JSON: {}", e)))?;

    let token = response
        .items
        .and_then(|items| items.tokenautenticacao)
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    token.ok_or_else(|| {
        MonitorError::AuthFailure(format!(
            "token response has no tokenautenticacao ({})",
            response.message.as_deref().unwrap_or("no message")
        ))
    })
}

/// Parses the series body into its items, in response order.
///
/// # Errors
/// `MonitorError::FetchFailure` on malformed JSON or when the body has no
/// `items` key (an error envelope). A null `items` is an empty list.
pub fn parse_series_response(json: &str) -> Result<Vec<TelemetryItem>, MonitorError> {
    let response: SeriesResponse = serde_json::from_str(json)
        .map_err(|e| MonitorError::FetchFailure(format!("series response is not valid JSON: {}", e)))?;
    match response.items {
        Some(items) => Ok(items.unwrap_or_default()),
        None => Err(MonitorError::FetchFailure(format!(
            "series response has no items: {}",
            snippet(json)
        ))),
    }
}

/// Picks the item with the greatest `Data_Hora_Medicao`.
///
/// Timestamps are compared as strings: the provider's fixed-width
/// `YYYY-MM-DD HH:MM:SS` format sorts chronologically, and a missing
/// timestamp compares as empty. When several items share the maximal
/// timestamp the first one in response order is kept.
///
/// # Errors
/// `MonitorError::NoDataAvailable` when `items` is empty.
pub fn select_latest(items: Vec<TelemetryItem>, station_code: &str) -> Result<Reading, MonitorError> {
    let mut latest: Option<TelemetryItem> = None;

    for item in items {
        let newer = match &latest {
            None => true,
            Some(current) => {
                item.data_hora_medicao.as_deref().unwrap_or("")
                    > current.data_hora_medicao.as_deref().unwrap_or("")
            }
        };
        if newer {
            latest = Some(item);
        }
    }

    let item = latest.ok_or_else(|| {
        MonitorError::NoDataAvailable(format!("station {} returned no telemetric items", station_code))
    })?;

    Ok(Reading {
        raw_gauge_value: item.cota_adotada,
        measured_at: item.data_hora_medicao.unwrap_or_default(),
    })
}

// ---------------------------------------------------------------------------
// API client
// ---------------------------------------------------------------------------

/// Blocking HTTP client for one ANA API base URL.
pub struct AnaClient {
    http: reqwest::blocking::Client,
    api_base: String,
}

impl AnaClient {
    /// Every request made by this client is bounded by `timeout`.
    pub fn new(api_base: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            api_base: api_base.to_string(),
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Raw series items for a station and date, in response order.
    pub fn fetch_series(
        &self,
        token: &str,
        station_code: &str,
        date: NaiveDate,
        interval: SearchInterval,
    ) -> Result<Vec<TelemetryItem>, MonitorError> {
        let url = build_series_url(&self.api_base, station_code, date, interval);
        debug!(%url, "Fetching telemetric series");

        let response = self
            .http
            .get(&url)
            .header("Accept", "application/json")
            .bearer_auth(token)
            .send()
            .map_err(|e| MonitorError::FetchFailure(format!("series request for station {} failed: {}", station_code, e)))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| MonitorError::FetchFailure(format!("reading series body failed: {}", e)))?;

        if !status.is_success() {
            return Err(MonitorError::FetchFailure(format!(
                "ANA series API error for station {}: {} {}",
                station_code,
                status,
                snippet(&body)
            )));
        }

        parse_series_response(&body)
    }
}

impl TelemetrySource for AnaClient {
    fn authenticate(&self, credentials: &Credentials) -> Result<String, MonitorError> {
        let url = build_token_url(&self.api_base);
        debug!(%url, identifier = %credentials.identifier, "Requesting ANA token");

        let response = self
            .http
            .get(&url)
            .header("Accept", "application/json")
            .header("Identificador", credentials.identifier.as_str())
            .header("Senha", credentials.password.as_str())
            .send()
            .map_err(|e| MonitorError::AuthFailure(format!("token request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| MonitorError::AuthFailure(format!("reading token body failed: {}", e)))?;

        if !status.is_success() {
            return Err(MonitorError::AuthFailure(format!(
                "ANA token API error: {} {}",
                status,
                snippet(&body)
            )));
        }

        parse_token_response(&body)
    }

    fn fetch_latest(
        &self,
        token: &str,
        station_code: &str,
        date: NaiveDate,
        interval: SearchInterval,
    ) -> Result<Reading, MonitorError> {
        let items = self.fetch_series(token, station_code, date, interval)?;
        debug!(station = station_code, items = items.len(), "Series received");
        select_latest(items, station_code)
    }
}

/// First part of an error body, for log context.
fn snippet(body: &str) -> String {
    const MAX_CHARS: usize = 200;
    let trimmed = body.trim();
    if trimmed.chars().count() > MAX_CHARS {
        format!("{}…", trimmed.chars().take(MAX_CHARS).collect::<String>())
    } else {
        trimmed.to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::fixtures::*;

    fn item(cota: &str, at: &str) -> TelemetryItem {
        TelemetryItem {
            cota_adotada: Some(cota.to_string()),
            data_hora_medicao: Some(at.to_string()),
        }
    }

    // --- URL construction ---

    #[test]
    fn test_token_url_joins_base_without_double_slash() {
        assert_eq!(
            build_token_url("https://www.ana.gov.br/hidrowebservice/"),
            "https://www.ana.gov.br/hidrowebservice/EstacoesTelemetricas/OAUth/v1"
        );
    }

    #[test]
    fn test_series_url_encodes_provider_parameter_names() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let url = build_series_url("http://ana", "87450004", date, SearchInterval::Minute15);

        assert!(url.starts_with("http://ana/EstacoesTelemetricas/HidroinfoanaSerieTelemetricaDetalhada/v1?"));
        assert!(url.contains("C%C3%B3digo%20da%20Esta%C3%A7%C3%A3o=87450004"));
        assert!(url.contains("Tipo%20Filtro%20Data=DATA_ULTIMA_ATUALIZACAO"));
        assert!(url.contains("Data%20de%20Busca%20%28yyyy-MM-dd%29=2024-06-01"));
        assert!(url.contains("Range%20Intervalo%20de%20busca=MINUTO_15"));
    }

    #[test]
    fn test_series_url_uses_configured_interval() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let url = build_series_url("http://ana", "1", date, SearchInterval::Minute30);
        assert!(url.ends_with("=MINUTO_30"));
    }

    // --- Token parsing ---

    #[test]
    fn test_parse_token() {
        assert_eq!(
            parse_token_response(fixture_token_json()).unwrap(),
            "eyJhbGciOiJIUzI1NiJ9.test-token"
        );
    }

    #[test]
    fn test_parse_token_missing_items_is_auth_failure() {
        let err = parse_token_response(fixture_token_rejected_json()).unwrap_err();
        assert!(matches!(err, MonitorError::AuthFailure(_)));
        assert!(err.to_string().contains("inválidos"));
    }

    #[test]
    fn test_parse_token_empty_or_malformed() {
        assert!(parse_token_response(r#"{"items": {"tokenautenticacao": "  "}}"#).is_err());
        assert!(parse_token_response("<html>gateway timeout</html>").is_err());
    }

    // --- Series parsing ---

    #[test]
    fn test_parse_series_keeps_response_order() {
        let items = parse_series_response(fixture_series_json()).unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].cota_adotada.as_deref(), Some("315.00"));
        assert_eq!(items[2].data_hora_medicao.as_deref(), Some("2024-06-01 10:15:00.0"));
    }

    #[test]
    fn test_parse_series_accepts_numbers_and_nulls() {
        let items = parse_series_response(fixture_mixed_value_types_json()).unwrap();
        assert_eq!(items[0].cota_adotada.as_deref(), Some("312"));
        assert_eq!(items[1].cota_adotada, None);
    }

    #[test]
    fn test_parse_series_null_items_is_empty() {
        assert!(parse_series_response(r#"{"items": null}"#).unwrap().is_empty());
    }

    #[test]
    fn test_parse_series_missing_items_is_fetch_failure() {
        let result = parse_series_response(r#"{"message": "Serviço indisponível"}"#);
        assert!(matches!(result, Err(MonitorError::FetchFailure(msg)) if msg.contains("indisponível")));
    }

    #[test]
    fn test_parse_series_malformed_is_fetch_failure() {
        assert!(matches!(
            parse_series_response("not json"),
            Err(MonitorError::FetchFailure(_))
        ));
    }

    // --- Selection ---

    #[test]
    fn test_select_latest_picks_newest_timestamp() {
        let items = parse_series_response(fixture_series_json()).unwrap();
        let reading = select_latest(items, "87450004").unwrap();
        assert_eq!(reading.raw_gauge_value.as_deref(), Some("318.00"));
        assert_eq!(reading.measured_at, "2024-06-01 10:30:00.0");
    }

    #[test]
    fn test_select_latest_tie_keeps_first_in_response_order() {
        let items = vec![
            item("300", "2024-06-01 10:00:00"),
            item("310", "2024-06-01 10:15:00"),
            item("320", "2024-06-01 10:15:00"),
        ];
        let reading = select_latest(items, "1").unwrap();
        assert_eq!(reading.raw_gauge_value.as_deref(), Some("310"));
    }

    #[test]
    fn test_select_latest_missing_timestamp_sorts_first() {
        let items = vec![
            TelemetryItem { cota_adotada: Some("1".into()), data_hora_medicao: None },
            item("2", "2024-06-01 00:00:00"),
        ];
        assert_eq!(select_latest(items, "1").unwrap().raw_gauge_value.as_deref(), Some("2"));
    }

    #[test]
    fn test_select_latest_empty_is_no_data() {
        let items = parse_series_response(fixture_empty_series_json()).unwrap();
        let err = select_latest(items, "87450004").unwrap_err();
        assert!(matches!(err, MonitorError::NoDataAvailable(_)));
        assert!(err.to_string().contains("87450004"));
    }

    #[test]
    fn test_snippet_truncates_long_bodies() {
        let body = "x".repeat(500);
        assert_eq!(snippet(&body).chars().count(), 201);
        assert_eq!(snippet("  short  "), "short");
    }
}
