/// Level conversion: raw adopted gauge reading → calibrated water level.
///
/// ANA reports `Cota_Adotada` in centimeters as a decimal string and
/// `Data_Hora_Medicao` as `YYYY-MM-DD HH:MM:SS[.ffffff]`. The converter keeps
/// decimal arithmetic exact so that rounding in the change detector behaves
/// the same for every deployment offset.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::model::{CalibratedLevel, MonitorError, Reading};

const PROVIDER_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DISPLAY_TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M";

/// Converts a raw centimeter value to meters with the offset subtracted.
///
/// # Errors
/// `MonitorError::ConversionFailure` if `raw` is not a decimal number.
pub fn to_meters(raw: &str, offset: Decimal) -> Result<Decimal, MonitorError> {
    let trimmed = raw.trim();
    let centimeters = Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|e| {
            MonitorError::ConversionFailure(format!("Cota_Adotada '{}' is not a number: {}", raw, e))
        })?;

    Ok(centimeters / Decimal::ONE_HUNDRED - offset)
}

/// Parses a provider timestamp, discarding fractional seconds.
pub fn parse_measured_at(raw: &str) -> Result<NaiveDateTime, MonitorError> {
    let whole_seconds = raw.trim().split('.').next().unwrap_or_default();
    NaiveDateTime::parse_from_str(whole_seconds, PROVIDER_TIMESTAMP_FORMAT).map_err(|e| {
        MonitorError::ConversionFailure(format!("Data_Hora_Medicao '{}' is not a timestamp: {}", raw, e))
    })
}

/// `DD/MM/YYYY HH:MM`, the format shown to users and written to the cache.
pub fn format_measured_at(measured_at: &NaiveDateTime) -> String {
    measured_at.format(DISPLAY_TIMESTAMP_FORMAT).to_string()
}

/// Converts a selected reading into a calibrated level.
pub fn calibrate(reading: &Reading, offset: Decimal) -> Result<CalibratedLevel, MonitorError> {
    let raw = reading.raw_gauge_value.as_deref().ok_or_else(|| {
        MonitorError::ConversionFailure(format!(
            "Cota_Adotada missing for measurement at '{}'",
            reading.measured_at
        ))
    })?;

    Ok(CalibratedLevel {
        meters: to_meters(raw, offset)?,
        measured_at: parse_measured_at(&reading.measured_at)?,
    })
}
