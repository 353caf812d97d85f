/// Local snapshot cache (`nivel.json`).
///
/// Rewritten every cycle, whether or not the level changed, so that an
/// operator can inspect the last reading the service actually saw. Nothing
/// downstream reads this file.

use rust_decimal::prelude::ToPrimitive;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::LevelFormat;
use crate::level::format_measured_at;
use crate::model::{CalibratedLevel, MonitorError, Snapshot, SnapshotLevel};

/// Builds the cache record for a level.
pub fn build_snapshot(level: &CalibratedLevel, format: LevelFormat) -> Snapshot {
    let nivel = match format {
        LevelFormat::Number => SnapshotLevel::Number(level.meters.to_f64().unwrap_or(f64::NAN)),
        LevelFormat::MetersText => SnapshotLevel::Text(format!("{:.2}m", level.meters)),
    };

    Snapshot {
        nivel,
        data_medicao: format_measured_at(&level.measured_at),
    }
}

pub struct SnapshotWriter {
    path: PathBuf,
    format: LevelFormat,
}

impl SnapshotWriter {
    pub fn new(path: impl Into<PathBuf>, format: LevelFormat) -> Self {
        Self {
            path: path.into(),
            format,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrites the cache file with pretty-printed JSON.
    ///
    /// # Errors
    /// `MonitorError::LocalWriteFailure` when the file cannot be written.
    pub fn write(&self, level: &CalibratedLevel) -> Result<Snapshot, MonitorError> {
        let snapshot = build_snapshot(level, self.format);

        let json = serde_json::to_string_pretty(&snapshot).map_err(|e| {
            MonitorError::LocalWriteFailure(format!("serializing snapshot failed: {}", e))
        })?;

        fs::write(&self.path, json).map_err(|e| {
            MonitorError::LocalWriteFailure(format!("writing {} failed: {}", self.path.display(), e))
        })?;

        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::parse_measured_at;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn level(meters: &str, at: &str) -> CalibratedLevel {
        CalibratedLevel {
            meters: Decimal::from_str(meters).unwrap(),
            measured_at: parse_measured_at(at).unwrap(),
        }
    }

    #[test]
    fn test_number_format() {
        let snapshot = build_snapshot(&level("3.152", "2024-06-01 10:15:00"), LevelFormat::Number);
        assert_eq!(snapshot.nivel, SnapshotLevel::Number(3.152));
        assert_eq!(snapshot.data_medicao, "01/06/2024 10:15");
    }

    #[test]
    fn test_meters_text_format_rounds_to_centimeters() {
        let snapshot = build_snapshot(&level("2.77", "2024-06-01 10:00:00"), LevelFormat::MetersText);
        assert_eq!(snapshot.nivel, SnapshotLevel::Text("2.77m".into()));

        let snapshot = build_snapshot(&level("3", "2024-06-01 10:00:00"), LevelFormat::MetersText);
        assert_eq!(snapshot.nivel, SnapshotLevel::Text("3.00m".into()));
    }

    #[test]
    fn test_write_overwrites_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nivel.json");
        let writer = SnapshotWriter::new(&path, LevelFormat::Number);

        writer.write(&level("3.15", "2024-06-01 10:00:00")).unwrap();
        writer.write(&level("3.152", "2024-06-01 10:15:00")).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(value["nivel"], 3.152);
        assert_eq!(value["data_medicao"], "01/06/2024 10:15");
        assert!(contents.contains("\n  \"nivel\""), "should be pretty-printed");
    }

    #[test]
    fn test_write_to_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SnapshotWriter::new(dir.path().join("missing/nivel.json"), LevelFormat::Number);
        let err = writer.write(&level("3.15", "2024-06-01 10:00:00")).unwrap_err();
        assert!(matches!(err, MonitorError::LocalWriteFailure(_)));
    }
}
