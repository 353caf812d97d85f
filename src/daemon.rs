/// Core daemon implementation for the level monitoring service
///
/// This module drives the poll cycle:
/// 1. Authenticates against ANA (fresh token every cycle)
/// 2. Fetches the newest reading for the configured station
/// 3. Converts it to a calibrated level
/// 4. Overwrites the local snapshot cache
/// 5. Runs change detection and publishes to the remote store on change
///
/// A failing stage aborts only the current cycle. The loop itself never
/// stops on a cycle error; it waits for the next due time and tries again.

use chrono::{Local, NaiveDateTime};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::config::{ConfigError, Credentials, MonitorConfig};
use crate::ingest::TelemetrySource;
use crate::ingest::ana::AnaClient;
use crate::level::{self, format_measured_at};
use crate::model::{CalibratedLevel, MonitorError};
use crate::monitor::{ChangeDetector, MonitorState};
use crate::snapshot::SnapshotWriter;
use crate::store::Publisher;

// ---------------------------------------------------------------------------
// Scheduling
// ---------------------------------------------------------------------------

/// "Run now, then every `interval`" schedule.
///
/// The next due time is taken from when a cycle *finished*, so a slow cycle
/// pushes the following one back instead of overlapping it, and missed
/// intervals are never replayed back-to-back.
#[derive(Debug, Clone)]
pub struct Schedule {
    interval: Duration,
    next_due: Option<Instant>,
}

impl Schedule {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_due: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// True before the first cycle and whenever the next due time has passed.
    pub fn is_due(&self, now: Instant) -> bool {
        match self.next_due {
            None => true,
            Some(due) => now >= due,
        }
    }

    pub fn completed(&mut self, finished_at: Instant) {
        self.next_due = Some(finished_at + self.interval);
    }

    pub fn until_due(&self, now: Instant) -> Duration {
        match self.next_due {
            None => Duration::ZERO,
            Some(due) => due.saturating_duration_since(now),
        }
    }
}

// ---------------------------------------------------------------------------
// Cycle outcome
// ---------------------------------------------------------------------------

/// What a single cycle did.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Level changed and the remote store accepted it
    Published(CalibratedLevel),
    /// Level changed but the remote store write failed
    PublishFailed(CalibratedLevel),
    /// Level equal to the last published one at centimeter resolution
    Unchanged(CalibratedLevel),
    /// A stage failed before change detection; state untouched
    Skipped(MonitorError),
}

// ---------------------------------------------------------------------------
// Daemon
// ---------------------------------------------------------------------------

pub struct Daemon {
    config: MonitorConfig,
    credentials: Credentials,
    source: Box<dyn TelemetrySource>,
    snapshot: SnapshotWriter,
    publisher: Publisher,
    detector: ChangeDetector,
    schedule: Schedule,
}

impl Daemon {
    /// Assembles a daemon from already-built collaborators.
    pub fn new(
        config: MonitorConfig,
        credentials: Credentials,
        source: Box<dyn TelemetrySource>,
        publisher: Publisher,
    ) -> Self {
        let snapshot = SnapshotWriter::new(config.snapshot.path.clone(), config.snapshot.level_format);
        let schedule = Schedule::new(config.poll_interval());

        Self {
            config,
            credentials,
            source,
            snapshot,
            publisher,
            detector: ChangeDetector::new(),
            schedule,
        }
    }

    /// Production wiring: ANA HTTP client, credential file, Firebase publisher.
    pub fn initialize(config: MonitorConfig) -> Result<Self, ConfigError> {
        let credentials = Credentials::load(&config.credentials.path)?;

        let source = AnaClient::new(&config.ana.api_base, config.request_timeout())
            .map_err(|e| ConfigError::Invalid(format!("building ANA HTTP client failed: {}", e)))?;

        let publisher = Publisher::firebase(
            config.store.target_path.clone(),
            config.store.record_path.clone(),
            config.request_timeout(),
            config.labels.clone(),
            config.store.quote_strings,
        );

        Ok(Self::new(config, credentials, Box::new(source), publisher))
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn state(&self) -> MonitorState {
        self.detector.state()
    }

    pub fn station_code(&self) -> &str {
        &self.credentials.station_code
    }

    /// Authenticate → fetch → convert → write snapshot.
    fn collect(&self, now: NaiveDateTime) -> Result<CalibratedLevel, MonitorError> {
        let token = self.source.authenticate(&self.credentials)?;

        let reading = self.source.fetch_latest(
            &token,
            &self.credentials.station_code,
            now.date(),
            self.config.poll.search_interval,
        )?;
        info!(
            cota = reading.raw_gauge_value.as_deref().unwrap_or("null"),
            measured_at = %reading.measured_at,
            "Reading collected"
        );

        let level = level::calibrate(&reading, self.config.calibration_offset())?;
        self.snapshot.write(&level)?;
        Ok(level)
    }

    /// Runs one full cycle with `now` as the wall-clock time. Never fails:
    /// errors are logged and reported as `CycleOutcome::Skipped`.
    pub fn run_cycle_at(&mut self, now: NaiveDateTime) -> CycleOutcome {
        info!(station = %self.credentials.station_code, "Collecting");

        let level = match self.collect(now) {
            Ok(level) => level,
            Err(e) => {
                match &e {
                    MonitorError::NoDataAvailable(_) => warn!(stage = e.stage(), error = %e, "No data available"),
                    _ => error!(stage = e.stage(), error = %e, "Cycle aborted"),
                }
                return CycleOutcome::Skipped(e);
            }
        };

        let measured = format_measured_at(&level.measured_at);
        let detection = self.detector.observe(level.meters);

        if !detection.changed {
            info!(level = %format!("{:.2}", level.meters), measured_at = %measured, "Level unchanged, store not updated");
            return CycleOutcome::Unchanged(level);
        }

        info!(level = %format!("{:.2}", level.meters), measured_at = %measured, "New level, publishing");
        if self.publisher.publish(level.meters, now) {
            info!("Remote store updated");
            CycleOutcome::Published(level)
        } else {
            // Not retried: an unchanged level next cycle is not republished.
            CycleOutcome::PublishFailed(level)
        }
    }

    pub fn run_cycle(&mut self) -> CycleOutcome {
        self.run_cycle_at(Local::now().naive_local())
    }

    /// Main daemon loop (runs until the process is killed).
    pub fn run(&mut self) {
        let tick = self.config.tick();
        info!(
            interval_minutes = self.config.poll.interval_minutes,
            tick_seconds = tick.as_secs(),
            station = %self.credentials.station_code,
            "Automatic collector started"
        );

        loop {
            if self.schedule.is_due(Instant::now()) {
                self.run_cycle();
                self.schedule.completed(Instant::now());
            }

            let sleep = self.schedule.until_due(Instant::now()).min(tick);
            std::thread::sleep(sleep);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
