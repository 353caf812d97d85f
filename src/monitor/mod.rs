/// Change detection over the last published level.
///
/// `MonitorState` is created once by the daemon and lives only in memory;
/// a restart resets it to `Unset`, which guarantees at least one publish per
/// process lifetime.
///
/// Levels are compared at centimeter resolution (2 decimal places, midpoint
/// rounded away from zero) so that sub-centimeter jitter between cycles does
/// not cause redundant writes to the remote store.

use rust_decimal::{Decimal, RoundingStrategy};

/// Resolution at which two levels are considered equal.
pub const COMPARISON_DECIMAL_PLACES: u32 = 2;

/// Rounds a level the way the detector compares it.
pub fn round_level(meters: Decimal) -> Decimal {
    meters.round_dp_with_strategy(COMPARISON_DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Process-scoped detector state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MonitorState {
    /// Nothing published yet in this process
    #[default]
    Unset,
    /// Rounded level of the last reading reported as changed
    Known(Decimal),
}

impl MonitorState {
    pub fn last_published_level(&self) -> Option<Decimal> {
        match self {
            MonitorState::Unset => None,
            MonitorState::Known(level) => Some(*level),
        }
    }
}

/// Outcome of a single observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detection {
    pub changed: bool,
    /// The observed level after rounding
    pub rounded: Decimal,
}

// ---------------------------------------------------------------------------
// Detector
// ---------------------------------------------------------------------------

/// Decides whether a new level differs meaningfully from the stored one.
#[derive(Debug, Default)]
pub struct ChangeDetector {
    state: MonitorState,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    /// Compares `meters` against the stored level and updates the state.
    ///
    /// - `Unset` → `Known(new)`, changed
    /// - `Known(prev)` with `new == prev` → unchanged
    /// - `Known(prev)` with `new != prev` → `Known(new)`, changed
    pub fn observe(&mut self, meters: Decimal) -> Detection {
        let rounded = round_level(meters);
        let changed = match self.state {
            MonitorState::Known(previous) => previous != rounded,
            MonitorState::Unset => true,
        };

        if changed {
            self.state = MonitorState::Known(rounded);
        }

        Detection { changed, rounded }
    }
}
