//! Stop status derivation.
//!
//! Colors are never stored. They are recomputed from the trip state, the
//! rider facts and the current time every time someone looks.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use waypost_model::{DerivedStopStatus, StopColor, StopId, StopTally, Trip, TripPhase};

/// Default standard wait window (5 minutes).
pub const STANDARD_WAIT_SECS: i64 = 300;
/// Default extended wait window granted by a wait request (7 minutes).
pub const EXTENDED_WAIT_SECS: i64 = 420;

/// The two wait windows a stop goes through after arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitWindows {
    pub standard_secs: i64,
    pub extended_secs: i64,
}

impl Default for WaitWindows {
    fn default() -> Self {
        Self {
            standard_secs: STANDARD_WAIT_SECS,
            extended_secs: EXTENDED_WAIT_SECS,
        }
    }
}

impl WaitWindows {
    pub fn new(standard_secs: i64, extended_secs: i64) -> Self {
        Self {
            standard_secs,
            extended_secs,
        }
    }

    pub fn standard(&self) -> Duration {
        Duration::seconds(self.standard_secs)
    }

    pub fn extended(&self) -> Duration {
        Duration::seconds(self.extended_secs)
    }

    /// Extended must not be shorter than standard and neither may be negative.
    pub fn is_valid(&self) -> bool {
        self.standard_secs >= 0 && self.extended_secs >= self.standard_secs
    }

    pub fn derive(&self, inputs: &StatusInputs, now: DateTime<Utc>) -> StopColor {
        let arrived_at = match inputs.arrived_at {
            Some(arrived_at)
                if inputs.phase == TripPhase::AtStop && inputs.is_current_stop =>
            {
                arrived_at
            }
            _ => return StopColor::Green,
        };

        if inputs.rider_count > 0 && inputs.absent_count >= inputs.rider_count {
            return StopColor::Grey;
        }

        let elapsed = (now - arrived_at).max(Duration::zero());
        if elapsed <= self.standard() {
            StopColor::Red
        } else if inputs.wait_count > 0 && elapsed <= self.extended() {
            StopColor::Yellow
        } else {
            StopColor::Green
        }
    }
}

/// Everything the derivation looks at, minus the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusInputs {
    pub phase: TripPhase,
    pub is_current_stop: bool,
    pub arrived_at: Option<DateTime<Utc>>,
    pub rider_count: u32,
    pub absent_count: u32,
    pub wait_count: u32,
}

impl StatusInputs {
    pub fn for_stop(trip: &Trip, stop: StopId, rider_count: u32, tally: StopTally) -> Self {
        Self {
            phase: trip.phase,
            is_current_stop: trip.current_stop == Some(stop),
            arrived_at: trip.arrived_at,
            rider_count,
            absent_count: tally.absent_count,
            wait_count: tally.wait_count,
        }
    }
}

/// Pure color derivation using the default 300 s / 420 s windows.
pub fn derive_status(
    phase: TripPhase,
    is_current_stop: bool,
    arrived_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    rider_count: u32,
    absent_count: u32,
    wait_count: u32,
) -> StopColor {
    WaitWindows::default().derive(
        &StatusInputs {
            phase,
            is_current_stop,
            arrived_at,
            rider_count,
            absent_count,
            wait_count,
        },
        now,
    )
}

/// Full status record for one stop of a trip.
pub fn derive_stop_status(
    windows: &WaitWindows,
    trip: &Trip,
    stop: StopId,
    rider_count: u32,
    tally: StopTally,
    now: DateTime<Utc>,
) -> DerivedStopStatus {
    let inputs = StatusInputs::for_stop(trip, stop, rider_count, tally);
    let elapsed_secs = trip
        .is_current_stop(stop)
        .then(|| trip.elapsed_at_stop(now))
        .flatten()
        .map(|elapsed| elapsed.num_seconds());

    DerivedStopStatus {
        stop_id: stop,
        color: windows.derive(&inputs, now),
        elapsed_secs,
        wait_count: tally.wait_count,
        rider_count,
        absent_count: tally.absent_count,
        computed_at: now,
    }
}
