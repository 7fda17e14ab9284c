use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use waypost_model::{Carrier, DerivedStopStatus, StopId, TripSignals, Trip};

use crate::derivation::{WaitWindows, derive_stop_status};

/// Which stops of a trip an actor may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "stop_id", rename_all = "snake_case")]
pub enum ViewScope {
    /// The operator of the trip sees every stop.
    AllStops,
    /// A rider sees their assigned stop only.
    Stop(StopId),
}

impl ViewScope {
    pub fn includes(&self, stop: StopId) -> bool {
        match self {
            ViewScope::AllStops => true,
            ViewScope::Stop(own) => *own == stop,
        }
    }
}

/// Everything needed to derive the status of every stop of one trip.
///
/// The route and rider assignments do not change while a trip runs, so a
/// board only has to be refreshed piecewise: the trip on trip changes and
/// the signals on signal changes. Time alone is enough for a tick.
#[derive(Debug, Clone)]
pub struct TripBoard {
    pub trip: Trip,
    pub carrier: Carrier,
    pub rider_counts: HashMap<StopId, u32>,
    pub signals: TripSignals,
}

impl TripBoard {
    pub fn rider_count(&self, stop: StopId) -> u32 {
        self.rider_counts.get(&stop).copied().unwrap_or(0)
    }

    pub fn status(
        &self,
        windows: &WaitWindows,
        stop: StopId,
        now: DateTime<Utc>,
    ) -> Option<DerivedStopStatus> {
        self.carrier.has_stop(stop).then(|| {
            derive_stop_status(
                windows,
                &self.trip,
                stop,
                self.rider_count(stop),
                self.signals.tally(stop),
                now,
            )
        })
    }

    /// Statuses in route order, restricted to `scope`.
    pub fn statuses(
        &self,
        windows: &WaitWindows,
        scope: ViewScope,
        now: DateTime<Utc>,
    ) -> Vec<DerivedStopStatus> {
        self.carrier
            .stop_ids()
            .filter(|stop| scope.includes(*stop))
            .filter_map(|stop| self.status(windows, stop, now))
            .collect()
    }
}
