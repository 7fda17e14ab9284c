use std::fmt;

use chrono::{DateTime, Utc};

use crate::ids::StopId;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Operator-facing stop color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum StopColor {
    /// Every assigned rider signaled absence; the stop may be skipped
    Grey,
    /// Standard wait window is running
    Red,
    /// Extended wait granted because a rider asked for it
    Yellow,
    /// Not relevant right now, or the window is exhausted
    Green,
}

impl StopColor {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopColor::Grey => "grey",
            StopColor::Red => "red",
            StopColor::Yellow => "yellow",
            StopColor::Green => "green",
        }
    }
}

impl fmt::Display for StopColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of one stop computed on read. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DerivedStopStatus {
    pub stop_id: StopId,
    pub color: StopColor,
    /// Seconds since arrival when this is the current stop
    pub elapsed_secs: Option<i64>,
    pub wait_count: u32,
    pub rider_count: u32,
    pub absent_count: u32,
    pub computed_at: DateTime<Utc>,
}

impl DerivedStopStatus {
    /// Equality ignoring `computed_at`, used to suppress redundant pushes.
    pub fn same_view(&self, other: &DerivedStopStatus) -> bool {
        self.stop_id == other.stop_id
            && self.color == other.color
            && self.elapsed_secs == other.elapsed_secs
            && self.wait_count == other.wait_count
            && self.rider_count == other.rider_count
            && self.absent_count == other.absent_count
    }
}
