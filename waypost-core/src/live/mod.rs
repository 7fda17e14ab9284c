//! Live view publisher.
//!
//! One feed task per watched trip keeps a [`TripBoard`](crate::board::TripBoard)
//! warm, listens to trip and signal change notifications, ticks once a
//! second while the carrier stands at a stop and pushes only the statuses
//! that actually changed to each subscriber's own channel. Changes that land
//! within one tick window are folded into a single recompute.

mod feed;
mod publisher;

use std::time::Duration;

use serde::Serialize;
use waypost_model::{DerivedStopStatus, Trip};

use crate::retry::RetryPolicy;

pub use publisher::{LivePublisher, LiveSubscription};

const DEFAULT_TICK: Duration = Duration::from_secs(1);
const DEFAULT_COALESCE: Duration = DEFAULT_TICK;
const DEFAULT_SUBSCRIBER_BUFFER: usize = 64;

/// Message delivered to a live view subscriber.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveUpdate {
    /// Full state for the subscriber's scope. Always the first message, and
    /// re-sent after the subscriber fell behind.
    Snapshot {
        trip: Trip,
        statuses: Vec<DerivedStopStatus>,
    },
    Status {
        status: DerivedStopStatus,
    },
    TripChanged {
        trip: Trip,
    },
    /// Final message; the stream closes afterwards.
    TripEnded {
        trip: Trip,
    },
}

#[derive(Debug, Clone)]
pub struct LiveConfig {
    /// Re-derivation interval while the carrier is at a stop.
    pub tick: Duration,
    /// Changes arriving within this window are folded into one recompute
    /// while the carrier is between stops. At a stop pending changes are
    /// flushed on the next tick instead.
    pub coalesce: Duration,
    /// Per-subscriber queue depth before the subscriber is resynced.
    pub subscriber_buffer: usize,
    /// Applied to board loads; they are reads and safe to repeat.
    pub retry: RetryPolicy,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            tick: DEFAULT_TICK,
            coalesce: DEFAULT_COALESCE,
            subscriber_buffer: DEFAULT_SUBSCRIBER_BUFFER,
            retry: RetryPolicy::default(),
        }
    }
}
