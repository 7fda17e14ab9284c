use chrono::{DateTime, Duration, Utc};

use crate::ids::{CarrierId, OperatorId, StopId, TripId};
use crate::route::GeoPoint;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Where the carrier currently is relative to its stops
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TripPhase {
    #[default]
    InTransit,
    AtStop,
}

impl TripPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripPhase::InTransit => "in_transit",
            TripPhase::AtStop => "at_stop",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "in_transit" => Some(TripPhase::InTransit),
            "at_stop" => Some(TripPhase::AtStop),
            _ => None,
        }
    }
}

/// Last position reported by the operator device
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PositionFix {
    pub position: GeoPoint,
    pub reported_at: DateTime<Utc>,
}

/// Rejected lifecycle transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionError {
    Ended,
    NotAtStop,
}

/// What an arrival did to the stop timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arrival {
    /// Arrival time was (re)set to now
    TimerStarted,
    /// Already at this stop; the original arrival time was kept
    AlreadyThere,
}

/// One journey instance of a carrier.
///
/// `current_stop` and `arrived_at` are set together on arrival. Departure
/// clears `arrived_at` and keeps `current_stop` for display. Ended trips are
/// never reopened.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Trip {
    pub id: TripId,
    pub carrier_id: CarrierId,
    pub operator_id: OperatorId,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub current_stop: Option<StopId>,
    pub arrived_at: Option<DateTime<Utc>>,
    pub phase: TripPhase,
    pub last_position: Option<PositionFix>,
}

impl Trip {
    /// Fresh trip in transit with no current stop.
    pub fn start(
        carrier_id: CarrierId,
        operator_id: OperatorId,
        initial_position: Option<GeoPoint>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: TripId::new(),
            carrier_id,
            operator_id,
            started_at: now,
            ended_at: None,
            current_stop: None,
            arrived_at: None,
            phase: TripPhase::InTransit,
            last_position: initial_position.map(|position| PositionFix {
                position,
                reported_at: now,
            }),
        }
    }

    pub fn is_ended(&self) -> bool {
        self.ended_at.is_some()
    }

    pub fn is_at_stop(&self) -> bool {
        self.phase == TripPhase::AtStop && self.arrived_at.is_some()
    }

    /// True when the carrier is standing at `stop` right now.
    pub fn is_current_stop(&self, stop: StopId) -> bool {
        self.is_at_stop() && self.current_stop == Some(stop)
    }

    /// Time spent at the current stop, clamped at zero for skewed clocks.
    pub fn elapsed_at_stop(&self, now: DateTime<Utc>) -> Option<Duration> {
        let arrived_at = self.arrived_at.filter(|_| self.is_at_stop())?;
        Some((now - arrived_at).max(Duration::zero()))
    }

    pub fn arrive(
        &mut self,
        stop: StopId,
        now: DateTime<Utc>,
    ) -> Result<Arrival, TransitionError> {
        if self.is_ended() {
            return Err(TransitionError::Ended);
        }

        if self.phase == TripPhase::AtStop
            && self.current_stop == Some(stop)
            && self.arrived_at.is_some()
        {
            return Ok(Arrival::AlreadyThere);
        }

        self.phase = TripPhase::AtStop;
        self.current_stop = Some(stop);
        self.arrived_at = Some(now);
        Ok(Arrival::TimerStarted)
    }

    pub fn depart(&mut self) -> Result<(), TransitionError> {
        if self.is_ended() {
            return Err(TransitionError::Ended);
        }
        if self.phase != TripPhase::AtStop {
            return Err(TransitionError::NotAtStop);
        }

        self.phase = TripPhase::InTransit;
        self.arrived_at = None;
        Ok(())
    }

    pub fn end(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        if self.is_ended() {
            return Err(TransitionError::Ended);
        }

        self.ended_at = Some(now);
        self.phase = TripPhase::InTransit;
        self.current_stop = None;
        self.arrived_at = None;
        Ok(())
    }

    /// Last-write-wins position update; ignored once the trip has ended.
    pub fn record_position(&mut self, fix: PositionFix) -> bool {
        if self.is_ended() {
            return false;
        }
        self.last_position = Some(fix);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trip_at(now: DateTime<Utc>) -> Trip {
        Trip::start(CarrierId::new(), OperatorId::new(), None, now)
    }

    #[test]
    fn rearriving_at_same_stop_keeps_timer() {
        let t0 = Utc::now();
        let mut trip = trip_at(t0);
        let stop = StopId::new();

        assert_eq!(trip.arrive(stop, t0), Ok(Arrival::TimerStarted));
        let later = t0 + Duration::seconds(90);
        assert_eq!(trip.arrive(stop, later), Ok(Arrival::AlreadyThere));
        assert_eq!(trip.arrived_at, Some(t0));
        assert_eq!(trip.elapsed_at_stop(later), Some(Duration::seconds(90)));
    }

    #[test]
    fn arriving_at_other_stop_resets_timer() {
        let t0 = Utc::now();
        let mut trip = trip_at(t0);
        let (first, second) = (StopId::new(), StopId::new());

        trip.arrive(first, t0).unwrap();
        let later = t0 + Duration::seconds(30);
        assert_eq!(trip.arrive(second, later), Ok(Arrival::TimerStarted));
        assert_eq!(trip.current_stop, Some(second));
        assert_eq!(trip.arrived_at, Some(later));
        assert!(!trip.is_current_stop(first));
    }

    #[test]
    fn depart_keeps_stop_for_display() {
        let t0 = Utc::now();
        let mut trip = trip_at(t0);
        let stop = StopId::new();

        assert_eq!(trip.depart(), Err(TransitionError::NotAtStop));
        trip.arrive(stop, t0).unwrap();
        trip.depart().unwrap();

        assert_eq!(trip.phase, TripPhase::InTransit);
        assert_eq!(trip.current_stop, Some(stop));
        assert_eq!(trip.arrived_at, None);
        assert!(!trip.is_current_stop(stop));

        // Arriving again at the stop just left starts a fresh timer.
        let later = t0 + Duration::seconds(5);
        assert_eq!(trip.arrive(stop, later), Ok(Arrival::TimerStarted));
        assert_eq!(trip.arrived_at, Some(later));
    }

    #[test]
    fn end_is_terminal() {
        let t0 = Utc::now();
        let mut trip = trip_at(t0);
        trip.arrive(StopId::new(), t0).unwrap();
        trip.end(t0).unwrap();

        assert!(trip.is_ended());
        assert_eq!(trip.current_stop, None);
        assert_eq!(trip.arrived_at, None);
        assert_eq!(trip.end(t0), Err(TransitionError::Ended));
        assert_eq!(trip.arrive(StopId::new(), t0), Err(TransitionError::Ended));
        assert_eq!(trip.depart(), Err(TransitionError::Ended));
        let fix = PositionFix {
            position: GeoPoint::new(1.0, 1.0).unwrap(),
            reported_at: t0,
        };
        assert!(!trip.record_position(fix));
        assert_eq!(trip.last_position, None);
    }

    #[test]
    fn elapsed_is_clamped_for_clock_skew() {
        let t0 = Utc::now();
        let mut trip = trip_at(t0);
        trip.arrive(StopId::new(), t0).unwrap();
        assert_eq!(
            trip.elapsed_at_stop(t0 - Duration::seconds(3)),
            Some(Duration::zero())
        );
    }
}
