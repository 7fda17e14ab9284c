use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior, interval, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use waypost_model::{DerivedStopStatus, StopId, Trip, TripId};

use super::{LiveConfig, LiveUpdate};
use crate::board::{TripBoard, ViewScope};
use crate::coordinator::TripCoordinator;
use crate::database::ports::TripChangeKind;
use crate::error::Result;

pub(super) enum FeedCommand {
    Register {
        id: u64,
        scope: ViewScope,
        sender: mpsc::Sender<LiveUpdate>,
        ack: oneshot::Sender<Result<()>>,
    },
    Unregister {
        id: u64,
    },
}

/// Registry entry for a running feed.
#[derive(Clone)]
pub(super) struct FeedHandle {
    pub generation: u64,
    pub commands: mpsc::UnboundedSender<FeedCommand>,
}

struct Subscriber {
    scope: ViewScope,
    sender: mpsc::Sender<LiveUpdate>,
    last_sent: HashMap<StopId, DerivedStopStatus>,
    /// Set when the queue was full; the next push is a snapshot.
    resync: bool,
}

enum Delivery {
    Sent,
    Full,
    Closed,
}

fn deliver(sender: &mpsc::Sender<LiveUpdate>, update: LiveUpdate) -> Delivery {
    match sender.try_send(update) {
        Ok(()) => Delivery::Sent,
        Err(mpsc::error::TrySendError::Full(_)) => Delivery::Full,
        Err(mpsc::error::TrySendError::Closed(_)) => Delivery::Closed,
    }
}

pub(super) struct Feed {
    trip_id: TripId,
    generation: u64,
    coordinator: TripCoordinator,
    config: LiveConfig,
    registry: Arc<DashMap<TripId, FeedHandle>>,
    board: Option<TripBoard>,
    last_trip: Option<Trip>,
    subscribers: HashMap<u64, Subscriber>,
    trip_dirty: bool,
    signals_dirty: bool,
    full_refresh: bool,
    flush_at: Option<Instant>,
    registered: bool,
    finished: bool,
}

impl Feed {
    pub fn new(
        trip_id: TripId,
        generation: u64,
        coordinator: TripCoordinator,
        config: LiveConfig,
        registry: Arc<DashMap<TripId, FeedHandle>>,
    ) -> Self {
        Self {
            trip_id,
            generation,
            coordinator,
            config,
            registry,
            board: None,
            last_trip: None,
            subscribers: HashMap::new(),
            trip_dirty: false,
            signals_dirty: false,
            full_refresh: false,
            flush_at: None,
            registered: false,
            finished: false,
        }
    }

    pub async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<FeedCommand>,
        shutdown: CancellationToken,
    ) {
        // Subscribe before the first load so no change can slip in between.
        let mut trip_changes = self.coordinator.stores().trips.subscribe();
        let mut signal_changes = self.coordinator.stores().signals.subscribe();

        let mut ticker = interval(self.config.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        debug!(trip_id = %self.trip_id, generation = self.generation, "live feed started");

        while !self.finished {
            let ticking = self.is_ticking();
            let flush_deadline = self.flush_at.unwrap_or_else(Instant::now);

            tokio::select! {
                _ = shutdown.cancelled() => {
                    self.finished = true;
                }
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => self.finished = true,
                },
                change = trip_changes.recv() => match change {
                    Ok(change) if change.trip_id == self.trip_id => {
                        trace!(trip_id = %self.trip_id, kind = change.kind.as_str(), "trip change");
                        self.trip_dirty = true;
                        if change.kind == TripChangeKind::Ended {
                            self.flush_at = Some(Instant::now());
                        } else {
                            self.schedule_flush();
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(trip_id = %self.trip_id, skipped, "trip changes lagged, recomputing");
                        self.full_refresh = true;
                        self.schedule_flush();
                    }
                    Err(RecvError::Closed) => self.finished = true,
                },
                change = signal_changes.recv() => match change {
                    Ok(change) if change.trip_id == self.trip_id => {
                        trace!(trip_id = %self.trip_id, stop_id = %change.stop_id, "signal change");
                        self.signals_dirty = true;
                        self.schedule_flush();
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(trip_id = %self.trip_id, skipped, "signal changes lagged, recomputing");
                        self.full_refresh = true;
                        self.schedule_flush();
                    }
                    Err(RecvError::Closed) => self.finished = true,
                },
                _ = sleep_until(flush_deadline), if self.flush_at.is_some() => {
                    self.flush().await;
                }
                _ = ticker.tick(), if ticking => {
                    if self.flush_at.is_some() {
                        self.flush().await;
                    } else {
                        self.push_statuses();
                    }
                }
            }

            if self.registered && self.subscribers.is_empty() {
                self.finished = true;
            }
        }

        // Unregister before closing so late subscribers start a new feed
        // instead of queueing on this one.
        self.registry
            .remove_if(&self.trip_id, |_, handle| handle.generation == self.generation);
        commands.close();
        debug!(trip_id = %self.trip_id, generation = self.generation, "live feed stopped");
    }

    async fn load_board(&self) -> Result<TripBoard> {
        let coordinator = &self.coordinator;
        let trip_id = self.trip_id;
        self.config
            .retry
            .run(|| coordinator.load_board(trip_id))
            .await
    }

    fn is_ticking(&self) -> bool {
        self.board
            .as_ref()
            .is_some_and(|board| board.trip.is_at_stop())
    }

    fn schedule_flush(&mut self) {
        if self.flush_at.is_none() {
            self.flush_at = Some(Instant::now() + self.config.coalesce);
        }
    }

    async fn handle_command(&mut self, command: FeedCommand) {
        match command {
            FeedCommand::Register {
                id,
                scope,
                sender,
                ack,
            } => {
                self.registered = true;
                let outcome = self.register(id, scope, sender).await;
                // The subscriber may have given up already.
                let _ = ack.send(outcome);
            }
            FeedCommand::Unregister { id } => {
                if self.subscribers.remove(&id).is_some() {
                    debug!(trip_id = %self.trip_id, subscriber = id, "subscriber left");
                }
            }
        }
    }

    async fn register(
        &mut self,
        id: u64,
        scope: ViewScope,
        sender: mpsc::Sender<LiveUpdate>,
    ) -> Result<()> {
        if self.board.is_none() {
            let board = self.load_board().await?;
            self.last_trip = Some(board.trip.clone());
            self.board = Some(board);
        }
        let Some(board) = self.board.as_ref() else {
            return Ok(());
        };

        let now = self.coordinator.clock().now();
        let statuses = board.statuses(self.coordinator.windows(), scope, now);
        let last_sent = statuses
            .iter()
            .map(|status| (status.stop_id, status.clone()))
            .collect();

        // A fresh channel always has room for the snapshot and the end marker.
        let _ = sender.try_send(LiveUpdate::Snapshot {
            trip: board.trip.clone(),
            statuses,
        });

        if board.trip.is_ended() {
            let _ = sender.try_send(LiveUpdate::TripEnded {
                trip: board.trip.clone(),
            });
            return Ok(());
        }

        self.subscribers.insert(
            id,
            Subscriber {
                scope,
                sender,
                last_sent,
                resync: false,
            },
        );
        debug!(
            trip_id = %self.trip_id,
            subscriber = id,
            subscribers = self.subscribers.len(),
            "subscriber joined"
        );
        Ok(())
    }

    async fn flush(&mut self) {
        self.flush_at = None;
        if let Err(err) = self.refresh().await {
            warn!(trip_id = %self.trip_id, error = %err, "live feed refresh failed, retrying");
            self.schedule_flush();
            return;
        }

        let Some(trip) = self.board.as_ref().map(|board| board.trip.clone()) else {
            return;
        };

        if self.last_trip.as_ref() != Some(&trip) {
            self.last_trip = Some(trip.clone());
            if !trip.is_ended() {
                self.broadcast(LiveUpdate::TripChanged { trip: trip.clone() });
            }
        }

        self.push_statuses();

        if trip.is_ended() {
            self.broadcast(LiveUpdate::TripEnded { trip });
            self.finished = true;
        }
    }

    /// Re-read whatever the change notifications marked stale.
    async fn refresh(&mut self) -> Result<()> {
        if self.full_refresh || self.board.is_none() {
            let board = self.load_board().await?;
            self.board = Some(board);
            self.full_refresh = false;
            self.trip_dirty = false;
            self.signals_dirty = false;
            return Ok(());
        }

        let stores = self.coordinator.stores().clone();
        if self.trip_dirty {
            let trip = stores.trips.get_trip(self.trip_id).await?;
            if let (Some(trip), Some(board)) = (trip, self.board.as_mut()) {
                board.trip = trip;
            }
            self.trip_dirty = false;
        }
        if self.signals_dirty {
            let signals = stores.signals.trip_signals(self.trip_id).await?;
            if let Some(board) = self.board.as_mut() {
                board.signals = signals;
            }
            self.signals_dirty = false;
        }
        Ok(())
    }

    fn broadcast(&mut self, update: LiveUpdate) {
        self.subscribers.retain(|id, subscriber| {
            match deliver(&subscriber.sender, update.clone()) {
                Delivery::Sent => true,
                Delivery::Full => {
                    subscriber.resync = true;
                    true
                }
                Delivery::Closed => {
                    trace!(subscriber = id, "subscriber channel closed");
                    false
                }
            }
        });
    }

    /// Derive every stop and send each subscriber the statuses in its scope
    /// that differ from what it last received.
    fn push_statuses(&mut self) {
        let Some(board) = self.board.as_ref() else {
            return;
        };
        let now = self.coordinator.clock().now();
        let statuses = board.statuses(self.coordinator.windows(), ViewScope::AllStops, now);

        self.subscribers.retain(|id, subscriber| {
            let visible = statuses
                .iter()
                .filter(|status| subscriber.scope.includes(status.stop_id));

            if subscriber.resync {
                let snapshot: Vec<_> = visible.cloned().collect();
                let update = LiveUpdate::Snapshot {
                    trip: board.trip.clone(),
                    statuses: snapshot.clone(),
                };
                return match deliver(&subscriber.sender, update) {
                    Delivery::Sent => {
                        subscriber.resync = false;
                        subscriber.last_sent = snapshot
                            .into_iter()
                            .map(|status| (status.stop_id, status))
                            .collect();
                        true
                    }
                    Delivery::Full => true,
                    Delivery::Closed => false,
                };
            }

            for status in visible {
                let unchanged = subscriber
                    .last_sent
                    .get(&status.stop_id)
                    .is_some_and(|previous| previous.same_view(status));
                if unchanged {
                    continue;
                }

                let update = LiveUpdate::Status {
                    status: status.clone(),
                };
                match deliver(&subscriber.sender, update) {
                    Delivery::Sent => {
                        trace!(
                            subscriber = *id,
                            stop_id = %status.stop_id,
                            color = %status.color,
                            "status pushed"
                        );
                        subscriber.last_sent.insert(status.stop_id, status.clone());
                    }
                    Delivery::Full => {
                        subscriber.resync = true;
                        return true;
                    }
                    Delivery::Closed => return false,
                }
            }
            true
        });
    }
}
