use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use waypost_model::{Actor, TripId};

use super::feed::{Feed, FeedCommand, FeedHandle};
use super::{LiveConfig, LiveUpdate};
use crate::board::ViewScope;
use crate::coordinator::TripCoordinator;
use crate::error::{CoordinatorError, Result};

const MAX_REGISTER_ATTEMPTS: usize = 8;

/// Fans derived stop statuses out to live subscribers, one feed task per
/// watched trip.
#[derive(Clone)]
pub struct LivePublisher {
    coordinator: TripCoordinator,
    config: LiveConfig,
    feeds: Arc<DashMap<TripId, FeedHandle>>,
    next_id: Arc<AtomicU64>,
    shutdown: CancellationToken,
}

impl fmt::Debug for LivePublisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LivePublisher")
            .field("feed_count", &self.feeds.len())
            .field("config", &self.config)
            .field("shut_down", &self.shutdown.is_cancelled())
            .finish()
    }
}

impl LivePublisher {
    pub fn new(coordinator: TripCoordinator, config: LiveConfig) -> Self {
        Self {
            coordinator,
            config,
            feeds: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicU64::new(1)),
            shutdown: CancellationToken::new(),
        }
    }

    /// Number of trips with a running feed.
    pub fn active_feeds(&self) -> usize {
        self.feeds.len()
    }

    /// Stop every feed; open subscriptions see their stream close.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Subscribe `actor` to the live view of `trip_id`.
    ///
    /// The first message is always a [`LiveUpdate::Snapshot`]. Operators
    /// receive every stop, riders only their own. Subscribing to an ended
    /// trip yields the snapshot followed by [`LiveUpdate::TripEnded`].
    pub async fn subscribe(&self, actor: &Actor, trip_id: TripId) -> Result<LiveSubscription> {
        let (trip, scope) = self.coordinator.view_scope(actor, trip_id).await?;

        if trip.is_ended() {
            return self.ended_subscription(trip_id, scope).await;
        }

        for attempt in 1..=MAX_REGISTER_ATTEMPTS {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            let handle = self.feed_handle(trip_id);

            let (sender, updates) = mpsc::channel(self.config.subscriber_buffer.max(2));
            let (ack, acked) = oneshot::channel();
            let command = FeedCommand::Register {
                id,
                scope,
                sender,
                ack,
            };

            if handle.commands.send(command).is_ok()
                && let Ok(outcome) = acked.await
            {
                outcome?;
                debug!(trip_id = %trip_id, subscriber = id, ?scope, "live subscription opened");
                return Ok(LiveSubscription {
                    id,
                    trip_id,
                    scope,
                    updates,
                    commands: Some(handle.commands),
                });
            }

            // The feed shut down between lookup and registration.
            self.feeds
                .remove_if(&trip_id, |_, current| current.generation == handle.generation);
            debug!(trip_id = %trip_id, attempt, "live feed went away, retrying");
            tokio::task::yield_now().await;
        }

        warn!(trip_id = %trip_id, "could not attach to live feed");
        Err(CoordinatorError::Internal(format!(
            "live feed for trip {trip_id} kept shutting down"
        )))
    }

    fn feed_handle(&self, trip_id: TripId) -> FeedHandle {
        self.feeds
            .entry(trip_id)
            .or_insert_with(|| self.spawn_feed(trip_id))
            .clone()
    }

    fn spawn_feed(&self, trip_id: TripId) -> FeedHandle {
        let generation = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (commands, receiver) = mpsc::unbounded_channel();
        let feed = Feed::new(
            trip_id,
            generation,
            self.coordinator.clone(),
            self.config.clone(),
            Arc::clone(&self.feeds),
        );
        tokio::spawn(feed.run(receiver, self.shutdown.child_token()));
        FeedHandle {
            generation,
            commands,
        }
    }

    async fn ended_subscription(&self, trip_id: TripId, scope: ViewScope) -> Result<LiveSubscription> {
        let coordinator = &self.coordinator;
        let board = self
            .config
            .retry
            .run(|| coordinator.load_board(trip_id))
            .await?;
        let statuses = board.statuses(
            self.coordinator.windows(),
            scope,
            self.coordinator.clock().now(),
        );

        let (sender, updates) = mpsc::channel(2);
        let _ = sender.try_send(LiveUpdate::Snapshot {
            trip: board.trip.clone(),
            statuses,
        });
        let _ = sender.try_send(LiveUpdate::TripEnded { trip: board.trip });

        Ok(LiveSubscription {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            trip_id,
            scope,
            updates,
            commands: None,
        })
    }
}

/// Receiving end of a live view. Dropping it unregisters the subscriber.
pub struct LiveSubscription {
    id: u64,
    trip_id: TripId,
    scope: ViewScope,
    updates: mpsc::Receiver<LiveUpdate>,
    commands: Option<mpsc::UnboundedSender<FeedCommand>>,
}

impl LiveSubscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn trip_id(&self) -> TripId {
        self.trip_id
    }

    pub fn scope(&self) -> ViewScope {
        self.scope
    }

    /// Next update, or `None` once the trip ended or the feed stopped.
    pub async fn recv(&mut self) -> Option<LiveUpdate> {
        self.updates.recv().await
    }
}

impl fmt::Debug for LiveSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveSubscription")
            .field("id", &self.id)
            .field("trip_id", &self.trip_id)
            .field("scope", &self.scope)
            .finish()
    }
}

impl Drop for LiveSubscription {
    fn drop(&mut self) {
        if let Some(commands) = self.commands.take() {
            let _ = commands.send(FeedCommand::Unregister { id: self.id });
        }
    }
}
