//! Live view over WebSocket.
//!
//! The subscription is opened before the upgrade so that authorization and
//! lookup failures are reported as ordinary HTTP errors.

use axum::{
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, warn};
use waypost_core::LiveSubscription;
use waypost_model::TripId;

use crate::infra::{app_state::AppState, errors::AppResult, identity::CurrentActor};

pub async fn live_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(trip_id): Path<TripId>,
) -> AppResult<Response> {
    let subscription = state.live().subscribe(&actor, trip_id).await?;
    Ok(ws.on_upgrade(move |socket| stream_updates(socket, subscription)))
}

async fn stream_updates(socket: WebSocket, mut subscription: LiveSubscription) {
    let trip_id = subscription.trip_id();
    let subscriber = subscription.id();
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let mut send_task = tokio::spawn(async move {
        while let Some(update) = subscription.recv().await {
            let text = match serde_json::to_string(&update) {
                Ok(text) => text,
                Err(err) => {
                    warn!(error = %err, "failed to encode live update");
                    continue;
                }
            };
            if ws_sender.send(Message::Text(text.into())).await.is_err() {
                return;
            }
        }
        // Trip ended or the publisher shut down.
        let _ = ws_sender.send(Message::Close(None)).await;
    });

    // Inbound frames carry nothing; only watch for the client going away.
    let mut recv_task = tokio::spawn(async move {
        while let Some(message) = ws_receiver.next().await {
            match message {
                Ok(Message::Close(_)) => break,
                Err(err) => {
                    debug!(error = %err, "live socket error");
                    break;
                }
                Ok(_) => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    debug!(trip_id = %trip_id, subscriber, "live socket closed");
}
