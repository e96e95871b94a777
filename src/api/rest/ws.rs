use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::event::OrderEvent;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct EventStreamQuery {
    /// Restricts the stream to one buyer's notifications.
    pub buyer_id: Option<Uuid>,
}

impl EventStreamQuery {
    fn accepts(&self, event: &OrderEvent) -> bool {
        self.buyer_id.is_none_or(|buyer_id| buyer_id == event.buyer_id)
    }
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<EventStreamQuery>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| stream_events(socket, state, query))
}

async fn stream_events(socket: WebSocket, state: Arc<AppState>, query: EventStreamQuery) {
    let (mut sink, mut inbound) = socket.split();
    let mut events = state.events_tx.subscribe();

    info!(buyer_id = ?query.buyer_id, "event stream opened");

    let forward = tokio::spawn(async move {
        loop {
            let event = match events.recv().await {
                Ok(event) if query.accepts(&event) => event,
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event stream lagging; events dropped");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            let payload = match serde_json::to_string(&event) {
                Ok(payload) => payload,
                Err(err) => {
                    warn!(order_id = %event.order_id, error = %err, "failed to encode event");
                    continue;
                }
            };

            if sink.send(Message::Text(payload)).await.is_err() {
                break;
            }
        }
    });

    // Inbound frames are ignored; the loop only notices the client leaving.
    let drain = tokio::spawn(async move { while let Some(Ok(_)) = inbound.next().await {} });

    tokio::select! {
        _ = forward => {},
        _ = drain => {},
    }

    info!("event stream closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::order::OrderStatus;

    #[test]
    fn buyer_filter_only_passes_matching_events() {
        let buyer_id = Uuid::new_v4();
        let event = OrderEvent::status_changed(Uuid::new_v4(), buyer_id, None, OrderStatus::Pending);

        assert!(EventStreamQuery::default().accepts(&event));
        assert!(EventStreamQuery { buyer_id: Some(buyer_id) }.accepts(&event));
        assert!(!EventStreamQuery { buyer_id: Some(Uuid::new_v4()) }.accepts(&event));
    }
}
