use std::sync::Arc;

use tokio::sync::broadcast;

use crate::engine::coordinator::Coordinator;
use crate::engine::retry::RetryPolicy;
use crate::models::event::OrderEvent;
use crate::notify::{BroadcastSink, NotificationDispatcher, NotificationSink};
use crate::observability::metrics::Metrics;
use crate::store::DocumentStore;
use crate::store::blob::BlobStore;

pub struct AppState {
    pub coordinator: Arc<Coordinator>,
    pub events_tx: broadcast::Sender<OrderEvent>,
    pub metrics: Metrics,
}

impl AppState {
    /// Wires the coordinator to its collaborators. Extra sinks receive every
    /// event alongside the websocket stream.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobStore>,
        extra_sinks: Vec<Arc<dyn NotificationSink>>,
        retry: RetryPolicy,
        event_buffer_size: usize,
    ) -> Self {
        let metrics = Metrics::new();
        let (events_tx, _unused_rx) = broadcast::channel(event_buffer_size);

        let notifier = extra_sinks.into_iter().fold(
            NotificationDispatcher::new(metrics.clone())
                .with_sink(Arc::new(BroadcastSink::new(events_tx.clone()))),
            NotificationDispatcher::with_sink,
        );

        let coordinator = Coordinator::new(store, blobs, notifier, retry, metrics.clone());

        Self {
            coordinator: Arc::new(coordinator),
            events_tx,
            metrics,
        }
    }
}
