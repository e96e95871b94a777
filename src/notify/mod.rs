//! Best-effort fan-out of order events.
//!
//! Delivery runs on spawned tasks so a slow or failing sink never delays or
//! undoes the transition that produced the event.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::models::event::OrderEvent;
use crate::observability::metrics::Metrics;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum NotifyError {
    #[error("no subscribers")]
    NoSubscribers,

    #[error("push channel rejected event: {0}")]
    Rejected(String),
}

/// Push-notification collaborator.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    fn name(&self) -> &'static str;

    async fn deliver(&self, event: &OrderEvent) -> Result<(), NotifyError>;
}

/// Feeds the websocket stream.
pub struct BroadcastSink {
    tx: broadcast::Sender<OrderEvent>,
}

impl BroadcastSink {
    pub fn new(tx: broadcast::Sender<OrderEvent>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl NotificationSink for BroadcastSink {
    fn name(&self) -> &'static str {
        "broadcast"
    }

    async fn deliver(&self, event: &OrderEvent) -> Result<(), NotifyError> {
        self.tx
            .send(event.clone())
            .map(|_| ())
            .map_err(|_| NotifyError::NoSubscribers)
    }
}

#[derive(Clone)]
pub struct NotificationDispatcher {
    sinks: Vec<Arc<dyn NotificationSink>>,
    metrics: Metrics,
}

impl NotificationDispatcher {
    pub fn new(metrics: Metrics) -> Self {
        Self {
            sinks: Vec::new(),
            metrics,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn notify(&self, event: OrderEvent) {
        let event = Arc::new(event);

        for sink in &self.sinks {
            let sink = sink.clone();
            let event = event.clone();
            let metrics = self.metrics.clone();

            tokio::spawn(async move {
                match sink.deliver(&event).await {
                    Ok(()) => {
                        metrics.notifications_total.with_label_values(&["sent"]).inc();
                        debug!(
                            sink = sink.name(),
                            order_id = %event.order_id,
                            kind = ?event.kind,
                            "notification delivered"
                        );
                    }
                    // Nobody listening on the websocket is the normal idle state.
                    Err(NotifyError::NoSubscribers) => {
                        metrics
                            .notifications_total
                            .with_label_values(&["dropped"])
                            .inc();
                    }
                    Err(err) => {
                        metrics
                            .notifications_total
                            .with_label_values(&["failed"])
                            .inc();
                        warn!(
                            sink = sink.name(),
                            order_id = %event.order_id,
                            error = %err,
                            "notification delivery failed"
                        );
                    }
                }
            });
        }
    }
}
