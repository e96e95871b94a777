use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::order::OrderStatus;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    StatusChanged,
    ConfirmationRequested,
}

/// Outbound notification about an order, addressed to its buyer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderEvent {
    pub kind: EventKind,
    pub order_id: Uuid,
    pub buyer_id: Uuid,
    pub agent_id: Option<Uuid>,
    pub status: OrderStatus,
    pub message: String,
    pub emitted_at: DateTime<Utc>,
}

impl OrderEvent {
    pub fn status_changed(
        order_id: Uuid,
        buyer_id: Uuid,
        agent_id: Option<Uuid>,
        status: OrderStatus,
    ) -> Self {
        Self {
            kind: EventKind::StatusChanged,
            order_id,
            buyer_id,
            agent_id,
            status,
            message: format!("Your order #{order_id} status has been updated to {status}"),
            emitted_at: Utc::now(),
        }
    }

    pub fn confirmation_requested(order_id: Uuid, buyer_id: Uuid, agent_id: Uuid) -> Self {
        Self {
            kind: EventKind::ConfirmationRequested,
            order_id,
            buyer_id,
            agent_id: Some(agent_id),
            status: OrderStatus::InTransit,
            message: format!("Please confirm delivery of order #{order_id}"),
            emitted_at: Utc::now(),
        }
    }
}
