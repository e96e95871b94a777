use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::engine::agents::ensure_valid_location;
use crate::engine::lifecycle::{
    agent_completion_path, validate_agent_transition, validate_order_transition,
};
use crate::engine::retry::RetryPolicy;
use crate::error::AppError;
use crate::models::agent::{AgentStatus, DeliveryAgent, Location};
use crate::models::assignment::Assignment;
use crate::models::event::OrderEvent;
use crate::models::order::{
    DeliveryAddress, LineItem, Order, OrderStatus, PaymentStatus, Tracking,
};
use crate::notify::NotificationDispatcher;
use crate::observability::metrics::Metrics;
use crate::store::blob::BlobStore;
use crate::store::{DocumentStore, OrderFilter, StoreCounts, StoreError};

/// Upper bound on read-modify-write rounds lost to concurrent writers.
const MAX_CAS_ROUNDS: u32 = 8;

#[derive(Debug, Clone, Deserialize)]
pub struct NewOrder {
    pub buyer_id: Uuid,
    pub items: Vec<LineItem>,
    pub delivery_address: DeliveryAddress,
    #[serde(default = "default_delivery_format")]
    pub delivery_format: String,
    pub current_location: Option<Location>,
    pub estimated_delivery_time: Option<DateTime<Utc>>,
}

fn default_delivery_format() -> String {
    "standard".to_string()
}

/// Owns every mutation of orders and agents.
pub struct Coordinator {
    pub(crate) store: Arc<dyn DocumentStore>,
    pub(crate) blobs: Arc<dyn BlobStore>,
    pub(crate) notifier: NotificationDispatcher,
    pub(crate) retry: RetryPolicy,
    pub(crate) metrics: Metrics,
}

impl Coordinator {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobStore>,
        notifier: NotificationDispatcher,
        retry: RetryPolicy,
        metrics: Metrics,
    ) -> Self {
        Self {
            store,
            blobs,
            notifier,
            retry,
            metrics,
        }
    }

    pub async fn create_order(&self, request: NewOrder) -> Result<Order, AppError> {
        if request.items.is_empty() {
            return Err(AppError::BadRequest("order needs at least one item".to_string()));
        }
        if let Some(item) = request
            .items
            .iter()
            .find(|item| item.quantity == 0 || !item.unit_price.is_finite() || item.unit_price < 0.0)
        {
            return Err(AppError::BadRequest(format!(
                "invalid line item for product {}",
                item.product_id
            )));
        }
        if let Some(location) = &request.current_location {
            ensure_valid_location(location)?;
        }

        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4(),
            buyer_id: request.buyer_id,
            total_price: request.items.iter().map(LineItem::subtotal).sum(),
            items: request.items,
            delivery_address: request.delivery_address,
            delivery_format: request.delivery_format,
            payment_status: PaymentStatus::Pending,
            tracking: Tracking {
                status: OrderStatus::Pending,
                current_location: request.current_location,
                estimated_delivery_time: request.estimated_delivery_time,
            },
            agent_id: None,
            assigned_at: None,
            created_at: now,
            updated_at: now,
            version: 0,
        };

        let order = self
            .retry
            .run(&self.metrics, "insert_order", || {
                self.store.insert_order(order.clone())
            })
            .await?;

        info!(order_id = %order.id, buyer_id = %order.buyer_id, total = order.total_price, "order created");
        self.notifier.notify(OrderEvent::status_changed(
            order.id,
            order.buyer_id,
            None,
            OrderStatus::Pending,
        ));

        Ok(order)
    }

    pub async fn get_order(&self, order_id: Uuid) -> Result<Order, AppError> {
        self.retry
            .run(&self.metrics, "get_order", || self.store.get_order(order_id))
            .await?
            .ok_or(AppError::OrderNotFound(order_id))
    }

    pub async fn get_agent(&self, agent_id: Uuid) -> Result<DeliveryAgent, AppError> {
        self.retry
            .run(&self.metrics, "get_agent", || self.store.get_agent(agent_id))
            .await?
            .ok_or(AppError::AgentNotFound(agent_id))
    }

    pub async fn orders(&self, filter: OrderFilter) -> Result<Vec<Order>, AppError> {
        Ok(self
            .retry
            .run(&self.metrics, "query_orders", || self.store.query_orders(filter))
            .await?)
    }

    pub async fn store_counts(&self) -> Result<StoreCounts, AppError> {
        Ok(self
            .retry
            .run(&self.metrics, "counts", || self.store.counts())
            .await?)
    }

    /// Binds `agent_id` to `order_id`.
    ///
    /// The agent is claimed first so that two orders racing for one agent are
    /// decided by the agent's version check. If binding the order then fails,
    /// the claim is rolled back. Repeating a successful call is a no-op that
    /// returns the existing assignment.
    pub async fn assign(&self, order_id: Uuid, agent_id: Uuid) -> Result<Assignment, AppError> {
        let start = Instant::now();
        let result = self.try_assign(order_id, agent_id).await;

        let outcome = match &result {
            Ok(assignment) if assignment.replayed => "replayed",
            Ok(_) => "success",
            Err(err) => err.code().as_str(),
        };
        self.metrics
            .assignment_latency_seconds
            .with_label_values(&[outcome])
            .observe(start.elapsed().as_secs_f64());
        self.metrics
            .assignments_total
            .with_label_values(&[outcome])
            .inc();

        if let Err(err) = &result {
            warn!(order_id = %order_id, agent_id = %agent_id, error = %err, "assignment rejected");
        }

        result
    }

    async fn try_assign(&self, order_id: Uuid, agent_id: Uuid) -> Result<Assignment, AppError> {
        let order = self.get_order(order_id).await?;
        if let Some(existing) = existing_assignment(&order, agent_id) {
            debug!(order_id = %order_id, agent_id = %agent_id, "assignment already in place");
            return Ok(existing);
        }
        if order.status() != OrderStatus::Pending {
            return Err(AppError::OrderNotPending {
                order_id,
                status: order.status().to_string(),
            });
        }

        let (agent, claimed_here) = self
            .modify_agent(agent_id, "claim_agent", |agent| {
                if agent.active_order == Some(order_id) && agent.status == AgentStatus::Assigned {
                    return Ok(false);
                }
                ensure_assignable(agent)?;
                validate_agent_transition(agent.status, AgentStatus::Assigned)?;

                agent.status = AgentStatus::Assigned;
                agent.active_order = Some(order_id);
                if !agent.delivery_orders.contains(&order_id) {
                    agent.delivery_orders.push(order_id);
                }
                Ok(true)
            })
            .await?;

        let assigned_at = Utc::now();
        let bound = self
            .modify_order(order_id, "bind_order", |order| {
                if order.agent_id == Some(agent_id) && order.status() == OrderStatus::InTransit {
                    return Ok(false);
                }
                if order.status() != OrderStatus::Pending {
                    return Err(AppError::OrderNotPending {
                        order_id,
                        status: order.status().to_string(),
                    });
                }
                validate_order_transition(order.status(), OrderStatus::InTransit)?;

                order.tracking.status = OrderStatus::InTransit;
                order.agent_id = Some(agent_id);
                order.assigned_at = Some(assigned_at);
                Ok(true)
            })
            .await;

        let (order, bound_here) = match bound {
            Ok(written) => written,
            Err(err) => {
                // A claim left behind by an earlier attempt whose rollback
                // failed is released here too.
                if claimed_here || agent.active_order == Some(order_id) {
                    self.release_claim(agent_id, order_id).await;
                }
                return Err(err);
            }
        };

        if bound_here {
            self.metrics.record_transition("order", OrderStatus::InTransit);
        }
        if claimed_here {
            self.metrics.record_transition("agent", AgentStatus::Assigned);
        }

        if !bound_here {
            return existing_assignment(&order, agent.id).ok_or_else(|| {
                AppError::Internal(format!("order {order_id} bound without assignment"))
            });
        }

        info!(order_id = %order_id, agent_id = %agent_id, "order assigned");
        self.notifier.notify(OrderEvent::status_changed(
            order.id,
            order.buyer_id,
            Some(agent_id),
            OrderStatus::InTransit,
        ));

        Ok(Assignment {
            order_id,
            agent_id,
            assigned_at,
            replayed: false,
        })
    }

    /// Compensation for a claim whose order write failed. Restores the agent
    /// to the state it had before the claim, bypassing the edge rules.
    /// Skipped when the order did end up bound to the agent.
    async fn release_claim(&self, agent_id: Uuid, order_id: Uuid) {
        match self.get_order(order_id).await {
            Ok(order) if order.agent_id == Some(agent_id) => {
                debug!(order_id = %order_id, agent_id = %agent_id, "order bound after all; claim kept");
                return;
            }
            Ok(_) => {}
            Err(err) => {
                warn!(order_id = %order_id, error = %err, "could not re-read order before releasing claim");
            }
        }

        let released = self
            .modify_agent(agent_id, "release_agent", |agent| {
                if agent.active_order != Some(order_id) {
                    return Ok(false);
                }
                agent.status = AgentStatus::Available;
                agent.active_order = None;
                agent.delivery_orders.retain(|id| *id != order_id);
                Ok(true)
            })
            .await;

        match released {
            Ok(_) => {
                self.metrics
                    .compensations_total
                    .with_label_values(&["assign", "ok"])
                    .inc();
                info!(order_id = %order_id, agent_id = %agent_id, "agent claim rolled back");
            }
            Err(err) => {
                self.metrics
                    .compensations_total
                    .with_label_values(&["assign", "failed"])
                    .inc();
                error!(
                    order_id = %order_id,
                    agent_id = %agent_id,
                    error = %err,
                    "failed to roll back agent claim; agent left assigned"
                );
            }
        }
    }

    /// Moves an order along its lifecycle. Completing an in-transit order
    /// also concludes the bound agent's job.
    pub async fn update_order_status(
        &self,
        order_id: Uuid,
        next: OrderStatus,
    ) -> Result<Order, AppError> {
        if next == OrderStatus::InTransit {
            return Err(AppError::BadRequest(
                "orders enter IN_TRANSIT only through assignment".to_string(),
            ));
        }

        let mut previous = OrderStatus::Pending;
        let (order, changed) = self
            .modify_order(order_id, "update_order_status", |order| {
                if order.status() == next {
                    return Ok(false);
                }
                validate_order_transition(order.status(), next)?;
                previous = order.status();
                order.tracking.status = next;
                Ok(true)
            })
            .await?;

        if !changed {
            return Ok(order);
        }

        let order = match order.agent_id {
            Some(agent_id) if previous == OrderStatus::InTransit => {
                match self.conclude_agent_job(agent_id, order_id).await {
                    Ok(()) => order,
                    Err(err) => {
                        self.revert_order_status(order_id, next, previous).await;
                        return Err(err);
                    }
                }
            }
            _ => order,
        };

        self.metrics.record_transition("order", next);
        info!(order_id = %order_id, from = %previous, to = %next, "order status updated");
        self.notifier.notify(OrderEvent::status_changed(
            order.id,
            order.buyer_id,
            order.agent_id,
            next,
        ));

        Ok(order)
    }

    async fn conclude_agent_job(&self, agent_id: Uuid, order_id: Uuid) -> Result<(), AppError> {
        let (agent, changed) = self
            .modify_agent(agent_id, "conclude_agent_job", |agent| {
                if agent.active_order != Some(order_id) {
                    return Ok(false);
                }
                if let Some(path) = agent_completion_path(agent.status) {
                    for &step in path {
                        validate_agent_transition(agent.status, step)?;
                        agent.status = step;
                    }
                }
                agent.active_order = None;
                Ok(true)
            })
            .await?;

        if changed {
            self.metrics.record_transition("agent", agent.status);
            debug!(agent_id = %agent_id, status = %agent.status, "agent job concluded");
        }
        Ok(())
    }

    async fn revert_order_status(&self, order_id: Uuid, applied: OrderStatus, previous: OrderStatus) {
        let reverted = self
            .modify_order(order_id, "revert_order_status", |order| {
                if order.status() != applied {
                    return Ok(false);
                }
                order.tracking.status = previous;
                Ok(true)
            })
            .await;

        match reverted {
            Ok(_) => {
                self.metrics
                    .compensations_total
                    .with_label_values(&["complete", "ok"])
                    .inc();
                info!(order_id = %order_id, status = %previous, "order status rolled back");
            }
            Err(err) => {
                self.metrics
                    .compensations_total
                    .with_label_values(&["complete", "failed"])
                    .inc();
                error!(
                    order_id = %order_id,
                    error = %err,
                    "failed to roll back order status"
                );
            }
        }
    }

    /// Payment is an independent axis; any status may follow any other.
    pub async fn update_payment_status(
        &self,
        order_id: Uuid,
        payment_status: PaymentStatus,
    ) -> Result<Order, AppError> {
        let (order, changed) = self
            .modify_order(order_id, "update_payment_status", |order| {
                if order.payment_status == payment_status {
                    return Ok(false);
                }
                order.payment_status = payment_status;
                Ok(true)
            })
            .await?;

        if changed {
            info!(order_id = %order_id, payment_status = %payment_status, "payment status updated");
        }
        Ok(order)
    }

    /// Read-modify-write on one order, repeated while other writers win the
    /// version race. `apply` returns `false` when nothing needs writing.
    pub(crate) async fn modify_order<F>(
        &self,
        order_id: Uuid,
        operation: &'static str,
        mut apply: F,
    ) -> Result<(Order, bool), AppError>
    where
        F: FnMut(&mut Order) -> Result<bool, AppError> + Send,
    {
        for _ in 0..MAX_CAS_ROUNDS {
            let mut order = self.get_order(order_id).await?;
            if !apply(&mut order)? {
                return Ok((order, false));
            }
            order.updated_at = Utc::now();

            match self
                .retry
                .run(&self.metrics, operation, || self.store.update_order(order.clone()))
                .await
            {
                Ok(written) => return Ok((written, true)),
                Err(StoreError::VersionConflict { .. }) => {
                    debug!(order_id = %order_id, operation, "order changed underneath; re-reading");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(AppError::Conflict(format!(
            "order {order_id} kept changing during {operation}"
        )))
    }

    /// Agent counterpart of [`Coordinator::modify_order`].
    pub(crate) async fn modify_agent<F>(
        &self,
        agent_id: Uuid,
        operation: &'static str,
        mut apply: F,
    ) -> Result<(DeliveryAgent, bool), AppError>
    where
        F: FnMut(&mut DeliveryAgent) -> Result<bool, AppError> + Send,
    {
        for _ in 0..MAX_CAS_ROUNDS {
            let mut agent = self.get_agent(agent_id).await?;
            if !apply(&mut agent)? {
                return Ok((agent, false));
            }
            agent.updated_at = Utc::now();

            match self
                .retry
                .run(&self.metrics, operation, || self.store.update_agent(agent.clone()))
                .await
            {
                Ok(written) => return Ok((written, true)),
                Err(StoreError::VersionConflict { .. }) => {
                    debug!(agent_id = %agent_id, operation, "agent changed underneath; re-reading");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(AppError::Conflict(format!(
            "agent {agent_id} kept changing during {operation}"
        )))
    }
}

fn existing_assignment(order: &Order, agent_id: Uuid) -> Option<Assignment> {
    let bound = order.agent_id == Some(agent_id)
        && matches!(order.status(), OrderStatus::InTransit | OrderStatus::Delivered);
    if !bound {
        return None;
    }

    Some(Assignment {
        order_id: order.id,
        agent_id,
        assigned_at: order.assigned_at.unwrap_or(order.updated_at),
        replayed: true,
    })
}

fn ensure_assignable(agent: &DeliveryAgent) -> Result<(), AppError> {
    let reason = if !agent.is_verified() {
        "not verified".to_string()
    } else if agent.status != AgentStatus::Available {
        format!("status is {}", agent.status)
    } else if let Some(order_id) = agent.active_order {
        format!("still bound to order {order_id}")
    } else {
        return Ok(());
    };

    Err(AppError::AgentNotAvailable {
        agent_id: agent.id,
        reason,
    })
}
