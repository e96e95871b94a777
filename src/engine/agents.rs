//! Agent-facing operations: registration, heartbeat, verification and
//! reputation.

use axum::body::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::coordinator::Coordinator;
use crate::engine::lifecycle::validate_agent_transition;
use crate::engine::scoring::rank_candidates;
use crate::error::AppError;
use crate::geo::distance_km;
use crate::models::agent::{
    AgentReview, AgentStatus, DeliveryAgent, Location, Rating, ReportKind, VerificationStatus,
};
use crate::models::assignment::Candidate;
use crate::models::event::OrderEvent;
use crate::models::order::{Order, OrderStatus};
use crate::store::blob::verification_document_path;
use crate::store::{AgentFilter, OrderFilter};

#[derive(Debug, Clone, Deserialize)]
pub struct NewAgent {
    pub name: String,
    pub location: Location,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewReview {
    pub customer_id: Uuid,
    pub rating: u8,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NearbyAgent {
    pub agent: DeliveryAgent,
    pub distance_km: f64,
}

pub(crate) fn ensure_valid_location(location: &Location) -> Result<(), AppError> {
    if location.is_valid() {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!(
            "location ({}, {}) is out of range",
            location.lat, location.lng
        )))
    }
}

impl Coordinator {
    pub async fn create_agent(&self, request: NewAgent) -> Result<DeliveryAgent, AppError> {
        if request.name.trim().is_empty() {
            return Err(AppError::BadRequest("name cannot be empty".to_string()));
        }
        ensure_valid_location(&request.location)?;

        let now = Utc::now();
        let agent = DeliveryAgent {
            id: Uuid::new_v4(),
            name: request.name,
            verification: VerificationStatus::Pending,
            document_url: None,
            status: AgentStatus::Available,
            rating: Rating::default(),
            reviews: Vec::new(),
            fraud_reports: 0,
            negligence_reports: 0,
            location: request.location,
            active_order: None,
            delivery_orders: Vec::new(),
            last_seen: now,
            updated_at: now,
            version: 0,
        };

        let agent = self
            .retry
            .run(&self.metrics, "insert_agent", || {
                self.store.insert_agent(agent.clone())
            })
            .await?;

        info!(agent_id = %agent.id, "agent registered");
        Ok(agent)
    }

    pub async fn list_agents(&self, filter: AgentFilter) -> Result<Vec<DeliveryAgent>, AppError> {
        Ok(self
            .retry
            .run(&self.metrics, "query_agents", || self.store.query_agents(filter))
            .await?)
    }

    /// Status reported by the agent. Going `DELIVERED` while still bound to an
    /// in-transit order asks the buyer to confirm the delivery.
    pub async fn update_agent_status(
        &self,
        agent_id: Uuid,
        next: AgentStatus,
    ) -> Result<DeliveryAgent, AppError> {
        let mut previous = next;
        let (agent, changed) = self
            .modify_agent(agent_id, "update_agent_status", |agent| {
                if agent.status == next {
                    return Ok(false);
                }
                validate_agent_transition(agent.status, next)?;
                previous = agent.status;
                agent.status = next;
                agent.last_seen = Utc::now();
                Ok(true)
            })
            .await?;

        if !changed {
            return Ok(agent);
        }

        self.metrics.record_transition("agent", next);
        info!(agent_id = %agent_id, from = %previous, to = %next, "agent status updated");

        if let Some(order_id) = agent.active_order {
            if next == AgentStatus::Unavailable {
                warn!(agent_id = %agent_id, order_id = %order_id, "agent went unavailable with an active order");
            }
            if next == AgentStatus::Delivered {
                self.request_delivery_confirmation(agent_id, order_id).await;
            }
        }

        Ok(agent)
    }

    async fn request_delivery_confirmation(&self, agent_id: Uuid, order_id: Uuid) {
        match self.get_order(order_id).await {
            Ok(order) if order.status() == OrderStatus::InTransit => {
                self.notifier.notify(OrderEvent::confirmation_requested(
                    order.id,
                    order.buyer_id,
                    agent_id,
                ));
            }
            Ok(_) => {}
            Err(err) => {
                warn!(order_id = %order_id, error = %err, "could not load order for delivery confirmation");
            }
        }
    }

    /// Heartbeat. The bound order's tracking location follows the agent.
    pub async fn update_agent_location(
        &self,
        agent_id: Uuid,
        location: Location,
    ) -> Result<DeliveryAgent, AppError> {
        ensure_valid_location(&location)?;
        let (agent, _) = self
            .modify_agent(agent_id, "update_agent_location", |agent| {
                agent.location = location;
                agent.last_seen = Utc::now();
                Ok(true)
            })
            .await?;

        if let Some(order_id) = agent.active_order {
            let tracked = self
                .modify_order(order_id, "track_order_location", |order| {
                    if order.status() != OrderStatus::InTransit {
                        return Ok(false);
                    }
                    order.tracking.current_location = Some(location);
                    Ok(true)
                })
                .await;

            if let Err(err) = tracked {
                warn!(order_id = %order_id, error = %err, "order tracking location not updated");
            }
        }

        Ok(agent)
    }

    /// Uploads a verification document and puts the agent back into review.
    pub async fn submit_verification_document(
        &self,
        agent_id: Uuid,
        file_name: &str,
        data: Bytes,
    ) -> Result<DeliveryAgent, AppError> {
        if file_name.trim().is_empty() || file_name.contains('/') {
            return Err(AppError::BadRequest(format!("invalid file name {file_name:?}")));
        }
        if data.is_empty() {
            return Err(AppError::BadRequest("document is empty".to_string()));
        }

        self.get_agent(agent_id).await?;
        let path = verification_document_path(agent_id, file_name);
        let blob_path = path.as_str();
        let url = self
            .retry
            .run(&self.metrics, "put_document", || {
                self.blobs.put(blob_path, data.clone())
            })
            .await?;

        let (agent, _) = self
            .modify_agent(agent_id, "attach_document", |agent| {
                agent.document_url = Some(url.clone());
                agent.verification = VerificationStatus::Pending;
                Ok(true)
            })
            .await?;

        info!(agent_id = %agent_id, path = %path, "verification document uploaded");
        Ok(agent)
    }

    pub async fn review_verification(
        &self,
        agent_id: Uuid,
        approved: bool,
    ) -> Result<DeliveryAgent, AppError> {
        let (agent, _) = self
            .modify_agent(agent_id, "review_verification", |agent| {
                if agent.document_url.is_none() {
                    return Err(AppError::BadRequest(format!(
                        "agent {agent_id} has no verification document"
                    )));
                }
                agent.verification = if approved {
                    VerificationStatus::Verified
                } else {
                    VerificationStatus::Failed
                };
                Ok(true)
            })
            .await?;

        info!(agent_id = %agent_id, verification = ?agent.verification, "verification reviewed");
        Ok(agent)
    }

    pub async fn add_review(
        &self,
        agent_id: Uuid,
        review: NewReview,
    ) -> Result<DeliveryAgent, AppError> {
        if !(1..=5).contains(&review.rating) {
            return Err(AppError::BadRequest("rating must be between 1 and 5".to_string()));
        }

        let entry = AgentReview {
            id: Uuid::new_v4(),
            customer_id: review.customer_id,
            rating: review.rating,
            comment: review.comment,
            created_at: Utc::now(),
        };

        let (agent, _) = self
            .modify_agent(agent_id, "add_review", |agent| {
                agent.rating.review_count += 1;
                agent.rating.total_score += u64::from(entry.rating);
                agent.reviews.push(entry.clone());
                Ok(true)
            })
            .await?;

        Ok(agent)
    }

    pub async fn report_agent(
        &self,
        agent_id: Uuid,
        kind: ReportKind,
    ) -> Result<DeliveryAgent, AppError> {
        let (agent, _) = self
            .modify_agent(agent_id, "report_agent", |agent| {
                match kind {
                    ReportKind::Fraud => agent.fraud_reports += 1,
                    ReportKind::Negligence => agent.negligence_reports += 1,
                }
                Ok(true)
            })
            .await?;

        warn!(agent_id = %agent_id, kind = ?kind, "agent reported");
        Ok(agent)
    }

    /// Assignable agents within `max_km` of `origin`, closest first.
    pub async fn nearby_agents(
        &self,
        origin: Location,
        max_km: f64,
    ) -> Result<Vec<NearbyAgent>, AppError> {
        if !max_km.is_finite() || max_km <= 0.0 {
            return Err(AppError::BadRequest("max_km must be positive".to_string()));
        }
        ensure_valid_location(&origin)?;

        let mut nearby: Vec<NearbyAgent> = self
            .list_agents(AgentFilter::Status(AgentStatus::Available))
            .await?
            .into_iter()
            .filter(DeliveryAgent::is_assignable)
            .map(|agent| NearbyAgent {
                distance_km: distance_km(&origin, &agent.location),
                agent,
            })
            .filter(|entry| entry.distance_km <= max_km)
            .collect();

        nearby.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
        Ok(nearby)
    }

    /// Nearby agents ranked for a pending order.
    pub async fn candidates(&self, order_id: Uuid, max_km: f64) -> Result<Vec<Candidate>, AppError> {
        let order = self.get_order(order_id).await?;
        if order.status() != OrderStatus::Pending {
            return Err(AppError::OrderNotPending {
                order_id,
                status: order.status().to_string(),
            });
        }
        let origin = order.tracking.current_location.ok_or_else(|| {
            AppError::BadRequest(format!("order {order_id} has no pickup location"))
        })?;

        let nearby = self.nearby_agents(origin, max_km).await?;
        Ok(rank_candidates(&nearby))
    }

    pub async fn agent_orders(&self, agent_id: Uuid) -> Result<Vec<Order>, AppError> {
        self.get_agent(agent_id).await?;
        self.orders(OrderFilter::Agent(agent_id)).await
    }
}
