use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub distance_score: f64,
    pub rating_score: f64,
    pub reliability_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub agent_id: Uuid,
    pub distance_km: f64,
    pub score: f64,
    pub score_breakdown: ScoreBreakdown,
}

/// Result of binding an agent to an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub order_id: Uuid,
    pub agent_id: Uuid,
    pub assigned_at: DateTime<Utc>,
    /// True when the call found the binding already in place and changed nothing.
    pub replayed: bool,
}
