use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
}

impl Location {
    /// Latitude within ±90 and longitude within ±180 degrees.
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lng)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentStatus {
    Available,
    Assigned,
    InTransit,
    Unavailable,
    Delivered,
}

impl AgentStatus {
    pub const ALL: [AgentStatus; 5] = [
        AgentStatus::Available,
        AgentStatus::Assigned,
        AgentStatus::InTransit,
        AgentStatus::Unavailable,
        AgentStatus::Delivered,
    ];
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Available => write!(f, "AVAILABLE"),
            Self::Assigned => write!(f, "ASSIGNED"),
            Self::InTransit => write!(f, "IN_TRANSIT"),
            Self::Unavailable => write!(f, "UNAVAILABLE"),
            Self::Delivered => write!(f, "DELIVERED"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStatus {
    Pending,
    Verified,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentReview {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub rating: u8,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

/// Running aggregate over all reviews.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Rating {
    pub review_count: u32,
    pub total_score: u64,
}

impl Rating {
    pub fn average(&self) -> Option<f64> {
        if self.review_count == 0 {
            return None;
        }
        Some(self.total_score as f64 / self.review_count as f64)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    Fraud,
    Negligence,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryAgent {
    pub id: Uuid,
    pub name: String,
    pub verification: VerificationStatus,
    pub document_url: Option<String>,
    pub status: AgentStatus,
    pub rating: Rating,
    pub reviews: Vec<AgentReview>,
    pub fraud_reports: u32,
    pub negligence_reports: u32,
    pub location: Location,
    pub active_order: Option<Uuid>,
    pub delivery_orders: Vec<Uuid>,
    pub last_seen: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Bumped by the store on every successful write.
    pub version: u64,
}

impl DeliveryAgent {
    pub fn is_verified(&self) -> bool {
        self.verification == VerificationStatus::Verified
    }

    pub fn is_assignable(&self) -> bool {
        self.is_verified() && self.status == AgentStatus::Available && self.active_order.is_none()
    }
}
