use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::agent::Location;
use crate::models::order::DeliveryAddress;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Buyer,
    Agent,
    Vendor,
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buyer => write!(f, "buyer"),
            Self::Agent => write!(f, "agent"),
            Self::Vendor => write!(f, "vendor"),
        }
    }
}

/// Role-specific part of a profile. Each role carries the fields it requires.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum RoleProfile {
    Buyer {
        default_address: Option<DeliveryAddress>,
    },
    Agent {
        agent_id: Uuid,
    },
    Vendor {
        business_name: String,
        category: String,
        open_hours: String,
    },
}

impl RoleProfile {
    pub fn role(&self) -> UserRole {
        match self {
            Self::Buyer { .. } => UserRole::Buyer,
            Self::Agent { .. } => UserRole::Agent,
            Self::Vendor { .. } => UserRole::Vendor,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub photo_url: Option<String>,
    pub location: Option<Location>,
    #[serde(flatten)]
    pub role: RoleProfile,
    pub role_changed_at: DateTime<Utc>,
    pub version: u64,
}

/// Buyers and agents may swap roles; vendors are fixed.
pub fn can_switch_role(current: UserRole, next: UserRole) -> bool {
    matches!(
        (current, next),
        (UserRole::Buyer, UserRole::Agent) | (UserRole::Agent, UserRole::Buyer)
    )
}
