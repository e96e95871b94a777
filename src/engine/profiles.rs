use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::engine::agents::NewAgent;
use crate::engine::coordinator::Coordinator;
use crate::error::AppError;
use crate::models::agent::{AgentStatus, Location};
use crate::models::order::DeliveryAddress;
use crate::models::profile::{Profile, RoleProfile, UserRole, can_switch_role};

#[derive(Debug, Clone, Deserialize)]
pub struct NewProfile {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub photo_url: Option<String>,
    pub location: Option<Location>,
    pub role: UserRole,
    pub default_address: Option<DeliveryAddress>,
    pub business_name: Option<String>,
    pub category: Option<String>,
    pub open_hours: Option<String>,
}

impl Coordinator {
    pub async fn create_profile(&self, request: NewProfile) -> Result<Profile, AppError> {
        if request.name.trim().is_empty() || !request.email.contains('@') {
            return Err(AppError::BadRequest("name and a valid email are required".to_string()));
        }

        let role = match request.role {
            UserRole::Buyer => RoleProfile::Buyer {
                default_address: request.default_address,
            },
            UserRole::Agent => self.register_agent_role(&request.name, request.location).await?,
            UserRole::Vendor => RoleProfile::Vendor {
                business_name: request
                    .business_name
                    .filter(|name| !name.trim().is_empty())
                    .ok_or_else(|| AppError::BadRequest("vendors need a business name".to_string()))?,
                category: request.category.unwrap_or_default(),
                open_hours: request.open_hours.unwrap_or_default(),
            },
        };

        let profile = Profile {
            id: Uuid::new_v4(),
            name: request.name,
            email: request.email,
            phone: request.phone,
            photo_url: request.photo_url,
            location: request.location,
            role,
            role_changed_at: Utc::now(),
            version: 0,
        };

        let profile = self
            .retry
            .run(&self.metrics, "insert_profile", || {
                self.store.insert_profile(profile.clone())
            })
            .await?;

        info!(profile_id = %profile.id, role = %profile.role.role(), "profile created");
        Ok(profile)
    }

    pub async fn get_profile(&self, profile_id: Uuid) -> Result<Profile, AppError> {
        self.retry
            .run(&self.metrics, "get_profile", || self.store.get_profile(profile_id))
            .await?
            .ok_or(AppError::ProfileNotFound(profile_id))
    }

    /// Buyer and agent may swap. Leaving the agent role parks the agent
    /// record as unavailable; it is refused while a delivery is active.
    pub async fn switch_role(&self, profile_id: Uuid, next: UserRole) -> Result<Profile, AppError> {
        let mut profile = self.get_profile(profile_id).await?;
        let current = profile.role.role();
        if current == next {
            return Ok(profile);
        }
        if !can_switch_role(current, next) {
            return Err(AppError::invalid_transition(current, next));
        }

        profile.role = match (&profile.role, next) {
            (RoleProfile::Agent { agent_id }, UserRole::Buyer) => {
                self.retire_agent(*agent_id).await?;
                RoleProfile::Buyer {
                    default_address: None,
                }
            }
            (_, UserRole::Agent) => {
                self.register_agent_role(&profile.name, profile.location)
                    .await?
            }
            _ => return Err(AppError::invalid_transition(current, next)),
        };
        profile.role_changed_at = Utc::now();

        let profile = self
            .retry
            .run(&self.metrics, "update_profile", || {
                self.store.update_profile(profile.clone())
            })
            .await?;

        info!(profile_id = %profile_id, from = %current, to = %next, "role switched");
        Ok(profile)
    }

    async fn register_agent_role(
        &self,
        name: &str,
        location: Option<Location>,
    ) -> Result<RoleProfile, AppError> {
        let location = location
            .ok_or_else(|| AppError::BadRequest("agents need a location".to_string()))?;
        let agent = self
            .create_agent(NewAgent {
                name: name.to_string(),
                location,
            })
            .await?;

        Ok(RoleProfile::Agent { agent_id: agent.id })
    }

    async fn retire_agent(&self, agent_id: Uuid) -> Result<(), AppError> {
        let agent = self.get_agent(agent_id).await?;
        if let Some(order_id) = agent.active_order {
            return Err(AppError::Conflict(format!(
                "agent {agent_id} is still delivering order {order_id}"
            )));
        }
        self.update_agent_status(agent_id, AgentStatus::Unavailable)
            .await?;
        Ok(())
    }
}
