//! Document store collaborator.
//!
//! Every write is conditional on the caller's copy carrying the current
//! `version`; the store bumps it on success. That precondition is what
//! serializes concurrent writers on one entity.

pub mod blob;
pub mod memory;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::models::agent::{AgentStatus, DeliveryAgent};
use crate::models::order::Order;
use crate::models::profile::Profile;

pub use memory::MemoryStore;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    #[error("document {0} not found")]
    NotFound(Uuid),

    #[error("document {0} already exists")]
    AlreadyExists(Uuid),

    #[error("version conflict on {id}: expected {expected}, found {actual}")]
    VersionConflict { id: Uuid, expected: u64, actual: u64 },

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Only transport-level failures are worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderFilter {
    All,
    Buyer(Uuid),
    Agent(Uuid),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentFilter {
    All,
    Status(AgentStatus),
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StoreCounts {
    pub orders: usize,
    pub agents: usize,
    pub profiles: usize,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert_order(&self, order: Order) -> StoreResult<Order>;
    async fn get_order(&self, id: Uuid) -> StoreResult<Option<Order>>;
    /// Fails with `VersionConflict` unless `order.version` matches the stored copy.
    async fn update_order(&self, order: Order) -> StoreResult<Order>;
    /// Newest first.
    async fn query_orders(&self, filter: OrderFilter) -> StoreResult<Vec<Order>>;

    async fn insert_agent(&self, agent: DeliveryAgent) -> StoreResult<DeliveryAgent>;
    async fn get_agent(&self, id: Uuid) -> StoreResult<Option<DeliveryAgent>>;
    /// Fails with `VersionConflict` unless `agent.version` matches the stored copy.
    async fn update_agent(&self, agent: DeliveryAgent) -> StoreResult<DeliveryAgent>;
    async fn query_agents(&self, filter: AgentFilter) -> StoreResult<Vec<DeliveryAgent>>;

    async fn insert_profile(&self, profile: Profile) -> StoreResult<Profile>;
    async fn get_profile(&self, id: Uuid) -> StoreResult<Option<Profile>>;
    async fn update_profile(&self, profile: Profile) -> StoreResult<Profile>;

    async fn counts(&self) -> StoreResult<StoreCounts>;
}
