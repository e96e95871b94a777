use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use uuid::Uuid;

use crate::models::agent::DeliveryAgent;
use crate::models::order::Order;
use crate::models::profile::Profile;
use crate::store::{
    AgentFilter, DocumentStore, OrderFilter, StoreCounts, StoreError, StoreResult,
};

pub trait Document: Clone + Send + Sync + 'static {
    fn id(&self) -> Uuid;
    fn version(&self) -> u64;
    fn set_version(&mut self, version: u64);
}

impl Document for Order {
    fn id(&self) -> Uuid {
        self.id
    }
    fn version(&self) -> u64 {
        self.version
    }
    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

impl Document for DeliveryAgent {
    fn id(&self) -> Uuid {
        self.id
    }
    fn version(&self) -> u64 {
        self.version
    }
    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

impl Document for Profile {
    fn id(&self) -> Uuid {
        self.id
    }
    fn version(&self) -> u64 {
        self.version
    }
    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

struct Collection<T: Document> {
    docs: DashMap<Uuid, T>,
}

impl<T: Document> Collection<T> {
    fn new() -> Self {
        Self {
            docs: DashMap::new(),
        }
    }

    fn insert(&self, mut doc: T) -> StoreResult<T> {
        match self.docs.entry(doc.id()) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists(doc.id())),
            Entry::Vacant(slot) => {
                doc.set_version(1);
                slot.insert(doc.clone());
                Ok(doc)
            }
        }
    }

    fn get(&self, id: Uuid) -> Option<T> {
        self.docs.get(&id).map(|entry| entry.value().clone())
    }

    // The shard write lock is held between the version check and the replace.
    fn compare_and_swap(&self, mut doc: T) -> StoreResult<T> {
        let id = doc.id();
        let mut current = self.docs.get_mut(&id).ok_or(StoreError::NotFound(id))?;

        if current.version() != doc.version() {
            return Err(StoreError::VersionConflict {
                id,
                expected: doc.version(),
                actual: current.version(),
            });
        }

        doc.set_version(doc.version() + 1);
        *current = doc.clone();
        Ok(doc)
    }

    fn filter(&self, predicate: impl Fn(&T) -> bool) -> Vec<T> {
        self.docs
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
            .collect()
    }

    fn len(&self) -> usize {
        self.docs.len()
    }
}

/// In-process store backed by `DashMap`.
pub struct MemoryStore {
    orders: Collection<Order>,
    agents: Collection<DeliveryAgent>,
    profiles: Collection<Profile>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            orders: Collection::new(),
            agents: Collection::new(),
            profiles: Collection::new(),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert_order(&self, order: Order) -> StoreResult<Order> {
        self.orders.insert(order)
    }

    async fn get_order(&self, id: Uuid) -> StoreResult<Option<Order>> {
        Ok(self.orders.get(id))
    }

    async fn update_order(&self, order: Order) -> StoreResult<Order> {
        self.orders.compare_and_swap(order)
    }

    async fn query_orders(&self, filter: OrderFilter) -> StoreResult<Vec<Order>> {
        let mut orders = self.orders.filter(|order| match filter {
            OrderFilter::All => true,
            OrderFilter::Buyer(buyer_id) => order.buyer_id == buyer_id,
            OrderFilter::Agent(agent_id) => order.agent_id == Some(agent_id),
        });
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn insert_agent(&self, agent: DeliveryAgent) -> StoreResult<DeliveryAgent> {
        self.agents.insert(agent)
    }

    async fn get_agent(&self, id: Uuid) -> StoreResult<Option<DeliveryAgent>> {
        Ok(self.agents.get(id))
    }

    async fn update_agent(&self, agent: DeliveryAgent) -> StoreResult<DeliveryAgent> {
        self.agents.compare_and_swap(agent)
    }

    async fn query_agents(&self, filter: AgentFilter) -> StoreResult<Vec<DeliveryAgent>> {
        Ok(self.agents.filter(|agent| match filter {
            AgentFilter::All => true,
            AgentFilter::Status(status) => agent.status == status,
        }))
    }

    async fn insert_profile(&self, profile: Profile) -> StoreResult<Profile> {
        self.profiles.insert(profile)
    }

    async fn get_profile(&self, id: Uuid) -> StoreResult<Option<Profile>> {
        Ok(self.profiles.get(id))
    }

    async fn update_profile(&self, profile: Profile) -> StoreResult<Profile> {
        self.profiles.compare_and_swap(profile)
    }

    async fn counts(&self) -> StoreResult<StoreCounts> {
        Ok(StoreCounts {
            orders: self.orders.len(),
            agents: self.agents.len(),
            profiles: self.profiles.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::models::agent::{AgentStatus, Location, Rating, VerificationStatus};

    fn agent() -> DeliveryAgent {
        DeliveryAgent {
            id: Uuid::new_v4(),
            name: "test-agent".to_string(),
            verification: VerificationStatus::Verified,
            document_url: None,
            status: AgentStatus::Available,
            rating: Rating::default(),
            reviews: Vec::new(),
            fraud_reports: 0,
            negligence_reports: 0,
            location: Location { lat: 6.5, lng: 3.4 },
            active_order: None,
            delivery_orders: Vec::new(),
            last_seen: Utc::now(),
            updated_at: Utc::now(),
            version: 0,
        }
    }

    #[tokio::test]
    async fn insert_sets_first_version() {
        let store = MemoryStore::new();
        let stored = store.insert_agent(agent()).await.unwrap();
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn duplicate_insert_is_rejected() {
        let store = MemoryStore::new();
        let stored = store.insert_agent(agent()).await.unwrap();
        let err = store.insert_agent(stored.clone()).await.unwrap_err();
        assert_eq!(err, StoreError::AlreadyExists(stored.id));
    }

    #[tokio::test]
    async fn stale_write_is_rejected() {
        let store = MemoryStore::new();
        let stored = store.insert_agent(agent()).await.unwrap();

        let mut first = stored.clone();
        first.status = AgentStatus::Assigned;
        let written = store.update_agent(first).await.unwrap();
        assert_eq!(written.version, 2);

        let mut stale = stored;
        stale.status = AgentStatus::Unavailable;
        let err = store.update_agent(stale).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::VersionConflict {
                expected: 1,
                actual: 2,
                ..
            }
        ));

        let current = store.get_agent(written.id).await.unwrap().unwrap();
        assert_eq!(current.status, AgentStatus::Assigned);
    }

    #[tokio::test]
    async fn status_filter_only_returns_matching_agents() {
        let store = MemoryStore::new();
        store.insert_agent(agent()).await.unwrap();
        let mut offline = agent();
        offline.status = AgentStatus::Unavailable;
        store.insert_agent(offline).await.unwrap();

        let available = store
            .query_agents(AgentFilter::Status(AgentStatus::Available))
            .await
            .unwrap();
        assert_eq!(available.len(), 1);
        assert_eq!(store.counts().await.unwrap().agents, 2);
    }
}
