use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast;
use ulid::Ulid;

use crate::model::*;
use crate::notify::ChangeFeed;

use super::{OpportunityStore, StoreError};

/// `DashMap`-backed store. Also serves as the materialized state of
/// [`super::WalStore`].
pub struct MemoryStore {
    opportunities: DashMap<Ulid, Opportunity>,
    feed: ChangeFeed,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            opportunities: DashMap::new(),
            feed: ChangeFeed::new(),
        }
    }

    pub fn with_opportunities(opportunities: impl IntoIterator<Item = Opportunity>) -> Self {
        let store = Self::new();
        for opportunity in opportunities {
            store.opportunities.insert(opportunity.id, opportunity);
        }
        store
    }

    pub fn len(&self) -> usize {
        self.opportunities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.opportunities.is_empty()
    }

    pub fn snapshot(&self) -> Vec<Opportunity> {
        let mut all: Vec<Opportunity> = self
            .opportunities
            .iter()
            .map(|e| e.value().clone())
            .collect();
        all.sort_by_key(|o| o.id);
        all
    }

    pub fn get(&self, id: &Ulid) -> Option<Opportunity> {
        self.opportunities.get(id).map(|e| e.value().clone())
    }

    /// Reject events that target a missing opportunity. Only a create may
    /// upsert an unknown id. Callers must serialize `check` with `apply`.
    pub(crate) fn check(&self, event: &StoreEvent, is_create: bool) -> Result<(), StoreError> {
        if is_create {
            return Ok(());
        }
        let id = event.opportunity_id();
        if self.opportunities.contains_key(&id) {
            Ok(())
        } else {
            Err(StoreError::NotFound(id))
        }
    }

    /// Apply an already-validated event to the map (no notification).
    pub(crate) fn apply(&self, event: &StoreEvent) {
        match event {
            StoreEvent::OpportunityUpserted { opportunity } => {
                self.opportunities.insert(opportunity.id, opportunity.clone());
            }
            StoreEvent::OpportunityDeleted { id } => {
                self.opportunities.remove(id);
            }
            StoreEvent::ApprovalChanged { id, approved } => {
                if let Some(mut o) = self.opportunities.get_mut(id) {
                    o.approved = *approved;
                }
            }
        }
    }

    pub(crate) fn publish(&self, event: &StoreEvent) {
        self.feed.send(event);
    }

    pub(crate) fn subscribe_feed(&self) -> broadcast::Receiver<StoreEvent> {
        self.feed.subscribe()
    }

    /// Existence check and mutation in one map operation, so a concurrent
    /// delete can't be undone by an update that checked first.
    fn commit(&self, event: StoreEvent, is_create: bool) -> Result<(), StoreError> {
        match &event {
            StoreEvent::OpportunityUpserted { opportunity } if is_create => {
                self.opportunities.insert(opportunity.id, opportunity.clone());
            }
            StoreEvent::OpportunityUpserted { opportunity } => {
                let mut entry = self
                    .opportunities
                    .get_mut(&opportunity.id)
                    .ok_or(StoreError::NotFound(opportunity.id))?;
                *entry = opportunity.clone();
            }
            StoreEvent::OpportunityDeleted { id } => {
                self.opportunities
                    .remove(id)
                    .ok_or(StoreError::NotFound(*id))?;
            }
            StoreEvent::ApprovalChanged { id, approved } => {
                let mut entry = self
                    .opportunities
                    .get_mut(id)
                    .ok_or(StoreError::NotFound(*id))?;
                entry.approved = *approved;
            }
        }
        self.publish(&event);
        Ok(())
    }
}

#[async_trait]
impl OpportunityStore for MemoryStore {
    async fn load_all_opportunities(&self) -> Result<Vec<Opportunity>, StoreError> {
        Ok(self.snapshot())
    }

    async fn fetch_opportunity(&self, id: Ulid) -> Result<Option<Opportunity>, StoreError> {
        Ok(self.get(&id))
    }

    async fn create_opportunity(&self, draft: OpportunityDraft) -> Result<Opportunity, StoreError> {
        let opportunity = Opportunity::from_draft(Ulid::new(), draft);
        self.commit(
            StoreEvent::OpportunityUpserted {
                opportunity: opportunity.clone(),
            },
            true,
        )?;
        Ok(opportunity)
    }

    async fn update_opportunity(&self, opportunity: Opportunity) -> Result<(), StoreError> {
        self.commit(StoreEvent::OpportunityUpserted { opportunity }, false)
    }

    async fn delete_opportunity(&self, id: Ulid) -> Result<(), StoreError> {
        self.commit(StoreEvent::OpportunityDeleted { id }, false)
    }

    async fn set_approved(&self, id: Ulid, approved: bool) -> Result<(), StoreError> {
        self.commit(StoreEvent::ApprovalChanged { id, approved }, false)
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<StoreEvent>> {
        Some(self.subscribe_feed())
    }
}
