use std::io;
use std::path::Path;

use async_trait::async_trait;
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};
use ulid::Ulid;

use crate::model::*;
use crate::wal::Wal;

use super::{MemoryStore, OpportunityStore, StoreError};

/// File-backed store: the log is the source of truth, the in-memory map is
/// rebuilt from it on open.
pub struct WalStore {
    state: MemoryStore,
    /// Serializes writers so validation, append and apply happen in log order.
    wal: Mutex<Wal>,
}

impl WalStore {
    pub fn open(path: &Path) -> io::Result<Self> {
        let (events, valid_len) = Wal::replay(path)?;
        let dropped = Wal::truncate_tail(path, valid_len)?;
        if dropped > 0 {
            warn!("discarded {dropped} bytes of torn tail from {}", path.display());
        }
        let state = MemoryStore::new();
        for event in &events {
            state.apply(event);
        }
        let wal = Wal::open(path)?;
        info!(
            "opened store log {} ({} events, {} opportunities)",
            path.display(),
            events.len(),
            state.len()
        );
        Ok(Self {
            state,
            wal: Mutex::new(wal),
        })
    }

    async fn commit(&self, event: StoreEvent, is_create: bool) -> Result<(), StoreError> {
        let mut wal = self.wal.lock().await;
        self.state.check(&event, is_create)?;
        wal.append(&event)?;
        self.state.apply(&event);
        drop(wal);
        self.state.publish(&event);
        Ok(())
    }

    pub async fn appends_since_compact(&self) -> u64 {
        self.wal.lock().await.appends_since_compact()
    }

    /// Rewrite the log as one upsert per live opportunity.
    pub async fn compact(&self) -> io::Result<()> {
        let mut wal = self.wal.lock().await;
        let events: Vec<StoreEvent> = self
            .state
            .snapshot()
            .into_iter()
            .map(|opportunity| StoreEvent::OpportunityUpserted { opportunity })
            .collect();
        wal.compact(&events)?;
        info!("compacted store log to {} events", events.len());
        Ok(())
    }
}

#[async_trait]
impl OpportunityStore for WalStore {
    async fn load_all_opportunities(&self) -> Result<Vec<Opportunity>, StoreError> {
        Ok(self.state.snapshot())
    }

    async fn fetch_opportunity(&self, id: Ulid) -> Result<Option<Opportunity>, StoreError> {
        Ok(self.state.get(&id))
    }

    async fn create_opportunity(&self, draft: OpportunityDraft) -> Result<Opportunity, StoreError> {
        let opportunity = Opportunity::from_draft(Ulid::new(), draft);
        self.commit(
            StoreEvent::OpportunityUpserted {
                opportunity: opportunity.clone(),
            },
            true,
        )
        .await?;
        Ok(opportunity)
    }

    async fn update_opportunity(&self, opportunity: Opportunity) -> Result<(), StoreError> {
        self.commit(StoreEvent::OpportunityUpserted { opportunity }, false)
            .await
    }

    async fn delete_opportunity(&self, id: Ulid) -> Result<(), StoreError> {
        self.commit(StoreEvent::OpportunityDeleted { id }, false).await
    }

    async fn set_approved(&self, id: Ulid, approved: bool) -> Result<(), StoreError> {
        self.commit(StoreEvent::ApprovalChanged { id, approved }, false)
            .await
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<StoreEvent>> {
        Some(self.state.subscribe_feed())
    }
}
