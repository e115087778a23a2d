//! Durable-store interface consumed by the catalog, plus two adapters.

pub mod memory;
pub mod wal;

pub use memory::MemoryStore;
pub use wal::WalStore;

use async_trait::async_trait;
use tokio::sync::broadcast;
use ulid::Ulid;

use crate::model::{Opportunity, OpportunityDraft, StoreEvent};

#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    NotFound(Ulid),
    Io(String),
    Unavailable(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound(id) => write!(f, "opportunity not found: {id}"),
            StoreError::Io(e) => write!(f, "I/O error: {e}"),
            StoreError::Unavailable(e) => write!(f, "store unavailable: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e.to_string())
    }
}

/// The system of record for opportunities.
///
/// `load_all_opportunities` returns the full graph (organization, category,
/// community, location and occurrences) in one pass, ordered by id.
#[async_trait]
pub trait OpportunityStore: Send + Sync + 'static {
    async fn load_all_opportunities(&self) -> Result<Vec<Opportunity>, StoreError>;

    async fn fetch_opportunity(&self, id: Ulid) -> Result<Option<Opportunity>, StoreError>;

    /// Persist a new opportunity; the store assigns its id.
    async fn create_opportunity(&self, draft: OpportunityDraft) -> Result<Opportunity, StoreError>;

    async fn update_opportunity(&self, opportunity: Opportunity) -> Result<(), StoreError>;

    async fn delete_opportunity(&self, id: Ulid) -> Result<(), StoreError>;

    async fn set_approved(&self, id: Ulid, approved: bool) -> Result<(), StoreError>;

    /// Change feed of committed writes, if the store has one.
    fn subscribe(&self) -> Option<broadcast::Receiver<StoreEvent>> {
        None
    }
}
