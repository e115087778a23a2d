use ulid::Ulid;

use crate::store::StoreError;

#[derive(Debug, Clone, PartialEq)]
pub enum CatalogError {
    /// The durable store failed or timed out during a cache reload.
    LoadFailed(String),
    /// A write-through to the durable store failed.
    Store(StoreError),
    InvalidSearch(String),
    InvalidOpportunity(&'static str),
    NotFound(Ulid),
}

impl std::fmt::Display for CatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogError::LoadFailed(e) => write!(f, "catalog load failed: {e}"),
            CatalogError::Store(e) => write!(f, "store error: {e}"),
            CatalogError::InvalidSearch(msg) => write!(f, "invalid search: {msg}"),
            CatalogError::InvalidOpportunity(msg) => write!(f, "invalid opportunity: {msg}"),
            CatalogError::NotFound(id) => write!(f, "not found: {id}"),
        }
    }
}

impl std::error::Error for CatalogError {}

impl From<StoreError> for CatalogError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => CatalogError::NotFound(id),
            other => CatalogError::Store(other),
        }
    }
}
