mod cache;
mod error;
pub mod filter;
pub mod projection;
pub mod sort;
#[cfg(test)]
pub(crate) mod fixtures;

pub use cache::{CacheConfig, CatalogCache, Snapshot};
pub use error::CatalogError;
pub use filter::{build_predicate, is_listed};
pub use projection::{project, CandidateDates};
pub use sort::{sort_views, SortStrategy};

use std::sync::Arc;
use std::time::Instant;

use chrono::FixedOffset;
use tracing::info;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::observability::record_query;
use crate::store::OpportunityStore;

/// Discovery service over the opportunity catalog.
///
/// Reads go cache → filter → projection → sort. Writes go through the
/// store and invalidate the cache before returning, so a caller's next
/// read reflects its own write.
pub struct Catalog {
    cache: CatalogCache,
    /// Offset in which candidate dates are read.
    date_offset: FixedOffset,
}

impl Catalog {
    pub fn new(store: Arc<dyn OpportunityStore>, config: CacheConfig) -> Self {
        Self {
            cache: CatalogCache::new(store, config),
            date_offset: projection::utc(),
        }
    }

    pub fn with_date_offset(mut self, offset: FixedOffset) -> Self {
        self.date_offset = offset;
        self
    }

    pub fn cache(&self) -> &CatalogCache {
        &self.cache
    }

    // ── Reads ────────────────────────────────────────────────

    /// Every approved opportunity with at least one occurrence, earliest
    /// start first.
    pub async fn list_opportunities(&self) -> Result<Vec<OpportunityView>, CatalogError> {
        let started = Instant::now();
        let result = self.list_inner().await;
        record_query("list", result.is_ok(), started);
        result
    }

    async fn list_inner(&self) -> Result<Vec<OpportunityView>, CatalogError> {
        let snapshot = self.cache.get_all_opportunities().await?;
        let dates = CandidateDates::any();
        let mut views: Vec<OpportunityView> = snapshot
            .iter()
            .filter(|o| is_listed(o))
            .filter_map(|o| project(o, &dates))
            .collect();
        SortStrategy::DEFAULT.sort(&mut views);
        Ok(views)
    }

    /// `Ok(None)` when the id is absent, unapproved, or has no occurrences.
    pub async fn get_opportunity(&self, id: Ulid) -> Result<Option<OpportunityView>, CatalogError> {
        let started = Instant::now();
        let result = self.get_inner(id).await;
        record_query("get", result.is_ok(), started);
        result
    }

    async fn get_inner(&self, id: Ulid) -> Result<Option<OpportunityView>, CatalogError> {
        let snapshot = self.cache.get_all_opportunities().await?;
        Ok(snapshot
            .iter()
            .find(|o| o.id == id)
            .filter(|o| is_listed(o))
            .and_then(|o| project(o, &CandidateDates::any())))
    }

    /// Every opportunity `creator` made, approved or not and with or without
    /// dates, in catalog order. Backs the management listing.
    pub async fn list_created_by(&self, creator: &str) -> Result<Vec<Opportunity>, CatalogError> {
        let started = Instant::now();
        let result = self.created_by_inner(creator).await;
        record_query("list_created_by", result.is_ok(), started);
        result
    }

    async fn created_by_inner(&self, creator: &str) -> Result<Vec<Opportunity>, CatalogError> {
        let snapshot = self.cache.get_all_opportunities().await?;
        Ok(snapshot
            .iter()
            .filter(|o| o.created_by.as_deref() == Some(creator))
            .cloned()
            .collect())
    }

    pub async fn search_opportunities(
        &self,
        search: &OpportunitySearch,
    ) -> Result<Vec<OpportunityView>, CatalogError> {
        let started = Instant::now();
        let result = self.search_inner(search).await;
        record_query("search", result.is_ok(), started);
        result
    }

    async fn search_inner(
        &self,
        search: &OpportunitySearch,
    ) -> Result<Vec<OpportunityView>, CatalogError> {
        search.validate()?;
        let snapshot = self.cache.get_all_opportunities().await?;
        let predicate = build_predicate(search);
        let dates = CandidateDates::from_search(search.dates.as_deref(), self.date_offset);
        let views: Vec<OpportunityView> = snapshot
            .iter()
            .filter(|&o| predicate(o))
            .filter_map(|o| project(o, &dates))
            .collect();
        Ok(sort_views(views, search.sort))
    }

    // ── Writes ───────────────────────────────────────────────

    pub async fn create_opportunity(
        &self,
        draft: OpportunityDraft,
    ) -> Result<Opportunity, CatalogError> {
        validate_listing(&draft.name, &draft.occurrences)?;
        let created = self.cache.store().create_opportunity(draft).await?;
        self.cache.invalidate();
        info!("created opportunity {} ({})", created.id, created.name);
        Ok(created)
    }

    pub async fn update_opportunity(&self, opportunity: Opportunity) -> Result<(), CatalogError> {
        validate_listing(&opportunity.name, &opportunity.occurrences)?;
        let id = opportunity.id;
        self.cache.store().update_opportunity(opportunity).await?;
        self.cache.invalidate();
        info!("updated opportunity {id}");
        Ok(())
    }

    pub async fn delete_opportunity(&self, id: Ulid) -> Result<(), CatalogError> {
        self.cache.store().delete_opportunity(id).await?;
        self.cache.invalidate();
        info!("deleted opportunity {id}");
        Ok(())
    }

    pub async fn approve_opportunity(&self, id: Ulid) -> Result<(), CatalogError> {
        self.set_approved(id, true).await
    }

    pub async fn unapprove_opportunity(&self, id: Ulid) -> Result<(), CatalogError> {
        self.set_approved(id, false).await
    }

    async fn set_approved(&self, id: Ulid, approved: bool) -> Result<(), CatalogError> {
        self.cache.store().set_approved(id, approved).await?;
        self.cache.invalidate();
        info!("opportunity {id} approved={approved}");
        Ok(())
    }

    /// Copy a listing's descriptive data into a new, unapproved listing
    /// with no occurrences, owned by `created_by`.
    pub async fn duplicate_opportunity(
        &self,
        id: Ulid,
        created_by: Option<String>,
    ) -> Result<Opportunity, CatalogError> {
        let source = self
            .cache
            .store()
            .fetch_opportunity(id)
            .await?
            .ok_or(CatalogError::NotFound(id))?;
        self.create_opportunity(source.duplicate_draft(created_by)).await
    }
}

fn validate_listing(name: &str, occurrences: &[Occurrence]) -> Result<(), CatalogError> {
    if name.trim().is_empty() {
        return Err(CatalogError::InvalidOpportunity("name is empty"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(CatalogError::InvalidOpportunity("name too long"));
    }
    if occurrences.len() > MAX_OCCURRENCES_PER_OPPORTUNITY {
        return Err(CatalogError::InvalidOpportunity("too many occurrences"));
    }
    if occurrences.iter().any(|o| !o.span.is_valid()) {
        return Err(CatalogError::InvalidOpportunity(
            "occurrence must end after it starts",
        ));
    }
    Ok(())
}
