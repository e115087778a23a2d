use std::collections::HashSet;

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::catalog::CatalogError;
use crate::limits::*;

/// Unix milliseconds, UTC. The only stored time type.
pub type Ms = i64;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    pub fn is_valid(&self) -> bool {
        self.start < self.end
    }
}

/// Calendar date of `t` as seen from `offset`.
pub fn calendar_date(t: Ms, offset: FixedOffset) -> Option<NaiveDate> {
    DateTime::from_timestamp_millis(t).map(|dt| dt.with_timezone(&offset).date_naive())
}

// ── Catalog entities ─────────────────────────────────────────────

/// A single bookable time slot of an opportunity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Occurrence {
    pub id: Ulid,
    pub span: Span,
    pub openings: u32,
}

impl Occurrence {
    pub fn new(id: Ulid, span: Span, openings: u32) -> Self {
        Self { id, span, openings }
    }

    pub fn start_time(&self) -> Ms {
        self.span.start
    }

    pub fn end_time(&self) -> Ms {
        self.span.end
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cause {
    pub id: Ulid,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub id: Ulid,
    pub name: String,
    pub website_link: Option<String>,
    pub cause: Option<Cause>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: Ulid,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Community {
    pub id: Ulid,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

/// Stored opportunity type. The `All` wildcard lives only on [`TypeFilter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpportunityType {
    OneTime,
    Recurring,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub id: Ulid,
    pub name: String,
    pub description: String,
    pub address: String,
    pub organization: Organization,
    pub category: Category,
    pub community: Option<Community>,
    pub location: Location,
    pub opportunity_type: OpportunityType,
    pub approved: bool,
    pub image_url: Option<String>,
    /// Opaque id of the account that created the listing.
    pub created_by: Option<String>,
    /// Owned exclusively; order is irrelevant.
    pub occurrences: Vec<Occurrence>,
}

/// Everything about an opportunity except the store-assigned id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpportunityDraft {
    pub name: String,
    pub description: String,
    pub address: String,
    pub organization: Organization,
    pub category: Category,
    pub community: Option<Community>,
    pub location: Location,
    pub opportunity_type: OpportunityType,
    pub approved: bool,
    pub image_url: Option<String>,
    pub created_by: Option<String>,
    pub occurrences: Vec<Occurrence>,
}

impl Opportunity {
    pub fn from_draft(id: Ulid, draft: OpportunityDraft) -> Self {
        Self {
            id,
            name: draft.name,
            description: draft.description,
            address: draft.address,
            organization: draft.organization,
            category: draft.category,
            community: draft.community,
            location: draft.location,
            opportunity_type: draft.opportunity_type,
            approved: draft.approved,
            image_url: draft.image_url,
            created_by: draft.created_by,
            occurrences: draft.occurrences,
        }
    }

    /// Draft for a copy of this listing: same descriptive data, no
    /// occurrences, awaiting approval. The copy belongs to whoever made it.
    pub fn duplicate_draft(&self, created_by: Option<String>) -> OpportunityDraft {
        OpportunityDraft {
            name: format!("copy of {}", self.name),
            description: self.description.clone(),
            address: self.address.clone(),
            organization: self.organization.clone(),
            category: self.category.clone(),
            community: self.community.clone(),
            location: self.location,
            opportunity_type: self.opportunity_type,
            approved: false,
            image_url: self.image_url.clone(),
            created_by,
            occurrences: Vec::new(),
        }
    }

    pub fn cause_id(&self) -> Option<Ulid> {
        self.organization.cause.as_ref().map(|c| c.id)
    }

    pub fn community_id(&self) -> Option<Ulid> {
        self.community.as_ref().map(|c| c.id)
    }
}

/// A durable-store mutation. This is both the WAL record format and the
/// change-feed payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StoreEvent {
    OpportunityUpserted { opportunity: Opportunity },
    OpportunityDeleted { id: Ulid },
    ApprovalChanged { id: Ulid, approved: bool },
}

impl StoreEvent {
    pub fn opportunity_id(&self) -> Ulid {
        match self {
            StoreEvent::OpportunityUpserted { opportunity } => opportunity.id,
            StoreEvent::OpportunityDeleted { id } | StoreEvent::ApprovalChanged { id, .. } => *id,
        }
    }
}

// ── Search request ───────────────────────────────────────────────

/// Opportunity type as a search criterion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeFilter {
    #[default]
    All,
    OneTime,
    Recurring,
}

impl TypeFilter {
    pub fn matches(self, ty: OpportunityType) -> bool {
        match self {
            TypeFilter::All => true,
            TypeFilter::OneTime => ty == OpportunityType::OneTime,
            TypeFilter::Recurring => ty == OpportunityType::Recurring,
        }
    }
}

/// Discovery search request.
///
/// Every id set is tri-state in practice: `None` means "no restriction on
/// this dimension", `Some(empty)` matches nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OpportunitySearch {
    pub cause_ids: Option<HashSet<Ulid>>,
    pub category_ids: Option<HashSet<Ulid>>,
    pub organization_ids: Option<HashSet<Ulid>>,
    pub community_ids: Option<HashSet<Ulid>>,
    pub opportunity_type: TypeFilter,
    /// Sort strategy code; unknown codes keep source order.
    pub sort: i32,
    /// Candidate calendar dates; `None` or empty keeps every occurrence.
    pub dates: Option<Vec<NaiveDate>>,
}

impl OpportunitySearch {
    /// Parse and validate a JSON search body. Malformed ids, unknown fields
    /// and oversized lists are rejected here.
    pub fn from_json(body: &str) -> Result<Self, CatalogError> {
        if body.len() > MAX_SEARCH_BODY_BYTES {
            return Err(CatalogError::InvalidSearch("search body too large".into()));
        }
        let search: OpportunitySearch = serde_json::from_str(body)
            .map_err(|e| CatalogError::InvalidSearch(e.to_string()))?;
        search.validate()?;
        Ok(search)
    }

    pub fn validate(&self) -> Result<(), CatalogError> {
        let sets = [
            ("cause_ids", &self.cause_ids),
            ("category_ids", &self.category_ids),
            ("organization_ids", &self.organization_ids),
            ("community_ids", &self.community_ids),
        ];
        for (field, set) in sets {
            if set.as_ref().is_some_and(|ids| ids.len() > MAX_FILTER_IDS) {
                return Err(CatalogError::InvalidSearch(format!("too many ids in {field}")));
            }
        }
        if self
            .dates
            .as_ref()
            .is_some_and(|d| d.len() > MAX_CANDIDATE_DATES)
        {
            return Err(CatalogError::InvalidSearch("too many candidate dates".into()));
        }
        Ok(())
    }
}

// ── Projection result types ──────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OccurrenceView {
    pub id: Ulid,
    pub start_time: Ms,
    pub end_time: Ms,
    pub openings: u32,
}

impl OccurrenceView {
    pub fn duration_ms(&self) -> Ms {
        self.end_time - self.start_time
    }
}

impl From<&Occurrence> for OccurrenceView {
    fn from(o: &Occurrence) -> Self {
        Self {
            id: o.id,
            start_time: o.start_time(),
            end_time: o.end_time(),
            openings: o.openings,
        }
    }
}

/// Flattened, per-request read model of an opportunity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpportunityView {
    pub id: Ulid,
    pub name: String,
    pub description: String,
    pub address: String,
    pub organization_name: String,
    pub organization_link: Option<String>,
    pub cause_name: Option<String>,
    pub category_name: String,
    pub community_name: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub image_url: Option<String>,
    pub opportunity_type: OpportunityType,
    /// Eligible occurrences, start time ascending.
    pub occurrence_views: Vec<OccurrenceView>,
}
