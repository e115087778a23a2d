//! Builders shared by the unit tests.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use tokio::sync::{broadcast, Semaphore};
use ulid::Ulid;

use crate::model::*;
use crate::store::{MemoryStore, OpportunityStore, StoreError};

pub const H: Ms = 3_600_000;

/// UTC timestamp in ms.
pub fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> Ms {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, 0)
        .single()
        .expect("valid test timestamp")
        .timestamp_millis()
}

pub fn date(y: i32, mo: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, mo, d).expect("valid test date")
}

pub struct OpportunityBuilder {
    opp: Opportunity,
}

/// Approved one-time opportunity with its own organization, cause and
/// category, and no occurrences.
pub fn opportunity(name: &str) -> OpportunityBuilder {
    OpportunityBuilder {
        opp: Opportunity {
            id: Ulid::new(),
            name: name.to_string(),
            description: format!("{name} description"),
            address: "1 Main St".into(),
            organization: Organization {
                id: Ulid::new(),
                name: format!("{name} org"),
                website_link: Some("https://example.org".into()),
                cause: Some(Cause {
                    id: Ulid::new(),
                    name: "Environment".into(),
                }),
            },
            category: Category {
                id: Ulid::new(),
                name: "Outdoors".into(),
            },
            community: None,
            location: Location {
                latitude: 49.28,
                longitude: -123.12,
            },
            opportunity_type: OpportunityType::OneTime,
            approved: true,
            image_url: None,
            created_by: None,
            occurrences: Vec::new(),
        },
    }
}

impl OpportunityBuilder {
    pub fn id(mut self, id: Ulid) -> Self {
        self.opp.id = id;
        self
    }

    pub fn approved(mut self, approved: bool) -> Self {
        self.opp.approved = approved;
        self
    }

    pub fn occurrence(mut self, start: Ms, end: Ms, openings: u32) -> Self {
        self.opp
            .occurrences
            .push(Occurrence::new(Ulid::new(), Span::new(start, end), openings));
        self
    }

    pub fn organization(mut self, id: Ulid, name: &str) -> Self {
        self.opp.organization.id = id;
        self.opp.organization.name = name.to_string();
        self
    }

    pub fn cause(mut self, id: Ulid) -> Self {
        self.opp.organization.cause = Some(Cause {
            id,
            name: "Cause".into(),
        });
        self
    }

    pub fn no_cause(mut self) -> Self {
        self.opp.organization.cause = None;
        self
    }

    pub fn category(mut self, id: Ulid) -> Self {
        self.opp.category.id = id;
        self
    }

    pub fn community(mut self, id: Ulid) -> Self {
        self.opp.community = Some(Community {
            id,
            name: "Downtown".into(),
        });
        self
    }

    pub fn created_by(mut self, creator: &str) -> Self {
        self.opp.created_by = Some(creator.to_string());
        self
    }

    pub fn opportunity_type(mut self, ty: OpportunityType) -> Self {
        self.opp.opportunity_type = ty;
        self
    }

    pub fn build(self) -> Opportunity {
        self.opp
    }

    pub fn draft(self) -> OpportunityDraft {
        let o = self.opp;
        OpportunityDraft {
            name: o.name,
            description: o.description,
            address: o.address,
            organization: o.organization,
            category: o.category,
            community: o.community,
            location: o.location,
            opportunity_type: o.opportunity_type,
            approved: o.approved,
            image_url: o.image_url,
            created_by: o.created_by,
            occurrences: o.occurrences,
        }
    }
}

// ── Instrumented store ───────────────────────────────────

/// Store wrapper that counts loads and can slow, gate or fail them.
pub struct TestStore {
    memory: MemoryStore,
    loads: AtomicU64,
    failing: AtomicBool,
    delay_ms: AtomicU64,
    gate: Mutex<Option<Arc<Semaphore>>>,
}

impl TestStore {
    pub fn with_opportunities(opportunities: impl IntoIterator<Item = Opportunity>) -> Self {
        Self {
            memory: MemoryStore::with_opportunities(opportunities),
            loads: AtomicU64::new(0),
            failing: AtomicBool::new(false),
            delay_ms: AtomicU64::new(0),
            gate: Mutex::new(None),
        }
    }

    pub fn memory(&self) -> &MemoryStore {
        &self.memory
    }

    pub fn loads(&self) -> u64 {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Hold every subsequent load until a permit is added.
    pub fn gate(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub async fn wait_for_loads(&self, n: u64) {
        for _ in 0..1_000 {
            if self.loads() >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        panic!("store never reached {n} loads");
    }
}

#[async_trait]
impl OpportunityStore for TestStore {
    async fn load_all_opportunities(&self) -> Result<Vec<Opportunity>, StoreError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let snapshot = self.memory.snapshot();
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.acquire().await.unwrap().forget();
        }
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected failure".into()));
        }
        Ok(snapshot)
    }

    async fn fetch_opportunity(&self, id: Ulid) -> Result<Option<Opportunity>, StoreError> {
        self.memory.fetch_opportunity(id).await
    }

    async fn create_opportunity(&self, draft: OpportunityDraft) -> Result<Opportunity, StoreError> {
        self.memory.create_opportunity(draft).await
    }

    async fn update_opportunity(&self, opportunity: Opportunity) -> Result<(), StoreError> {
        self.memory.update_opportunity(opportunity).await
    }

    async fn delete_opportunity(&self, id: Ulid) -> Result<(), StoreError> {
        self.memory.delete_opportunity(id).await
    }

    async fn set_approved(&self, id: Ulid, approved: bool) -> Result<(), StoreError> {
        self.memory.set_approved(id, approved).await
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<StoreEvent>> {
        self.memory.subscribe()
    }
}
