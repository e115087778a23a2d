use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::model::Opportunity;
use crate::observability::*;
use crate::store::OpportunityStore;

use super::CatalogError;

/// Immutable point-in-time view of the whole catalog.
pub type Snapshot = Arc<[Opportunity]>;

type Flight = Shared<BoxFuture<'static, Result<Snapshot, CatalogError>>>;

#[derive(Debug, Clone, Default)]
pub struct CacheConfig {
    /// Upper bound on snapshot age. Invalidation is the primary freshness
    /// mechanism; this only bounds staleness when an invalidation is missed.
    pub ttl: Option<Duration>,
    /// Store loads running longer than this fail with `LoadFailed`.
    pub load_timeout: Option<Duration>,
}

struct CacheEntry {
    snapshot: Snapshot,
    /// Invalidation generation the load started in.
    generation: u64,
    loaded_at: Instant,
}

struct Inner {
    store: Arc<dyn OpportunityStore>,
    config: CacheConfig,
    entry: RwLock<Option<CacheEntry>>,
    generation: AtomicU64,
    /// At most one reload per generation; late callers join it.
    inflight: Mutex<Option<(u64, Flight)>>,
    loads: AtomicU64,
}

/// Read-through cache of every opportunity in the store.
///
/// Readers clone an `Arc` to a fully built snapshot, so they see either the
/// previous catalog or the new one, never a mix. A miss starts a reload in
/// a spawned task; every concurrent miss in the same invalidation
/// generation awaits that same task, and it runs to completion even if all
/// of them are cancelled.
#[derive(Clone)]
pub struct CatalogCache {
    inner: Arc<Inner>,
}

impl CatalogCache {
    pub fn new(store: Arc<dyn OpportunityStore>, config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                config,
                entry: RwLock::new(None),
                generation: AtomicU64::new(0),
                inflight: Mutex::new(None),
                loads: AtomicU64::new(0),
            }),
        }
    }

    pub fn store(&self) -> &Arc<dyn OpportunityStore> {
        &self.inner.store
    }

    pub async fn get_all_opportunities(&self) -> Result<Snapshot, CatalogError> {
        if let Some(snapshot) = self.inner.fresh().await {
            metrics::counter!(CACHE_HITS_TOTAL).increment(1);
            return Ok(snapshot);
        }
        metrics::counter!(CACHE_MISSES_TOTAL).increment(1);

        let flight = {
            let mut inflight = self.inner.inflight.lock().await;
            // Another caller may have published while we waited for the lock.
            if let Some(snapshot) = self.inner.fresh().await {
                return Ok(snapshot);
            }
            let generation = self.inner.generation.load(Ordering::Acquire);
            match inflight.as_ref() {
                Some((g, flight)) if *g == generation => flight.clone(),
                _ => {
                    let flight = start_reload(&self.inner, generation);
                    *inflight = Some((generation, flight.clone()));
                    flight
                }
            }
        };
        flight.await
    }

    /// Mark the current snapshot stale. The next read reloads; a reload
    /// already in flight publishes a snapshot that is stale on arrival.
    pub fn invalidate(&self) {
        let generation = self.inner.generation.fetch_add(1, Ordering::AcqRel) + 1;
        metrics::counter!(CACHE_INVALIDATIONS_TOTAL).increment(1);
        debug!("catalog invalidated (generation {generation})");
    }

    /// Last published snapshot, fresh or not. Survives failed reloads.
    pub async fn peek(&self) -> Option<Snapshot> {
        self.inner
            .entry
            .read()
            .await
            .as_ref()
            .map(|e| e.snapshot.clone())
    }

    /// Number of store loads started so far.
    pub fn load_count(&self) -> u64 {
        self.inner.loads.load(Ordering::Relaxed)
    }

    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::Acquire)
    }
}

fn start_reload(inner: &Arc<Inner>, generation: u64) -> Flight {
    let task_inner = Arc::clone(inner);
    let handle = tokio::spawn(async move { task_inner.reload(generation).await });
    async move {
        match handle.await {
            Ok(result) => result,
            Err(e) => Err(CatalogError::LoadFailed(format!("reload task failed: {e}"))),
        }
    }
    .boxed()
    .shared()
}

impl Inner {
    async fn fresh(&self) -> Option<Snapshot> {
        let guard = self.entry.read().await;
        let entry = guard.as_ref()?;
        if entry.generation != self.generation.load(Ordering::Acquire) {
            return None;
        }
        if self
            .config
            .ttl
            .is_some_and(|ttl| entry.loaded_at.elapsed() >= ttl)
        {
            return None;
        }
        Some(entry.snapshot.clone())
    }

    async fn reload(&self, generation: u64) -> Result<Snapshot, CatalogError> {
        self.loads.fetch_add(1, Ordering::Relaxed);
        let started = Instant::now();
        let result = self.load().await;
        metrics::histogram!(CACHE_RELOAD_DURATION_SECONDS).record(started.elapsed().as_secs_f64());

        let outcome = match result {
            Ok(opportunities) => {
                let snapshot: Snapshot = opportunities.into();
                metrics::counter!(CACHE_RELOADS_TOTAL, "status" => "ok").increment(1);
                info!(
                    "catalog reloaded: {} opportunities in {:?} (generation {generation})",
                    snapshot.len(),
                    started.elapsed()
                );
                self.publish(snapshot.clone(), generation).await;
                Ok(snapshot)
            }
            Err(e) => {
                // Nothing is published; the previous snapshot stays in place.
                metrics::counter!(CACHE_RELOADS_TOTAL, "status" => "error").increment(1);
                warn!("catalog reload failed (generation {generation}): {e}");
                Err(e)
            }
        };

        let mut inflight = self.inflight.lock().await;
        if inflight.as_ref().is_some_and(|(g, _)| *g == generation) {
            *inflight = None;
        }
        outcome
    }

    async fn load(&self) -> Result<Vec<Opportunity>, CatalogError> {
        let load = self.store.load_all_opportunities();
        let result = match self.config.load_timeout {
            Some(limit) => tokio::time::timeout(limit, load).await.map_err(|_| {
                CatalogError::LoadFailed(format!("store load timed out after {limit:?}"))
            })?,
            None => load.await,
        };
        result.map_err(|e| CatalogError::LoadFailed(e.to_string()))
    }

    async fn publish(&self, snapshot: Snapshot, generation: u64) {
        let mut entry = self.entry.write().await;
        if entry.as_ref().is_some_and(|e| e.generation > generation) {
            debug!("dropping reload from generation {generation}: newer snapshot published");
            return;
        }
        metrics::gauge!(CATALOG_SIZE).set(snapshot.len() as f64);
        *entry = Some(CacheEntry {
            snapshot,
            generation,
            loaded_at: Instant::now(),
        });
    }
}
