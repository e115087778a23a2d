use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use crate::catalog::CatalogCache;
use crate::model::StoreEvent;
use crate::store::WalStore;

/// Invalidate the cache on every store event until the feed closes.
///
/// A lagged receiver has missed events it can't name, so it invalidates once
/// and keeps listening.
pub async fn run_invalidation_listener(
    cache: CatalogCache,
    mut rx: broadcast::Receiver<StoreEvent>,
) {
    loop {
        match rx.recv().await {
            Ok(event) => {
                debug!("store event for {}, invalidating", event.opportunity_id());
                cache.invalidate();
            }
            Err(RecvError::Lagged(missed)) => {
                warn!("change feed lagged by {missed} events, invalidating");
                cache.invalidate();
            }
            Err(RecvError::Closed) => {
                info!("change feed closed, listener exiting");
                return;
            }
        }
    }
}

/// Keep the snapshot warm so readers rarely pay for a cold load.
pub async fn run_warmer(cache: CatalogCache, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        match cache.get_all_opportunities().await {
            Ok(snapshot) => debug!("warmer: {} opportunities cached", snapshot.len()),
            Err(e) => warn!("warmer: reload failed: {e}"),
        }
    }
}

/// Compact the store log once it has grown past `threshold` appends.
pub async fn run_compactor(store: Arc<WalStore>, threshold: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(60));
    loop {
        interval.tick().await;
        let appends = store.appends_since_compact().await;
        if appends < threshold {
            continue;
        }
        match store.compact().await {
            Ok(()) => info!("compacted store log after {appends} appends"),
            Err(e) => warn!("store log compaction failed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::fixtures::{opportunity, TestStore, H};
    use crate::catalog::CacheConfig;
    use crate::notify::ChangeFeed;
    use crate::store::OpportunityStore;

    async fn wait_for_generation(cache: &CatalogCache, at_least: u64) {
        for _ in 0..1_000 {
            if cache.generation() >= at_least {
                return;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        panic!("generation never reached {at_least}");
    }

    #[tokio::test]
    async fn listener_invalidates_on_store_writes() {
        let store = Arc::new(TestStore::with_opportunities(vec![]));
        let cache = CatalogCache::new(store.clone(), CacheConfig::default());
        let rx = store.subscribe().expect("memory store has a feed");
        tokio::spawn(run_invalidation_listener(cache.clone(), rx));

        assert!(cache.get_all_opportunities().await.unwrap().is_empty());
        let before = cache.generation();

        // Write behind the cache's back.
        store
            .create_opportunity(opportunity("A").occurrence(0, H, 1).draft())
            .await
            .unwrap();
        wait_for_generation(&cache, before + 1).await;

        assert_eq!(cache.get_all_opportunities().await.unwrap().len(), 1);
        assert_eq!(store.loads(), 2);
    }

    #[tokio::test]
    async fn listener_invalidates_once_when_lagged() {
        let store = Arc::new(TestStore::with_opportunities(vec![]));
        let cache = CatalogCache::new(store, CacheConfig::default());
        let (tx, rx) = broadcast::channel(2);
        let event = StoreEvent::OpportunityDeleted { id: ulid::Ulid::new() };
        for _ in 0..5 {
            tx.send(event.clone()).unwrap();
        }
        drop(tx);

        let before = cache.generation();
        run_invalidation_listener(cache.clone(), rx).await;
        // One for the lag, one for each of the two retained events.
        assert_eq!(cache.generation(), before + 3);
    }

    #[tokio::test]
    async fn listener_exits_when_feed_closes() {
        let store = Arc::new(TestStore::with_opportunities(vec![]));
        let cache = CatalogCache::new(store, CacheConfig::default());
        let feed = ChangeFeed::new();
        let rx = feed.subscribe();
        drop(feed);
        tokio::time::timeout(
            Duration::from_secs(1),
            run_invalidation_listener(cache, rx),
        )
        .await
        .expect("listener should return on closed feed");
    }

    #[tokio::test]
    async fn warmer_loads_snapshot() {
        let store = Arc::new(TestStore::with_opportunities(vec![
            opportunity("A").occurrence(0, H, 1).build(),
        ]));
        let cache = CatalogCache::new(store.clone(), CacheConfig::default());
        let handle = tokio::spawn(run_warmer(cache.clone(), Duration::from_millis(10)));
        store.wait_for_loads(1).await;
        handle.abort();
        let snapshot = cache.peek().await.expect("warmer published a snapshot");
        assert_eq!(snapshot.len(), 1);
    }

    #[tokio::test]
    async fn compactor_shrinks_log_past_threshold() {
        let dir = std::env::temp_dir().join("volly_test_refresher");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("compactor.wal");
        let _ = std::fs::remove_file(&path);

        let store = Arc::new(WalStore::open(&path).unwrap());
        let created = store
            .create_opportunity(opportunity("A").occurrence(0, H, 1).draft())
            .await
            .unwrap();
        for approved in [false, true, false, true] {
            store.set_approved(created.id, approved).await.unwrap();
        }
        assert_eq!(store.appends_since_compact().await, 5);

        // The first interval tick fires immediately.
        let handle = tokio::spawn(run_compactor(store.clone(), 3));
        for _ in 0..1_000 {
            if store.appends_since_compact().await == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        handle.abort();
        assert_eq!(store.appends_since_compact().await, 0);

        drop(store);
        let reopened = WalStore::open(&path).unwrap();
        let fetched = reopened.fetch_opportunity(created.id).await.unwrap().unwrap();
        assert!(fetched.approved);
    }
}
