use std::sync::Arc;

use tokio::io::AsyncReadExt;
use tracing::info;
use ulid::Ulid;

use volly_catalog::catalog::Catalog;
use volly_catalog::config::Config;
use volly_catalog::limits::MAX_SEARCH_BODY_BYTES;
use volly_catalog::model::OpportunitySearch;
use volly_catalog::refresher;
use volly_catalog::store::{OpportunityStore, WalStore};

const USAGE: &str = "usage: volly-catalog [serve | list | get <id> | search < search.json]";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;
    volly_catalog::observability::init(config.metrics_port)?;

    // Ensure data directory exists
    std::fs::create_dir_all(&config.data_dir)?;
    let store = Arc::new(WalStore::open(&config.wal_path())?);
    let catalog = Catalog::new(store.clone(), config.cache_config()).with_date_offset(config.date_offset);

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str).unwrap_or("serve") {
        "list" => print_json(&catalog.list_opportunities().await?)?,
        "get" => {
            let raw = args.get(1).ok_or(USAGE)?;
            let id = Ulid::from_string(raw).map_err(|e| format!("invalid id {raw:?}: {e}"))?;
            match catalog.get_opportunity(id).await? {
                Some(view) => print_json(&view)?,
                None => return Err(format!("opportunity {id} not found").into()),
            }
        }
        "search" => {
            let mut body = String::new();
            tokio::io::stdin()
                .take(MAX_SEARCH_BODY_BYTES as u64 + 1)
                .read_to_string(&mut body)
                .await?;
            let search = OpportunitySearch::from_json(&body)?;
            print_json(&catalog.search_opportunities(&search).await?)?;
        }
        "serve" => serve(catalog, store, &config).await?,
        other => return Err(format!("unknown command {other:?}\n{USAGE}").into()),
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn serve(
    catalog: Catalog,
    store: Arc<WalStore>,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("volly-catalog serving");
    info!("  data_dir: {}", config.data_dir.display());
    info!("  cache ttl: {:?}, load timeout: {:?}", config.cache_ttl, config.load_timeout);
    info!("  date offset: {}", config.date_offset);
    info!("  metrics: {}", config.metrics_port.map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics")));

    let cache = catalog.cache().clone();
    if let Some(rx) = store.subscribe() {
        tokio::spawn(refresher::run_invalidation_listener(cache.clone(), rx));
    }
    tokio::spawn(refresher::run_warmer(cache, config.warm_interval));
    tokio::spawn(refresher::run_compactor(store.clone(), config.compact_threshold));

    let shutdown = async {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            let mut sigterm =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("failed to register SIGTERM handler");
            tokio::select! {
                _ = ctrl_c => {}
                _ = sigterm.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
        }
    };
    shutdown.await;
    info!("shutdown signal received");

    // Leave a compact log behind for the next start.
    if store.appends_since_compact().await > 0 {
        store.compact().await?;
    }
    info!("volly-catalog stopped");
    Ok(())
}
