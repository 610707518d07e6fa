//! Network Auction - tribet auctions for network ownership

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use network_auction::{
    config::{Args, LogFormat, StoreKind},
    server::{self, AppState},
    store::{AuctionStore, Clock, Fixtures, MemoryStore, MongoClock, MongoStore, SystemClock},
    AuctionService,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("network_auction={},info", args.log_level).into());
    let registry = tracing_subscriber::registry().with(filter);
    match args.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Network Auction");
    info!("======================================");
    info!("Node ID: {}", args.node_id);
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("Store: {:?}", args.store);
    info!("Bid window: {}s", args.bid_window_secs);
    info!(
        "Retry: {} attempts, {}-{}ms backoff",
        args.retry_max_attempts, args.retry_base_delay_ms, args.retry_max_delay_ms
    );
    info!("Request timeout: {}ms", args.request_timeout_ms);
    info!("======================================");

    let (store, clock): (Arc<dyn AuctionStore>, Arc<dyn Clock>) = match args.store {
        StoreKind::Memory => {
            warn!("Using in-memory store - state is lost on restart");
            (Arc::new(MemoryStore::new()), Arc::new(SystemClock))
        }
        StoreKind::Mongo => {
            info!("MongoDB: {} (db: {})", args.mongodb_uri, args.mongodb_db);
            let mongo = match MongoStore::connect(&args.mongodb_uri, &args.mongodb_db).await {
                Ok(store) => store,
                Err(e) => {
                    error!("MongoDB connection failed: {}", e);
                    std::process::exit(1);
                }
            };
            info!("MongoDB connected successfully");
            let clock = MongoClock::new(mongo.inner().clone());
            (Arc::new(mongo), Arc::new(clock))
        }
    };

    if let Some(path) = &args.seed_file {
        let fixtures = Fixtures::from_file(path)?;
        info!(
            "Seeding {} accounts and {} networks from {}",
            fixtures.accounts.len(),
            fixtures.networks.len(),
            path.display()
        );
        fixtures.load_into(store.as_ref()).await?;
    }

    let service = Arc::new(AuctionService::new(store, clock, args.auction_config()));
    let state = Arc::new(AppState::new(args, service));

    server::run(state).await?;

    Ok(())
}
