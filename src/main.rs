//! PBSC Ignite API server

use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use ignite::{
    cache::ResponseCache,
    config::Args,
    db::{MongoClient, Store},
    llm::Providers,
    logging,
    server::{self, AppState},
};

/// Server selection timeout for the startup connection
const MONGO_CONNECT_TIMEOUT_MS: u64 = 5000;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    logging::init(&args.log_level, &args.log_format);

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    // MongoDB is optional at startup: readiness reports it and
    // database routes answer 503 until the server is restarted.
    let store = match MongoClient::connect(&args.mongo.mongo_uri, &args.mongo.db_name, MONGO_CONNECT_TIMEOUT_MS).await {
        Ok(client) => match Store::open(client).await {
            Ok(store) => {
                info!("MongoDB connected ({})", args.mongo.db_name);
                Some(store)
            }
            Err(e) => {
                warn!("MongoDB collections unavailable, continuing without database: {}", e);
                None
            }
        },
        Err(e) => {
            warn!("MongoDB connection failed, continuing without database: {}", e);
            None
        }
    };

    let cache = Arc::new(ResponseCache::connect(&args.redis).await);
    let timeout = Duration::from_millis(args.request_timeout_ms);
    let providers = Providers::from_args(&args.llm, Arc::clone(&cache), timeout).await;

    info!("======================================");
    info!("  PBSC Ignite API");
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("Debug endpoints: {}", if args.debug { "enabled" } else { "disabled" });
    info!(
        "Database: {}",
        if store.is_some() { args.mongo.db_name.as_str() } else { "unavailable" }
    );
    info!(
        "Cache: {}",
        if cache.is_available() {
            format!("redis ({})", args.redis.display_addr())
        } else {
            "disabled".to_string()
        }
    );
    let names = providers.names();
    info!(
        "AI providers: {}",
        if names.is_empty() { "none".to_string() } else { names.join(", ") }
    );
    info!(
        "LinkedIn (Unipile): {}",
        if args.unipile.configured() { "configured" } else { "not configured" }
    );
    info!("======================================");

    if providers.is_empty() {
        warn!("No AI provider configured; responses will use built-in fallbacks");
    }

    let state = Arc::new(AppState::new(args, store, cache, providers)?);
    if let Err(e) = server::run(state).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
    Ok(())
}
