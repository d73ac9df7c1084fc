//! ignite-db - initialize, check or reset the PBSC Ignite database

use anyhow::Context;
use clap::Parser;
use std::io::{self, BufRead, Write};
use tracing::{error, info, warn};

use ignite::config::{DbCli, DbCommand};
use ignite::db::init::{self, InitReport};
use ignite::db::MongoClient;
use ignite::logging;

const INIT_TIMEOUT_MS: u64 = 3000;
const CHECK_TIMEOUT_MS: u64 = 5000;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let cli = DbCli::parse();
    logging::init(&cli.log_level, "text");

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: DbCli) -> anyhow::Result<()> {
    match cli.command {
        DbCommand::Init => {
            let mongo = connect(&cli, INIT_TIMEOUT_MS).await?;
            let report = init::initialize(&mongo).await.context("Initialization failed")?;
            print_init(&report);
        }
        DbCommand::Check => {
            let mongo = connect(&cli, CHECK_TIMEOUT_MS).await?;
            let report = init::check(&mongo).await.context("Check failed")?;
            info!("Collections ({}):", report.collections.len());
            for (name, count) in &report.collections {
                info!("  {}: {} documents", name, count);
            }
            if report.is_initialized() {
                info!(
                    "Initialized at {} (version {})",
                    report.initialized_at.as_deref().unwrap_or("unknown"),
                    report.version.as_deref().unwrap_or("unknown")
                );
            } else {
                warn!("Database is not initialized. Run `ignite-db init`.");
            }
        }
        DbCommand::Reset { yes } => {
            let db_name = cli.mongo.db_name.clone();
            if !yes && !confirm(&db_name)? {
                info!("Reset aborted, no changes made");
                return Ok(());
            }
            let mongo = connect(&cli, INIT_TIMEOUT_MS).await?;
            init::drop_database(&mongo).await.context("Reset failed")?;
            let report = init::initialize(&mongo).await.context("Initialization failed")?;
            print_init(&report);
        }
    }
    Ok(())
}

async fn connect(cli: &DbCli, timeout_ms: u64) -> anyhow::Result<MongoClient> {
    info!("Connecting to MongoDB database '{}'", cli.mongo.db_name);
    let mongo = MongoClient::connect(&cli.mongo.mongo_uri, &cli.mongo.db_name, timeout_ms)
        .await
        .context("Could not connect to MongoDB")?;
    mongo.ping().await.context("MongoDB did not answer a ping")?;
    Ok(mongo)
}

fn confirm(db_name: &str) -> anyhow::Result<bool> {
    print!(
        "This drops every collection in '{}'. Type 'DELETE {}' to continue: ",
        db_name, db_name
    );
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().lock().read_line(&mut input)?;
    Ok(init::confirms_reset(&input, db_name))
}

fn print_init(report: &InitReport) {
    info!(
        "Collections created: {}, already present: {}, indexes applied: {}",
        report.created.len(),
        report.existing.len(),
        report.indexes
    );
    info!(
        "Database stats: {} collections, {:.2} KB data, {:.2} KB storage",
        report.stats.collections, report.stats.data_size_kb, report.stats.storage_size_kb
    );
}
