/// aquamon: water quality monitoring service.
///
/// Startup order matters: the store and TTN clients are blocking, so they
/// are built before the tokio runtime exists and the last handle to them is
/// dropped after it has shut down.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;

use aquamon_service::config::ServiceConfig;
use aquamon_service::ingest::TtnClient;
use aquamon_service::logging::{self, DataSource};
use aquamon_service::server::{self, AppState, DynStore};
use aquamon_service::store::{MemoryStore, PgReadingStore};
use aquamon_service::verify;

/// Readings pre-loaded into the in-memory store by `--dev`.
const DEV_HISTORY_LEN: usize = 20;

#[derive(Debug, Parser)]
#[command(name = "aquamon", version, about = "Water quality monitoring service")]
struct Args {
    /// Path to aquamon.toml
    #[arg(short, long, env = "AQUAMON_CONFIG")]
    config: Option<PathBuf>,

    /// Use an in-memory store seeded with demo history instead of PostgreSQL
    #[arg(long)]
    dev: bool,

    /// Check store and TTN reachability, print a report and exit
    #[arg(long)]
    verify: bool,
}

fn build_store(config: &ServiceConfig, dev: bool) -> Result<DynStore> {
    if dev {
        logging::info(DataSource::System, None, "dev mode: using in-memory store with demo history");
        return Ok(Box::new(MemoryStore::with_demo_history(
            &config.device_id,
            DEV_HISTORY_LEN,
            Utc::now(),
        )));
    }
    let url = config
        .database
        .url
        .as_deref()
        .context("DATABASE_URL not set (use --dev to run without a database)")?;
    let tls = config.database.tls_mode();
    let store = PgReadingStore::connect_and_prepare(url, tls).context("failed to open record store")?;
    logging::info(DataSource::Database, None, &format!("connected (tls: {:?}), schema ready", tls));
    Ok(Box::new(store))
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = ServiceConfig::load_or_default(args.config.as_deref())?;
    let _log_guard = logging::init_logging(&config.logging.level, config.logging.file.as_deref());

    for line in config.summary() {
        logging::info(DataSource::System, None, &line);
    }

    let mut store = build_store(&config, args.dev)?;
    let upstream = TtnClient::new(&config.upstream).context("failed to build TTN client")?;
    if !upstream.is_configured() {
        logging::warn(
            DataSource::Ttn,
            None,
            "TTN_APP_ID / TTN_API_KEY not set, upstream fallback disabled",
        );
    }

    if args.verify {
        let report = verify::run_verification(&mut store, &upstream, &config.device_id, Utc::now());
        verify::print_summary(&report);
        if !report.is_operational() {
            anyhow::bail!("record store is not reachable");
        }
        return Ok(());
    }

    let state = Arc::new(AppState::new(store, Box::new(upstream), config));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;
    runtime
        .block_on(server::serve(Arc::clone(&state)))
        .context("HTTP server failed")?;
    drop(runtime);

    logging::info(DataSource::System, None, "shut down");
    drop(state);
    Ok(())
}
