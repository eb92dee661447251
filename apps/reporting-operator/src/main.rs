//! Provision reporting operator.
//!
//! Reads watch events for AnarchySubjects, Namespaces and ResourceClaims as
//! newline-delimited JSON and reconciles them into the reporting ledger.

mod config;
mod logging;
mod runner;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use reporting_connector::crm::CrmSource;
use reporting_connector_crm::SalesforceCrm;
use reporting_connector_ldap::{AccountDirectory, CorporateDirectory};
use reporting_core::RetryConfig;
use reporting_db::{run_migrations, DbPool, PoolOptions};
use reporting_engine::{Dispatcher, InMemoryLedgerStore, LedgerStore, PgLedgerStore, WatchCache};
use tokio::io::BufReader;
use tracing::{error, info};

use config::Config;
use runner::{DeferPolicy, EventRunner};

/// Reconcile provision lifecycle events into the reporting ledger
#[derive(Parser)]
#[command(name = "reporting-operator")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// File of newline-delimited watch events; stdin when omitted
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Record into an in-memory ledger instead of PostgreSQL
    #[arg(long)]
    dry_run: bool,

    /// Do not apply schema migrations at startup
    #[arg(long)]
    skip_migrations: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: {e}");
            std::process::exit(1);
        }
    };

    logging::init_logging(&config.rust_log);

    if let Err(e) = run(cli, config).await {
        error!(error = %e, "Operator stopped");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let store: Arc<dyn LedgerStore> = if cli.dry_run {
        info!("Dry run, using in-memory ledger");
        Arc::new(InMemoryLedgerStore::new())
    } else {
        let pool = DbPool::connect_with_retry(
            &config.database_url,
            &PoolOptions::default(),
            RetryConfig::default(),
        )
        .await?;
        if !cli.skip_migrations {
            run_migrations(&pool).await?;
        }
        Arc::new(PgLedgerStore::new(pool))
    };

    let directory = CorporateDirectory::new(config.corporate_directory())?;
    let accounts = AccountDirectory::new(config.account_directory())?;
    let crm: Option<Arc<dyn CrmSource>> = match config.crm() {
        Some(crm_config) => Some(Arc::new(SalesforceCrm::new(crm_config)?)),
        None => {
            info!("SF_HOST not set, opportunity lookups disabled");
            None
        }
    };

    let dispatcher = Dispatcher::new(
        config.engine(),
        store,
        Arc::new(WatchCache::new()),
        Arc::new(accounts),
        Arc::new(directory),
        crm,
    );

    let runner = Arc::new(EventRunner::new(
        Arc::new(dispatcher),
        config.max_concurrent_events,
        DeferPolicy {
            delay: config.defer_delay,
            max_attempts: config.max_defer_attempts,
        },
    ));

    info!(
        max_concurrent_events = config.max_concurrent_events,
        "Reconciling watch events"
    );

    let summary = match cli.input {
        Some(path) => {
            let file = tokio::fs::File::open(&path).await?;
            runner.run(BufReader::new(file)).await?
        }
        None => runner.run(BufReader::new(tokio::io::stdin())).await?,
    };

    info!(
        applied = summary.applied,
        skipped = summary.skipped,
        abandoned = summary.abandoned,
        failed = summary.failed,
        malformed = summary.malformed,
        "Reconciliation finished"
    );
    Ok(())
}
