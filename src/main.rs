//! Trixel contribution agent
//!
//! Runs one contribution client entry against a JSON snapshot of host states.
//! The station is registered with the offline network until a remote
//! transport is wired in.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Level};

use trixel_contribution_client::{
    config::{flow, settings::AgentSettings},
    logging::{init_logging, LogConfig},
    remove_entry, supervise, ConfigStore, EntryContext, InMemoryHost, JsonFileStore, MemoryStore,
    OfflineNetwork, Result, TrixelError,
};

/// Trixel contribution agent
#[derive(Parser, Debug)]
#[command(name = "trixel-contributor")]
#[command(about = "Contribute outdoor sensor readings to a Trixel network")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Settings file
    #[arg(short, long, global = true, env = "TRIXEL_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the contribution client until interrupted
    Run,
    /// Validate settings and registration without touching stored state
    Check,
    /// Remove the station and its stored configuration
    Remove,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env();
    if cli.debug {
        log_config = log_config.with_level(Level::DEBUG);
    }
    init_logging(log_config)?;

    let settings = AgentSettings::load(cli.config.as_deref())?;
    let result = match cli.command {
        Command::Run => run(settings).await,
        Command::Check => check(settings).await,
        Command::Remove => remove(settings).await,
    };

    if let Err(e) = &result {
        error!("{}", e);
    }
    result
}

async fn load_host(settings: &AgentSettings) -> Result<Arc<InMemoryHost>> {
    let host = Arc::new(InMemoryHost::new(settings.home_location()));
    if let Some(snapshot) = &settings.states.snapshot {
        let count = host.load_snapshot(snapshot).await?;
        info!("Loaded {} entity states from {:?}", count, snapshot);
    }
    Ok(host)
}

fn file_store(settings: &AgentSettings) -> Arc<JsonFileStore> {
    let store = JsonFileStore::new(settings.storage_dir());
    info!("Using configuration store {:?}", store.path());
    Arc::new(store)
}

async fn run(settings: AgentSettings) -> Result<()> {
    settings.validate()?;
    let host = load_host(&settings).await?;
    let ctx = EntryContext::new(
        host.clone(),
        file_store(&settings),
        Arc::new(OfflineNetwork::new()),
    );

    let shutdown = CancellationToken::new();
    let refresher = settings.states.snapshot.clone().map(|path| {
        spawn_state_refresh(
            host,
            path,
            settings.states.refresh_interval,
            shutdown.clone(),
        )
    });

    let mut supervisor = {
        let shutdown = shutdown.clone();
        let data = settings.entry_data();
        let options = settings.contribution.clone();
        let supervisor_options = settings.supervisor;
        tokio::spawn(async move {
            supervise(&ctx, &data, &options, supervisor_options, shutdown).await
        })
    };

    let result = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutting down");
            shutdown.cancel();
            None
        }
        outcome = &mut supervisor => Some(outcome),
    };

    let outcome = match result {
        Some(outcome) => outcome,
        None => supervisor.await,
    };
    shutdown.cancel();
    if let Some(refresher) = refresher {
        join_background("state refresh", refresher).await;
    }

    outcome.map_err(|e| TrixelError::internal(format!("Supervisor task failed: {e}")))?
}

async fn check(settings: AgentSettings) -> Result<()> {
    settings.validate()?;
    let data = settings.entry_data();
    let options = settings.contribution.clone();
    if let Some(key) = flow::validate_sensor_count(&options) {
        return Err(TrixelError::invalid_input(key));
    }

    // Work on a copy so the check never rewrites the persisted configuration
    let stored = file_store(&settings).load().await?;
    let store = match stored {
        Some(config) => MemoryStore::with_config(&config)?,
        None => MemoryStore::new(),
    };
    let ctx = EntryContext::new(
        load_host(&settings).await?,
        Arc::new(store),
        Arc::new(OfflineNetwork::new()),
    );

    flow::validate_connection(&ctx, &data, &options).await?;
    info!(
        url = %data.lookup_service_url()?,
        sensors = options.sensor_count(),
        "Configuration is valid"
    );
    Ok(())
}

async fn remove(settings: AgentSettings) -> Result<()> {
    let ctx = EntryContext::new(
        load_host(&settings).await?,
        file_store(&settings),
        Arc::new(OfflineNetwork::new()),
    );
    remove_entry(&ctx).await
}

/// Await a background task, reporting a panic or abort instead of dropping it
async fn join_background(name: &str, task: JoinHandle<()>) -> bool {
    match task.await {
        Ok(()) => true,
        Err(e) => {
            warn!(task = name, "Background task failed: {}", e);
            false
        }
    }
}

fn spawn_state_refresh(
    host: Arc<InMemoryHost>,
    path: PathBuf,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately and the snapshot is already loaded
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = host.load_snapshot(&path).await {
                        warn!("Failed to refresh entity states from {:?}: {}", path, e);
                    }
                }
            }
        }
    })
}
