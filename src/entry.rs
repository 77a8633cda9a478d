//! Configuration entry lifecycle
//!
//! One configuration entry owns exactly one client and one polling task.
//! [`setup_entry`] launches it and reports early failures synchronously,
//! [`supervise`] reloads it after runtime failures and [`remove_entry`]
//! deletes the station before dropping the persisted document.

use crate::client::ContributionClient;
use crate::client::{DEFAULT_POLLING_INTERVAL, RETRY_INTERVAL};
use crate::config::{EntryData, EntryOptions};
use crate::error::{ErrorReporter, Result, TrixelError};
use crate::host::HostContext;
use crate::network::MeasurementNetwork;
use crate::storage::ConfigStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Time the polling task must survive before setup counts as successful
pub const STARTUP_GRACE: Duration = Duration::from_millis(2500);

/// Collaborators shared by every client of an entry
#[derive(Clone)]
pub struct EntryContext {
    pub host: Arc<dyn HostContext>,
    pub store: Arc<dyn ConfigStore>,
    pub network: Arc<dyn MeasurementNetwork>,
}

impl EntryContext {
    pub fn new(
        host: Arc<dyn HostContext>,
        store: Arc<dyn ConfigStore>,
        network: Arc<dyn MeasurementNetwork>,
    ) -> Self {
        Self {
            host,
            store,
            network,
        }
    }

    /// Create a client on this context
    pub async fn create_client(
        &self,
        data: Option<&EntryData>,
        options: Option<&EntryOptions>,
    ) -> Result<ContributionClient> {
        ContributionClient::create(
            self.host.clone(),
            self.store.clone(),
            self.network.clone(),
            data,
            options,
        )
        .await
    }
}

impl std::fmt::Debug for EntryContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryContext").finish_non_exhaustive()
    }
}

/// Timing of the supervision loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupervisorOptions {
    #[serde(with = "humantime_serde", default = "default_startup_grace")]
    pub startup_grace: Duration,
    /// Wait before a failed entry is set up again
    #[serde(with = "humantime_serde", default = "default_reload_delay")]
    pub reload_delay: Duration,
}

fn default_startup_grace() -> Duration {
    STARTUP_GRACE
}

fn default_reload_delay() -> Duration {
    RETRY_INTERVAL
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            startup_grace: STARTUP_GRACE,
            reload_delay: RETRY_INTERVAL,
        }
    }
}

/// A client whose polling task survived the startup grace period
#[derive(Debug)]
pub struct RunningEntry {
    client: Arc<ContributionClient>,
    task: Option<JoinHandle<Result<()>>>,
}

impl RunningEntry {
    pub fn client(&self) -> &Arc<ContributionClient> {
        &self.client
    }

    /// Await the outcome of the polling task
    pub async fn wait(&mut self) -> Result<()> {
        let Some(task) = self.task.as_mut() else {
            return Ok(());
        };
        let joined = task.await;
        self.task = None;
        joined.map_err(|e| TrixelError::internal(format!("Client task aborted: {e}")))?
    }

    /// Kill the client and wait for its task to wind down
    pub async fn unload(mut self) -> Result<()> {
        self.client.kill();
        let result = self.wait().await;
        info!("Configuration entry unloaded");
        result
    }
}

/// Create the client, launch its polling task and confirm it starts
///
/// A task that fails within `grace` turns into [`TrixelError::NotReady`].
pub async fn setup_entry(
    ctx: &EntryContext,
    data: &EntryData,
    options: &EntryOptions,
    grace: Duration,
) -> Result<RunningEntry> {
    let client = Arc::new(ctx.create_client(Some(data), Some(options)).await?);

    let polling_interval = options.polling_interval();
    let mut task = {
        let client = client.clone();
        tokio::spawn(async move { client.run(polling_interval, false).await })
    };

    match tokio::time::timeout(grace, &mut task).await {
        Err(_) => {
            info!(
                sensors = options.sensor_count(),
                "Configuration entry set up"
            );
            Ok(RunningEntry {
                client,
                task: Some(task),
            })
        }
        Ok(Ok(Ok(()))) => {
            debug!("Client task finished within the startup grace period");
            Ok(RunningEntry { client, task: None })
        }
        Ok(Ok(Err(e))) => {
            client.kill();
            Err(TrixelError::not_ready(e))
        }
        Ok(Err(join_error)) => {
            client.kill();
            Err(TrixelError::not_ready(TrixelError::internal(format!(
                "Client task aborted: {join_error}"
            ))))
        }
    }
}

/// Keep an entry running until `shutdown` is cancelled
///
/// Runtime failures kill the client and set the entry up again after
/// `reload_delay`. Setup failures that cannot be fixed by retrying (no home,
/// rejected credentials, invalid options) end supervision with that error.
pub async fn supervise(
    ctx: &EntryContext,
    data: &EntryData,
    options: &EntryOptions,
    supervisor: SupervisorOptions,
    shutdown: CancellationToken,
) -> Result<()> {
    let mut reloads: u32 = 0;

    loop {
        if shutdown.is_cancelled() {
            return Ok(());
        }

        let mut entry = match setup_entry(ctx, data, options, supervisor.startup_grace).await {
            Ok(entry) => entry,
            Err(e) if e.is_retryable() => {
                ErrorReporter::log_error(&e, "entry", "setup");
                if !crate::client::polling::wait_or_cancel(&shutdown, supervisor.reload_delay).await
                {
                    return Ok(());
                }
                reloads += 1;
                continue;
            }
            Err(e) => return Err(e),
        };

        let outcome = tokio::select! {
            _ = shutdown.cancelled() => None,
            outcome = entry.wait() => Some(outcome),
        };
        let Some(outcome) = outcome else {
            return entry.unload().await;
        };

        match outcome {
            Ok(()) => {
                debug!("Client task ended without error");
                return Ok(());
            }
            Err(e) => {
                ErrorReporter::log_error(&e, "entry", "run");
                entry.client().kill();
                reloads += 1;
                warn!(
                    reloads,
                    "Client stopped unexpectedly, reloading in {:?}",
                    supervisor.reload_delay
                );
                if !crate::client::polling::wait_or_cancel(&shutdown, supervisor.reload_delay).await
                {
                    return Ok(());
                }
            }
        }
    }
}

/// Delete the station from the network and drop its persisted configuration
///
/// Network and lifecycle failures are downgraded to warnings; the stored
/// document is removed either way.
pub async fn remove_entry(ctx: &EntryContext) -> Result<()> {
    match ctx.create_client(None, None).await {
        Ok(client) => {
            if let Err(e) = client.run(DEFAULT_POLLING_INTERVAL, true).await {
                warn!("Failed to remove measurement station: {}", e);
            }
        }
        Err(e) => warn!("Failed to remove measurement station: {}", e),
    }

    ctx.store.remove().await?;
    info!("Configuration entry removed");
    Ok(())
}
