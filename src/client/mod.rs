//! Reconciling contribution client
//!
//! Lifecycle: `create` loads (or builds) the stored configuration and applies
//! the user's sensor selection, `run` registers with the network and polls the
//! host on a fixed interval, `kill` cancels the loop. A client created only to
//! delete the station runs in deletion mode instead of polling.
//!
//! ```text
//! Uninitialized -> Reconciled -> Running -> Stopped
//!                       \          \
//!                        +----------+--> Removed
//! ```

pub mod polling;

use crate::config::{ClientConfig, Coordinate, EntryData, EntryOptions};
use crate::error::{Result, TrixelError};
use crate::host::HostContext;
use crate::network::{MeasurementBatch, MeasurementNetwork, MeasurementUpdate};
use crate::services::{canonicalize, reconcile, LastSeenCache};
use crate::storage::ConfigStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub use polling::{RetryPolicy, RunOptions, DEFAULT_POLLING_INTERVAL, MAX_RETRIES, RETRY_INTERVAL};

/// Lifecycle state of a [`ContributionClient`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// Creation has not completed
    Uninitialized,
    /// Configuration loaded, reconciled and persisted
    Reconciled,
    /// Registered and polling
    Running,
    /// Polling ended or the client was killed
    Stopped,
    /// Station removal was attempted
    Removed,
}

/// Client that keeps the sensor configuration in sync and publishes updates
pub struct ContributionClient {
    host: Arc<dyn HostContext>,
    store: Arc<dyn ConfigStore>,
    network: Arc<dyn MeasurementNetwork>,
    config: RwLock<ClientConfig>,
    last_seen: Mutex<LastSeenCache>,
    cancel: CancellationToken,
    state: watch::Sender<ClientState>,
}

impl std::fmt::Debug for ContributionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContributionClient")
            .field("state", &*self.state.borrow())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl ContributionClient {
    /// Create a client from storage and apply the supplied entry options
    ///
    /// - stored config found: the location is refreshed; with `options` the
    ///   sensor selection is reconciled and the result persisted.
    /// - nothing stored: a fresh config is built from `data` and `options` and
    ///   persisted; without them [`TrixelError::NoExistingConfiguration`].
    ///
    /// Fails with [`TrixelError::NoHome`] before storage is touched if the host
    /// has no usable location.
    pub async fn create(
        host: Arc<dyn HostContext>,
        store: Arc<dyn ConfigStore>,
        network: Arc<dyn MeasurementNetwork>,
        data: Option<&EntryData>,
        options: Option<&EntryOptions>,
    ) -> Result<Self> {
        let location = host
            .location()
            .filter(Coordinate::is_configured)
            .ok_or(TrixelError::NoHome)?;

        let config = match store.load().await? {
            Some(mut config) => {
                config.location = location;
                if let Some(data) = data {
                    if data.tls_host != config.tls_host {
                        warn!(
                            stored = %config.tls_host,
                            requested = %data.tls_host,
                            "Lookup service host cannot change after creation, keeping stored host"
                        );
                    }
                }
                if let Some(options) = options {
                    options.validate()?;
                    config.k = options.k;
                    config.max_depth = options.max_depth;

                    let diff = reconcile(&config.sensors, &options.desired_sensors());
                    info!(
                        added = diff.to_add.len(),
                        removed = diff.to_remove.len(),
                        "Reconciled sensor selection with stored configuration"
                    );
                    diff.apply(&mut config.sensors);
                    store.save(&config).await?;
                }
                config
            }
            None => {
                let (data, options) = match (data, options) {
                    (Some(data), Some(options)) => (data, options),
                    _ => return Err(TrixelError::NoExistingConfiguration),
                };
                options.validate()?;

                let mut config =
                    ClientConfig::new(location, data.tls_host.clone(), options.k, options.max_depth);
                reconcile(&config.sensors, &options.desired_sensors()).apply(&mut config.sensors);
                store.save(&config).await?;
                info!(
                    sensors = config.sensors.len(),
                    "Created new client configuration"
                );
                config
            }
        };

        let (state, _) = watch::channel(ClientState::Reconciled);
        Ok(Self {
            host,
            store,
            network,
            config: RwLock::new(config),
            last_seen: Mutex::new(LastSeenCache::new()),
            cancel: CancellationToken::new(),
            state,
        })
    }

    /// Current lifecycle state
    pub fn state(&self) -> ClientState {
        *self.state.borrow()
    }

    /// Receiver notified on every lifecycle change
    pub fn subscribe_state(&self) -> watch::Receiver<ClientState> {
        self.state.subscribe()
    }

    /// Snapshot of the current configuration
    pub async fn config(&self) -> ClientConfig {
        self.config.read().await.clone()
    }

    /// Whether `kill` has been called
    pub fn is_killed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Register with the network once and persist the assigned identities
    pub async fn start(&self) -> Result<()> {
        self.start_with(&RetryPolicy::default()).await
    }

    async fn start_with(&self, policy: &RetryPolicy) -> Result<()> {
        let snapshot = self.config().await;
        let network = &self.network;
        let registered = policy
            .run(&self.cancel, "register", || {
                let mut candidate = snapshot.clone();
                async move {
                    network.register(&mut candidate).await?;
                    Ok::<_, TrixelError>(candidate)
                }
            })
            .await?;

        let sensor_ids: Vec<u32> = registered.sensors.iter().filter_map(|s| s.sensor_id).collect();
        self.store.save(&registered).await?;
        *self.config.write().await = registered;
        self.last_seen.lock().await.retain_sensors(&sensor_ids);

        info!(sensors = sensor_ids.len(), "Registered measurement station");
        Ok(())
    }

    /// Run the client with the default retry behaviour
    ///
    /// With `delete` the station is removed from the network instead of
    /// polling.
    pub async fn run(&self, polling_interval: Duration, delete: bool) -> Result<()> {
        let options = if delete {
            RunOptions::deletion()
        } else {
            RunOptions::polling(polling_interval)
        };
        self.run_with(options).await
    }

    pub async fn run_with(&self, options: RunOptions) -> Result<()> {
        let policy = options.retry_policy();
        if options.delete {
            return self.delete_station(&policy).await;
        }

        if self.cancel.is_cancelled() {
            debug!("Client killed before it started");
            self.state.send_replace(ClientState::Stopped);
            return Ok(());
        }

        let result = match polling::until_cancelled(&self.cancel, self.start_with(&policy)).await {
            Some(Ok(())) => {
                self.state.send_replace(ClientState::Running);
                info!(
                    interval = ?options.polling_interval,
                    "Contribution client running"
                );
                self.poll(options.polling_interval, &policy).await
            }
            Some(Err(e)) => Err(e),
            None => Ok(()),
        };

        self.state.send_replace(ClientState::Stopped);
        match &result {
            Ok(()) => info!("Contribution client stopped"),
            Err(e) => warn!("Contribution client stopped with error: {}", e),
        }
        result
    }

    async fn poll(&self, polling_interval: Duration, policy: &RetryPolicy) -> Result<()> {
        while !self.cancel.is_cancelled() {
            let batch = self.produce_updates().await;

            if batch.is_empty() {
                debug!("No new measurements this cycle");
            } else {
                let config = self.config().await;
                let network = &self.network;
                let published = polling::until_cancelled(
                    &self.cancel,
                    policy.run(&self.cancel, "publish", || network.publish(&config, &batch)),
                )
                .await;
                match published {
                    Some(result) => {
                        result?;
                        debug!(updates = batch.len(), "Published measurement batch");
                    }
                    None => break,
                }
            }

            if !polling::wait_or_cancel(&self.cancel, polling_interval).await {
                break;
            }
        }
        Ok(())
    }

    async fn delete_station(&self, policy: &RetryPolicy) -> Result<()> {
        let config = self.config().await;
        let network = &self.network;
        let result = policy
            .run(&self.cancel, "delete", || network.delete(&config))
            .await;
        self.state.send_replace(ClientState::Removed);
        result
    }

    /// Build this cycle's batch from the current host states
    ///
    /// A sensor whose state cannot be read or validated is skipped for this
    /// cycle only; unchanged readings are suppressed.
    pub async fn produce_updates(&self) -> MeasurementBatch {
        let config = self.config.read().await;
        let mut last_seen = self.last_seen.lock().await;
        let mut batch = MeasurementBatch::new();

        for sensor in &config.sensors {
            let Some(entity_id) = sensor.entity_id.as_deref() else {
                debug!(sensor_id = ?sensor.sensor_id, "Sensor is not linked to an entity");
                continue;
            };
            let Some(sensor_id) = sensor.sensor_id else {
                warn!(entity_id, "Entity cannot contribute before it is registered");
                continue;
            };
            let Some(state) = self.host.state(entity_id) else {
                warn!(
                    entity_id,
                    "Entity cannot contribute as its state could not be retrieved"
                );
                continue;
            };

            let value = match canonicalize(
                &state.state,
                state.unit_of_measurement.as_deref(),
                state.device_class.as_deref(),
                sensor.measurement_type,
            ) {
                Ok(value) => value,
                Err(reason) => {
                    warn!(entity_id, %reason, "Entity cannot contribute");
                    continue;
                }
            };

            let timestamp = state.reported_timestamp();
            if !last_seen.should_emit(sensor_id, timestamp) {
                continue;
            }
            batch.insert(sensor_id, MeasurementUpdate { timestamp, value });
        }

        batch
    }

    /// Stop the client; safe to call any number of times and from any state
    pub fn kill(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.cancel.cancel();
        self.state.send_if_modified(|state| match state {
            ClientState::Reconciled | ClientState::Running => {
                *state = ClientState::Stopped;
                true
            }
            _ => false,
        });
        debug!("Contribution client killed");
    }
}

impl Drop for ContributionClient {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
