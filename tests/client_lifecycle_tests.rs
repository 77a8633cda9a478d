//! Client lifecycle tests: creation, reconciliation on restart, polling and
//! removal

mod common;

use common::*;
use pretty_assertions::assert_eq;
use rstest::{fixture, rstest};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use trixel_contribution_client::config::{DEFAULT_HOME_LATITUDE, DEFAULT_HOME_LONGITUDE};
use trixel_contribution_client::entry::{setup_entry, STARTUP_GRACE};
use trixel_contribution_client::{
    remove_entry, ClientState, ConfigStore, ContributionClient, Coordinate, EntryContext,
    InMemoryHost, JsonFileStore, MeasurementType, MemoryStore, OfflineNetwork, TrixelError,
};

#[fixture]
fn storage_dir() -> TempDir {
    tempfile::tempdir().unwrap()
}

#[rstest]
#[case(None)]
#[case(Some(Coordinate::new(0.0, 0.0)))]
#[case(Some(Coordinate::new(DEFAULT_HOME_LATITUDE, DEFAULT_HOME_LONGITUDE)))]
#[tokio::test]
async fn test_no_home_is_checked_before_storage(#[case] location: Option<Coordinate>) {
    let store = Arc::new(MemoryStore::new());
    let result = ContributionClient::create(
        Arc::new(InMemoryHost::new(location)),
        store.clone(),
        Arc::new(OfflineNetwork::new()),
        Some(&data()),
        Some(&options(&["sensor.t"], &[])),
    )
    .await;

    assert!(matches!(result, Err(TrixelError::NoHome)));
    assert_eq!(store.load_count(), 0);
    assert_eq!(store.save_count(), 0);
}

#[tokio::test]
async fn test_no_existing_configuration_without_input() {
    let result = ContributionClient::create(
        host(),
        Arc::new(MemoryStore::new()),
        Arc::new(OfflineNetwork::new()),
        None,
        Some(&options(&["sensor.t"], &[])),
    )
    .await;
    assert!(matches!(result, Err(TrixelError::NoExistingConfiguration)));
}

#[rstest]
#[tokio::test]
async fn test_restart_reconciles_stored_sensors(storage_dir: TempDir) {
    let store = Arc::new(JsonFileStore::new(storage_dir.path()));
    let network = Arc::new(OfflineNetwork::new());

    let first = ContributionClient::create(
        host(),
        store.clone(),
        network.clone(),
        Some(&data()),
        Some(&options(&["sensor.a"], &[])),
    )
    .await
    .unwrap();
    first.start().await.unwrap();
    let registered = first.config().await;
    first.kill();

    // Restart with a widened selection; only the new sensor is added
    let second = ContributionClient::create(
        host(),
        store.clone(),
        network,
        None,
        Some(&options(&["sensor.a", "sensor.b"], &[])),
    )
    .await
    .unwrap();

    let config = store.load().await.unwrap().unwrap();
    assert_eq!(config, second.config().await);
    assert_eq!(config.ms_config, registered.ms_config);
    assert_eq!(config.sensors.len(), 2);
    assert_eq!(
        config.sensors[0].sensor_id,
        registered.sensors[0].sensor_id,
        "existing sensor keeps its network id"
    );
    assert_eq!(config.sensors[1].entity_id.as_deref(), Some("sensor.b"));
    assert_eq!(config.sensors[1].sensor_id, None);
}

#[rstest]
#[tokio::test]
async fn test_deselecting_all_of_one_type(storage_dir: TempDir) {
    let store = Arc::new(JsonFileStore::new(storage_dir.path()));
    ContributionClient::create(
        host(),
        store.clone(),
        Arc::new(OfflineNetwork::new()),
        Some(&data()),
        Some(&options(&["sensor.t"], &["sensor.h1", "sensor.h2"])),
    )
    .await
    .unwrap();

    ContributionClient::create(
        host(),
        store.clone(),
        Arc::new(OfflineNetwork::new()),
        None,
        Some(&options(&["sensor.t"], &[])),
    )
    .await
    .unwrap();

    let config = store.load().await.unwrap().unwrap();
    assert_eq!(config.sensors.len(), 1);
    assert_eq!(
        config.sensors[0].measurement_type,
        MeasurementType::AmbientTemperature
    );
}

#[tokio::test]
async fn test_restart_refreshes_location() {
    let store = Arc::new(MemoryStore::new());
    let host = host();
    ContributionClient::create(
        host.clone(),
        store.clone(),
        Arc::new(OfflineNetwork::new()),
        Some(&data()),
        Some(&options(&["sensor.t"], &[])),
    )
    .await
    .unwrap();

    host.set_location(Some(Coordinate::new(50.0, 8.0)));
    let client = ContributionClient::create(
        host,
        store,
        Arc::new(OfflineNetwork::new()),
        None,
        None,
    )
    .await
    .unwrap();
    assert_eq!(client.config().await.location, Coordinate::new(50.0, 8.0));
}

#[tokio::test(start_paused = true)]
async fn test_polling_publishes_each_interval() {
    let host = host();
    host.set_state("sensor.t", celsius("20", 100));
    let network = RecordingNetwork::new();
    let client = Arc::new(
        ContributionClient::create(
            host.clone(),
            Arc::new(MemoryStore::new()),
            network.clone(),
            Some(&data()),
            Some(&options(&["sensor.t"], &[])),
        )
        .await
        .unwrap(),
    );

    let task = {
        let client = client.clone();
        tokio::spawn(async move { client.run(Duration::from_secs(60), false).await })
    };

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(network.batches().len(), 1);

    // Same report timestamp: the next tick has nothing to publish
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(network.batches().len(), 1);

    host.set_state("sensor.t", celsius("21", 160));
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(network.batches().len(), 2);

    client.kill();
    task.await.unwrap().unwrap();
    assert_eq!(client.state(), ClientState::Stopped);
}

#[tokio::test]
async fn test_run_surfaces_registration_failure() {
    let client = ContributionClient::create(
        host(),
        Arc::new(MemoryStore::new()),
        Arc::new(UnreachableNetwork),
        Some(&data()),
        Some(&options(&["sensor.t"], &[])),
    )
    .await
    .unwrap();

    let result = client.run(Duration::from_secs(60), false).await;
    assert!(matches!(result, Err(TrixelError::Network(_))));
}

#[tokio::test(start_paused = true)]
async fn test_setup_entry_fails_synchronously() {
    let ctx = EntryContext::new(
        host(),
        Arc::new(MemoryStore::new()),
        Arc::new(UnreachableNetwork),
    );
    let result = setup_entry(&ctx, &data(), &options(&["sensor.t"], &[]), STARTUP_GRACE).await;
    assert!(matches!(result, Err(TrixelError::NotReady(_))));
}

#[rstest]
#[tokio::test]
async fn test_remove_entry_deletes_station_and_document(storage_dir: TempDir) {
    let store = Arc::new(JsonFileStore::new(storage_dir.path()));
    ContributionClient::create(
        host(),
        store.clone(),
        Arc::new(OfflineNetwork::new()),
        Some(&data()),
        Some(&options(&["sensor.t"], &[])),
    )
    .await
    .unwrap();
    assert!(store.path().exists());

    let network = RecordingNetwork::new();
    let ctx = EntryContext::new(host(), store.clone(), network.clone());
    remove_entry(&ctx).await.unwrap();

    assert_eq!(network.deletions(), 1);
    assert!(network.batches().is_empty());
    assert!(!store.path().exists());
}

#[rstest]
#[tokio::test]
async fn test_remove_entry_survives_unreachable_network(storage_dir: TempDir) {
    let store = Arc::new(JsonFileStore::new(storage_dir.path()));
    ContributionClient::create(
        host(),
        store.clone(),
        Arc::new(OfflineNetwork::new()),
        Some(&data()),
        Some(&options(&["sensor.t"], &[])),
    )
    .await
    .unwrap();

    let ctx = EntryContext::new(host(), store.clone(), Arc::new(UnreachableNetwork));
    remove_entry(&ctx).await.unwrap();
    assert!(store.load().await.unwrap().is_none());
}
