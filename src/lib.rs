//! Trixel contribution client
//!
//! Contributes outdoor temperature and relative humidity readings from a home
//! automation host to a privacy-preserving Trixel sensor network.
//!
//! # Features
//!
//! - Reconciles the persisted sensor set with the user's current selection
//! - Validates device class and unit and converts readings to Celsius
//! - Suppresses readings whose report timestamp has not changed
//! - Polls on a fixed interval with cancellable waits and restartable entries
//! - Removes the station from the network when an entry is deleted

// Core modules
pub mod client;
pub mod config;
pub mod entry;
pub mod error;
pub mod host;
pub mod logging;
pub mod measurement;
pub mod network;
pub mod services;
pub mod storage;

// Test support modules - available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

// Re-export main types for convenience
pub use client::{ClientState, ContributionClient};
pub use config::{ClientConfig, Coordinate, EntryData, EntryOptions, Sensor};
pub use entry::{remove_entry, setup_entry, supervise, EntryContext, RunningEntry};
pub use error::{Result, TrixelError};
pub use host::{EntityState, HostContext, InMemoryHost};
pub use measurement::MeasurementType;
pub use network::{MeasurementBatch, MeasurementNetwork, MeasurementUpdate, OfflineNetwork};
pub use storage::{ConfigStore, JsonFileStore, MemoryStore};
