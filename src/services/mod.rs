//! Pure services behind the contribution client
//!
//! None of these touch storage, the host or the network; the client in
//! [`crate::client`] wires them together.

pub mod canonicalize;
pub mod measurement_cache;
pub mod reconcile;

pub use canonicalize::{canonicalize, RejectReason, ABSENT_STATES};
pub use measurement_cache::LastSeenCache;
pub use reconcile::{reconcile, DesiredSensors, SensorDiff};
