//! Topology store: the harness's model of what is configured on the device.

mod lpm;
mod snapshot;
mod store;

pub use lpm::RouteTable;
pub use snapshot::{SnapshotEntry, TopologySnapshot};
pub use store::{Mutation, StoredObject, TopologyStore};
