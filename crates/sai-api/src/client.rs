//! The device configuration boundary.

use crate::attr::ObjectSpec;
use crate::counter::CounterId;
use crate::error::SaiResult;
use crate::types::{ObjectId, ObjectKind};
use crate::update::{AttrId, AttrUpdate, AttrValue};
use async_trait::async_trait;

/// Object-configuration API of the device under test.
///
/// Each call is individually atomic: a concurrent reader never observes a
/// partially applied create, set or remove.
#[async_trait]
pub trait ConfigClient: Send + Sync {
    /// Creates an object and returns its handle.
    async fn create(&self, spec: ObjectSpec) -> SaiResult<ObjectId>;

    async fn set_attribute(&self, id: ObjectId, update: AttrUpdate) -> SaiResult<()>;

    /// Removes an object. Fails with `ObjectInUse` while dependents exist.
    async fn remove(&self, id: ObjectId) -> SaiResult<()>;

    async fn get_attribute(&self, id: ObjectId, attr: AttrId) -> SaiResult<AttrValue>;

    /// Returns the full current configuration of an object.
    async fn get_object(&self, id: ObjectId) -> SaiResult<ObjectSpec>;

    /// Reads counters; values are returned in request order.
    async fn get_counters(&self, id: ObjectId, counters: &[CounterId]) -> SaiResult<Vec<u64>>;

    async fn clear_counters(&self, id: ObjectId, counters: &[CounterId]) -> SaiResult<()>;

    async fn get_all_handles(&self, kind: ObjectKind) -> SaiResult<Vec<ObjectId>>;
}
