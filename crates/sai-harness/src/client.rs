//! Configuration client that mirrors every accepted call into the topology
//! store.

use crate::topology::{Mutation, TopologyStore};
use async_trait::async_trait;
use parking_lot::RwLock;
use sai_api::*;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Wraps the device client. A call reaches the store only after the device
/// accepted it, so the store never holds an object the device refused.
#[derive(Clone)]
pub struct MirroredClient {
    inner: Arc<dyn ConfigClient>,
    store: Arc<RwLock<TopologyStore>>,
}

impl std::fmt::Debug for MirroredClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MirroredClient")
            .field("objects", &self.store.read().len())
            .finish()
    }
}

impl MirroredClient {
    pub fn new(inner: Arc<dyn ConfigClient>) -> Self {
        Self {
            inner,
            store: Arc::new(RwLock::new(TopologyStore::new())),
        }
    }

    /// Wraps `inner` and loads every object it already holds.
    pub async fn discover(inner: Arc<dyn ConfigClient>) -> SaiResult<Self> {
        let client = Self::new(inner);
        client.sync_from_device().await?;
        Ok(client)
    }

    pub fn store(&self) -> &Arc<RwLock<TopologyStore>> {
        &self.store
    }

    /// The unmirrored device client.
    pub fn device(&self) -> &Arc<dyn ConfigClient> {
        &self.inner
    }

    /// Rebuilds the store from the device's current object set.
    ///
    /// Objects are inserted in rounds, each round taking whatever has all
    /// its references in place, so device-assigned handle order does not
    /// matter.
    pub async fn sync_from_device(&self) -> SaiResult<()> {
        let mut pending = Vec::new();
        for kind in ObjectKind::ALL {
            for id in self.inner.get_all_handles(kind).await? {
                let spec = self.inner.get_object(id).await?;
                pending.push((id, spec));
            }
        }

        let mut store = TopologyStore::new();
        while !pending.is_empty() {
            let before = pending.len();
            pending.retain(|(id, spec)| {
                let ready = spec.references().iter().all(|r| store.contains(*r));
                // a rejected insert keeps the object pending and fails below
                !(ready && store.insert(*id, spec.clone()).is_ok())
            });
            if pending.len() == before {
                let (id, spec) = &pending[0];
                error!(
                    "MirroredClient: cannot place {} {:?}; {} objects unresolved",
                    spec.kind(),
                    id,
                    pending.len()
                );
                return Err(SaiError::invalid_parameter(format!(
                    "device holds {} {:?} whose references cannot be resolved",
                    spec.kind(),
                    id
                )));
            }
        }

        info!("MirroredClient: discovered {} objects", store.len());
        *self.store.write() = store;
        Ok(())
    }

    fn mirror(&self, mutation: Mutation) -> SaiResult<()> {
        let id = mutation.id();
        self.store.write().apply(mutation).map_err(|e| {
            error!("MirroredClient: device accepted {:?} but the model rejects it: {}", id, e);
            SaiError::Status {
                status: SaiStatus::Failure,
                context: format!("model diverged from device on {:?}: {}", id, e),
            }
        })
    }
}

#[async_trait]
impl ConfigClient for MirroredClient {
    async fn create(&self, spec: ObjectSpec) -> SaiResult<ObjectId> {
        let id = self.inner.create(spec.clone()).await?;
        debug!("MirroredClient: created {} {:?}", spec.kind(), id);
        self.mirror(Mutation::Create { id, spec })?;
        Ok(id)
    }

    async fn set_attribute(&self, id: ObjectId, update: AttrUpdate) -> SaiResult<()> {
        self.inner.set_attribute(id, update.clone()).await?;
        debug!("MirroredClient: set {:?} {}", id, update.name());
        self.mirror(Mutation::Set { id, update })
    }

    async fn remove(&self, id: ObjectId) -> SaiResult<()> {
        self.inner.remove(id).await?;
        debug!("MirroredClient: removed {:?}", id);
        self.mirror(Mutation::Remove { id })
    }

    async fn get_attribute(&self, id: ObjectId, attr: AttrId) -> SaiResult<AttrValue> {
        self.inner.get_attribute(id, attr).await
    }

    async fn get_object(&self, id: ObjectId) -> SaiResult<ObjectSpec> {
        self.inner.get_object(id).await
    }

    async fn get_counters(&self, id: ObjectId, counters: &[CounterId]) -> SaiResult<Vec<u64>> {
        self.inner.get_counters(id, counters).await
    }

    async fn clear_counters(&self, id: ObjectId, counters: &[CounterId]) -> SaiResult<()> {
        self.inner.clear_counters(id, counters).await
    }

    async fn get_all_handles(&self, kind: ObjectKind) -> SaiResult<Vec<ObjectId>> {
        self.inner.get_all_handles(kind).await
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use mockall::mock;

    mock! {
        pub Device {}

        #[async_trait]
        impl ConfigClient for Device {
            async fn create(&self, spec: ObjectSpec) -> SaiResult<ObjectId>;
            async fn set_attribute(&self, id: ObjectId, update: AttrUpdate) -> SaiResult<()>;
            async fn remove(&self, id: ObjectId) -> SaiResult<()>;
            async fn get_attribute(&self, id: ObjectId, attr: AttrId) -> SaiResult<AttrValue>;
            async fn get_object(&self, id: ObjectId) -> SaiResult<ObjectSpec>;
            async fn get_counters(&self, id: ObjectId, counters: &[CounterId]) -> SaiResult<Vec<u64>>;
            async fn clear_counters(&self, id: ObjectId, counters: &[CounterId]) -> SaiResult<()>;
            async fn get_all_handles(&self, kind: ObjectKind) -> SaiResult<Vec<ObjectId>>;
        }
    }

    /// A device pre-populated with a switch, one port, the default VRF and
    /// VLAN 1, reported in reverse dependency order.
    pub fn with_builtins(device: &mut MockDevice) -> Vec<(ObjectId, ObjectSpec)> {
        let cpu = PortOid::new_unchecked(ObjectId::compose(ObjectKind::Port, 1));
        let port = PortOid::new_unchecked(ObjectId::compose(ObjectKind::Port, 2));
        let vrf = VrfOid::new_unchecked(ObjectId::compose(ObjectKind::VirtualRouter, 1));
        let vlan = VlanOid::new_unchecked(ObjectId::compose(ObjectKind::Vlan, 1));
        let switch = ObjectId::compose(ObjectKind::Switch, 1);
        let objects = vec![
            (
                switch,
                ObjectSpec::Switch(SwitchAttrs {
                    src_mac: "00:77:66:55:44:00".parse().unwrap(),
                    cpu_port: cpu,
                    default_vrf: vrf,
                    default_vlan: vlan,
                }),
            ),
            (cpu.id(), PortAttrs::new(0).into()),
            (port.id(), PortAttrs::new(1).into()),
            (vrf.id(), VirtualRouterAttrs::default().into()),
            (vlan.id(), VlanAttrs::new(sai_types::VlanId::DEFAULT).into()),
        ];

        let listing = objects.clone();
        device.expect_get_all_handles().returning(move |kind| {
            Ok(listing
                .iter()
                .filter(|(_, s)| s.kind() == kind)
                .map(|(id, _)| *id)
                .collect())
        });
        let specs = objects.clone();
        device.expect_get_object().returning(move |id| {
            specs
                .iter()
                .find(|(oid, _)| *oid == id)
                .map(|(_, s)| s.clone())
                .ok_or_else(|| SaiError::not_found(id))
        });
        objects
    }
}

#[cfg(test)]
mod tests {
    use super::mock::{with_builtins, MockDevice};
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_discover_resolves_reference_order() {
        let mut device = MockDevice::new();
        let objects = with_builtins(&mut device);
        let client = MirroredClient::discover(Arc::new(device)).await.unwrap();

        let store = client.store().read();
        assert_eq!(store.len(), objects.len());
        assert!(store.switch().is_some());
    }

    #[tokio::test]
    async fn test_device_rejection_leaves_store_untouched() {
        let mut device = MockDevice::new();
        with_builtins(&mut device);
        device
            .expect_create()
            .returning(|_| Err(SaiError::from_status(SaiStatus::TableFull)));
        let client = MirroredClient::discover(Arc::new(device)).await.unwrap();
        let before = client.store().read().len();

        let err = client.create(LagAttrs::default().into()).await.unwrap_err();
        assert_eq!(err.status(), SaiStatus::TableFull);
        assert_eq!(client.store().read().len(), before);
    }

    #[tokio::test]
    async fn test_accepted_calls_are_mirrored() {
        let mut device = MockDevice::new();
        with_builtins(&mut device);
        let lag = ObjectId::compose(ObjectKind::Lag, 7);
        device.expect_create().returning(move |_| Ok(lag));
        device.expect_set_attribute().returning(|_, _| Ok(()));
        device.expect_remove().returning(|_| Ok(()));
        let client = MirroredClient::discover(Arc::new(device)).await.unwrap();

        assert_eq!(client.create(LagAttrs::default().into()).await.unwrap(), lag);
        let vid = sai_types::VlanId::new(10).unwrap();
        client
            .set_attribute(lag, AttrUpdate::PortVlanId(vid))
            .await
            .unwrap();
        assert_eq!(
            client.store().read().lag(LagOid::new_unchecked(lag)).map(|l| l.pvid),
            Some(vid)
        );

        client.remove(lag).await.unwrap();
        assert!(!client.store().read().contains(lag));
    }

    #[tokio::test]
    async fn test_model_divergence_is_reported() {
        let mut device = MockDevice::new();
        with_builtins(&mut device);
        // device accepts a member of a LAG that does not exist
        device
            .expect_create()
            .returning(|_| Ok(ObjectId::compose(ObjectKind::LagMember, 1)));
        let client = MirroredClient::discover(Arc::new(device)).await.unwrap();

        let spec = LagMemberAttrs::new(
            LagOid::new_unchecked(ObjectId::compose(ObjectKind::Lag, 99)),
            PortOid::new_unchecked(ObjectId::compose(ObjectKind::Port, 2)),
        );
        let err = client.create(spec.into()).await.unwrap_err();
        assert_eq!(err.status(), SaiStatus::Failure);
    }
}
