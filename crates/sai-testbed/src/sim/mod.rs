//! In-process SAI switch.
//!
//! The simulated switch keeps two copies of its configuration. The control
//! copy answers configuration calls and is updated synchronously. The
//! dataplane copy is what forwarding runs against. With a non-zero
//! `apply_delay` every accepted change reaches the dataplane later, in
//! order, from a background worker, the way a real device programs its
//! ASIC after acknowledging a call.

mod dataplane;

pub use dataplane::Fault;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use sai_api::*;
use sai_harness::config::HarnessSettings;
use sai_harness::oracle::Oracle;
use sai_harness::topology::{Mutation, TopologyStore};
use sai_harness::traffic::ObservedFrame;
use sai_types::{MacAddress, VlanId};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

/// Debug counter slots a simulated switch offers.
pub const DEBUG_COUNTER_SLOTS: u32 = 16;

#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    /// Front-panel ports, in addition to the CPU port.
    pub ports: u32,
    pub router_mac: MacAddress,
    /// Seed mixed into the flow hash.
    pub seed: u64,
    /// Lag between acknowledging a change and forwarding with it.
    pub apply_delay: Duration,
    pub debug_counter_slots: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self::from_settings(&HarnessSettings::default())
    }
}

impl SimConfig {
    pub fn from_settings(settings: &HarnessSettings) -> Self {
        Self {
            ports: settings.target.ports,
            router_mac: settings.target.router_mac,
            seed: settings.load_balance.seed,
            apply_delay: Duration::ZERO,
            debug_counter_slots: DEBUG_COUNTER_SLOTS,
        }
    }

    pub fn with_apply_delay(mut self, delay: Duration) -> Self {
        self.apply_delay = delay;
        self
    }
}

struct Inner {
    config: SimConfig,
    control: RwLock<TopologyStore>,
    dataplane: Arc<RwLock<TopologyStore>>,
    next_index: Mutex<HashMap<ObjectKind, u64>>,
    /// Debug counter handle to device index.
    counter_index: Mutex<BTreeMap<ObjectId, u32>>,
    counters: Mutex<HashMap<(ObjectId, CounterId), u64>>,
    updates: Option<mpsc::UnboundedSender<Mutation>>,
    pending: Arc<AtomicUsize>,
    tx: broadcast::Sender<ObservedFrame>,
    cpu_port: PortOid,
    front_ports: Vec<PortOid>,
    oracle: Oracle,
    fault: Mutex<Option<Fault>>,
}

/// Cheap to clone; clones share one device.
#[derive(Clone)]
pub struct SimulatedSwitch {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SimulatedSwitch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedSwitch")
            .field("ports", &self.inner.front_ports.len())
            .field("objects", &self.inner.control.read().len())
            .finish()
    }
}

impl SimulatedSwitch {
    /// Brings up a switch with its CPU port, front-panel ports, the default
    /// VRF and VLAN 1. A non-zero apply delay needs a running tokio runtime.
    pub fn new(config: SimConfig) -> SaiResult<Self> {
        let mut next_index: HashMap<ObjectKind, u64> = HashMap::new();
        let mut alloc = |kind: ObjectKind| {
            let n = next_index.entry(kind).or_insert(1);
            let id = ObjectId::compose(kind, *n);
            *n += 1;
            id
        };

        let mut store = TopologyStore::new();
        let cpu_port = PortOid::new_unchecked(alloc(ObjectKind::Port));
        store.insert(cpu_port.id(), PortAttrs::new(0).into())?;
        let mut front_ports = Vec::with_capacity(config.ports as usize);
        for lane in 1..=config.ports {
            let port = PortOid::new_unchecked(alloc(ObjectKind::Port));
            store.insert(port.id(), PortAttrs::new(lane).into())?;
            front_ports.push(port);
        }
        let vrf = VrfOid::new_unchecked(alloc(ObjectKind::VirtualRouter));
        store.insert(vrf.id(), VirtualRouterAttrs::default().into())?;
        let vlan = VlanOid::new_unchecked(alloc(ObjectKind::Vlan));
        store.insert(vlan.id(), VlanAttrs::new(VlanId::DEFAULT).into())?;
        let switch = alloc(ObjectKind::Switch);
        store.insert(
            switch,
            ObjectSpec::Switch(SwitchAttrs {
                src_mac: config.router_mac,
                cpu_port,
                default_vrf: vrf,
                default_vlan: vlan,
            }),
        )?;

        let dataplane = Arc::new(RwLock::new(store.clone()));
        let pending = Arc::new(AtomicUsize::new(0));
        let updates = if config.apply_delay.is_zero() {
            None
        } else {
            let (tx, rx) = mpsc::unbounded_channel();
            tokio::spawn(apply_worker(
                rx,
                dataplane.clone(),
                pending.clone(),
                config.apply_delay,
            ));
            Some(tx)
        };
        let (tx, _) = broadcast::channel(4096);

        info!(
            "SimulatedSwitch: up with {} ports, router MAC {}",
            front_ports.len(),
            config.router_mac
        );
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                control: RwLock::new(store),
                dataplane,
                next_index: Mutex::new(next_index),
                counter_index: Mutex::new(BTreeMap::new()),
                counters: Mutex::new(HashMap::new()),
                updates,
                pending,
                tx,
                cpu_port,
                front_ports,
                oracle: Oracle::new(),
                fault: Mutex::new(None),
            }),
        })
    }

    /// Front-panel ports in lane order.
    pub fn ports(&self) -> &[PortOid] {
        &self.inner.front_ports
    }

    pub fn router_mac(&self) -> MacAddress {
        self.inner.config.router_mac
    }

    /// Makes the dataplane misbehave until cleared with `None`.
    pub fn inject_fault(&self, fault: Option<Fault>) {
        if let Some(f) = &fault {
            warn!("SimulatedSwitch: injecting fault {:?}", f);
        }
        *self.inner.fault.lock() = fault;
    }

    /// Waits until every acknowledged change has reached the dataplane.
    pub async fn quiesce(&self) {
        while self.inner.pending.load(Ordering::SeqCst) > 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    fn allocate(&self, kind: ObjectKind) -> ObjectId {
        let mut next = self.inner.next_index.lock();
        let n = next.entry(kind).or_insert(1);
        let id = ObjectId::compose(kind, *n);
        *n += 1;
        id
    }

    fn publish(&self, mutation: Mutation) {
        match &self.inner.updates {
            Some(tx) => {
                self.inner.pending.fetch_add(1, Ordering::SeqCst);
                if tx.send(mutation).is_err() {
                    self.inner.pending.fetch_sub(1, Ordering::SeqCst);
                    warn!("SimulatedSwitch: apply worker gone");
                }
            }
            None => {
                if let Err(e) = self.inner.dataplane.write().apply(mutation) {
                    warn!("SimulatedSwitch: dataplane rejected change: {}", e);
                }
            }
        }
    }

    fn assign_counter_index(&self, id: ObjectId) -> SaiResult<u32> {
        let mut indexes = self.inner.counter_index.lock();
        let free = (0..self.inner.config.debug_counter_slots)
            .find(|i| !indexes.values().any(|used| used == i))
            .ok_or_else(|| SaiError::from_status(SaiStatus::TableFull))?;
        indexes.insert(id, free);
        Ok(free)
    }

    fn release_counter_index(&self, id: ObjectId, spec: &ObjectSpec) {
        let Some(index) = self.inner.counter_index.lock().remove(&id) else {
            return;
        };
        if let ObjectSpec::DebugCounter(a) = spec {
            let stat = CounterId::for_debug_counter(a.stage, index);
            self.inner.counters.lock().retain(|(_, s), _| *s != stat);
        }
    }

    fn bump(&self, object: ObjectId, stat: CounterId, by: u64) {
        *self.inner.counters.lock().entry((object, stat)).or_insert(0) += by;
    }
}

async fn apply_worker(
    mut rx: mpsc::UnboundedReceiver<Mutation>,
    dataplane: Arc<RwLock<TopologyStore>>,
    pending: Arc<AtomicUsize>,
    delay: Duration,
) {
    while let Some(mutation) = rx.recv().await {
        tokio::time::sleep(delay).await;
        if let Err(e) = dataplane.write().apply(mutation) {
            warn!("SimulatedSwitch: dataplane rejected change: {}", e);
        }
        pending.fetch_sub(1, Ordering::SeqCst);
    }
    debug!("SimulatedSwitch: apply worker stopped");
}

#[async_trait]
impl ConfigClient for SimulatedSwitch {
    async fn create(&self, spec: ObjectSpec) -> SaiResult<ObjectId> {
        let kind = spec.kind();
        if kind.is_builtin() {
            return Err(SaiError::invalid_parameter(format!(
                "{} objects are created by the device",
                kind
            )));
        }
        let id = {
            let mut control = self.inner.control.write();
            control.validate_create(&spec)?;
            let id = self.allocate(kind);
            if kind == ObjectKind::DebugCounter {
                self.assign_counter_index(id)?;
            }
            if let Err(e) = control.insert(id, spec.clone()) {
                self.release_counter_index(id, &spec);
                return Err(e);
            }
            id
        };
        debug!("SimulatedSwitch: created {} {:?}", kind, id);
        self.publish(Mutation::Create { id, spec });
        Ok(id)
    }

    async fn set_attribute(&self, id: ObjectId, update: AttrUpdate) -> SaiResult<()> {
        self.inner.control.write().update(id, &update)?;
        self.publish(Mutation::Set { id, update });
        Ok(())
    }

    async fn remove(&self, id: ObjectId) -> SaiResult<()> {
        let removed = self.inner.control.write().remove(id)?;
        self.release_counter_index(id, &removed.spec);
        self.publish(Mutation::Remove { id });
        Ok(())
    }

    async fn get_attribute(&self, id: ObjectId, attr: AttrId) -> SaiResult<AttrValue> {
        let control = self.inner.control.read();
        let spec = control.get(id).ok_or_else(|| SaiError::not_found(id))?;
        let value = match (spec, attr) {
            (ObjectSpec::DebugCounter(_), AttrId::DebugCounterIndex) => self
                .inner
                .counter_index
                .lock()
                .get(&id)
                .copied()
                .map(AttrValue::U32),
            (ObjectSpec::Switch(s), AttrId::CpuPort) => Some(AttrValue::Oid(s.cpu_port.id())),
            (ObjectSpec::Switch(s), AttrId::DefaultVirtualRouter) => {
                Some(AttrValue::Oid(s.default_vrf.id()))
            }
            (ObjectSpec::Switch(s), AttrId::DefaultVlan) => {
                Some(AttrValue::Oid(s.default_vlan.id()))
            }
            (ObjectSpec::Switch(s), AttrId::SrcMac) => Some(AttrValue::Mac(s.src_mac)),
            (ObjectSpec::Port(p), AttrId::PortLane) => Some(AttrValue::U32(p.lane)),
            _ => None,
        };
        value.ok_or_else(|| SaiError::invalid_attribute(spec.kind(), format!("{:?}", attr)))
    }

    async fn get_object(&self, id: ObjectId) -> SaiResult<ObjectSpec> {
        self.inner
            .control
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| SaiError::not_found(id))
    }

    async fn get_counters(&self, id: ObjectId, counters: &[CounterId]) -> SaiResult<Vec<u64>> {
        if !self.inner.control.read().contains(id) {
            return Err(SaiError::not_found(id));
        }
        let values = self.inner.counters.lock();
        Ok(counters
            .iter()
            .map(|c| values.get(&(id, *c)).copied().unwrap_or(0))
            .collect())
    }

    async fn clear_counters(&self, id: ObjectId, counters: &[CounterId]) -> SaiResult<()> {
        if !self.inner.control.read().contains(id) {
            return Err(SaiError::not_found(id));
        }
        let mut values = self.inner.counters.lock();
        for c in counters {
            values.remove(&(id, *c));
        }
        Ok(())
    }

    async fn get_all_handles(&self, kind: ObjectKind) -> SaiResult<Vec<ObjectId>> {
        Ok(self.inner.control.read().objects_of_kind(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sim() -> SimulatedSwitch {
        SimulatedSwitch::new(SimConfig {
            ports: 4,
            ..SimConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_builtins() {
        let sim = sim();
        assert_eq!(sim.ports().len(), 4);
        let ports = sim.get_all_handles(ObjectKind::Port).await.unwrap();
        assert_eq!(ports.len(), 5);
        let switch = sim.get_all_handles(ObjectKind::Switch).await.unwrap()[0];
        let cpu = sim.get_attribute(switch, AttrId::CpuPort).await.unwrap();
        assert_eq!(cpu.as_oid(), Some(sim.inner.cpu_port.id()));
        let lane = sim
            .get_attribute(sim.ports()[2].id(), AttrId::PortLane)
            .await
            .unwrap();
        assert_eq!(lane.as_u32(), Some(3));
    }

    #[tokio::test]
    async fn test_statuses() {
        let sim = sim();
        let err = sim.create(PortAttrs::new(9).into()).await.unwrap_err();
        assert_eq!(err.status(), SaiStatus::InvalidParameter);

        let vlan = sim
            .create(VlanAttrs::new(VlanId::new(10).unwrap()).into())
            .await
            .unwrap();
        let dup = sim
            .create(VlanAttrs::new(VlanId::new(10).unwrap()).into())
            .await
            .unwrap_err();
        assert_eq!(dup.status(), SaiStatus::ItemAlreadyExists);

        sim.create(
            VlanMemberAttrs {
                vlan: VlanOid::new_unchecked(vlan),
                port: L2Port::Port(sim.ports()[0]),
                tagging: Tagging::Tagged,
            }
            .into(),
        )
        .await
        .unwrap();
        let busy = sim.remove(vlan).await.unwrap_err();
        assert_eq!(busy.status(), SaiStatus::ObjectInUse);

        let gone = sim
            .remove(ObjectId::compose(ObjectKind::Lag, 99))
            .await
            .unwrap_err();
        assert_eq!(gone.status(), SaiStatus::ItemNotFound);
    }

    #[tokio::test]
    async fn test_debug_counter_indexes_reuse_lowest_free() {
        let sim = sim();
        let attrs = || -> ObjectSpec {
            DebugCounterAttrs {
                scope: CounterScope::Port,
                stage: CounterStage::Ingress,
                reasons: vec![DropReason::TtlError],
            }
            .into()
        };
        let a = sim.create(attrs()).await.unwrap();
        let b = sim.create(attrs()).await.unwrap();
        let index = |id| {
            let sim = sim.clone();
            async move {
                sim.get_attribute(id, AttrId::DebugCounterIndex)
                    .await
                    .unwrap()
                    .as_u32()
            }
        };
        assert_eq!(index(a).await, Some(0));
        assert_eq!(index(b).await, Some(1));
        sim.remove(a).await.unwrap();
        let c = sim.create(attrs()).await.unwrap();
        assert_eq!(index(c).await, Some(0));
    }

    #[tokio::test]
    async fn test_counter_slots_exhaust() {
        let sim = SimulatedSwitch::new(SimConfig {
            ports: 1,
            debug_counter_slots: 1,
            ..SimConfig::default()
        })
        .unwrap();
        let spec: ObjectSpec = DebugCounterAttrs {
            scope: CounterScope::Switch,
            stage: CounterStage::Ingress,
            reasons: vec![DropReason::LpmMiss],
        }
        .into();
        sim.create(spec.clone()).await.unwrap();
        let err = sim.create(spec).await.unwrap_err();
        assert_eq!(err.status(), SaiStatus::TableFull);
    }

    #[tokio::test]
    async fn test_apply_delay_reaches_dataplane_in_order() {
        let sim = SimulatedSwitch::new(
            SimConfig {
                ports: 2,
                ..SimConfig::default()
            }
            .with_apply_delay(Duration::from_millis(5)),
        )
        .unwrap();
        let lag = sim.create(LagAttrs::default().into()).await.unwrap();
        sim.set_attribute(lag, AttrUpdate::PortVlanId(VlanId::new(20).unwrap()))
            .await
            .unwrap();
        assert!(sim.inner.control.read().contains(lag));

        sim.quiesce().await;
        let dp = sim.inner.dataplane.read();
        assert_eq!(
            dp.lag(LagOid::new_unchecked(lag)).map(|l| l.pvid),
            Some(VlanId::new(20).unwrap())
        );
    }
}
