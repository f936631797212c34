//! In-memory mirror of the device's configured objects.

use super::lpm::RouteTable;
use super::snapshot::{SnapshotEntry, TopologySnapshot};
use sai_api::*;
use sai_types::{IpAddr, MacAddress, VlanId};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// A configured object as the store holds it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub id: ObjectId,
    pub spec: ObjectSpec,
    /// Creation sequence number; orders teardown and member lists.
    pub seq: u64,
}

/// One successful client call, replayable against a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Create { id: ObjectId, spec: ObjectSpec },
    Set { id: ObjectId, update: AttrUpdate },
    Remove { id: ObjectId },
}

impl Mutation {
    pub fn id(&self) -> ObjectId {
        match self {
            Mutation::Create { id, .. } | Mutation::Set { id, .. } | Mutation::Remove { id } => *id,
        }
    }
}

/// Entity graph with the indexes the oracle queries.
///
/// The store enforces the creation DAG: an object can only be created when
/// everything it references exists, and only removed when nothing
/// references it. All lookups go through keyed indexes, so the answer for a
/// fully populated chain never depends on insertion order, and a removed
/// handle is gone from every index.
#[derive(Debug, Default, Clone)]
pub struct TopologyStore {
    objects: HashMap<ObjectId, StoredObject>,
    dependents: HashMap<ObjectId, BTreeSet<ObjectId>>,
    keys: HashMap<UniqueKey, ObjectId>,
    routes: RouteTable,
    switch: Option<SwitchOid>,
    next_seq: u64,
}

macro_rules! typed_getter {
    ($(#[$doc:meta])* $name:ident, $oid:ty, $variant:ident, $attrs:ty) => {
        $(#[$doc])*
        pub fn $name(&self, id: $oid) -> Option<&$attrs> {
            match self.get(id.id()) {
                Some(ObjectSpec::$variant(a)) => Some(a),
                _ => None,
            }
        }
    };
}

impl TopologyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.contains_key(&id)
    }

    pub fn get(&self, id: ObjectId) -> Option<&ObjectSpec> {
        self.objects.get(&id).map(|o| &o.spec)
    }

    pub fn object(&self, id: ObjectId) -> Option<&StoredObject> {
        self.objects.get(&id)
    }

    // ===== validation =====

    /// Checks that `spec` could be created now.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` for invalid values or a missing referenced object,
    /// `ItemAlreadyExists` if the natural key is taken.
    pub fn validate_create(&self, spec: &ObjectSpec) -> SaiResult<()> {
        spec.validate()?;
        self.check_references(spec)?;
        if let Some(key) = spec.unique_key() {
            if self.keys.contains_key(&key) {
                return Err(SaiError::already_exists(key.to_string()));
            }
        }
        self.check_semantics(spec)
    }

    /// Checks that `update` can be applied to `id`, returning the resulting
    /// spec and the inverse update.
    pub fn validate_set(
        &self,
        id: ObjectId,
        update: &AttrUpdate,
    ) -> SaiResult<(ObjectSpec, AttrUpdate)> {
        let mut spec = self.get(id).cloned().ok_or_else(|| SaiError::not_found(id))?;
        let previous = spec.apply(update)?;
        self.check_references(&spec)?;
        Ok((spec, previous))
    }

    /// Checks that `id` could be removed now.
    ///
    /// # Errors
    ///
    /// `ItemNotFound` if absent, `ObjectInUse` if anything references it,
    /// `InvalidParameter` for device-owned objects.
    pub fn validate_remove(&self, id: ObjectId) -> SaiResult<()> {
        let obj = self.objects.get(&id).ok_or_else(|| SaiError::not_found(id))?;
        if obj.spec.kind().is_builtin() {
            return Err(SaiError::invalid_parameter(format!(
                "{} {:?} is owned by the device",
                obj.spec.kind(),
                id
            )));
        }
        let dependents = self.dependents.get(&id).map_or(0, BTreeSet::len);
        if dependents > 0 {
            return Err(SaiError::in_use(id, dependents));
        }
        Ok(())
    }

    fn check_references(&self, spec: &ObjectSpec) -> SaiResult<()> {
        for r in spec.references() {
            if !self.objects.contains_key(&r) {
                return Err(SaiError::invalid_parameter(format!(
                    "{} references missing object {:?}",
                    spec.kind(),
                    r
                )));
            }
        }
        Ok(())
    }

    fn check_semantics(&self, spec: &ObjectSpec) -> SaiResult<()> {
        match spec {
            ObjectSpec::RouterInterface(a) if a.is_virtual => {
                if a.src_mac.is_none() {
                    return Err(SaiError::invalid_parameter(
                        "virtual router interface requires a MAC",
                    ));
                }
                Ok(())
            }
            ObjectSpec::NextHopGroupMember(a) => match self.next_hop(a.next_hop) {
                Some(nh) if nh.nh_type == NextHopType::Regular => Ok(()),
                _ => Err(SaiError::invalid_parameter(
                    "group members must be regular nexthops",
                )),
            },
            ObjectSpec::FdbEntry(a) => match a.port {
                L2Port::Port(p) if self.lag_of(p).is_some() => Err(SaiError::invalid_parameter(
                    format!("{} is a LAG member", p),
                )),
                _ => Ok(()),
            },
            _ => Ok(()),
        }
    }

    // ===== mutation =====

    /// Applies a mutation the device has already accepted.
    pub fn apply(&mut self, mutation: Mutation) -> SaiResult<()> {
        match mutation {
            Mutation::Create { id, spec } => self.insert(id, spec),
            Mutation::Set { id, update } => self.update(id, &update).map(|_| ()),
            Mutation::Remove { id } => self.remove(id).map(|_| ()),
        }
    }

    /// Inserts an object under a device-assigned handle.
    pub fn insert(&mut self, id: ObjectId, spec: ObjectSpec) -> SaiResult<()> {
        if self.objects.contains_key(&id) {
            return Err(SaiError::already_exists(format!("{:?}", id)));
        }
        self.validate_create(&spec)?;
        debug!("TopologyStore: insert {:?} {:?}", id, spec);

        self.index(id, &spec);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.objects.insert(id, StoredObject { id, spec, seq });
        Ok(())
    }

    /// Applies an attribute update, returning the inverse update.
    pub fn update(&mut self, id: ObjectId, update: &AttrUpdate) -> SaiResult<AttrUpdate> {
        let (spec, previous) = self.validate_set(id, update)?;
        debug!("TopologyStore: set {:?} {:?}", id, update);

        if let Some(obj) = self.objects.get(&id) {
            let old = obj.spec.clone();
            self.unindex(id, &old);
        }
        self.index(id, &spec);
        if let Some(obj) = self.objects.get_mut(&id) {
            obj.spec = spec;
        }
        Ok(previous)
    }

    pub fn remove(&mut self, id: ObjectId) -> SaiResult<StoredObject> {
        self.validate_remove(id)?;
        debug!("TopologyStore: remove {:?}", id);
        let obj = self.objects.remove(&id).ok_or_else(|| SaiError::not_found(id))?;
        self.unindex(id, &obj.spec);
        self.dependents.remove(&id);
        Ok(obj)
    }

    fn index(&mut self, id: ObjectId, spec: &ObjectSpec) {
        for r in spec.references() {
            self.dependents.entry(r).or_default().insert(id);
        }
        if let Some(key) = spec.unique_key() {
            self.keys.insert(key, id);
        }
        match spec {
            ObjectSpec::Route(a) => {
                self.routes
                    .insert(a.vrf, a.prefix, RouteOid::new_unchecked(id));
            }
            ObjectSpec::Switch(_) => self.switch = Some(SwitchOid::new_unchecked(id)),
            _ => {}
        }
    }

    fn unindex(&mut self, id: ObjectId, spec: &ObjectSpec) {
        for r in spec.references() {
            if let Some(set) = self.dependents.get_mut(&r) {
                set.remove(&id);
                if set.is_empty() {
                    self.dependents.remove(&r);
                }
            }
        }
        if let Some(key) = spec.unique_key() {
            if self.keys.get(&key) == Some(&id) {
                self.keys.remove(&key);
            }
        }
        match spec {
            ObjectSpec::Route(a) => {
                self.routes.remove(a.vrf, &a.prefix);
            }
            ObjectSpec::Switch(_) => self.switch = None,
            _ => {}
        }
    }

    // ===== generic queries =====

    /// Objects referencing `id`, in creation order.
    pub fn dependents(&self, id: ObjectId) -> Vec<ObjectId> {
        let mut deps: Vec<&StoredObject> = self
            .dependents
            .get(&id)
            .into_iter()
            .flatten()
            .filter_map(|d| self.objects.get(d))
            .collect();
        deps.sort_by_key(|o| o.seq);
        deps.into_iter().map(|o| o.id).collect()
    }

    /// Handles of one kind, in creation order.
    pub fn objects_of_kind(&self, kind: ObjectKind) -> Vec<ObjectId> {
        let mut objs: Vec<&StoredObject> = self
            .objects
            .values()
            .filter(|o| o.spec.kind() == kind)
            .collect();
        objs.sort_by_key(|o| o.seq);
        objs.into_iter().map(|o| o.id).collect()
    }

    fn dependents_of_kind(&self, id: ObjectId, kind: ObjectKind) -> Vec<(ObjectId, &ObjectSpec)> {
        self.dependents(id)
            .into_iter()
            .filter_map(|d| self.get(d).map(|s| (d, s)))
            .filter(|(_, s)| s.kind() == kind)
            .collect()
    }

    fn by_key(&self, key: &UniqueKey) -> Option<ObjectId> {
        self.keys.get(key).copied()
    }

    pub fn snapshot(&self) -> TopologySnapshot {
        let mut objs: Vec<&StoredObject> = self.objects.values().collect();
        objs.sort_by_key(|o| o.seq);
        TopologySnapshot::new(
            objs.into_iter()
                .map(|o| SnapshotEntry {
                    id: o.id,
                    kind: o.spec.kind(),
                    spec: o.spec.clone(),
                })
                .collect(),
        )
    }

    // ===== typed queries =====

    typed_getter!(port, PortOid, Port, PortAttrs);
    typed_getter!(lag, LagOid, Lag, LagAttrs);
    typed_getter!(lag_member, LagMemberOid, LagMember, LagMemberAttrs);
    typed_getter!(vlan, VlanOid, Vlan, VlanAttrs);
    typed_getter!(vrf, VrfOid, VirtualRouter, VirtualRouterAttrs);
    typed_getter!(rif, RifOid, RouterInterface, RouterInterfaceAttrs);
    typed_getter!(next_hop, NextHopOid, NextHop, NextHopAttrs);
    typed_getter!(next_hop_group, NextHopGroupOid, NextHopGroup, NextHopGroupAttrs);
    typed_getter!(nhg_member, NextHopGroupMemberOid, NextHopGroupMember, NextHopGroupMemberAttrs);
    typed_getter!(route, RouteOid, Route, RouteAttrs);
    typed_getter!(acl_table, AclTableOid, AclTable, AclTableAttrs);
    typed_getter!(debug_counter, DebugCounterOid, DebugCounter, DebugCounterAttrs);

    pub fn switch(&self) -> Option<(SwitchOid, &SwitchAttrs)> {
        let id = self.switch?;
        match self.get(id.id()) {
            Some(ObjectSpec::Switch(a)) => Some((id, a)),
            _ => None,
        }
    }

    /// Longest-prefix route for `ip` in `vrf`.
    pub fn route_lookup(&self, vrf: VrfOid, ip: &IpAddr) -> Option<(RouteOid, &RouteAttrs)> {
        let (_, route) = self.routes.lookup(vrf, ip)?;
        self.route(route).map(|a| (route, a))
    }

    pub fn neighbor(&self, rif: RifOid, ip: &IpAddr) -> Option<&NeighborAttrs> {
        match self.by_key(&UniqueKey::Neighbor(rif, *ip)).and_then(|id| self.get(id)) {
            Some(ObjectSpec::Neighbor(a)) => Some(a),
            _ => None,
        }
    }

    pub fn mac_entry(&self, vlan: VlanOid, mac: &MacAddress) -> Option<&FdbEntryAttrs> {
        match self.by_key(&UniqueKey::FdbEntry(vlan, *mac)).and_then(|id| self.get(id)) {
            Some(ObjectSpec::FdbEntry(a)) => Some(a),
            _ => None,
        }
    }

    /// Members of a nexthop group in creation order, repeated members
    /// included.
    pub fn ecmp_members(
        &self,
        group: NextHopGroupOid,
    ) -> Vec<(NextHopGroupMemberOid, &NextHopGroupMemberAttrs)> {
        self.dependents_of_kind(group.id(), ObjectKind::NextHopGroupMember)
            .into_iter()
            .filter_map(|(id, spec)| match spec {
                ObjectSpec::NextHopGroupMember(a) if a.group == group => {
                    Some((NextHopGroupMemberOid::new_unchecked(id), a))
                }
                _ => None,
            })
            .collect()
    }

    pub fn lag_members(&self, lag: LagOid) -> Vec<(LagMemberOid, &LagMemberAttrs)> {
        self.dependents_of_kind(lag.id(), ObjectKind::LagMember)
            .into_iter()
            .filter_map(|(id, spec)| match spec {
                ObjectSpec::LagMember(a) if a.lag == lag => {
                    Some((LagMemberOid::new_unchecked(id), a))
                }
                _ => None,
            })
            .collect()
    }

    /// LAG membership of a port, if any.
    pub fn lag_of(&self, port: PortOid) -> Option<(LagMemberOid, &LagMemberAttrs)> {
        let id = self.by_key(&UniqueKey::LagMember(port))?;
        self.lag_member(LagMemberOid::new_unchecked(id))
            .map(|a| (LagMemberOid::new_unchecked(id), a))
    }

    pub fn vlan_by_vid(&self, vid: VlanId) -> Option<VlanOid> {
        self.by_key(&UniqueKey::Vlan(vid)).map(VlanOid::new_unchecked)
    }

    pub fn vlan_members(&self, vlan: VlanOid) -> Vec<&VlanMemberAttrs> {
        self.dependents_of_kind(vlan.id(), ObjectKind::VlanMember)
            .into_iter()
            .filter_map(|(_, spec)| match spec {
                ObjectSpec::VlanMember(a) if a.vlan == vlan => Some(a),
                _ => None,
            })
            .collect()
    }

    pub fn vlan_member(&self, vlan: VlanOid, port: L2Port) -> Option<&VlanMemberAttrs> {
        match self
            .by_key(&UniqueKey::VlanMember(vlan, port.id()))
            .and_then(|id| self.get(id))
        {
            Some(ObjectSpec::VlanMember(a)) => Some(a),
            _ => None,
        }
    }

    /// The non-virtual router interface for a binding.
    pub fn ingress_rif(&self, binding: &RifBinding) -> Option<(RifOid, &RouterInterfaceAttrs)> {
        let key = match binding {
            RifBinding::Port(p) => UniqueKey::RouterInterface(p.id(), None),
            RifBinding::Vlan(v) => UniqueKey::RouterInterface(v.id(), None),
            RifBinding::SubPort { port, outer_vlan } => {
                UniqueKey::RouterInterface(port.id(), Some(*outer_vlan))
            }
        };
        let id = RifOid::new_unchecked(self.by_key(&key)?);
        self.rif(id).map(|a| (id, a))
    }

    /// Virtual router interfaces sharing a binding.
    pub fn virtual_rifs(&self, binding: &RifBinding) -> Vec<(RifOid, &RouterInterfaceAttrs)> {
        let anchor = match binding {
            RifBinding::Port(p) | RifBinding::SubPort { port: p, .. } => p.id(),
            RifBinding::Vlan(v) => v.id(),
        };
        self.dependents_of_kind(anchor, ObjectKind::RouterInterface)
            .into_iter()
            .filter_map(|(id, spec)| match spec {
                ObjectSpec::RouterInterface(a) if a.is_virtual && a.binding == *binding => {
                    Some((RifOid::new_unchecked(id), a))
                }
                _ => None,
            })
            .collect()
    }

    /// Ports a frame ingressing on `port` must never egress on.
    pub fn isolation_for(&self, port: PortOid) -> BTreeSet<PortOid> {
        let Some(group) = self.port(port).and_then(|a| a.isolation_group) else {
            return BTreeSet::new();
        };
        self.dependents_of_kind(group.id(), ObjectKind::IsolationGroupMember)
            .into_iter()
            .filter_map(|(_, spec)| match spec {
                ObjectSpec::IsolationGroupMember(a) if a.group == group => Some(a.port),
                _ => None,
            })
            .collect()
    }

    pub fn trap(&self, reason: CpuReason) -> Option<&HostifTrapAttrs> {
        match self.by_key(&UniqueKey::HostifTrap(reason)).and_then(|id| self.get(id)) {
            Some(ObjectSpec::HostifTrap(a)) => Some(a),
            _ => None,
        }
    }

    /// Entries of an ACL table, highest priority first. Equal priorities
    /// keep creation order.
    pub fn acl_entries(&self, table: AclTableOid) -> Vec<&AclEntryAttrs> {
        let mut entries: Vec<&AclEntryAttrs> = self
            .dependents_of_kind(table.id(), ObjectKind::AclEntry)
            .into_iter()
            .filter_map(|(_, spec)| match spec {
                ObjectSpec::AclEntry(a) if a.table == table => Some(a),
                _ => None,
            })
            .collect();
        entries.sort_by(|a, b| b.priority.cmp(&a.priority));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sai_types::IpPrefix;

    struct Ids {
        next: u64,
    }

    impl Ids {
        fn oid<K: Kind>(&mut self) -> Oid<K> {
            self.next += 1;
            Oid::new_unchecked(ObjectId::compose(K::KIND, self.next))
        }
    }

    /// Store with one port, one VRF and a router interface on the port.
    fn base(ids: &mut Ids) -> (TopologyStore, PortOid, VrfOid, RifOid) {
        let mut store = TopologyStore::new();
        let port: PortOid = ids.oid();
        let vrf: VrfOid = ids.oid();
        let rif: RifOid = ids.oid();
        store.insert(port.id(), PortAttrs::new(1).into()).unwrap();
        store
            .insert(vrf.id(), VirtualRouterAttrs::default().into())
            .unwrap();
        store
            .insert(
                rif.id(),
                RouterInterfaceAttrs::new(vrf, RifBinding::Port(port.into())).into(),
            )
            .unwrap();
        (store, port, vrf, rif)
    }

    fn nexthop(rif: RifOid, ip: &str) -> ObjectSpec {
        NextHopAttrs {
            rif,
            ip: ip.parse().unwrap(),
            nh_type: NextHopType::Regular,
        }
        .into()
    }

    #[test]
    fn test_missing_reference_is_rejected() {
        let mut ids = Ids { next: 0 };
        let (store, _, _, _) = base(&mut ids);
        let dangling: RifOid = ids.oid();
        let err = store.validate_create(&nexthop(dangling, "10.0.0.1")).unwrap_err();
        assert_eq!(err.status(), SaiStatus::InvalidParameter);
    }

    #[test]
    fn test_duplicate_key_is_rejected() {
        let mut ids = Ids { next: 0 };
        let (mut store, _, vrf, rif) = base(&mut ids);
        let nh: NextHopOid = ids.oid();
        store.insert(nh.id(), nexthop(rif, "10.0.0.1")).unwrap();
        let route = RouteAttrs::forward(vrf, "10.0.0.0/24".parse().unwrap(), RouteTarget::NextHop(nh));
        let r1: RouteOid = ids.oid();
        store.insert(r1.id(), route.clone().into()).unwrap();
        let err = store.validate_create(&route.into()).unwrap_err();
        assert_eq!(err.status(), SaiStatus::ItemAlreadyExists);
    }

    #[test]
    fn test_remove_with_dependents_is_in_use() {
        let mut ids = Ids { next: 0 };
        let (mut store, _, _, rif) = base(&mut ids);
        let nh: NextHopOid = ids.oid();
        store.insert(nh.id(), nexthop(rif, "10.0.0.1")).unwrap();

        let err = store.remove(rif.id()).unwrap_err();
        assert_eq!(err.status(), SaiStatus::ObjectInUse);
        assert_eq!(store.dependents(rif.id()), vec![nh.id()]);

        store.remove(nh.id()).unwrap();
        store.remove(rif.id()).unwrap();
        assert!(store.get(rif.id()).is_none());
        assert_eq!(store.remove(rif.id()).unwrap_err().status(), SaiStatus::ItemNotFound);
    }

    #[test]
    fn test_builtin_port_cannot_be_removed() {
        let mut ids = Ids { next: 0 };
        let (store, port, _, _) = base(&mut ids);
        assert_eq!(
            store.validate_remove(port.id()).unwrap_err().status(),
            SaiStatus::InvalidParameter
        );
    }

    #[test]
    fn test_lookups_are_order_insensitive() {
        let mut ids = Ids { next: 0 };
        let (mut a, _, vrf, rif) = base(&mut ids);
        let mut b = a.clone();
        let nh: NextHopOid = ids.oid();
        let neigh: NeighborOid = ids.oid();
        let route: RouteOid = ids.oid();
        let neigh_spec: ObjectSpec = NeighborAttrs {
            rif,
            ip: "10.0.0.1".parse().unwrap(),
            mac: "00:11:22:33:44:55".parse().unwrap(),
            no_host_route: false,
        }
        .into();
        let route_spec: ObjectSpec =
            RouteAttrs::forward(vrf, "10.10.10.0/24".parse().unwrap(), RouteTarget::NextHop(nh)).into();

        a.insert(nh.id(), nexthop(rif, "10.0.0.1")).unwrap();
        a.insert(neigh.id(), neigh_spec.clone()).unwrap();
        a.insert(route.id(), route_spec.clone()).unwrap();

        b.insert(neigh.id(), neigh_spec).unwrap();
        b.insert(nh.id(), nexthop(rif, "10.0.0.1")).unwrap();
        b.insert(route.id(), route_spec).unwrap();

        let dst: IpAddr = "10.10.10.1".parse().unwrap();
        let via_a = a.route_lookup(vrf, &dst).map(|(id, r)| (id, r.clone()));
        let via_b = b.route_lookup(vrf, &dst).map(|(id, r)| (id, r.clone()));
        assert_eq!(via_a, via_b);
        assert_eq!(
            a.neighbor(rif, &"10.0.0.1".parse().unwrap()),
            b.neighbor(rif, &"10.0.0.1".parse().unwrap())
        );
    }

    #[test]
    fn test_route_target_switch_updates_index() {
        let mut ids = Ids { next: 0 };
        let (mut store, _, vrf, rif) = base(&mut ids);
        let nh1: NextHopOid = ids.oid();
        let nh2: NextHopOid = ids.oid();
        store.insert(nh1.id(), nexthop(rif, "10.0.0.1")).unwrap();
        store.insert(nh2.id(), nexthop(rif, "10.0.0.2")).unwrap();
        let route: RouteOid = ids.oid();
        let prefix: IpPrefix = "10.10.10.0/24".parse().unwrap();
        store
            .insert(route.id(), RouteAttrs::forward(vrf, prefix, RouteTarget::NextHop(nh1)).into())
            .unwrap();

        let undo = store
            .update(route.id(), &AttrUpdate::RouteTarget(Some(RouteTarget::NextHop(nh2))))
            .unwrap();
        assert_eq!(undo, AttrUpdate::RouteTarget(Some(RouteTarget::NextHop(nh1))));
        assert!(store.dependents(nh1.id()).is_empty());
        assert_eq!(store.dependents(nh2.id()), vec![route.id()]);
        store.remove(nh1.id()).unwrap();
    }

    #[test]
    fn test_ecmp_members_keep_creation_order_and_repeats() {
        let mut ids = Ids { next: 0 };
        let (mut store, _, _, rif) = base(&mut ids);
        let nh: NextHopOid = ids.oid();
        store.insert(nh.id(), nexthop(rif, "10.0.0.1")).unwrap();
        let group: NextHopGroupOid = ids.oid();
        store
            .insert(group.id(), NextHopGroupAttrs::default().into())
            .unwrap();
        let m1: NextHopGroupMemberOid = ids.oid();
        let m2: NextHopGroupMemberOid = ids.oid();
        store
            .insert(m1.id(), NextHopGroupMemberAttrs::new(group, nh, 7).into())
            .unwrap();
        store
            .insert(m2.id(), NextHopGroupMemberAttrs::new(group, nh, 10).into())
            .unwrap();

        let members: Vec<(NextHopGroupMemberOid, u32)> = store
            .ecmp_members(group)
            .into_iter()
            .map(|(id, a)| (id, a.weight))
            .collect();
        assert_eq!(members, vec![(m1, 7), (m2, 10)]);
    }

    #[test]
    fn test_snapshot_in_creation_order() {
        let mut ids = Ids { next: 0 };
        let (store, port, vrf, rif) = base(&mut ids);
        let ids: Vec<ObjectId> = store.snapshot().entries().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![port.id(), vrf.id(), rif.id()]);
    }
}
