//! Typed attribute sets, one per object kind.
//!
//! [`ObjectSpec`] is the full configuration of one object. It is what
//! `create` consumes and what `get_object` returns. Each spec knows which
//! handles it references ([`ObjectSpec::references`]), which defines the
//! creation DAG, and which natural key it occupies
//! ([`ObjectSpec::unique_key`]), which defines duplicate detection.

use crate::counter::{CounterScope, CounterStage, DropReason};
use crate::error::{SaiError, SaiResult};
use crate::trap::CpuReason;
use crate::types::*;
use sai_types::{AdminState, IpAddr, IpFamily, IpPrefix, MacAddress, VlanId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default MTU for ports and router interfaces.
pub const DEFAULT_MTU: u32 = 9100;

/// Smallest MTU a port or router interface accepts.
pub const MIN_MTU: u32 = 68;

/// Action for a packet that hit an exception condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PacketAction {
    Forward,
    Drop,
    /// Redirect to the CPU port.
    Trap,
}

/// Route packet action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteAction {
    #[default]
    Forward,
    Drop,
    Trap,
    /// Destination is local to the device.
    MyIp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NextHopType {
    #[default]
    Regular,
    Drop,
    Glean,
}

/// A bridge port: a physical port or a LAG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum L2Port {
    Port(PortOid),
    Lag(LagOid),
}

impl L2Port {
    pub fn id(&self) -> ObjectId {
        match self {
            L2Port::Port(p) => p.id(),
            L2Port::Lag(l) => l.id(),
        }
    }
}

impl From<PortOid> for L2Port {
    fn from(p: PortOid) -> Self {
        L2Port::Port(p)
    }
}

impl From<LagOid> for L2Port {
    fn from(l: LagOid) -> Self {
        L2Port::Lag(l)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tagging {
    #[default]
    Untagged,
    Tagged,
}

/// What a router interface is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RifBinding {
    /// Untagged routed port or LAG.
    Port(L2Port),
    /// Switch virtual interface.
    Vlan(VlanOid),
    /// Port or LAG plus an outer 802.1Q tag.
    SubPort { port: L2Port, outer_vlan: VlanId },
}

impl RifBinding {
    fn references(&self) -> Vec<ObjectId> {
        match self {
            RifBinding::Port(p) | RifBinding::SubPort { port: p, .. } => vec![p.id()],
            RifBinding::Vlan(v) => vec![v.id()],
        }
    }

    /// The bridge port for port and sub-port bindings.
    pub fn port(&self) -> Option<L2Port> {
        match self {
            RifBinding::Port(p) | RifBinding::SubPort { port: p, .. } => Some(*p),
            RifBinding::Vlan(_) => None,
        }
    }
}

/// Route target; exactly one of a nexthop or a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RouteTarget {
    NextHop(NextHopOid),
    Group(NextHopGroupOid),
}

impl RouteTarget {
    pub fn id(&self) -> ObjectId {
        match self {
            RouteTarget::NextHop(n) => n.id(),
            RouteTarget::Group(g) => g.id(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AclStage {
    Ingress,
    Egress,
}

/// Match fields of an ACL entry. `None` fields are wildcards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AclMatch {
    pub src_ip: Option<IpPrefix>,
    pub dst_ip: Option<IpPrefix>,
    pub ip_protocol: Option<u8>,
    pub l4_src_port: Option<u16>,
    pub l4_dst_port: Option<u16>,
    pub dst_mac: Option<MacAddress>,
    pub ether_type: Option<u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AclAction {
    Permit,
    Drop,
    Trap,
    /// Bypass the pipeline and send out of the given bridge port.
    Redirect(L2Port),
}

// ============================================================================
// Per-kind attribute sets
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchAttrs {
    pub src_mac: MacAddress,
    pub cpu_port: PortOid,
    pub default_vrf: VrfOid,
    pub default_vlan: VlanOid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortAttrs {
    /// Front-panel lane; stable across reboots.
    pub lane: u32,
    pub admin_state: AdminState,
    pub pvid: VlanId,
    pub mtu: u32,
    pub learning: bool,
    pub drop_tagged: bool,
    pub drop_untagged: bool,
    pub ingress_acl: Option<AclTableOid>,
    pub egress_acl: Option<AclTableOid>,
    pub isolation_group: Option<IsolationGroupOid>,
}

impl PortAttrs {
    /// A port as the device brings it up at init.
    pub fn new(lane: u32) -> Self {
        Self {
            lane,
            admin_state: AdminState::Up,
            pvid: VlanId::DEFAULT,
            mtu: DEFAULT_MTU,
            learning: true,
            drop_tagged: false,
            drop_untagged: false,
            ingress_acl: None,
            egress_acl: None,
            isolation_group: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LagAttrs {
    pub pvid: VlanId,
}

impl Default for LagAttrs {
    fn default() -> Self {
        Self {
            pvid: VlanId::DEFAULT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LagMemberAttrs {
    pub lag: LagOid,
    pub port: PortOid,
    pub ingress_disable: bool,
    pub egress_disable: bool,
}

impl LagMemberAttrs {
    pub fn new(lag: LagOid, port: PortOid) -> Self {
        Self {
            lag,
            port,
            ingress_disable: false,
            egress_disable: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VlanAttrs {
    pub vid: VlanId,
    pub learning: bool,
}

impl VlanAttrs {
    pub fn new(vid: VlanId) -> Self {
        Self {
            vid,
            learning: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VlanMemberAttrs {
    pub vlan: VlanOid,
    pub port: L2Port,
    pub tagging: Tagging,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualRouterAttrs {
    /// Overrides the switch MAC for interfaces in this VRF.
    pub src_mac: Option<MacAddress>,
    pub v4_enabled: bool,
    pub v6_enabled: bool,
    pub ttl1_action: PacketAction,
    pub ip_options_action: PacketAction,
}

impl Default for VirtualRouterAttrs {
    fn default() -> Self {
        Self {
            src_mac: None,
            v4_enabled: true,
            v6_enabled: true,
            ttl1_action: PacketAction::Trap,
            ip_options_action: PacketAction::Trap,
        }
    }
}

impl VirtualRouterAttrs {
    pub fn family_enabled(&self, family: IpFamily) -> bool {
        match family {
            IpFamily::V4 => self.v4_enabled,
            IpFamily::V6 => self.v6_enabled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterInterfaceAttrs {
    pub vrf: VrfOid,
    pub binding: RifBinding,
    /// Overrides the VRF (and switch) MAC.
    pub src_mac: Option<MacAddress>,
    pub mtu: u32,
    pub v4_enabled: bool,
    pub v6_enabled: bool,
    pub admin_state: AdminState,
    pub ingress_acl: Option<AclTableOid>,
    pub egress_acl: Option<AclTableOid>,
    /// Matches an extra router MAC on the same binding; never used for egress.
    pub is_virtual: bool,
}

impl RouterInterfaceAttrs {
    pub fn new(vrf: VrfOid, binding: RifBinding) -> Self {
        Self {
            vrf,
            binding,
            src_mac: None,
            mtu: DEFAULT_MTU,
            v4_enabled: true,
            v6_enabled: true,
            admin_state: AdminState::Up,
            ingress_acl: None,
            egress_acl: None,
            is_virtual: false,
        }
    }

    pub fn family_enabled(&self, family: IpFamily) -> bool {
        match family {
            IpFamily::V4 => self.v4_enabled,
            IpFamily::V6 => self.v6_enabled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextHopAttrs {
    pub rif: RifOid,
    pub ip: IpAddr,
    pub nh_type: NextHopType,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextHopGroupAttrs {
    /// All traffic takes the first usable member in configured order
    /// instead of being hashed across members.
    pub ordered: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextHopGroupMemberAttrs {
    pub group: NextHopGroupOid,
    pub next_hop: NextHopOid,
    pub weight: u32,
    pub enabled: bool,
}

impl NextHopGroupMemberAttrs {
    pub fn new(group: NextHopGroupOid, next_hop: NextHopOid, weight: u32) -> Self {
        Self {
            group,
            next_hop,
            weight,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighborAttrs {
    pub rif: RifOid,
    pub ip: IpAddr,
    pub mac: MacAddress,
    pub no_host_route: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FdbEntryAttrs {
    pub vlan: VlanOid,
    pub mac: MacAddress,
    pub port: L2Port,
    pub is_static: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteAttrs {
    pub vrf: VrfOid,
    pub prefix: IpPrefix,
    pub target: Option<RouteTarget>,
    pub action: RouteAction,
    pub class_id: Option<u32>,
}

impl RouteAttrs {
    pub fn forward(vrf: VrfOid, prefix: IpPrefix, target: RouteTarget) -> Self {
        Self {
            vrf,
            prefix,
            target: Some(target),
            action: RouteAction::Forward,
            class_id: None,
        }
    }

    pub fn with_action(vrf: VrfOid, prefix: IpPrefix, action: RouteAction) -> Self {
        Self {
            vrf,
            prefix,
            target: None,
            action,
            class_id: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IsolationGroupAttrs {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IsolationGroupMemberAttrs {
    pub group: IsolationGroupOid,
    pub port: PortOid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclTableAttrs {
    pub stage: AclStage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclEntryAttrs {
    pub table: AclTableOid,
    /// Higher wins.
    pub priority: u32,
    pub matcher: AclMatch,
    pub action: AclAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostifTrapAttrs {
    pub trap: CpuReason,
    pub action: PacketAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugCounterAttrs {
    pub scope: CounterScope,
    pub stage: CounterStage,
    pub reasons: Vec<DropReason>,
}

// ============================================================================
// ObjectSpec
// ============================================================================

/// Full configuration of one object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "attrs", rename_all = "snake_case")]
pub enum ObjectSpec {
    Switch(SwitchAttrs),
    Port(PortAttrs),
    Lag(LagAttrs),
    LagMember(LagMemberAttrs),
    Vlan(VlanAttrs),
    VlanMember(VlanMemberAttrs),
    VirtualRouter(VirtualRouterAttrs),
    RouterInterface(RouterInterfaceAttrs),
    NextHop(NextHopAttrs),
    NextHopGroup(NextHopGroupAttrs),
    NextHopGroupMember(NextHopGroupMemberAttrs),
    Neighbor(NeighborAttrs),
    FdbEntry(FdbEntryAttrs),
    Route(RouteAttrs),
    IsolationGroup(IsolationGroupAttrs),
    IsolationGroupMember(IsolationGroupMemberAttrs),
    AclTable(AclTableAttrs),
    AclEntry(AclEntryAttrs),
    HostifTrap(HostifTrapAttrs),
    DebugCounter(DebugCounterAttrs),
}

/// Natural key an object occupies; two live objects never share one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UniqueKey {
    Vlan(VlanId),
    VlanMember(VlanOid, ObjectId),
    LagMember(PortOid),
    RouterInterface(ObjectId, Option<VlanId>),
    Neighbor(RifOid, IpAddr),
    FdbEntry(VlanOid, MacAddress),
    Route(VrfOid, IpPrefix),
    IsolationGroupMember(IsolationGroupOid, PortOid),
    HostifTrap(CpuReason),
}

impl fmt::Display for UniqueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UniqueKey::Vlan(vid) => write!(f, "vlan {}", vid),
            UniqueKey::VlanMember(vlan, port) => write!(f, "vlan member {} {}", vlan, port),
            UniqueKey::LagMember(port) => write!(f, "lag member {}", port),
            UniqueKey::RouterInterface(on, vid) => match vid {
                Some(vid) => write!(f, "router interface {}.{}", on, vid),
                None => write!(f, "router interface {}", on),
            },
            UniqueKey::Neighbor(rif, ip) => write!(f, "neighbor {} on {}", ip, rif),
            UniqueKey::FdbEntry(vlan, mac) => write!(f, "fdb {} in {}", mac, vlan),
            UniqueKey::Route(vrf, prefix) => write!(f, "route {} in {}", prefix, vrf),
            UniqueKey::IsolationGroupMember(g, p) => write!(f, "isolation member {} of {}", p, g),
            UniqueKey::HostifTrap(trap) => write!(f, "trap {}", trap),
        }
    }
}

impl ObjectSpec {
    pub fn kind(&self) -> ObjectKind {
        match self {
            ObjectSpec::Switch(_) => ObjectKind::Switch,
            ObjectSpec::Port(_) => ObjectKind::Port,
            ObjectSpec::Lag(_) => ObjectKind::Lag,
            ObjectSpec::LagMember(_) => ObjectKind::LagMember,
            ObjectSpec::Vlan(_) => ObjectKind::Vlan,
            ObjectSpec::VlanMember(_) => ObjectKind::VlanMember,
            ObjectSpec::VirtualRouter(_) => ObjectKind::VirtualRouter,
            ObjectSpec::RouterInterface(_) => ObjectKind::RouterInterface,
            ObjectSpec::NextHop(_) => ObjectKind::NextHop,
            ObjectSpec::NextHopGroup(_) => ObjectKind::NextHopGroup,
            ObjectSpec::NextHopGroupMember(_) => ObjectKind::NextHopGroupMember,
            ObjectSpec::Neighbor(_) => ObjectKind::Neighbor,
            ObjectSpec::FdbEntry(_) => ObjectKind::FdbEntry,
            ObjectSpec::Route(_) => ObjectKind::Route,
            ObjectSpec::IsolationGroup(_) => ObjectKind::IsolationGroup,
            ObjectSpec::IsolationGroupMember(_) => ObjectKind::IsolationGroupMember,
            ObjectSpec::AclTable(_) => ObjectKind::AclTable,
            ObjectSpec::AclEntry(_) => ObjectKind::AclEntry,
            ObjectSpec::HostifTrap(_) => ObjectKind::HostifTrap,
            ObjectSpec::DebugCounter(_) => ObjectKind::DebugCounter,
        }
    }

    /// Handles this object depends on. Each must exist before creation and
    /// cannot be removed while this object lives.
    pub fn references(&self) -> Vec<ObjectId> {
        let mut refs = Vec::new();
        match self {
            ObjectSpec::Switch(a) => {
                refs.extend([a.cpu_port.id(), a.default_vrf.id(), a.default_vlan.id()]);
            }
            ObjectSpec::Lag(_)
            | ObjectSpec::Vlan(_)
            | ObjectSpec::VirtualRouter(_)
            | ObjectSpec::NextHopGroup(_)
            | ObjectSpec::IsolationGroup(_)
            | ObjectSpec::AclTable(_)
            | ObjectSpec::HostifTrap(_)
            | ObjectSpec::DebugCounter(_) => {}
            ObjectSpec::Port(a) => {
                refs.extend(a.ingress_acl.map(|t| t.id()));
                refs.extend(a.egress_acl.map(|t| t.id()));
                refs.extend(a.isolation_group.map(|g| g.id()));
            }
            ObjectSpec::LagMember(a) => refs.extend([a.lag.id(), a.port.id()]),
            ObjectSpec::VlanMember(a) => refs.extend([a.vlan.id(), a.port.id()]),
            ObjectSpec::RouterInterface(a) => {
                refs.push(a.vrf.id());
                refs.extend(a.binding.references());
                refs.extend(a.ingress_acl.map(|t| t.id()));
                refs.extend(a.egress_acl.map(|t| t.id()));
            }
            ObjectSpec::NextHop(a) => refs.push(a.rif.id()),
            ObjectSpec::NextHopGroupMember(a) => refs.extend([a.group.id(), a.next_hop.id()]),
            ObjectSpec::Neighbor(a) => refs.push(a.rif.id()),
            ObjectSpec::FdbEntry(a) => refs.extend([a.vlan.id(), a.port.id()]),
            ObjectSpec::Route(a) => {
                refs.push(a.vrf.id());
                refs.extend(a.target.map(|t| t.id()));
            }
            ObjectSpec::IsolationGroupMember(a) => refs.extend([a.group.id(), a.port.id()]),
            ObjectSpec::AclEntry(a) => {
                refs.push(a.table.id());
                if let AclAction::Redirect(p) = a.action {
                    refs.push(p.id());
                }
            }
        }
        refs
    }

    pub fn unique_key(&self) -> Option<UniqueKey> {
        match self {
            ObjectSpec::Vlan(a) => Some(UniqueKey::Vlan(a.vid)),
            ObjectSpec::VlanMember(a) => Some(UniqueKey::VlanMember(a.vlan, a.port.id())),
            ObjectSpec::LagMember(a) => Some(UniqueKey::LagMember(a.port)),
            ObjectSpec::RouterInterface(a) if !a.is_virtual => match a.binding {
                RifBinding::Port(p) => Some(UniqueKey::RouterInterface(p.id(), None)),
                RifBinding::Vlan(v) => Some(UniqueKey::RouterInterface(v.id(), None)),
                RifBinding::SubPort { port, outer_vlan } => {
                    Some(UniqueKey::RouterInterface(port.id(), Some(outer_vlan)))
                }
            },
            ObjectSpec::Neighbor(a) => Some(UniqueKey::Neighbor(a.rif, a.ip)),
            ObjectSpec::FdbEntry(a) => Some(UniqueKey::FdbEntry(a.vlan, a.mac)),
            ObjectSpec::Route(a) => Some(UniqueKey::Route(a.vrf, a.prefix)),
            ObjectSpec::IsolationGroupMember(a) => {
                Some(UniqueKey::IsolationGroupMember(a.group, a.port))
            }
            ObjectSpec::HostifTrap(a) => Some(UniqueKey::HostifTrap(a.trap)),
            _ => None,
        }
    }

    /// Checks attribute values that are invalid regardless of device state.
    pub fn validate(&self) -> SaiResult<()> {
        match self {
            ObjectSpec::Port(a) => check_mtu(a.mtu),
            ObjectSpec::RouterInterface(a) => {
                check_mtu(a.mtu)?;
                if let Some(mac) = a.src_mac {
                    check_unicast(mac)?;
                }
                Ok(())
            }
            ObjectSpec::VirtualRouter(a) => match a.src_mac {
                Some(mac) => check_unicast(mac),
                None => Ok(()),
            },
            ObjectSpec::Switch(a) => check_unicast(a.src_mac),
            ObjectSpec::NextHop(a) => {
                if a.nh_type == NextHopType::Regular && a.ip.is_unspecified() {
                    return Err(SaiError::invalid_parameter(
                        "regular nexthop requires a destination IP",
                    ));
                }
                Ok(())
            }
            ObjectSpec::Neighbor(a) => check_unicast(a.mac),
            ObjectSpec::FdbEntry(a) => check_unicast(a.mac),
            ObjectSpec::Route(a) => {
                if a.action == RouteAction::Forward && a.target.is_none() {
                    return Err(SaiError::invalid_parameter(format!(
                        "forward route {} has no nexthop",
                        a.prefix
                    )));
                }
                Ok(())
            }
            ObjectSpec::HostifTrap(a) => {
                if !a.trap.is_installable() {
                    return Err(SaiError::invalid_parameter(format!(
                        "{} cannot be installed as a trap",
                        a.trap
                    )));
                }
                Ok(())
            }
            ObjectSpec::DebugCounter(a) => {
                if a.reasons.is_empty() {
                    return Err(SaiError::invalid_parameter("debug counter without reasons"));
                }
                if let Some(r) = a.reasons.iter().find(|r| r.stage() != a.stage) {
                    return Err(SaiError::invalid_parameter(format!(
                        "drop reason {} does not belong to the {:?} stage",
                        r, a.stage
                    )));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

fn check_mtu(mtu: u32) -> SaiResult<()> {
    if mtu < MIN_MTU {
        return Err(SaiError::invalid_parameter(format!("mtu {} below {}", mtu, MIN_MTU)));
    }
    Ok(())
}

fn check_unicast(mac: MacAddress) -> SaiResult<()> {
    if mac.is_multicast() || mac.is_zero() {
        return Err(SaiError::invalid_parameter(format!("{} is not a unicast MAC", mac)));
    }
    Ok(())
}

macro_rules! impl_from_attrs {
    ($($attrs:ident => $variant:ident),* $(,)?) => {
        $(
            impl From<$attrs> for ObjectSpec {
                fn from(a: $attrs) -> Self {
                    ObjectSpec::$variant(a)
                }
            }
        )*
    };
}

impl_from_attrs! {
    SwitchAttrs => Switch,
    PortAttrs => Port,
    LagAttrs => Lag,
    LagMemberAttrs => LagMember,
    VlanAttrs => Vlan,
    VlanMemberAttrs => VlanMember,
    VirtualRouterAttrs => VirtualRouter,
    RouterInterfaceAttrs => RouterInterface,
    NextHopAttrs => NextHop,
    NextHopGroupAttrs => NextHopGroup,
    NextHopGroupMemberAttrs => NextHopGroupMember,
    NeighborAttrs => Neighbor,
    FdbEntryAttrs => FdbEntry,
    RouteAttrs => Route,
    IsolationGroupAttrs => IsolationGroup,
    IsolationGroupMemberAttrs => IsolationGroupMember,
    AclTableAttrs => AclTable,
    AclEntryAttrs => AclEntry,
    HostifTrapAttrs => HostifTrap,
    DebugCounterAttrs => DebugCounter,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn oid<K: Kind>(index: u64) -> Oid<K> {
        Oid::new_unchecked(ObjectId::compose(K::KIND, index))
    }

    #[test]
    fn test_route_references_target() {
        let vrf: VrfOid = oid(1);
        let nh: NextHopOid = oid(2);
        let spec = ObjectSpec::from(RouteAttrs::forward(
            vrf,
            "10.0.0.0/8".parse().unwrap(),
            RouteTarget::NextHop(nh),
        ));
        assert_eq!(spec.kind(), ObjectKind::Route);
        assert_eq!(spec.references(), vec![vrf.id(), nh.id()]);
        assert_eq!(
            spec.unique_key(),
            Some(UniqueKey::Route(vrf, "10.0.0.0/8".parse().unwrap()))
        );
    }

    #[test]
    fn test_virtual_rif_has_no_unique_key() {
        let port: PortOid = oid(1);
        let mut rif = RouterInterfaceAttrs::new(oid(1), RifBinding::Port(port.into()));
        assert!(ObjectSpec::from(rif.clone()).unique_key().is_some());
        rif.is_virtual = true;
        assert_eq!(ObjectSpec::from(rif).unique_key(), None);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let forward_without_target = ObjectSpec::Route(RouteAttrs {
            vrf: oid(1),
            prefix: "10.0.0.0/8".parse().unwrap(),
            target: None,
            action: RouteAction::Forward,
            class_id: None,
        });
        assert!(forward_without_target.validate().is_err());

        let drop_without_target = ObjectSpec::Route(RouteAttrs::with_action(
            oid(1),
            "10.0.0.0/8".parse().unwrap(),
            RouteAction::Drop,
        ));
        assert!(drop_without_target.validate().is_ok());

        let mcast_neighbor = ObjectSpec::Neighbor(NeighborAttrs {
            rif: oid(1),
            ip: "10.0.0.1".parse().unwrap(),
            mac: "01:00:5e:00:00:01".parse().unwrap(),
            no_host_route: false,
        });
        assert!(mcast_neighbor.validate().is_err());

        let mut port = PortAttrs::new(0);
        port.mtu = 10;
        assert!(ObjectSpec::Port(port).validate().is_err());

        let wrong_stage = ObjectSpec::DebugCounter(DebugCounterAttrs {
            scope: CounterScope::Port,
            stage: CounterStage::Ingress,
            reasons: vec![DropReason::MtuExceeded],
        });
        assert!(wrong_stage.validate().is_err());
    }

    #[test]
    fn test_port_references_bound_objects() {
        let mut port = PortAttrs::new(1);
        assert!(ObjectSpec::Port(port.clone()).references().is_empty());
        let group: IsolationGroupOid = oid(5);
        port.isolation_group = Some(group);
        assert_eq!(ObjectSpec::Port(port).references(), vec![group.id()]);
    }
}
