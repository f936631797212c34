//! Single-attribute updates and reads.

use crate::attr::*;
use crate::error::{SaiError, SaiResult};
use crate::types::*;
use sai_types::{AdminState, MacAddress, VlanId};
use serde::{Deserialize, Serialize};

/// One mutable attribute with its new value.
///
/// Applying an update to an [`ObjectSpec`] yields the update that restores
/// the previous value, which is how attribute changes are rolled back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttrUpdate {
    /// Switch (must be `Some`), VRF or router interface MAC.
    SrcMac(Option<MacAddress>),
    /// Port or router interface.
    AdminState(AdminState),
    /// Port or router interface.
    Mtu(u32),
    /// Port or LAG.
    PortVlanId(VlanId),
    /// Port or VLAN.
    Learning(bool),
    DropTagged(bool),
    DropUntagged(bool),
    /// Port or router interface.
    IngressAcl(Option<AclTableOid>),
    /// Port or router interface.
    EgressAcl(Option<AclTableOid>),
    IsolationGroup(Option<IsolationGroupOid>),
    /// VRF or router interface.
    V4Enabled(bool),
    /// VRF or router interface.
    V6Enabled(bool),
    Ttl1Action(PacketAction),
    IpOptionsAction(PacketAction),
    IngressDisable(bool),
    EgressDisable(bool),
    NeighborMac(MacAddress),
    FdbPort(L2Port),
    RouteTarget(Option<RouteTarget>),
    RouteAction(RouteAction),
    ClassId(Option<u32>),
    MemberWeight(u32),
    MemberEnabled(bool),
    TrapAction(PacketAction),
    AclAction(AclAction),
}

impl AttrUpdate {
    pub fn name(&self) -> &'static str {
        match self {
            AttrUpdate::SrcMac(_) => "SRC_MAC_ADDRESS",
            AttrUpdate::AdminState(_) => "ADMIN_STATE",
            AttrUpdate::Mtu(_) => "MTU",
            AttrUpdate::PortVlanId(_) => "PORT_VLAN_ID",
            AttrUpdate::Learning(_) => "LEARNING",
            AttrUpdate::DropTagged(_) => "DROP_TAGGED",
            AttrUpdate::DropUntagged(_) => "DROP_UNTAGGED",
            AttrUpdate::IngressAcl(_) => "INGRESS_ACL",
            AttrUpdate::EgressAcl(_) => "EGRESS_ACL",
            AttrUpdate::IsolationGroup(_) => "ISOLATION_GROUP",
            AttrUpdate::V4Enabled(_) => "ADMIN_V4_STATE",
            AttrUpdate::V6Enabled(_) => "ADMIN_V6_STATE",
            AttrUpdate::Ttl1Action(_) => "VIOLATION_TTL1_PACKET_ACTION",
            AttrUpdate::IpOptionsAction(_) => "VIOLATION_IP_OPTIONS_PACKET_ACTION",
            AttrUpdate::IngressDisable(_) => "INGRESS_DISABLE",
            AttrUpdate::EgressDisable(_) => "EGRESS_DISABLE",
            AttrUpdate::NeighborMac(_) => "DST_MAC_ADDRESS",
            AttrUpdate::FdbPort(_) => "BRIDGE_PORT_ID",
            AttrUpdate::RouteTarget(_) => "NEXT_HOP_ID",
            AttrUpdate::RouteAction(_) => "PACKET_ACTION",
            AttrUpdate::ClassId(_) => "META_DATA",
            AttrUpdate::MemberWeight(_) => "WEIGHT",
            AttrUpdate::MemberEnabled(_) => "ENABLED",
            AttrUpdate::TrapAction(_) => "PACKET_ACTION",
            AttrUpdate::AclAction(_) => "ACTION",
        }
    }
}

/// Attributes readable with `get_attribute`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttrId {
    /// Device-assigned index of a debug counter.
    DebugCounterIndex,
    CpuPort,
    DefaultVirtualRouter,
    DefaultVlan,
    SrcMac,
    PortLane,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttrValue {
    U32(u32),
    Oid(ObjectId),
    Mac(MacAddress),
}

impl AttrValue {
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            AttrValue::U32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_oid(&self) -> Option<ObjectId> {
        match self {
            AttrValue::Oid(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_mac(&self) -> Option<MacAddress> {
        match self {
            AttrValue::Mac(v) => Some(*v),
            _ => None,
        }
    }
}

/// Replaces `slot` with `new` and returns the previous value.
fn swap<T>(slot: &mut T, new: T) -> T {
    std::mem::replace(slot, new)
}

impl ObjectSpec {
    /// Applies `update` in place and returns the update that undoes it.
    ///
    /// # Errors
    ///
    /// `InvalidAttribute` if the kind has no such attribute, or
    /// `InvalidParameter` if the resulting configuration fails
    /// [`validate`](ObjectSpec::validate). On error the spec is unchanged.
    pub fn apply(&mut self, update: &AttrUpdate) -> SaiResult<AttrUpdate> {
        let mut next = self.clone();
        let previous = next.apply_unchecked(update)?;
        next.validate()?;
        *self = next;
        Ok(previous)
    }

    fn apply_unchecked(&mut self, update: &AttrUpdate) -> SaiResult<AttrUpdate> {
        use AttrUpdate as U;

        let kind = self.kind();
        let previous = match (self, update.clone()) {
            (ObjectSpec::Switch(a), U::SrcMac(Some(mac))) => U::SrcMac(Some(swap(&mut a.src_mac, mac))),

            (ObjectSpec::Port(a), U::AdminState(v)) => U::AdminState(swap(&mut a.admin_state, v)),
            (ObjectSpec::Port(a), U::Mtu(v)) => U::Mtu(swap(&mut a.mtu, v)),
            (ObjectSpec::Port(a), U::PortVlanId(v)) => U::PortVlanId(swap(&mut a.pvid, v)),
            (ObjectSpec::Port(a), U::Learning(v)) => U::Learning(swap(&mut a.learning, v)),
            (ObjectSpec::Port(a), U::DropTagged(v)) => U::DropTagged(swap(&mut a.drop_tagged, v)),
            (ObjectSpec::Port(a), U::DropUntagged(v)) => {
                U::DropUntagged(swap(&mut a.drop_untagged, v))
            }
            (ObjectSpec::Port(a), U::IngressAcl(v)) => U::IngressAcl(swap(&mut a.ingress_acl, v)),
            (ObjectSpec::Port(a), U::EgressAcl(v)) => U::EgressAcl(swap(&mut a.egress_acl, v)),
            (ObjectSpec::Port(a), U::IsolationGroup(v)) => {
                U::IsolationGroup(swap(&mut a.isolation_group, v))
            }

            (ObjectSpec::Lag(a), U::PortVlanId(v)) => U::PortVlanId(swap(&mut a.pvid, v)),

            (ObjectSpec::LagMember(a), U::IngressDisable(v)) => {
                U::IngressDisable(swap(&mut a.ingress_disable, v))
            }
            (ObjectSpec::LagMember(a), U::EgressDisable(v)) => {
                U::EgressDisable(swap(&mut a.egress_disable, v))
            }

            (ObjectSpec::Vlan(a), U::Learning(v)) => U::Learning(swap(&mut a.learning, v)),

            (ObjectSpec::VirtualRouter(a), U::SrcMac(v)) => U::SrcMac(swap(&mut a.src_mac, v)),
            (ObjectSpec::VirtualRouter(a), U::V4Enabled(v)) => {
                U::V4Enabled(swap(&mut a.v4_enabled, v))
            }
            (ObjectSpec::VirtualRouter(a), U::V6Enabled(v)) => {
                U::V6Enabled(swap(&mut a.v6_enabled, v))
            }
            (ObjectSpec::VirtualRouter(a), U::Ttl1Action(v)) => {
                U::Ttl1Action(swap(&mut a.ttl1_action, v))
            }
            (ObjectSpec::VirtualRouter(a), U::IpOptionsAction(v)) => {
                U::IpOptionsAction(swap(&mut a.ip_options_action, v))
            }

            (ObjectSpec::RouterInterface(a), U::SrcMac(v)) => U::SrcMac(swap(&mut a.src_mac, v)),
            (ObjectSpec::RouterInterface(a), U::AdminState(v)) => {
                U::AdminState(swap(&mut a.admin_state, v))
            }
            (ObjectSpec::RouterInterface(a), U::Mtu(v)) => U::Mtu(swap(&mut a.mtu, v)),
            (ObjectSpec::RouterInterface(a), U::V4Enabled(v)) => {
                U::V4Enabled(swap(&mut a.v4_enabled, v))
            }
            (ObjectSpec::RouterInterface(a), U::V6Enabled(v)) => {
                U::V6Enabled(swap(&mut a.v6_enabled, v))
            }
            (ObjectSpec::RouterInterface(a), U::IngressAcl(v)) => {
                U::IngressAcl(swap(&mut a.ingress_acl, v))
            }
            (ObjectSpec::RouterInterface(a), U::EgressAcl(v)) => {
                U::EgressAcl(swap(&mut a.egress_acl, v))
            }

            (ObjectSpec::Neighbor(a), U::NeighborMac(v)) => U::NeighborMac(swap(&mut a.mac, v)),
            (ObjectSpec::FdbEntry(a), U::FdbPort(v)) => U::FdbPort(swap(&mut a.port, v)),

            (ObjectSpec::Route(a), U::RouteTarget(v)) => U::RouteTarget(swap(&mut a.target, v)),
            (ObjectSpec::Route(a), U::RouteAction(v)) => U::RouteAction(swap(&mut a.action, v)),
            (ObjectSpec::Route(a), U::ClassId(v)) => U::ClassId(swap(&mut a.class_id, v)),

            (ObjectSpec::NextHopGroupMember(a), U::MemberWeight(v)) => {
                U::MemberWeight(swap(&mut a.weight, v))
            }
            (ObjectSpec::NextHopGroupMember(a), U::MemberEnabled(v)) => {
                U::MemberEnabled(swap(&mut a.enabled, v))
            }

            (ObjectSpec::HostifTrap(a), U::TrapAction(v)) => U::TrapAction(swap(&mut a.action, v)),
            (ObjectSpec::AclEntry(a), U::AclAction(v)) => U::AclAction(swap(&mut a.action, v)),

            (_, other) => return Err(SaiError::invalid_attribute(kind, other.name())),
        };
        Ok(previous)
    }
}
