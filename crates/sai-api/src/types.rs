//! Object handles.
//!
//! Every configured entity is identified by an opaque [`ObjectId`] returned
//! by the device. The handle encodes its [`ObjectKind`] in the upper bits so
//! a bare handle can always be classified. [`Oid<K>`] adds a compile-time
//! kind on top, preventing a port handle from being passed where a nexthop
//! handle is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

/// Raw handle value (matches `sai_object_id_t`).
pub type RawObjectId = u64;

const KIND_SHIFT: u32 = 48;
const INDEX_MASK: u64 = (1 << KIND_SHIFT) - 1;

/// Kinds of configuration objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ObjectKind {
    Switch = 1,
    Port = 2,
    Lag = 3,
    LagMember = 4,
    Vlan = 5,
    VlanMember = 6,
    VirtualRouter = 7,
    RouterInterface = 8,
    NextHop = 9,
    NextHopGroup = 10,
    NextHopGroupMember = 11,
    Neighbor = 12,
    FdbEntry = 13,
    Route = 14,
    IsolationGroup = 15,
    IsolationGroupMember = 16,
    AclTable = 17,
    AclEntry = 18,
    HostifTrap = 19,
    DebugCounter = 20,
}

impl ObjectKind {
    pub const ALL: [ObjectKind; 20] = [
        ObjectKind::Switch,
        ObjectKind::Port,
        ObjectKind::Lag,
        ObjectKind::LagMember,
        ObjectKind::Vlan,
        ObjectKind::VlanMember,
        ObjectKind::VirtualRouter,
        ObjectKind::RouterInterface,
        ObjectKind::NextHop,
        ObjectKind::NextHopGroup,
        ObjectKind::NextHopGroupMember,
        ObjectKind::Neighbor,
        ObjectKind::FdbEntry,
        ObjectKind::Route,
        ObjectKind::IsolationGroup,
        ObjectKind::IsolationGroupMember,
        ObjectKind::AclTable,
        ObjectKind::AclEntry,
        ObjectKind::HostifTrap,
        ObjectKind::DebugCounter,
    ];

    pub fn from_raw(raw: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| *k as u8 == raw)
    }

    /// Objects the device creates itself at init; the harness never removes them.
    pub const fn is_builtin(&self) -> bool {
        matches!(self, ObjectKind::Switch | ObjectKind::Port)
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ObjectKind::Switch => "SAI_OBJECT_TYPE_SWITCH",
            ObjectKind::Port => "SAI_OBJECT_TYPE_PORT",
            ObjectKind::Lag => "SAI_OBJECT_TYPE_LAG",
            ObjectKind::LagMember => "SAI_OBJECT_TYPE_LAG_MEMBER",
            ObjectKind::Vlan => "SAI_OBJECT_TYPE_VLAN",
            ObjectKind::VlanMember => "SAI_OBJECT_TYPE_VLAN_MEMBER",
            ObjectKind::VirtualRouter => "SAI_OBJECT_TYPE_VIRTUAL_ROUTER",
            ObjectKind::RouterInterface => "SAI_OBJECT_TYPE_ROUTER_INTERFACE",
            ObjectKind::NextHop => "SAI_OBJECT_TYPE_NEXT_HOP",
            ObjectKind::NextHopGroup => "SAI_OBJECT_TYPE_NEXT_HOP_GROUP",
            ObjectKind::NextHopGroupMember => "SAI_OBJECT_TYPE_NEXT_HOP_GROUP_MEMBER",
            ObjectKind::Neighbor => "SAI_OBJECT_TYPE_NEIGHBOR_ENTRY",
            ObjectKind::FdbEntry => "SAI_OBJECT_TYPE_FDB_ENTRY",
            ObjectKind::Route => "SAI_OBJECT_TYPE_ROUTE_ENTRY",
            ObjectKind::IsolationGroup => "SAI_OBJECT_TYPE_ISOLATION_GROUP",
            ObjectKind::IsolationGroupMember => "SAI_OBJECT_TYPE_ISOLATION_GROUP_MEMBER",
            ObjectKind::AclTable => "SAI_OBJECT_TYPE_ACL_TABLE",
            ObjectKind::AclEntry => "SAI_OBJECT_TYPE_ACL_ENTRY",
            ObjectKind::HostifTrap => "SAI_OBJECT_TYPE_HOSTIF_TRAP",
            ObjectKind::DebugCounter => "SAI_OBJECT_TYPE_DEBUG_COUNTER",
        };
        write!(f, "{}", s)
    }
}

/// An untyped object handle.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(RawObjectId);

impl ObjectId {
    /// The null handle (`SAI_NULL_OBJECT_ID`).
    pub const NULL: ObjectId = ObjectId(0);

    /// Composes a handle from a kind and a per-kind index.
    pub const fn compose(kind: ObjectKind, index: u64) -> Self {
        ObjectId(((kind as u64) << KIND_SHIFT) | (index & INDEX_MASK))
    }

    pub const fn from_raw(raw: RawObjectId) -> Self {
        ObjectId(raw)
    }

    pub const fn as_raw(&self) -> RawObjectId {
        self.0
    }

    pub const fn is_null(&self) -> bool {
        self.0 == 0
    }

    /// Kind encoded in the handle, or `None` for null and foreign handles.
    pub fn kind(&self) -> Option<ObjectKind> {
        ObjectKind::from_raw((self.0 >> KIND_SHIFT) as u8)
    }

    pub const fn index(&self) -> u64 {
        self.0 & INDEX_MASK
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            Some(kind) => write!(f, "{:?}(0x{:016x})", kind, self.0),
            None => write!(f, "ObjectId(0x{:016x})", self.0),
        }
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "oid:0x{:x}", self.0)
    }
}

/// Marker trait for object kinds usable as a type parameter.
pub trait Kind: Send + Sync + 'static {
    const KIND: ObjectKind;
}

/// A handle whose kind is known at compile time.
///
/// ```
/// use sai_api::{ObjectId, ObjectKind, PortOid, NextHopOid};
///
/// let raw = ObjectId::compose(ObjectKind::Port, 3);
/// let port = PortOid::try_from(raw).unwrap();
/// assert_eq!(port.id(), raw);
/// assert!(NextHopOid::try_from(raw).is_err());
/// ```
pub struct Oid<K: Kind> {
    id: ObjectId,
    _marker: PhantomData<K>,
}

impl<K: Kind> Oid<K> {
    /// Wraps a handle without checking its encoded kind.
    pub const fn new_unchecked(id: ObjectId) -> Self {
        Self {
            id,
            _marker: PhantomData,
        }
    }

    pub const fn id(&self) -> ObjectId {
        self.id
    }

    pub const fn kind(&self) -> ObjectKind {
        K::KIND
    }
}

impl<K: Kind> TryFrom<ObjectId> for Oid<K> {
    type Error = crate::SaiError;

    fn try_from(id: ObjectId) -> Result<Self, Self::Error> {
        if id.kind() == Some(K::KIND) {
            Ok(Self::new_unchecked(id))
        } else {
            Err(crate::SaiError::invalid_object_type(K::KIND, id))
        }
    }
}

impl<K: Kind> From<Oid<K>> for ObjectId {
    fn from(oid: Oid<K>) -> ObjectId {
        oid.id
    }
}

impl<K: Kind> Clone for Oid<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K: Kind> Copy for Oid<K> {}

impl<K: Kind> PartialEq for Oid<K> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<K: Kind> Eq for Oid<K> {}

impl<K: Kind> PartialOrd for Oid<K> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<K: Kind> Ord for Oid<K> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}

impl<K: Kind> Hash for Oid<K> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<K: Kind> fmt::Debug for Oid<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}(0x{:x})", K::KIND, self.id.as_raw())
    }
}

impl<K: Kind> fmt::Display for Oid<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.id, f)
    }
}

impl<K: Kind> Serialize for Oid<K> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.id.serialize(serializer)
    }
}

impl<'de, K: Kind> Deserialize<'de> for Oid<K> {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let id = ObjectId::deserialize(deserializer)?;
        Oid::try_from(id).map_err(serde::de::Error::custom)
    }
}

macro_rules! define_object_kind {
    ($marker:ident, $kind:ident, $alias:ident) => {
        #[derive(Debug, Clone, Copy)]
        pub struct $marker;

        impl Kind for $marker {
            const KIND: ObjectKind = ObjectKind::$kind;
        }

        pub type $alias = Oid<$marker>;
    };
}

define_object_kind!(SwitchKind, Switch, SwitchOid);
define_object_kind!(PortKind, Port, PortOid);
define_object_kind!(LagKind, Lag, LagOid);
define_object_kind!(LagMemberKind, LagMember, LagMemberOid);
define_object_kind!(VlanKind, Vlan, VlanOid);
define_object_kind!(VlanMemberKind, VlanMember, VlanMemberOid);
define_object_kind!(VirtualRouterKind, VirtualRouter, VrfOid);
define_object_kind!(RouterInterfaceKind, RouterInterface, RifOid);
define_object_kind!(NextHopKind, NextHop, NextHopOid);
define_object_kind!(NextHopGroupKind, NextHopGroup, NextHopGroupOid);
define_object_kind!(NextHopGroupMemberKind, NextHopGroupMember, NextHopGroupMemberOid);
define_object_kind!(NeighborKind, Neighbor, NeighborOid);
define_object_kind!(FdbEntryKind, FdbEntry, FdbEntryOid);
define_object_kind!(RouteKind, Route, RouteOid);
define_object_kind!(IsolationGroupKind, IsolationGroup, IsolationGroupOid);
define_object_kind!(IsolationGroupMemberKind, IsolationGroupMember, IsolationGroupMemberOid);
define_object_kind!(AclTableKind, AclTable, AclTableOid);
define_object_kind!(AclEntryKind, AclEntry, AclEntryOid);
define_object_kind!(HostifTrapKind, HostifTrap, HostifTrapOid);
define_object_kind!(DebugCounterKind, DebugCounter, DebugCounterOid);

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_compose_roundtrip_kind() {
        let id = ObjectId::compose(ObjectKind::Route, 42);
        assert_eq!(id.kind(), Some(ObjectKind::Route));
        assert_eq!(id.index(), 42);
        assert_eq!(ObjectId::NULL.kind(), None);
    }

    #[test]
    fn test_typed_conversion_checks_kind() {
        let id = ObjectId::compose(ObjectKind::NextHop, 1);
        let nh = NextHopOid::try_from(id).unwrap();
        assert_eq!(ObjectId::from(nh), id);
        assert!(PortOid::try_from(id).is_err());
        assert!(PortOid::try_from(ObjectId::NULL).is_err());
    }

    #[test]
    fn test_kind_from_raw() {
        for kind in ObjectKind::ALL {
            assert_eq!(ObjectKind::from_raw(kind as u8), Some(kind));
        }
        assert_eq!(ObjectKind::from_raw(0), None);
        assert_eq!(ObjectKind::from_raw(200), None);
    }
}
