//! Drop reasons and counter identifiers.
//!
//! A debug counter is created for a set of [`DropReason`]s. The device
//! assigns it an index, readable as
//! [`AttrId::DebugCounterIndex`](crate::AttrId::DebugCounterIndex), and the
//! statistic id used with `get_counters` is the stage's drop-reason range
//! base plus that index.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Semantic cause of a dropped packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    // L2 ingress
    SmacMulticast,
    SmacEqualsDmac,
    DmacReserved,
    VlanTagNotAllowed,
    IngressVlanFilter,
    LagMemberDisabled,
    // L3 ingress
    IrifDisabled,
    TtlError,
    IpOptions,
    IpHeaderError,
    SipEqualsDip,
    SipMulticast,
    SipLoopback,
    DipLoopback,
    LpmMiss,
    Blackhole,
    AclAny,
    // Egress
    MtuExceeded,
    EgressAcl,
    IsolationFilter,
}

impl DropReason {
    pub const ALL: [DropReason; 20] = [
        DropReason::SmacMulticast,
        DropReason::SmacEqualsDmac,
        DropReason::DmacReserved,
        DropReason::VlanTagNotAllowed,
        DropReason::IngressVlanFilter,
        DropReason::LagMemberDisabled,
        DropReason::IrifDisabled,
        DropReason::TtlError,
        DropReason::IpOptions,
        DropReason::IpHeaderError,
        DropReason::SipEqualsDip,
        DropReason::SipMulticast,
        DropReason::SipLoopback,
        DropReason::DipLoopback,
        DropReason::LpmMiss,
        DropReason::Blackhole,
        DropReason::AclAny,
        DropReason::MtuExceeded,
        DropReason::EgressAcl,
        DropReason::IsolationFilter,
    ];

    /// Stage at which the device attributes the drop.
    pub const fn stage(&self) -> CounterStage {
        match self {
            DropReason::MtuExceeded | DropReason::EgressAcl | DropReason::IsolationFilter => {
                CounterStage::Egress
            }
            _ => CounterStage::Ingress,
        }
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DropReason::SmacMulticast => "SMAC_MULTICAST",
            DropReason::SmacEqualsDmac => "SMAC_EQUALS_DMAC",
            DropReason::DmacReserved => "DMAC_RESERVED",
            DropReason::VlanTagNotAllowed => "VLAN_TAG_NOT_ALLOWED",
            DropReason::IngressVlanFilter => "INGRESS_VLAN_FILTER",
            DropReason::LagMemberDisabled => "LAG_MEMBER_DISABLED",
            DropReason::IrifDisabled => "IRIF_DISABLED",
            DropReason::TtlError => "TTL",
            DropReason::IpOptions => "IP_OPTIONS",
            DropReason::IpHeaderError => "IP_HEADER_ERROR",
            DropReason::SipEqualsDip => "SIP_EQUALS_DIP",
            DropReason::SipMulticast => "SIP_MC",
            DropReason::SipLoopback => "SIP_LOOPBACK",
            DropReason::DipLoopback => "DIP_LOOPBACK",
            DropReason::LpmMiss => "LPM_MISS",
            DropReason::Blackhole => "BLACKHOLE_ROUTE",
            DropReason::AclAny => "ACL_ANY",
            DropReason::MtuExceeded => "L3_EGRESS_MTU",
            DropReason::EgressAcl => "EGRESS_ACL",
            DropReason::IsolationFilter => "ISOLATION_FILTER",
        };
        write!(f, "{}", s)
    }
}

/// Where a debug counter accumulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CounterScope {
    /// Per ingress (or egress) port.
    Port,
    /// Device-wide, read from the switch object.
    Switch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CounterStage {
    Ingress,
    Egress,
}

const IN_DROP_REASON_RANGE_BASE: u32 = 0x0000_1000;
const OUT_DROP_REASON_RANGE_BASE: u32 = 0x0000_2000;
const DROP_REASON_RANGE_SIZE: u32 = 0x1000;

/// Statistic identifier passed to `get_counters` / `clear_counters`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CounterId {
    InPackets,
    OutPackets,
    InDiscards,
    OutDiscards,
    /// Ingress debug counter slot.
    InDropReason(u32),
    /// Egress debug counter slot.
    OutDropReason(u32),
}

impl CounterId {
    /// Derives the statistic for a debug counter from its device index.
    pub const fn for_debug_counter(stage: CounterStage, index: u32) -> Self {
        match stage {
            CounterStage::Ingress => CounterId::InDropReason(index),
            CounterStage::Egress => CounterId::OutDropReason(index),
        }
    }

    pub const fn as_raw(&self) -> u32 {
        match self {
            CounterId::InPackets => 0,
            CounterId::OutPackets => 1,
            CounterId::InDiscards => 2,
            CounterId::OutDiscards => 3,
            CounterId::InDropReason(i) => IN_DROP_REASON_RANGE_BASE + *i,
            CounterId::OutDropReason(i) => OUT_DROP_REASON_RANGE_BASE + *i,
        }
    }

    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(CounterId::InPackets),
            1 => Some(CounterId::OutPackets),
            2 => Some(CounterId::InDiscards),
            3 => Some(CounterId::OutDiscards),
            r if r >= IN_DROP_REASON_RANGE_BASE
                && r < IN_DROP_REASON_RANGE_BASE + DROP_REASON_RANGE_SIZE =>
            {
                Some(CounterId::InDropReason(r - IN_DROP_REASON_RANGE_BASE))
            }
            r if r >= OUT_DROP_REASON_RANGE_BASE
                && r < OUT_DROP_REASON_RANGE_BASE + DROP_REASON_RANGE_SIZE =>
            {
                Some(CounterId::OutDropReason(r - OUT_DROP_REASON_RANGE_BASE))
            }
            _ => None,
        }
    }
}

impl fmt::Display for CounterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CounterId::InPackets => write!(f, "IF_IN_PKTS"),
            CounterId::OutPackets => write!(f, "IF_OUT_PKTS"),
            CounterId::InDiscards => write!(f, "IF_IN_DISCARDS"),
            CounterId::OutDiscards => write!(f, "IF_OUT_DISCARDS"),
            CounterId::InDropReason(i) => write!(f, "IN_DROP_REASON_RANGE_BASE+{}", i),
            CounterId::OutDropReason(i) => write!(f, "OUT_DROP_REASON_RANGE_BASE+{}", i),
        }
    }
}
