//! Control-plane redirect reasons.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Reason a packet was redirected to the CPU port.
///
/// The numeric [`code`](CpuReason::code) is what the device writes into the
/// CPU encapsulation header. Reasons that can be installed as host-interface
/// traps double as the trap type of a
/// [`HostifTrapAttrs`](crate::HostifTrapAttrs).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CpuReason {
    /// Nexthop needs ARP/ND resolution.
    Glean,
    /// Destination is one of the device's own addresses.
    Ip2Me,
    TtlError,
    IpOptions,
    MtuError,
    LpmMiss,
    /// Route action is `trap`.
    RouteTrap,
    /// Ingress or egress ACL with a trap action.
    AclTrap,
}

impl CpuReason {
    pub const ALL: [CpuReason; 8] = [
        CpuReason::Glean,
        CpuReason::Ip2Me,
        CpuReason::TtlError,
        CpuReason::IpOptions,
        CpuReason::MtuError,
        CpuReason::LpmMiss,
        CpuReason::RouteTrap,
        CpuReason::AclTrap,
    ];

    pub const fn code(&self) -> u16 {
        match self {
            CpuReason::Glean => 0x0001,
            CpuReason::Ip2Me => 0x0002,
            CpuReason::TtlError => 0x0003,
            CpuReason::IpOptions => 0x0004,
            CpuReason::MtuError => 0x0005,
            CpuReason::LpmMiss => 0x0006,
            CpuReason::RouteTrap => 0x0007,
            CpuReason::AclTrap => 0x0008,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.iter().copied().find(|r| r.code() == code)
    }

    /// Whether the reason can be installed as a host-interface trap.
    pub const fn is_installable(&self) -> bool {
        matches!(
            self,
            CpuReason::TtlError | CpuReason::IpOptions | CpuReason::MtuError | CpuReason::LpmMiss
        )
    }
}

impl fmt::Display for CpuReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CpuReason::Glean => "glean",
            CpuReason::Ip2Me => "ip2me",
            CpuReason::TtlError => "ttl_error",
            CpuReason::IpOptions => "ip_options",
            CpuReason::MtuError => "mtu_error",
            CpuReason::LpmMiss => "lpm_miss",
            CpuReason::RouteTrap => "route_trap",
            CpuReason::AclTrap => "acl_trap",
        };
        write!(f, "{}", s)
    }
}
