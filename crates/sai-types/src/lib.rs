//! Network primitives shared by the SAI conformance harness crates.
//!
//! - [`MacAddress`]: 48-bit Ethernet MAC addresses
//! - [`IpPrefix`]: normalized IPv4/IPv6 prefixes with containment checks
//! - [`IpFamily`]: address family discriminator used for per-family enables
//! - [`VlanId`]: IEEE 802.1Q VLAN identifiers
//! - [`AdminState`]: administrative up/down state
//!
//! Addresses themselves are plain [`std::net::IpAddr`] values.

mod ip;
mod mac;
mod state;
mod vlan;

pub use ip::{IpFamily, IpPrefix};
pub use mac::MacAddress;
pub use state::AdminState;
pub use vlan::VlanId;

pub use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Error returned when a primitive cannot be parsed or constructed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid MAC address: {0}")]
    InvalidMacAddress(String),

    #[error("invalid IP address: {0}")]
    InvalidIpAddress(String),

    #[error("invalid IP prefix: {0}")]
    InvalidIpPrefix(String),

    #[error("invalid VLAN ID: {0} (must be 1-4094)")]
    InvalidVlanId(u16),

    #[error("invalid admin state: {0}")]
    InvalidAdminState(String),
}
