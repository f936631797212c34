//! IP prefixes and address families.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// Address family of an IP address or prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpFamily {
    V4,
    V6,
}

impl IpFamily {
    /// Returns the family of `addr`.
    pub const fn of(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => IpFamily::V4,
            IpAddr::V6(_) => IpFamily::V6,
        }
    }

    /// Maximum prefix length for the family.
    pub const fn max_prefix_len(&self) -> u8 {
        match self {
            IpFamily::V4 => 32,
            IpFamily::V6 => 128,
        }
    }
}

impl fmt::Display for IpFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpFamily::V4 => write!(f, "ipv4"),
            IpFamily::V6 => write!(f, "ipv6"),
        }
    }
}

/// An IP prefix in CIDR notation (e.g. `10.0.0.0/24` or `2001:db8::/32`).
///
/// The stored address is always the network address: host bits are cleared
/// on construction, so `10.1.1.7/24` and `10.1.1.0/24` are the same prefix.
///
/// ```
/// use sai_types::IpPrefix;
///
/// let p: IpPrefix = "10.1.1.7/24".parse().unwrap();
/// assert_eq!(p.to_string(), "10.1.1.0/24");
/// assert!(p.contains(&"10.1.1.200".parse().unwrap()));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IpPrefix {
    network: IpAddr,
    len: u8,
}

impl IpPrefix {
    /// Creates a prefix, masking off host bits.
    ///
    /// # Errors
    ///
    /// Returns an error if `len` exceeds the family maximum.
    pub fn new(addr: IpAddr, len: u8) -> Result<Self, ParseError> {
        let family = IpFamily::of(&addr);
        if len > family.max_prefix_len() {
            return Err(ParseError::InvalidIpPrefix(format!(
                "prefix length {} exceeds maximum {} for {}",
                len,
                family.max_prefix_len(),
                family
            )));
        }
        Ok(IpPrefix {
            network: mask(addr, len),
            len,
        })
    }

    /// Host route for a single address (`/32` or `/128`).
    pub fn host(addr: IpAddr) -> Self {
        IpPrefix {
            network: addr,
            len: IpFamily::of(&addr).max_prefix_len(),
        }
    }

    /// Default route for a family (`0.0.0.0/0` or `::/0`).
    pub fn default_route(family: IpFamily) -> Self {
        let network = match family {
            IpFamily::V4 => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            IpFamily::V6 => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        };
        IpPrefix { network, len: 0 }
    }

    pub const fn network(&self) -> IpAddr {
        self.network
    }

    pub const fn len(&self) -> u8 {
        self.len
    }

    pub const fn family(&self) -> IpFamily {
        IpFamily::of(&self.network)
    }

    /// Returns true if this is a host route (/32 for IPv4, /128 for IPv6).
    pub const fn is_host(&self) -> bool {
        self.len == self.family().max_prefix_len()
    }

    pub const fn is_default(&self) -> bool {
        self.len == 0
    }

    /// Returns true if `addr` falls inside this prefix. Addresses of the
    /// other family are never contained.
    pub fn contains(&self, addr: &IpAddr) -> bool {
        IpFamily::of(addr) == self.family() && mask(*addr, self.len) == self.network
    }

    /// Returns true if `other` is equal to or more specific than this prefix.
    pub fn covers(&self, other: &IpPrefix) -> bool {
        other.len >= self.len && self.contains(&other.network)
    }
}

fn mask(addr: IpAddr, len: u8) -> IpAddr {
    match addr {
        IpAddr::V4(v4) => {
            let bits = u32::from(v4);
            let mask = if len == 0 { 0 } else { u32::MAX << (32 - u32::from(len)) };
            IpAddr::V4(Ipv4Addr::from(bits & mask))
        }
        IpAddr::V6(v6) => {
            let bits = u128::from(v6);
            let mask = if len == 0 { 0 } else { u128::MAX << (128 - u32::from(len)) };
            IpAddr::V6(Ipv6Addr::from(bits & mask))
        }
    }
}

impl fmt::Display for IpPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.len)
    }
}

impl FromStr for IpPrefix {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((addr, len)) = s.rsplit_once('/') else {
            let addr: IpAddr = s
                .parse()
                .map_err(|_| ParseError::InvalidIpAddress(s.to_string()))?;
            return Ok(IpPrefix::host(addr));
        };
        let addr: IpAddr = addr
            .parse()
            .map_err(|_| ParseError::InvalidIpAddress(addr.to_string()))?;
        let len: u8 = len
            .parse()
            .map_err(|_| ParseError::InvalidIpPrefix(s.to_string()))?;
        IpPrefix::new(addr, len)
    }
}

impl TryFrom<String> for IpPrefix {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<IpPrefix> for String {
    fn from(p: IpPrefix) -> String {
        p.to_string()
    }
}

impl From<IpAddr> for IpPrefix {
    fn from(addr: IpAddr) -> Self {
        IpPrefix::host(addr)
    }
}
