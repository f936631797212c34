//! Ethernet MAC address.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A 48-bit Ethernet MAC address.
///
/// ```
/// use sai_types::MacAddress;
///
/// let mac: MacAddress = "00:11:22:33:44:55".parse().unwrap();
/// assert_eq!(mac.to_string(), "00:11:22:33:44:55");
/// assert_eq!(mac.offset(1).to_string(), "00:11:22:33:44:56");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    pub const BROADCAST: MacAddress = MacAddress([0xff; 6]);
    pub const ZERO: MacAddress = MacAddress([0; 6]);

    pub const fn new(bytes: [u8; 6]) -> Self {
        MacAddress(bytes)
    }

    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }

    pub const fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }

    /// Group bit set in the first octet (includes broadcast).
    pub const fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 != 0
    }

    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// IEEE 802.1D reserved range 01:80:c2:00:00:00 - 01:80:c2:00:00:0f.
    ///
    /// Frames addressed here are link-local control traffic and must never
    /// be bridged or routed.
    pub fn is_reserved(&self) -> bool {
        self.0[..5] == [0x01, 0x80, 0xc2, 0x00, 0x00] && self.0[5] <= 0x0f
    }

    /// Returns the address `n` positions after this one, wrapping within
    /// the low 24 bits so the OUI is preserved.
    pub fn offset(&self, n: u32) -> MacAddress {
        let low = u32::from_be_bytes([0, self.0[3], self.0[4], self.0[5]]);
        let low = low.wrapping_add(n) & 0x00ff_ffff;
        let [_, a, b, c] = low.to_be_bytes();
        MacAddress([self.0[0], self.0[1], self.0[2], a, b, c])
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl FromStr for MacAddress {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseError::InvalidMacAddress(s.to_string());
        let separator = if s.contains(':') { ':' } else { '-' };

        let mut bytes = [0u8; 6];
        let mut parts = s.split(separator);
        for byte in bytes.iter_mut() {
            let part = parts.next().ok_or_else(invalid)?;
            if part.len() != 2 {
                return Err(invalid());
            }
            *byte = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(MacAddress(bytes))
    }
}

impl TryFrom<String> for MacAddress {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> String {
        mac.to_string()
    }
}

impl From<[u8; 6]> for MacAddress {
    fn from(bytes: [u8; 6]) -> Self {
        MacAddress(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_both_separators() {
        let a: MacAddress = "00:11:22:33:44:55".parse().unwrap();
        let b: MacAddress = "00-11-22-33-44-55".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.octets(), [0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
    }

    #[test]
    fn test_reject_malformed() {
        assert!("00:11:22:33:44".parse::<MacAddress>().is_err());
        assert!("00:11:22:33:44:55:66".parse::<MacAddress>().is_err());
        assert!("0:11:22:33:44:55".parse::<MacAddress>().is_err());
        assert!("zz:11:22:33:44:55".parse::<MacAddress>().is_err());
    }

    #[test]
    fn test_reserved_range() {
        let stp: MacAddress = "01:80:c2:00:00:00".parse().unwrap();
        let lldp: MacAddress = "01:80:c2:00:00:0e".parse().unwrap();
        let not_reserved: MacAddress = "01:80:c2:00:00:10".parse().unwrap();
        assert!(stp.is_reserved());
        assert!(lldp.is_reserved());
        assert!(!not_reserved.is_reserved());
    }

    #[test]
    fn test_offset_preserves_oui() {
        let base: MacAddress = "00:77:66:55:ff:ff".parse().unwrap();
        assert_eq!(base.offset(1).to_string(), "00:77:66:56:00:00");
        let top: MacAddress = "02:00:00:ff:ff:ff".parse().unwrap();
        assert_eq!(top.offset(1).to_string(), "02:00:00:00:00:00");
    }

    #[test]
    fn test_multicast_and_broadcast() {
        assert!(MacAddress::BROADCAST.is_broadcast());
        assert!(MacAddress::BROADCAST.is_multicast());
        let mcast: MacAddress = "01:00:5e:00:00:01".parse().unwrap();
        assert!(mcast.is_multicast());
        assert!(!mcast.is_broadcast());
    }
}
