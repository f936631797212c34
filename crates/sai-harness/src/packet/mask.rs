//! Byte masks for comparing an expected frame against observed bytes.

use super::frame::{Body, Frame, L4};
use serde::{Deserialize, Serialize};

/// Header fields a device may legitimately rewrite in ways the oracle
/// cannot predict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaskedField {
    Ipv4Id,
    Ipv4Checksum,
    UdpSrcPort,
    UdpChecksum,
    TcpChecksum,
}

impl MaskedField {
    /// Byte range of the field within the encoded `frame`, if present.
    fn range(&self, frame: &Frame) -> Option<std::ops::Range<usize>> {
        let l3 = frame.l2_len();
        match (self, &frame.body) {
            (MaskedField::Ipv4Id, Body::Ipv4(_)) => Some(l3 + 4..l3 + 6),
            (MaskedField::Ipv4Checksum, Body::Ipv4(_)) => Some(l3 + 10..l3 + 12),
            (MaskedField::UdpSrcPort, _) if matches!(frame.l4(), Some(L4::Udp(_))) => {
                let l4 = frame.l4_offset()?;
                Some(l4..l4 + 2)
            }
            (MaskedField::UdpChecksum, _) if matches!(frame.l4(), Some(L4::Udp(_))) => {
                let l4 = frame.l4_offset()?;
                Some(l4 + 6..l4 + 8)
            }
            (MaskedField::TcpChecksum, _) if matches!(frame.l4(), Some(L4::Tcp(_))) => {
                let l4 = frame.l4_offset()?;
                Some(l4 + 16..l4 + 18)
            }
            _ => None,
        }
    }
}

/// An expected frame plus the byte ranges to ignore when comparing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    expected: Vec<u8>,
    ignored: Vec<std::ops::Range<usize>>,
}

impl Mask {
    /// Creates a mask comparing every byte of `frame`.
    pub fn new(frame: &Frame) -> Self {
        Self {
            expected: frame.encode().to_vec(),
            ignored: Vec::new(),
        }
    }

    /// Creates a mask ignoring the given fields. Fields absent from the
    /// frame (e.g. `UdpSrcPort` on a TCP frame) are skipped.
    pub fn with_fields(frame: &Frame, fields: &[MaskedField]) -> Self {
        let mut mask = Self::new(frame);
        mask.ignored = fields.iter().filter_map(|f| f.range(frame)).collect();
        mask
    }

    pub fn ignore_range(mut self, range: std::ops::Range<usize>) -> Self {
        self.ignored.push(range);
        self
    }

    pub fn expected(&self) -> &[u8] {
        &self.expected
    }

    fn is_ignored(&self, offset: usize) -> bool {
        self.ignored.iter().any(|r| r.contains(&offset))
    }

    /// First differing byte offset, or `None` when `observed` matches.
    /// A length difference reports the shorter length.
    pub fn first_mismatch(&self, observed: &[u8]) -> Option<usize> {
        if let Some(i) = self
            .expected
            .iter()
            .zip(observed)
            .enumerate()
            .find(|(i, (e, o))| e != o && !self.is_ignored(*i))
            .map(|(i, _)| i)
        {
            return Some(i);
        }
        if self.expected.len() != observed.len() {
            return Some(self.expected.len().min(observed.len()));
        }
        None
    }

    pub fn matches(&self, observed: &[u8]) -> bool {
        self.first_mismatch(observed).is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{tcp_packet, udp_packet};

    #[test]
    fn test_exact_match() {
        let frame = tcp_packet().build().unwrap();
        let mask = Mask::new(&frame);
        assert!(mask.matches(&frame.encode()));
        assert_eq!(mask.first_mismatch(&frame.encode()[..50]), Some(50));
    }

    #[test]
    fn test_masked_ip_id() {
        let expected = tcp_packet().ip_id(1).build().unwrap();
        let observed = tcp_packet().ip_id(999).build().unwrap().encode();

        assert!(!Mask::new(&expected).matches(&observed));
        let masked = Mask::with_fields(
            &expected,
            &[
                MaskedField::Ipv4Id,
                MaskedField::Ipv4Checksum,
                MaskedField::TcpChecksum,
            ],
        );
        assert!(masked.matches(&observed));
    }

    #[test]
    fn test_udp_sport_mask() {
        let expected = udp_packet().sport(1).build().unwrap();
        let observed = udp_packet().sport(2).build().unwrap().encode();
        let masked = Mask::with_fields(
            &expected,
            &[MaskedField::UdpSrcPort, MaskedField::UdpChecksum],
        );
        assert!(masked.matches(&observed));
        // TCP-only field has no effect on a UDP frame
        let tcp_only = Mask::with_fields(&expected, &[MaskedField::TcpChecksum]);
        assert!(!tcp_only.matches(&observed));
    }
}
