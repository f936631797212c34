//! Ethernet frame model with IPv4/IPv6 and TCP/UDP/ICMP.
//!
//! Encoding always recomputes lengths and checksums; decoding does not
//! validate checksums so that frames with masked fields still parse.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use internet_checksum::Checksum;
use sai_types::{IpFamily, MacAddress};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use thiserror::Error;

pub const ETHERTYPE_IPV4: u16 = 0x0800;
pub const ETHERTYPE_IPV6: u16 = 0x86dd;
pub const ETHERTYPE_DOT1Q: u16 = 0x8100;

pub const IPPROTO_ICMP: u8 = 1;
pub const IPPROTO_TCP: u8 = 6;
pub const IPPROTO_UDP: u8 = 17;
pub const IPPROTO_ICMPV6: u8 = 58;

const ETH_HDR_LEN: usize = 14;
const DOT1Q_LEN: usize = 4;
const IPV4_HDR_LEN: usize = 20;
const IPV6_HDR_LEN: usize = 40;
const TCP_HDR_LEN: usize = 20;
const UDP_HDR_LEN: usize = 8;
const ICMP_HDR_LEN: usize = 4;

pub type DecodeResult<T> = Result<T, DecodeError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("insufficient data: need {need} bytes, have {have}")]
    InsufficientData { need: usize, have: usize },

    #[error("invalid IP version {0}")]
    InvalidVersion(u8),

    #[error("invalid header length {0}")]
    InvalidHeaderLength(usize),

    #[error("invalid CPU header magic 0x{0:04x}")]
    InvalidMagic(u16),

    #[error("unknown CPU reason code {0}")]
    UnknownReason(u16),
}

fn need(buf: &Bytes, n: usize) -> DecodeResult<()> {
    if buf.remaining() < n {
        return Err(DecodeError::InsufficientData {
            need: n,
            have: buf.remaining(),
        });
    }
    Ok(())
}

// ===== Frame =====

/// 802.1Q tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dot1q {
    pub pcp: u8,
    pub dei: bool,
    pub vid: u16,
}

impl Dot1q {
    pub fn new(vid: u16) -> Self {
        Dot1q {
            pcp: 0,
            dei: false,
            vid,
        }
    }

    fn tci(&self) -> u16 {
        (u16::from(self.pcp & 0x7) << 13) | (u16::from(self.dei) << 12) | (self.vid & 0x0fff)
    }

    fn from_tci(tci: u16) -> Self {
        Dot1q {
            pcp: (tci >> 13) as u8,
            dei: tci & 0x1000 != 0,
            vid: tci & 0x0fff,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub dst: MacAddress,
    pub src: MacAddress,
    pub vlan: Option<Dot1q>,
    pub body: Body,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Body {
    Ipv4(Ipv4),
    Ipv6(Ipv6),
    Other { ether_type: u16, data: Bytes },
}

//  0                   1                   2                   3
//  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |Version|  IHL  |Type of Service|          Total Length         |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |         Identification        |Flags|      Fragment Offset    |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |  Time to Live |    Protocol   |         Header Checksum       |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                       Source Address                          |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                    Destination Address                        |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                    Options                    |    Padding    |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ipv4 {
    pub tos: u8,
    pub id: u16,
    /// Flags and fragment offset, as on the wire.
    pub flags_frag: u16,
    pub ttl: u8,
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    /// Raw options; padded to a 4-byte multiple on encode.
    pub options: Bytes,
    pub l4: L4,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ipv6 {
    pub traffic_class: u8,
    pub flow_label: u32,
    pub hop_limit: u8,
    pub src: Ipv6Addr,
    pub dst: Ipv6Addr,
    pub l4: L4,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum L4 {
    Tcp(Tcp),
    Udp(Udp),
    /// ICMPv4 or ICMPv6 depending on the enclosing IP version.
    Icmp(Icmp),
    Other { protocol: u8, data: Bytes },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tcp {
    pub sport: u16,
    pub dport: u16,
    pub seq: u32,
    pub ack: u32,
    pub flags: u8,
    pub window: u16,
    pub payload: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Udp {
    pub sport: u16,
    pub dport: u16,
    pub payload: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Icmp {
    pub icmp_type: u8,
    pub code: u8,
    /// Everything after the checksum (identifier, sequence, data).
    pub rest: Bytes,
}

// ===== impl Frame =====

impl Frame {
    pub fn ether_type(&self) -> u16 {
        match &self.body {
            Body::Ipv4(_) => ETHERTYPE_IPV4,
            Body::Ipv6(_) => ETHERTYPE_IPV6,
            Body::Other { ether_type, .. } => *ether_type,
        }
    }

    /// Length of the L2 header including any 802.1Q tag.
    pub fn l2_len(&self) -> usize {
        ETH_HDR_LEN + if self.vlan.is_some() { DOT1Q_LEN } else { 0 }
    }

    pub fn family(&self) -> Option<IpFamily> {
        match &self.body {
            Body::Ipv4(_) => Some(IpFamily::V4),
            Body::Ipv6(_) => Some(IpFamily::V6),
            Body::Other { .. } => None,
        }
    }

    pub fn ip_src(&self) -> Option<IpAddr> {
        match &self.body {
            Body::Ipv4(ip) => Some(IpAddr::V4(ip.src)),
            Body::Ipv6(ip) => Some(IpAddr::V6(ip.src)),
            Body::Other { .. } => None,
        }
    }

    pub fn ip_dst(&self) -> Option<IpAddr> {
        match &self.body {
            Body::Ipv4(ip) => Some(IpAddr::V4(ip.dst)),
            Body::Ipv6(ip) => Some(IpAddr::V6(ip.dst)),
            Body::Other { .. } => None,
        }
    }

    /// TTL for IPv4, hop limit for IPv6.
    pub fn ttl(&self) -> Option<u8> {
        match &self.body {
            Body::Ipv4(ip) => Some(ip.ttl),
            Body::Ipv6(ip) => Some(ip.hop_limit),
            Body::Other { .. } => None,
        }
    }

    pub fn set_ttl(&mut self, ttl: u8) {
        match &mut self.body {
            Body::Ipv4(ip) => ip.ttl = ttl,
            Body::Ipv6(ip) => ip.hop_limit = ttl,
            Body::Other { .. } => {}
        }
    }

    pub fn has_ip_options(&self) -> bool {
        matches!(&self.body, Body::Ipv4(ip) if !ip.options.is_empty())
    }

    pub fn l4(&self) -> Option<&L4> {
        match &self.body {
            Body::Ipv4(ip) => Some(&ip.l4),
            Body::Ipv6(ip) => Some(&ip.l4),
            Body::Other { .. } => None,
        }
    }

    pub fn ip_protocol(&self) -> Option<u8> {
        let is_v6 = matches!(self.body, Body::Ipv6(_));
        self.l4().map(|l4| l4.protocol(is_v6))
    }

    /// (source, destination) L4 ports for TCP and UDP.
    pub fn l4_ports(&self) -> Option<(u16, u16)> {
        match self.l4()? {
            L4::Tcp(t) => Some((t.sport, t.dport)),
            L4::Udp(u) => Some((u.sport, u.dport)),
            _ => None,
        }
    }

    /// Size of the IP packet (what MTU limits), or the L2 payload for
    /// non-IP frames.
    pub fn l3_len(&self) -> usize {
        match &self.body {
            Body::Ipv4(ip) => ip.header_len() + ip.l4.len(),
            Body::Ipv6(ip) => IPV6_HDR_LEN + ip.l4.len(),
            Body::Other { data, .. } => data.len(),
        }
    }

    /// Encoded length in bytes.
    pub fn len(&self) -> usize {
        self.l2_len() + self.l3_len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Byte offset of the L4 header in the encoded frame.
    pub fn l4_offset(&self) -> Option<usize> {
        match &self.body {
            Body::Ipv4(ip) => Some(self.l2_len() + ip.header_len()),
            Body::Ipv6(_) => Some(self.l2_len() + IPV6_HDR_LEN),
            Body::Other { .. } => None,
        }
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.len());
        buf.put_slice(self.dst.as_bytes());
        buf.put_slice(self.src.as_bytes());
        if let Some(tag) = &self.vlan {
            buf.put_u16(ETHERTYPE_DOT1Q);
            buf.put_u16(tag.tci());
        }
        buf.put_u16(self.ether_type());
        match &self.body {
            Body::Ipv4(ip) => ip.encode(&mut buf),
            Body::Ipv6(ip) => ip.encode(&mut buf),
            Body::Other { data, .. } => buf.put_slice(data),
        }
        buf.freeze()
    }

    pub fn decode(data: &[u8]) -> DecodeResult<Self> {
        let mut buf = Bytes::copy_from_slice(data);
        need(&buf, ETH_HDR_LEN)?;

        let mut dst = [0u8; 6];
        buf.copy_to_slice(&mut dst);
        let mut src = [0u8; 6];
        buf.copy_to_slice(&mut src);

        let mut ether_type = buf.get_u16();
        let mut vlan = None;
        if ether_type == ETHERTYPE_DOT1Q {
            need(&buf, DOT1Q_LEN)?;
            vlan = Some(Dot1q::from_tci(buf.get_u16()));
            ether_type = buf.get_u16();
        }

        let body = match ether_type {
            ETHERTYPE_IPV4 => Body::Ipv4(Ipv4::decode(&mut buf)?),
            ETHERTYPE_IPV6 => Body::Ipv6(Ipv6::decode(&mut buf)?),
            _ => Body::Other {
                ether_type,
                data: buf,
            },
        };

        Ok(Frame {
            dst: MacAddress::new(dst),
            src: MacAddress::new(src),
            vlan,
            body,
        })
    }
}

// ===== impl Ipv4 =====

impl Ipv4 {
    pub const FLAG_DF: u16 = 0x4000;

    pub fn header_len(&self) -> usize {
        IPV4_HDR_LEN + self.options.len().div_ceil(4) * 4
    }

    fn encode(&self, buf: &mut BytesMut) {
        let l4 = self.l4.encode(&PseudoHeader::V4 {
            src: self.src,
            dst: self.dst,
        });
        let hdr_len = self.header_len();
        let start = buf.len();

        buf.put_u8(0x40 | (hdr_len / 4) as u8);
        buf.put_u8(self.tos);
        buf.put_u16((hdr_len + l4.len()) as u16);
        buf.put_u16(self.id);
        buf.put_u16(self.flags_frag);
        buf.put_u8(self.ttl);
        buf.put_u8(self.l4.protocol(false));
        buf.put_u16(0);
        buf.put_slice(&self.src.octets());
        buf.put_slice(&self.dst.octets());
        buf.put_slice(&self.options);
        buf.put_bytes(0, hdr_len - IPV4_HDR_LEN - self.options.len());

        let mut cksum = Checksum::new();
        cksum.add_bytes(&buf[start..start + hdr_len]);
        buf[start + 10..start + 12].copy_from_slice(&cksum.checksum());

        buf.put_slice(&l4);
    }

    fn decode(buf: &mut Bytes) -> DecodeResult<Self> {
        need(buf, IPV4_HDR_LEN)?;
        let ver_ihl = buf.get_u8();
        if ver_ihl >> 4 != 4 {
            return Err(DecodeError::InvalidVersion(ver_ihl >> 4));
        }
        let hdr_len = usize::from(ver_ihl & 0x0f) * 4;
        if hdr_len < IPV4_HDR_LEN {
            return Err(DecodeError::InvalidHeaderLength(hdr_len));
        }
        let tos = buf.get_u8();
        let total_len = usize::from(buf.get_u16());
        let id = buf.get_u16();
        let flags_frag = buf.get_u16();
        let ttl = buf.get_u8();
        let protocol = buf.get_u8();
        let _checksum = buf.get_u16();
        let src = Ipv4Addr::from(buf.get_u32());
        let dst = Ipv4Addr::from(buf.get_u32());

        let opt_len = hdr_len - IPV4_HDR_LEN;
        need(buf, opt_len)?;
        let options = buf.split_to(opt_len);

        let payload_len = total_len.saturating_sub(hdr_len);
        need(buf, payload_len)?;
        let mut payload = buf.split_to(payload_len);
        let l4 = L4::decode(protocol, false, &mut payload)?;

        Ok(Ipv4 {
            tos,
            id,
            flags_frag,
            ttl,
            src,
            dst,
            options,
            l4,
        })
    }
}

// ===== impl Ipv6 =====

impl Ipv6 {
    fn encode(&self, buf: &mut BytesMut) {
        let l4 = self.l4.encode(&PseudoHeader::V6 {
            src: self.src,
            dst: self.dst,
        });
        let first = (6u32 << 28) | (u32::from(self.traffic_class) << 20) | (self.flow_label & 0xfffff);
        buf.put_u32(first);
        buf.put_u16(l4.len() as u16);
        buf.put_u8(self.l4.protocol(true));
        buf.put_u8(self.hop_limit);
        buf.put_slice(&self.src.octets());
        buf.put_slice(&self.dst.octets());
        buf.put_slice(&l4);
    }

    fn decode(buf: &mut Bytes) -> DecodeResult<Self> {
        need(buf, IPV6_HDR_LEN)?;
        let first = buf.get_u32();
        if first >> 28 != 6 {
            return Err(DecodeError::InvalidVersion((first >> 28) as u8));
        }
        let payload_len = usize::from(buf.get_u16());
        let next_header = buf.get_u8();
        let hop_limit = buf.get_u8();
        let src = Ipv6Addr::from(buf.get_u128());
        let dst = Ipv6Addr::from(buf.get_u128());

        need(buf, payload_len)?;
        let mut payload = buf.split_to(payload_len);
        let l4 = L4::decode(next_header, true, &mut payload)?;

        Ok(Ipv6 {
            traffic_class: ((first >> 20) & 0xff) as u8,
            flow_label: first & 0xfffff,
            hop_limit,
            src,
            dst,
            l4,
        })
    }
}

// ===== impl L4 =====

enum PseudoHeader {
    V4 { src: Ipv4Addr, dst: Ipv4Addr },
    V6 { src: Ipv6Addr, dst: Ipv6Addr },
}

impl PseudoHeader {
    fn add_to(&self, cksum: &mut Checksum, protocol: u8, len: usize) {
        match self {
            PseudoHeader::V4 { src, dst } => {
                cksum.add_bytes(&src.octets());
                cksum.add_bytes(&dst.octets());
                cksum.add_bytes(&[0, protocol]);
                cksum.add_bytes(&(len as u16).to_be_bytes());
            }
            PseudoHeader::V6 { src, dst } => {
                cksum.add_bytes(&src.octets());
                cksum.add_bytes(&dst.octets());
                cksum.add_bytes(&(len as u32).to_be_bytes());
                cksum.add_bytes(&[0, 0, 0, protocol]);
            }
        }
    }

    fn is_v6(&self) -> bool {
        matches!(self, PseudoHeader::V6 { .. })
    }
}

impl L4 {
    pub fn protocol(&self, is_v6: bool) -> u8 {
        match self {
            L4::Tcp(_) => IPPROTO_TCP,
            L4::Udp(_) => IPPROTO_UDP,
            L4::Icmp(_) if is_v6 => IPPROTO_ICMPV6,
            L4::Icmp(_) => IPPROTO_ICMP,
            L4::Other { protocol, .. } => *protocol,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            L4::Tcp(t) => TCP_HDR_LEN + t.payload.len(),
            L4::Udp(u) => UDP_HDR_LEN + u.payload.len(),
            L4::Icmp(i) => ICMP_HDR_LEN + i.rest.len(),
            L4::Other { data, .. } => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn encode(&self, pseudo: &PseudoHeader) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.len());
        let cksum_at = match self {
            L4::Tcp(t) => {
                buf.put_u16(t.sport);
                buf.put_u16(t.dport);
                buf.put_u32(t.seq);
                buf.put_u32(t.ack);
                buf.put_u8(((TCP_HDR_LEN / 4) as u8) << 4);
                buf.put_u8(t.flags);
                buf.put_u16(t.window);
                buf.put_u16(0);
                buf.put_u16(0);
                buf.put_slice(&t.payload);
                Some(16)
            }
            L4::Udp(u) => {
                buf.put_u16(u.sport);
                buf.put_u16(u.dport);
                buf.put_u16((UDP_HDR_LEN + u.payload.len()) as u16);
                buf.put_u16(0);
                buf.put_slice(&u.payload);
                Some(6)
            }
            L4::Icmp(i) => {
                buf.put_u8(i.icmp_type);
                buf.put_u8(i.code);
                buf.put_u16(0);
                buf.put_slice(&i.rest);
                Some(2)
            }
            L4::Other { data, .. } => {
                buf.put_slice(data);
                None
            }
        };

        if let Some(at) = cksum_at {
            let mut cksum = Checksum::new();
            // ICMPv4 is the only one without a pseudo header.
            let icmpv4 = matches!(self, L4::Icmp(_)) && !pseudo.is_v6();
            if !icmpv4 {
                pseudo.add_to(&mut cksum, self.protocol(pseudo.is_v6()), buf.len());
            }
            cksum.add_bytes(&buf);
            let mut value = cksum.checksum();
            if matches!(self, L4::Udp(_)) && value == [0, 0] {
                value = [0xff, 0xff];
            }
            buf[at..at + 2].copy_from_slice(&value);
        }
        buf.freeze()
    }

    fn decode(protocol: u8, is_v6: bool, buf: &mut Bytes) -> DecodeResult<Self> {
        let l4 = match protocol {
            IPPROTO_TCP => {
                need(buf, TCP_HDR_LEN)?;
                let sport = buf.get_u16();
                let dport = buf.get_u16();
                let seq = buf.get_u32();
                let ack = buf.get_u32();
                let hdr_len = usize::from(buf.get_u8() >> 4) * 4;
                if hdr_len < TCP_HDR_LEN {
                    return Err(DecodeError::InvalidHeaderLength(hdr_len));
                }
                let flags = buf.get_u8();
                let window = buf.get_u16();
                let _checksum = buf.get_u16();
                let _urgent = buf.get_u16();
                need(buf, hdr_len - TCP_HDR_LEN)?;
                buf.advance(hdr_len - TCP_HDR_LEN);
                L4::Tcp(Tcp {
                    sport,
                    dport,
                    seq,
                    ack,
                    flags,
                    window,
                    payload: buf.split_off(0),
                })
            }
            IPPROTO_UDP => {
                need(buf, UDP_HDR_LEN)?;
                let sport = buf.get_u16();
                let dport = buf.get_u16();
                let _len = buf.get_u16();
                let _checksum = buf.get_u16();
                L4::Udp(Udp {
                    sport,
                    dport,
                    payload: buf.split_off(0),
                })
            }
            IPPROTO_ICMP | IPPROTO_ICMPV6 if (protocol == IPPROTO_ICMPV6) == is_v6 => {
                need(buf, ICMP_HDR_LEN)?;
                let icmp_type = buf.get_u8();
                let code = buf.get_u8();
                let _checksum = buf.get_u16();
                L4::Icmp(Icmp {
                    icmp_type,
                    code,
                    rest: buf.split_off(0),
                })
            }
            _ => L4::Other {
                protocol,
                data: buf.split_off(0),
            },
        };
        Ok(l4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn verify_cksum(data: &[u8]) -> bool {
        let mut cksum = Checksum::new();
        cksum.add_bytes(data);
        cksum.checksum() == [0, 0]
    }

    fn sample_v4() -> Frame {
        Frame {
            dst: "00:01:02:03:04:05".parse().unwrap(),
            src: "00:06:07:08:09:0a".parse().unwrap(),
            vlan: None,
            body: Body::Ipv4(Ipv4 {
                tos: 0,
                id: 1,
                flags_frag: 0,
                ttl: 64,
                src: "192.168.0.1".parse().unwrap(),
                dst: "192.168.0.2".parse().unwrap(),
                options: Bytes::new(),
                l4: L4::Tcp(Tcp {
                    sport: 1234,
                    dport: 80,
                    seq: 0,
                    ack: 0,
                    flags: 0x02,
                    window: 8192,
                    payload: Bytes::from_static(&[0xaa; 46]),
                }),
            }),
        }
    }

    #[test]
    fn test_ipv4_header_layout() {
        let bytes = sample_v4().encode();
        assert_eq!(bytes.len(), 100);
        assert_eq!(&bytes[12..14], &[0x08, 0x00]);
        // version/ihl, total length, ttl, protocol
        assert_eq!(bytes[14], 0x45);
        assert_eq!(u16::from_be_bytes([bytes[16], bytes[17]]), 86);
        assert_eq!(bytes[22], 64);
        assert_eq!(bytes[23], IPPROTO_TCP);
        assert!(verify_cksum(&bytes[14..34]));
    }

    #[test]
    fn test_tcp_checksum_includes_pseudo_header() {
        let bytes = sample_v4().encode();
        let mut cksum = Checksum::new();
        cksum.add_bytes(&bytes[26..34]);
        cksum.add_bytes(&[0, IPPROTO_TCP]);
        cksum.add_bytes(&66u16.to_be_bytes());
        cksum.add_bytes(&bytes[34..]);
        assert_eq!(cksum.checksum(), [0, 0]);
    }

    #[test]
    fn test_decode_tagged_frame() {
        let mut frame = sample_v4();
        frame.vlan = Some(Dot1q::new(100));
        let bytes = frame.encode();
        assert_eq!(&bytes[12..16], &[0x81, 0x00, 0x00, 0x64]);
        let decoded = Frame::decode(&bytes).unwrap();
        assert_eq!(decoded, frame);
        assert_eq!(decoded.l4_offset(), Some(38));
    }

    #[test]
    fn test_ipv6_udp_decode() {
        let frame = Frame {
            dst: "00:01:02:03:04:05".parse().unwrap(),
            src: "00:06:07:08:09:0a".parse().unwrap(),
            vlan: None,
            body: Body::Ipv6(Ipv6 {
                traffic_class: 0,
                flow_label: 0,
                hop_limit: 64,
                src: "2001:db8::1".parse().unwrap(),
                dst: "2001:db8::2".parse().unwrap(),
                l4: L4::Udp(Udp {
                    sport: 1234,
                    dport: 80,
                    payload: Bytes::from_static(b"hello"),
                }),
            }),
        };
        let bytes = frame.encode();
        assert_eq!(bytes.len(), 14 + 40 + 8 + 5);
        assert_eq!(Frame::decode(&bytes).unwrap(), frame);
        assert_eq!(frame.ttl(), Some(64));
        assert_eq!(frame.l4_ports(), Some((1234, 80)));
    }

    #[test]
    fn test_ip_options_are_padded() {
        let mut frame = sample_v4();
        if let Body::Ipv4(ip) = &mut frame.body {
            ip.options = Bytes::from_static(&[0x94, 0x04, 0x00]);
        }
        assert!(frame.has_ip_options());
        let bytes = frame.encode();
        assert_eq!(bytes[14], 0x46);
        assert!(verify_cksum(&bytes[14..38]));
    }

    #[test]
    fn test_truncated_frame() {
        let bytes = sample_v4().encode();
        let err = Frame::decode(&bytes[..30]).unwrap_err();
        assert!(matches!(err, DecodeError::InsufficientData { .. }));
    }
}
