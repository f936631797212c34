//! Test frame builders.
//!
//! Defaults mirror the classic PTF helpers so expected frames written by
//! hand line up with those from other suites: 100-byte frames from
//! `00:06:07:08:09:0a` to `00:01:02:03:04:05`, `192.168.0.1 -> 192.168.0.2`,
//! TTL 64, TCP `1234 -> 80`, padded with an incrementing byte pattern.
//!
//! ```
//! use sai_harness::packet::tcp_packet;
//!
//! let frame = tcp_packet()
//!     .eth_dst("00:77:66:55:44:00".parse().unwrap())
//!     .ip_dst("10.10.10.1".parse().unwrap())
//!     .ttl(64)
//!     .build()
//!     .unwrap();
//! assert_eq!(frame.len(), 100);
//! ```

use super::frame::*;
use bytes::Bytes;
use sai_types::MacAddress;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use thiserror::Error;

pub const DEFAULT_PKTLEN: usize = 100;
pub const DEFAULT_ETH_DST: MacAddress = MacAddress::new([0x00, 0x01, 0x02, 0x03, 0x04, 0x05]);
pub const DEFAULT_ETH_SRC: MacAddress = MacAddress::new([0x00, 0x06, 0x07, 0x08, 0x09, 0x0a]);
pub const DEFAULT_IP_SRC: Ipv4Addr = Ipv4Addr::new(192, 168, 0, 1);
pub const DEFAULT_IP_DST: Ipv4Addr = Ipv4Addr::new(192, 168, 0, 2);
pub const DEFAULT_IPV6_SRC: Ipv6Addr = Ipv6Addr::new(0x2001, 0xdb8, 0x85a3, 0, 0, 0x8a2e, 0x370, 0x7334);
pub const DEFAULT_IPV6_DST: Ipv6Addr = Ipv6Addr::new(0x2001, 0xdb8, 0x85a3, 0, 0, 0x8a2e, 0x370, 0x7335);
pub const DEFAULT_TTL: u8 = 64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("source {src} and destination {dst} are of different address families")]
    FamilyMismatch { src: IpAddr, dst: IpAddr },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Proto {
    Tcp,
    Udp,
    Icmp,
}

/// Builder for a single test frame.
#[derive(Debug, Clone)]
pub struct PacketBuilder {
    proto: Proto,
    pktlen: usize,
    eth_dst: MacAddress,
    eth_src: MacAddress,
    vlan: Option<Dot1q>,
    ip_src: IpAddr,
    ip_dst: IpAddr,
    tos: u8,
    ttl: u8,
    ip_id: u16,
    ip_options: Bytes,
    sport: u16,
    dport: u16,
    tcp_flags: u8,
    icmp_type: Option<u8>,
    icmp_code: u8,
}

/// IPv4 TCP frame.
pub fn tcp_packet() -> PacketBuilder {
    PacketBuilder::new(Proto::Tcp, IpAddr::V4(DEFAULT_IP_SRC), IpAddr::V4(DEFAULT_IP_DST))
}

/// IPv6 TCP frame.
pub fn tcpv6_packet() -> PacketBuilder {
    PacketBuilder::new(
        Proto::Tcp,
        IpAddr::V6(DEFAULT_IPV6_SRC),
        IpAddr::V6(DEFAULT_IPV6_DST),
    )
}

/// IPv4 UDP frame.
pub fn udp_packet() -> PacketBuilder {
    PacketBuilder::new(Proto::Udp, IpAddr::V4(DEFAULT_IP_SRC), IpAddr::V4(DEFAULT_IP_DST))
}

/// IPv6 UDP frame.
pub fn udpv6_packet() -> PacketBuilder {
    PacketBuilder::new(
        Proto::Udp,
        IpAddr::V6(DEFAULT_IPV6_SRC),
        IpAddr::V6(DEFAULT_IPV6_DST),
    )
}

/// ICMP echo request; ICMPv6 when the addresses are IPv6.
pub fn icmp_packet() -> PacketBuilder {
    PacketBuilder::new(Proto::Icmp, IpAddr::V4(DEFAULT_IP_SRC), IpAddr::V4(DEFAULT_IP_DST))
}

impl PacketBuilder {
    fn new(proto: Proto, ip_src: IpAddr, ip_dst: IpAddr) -> Self {
        Self {
            proto,
            pktlen: DEFAULT_PKTLEN,
            eth_dst: DEFAULT_ETH_DST,
            eth_src: DEFAULT_ETH_SRC,
            vlan: None,
            ip_src,
            ip_dst,
            tos: 0,
            ttl: DEFAULT_TTL,
            ip_id: 1,
            ip_options: Bytes::new(),
            sport: 1234,
            dport: 80,
            tcp_flags: 0x02,
            icmp_type: None,
            icmp_code: 0,
        }
    }

    /// Total frame length; the payload is padded up to it.
    pub fn pktlen(mut self, len: usize) -> Self {
        self.pktlen = len;
        self
    }

    pub fn eth_dst(mut self, mac: MacAddress) -> Self {
        self.eth_dst = mac;
        self
    }

    pub fn eth_src(mut self, mac: MacAddress) -> Self {
        self.eth_src = mac;
        self
    }

    pub fn vlan(mut self, vid: u16) -> Self {
        self.vlan = Some(Dot1q::new(vid));
        self
    }

    pub fn vlan_pcp(mut self, pcp: u8) -> Self {
        let mut tag = self.vlan.unwrap_or_else(|| Dot1q::new(0));
        tag.pcp = pcp;
        self.vlan = Some(tag);
        self
    }

    pub fn ip_src(mut self, ip: IpAddr) -> Self {
        self.ip_src = ip;
        self
    }

    pub fn ip_dst(mut self, ip: IpAddr) -> Self {
        self.ip_dst = ip;
        self
    }

    pub fn tos(mut self, tos: u8) -> Self {
        self.tos = tos;
        self
    }

    /// TTL for IPv4 or hop limit for IPv6.
    pub fn ttl(mut self, ttl: u8) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn ip_id(mut self, id: u16) -> Self {
        self.ip_id = id;
        self
    }

    /// Raw IPv4 options. Ignored for IPv6.
    pub fn ip_options(mut self, options: &[u8]) -> Self {
        self.ip_options = Bytes::copy_from_slice(options);
        self
    }

    pub fn sport(mut self, port: u16) -> Self {
        self.sport = port;
        self
    }

    pub fn dport(mut self, port: u16) -> Self {
        self.dport = port;
        self
    }

    pub fn tcp_flags(mut self, flags: u8) -> Self {
        self.tcp_flags = flags;
        self
    }

    pub fn icmp_type(mut self, icmp_type: u8, code: u8) -> Self {
        self.icmp_type = Some(icmp_type);
        self.icmp_code = code;
        self
    }

    pub fn build(&self) -> Result<Frame, BuildError> {
        let mut frame = Frame {
            dst: self.eth_dst,
            src: self.eth_src,
            vlan: self.vlan,
            body: self.body(Bytes::new())?,
        };
        let pad = self.pktlen.saturating_sub(frame.len());
        if pad > 0 {
            let pattern: Vec<u8> = (0..pad).map(|i| (i % 256) as u8).collect();
            frame.body = self.body(Bytes::from(pattern))?;
        }
        Ok(frame)
    }

    fn l4(&self, payload: Bytes, is_v6: bool) -> L4 {
        match self.proto {
            Proto::Tcp => L4::Tcp(Tcp {
                sport: self.sport,
                dport: self.dport,
                seq: 0,
                ack: 0,
                flags: self.tcp_flags,
                window: 8192,
                payload,
            }),
            Proto::Udp => L4::Udp(Udp {
                sport: self.sport,
                dport: self.dport,
                payload,
            }),
            Proto::Icmp => {
                let echo_request = if is_v6 { 128 } else { 8 };
                let mut rest = vec![0u8, 0, 0, 0];
                rest.extend_from_slice(&payload);
                L4::Icmp(Icmp {
                    icmp_type: self.icmp_type.unwrap_or(echo_request),
                    code: self.icmp_code,
                    rest: Bytes::from(rest),
                })
            }
        }
    }

    fn body(&self, payload: Bytes) -> Result<Body, BuildError> {
        match (self.ip_src, self.ip_dst) {
            (IpAddr::V4(src), IpAddr::V4(dst)) => Ok(Body::Ipv4(Ipv4 {
                tos: self.tos,
                id: self.ip_id,
                flags_frag: 0,
                ttl: self.ttl,
                src,
                dst,
                options: self.ip_options.clone(),
                l4: self.l4(payload, false),
            })),
            (IpAddr::V6(src), IpAddr::V6(dst)) => Ok(Body::Ipv6(Ipv6 {
                traffic_class: self.tos,
                flow_label: 0,
                hop_limit: self.ttl,
                src,
                dst,
                l4: self.l4(payload, true),
            })),
            (src, dst) => Err(BuildError::FamilyMismatch { src, dst }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let frame = tcp_packet().build().unwrap();
        assert_eq!(frame.len(), DEFAULT_PKTLEN);
        assert_eq!(frame.dst, DEFAULT_ETH_DST);
        assert_eq!(frame.ttl(), Some(64));
        assert_eq!(frame.l4_ports(), Some((1234, 80)));
        assert_eq!(frame.ip_dst(), Some(IpAddr::V4(DEFAULT_IP_DST)));
        let bytes = frame.encode();
        assert_eq!(bytes.len(), DEFAULT_PKTLEN);
        // padding starts right after the 54 bytes of headers
        assert_eq!(&bytes[54..58], &[0, 1, 2, 3]);
    }

    #[test]
    fn test_tagged_frame_keeps_pktlen() {
        let frame = udp_packet().vlan(10).build().unwrap();
        assert_eq!(frame.len(), DEFAULT_PKTLEN);
        assert_eq!(frame.vlan.map(|t| t.vid), Some(10));
    }

    #[test]
    fn test_v6_builders() {
        let frame = tcpv6_packet().ttl(2).build().unwrap();
        assert_eq!(frame.ttl(), Some(2));
        assert_eq!(frame.len(), DEFAULT_PKTLEN);

        let icmp = icmp_packet()
            .ip_src("2001:db8::1".parse().unwrap())
            .ip_dst("2001:db8::2".parse().unwrap())
            .build()
            .unwrap();
        assert_eq!(icmp.ip_protocol(), Some(IPPROTO_ICMPV6));
    }

    #[test]
    fn test_family_mismatch() {
        let err = tcp_packet()
            .ip_dst("2001:db8::2".parse().unwrap())
            .build()
            .unwrap_err();
        assert!(matches!(err, BuildError::FamilyMismatch { .. }));
    }

    #[test]
    fn test_oversized_headers_are_not_truncated() {
        let frame = tcp_packet().pktlen(20).build().unwrap();
        assert_eq!(frame.len(), 54);
    }
}
