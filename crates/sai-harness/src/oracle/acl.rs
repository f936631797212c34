//! ACL rule matching.

use crate::packet::Frame;
use crate::topology::TopologyStore;
use sai_api::{AclAction, AclMatch, AclTableOid};

/// Whether `frame` satisfies every populated field of `m`.
pub(crate) fn matches(m: &AclMatch, frame: &Frame) -> bool {
    if let Some(dst_mac) = m.dst_mac {
        if frame.dst != dst_mac {
            return false;
        }
    }
    if let Some(ether_type) = m.ether_type {
        if frame.ether_type() != ether_type {
            return false;
        }
    }
    if let Some(prefix) = m.src_ip {
        if !frame.ip_src().is_some_and(|ip| prefix.contains(&ip)) {
            return false;
        }
    }
    if let Some(prefix) = m.dst_ip {
        if !frame.ip_dst().is_some_and(|ip| prefix.contains(&ip)) {
            return false;
        }
    }
    if let Some(proto) = m.ip_protocol {
        if frame.ip_protocol() != Some(proto) {
            return false;
        }
    }
    if m.l4_src_port.is_some() || m.l4_dst_port.is_some() {
        let Some((sport, dport)) = frame.l4_ports() else {
            return false;
        };
        if m.l4_src_port.is_some_and(|p| p != sport) || m.l4_dst_port.is_some_and(|p| p != dport) {
            return false;
        }
    }
    true
}

/// Action of the highest-priority entry in `table` matching `frame`.
pub(crate) fn evaluate(store: &TopologyStore, table: AclTableOid, frame: &Frame) -> Option<AclAction> {
    store
        .acl_entries(table)
        .into_iter()
        .find(|e| matches(&e.matcher, frame))
        .map(|e| e.action)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{tcp_packet, udp_packet, IPPROTO_TCP};

    #[test]
    fn test_wildcard_matches_everything() {
        let frame = tcp_packet().build().unwrap();
        assert!(matches(&AclMatch::default(), &frame));
    }

    #[test]
    fn test_fields_are_anded() {
        let frame = tcp_packet()
            .ip_dst("10.0.0.5".parse().unwrap())
            .dport(443)
            .build()
            .unwrap();
        let mut m = AclMatch {
            dst_ip: Some("10.0.0.0/24".parse().unwrap()),
            ip_protocol: Some(IPPROTO_TCP),
            l4_dst_port: Some(443),
            ..Default::default()
        };
        assert!(matches(&m, &frame));

        m.l4_dst_port = Some(80);
        assert!(!matches(&m, &frame));
    }

    #[test]
    fn test_protocol_mismatch() {
        let frame = udp_packet().build().unwrap();
        let m = AclMatch {
            ip_protocol: Some(IPPROTO_TCP),
            ..Default::default()
        };
        assert!(!matches(&m, &frame));
    }
}
