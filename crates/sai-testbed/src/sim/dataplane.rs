//! Forwarding for the simulated switch.
//!
//! A frame is decided against the dataplane copy of the configuration and
//! the decision is realised concretely: among several candidates exactly
//! one is picked by a seeded flow hash weighted by candidate weight, drops
//! bump the debug counters covering their reason, and CPU redirects are
//! wrapped in the CPU header.

use super::SimulatedSwitch;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use sai_api::*;
use sai_harness::oracle::{Candidate, Expectation};
use sai_harness::packet::{CpuPacket, Frame};
use sai_harness::topology::TopologyStore;
use sai_harness::traffic::{ObservedFrame, PacketTransport, TrafficError};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

/// Deliberate misbehaviour, for checking that the harness notices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Nothing comes out.
    Blackhole,
    /// Frames leave on the next front-panel port.
    WrongPort,
    /// The last byte of every frame is flipped.
    CorruptPayload,
    /// Every frame comes out twice.
    Duplicate,
    /// CPU redirects carry the wrong reason code.
    WrongReason,
}

/// Seeded hash of the header fields that identify a flow.
pub(crate) fn flow_hash(seed: u64, frame: &Frame) -> u64 {
    let mut h = DefaultHasher::new();
    seed.hash(&mut h);
    frame.ip_src().hash(&mut h);
    frame.ip_dst().hash(&mut h);
    frame.ip_protocol().hash(&mut h);
    frame.l4_ports().hash(&mut h);
    h.finish()
}

/// Weighted pick; zero total weight falls back to an even pick.
pub(crate) fn pick(candidates: &[Candidate], hash: u64) -> Option<&Candidate> {
    if candidates.is_empty() {
        return None;
    }
    let total: u128 = candidates.iter().map(|c| u128::from(c.weight)).sum();
    if total == 0 {
        return candidates.get((hash % candidates.len() as u64) as usize);
    }
    let mut point = u128::from(hash) % total;
    for c in candidates {
        let w = u128::from(c.weight);
        if point < w {
            return Some(c);
        }
        point -= w;
    }
    candidates.last()
}

impl SimulatedSwitch {
    fn forward(&self, ingress: PortOid, data: &[u8]) -> Result<Vec<ObservedFrame>, TrafficError> {
        let store = self.inner.dataplane.read();
        if ingress == self.inner.cpu_port || store.port(ingress).is_none() {
            return Err(TrafficError::PortUnavailable(ingress));
        }
        self.bump(ingress.id(), CounterId::InPackets, 1);

        let frame = match Frame::decode(data) {
            Ok(f) => f,
            Err(e) => {
                debug!("SimulatedSwitch: undecodable frame on {}: {}", ingress, e);
                self.bump(ingress.id(), CounterId::InDiscards, 1);
                return Ok(Vec::new());
            }
        };
        let decision = match self.inner.oracle.expect(&store, ingress, &frame) {
            Ok(d) => d,
            Err(e) => {
                warn!("SimulatedSwitch: cannot forward on {}: {}", ingress, e);
                return Ok(Vec::new());
            }
        };
        trace!("SimulatedSwitch: {} -> {}", ingress, decision);

        let hash = flow_hash(self.inner.config.seed, &frame);
        let out = match decision {
            Expectation::ExactOn(c) => vec![emit(&c)],
            Expectation::AnyOneOf(cs) => pick(&cs, hash).map(emit).into_iter().collect(),
            Expectation::AllOf(ds) => ds
                .iter()
                .filter_map(|d| pick(&d.candidates, hash))
                .map(emit)
                .collect(),
            Expectation::RedirectToCpu { reason, frame } => vec![ObservedFrame {
                port: self.inner.cpu_port,
                data: CpuPacket {
                    reason,
                    ingress_port: ingress.id(),
                    frame: frame.encode(),
                }
                .encode(),
            }],
            Expectation::NoOutput { cause } => {
                if let Some(reason) = cause.reason() {
                    self.count_drop(&store, ingress, reason);
                }
                Vec::new()
            }
        };
        Ok(out)
    }

    fn count_drop(&self, store: &TopologyStore, ingress: PortOid, reason: DropReason) {
        let discard = match reason.stage() {
            CounterStage::Ingress => CounterId::InDiscards,
            CounterStage::Egress => CounterId::OutDiscards,
        };
        self.bump(ingress.id(), discard, 1);

        let switch = store.switch().map(|(s, _)| s.id());
        for id in store.objects_of_kind(ObjectKind::DebugCounter) {
            let Some(ObjectSpec::DebugCounter(attrs)) = store.get(id) else {
                continue;
            };
            if !attrs.reasons.contains(&reason) {
                continue;
            }
            let Some(index) = self.inner.counter_index.lock().get(&id).copied() else {
                continue;
            };
            let object = match attrs.scope {
                CounterScope::Port => Some(ingress.id()),
                CounterScope::Switch => switch,
            };
            if let Some(object) = object {
                self.bump(object, CounterId::for_debug_counter(attrs.stage, index), 1);
            }
        }
    }

    fn apply_fault(&self, fault: Fault, out: Vec<ObservedFrame>) -> Vec<ObservedFrame> {
        match fault {
            Fault::Blackhole => Vec::new(),
            Fault::WrongPort => out
                .into_iter()
                .map(|mut f| {
                    let ports = &self.inner.front_ports;
                    if let Some(i) = ports.iter().position(|p| *p == f.port) {
                        f.port = ports[(i + 1) % ports.len()];
                    }
                    f
                })
                .collect(),
            Fault::CorruptPayload => out
                .into_iter()
                .map(|mut f| {
                    let mut data = BytesMut::from(&f.data[..]);
                    if let Some(last) = data.last_mut() {
                        *last ^= 0xff;
                    }
                    f.data = data.freeze();
                    f
                })
                .collect(),
            Fault::Duplicate => out.into_iter().flat_map(|f| [f.clone(), f]).collect(),
            Fault::WrongReason => out
                .into_iter()
                .map(|mut f| {
                    if let Ok(mut pkt) = CpuPacket::decode(&f.data) {
                        pkt.reason = match pkt.reason {
                            CpuReason::Ip2Me => CpuReason::Glean,
                            _ => CpuReason::Ip2Me,
                        };
                        f.data = pkt.encode();
                    }
                    f
                })
                .collect(),
        }
    }
}

fn emit(c: &Candidate) -> ObservedFrame {
    ObservedFrame {
        port: c.port,
        data: c.frame.encode(),
    }
}

#[async_trait]
impl PacketTransport for SimulatedSwitch {
    async fn send(&self, port: PortOid, data: Bytes) -> Result<(), TrafficError> {
        let mut out = self.forward(port, &data)?;
        if let Some(fault) = *self.inner.fault.lock() {
            out = self.apply_fault(fault, out);
        }
        for frame in out {
            if frame.port != self.inner.cpu_port {
                self.bump(frame.port.id(), CounterId::OutPackets, 1);
            }
            // no subscribers is not an error
            let _ = self.inner.tx.send(frame);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<ObservedFrame> {
        self.inner.tx.subscribe()
    }

    fn cpu_port(&self) -> PortOid {
        self.inner.cpu_port
    }
}

#[cfg(test)]
mod tests {
    use super::super::SimConfig;
    use super::*;
    use pretty_assertions::assert_eq;
    use sai_harness::packet::tcp_packet;
    use std::collections::BTreeMap;

    fn port(n: u64) -> PortOid {
        PortOid::new_unchecked(ObjectId::compose(ObjectKind::Port, n))
    }

    fn candidate(n: u64, weight: u64) -> Candidate {
        Candidate {
            port: port(n),
            frame: tcp_packet().build().unwrap(),
            weight,
        }
    }

    #[test]
    fn test_pick_follows_weights() {
        let cs = vec![candidate(1, 1), candidate(2, 3)];
        assert_eq!(pick(&cs, 0).map(|c| c.port), Some(port(1)));
        assert_eq!(pick(&cs, 1).map(|c| c.port), Some(port(2)));
        assert_eq!(pick(&cs, 3).map(|c| c.port), Some(port(2)));
        assert_eq!(pick(&cs, 4).map(|c| c.port), Some(port(1)));
        assert!(pick(&[], 7).is_none());

        let even = vec![candidate(1, 0), candidate(2, 0)];
        assert_eq!(pick(&even, 1).map(|c| c.port), Some(port(2)));

        // shares past u64 still pick by weight
        let huge = vec![candidate(1, u64::MAX), candidate(2, u64::MAX)];
        assert_eq!(pick(&huge, u64::MAX - 1).map(|c| c.port), Some(port(1)));
    }

    #[test]
    fn test_flow_hash_spreads_and_is_seeded() {
        let frames: Vec<Frame> = (0..400u16)
            .map(|i| tcp_packet().sport(1024 + i).build().unwrap())
            .collect();
        let cs = vec![candidate(1, 1), candidate(2, 1)];
        let mut hits: BTreeMap<PortOid, usize> = BTreeMap::new();
        for f in &frames {
            let c = pick(&cs, flow_hash(3, f)).unwrap();
            *hits.entry(c.port).or_insert(0) += 1;
        }
        assert!(hits.values().all(|n| *n > 120));
        assert_ne!(flow_hash(1, &frames[0]), flow_hash(2, &frames[0]));
        assert_eq!(flow_hash(1, &frames[0]), flow_hash(1, &frames[0]));
    }

    #[tokio::test]
    async fn test_cpu_port_and_unknown_ports_are_unavailable() {
        let sim = SimulatedSwitch::new(SimConfig {
            ports: 2,
            ..SimConfig::default()
        })
        .unwrap();
        let data = tcp_packet().build().unwrap().encode();
        let cpu = sim.cpu_port();
        assert_eq!(
            sim.send(cpu, data.clone()).await,
            Err(TrafficError::PortUnavailable(cpu))
        );
        assert_eq!(
            sim.send(port(42), data).await,
            Err(TrafficError::PortUnavailable(port(42)))
        );
    }

    #[tokio::test]
    async fn test_drop_counts_ingress_discard() {
        let sim = SimulatedSwitch::new(SimConfig {
            ports: 2,
            ..SimConfig::default()
        })
        .unwrap();
        // front ports are not VLAN members until configured
        let p = sim.ports()[0];
        sim.send(p, tcp_packet().build().unwrap().encode())
            .await
            .unwrap();
        let values = sim
            .get_counters(p.id(), &[CounterId::InPackets, CounterId::InDiscards])
            .await
            .unwrap();
        assert_eq!(values, vec![1, 1]);
    }
}
