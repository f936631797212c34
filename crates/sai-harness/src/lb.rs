//! Weighted load-balance checks for ECMP groups and LAGs.
//!
//! One packet per flow is sent from a fixed ingress; the egress port of
//! each is bucketed and every member must receive at least
//! `floor(w / W * scaling * N)` of the `N` flows, where `w` is its weight
//! and `W` the total. Members outside the expected set must receive none.

use crate::config::LoadBalanceSettings;
use crate::error::HarnessResult;
use crate::oracle::{Candidate, Expectation};
use crate::packet::{Body, Frame, L4};
use crate::session::{Probe, Session};
use crate::traffic::ObservedFrame;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sai_api::*;
use sai_types::{IpAddr, IpPrefix, Ipv4Addr, Ipv6Addr};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};

/// Header fields that make up a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlowKey {
    pub src_ip: IpAddr,
    pub dst_ip: IpAddr,
    pub sport: u16,
    pub dport: u16,
}

impl FlowKey {
    /// Copy of `template` carrying this flow's addresses and ports. Fields
    /// the template has no room for (e.g. ports on ICMP) are left alone.
    pub fn apply(&self, template: &Frame) -> Frame {
        let mut frame = template.clone();
        let l4 = match (&mut frame.body, self.src_ip, self.dst_ip) {
            (Body::Ipv4(ip), IpAddr::V4(src), IpAddr::V4(dst)) => {
                ip.src = src;
                ip.dst = dst;
                &mut ip.l4
            }
            (Body::Ipv6(ip), IpAddr::V6(src), IpAddr::V6(dst)) => {
                ip.src = src;
                ip.dst = dst;
                &mut ip.l4
            }
            _ => return frame,
        };
        match l4 {
            L4::Tcp(t) => {
                t.sport = self.sport;
                t.dport = self.dport;
            }
            L4::Udp(u) => {
                u.sport = self.sport;
                u.dport = self.dport;
            }
            L4::Icmp(_) | L4::Other { .. } => {}
        }
        frame
    }
}

/// Seeded generator of distinct flow keys within a source and a
/// destination prefix.
#[derive(Debug)]
pub struct FlowKeySpace {
    rng: StdRng,
    src: IpPrefix,
    dst: IpPrefix,
    seen: HashSet<FlowKey>,
}

impl FlowKeySpace {
    pub fn new(seed: u64, src: IpPrefix, dst: IpPrefix) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            src,
            dst,
            seen: HashSet::new(),
        }
    }

    pub fn next_key(&mut self) -> FlowKey {
        loop {
            let key = FlowKey {
                src_ip: random_host(&mut self.rng, &self.src),
                dst_ip: random_host(&mut self.rng, &self.dst),
                sport: self.rng.gen_range(1024..=u16::MAX),
                dport: self.rng.gen_range(1024..=u16::MAX),
            };
            if self.seen.insert(key) {
                return key;
            }
        }
    }

    pub fn keys(&mut self, n: usize) -> Vec<FlowKey> {
        (0..n).map(|_| self.next_key()).collect()
    }
}

fn random_host(rng: &mut StdRng, prefix: &IpPrefix) -> IpAddr {
    let len = u32::from(prefix.len());
    match prefix.network() {
        IpAddr::V4(net) => {
            let host_mask = u32::MAX.checked_shr(len).unwrap_or(0);
            IpAddr::V4(Ipv4Addr::from(u32::from(net) | (rng.gen::<u32>() & host_mask)))
        }
        IpAddr::V6(net) => {
            let host_mask = u128::MAX.checked_shr(len).unwrap_or(0);
            IpAddr::V6(Ipv6Addr::from(u128::from(net) | (rng.gen::<u128>() & host_mask)))
        }
    }
}

/// Per-port result of one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bucket {
    pub count: u64,
    /// Expected share; zero for ports that must not be used.
    pub weight: u64,
    pub floor: u64,
}

#[derive(Debug, Clone, Error)]
#[error("{flows} flows, scaling {scaling}:\n{}", render(.histogram))]
pub struct StatisticalFailure {
    pub flows: usize,
    pub scaling: f64,
    pub histogram: BTreeMap<PortOid, Bucket>,
}

fn render(histogram: &BTreeMap<PortOid, Bucket>) -> String {
    histogram
        .iter()
        .map(|(port, b)| {
            let mark = if b.count < b.floor || (b.weight == 0 && b.count > 0) {
                "FAIL"
            } else {
                "ok"
            };
            format!(
                "  {:<24} weight {:>4}  count {:>5}  floor {:>5}  {}",
                port.to_string(),
                b.weight,
                b.count,
                b.floor,
                mark
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Passing result of one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Distribution {
    pub flows: usize,
    pub histogram: BTreeMap<PortOid, Bucket>,
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} flows:\n{}", self.flows, render(&self.histogram))
    }
}

/// Applies the floor rule to observed per-port counts.
pub fn evaluate(
    counts: &BTreeMap<PortOid, u64>,
    weights: &BTreeMap<PortOid, u64>,
    flows: usize,
    scaling: f64,
) -> Result<Distribution, StatisticalFailure> {
    let total: u128 = weights.values().map(|w| u128::from(*w)).sum();
    let permille = (scaling * 1000.0).round().max(0.0) as u128;
    let mut histogram = BTreeMap::new();
    let mut ok = true;

    for (port, weight) in weights {
        let floor = floor(u128::from(*weight), total, permille, flows as u128);
        let count = counts.get(port).copied().unwrap_or(0);
        ok &= count >= floor;
        histogram.insert(
            *port,
            Bucket {
                count,
                weight: *weight,
                floor,
            },
        );
    }
    for (port, count) in counts {
        if !weights.contains_key(port) {
            ok &= *count == 0;
            histogram.insert(
                *port,
                Bucket {
                    count: *count,
                    weight: 0,
                    floor: 0,
                },
            );
        }
    }

    if ok {
        Ok(Distribution { flows, histogram })
    } else {
        Err(StatisticalFailure {
            flows,
            scaling,
            histogram,
        })
    }
}

/// `expected` with every candidate moved onto `port`.
fn any_candidate_on(expected: &Expectation, port: PortOid) -> Expectation {
    Expectation::AnyOneOf(
        expected
            .candidates()
            .iter()
            .map(|c| Candidate {
                port,
                ..c.clone()
            })
            .collect(),
    )
}

/// `weight * flows * scaling / total`, rounded down, with scaling in
/// thousandths so that exact shares do not lose a flow to rounding.
fn floor(weight: u128, total: u128, permille: u128, flows: u128) -> u64 {
    if total == 0 {
        return 0;
    }
    let floor = weight.saturating_mul(permille).saturating_mul(flows) / total.saturating_mul(1000);
    u64::try_from(floor).unwrap_or(u64::MAX)
}

/// A configuration change to a group or LAG between passes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LbMutation {
    /// Enables an ECMP member or un-disables a LAG member's egress.
    Enable(ObjectId),
    Disable(ObjectId),
    AddMember {
        group: NextHopGroupOid,
        next_hop: NextHopOid,
        weight: u32,
    },
    AddLagMember {
        lag: LagOid,
        port: PortOid,
    },
    Remove(ObjectId),
    SetWeight(NextHopGroupMemberOid, u32),
}

impl LbMutation {
    /// Applies the change through `session`. Returns the handle of an
    /// added member.
    pub async fn apply(&self, session: &mut Session) -> HarnessResult<Option<ObjectId>> {
        debug!("LbMutation: {:?}", self);
        match self {
            LbMutation::Enable(id) | LbMutation::Disable(id) => {
                let enable = matches!(self, LbMutation::Enable(_));
                let update = match id.kind() {
                    Some(ObjectKind::NextHopGroupMember) => AttrUpdate::MemberEnabled(enable),
                    Some(ObjectKind::LagMember) => AttrUpdate::EgressDisable(!enable),
                    _ => {
                        return Err(SaiError::invalid_object_type(
                            ObjectKind::NextHopGroupMember,
                            *id,
                        )
                        .into())
                    }
                };
                session.set(*id, update).await?;
                Ok(None)
            }
            LbMutation::AddMember {
                group,
                next_hop,
                weight,
            } => {
                let id = session
                    .create(NextHopGroupMemberAttrs::new(*group, *next_hop, *weight))
                    .await?;
                Ok(Some(id))
            }
            LbMutation::AddLagMember { lag, port } => {
                let id = session.create(LagMemberAttrs::new(*lag, *port)).await?;
                Ok(Some(id))
            }
            LbMutation::Remove(id) => {
                session.remove(*id).await?;
                Ok(None)
            }
            LbMutation::SetWeight(member, weight) => {
                session.set(*member, AttrUpdate::MemberWeight(*weight)).await?;
                Ok(None)
            }
        }
    }
}

/// One distribution check from a fixed ingress.
#[derive(Debug, Clone)]
pub struct LoadBalanceCheck {
    pub ingress: PortOid,
    /// Frame every flow is derived from.
    pub template: Frame,
    pub src: IpPrefix,
    pub dst: IpPrefix,
    pub flows: usize,
    pub scaling: f64,
    pub seed: u64,
}

impl LoadBalanceCheck {
    pub fn new(
        ingress: PortOid,
        template: Frame,
        src: IpPrefix,
        dst: IpPrefix,
        settings: &LoadBalanceSettings,
    ) -> Self {
        Self {
            ingress,
            template,
            src,
            dst,
            flows: settings.flows,
            scaling: settings.scaling,
            seed: settings.seed,
        }
    }

    pub fn with_flows(mut self, flows: usize) -> Self {
        self.flows = flows;
        self
    }

    /// Sends every flow and applies the floor rule to the resulting
    /// histogram. A frame on an expected port must match one of the
    /// candidate rewrites, not necessarily the one for that port; a frame on
    /// any other port is only counted. Misplaced traffic thus fails with the
    /// full distribution.
    pub async fn run(&self, session: &Session) -> HarnessResult<Distribution> {
        let keys = FlowKeySpace::new(self.seed, self.src, self.dst).keys(self.flows);
        let mut counts: BTreeMap<PortOid, u64> = BTreeMap::new();
        let mut weights: Option<BTreeMap<PortOid, u64>> = None;

        for key in &keys {
            let probe = Probe::new(self.ingress, key.apply(&self.template));
            let expected = session.expect(&probe)?;
            let shares = expected.weights();
            let observed = session.send_and_capture(&probe, &expected).await?;
            let (hits, strays): (Vec<ObservedFrame>, Vec<ObservedFrame>) = observed
                .into_iter()
                .partition(|o| shares.is_empty() || shares.contains_key(&o.port));

            for stray in &strays {
                debug!("LoadBalanceCheck: flow {:?} left on {}", key, stray.port);
                *counts.entry(stray.port).or_insert(0) += 1;
            }
            if strays.is_empty() || !hits.is_empty() {
                let check = match hits.as_slice() {
                    [one] if !shares.is_empty() => any_candidate_on(&expected, one.port),
                    _ => expected.clone(),
                };
                let matched = session.verifier().verify(&check, &hits)?;
                for port in matched.ports {
                    *counts.entry(port).or_insert(0) += 1;
                }
            }
            weights.get_or_insert(shares);
        }

        let weights = weights.unwrap_or_default();
        let distribution = evaluate(&counts, &weights, self.flows, self.scaling)?;
        info!("LoadBalanceCheck: {}", distribution);
        Ok(distribution)
    }

    /// Applies `mutations`, waits for the device to reflect them, and runs a
    /// fresh pass against the new weights.
    pub async fn mutate_and_run(
        &self,
        session: &mut Session,
        mutations: &[LbMutation],
    ) -> HarnessResult<(Vec<Option<ObjectId>>, Distribution)> {
        let mut added = Vec::with_capacity(mutations.len());
        for m in mutations {
            added.push(m.apply(session).await?);
        }
        if let Some(key) = FlowKeySpace::new(self.seed, self.src, self.dst).keys(1).first() {
            session
                .verify_eventually(&Probe::new(self.ingress, key.apply(&self.template)))
                .await?;
        }
        let distribution = self.run(session).await?;
        Ok((added, distribution))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{tcp_packet, udp_packet};
    use pretty_assertions::assert_eq;

    fn port(n: u64) -> PortOid {
        PortOid::new_unchecked(ObjectId::compose(ObjectKind::Port, n))
    }

    #[test]
    fn test_flow_keys_are_distinct_reproducible_and_in_prefix() {
        let src: IpPrefix = "10.0.0.0/24".parse().unwrap();
        let dst: IpPrefix = "192.168.1.1/32".parse().unwrap();
        let a = FlowKeySpace::new(7, src, dst).keys(200);
        let b = FlowKeySpace::new(7, src, dst).keys(200);
        assert_eq!(a, b);
        assert_eq!(a.iter().collect::<HashSet<_>>().len(), 200);
        for k in &a {
            assert!(src.contains(&k.src_ip));
            assert_eq!(k.dst_ip, "192.168.1.1".parse::<IpAddr>().unwrap());
            assert!(k.sport >= 1024);
        }
    }

    #[test]
    fn test_apply_rewrites_flow_fields() {
        let key = FlowKey {
            src_ip: "10.0.0.9".parse().unwrap(),
            dst_ip: "10.1.0.9".parse().unwrap(),
            sport: 4000,
            dport: 5000,
        };
        let frame = key.apply(&udp_packet().build().unwrap());
        assert_eq!(frame.ip_src(), Some(key.src_ip));
        assert_eq!(frame.ip_dst(), Some(key.dst_ip));
        assert_eq!(frame.l4_ports(), Some((4000, 5000)));

        // family mismatch leaves the template alone
        let v6 = FlowKey {
            src_ip: "2001:db8::1".parse().unwrap(),
            dst_ip: "2001:db8::2".parse().unwrap(),
            ..key
        };
        let template = tcp_packet().build().unwrap();
        assert_eq!(v6.apply(&template), template);
    }

    #[test]
    fn test_floor_rule() {
        let weights = BTreeMap::from([(port(1), 7), (port(2), 10), (port(3), 13)]);
        // floors at N=300, scaling 0.7: 49, 70, 91
        let counts = BTreeMap::from([(port(1), 60), (port(2), 100), (port(3), 140)]);
        let d = evaluate(&counts, &weights, 300, 0.7).unwrap();
        assert_eq!(d.histogram[&port(1)].floor, 49);
        assert_eq!(d.histogram[&port(2)].floor, 70);
        assert_eq!(d.histogram[&port(3)].floor, 91);

        let starved = BTreeMap::from([(port(1), 10), (port(2), 140), (port(3), 150)]);
        let err = evaluate(&starved, &weights, 300, 0.7).unwrap_err();
        assert_eq!(err.histogram[&port(1)].count, 10);
        assert!(err.to_string().contains("FAIL"));
    }

    #[test]
    fn test_floor_is_exact_for_whole_shares() {
        // 10/30 * 0.7 * 300 is exactly 70 and 0.7 has no exact binary form
        let weights = BTreeMap::from([(port(1), 10), (port(2), 20)]);
        let counts = BTreeMap::from([(port(1), 70), (port(2), 230)]);
        let d = evaluate(&counts, &weights, 300, 0.7).unwrap();
        assert_eq!(d.histogram[&port(1)].floor, 70);
        assert_eq!(d.histogram[&port(2)].floor, 140);

        let weights = BTreeMap::from([(port(1), 1), (port(2), 1), (port(3), 1)]);
        let counts = BTreeMap::from([(port(1), 30), (port(2), 35), (port(3), 35)]);
        let d = evaluate(&counts, &weights, 100, 0.9).unwrap();
        assert_eq!(d.histogram[&port(1)].floor, 30);
    }

    #[test]
    fn test_floor_with_huge_weights() {
        let weights = BTreeMap::from([(port(1), u64::MAX), (port(2), u64::MAX)]);
        let counts = BTreeMap::from([(port(1), 50), (port(2), 50)]);
        let d = evaluate(&counts, &weights, 100, 0.7).unwrap();
        assert_eq!(d.histogram[&port(1)].floor, 35);
    }

    #[test]
    fn test_unexpected_port_must_be_empty() {
        let weights = BTreeMap::from([(port(1), 1), (port(3), 1)]);
        let counts = BTreeMap::from([(port(1), 50), (port(2), 1), (port(3), 49)]);
        let err = evaluate(&counts, &weights, 100, 0.7).unwrap_err();
        assert_eq!(err.histogram[&port(2)].weight, 0);
    }
}
