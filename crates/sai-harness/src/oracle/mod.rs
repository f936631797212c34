//! Packet oracle: derives the expected forwarding result of a frame from the
//! topology.
//!
//! Decisions are evaluated in a fixed precedence; the first stage that
//! produces an outcome wins:
//!
//! ```text
//!  0  ingress sanity        port down, LAG member ingress disabled, bad MACs, VLAN tag policy
//!  1  ingress admission     port ACL, RIF ACL, RIF admin state and family enables
//!  2  router MAC            RIF MAC, VRF MAC, switch MAC or a virtual RIF; else bridge/flood
//!  3  LPM                   longest-prefix route in the VRF; miss drops or traps
//!  3.5 L3 exceptions        header sanity, TTL/hop limit, IPv4 options
//!  4  route action          drop, trap, myip
//!  5  nexthop type          drop, glean, regular
//!  6  ECMP                  every enabled member with a nonzero weight, or the first
//!                          usable one of an ordered group
//!  7  neighbor + FDB        rewrite, LAG expansion
//!  8  egress admission      MTU, egress ACL, isolation groups
//! ```

mod acl;
mod expectation;

pub use expectation::{Candidate, Delivery, DropCause, Expectation};

use crate::packet::{Dot1q, Frame};
use crate::topology::TopologyStore;
use sai_api::*;
use sai_types::{IpAddr, MacAddress, VlanId};
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
    #[error("ingress port {0} is not configured")]
    UnknownIngress(PortOid),

    #[error("switch object is not configured")]
    NoSwitch,

    #[error("{from} references missing object {to}")]
    Dangling { from: ObjectId, to: ObjectId },

    #[error("egress shares overflow when split over LAG members")]
    WeightOverflow,
}

pub type OracleResult<T> = Result<T, OracleError>;

/// Stateless expectation derivation.
#[derive(Debug, Default, Clone, Copy)]
pub struct Oracle;

impl Oracle {
    pub fn new() -> Self {
        Oracle
    }

    /// Expected result of `frame` ingressing on `ingress`.
    ///
    /// # Errors
    ///
    /// Fails when the topology cannot support a decision: unknown ingress
    /// port, missing switch object or a dangling reference. These are
    /// harness bugs, not forwarding outcomes.
    pub fn expect(
        &self,
        store: &TopologyStore,
        ingress: PortOid,
        frame: &Frame,
    ) -> OracleResult<Expectation> {
        let pipeline = Pipeline::new(store, ingress, frame)?;
        let exp = pipeline.run()?;
        trace!("Oracle: {} on {} -> {}", frame.dst, ingress, exp);
        Ok(exp)
    }
}

/// Where the ingress frame lands after VLAN classification.
enum Domain<'a> {
    /// Port or sub-port router interface.
    Routed(RifOid, &'a RouterInterfaceAttrs),
    /// VLAN, with its SVI if one exists.
    Bridged {
        vlan: VlanOid,
        vid: VlanId,
        svi: Option<(RifOid, &'a RouterInterfaceAttrs)>,
    },
}

/// Outcome of resolving one nexthop.
enum Resolution {
    Forward(Vec<Egress>),
    Glean,
    Drop(DropCause),
}

/// A rewritten frame bound for one port through a router interface.
struct Egress {
    rif: RifOid,
    port: PortOid,
    frame: Frame,
    /// Share of the owning nexthop, split evenly over `split` ports.
    weight: u64,
    split: u64,
}

struct Pipeline<'a> {
    store: &'a TopologyStore,
    switch: &'a SwitchAttrs,
    port: PortOid,
    port_attrs: &'a PortAttrs,
    /// Bridge port of the ingress: the port itself or its LAG.
    bridge: L2Port,
    lag_member: Option<&'a LagMemberAttrs>,
    frame: &'a Frame,
}

// ===== impl Pipeline =====

impl<'a> Pipeline<'a> {
    fn new(store: &'a TopologyStore, port: PortOid, frame: &'a Frame) -> OracleResult<Self> {
        let (_, switch) = store.switch().ok_or(OracleError::NoSwitch)?;
        let port_attrs = store.port(port).ok_or(OracleError::UnknownIngress(port))?;
        let lag_member = store.lag_of(port).map(|(_, m)| m);
        let bridge = match lag_member {
            Some(m) => L2Port::Lag(m.lag),
            None => L2Port::Port(port),
        };
        Ok(Pipeline {
            store,
            switch,
            port,
            port_attrs,
            bridge,
            lag_member,
            frame,
        })
    }

    fn run(&self) -> OracleResult<Expectation> {
        // 0. ingress sanity
        if let Some(exp) = self.ingress_sanity() {
            return Ok(exp);
        }
        let (vid, tagged) = match self.ingress_vlan() {
            Ok(v) => v,
            Err(exp) => return Ok(exp),
        };
        let domain = match self.classify(vid, tagged) {
            Ok(d) => d,
            Err(exp) => return Ok(exp),
        };

        // 1. ingress admission
        if let Some(table) = self.port_attrs.ingress_acl {
            if let Some(exp) = self.ingress_acl(table)? {
                return Ok(exp);
            }
        }
        let l3_rif = match &domain {
            Domain::Routed(id, rif) => Some((*id, *rif)),
            Domain::Bridged { svi: Some((id, rif)), .. } => {
                if self.router_mac_match(*id, rif)?.is_some() {
                    Some((*id, *rif))
                } else {
                    None
                }
            }
            Domain::Bridged { svi: None, .. } => None,
        };
        if let Some((id, rif)) = l3_rif {
            if let Some(table) = rif.ingress_acl {
                if let Some(exp) = self.ingress_acl(table)? {
                    return Ok(exp);
                }
            }
            if let Some(exp) = self.rif_admission(id, rif)? {
                return Ok(exp);
            }
        }

        // 2. router MAC
        let (rif_id, rif) = match domain {
            Domain::Routed(id, rif) => (id, rif),
            Domain::Bridged { vlan, vid, svi } => match (svi, l3_rif) {
                (Some(svi), Some(_)) => svi,
                _ => return self.bridge(vlan, vid),
            },
        };
        let Some(vrf) = self.router_mac_match(rif_id, rif)? else {
            return Ok(Expectation::drop(DropCause::NotRouted));
        };

        self.route(vrf)
    }

    // ===== stage 0 =====

    fn ingress_sanity(&self) -> Option<Expectation> {
        if !self.port_attrs.admin_state.is_up() {
            return Some(Expectation::drop(DropCause::PortDown));
        }
        if self.lag_member.is_some_and(|m| m.ingress_disable) {
            return Some(Expectation::drop(DropReason::LagMemberDisabled));
        }
        let f = self.frame;
        if f.src.is_multicast() {
            return Some(Expectation::drop(DropReason::SmacMulticast));
        }
        if f.src == f.dst {
            return Some(Expectation::drop(DropReason::SmacEqualsDmac));
        }
        if f.dst.is_reserved() {
            return Some(Expectation::drop(DropReason::DmacReserved));
        }
        let tagged = f.vlan.is_some_and(|t| t.vid != 0);
        if (tagged && self.port_attrs.drop_tagged) || (!tagged && self.port_attrs.drop_untagged) {
            return Some(Expectation::drop(DropReason::VlanTagNotAllowed));
        }
        None
    }

    /// Effective VLAN of the frame and whether it carried a tag.
    fn ingress_vlan(&self) -> Result<(VlanId, bool), Expectation> {
        match self.frame.vlan {
            Some(tag) if tag.vid != 0 => VlanId::new(tag.vid)
                .map(|vid| (vid, true))
                .map_err(|_| Expectation::drop(DropReason::VlanTagNotAllowed)),
            _ => {
                let pvid = match self.bridge {
                    L2Port::Lag(lag) => self.store.lag(lag).map_or(self.port_attrs.pvid, |l| l.pvid),
                    L2Port::Port(_) => self.port_attrs.pvid,
                };
                Ok((pvid, false))
            }
        }
    }

    fn classify(&self, vid: VlanId, tagged: bool) -> Result<Domain<'a>, Expectation> {
        let routed = if tagged {
            self.store.ingress_rif(&RifBinding::SubPort {
                port: self.bridge,
                outer_vlan: vid,
            })
        } else {
            self.store.ingress_rif(&RifBinding::Port(self.bridge))
        };
        if let Some((id, rif)) = routed {
            return Ok(Domain::Routed(id, rif));
        }

        let vlan = self
            .store
            .vlan_by_vid(vid)
            .ok_or_else(|| Expectation::drop(DropReason::IngressVlanFilter))?;
        if self.store.vlan_member(vlan, self.bridge).is_none() {
            return Err(Expectation::drop(DropReason::IngressVlanFilter));
        }
        Ok(Domain::Bridged {
            vlan,
            vid,
            svi: self.store.ingress_rif(&RifBinding::Vlan(vlan)),
        })
    }

    // ===== stage 1 =====

    fn ingress_acl(&self, table: AclTableOid) -> OracleResult<Option<Expectation>> {
        let exp = match acl::evaluate(self.store, table, self.frame) {
            None | Some(AclAction::Permit) => None,
            Some(AclAction::Drop) => Some(Expectation::drop(DropReason::AclAny)),
            Some(AclAction::Trap) => Some(self.to_cpu(CpuReason::AclTrap)),
            Some(AclAction::Redirect(target)) => {
                let candidates = self
                    .expand(target)
                    .into_iter()
                    .map(|port| Candidate {
                        port,
                        frame: self.frame.clone(),
                        weight: 1,
                    })
                    .collect();
                Some(Expectation::forward(candidates))
            }
        };
        Ok(exp)
    }

    fn rif_admission(
        &self,
        id: RifOid,
        rif: &RouterInterfaceAttrs,
    ) -> OracleResult<Option<Expectation>> {
        if !rif.admin_state.is_up() {
            return Ok(Some(Expectation::drop(DropReason::IrifDisabled)));
        }
        let Some(family) = self.frame.family() else {
            return Ok(Some(Expectation::drop(DropCause::NotRouted)));
        };
        let vrf = self.vrf_of(id.id(), rif.vrf)?;
        if !rif.family_enabled(family) || !vrf.family_enabled(family) {
            return Ok(Some(Expectation::drop(DropReason::IrifDisabled)));
        }
        Ok(None)
    }

    // ===== stage 2 =====

    /// VRF to route in when the frame's DMAC is a router MAC of the
    /// interface or of a virtual interface on the same binding.
    fn router_mac_match(
        &self,
        id: RifOid,
        rif: &RouterInterfaceAttrs,
    ) -> OracleResult<Option<VrfOid>> {
        if self.frame.dst == self.egress_mac(id, rif)? {
            return Ok(Some(rif.vrf));
        }
        let virtual_match = self
            .store
            .virtual_rifs(&rif.binding)
            .into_iter()
            .find(|(_, v)| v.src_mac == Some(self.frame.dst))
            .map(|(_, v)| v.vrf);
        Ok(virtual_match)
    }

    fn bridge(&self, vlan: VlanOid, vid: VlanId) -> OracleResult<Expectation> {
        let isolated = self.store.isolation_for(self.port);
        let dst = self.frame.dst;

        if !dst.is_multicast() {
            if let Some(fdb) = self.store.mac_entry(vlan, &dst) {
                if fdb.port == self.bridge {
                    return Ok(Expectation::drop(DropCause::SameBridgePort));
                }
                let Some(member) = self.store.vlan_member(vlan, fdb.port) else {
                    return Ok(Expectation::drop(DropCause::NoEgress));
                };
                let candidates = self.l2_delivery(member, vid, &isolated);
                if candidates.is_empty() {
                    let cause = if self.expand(fdb.port).iter().any(|p| isolated.contains(p)) {
                        DropCause::Reason(DropReason::IsolationFilter)
                    } else {
                        DropCause::NoEgress
                    };
                    return Ok(Expectation::drop(cause));
                }
                return Ok(Expectation::forward(candidates));
            }
        }

        let deliveries: Vec<Delivery> = self
            .store
            .vlan_members(vlan)
            .into_iter()
            .filter(|m| m.port != self.bridge)
            .map(|m| self.l2_delivery(m, vid, &isolated))
            .filter(|c| !c.is_empty())
            .map(|candidates| Delivery { candidates })
            .collect();
        if deliveries.is_empty() {
            return Ok(Expectation::drop(DropCause::NoEgress));
        }
        Ok(Expectation::AllOf(deliveries))
    }

    /// Bridged copies of the frame for one VLAN member.
    fn l2_delivery(
        &self,
        member: &VlanMemberAttrs,
        vid: VlanId,
        isolated: &BTreeSet<PortOid>,
    ) -> Vec<Candidate> {
        let tag = match member.tagging {
            Tagging::Tagged => Some(vid),
            Tagging::Untagged => None,
        };
        let mut frame = self.frame.clone();
        frame.vlan = tag.map(|vid| self.tag(vid));
        self.expand(member.port)
            .into_iter()
            .filter(|p| !isolated.contains(p))
            .map(|port| Candidate {
                port,
                frame: frame.clone(),
                weight: 1,
            })
            .collect()
    }

    // ===== stage 3 - 4 =====

    fn route(&self, vrf_id: VrfOid) -> OracleResult<Expectation> {
        let vrf = self.vrf_of(self.port.id(), vrf_id)?;
        let (Some(src), Some(dst), Some(ttl)) =
            (self.frame.ip_src(), self.frame.ip_dst(), self.frame.ttl())
        else {
            return Ok(Expectation::drop(DropCause::NotRouted));
        };

        // 3
        let Some((route_id, route)) = self.store.route_lookup(vrf_id, &dst) else {
            return Ok(if self.trapped(CpuReason::LpmMiss) {
                self.to_cpu(CpuReason::LpmMiss)
            } else {
                Expectation::drop(DropReason::LpmMiss)
            });
        };

        // 3.5
        if let Some(reason) = header_error(&src, &dst) {
            return Ok(Expectation::drop(reason));
        }
        if ttl <= 1 {
            if let Some(exp) = self.exception(vrf.ttl1_action, CpuReason::TtlError, DropReason::TtlError)
            {
                return Ok(exp);
            }
        }
        if self.frame.has_ip_options() {
            if let Some(exp) =
                self.exception(vrf.ip_options_action, CpuReason::IpOptions, DropReason::IpOptions)
            {
                return Ok(exp);
            }
        }

        // 4
        match route.action {
            RouteAction::Forward => {}
            RouteAction::Drop => return Ok(Expectation::drop(DropReason::Blackhole)),
            RouteAction::Trap => return Ok(self.to_cpu(CpuReason::RouteTrap)),
            RouteAction::MyIp => return Ok(self.to_cpu(CpuReason::Ip2Me)),
        }
        let Some(target) = route.target else {
            return Ok(Expectation::drop(DropReason::Blackhole));
        };

        // 5 - 7
        let resolution = match target {
            RouteTarget::NextHop(nh) => self.resolve_next_hop(route_id.id(), nh, 1)?,
            RouteTarget::Group(group) => self.resolve_group(route_id.id(), group)?,
        };

        // 8
        match resolution {
            Resolution::Drop(cause) => Ok(Expectation::drop(cause)),
            Resolution::Glean => Ok(self.to_cpu(CpuReason::Glean)),
            Resolution::Forward(egress) => self.egress_admission(egress),
        }
    }

    // ===== stage 5 - 7 =====

    fn resolve_next_hop(
        &self,
        from: ObjectId,
        nh: NextHopOid,
        weight: u64,
    ) -> OracleResult<Resolution> {
        let attrs = self.store.next_hop(nh).ok_or(OracleError::Dangling {
            from,
            to: nh.id(),
        })?;
        match attrs.nh_type {
            NextHopType::Drop => return Ok(Resolution::Drop(DropReason::Blackhole.into())),
            NextHopType::Glean => return Ok(Resolution::Glean),
            NextHopType::Regular => {}
        }

        let rif = self.store.rif(attrs.rif).ok_or(OracleError::Dangling {
            from: nh.id(),
            to: attrs.rif.id(),
        })?;
        let Some(neighbor) = self.store.neighbor(attrs.rif, &attrs.ip) else {
            return Ok(Resolution::Glean);
        };

        let (l2, tag) = match rif.binding {
            RifBinding::Port(l2) => (l2, None),
            RifBinding::SubPort { port, outer_vlan } => (port, Some(outer_vlan)),
            RifBinding::Vlan(vlan) => {
                let Some(fdb) = self.store.mac_entry(vlan, &neighbor.mac) else {
                    return Ok(Resolution::Glean);
                };
                let Some(member) = self.store.vlan_member(vlan, fdb.port) else {
                    return Ok(Resolution::Glean);
                };
                let vid = self.store.vlan(vlan).map(|v| v.vid).ok_or(OracleError::Dangling {
                    from: attrs.rif.id(),
                    to: vlan.id(),
                })?;
                let tag = (member.tagging == Tagging::Tagged).then_some(vid);
                (fdb.port, tag)
            }
        };

        let ports = self.expand(l2);
        if ports.is_empty() {
            return Ok(Resolution::Drop(DropCause::NoEgress));
        }

        let mut frame = self.frame.clone();
        frame.dst = neighbor.mac;
        frame.src = self.egress_mac(attrs.rif, rif)?;
        frame.vlan = tag.map(|vid| self.tag(vid));
        if let Some(ttl) = frame.ttl() {
            frame.set_ttl(ttl.saturating_sub(1));
        }

        let split = ports.len() as u64;
        Ok(Resolution::Forward(
            ports
                .into_iter()
                .map(|port| Egress {
                    rif: attrs.rif,
                    port,
                    frame: frame.clone(),
                    weight,
                    split,
                })
                .collect(),
        ))
    }

    fn resolve_group(&self, from: ObjectId, group: NextHopGroupOid) -> OracleResult<Resolution> {
        let ordered = self
            .store
            .next_hop_group(group)
            .ok_or(OracleError::Dangling {
                from,
                to: group.id(),
            })?
            .ordered;
        let members: Vec<&NextHopGroupMemberAttrs> = self
            .store
            .ecmp_members(group)
            .into_iter()
            .map(|(_, m)| m)
            .filter(|m| m.enabled && m.weight > 0)
            .collect();
        if members.is_empty() {
            return Ok(Resolution::Drop(DropCause::NoEgress));
        }

        let mut egress = Vec::new();
        let mut glean = false;
        let mut first_drop = None;
        for m in members {
            match self.resolve_next_hop(group.id(), m.next_hop, u64::from(m.weight))? {
                // first usable member in configured order takes everything
                Resolution::Forward(e) if ordered => return Ok(Resolution::Forward(e)),
                Resolution::Forward(e) => egress.extend(e),
                Resolution::Glean => glean = true,
                Resolution::Drop(cause) => {
                    first_drop.get_or_insert(cause);
                }
            }
        }
        Ok(match (egress.is_empty(), glean, first_drop) {
            (false, _, _) => Resolution::Forward(egress),
            (true, true, _) => Resolution::Glean,
            (true, false, Some(cause)) => Resolution::Drop(cause),
            (true, false, None) => Resolution::Drop(DropCause::NoEgress),
        })
    }

    // ===== stage 8 =====

    fn egress_admission(&self, egress: Vec<Egress>) -> OracleResult<Expectation> {
        let isolated = self.store.isolation_for(self.port);
        let l3_len = self.frame.l3_len() as u32;
        // common denominator so LAG-split shares stay integral
        let scale = egress
            .iter()
            .try_fold(1, |acc, e| lcm(acc, e.split))
            .ok_or(OracleError::WeightOverflow)?;
        let mut first_cause = None;
        let mut candidates = Vec::new();

        for e in egress {
            match self.admit(&e, l3_len, &isolated)? {
                Ok(()) => candidates.push(Candidate {
                    port: e.port,
                    frame: e.frame,
                    weight: e
                        .weight
                        .checked_mul(scale / e.split)
                        .ok_or(OracleError::WeightOverflow)?,
                }),
                Err(cause) => {
                    first_cause.get_or_insert(cause);
                }
            }
        }

        if candidates.is_empty() {
            return Ok(match first_cause {
                Some(DropCause::Reason(DropReason::MtuExceeded))
                    if self.trapped(CpuReason::MtuError) =>
                {
                    self.to_cpu(CpuReason::MtuError)
                }
                Some(cause) => Expectation::drop(cause),
                None => Expectation::drop(DropCause::NoEgress),
            });
        }
        Ok(Expectation::forward(candidates))
    }

    fn admit(
        &self,
        e: &Egress,
        l3_len: u32,
        isolated: &BTreeSet<PortOid>,
    ) -> OracleResult<Result<(), DropCause>> {
        let rif = self.store.rif(e.rif).ok_or(OracleError::Dangling {
            from: e.port.id(),
            to: e.rif.id(),
        })?;
        let port = self.store.port(e.port).ok_or(OracleError::Dangling {
            from: e.rif.id(),
            to: e.port.id(),
        })?;

        if !port.admin_state.is_up() {
            return Ok(Err(DropCause::NoEgress));
        }
        if l3_len > rif.mtu || l3_len > port.mtu {
            return Ok(Err(DropReason::MtuExceeded.into()));
        }
        for table in [rif.egress_acl, port.egress_acl].into_iter().flatten() {
            if matches!(
                acl::evaluate(self.store, table, &e.frame),
                Some(AclAction::Drop) | Some(AclAction::Trap)
            ) {
                return Ok(Err(DropReason::EgressAcl.into()));
            }
        }
        if isolated.contains(&e.port) {
            return Ok(Err(DropReason::IsolationFilter.into()));
        }
        Ok(Ok(()))
    }

    // ===== helpers =====

    /// Ports a bridge port transmits on. LAG members with egress disabled
    /// or admin down are skipped.
    fn expand(&self, l2: L2Port) -> Vec<PortOid> {
        match l2 {
            L2Port::Port(p) => vec![p],
            L2Port::Lag(lag) => self
                .store
                .lag_members(lag)
                .into_iter()
                .map(|(_, m)| m)
                .filter(|m| !m.egress_disable)
                .filter(|m| self.store.port(m.port).is_some_and(|p| p.admin_state.is_up()))
                .map(|m| m.port)
                .collect(),
        }
    }

    /// Source MAC on routed egress: interface override, then VRF override,
    /// then the switch MAC.
    fn egress_mac(&self, id: RifOid, rif: &RouterInterfaceAttrs) -> OracleResult<MacAddress> {
        if let Some(mac) = rif.src_mac {
            return Ok(mac);
        }
        let vrf = self.vrf_of(id.id(), rif.vrf)?;
        Ok(vrf.src_mac.unwrap_or(self.switch.src_mac))
    }

    fn vrf_of(&self, from: ObjectId, vrf: VrfOid) -> OracleResult<&'a VirtualRouterAttrs> {
        self.store.vrf(vrf).ok_or(OracleError::Dangling {
            from,
            to: vrf.id(),
        })
    }

    fn tag(&self, vid: VlanId) -> Dot1q {
        let mut tag = self.frame.vlan.unwrap_or_else(|| Dot1q::new(0));
        tag.vid = vid.as_u16();
        tag
    }

    fn trapped(&self, reason: CpuReason) -> bool {
        self.store
            .trap(reason)
            .is_some_and(|t| t.action == PacketAction::Trap)
    }

    fn exception(
        &self,
        action: PacketAction,
        cpu: CpuReason,
        drop: DropReason,
    ) -> Option<Expectation> {
        match action {
            PacketAction::Forward => None,
            PacketAction::Drop => Some(Expectation::drop(drop)),
            PacketAction::Trap => Some(self.to_cpu(cpu)),
        }
    }

    fn to_cpu(&self, reason: CpuReason) -> Expectation {
        Expectation::RedirectToCpu {
            reason,
            frame: self.frame.clone(),
        }
    }
}

fn header_error(src: &IpAddr, dst: &IpAddr) -> Option<DropReason> {
    if src == dst {
        Some(DropReason::SipEqualsDip)
    } else if src.is_multicast() {
        Some(DropReason::SipMulticast)
    } else if src.is_loopback() {
        Some(DropReason::SipLoopback)
    } else if dst.is_loopback() {
        Some(DropReason::DipLoopback)
    } else if dst.is_unspecified() {
        Some(DropReason::IpHeaderError)
    } else {
        None
    }
}

fn gcd(a: u64, b: u64) -> u64 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

fn lcm(a: u64, b: u64) -> Option<u64> {
    (a / gcd(a, b)).checked_mul(b)
}
