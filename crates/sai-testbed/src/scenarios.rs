//! Named conformance scenarios.
//!
//! Each scenario builds its topology through the session, checks what the
//! oracle predicts for a few probes, and checks that the device agrees.
//! Teardown is left to [`run_scenario`].

use crate::fixtures::{device, groups, l2, l3, neighbor_ip, neighbor_mac};
use crate::Testbed;
use futures::future::BoxFuture;
use sai_api::*;
use sai_harness::lb::{LbMutation, LoadBalanceCheck};
use sai_harness::ordering::{permute_and_run, Orderings, Step};
use sai_harness::verify::{FailureKind, VerificationFailure};
use sai_harness::{
    run_scenario, run_stress, CounterChecker, Expectation, HarnessResult, ScenarioFailure,
    Session, StressPlan,
};
use sai_types::{IpAddr, IpPrefix, Ipv4Addr, VlanId};
use std::fmt;
use tracing::info;

type Body = for<'a> fn(&'a mut Session, Vec<PortOid>) -> BoxFuture<'a, HarnessResult<()>>;

#[derive(Clone, Copy)]
pub struct Scenario {
    pub name: &'static str,
    pub about: &'static str,
    body: Body,
}

impl fmt::Debug for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scenario").field("name", &self.name).finish()
    }
}

pub const SCENARIOS: &[Scenario] = &[
    Scenario {
        name: "route_add_remove",
        about: "route to a resolved neighbor forwards, and drops once removed",
        body: route_add_remove,
    },
    Scenario {
        name: "replay",
        about: "the same frame on an unchanged topology comes out byte-identical",
        body: replay,
    },
    Scenario {
        name: "glean",
        about: "route to an unresolved nexthop redirects to the CPU",
        body: glean,
    },
    Scenario {
        name: "lpm",
        about: "longest prefix wins; removing it falls back to the shorter one",
        body: lpm,
    },
    Scenario {
        name: "vrf_isolation",
        about: "routes in one VRF are invisible from another",
        body: vrf_isolation,
    },
    Scenario {
        name: "svi",
        about: "routing into a VLAN interface egresses through the FDB port",
        body: svi,
    },
    Scenario {
        name: "ordering",
        about: "every creation order of a route chain forwards the same way",
        body: ordering,
    },
    Scenario {
        name: "svi_ordering",
        about: "every creation order of a VLAN interface chain, FDB entry included, agrees",
        body: svi_ordering,
    },
    Scenario {
        name: "ecmp_balance",
        about: "weighted ECMP distribution, before and after member changes",
        body: ecmp_balance,
    },
    Scenario {
        name: "lag_balance",
        about: "LAG distribution, before and after disabling a member",
        body: lag_balance,
    },
    Scenario {
        name: "drop_counters",
        about: "drop-reason counters count exactly their own reasons",
        body: drop_counters,
    },
    Scenario {
        name: "stress",
        about: "ECMP member churn under traffic converges to the final state",
        body: stress,
    },
    Scenario {
        name: "negative_statuses",
        about: "duplicate and in-use objects are refused with the right status",
        body: negative_statuses,
    },
];

pub fn find(name: &str) -> Option<&'static Scenario> {
    SCENARIOS.iter().find(|s| s.name == name)
}

/// Runs `scenario` on `tb`, rolling back everything it configured.
pub async fn run(tb: &mut Testbed, scenario: &Scenario) -> Result<(), ScenarioFailure> {
    let ports = tb.ports();
    let body = scenario.body;
    run_scenario(&mut tb.session, scenario.name, move |s| body(s, ports)).await
}

// ===== checks =====

fn mismatch(kind: FailureKind, expected: &Expectation, detail: String) -> VerificationFailure {
    VerificationFailure {
        kind,
        expected: expected.clone(),
        observed: Vec::new(),
        detail,
    }
}

fn ensure_ports(expected: &Expectation, ports: &[PortOid]) -> HarnessResult<()> {
    let got: Vec<PortOid> = expected.egress_ports().into_iter().collect();
    let mut want = ports.to_vec();
    want.sort();
    if got == want {
        Ok(())
    } else {
        Err(mismatch(
            FailureKind::WrongPort,
            expected,
            format!("model egresses on {:?}, scenario needs {:?}", got, want),
        )
        .into())
    }
}

fn ensure_drop(expected: &Expectation, reason: DropReason) -> HarnessResult<()> {
    match expected {
        Expectation::NoOutput { cause } if cause.reason() == Some(reason) => Ok(()),
        _ => Err(mismatch(
            FailureKind::UnexpectedOutput,
            expected,
            format!("scenario needs a {} drop", reason),
        )
        .into()),
    }
}

fn ensure_redirect(expected: &Expectation, reason: CpuReason) -> HarnessResult<()> {
    match expected {
        Expectation::RedirectToCpu { reason: r, .. } if *r == reason => Ok(()),
        _ => Err(mismatch(
            FailureKind::WrongReason,
            expected,
            format!("scenario needs a {:?} redirect", reason),
        )
        .into()),
    }
}

fn ensure_status<T>(result: HarnessResult<T>, status: SaiStatus) -> HarnessResult<()> {
    match result {
        Err(e) if e.status() == Some(status) => Ok(()),
        Err(e) => Err(e),
        Ok(_) => Err(SaiError::Status {
            status: SaiStatus::Failure,
            context: format!("call succeeded, expected {}", status),
        }
        .into()),
    }
}

fn need(ports: &[PortOid], n: usize) -> HarnessResult<()> {
    if ports.len() < n {
        return Err(SaiError::invalid_parameter(format!(
            "scenario needs {} front-panel ports, target has {}",
            n,
            ports.len()
        ))
        .into());
    }
    Ok(())
}

fn v4(a: u8, b: u8, c: u8, d: u8) -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(a, b, c, d))
}

// ===== scenarios =====

fn route_add_remove(s: &mut Session, ports: Vec<PortOid>) -> BoxFuture<'_, HarnessResult<()>> {
    Box::pin(async move {
        need(&ports, 2)?;
        let vrf = device::default_vrf(s)?;
        let mac = device::router_mac(s)?;
        l3::routed_port(s, vrf, L2Port::Port(ports[0])).await?;
        let egress = l3::routed_neighbor(s, vrf, ports[1], 1).await?;
        let route = l3::route(
            s,
            vrf,
            "192.168.10.0/24".parse()?,
            RouteTarget::NextHop(egress.next_hop),
        )
        .await?;

        let probe = l3::probe_to(ports[0], mac, v4(192, 168, 10, 1))?;
        ensure_ports(&s.expect(&probe)?, &[ports[1]])?;
        s.verify_eventually(&probe).await?;

        s.remove(route).await?;
        ensure_drop(&s.expect(&probe)?, DropReason::LpmMiss)?;
        s.verify_eventually(&probe).await?;
        Ok(())
    })
}

fn replay(s: &mut Session, ports: Vec<PortOid>) -> BoxFuture<'_, HarnessResult<()>> {
    Box::pin(async move {
        need(&ports, 3)?;
        let vrf = device::default_vrf(s)?;
        let mac = device::router_mac(s)?;
        l3::routed_port(s, vrf, L2Port::Port(ports[0])).await?;
        for (i, port) in [(1u8, ports[1]), (2, ports[2])] {
            let egress = l3::routed_neighbor(s, vrf, port, i).await?;
            let prefix = IpPrefix::new(v4(192, 168, 100 + i, 0), 24)?;
            l3::route(s, vrf, prefix, RouteTarget::NextHop(egress.next_hop)).await?;
        }

        let probe = l3::probe_to(ports[0], mac, v4(192, 168, 101, 4))?;
        let expected = s.expect(&probe)?;
        let first = s.send_and_capture(&probe, &expected).await?;
        let second = s.send_and_capture(&probe, &expected).await?;
        if s.expect(&probe)? != expected || first != second {
            return Err(mismatch(
                FailureKind::WrongBytes,
                &expected,
                "replaying the same frame changed the output".to_string(),
            )
            .into());
        }
        s.verifier().verify(&expected, &second)?;

        let flushed = s.flush(ObjectKind::Route).await?;
        info!("replay: flushed {} routes", flushed);
        ensure_drop(&s.expect(&probe)?, DropReason::LpmMiss)?;
        s.verify_eventually(&probe).await?;
        Ok(())
    })
}

fn glean(s: &mut Session, ports: Vec<PortOid>) -> BoxFuture<'_, HarnessResult<()>> {
    Box::pin(async move {
        need(&ports, 2)?;
        let vrf = device::default_vrf(s)?;
        let mac = device::router_mac(s)?;
        l3::routed_port(s, vrf, L2Port::Port(ports[0])).await?;
        let rif = l3::routed_port(s, vrf, L2Port::Port(ports[1])).await?;
        let nh = l3::next_hop(s, rif, neighbor_ip(1)).await?;
        l3::route(s, vrf, "192.168.20.0/24".parse()?, RouteTarget::NextHop(nh)).await?;

        let probe = l3::probe_to(ports[0], mac, v4(192, 168, 20, 7))?;
        ensure_redirect(&s.expect(&probe)?, CpuReason::Glean)?;
        s.verify_eventually(&probe).await?;

        // resolving the neighbor turns the redirect into forwarding
        l3::neighbor(s, rif, neighbor_ip(1), neighbor_mac(1)).await?;
        ensure_ports(&s.expect(&probe)?, &[ports[1]])?;
        s.verify_eventually(&probe).await?;
        Ok(())
    })
}

fn lpm(s: &mut Session, ports: Vec<PortOid>) -> BoxFuture<'_, HarnessResult<()>> {
    Box::pin(async move {
        need(&ports, 3)?;
        let vrf = device::default_vrf(s)?;
        let mac = device::router_mac(s)?;
        l3::routed_port(s, vrf, L2Port::Port(ports[0])).await?;
        let short = l3::routed_neighbor(s, vrf, ports[1], 1).await?;
        let long = l3::routed_neighbor(s, vrf, ports[2], 2).await?;
        l3::route(s, vrf, "172.16.0.0/16".parse()?, RouteTarget::NextHop(short.next_hop))
            .await?;
        let specific = l3::route(
            s,
            vrf,
            "172.16.5.0/24".parse()?,
            RouteTarget::NextHop(long.next_hop),
        )
        .await?;

        let inside = l3::probe_to(ports[0], mac, v4(172, 16, 5, 9))?;
        let outside = l3::probe_to(ports[0], mac, v4(172, 16, 99, 9))?;
        ensure_ports(&s.expect(&inside)?, &[ports[2]])?;
        ensure_ports(&s.expect(&outside)?, &[ports[1]])?;
        s.verify_eventually(&inside).await?;
        s.verify_eventually(&outside).await?;

        s.remove(specific).await?;
        ensure_ports(&s.expect(&inside)?, &[ports[1]])?;
        s.verify_eventually(&inside).await?;
        Ok(())
    })
}

fn vrf_isolation(s: &mut Session, ports: Vec<PortOid>) -> BoxFuture<'_, HarnessResult<()>> {
    Box::pin(async move {
        need(&ports, 3)?;
        let red = device::default_vrf(s)?;
        let mac = device::router_mac(s)?;
        let blue: VrfOid = s.create_typed(VirtualRouterAttrs::default()).await?;
        l3::routed_port(s, red, L2Port::Port(ports[0])).await?;
        l3::routed_port(s, blue, L2Port::Port(ports[2])).await?;
        let egress = l3::routed_neighbor(s, blue, ports[1], 1).await?;
        l3::route(
            s,
            blue,
            "100.64.0.0/24".parse()?,
            RouteTarget::NextHop(egress.next_hop),
        )
        .await?;

        let from_red = l3::probe_to(ports[0], mac, v4(100, 64, 0, 1))?;
        ensure_drop(&s.expect(&from_red)?, DropReason::LpmMiss)?;
        s.verify_eventually(&from_red).await?;

        let from_blue = l3::probe_to(ports[2], mac, v4(100, 64, 0, 1))?;
        ensure_ports(&s.expect(&from_blue)?, &[ports[1]])?;
        s.verify_eventually(&from_blue).await?;
        Ok(())
    })
}

fn svi(s: &mut Session, ports: Vec<PortOid>) -> BoxFuture<'_, HarnessResult<()>> {
    Box::pin(async move {
        need(&ports, 3)?;
        let vrf = device::default_vrf(s)?;
        let mac = device::router_mac(s)?;
        l3::routed_port(s, vrf, L2Port::Port(ports[0])).await?;
        let vlan = l2::vlan(
            s,
            VlanId::new(100)?,
            &[
                (L2Port::Port(ports[1]), Tagging::Untagged),
                (L2Port::Port(ports[2]), Tagging::Untagged),
            ],
        )
        .await?;
        let rif = l3::svi(s, vrf, vlan).await?;
        l3::neighbor(s, rif, neighbor_ip(5), neighbor_mac(5)).await?;
        let nh = l3::next_hop(s, rif, neighbor_ip(5)).await?;
        l3::route(s, vrf, "192.0.2.0/24".parse()?, RouteTarget::NextHop(nh)).await?;

        let probe = l3::probe_to(ports[0], mac, v4(192, 0, 2, 10))?;
        // no FDB entry yet: nowhere to send the rewritten frame
        ensure_redirect(&s.expect(&probe)?, CpuReason::Glean)?;
        s.verify_eventually(&probe).await?;

        l2::fdb(s, vlan, neighbor_mac(5), L2Port::Port(ports[2])).await?;
        ensure_ports(&s.expect(&probe)?, &[ports[2]])?;
        s.verify_eventually(&probe).await?;
        Ok(())
    })
}

fn ordering(s: &mut Session, ports: Vec<PortOid>) -> BoxFuture<'_, HarnessResult<()>> {
    Box::pin(async move {
        need(&ports, 2)?;
        let vrf = device::default_vrf(s)?;
        let mac = device::router_mac(s)?;
        let (p0, p1) = (ports[0], ports[1]);
        let prefix: IpPrefix = "192.168.30.0/24".parse()?;
        let steps = vec![
            Step::fixed(
                "rif_in",
                RouterInterfaceAttrs::new(vrf, RifBinding::Port(L2Port::Port(p0))),
            ),
            Step::fixed(
                "rif_out",
                RouterInterfaceAttrs::new(vrf, RifBinding::Port(L2Port::Port(p1))),
            ),
            Step::new("neighbor", &["rif_out"], |h| {
                Ok(NeighborAttrs {
                    rif: h.oid("rif_out")?,
                    ip: neighbor_ip(1),
                    mac: neighbor_mac(1),
                    no_host_route: true,
                }
                .into())
            }),
            Step::new("next_hop", &["rif_out"], |h| {
                Ok(NextHopAttrs {
                    rif: h.oid("rif_out")?,
                    ip: neighbor_ip(1),
                    nh_type: NextHopType::Regular,
                }
                .into())
            }),
            Step::new("route", &["next_hop"], move |h| {
                Ok(RouteAttrs::forward(vrf, prefix, RouteTarget::NextHop(h.oid("next_hop")?)).into())
            }),
        ];
        let orderings = Orderings::topological(&steps)?.sample(12);
        let probe = l3::probe_to(p0, mac, v4(192, 168, 30, 3))?;

        let agreed = permute_and_run(s, &steps, &orderings, &probe).await?;
        ensure_ports(&agreed, &[p1])?;
        info!("ordering: {} orderings agree on {}", orderings.len(), agreed);
        Ok(())
    })
}

fn svi_ordering(s: &mut Session, ports: Vec<PortOid>) -> BoxFuture<'_, HarnessResult<()>> {
    Box::pin(async move {
        need(&ports, 3)?;
        let vrf = device::default_vrf(s)?;
        let mac = device::router_mac(s)?;
        let (p0, p2) = (ports[0], ports[2]);
        let vid = VlanId::new(200)?;
        let prefix: IpPrefix = "198.18.0.0/24".parse()?;
        let steps = vec![
            Step::fixed(
                "rif_in",
                RouterInterfaceAttrs::new(vrf, RifBinding::Port(L2Port::Port(p0))),
            ),
            Step::fixed("vlan", VlanAttrs::new(vid)),
            Step::new("member", &["vlan"], move |h| {
                Ok(VlanMemberAttrs {
                    vlan: h.oid("vlan")?,
                    port: L2Port::Port(p2),
                    tagging: Tagging::Tagged,
                }
                .into())
            }),
            Step::new("svi", &["vlan"], move |h| {
                Ok(RouterInterfaceAttrs::new(vrf, RifBinding::Vlan(h.oid("vlan")?)).into())
            }),
            Step::new("neighbor", &["svi"], |h| {
                Ok(NeighborAttrs {
                    rif: h.oid("svi")?,
                    ip: neighbor_ip(6),
                    mac: neighbor_mac(6),
                    no_host_route: true,
                }
                .into())
            }),
            Step::new("next_hop", &["svi"], |h| {
                Ok(NextHopAttrs {
                    rif: h.oid("svi")?,
                    ip: neighbor_ip(6),
                    nh_type: NextHopType::Regular,
                }
                .into())
            }),
            Step::new("route", &["next_hop"], move |h| {
                Ok(RouteAttrs::forward(vrf, prefix, RouteTarget::NextHop(h.oid("next_hop")?)).into())
            }),
            Step::new("fdb", &["vlan", "member"], move |h| {
                Ok(FdbEntryAttrs {
                    vlan: h.oid("vlan")?,
                    mac: neighbor_mac(6),
                    port: L2Port::Port(p2),
                    is_static: true,
                }
                .into())
            }),
        ];
        let orderings = Orderings::topological(&steps)?.sample(12);
        let probe = l3::probe_to(p0, mac, v4(198, 18, 0, 7))?;

        let agreed = permute_and_run(s, &steps, &orderings, &probe).await?;
        ensure_ports(&agreed, &[p2])?;
        info!("svi_ordering: {} orderings agree on {}", orderings.len(), agreed);
        Ok(())
    })
}

fn ecmp_balance(s: &mut Session, ports: Vec<PortOid>) -> BoxFuture<'_, HarnessResult<()>> {
    Box::pin(async move {
        need(&ports, 4)?;
        let vrf = device::default_vrf(s)?;
        let mac = device::router_mac(s)?;
        l3::routed_port(s, vrf, L2Port::Port(ports[0])).await?;
        let mut members = Vec::new();
        for (i, weight) in [(1u8, 7u32), (2, 10), (3, 13)] {
            let egress = l3::routed_neighbor(s, vrf, ports[usize::from(i)], i).await?;
            members.push((egress.next_hop, weight));
        }
        let (group, member_oids) = groups::ecmp_group(s, &members).await?;
        let dst: IpPrefix = "198.51.100.0/24".parse()?;
        l3::route(s, vrf, dst, RouteTarget::Group(group)).await?;

        let template = l3::probe_to(ports[0], mac, v4(198, 51, 100, 1))?.frame;
        let check = LoadBalanceCheck::new(
            ports[0],
            template,
            "10.100.0.0/16".parse()?,
            dst,
            &s.settings().load_balance,
        );
        let before = check.run(s).await?;
        info!("ecmp_balance: {}", before);

        let (_, after) = check
            .mutate_and_run(s, &[LbMutation::Disable(member_oids[0].id())])
            .await?;
        info!("ecmp_balance: after disable: {}", after);

        let (_, reweighted) = check
            .mutate_and_run(
                s,
                &[
                    LbMutation::Enable(member_oids[0].id()),
                    LbMutation::SetWeight(member_oids[0], 13),
                ],
            )
            .await?;
        info!("ecmp_balance: after reweight: {}", reweighted);
        Ok(())
    })
}

fn lag_balance(s: &mut Session, ports: Vec<PortOid>) -> BoxFuture<'_, HarnessResult<()>> {
    Box::pin(async move {
        need(&ports, 4)?;
        let vrf = device::default_vrf(s)?;
        let mac = device::router_mac(s)?;
        l3::routed_port(s, vrf, L2Port::Port(ports[0])).await?;
        let (lag, members) = groups::lag(s, &ports[1..4]).await?;
        let rif = l3::routed_port(s, vrf, L2Port::Lag(lag)).await?;
        l3::neighbor(s, rif, neighbor_ip(9), neighbor_mac(9)).await?;
        let nh = l3::next_hop(s, rif, neighbor_ip(9)).await?;
        let dst: IpPrefix = "198.51.101.0/24".parse()?;
        l3::route(s, vrf, dst, RouteTarget::NextHop(nh)).await?;

        let template = l3::probe_to(ports[0], mac, v4(198, 51, 101, 1))?.frame;
        let check = LoadBalanceCheck::new(
            ports[0],
            template,
            "10.101.0.0/16".parse()?,
            dst,
            &s.settings().load_balance,
        );
        let before = check.run(s).await?;
        info!("lag_balance: {}", before);

        let (_, after) = check
            .mutate_and_run(s, &[LbMutation::Disable(members[0].id())])
            .await?;
        info!("lag_balance: after disable: {}", after);
        Ok(())
    })
}

fn drop_counters(s: &mut Session, ports: Vec<PortOid>) -> BoxFuture<'_, HarnessResult<()>> {
    Box::pin(async move {
        need(&ports, 2)?;
        let vrf = device::default_vrf(s)?;
        let mac = device::router_mac(s)?;
        l3::routed_port(s, vrf, L2Port::Port(ports[0])).await?;
        l3::routed_port(s, vrf, L2Port::Port(ports[1])).await?;
        l3::route_action(s, vrf, "203.0.113.0/24".parse()?, RouteAction::Drop).await?;

        let mut checker = CounterChecker::new();
        let miss = checker
            .install(s, CounterScope::Port, CounterStage::Ingress, &[DropReason::LpmMiss])
            .await?;
        let blackhole = checker
            .install(s, CounterScope::Port, CounterStage::Ingress, &[DropReason::Blackhole])
            .await?;
        let device_wide = checker
            .install(
                s,
                CounterScope::Switch,
                CounterStage::Ingress,
                &[DropReason::LpmMiss, DropReason::Blackhole],
            )
            .await?;

        let to_blackhole = l3::probe_to(ports[0], mac, v4(203, 0, 113, 9))?;
        let to_nowhere = l3::probe_to(ports[0], mac, v4(198, 18, 0, 1))?;
        ensure_drop(&s.expect(&to_blackhole)?, DropReason::Blackhole)?;
        ensure_drop(&s.expect(&to_nowhere)?, DropReason::LpmMiss)?;

        let expected = checker
            .check_batch(s, ports[0], &[to_blackhole, to_nowhere], 3)
            .await?;
        info!(
            "drop_counters: {} +{}, {} +{}, {} +{}",
            miss,
            expected.get(&miss.oid).copied().unwrap_or(0),
            blackhole,
            expected.get(&blackhole.oid).copied().unwrap_or(0),
            device_wide,
            expected.get(&device_wide.oid).copied().unwrap_or(0),
        );

        // drops on another port leave the port-scope counters alone
        let elsewhere = l3::probe_to(ports[1], mac, v4(198, 18, 0, 2))?;
        checker.check_batch(s, ports[0], &[elsewhere], 2).await?;
        Ok(())
    })
}

fn stress(s: &mut Session, ports: Vec<PortOid>) -> BoxFuture<'_, HarnessResult<()>> {
    Box::pin(async move {
        need(&ports, 3)?;
        let vrf = device::default_vrf(s)?;
        let mac = device::router_mac(s)?;
        l3::routed_port(s, vrf, L2Port::Port(ports[0])).await?;
        let a = l3::routed_neighbor(s, vrf, ports[1], 1).await?;
        let b = l3::routed_neighbor(s, vrf, ports[2], 2).await?;
        let (group, members) = groups::ecmp_group(s, &[(a.next_hop, 1), (b.next_hop, 1)]).await?;
        l3::route(s, vrf, "198.51.102.0/24".parse()?, RouteTarget::Group(group)).await?;

        let plan = StressPlan {
            rounds: 20,
            updates: vec![
                (members[0].id(), AttrUpdate::MemberWeight(4)),
                (members[1].id(), AttrUpdate::MemberEnabled(false)),
                (members[1].id(), AttrUpdate::MemberEnabled(true)),
                (members[0].id(), AttrUpdate::MemberWeight(1)),
            ],
            probe: l3::probe_to(ports[0], mac, v4(198, 51, 102, 5))?,
            packets: 50,
        };
        let report = run_stress(s, &plan).await?;
        info!("stress: {:?}", report);
        Ok(())
    })
}

fn negative_statuses(s: &mut Session, ports: Vec<PortOid>) -> BoxFuture<'_, HarnessResult<()>> {
    Box::pin(async move {
        need(&ports, 2)?;
        let vrf = device::default_vrf(s)?;
        let egress = l3::routed_neighbor(s, vrf, ports[1], 1).await?;
        let prefix: IpPrefix = "192.168.40.0/24".parse()?;
        l3::route(s, vrf, prefix, RouteTarget::NextHop(egress.next_hop)).await?;

        ensure_status(
            l3::route(s, vrf, prefix, RouteTarget::NextHop(egress.next_hop)).await,
            SaiStatus::ItemAlreadyExists,
        )?;
        ensure_status(s.remove(egress.next_hop).await, SaiStatus::ObjectInUse)?;
        ensure_status(s.remove(egress.rif).await, SaiStatus::ObjectInUse)?;
        ensure_status(
            s.set(ports[0], AttrUpdate::Mtu(MIN_MTU - 1)).await,
            SaiStatus::InvalidParameter,
        )?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_names_are_unique() {
        let mut names: Vec<&str> = SCENARIOS.iter().map(|s| s.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), SCENARIOS.len());
        assert!(find("glean").is_some());
        assert!(find("nope").is_none());
    }
}
