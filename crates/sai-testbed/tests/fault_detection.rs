//! A misbehaving device is caught, with the right failure kind.

use sai_api::*;
use sai_harness::{
    FailureKind, HarnessError, HarnessSettings, LbMutation, LoadBalanceCheck, Probe,
    StatisticalFailure,
};
use sai_testbed::fixtures::{device, groups, l3, neighbor_ip};
use sai_testbed::{Fault, Testbed};
use sai_types::{IpAddr, IpPrefix, Ipv4Addr};
use tokio_test::{assert_err, assert_ok};

async fn routed(tb: &mut Testbed) -> (Probe, PortOid) {
    let ports = tb.ports();
    let s = &mut tb.session;
    let vrf = device::default_vrf(s).unwrap();
    let mac = device::router_mac(s).unwrap();
    l3::routed_port(s, vrf, L2Port::Port(ports[0])).await.unwrap();
    let egress = l3::routed_neighbor(s, vrf, ports[1], 1).await.unwrap();
    l3::route(
        s,
        vrf,
        "192.168.50.0/24".parse().unwrap(),
        RouteTarget::NextHop(egress.next_hop),
    )
    .await
    .unwrap();
    let probe = l3::probe_to(ports[0], mac, IpAddr::V4(Ipv4Addr::new(192, 168, 50, 1))).unwrap();
    (probe, ports[1])
}

async fn testbed() -> Testbed {
    sai_harness::logging::init_for_tests();
    let mut settings = HarnessSettings::for_simulator();
    settings.target.ports = 4;
    Testbed::start(settings).await.unwrap()
}

fn kind(err: HarnessError) -> FailureKind {
    match err {
        HarnessError::Verification(failure) => failure.kind,
        other => panic!("expected a verification failure, got {}", other),
    }
}

#[tokio::test]
async fn test_healthy_device_passes() {
    let mut tb = testbed().await;
    let (probe, egress) = routed(&mut tb).await;
    let matched = tb.session.send_and_verify(&probe).await.unwrap();
    assert_eq!(matched.ports, vec![egress]);
    assert_ok!(tb.finish().await);
}

#[tokio::test]
async fn test_wrong_port_is_detected() {
    let mut tb = testbed().await;
    let (probe, _) = routed(&mut tb).await;
    tb.sim.inject_fault(Some(Fault::WrongPort));
    let err = assert_err!(tb.session.send_and_verify(&probe).await);
    assert_eq!(kind(err), FailureKind::WrongPort);
    assert_ok!(tb.finish().await);
}

#[tokio::test]
async fn test_corrupt_payload_is_detected() {
    let mut tb = testbed().await;
    let (probe, _) = routed(&mut tb).await;
    tb.sim.inject_fault(Some(Fault::CorruptPayload));
    let err = assert_err!(tb.session.send_and_verify(&probe).await);
    assert_eq!(kind(err), FailureKind::WrongBytes);
    assert_ok!(tb.finish().await);
}

#[tokio::test]
async fn test_duplicate_is_detected() {
    let mut tb = testbed().await;
    let (probe, _) = routed(&mut tb).await;
    tb.sim.inject_fault(Some(Fault::Duplicate));
    let err = assert_err!(tb.session.send_and_verify(&probe).await);
    assert_eq!(kind(err), FailureKind::WrongCount);
    assert_ok!(tb.finish().await);
}

#[tokio::test]
async fn test_blackhole_times_out() {
    let mut tb = testbed().await;
    let (probe, _) = routed(&mut tb).await;
    tb.sim.inject_fault(Some(Fault::Blackhole));
    let err = assert_err!(tb.session.verify_eventually(&probe).await);
    assert_eq!(kind(err), FailureKind::Timeout);

    tb.sim.inject_fault(None);
    tb.session.verify_eventually(&probe).await.unwrap();
    assert_ok!(tb.finish().await);
}

#[tokio::test]
async fn test_wrong_redirect_reason_is_detected() {
    let mut tb = testbed().await;
    let ports = tb.ports();
    let s = &mut tb.session;
    let vrf = device::default_vrf(s).unwrap();
    let mac = device::router_mac(s).unwrap();
    l3::routed_port(s, vrf, L2Port::Port(ports[0])).await.unwrap();
    let rif = l3::routed_port(s, vrf, L2Port::Port(ports[1])).await.unwrap();
    let nh = l3::next_hop(s, rif, neighbor_ip(1)).await.unwrap();
    l3::route(s, vrf, "192.168.60.0/24".parse().unwrap(), RouteTarget::NextHop(nh))
        .await
        .unwrap();
    let probe = l3::probe_to(ports[0], mac, IpAddr::V4(Ipv4Addr::new(192, 168, 60, 1))).unwrap();

    tb.session.send_and_verify(&probe).await.unwrap();
    tb.sim.inject_fault(Some(Fault::WrongReason));
    let err = assert_err!(tb.session.send_and_verify(&probe).await);
    assert_eq!(kind(err), FailureKind::WrongReason);
    assert_ok!(tb.finish().await);
}

#[tokio::test]
async fn test_forwarding_where_a_drop_is_expected() {
    let mut tb = testbed().await;
    let (probe, egress) = routed(&mut tb).await;
    let route = tb
        .session
        .store()
        .objects_of_kind(ObjectKind::Route)
        .into_iter()
        .next()
        .unwrap();
    tb.session.remove(route).await.unwrap();

    // the device keeps forwarding with the old route while the model drops
    let stale = tb.session.expect(&probe).unwrap();
    assert!(stale.is_drop());
    let observed = vec![sai_harness::ObservedFrame {
        port: egress,
        data: probe.frame.encode(),
    }];
    let failure = tb.session.verifier().verify(&stale, &observed).unwrap_err();
    assert_eq!(failure.kind, FailureKind::UnexpectedOutput);
    assert_ok!(tb.finish().await);
}

/// ECMP from port 0 over ports 1.. with `weights`, checked with 100 flows.
async fn ecmp(
    tb: &mut Testbed,
    weights: &[u32],
) -> (LoadBalanceCheck, Vec<NextHopGroupMemberOid>) {
    let ports = tb.ports();
    let s = &mut tb.session;
    let vrf = device::default_vrf(s).unwrap();
    let mac = device::router_mac(s).unwrap();
    l3::routed_port(s, vrf, L2Port::Port(ports[0])).await.unwrap();
    let mut members = Vec::new();
    for (i, weight) in weights.iter().enumerate() {
        let index = i as u8 + 1;
        let egress = l3::routed_neighbor(s, vrf, ports[i + 1], index).await.unwrap();
        members.push((egress.next_hop, *weight));
    }
    let (group, member_oids) = groups::ecmp_group(s, &members).await.unwrap();
    let dst: IpPrefix = "198.51.100.0/24".parse().unwrap();
    l3::route(s, vrf, dst, RouteTarget::Group(group)).await.unwrap();

    let template = l3::probe_to(ports[0], mac, IpAddr::V4(Ipv4Addr::new(198, 51, 100, 1)))
        .unwrap()
        .frame;
    let check = LoadBalanceCheck::new(
        ports[0],
        template,
        "10.100.0.0/16".parse().unwrap(),
        dst,
        &s.settings().load_balance,
    )
    .with_flows(100);
    (check, member_oids)
}

fn statistical(err: HarnessError) -> Box<StatisticalFailure> {
    match err {
        HarnessError::Statistical(failure) => failure,
        other => panic!("expected a statistical failure, got {}", other),
    }
}

#[tokio::test]
async fn test_traffic_on_a_disabled_member_fails_the_distribution() {
    let mut tb = testbed().await;
    let ports = tb.ports();
    let (check, members) = ecmp(&mut tb, &[1, 1]).await;
    LbMutation::Disable(members[1].id())
        .apply(&mut tb.session)
        .await
        .unwrap();

    // everything meant for port 1 now lands on the disabled member's port
    tb.sim.inject_fault(Some(Fault::WrongPort));
    let failure = statistical(assert_err!(check.run(&tb.session).await));
    assert_eq!(failure.flows, 100);
    assert_eq!(failure.histogram[&ports[1]].count, 0);
    assert_eq!(failure.histogram[&ports[2]].weight, 0);
    assert_eq!(failure.histogram[&ports[2]].count, 100);
    assert!(failure.to_string().contains("FAIL"));

    tb.sim.inject_fault(None);
    assert_ok!(tb.finish().await);
}

#[tokio::test]
async fn test_traffic_shifted_between_members_fails_the_distribution() {
    let mut tb = testbed().await;
    let ports = tb.ports();
    let (check, members) = ecmp(&mut tb, &[7, 10, 13]).await;
    LbMutation::Disable(members[2].id())
        .apply(&mut tb.session)
        .await
        .unwrap();

    // port 1 traffic shows up on port 2 with port 1's rewrite
    tb.sim.inject_fault(Some(Fault::WrongPort));
    let failure = statistical(assert_err!(check.run(&tb.session).await));
    assert_eq!(failure.histogram[&ports[1]].count, 0);
    assert!(failure.histogram[&ports[1]].floor > 0);
    assert_eq!(failure.histogram[&ports[3]].weight, 0);
    assert_eq!(
        failure.histogram.values().map(|b| b.count).sum::<u64>(),
        100
    );

    tb.sim.inject_fault(None);
    assert_ok!(tb.finish().await);
}
