//! Topology fixtures for common forwarding setups.
//!
//! Every fixture configures through the [`Session`], so whatever it creates
//! is rolled back with the scenario.

use sai_api::*;
use sai_harness::packet::{tcp_packet, Frame};
use sai_harness::{HarnessResult, Probe, Session};
use sai_types::{IpAddr, IpPrefix, Ipv4Addr, MacAddress, VlanId};

/// Address of the neighbor behind routed port number `index`.
pub fn neighbor_ip(index: u8) -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(10, 0, index, 2))
}

/// MAC of the neighbor behind routed port number `index`.
pub fn neighbor_mac(index: u8) -> MacAddress {
    MacAddress::new([0x00, 0x11, 0x22, 0x33, 0x44, index])
}

/// Host on the far side of the routed ports, used as the probe source.
pub fn peer_mac() -> MacAddress {
    MacAddress::new([0x00, 0xaa, 0xbb, 0xcc, 0xdd, 0x01])
}

/// Device-owned defaults read from the switch object.
pub mod device {
    use super::*;

    pub fn default_vrf(s: &Session) -> HarnessResult<VrfOid> {
        s.store()
            .switch()
            .map(|(_, sw)| sw.default_vrf)
            .ok_or_else(|| SaiError::not_found(ObjectId::NULL).into())
    }

    pub fn router_mac(s: &Session) -> HarnessResult<MacAddress> {
        s.store()
            .switch()
            .map(|(_, sw)| sw.src_mac)
            .ok_or_else(|| SaiError::not_found(ObjectId::NULL).into())
    }
}

/// Routed interfaces, neighbors, nexthops and routes.
pub mod l3 {
    use super::*;

    /// A router interface on a port with one resolved neighbor behind it.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RoutedPort {
        pub port: PortOid,
        pub rif: RifOid,
        pub neighbor_ip: IpAddr,
        pub neighbor_mac: MacAddress,
        pub next_hop: NextHopOid,
    }

    pub async fn routed_port(s: &mut Session, vrf: VrfOid, port: L2Port) -> HarnessResult<RifOid> {
        s.create_typed(RouterInterfaceAttrs::new(vrf, RifBinding::Port(port)))
            .await
    }

    pub async fn sub_port(
        s: &mut Session,
        vrf: VrfOid,
        port: L2Port,
        outer_vlan: VlanId,
    ) -> HarnessResult<RifOid> {
        s.create_typed(RouterInterfaceAttrs::new(
            vrf,
            RifBinding::SubPort { port, outer_vlan },
        ))
        .await
    }

    pub async fn svi(s: &mut Session, vrf: VrfOid, vlan: VlanOid) -> HarnessResult<RifOid> {
        s.create_typed(RouterInterfaceAttrs::new(vrf, RifBinding::Vlan(vlan)))
            .await
    }

    pub async fn neighbor(
        s: &mut Session,
        rif: RifOid,
        ip: IpAddr,
        mac: MacAddress,
    ) -> HarnessResult<ObjectId> {
        s.create(NeighborAttrs {
            rif,
            ip,
            mac,
            no_host_route: true,
        })
        .await
    }

    pub async fn next_hop(s: &mut Session, rif: RifOid, ip: IpAddr) -> HarnessResult<NextHopOid> {
        s.create_typed(NextHopAttrs {
            rif,
            ip,
            nh_type: NextHopType::Regular,
        })
        .await
    }

    /// Router interface, neighbor and nexthop on `port`, numbered `index`.
    pub async fn routed_neighbor(
        s: &mut Session,
        vrf: VrfOid,
        port: PortOid,
        index: u8,
    ) -> HarnessResult<RoutedPort> {
        let rif = routed_port(s, vrf, L2Port::Port(port)).await?;
        let ip = neighbor_ip(index);
        let mac = neighbor_mac(index);
        neighbor(s, rif, ip, mac).await?;
        let next_hop = next_hop(s, rif, ip).await?;
        Ok(RoutedPort {
            port,
            rif,
            neighbor_ip: ip,
            neighbor_mac: mac,
            next_hop,
        })
    }

    pub async fn route(
        s: &mut Session,
        vrf: VrfOid,
        prefix: IpPrefix,
        target: RouteTarget,
    ) -> HarnessResult<RouteOid> {
        s.create_typed(RouteAttrs::forward(vrf, prefix, target))
            .await
    }

    pub async fn route_action(
        s: &mut Session,
        vrf: VrfOid,
        prefix: IpPrefix,
        action: RouteAction,
    ) -> HarnessResult<RouteOid> {
        s.create_typed(RouteAttrs::with_action(vrf, prefix, action))
            .await
    }

    /// TCP probe from the peer to the router MAC.
    pub fn probe_to(
        ingress: PortOid,
        router_mac: MacAddress,
        dst: IpAddr,
    ) -> HarnessResult<Probe> {
        let frame: Frame = tcp_packet()
            .eth_dst(router_mac)
            .eth_src(peer_mac())
            .ip_dst(dst)
            .build()?;
        Ok(Probe::new(ingress, frame))
    }
}

/// ECMP groups and LAGs.
pub mod groups {
    use super::*;

    pub async fn ecmp_group(
        s: &mut Session,
        members: &[(NextHopOid, u32)],
    ) -> HarnessResult<(NextHopGroupOid, Vec<NextHopGroupMemberOid>)> {
        let group: NextHopGroupOid = s.create_typed(NextHopGroupAttrs::default()).await?;
        let mut oids = Vec::with_capacity(members.len());
        for (nh, weight) in members {
            oids.push(
                s.create_typed(NextHopGroupMemberAttrs::new(group, *nh, *weight))
                    .await?,
            );
        }
        Ok((group, oids))
    }

    pub async fn lag(
        s: &mut Session,
        ports: &[PortOid],
    ) -> HarnessResult<(LagOid, Vec<LagMemberOid>)> {
        let lag: LagOid = s.create_typed(LagAttrs::default()).await?;
        let mut members = Vec::with_capacity(ports.len());
        for port in ports {
            members.push(s.create_typed(LagMemberAttrs::new(lag, *port)).await?);
        }
        Ok((lag, members))
    }
}

/// VLANs, members and FDB entries.
pub mod l2 {
    use super::*;

    /// Creates VLAN `vid` with `members`. Untagged members get `vid` as
    /// their port VLAN.
    pub async fn vlan(
        s: &mut Session,
        vid: VlanId,
        members: &[(L2Port, Tagging)],
    ) -> HarnessResult<VlanOid> {
        let vlan: VlanOid = s.create_typed(VlanAttrs::new(vid)).await?;
        for (port, tagging) in members {
            s.create(VlanMemberAttrs {
                vlan,
                port: *port,
                tagging: *tagging,
            })
            .await?;
            if *tagging == Tagging::Untagged {
                s.set(port.id(), AttrUpdate::PortVlanId(vid)).await?;
            }
        }
        Ok(vlan)
    }

    pub async fn fdb(
        s: &mut Session,
        vlan: VlanOid,
        mac: MacAddress,
        port: L2Port,
    ) -> HarnessResult<ObjectId> {
        s.create(FdbEntryAttrs {
            vlan,
            mac,
            port,
            is_static: true,
        })
        .await
    }
}
