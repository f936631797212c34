//! Longest-prefix-match route table.

use sai_api::{RouteOid, VrfOid};
use sai_types::{IpAddr, IpFamily, IpPrefix};
use std::collections::{BTreeMap, HashMap};

/// Per-VRF, per-family route index keyed by prefix length.
///
/// Lookup walks prefix lengths from most to least specific, so the result
/// depends only on which prefixes are present, never on insertion order.
#[derive(Debug, Default, Clone)]
pub struct RouteTable {
    tables: HashMap<(VrfOid, IpFamily), BTreeMap<u8, HashMap<IpAddr, RouteOid>>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a route, returning the one it replaced.
    pub fn insert(&mut self, vrf: VrfOid, prefix: IpPrefix, route: RouteOid) -> Option<RouteOid> {
        self.tables
            .entry((vrf, prefix.family()))
            .or_default()
            .entry(prefix.len())
            .or_default()
            .insert(prefix.network(), route)
    }

    pub fn remove(&mut self, vrf: VrfOid, prefix: &IpPrefix) -> Option<RouteOid> {
        let key = (vrf, prefix.family());
        let by_len = self.tables.get_mut(&key)?;
        let bucket = by_len.get_mut(&prefix.len())?;
        let removed = bucket.remove(&prefix.network());
        if bucket.is_empty() {
            by_len.remove(&prefix.len());
        }
        if by_len.is_empty() {
            self.tables.remove(&key);
        }
        removed
    }

    /// Most specific route in `vrf` covering `ip`.
    pub fn lookup(&self, vrf: VrfOid, ip: &IpAddr) -> Option<(IpPrefix, RouteOid)> {
        let by_len = self.tables.get(&(vrf, IpFamily::of(ip)))?;
        by_len.iter().rev().find_map(|(len, bucket)| {
            let prefix = IpPrefix::new(*ip, *len).ok()?;
            bucket.get(&prefix.network()).map(|r| (prefix, *r))
        })
    }

    pub fn len(&self) -> usize {
        self.tables
            .values()
            .flat_map(|by_len| by_len.values())
            .map(HashMap::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sai_api::{ObjectId, ObjectKind, Oid};

    fn route(i: u64) -> RouteOid {
        Oid::new_unchecked(ObjectId::compose(ObjectKind::Route, i))
    }

    fn vrf(i: u64) -> VrfOid {
        Oid::new_unchecked(ObjectId::compose(ObjectKind::VirtualRouter, i))
    }

    fn p(s: &str) -> IpPrefix {
        s.parse().unwrap()
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_most_specific_wins_and_falls_back() {
        let mut table = RouteTable::new();
        table.insert(vrf(1), p("10.0.0.0/8"), route(3));
        table.insert(vrf(1), p("10.1.1.0/24"), route(1));
        table.insert(vrf(1), p("10.1.0.0/16"), route(2));

        assert_eq!(
            table.lookup(vrf(1), &ip("10.1.1.5")),
            Some((p("10.1.1.0/24"), route(1)))
        );
        table.remove(vrf(1), &p("10.1.1.0/24"));
        assert_eq!(
            table.lookup(vrf(1), &ip("10.1.1.5")),
            Some((p("10.1.0.0/16"), route(2)))
        );
        table.remove(vrf(1), &p("10.1.0.0/16"));
        assert_eq!(table.lookup(vrf(1), &ip("10.1.1.5")).map(|r| r.1), Some(route(3)));
        assert_eq!(table.lookup(vrf(1), &ip("11.0.0.1")), None);
    }

    #[test]
    fn test_vrfs_and_families_are_independent() {
        let mut table = RouteTable::new();
        table.insert(vrf(1), p("0.0.0.0/0"), route(1));
        table.insert(vrf(2), p("10.0.0.0/8"), route(2));
        table.insert(vrf(1), p("::/0"), route(3));

        assert_eq!(table.lookup(vrf(1), &ip("10.0.0.1")).map(|r| r.1), Some(route(1)));
        assert_eq!(table.lookup(vrf(2), &ip("10.0.0.1")).map(|r| r.1), Some(route(2)));
        assert_eq!(table.lookup(vrf(2), &ip("11.0.0.1")), None);
        assert_eq!(table.lookup(vrf(1), &ip("2001:db8::1")).map(|r| r.1), Some(route(3)));
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_remove_cleans_up() {
        let mut table = RouteTable::new();
        table.insert(vrf(1), p("10.0.0.0/8"), route(1));
        assert_eq!(table.remove(vrf(1), &p("10.0.0.0/8")), Some(route(1)));
        assert_eq!(table.remove(vrf(1), &p("10.0.0.0/8")), None);
        assert!(table.is_empty());
    }
}
