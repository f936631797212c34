//! What the oracle predicts for one probe frame.

use crate::packet::Frame;
use sai_api::{CpuReason, DropReason, PortOid};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// One acceptable way a frame may leave the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub port: PortOid,
    pub frame: Frame,
    /// Relative share of traffic this candidate should receive when the
    /// device picks among several.
    pub weight: u64,
}

/// A single frame that must be emitted on one of its candidates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub candidates: Vec<Candidate>,
}

impl Delivery {
    pub fn ports(&self) -> BTreeSet<PortOid> {
        self.candidates.iter().map(|c| c.port).collect()
    }
}

/// Why nothing is expected to come out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DropCause {
    /// A drop the device attributes to a counted reason.
    Reason(DropReason),
    /// Ingress port is administratively down.
    PortDown,
    /// Frame reached a routed interface without a router MAC, or is not IP.
    NotRouted,
    /// Forwarding resolved to an empty set of egress ports.
    NoEgress,
    /// Bridged frame whose destination lives behind the ingress port.
    SameBridgePort,
}

impl DropCause {
    /// The counted drop reason, if any.
    pub fn reason(&self) -> Option<DropReason> {
        match self {
            DropCause::Reason(r) => Some(*r),
            _ => None,
        }
    }
}

impl From<DropReason> for DropCause {
    fn from(reason: DropReason) -> Self {
        DropCause::Reason(reason)
    }
}

impl fmt::Display for DropCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropCause::Reason(r) => write!(f, "{}", r),
            DropCause::PortDown => write!(f, "ingress port down"),
            DropCause::NotRouted => write!(f, "not routable"),
            DropCause::NoEgress => write!(f, "no egress port"),
            DropCause::SameBridgePort => write!(f, "destination on ingress bridge port"),
        }
    }
}

/// Predicted forwarding result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expectation {
    /// Exactly one frame on exactly one port.
    ExactOn(Candidate),
    /// Exactly one frame on any one of the candidates (ECMP, LAG).
    AnyOneOf(Vec<Candidate>),
    /// One frame per delivery (flood). A LAG in the flood set is a single
    /// delivery whose candidates are its egress-enabled members.
    AllOf(Vec<Delivery>),
    /// One frame on the CPU port carrying `reason` and the frame as received.
    RedirectToCpu { reason: CpuReason, frame: Frame },
    /// Nothing within the timeout.
    NoOutput { cause: DropCause },
}

impl Expectation {
    /// Unicast forwarding over `candidates`.
    pub fn forward(mut candidates: Vec<Candidate>) -> Self {
        match candidates.len() {
            0 => Expectation::NoOutput {
                cause: DropCause::NoEgress,
            },
            1 => Expectation::ExactOn(candidates.remove(0)),
            _ => Expectation::AnyOneOf(candidates),
        }
    }

    pub fn drop(cause: impl Into<DropCause>) -> Self {
        Expectation::NoOutput {
            cause: cause.into(),
        }
    }

    pub fn is_drop(&self) -> bool {
        matches!(self, Expectation::NoOutput { .. })
    }

    /// Candidates of a unicast expectation.
    pub fn candidates(&self) -> &[Candidate] {
        match self {
            Expectation::ExactOn(c) => std::slice::from_ref(c),
            Expectation::AnyOneOf(cs) => cs,
            _ => &[],
        }
    }

    /// Every data port that may receive a frame.
    pub fn egress_ports(&self) -> BTreeSet<PortOid> {
        match self {
            Expectation::ExactOn(c) => BTreeSet::from([c.port]),
            Expectation::AnyOneOf(cs) => cs.iter().map(|c| c.port).collect(),
            Expectation::AllOf(ds) => ds.iter().flat_map(Delivery::ports).collect(),
            Expectation::RedirectToCpu { .. } | Expectation::NoOutput { .. } => BTreeSet::new(),
        }
    }

    /// The same expectation with candidates and deliveries in a canonical
    /// order, for comparing results built from differently ordered
    /// configuration.
    pub fn normalized(&self) -> Self {
        fn sort(candidates: &mut [Candidate]) {
            candidates.sort_by_cached_key(|c| (c.port, c.weight, c.frame.encode()));
        }
        match self {
            Expectation::AnyOneOf(cs) => {
                let mut cs = cs.clone();
                sort(&mut cs);
                Expectation::AnyOneOf(cs)
            }
            Expectation::AllOf(ds) => {
                let mut ds = ds.clone();
                for d in &mut ds {
                    sort(&mut d.candidates);
                }
                ds.sort_by_key(|d| d.ports().into_iter().next());
                Expectation::AllOf(ds)
            }
            other => other.clone(),
        }
    }

    /// Expected share per egress port of a unicast expectation. Repeated
    /// candidates on one port add up.
    pub fn weights(&self) -> BTreeMap<PortOid, u64> {
        let mut weights = BTreeMap::new();
        for c in self.candidates() {
            let w: &mut u64 = weights.entry(c.port).or_insert(0);
            *w = w.saturating_add(c.weight);
        }
        weights
    }
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expectation::ExactOn(c) => write!(f, "ExactOn({})", c.port),
            Expectation::AnyOneOf(cs) => {
                write!(f, "AnyOneOf([")?;
                for (i, c) in cs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}*{}", c.port, c.weight)?;
                }
                write!(f, "])")
            }
            Expectation::AllOf(ds) => write!(f, "AllOf({} deliveries)", ds.len()),
            Expectation::RedirectToCpu { reason, .. } => write!(f, "RedirectToCpu({})", reason),
            Expectation::NoOutput { cause } => write!(f, "NoOutput({})", cause),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::tcp_packet;
    use pretty_assertions::assert_eq;
    use sai_api::{ObjectId, ObjectKind};

    fn candidate(n: u64, weight: u64) -> Candidate {
        Candidate {
            port: PortOid::new_unchecked(ObjectId::compose(ObjectKind::Port, n)),
            frame: tcp_packet().build().unwrap(),
            weight,
        }
    }

    #[test]
    fn test_forward_shapes() {
        assert!(Expectation::forward(vec![]).is_drop());
        assert!(matches!(
            Expectation::forward(vec![candidate(1, 1)]),
            Expectation::ExactOn(_)
        ));
        assert_eq!(
            Expectation::forward(vec![candidate(1, 1), candidate(2, 1)])
                .egress_ports()
                .len(),
            2
        );
    }

    #[test]
    fn test_weights_add_up_per_port() {
        let exp = Expectation::AnyOneOf(vec![candidate(1, 2), candidate(2, 3), candidate(1, 5)]);
        let weights: Vec<u64> = exp.weights().into_values().collect();
        assert_eq!(weights, vec![7, 3]);
    }

    #[test]
    fn test_normalized_ignores_member_order() {
        let a = Expectation::AnyOneOf(vec![candidate(2, 10), candidate(1, 7)]);
        let b = Expectation::AnyOneOf(vec![candidate(1, 7), candidate(2, 10)]);
        assert_ne!(a, b);
        assert_eq!(a.normalized(), b.normalized());
        assert!(a.to_string().starts_with("AnyOneOf(["));
    }
}
