//! Compares observed frames against an expectation.

use crate::oracle::{Candidate, Expectation};
use crate::packet::{CpuPacket, Frame, Mask, MaskedField};
use crate::traffic::ObservedFrame;
use sai_api::PortOid;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Nothing arrived where something was expected.
    Timeout,
    WrongPort,
    WrongBytes,
    WrongCount,
    /// Something arrived where nothing was expected.
    UnexpectedOutput,
    /// A CPU-port frame carried the wrong redirect reason.
    WrongReason,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::Timeout => "timeout",
            FailureKind::WrongPort => "wrong port",
            FailureKind::WrongBytes => "wrong bytes",
            FailureKind::WrongCount => "wrong count",
            FailureKind::UnexpectedOutput => "unexpected output",
            FailureKind::WrongReason => "wrong reason",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Error)]
#[error("{kind}: expected {expected}, observed {} frame(s): {detail}", .observed.len())]
pub struct VerificationFailure {
    pub kind: FailureKind,
    pub expected: Expectation,
    /// Everything captured, in arrival order.
    pub observed: Vec<ObservedFrame>,
    pub detail: String,
}

/// Ports the expectation was satisfied on, in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Matched {
    pub ports: Vec<PortOid>,
}

/// Stateless checker; masks are applied to every comparison.
#[derive(Debug, Clone)]
pub struct Verifier {
    cpu_port: PortOid,
    masked: Vec<MaskedField>,
}

impl Verifier {
    /// Masks the fields a device may rewrite unpredictably.
    pub fn new(cpu_port: PortOid) -> Self {
        Self::with_masks(
            cpu_port,
            vec![
                MaskedField::Ipv4Id,
                MaskedField::Ipv4Checksum,
                MaskedField::UdpSrcPort,
                MaskedField::UdpChecksum,
                MaskedField::TcpChecksum,
            ],
        )
    }

    pub fn with_masks(cpu_port: PortOid, masked: Vec<MaskedField>) -> Self {
        Self { cpu_port, masked }
    }

    pub fn cpu_port(&self) -> PortOid {
        self.cpu_port
    }

    pub fn verify(
        &self,
        expected: &Expectation,
        observed: &[ObservedFrame],
    ) -> Result<Matched, VerificationFailure> {
        let fail = |kind, detail: String| VerificationFailure {
            kind,
            expected: expected.clone(),
            observed: observed.to_vec(),
            detail,
        };

        match expected {
            Expectation::NoOutput { cause } => match observed.first() {
                None => Ok(Matched::default()),
                Some(first) => Err(fail(
                    FailureKind::UnexpectedOutput,
                    format!("expected a drop ({}), first frame on {}", cause, first.port),
                )),
            },

            Expectation::ExactOn(_) | Expectation::AnyOneOf(_) => {
                let frame = self.single(observed).map_err(|(k, d)| fail(k, d))?;
                self.match_candidates(expected.candidates(), frame)
                    .map_err(|(k, d)| fail(k, d))?;
                Ok(Matched {
                    ports: vec![frame.port],
                })
            }

            Expectation::AllOf(deliveries) => {
                if observed.is_empty() {
                    return Err(fail(FailureKind::Timeout, "no frame observed".to_string()));
                }
                if observed.len() != deliveries.len() {
                    return Err(fail(
                        FailureKind::WrongCount,
                        format!("{} deliveries", deliveries.len()),
                    ));
                }
                let mut used = vec![false; observed.len()];
                for (i, delivery) in deliveries.iter().enumerate() {
                    let hit = observed.iter().enumerate().find(|(j, o)| {
                        !used[*j] && self.match_candidates(&delivery.candidates, o).is_ok()
                    });
                    match hit {
                        Some((j, _)) => used[j] = true,
                        None => {
                            let ports = delivery.ports();
                            let kind = if observed
                                .iter()
                                .enumerate()
                                .any(|(j, o)| !used[j] && ports.contains(&o.port))
                            {
                                FailureKind::WrongBytes
                            } else {
                                FailureKind::WrongPort
                            };
                            return Err(fail(
                                kind,
                                format!("delivery {} on {:?} unmatched", i, ports),
                            ));
                        }
                    }
                }
                Ok(Matched {
                    ports: observed.iter().map(|o| o.port).collect(),
                })
            }

            Expectation::RedirectToCpu { reason, frame } => {
                let got = self.single(observed).map_err(|(k, d)| fail(k, d))?;
                if got.port != self.cpu_port {
                    return Err(fail(
                        FailureKind::WrongPort,
                        format!("expected CPU port {}, got {}", self.cpu_port, got.port),
                    ));
                }
                let pkt = CpuPacket::decode(&got.data).map_err(|e| {
                    fail(FailureKind::WrongBytes, format!("bad CPU header: {}", e))
                })?;
                if pkt.reason != *reason {
                    return Err(fail(
                        FailureKind::WrongReason,
                        format!("expected {}, got {}", reason, pkt.reason),
                    ));
                }
                if let Some(offset) = self.mask(frame).first_mismatch(&pkt.frame) {
                    return Err(fail(
                        FailureKind::WrongBytes,
                        format!("redirected frame differs at byte {}", offset),
                    ));
                }
                Ok(Matched {
                    ports: vec![got.port],
                })
            }
        }
    }

    fn mask(&self, frame: &Frame) -> Mask {
        Mask::with_fields(frame, &self.masked)
    }

    fn single<'a>(
        &self,
        observed: &'a [ObservedFrame],
    ) -> Result<&'a ObservedFrame, (FailureKind, String)> {
        match observed {
            [] => Err((FailureKind::Timeout, "no frame observed".to_string())),
            [one] => Ok(one),
            many => Err((
                FailureKind::WrongCount,
                format!("expected one frame, got {}", many.len()),
            )),
        }
    }

    fn match_candidates(
        &self,
        candidates: &[Candidate],
        got: &ObservedFrame,
    ) -> Result<(), (FailureKind, String)> {
        let on_port: Vec<&Candidate> = candidates.iter().filter(|c| c.port == got.port).collect();
        if on_port.is_empty() {
            let ports: Vec<String> = candidates.iter().map(|c| c.port.to_string()).collect();
            return Err((
                FailureKind::WrongPort,
                format!("frame on {}, expected one of [{}]", got.port, ports.join(", ")),
            ));
        }
        let mut offsets = Vec::new();
        for c in on_port {
            match self.mask(&c.frame).first_mismatch(&got.data) {
                None => return Ok(()),
                Some(offset) => offsets.push(offset),
            }
        }
        Err((
            FailureKind::WrongBytes,
            format!("frame on {} differs at byte {:?}", got.port, offsets),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::Delivery;
    use crate::packet::{tcp_packet, udp_packet};
    use bytes::Bytes;
    use pretty_assertions::assert_eq;
    use sai_api::{CpuReason, DropReason, ObjectId, ObjectKind};

    fn port(n: u64) -> PortOid {
        PortOid::new_unchecked(ObjectId::compose(ObjectKind::Port, n))
    }

    fn seen(n: u64, frame: &Frame) -> ObservedFrame {
        ObservedFrame {
            port: port(n),
            data: frame.encode(),
        }
    }

    fn exact(n: u64, frame: &Frame) -> Expectation {
        Expectation::ExactOn(Candidate {
            port: port(n),
            frame: frame.clone(),
            weight: 1,
        })
    }

    #[test]
    fn test_exact_match_with_masked_fields() {
        let v = Verifier::new(port(0));
        let expected = udp_packet().ip_id(1).sport(1000).build().unwrap();
        let observed = udp_packet().ip_id(7).sport(2000).build().unwrap();
        let m = v.verify(&exact(1, &expected), &[seen(1, &observed)]).unwrap();
        assert_eq!(m.ports, vec![port(1)]);
    }

    #[test]
    fn test_wrong_port_and_bytes() {
        let v = Verifier::new(port(0));
        let frame = tcp_packet().build().unwrap();
        let err = v.verify(&exact(1, &frame), &[seen(2, &frame)]).unwrap_err();
        assert_eq!(err.kind, FailureKind::WrongPort);
        assert_eq!(err.observed.len(), 1);

        let other = tcp_packet().ttl(9).build().unwrap();
        let err = v.verify(&exact(1, &frame), &[seen(1, &other)]).unwrap_err();
        assert_eq!(err.kind, FailureKind::WrongBytes);
    }

    #[test]
    fn test_timeout_and_count() {
        let v = Verifier::new(port(0));
        let frame = tcp_packet().build().unwrap();
        assert_eq!(
            v.verify(&exact(1, &frame), &[]).unwrap_err().kind,
            FailureKind::Timeout
        );
        assert_eq!(
            v.verify(&exact(1, &frame), &[seen(1, &frame), seen(1, &frame)])
                .unwrap_err()
                .kind,
            FailureKind::WrongCount
        );
    }

    #[test]
    fn test_any_one_of() {
        let v = Verifier::new(port(0));
        let frame = tcp_packet().build().unwrap();
        let exp = Expectation::AnyOneOf(
            [1, 2]
                .into_iter()
                .map(|n| Candidate {
                    port: port(n),
                    frame: frame.clone(),
                    weight: 1,
                })
                .collect(),
        );
        assert!(v.verify(&exp, &[seen(2, &frame)]).is_ok());
        assert_eq!(
            v.verify(&exp, &[seen(3, &frame)]).unwrap_err().kind,
            FailureKind::WrongPort
        );
    }

    #[test]
    fn test_all_of_takes_one_frame_per_delivery() {
        let v = Verifier::new(port(0));
        let frame = tcp_packet().build().unwrap();
        let delivery = |ports: &[u64]| Delivery {
            candidates: ports
                .iter()
                .map(|n| Candidate {
                    port: port(*n),
                    frame: frame.clone(),
                    weight: 1,
                })
                .collect(),
        };
        let exp = Expectation::AllOf(vec![delivery(&[1]), delivery(&[2, 3])]);

        assert!(v.verify(&exp, &[seen(3, &frame), seen(1, &frame)]).is_ok());
        // both LAG members emitting is a duplicate
        assert_eq!(
            v.verify(&exp, &[seen(1, &frame), seen(2, &frame), seen(3, &frame)])
                .unwrap_err()
                .kind,
            FailureKind::WrongCount
        );
        assert_eq!(
            v.verify(&exp, &[seen(2, &frame), seen(3, &frame)])
                .unwrap_err()
                .kind,
            FailureKind::WrongPort
        );
    }

    #[test]
    fn test_redirect_reason() {
        let v = Verifier::new(port(0));
        let frame = tcp_packet().build().unwrap();
        let exp = Expectation::RedirectToCpu {
            reason: CpuReason::Glean,
            frame: frame.clone(),
        };
        let cpu = |reason| ObservedFrame {
            port: port(0),
            data: CpuPacket {
                reason,
                ingress_port: port(1).id(),
                frame: frame.encode(),
            }
            .encode(),
        };
        assert!(v.verify(&exp, &[cpu(CpuReason::Glean)]).is_ok());
        assert_eq!(
            v.verify(&exp, &[cpu(CpuReason::TtlError)]).unwrap_err().kind,
            FailureKind::WrongReason
        );
        assert_eq!(
            v.verify(&exp, &[seen(0, &frame)]).unwrap_err().kind,
            FailureKind::WrongBytes
        );
    }

    #[test]
    fn test_unexpected_output() {
        let v = Verifier::new(port(0));
        let exp = Expectation::drop(DropReason::LpmMiss);
        assert!(v.verify(&exp, &[]).is_ok());

        let stray = ObservedFrame {
            port: port(4),
            data: Bytes::from_static(b"stray"),
        };
        let err = v.verify(&exp, &[stray]).unwrap_err();
        assert_eq!(err.kind, FailureKind::UnexpectedOutput);
        assert!(err.to_string().contains("unexpected output"));
    }
}
