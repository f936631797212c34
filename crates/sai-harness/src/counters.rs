//! Drop-reason counter cross-checks.
//!
//! A debug counter is installed for a set of drop reasons. Its statistic id
//! is derived from the index the device reports for it, never from a fixed
//! table. Trigger packets are then sent and the counter deltas compared
//! against what the oracle says each packet does: a counter moves by the
//! number of triggers whose drop reason it covers, and by nothing else.

use crate::error::HarnessResult;
use crate::oracle::Expectation;
use crate::session::{Probe, Session};
use sai_api::*;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};

/// A debug counter present on the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledCounter {
    pub oid: DebugCounterOid,
    /// Index reported by the device.
    pub index: u32,
    pub stat: CounterId,
    pub scope: CounterScope,
    pub stage: CounterStage,
    pub reasons: Vec<DropReason>,
}

impl InstalledCounter {
    pub fn covers(&self, reason: DropReason) -> bool {
        self.reasons.contains(&reason)
    }
}

impl fmt::Display for InstalledCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reasons: Vec<String> = self.reasons.iter().map(|r| r.to_string()).collect();
        write!(
            f,
            "{} [{:?}/{:?} #{}: {}]",
            self.oid,
            self.scope,
            self.stage,
            self.index,
            reasons.join(",")
        )
    }
}

/// One counter whose delta did not match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterMismatch {
    pub counter: String,
    pub object: ObjectId,
    pub expected: u64,
    pub observed: u64,
}

#[derive(Debug, Clone, Error)]
#[error("{} counter(s) off after {polls} polls: {}", .mismatches.len(), render(.mismatches))]
pub struct CounterFailure {
    pub polls: u32,
    pub mismatches: Vec<CounterMismatch>,
}

fn render(mismatches: &[CounterMismatch]) -> String {
    mismatches
        .iter()
        .map(|m| {
            format!(
                "{} on {:?} expected +{} got +{}",
                m.counter, m.object, m.expected, m.observed
            )
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Counter values keyed by counter handle.
pub type CounterSnapshot = BTreeMap<DebugCounterOid, u64>;

#[derive(Debug, Clone, Default)]
pub struct CounterChecker {
    counters: Vec<InstalledCounter>,
}

impl CounterChecker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counters(&self) -> &[InstalledCounter] {
        &self.counters
    }

    /// Creates a debug counter through `session` and resolves its statistic.
    pub async fn install(
        &mut self,
        session: &mut Session,
        scope: CounterScope,
        stage: CounterStage,
        reasons: &[DropReason],
    ) -> HarnessResult<InstalledCounter> {
        let id = session
            .create(DebugCounterAttrs {
                scope,
                stage,
                reasons: reasons.to_vec(),
            })
            .await?;
        let oid = DebugCounterOid::try_from(id)?;
        let value = session
            .client()
            .get_attribute(id, AttrId::DebugCounterIndex)
            .await?;
        let index = value.as_u32().ok_or_else(|| {
            SaiError::invalid_parameter(format!(
                "debug counter {:?} reported a non-numeric index {:?}",
                id, value
            ))
        })?;

        let counter = InstalledCounter {
            oid,
            index,
            stat: CounterId::for_debug_counter(stage, index),
            scope,
            stage,
            reasons: reasons.to_vec(),
        };
        info!("CounterChecker: installed {}", counter);
        self.counters.push(counter.clone());
        Ok(counter)
    }

    /// Object a counter is read from for traffic entering on `ingress`.
    fn object_for(
        &self,
        session: &Session,
        counter: &InstalledCounter,
        ingress: PortOid,
    ) -> HarnessResult<ObjectId> {
        match counter.scope {
            CounterScope::Port => Ok(ingress.id()),
            CounterScope::Switch => session
                .store()
                .switch()
                .map(|(s, _)| s.id())
                .ok_or_else(|| SaiError::not_found(ObjectId::NULL).into()),
        }
    }

    /// Current value of every installed counter, as seen by traffic
    /// entering on `ingress`.
    pub async fn snapshot(
        &self,
        session: &Session,
        ingress: PortOid,
    ) -> HarnessResult<CounterSnapshot> {
        let mut values = CounterSnapshot::new();
        for counter in &self.counters {
            let object = self.object_for(session, counter, ingress)?;
            let read = session
                .client()
                .get_counters(object, &[counter.stat])
                .await?;
            let value = read.first().copied().ok_or_else(|| SaiError::Status {
                status: SaiStatus::Failure,
                context: format!("{:?} returned no value for {:?}", object, counter.stat),
            })?;
            values.insert(counter.oid, value);
        }
        Ok(values)
    }

    /// Zeroes every installed counter for `ingress`.
    pub async fn clear(&self, session: &Session, ingress: PortOid) -> HarnessResult<()> {
        for counter in &self.counters {
            let object = self.object_for(session, counter, ingress)?;
            session
                .client()
                .clear_counters(object, &[counter.stat])
                .await?;
        }
        Ok(())
    }

    /// Polls until each counter has moved from `before` by exactly its
    /// entry in `expected` (zero when absent).
    pub async fn expect_deltas(
        &self,
        session: &Session,
        ingress: PortOid,
        before: &CounterSnapshot,
        expected: &BTreeMap<DebugCounterOid, u64>,
    ) -> HarnessResult<()> {
        let attempts = session.settings().poll.attempts.max(1);
        let mut mismatches = Vec::new();

        for attempt in 1..=attempts {
            let now = self.snapshot(session, ingress).await?;
            mismatches.clear();
            for counter in &self.counters {
                let want = expected.get(&counter.oid).copied().unwrap_or(0);
                let got = now
                    .get(&counter.oid)
                    .copied()
                    .unwrap_or(0)
                    .saturating_sub(before.get(&counter.oid).copied().unwrap_or(0));
                if got != want {
                    mismatches.push(CounterMismatch {
                        counter: counter.to_string(),
                        object: self.object_for(session, counter, ingress)?,
                        expected: want,
                        observed: got,
                    });
                }
            }
            if mismatches.is_empty() {
                debug!("CounterChecker: deltas converged after {} polls", attempt);
                return Ok(());
            }
            // over-counting never recovers
            if mismatches.iter().any(|m| m.observed > m.expected) {
                break;
            }
            if attempt < attempts {
                tokio::time::sleep(session.settings().poll_interval()).await;
            }
        }

        warn!("CounterChecker: {} counter(s) off", mismatches.len());
        Err(CounterFailure {
            polls: attempts,
            mismatches,
        }
        .into())
    }

    /// Sends each probe `packets` times, verifying the forwarding result,
    /// then checks every installed counter moved by the number of probes
    /// the oracle attributes to one of its reasons.
    pub async fn check_batch(
        &self,
        session: &Session,
        ingress: PortOid,
        probes: &[Probe],
        packets: u64,
    ) -> HarnessResult<BTreeMap<DebugCounterOid, u64>> {
        let before = self.snapshot(session, ingress).await?;
        let mut expected: BTreeMap<DebugCounterOid, u64> = BTreeMap::new();

        for probe in probes {
            let expectation = session.expect(probe)?;
            let reason = match &expectation {
                Expectation::NoOutput { cause } => cause.reason(),
                _ => None,
            };
            debug!(
                "CounterChecker: probe on {} expects {} ({} packets)",
                probe.ingress, expectation, packets
            );
            for _ in 0..packets {
                session.check(probe, &expectation).await?;
            }
            let Some(reason) = reason else { continue };
            for counter in &self.counters {
                if counter.covers(reason) && self.counts(counter, probe.ingress, ingress) {
                    *expected.entry(counter.oid).or_insert(0) += packets;
                }
            }
        }

        self.expect_deltas(session, ingress, &before, &expected)
            .await?;
        Ok(expected)
    }

    /// Whether a drop on `probe_ingress` lands in the counter read for
    /// `ingress`.
    fn counts(&self, counter: &InstalledCounter, probe_ingress: PortOid, ingress: PortOid) -> bool {
        match counter.scope {
            CounterScope::Port => probe_ingress == ingress,
            CounterScope::Switch => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::{with_builtins, MockDevice};
    use crate::config::HarnessSettings;
    use crate::traffic::loopback::Loopback;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use tokio_test::assert_err;

    fn port(n: u64) -> PortOid {
        PortOid::new_unchecked(ObjectId::compose(ObjectKind::Port, n))
    }

    fn counter(n: u64, scope: CounterScope, reasons: &[DropReason]) -> InstalledCounter {
        InstalledCounter {
            oid: DebugCounterOid::new_unchecked(ObjectId::compose(ObjectKind::DebugCounter, n)),
            index: n as u32,
            stat: CounterId::for_debug_counter(CounterStage::Ingress, n as u32),
            scope,
            stage: CounterStage::Ingress,
            reasons: reasons.to_vec(),
        }
    }

    #[test]
    fn test_covers_and_display() {
        let c = counter(2, CounterScope::Port, &[DropReason::TtlError, DropReason::LpmMiss]);
        assert!(c.covers(DropReason::LpmMiss));
        assert!(!c.covers(DropReason::AclAny));
        assert_eq!(c.stat, CounterId::InDropReason(2));
        assert!(c.to_string().contains("TTL,LPM_MISS"));
    }

    #[test]
    fn test_scope_attribution() {
        let checker = CounterChecker::new();
        let p1 = PortOid::new_unchecked(ObjectId::compose(ObjectKind::Port, 2));
        let p2 = PortOid::new_unchecked(ObjectId::compose(ObjectKind::Port, 3));
        let port = counter(0, CounterScope::Port, &[DropReason::TtlError]);
        let switch = counter(1, CounterScope::Switch, &[DropReason::TtlError]);
        assert!(checker.counts(&port, p1, p1));
        assert!(!checker.counts(&port, p2, p1));
        assert!(checker.counts(&switch, p2, p1));
    }

    #[tokio::test]
    async fn test_snapshot_fails_when_the_device_omits_a_value() {
        let mut device = MockDevice::new();
        with_builtins(&mut device);
        let dc = ObjectId::compose(ObjectKind::DebugCounter, 1);
        device.expect_create().returning(move |_| Ok(dc));
        device
            .expect_get_attribute()
            .returning(|_, _| Ok(AttrValue::U32(4)));
        device.expect_get_counters().returning(|_, _| Ok(Vec::new()));
        let mut s = Session::begin(
            Arc::new(device),
            Arc::new(Loopback::new(port(1))),
            HarnessSettings::for_simulator(),
        )
        .await
        .unwrap();

        let mut checker = CounterChecker::new();
        checker
            .install(&mut s, CounterScope::Port, CounterStage::Ingress, &[DropReason::LpmMiss])
            .await
            .unwrap();
        let err = assert_err!(checker.snapshot(&s, port(2)).await);
        assert_eq!(err.status(), Some(SaiStatus::Failure));
        assert!(err.to_string().contains("no value"));
    }

    #[test]
    fn test_failure_lists_every_mismatch() {
        let failure = CounterFailure {
            polls: 3,
            mismatches: vec![
                CounterMismatch {
                    counter: "a".into(),
                    object: ObjectId::compose(ObjectKind::Port, 2),
                    expected: 5,
                    observed: 0,
                },
                CounterMismatch {
                    counter: "b".into(),
                    object: ObjectId::compose(ObjectKind::Port, 2),
                    expected: 0,
                    observed: 5,
                },
            ],
        };
        let text = failure.to_string();
        assert!(text.starts_with("2 counter(s) off after 3 polls"));
        assert!(text.contains("a on") && text.contains("expected +0 got +5"));
    }
}
