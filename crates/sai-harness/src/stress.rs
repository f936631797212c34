//! Configuration churn under traffic.
//!
//! A mutator task applies attribute updates in a loop while a traffic task
//! sends the probe. Only the final state is verified; output seen while the updates
//! are in flight is counted, not checked.

use crate::error::HarnessResult;
use crate::session::{Probe, Session};
use crate::undo::UndoRecord;
use crate::verify::Matched;
use sai_api::*;
use std::collections::HashSet;
use tokio::task::JoinError;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct StressPlan {
    /// Passes over `updates`.
    pub rounds: usize,
    pub updates: Vec<(ObjectId, AttrUpdate)>,
    pub probe: Probe,
    /// Packets sent while the mutator runs.
    pub packets: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StressReport {
    pub mutations: usize,
    pub sent: usize,
    /// Frames observed while mutating.
    pub observed: usize,
    /// Result of verifying the probe against the final state.
    pub matched: Matched,
}

/// Runs `plan` against `session`. Each touched attribute gets one undo
/// record restoring the value it had before the run.
pub async fn run_stress(session: &mut Session, plan: &StressPlan) -> HarnessResult<StressReport> {
    let mut seen = HashSet::new();
    let mut restore = Vec::new();
    {
        let store = session.store();
        for (id, update) in &plan.updates {
            let (_, previous) = store.validate_set(*id, update)?;
            if seen.insert((*id, update.name())) {
                restore.push(UndoRecord::AttrChanged { id: *id, previous });
            }
        }
    }
    for record in restore {
        session.undo_log_mut().push(record);
    }

    let client = session.client().clone();
    let driver = session.driver().clone();
    let timeout = session.settings().capture_timeout();
    let settle = session.settings().settle();
    let ingress = plan.probe.ingress;
    let data = plan.probe.frame.encode();

    info!(
        "run_stress: {} rounds of {} updates, {} packets",
        plan.rounds,
        plan.updates.len(),
        plan.packets
    );

    let rounds = plan.rounds;
    let updates = plan.updates.clone();
    let mutator = tokio::spawn(async move {
        let mut applied: usize = 0;
        for round in 0..rounds {
            for (id, update) in &updates {
                client.set_attribute(*id, update.clone()).await?;
                applied += 1;
                tokio::task::yield_now().await;
            }
            debug!("run_stress: round {} done", round);
        }
        HarnessResult::Ok(applied)
    });
    let packets = plan.packets;
    let traffic = tokio::spawn(async move {
        let capture = driver.arm([]);
        for _ in 0..packets {
            driver.send(ingress, data.clone()).await?;
            tokio::task::yield_now().await;
        }
        let observed = capture.collect(timeout, settle).await?;
        HarnessResult::Ok(observed.len())
    });
    let (mutator, traffic) = tokio::join!(mutator, traffic);
    let mutations = joined(mutator)?;
    let observed = joined(traffic)?;

    let matched = session.verify_eventually(&plan.probe).await?;
    let report = StressReport {
        mutations,
        sent: plan.packets,
        observed,
        matched,
    };
    info!("run_stress: {:?}", report);
    Ok(report)
}

/// Result of a finished task. A panic in the task is resumed here.
fn joined<T>(result: Result<HarnessResult<T>, JoinError>) -> HarnessResult<T> {
    match result {
        Ok(inner) => inner,
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::{with_builtins, MockDevice};
    use crate::config::HarnessSettings;
    use crate::packet::tcp_packet;
    use crate::traffic::loopback::Loopback;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn port(n: u64) -> PortOid {
        PortOid::new_unchecked(ObjectId::compose(ObjectKind::Port, n))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stress_records_one_restore_per_attribute() {
        let mut device = MockDevice::new();
        with_builtins(&mut device);
        // 3 rounds of 2 updates, then one restore
        device.expect_set_attribute().times(7).returning(|_, _| Ok(()));
        let transport = Arc::new(Loopback::new(port(1)));
        let mut s = Session::begin(
            Arc::new(device),
            transport.clone(),
            HarnessSettings::for_simulator(),
        )
        .await
        .unwrap();

        let plan = StressPlan {
            rounds: 3,
            updates: vec![
                (port(2).id(), AttrUpdate::Mtu(1500)),
                (port(2).id(), AttrUpdate::Mtu(9000)),
            ],
            probe: Probe::new(port(2), tcp_packet().build().unwrap()),
            packets: 5,
        };
        let report = run_stress(&mut s, &plan).await.unwrap();

        assert_eq!(report.mutations, 6);
        assert_eq!(report.observed, 0);
        assert!(transport.sent.lock().len() >= 5);
        assert_eq!(
            s.undo_log().records(),
            &[UndoRecord::AttrChanged {
                id: port(2).id(),
                previous: AttrUpdate::Mtu(DEFAULT_MTU),
            }]
        );
        let client = s.client().clone();
        s.end().await.unwrap();
        assert_eq!(
            client.store().read().port(port(2)).map(|p| p.mtu),
            Some(DEFAULT_MTU)
        );
    }

    fn plan(rounds: usize) -> StressPlan {
        StressPlan {
            rounds,
            updates: vec![(port(2).id(), AttrUpdate::Mtu(9000))],
            probe: Probe::new(port(2), tcp_packet().build().unwrap()),
            packets: 5,
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_traffic_flows_while_a_device_call_blocks() {
        let transport = Arc::new(Loopback::new(port(1)));
        let sent_during_call = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let mut device = MockDevice::new();
        with_builtins(&mut device);
        let (t, seen) = (transport.clone(), sent_during_call.clone());
        device.expect_set_attribute().returning(move |_, _| {
            std::thread::sleep(std::time::Duration::from_millis(100));
            seen.lock().push(t.sent.lock().len());
            Ok(())
        });
        let mut s = Session::begin(
            Arc::new(device),
            transport.clone(),
            HarnessSettings::for_simulator(),
        )
        .await
        .unwrap();

        let report = run_stress(&mut s, &plan(1)).await.unwrap();
        assert_eq!(report.mutations, 1);
        // the single update blocked its thread; the probes went out meanwhile
        assert!(sent_during_call.lock().first().is_some_and(|n| *n > 0));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    #[should_panic(expected = "device crashed")]
    async fn test_mutator_panic_reaches_the_caller() {
        let mut device = MockDevice::new();
        with_builtins(&mut device);
        device
            .expect_set_attribute()
            .returning(|_, _| panic!("device crashed"));
        let mut s = Session::begin(
            Arc::new(device),
            Arc::new(Loopback::new(port(1))),
            HarnessSettings::for_simulator(),
        )
        .await
        .unwrap();

        let _ = run_stress(&mut s, &plan(1)).await;
    }
}
