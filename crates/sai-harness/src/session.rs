//! Scenario lifecycle.
//!
//! A [`Session`] owns the capabilities a scenario needs (mirrored config
//! client, traffic driver, verifier, oracle) plus the undo log. Every
//! change made through the session is recorded so it can be rolled back;
//! [`run_scenario`] guarantees that rollback runs whatever the scenario
//! body returns.

use crate::client::MirroredClient;
use crate::config::HarnessSettings;
use crate::error::{HarnessError, HarnessResult, ScenarioFailure};
use crate::oracle::{Expectation, Oracle};
use crate::packet::Frame;
use crate::topology::TopologyStore;
use crate::traffic::{ObservedFrame, PacketTransport, TrafficDriver};
use crate::undo::{RollbackError, UndoLog, UndoRecord};
use crate::verify::{Matched, VerificationFailure, Verifier};
use chrono::Utc;
use futures::future::BoxFuture;
use parking_lot::RwLockReadGuard;
use sai_api::*;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// A frame injected on an ingress port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probe {
    pub ingress: PortOid,
    pub frame: Frame,
}

impl Probe {
    pub fn new(ingress: PortOid, frame: Frame) -> Self {
        Self { ingress, frame }
    }
}

pub struct Session {
    client: MirroredClient,
    driver: TrafficDriver,
    verifier: Verifier,
    oracle: Oracle,
    undo: UndoLog,
    settings: HarnessSettings,
    active: bool,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("client", &self.client)
            .field("undo", &self.undo.len())
            .field("active", &self.active)
            .finish()
    }
}

impl Session {
    /// Discovers the device's current objects and opens a session on it.
    pub async fn begin(
        device: Arc<dyn ConfigClient>,
        transport: Arc<dyn PacketTransport>,
        settings: HarnessSettings,
    ) -> HarnessResult<Self> {
        settings.validate()?;
        let client = MirroredClient::discover(device).await?;
        let verifier = Verifier::new(transport.cpu_port());
        info!(
            "Session: started with {} discovered objects",
            client.store().read().len()
        );
        Ok(Self {
            client,
            driver: TrafficDriver::new(transport),
            verifier,
            oracle: Oracle::new(),
            undo: UndoLog::new(),
            settings,
            active: true,
        })
    }

    pub fn client(&self) -> &MirroredClient {
        &self.client
    }

    pub fn driver(&self) -> &TrafficDriver {
        &self.driver
    }

    pub fn verifier(&self) -> &Verifier {
        &self.verifier
    }

    pub fn settings(&self) -> &HarnessSettings {
        &self.settings
    }

    pub fn undo_log(&self) -> &UndoLog {
        &self.undo
    }

    pub(crate) fn undo_log_mut(&mut self) -> &mut UndoLog {
        &mut self.undo
    }

    /// Read access to the mirrored topology. Do not hold across an await.
    pub fn store(&self) -> RwLockReadGuard<'_, TopologyStore> {
        self.client.store().read()
    }

    // ===== configuration =====

    pub async fn create(&mut self, spec: impl Into<ObjectSpec>) -> HarnessResult<ObjectId> {
        let spec = spec.into();
        let kind = spec.kind();
        let id = self.client.create(spec).await?;
        self.undo.push(UndoRecord::Created { kind, id });
        Ok(id)
    }

    /// Creates an object and returns its typed handle.
    pub async fn create_typed<K: Kind>(
        &mut self,
        spec: impl Into<ObjectSpec>,
    ) -> HarnessResult<Oid<K>> {
        let id = self.create(spec).await?;
        Ok(Oid::try_from(id)?)
    }

    pub async fn set(&mut self, id: impl Into<ObjectId>, update: AttrUpdate) -> HarnessResult<()> {
        let id = id.into();
        // the inverse comes from the model; a locally invalid update is still
        // sent so the device's own status can be asserted
        let previous = self
            .client
            .store()
            .read()
            .validate_set(id, &update)
            .ok()
            .map(|(_, previous)| previous);
        self.client.set_attribute(id, update).await?;
        if let Some(previous) = previous {
            self.undo.push(UndoRecord::AttrChanged { id, previous });
        }
        Ok(())
    }

    /// Removes an object explicitly; its undo records are dropped.
    pub async fn remove(&mut self, id: impl Into<ObjectId>) -> HarnessResult<()> {
        let id = id.into();
        self.client.remove(id).await?;
        self.undo.remove_record(id);
        Ok(())
    }

    /// Removes every object of `kind`, newest first. Device-owned objects
    /// are left alone.
    pub async fn flush(&mut self, kind: ObjectKind) -> HarnessResult<usize> {
        if kind.is_builtin() {
            return Ok(0);
        }
        let ids = self.store().objects_of_kind(kind);
        for id in ids.iter().rev() {
            self.remove(*id).await?;
        }
        info!("Session: flushed {} {} objects", ids.len(), kind);
        Ok(ids.len())
    }

    // ===== traffic =====

    /// What the oracle predicts for `probe` on the current topology.
    pub fn expect(&self, probe: &Probe) -> HarnessResult<Expectation> {
        let store = self.store();
        self.oracle
            .expect(&store, probe.ingress, &probe.frame)
            .map_err(|e| HarnessError::oracle(e, store.snapshot()))
    }

    /// Sends `probe` once and returns every frame observed.
    pub async fn send_and_capture(
        &self,
        probe: &Probe,
        expected: &Expectation,
    ) -> HarnessResult<Vec<ObservedFrame>> {
        let timeout = if expected.is_drop() {
            self.settings.negative_timeout()
        } else {
            self.settings.capture_timeout()
        };
        Ok(self
            .driver
            .send_and_capture(
                probe.ingress,
                probe.frame.encode(),
                timeout,
                self.settings.settle(),
            )
            .await?)
    }

    /// Sends `probe` once and checks the output against `expected`.
    pub async fn check(&self, probe: &Probe, expected: &Expectation) -> HarnessResult<Matched> {
        let observed = self.send_and_capture(probe, expected).await?;
        Ok(self.verifier.verify(expected, &observed)?)
    }

    /// Derives the expectation for `probe`, sends it once and verifies.
    pub async fn send_and_verify(&self, probe: &Probe) -> HarnessResult<Matched> {
        let expected = self.expect(probe)?;
        debug!("Session: {} expects {}", probe.ingress, expected);
        self.check(probe, &expected).await
    }

    /// Like [`send_and_verify`](Self::send_and_verify), re-sending until
    /// the device converges or the poll budget runs out.
    pub async fn verify_eventually(&self, probe: &Probe) -> HarnessResult<Matched> {
        let expected = self.expect(probe)?;
        self.check_eventually(probe, &expected).await
    }

    pub async fn check_eventually(
        &self,
        probe: &Probe,
        expected: &Expectation,
    ) -> HarnessResult<Matched> {
        let attempts = self.settings.poll.attempts.max(1);
        let mut last: Option<VerificationFailure> = None;
        for attempt in 1..=attempts {
            let observed = self.send_and_capture(probe, expected).await?;
            match self.verifier.verify(expected, &observed) {
                Ok(matched) => {
                    if attempt > 1 {
                        debug!("Session: converged after {} attempts", attempt);
                    }
                    return Ok(matched);
                }
                Err(failure) => {
                    debug!("Session: attempt {}/{} failed: {}", attempt, attempts, failure);
                    last = Some(failure);
                }
            }
            if attempt < attempts {
                tokio::time::sleep(self.settings.poll_interval()).await;
            }
        }
        match last {
            Some(failure) => {
                warn!("Session: no convergence after {} attempts", attempts);
                Err(failure.into())
            }
            None => Ok(Matched::default()),
        }
    }

    // ===== teardown =====

    /// Rolls back the newest `n` changes.
    pub async fn rollback(&mut self, n: usize) -> HarnessResult<usize> {
        Ok(self.undo.pop_last(&self.client, n).await?)
    }

    /// Rolls back everything and closes the session.
    pub async fn end(mut self) -> Result<(), RollbackError> {
        let undone = self.undo.pop_all(&self.client).await;
        self.active = false;
        match undone {
            Ok(n) => {
                info!("Session: ended, {} changes rolled back", n);
                Ok(())
            }
            Err(e) => {
                error!("Session: teardown failed: {}", e);
                Err(e)
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.active && !self.undo.is_empty() {
            warn!(
                "Session: dropped with {} changes not rolled back",
                self.undo.len()
            );
        }
    }
}

/// Runs `body` and rolls back every change it recorded, on success and on
/// failure alike. A failure report carries the topology as it was when the
/// body failed, before teardown.
pub async fn run_scenario<T, F>(
    session: &mut Session,
    name: &str,
    body: F,
) -> Result<T, ScenarioFailure>
where
    F: for<'a> FnOnce(&'a mut Session) -> BoxFuture<'a, HarnessResult<T>>,
{
    info!("Scenario {}: start", name);
    let mark = session.undo_log().len();
    let result = body(&mut *session).await;
    let snapshot = match &result {
        Err(_) => Some(session.store().snapshot()),
        Ok(_) => None,
    };

    let pending = session.undo_log().len().saturating_sub(mark);
    let teardown = session.rollback(pending).await;

    match (result, teardown) {
        (Ok(value), Ok(_)) => {
            info!("Scenario {}: pass", name);
            Ok(value)
        }
        (Ok(_), Err(e)) => {
            error!("Scenario {}: teardown failed: {}", name, e);
            Err(ScenarioFailure {
                scenario: name.to_string(),
                snapshot: session.store().snapshot(),
                error: e,
                at: Utc::now(),
                teardown: None,
            })
        }
        (Err(e), teardown) => {
            error!("Scenario {}: fail: {}", name, e);
            let teardown = match teardown {
                Err(HarnessError::Rollback(r)) => Some(r),
                _ => None,
            };
            Err(ScenarioFailure {
                scenario: name.to_string(),
                error: e,
                snapshot: snapshot.unwrap_or_default(),
                at: Utc::now(),
                teardown,
            })
        }
    }
}
