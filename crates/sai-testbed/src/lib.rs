//! Simulated target and conformance scenarios for the SAI harness.
//!
//! Provides:
//! - [`SimulatedSwitch`]: an in-process device implementing both the
//!   configuration and the packet boundary
//! - Topology fixtures for routed ports, ECMP groups, LAGs and VLANs
//! - Named scenarios runnable from the `sai-testbed` binary

pub mod fixtures;
pub mod scenarios;
pub mod sim;

pub use scenarios::{Scenario, SCENARIOS};
pub use sim::{Fault, SimConfig, SimulatedSwitch};

use sai_api::PortOid;
use sai_harness::{HarnessResult, HarnessSettings, RollbackError, Session};
use std::sync::Arc;

/// A simulated switch with a session open on it.
#[derive(Debug)]
pub struct Testbed {
    pub sim: SimulatedSwitch,
    pub session: Session,
}

impl Testbed {
    pub async fn start(settings: HarnessSettings) -> HarnessResult<Self> {
        let config = SimConfig::from_settings(&settings);
        Self::with_sim(config, settings).await
    }

    pub async fn with_sim(config: SimConfig, settings: HarnessSettings) -> HarnessResult<Self> {
        let sim = SimulatedSwitch::new(config)?;
        let session = Session::begin(Arc::new(sim.clone()), Arc::new(sim.clone()), settings).await?;
        Ok(Self { sim, session })
    }

    pub fn ports(&self) -> Vec<PortOid> {
        self.sim.ports().to_vec()
    }

    /// Rolls back whatever is still recorded and closes the session.
    pub async fn finish(self) -> Result<(), RollbackError> {
        self.session.end().await
    }
}
