//! Harness error taxonomy.

use crate::config::SettingsError;
use crate::counters::CounterFailure;
use crate::lb::StatisticalFailure;
use crate::oracle::OracleError;
use crate::ordering::OrderingError;
use crate::packet::BuildError;
use crate::topology::TopologySnapshot;
use crate::traffic::TrafficError;
use crate::undo::RollbackError;
use crate::verify::VerificationFailure;
use chrono::{DateTime, Utc};
use sai_api::{SaiError, SaiStatus};
use sai_types::ParseError;
use std::fmt;
use thiserror::Error;
use tokio::task::JoinError;

#[derive(Debug, Error)]
pub enum HarnessError {
    /// The device rejected a configuration call.
    #[error("config: {0}")]
    Config(#[from] SaiError),

    /// The oracle could not derive an expectation. Carries the topology the
    /// derivation ran against.
    #[error("oracle: {error}")]
    Oracle {
        error: OracleError,
        snapshot: Box<TopologySnapshot>,
    },

    #[error("verification: {0}")]
    Verification(Box<VerificationFailure>),

    #[error("load balance: {0}")]
    Statistical(Box<StatisticalFailure>),

    #[error("rollback: {0}")]
    Rollback(#[from] RollbackError),

    #[error("ordering: {0}")]
    Ordering(#[from] OrderingError),

    #[error("traffic: {0}")]
    Traffic(#[from] TrafficError),

    #[error("settings: {0}")]
    Settings(#[from] SettingsError),

    #[error("counters: {0}")]
    Counter(Box<CounterFailure>),

    #[error("packet: {0}")]
    Packet(#[from] BuildError),

    #[error("input: {0}")]
    Parse(#[from] ParseError),

    /// A background task was cancelled before it finished.
    #[error("task: {0}")]
    Task(#[from] JoinError),
}

impl HarnessError {
    pub fn oracle(error: OracleError, snapshot: TopologySnapshot) -> Self {
        HarnessError::Oracle {
            error,
            snapshot: Box::new(snapshot),
        }
    }

    /// Device status behind a `Config` error.
    pub fn status(&self) -> Option<SaiStatus> {
        match self {
            HarnessError::Config(e) => Some(e.status()),
            _ => None,
        }
    }

    pub fn is_verification(&self) -> bool {
        matches!(self, HarnessError::Verification(_))
    }
}

impl From<VerificationFailure> for HarnessError {
    fn from(failure: VerificationFailure) -> Self {
        HarnessError::Verification(Box::new(failure))
    }
}

impl From<StatisticalFailure> for HarnessError {
    fn from(failure: StatisticalFailure) -> Self {
        HarnessError::Statistical(Box::new(failure))
    }
}

impl From<CounterFailure> for HarnessError {
    fn from(failure: CounterFailure) -> Self {
        HarnessError::Counter(Box::new(failure))
    }
}

pub type HarnessResult<T> = Result<T, HarnessError>;

/// A failed scenario together with the topology at the time of failure.
#[derive(Debug)]
pub struct ScenarioFailure {
    pub scenario: String,
    pub error: HarnessError,
    pub snapshot: TopologySnapshot,
    pub at: DateTime<Utc>,
    /// Problems hit while tearing down after the failure.
    pub teardown: Option<RollbackError>,
}

impl fmt::Display for ScenarioFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "scenario '{}' failed at {}: {}",
            self.scenario,
            self.at.to_rfc3339(),
            self.error
        )?;
        if let Some(teardown) = &self.teardown {
            writeln!(f, "teardown: {}", teardown)?;
        }
        write!(f, "{}", self.snapshot)
    }
}

impl std::error::Error for ScenarioFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sai_api::{ObjectId, ObjectKind};

    #[test]
    fn test_config_error_keeps_status() {
        let id = ObjectId::compose(ObjectKind::Route, 3);
        let err: HarnessError = SaiError::in_use(id, 1).into();
        assert_eq!(err.status(), Some(SaiStatus::ObjectInUse));
        assert!(!err.is_verification());
    }

    #[test]
    fn test_scenario_failure_reports_snapshot() {
        let failure = ScenarioFailure {
            scenario: "glean".to_string(),
            error: HarnessError::oracle(OracleError::NoSwitch, TopologySnapshot::default()),
            snapshot: TopologySnapshot::default(),
            at: Utc::now(),
            teardown: None,
        };
        let text = failure.to_string();
        assert!(text.contains("scenario 'glean' failed"));
        assert!(text.contains("switch object is not configured"));
        assert!(text.contains("topology (0 objects)"));
    }
}
