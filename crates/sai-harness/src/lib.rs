//! Model-based conformance harness for SAI forwarding devices.
//!
//! The harness mirrors every configuration call in a [`TopologyStore`],
//! derives the expected forwarding result of a probe frame with the
//! [`Oracle`], sends the frame through a [`PacketTransport`] and checks what
//! came out with the [`Verifier`]. On top of that it provides:
//!
//! - [`UndoLog`]: LIFO rollback of creations and attribute changes
//! - [`permute_and_run`]: resolution-order independence checks
//! - [`LoadBalanceCheck`]: weighted ECMP/LAG distribution checks
//! - [`CounterChecker`]: drop-reason counter cross-checks
//! - [`Session`] / [`run_scenario`]: scenario lifecycle with guaranteed teardown
//!
//! ```text
//!   ConfigClient ──► MirroredClient ──► TopologyStore ──► Oracle ──► Expectation
//!                                                                      │
//!   PacketTransport ◄── TrafficDriver ──► observed frames ──► Verifier ◄┘
//! ```

pub mod client;
pub mod config;
pub mod counters;
pub mod error;
pub mod lb;
pub mod logging;
pub mod oracle;
pub mod ordering;
pub mod packet;
pub mod session;
pub mod stress;
pub mod topology;
pub mod traffic;
pub mod undo;
pub mod verify;

pub use client::MirroredClient;
pub use config::HarnessSettings;
pub use counters::{CounterChecker, CounterFailure, InstalledCounter};
pub use error::{HarnessError, HarnessResult, ScenarioFailure};
pub use lb::{FlowKey, FlowKeySpace, LbMutation, LoadBalanceCheck, StatisticalFailure};
pub use oracle::{Candidate, Delivery, DropCause, Expectation, Oracle, OracleError};
pub use ordering::{permute_and_run, OrderingError, Orderings, Step};
pub use session::{run_scenario, Probe, Session};
pub use stress::{run_stress, StressPlan, StressReport};
pub use topology::{TopologySnapshot, TopologyStore};
pub use traffic::{Capture, ObservedFrame, PacketTransport, TrafficDriver, TrafficError};
pub use undo::{RollbackError, UndoLog, UndoRecord};
pub use verify::{FailureKind, Matched, VerificationFailure, Verifier};
