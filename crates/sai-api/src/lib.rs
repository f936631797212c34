//! Typed object model for the SAI (Switch Abstraction Interface) device API.
//!
//! This crate defines what the conformance harness talks to:
//!
//! - [`ObjectId`] / [`Oid<K>`]: opaque handles, optionally typed per kind
//! - [`SaiStatus`] / [`SaiError`]: device status codes
//! - [`ObjectSpec`]: typed attribute sets, validated before they reach the device
//! - [`AttrUpdate`]: single-attribute mutations with computed inverses
//! - [`CounterId`], [`DropReason`], [`CpuReason`]: counters and redirect reasons
//! - [`ConfigClient`]: the async device configuration boundary

pub mod attr;
pub mod client;
pub mod counter;
pub mod error;
pub mod trap;
pub mod types;
pub mod update;

pub use attr::*;
pub use client::ConfigClient;
pub use counter::{CounterId, CounterScope, CounterStage, DropReason};
pub use error::{SaiError, SaiResult, SaiStatus};
pub use trap::CpuReason;
pub use types::*;
pub use update::{AttrId, AttrUpdate, AttrValue};
