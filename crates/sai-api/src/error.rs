//! Device status codes and the client error type.
//!
//! Every [`SaiError`] maps back to a [`SaiStatus`] through
//! [`SaiError::status`], so negative scenarios can assert the exact status a
//! device returned.

use crate::{ObjectId, ObjectKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Status codes matching `sai_status_t`.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SaiStatus {
    Success = 0,
    Failure = -1,
    NotSupported = -2,
    NoMemory = -3,
    InsufficientResources = -4,
    InvalidParameter = -5,
    ItemAlreadyExists = -6,
    ItemNotFound = -7,
    BufferOverflow = -8,
    InvalidPortNumber = -9,
    InvalidPortMember = -10,
    InvalidVlanId = -11,
    Uninitialized = -12,
    TableFull = -13,
    MandatoryAttributeMissing = -14,
    NotImplemented = -15,
    AddrNotFound = -16,
    ObjectInUse = -17,
    InvalidObjectType = -18,
    InvalidObjectId = -19,
    InvalidAttribute = -24,
}

impl SaiStatus {
    /// Creates a status from its raw value. Unknown codes map to `Failure`.
    pub fn from_raw(status: i32) -> Self {
        match status {
            0 => SaiStatus::Success,
            -2 => SaiStatus::NotSupported,
            -3 => SaiStatus::NoMemory,
            -4 => SaiStatus::InsufficientResources,
            -5 => SaiStatus::InvalidParameter,
            -6 => SaiStatus::ItemAlreadyExists,
            -7 => SaiStatus::ItemNotFound,
            -8 => SaiStatus::BufferOverflow,
            -9 => SaiStatus::InvalidPortNumber,
            -10 => SaiStatus::InvalidPortMember,
            -11 => SaiStatus::InvalidVlanId,
            -12 => SaiStatus::Uninitialized,
            -13 => SaiStatus::TableFull,
            -14 => SaiStatus::MandatoryAttributeMissing,
            -15 => SaiStatus::NotImplemented,
            -16 => SaiStatus::AddrNotFound,
            -17 => SaiStatus::ObjectInUse,
            -18 => SaiStatus::InvalidObjectType,
            -19 => SaiStatus::InvalidObjectId,
            -24 => SaiStatus::InvalidAttribute,
            _ => SaiStatus::Failure,
        }
    }

    pub fn is_success(&self) -> bool {
        *self == SaiStatus::Success
    }

    /// Converts to a Result, returning Ok(()) for success.
    pub fn into_result(self) -> SaiResult<()> {
        if self.is_success() {
            Ok(())
        } else {
            Err(SaiError::from_status(self))
        }
    }
}

impl fmt::Display for SaiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SaiStatus::Success => "SAI_STATUS_SUCCESS",
            SaiStatus::Failure => "SAI_STATUS_FAILURE",
            SaiStatus::NotSupported => "SAI_STATUS_NOT_SUPPORTED",
            SaiStatus::NoMemory => "SAI_STATUS_NO_MEMORY",
            SaiStatus::InsufficientResources => "SAI_STATUS_INSUFFICIENT_RESOURCES",
            SaiStatus::InvalidParameter => "SAI_STATUS_INVALID_PARAMETER",
            SaiStatus::ItemAlreadyExists => "SAI_STATUS_ITEM_ALREADY_EXISTS",
            SaiStatus::ItemNotFound => "SAI_STATUS_ITEM_NOT_FOUND",
            SaiStatus::BufferOverflow => "SAI_STATUS_BUFFER_OVERFLOW",
            SaiStatus::InvalidPortNumber => "SAI_STATUS_INVALID_PORT_NUMBER",
            SaiStatus::InvalidPortMember => "SAI_STATUS_INVALID_PORT_MEMBER",
            SaiStatus::InvalidVlanId => "SAI_STATUS_INVALID_VLAN_ID",
            SaiStatus::Uninitialized => "SAI_STATUS_UNINITIALIZED",
            SaiStatus::TableFull => "SAI_STATUS_TABLE_FULL",
            SaiStatus::MandatoryAttributeMissing => "SAI_STATUS_MANDATORY_ATTRIBUTE_MISSING",
            SaiStatus::NotImplemented => "SAI_STATUS_NOT_IMPLEMENTED",
            SaiStatus::AddrNotFound => "SAI_STATUS_ADDR_NOT_FOUND",
            SaiStatus::ObjectInUse => "SAI_STATUS_OBJECT_IN_USE",
            SaiStatus::InvalidObjectType => "SAI_STATUS_INVALID_OBJECT_TYPE",
            SaiStatus::InvalidObjectId => "SAI_STATUS_INVALID_OBJECT_ID",
            SaiStatus::InvalidAttribute => "SAI_STATUS_INVALID_ATTRIBUTE",
        };
        write!(f, "{}", s)
    }
}

/// Error returned by a [`ConfigClient`](crate::ConfigClient) call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SaiError {
    /// The device returned a non-success status.
    #[error("{status}: {context}")]
    Status { status: SaiStatus, context: String },

    #[error("item not found: {id:?}")]
    NotFound { id: ObjectId },

    #[error("item already exists: {item}")]
    AlreadyExists { item: String },

    /// Removal blocked by surviving dependents.
    #[error("object {id:?} in use by {dependents} dependent object(s)")]
    ObjectInUse { id: ObjectId, dependents: usize },

    #[error("invalid parameter: {message}")]
    InvalidParameter { message: String },

    #[error("invalid attribute {attr} for {kind}")]
    InvalidAttribute { kind: ObjectKind, attr: String },

    #[error("handle {id:?} is not a {expected}")]
    InvalidObjectType { expected: ObjectKind, id: ObjectId },

    /// The call never reached the device.
    #[error("transport error: {0}")]
    Transport(String),
}

impl SaiError {
    /// Creates an error from a bare status code.
    pub fn from_status(status: SaiStatus) -> Self {
        SaiError::Status {
            status,
            context: String::new(),
        }
    }

    pub fn not_found(id: impl Into<ObjectId>) -> Self {
        SaiError::NotFound { id: id.into() }
    }

    pub fn already_exists(item: impl Into<String>) -> Self {
        SaiError::AlreadyExists { item: item.into() }
    }

    pub fn in_use(id: impl Into<ObjectId>, dependents: usize) -> Self {
        SaiError::ObjectInUse {
            id: id.into(),
            dependents,
        }
    }

    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        SaiError::InvalidParameter {
            message: message.into(),
        }
    }

    pub fn invalid_attribute(kind: ObjectKind, attr: impl Into<String>) -> Self {
        SaiError::InvalidAttribute {
            kind,
            attr: attr.into(),
        }
    }

    pub fn invalid_object_type(expected: ObjectKind, id: ObjectId) -> Self {
        SaiError::InvalidObjectType { expected, id }
    }

    /// The device status this error corresponds to.
    pub fn status(&self) -> SaiStatus {
        match self {
            SaiError::Status { status, .. } => *status,
            SaiError::NotFound { .. } => SaiStatus::ItemNotFound,
            SaiError::AlreadyExists { .. } => SaiStatus::ItemAlreadyExists,
            SaiError::ObjectInUse { .. } => SaiStatus::ObjectInUse,
            SaiError::InvalidParameter { .. } => SaiStatus::InvalidParameter,
            SaiError::InvalidAttribute { .. } => SaiStatus::InvalidAttribute,
            SaiError::InvalidObjectType { .. } => SaiStatus::InvalidObjectType,
            SaiError::Transport(_) => SaiStatus::Failure,
        }
    }
}

/// Result alias for client calls.
pub type SaiResult<T> = Result<T, SaiError>;
