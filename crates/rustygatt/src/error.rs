//! Error types for the rustygatt library
//!
//! Every fallible engine operation returns a [`GattError`]. Each error carries
//! a stable [`ErrorKind`] plus a human-readable message, so a transport can
//! map it onto its own error vocabulary without parsing strings.

use std::fmt;
use thiserror::Error;

use crate::gatt::ObjectPath;

/// Stable classification of a [`GattError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The referenced path is not present in the registry
    NotFound,
    /// Malformed request payload
    InvalidArguments,
    /// A collaborator-level registration step failed
    RegistrationFailed,
    /// The operation is refused by design on this attribute
    NotSupported,
    /// The attribute does not expose this operation to remote callers
    NotPermitted,
    /// A reply or value buffer could not be allocated
    NoMemory,
}

impl ErrorKind {
    /// Stable name of the kind, suitable for a transport error name suffix
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "NotFound",
            ErrorKind::InvalidArguments => "InvalidArguments",
            ErrorKind::RegistrationFailed => "RegistrationFailed",
            ErrorKind::NotSupported => "NotSupported",
            ErrorKind::NotPermitted => "NotPermitted",
            ErrorKind::NoMemory => "NoMemory",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur while registering or accessing attributes
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GattError {
    #[error("No attribute at {0}")]
    NotFound(ObjectPath),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Registration failed: {0}")]
    RegistrationFailed(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Not permitted: {0}")]
    NotPermitted(String),

    #[error("No memory for {0} bytes")]
    NoMemory(usize),
}

impl GattError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            GattError::NotFound(_) => ErrorKind::NotFound,
            GattError::InvalidArguments(_) => ErrorKind::InvalidArguments,
            GattError::RegistrationFailed(_) => ErrorKind::RegistrationFailed,
            GattError::NotSupported(_) => ErrorKind::NotSupported,
            GattError::NotPermitted(_) => ErrorKind::NotPermitted,
            GattError::NoMemory(_) => ErrorKind::NoMemory,
        }
    }

    pub(crate) fn invalid_args() -> Self {
        GattError::InvalidArguments("Invalid arguments in method call".into())
    }
}

/// Failure reported by an [`ObjectBus`](crate::bus::ObjectBus) when exporting
/// an interface
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    #[error("Interface {interface} already exported at {path}")]
    AlreadyExported { path: ObjectPath, interface: &'static str },

    #[error("Bus refused {interface} at {path}: {reason}")]
    Refused {
        path: ObjectPath,
        interface: &'static str,
        reason: String,
    },
}

impl From<BusError> for GattError {
    fn from(err: BusError) -> Self {
        GattError::RegistrationFailed(err.to_string())
    }
}

/// Result type used throughout the crate
pub type GattResult<T> = Result<T, GattError>;
