// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Scanwerk.

use thiserror::Error;

use crate::status::Status;
use crate::types::ValueType;

/// Top-level error type for all Scanwerk operations.
#[derive(Debug, Error)]
pub enum ScanwerkError {
    // -- Session / device --
    #[error("access to the device was denied")]
    AccessDenied,

    #[error("invalid device: {0}")]
    InvalidDevice(String),

    #[error("session not ready: {0}")]
    NotReady(&'static str),

    #[error("not found: {0}")]
    NotFound(String),

    // -- Option validation (detected locally) --
    #[error("invalid option index {0}")]
    InvalidOption(i32),

    #[error("option '{0}' is read-only")]
    ReadOnly(String),

    #[error("option '{0}' is inactive")]
    Inactive(String),

    #[error("value {value} violates the constraint of option '{option}'")]
    ConstraintViolation { option: String, value: String },

    #[error("value needs {needed} bytes but the option holds {size}")]
    ValueTooLarge { size: usize, needed: usize },

    #[error("{0:?} options carry no value")]
    UnsupportedType(ValueType),

    #[error("type mismatch: option expects {expected:?}, got {found}")]
    TypeMismatch { expected: ValueType, found: String },

    #[error("constraint has no finite enumeration")]
    Unbounded,

    // -- Boundary status codes --
    #[error("operation not supported")]
    Unsupported,

    #[error("operation was cancelled")]
    Cancelled,

    #[error("device busy")]
    DeviceBusy,

    #[error("invalid argument")]
    InvalidArgument,

    #[error("end of file reached")]
    EndOfFile,

    #[error("document feeder jammed")]
    Jammed,

    #[error("document feeder out of documents")]
    NoDocuments,

    #[error("scanner cover is open")]
    CoverOpen,

    #[error("device I/O error: {0}")]
    IoError(String),

    #[error("out of memory")]
    OutOfMemory,

    // -- Configuration --
    #[error("configuration error: {0}")]
    Config(String),
}

impl ScanwerkError {
    /// The boundary status this error corresponds to, if it is one of the
    /// kinds a device can report.
    pub fn status(&self) -> Option<Status> {
        match self {
            Self::Unsupported => Some(Status::Unsupported),
            Self::Cancelled => Some(Status::Cancelled),
            Self::DeviceBusy => Some(Status::DeviceBusy),
            Self::InvalidArgument => Some(Status::Inval),
            Self::EndOfFile => Some(Status::Eof),
            Self::Jammed => Some(Status::Jammed),
            Self::NoDocuments => Some(Status::NoDocs),
            Self::CoverOpen => Some(Status::CoverOpen),
            Self::IoError(_) => Some(Status::IoError),
            Self::OutOfMemory => Some(Status::NoMem),
            Self::AccessDenied => Some(Status::AccessDenied),
            _ => None,
        }
    }

    /// Whether the error is a local validation failure that never reached
    /// the device.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidOption(_)
                | Self::ReadOnly(_)
                | Self::Inactive(_)
                | Self::ConstraintViolation { .. }
                | Self::ValueTooLarge { .. }
                | Self::UnsupportedType(_)
                | Self::TypeMismatch { .. }
        )
    }
}

impl From<std::io::Error> for ScanwerkError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for ScanwerkError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ScanwerkError>;
