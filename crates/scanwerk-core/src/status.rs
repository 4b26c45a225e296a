// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// SANE status codes and their mapping onto `ScanwerkError`.
//
// Every boundary call reports one of twelve status words. `Good` becomes
// `Ok(())`; every other code maps to exactly one error kind and back.

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScanwerkError};

/// Raw status word returned by the device-access boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum Status {
    Good = 0,
    Unsupported = 1,
    Cancelled = 2,
    DeviceBusy = 3,
    Inval = 4,
    Eof = 5,
    Jammed = 6,
    NoDocs = 7,
    CoverOpen = 8,
    IoError = 9,
    NoMem = 10,
    AccessDenied = 11,
}

impl Status {
    /// Every status code, in wire order.
    pub const ALL: [Status; 12] = [
        Status::Good,
        Status::Unsupported,
        Status::Cancelled,
        Status::DeviceBusy,
        Status::Inval,
        Status::Eof,
        Status::Jammed,
        Status::NoDocs,
        Status::CoverOpen,
        Status::IoError,
        Status::NoMem,
        Status::AccessDenied,
    ];

    /// Decode a raw status word. Unknown codes yield `None`.
    pub fn from_code(code: i32) -> Option<Self> {
        usize::try_from(code)
            .ok()
            .and_then(|i| Self::ALL.get(i))
            .copied()
    }

    /// Raw status word.
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Text equivalent to the native `sane_strstatus`.
    pub fn description(self) -> &'static str {
        match self {
            Self::Good => "Success",
            Self::Unsupported => "Operation not supported",
            Self::Cancelled => "Operation was cancelled",
            Self::DeviceBusy => "Device busy",
            Self::Inval => "Invalid argument",
            Self::Eof => "End of file reached",
            Self::Jammed => "Document feeder jammed",
            Self::NoDocs => "Document feeder out of documents",
            Self::CoverOpen => "Scanner cover is open",
            Self::IoError => "Error during device I/O",
            Self::NoMem => "Out of memory",
            Self::AccessDenied => "Access to resource has been denied",
        }
    }

    /// Turn a status into `Ok(())` or the matching error.
    pub fn check(self) -> Result<()> {
        match self {
            Self::Good => Ok(()),
            other => Err(ScanwerkError::from(other)),
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

impl From<Status> for ScanwerkError {
    /// `Good` is not an error; converting it yields `InvalidArgument` so a
    /// misuse surfaces instead of being swallowed.
    fn from(status: Status) -> Self {
        match status {
            Status::Unsupported => ScanwerkError::Unsupported,
            Status::Cancelled => ScanwerkError::Cancelled,
            Status::DeviceBusy => ScanwerkError::DeviceBusy,
            Status::Inval => ScanwerkError::InvalidArgument,
            Status::Eof => ScanwerkError::EndOfFile,
            Status::Jammed => ScanwerkError::Jammed,
            Status::NoDocs => ScanwerkError::NoDocuments,
            Status::CoverOpen => ScanwerkError::CoverOpen,
            Status::IoError => ScanwerkError::IoError(Status::IoError.description().into()),
            Status::NoMem => ScanwerkError::OutOfMemory,
            Status::AccessDenied => ScanwerkError::AccessDenied,
            Status::Good => ScanwerkError::InvalidArgument,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        for status in Status::ALL {
            assert_eq!(Status::from_code(status.code()), Some(status));
        }
        assert_eq!(Status::from_code(12), None);
        assert_eq!(Status::from_code(-1), None);
    }

    #[test]
    fn mapping_is_bijective_over_error_codes() {
        for status in Status::ALL.into_iter().skip(1) {
            let err = ScanwerkError::from(status);
            assert_eq!(err.status(), Some(status), "{status:?}");
        }
    }

    #[test]
    fn good_checks_ok() {
        assert!(Status::Good.check().is_ok());
        assert!(matches!(Status::Jammed.check(), Err(ScanwerkError::Jammed)));
    }

    #[test]
    fn descriptions_match_native_text() {
        assert_eq!(Status::NoDocs.to_string(), "Document feeder out of documents");
        assert_eq!(Status::Good.description(), "Success");
    }
}
