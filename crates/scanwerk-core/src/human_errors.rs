// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages for scanner frontends.
//
// Every error kind is mapped to plain English with a clear suggestion.
// Severity drives presentation and tells the caller whether retrying makes
// sense; nothing here retries on its own.

use crate::error::ScanwerkError;

/// Severity of an error from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Busy device, I/O blip; trying again may work.
    Transient,
    /// Someone must do something at the scanner (load paper, close lid).
    ActionRequired,
    /// A programming or configuration problem; retrying will not help.
    Permanent,
}

/// A human-readable error with plain English message and actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Plain English summary (shown as a heading).
    pub message: String,
    /// What the user should try (shown as body text).
    pub suggestion: String,
    /// Whether retrying the same call can succeed without intervention.
    pub retriable: bool,
    pub severity: Severity,
}

fn human(message: &str, suggestion: String, retriable: bool, severity: Severity) -> HumanError {
    HumanError {
        message: message.into(),
        suggestion,
        retriable,
        severity,
    }
}

/// Convert a `ScanwerkError` into a `HumanError`.
pub fn humanize_error(err: &ScanwerkError) -> HumanError {
    use Severity::*;

    match err {
        // -- Conditions at the scanner --
        ScanwerkError::NoDocuments => human(
            "The document feeder is empty.",
            "Load the pages into the feeder, then try again.".into(),
            false,
            ActionRequired,
        ),
        ScanwerkError::Jammed => human(
            "Paper is stuck in the document feeder.",
            "Open the feeder, gently remove the stuck page, close it and try again.".into(),
            false,
            ActionRequired,
        ),
        ScanwerkError::CoverOpen => human(
            "The scanner lid or cover is open.",
            "Close every cover on the scanner, then try again.".into(),
            false,
            ActionRequired,
        ),
        ScanwerkError::AccessDenied => human(
            "You don't have permission to use this scanner.",
            "Check the scanner's user/password, or ask for access to the device (on Linux, the 'scanner' group).".into(),
            false,
            ActionRequired,
        ),

        // -- Transient device trouble --
        ScanwerkError::DeviceBusy => human(
            "The scanner is busy.",
            "Another program may be using it. Wait a moment and try again.".into(),
            true,
            Transient,
        ),
        ScanwerkError::IoError(detail) => human(
            "We lost contact with the scanner.",
            format!("Check the cable or network connection and that the scanner is on. ({detail})"),
            true,
            Transient,
        ),
        ScanwerkError::OutOfMemory => human(
            "The scanner software ran out of memory.",
            "Try a lower resolution or a smaller scan area.".into(),
            true,
            Transient,
        ),

        // -- Normal outcomes --
        ScanwerkError::Cancelled => human(
            "The scan was cancelled.",
            "Start the scan again when you're ready.".into(),
            true,
            Transient,
        ),
        ScanwerkError::EndOfFile => human(
            "The scanner has no more data for this page.",
            "Start the next page or finish the scan.".into(),
            false,
            Permanent,
        ),

        // -- Settings --
        ScanwerkError::ConstraintViolation { option, value } => human(
            "The scanner can't use that setting.",
            format!("'{option}' doesn't accept {value}. Pick one of the values the scanner offers."),
            false,
            Permanent,
        ),
        ScanwerkError::ReadOnly(option) => human(
            "That setting can't be changed from here.",
            format!("'{option}' is controlled by the scanner itself (a button or switch)."),
            false,
            Permanent,
        ),
        ScanwerkError::Inactive(option) => human(
            "That setting isn't available right now.",
            format!("'{option}' depends on another setting; change that one first."),
            false,
            Permanent,
        ),
        ScanwerkError::ValueTooLarge { .. } => human(
            "That value is too long for the scanner.",
            "Use a shorter value.".into(),
            false,
            Permanent,
        ),

        ScanwerkError::InvalidDevice(name) => human(
            "That scanner couldn't be found.",
            format!("Check the scanner is plugged in and switched on, then search again. ({name})"),
            false,
            ActionRequired,
        ),
        ScanwerkError::NotFound(what) => human(
            "Something we looked for isn't there.",
            format!("The scanner doesn't offer '{what}'."),
            false,
            Permanent,
        ),
        ScanwerkError::NotReady(what) => human(
            "The scanner isn't ready.",
            format!("Open the scanner again before continuing. ({what})"),
            false,
            Permanent,
        ),
        ScanwerkError::Config(detail) => human(
            "The scanner settings file has a problem.",
            format!("Fix or remove the settings file. ({detail})"),
            false,
            Permanent,
        ),

        ScanwerkError::InvalidOption(_)
        | ScanwerkError::UnsupportedType(_)
        | ScanwerkError::TypeMismatch { .. }
        | ScanwerkError::Unbounded
        | ScanwerkError::Unsupported
        | ScanwerkError::InvalidArgument => human(
            "The scanner software made a request the scanner didn't accept.",
            format!("This is probably a bug; please report it. ({err})"),
            false,
            Permanent,
        ),
    }
}
