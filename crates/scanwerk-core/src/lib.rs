// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanwerk: core types, value codec, constraint model and error definitions
// shared across all crates.

pub mod codec;
pub mod config;
pub mod constraint;
pub mod descriptor;
pub mod error;
pub mod human_errors;
pub mod status;
pub mod types;

pub use config::ScanConfig;
pub use constraint::{Constraint, ConstraintValue, WordRange};
pub use descriptor::{OPTION_COUNT_INDEX, OptionDescriptor};
pub use error::{Result, ScanwerkError};
pub use status::Status;
pub use types::*;
