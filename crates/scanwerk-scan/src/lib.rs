// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanwerk Scan: reference-counted library runtime, device directory,
// per-session option registry and the acquisition state machine. This crate
// sits between the typed model in `scanwerk-core` and the device boundary in
// `scanwerk-bridge`.

pub mod directory;
pub mod registry;
pub mod runtime;
pub mod session;

pub use directory::DeviceDirectory;
pub use registry::OptionRegistry;
pub use runtime::Runtime;
pub use session::{CancelHandle, ReadOutcome, ReadinessHandle, Session, SetOutcome};
