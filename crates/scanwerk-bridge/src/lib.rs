// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanwerk: device-access boundary.
//
// `DeviceBackend` is the one seam between the session layer and a SANE-style
// library. Two implementations ship: the system libsane (feature `libsane`)
// and an in-process emulated flatbed used on machines without scanners and
// throughout the test suites.

pub mod emulated;
#[cfg(feature = "libsane")]
pub mod native;
pub mod traits;

use std::sync::Arc;

pub use emulated::{EmulatedBackend, EmulatedDevice, EmulatedStats};
pub use traits::{AuthCallback, BackendResult, DeviceBackend, RawHandle};

/// The backend for this build: libsane when linked in, otherwise the
/// emulated flatbed.
pub fn default_backend() -> Arc<dyn DeviceBackend> {
    #[cfg(feature = "libsane")]
    {
        Arc::new(native::LibSane::new())
    }
    #[cfg(not(feature = "libsane"))]
    {
        tracing::warn!("built without libsane; using the emulated scanner");
        Arc::new(emulated::EmulatedBackend::with_test_device())
    }
}
