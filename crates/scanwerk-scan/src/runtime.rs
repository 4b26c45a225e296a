// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Reference-counted library lifetime.
//
// The device library is initialised once by `Runtime::init` and torn down
// when the last clone is dropped. Sessions and directories each hold a
// clone, so `exit` can never run under an open handle.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use scanwerk_bridge::{AuthCallback, DeviceBackend};
use scanwerk_core::{Result, ScanConfig, Status, VersionCode};
use tracing::{info, instrument};

use crate::directory::DeviceDirectory;
use crate::session::Session;

struct RuntimeInner {
    backend: Arc<dyn DeviceBackend>,
    version: VersionCode,
    started_at: DateTime<Utc>,
}

impl Drop for RuntimeInner {
    fn drop(&mut self) {
        self.backend.exit();
        info!(backend = self.backend.backend_name(), "device library shut down");
    }
}

/// Handle on an initialised device library. Cheap to clone.
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("backend", &self.inner.backend.backend_name())
            .field("version", &self.inner.version)
            .field("refs", &self.ref_count())
            .finish()
    }
}

#[cfg(feature = "libsane")]
static NATIVE: parking_lot::Mutex<std::sync::Weak<RuntimeInner>> =
    parking_lot::const_mutex(std::sync::Weak::new());

impl Runtime {
    /// Initialise `backend`. `auth` is consulted whenever a device asks for
    /// credentials.
    ///
    /// Every call initialises `backend` again and the matching `exit` runs
    /// when this runtime's last clone drops. libsane is process-global, so
    /// reach it through `Runtime::native` instead.
    pub fn init(backend: Arc<dyn DeviceBackend>, auth: Option<AuthCallback>) -> Result<Self> {
        debug_assert_ne!(
            backend.backend_name(),
            "libsane",
            "libsane runtimes must come from Runtime::native"
        );
        Self::init_backend(backend, auth)
    }

    #[instrument(skip_all, fields(backend = backend.backend_name()))]
    fn init_backend(backend: Arc<dyn DeviceBackend>, auth: Option<AuthCallback>) -> Result<Self> {
        let version = backend.init(auth)?;
        info!(%version, "device library initialised");
        Ok(Self {
            inner: Arc::new(RuntimeInner {
                backend,
                version,
                started_at: Utc::now(),
            }),
        })
    }

    /// The process-wide libsane runtime. Callers share one instance while
    /// any clone is alive; a later call after full teardown initialises
    /// again.
    #[cfg(feature = "libsane")]
    pub fn native(auth: Option<AuthCallback>) -> Result<Self> {
        let mut slot = NATIVE.lock();
        if let Some(inner) = slot.upgrade() {
            return Ok(Self { inner });
        }
        let runtime = Self::init_backend(Arc::new(scanwerk_bridge::native::LibSane::new()), auth)?;
        *slot = Arc::downgrade(&runtime.inner);
        Ok(runtime)
    }

    /// Runtime over [`scanwerk_bridge::default_backend`].
    pub fn with_default_backend(auth: Option<AuthCallback>) -> Result<Self> {
        #[cfg(feature = "libsane")]
        {
            Self::native(auth)
        }
        #[cfg(not(feature = "libsane"))]
        {
            Self::init(scanwerk_bridge::default_backend(), auth)
        }
    }

    pub fn version(&self) -> VersionCode {
        self.inner.version
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.inner.started_at
    }

    pub fn backend(&self) -> &Arc<dyn DeviceBackend> {
        &self.inner.backend
    }

    /// The library's own text for `status`.
    pub fn strstatus(&self, status: Status) -> String {
        self.inner.backend.strstatus(status)
    }

    /// Live clones of this runtime, sessions and directories included.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    pub fn directory(&self) -> DeviceDirectory {
        DeviceDirectory::new(self.clone())
    }

    /// Open `name` with `config`.
    pub fn open(&self, name: &str, config: ScanConfig) -> Result<Session> {
        Session::open(self, name, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanwerk_bridge::EmulatedBackend;

    #[test]
    fn exit_runs_once_after_last_clone() {
        let backend = Arc::new(EmulatedBackend::with_test_device());
        let runtime = Runtime::init(backend.clone(), None).unwrap();
        let other = runtime.clone();
        assert_eq!(runtime.ref_count(), 2);
        drop(runtime);
        assert_eq!(backend.stats().exit_calls, 0);
        drop(other);
        assert_eq!(backend.stats().init_calls, 1);
        assert_eq!(backend.stats().exit_calls, 1);
    }

    #[test]
    fn reports_backend_version() {
        let runtime = Runtime::init(Arc::new(EmulatedBackend::with_test_device()), None).unwrap();
        assert_eq!(runtime.version().to_string(), "1.0.3");
        assert_eq!(runtime.strstatus(Status::NoDocs), "Document feeder out of documents");
    }
}
