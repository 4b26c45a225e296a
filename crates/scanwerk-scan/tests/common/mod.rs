// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use scanwerk_bridge::emulated::TEST_DEVICE;
use scanwerk_bridge::{AuthCallback, BackendResult, DeviceBackend, EmulatedBackend, EmulatedDevice, RawHandle};
use scanwerk_core::types::{Action, ControlInfo, DeviceIdentity, IoMode, Parameters, VersionCode};
use scanwerk_core::{OptionDescriptor, ScanConfig};
use scanwerk_scan::{Runtime, Session};
use tracing_subscriber::EnvFilter;

/// Route tracing output through the test harness. `RUST_LOG` overrides the
/// default `warn` level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_test_writer()
        .try_init();
}

pub fn runtime_with(devices: Vec<EmulatedDevice>) -> (Arc<EmulatedBackend>, Runtime) {
    init_tracing();
    let backend = Arc::new(EmulatedBackend::new(devices));
    let runtime = Runtime::init(backend.clone(), None).expect("emulated init");
    (backend, runtime)
}

/// A runtime with the default `test:0` flatbed.
pub fn test_runtime() -> (Arc<EmulatedBackend>, Runtime) {
    runtime_with(vec![EmulatedDevice::new(TEST_DEVICE)])
}

/// An open session on `device`, configured with `config`.
pub fn open(device: EmulatedDevice, config: ScanConfig) -> (Arc<EmulatedBackend>, Session) {
    let name = device.identity().name.clone();
    let (backend, runtime) = runtime_with(vec![device]);
    let session = runtime.open(&name, config).expect("open emulated device");
    (backend, session)
}

/// An open session on `test:0` with default settings.
pub fn test_session() -> (Arc<EmulatedBackend>, Session) {
    open(EmulatedDevice::new(TEST_DEVICE), ScanConfig::default())
}

type StartHook = Box<dyn FnOnce() + Send>;

/// Emulated backend under another name, with a one-shot hook that runs
/// inside `start` before the device sees the call.
pub struct HookedBackend {
    pub inner: Arc<EmulatedBackend>,
    name: &'static str,
    before_start: Mutex<Option<StartHook>>,
}

impl HookedBackend {
    pub fn new(inner: Arc<EmulatedBackend>, name: &'static str) -> Self {
        Self {
            inner,
            name,
            before_start: Mutex::new(None),
        }
    }

    pub fn before_next_start(&self, hook: impl FnOnce() + Send + 'static) {
        *self.before_start.lock() = Some(Box::new(hook));
    }
}

impl DeviceBackend for HookedBackend {
    fn backend_name(&self) -> &str {
        self.name
    }

    fn init(&self, auth: Option<AuthCallback>) -> BackendResult<VersionCode> {
        self.inner.init(auth)
    }

    fn exit(&self) {
        self.inner.exit()
    }

    fn get_devices(&self, local_only: bool) -> BackendResult<Vec<DeviceIdentity>> {
        self.inner.get_devices(local_only)
    }

    fn open(&self, name: &str) -> BackendResult<RawHandle> {
        self.inner.open(name)
    }

    fn close(&self, handle: RawHandle) {
        self.inner.close(handle)
    }

    fn option_descriptor(&self, handle: RawHandle, index: i32) -> Option<OptionDescriptor> {
        self.inner.option_descriptor(handle, index)
    }

    fn control_option(
        &self,
        handle: RawHandle,
        index: i32,
        action: Action,
        value: &mut [u8],
    ) -> BackendResult<ControlInfo> {
        self.inner.control_option(handle, index, action, value)
    }

    fn get_parameters(&self, handle: RawHandle) -> BackendResult<Parameters> {
        self.inner.get_parameters(handle)
    }

    fn start(&self, handle: RawHandle) -> BackendResult<()> {
        let hook = self.before_start.lock().take();
        if let Some(hook) = hook {
            hook();
        }
        self.inner.start(handle)
    }

    fn read(&self, handle: RawHandle, buf: &mut [u8]) -> BackendResult<usize> {
        self.inner.read(handle, buf)
    }

    fn cancel(&self, handle: RawHandle) {
        self.inner.cancel(handle)
    }

    fn set_io_mode(&self, handle: RawHandle, mode: IoMode) -> BackendResult<()> {
        self.inner.set_io_mode(handle, mode)
    }

    fn get_select_fd(&self, handle: RawHandle) -> BackendResult<i32> {
        self.inner.get_select_fd(handle)
    }
}
