// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The device-access boundary.
//
// `DeviceBackend` mirrors the SANE C API one call per method. Buffers are
// caller-allocated and sized to the descriptor; sentinel-terminated arrays
// coming out of the native library are already parsed into owned values by
// the implementation. Everything above this trait is backend-agnostic.

use std::sync::Arc;

use scanwerk_core::types::{
    Action, ControlInfo, Credentials, DeviceIdentity, IoMode, Parameters, VersionCode,
};
use scanwerk_core::{OptionDescriptor, Status};

/// Result of a boundary call: the value, or the non-`Good` status.
pub type BackendResult<T> = std::result::Result<T, Status>;

/// Opaque handle of an open device, valid until `close`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawHandle(pub usize);

/// Invoked when a device asks for credentials. Receives the resource name.
pub type AuthCallback = Arc<dyn Fn(&str) -> Option<Credentials> + Send + Sync>;

/// A SANE-style device-access library.
///
/// `close`, `cancel` and `exit` never fail observably. `cancel` may be
/// called from another thread while `read` is blocked on the same handle;
/// every other per-handle call is serialized by the caller.
pub trait DeviceBackend: Send + Sync {
    /// Short name for log lines ("libsane", "emulated").
    fn backend_name(&self) -> &str;

    /// Process-wide initialisation. Called once before anything else.
    fn init(&self, auth: Option<AuthCallback>) -> BackendResult<VersionCode>;

    /// Process-wide teardown. Called once after every handle is closed.
    fn exit(&self);

    /// Currently available devices.
    fn get_devices(&self, local_only: bool) -> BackendResult<Vec<DeviceIdentity>>;

    fn open(&self, name: &str) -> BackendResult<RawHandle>;

    fn close(&self, handle: RawHandle);

    /// Descriptor of option `index`, or `None` past the last option.
    fn option_descriptor(&self, handle: RawHandle, index: i32) -> Option<OptionDescriptor>;

    /// Get, set or auto-set an option. For `GetValue` the value is written
    /// into `value`; for `SetValue` the device may write back a coerced
    /// value and report `INEXACT`. `SetAuto` and buttons take an empty
    /// buffer.
    fn control_option(
        &self,
        handle: RawHandle,
        index: i32,
        action: Action,
        value: &mut [u8],
    ) -> BackendResult<ControlInfo>;

    fn get_parameters(&self, handle: RawHandle) -> BackendResult<Parameters>;

    fn start(&self, handle: RawHandle) -> BackendResult<()>;

    /// Read up to `buf.len()` bytes. `Ok(0)` means no data yet (non-blocking
    /// mode); `Err(Status::Eof)` ends the current frame.
    fn read(&self, handle: RawHandle, buf: &mut [u8]) -> BackendResult<usize>;

    fn cancel(&self, handle: RawHandle);

    /// Only valid after `start`.
    fn set_io_mode(&self, handle: RawHandle, mode: IoMode) -> BackendResult<()>;

    /// File descriptor that becomes readable when data is available. Only
    /// valid after `start`.
    fn get_select_fd(&self, handle: RawHandle) -> BackendResult<i32>;

    fn strstatus(&self, status: Status) -> String {
        status.description().to_owned()
    }
}
