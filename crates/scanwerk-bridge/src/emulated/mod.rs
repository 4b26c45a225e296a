// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Emulated scanner backend for desktop/CI builds without scanner hardware.
//
// Behaves like a well-mannered SANE backend: a flatbed with a realistic
// option table, deterministic image data, and knobs for the conditions a
// frontend must survive (empty feeder, access denial, stalled transfers,
// reads that block until cancelled). Every call is counted so tests can
// check what actually crossed the boundary.

mod options;

use std::collections::HashMap;

use parking_lot::{Condvar, Mutex};
use scanwerk_core::codec;
use scanwerk_core::types::{
    Action, ControlInfo, Credentials, DeviceIdentity, IoMode, Parameters, ValueType, VersionCode,
};
use scanwerk_core::{OptionDescriptor, Status};
use tracing::{debug, warn};

use crate::traits::{AuthCallback, BackendResult, DeviceBackend, RawHandle};

pub use options::{
    MODE_COLOR, MODE_GRAY, MODE_THREE_PASS, OPT_BRIGHTNESS, OPT_CALIBRATE, OPT_COUNT, OPT_DEPTH,
    OPT_DUPLEX, OPT_GAMMA, OPT_GAMMA_TABLE, OPT_HEIGHT, OPT_LAMP_HOURS, OPT_MODE, OPT_PREVIEW,
    OPT_RESOLUTION, OPT_SOURCE, OPT_WIDTH, SOURCE_ADF, SOURCE_FLATBED,
};
use options::OptionTable;

/// Name of the device installed by [`EmulatedBackend::with_test_device`].
pub const TEST_DEVICE: &str = "test:0";

/// Version word reported by `init`.
pub const EMULATED_VERSION: VersionCode = VersionCode {
    major: 1,
    minor: 0,
    build: 3,
};

/// Sample value at byte `offset` of any frame.
pub fn pattern_byte(offset: usize) -> u8 {
    (offset % 251) as u8
}

/// Configuration of one emulated device.
#[derive(Debug, Clone)]
pub struct EmulatedDevice {
    identity: DeviceIdentity,
    remote: bool,
    open_fault: Option<Status>,
    start_fault: Option<Status>,
    read_fault: Option<(usize, Status)>,
    hold_data: bool,
    stall_reads: usize,
    max_chunk: usize,
    unknown_lines: bool,
    credentials: Option<Credentials>,
}

impl EmulatedDevice {
    pub fn new(name: &str) -> Self {
        Self {
            identity: DeviceIdentity {
                name: name.into(),
                vendor: "Scanwerk".into(),
                model: "Virtual Flatbed".into(),
                kind: "flatbed scanner".into(),
            },
            remote: false,
            open_fault: None,
            start_fault: None,
            read_fault: None,
            hold_data: false,
            stall_reads: 0,
            max_chunk: usize::MAX,
            unknown_lines: false,
            credentials: None,
        }
    }

    pub fn vendor(mut self, vendor: &str, model: &str, kind: &str) -> Self {
        self.identity.vendor = vendor.into();
        self.identity.model = model.into();
        self.identity.kind = kind.into();
        self
    }

    /// Reached over the network; hidden from local-only enumeration.
    pub fn remote(mut self) -> Self {
        self.remote = true;
        self
    }

    /// `open` fails with `status`.
    pub fn fail_open(mut self, status: Status) -> Self {
        self.open_fault = Some(status);
        self
    }

    /// Every `start` fails with `status` (e.g. `NoDocs`, `CoverOpen`).
    pub fn fail_start(mut self, status: Status) -> Self {
        self.start_fault = Some(status);
        self
    }

    /// Reads fail with `status` once `offset` bytes of a frame are delivered.
    pub fn fail_read_at(mut self, offset: usize, status: Status) -> Self {
        self.read_fault = Some((offset, status));
        self
    }

    /// Withhold data until [`EmulatedBackend::release_data`] or a cancel.
    /// Blocking reads wait; non-blocking reads return no data.
    pub fn hold_data(mut self) -> Self {
        self.hold_data = true;
        self
    }

    /// The first `n` non-blocking reads of each frame return no data.
    pub fn stall_reads(mut self, n: usize) -> Self {
        self.stall_reads = n;
        self
    }

    /// Deliver at most `n` bytes per read.
    pub fn max_chunk(mut self, n: usize) -> Self {
        self.max_chunk = n.max(1);
        self
    }

    /// Report an unknown line count in the scan parameters.
    pub fn unknown_lines(mut self) -> Self {
        self.unknown_lines = true;
        self
    }

    /// `open` asks the auth callback and accepts only these credentials.
    pub fn require_credentials(mut self, username: &str, password: &str) -> Self {
        self.credentials = Some(Credentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }
}

/// Boundary call counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmulatedStats {
    pub init_calls: usize,
    pub exit_calls: usize,
    pub open_calls: usize,
    pub close_calls: usize,
    pub get_calls: usize,
    pub set_calls: usize,
    pub start_calls: usize,
    pub read_calls: usize,
    pub cancel_calls: usize,
}

#[cfg(unix)]
type SelectPipe = (std::os::unix::net::UnixStream, std::os::unix::net::UnixStream);

#[cfg(unix)]
fn select_pipe(readable: bool) -> Option<SelectPipe> {
    use std::io::Write;

    let (reader, mut writer) = std::os::unix::net::UnixStream::pair().ok()?;
    if readable {
        writer.write_all(&[1]).ok()?;
    }
    Some((reader, writer))
}

#[cfg(unix)]
fn select_fd(pipe: &SelectPipe) -> i32 {
    use std::os::fd::AsRawFd;
    pipe.0.as_raw_fd()
}

#[cfg(not(unix))]
type SelectPipe = ();

#[cfg(not(unix))]
fn select_pipe(_readable: bool) -> Option<SelectPipe> {
    None
}

#[cfg(not(unix))]
fn select_fd(_pipe: &SelectPipe) -> i32 {
    -1
}

/// One frame in flight.
struct Acquisition {
    frame: usize,
    parameters: Parameters,
    total: usize,
    delivered: usize,
    stalls_left: usize,
    finished: bool,
    select: Option<SelectPipe>,
}

struct OpenDevice {
    device: EmulatedDevice,
    options: OptionTable,
    acquisition: Option<Acquisition>,
    io_mode: IoMode,
    cancelled: bool,
    released: bool,
}

#[derive(Default)]
struct Inner {
    initialized: bool,
    auth: Option<AuthCallback>,
    devices: Vec<EmulatedDevice>,
    handles: HashMap<usize, OpenDevice>,
    next_handle: usize,
    enumeration_fault: Option<Status>,
    stats: EmulatedStats,
}

impl Inner {
    fn handle(&mut self, handle: RawHandle) -> BackendResult<&mut OpenDevice> {
        self.handles.get_mut(&handle.0).ok_or(Status::Inval)
    }
}

/// In-process [`DeviceBackend`] backed by [`EmulatedDevice`]s.
#[derive(Default)]
pub struct EmulatedBackend {
    inner: Mutex<Inner>,
    data_ready: Condvar,
}

impl EmulatedBackend {
    pub fn new(devices: Vec<EmulatedDevice>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                devices,
                next_handle: 1,
                ..Inner::default()
            }),
            data_ready: Condvar::new(),
        }
    }

    /// A backend with the single default flatbed [`TEST_DEVICE`].
    pub fn with_test_device() -> Self {
        Self::new(vec![EmulatedDevice::new(TEST_DEVICE)])
    }

    pub fn add_device(&self, device: EmulatedDevice) {
        self.inner.lock().devices.push(device);
    }

    /// Make device enumeration fail with `status` until cleared with `None`.
    pub fn fail_enumeration(&self, status: Option<Status>) {
        self.inner.lock().enumeration_fault = status;
    }

    /// Let held data flow to every open device and wake blocked readers.
    pub fn release_data(&self) {
        let mut inner = self.inner.lock();
        for open in inner.handles.values_mut() {
            open.released = true;
        }
        self.data_ready.notify_all();
    }

    pub fn stats(&self) -> EmulatedStats {
        self.inner.lock().stats
    }

    pub fn open_handles(&self) -> usize {
        self.inner.lock().handles.len()
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.lock().initialized
    }

    fn check_credentials(&self, auth: Option<&AuthCallback>, device: &EmulatedDevice) -> BackendResult<()> {
        let Some(expected) = &device.credentials else {
            return Ok(());
        };
        let resource = device.identity.name.as_str();
        let supplied = auth.and_then(|cb| cb(resource));
        match supplied {
            Some(c) if c == *expected => Ok(()),
            Some(_) => {
                warn!(device = %resource, "credentials rejected");
                Err(Status::AccessDenied)
            }
            None => {
                warn!(device = %resource, "no credentials supplied");
                Err(Status::AccessDenied)
            }
        }
    }
}

impl DeviceBackend for EmulatedBackend {
    fn backend_name(&self) -> &str {
        "emulated"
    }

    fn init(&self, auth: Option<AuthCallback>) -> BackendResult<VersionCode> {
        let mut inner = self.inner.lock();
        inner.stats.init_calls += 1;
        inner.initialized = true;
        inner.auth = auth;
        debug!(version = %EMULATED_VERSION, "emulated backend initialised");
        Ok(EMULATED_VERSION)
    }

    fn exit(&self) {
        let mut inner = self.inner.lock();
        inner.stats.exit_calls += 1;
        if !inner.handles.is_empty() {
            warn!(open = inner.handles.len(), "exit with open handles");
            inner.handles.clear();
        }
        inner.initialized = false;
        inner.auth = None;
        self.data_ready.notify_all();
    }

    fn get_devices(&self, local_only: bool) -> BackendResult<Vec<DeviceIdentity>> {
        let inner = self.inner.lock();
        if !inner.initialized {
            return Err(Status::Inval);
        }
        if let Some(status) = inner.enumeration_fault {
            debug!(%status, "enumeration refused");
            return Err(status);
        }
        Ok(inner
            .devices
            .iter()
            .filter(|d| !(local_only && d.remote))
            .map(|d| d.identity.clone())
            .collect())
    }

    fn open(&self, name: &str) -> BackendResult<RawHandle> {
        let mut inner = self.inner.lock();
        inner.stats.open_calls += 1;
        if !inner.initialized {
            return Err(Status::Inval);
        }
        let device = if name.is_empty() {
            inner.devices.first()
        } else {
            inner.devices.iter().find(|d| d.identity.name == name)
        }
        .cloned()
        .ok_or(Status::Inval)?;

        if let Some(status) = device.open_fault {
            return Err(status);
        }
        // The callback runs outside the lock; it may call back into the
        // frontend.
        let auth = inner.auth.clone();
        drop(inner);
        self.check_credentials(auth.as_ref(), &device)?;

        let mut inner = self.inner.lock();
        let id = inner.next_handle.max(1);
        inner.next_handle = id + 1;
        debug!(device = %device.identity.name, handle = id, "emulated device opened");
        inner.handles.insert(
            id,
            OpenDevice {
                device,
                options: OptionTable::flatbed(),
                acquisition: None,
                io_mode: IoMode::Blocking,
                cancelled: false,
                released: false,
            },
        );
        Ok(RawHandle(id))
    }

    fn close(&self, handle: RawHandle) {
        let mut inner = self.inner.lock();
        inner.stats.close_calls += 1;
        if inner.handles.remove(&handle.0).is_none() {
            warn!(handle = handle.0, "close of unknown handle");
        }
        self.data_ready.notify_all();
    }

    fn option_descriptor(&self, handle: RawHandle, index: i32) -> Option<OptionDescriptor> {
        let mut inner = self.inner.lock();
        let open = inner.handle(handle).ok()?;
        open.options.descriptor(index).cloned()
    }

    fn control_option(
        &self,
        handle: RawHandle,
        index: i32,
        action: Action,
        value: &mut [u8],
    ) -> BackendResult<ControlInfo> {
        let mut inner = self.inner.lock();
        match action {
            Action::GetValue => inner.stats.get_calls += 1,
            Action::SetValue | Action::SetAuto => inner.stats.set_calls += 1,
        }
        let open = inner.handle(handle)?;
        let descriptor = open.options.descriptor(index).cloned().ok_or(Status::Inval)?;

        if action != Action::GetValue && open.acquisition.is_some() {
            return Err(Status::DeviceBusy);
        }

        match action {
            Action::GetValue => {
                let current = open.options.value(index)?;
                let bytes = codec::encode(current, descriptor.value_type, descriptor.size)
                    .map_err(|_| Status::Inval)?;
                let dst = value.get_mut(..bytes.len()).ok_or(Status::Inval)?;
                dst.copy_from_slice(&bytes);
                Ok(ControlInfo::empty())
            }
            Action::SetAuto => open.options.set_auto(index),
            Action::SetValue if descriptor.value_type == ValueType::Button => {
                open.options.press(index)
            }
            Action::SetValue => {
                let requested = codec::decode(value, descriptor.value_type, descriptor.size)
                    .map_err(|_| Status::Inval)?;
                let (applied, info) = open.options.set(index, requested)?;
                let bytes = codec::encode(&applied, descriptor.value_type, descriptor.size)
                    .map_err(|_| Status::Inval)?;
                value[..bytes.len()].copy_from_slice(&bytes);
                Ok(info)
            }
        }
    }

    fn get_parameters(&self, handle: RawHandle) -> BackendResult<Parameters> {
        let mut inner = self.inner.lock();
        let open = inner.handle(handle)?;
        Ok(match &open.acquisition {
            Some(acq) => acq.parameters,
            None => open.options.parameters(0, open.device.unknown_lines),
        })
    }

    fn start(&self, handle: RawHandle) -> BackendResult<()> {
        let mut inner = self.inner.lock();
        inner.stats.start_calls += 1;
        let open = inner.handle(handle)?;

        let frame = match &open.acquisition {
            Some(acq) if !acq.finished => return Err(Status::DeviceBusy),
            Some(acq) if acq.frame + 1 < open.options.frame_count() => acq.frame + 1,
            _ => 0,
        };
        if let Some(status) = open.device.start_fault {
            debug!(device = %open.device.identity.name, %status, "start refused");
            open.acquisition = None;
            return Err(status);
        }

        let ready = !open.device.hold_data;
        open.cancelled = false;
        open.released = ready;
        open.io_mode = IoMode::Blocking;
        open.acquisition = Some(Acquisition {
            frame,
            parameters: open.options.parameters(frame, open.device.unknown_lines),
            total: open.options.frame_bytes(frame),
            delivered: 0,
            stalls_left: open.device.stall_reads,
            finished: false,
            select: select_pipe(ready),
        });
        debug!(device = %open.device.identity.name, frame, "frame started");
        Ok(())
    }

    fn read(&self, handle: RawHandle, buf: &mut [u8]) -> BackendResult<usize> {
        let mut inner = self.inner.lock();
        inner.stats.read_calls += 1;

        loop {
            let open = inner.handle(handle)?;
            if open.cancelled {
                return Err(Status::Cancelled);
            }
            let blocking = open.io_mode == IoMode::Blocking;
            let held = !open.released;
            let acq = open.acquisition.as_mut().ok_or(Status::Inval)?;
            if acq.finished {
                return Err(Status::Eof);
            }

            if held {
                if !blocking {
                    return Ok(0);
                }
                self.data_ready.wait(&mut inner);
                continue;
            }
            if !blocking && acq.stalls_left > 0 {
                acq.stalls_left -= 1;
                return Ok(0);
            }
            if acq.delivered >= acq.total {
                acq.finished = true;
                return Err(Status::Eof);
            }

            let mut limit = acq.total;
            if let Some((offset, status)) = open.device.read_fault {
                if acq.delivered >= offset {
                    return Err(status);
                }
                limit = limit.min(offset);
            }
            let n = buf.len().min(open.device.max_chunk).min(limit - acq.delivered);
            for (i, byte) in buf[..n].iter_mut().enumerate() {
                *byte = pattern_byte(acq.delivered + i);
            }
            acq.delivered += n;
            return Ok(n);
        }
    }

    fn cancel(&self, handle: RawHandle) {
        let mut inner = self.inner.lock();
        inner.stats.cancel_calls += 1;
        if let Ok(open) = inner.handle(handle) {
            if open.acquisition.take().is_some() {
                open.cancelled = true;
            }
        }
        self.data_ready.notify_all();
    }

    fn set_io_mode(&self, handle: RawHandle, mode: IoMode) -> BackendResult<()> {
        let mut inner = self.inner.lock();
        let open = inner.handle(handle)?;
        if open.acquisition.is_none() {
            return Err(Status::Inval);
        }
        open.io_mode = mode;
        Ok(())
    }

    fn get_select_fd(&self, handle: RawHandle) -> BackendResult<i32> {
        let mut inner = self.inner.lock();
        let open = inner.handle(handle)?;
        let acq = open.acquisition.as_ref().ok_or(Status::Inval)?;
        acq.select.as_ref().map(select_fd).ok_or(Status::Unsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opened() -> (EmulatedBackend, RawHandle) {
        let backend = EmulatedBackend::with_test_device();
        backend.init(None).unwrap();
        let handle = backend.open(TEST_DEVICE).unwrap();
        (backend, handle)
    }

    fn drain(backend: &EmulatedBackend, handle: RawHandle) -> Vec<u8> {
        let mut out = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            match backend.read(handle, &mut buf) {
                Ok(n) => out.extend_from_slice(&buf[..n]),
                Err(Status::Eof) => return out,
                Err(other) => panic!("unexpected {other}"),
            }
        }
    }

    #[test]
    fn open_before_init_is_refused() {
        let backend = EmulatedBackend::with_test_device();
        assert_eq!(backend.open(TEST_DEVICE), Err(Status::Inval));
    }

    #[test]
    fn empty_name_opens_first_device() {
        let backend = EmulatedBackend::with_test_device();
        backend.init(None).unwrap();
        assert!(backend.open("").is_ok());
        assert_eq!(backend.open("nope:1"), Err(Status::Inval));
    }

    #[test]
    fn local_only_hides_remote_devices() {
        let backend = EmulatedBackend::new(vec![
            EmulatedDevice::new("local:0"),
            EmulatedDevice::new("net:host:0").remote(),
        ]);
        backend.init(None).unwrap();
        assert_eq!(backend.get_devices(false).unwrap().len(), 2);
        assert_eq!(backend.get_devices(true).unwrap().len(), 1);
    }

    #[test]
    fn gray_frame_has_expected_bytes() {
        let (backend, handle) = opened();
        backend.start(handle).unwrap();
        let data = drain(&backend, handle);
        assert_eq!(data.len(), 100 * 100);
        assert_eq!(data[260], pattern_byte(260));
        // Further reads keep reporting end of frame.
        assert_eq!(backend.read(handle, &mut [0u8; 8]), Err(Status::Eof));
    }

    #[test]
    fn start_during_frame_is_busy() {
        let (backend, handle) = opened();
        backend.start(handle).unwrap();
        assert_eq!(backend.start(handle), Err(Status::DeviceBusy));
    }

    #[test]
    fn set_during_frame_is_busy() {
        let (backend, handle) = opened();
        backend.start(handle).unwrap();
        let mut buf = 150i32.to_ne_bytes();
        assert_eq!(
            backend.control_option(handle, OPT_RESOLUTION, Action::SetValue, &mut buf),
            Err(Status::DeviceBusy)
        );
    }

    #[test]
    fn cancel_turns_reads_into_cancelled() {
        let (backend, handle) = opened();
        backend.start(handle).unwrap();
        backend.cancel(handle);
        assert_eq!(backend.read(handle, &mut [0u8; 8]), Err(Status::Cancelled));
        backend.start(handle).unwrap();
        assert!(backend.read(handle, &mut [0u8; 8]).is_ok());
    }

    #[test]
    fn held_data_gives_no_data_when_non_blocking() {
        let backend = EmulatedBackend::new(vec![EmulatedDevice::new("held:0").hold_data()]);
        backend.init(None).unwrap();
        let handle = backend.open("held:0").unwrap();
        backend.start(handle).unwrap();
        backend.set_io_mode(handle, IoMode::NonBlocking).unwrap();
        assert_eq!(backend.read(handle, &mut [0u8; 8]), Ok(0));
        backend.release_data();
        assert_eq!(backend.read(handle, &mut [0u8; 8]), Ok(8));
    }

    #[test]
    fn io_mode_needs_a_started_frame() {
        let (backend, handle) = opened();
        assert_eq!(backend.set_io_mode(handle, IoMode::NonBlocking), Err(Status::Inval));
        assert_eq!(backend.get_select_fd(handle), Err(Status::Inval));
    }

    #[test]
    fn inexact_set_writes_back() {
        let (backend, handle) = opened();
        let mut buf = codec::fixed_to_word(2.34).to_ne_bytes();
        let info = backend
            .control_option(handle, OPT_GAMMA, Action::SetValue, &mut buf)
            .unwrap();
        assert!(info.contains(ControlInfo::INEXACT));
        let written = codec::word_to_fixed(i32::from_ne_bytes(buf));
        assert!((written - 2.3).abs() < 1e-4);
    }

    #[test]
    fn credentials_are_checked() {
        let backend = EmulatedBackend::new(vec![
            EmulatedDevice::new("locked:0").require_credentials("scan", "s3cret"),
        ]);
        backend.init(None).unwrap();
        assert_eq!(backend.open("locked:0"), Err(Status::AccessDenied));
        backend.exit();

        let cb: AuthCallback = std::sync::Arc::new(|_resource: &str| {
            Some(Credentials {
                username: "scan".into(),
                password: "s3cret".into(),
            })
        });
        backend.init(Some(cb)).unwrap();
        assert!(backend.open("locked:0").is_ok());
    }

    #[test]
    fn read_fault_fires_mid_frame() {
        let backend = EmulatedBackend::new(vec![
            EmulatedDevice::new("jam:0").fail_read_at(64, Status::Jammed),
        ]);
        backend.init(None).unwrap();
        let handle = backend.open("jam:0").unwrap();
        backend.start(handle).unwrap();
        assert_eq!(backend.read(handle, &mut [0u8; 1024]), Ok(64));
        assert_eq!(backend.read(handle, &mut [0u8; 1024]), Err(Status::Jammed));
    }
}
