// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Device session: one open scanner and its acquisition state machine.
//
//   Closed ──open──▶ Open ──start──▶ Acquiring ──end of frame──▶ Open
//                     ▲  └──────────────close─────────────────▶ Closed
//                     └──────cancel / error─────── Acquiring
//
// Option values are validated against the cached descriptor before anything
// crosses the boundary. Cancellation from other threads goes through a
// `CancelHandle`, which shares a small lock with `close` so it can never
// reach a handle that has already been released.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use scanwerk_bridge::{DeviceBackend, RawHandle};
use scanwerk_core::codec;
use scanwerk_core::types::{
    AcquiredFrame, Action, ControlInfo, IoMode, OptionValue, Parameters, SessionId, SessionState,
    ValueType,
};
use scanwerk_core::{OptionDescriptor, Result, ScanConfig, ScanwerkError, Status};
use tracing::{debug, info, instrument, warn};

use crate::registry::OptionRegistry;
use crate::runtime::Runtime;

/// Pause between polls while a non-blocking frame read has no data.
const POLL_INTERVAL: Duration = Duration::from_millis(2);

/// Result of a successful `set_option`.
#[derive(Debug, Clone, PartialEq)]
pub struct SetOutcome {
    /// The value now in effect. Differs from the request when the device
    /// reported `INEXACT`.
    pub value: OptionValue,
    pub info: ControlInfo,
}

impl SetOutcome {
    pub fn is_inexact(&self) -> bool {
        self.info.contains(ControlInfo::INEXACT)
    }

    pub fn reload_options(&self) -> bool {
        self.info.contains(ControlInfo::RELOAD_OPTIONS)
    }

    pub fn reload_params(&self) -> bool {
        self.info.contains(ControlInfo::RELOAD_PARAMS)
    }
}

/// Result of one `read` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// `n` bytes were written to the front of the buffer.
    Data(usize),
    /// The current frame is complete; the session is `Open` again.
    EndOfFrame,
    /// Non-blocking mode and nothing is ready yet.
    NoData,
}

/// State shared between a session and its cancel handles.
struct HandleSlot {
    backend: Arc<dyn DeviceBackend>,
    handle: Mutex<Option<RawHandle>>,
    cancelled: AtomicBool,
}

/// Cancels a session's acquisition from any thread.
///
/// A blocked `read` on the owning session returns `Cancelled` promptly.
/// Cancelling an idle or closed session does nothing.
#[derive(Clone)]
pub struct CancelHandle {
    slot: Arc<HandleSlot>,
    session: SessionId,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let guard = self.slot.handle.lock();
        if let Some(handle) = *guard {
            self.slot.cancelled.store(true, Ordering::SeqCst);
            self.slot.backend.cancel(handle);
            info!(session = %self.session, "acquisition cancelled from handle");
        }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }
}

impl std::fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelHandle").field("session", &self.session).finish()
    }
}

/// Pollable readiness of the current frame's data.
///
/// The descriptor belongs to the device library and stays valid until the
/// frame ends; it must not be closed or read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessHandle {
    fd: i32,
}

impl ReadinessHandle {
    pub fn raw(&self) -> i32 {
        self.fd
    }
}

#[cfg(unix)]
impl std::os::fd::AsRawFd for ReadinessHandle {
    fn as_raw_fd(&self) -> std::os::fd::RawFd {
        self.fd
    }
}

/// An open scanner.
///
/// Dropping a session closes it.
pub struct Session {
    id: SessionId,
    device: String,
    runtime: Option<Runtime>,
    slot: Arc<HandleSlot>,
    state: SessionState,
    registry: OptionRegistry,
    config: ScanConfig,
    io_mode: IoMode,
    frame: Option<Parameters>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("device", &self.device)
            .field("state", &self.state)
            .field("io_mode", &self.io_mode)
            .finish()
    }
}

impl Session {
    /// Open the device called `name` ("" opens the library's default).
    #[instrument(skip(runtime, config), fields(backend = runtime.backend().backend_name()))]
    pub fn open(runtime: &Runtime, name: &str, config: ScanConfig) -> Result<Self> {
        let backend = Arc::clone(runtime.backend());
        let handle = backend.open(name).map_err(|status| match status {
            Status::Inval => ScanwerkError::InvalidDevice(name.to_owned()),
            other => other.into(),
        })?;

        let mut session = Self {
            id: SessionId::new(),
            device: name.to_owned(),
            runtime: Some(runtime.clone()),
            slot: Arc::new(HandleSlot {
                backend,
                handle: Mutex::new(Some(handle)),
                cancelled: AtomicBool::new(false),
            }),
            state: SessionState::Open,
            registry: OptionRegistry::new(),
            io_mode: config.io_mode,
            config,
            frame: None,
        };
        info!(session = %session.id, device = %name, "device opened");

        if session.config.prewarm_options {
            // On failure the session drops here and closes the handle.
            let count = session.registry.prewarm(&*session.slot.backend, handle)?;
            debug!(session = %session.id, count, "option registry prewarmed");
        }
        Ok(session)
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn device_name(&self) -> &str {
        &self.device
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn io_mode(&self) -> IoMode {
        self.io_mode
    }

    /// Parameters of the frame being acquired, if any.
    pub fn current_frame(&self) -> Option<Parameters> {
        self.frame
    }

    /// The runtime this session keeps alive; `None` once closed.
    pub fn runtime(&self) -> Option<&Runtime> {
        self.runtime.as_ref()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            slot: Arc::clone(&self.slot),
            session: self.id,
        }
    }

    // -- Option registry --

    pub fn option_count(&mut self) -> Result<usize> {
        let handle = self.handle()?;
        self.registry.count(&*self.slot.backend, handle)
    }

    pub fn describe(&mut self, index: i32) -> Result<OptionDescriptor> {
        let handle = self.handle()?;
        self.registry
            .describe(&*self.slot.backend, handle, index)
            .cloned()
    }

    pub fn find_option(&mut self, name: &str) -> Result<i32> {
        let handle = self.handle()?;
        self.registry.find_by_name(&*self.slot.backend, handle, name)
    }

    /// Every descriptor, in index order.
    pub fn descriptors(&mut self) -> Result<Vec<OptionDescriptor>> {
        let handle = self.handle()?;
        Ok(self
            .registry
            .descriptors(&*self.slot.backend, handle)?
            .cloned()
            .collect())
    }

    /// Changes whenever cached descriptors were thrown away.
    pub fn options_generation(&self) -> u64 {
        self.registry.generation()
    }

    pub fn invalidate_options(&mut self) {
        self.registry.invalidate();
    }

    // -- Option values --

    #[instrument(skip(self), fields(session = %self.id))]
    pub fn get_option(&mut self, index: i32) -> Result<OptionValue> {
        let handle = self.handle()?;
        let d = self.describe(index)?;
        if !d.value_type.has_value() {
            return Err(ScanwerkError::InvalidOption(index));
        }
        if !d.is_active() {
            return Err(ScanwerkError::Inactive(d.label().to_owned()));
        }

        let mut buf = vec![0u8; d.size];
        self.slot
            .backend
            .control_option(handle, index, Action::GetValue, &mut buf)
            .map_err(|status| option_error(status, index))?;
        let value = codec::decode(&buf, d.value_type, d.size)?;
        debug!(option = %d.label(), %value, "option read");
        Ok(value)
    }

    /// Set option `index`. Rejected values never reach the device.
    #[instrument(skip(self, value), fields(session = %self.id, %value))]
    pub fn set_option(&mut self, index: i32, value: OptionValue) -> Result<SetOutcome> {
        let handle = self.idle_handle()?;
        let d = self.describe(index)?;
        if !d.value_type.has_value() {
            return Err(ScanwerkError::InvalidOption(index));
        }
        if !d.is_settable() {
            return Err(ScanwerkError::ReadOnly(d.label().to_owned()));
        }
        if !d.is_active() {
            return Err(ScanwerkError::Inactive(d.label().to_owned()));
        }
        d.check_value(&value)?;
        let mut buf = codec::encode(&value, d.value_type, d.size)?;

        let info = self
            .slot
            .backend
            .control_option(handle, index, Action::SetValue, &mut buf)
            .map_err(|status| option_error(status, index))?;

        let value = if info.contains(ControlInfo::INEXACT) {
            let applied = codec::decode(&buf, d.value_type, d.size)?;
            warn!(option = %d.label(), requested = %value, applied = %applied, "device coerced value");
            applied
        } else {
            value
        };
        self.after_set(&d, info);
        Ok(SetOutcome { value, info })
    }

    /// Let the device choose the value of option `index` itself.
    #[instrument(skip(self), fields(session = %self.id))]
    pub fn set_option_auto(&mut self, index: i32) -> Result<SetOutcome> {
        let handle = self.idle_handle()?;
        let d = self.describe(index)?;
        if !d.is_automatic() {
            return Err(ScanwerkError::Unsupported);
        }
        if !d.is_active() {
            return Err(ScanwerkError::Inactive(d.label().to_owned()));
        }

        let info = self
            .slot
            .backend
            .control_option(handle, index, Action::SetAuto, &mut [])
            .map_err(|status| option_error(status, index))?;
        self.after_set(&d, info);
        let value = self.get_option(index)?;
        Ok(SetOutcome { value, info })
    }

    /// Trigger the button option `index`.
    #[instrument(skip(self), fields(session = %self.id))]
    pub fn press_button(&mut self, index: i32) -> Result<ControlInfo> {
        let handle = self.idle_handle()?;
        let d = self.describe(index)?;
        if d.value_type != ValueType::Button {
            return Err(ScanwerkError::TypeMismatch {
                expected: ValueType::Button,
                found: format!("{:?}", d.value_type).to_lowercase(),
            });
        }
        if !d.is_settable() {
            return Err(ScanwerkError::ReadOnly(d.label().to_owned()));
        }
        if !d.is_active() {
            return Err(ScanwerkError::Inactive(d.label().to_owned()));
        }

        let info = self
            .slot
            .backend
            .control_option(handle, index, Action::SetValue, &mut [])
            .map_err(|status| option_error(status, index))?;
        self.after_set(&d, info);
        Ok(info)
    }

    // -- Acquisition --

    /// Parameters of the next frame (when idle) or the current one.
    pub fn get_parameters(&mut self) -> Result<Parameters> {
        let handle = self.handle()?;
        Ok(self.slot.backend.get_parameters(handle)?)
    }

    /// Start acquiring a frame. On failure the session stays `Open`.
    #[instrument(skip(self), fields(session = %self.id, device = %self.device))]
    pub fn start(&mut self) -> Result<Parameters> {
        let handle = self.handle()?;
        if self.state == SessionState::Acquiring {
            return Err(ScanwerkError::DeviceBusy);
        }
        self.slot.cancelled.store(false, Ordering::SeqCst);

        if let Err(status) = self.slot.backend.start(handle) {
            warn!(%status, "start refused");
            return Err(status.into());
        }
        self.state = SessionState::Acquiring;

        if self.io_mode == IoMode::NonBlocking {
            if let Err(status) = self.slot.backend.set_io_mode(handle, self.io_mode) {
                warn!(%status, "non-blocking mode not available");
                self.abort(handle);
                return Err(status.into());
            }
        }

        let parameters = match self.slot.backend.get_parameters(handle) {
            Ok(p) => p,
            Err(status) => {
                self.abort(handle);
                return Err(status.into());
            }
        };
        self.frame = Some(parameters);
        info!(
            format = ?parameters.format,
            bytes_per_line = parameters.bytes_per_line,
            lines = ?parameters.lines,
            last_frame = parameters.last_frame,
            "frame started"
        );
        Ok(parameters)
    }

    /// Read the next chunk of the current frame into `buf`.
    ///
    /// An empty `buf` fails `InvalidArgument`; `NoData` only ever means a
    /// non-blocking read found nothing ready.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<ReadOutcome> {
        let handle = self.handle()?;
        if self.state != SessionState::Acquiring {
            return Err(ScanwerkError::NotReady("no frame in progress"));
        }
        if buf.is_empty() {
            return Err(ScanwerkError::InvalidArgument);
        }
        if self.slot.cancelled.swap(false, Ordering::SeqCst) {
            // A handle cancel may have reached the device before this frame
            // started; cancel again so the device is idle too.
            self.abort(handle);
            return Err(ScanwerkError::Cancelled);
        }

        match self.slot.backend.read(handle, buf) {
            Ok(0) => Ok(ReadOutcome::NoData),
            Ok(n) => Ok(ReadOutcome::Data(n)),
            Err(Status::Eof) => {
                let last = self.frame.is_none_or(|p| p.last_frame);
                self.finish_frame();
                if last {
                    // Return the device to idle after the final frame.
                    self.slot.backend.cancel(handle);
                }
                info!(session = %self.id, last_frame = last, "end of frame");
                Ok(ReadOutcome::EndOfFrame)
            }
            Err(Status::Cancelled) => {
                self.slot.cancelled.store(false, Ordering::SeqCst);
                self.finish_frame();
                info!(session = %self.id, "read cancelled");
                Err(ScanwerkError::Cancelled)
            }
            Err(status) => {
                warn!(session = %self.id, %status, "read failed");
                self.abort(handle);
                Err(status.into())
            }
        }
    }

    /// Abandon the current acquisition. Idempotent; a no-op when idle or
    /// closed.
    #[instrument(skip(self), fields(session = %self.id))]
    pub fn cancel(&mut self) {
        let Ok(handle) = self.handle() else {
            return;
        };
        self.slot.backend.cancel(handle);
        self.slot.cancelled.store(false, Ordering::SeqCst);
        if self.state == SessionState::Acquiring {
            info!("acquisition cancelled");
        }
        self.finish_frame();
    }

    /// Select blocking or non-blocking reads. The choice is kept and
    /// re-applied after every `start`.
    pub fn set_io_mode(&mut self, mode: IoMode) -> Result<()> {
        let handle = self.handle()?;
        if self.state == SessionState::Acquiring {
            self.slot.backend.set_io_mode(handle, mode)?;
        }
        self.io_mode = mode;
        debug!(session = %self.id, ?mode, "io mode set");
        Ok(())
    }

    /// Descriptor to poll for data readiness. Only while acquiring.
    pub fn readiness_handle(&self) -> Result<ReadinessHandle> {
        let handle = self.handle()?;
        if self.state != SessionState::Acquiring {
            return Err(ScanwerkError::NotReady("no frame in progress"));
        }
        let fd = self.slot.backend.get_select_fd(handle)?;
        Ok(ReadinessHandle { fd })
    }

    /// Start a frame and read it to the end.
    #[instrument(skip(self), fields(session = %self.id))]
    pub fn scan_frame(&mut self) -> Result<AcquiredFrame> {
        let parameters = self.start()?;
        let chunk = self.config.read_chunk_size.max(1);
        let mut data = Vec::with_capacity(parameters.frame_bytes().unwrap_or(chunk));
        let mut buf = vec![0u8; chunk];

        loop {
            match self.read(&mut buf)? {
                ReadOutcome::Data(n) => data.extend_from_slice(&buf[..n]),
                ReadOutcome::NoData => std::thread::sleep(POLL_INTERVAL),
                ReadOutcome::EndOfFrame => break,
            }
        }

        if let Some(expected) = parameters.frame_bytes() {
            if expected != data.len() {
                warn!(expected, received = data.len(), "frame size differs from parameters");
            }
        }
        Ok(AcquiredFrame {
            parameters,
            data,
            acquired_at: Utc::now(),
        })
    }

    /// Acquire every frame of one scan (one for gray/RGB, three for
    /// separate-channel devices).
    pub fn scan(&mut self) -> Result<Vec<AcquiredFrame>> {
        let mut frames = Vec::new();
        while frames.len() < self.config.max_frames {
            let frame = self.scan_frame()?;
            let last = frame.parameters.last_frame;
            frames.push(frame);
            if last {
                return Ok(frames);
            }
        }
        self.cancel();
        Err(ScanwerkError::IoError(format!(
            "device kept sending frames past the limit of {}",
            self.config.max_frames
        )))
    }

    /// Close the device. Idempotent; releases the runtime reference.
    pub fn close(&mut self) {
        let released = {
            let mut guard = self.slot.handle.lock();
            let handle = guard.take();
            if let Some(handle) = handle {
                if self.state == SessionState::Acquiring {
                    self.slot.backend.cancel(handle);
                }
                self.slot.backend.close(handle);
            }
            handle.is_some()
        };
        self.state = SessionState::Closed;
        self.frame = None;
        self.runtime = None;
        if released {
            info!(session = %self.id, device = %self.device, "device closed");
        }
    }

    fn handle(&self) -> Result<RawHandle> {
        if self.state == SessionState::Closed {
            return Err(ScanwerkError::NotReady("session is closed"));
        }
        (*self.slot.handle.lock()).ok_or(ScanwerkError::NotReady("session is closed"))
    }

    /// Handle for calls that must not overlap an acquisition.
    fn idle_handle(&self) -> Result<RawHandle> {
        let handle = self.handle()?;
        if self.state == SessionState::Acquiring {
            return Err(ScanwerkError::DeviceBusy);
        }
        Ok(handle)
    }

    fn after_set(&mut self, d: &OptionDescriptor, info: ControlInfo) {
        debug!(option = %d.label(), ?info, "option set");
        if info.contains(ControlInfo::RELOAD_OPTIONS) {
            self.registry.invalidate();
        }
    }

    fn finish_frame(&mut self) {
        if self.state == SessionState::Acquiring {
            self.state = SessionState::Open;
        }
        self.frame = None;
    }

    fn abort(&mut self, handle: RawHandle) {
        self.slot.backend.cancel(handle);
        self.finish_frame();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

/// A status from an option call, with `Inval` pinned to the option.
fn option_error(status: Status, index: i32) -> ScanwerkError {
    match status {
        Status::Inval => ScanwerkError::InvalidOption(index),
        other => other.into(),
    }
}
