// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// libsane bindings.
//
// Links against the system sane-backends library (`-lsane`). Only built with
// the `libsane` feature. The C API keeps process-global state, so at most one
// `LibSane` should be initialised at a time; the runtime layer above enforces
// that.
//
// Unsafe code here falls into two categories:
//
// 1. Plain C calls with caller-owned out-parameters.
// 2. Reading library-owned data (device list, option descriptors). Pointers
//    stay valid until the next `sane_get_devices` / `sane_exit` or until the
//    option reload, so everything is copied into owned Rust values before
//    returning.

#![cfg(feature = "libsane")]

use std::ffi::{CStr, CString, c_char, c_int, c_void};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::ptr;

use parking_lot::Mutex;
use scanwerk_core::types::{
    Action, Capabilities, ControlInfo, DeviceIdentity, FrameFormat, IoMode, Parameters, Unit,
    ValueType, VersionCode, Word,
};
use scanwerk_core::{Constraint, OptionDescriptor, Status, WordRange};
use tracing::{debug, warn};

use crate::traits::{AuthCallback, BackendResult, DeviceBackend, RawHandle};

/// Buffer length of the username and password the auth callback fills.
pub const MAX_USERNAME_LEN: usize = 128;
pub const MAX_PASSWORD_LEN: usize = 128;

// ---------------------------------------------------------------------------
// C ABI
// ---------------------------------------------------------------------------

type SaneStatus = c_int;
type SaneHandle = *mut c_void;
type SaneAuthCallback =
    Option<unsafe extern "C" fn(resource: *const c_char, username: *mut c_char, password: *mut c_char)>;

const CONSTRAINT_NONE: c_int = 0;
const CONSTRAINT_RANGE: c_int = 1;
const CONSTRAINT_WORD_LIST: c_int = 2;
const CONSTRAINT_STRING_LIST: c_int = 3;

#[repr(C)]
struct SaneDevice {
    name: *const c_char,
    vendor: *const c_char,
    model: *const c_char,
    kind: *const c_char,
}

#[repr(C)]
struct SaneRange {
    min: Word,
    max: Word,
    quant: Word,
}

#[repr(C)]
union SaneConstraint {
    string_list: *const *const c_char,
    word_list: *const Word,
    range: *const SaneRange,
}

#[repr(C)]
struct SaneOptionDescriptor {
    name: *const c_char,
    title: *const c_char,
    desc: *const c_char,
    value_type: c_int,
    unit: c_int,
    size: c_int,
    cap: c_int,
    constraint_type: c_int,
    constraint: SaneConstraint,
}

#[repr(C)]
#[derive(Default)]
struct SaneParameters {
    format: c_int,
    last_frame: c_int,
    bytes_per_line: c_int,
    pixels_per_line: c_int,
    lines: c_int,
    depth: c_int,
}

#[link(name = "sane")]
unsafe extern "C" {
    fn sane_init(version_code: *mut Word, authorize: SaneAuthCallback) -> SaneStatus;
    fn sane_exit();
    fn sane_get_devices(device_list: *mut *mut *const SaneDevice, local_only: Word) -> SaneStatus;
    fn sane_open(name: *const c_char, handle: *mut SaneHandle) -> SaneStatus;
    fn sane_close(handle: SaneHandle);
    fn sane_get_option_descriptor(handle: SaneHandle, option: Word) -> *const SaneOptionDescriptor;
    fn sane_control_option(
        handle: SaneHandle,
        option: Word,
        action: c_int,
        value: *mut c_void,
        info: *mut Word,
    ) -> SaneStatus;
    fn sane_get_parameters(handle: SaneHandle, params: *mut SaneParameters) -> SaneStatus;
    fn sane_start(handle: SaneHandle) -> SaneStatus;
    fn sane_read(handle: SaneHandle, data: *mut u8, max_length: Word, length: *mut Word) -> SaneStatus;
    fn sane_cancel(handle: SaneHandle);
    fn sane_set_io_mode(handle: SaneHandle, non_blocking: Word) -> SaneStatus;
    fn sane_get_select_fd(handle: SaneHandle, fd: *mut Word) -> SaneStatus;
    fn sane_strstatus(status: SaneStatus) -> *const c_char;
}

fn check(code: SaneStatus) -> BackendResult<()> {
    match Status::from_code(code) {
        Some(Status::Good) => Ok(()),
        Some(status) => Err(status),
        None => {
            warn!(code, "libsane returned an unknown status");
            Err(Status::IoError)
        }
    }
}

/// Owned copy of a possibly-null C string.
///
/// # Safety
/// `ptr` is null or points to a NUL-terminated string.
unsafe fn owned(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    // SAFETY: non-null and NUL-terminated per the caller's contract.
    unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
}

fn as_ptr(handle: RawHandle) -> SaneHandle {
    handle.0 as SaneHandle
}

// ---------------------------------------------------------------------------
// Authorization
// ---------------------------------------------------------------------------

// libsane's callback carries no user data, so the Rust closure lives here.
static AUTH: Mutex<Option<AuthCallback>> = parking_lot::const_mutex(None);

/// Copy `value` into a C buffer of `cap` bytes, truncating and terminating.
///
/// # Safety
/// `dst` is valid for `cap` bytes of writes.
unsafe fn fill(dst: *mut c_char, cap: usize, value: &str) {
    let bytes = value.as_bytes();
    let n = bytes.len().min(cap - 1);
    // SAFETY: n + 1 <= cap bytes are written, within the caller's buffer.
    unsafe {
        ptr::copy_nonoverlapping(bytes.as_ptr().cast::<c_char>(), dst, n);
        *dst.add(n) = 0;
    }
}

unsafe extern "C" fn auth_trampoline(
    resource: *const c_char,
    username: *mut c_char,
    password: *mut c_char,
) {
    // A panic must not unwind into C.
    let _ = catch_unwind(AssertUnwindSafe(|| {
        if username.is_null() || password.is_null() {
            return;
        }
        // SAFETY: libsane passes a NUL-terminated resource name.
        let resource = unsafe { owned(resource) };
        let callback = AUTH.lock().clone();
        let credentials = callback.and_then(|cb| cb(&resource));
        let (user, pass) = match &credentials {
            Some(c) => (c.username.as_str(), c.password.as_str()),
            None => ("", ""),
        };
        // SAFETY: libsane provides buffers of SANE_MAX_USERNAME_LEN and
        // SANE_MAX_PASSWORD_LEN bytes.
        unsafe {
            fill(username, MAX_USERNAME_LEN, user);
            fill(password, MAX_PASSWORD_LEN, pass);
        }
    }));
}

// ---------------------------------------------------------------------------
// Descriptor conversion
// ---------------------------------------------------------------------------

/// # Safety
/// `raw` points to a descriptor owned by libsane and valid for this call.
unsafe fn convert_descriptor(index: i32, raw: &SaneOptionDescriptor) -> Option<OptionDescriptor> {
    let value_type = ValueType::from_code(raw.value_type)?;
    let unit = Unit::from_code(raw.unit).unwrap_or(Unit::None);

    // SAFETY: the union member read matches `constraint_type`; list
    // pointers are terminated (word lists are length-prefixed, string
    // lists end in NULL).
    let constraint = unsafe {
        match raw.constraint_type {
            CONSTRAINT_NONE => Constraint::None,
            CONSTRAINT_RANGE if !raw.constraint.range.is_null() => {
                let r = &*raw.constraint.range;
                Constraint::Range(WordRange::new(r.min, r.max, r.quant))
            }
            CONSTRAINT_WORD_LIST if !raw.constraint.word_list.is_null() => {
                let list = raw.constraint.word_list;
                let len = usize::try_from(*list).unwrap_or(0);
                Constraint::WordList(std::slice::from_raw_parts(list.add(1), len).to_vec())
            }
            CONSTRAINT_STRING_LIST if !raw.constraint.string_list.is_null() => {
                let mut items = Vec::new();
                let mut cursor = raw.constraint.string_list;
                while !(*cursor).is_null() {
                    items.push(owned(*cursor));
                    cursor = cursor.add(1);
                }
                Constraint::StringList(items)
            }
            other => {
                warn!(index, constraint_type = other, "unusable option constraint");
                Constraint::None
            }
        }
    };

    // SAFETY: descriptor strings are NUL-terminated or null.
    let (name, title, description) = unsafe { (owned(raw.name), owned(raw.title), owned(raw.desc)) };

    Some(OptionDescriptor {
        index,
        name,
        title,
        description,
        value_type,
        unit,
        size: usize::try_from(raw.size).unwrap_or(0),
        capabilities: Capabilities::from_bits_truncate(raw.cap as u32),
        constraint,
    })
}

fn convert_parameters(raw: &SaneParameters) -> BackendResult<Parameters> {
    Ok(Parameters {
        format: FrameFormat::from_code(raw.format).ok_or(Status::IoError)?,
        last_frame: raw.last_frame != 0,
        bytes_per_line: usize::try_from(raw.bytes_per_line).map_err(|_| Status::IoError)?,
        pixels_per_line: usize::try_from(raw.pixels_per_line).map_err(|_| Status::IoError)?,
        lines: usize::try_from(raw.lines).ok(),
        depth: u32::try_from(raw.depth).map_err(|_| Status::IoError)?,
    })
}

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

/// The system libsane.
#[derive(Debug, Default)]
pub struct LibSane;

impl LibSane {
    pub fn new() -> Self {
        Self
    }
}

impl DeviceBackend for LibSane {
    fn backend_name(&self) -> &str {
        "libsane"
    }

    fn init(&self, auth: Option<AuthCallback>) -> BackendResult<VersionCode> {
        let has_auth = auth.is_some();
        *AUTH.lock() = auth;
        let callback: SaneAuthCallback = if has_auth { Some(auth_trampoline) } else { None };
        let mut version: Word = 0;
        // SAFETY: out-pointer is a live local.
        check(unsafe { sane_init(&mut version, callback) })?;
        let version = VersionCode::from_word(version);
        debug!(%version, "libsane initialised");
        Ok(version)
    }

    fn exit(&self) {
        // SAFETY: no preconditions; called once after every handle closed.
        unsafe { sane_exit() };
        *AUTH.lock() = None;
    }

    fn get_devices(&self, local_only: bool) -> BackendResult<Vec<DeviceIdentity>> {
        let mut list: *mut *const SaneDevice = ptr::null_mut();
        // SAFETY: out-pointer is a live local.
        check(unsafe { sane_get_devices(&mut list, Word::from(local_only)) })?;
        let mut devices = Vec::new();
        if list.is_null() {
            return Ok(devices);
        }
        // SAFETY: libsane returns a NULL-terminated array of device records
        // that stays valid until the next get_devices or exit.
        unsafe {
            let mut cursor = list;
            while !(*cursor).is_null() {
                let d = &**cursor;
                devices.push(DeviceIdentity {
                    name: owned(d.name),
                    vendor: owned(d.vendor),
                    model: owned(d.model),
                    kind: owned(d.kind),
                });
                cursor = cursor.add(1);
            }
        }
        Ok(devices)
    }

    fn open(&self, name: &str) -> BackendResult<RawHandle> {
        let name = CString::new(name).map_err(|_| Status::Inval)?;
        let mut handle: SaneHandle = ptr::null_mut();
        // SAFETY: name is NUL-terminated; out-pointer is a live local.
        check(unsafe { sane_open(name.as_ptr(), &mut handle) })?;
        if handle.is_null() {
            return Err(Status::IoError);
        }
        Ok(RawHandle(handle as usize))
    }

    fn close(&self, handle: RawHandle) {
        // SAFETY: handle came from sane_open and is closed exactly once.
        unsafe { sane_close(as_ptr(handle)) }
    }

    fn option_descriptor(&self, handle: RawHandle, index: i32) -> Option<OptionDescriptor> {
        // SAFETY: handle is open; a null return means no such option.
        let raw = unsafe { sane_get_option_descriptor(as_ptr(handle), index) };
        if raw.is_null() {
            return None;
        }
        // SAFETY: non-null descriptor owned by libsane, copied before return.
        unsafe { convert_descriptor(index, &*raw) }
    }

    fn control_option(
        &self,
        handle: RawHandle,
        index: i32,
        action: Action,
        value: &mut [u8],
    ) -> BackendResult<ControlInfo> {
        let value_ptr = if value.is_empty() {
            ptr::null_mut()
        } else {
            value.as_mut_ptr().cast::<c_void>()
        };
        let mut info: Word = 0;
        // SAFETY: the buffer is sized to the descriptor by the caller.
        check(unsafe { sane_control_option(as_ptr(handle), index, action as c_int, value_ptr, &mut info) })?;
        Ok(ControlInfo::from_bits_truncate(info as u32))
    }

    fn get_parameters(&self, handle: RawHandle) -> BackendResult<Parameters> {
        let mut raw = SaneParameters::default();
        // SAFETY: out-pointer is a live local.
        check(unsafe { sane_get_parameters(as_ptr(handle), &mut raw) })?;
        convert_parameters(&raw)
    }

    fn start(&self, handle: RawHandle) -> BackendResult<()> {
        // SAFETY: handle is open.
        check(unsafe { sane_start(as_ptr(handle)) })
    }

    fn read(&self, handle: RawHandle, buf: &mut [u8]) -> BackendResult<usize> {
        let max = Word::try_from(buf.len()).unwrap_or(Word::MAX);
        let mut len: Word = 0;
        // SAFETY: at most `max` bytes are written into `buf`.
        check(unsafe { sane_read(as_ptr(handle), buf.as_mut_ptr(), max, &mut len) })?;
        Ok(usize::try_from(len).unwrap_or(0))
    }

    fn cancel(&self, handle: RawHandle) {
        // SAFETY: sane_cancel may be called from any thread while a read
        // on the same handle is in progress.
        unsafe { sane_cancel(as_ptr(handle)) }
    }

    fn set_io_mode(&self, handle: RawHandle, mode: IoMode) -> BackendResult<()> {
        let non_blocking = Word::from(mode == IoMode::NonBlocking);
        // SAFETY: handle is open.
        check(unsafe { sane_set_io_mode(as_ptr(handle), non_blocking) })
    }

    fn get_select_fd(&self, handle: RawHandle) -> BackendResult<i32> {
        let mut fd: Word = -1;
        // SAFETY: out-pointer is a live local.
        check(unsafe { sane_get_select_fd(as_ptr(handle), &mut fd) })?;
        Ok(fd)
    }

    fn strstatus(&self, status: Status) -> String {
        // SAFETY: returns a static NUL-terminated string.
        let text = unsafe { owned(sane_strstatus(status.code())) };
        if text.is_empty() { status.description().to_owned() } else { text }
    }
}
