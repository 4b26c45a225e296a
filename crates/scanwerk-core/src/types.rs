// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Scanwerk scanner front end.

use bitflags::bitflags;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One machine word on the device boundary.
pub type Word = i32;

/// Byte width of a `Word` (and of a bool/int/fixed value).
pub const WORD_SIZE: usize = 4;

/// Unique identifier for an open session, used to correlate log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A scanner reported by device enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceIdentity {
    /// Name passed to `open` (e.g. "epson2:libusb:001:004").
    pub name: String,
    pub vendor: String,
    pub model: String,
    /// Device kind as reported by the backend ("flatbed scanner", ...).
    pub kind: String,
}

/// Value type of an option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum ValueType {
    Bool = 0,
    Int = 1,
    Fixed = 2,
    String = 3,
    Button = 4,
    Group = 5,
}

impl ValueType {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Bool),
            1 => Some(Self::Int),
            2 => Some(Self::Fixed),
            3 => Some(Self::String),
            4 => Some(Self::Button),
            5 => Some(Self::Group),
            _ => None,
        }
    }

    /// Int and Fixed options are word-encoded numbers.
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Int | Self::Fixed)
    }

    /// Button and Group options carry no value payload.
    pub fn has_value(self) -> bool {
        !matches!(self, Self::Button | Self::Group)
    }
}

/// Physical unit of an option value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum Unit {
    None = 0,
    Pixel = 1,
    Bit = 2,
    Millimeter = 3,
    Dpi = 4,
    Percent = 5,
    Microsecond = 6,
}

impl Unit {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::None),
            1 => Some(Self::Pixel),
            2 => Some(Self::Bit),
            3 => Some(Self::Millimeter),
            4 => Some(Self::Dpi),
            5 => Some(Self::Percent),
            6 => Some(Self::Microsecond),
            _ => None,
        }
    }

    /// Short suffix for display ("mm", "dpi", ...).
    pub fn symbol(self) -> &'static str {
        match self {
            Self::None => "",
            Self::Pixel => "px",
            Self::Bit => "bit",
            Self::Millimeter => "mm",
            Self::Dpi => "dpi",
            Self::Percent => "%",
            Self::Microsecond => "us",
        }
    }
}

bitflags! {
    /// Capability bits of an option descriptor.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct Capabilities: u32 {
        /// Settable in software.
        const SOFT_SELECT = 1 << 0;
        /// Settable only by a physical control on the device.
        const HARD_SELECT = 1 << 1;
        /// Readable in software.
        const SOFT_DETECT = 1 << 2;
        /// Emulated by the backend, not supported natively.
        const EMULATED = 1 << 3;
        /// The backend can pick a value itself (`SetAuto`).
        const AUTOMATIC = 1 << 4;
        /// Currently inactive.
        const INACTIVE = 1 << 5;
        /// Advanced option, hidden by default in frontends.
        const ADVANCED = 1 << 6;
    }
}

bitflags! {
    /// Side effects reported by the device after a set.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct ControlInfo: u32 {
        /// The device rounded or otherwise coerced the value.
        const INEXACT = 1 << 0;
        /// Other option descriptors changed; cached descriptors are stale.
        const RELOAD_OPTIONS = 1 << 1;
        /// Scan parameters may have changed.
        const RELOAD_PARAMS = 1 << 2;
    }
}

/// Operation requested from `control_option`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum Action {
    GetValue = 0,
    SetValue = 1,
    SetAuto = 2,
}

/// Layout of one acquired frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum FrameFormat {
    Gray = 0,
    Rgb = 1,
    Red = 2,
    Green = 3,
    Blue = 4,
}

impl FrameFormat {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Gray),
            1 => Some(Self::Rgb),
            2 => Some(Self::Red),
            3 => Some(Self::Green),
            4 => Some(Self::Blue),
            _ => None,
        }
    }

    /// Samples per pixel within this frame.
    pub fn channels(self) -> usize {
        match self {
            Self::Rgb => 3,
            _ => 1,
        }
    }
}

/// Negotiated description of the frame about to be (or being) acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameters {
    pub format: FrameFormat,
    pub last_frame: bool,
    pub bytes_per_line: usize,
    pub pixels_per_line: usize,
    /// `None` when the device cannot know the height in advance
    /// (hand scanners, sheet feeders).
    pub lines: Option<usize>,
    /// Bits per sample.
    pub depth: u32,
}

impl Parameters {
    /// Total bytes in the frame, when the line count is known.
    pub fn frame_bytes(&self) -> Option<usize> {
        self.lines.map(|lines| lines * self.bytes_per_line)
    }
}

/// Version word returned by library initialisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionCode {
    pub major: u8,
    pub minor: u8,
    pub build: u16,
}

impl VersionCode {
    pub fn from_word(word: Word) -> Self {
        let word = word as u32;
        Self {
            major: ((word >> 24) & 0xff) as u8,
            minor: ((word >> 16) & 0xff) as u8,
            build: (word & 0xffff) as u16,
        }
    }

    pub fn to_word(self) -> Word {
        (((self.major as u32) << 24) | ((self.minor as u32) << 16) | self.build as u32) as Word
    }
}

impl std::fmt::Display for VersionCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.build)
    }
}

/// A typed option value. Button and Group options have none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OptionValue {
    Bool(bool),
    Int(i32),
    Fixed(f64),
    String(String),
    /// Int option spanning several words (e.g. a gamma table).
    IntVec(Vec<i32>),
    /// Fixed option spanning several words.
    FixedVec(Vec<f64>),
}

impl OptionValue {
    /// Value type this variant belongs to.
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Bool(_) => ValueType::Bool,
            Self::Int(_) | Self::IntVec(_) => ValueType::Int,
            Self::Fixed(_) | Self::FixedVec(_) => ValueType::Fixed,
            Self::String(_) => ValueType::String,
        }
    }

    /// Short name used in type-mismatch errors.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Fixed(_) => "fixed",
            Self::String(_) => "string",
            Self::IntVec(_) => "int vector",
            Self::FixedVec(_) => "fixed vector",
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_fixed(&self) -> Option<f64> {
        match self {
            Self::Fixed(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }
}

impl std::fmt::Display for OptionValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Fixed(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "\"{v}\""),
            Self::IntVec(v) => write!(f, "{v:?}"),
            Self::FixedVec(v) => write!(f, "{v:?}"),
        }
    }
}

/// Blocking behaviour of `read`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IoMode {
    #[default]
    Blocking,
    /// `read` returns immediately with no data instead of waiting.
    NonBlocking,
}

/// Lifecycle states of a device session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Closed,
    /// Idle; options may be queried and changed.
    Open,
    /// A frame has been started and is being read.
    Acquiring,
}

/// Credentials supplied to a backend that requests authorization.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A fully read frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquiredFrame {
    pub parameters: Parameters,
    pub data: Vec<u8>,
    pub acquired_at: DateTime<Utc>,
}
