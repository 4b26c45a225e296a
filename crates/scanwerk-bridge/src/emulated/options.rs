// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Option table of the emulated flatbed and the device-side rules behind it:
// coercion, inter-option dependencies and the scan geometry they produce.

use scanwerk_core::codec::{fixed_to_word, word_to_fixed};
use scanwerk_core::types::{
    Capabilities, ControlInfo, FrameFormat, OptionValue, Parameters, Unit, ValueType, WORD_SIZE,
};
use scanwerk_core::{Constraint, OptionDescriptor, Status, WordRange};

pub const OPT_COUNT: i32 = 0;
pub const OPT_RESOLUTION: i32 = 1;
pub const OPT_MODE: i32 = 3;
pub const OPT_DEPTH: i32 = 4;
pub const OPT_SOURCE: i32 = 5;
pub const OPT_DUPLEX: i32 = 6;
pub const OPT_WIDTH: i32 = 8;
pub const OPT_HEIGHT: i32 = 9;
pub const OPT_BRIGHTNESS: i32 = 11;
pub const OPT_GAMMA: i32 = 12;
pub const OPT_GAMMA_TABLE: i32 = 13;
pub const OPT_CALIBRATE: i32 = 14;
pub const OPT_LAMP_HOURS: i32 = 15;
pub const OPT_PREVIEW: i32 = 16;

pub const MODE_GRAY: &str = "Gray";
pub const MODE_COLOR: &str = "Color";
pub const MODE_THREE_PASS: &str = "Three-Pass";
pub const SOURCE_FLATBED: &str = "Flatbed";
pub const SOURCE_ADF: &str = "ADF";

const GAMMA_TABLE_LEN: usize = 16;
const STRING_SIZE: usize = 16;

const RW: Capabilities = Capabilities::SOFT_SELECT.union(Capabilities::SOFT_DETECT);

/// One option slot: its descriptor and current value.
#[derive(Debug, Clone)]
struct Slot {
    descriptor: OptionDescriptor,
    value: Option<OptionValue>,
}

/// Every option of one open emulated device.
#[derive(Debug, Clone)]
pub struct OptionTable {
    slots: Vec<Slot>,
}

#[allow(clippy::too_many_arguments)]
fn slot(
    index: i32,
    name: &str,
    title: &str,
    description: &str,
    value_type: ValueType,
    unit: Unit,
    capabilities: Capabilities,
    constraint: Constraint,
    value: Option<OptionValue>,
) -> Slot {
    let size = match (&value_type, &value) {
        (ValueType::String, _) => STRING_SIZE,
        (ValueType::Group | ValueType::Button, _) => 0,
        (_, Some(OptionValue::IntVec(v))) => v.len() * WORD_SIZE,
        _ => WORD_SIZE,
    };
    Slot {
        descriptor: OptionDescriptor {
            index,
            name: name.into(),
            title: title.into(),
            description: description.into(),
            value_type,
            unit,
            size,
            capabilities,
            constraint,
        },
        value,
    }
}

fn group(index: i32, title: &str) -> Slot {
    slot(
        index,
        "",
        title,
        "",
        ValueType::Group,
        Unit::None,
        Capabilities::empty(),
        Constraint::None,
        None,
    )
}

impl OptionTable {
    /// Factory defaults of the emulated flatbed.
    pub fn flatbed() -> Self {
        let mut slots = vec![
            slot(
                OPT_COUNT,
                "",
                "Number of options",
                "Read-only option that specifies how many options a specific device supports.",
                ValueType::Int,
                Unit::None,
                Capabilities::SOFT_DETECT,
                Constraint::None,
                Some(OptionValue::Int(0)),
            ),
            slot(
                OPT_RESOLUTION,
                "resolution",
                "Scan resolution",
                "Sets the resolution of the scanned image.",
                ValueType::Int,
                Unit::Dpi,
                RW,
                Constraint::WordList(vec![75, 150, 300, 600]),
                Some(OptionValue::Int(75)),
            ),
            group(2, "Scan Mode"),
            slot(
                OPT_MODE,
                "mode",
                "Scan mode",
                "Selects the scan mode (e.g., lineart, monochrome, or color).",
                ValueType::String,
                Unit::None,
                RW,
                Constraint::StringList(vec![
                    MODE_GRAY.into(),
                    MODE_COLOR.into(),
                    MODE_THREE_PASS.into(),
                ]),
                Some(OptionValue::String(MODE_GRAY.into())),
            ),
            slot(
                OPT_DEPTH,
                "depth",
                "Bit depth",
                "Number of bits per sample.",
                ValueType::Int,
                Unit::Bit,
                RW,
                Constraint::WordList(vec![1, 8, 16]),
                Some(OptionValue::Int(8)),
            ),
            slot(
                OPT_SOURCE,
                "source",
                "Scan source",
                "Selects the scan source (such as a document-feeder).",
                ValueType::String,
                Unit::None,
                RW,
                Constraint::StringList(vec![SOURCE_FLATBED.into(), SOURCE_ADF.into()]),
                Some(OptionValue::String(SOURCE_FLATBED.into())),
            ),
            slot(
                OPT_DUPLEX,
                "duplex",
                "Duplex scan",
                "Scan both sides of each sheet. Only available with the document feeder.",
                ValueType::Bool,
                Unit::None,
                RW | Capabilities::INACTIVE,
                Constraint::None,
                Some(OptionValue::Bool(false)),
            ),
            group(7, "Geometry"),
            slot(
                OPT_WIDTH,
                "width",
                "Scan width",
                "Width of the scan area in pixels.",
                ValueType::Int,
                Unit::Pixel,
                RW,
                Constraint::Range(WordRange::new(1, 2550, 1)),
                Some(OptionValue::Int(100)),
            ),
            slot(
                OPT_HEIGHT,
                "height",
                "Scan height",
                "Height of the scan area in pixels.",
                ValueType::Int,
                Unit::Pixel,
                RW,
                Constraint::Range(WordRange::new(1, 3500, 1)),
                Some(OptionValue::Int(100)),
            ),
            group(10, "Enhancement"),
            slot(
                OPT_BRIGHTNESS,
                "brightness",
                "Brightness",
                "Controls the brightness of the acquired image.",
                ValueType::Int,
                Unit::Percent,
                RW | Capabilities::AUTOMATIC,
                Constraint::Range(WordRange::new(-100, 100, 5)),
                Some(OptionValue::Int(0)),
            ),
            slot(
                OPT_GAMMA,
                "gamma",
                "Gamma",
                "Gamma correction; the device applies it in steps of 0.1.",
                ValueType::Fixed,
                Unit::None,
                RW | Capabilities::ADVANCED,
                Constraint::Range(WordRange::new(fixed_to_word(0.5), fixed_to_word(4.0), 0)),
                Some(OptionValue::Fixed(1.0)),
            ),
            slot(
                OPT_GAMMA_TABLE,
                "gamma-table",
                "Gamma table",
                "Gamma-correction table.",
                ValueType::Int,
                Unit::None,
                RW | Capabilities::ADVANCED,
                Constraint::Range(WordRange::new(0, 255, 1)),
                Some(OptionValue::IntVec(
                    (0..GAMMA_TABLE_LEN as i32).map(|i| i * 17).collect(),
                )),
            ),
            slot(
                OPT_CALIBRATE,
                "calibrate",
                "Calibrate",
                "Run the lamp calibration cycle.",
                ValueType::Button,
                Unit::None,
                Capabilities::SOFT_SELECT,
                Constraint::None,
                None,
            ),
            slot(
                OPT_LAMP_HOURS,
                "lamp-hours",
                "Lamp hours",
                "Hours the lamp has been on.",
                ValueType::Int,
                Unit::None,
                Capabilities::SOFT_DETECT,
                Constraint::None,
                Some(OptionValue::Int(1234)),
            ),
            slot(
                OPT_PREVIEW,
                "preview",
                "Preview",
                "Request a preview-quality scan.",
                ValueType::Bool,
                Unit::None,
                RW,
                Constraint::None,
                Some(OptionValue::Bool(false)),
            ),
        ];
        let count = slots.len() as i32;
        slots[0].value = Some(OptionValue::Int(count));
        Self { slots }
    }

    pub fn descriptor(&self, index: i32) -> Option<&OptionDescriptor> {
        self.slot(index).map(|s| &s.descriptor)
    }

    pub fn value(&self, index: i32) -> Result<&OptionValue, Status> {
        let slot = self.slot(index).ok_or(Status::Inval)?;
        if !slot.descriptor.is_active() {
            return Err(Status::Inval);
        }
        slot.value.as_ref().ok_or(Status::Inval)
    }

    /// Apply a set the way a device would: reject what it cannot take,
    /// coerce what it can, report the side effects.
    pub fn set(&mut self, index: i32, value: OptionValue) -> Result<(OptionValue, ControlInfo), Status> {
        let slot = self.slot(index).ok_or(Status::Inval)?;
        let d = &slot.descriptor;
        if !d.is_settable() || !d.is_active() || !d.value_type.has_value() {
            return Err(Status::Inval);
        }
        if d.check_value(&value).is_err() {
            return Err(Status::Inval);
        }

        let mut info = ControlInfo::empty();
        let applied = match (index, &value) {
            (OPT_GAMMA, OptionValue::Fixed(g)) => {
                let rounded = (g * 10.0).round() / 10.0;
                let rounded = word_to_fixed(fixed_to_word(rounded));
                if rounded != *g {
                    info |= ControlInfo::INEXACT;
                }
                OptionValue::Fixed(rounded)
            }
            _ => value,
        };

        match index {
            OPT_RESOLUTION | OPT_MODE | OPT_DEPTH | OPT_WIDTH | OPT_HEIGHT | OPT_PREVIEW => {
                info |= ControlInfo::RELOAD_PARAMS;
            }
            OPT_SOURCE => {
                let adf = applied.as_str() == Some(SOURCE_ADF);
                self.set_active(OPT_DUPLEX, adf);
                info |= ControlInfo::RELOAD_OPTIONS | ControlInfo::RELOAD_PARAMS;
            }
            _ => {}
        }

        if let Some(slot) = self.slot_mut(index) {
            slot.value = Some(applied.clone());
        }
        Ok((applied, info))
    }

    pub fn set_auto(&mut self, index: i32) -> Result<ControlInfo, Status> {
        let slot = self.slot_mut(index).ok_or(Status::Inval)?;
        if !slot.descriptor.is_automatic() || !slot.descriptor.is_active() {
            return Err(Status::Inval);
        }
        match index {
            OPT_BRIGHTNESS => slot.value = Some(OptionValue::Int(0)),
            _ => return Err(Status::Unsupported),
        }
        Ok(ControlInfo::empty())
    }

    pub fn press(&mut self, index: i32) -> Result<ControlInfo, Status> {
        let slot = self.slot(index).ok_or(Status::Inval)?;
        if slot.descriptor.value_type != ValueType::Button || !slot.descriptor.is_settable() {
            return Err(Status::Inval);
        }
        Ok(ControlInfo::empty())
    }

    /// Frames one scan produces in the current mode.
    pub fn frame_count(&self) -> usize {
        if self.string(OPT_MODE) == MODE_THREE_PASS { 3 } else { 1 }
    }

    /// Geometry of frame `frame` under the current settings.
    pub fn parameters(&self, frame: usize, unknown_lines: bool) -> Parameters {
        let (format, last_frame) = match self.string(OPT_MODE) {
            MODE_COLOR => (FrameFormat::Rgb, true),
            MODE_THREE_PASS => {
                let format = match frame {
                    0 => FrameFormat::Red,
                    1 => FrameFormat::Green,
                    _ => FrameFormat::Blue,
                };
                (format, frame >= 2)
            }
            _ => (FrameFormat::Gray, true),
        };
        let pixels_per_line = self.int(OPT_WIDTH).max(1) as usize;
        let depth = self.int(OPT_DEPTH).max(1) as u32;
        let bits = pixels_per_line * format.channels() * depth as usize;
        Parameters {
            format,
            last_frame,
            bytes_per_line: bits.div_ceil(8),
            pixels_per_line,
            lines: (!unknown_lines).then(|| self.int(OPT_HEIGHT).max(1) as usize),
            depth,
        }
    }

    /// Byte total of a frame, known to the device even when it reports an
    /// unknown line count.
    pub fn frame_bytes(&self, frame: usize) -> usize {
        let params = self.parameters(frame, false);
        params.frame_bytes().unwrap_or(0)
    }

    fn set_active(&mut self, index: i32, active: bool) {
        if let Some(slot) = self.slot_mut(index) {
            slot.descriptor.capabilities.set(Capabilities::INACTIVE, !active);
        }
    }

    fn int(&self, index: i32) -> i32 {
        self.slot(index)
            .and_then(|s| s.value.as_ref())
            .and_then(OptionValue::as_int)
            .unwrap_or(0)
    }

    fn string(&self, index: i32) -> &str {
        self.slot(index)
            .and_then(|s| s.value.as_ref())
            .and_then(OptionValue::as_str)
            .unwrap_or("")
    }

    fn slot(&self, index: i32) -> Option<&Slot> {
        usize::try_from(index).ok().and_then(|i| self.slots.get(i))
    }

    fn slot_mut(&mut self, index: i32) -> Option<&mut Slot> {
        usize::try_from(index).ok().and_then(|i| self.slots.get_mut(i))
    }
}
