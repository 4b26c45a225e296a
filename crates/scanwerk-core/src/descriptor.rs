// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Option descriptors: the metadata a device publishes for each option slot.

use serde::{Deserialize, Serialize};

use crate::codec;
use crate::constraint::{Constraint, ConstraintValue};
use crate::error::{Result, ScanwerkError};
use crate::types::{Capabilities, OptionValue, Unit, ValueType};

/// Index of the reserved meta-option holding the option count.
pub const OPTION_COUNT_INDEX: i32 = 0;

/// Snapshot of one option's metadata.
///
/// Snapshots are owned copies; after a set that reports reloaded options
/// they may describe a state the device has left. Re-fetch before relying
/// on the constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionDescriptor {
    pub index: i32,
    /// Unique within the device; empty for group markers.
    pub name: String,
    pub title: String,
    pub description: String,
    pub value_type: ValueType,
    pub unit: Unit,
    /// Byte size of the value buffer.
    pub size: usize,
    pub capabilities: Capabilities,
    pub constraint: Constraint,
}

impl OptionDescriptor {
    pub fn is_active(&self) -> bool {
        !self.capabilities.contains(Capabilities::INACTIVE)
    }

    pub fn is_settable(&self) -> bool {
        self.capabilities.contains(Capabilities::SOFT_SELECT)
    }

    pub fn is_detectable(&self) -> bool {
        self.capabilities.contains(Capabilities::SOFT_DETECT)
    }

    pub fn is_advanced(&self) -> bool {
        self.capabilities.contains(Capabilities::ADVANCED)
    }

    pub fn is_automatic(&self) -> bool {
        self.capabilities.contains(Capabilities::AUTOMATIC)
    }

    pub fn is_emulated(&self) -> bool {
        self.capabilities.contains(Capabilities::EMULATED)
    }

    pub fn is_group(&self) -> bool {
        self.value_type == ValueType::Group
    }

    /// Label for log lines and errors: the name, or the title for groups.
    pub fn label(&self) -> &str {
        if self.name.is_empty() { &self.title } else { &self.name }
    }

    /// Check the structural invariants a well-behaved device guarantees:
    /// groups carry no constraint, the constraint shape matches the value
    /// type, and valued options have a usable size.
    pub fn check_shape(&self) -> Result<()> {
        if self.value_type == ValueType::Group && self.constraint != Constraint::None {
            return Err(ScanwerkError::IoError(format!(
                "group option {} carries a constraint",
                self.index
            )));
        }
        if !self.constraint.matches_type(self.value_type) {
            return Err(ScanwerkError::IoError(format!(
                "option '{}' pairs {:?} with an incompatible constraint",
                self.label(),
                self.value_type
            )));
        }
        if self.value_type.has_value() && self.size == 0 {
            return Err(ScanwerkError::IoError(format!(
                "option '{}' declares a zero-byte value",
                self.label()
            )));
        }
        Ok(())
    }

    /// Typed legal values, in the device's order.
    pub fn legal_values(&self) -> Result<Vec<OptionValue>> {
        self.constraint
            .enumerate()?
            .map(|v| match v {
                ConstraintValue::Word(w) => codec::word_value(w, self.value_type)
                    .ok_or(ScanwerkError::UnsupportedType(self.value_type)),
                ConstraintValue::Str(s) => Ok(OptionValue::String(s.to_owned())),
            })
            .collect()
    }

    /// Validate a candidate value against type and constraint. Does not
    /// look at capabilities.
    pub fn check_value(&self, value: &OptionValue) -> Result<()> {
        if !self.value_type.has_value() {
            return Err(ScanwerkError::UnsupportedType(self.value_type));
        }
        if value.value_type() != self.value_type {
            return Err(ScanwerkError::TypeMismatch {
                expected: self.value_type,
                found: value.kind_name().into(),
            });
        }
        // Unconstrained fixed-point values must still fit a word.
        codec::value_words(value)?;
        if !self.constraint.validate(value) {
            return Err(ScanwerkError::ConstraintViolation {
                option: self.label().to_owned(),
                value: value.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::WordRange;

    fn resolution() -> OptionDescriptor {
        OptionDescriptor {
            index: 1,
            name: "resolution".into(),
            title: "Scan resolution".into(),
            description: "Sets the resolution of the scanned image.".into(),
            value_type: ValueType::Int,
            unit: Unit::Dpi,
            size: 4,
            capabilities: Capabilities::SOFT_SELECT | Capabilities::SOFT_DETECT,
            constraint: Constraint::WordList(vec![75, 150, 300, 600]),
        }
    }

    #[test]
    fn legal_values_are_typed() {
        let values = resolution().legal_values().unwrap();
        assert_eq!(values.first(), Some(&OptionValue::Int(75)));
        assert_eq!(values.len(), 4);

        let mut gamma = resolution();
        gamma.value_type = ValueType::Fixed;
        gamma.constraint = Constraint::Range(WordRange::new(65536, 131072, 32768));
        assert_eq!(
            gamma.legal_values().unwrap(),
            vec![OptionValue::Fixed(1.0), OptionValue::Fixed(1.5), OptionValue::Fixed(2.0)]
        );
    }

    #[test]
    fn check_value_rejects_off_list() {
        let d = resolution();
        assert!(d.check_value(&OptionValue::Int(300)).is_ok());
        assert!(matches!(
            d.check_value(&OptionValue::Int(200)),
            Err(ScanwerkError::ConstraintViolation { .. })
        ));
        assert!(matches!(
            d.check_value(&OptionValue::Bool(true)),
            Err(ScanwerkError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn unconstrained_fixed_must_fit_a_word() {
        let mut offset = resolution();
        offset.value_type = ValueType::Fixed;
        offset.unit = Unit::Millimeter;
        offset.constraint = Constraint::None;
        assert!(offset.check_value(&OptionValue::Fixed(1200.5)).is_ok());
        for v in [40000.0, f64::NAN] {
            assert!(matches!(
                offset.check_value(&OptionValue::Fixed(v)),
                Err(ScanwerkError::InvalidArgument)
            ));
        }
    }

    #[test]
    fn shape_check_catches_mismatched_constraint() {
        let mut d = resolution();
        assert!(d.check_shape().is_ok());
        d.constraint = Constraint::StringList(vec!["a".into()]);
        assert!(d.check_shape().is_err());
    }

    #[test]
    fn group_label_falls_back_to_title() {
        let group = OptionDescriptor {
            index: 2,
            name: String::new(),
            title: "Geometry".into(),
            description: String::new(),
            value_type: ValueType::Group,
            unit: Unit::None,
            size: 0,
            capabilities: Capabilities::empty(),
            constraint: Constraint::None,
        };
        assert_eq!(group.label(), "Geometry");
        assert!(group.check_shape().is_ok());
    }
}
