// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Constraint model: the four shapes a device can put on an option's legal
// values, membership tests, and lazy enumeration of finite shapes.
//
// Numeric constraints are expressed in boundary words. Fixed-point values
// are encoded before comparison so that 0.1 mm steps compare exactly the
// way the device sees them.

use serde::{Deserialize, Serialize};

use crate::codec;
use crate::error::{Result, ScanwerkError};
use crate::types::{OptionValue, ValueType, Word};

/// Legal values of an option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Constraint {
    None,
    Range(WordRange),
    /// Finite list of numbers, in the device's preferred order.
    WordList(Vec<Word>),
    /// Finite list of strings, in the device's preferred order.
    StringList(Vec<String>),
}

/// `min, min + quant, ..., <= max`. A quantization of zero means any word
/// in `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WordRange {
    pub min: Word,
    pub max: Word,
    pub quant: Word,
}

impl WordRange {
    pub fn new(min: Word, max: Word, quant: Word) -> Self {
        Self { min, max, quant }
    }

    /// Effective step. Zero and negative quantizations step by one.
    pub fn step(&self) -> i64 {
        i64::from(self.quant.max(1))
    }

    pub fn contains(&self, word: Word) -> bool {
        self.min <= word
            && word <= self.max
            && (i64::from(word) - i64::from(self.min)) % self.step() == 0
    }

    /// Number of legal values: `floor((max - min) / step) + 1`, or zero for
    /// an inverted range.
    pub fn len(&self) -> usize {
        if self.min > self.max {
            return 0;
        }
        ((i64::from(self.max) - i64::from(self.min)) / self.step() + 1) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ascending iterator over the legal values.
    pub fn iter(&self) -> RangeWords {
        RangeWords {
            next: i64::from(self.min),
            step: self.step(),
            remaining: self.len(),
        }
    }

    /// Legal word closest to `word`; ties go to the lower value.
    pub fn closest(&self, word: Word) -> Option<Word> {
        if self.is_empty() {
            return None;
        }
        let clamped = i64::from(word.clamp(self.min, self.max));
        let offset = clamped - i64::from(self.min);
        let below = i64::from(self.min) + offset / self.step() * self.step();
        let above = below + self.step();
        let pick = if above <= i64::from(self.max) && (above - clamped) < (clamped - below) {
            above
        } else {
            below
        };
        Some(pick as Word)
    }
}

/// Lazy ascending walk over a `WordRange`.
#[derive(Debug, Clone)]
pub struct RangeWords {
    next: i64,
    step: i64,
    remaining: usize,
}

impl Iterator for RangeWords {
    type Item = Word;

    fn next(&mut self) -> Option<Word> {
        if self.remaining == 0 {
            return None;
        }
        let word = self.next as Word;
        self.next += self.step;
        self.remaining -= 1;
        Some(word)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for RangeWords {}

/// One legal value yielded by [`Constraint::enumerate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintValue<'a> {
    Word(Word),
    Str(&'a str),
}

/// Lazy enumeration of a finite constraint. Clone it to restart.
#[derive(Debug, Clone)]
pub enum ConstraintValues<'a> {
    Range(RangeWords),
    Words(std::slice::Iter<'a, Word>),
    Strings(std::slice::Iter<'a, String>),
}

impl<'a> Iterator for ConstraintValues<'a> {
    type Item = ConstraintValue<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Self::Range(it) => it.next().map(ConstraintValue::Word),
            Self::Words(it) => it.next().map(|w| ConstraintValue::Word(*w)),
            Self::Strings(it) => it.next().map(|s| ConstraintValue::Str(s.as_str())),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self {
            Self::Range(it) => it.size_hint(),
            Self::Words(it) => it.size_hint(),
            Self::Strings(it) => it.size_hint(),
        }
    }
}

impl ExactSizeIterator for ConstraintValues<'_> {}

impl Constraint {
    /// Whether `value` is legal under this constraint. Vector values are
    /// legal only if every element is.
    pub fn validate(&self, value: &OptionValue) -> bool {
        match (self, value) {
            (Self::None, _) => true,
            (Self::StringList(list), OptionValue::String(s)) => list.iter().any(|l| l == s),
            (Self::StringList(_), _) => false,
            (Self::Range(_) | Self::WordList(_), _) => match codec::value_words(value) {
                Ok(Some(words)) => words.iter().all(|w| self.validate_word(*w)),
                _ => false,
            },
        }
    }

    /// Membership test for a single numeric word.
    pub fn validate_word(&self, word: Word) -> bool {
        match self {
            Self::None => true,
            Self::Range(range) => range.contains(word),
            Self::WordList(list) => list.contains(&word),
            Self::StringList(_) => false,
        }
    }

    /// Enumerate the legal values. Unconstrained options fail `Unbounded`.
    pub fn enumerate(&self) -> Result<ConstraintValues<'_>> {
        match self {
            Self::None => Err(ScanwerkError::Unbounded),
            Self::Range(range) => Ok(ConstraintValues::Range(range.iter())),
            Self::WordList(list) => Ok(ConstraintValues::Words(list.iter())),
            Self::StringList(list) => Ok(ConstraintValues::Strings(list.iter())),
        }
    }

    /// Number of legal values, `None` when unconstrained.
    pub fn len(&self) -> Option<usize> {
        match self {
            Self::None => None,
            Self::Range(range) => Some(range.len()),
            Self::WordList(list) => Some(list.len()),
            Self::StringList(list) => Some(list.len()),
        }
    }

    /// Whether this shape may be attached to an option of type `ty`.
    pub fn matches_type(&self, ty: ValueType) -> bool {
        match self {
            Self::None => true,
            Self::Range(_) | Self::WordList(_) => ty.is_numeric(),
            Self::StringList(_) => ty == ValueType::String,
        }
    }

    /// Legal word closest to `word`, for callers that want to offer a
    /// correction. Never applied automatically.
    pub fn closest_word(&self, word: Word) -> Option<Word> {
        match self {
            Self::None => Some(word),
            Self::Range(range) => range.closest(word),
            Self::WordList(list) => list
                .iter()
                .copied()
                .min_by_key(|w| (i64::from(*w) - i64::from(word)).unsigned_abs()),
            Self::StringList(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(c: &Constraint) -> Vec<Word> {
        c.enumerate()
            .unwrap()
            .map(|v| match v {
                ConstraintValue::Word(w) => w,
                ConstraintValue::Str(s) => panic!("unexpected string {s}"),
            })
            .collect()
    }

    #[test]
    fn range_enumerates_quantized_steps() {
        let c = Constraint::Range(WordRange::new(0, 10, 2));
        assert_eq!(words(&c), vec![0, 2, 4, 6, 8, 10]);
        assert_eq!(c.len(), Some(6));
    }

    #[test]
    fn degenerate_range_yields_one_value() {
        let c = Constraint::Range(WordRange::new(5, 5, 3));
        assert_eq!(words(&c), vec![5]);
    }

    #[test]
    fn range_stops_before_overshooting_max() {
        let c = Constraint::Range(WordRange::new(0, 10, 3));
        assert_eq!(words(&c), vec![0, 3, 6, 9]);
    }

    #[test]
    fn zero_quant_steps_by_one() {
        let r = WordRange::new(-2, 2, 0);
        assert_eq!(r.iter().collect::<Vec<_>>(), vec![-2, -1, 0, 1, 2]);
    }

    #[test]
    fn inverted_range_is_empty() {
        let r = WordRange::new(3, 1, 1);
        assert_eq!(r.len(), 0);
        assert!(!r.contains(2));
    }

    #[test]
    fn range_validation_follows_formula() {
        for (min, max, q) in [(0, 10, 2), (-7, 20, 3), (1, 9, 0), (4, 4, 5)] {
            let r = WordRange::new(min, max, q);
            let step = q.max(1);
            for v in min..=max {
                assert_eq!(r.contains(v), (v - min) % step == 0, "{min}..{max}/{q} at {v}");
            }
            assert!(!r.contains(min - 1));
            assert!(!r.contains(max + 1));
        }
    }

    #[test]
    fn enumeration_is_restartable() {
        let c = Constraint::Range(WordRange::new(0, 4, 2));
        let it = c.enumerate().unwrap();
        assert_eq!(it.clone().count(), 3);
        assert_eq!(it.count(), 3);
    }

    #[test]
    fn lists_keep_device_order() {
        let c = Constraint::WordList(vec![600, 75, 300]);
        assert_eq!(words(&c), vec![600, 75, 300]);
        assert!(c.validate(&OptionValue::Int(75)));
        assert!(!c.validate(&OptionValue::Int(150)));

        let s = Constraint::StringList(vec!["Color".into(), "Gray".into()]);
        let listed: Vec<_> = s.enumerate().unwrap().collect();
        assert_eq!(listed, vec![ConstraintValue::Str("Color"), ConstraintValue::Str("Gray")]);
        assert!(s.validate(&OptionValue::String("Gray".into())));
        assert!(!s.validate(&OptionValue::String("gray".into())));
    }

    #[test]
    fn none_accepts_everything_but_cannot_enumerate() {
        assert!(Constraint::None.validate(&OptionValue::Int(i32::MIN)));
        assert!(matches!(Constraint::None.enumerate(), Err(ScanwerkError::Unbounded)));
    }

    #[test]
    fn fixed_values_compare_in_word_domain() {
        let c = Constraint::Range(WordRange::new(
            codec::fixed_to_word(0.0),
            codec::fixed_to_word(215.9),
            0,
        ));
        assert!(c.validate(&OptionValue::Fixed(100.5)));
        assert!(!c.validate(&OptionValue::Fixed(216.0)));
    }

    #[test]
    fn vectors_need_every_element_legal() {
        let c = Constraint::Range(WordRange::new(0, 255, 1));
        assert!(c.validate(&OptionValue::IntVec(vec![0, 128, 255])));
        assert!(!c.validate(&OptionValue::IntVec(vec![0, 256])));
    }

    #[test]
    fn shape_type_pairing() {
        assert!(Constraint::WordList(vec![1]).matches_type(ValueType::Fixed));
        assert!(!Constraint::WordList(vec![1]).matches_type(ValueType::String));
        assert!(!Constraint::StringList(vec![]).matches_type(ValueType::Int));
        assert!(Constraint::None.matches_type(ValueType::Group));
    }

    #[test]
    fn closest_word_suggestions() {
        let list = Constraint::WordList(vec![75, 150, 300, 600]);
        assert_eq!(list.closest_word(200), Some(150));
        let range = Constraint::Range(WordRange::new(0, 100, 10));
        assert_eq!(range.closest_word(57), Some(60));
        assert_eq!(range.closest_word(55), Some(50));
        assert_eq!(range.closest_word(500), Some(100));
    }
}
