// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Value codec: typed option values to and from the fixed-size byte buffers
// exchanged with the device boundary.
//
// Buffers are always exactly the descriptor's declared size. Numbers are
// native-endian 32-bit words; fixed-point words carry 16 fractional bits;
// strings are NUL-terminated within the buffer.

use crate::error::{Result, ScanwerkError};
use crate::types::{OptionValue, ValueType, WORD_SIZE, Word};

/// Fractional bits in a fixed-point word.
pub const FIXED_SCALE_SHIFT: u32 = 16;

const FIXED_SCALE: f64 = (1u32 << FIXED_SCALE_SHIFT) as f64;

/// Convert a real number to its fixed-point word, rounding to nearest.
///
/// Saturates outside the representable range; use `checked_fixed_to_word`
/// for caller-supplied values.
pub fn fixed_to_word(value: f64) -> Word {
    (value * FIXED_SCALE).round() as Word
}

/// Like `fixed_to_word`, but rejects non-finite values and values outside
/// `[i32::MIN, i32::MAX] / 65536` with `InvalidArgument`.
pub fn checked_fixed_to_word(value: f64) -> Result<Word> {
    let scaled = (value * FIXED_SCALE).round();
    if !scaled.is_finite() || scaled < Word::MIN as f64 || scaled > Word::MAX as f64 {
        return Err(ScanwerkError::InvalidArgument);
    }
    Ok(scaled as Word)
}

/// Convert a fixed-point word back to a real number.
pub fn word_to_fixed(word: Word) -> f64 {
    word as f64 / FIXED_SCALE
}

/// Number of words in a numeric option of `size` bytes.
pub fn word_count(size: usize) -> usize {
    (size / WORD_SIZE).max(1)
}

/// Encode `value` into a buffer of `size` bytes for an option of type `ty`.
pub fn encode(value: &OptionValue, ty: ValueType, size: usize) -> Result<Vec<u8>> {
    if !ty.has_value() {
        return Err(ScanwerkError::UnsupportedType(ty));
    }
    if value.value_type() != ty {
        return Err(ScanwerkError::TypeMismatch {
            expected: ty,
            found: value.kind_name().into(),
        });
    }

    match value {
        OptionValue::String(s) => encode_string(s, size),
        _ => {
            let words = value_words(value)?.ok_or(ScanwerkError::UnsupportedType(ty))?;
            encode_words(&words, ty, size, value.kind_name())
        }
    }
}

/// Decode a buffer of `size` bytes holding an option of type `ty`.
pub fn decode(buf: &[u8], ty: ValueType, size: usize) -> Result<OptionValue> {
    if !ty.has_value() {
        return Err(ScanwerkError::UnsupportedType(ty));
    }
    if buf.len() < size {
        return Err(ScanwerkError::InvalidArgument);
    }
    let buf = &buf[..size];

    if ty == ValueType::String {
        let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
        return Ok(OptionValue::String(
            String::from_utf8_lossy(&buf[..end]).into_owned(),
        ));
    }

    if size < WORD_SIZE {
        return Err(ScanwerkError::InvalidArgument);
    }
    let words: Vec<Word> = buf
        .chunks_exact(WORD_SIZE)
        .map(|c| Word::from_ne_bytes([c[0], c[1], c[2], c[3]]))
        .collect();

    Ok(match (ty, words.as_slice()) {
        (ValueType::Bool, [w, ..]) => OptionValue::Bool(*w != 0),
        (ValueType::Int, [w]) => OptionValue::Int(*w),
        (ValueType::Int, ws) => OptionValue::IntVec(ws.to_vec()),
        (ValueType::Fixed, [w]) => OptionValue::Fixed(word_to_fixed(*w)),
        (ValueType::Fixed, ws) => OptionValue::FixedVec(ws.iter().copied().map(word_to_fixed).collect()),
        _ => return Err(ScanwerkError::UnsupportedType(ty)),
    })
}

/// Word representation of a numeric or boolean value, as the constraint
/// model compares it. Strings have none; fixed-point values that do not
/// fit a word fail `InvalidArgument`.
pub fn value_words(value: &OptionValue) -> Result<Option<Vec<Word>>> {
    Ok(match value {
        OptionValue::Bool(b) => Some(vec![Word::from(*b)]),
        OptionValue::Int(v) => Some(vec![*v]),
        OptionValue::Fixed(v) => Some(vec![checked_fixed_to_word(*v)?]),
        OptionValue::IntVec(v) => Some(v.clone()),
        OptionValue::FixedVec(v) => Some(
            v.iter()
                .copied()
                .map(checked_fixed_to_word)
                .collect::<Result<_>>()?,
        ),
        OptionValue::String(_) => None,
    })
}

/// Typed value for a single word of a numeric option.
pub fn word_value(word: Word, ty: ValueType) -> Option<OptionValue> {
    match ty {
        ValueType::Bool => Some(OptionValue::Bool(word != 0)),
        ValueType::Int => Some(OptionValue::Int(word)),
        ValueType::Fixed => Some(OptionValue::Fixed(word_to_fixed(word))),
        _ => None,
    }
}

fn encode_words(words: &[Word], ty: ValueType, size: usize, kind: &str) -> Result<Vec<u8>> {
    let needed = words.len() * WORD_SIZE;
    if needed > size {
        return Err(ScanwerkError::ValueTooLarge { size, needed });
    }
    if ty != ValueType::Bool && words.len() != word_count(size) {
        return Err(ScanwerkError::TypeMismatch {
            expected: ty,
            found: format!("{kind} of {} word(s) for {} word(s)", words.len(), word_count(size)),
        });
    }

    let mut buf = vec![0u8; size];
    for (chunk, word) in buf.chunks_exact_mut(WORD_SIZE).zip(words) {
        chunk.copy_from_slice(&word.to_ne_bytes());
    }
    Ok(buf)
}

fn encode_string(s: &str, size: usize) -> Result<Vec<u8>> {
    let bytes = s.as_bytes();
    if bytes.contains(&0) {
        return Err(ScanwerkError::InvalidArgument);
    }
    let needed = bytes.len() + 1;
    if needed > size {
        return Err(ScanwerkError::ValueTooLarge { size, needed });
    }
    let mut buf = vec![0u8; size];
    buf[..bytes.len()].copy_from_slice(bytes);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(value: OptionValue, ty: ValueType, size: usize) -> OptionValue {
        let buf = encode(&value, ty, size).unwrap();
        assert_eq!(buf.len(), size);
        decode(&buf, ty, size).unwrap()
    }

    #[test]
    fn scalars_round_trip() {
        for v in [i32::MIN, -1, 0, 1, 300, i32::MAX] {
            assert_eq!(round_trip(OptionValue::Int(v), ValueType::Int, 4), OptionValue::Int(v));
        }
        for b in [true, false] {
            assert_eq!(round_trip(OptionValue::Bool(b), ValueType::Bool, 4), OptionValue::Bool(b));
        }
        for s in ["", "Color", "Flatbed"] {
            assert_eq!(
                round_trip(OptionValue::String(s.into()), ValueType::String, 32),
                OptionValue::String(s.into())
            );
        }
    }

    #[test]
    fn bool_decodes_any_nonzero_as_true() {
        let buf = 7i32.to_ne_bytes();
        assert_eq!(decode(&buf, ValueType::Bool, 4).unwrap(), OptionValue::Bool(true));
    }

    #[test]
    fn fixed_exact_multiples_round_trip_exactly() {
        for v in [0.0, 1.0, -2.5, 1.0 / 65536.0, 100.25] {
            assert_eq!(round_trip(OptionValue::Fixed(v), ValueType::Fixed, 4), OptionValue::Fixed(v));
        }
    }

    #[test]
    fn fixed_fraction_within_one_ulp() {
        let decoded = round_trip(OptionValue::Fixed(1.00002), ValueType::Fixed, 4)
            .as_fixed()
            .unwrap();
        assert!((decoded - 1.00002).abs() <= 1.0 / 65536.0);
    }

    #[test]
    fn fixed_word_is_scaled_by_65536() {
        assert_eq!(fixed_to_word(1.0), 65536);
        assert_eq!(fixed_to_word(-0.5), -32768);
        assert_eq!(word_to_fixed(98304), 1.5);
    }

    #[test]
    fn unrepresentable_fixed_values_are_rejected_not_clamped() {
        for v in [40000.0, -40000.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                encode(&OptionValue::Fixed(v), ValueType::Fixed, 4),
                Err(ScanwerkError::InvalidArgument)
            ));
        }
        assert!(matches!(
            encode(&OptionValue::FixedVec(vec![1.0, f64::NAN]), ValueType::Fixed, 8),
            Err(ScanwerkError::InvalidArgument)
        ));
        assert!(value_words(&OptionValue::Fixed(32767.5)).is_ok());
        assert!(value_words(&OptionValue::Fixed(-32768.0)).is_ok());
        assert!(matches!(
            value_words(&OptionValue::Fixed(32768.0)),
            Err(ScanwerkError::InvalidArgument)
        ));
    }

    #[test]
    fn string_must_fit_with_terminator() {
        assert!(encode(&OptionValue::String("abc".into()), ValueType::String, 4).is_ok());
        let err = encode(&OptionValue::String("abcd".into()), ValueType::String, 4).unwrap_err();
        assert!(matches!(err, ScanwerkError::ValueTooLarge { size: 4, needed: 5 }));
    }

    #[test]
    fn groups_and_buttons_have_no_payload() {
        for ty in [ValueType::Group, ValueType::Button] {
            assert!(matches!(
                encode(&OptionValue::Int(1), ty, 4),
                Err(ScanwerkError::UnsupportedType(t)) if t == ty
            ));
            assert!(matches!(decode(&[0; 4], ty, 4), Err(ScanwerkError::UnsupportedType(_))));
        }
    }

    #[test]
    fn type_mismatch_is_rejected() {
        let err = encode(&OptionValue::String("x".into()), ValueType::Int, 4).unwrap_err();
        assert!(matches!(err, ScanwerkError::TypeMismatch { expected: ValueType::Int, .. }));
    }

    #[test]
    fn word_vectors_round_trip() {
        let table: Vec<i32> = (0..16).map(|i| i * 16).collect();
        assert_eq!(
            round_trip(OptionValue::IntVec(table.clone()), ValueType::Int, 64),
            OptionValue::IntVec(table)
        );
        let too_long = OptionValue::IntVec(vec![0; 17]);
        assert!(matches!(
            encode(&too_long, ValueType::Int, 64),
            Err(ScanwerkError::ValueTooLarge { size: 64, needed: 68 })
        ));
        let too_short = OptionValue::IntVec(vec![0; 3]);
        assert!(matches!(
            encode(&too_short, ValueType::Int, 64),
            Err(ScanwerkError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn string_decode_stops_at_terminator() {
        let buf = b"Gray\0junk";
        assert_eq!(
            decode(buf, ValueType::String, buf.len()).unwrap(),
            OptionValue::String("Gray".into())
        );
    }
}
