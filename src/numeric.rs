//! Paradox's sign-biased big-endian numeric encoding.
//!
//! Paradox stores signed numerics big-endian with the sign bit inverted so
//! that a byte-wise memcmp sorts them correctly. Every numeric field type
//! (Short, Long, AutoInc, Date, Time, Timestamp, Number/Currency, the B-tree
//! child/statistics/reserved shorts) is expressed in terms of the single
//! transform below.
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use std::str::FromStr;

/// Applies the sign-bit-inversion rule to a big-endian byte buffer in place,
/// returning whether the stored value was "null" (all-zero).
///
/// Rule:
/// 1. High bit set -> clear it (value was non-negative).
/// 2. High bit clear, some other byte non-zero -> set the high bit (value
///    was negative; the two's-complement result stays negative).
/// 3. All bytes zero -> null.
fn invert_sign_bit(bytes: &mut [u8]) -> bool {
    if bytes[0] & 0x80 != 0 {
        bytes[0] &= 0x7F;
        false
    } else if bytes.iter().any(|&b| b != 0) {
        bytes[0] |= 0x80;
        false
    } else {
        true
    }
}

/// Decodes an N-byte (N <= 8) sign-biased big-endian signed integer.
/// Returns `None` for the all-zero "null" encoding.
pub fn decode_signed(raw: &[u8]) -> Option<i64> {
    let mut buf = [0u8; 8];
    let width = raw.len();
    buf[8 - width..].copy_from_slice(raw);
    let is_null = invert_sign_bit(&mut buf[8 - width..]);
    if is_null {
        return None;
    }
    // Sign-extend: replicate the top bit of the transformed width into the
    // leading bytes before reinterpreting the full 8 bytes as big-endian.
    let sign_extend = if buf[8 - width] & 0x80 != 0 { 0xFF } else { 0x00 };
    for b in buf.iter_mut().take(8 - width) {
        *b = sign_extend;
    }
    Some(i64::from_be_bytes(buf))
}

/// Same rule, but the stored width is unsigned after normalization (used for
/// Time, which is milliseconds-since-midnight stored as a u32).
pub fn decode_unsigned_u32(raw: &[u8; 4]) -> Option<u32> {
    let mut buf = *raw;
    let is_null = invert_sign_bit(&mut buf);
    if is_null {
        return None;
    }
    Some(u32::from_be_bytes(buf))
}

/// Decodes a Paradox double: same sign-bit trick, but inverted across all 8
/// bytes (bitwise-complemented, not just the high bit) when negative.
pub fn decode_double(raw: &[u8; 8]) -> Option<f64> {
    let mut buf = *raw;
    if buf[0] & 0x80 != 0 {
        buf[0] &= 0x7F;
    } else if buf.iter().any(|&b| b != 0) {
        for b in buf.iter_mut() {
            *b = !*b;
        }
    } else {
        return None;
    }
    Some(f64::from_be_bytes(buf))
}

/// Logical: zero is null; otherwise the high bit is toggled and the result
/// is true iff any bit remains set.
pub fn decode_logical(raw: u8) -> Option<bool> {
    if raw == 0 {
        return None;
    }
    Some((raw ^ 0x80) != 0)
}

/// Date: days since 0001-01-01 inclusive (day 1 = 0001-01-01), UTC calendar.
/// Null for non-positive results.
pub fn decode_date(raw: &[u8; 4]) -> Option<NaiveDate> {
    let days = decode_signed(raw)?;
    if days <= 0 {
        return None;
    }
    NaiveDate::from_ymd_opt(1, 1, 1)?.checked_add_signed(chrono::Duration::days(days - 1))
}

/// Time: milliseconds since midnight, emitted as a floating-point count of
/// seconds.
pub fn decode_time(raw: &[u8; 4]) -> Option<f64> {
    let millis = decode_unsigned_u32(raw)?;
    Some(millis as f64 / 1000.0)
}

/// Timestamp: a Paradox double whose integer part is a Date (same epoch)
/// and whose fractional part times 86,400 is seconds-within-day.
pub fn decode_timestamp(raw: &[u8; 8]) -> Option<NaiveDateTime> {
    let value = decode_double(raw)?;
    if value <= 0.0 {
        return None;
    }
    let days = value.trunc() as i64;
    let seconds_in_day = (value.fract() * 86_400.0).round() as i64;
    let date = NaiveDate::from_ymd_opt(1, 1, 1)?.checked_add_signed(chrono::Duration::days(days - 1))?;
    date.and_hms_opt(0, 0, 0)?
        .checked_add_signed(chrono::Duration::seconds(seconds_in_day))
}

/// BCD: always 17 bytes on disk, regardless of the field descriptor's
/// declared byte width (which describes the record-slicing width, not the
/// decimal scale). Byte 0's low 6 bits are the scale; the high bit is the
/// sign. The 32 significant nibbles in bytes 1..17 follow: the leading
/// `32 - scale` form the integer part, the trailing `scale` form the
/// fraction. Null when the first byte is zero or the buffer is short.
pub fn decode_bcd(raw: &[u8]) -> Option<Decimal> {
    if raw.len() < 17 || raw[0] == 0 {
        return None;
    }
    let positive = raw[0] & 0x80 != 0;
    let scale = (raw[0] & 0x3F) as usize;

    // raw[0]'s two nibbles carry sign+scale metadata, not digits (nibble
    // indices 0 and 1). The 32 digit nibbles live in raw[1..17], XOR-ed with
    // 0x0F per nibble when the value is negative.
    let mut significant = Vec::with_capacity(32);
    for byte in &raw[1..17] {
        let byte = if positive { *byte } else { byte ^ 0xFF };
        significant.push((byte >> 4) & 0x0F);
        significant.push(byte & 0x0F);
    }
    let split = significant.len().saturating_sub(scale);
    let (int_part, frac_part) = significant.split_at(split.min(significant.len()));

    let mut int_digits: String = int_part.iter().map(|n| char::from_digit(*n as u32, 16).unwrap_or('0')).collect();
    int_digits = int_digits.trim_start_matches('0').to_string();
    if int_digits.is_empty() {
        int_digits.push('0');
    }
    let mut frac_digits: String = frac_part.iter().map(|n| char::from_digit(*n as u32, 16).unwrap_or('0')).collect();
    if frac_digits.len() < scale {
        frac_digits.push_str(&"0".repeat(scale - frac_digits.len()));
    } else {
        frac_digits.truncate(scale);
    }

    let mut text = String::new();
    if !positive {
        text.push('-');
    }
    text.push_str(&int_digits);
    if scale > 0 {
        text.push('.');
        text.push_str(&frac_digits);
    }
    Decimal::from_str(&text).ok()
}

/// The 2-byte "index short" used in `.PX`/`.Ynn` block tails
/// (`child_block`, `statistics`, `reserved`): the sign-bit-inversion rule
/// applied to a 2-byte field, returning 0 for the null encoding.
pub fn decode_index_short(raw: &[u8; 2]) -> i16 {
    decode_signed(raw).unwrap_or(0) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_zero_buffer_is_null() {
        assert_eq!(decode_signed(&[0, 0, 0, 0]), None);
    }

    #[test]
    fn round_trips_i16() {
        for value in [-32768i16, -1, 0, 1, 12345, 32767] {
            let mut encoded = value.to_be_bytes();
            if value >= 0 {
                encoded[0] |= 0x80;
            } else if encoded.iter().any(|&b| b != 0) {
                encoded[0] &= 0x7F;
            }
            let decoded = decode_signed(&encoded).unwrap_or(0) as i16;
            assert_eq!(decoded, value, "value {value}");
        }
    }

    #[test]
    fn round_trips_i32() {
        for value in [i32::MIN, -1, 0, 1, 123456, i32::MAX] {
            let mut encoded = value.to_be_bytes();
            if value >= 0 {
                encoded[0] |= 0x80;
            } else if encoded.iter().any(|&b| b != 0) {
                encoded[0] &= 0x7F;
            }
            let decoded = decode_signed(&encoded).unwrap_or(0) as i32;
            assert_eq!(decoded, value, "value {value}");
        }
    }

    #[test]
    fn round_trips_f64() {
        for value in [0.0f64, 1.0, -1.0, 3.14159, -2.71828] {
            let mut encoded = value.to_be_bytes();
            if value >= 0.0 {
                encoded[0] |= 0x80;
            } else {
                for b in encoded.iter_mut() {
                    *b = !*b;
                }
            }
            let decoded = decode_double(&encoded);
            if value == 0.0 {
                assert_eq!(decoded, None);
            } else {
                assert!((decoded.unwrap() - value).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn logical_toggles_high_bit() {
        assert_eq!(decode_logical(0), None);
        assert_eq!(decode_logical(0x80), Some(false));
        assert_eq!(decode_logical(0x81), Some(true));
    }

    #[test]
    fn date_epoch_is_day_one() {
        let mut encoded = 1i32.to_be_bytes();
        encoded[0] |= 0x80;
        let date = decode_date(&encoded).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(1, 1, 1).unwrap());
    }

    #[test]
    fn date_zero_or_negative_is_null() {
        let mut encoded = 0i32.to_be_bytes();
        encoded[0] |= 0x80;
        assert_eq!(decode_date(&encoded), None);
    }

    #[test]
    fn bcd_reads_scale_from_first_byte_not_field_width() {
        // 32 packed digit nibbles representing 12345.67 at scale 2, with a
        // field byte-width (17) that must NOT be mistaken for the scale.
        let digits: Vec<u8> = "0000000000000000000000001234567"
            .chars()
            .map(|c| c.to_digit(10).unwrap() as u8)
            .collect();
        assert_eq!(digits.len(), 32);
        let mut raw = vec![0x80 | 2u8]; // positive, scale = 2
        for chunk in digits.chunks(2) {
            raw.push((chunk[0] << 4) | chunk[1]);
        }
        assert_eq!(raw.len(), 17);

        let value = decode_bcd(&raw).unwrap();
        assert_eq!(value, Decimal::from_str("12345.67").unwrap());
    }

    #[test]
    fn bcd_negative_complements_nibbles() {
        let digits: Vec<u8> = "0000000000000000000000000000012"
            .chars()
            .map(|c| c.to_digit(10).unwrap() as u8)
            .collect();
        let mut raw = vec![0u8]; // high bit clear => negative, scale = 0
        for chunk in digits.chunks(2) {
            let byte = (chunk[0] << 4) | chunk[1];
            raw.push(!byte);
        }
        let value = decode_bcd(&raw).unwrap();
        assert_eq!(value, Decimal::from_str("-12").unwrap());
    }

    #[test]
    fn bcd_null_on_zero_leader_or_short_buffer() {
        assert_eq!(decode_bcd(&[0u8; 17]), None);
        assert_eq!(decode_bcd(&[0x82, 0x12]), None);
    }
}
