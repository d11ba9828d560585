//! Legacy text recovery. Windows-1252 is ubiquitous in Paradox files; this
//! module never falls back to UTF-8 decoding of legacy bytes, since that is
//! wrong in the common case.
use encoding_rs::{ISO_8859_1, WINDOWS_1252};

/// Decodes a byte slice as Windows-1252, then ISO-8859-1, then ASCII, with a
/// last-resort printable-ASCII/U+FFFD mapping that can never fail.
pub fn decode(bytes: &[u8]) -> String {
    let (text, _, had_errors) = WINDOWS_1252.decode(bytes);
    if !had_errors {
        return text.into_owned();
    }
    let (text, _, had_errors) = ISO_8859_1.decode(bytes);
    if !had_errors {
        return text.into_owned();
    }
    if bytes.is_ascii() {
        return String::from_utf8_lossy(bytes).into_owned();
    }
    bytes
        .iter()
        .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '\u{FFFD}' })
        .collect()
}

/// Decodes an Alpha field: strips leading NULs, strips a trailing run mixing
/// NULs and spaces in either order, replaces interior NULs with a space,
/// then decodes.
pub fn decode_alpha(bytes: &[u8]) -> String {
    let leading_trimmed = trim_leading(bytes, 0);
    let end = leading_trimmed
        .iter()
        .rposition(|&b| b != 0 && b != b' ')
        .map(|i| i + 1)
        .unwrap_or(0);
    let trimmed = &leading_trimmed[..end];
    let cleaned: Vec<u8> = trimmed
        .iter()
        .map(|&b| if b == 0 { b' ' } else { b })
        .collect();
    decode(&cleaned)
}

/// Decodes a NUL-terminated run and stops at the first 0x00, discarding
/// anything after it.
pub fn decode_c_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    decode(&bytes[..end])
}

fn trim_leading(bytes: &[u8], target: u8) -> &[u8] {
    let start = bytes.iter().position(|&b| b != target).unwrap_or(bytes.len());
    &bytes[start..]
}
