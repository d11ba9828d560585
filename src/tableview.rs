//! `.TV` table-view container. The payload past the header strings is
//! undocumented; this decoder preserves that contract and does not invent
//! a schema for it.
use crate::bytestream::ByteReader;
use crate::error::{ParadoxError, Result};
use crate::strings;

pub const SIGNATURE: &str = "Borland Standard File";
const SIGNATURE_LEN: usize = 21;
const MAX_LABELS: usize = 4;

#[derive(Debug, Clone)]
pub struct ParadoxTableView {
    pub version: u16,
    pub flags: u16,
    pub declared_length: u32,
    pub first_block_offset: u16,
    pub directory_hint: Option<String>,
    pub table_filename: Option<String>,
    pub labels: Vec<String>,
}

impl ParadoxTableView {
    /// Joins `directory_hint` and `table_filename` with a backslash unless
    /// either already ends in a path separator.
    pub fn resolved_table_reference(&self) -> Option<String> {
        match (&self.directory_hint, &self.table_filename) {
            (Some(dir), Some(file)) => {
                if dir.ends_with('/') || dir.ends_with('\\') {
                    Some(format!("{dir}{file}"))
                } else {
                    Some(format!("{dir}\\{file}"))
                }
            }
            (None, Some(file)) => Some(file.clone()),
            _ => None,
        }
    }
}

pub fn parse_table_view(data: &[u8]) -> Result<ParadoxTableView> {
    if data.len() < SIGNATURE_LEN {
        return Err(ParadoxError::TooSmall {
            format: "table-view",
            got: data.len(),
            minimum: SIGNATURE_LEN,
        });
    }
    let found = &data[..SIGNATURE_LEN];
    if found != SIGNATURE.as_bytes() {
        return Err(ParadoxError::InvalidSignature {
            expected: SIGNATURE,
            found: String::from_utf8_lossy(found).into_owned(),
        });
    }

    let mut reader = ByteReader::new(data);
    reader.seek(SIGNATURE_LEN)?;
    skip_nul_padding(&mut reader)?;

    let version = reader.read_u16()?;
    let flags = reader.read_u16()?;
    let declared_length = reader.read_u32()?;
    let first_block_offset = reader.read_u16()?;

    skip_nul_padding(&mut reader)?;

    let directory_hint = read_optional_string(&mut reader);
    let table_filename = read_optional_string(&mut reader);

    let mut labels = Vec::new();
    while labels.len() < MAX_LABELS {
        match read_optional_string(&mut reader) {
            Some(label) => labels.push(label),
            None if reader.remaining() == 0 => break,
            None => continue,
        }
    }

    Ok(ParadoxTableView {
        version,
        flags,
        declared_length,
        first_block_offset,
        directory_hint,
        table_filename,
        labels,
    })
}

fn skip_nul_padding(reader: &mut ByteReader) -> Result<()> {
    while reader.remaining() > 0 {
        let start = reader.position();
        let byte = reader.read_u8()?;
        if byte != 0 {
            reader.seek(start)?;
            break;
        }
    }
    Ok(())
}

fn read_optional_string(reader: &mut ByteReader) -> Option<String> {
    let raw = reader.read_c_string().ok()?;
    let text = strings::decode_c_string(raw);
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_fixture() -> Vec<u8> {
        let mut data = SIGNATURE.as_bytes().to_vec();
        data.extend_from_slice(&1u16.to_le_bytes());
        data.extend_from_slice(&0x0020u16.to_le_bytes());
        data.extend_from_slice(&1024u32.to_le_bytes());
        data.extend_from_slice(&0x00A0u16.to_le_bytes());
        data.extend_from_slice(b"WORK:DATA\\CUS\0");
        data.extend_from_slice(b"SAMPLE.DB\0");
        data.extend_from_slice(b"Form Title\0");
        data
    }

    #[test]
    fn parses_signature_and_header_fields() {
        let data = build_fixture();
        let view = parse_table_view(&data).unwrap();
        assert_eq!(view.version, 1);
        assert_eq!(view.flags, 0x0020);
        assert_eq!(view.declared_length, 1024);
        assert_eq!(view.first_block_offset, 0x00A0);
        assert_eq!(view.directory_hint.as_deref(), Some("WORK:DATA\\CUS"));
        assert_eq!(view.table_filename.as_deref(), Some("SAMPLE.DB"));
        assert_eq!(view.labels, vec!["Form Title".to_string()]);
        assert_eq!(
            view.resolved_table_reference().as_deref(),
            Some("WORK:DATA\\CUS\\SAMPLE.DB")
        );
    }

    #[test]
    fn missing_signature_is_an_error() {
        let data = vec![0u8; 40];
        assert!(matches!(
            parse_table_view(&data),
            Err(ParadoxError::InvalidSignature { .. })
        ));
    }
}
