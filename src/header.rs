//! The 128-byte table header prefix plus the field descriptor section that
//! follows it.
use crate::bytestream::ByteReader;
use crate::error::{ParadoxError, Result};
use crate::strings;

pub const HEADER_MINIMUM: usize = 128;

/// Paradox file-type byte at header offset 0x04.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileTypeCode {
    IndexedTable,
    UnindexedTable,
    PrimaryIndex,
    NonIncSecondaryIndex,
    SecondaryIndex,
    IncSecondaryIndex,
    NonIncSecondaryIndexGvar,
    Other(u8),
}

impl FileTypeCode {
    fn from_byte(byte: u8) -> Self {
        match byte {
            0x00 => Self::IndexedTable,
            0x02 => Self::UnindexedTable,
            0x01 => Self::PrimaryIndex,
            0x03 => Self::NonIncSecondaryIndex,
            0x05 => Self::SecondaryIndex,
            0x06 => Self::IncSecondaryIndex,
            0x08 => Self::NonIncSecondaryIndexGvar,
            other => Self::Other(other),
        }
    }

    /// File types for which a version >= 40 table carries the extended
    /// 0x78-byte data header.
    fn carries_extended_header_when_recent(&self) -> bool {
        matches!(
            self,
            Self::IndexedTable
                | Self::UnindexedTable
                | Self::NonIncSecondaryIndex
                | Self::SecondaryIndex
        )
    }
}

/// Normalized Paradox file-version identifiers.
fn normalize_version(raw: u8) -> u16 {
    match raw {
        0x00..=0x03 => 30,
        0x04..=0x0B => 35,
        0x0C..=0x0C => 40,
        0x0D..=0x13 => 40,
        0x14..=0x1D => 50,
        _ => 70,
    }
}

#[derive(Debug, Clone)]
pub struct TableHeader {
    pub record_size: u16,
    pub header_length_in_bytes: u16,
    pub file_type_code: FileTypeCode,
    pub max_table_size_factor: u8,
    pub row_count: u32,
    pub field_count: u16,
    pub key_field_count: u16,
    pub auto_increment_value: u32,
    pub auto_increment_seed: u32,
    pub file_version_id: u16,
    pub code_page_identifier: u16,
}

impl TableHeader {
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_MINIMUM {
            return Err(ParadoxError::TooSmall {
                format: "table",
                got: data.len(),
                minimum: HEADER_MINIMUM,
            });
        }
        let mut reader = ByteReader::new(data);
        let record_size = reader.read_u16()?;
        let header_length_in_bytes = reader.read_u16()?;
        let file_type_code = FileTypeCode::from_byte(reader.read_u8()?);
        let max_table_size_factor = reader.read_u8()?;
        let row_count = reader.read_u32()?;

        reader.seek(0x21)?;
        let field_count = reader.read_u16()?;
        let key_field_count = reader.read_u16()?;

        reader.seek(0x39)?;
        let file_version_id = normalize_version(reader.read_u8()?);

        reader.seek(0x48)?;
        let auto_increment_value = reader.read_u32()?;
        let auto_increment_seed = reader.read_u32()?;

        reader.seek(0x6A)?;
        let code_page_identifier = reader.read_u16()?;

        if record_size == 0 {
            return Err(ParadoxError::InvalidRecordSize);
        }

        Ok(Self {
            record_size,
            header_length_in_bytes,
            file_type_code,
            max_table_size_factor,
            row_count,
            field_count,
            key_field_count,
            auto_increment_value,
            auto_increment_seed,
            file_version_id,
            code_page_identifier,
        })
    }

    pub fn block_size(&self) -> usize {
        self.max_table_size_factor as usize * 1024
    }

    pub fn includes_data_header(&self) -> bool {
        self.file_version_id >= 40 && self.file_type_code.carries_extended_header_when_recent()
    }

    pub fn field_info_offset(&self) -> usize {
        if self.includes_data_header() {
            0x78
        } else {
            0x58
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Alpha,
    Date,
    Short,
    Long,
    Currency,
    Number,
    Logical,
    Memo,
    Binary,
    Graphic,
    Time,
    Timestamp,
    AutoInc,
    Bcd,
    Bytes,
    Unknown(u8),
}

impl FieldType {
    pub fn from_code(code: u8) -> Self {
        match code {
            0x01 => Self::Alpha,
            0x02 => Self::Date,
            0x03 => Self::Short,
            0x04 => Self::Long,
            0x05 => Self::Currency,
            0x06 => Self::Number,
            0x07 | 0x09 => Self::Logical,
            0x08 | 0x0C | 0x0E => Self::Memo,
            0x0D | 0x0F => Self::Binary,
            0x10 => Self::Graphic,
            0x14 => Self::Time,
            0x15 => Self::Timestamp,
            0x16 => Self::AutoInc,
            0x17 => Self::Bcd,
            0x18 => Self::Bytes,
            other => Self::Unknown(other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub index: usize,
    pub length_bytes: u8,
    pub type_code: u8,
    pub field_type: FieldType,
    pub name: String,
}

impl FieldDescriptor {
    pub fn display_name(&self) -> String {
        if self.name.trim().is_empty() {
            format!("Field {}", self.index + 1)
        } else {
            self.name.clone()
        }
    }
}

pub struct ParsedFields {
    pub descriptors: Vec<FieldDescriptor>,
    pub table_name: Option<String>,
    pub sort_order: Option<String>,
}

/// Parses the field-type/length pairs, two opaque sections, the table name,
/// and the per-field name strings following the header.
pub fn parse_field_descriptors(data: &[u8], header: &TableHeader) -> Result<ParsedFields> {
    let offset = header.field_info_offset();
    let field_count = header.field_count as usize;
    let pair_bytes = field_count * 2;
    if offset + pair_bytes > data.len() {
        return Err(ParadoxError::MissingFieldDescriptors);
    }

    let mut reader = ByteReader::new(data);
    reader.seek(offset)?;
    let mut raw_pairs = Vec::with_capacity(field_count);
    for _ in 0..field_count {
        let type_code = reader.read_u8()?;
        let length_bytes = reader.read_u8()?;
        raw_pairs.push((type_code, length_bytes));
    }

    // Two opaque sections: pointer section (4 + 4*field_count bytes) and
    // field-number section (2*field_count bytes). Both are skipped.
    reader.skip(4 + 4 * field_count)?;
    reader.skip(2 * field_count)?;

    let table_name = reader.read_c_string().ok().map(strings::decode_c_string);
    let table_name = table_name.filter(|s| !s.is_empty());

    let mut descriptors = Vec::with_capacity(field_count);
    for (index, (type_code, length_bytes)) in raw_pairs.into_iter().enumerate() {
        let raw_name = reader.read_c_string()?;
        let name = strings::decode_c_string(raw_name);
        descriptors.push(FieldDescriptor {
            index,
            length_bytes,
            type_code,
            field_type: FieldType::from_code(type_code),
            name,
        });
    }

    let sort_order = reader
        .read_c_string()
        .ok()
        .map(strings::decode_c_string)
        .filter(|s| !s.is_empty());

    Ok(ParsedFields {
        descriptors,
        table_name,
        sort_order,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header_bytes(record_size: u16, field_count: u16, file_version: u8) -> Vec<u8> {
        let mut data = vec![0u8; 128];
        data[0..2].copy_from_slice(&record_size.to_le_bytes());
        data[0x21..0x23].copy_from_slice(&field_count.to_le_bytes());
        data[0x39] = file_version;
        data[0x05] = 1; // max_table_size_factor
        data
    }

    #[test]
    fn rejects_zero_record_size() {
        let data = sample_header_bytes(0, 2, 0x0C);
        assert!(matches!(
            TableHeader::parse(&data),
            Err(ParadoxError::InvalidRecordSize)
        ));
    }

    #[test]
    fn field_info_offset_depends_on_version_and_type() {
        let data = sample_header_bytes(10, 2, 0x0C);
        let header = TableHeader::parse(&data).unwrap();
        assert_eq!(header.file_version_id, 40);
        assert_eq!(header.field_info_offset(), 0x78);
    }

    #[test]
    fn old_version_uses_short_header() {
        let data = sample_header_bytes(10, 2, 0x02);
        let header = TableHeader::parse(&data).unwrap();
        assert_eq!(header.field_info_offset(), 0x58);
    }

    #[test]
    fn display_name_falls_back_for_blank_names() {
        let descriptor = FieldDescriptor {
            index: 2,
            length_bytes: 4,
            type_code: 0x03,
            field_type: FieldType::Short,
            name: "   ".to_string(),
        };
        assert_eq!(descriptor.display_name(), "Field 3");
    }
}
