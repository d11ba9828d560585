//! `.PX` (primary) and `.Ynn` (secondary) B-tree block decoding, plus the
//! `.Xnn` secondary-index-data trailer appended after a regular table body.
use crate::bytestream::ByteReader;
use crate::error::{ParadoxError, Result};
use crate::numeric::decode_index_short;
use crate::strings;
use crate::table::{parse_table, ParadoxTable};

pub const INDEX_HEADER_MINIMUM: usize = 2048;
const MAX_BLOCKS: usize = 64;
const MAX_RECORDS_PER_BLOCK: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Primary,
    Secondary,
}

#[derive(Debug, Clone)]
pub struct IndexHeader {
    pub record_length: u16,
    pub header_length: u16,
    pub file_type: u8,
    pub block_size: usize,
    pub record_count: u32,
    pub blocks_in_use: u16,
    pub total_blocks: u16,
    pub first_data_block: u16,
    pub last_block: u16,
    pub root_block: u16,
    pub level_count: u8,
    pub field_count: u8,
}

impl IndexHeader {
    fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < INDEX_HEADER_MINIMUM {
            return Err(ParadoxError::TooSmall {
                format: "index",
                got: data.len(),
                minimum: INDEX_HEADER_MINIMUM,
            });
        }
        let mut reader = ByteReader::new(data);
        let record_length = reader.read_u16()?;
        let header_length = reader.read_u16()?;
        let file_type = reader.read_u8()?;
        let block_size_code = reader.read_u8()?;
        let record_count = reader.read_u32()?;

        reader.seek(0x0A)?;
        let blocks_in_use = reader.read_u16()?;
        let total_blocks = reader.read_u16()?;
        let first_data_block = reader.read_u16()?;
        let last_block = reader.read_u16()?;

        reader.seek(0x1E)?;
        let root_block = reader.read_u16()?;
        let level_count = reader.read_u8()?;
        let field_count = reader.read_u8()?;

        Ok(Self {
            record_length,
            header_length,
            file_type,
            block_size: block_size_code as usize * 1024,
            record_count,
            blocks_in_use,
            total_blocks,
            first_data_block,
            last_block,
            root_block,
            level_count,
            field_count,
        })
    }
}

#[derive(Debug, Clone)]
pub struct IndexKeyRecord {
    pub key_bytes: Vec<u8>,
    pub key_hex: String,
    pub child_block: i16,
    pub statistics: i16,
    pub reserved: i16,
}

#[derive(Debug, Clone)]
pub struct IndexBlock {
    pub id: usize,
    pub next_block: u16,
    pub prev_block: u16,
    pub record_count: usize,
    pub records: Vec<IndexKeyRecord>,
}

pub struct ParadoxIndex {
    pub header: IndexHeader,
    pub kind: IndexKind,
    pub blocks: Vec<IndexBlock>,
    pub total_blocks_reported: usize,
}

/// Parses `.PX`/`.Ynn` B-tree blocks, capping at the first 64 blocks and
/// first 12 records per block; `total_blocks_reported` tells the caller how
/// many blocks exist beyond the cap.
pub fn parse_index(data: &[u8], kind: IndexKind) -> Result<ParadoxIndex> {
    let header = IndexHeader::parse(data)?;
    let record_length = header.record_length as usize;
    let block_size = header.block_size;
    let mut blocks = Vec::new();

    if record_length < 6 || block_size <= 6 {
        return Ok(ParadoxIndex {
            header,
            kind,
            blocks,
            total_blocks_reported: 0,
        });
    }

    let mut block_start = header.header_length as usize;
    let mut block_id = 1usize;
    let mut total_seen = 0usize;

    while block_start < data.len() {
        let block_end = (block_start + block_size).min(data.len());
        let block = &data[block_start..block_end];
        if block.len() < 6 {
            break;
        }
        total_seen += 1;

        if blocks.len() < MAX_BLOCKS {
            let mut reader = ByteReader::new(block);
            let next_block = reader.read_u16()?;
            let prev_block = reader.read_u16()?;
            let last_offset = reader.read_i16()?;

            let record_count = if last_offset < 0 {
                0
            } else {
                (last_offset as isize / record_length as isize) + 1
            }
            .max(0) as usize;

            let mut records = Vec::new();
            let key_length = record_length.saturating_sub(6);
            for slot in 0..record_count.min(MAX_RECORDS_PER_BLOCK) {
                let start = 6 + slot * record_length;
                let end = start + record_length;
                let Some(slot_bytes) = block.get(start..end) else {
                    break;
                };
                let key_bytes = slot_bytes[..key_length].to_vec();
                let tail = &slot_bytes[key_length..];
                let child_block = decode_index_short(&tail[0..2].try_into().unwrap_or([0, 0]));
                let statistics = decode_index_short(&tail[2..4].try_into().unwrap_or([0, 0]));
                let reserved = decode_index_short(&tail[4..6].try_into().unwrap_or([0, 0]));
                records.push(IndexKeyRecord {
                    key_hex: hex_spaced(&key_bytes),
                    key_bytes,
                    child_block,
                    statistics,
                    reserved,
                });
            }

            blocks.push(IndexBlock {
                id: block_id,
                next_block,
                prev_block,
                record_count,
                records,
            });
        }

        block_id += 1;
        block_start += block_size;
    }

    Ok(ParadoxIndex {
        header,
        kind,
        blocks,
        total_blocks_reported: total_seen,
    })
}

fn hex_spaced(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// `.Xnn` secondary-index *data* files: a regular table body (parsed via
/// `table::parse_table`) plus a trailer of field-number references, a
/// sort-order string, and an index label string.
pub struct ParadoxSecondaryIndexData {
    pub table: ParadoxTable,
    pub field_number_refs: Vec<u16>,
    pub sort_order: Option<String>,
    pub index_label: Option<String>,
}

pub fn parse_secondary_index_data(
    data: &[u8],
    path: Option<&std::path::Path>,
) -> Result<ParadoxSecondaryIndexData> {
    let table = parse_table(data, path)?;

    let field_info_offset = table.header.field_info_offset();
    let field_count = table.fields.len();
    let mut reader = ByteReader::new(data);
    let skip_to_names = field_info_offset + field_count * 2 + (4 + 4 * field_count) + 2 * field_count;
    if reader.seek(skip_to_names).is_err() {
        return Ok(ParadoxSecondaryIndexData {
            table,
            field_number_refs: Vec::new(),
            sort_order: None,
            index_label: None,
        });
    }
    let _ = reader.read_c_string(); // table name, already captured on `table`
    for _ in 0..field_count {
        let _ = reader.read_c_string(); // field names, already captured on `table`
    }

    let mut field_number_refs = Vec::with_capacity(field_count);
    for _ in 0..field_count {
        match reader.read_u16() {
            Ok(v) => field_number_refs.push(v),
            Err(_) => break,
        }
    }
    let sort_order = reader.read_c_string().ok().map(strings::decode_c_string).filter(|s| !s.is_empty());
    let index_label = reader.read_c_string().ok().map(strings::decode_c_string).filter(|s| !s.is_empty());

    Ok(ParadoxSecondaryIndexData {
        table,
        field_number_refs,
        sort_order,
        index_label,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_index_header(record_length: u16, block_size_code: u8) -> Vec<u8> {
        let mut data = vec![0u8; INDEX_HEADER_MINIMUM];
        data[0..2].copy_from_slice(&record_length.to_le_bytes());
        data[0x02..0x04].copy_from_slice(&(INDEX_HEADER_MINIMUM as u16).to_le_bytes());
        data[0x05] = block_size_code;
        data
    }

    #[test]
    fn record_count_follows_last_offset_rule() {
        let mut data = build_index_header(12, 1);
        let block_size = 1024usize;
        let mut block = vec![0u8; block_size];
        block[4..6].copy_from_slice(&11i16.to_le_bytes()); // last_offset = 11
        data.extend_from_slice(&block);
        let index = parse_index(&data, IndexKind::Primary).unwrap();
        // (11 / 12) + 1 == 1
        assert_eq!(index.blocks[0].record_count, 1);
    }

    #[test]
    fn negative_last_offset_is_zero_records() {
        let mut data = build_index_header(12, 1);
        let mut block = vec![0u8; 1024];
        block[4..6].copy_from_slice(&(-1i16).to_le_bytes());
        data.extend_from_slice(&block);
        let index = parse_index(&data, IndexKind::Primary).unwrap();
        assert_eq!(index.blocks[0].record_count, 0);
    }

    #[test]
    fn caps_block_and_record_counts() {
        let mut data = build_index_header(12, 1);
        let block_size = 1024usize;
        for _ in 0..(MAX_BLOCKS + 5) {
            let mut block = vec![0u8; block_size];
            block[4..6].copy_from_slice(&200i16.to_le_bytes());
            data.extend_from_slice(&block);
        }
        let index = parse_index(&data, IndexKind::Primary).unwrap();
        assert_eq!(index.blocks.len(), MAX_BLOCKS);
        assert_eq!(index.total_blocks_reported, MAX_BLOCKS + 5);
        assert!(index.blocks[0].records.len() <= MAX_RECORDS_PER_BLOCK);
    }

    #[test]
    fn malformed_short_record_length_does_not_panic() {
        // record_length < 6 leaves no room for the child/statistics/reserved
        // tail; must be rejected up front rather than panic while slicing it.
        let mut data = build_index_header(3, 1);
        data.extend_from_slice(&[0u8; 1024]);
        let index = parse_index(&data, IndexKind::Primary).unwrap();
        assert!(index.blocks.is_empty());
        assert_eq!(index.total_blocks_reported, 0);
    }
}
