//! `.MB` memo/binary/graphic blob resolution.
//!
//! Owned by a `ParadoxTable` loaded from a path; destroyed with the table.
//! Not required to be thread-safe — the contract is single-consumer per
//! table, so an interior `RefCell` cache is enough.
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::debug;

use crate::strings;

const DIRECTORY_ENTRY_SIZE: usize = 5;
const BLOCK_TYPE_SINGLE: u8 = 0x02;
const BLOCK_TYPE_DIRECTORY: u8 = 0x03;

struct BlobPointer {
    index: u8,
    block_offset: u32,
    length_raw: u32,
}

impl BlobPointer {
    /// The last 10 bytes of the in-row field are the pointer; any
    /// preceding bytes are the inline "leader".
    fn parse(field: &[u8]) -> Option<(Self, &[u8])> {
        if field.len() < 10 {
            return None;
        }
        let split = field.len() - 10;
        let (leader, pointer_bytes) = field.split_at(split);
        let offset_raw = u32::from_le_bytes(pointer_bytes[0..4].try_into().ok()?);
        let length_raw = u32::from_le_bytes(pointer_bytes[4..8].try_into().ok()?);
        if offset_raw == 0 {
            return Some((
                Self {
                    index: 0,
                    block_offset: 0,
                    length_raw: 0,
                },
                leader,
            ));
        }
        let index = (offset_raw & 0xFF) as u8;
        let block_offset = offset_raw & !0xFF;
        Some((
            Self {
                index,
                block_offset,
                length_raw,
            },
            leader,
        ))
    }

    fn is_inline(&self) -> bool {
        self.block_offset == 0 && self.index == 0 && self.length_raw == 0
    }
}

pub struct BlobStore {
    candidates: Vec<PathBuf>,
    cache: HashMap<PathBuf, Rc<Vec<u8>>>,
}

impl BlobStore {
    /// Enumerates the directory containing `table_path` for candidate
    /// `.MB` files, preferring ones whose stem matches the table file's own
    /// stem or the header's declared table name.
    pub fn discover(table_path: &Path, declared_table_name: Option<&str>) -> Self {
        let dir = table_path.parent().unwrap_or_else(|| Path::new("."));
        let mut candidate_stems = Vec::new();
        if let Some(stem) = table_path.file_stem().and_then(|s| s.to_str()) {
            candidate_stems.push(normalize_stem(stem));
        }
        if let Some(name) = declared_table_name {
            let stem = Path::new(name)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or(name);
            candidate_stems.push(normalize_stem(stem));
        }
        dedup_case_insensitive(&mut candidate_stems);

        let mut mb_files = Vec::new();
        if let Ok(entries) = fs::read_dir(dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("mb"))
                {
                    mb_files.push(path);
                }
            }
        }

        let mut candidates: Vec<PathBuf> = mb_files
            .iter()
            .filter(|path| {
                path.file_stem()
                    .and_then(|s| s.to_str())
                    .map(normalize_stem)
                    .is_some_and(|stem| candidate_stems.iter().any(|c| c.eq_ignore_ascii_case(&stem)))
            })
            .cloned()
            .collect();

        if candidates.is_empty() {
            candidates = mb_files;
        }

        Self {
            candidates,
            cache: HashMap::new(),
        }
    }

    fn mb_bytes(&mut self, path: &Path) -> Option<Rc<Vec<u8>>> {
        if let Some(bytes) = self.cache.get(path) {
            return Some(Rc::clone(bytes));
        }
        let bytes = fs::read(path).ok()?;
        let bytes = Rc::new(bytes);
        self.cache.insert(path.to_path_buf(), Rc::clone(&bytes));
        Some(bytes)
    }

    fn resolve_raw(&mut self, field: &[u8]) -> Option<Vec<u8>> {
        let (pointer, leader) = BlobPointer::parse(field)?;
        if pointer.is_inline() {
            return Some(leader.to_vec());
        }

        let candidates = self.candidates.clone();
        for path in &candidates {
            if let Some(bytes) = self.mb_bytes(path) {
                if let Some(payload) = resolve_block(&bytes, &pointer) {
                    return Some(payload);
                }
            }
        }
        debug!("blob resolution failed, falling back to leader bytes");
        if leader.is_empty() {
            None
        } else {
            Some(leader.to_vec())
        }
    }

    pub fn resolve_text(&mut self, field: &[u8]) -> Option<String> {
        let bytes = self.resolve_raw(field)?;
        let end = bytes.iter().rposition(|&b| b != 0).map(|i| i + 1).unwrap_or(0);
        Some(strings::decode(&bytes[..end]))
    }

    pub fn resolve_bytes(&mut self, field: &[u8]) -> Option<Vec<u8>> {
        self.resolve_raw(field)
    }
}

fn resolve_block(mb: &[u8], pointer: &BlobPointer) -> Option<Vec<u8>> {
    let block_offset = pointer.block_offset as usize;
    let block_type = *mb.get(block_offset)?;
    match block_type {
        BLOCK_TYPE_SINGLE if pointer.index == 0xFF => {
            let chunk_count = u16::from_le_bytes(mb.get(block_offset + 1..block_offset + 3)?.try_into().ok()?);
            let block_length = chunk_count as usize * 0x1000;
            let blob_length = u32::from_le_bytes(mb.get(block_offset + 3..block_offset + 7)?.try_into().ok()?);
            let declared = if blob_length != 0 { blob_length } else { pointer.length_raw } as usize;
            let length = declared.min(block_length.saturating_sub(9));
            let start = block_offset + 9;
            mb.get(start..start + length).map(|s| s.to_vec())
        }
        BLOCK_TYPE_DIRECTORY if pointer.index < 0xFF => {
            let entry_offset = block_offset + 12 + pointer.index as usize * DIRECTORY_ENTRY_SIZE;
            let entry = mb.get(entry_offset..entry_offset + DIRECTORY_ENTRY_SIZE)?;
            if entry.iter().all(|&b| b == 0) {
                return None;
            }
            let offset_chunks = entry[0];
            let chunk_count = entry[1];
            let remainder = entry[4];
            let data_offset_within_block = offset_chunks as usize * 16;
            let entry_length = (chunk_count.saturating_sub(1)) as usize * 16
                + if remainder == 0 && chunk_count > 0 { 16 } else { remainder as usize };
            let declared = if pointer.length_raw != 0 {
                pointer.length_raw as usize
            } else {
                entry_length
            };
            let length = declared.min(entry_length);
            let start = block_offset + data_offset_within_block;
            mb.get(start..start + length).map(|s| s.to_vec())
        }
        _ => None,
    }
}

/// Strips trailing `" (N)"` disambiguators and a leading `"Copy of "`
/// prefix before comparing stems case-insensitively.
fn normalize_stem(stem: &str) -> String {
    let without_prefix = if stem.len() >= 8 && stem[..8].eq_ignore_ascii_case("Copy of ") {
        &stem[8..]
    } else {
        stem
    };
    strip_disambiguator(without_prefix).to_string()
}

fn strip_disambiguator(s: &str) -> &str {
    if let Some(open) = s.rfind(" (") {
        if s.ends_with(')') && s[open + 2..s.len() - 1].chars().all(|c| c.is_ascii_digit()) {
            return &s[..open];
        }
    }
    s
}

fn dedup_case_insensitive(items: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    items.retain(|item| seen.insert(item.to_ascii_uppercase()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_pointer_returns_leader() {
        let mut field = vec![b'h', b'i'];
        field.extend_from_slice(&[0u8; 10]); // offset_raw == 0 => inline
        let (pointer, leader) = BlobPointer::parse(&field).unwrap();
        assert!(pointer.is_inline());
        assert_eq!(leader, b"hi");
    }

    #[test]
    fn normalizes_copy_of_and_disambiguator() {
        assert_eq!(normalize_stem("Copy of Sample"), "Sample");
        assert_eq!(normalize_stem("Sample (2)"), "Sample");
    }

    #[test]
    fn directory_block_computes_min_length() {
        // directory entry for index 0x3F at block_offset + 12 + 0x3F*5
        let mut mb = vec![0u8; 0x1000 + 12 + 0x40 * 5 + 64];
        mb[0x1000] = BLOCK_TYPE_DIRECTORY;
        let entry_offset = 0x1000 + 12 + 0x3F * 5;
        mb[entry_offset] = 0; // offset_chunks
        mb[entry_offset + 1] = 2; // chunk_count
        mb[entry_offset + 4] = 7; // remainder
        let payload = b"Memo blob text!!";
        mb[0x1000..0x1000 + payload.len()].copy_from_slice(payload);

        let pointer = BlobPointer {
            index: 0x3F,
            block_offset: 0x1000,
            length_raw: 15,
        };
        let resolved = resolve_block(&mb, &pointer).unwrap();
        // entry_length = (2-1)*16 + 7 = 23; declared(15) < entry_length -> 15
        assert_eq!(resolved.len(), 15);
        assert_eq!(&resolved, b"Memo blob text!");
    }
}
