//! Format inference and dispatch: the single entry point external
//! collaborators use.
use std::path::{Path, PathBuf};

use tracing::trace;

use crate::error::{ParadoxError, Result};
use crate::family::{self, FamilyReference};
use crate::index::{self, IndexKind, ParadoxIndex, ParadoxSecondaryIndexData};
use crate::table::{self, ParadoxTable};
use crate::tableview::{self, ParadoxTableView};

pub const WINDOWS_1252: &str = "Windows-1252";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParadoxFormat {
    Table,
    Query,
    Report,
    TableView,
    Family,
    PrimaryIndex,
    SecondaryIndex,
    SecondaryIndexData,
    Script,
    Spreadsheet,
    Snapshot,
    Unknown,
}

impl ParadoxFormat {
    pub fn label(self) -> &'static str {
        match self {
            Self::Table => "Table",
            Self::Query => "Query",
            Self::Report => "Report",
            Self::TableView => "TableView",
            Self::Family => "Family",
            Self::PrimaryIndex => "PrimaryIndex",
            Self::SecondaryIndex => "SecondaryIndex",
            Self::SecondaryIndexData => "SecondaryIndexData",
            Self::Script => "Script",
            Self::Spreadsheet => "Spreadsheet",
            Self::Snapshot => "Snapshot",
            Self::Unknown => "Unknown",
        }
    }
}

/// Maps a lowercased file extension to a format.
pub fn infer_format(path: &Path) -> ParadoxFormat {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "db" => ParadoxFormat::Table,
        "qbe" => ParadoxFormat::Query,
        "rsl" => ParadoxFormat::Report,
        "tv" => ParadoxFormat::TableView,
        "fam" => ParadoxFormat::Family,
        "px" => ParadoxFormat::PrimaryIndex,
        "ssl" | "sdl" => ParadoxFormat::Script,
        "xls" | "xlsx" => ParadoxFormat::Spreadsheet,
        "bak" | "tmp" => ParadoxFormat::Snapshot,
        _ if ext.starts_with('x') && ext.len() == 3 => ParadoxFormat::SecondaryIndexData,
        _ if ext.starts_with('y') && ext.len() == 3 => ParadoxFormat::SecondaryIndex,
        _ => ParadoxFormat::Unknown,
    }
}

/// A generic binary shape for formats the core doesn't decode structurally
/// (Report, Family[*], Script, Spreadsheet, Snapshot, Unknown). `*` Family
/// is instead decoded as text — see `ParadoxDetails::Family`.
pub struct GenericBinary {
    data: Vec<u8>,
    pub size: usize,
    pub preview: Vec<u8>,
}

const PREVIEW_LEN: usize = 64;

impl GenericBinary {
    fn new(data: Vec<u8>) -> Self {
        let size = data.len();
        let preview = data[..data.len().min(PREVIEW_LEN)].to_vec();
        Self { data, size, preview }
    }

    pub fn hex_dump(&self) -> String {
        self.data
            .iter()
            .map(|b| format!("{:02X}", b))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Contiguous runs of printable ASCII at least 4 bytes long.
    pub fn ascii_segments(&self) -> Vec<String> {
        let mut segments = Vec::new();
        let mut current = Vec::new();
        for &byte in &self.data {
            if byte.is_ascii_graphic() || byte == b' ' {
                current.push(byte);
            } else if current.len() >= 4 {
                segments.push(String::from_utf8_lossy(&current).into_owned());
                current.clear();
            } else {
                current.clear();
            }
        }
        if current.len() >= 4 {
            segments.push(String::from_utf8_lossy(&current).into_owned());
        }
        segments
    }
}

pub enum ParadoxDetails {
    Table(ParadoxTable),
    Query { text: String, encoding_used: &'static str },
    TableView(ParadoxTableView),
    Family(Vec<FamilyReference>),
    Index(ParadoxIndex),
    SecondaryIndexData(ParadoxSecondaryIndexData),
    Binary(GenericBinary),
}

pub struct File {
    pub path: Option<PathBuf>,
    pub format: ParadoxFormat,
    pub size: usize,
    pub details: ParadoxDetails,
}

/// Reads `path` in full, infers its format from the extension, and
/// dispatches to the matching decoder.
pub fn load(path: &Path) -> Result<File> {
    let bytes = std::fs::read(path).map_err(|cause| ParadoxError::Io {
        path: path.to_path_buf(),
        cause,
    })?;
    let format = infer_format(path);
    trace!(?format, path = %path.display(), "dispatching file");
    load_with_format(bytes, format, Some(path))
}

/// Decodes an in-memory buffer under a caller-supplied format, skipping
/// extension inference.
pub fn load_bytes(bytes: Vec<u8>, format: ParadoxFormat) -> Result<File> {
    load_with_format(bytes, format, None)
}

fn load_with_format(bytes: Vec<u8>, format: ParadoxFormat, path: Option<&Path>) -> Result<File> {
    let size = bytes.len();
    let details = match format {
        ParadoxFormat::Table => ParadoxDetails::Table(table::parse_table(&bytes, path)?),
        ParadoxFormat::Query => ParadoxDetails::Query {
            text: crate::strings::decode(&bytes),
            encoding_used: WINDOWS_1252,
        },
        ParadoxFormat::TableView => ParadoxDetails::TableView(tableview::parse_table_view(&bytes)?),
        ParadoxFormat::Family => ParadoxDetails::Family(family::parse_family(&bytes)),
        ParadoxFormat::PrimaryIndex => {
            ParadoxDetails::Index(index::parse_index(&bytes, IndexKind::Primary)?)
        }
        ParadoxFormat::SecondaryIndex => {
            ParadoxDetails::Index(index::parse_index(&bytes, IndexKind::Secondary)?)
        }
        ParadoxFormat::SecondaryIndexData => {
            ParadoxDetails::SecondaryIndexData(index::parse_secondary_index_data(&bytes, path)?)
        }
        ParadoxFormat::Report
        | ParadoxFormat::Script
        | ParadoxFormat::Spreadsheet
        | ParadoxFormat::Snapshot
        | ParadoxFormat::Unknown => ParadoxDetails::Binary(GenericBinary::new(bytes)),
    };

    Ok(File {
        path: path.map(|p| p.to_path_buf()),
        format,
        size,
        details,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_format_from_extension() {
        assert_eq!(infer_format(Path::new("CUSTOMER.DB")), ParadoxFormat::Table);
        assert_eq!(infer_format(Path::new("customer.px")), ParadoxFormat::PrimaryIndex);
        assert_eq!(infer_format(Path::new("customer.x01")), ParadoxFormat::SecondaryIndexData);
        assert_eq!(infer_format(Path::new("customer.y02")), ParadoxFormat::SecondaryIndex);
        assert_eq!(infer_format(Path::new("customer.weird")), ParadoxFormat::Unknown);
    }

    #[test]
    fn query_load_returns_raw_text() {
        let file = load_bytes(b"SELECT * FROM CUSTOMER;".to_vec(), ParadoxFormat::Query).unwrap();
        match file.details {
            ParadoxDetails::Query { text, encoding_used } => {
                assert_eq!(text, "SELECT * FROM CUSTOMER;");
                assert_eq!(encoding_used, WINDOWS_1252);
            }
            _ => panic!("expected Query details"),
        }
    }

    #[test]
    fn unsupported_formats_fall_back_to_generic_binary() {
        let file = load_bytes(vec![1, 2, 3, 4], ParadoxFormat::Spreadsheet).unwrap();
        assert_eq!(file.size, 4);
        match file.details {
            ParadoxDetails::Binary(bin) => assert_eq!(bin.size, 4),
            _ => panic!("expected Binary details"),
        }
    }
}
