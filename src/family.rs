//! `.FAM` family manifest: a loose text listing of every auxiliary file
//! belonging to one Paradox table. Parsing never fails — unreadable bytes
//! become spaces and the reference list may be empty.
use regex::Regex;
use std::sync::OnceLock;

use crate::strings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FamilyReferenceKind {
    Table,
    PrimaryIndex,
    SecondaryIndex,
    Memo,
    Validity,
    Query,
    TableView,
    Report,
    Script,
    Family,
    Image,
    Other,
}

impl FamilyReferenceKind {
    fn classify(name: &str) -> Self {
        let Some(ext) = name.rsplit('.').next() else {
            return Self::Other;
        };
        let ext = ext.to_ascii_uppercase();
        match ext.as_str() {
            "DB" => Self::Table,
            "PX" => Self::PrimaryIndex,
            "MB" => Self::Memo,
            "VAL" => Self::Validity,
            "QBE" => Self::Query,
            "TV" => Self::TableView,
            "RSL" => Self::Report,
            "SSL" | "SDL" => Self::Script,
            "FAM" => Self::Family,
            "BMP" | "GIF" | "PCX" => Self::Image,
            _ if is_secondary_index_extension(&ext) => Self::SecondaryIndex,
            _ => Self::Other,
        }
    }
}

/// `Xnn`/`Ynn`: leading X or Y, exactly 3 characters.
fn is_secondary_index_extension(ext: &str) -> bool {
    ext.len() == 3
        && (ext.starts_with('X') || ext.starts_with('Y'))
        && ext[1..].chars().all(|c| c.is_ascii_alphanumeric())
}

#[derive(Debug, Clone)]
pub struct FamilyReference {
    pub name: String,
    pub kind: FamilyReferenceKind,
    pub line_number: usize,
    pub context: String,
}

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)[A-Z0-9_\-]+\.[A-Z0-9]{1,4}").unwrap())
}

/// Replaces embedded NULs with line breaks and non-printable, non-whitespace
/// bytes with spaces, decodes as Windows-1252, then extracts filename
/// tokens line by line, deduplicating by uppercased name.
pub fn parse_family(data: &[u8]) -> Vec<FamilyReference> {
    let cleaned: Vec<u8> = data
        .iter()
        .map(|&b| {
            if b == 0 {
                b'\n'
            } else if b.is_ascii_graphic() || b == b' ' || b == b'\t' || b == b'\n' || b == b'\r' {
                b
            } else {
                b' '
            }
        })
        .collect();
    let text = strings::decode(&cleaned);

    let mut seen = std::collections::HashSet::new();
    let mut references = Vec::new();
    for (index, line) in text.lines().enumerate() {
        for m in token_pattern().find_iter(line) {
            let name = m.as_str().to_string();
            let key = name.to_ascii_uppercase();
            if !seen.insert(key) {
                continue;
            }
            references.push(FamilyReference {
                kind: FamilyReferenceKind::classify(&name),
                name,
                line_number: index + 1,
                context: line.trim().to_string(),
            });
        }
    }
    references
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_and_classifies_filenames() {
        let data = b"Family members:\nCUSTOMER.DB\nCUSTOMER.PX\nCUSTOMER.X01\nCUSTOMER.MB\n";
        let refs = parse_family(data);
        let names: Vec<_> = refs.iter().map(|r| r.name.as_str()).collect();
        assert!(names.contains(&"CUSTOMER.DB"));
        assert_eq!(
            refs.iter().find(|r| r.name == "CUSTOMER.DB").unwrap().kind,
            FamilyReferenceKind::Table
        );
        assert_eq!(
            refs.iter().find(|r| r.name == "CUSTOMER.X01").unwrap().kind,
            FamilyReferenceKind::SecondaryIndex
        );
    }

    #[test]
    fn deduplicates_case_insensitively() {
        let data = b"customer.db\nCUSTOMER.DB\n";
        let refs = parse_family(data);
        assert_eq!(refs.len(), 1);
    }

    #[test]
    fn never_fails_on_garbage_bytes() {
        let data: Vec<u8> = (0u8..=255).collect();
        // Must not panic; result may legitimately be empty.
        let _ = parse_family(&data);
    }
}
