//! `.DB` table decoding: header + field descriptors already parsed
//! (`header.rs`), this module walks the data blocks, slices records, and
//! dispatches each field's bytes to a typed `ParadoxValue`.
use std::cell::RefCell;
use std::fmt::Write as _;
use std::path::Path;
use std::rc::Rc;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use tracing::warn;

use crate::blob::BlobStore;
use crate::error::Result;
use crate::header::{parse_field_descriptors, FieldDescriptor, FieldType, TableHeader};
use crate::strings;

/// Fixed 6-byte header at the start of every data block; its contents are
/// unspecified by this decoder and skipped.
const BLOCK_HEADER_SIZE: usize = 6;

/// A single decoded Paradox scalar. An absent value (null field, unresolved
/// blob) is `None` at the `FieldValue` level, not a variant here.
#[derive(Debug, Clone, PartialEq)]
pub enum ParadoxValue {
    Text(String),
    Integer(i64),
    Double(f64),
    Decimal(Decimal),
    Bool(bool),
    Date(NaiveDate),
    Time(f64),
    Timestamp(NaiveDateTime),
    Bytes(Vec<u8>),
    Raw(Vec<u8>),
    Image(Vec<u8>),
}

impl ParadoxValue {
    /// Canonical display rendering.
    pub fn formatted_string(&self) -> String {
        match self {
            ParadoxValue::Text(s) => s.clone(),
            ParadoxValue::Integer(i) => i.to_string(),
            ParadoxValue::Double(d) => format_decimal_neutral(*d),
            ParadoxValue::Decimal(d) => format_decimal_value(*d),
            ParadoxValue::Bool(b) => b.to_string(),
            ParadoxValue::Date(d) => d.format("%Y-%m-%d").to_string(),
            ParadoxValue::Time(seconds) => format_time(*seconds),
            ParadoxValue::Timestamp(ts) => ts.format("%Y-%m-%d %H:%M:%S").to_string(),
            ParadoxValue::Bytes(bytes) | ParadoxValue::Raw(bytes) => format_hex(bytes),
            ParadoxValue::Image(_) => "[Image]".to_string(),
        }
    }
}

fn format_decimal_neutral(value: f64) -> String {
    let mut text = format!("{:.6}", value);
    while text.ends_with('0') {
        text.pop();
    }
    if text.ends_with('.') {
        text.pop();
    }
    text
}

fn format_decimal_value(value: Decimal) -> String {
    let scale = value.scale().clamp(2, 6);
    format!("{:.*}", scale as usize, value)
}

fn format_time(seconds: f64) -> String {
    let total = seconds.round() as i64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, secs)
}

fn format_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, byte) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{:02X}", byte);
    }
    out
}

/// One decoded field: its descriptor and the value extracted from the row,
/// or `None` for a null/empty slice.
#[derive(Debug, Clone)]
pub struct FieldValue {
    pub descriptor: FieldDescriptor,
    pub value: Option<ParadoxValue>,
}

/// A decoded row. Owns its raw bytes; field decoding happens lazily in
/// `values()` so that records which are never inspected never pay for blob
/// resolution.
pub struct ParadoxRecord {
    raw: Vec<u8>,
    fields: Rc<Vec<FieldDescriptor>>,
    blob_store: Option<Rc<RefCell<BlobStore>>>,
}

impl ParadoxRecord {
    fn new(
        raw: Vec<u8>,
        fields: Rc<Vec<FieldDescriptor>>,
        blob_store: Option<Rc<RefCell<BlobStore>>>,
    ) -> Self {
        Self {
            raw,
            fields,
            blob_store,
        }
    }

    /// Field-decode order always matches descriptor order.
    pub fn values(&self) -> Vec<FieldValue> {
        let mut offset = 0usize;
        let mut out = Vec::with_capacity(self.fields.len());
        for descriptor in self.fields.iter() {
            let len = descriptor.length_bytes as usize;
            let slice = self.raw.get(offset..offset + len).unwrap_or(&[]);
            offset += len;
            let value = decode_field(descriptor, slice, self.blob_store.as_ref());
            out.push(FieldValue {
                descriptor: descriptor.clone(),
                value,
            });
        }
        out
    }

    pub fn formatted_values(&self) -> Vec<String> {
        self.values()
            .into_iter()
            .map(|fv| fv.value.map(|v| v.formatted_string()).unwrap_or_default())
            .collect()
    }

    /// Case-insensitive lookup by field name.
    pub fn value(&self, named: &str) -> Option<ParadoxValue> {
        self.values()
            .into_iter()
            .find(|fv| fv.descriptor.name.eq_ignore_ascii_case(named))
            .and_then(|fv| fv.value)
    }
}

fn decode_field(
    descriptor: &FieldDescriptor,
    slice: &[u8],
    blob_store: Option<&Rc<RefCell<BlobStore>>>,
) -> Option<ParadoxValue> {
    if slice.is_empty() {
        return None;
    }
    match &descriptor.field_type {
        FieldType::Alpha => Some(ParadoxValue::Text(strings::decode_alpha(slice))),
        FieldType::Date => {
            let arr: [u8; 4] = slice.get(..4)?.try_into().ok()?;
            crate::numeric::decode_date(&arr).map(ParadoxValue::Date)
        }
        FieldType::Short => {
            crate::numeric::decode_signed(slice.get(..2)?).map(|v| ParadoxValue::Integer(v))
        }
        FieldType::Long | FieldType::AutoInc => {
            crate::numeric::decode_signed(slice.get(..4)?).map(ParadoxValue::Integer)
        }
        FieldType::Currency | FieldType::Number => {
            let arr: [u8; 8] = slice.get(..8)?.try_into().ok()?;
            crate::numeric::decode_double(&arr).map(ParadoxValue::Double)
        }
        FieldType::Logical => {
            crate::numeric::decode_logical(slice[0]).map(ParadoxValue::Bool)
        }
        FieldType::Memo => blob_store.and_then(|store| {
            store
                .borrow_mut()
                .resolve_text(slice)
                .map(ParadoxValue::Text)
        }),
        FieldType::Binary => blob_store.and_then(|store| {
            store
                .borrow_mut()
                .resolve_bytes(slice)
                .map(ParadoxValue::Bytes)
        }),
        FieldType::Graphic => blob_store.and_then(|store| {
            store
                .borrow_mut()
                .resolve_bytes(slice)
                .map(ParadoxValue::Image)
        }),
        FieldType::Time => {
            let arr: [u8; 4] = slice.get(..4)?.try_into().ok()?;
            crate::numeric::decode_time(&arr).map(ParadoxValue::Time)
        }
        FieldType::Timestamp => {
            let arr: [u8; 8] = slice.get(..8)?.try_into().ok()?;
            crate::numeric::decode_timestamp(&arr).map(ParadoxValue::Timestamp)
        }
        FieldType::Bcd => crate::numeric::decode_bcd(slice).map(ParadoxValue::Decimal),
        FieldType::Bytes => Some(ParadoxValue::Bytes(slice.to_vec())),
        FieldType::Unknown(code) => {
            warn!(field = %descriptor.name, type_code = code, "unknown field type, guessing shape from bytes");
            if slice.iter().all(|&b| b == 0 || b >= 0x20) {
                Some(ParadoxValue::Text(strings::decode(slice)))
            } else {
                Some(ParadoxValue::Raw(slice.to_vec()))
            }
        }
    }
}

pub struct ParadoxTable {
    pub header: TableHeader,
    pub fields: Vec<FieldDescriptor>,
    pub records: Vec<ParadoxRecord>,
    pub table_name: Option<String>,
    pub sort_order: Option<String>,
    field_names: Vec<String>,
    blob_store: Option<Rc<RefCell<BlobStore>>>,
}

impl ParadoxTable {
    pub fn field_names(&self) -> &[String] {
        &self.field_names
    }

    pub fn field_display_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.display_name()).collect()
    }

    pub fn code_page_identifier(&self) -> u16 {
        self.header.code_page_identifier
    }

    pub fn auto_increment_seed(&self) -> u32 {
        self.header.auto_increment_seed
    }

    /// Renders up to `sample_count` records as formatted string rows, the
    /// shape the CLI feeds into `prettytable`/`csv`.
    pub fn formatted_records(&self, sample_count: usize) -> Vec<Vec<String>> {
        self.records
            .iter()
            .take(sample_count)
            .map(|record| record.formatted_values())
            .collect()
    }
}

/// Parses a `.DB` file already read into memory. `path` is used only to
/// discover the sibling `.MB` file for blob resolution; pass `None` to
/// decode in-memory bytes with memo/binary/graphic fields left null.
pub fn parse_table(data: &[u8], path: Option<&Path>) -> Result<ParadoxTable> {
    let header = TableHeader::parse(data)?;
    let parsed = parse_field_descriptors(data, &header)?;

    let blob_store = path.map(|p| {
        Rc::new(RefCell::new(BlobStore::discover(
            p,
            parsed.table_name.as_deref(),
        )))
    });

    let fields = Rc::new(parsed.descriptors);
    let records = decode_records(data, &header, &fields, blob_store.clone());
    let field_names = fields.iter().map(|f| f.name.clone()).collect();

    Ok(ParadoxTable {
        header,
        fields: Rc::try_unwrap(fields).unwrap_or_else(|rc| (*rc).clone()),
        records,
        table_name: parsed.table_name,
        sort_order: parsed.sort_order,
        field_names,
        blob_store,
    })
}

/// Walks fixed-size data blocks starting at `header.header_length_in_bytes`,
/// emitting one record per non-tombstone slot, stopping at the declared
/// `row_count` (if non-zero) or when the data area is exhausted.
fn decode_records(
    data: &[u8],
    header: &TableHeader,
    fields: &Rc<Vec<FieldDescriptor>>,
    blob_store: Option<Rc<RefCell<BlobStore>>>,
) -> Vec<ParadoxRecord> {
    let mut records = Vec::new();
    let record_size = header.record_size as usize;
    let block_size = header.block_size();
    if block_size <= BLOCK_HEADER_SIZE || record_size == 0 {
        return records;
    }
    let records_per_block = (block_size - BLOCK_HEADER_SIZE) / record_size;
    if records_per_block == 0 {
        return records;
    }

    let mut block_start = header.header_length_in_bytes as usize;
    let target = header.row_count as usize;

    while block_start < data.len() {
        let block_end = (block_start + block_size).min(data.len());
        let block = &data[block_start..block_end];
        if block.len() <= BLOCK_HEADER_SIZE {
            break;
        }
        let slots = &block[BLOCK_HEADER_SIZE..];

        for slot_index in 0..records_per_block {
            let start = slot_index * record_size;
            let end = start + record_size;
            if end > slots.len() {
                break; // partial final block, truncated not padded
            }
            let slot = &slots[start..end];
            if slot.iter().all(|&b| b == 0) {
                continue; // tombstone
            }
            records.push(ParadoxRecord::new(
                slot.to_vec(),
                Rc::clone(fields),
                blob_store.clone(),
            ));
            if target != 0 && records.len() >= target {
                return records;
            }
        }
        block_start += block_size;
    }
    records
}
