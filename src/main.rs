use std::path::PathBuf;

use clap::Parser;
use prettytable::{row, Table};
use tracing_subscriber::EnvFilter;

use paradox_reader::facade::{self, ParadoxDetails};

#[derive(Debug, Parser)]
struct Arguments {
    /// Path to a Paradox file: .DB, .MB-referencing .DB, .PX, .Xnn, .Ynn, .TV, .FAM, ...
    path: PathBuf,
    /// How many decoded rows to print for table/index formats.
    #[arg(long, default_value_t = 20)]
    sample: usize,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let args = Arguments::parse();
    match facade::load(&args.path) {
        Ok(file) => print_file(&file, args.sample),
        Err(e) => eprintln!("Error decoding {}: {}", args.path.display(), e),
    }
}

fn print_file(file: &facade::File, sample: usize) {
    println!("format: {}  size: {} bytes", file.format.label(), file.size);
    match &file.details {
        ParadoxDetails::Table(table) => print_table(table, sample),
        ParadoxDetails::Query { text, encoding_used } => {
            println!("query text ({encoding_used}):\n{text}");
        }
        ParadoxDetails::TableView(view) => {
            println!("{:#?}", view);
            if let Some(reference) = view.resolved_table_reference() {
                println!("resolved table reference: {reference}");
            }
        }
        ParadoxDetails::Family(refs) => {
            let mut table = Table::new();
            table.add_row(row!["Line", "Name", "Kind"]);
            for reference in refs {
                table.add_row(row![reference.line_number, reference.name, format!("{:?}", reference.kind)]);
            }
            table.printstd();
        }
        ParadoxDetails::Index(index) => {
            println!(
                "kind={:?} blocks_parsed={} total_blocks_reported={}",
                index.kind,
                index.blocks.len(),
                index.total_blocks_reported
            );
            for block in index.blocks.iter().take(sample) {
                println!(
                    "block {} next={} prev={} records={}",
                    block.id, block.next_block, block.prev_block, block.record_count
                );
                for record in &block.records {
                    println!("  key={} child={}", record.key_hex, record.child_block);
                }
            }
        }
        ParadoxDetails::SecondaryIndexData(secondary) => {
            print_table(&secondary.table, sample);
            println!(
                "field_number_refs={:?} sort_order={:?} index_label={:?}",
                secondary.field_number_refs, secondary.sort_order, secondary.index_label
            );
        }
        ParadoxDetails::Binary(binary) => {
            println!("preview ({} bytes shown): {}", binary.preview.len(), hex_preview(&binary.preview));
            for segment in binary.ascii_segments().into_iter().take(sample) {
                println!("  ascii: {segment}");
            }
        }
    }
}

fn print_table(table: &paradox_reader::ParadoxTable, sample: usize) {
    let mut pretty = Table::new();
    pretty.add_row(prettytable::Row::new(
        table
            .field_display_names()
            .into_iter()
            .map(prettytable::Cell::new)
            .collect(),
    ));
    for row in table.formatted_records(sample) {
        pretty.add_row(prettytable::Row::new(row.iter().map(|s| prettytable::Cell::new(s)).collect()));
    }
    pretty.printstd();
    println!("{} rows total", table.records.len());
}

fn hex_preview(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect::<Vec<_>>().join(" ")
}
