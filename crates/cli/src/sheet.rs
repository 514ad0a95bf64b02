//! Input loading: CSV text or a workbook sheet into a `Table`.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Range, Reader};
use stockrecon_recon::{Cell, Table};

use crate::exit_codes::{EXIT_RECON_RUNTIME, EXIT_USAGE};
use crate::CliError;

/// Where to find the header row inside a file.
#[derive(Debug, Clone, Default)]
pub struct SheetOptions {
    /// Worksheet name (workbooks only). Defaults to the first sheet.
    pub sheet: Option<String>,
    /// Rows above the header to discard, e.g. a pivot table's title banner.
    pub skip_rows: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputKind {
    Csv,
    Workbook,
}

fn input_kind(path: &Path) -> Option<InputKind> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "csv" | "txt" => Some(InputKind::Csv),
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Some(InputKind::Workbook),
        _ => None,
    }
}

/// Load `path` as a table. The format is chosen by file extension.
pub fn load_table(path: &Path, options: &SheetOptions) -> Result<Table, CliError> {
    let kind = input_kind(path).ok_or_else(|| {
        CliError::new(EXIT_USAGE, format!("unsupported input file: {}", path.display()))
            .with_hint("expected .csv, .xlsx, .xlsm, .xlsb, .xls or .ods")
    })?;

    let table = match kind {
        InputKind::Csv => load_csv(path, options)?,
        InputKind::Workbook => load_workbook(path, options)?,
    };
    tracing::debug!(
        "{}: {} columns, {} rows",
        path.display(),
        table.width(),
        table.rows.len()
    );
    Ok(table)
}

/// CSV input is read record by record: `skip_rows` discards whole records,
/// so a quoted banner spanning several lines counts once and blank lines
/// are not counted at all.
fn load_csv(path: &Path, options: &SheetOptions) -> Result<Table, CliError> {
    if options.sheet.is_some() {
        tracing::warn!("{}: --sheet ignored for CSV input", path.display());
    }
    let read_err =
        |e: csv::Error| CliError::new(EXIT_RECON_RUNTIME, format!("{}: {e}", path.display()));

    let reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|e| {
            CliError::new(EXIT_RECON_RUNTIME, format!("cannot read {}: {e}", path.display()))
        })?;
    let mut records = reader.into_records();

    for _ in 0..options.skip_rows {
        if records.next().transpose().map_err(read_err)?.is_none() {
            break;
        }
    }

    let headers: Vec<String> = match records.next().transpose().map_err(read_err)? {
        Some(header) => header
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').to_string())
            .collect(),
        None => return Ok(Table::default()),
    };

    let mut rows = Vec::new();
    for record in records {
        let record = record.map_err(read_err)?;
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        rows.push(record.iter().map(Cell::from).collect());
    }

    Ok(Table::new(headers, rows))
}

fn load_workbook(path: &Path, options: &SheetOptions) -> Result<Table, CliError> {
    let runtime = |msg: String| CliError::new(EXIT_RECON_RUNTIME, msg);

    let mut workbook = open_workbook_auto(path)
        .map_err(|e| runtime(format!("cannot open {}: {e}", path.display())))?;

    let range = match &options.sheet {
        Some(name) => workbook.worksheet_range(name).map_err(|e| {
            runtime(format!("{}: cannot read sheet '{name}': {e}", path.display()))
                .with_hint(format!("available sheets: {}", workbook.sheet_names().join(", ")))
        })?,
        None => workbook
            .worksheet_range_at(0)
            .ok_or_else(|| runtime(format!("{}: workbook contains no sheets", path.display())))?
            .map_err(|e| runtime(format!("{}: cannot read first sheet: {e}", path.display())))?,
    };

    Ok(table_from_range(&range, options.skip_rows))
}

/// First row after `skip_rows` is the header; all-blank rows below it are dropped.
fn table_from_range(range: &Range<Data>, skip_rows: usize) -> Table {
    let mut rows = range.rows().skip(skip_rows);

    let headers: Vec<String> = match rows.next() {
        Some(header) => header.iter().map(|d| to_cell(d).to_text().trim().to_string()).collect(),
        None => return Table::default(),
    };

    let rows = rows
        .map(|row| row.iter().map(to_cell).collect::<Vec<Cell>>())
        .filter(|row| !row.iter().all(Cell::is_empty))
        .collect();

    Table::new(headers, rows)
}

fn to_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) => Cell::from(s.as_str()),
        Data::Float(f) => Cell::Float(*f),
        Data::Int(i) => Cell::Int(*i),
        Data::Bool(b) => Cell::Bool(*b),
        Data::Error(e) => Cell::Text(format!("#{:?}", e)),
        Data::DateTime(dt) => Cell::Float(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::from(s.as_str()),
    }
}
