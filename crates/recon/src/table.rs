use serde::Serialize;

use crate::error::ReconError;

/// A raw cell value as handed over by a spreadsheet/CSV loader.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Empty,
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Float(v) => v.is_nan(),
            _ => false,
        }
    }

    /// Plain text rendering, used when echoing raw keys back in results.
    pub fn to_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Int(v) => v.to_string(),
            Cell::Float(v) if v.is_nan() => String::new(),
            Cell::Float(v) => v.to_string(),
            Cell::Bool(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
            Cell::Text(s) => s.clone(),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        if s.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(s.to_string())
        }
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        if s.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(s)
        }
    }
}

impl From<i64> for Cell {
    fn from(v: i64) -> Self {
        Cell::Int(v)
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::Float(v)
    }
}

/// A header row plus data rows. Rows may be ragged; missing cells read as `Empty`.
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

static EMPTY: Cell = Cell::Empty;

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self { headers, rows }
    }

    pub fn width(&self) -> usize {
        self.headers.len()
    }

    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY)
    }

    /// Parse CSV text with a header row. Every non-empty field becomes `Cell::Text`;
    /// numeric interpretation is left to the normalizer/coercer.
    pub fn from_csv_str(csv_data: &str) -> Result<Self, ReconError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(csv_data.as_bytes());

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| ReconError::Io(e.to_string()))?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').to_string())
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| ReconError::Io(e.to_string()))?;
            if record.iter().all(|f| f.trim().is_empty()) {
                continue;
            }
            rows.push(record.iter().map(Cell::from).collect());
        }

        Ok(Self { headers, rows })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_csv_basic() {
        let csv = "\
IET #,Description,Qty
A100,Tire 205/55R16,4
B200,,2
";
        let table = Table::from_csv_str(csv).unwrap();
        assert_eq!(table.headers, vec!["IET #", "Description", "Qty"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.cell(0, 0), &Cell::Text("A100".into()));
        assert_eq!(table.cell(1, 1), &Cell::Empty);
        assert_eq!(table.cell(1, 2), &Cell::Text("2".into()));
    }

    #[test]
    fn ragged_rows_and_blank_lines() {
        let csv = "key,qty\nA1\n,\nB2,3\n";
        let table = Table::from_csv_str(csv).unwrap();
        // the all-blank row is skipped
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.cell(0, 1), &Cell::Empty);
        assert_eq!(table.cell(5, 5), &Cell::Empty);
    }

    #[test]
    fn bom_is_stripped_from_first_header() {
        let csv = "\u{feff}SKU,Qty\nX,1\n";
        let table = Table::from_csv_str(csv).unwrap();
        assert_eq!(table.headers[0], "SKU");
    }

    #[test]
    fn cell_emptiness() {
        assert!(Cell::Empty.is_empty());
        assert!(Cell::Text("   ".into()).is_empty());
        assert!(Cell::Float(f64::NAN).is_empty());
        assert!(!Cell::Int(0).is_empty());
        assert_eq!(Cell::Bool(true).to_text(), "TRUE");
    }
}
