//! Tabular loading for uploaded price lists.
//!
//! Provides the `GridLoader` trait and its two implementations:
//! - `SpreadsheetLoader`: `.xlsx` workbooks with a header at a fixed row offset
//! - `DelimitedLoader`: text files with a sniffed field separator
//!
//! Both produce a `RawTable` of untyped cells. Column mapping and type
//! coercion happen downstream.

use calamine::{Data, Reader, Xlsx};
use sadio_model::{Cell, RawTable};
use std::io::Cursor;
use thiserror::Error;

/// Errors from loading an uploaded file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("File is not valid UTF-8 text: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("Delimited parse failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("Spreadsheet could not be read: {0}")]
    Spreadsheet(#[from] calamine::XlsxError),

    #[error("Workbook has no worksheet at index {0}")]
    MissingSheet(usize),

    #[error("File has no columns to parse")]
    Empty,

    #[error("File too small: found {found} rows, at least {required} required")]
    TooFewRows { found: usize, required: usize },
}

/// Kind of uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Delimited,
    Spreadsheet,
}

impl SourceKind {
    /// `.xlsx` files are spreadsheets, anything else is delimited text.
    pub fn from_file_name(name: &str) -> Self {
        if name.to_lowercase().ends_with(".xlsx") {
            Self::Spreadsheet
        } else {
            Self::Delimited
        }
    }
}

/// Trait for file formats that can be read into a `RawTable`.
pub trait GridLoader {
    /// Read the uploaded bytes.
    fn load(&self, bytes: &[u8]) -> Result<RawTable, LoadError>;

    /// Loader name for logging.
    fn name(&self) -> &'static str;
}

/// Layout assumptions for supplier workbooks.
#[derive(Debug, Clone)]
pub struct SpreadsheetConfig {
    /// Zero-based row holding the real header
    pub header_row: usize,
    /// Minimum number of rows in the sheet
    pub min_rows: usize,
    /// Discard the last data row (summary/footer line)
    pub drop_footer: bool,
    /// Worksheet to read
    pub sheet_index: usize,
}

impl Default for SpreadsheetConfig {
    fn default() -> Self {
        Self {
            header_row: 2,
            min_rows: 4,
            drop_footer: true,
            sheet_index: 0,
        }
    }
}

/// Spreadsheet (`.xlsx`) loader.
#[derive(Debug, Clone, Default)]
pub struct SpreadsheetLoader {
    config: SpreadsheetConfig,
}

impl SpreadsheetLoader {
    pub fn new(config: SpreadsheetConfig) -> Self {
        Self { config }
    }

    /// Read the configured worksheet as a grid anchored at cell A1.
    fn read_grid(&self, bytes: &[u8]) -> Result<Vec<Vec<Cell>>, LoadError> {
        let mut workbook: Xlsx<_> = calamine::open_workbook_from_rs(Cursor::new(bytes))?;
        let range = workbook
            .worksheet_range_at(self.config.sheet_index)
            .ok_or(LoadError::MissingSheet(self.config.sheet_index))??;

        // calamine ranges start at the first used cell
        let (row_offset, col_offset) = range.start().unwrap_or((0, 0));
        let mut grid = vec![Vec::new(); row_offset as usize];
        for row in range.rows() {
            let mut cells = vec![Cell::Empty; col_offset as usize];
            cells.extend(row.iter().map(cell_from_data));
            grid.push(cells);
        }

        tracing::info!(
            rows = grid.len(),
            columns = grid.iter().map(Vec::len).max().unwrap_or(0),
            "Spreadsheet read"
        );
        Ok(grid)
    }
}

impl GridLoader for SpreadsheetLoader {
    fn load(&self, bytes: &[u8]) -> Result<RawTable, LoadError> {
        let grid = self.read_grid(bytes)?;
        shape_spreadsheet_grid(grid, &self.config)
    }

    fn name(&self) -> &'static str {
        "spreadsheet"
    }
}

fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::Int(v) => Cell::Number(*v as f64),
        Data::Float(v) => Cell::Number(*v),
        Data::String(v) => Cell::text(v.as_str()),
        Data::Bool(v) => Cell::Text(if *v { "True" } else { "False" }.to_string()),
        Data::DateTime(v) => Cell::Text(v.to_string()),
        Data::DateTimeIso(v) | Data::DurationIso(v) => Cell::text(v.as_str()),
    }
}

/// Cut a raw sheet grid into header and data rows.
///
/// The header is `config.header_row`; data starts on the following row and,
/// when `drop_footer` is set, the last row is discarded unconditionally.
/// Rows with no value in any column are removed.
pub fn shape_spreadsheet_grid(
    mut grid: Vec<Vec<Cell>>,
    config: &SpreadsheetConfig,
) -> Result<RawTable, LoadError> {
    let required = config.min_rows.max(config.header_row.saturating_add(1));
    let too_few = LoadError::TooFewRows {
        found: grid.len(),
        required,
    };
    if grid.len() < required {
        return Err(too_few);
    }

    let mut rows: Vec<Vec<Cell>> = grid.split_off(config.header_row + 1);
    let Some(header) = grid.pop() else {
        return Err(too_few);
    };
    let headers: Vec<String> = header
        .iter()
        .map(|cell| cell.to_text().trim().to_string())
        .collect();

    if config.drop_footer && rows.pop().is_some() {
        tracing::debug!("Footer row removed");
    }
    rows.retain(|row| !row.iter().all(Cell::is_empty));

    tracing::info!(rows = rows.len(), columns = ?headers, "Spreadsheet processed");
    Ok(RawTable::new(headers, rows))
}

/// Separator sniffing and numeric locale for delimited text.
#[derive(Debug, Clone)]
pub struct DelimitedConfig {
    /// Candidate separators, tried in order
    pub separators: Vec<u8>,
    pub decimal: char,
    pub thousands: char,
}

impl Default for DelimitedConfig {
    fn default() -> Self {
        Self {
            separators: vec![b',', b';', b'\t'],
            decimal: ',',
            thousands: '.',
        }
    }
}

/// Markers read as missing values.
const NA_VALUES: &[&str] = &["NA", "N/A", "#N/A", "NaN", "nan", "NULL", "null"];

/// Delimited text loader.
#[derive(Debug, Clone, Default)]
pub struct DelimitedLoader {
    config: DelimitedConfig,
}

impl DelimitedLoader {
    pub fn new(config: DelimitedConfig) -> Self {
        Self { config }
    }

    /// Parse with one separator. `locale` enables the configured
    /// decimal/thousands convention; otherwise plain dot-decimal numbers.
    fn parse_with(&self, text: &str, separator: u8, locale: bool) -> Result<RawTable, LoadError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(separator)
            .has_headers(false)
            .flexible(true)
            .from_reader(text.as_bytes());

        let mut records = reader.records();
        let headers: Vec<String> = match records.next() {
            Some(record) => record?.iter().map(|h| h.trim().to_string()).collect(),
            None => return Err(LoadError::Empty),
        };

        let mut rows = Vec::new();
        for record in records {
            let record = record?;
            rows.push(record.iter().map(|raw| self.cell(raw, locale)).collect());
        }

        Ok(RawTable::new(headers, rows))
    }

    fn cell(&self, raw: &str, locale: bool) -> Cell {
        let trimmed = raw.trim();
        if raw.is_empty() || NA_VALUES.contains(&trimmed) {
            return Cell::Empty;
        }
        if has_leading_zero(trimmed) {
            return Cell::text(raw);
        }
        let number = if locale {
            parse_locale_number(trimmed, self.config.decimal, self.config.thousands)
        } else {
            parse_plain_number(trimmed)
        };
        match number {
            Some(n) => Cell::Number(n),
            None => Cell::text(raw),
        }
    }
}

impl GridLoader for DelimitedLoader {
    fn load(&self, bytes: &[u8]) -> Result<RawTable, LoadError> {
        let text = std::str::from_utf8(bytes)?;
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);

        for &separator in &self.config.separators {
            match self.parse_with(text, separator, true) {
                Ok(table) if table.headers.len() > 1 => {
                    tracing::info!(
                        separator = %(separator as char).escape_default(),
                        rows = table.len(),
                        "Delimiter detected"
                    );
                    return Ok(table);
                }
                Ok(_) => {
                    tracing::debug!(separator = %(separator as char).escape_default(), "Single column, trying next separator");
                }
                Err(e) => {
                    tracing::debug!(separator = %(separator as char).escape_default(), error = %e, "Separator candidate failed");
                }
            }
        }

        tracing::warn!("No separator produced more than one column, using default parse");
        self.parse_with(text, b',', false)
    }

    fn name(&self) -> &'static str {
        "delimited"
    }
}

/// Load an upload with the default configuration for its kind.
pub fn load(bytes: &[u8], kind: SourceKind) -> Result<RawTable, LoadError> {
    loader_for(kind, SpreadsheetConfig::default(), DelimitedConfig::default()).load(bytes)
}

/// Build the loader for a kind of file.
pub fn loader_for(
    kind: SourceKind,
    spreadsheet: SpreadsheetConfig,
    delimited: DelimitedConfig,
) -> Box<dyn GridLoader> {
    match kind {
        SourceKind::Spreadsheet => Box::new(SpreadsheetLoader::new(spreadsheet)),
        SourceKind::Delimited => Box::new(DelimitedLoader::new(delimited)),
    }
}

/// Parse a number written with the given decimal and thousands marks.
///
/// Thousands marks must separate groups of exactly three digits, so
/// `1.234,5` parses but `1.05` does not (with `decimal = ','`).
pub fn parse_locale_number(text: &str, decimal: char, thousands: char) -> Option<f64> {
    let (sign, body) = match text.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", text.strip_prefix('+').unwrap_or(text)),
    };
    let (int_part, frac_part) = match body.split_once(decimal) {
        Some((int_part, frac)) => (int_part, Some(frac)),
        None => (body, None),
    };

    if let Some(frac) = frac_part {
        if frac.is_empty() || !frac.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
    }
    if int_part.is_empty() {
        if frac_part.is_none() {
            return None;
        }
    } else if !valid_grouping(int_part, thousands) {
        return None;
    }

    let digits: String = int_part.chars().filter(|c| *c != thousands).collect();
    let normalized = match frac_part {
        Some(frac) => format!("{sign}{}.{frac}", if digits.is_empty() { "0" } else { &digits }),
        None => format!("{sign}{digits}"),
    };
    normalized.parse().ok()
}

fn valid_grouping(int_part: &str, thousands: char) -> bool {
    let groups: Vec<&str> = int_part.split(thousands).collect();
    let digits_only = groups
        .iter()
        .all(|g| !g.is_empty() && g.chars().all(|c| c.is_ascii_digit()));
    digits_only && (groups.len() == 1 || (groups[0].len() <= 3 && groups[1..].iter().all(|g| g.len() == 3)))
}

fn parse_plain_number(text: &str) -> Option<f64> {
    let plain = text
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'));
    if !plain || !text.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    text.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Digit strings like `0789` are identifiers, not numbers.
fn has_leading_zero(text: &str) -> bool {
    let mut chars = text.chars();
    matches!((chars.next(), chars.next()), (Some('0'), Some(c)) if c.is_ascii_digit())
}
