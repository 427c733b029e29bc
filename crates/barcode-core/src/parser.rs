//! # Import File Parsing
//!
//! Turns the bytes of an uploaded file into candidate codes.
//!
//! ## Supported Formats
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Extension        Format        Barcode column                          │
//! │  ─────────        ──────        ──────────────                          │
//! │  .csv             Csv           header: barcode|code|ean|upc|gtin|…     │
//! │  .tsv             Tsv           same header rules                       │
//! │  .xlsx / .xls     Spreadsheet   first worksheet, same header rules      │
//! │  anything else    Lines         one code per line                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Parsing is all-or-nothing: any structural problem returns a [`ParseError`]
//! and no candidates. Row-level problems (bad check digit, duplicates) are
//! NOT detected here; the importer deals with them per row.

use std::io::Cursor;

use calamine::Reader;

use crate::error::ParseError;

/// Header names recognised as the barcode column (compared case-insensitively).
pub const BARCODE_HEADERS: &[&str] = &["barcode", "code", "ean", "upc", "gtin", "barcode_number"];

/// A raw code with the 1-based row it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateCode {
    pub row: usize,
    pub raw: String,
}

/// Layout of an import file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Tsv,
    Spreadsheet,
    Lines,
}

impl FileFormat {
    /// Picks the format from a file name's extension.
    pub fn from_file_name(name: &str) -> Self {
        let ext = name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "csv" => FileFormat::Csv,
            "tsv" => FileFormat::Tsv,
            "xlsx" | "xls" | "xlsm" | "ods" => FileFormat::Spreadsheet,
            _ => FileFormat::Lines,
        }
    }
}

/// Parses every candidate code from `bytes`.
///
/// ## Errors
/// - [`ParseError::Empty`] if no candidate was found
/// - any structural [`ParseError`] for the chosen format
pub fn parse_codes(bytes: &[u8], format: FileFormat) -> Result<Vec<CandidateCode>, ParseError> {
    let candidates = match format {
        FileFormat::Csv => parse_delimited(bytes, b',')?,
        FileFormat::Tsv => parse_delimited(bytes, b'\t')?,
        FileFormat::Spreadsheet => parse_spreadsheet(bytes)?,
        FileFormat::Lines => parse_lines(bytes)?,
    };

    if candidates.is_empty() {
        return Err(ParseError::Empty);
    }

    Ok(candidates)
}

fn is_barcode_header(name: &str) -> bool {
    let name = name.trim().to_lowercase().replace([' ', '-'], "_");
    BARCODE_HEADERS.contains(&name.as_str())
}

/// Locates the barcode column.
///
/// Returns `(index, header_is_data)`. A single column whose header looks like
/// a code rather than a label is treated as a headerless list.
fn barcode_column(headers: &[String]) -> Result<(usize, bool), ParseError> {
    if let Some(idx) = headers.iter().position(|h| is_barcode_header(h)) {
        return Ok((idx, false));
    }

    match headers {
        [only] => {
            let looks_like_code = !only.trim().is_empty()
                && only.trim().chars().all(|c| c.is_ascii_digit() || c == '-' || c == ' ');
            Ok((0, looks_like_code))
        }
        _ => Err(ParseError::MissingBarcodeColumn {
            headers: headers.to_vec(),
        }),
    }
}

fn push_candidate(out: &mut Vec<CandidateCode>, row: usize, raw: &str) {
    if !raw.trim().is_empty() {
        out.push(CandidateCode {
            row,
            raw: raw.to_string(),
        });
    }
}

fn parse_delimited(bytes: &[u8], delimiter: u8) -> Result<Vec<CandidateCode>, ParseError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(false)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    if headers.is_empty() {
        return Err(ParseError::Empty);
    }

    let (column, header_is_data) = barcode_column(&headers)?;

    let mut candidates = Vec::new();
    if header_is_data {
        push_candidate(&mut candidates, 1, &headers[column]);
    }

    for (idx, record) in reader.records().enumerate() {
        let record = record?;
        let row = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(idx + 2);
        if let Some(value) = record.get(column) {
            push_candidate(&mut candidates, row, value);
        }
    }

    Ok(candidates)
}

fn parse_spreadsheet(bytes: &[u8]) -> Result<Vec<CandidateCode>, ParseError> {
    let mut workbook = calamine::open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| ParseError::Spreadsheet(e.to_string()))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| ParseError::Spreadsheet("workbook has no worksheets".to_string()))?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| ParseError::Spreadsheet(e.to_string()))?;

    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return Ok(Vec::new());
    };

    let headers: Vec<String> = header_row
        .iter()
        .map(|cell| cell.to_string().trim().to_string())
        .collect();
    let (column, header_is_data) = barcode_column(&headers)?;

    let mut candidates = Vec::new();
    if header_is_data {
        push_candidate(&mut candidates, 1, &headers[column]);
    }

    for (idx, data_row) in rows.enumerate() {
        if let Some(cell) = data_row.get(column) {
            push_candidate(&mut candidates, idx + 2, &cell.to_string());
        }
    }

    Ok(candidates)
}

fn parse_lines(bytes: &[u8]) -> Result<Vec<CandidateCode>, ParseError> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);

    let mut candidates = Vec::new();
    for (idx, line) in bytes.split(|b| *b == b'\n').enumerate() {
        let line = std::str::from_utf8(line)
            .map_err(|_| ParseError::InvalidEncoding { line: idx + 1 })?;
        push_candidate(&mut candidates, idx + 1, line.trim_end_matches('\r'));
    }

    Ok(candidates)
}

// =============================================================================
// Unit Tests
// =============================================================================
