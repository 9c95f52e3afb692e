use chrono::NaiveDate;
use ramburs_core::Money;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

use crate::util::normalize_header;

/// One data row keyed by the header text exactly as it appears in the file.
pub type Row = HashMap<String, String>;

/// A spreadsheet or report export reduced to headers plus string cells.
#[derive(Debug, Clone, Default)]
pub struct TabularExtract {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

impl TabularExtract {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The first non-empty cell for `column` in any row; used for report-level
    /// fields that repeat on every line (reporting month, period bounds).
    pub fn first_value(&self, column: &str) -> Option<&str> {
        self.rows
            .iter()
            .filter_map(|r| r.get(column))
            .map(|v| v.trim())
            .find(|v| !v.is_empty())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    /// Sniffed from the first line when unset.
    pub delimiter: Option<u8>,
    /// Header candidates used to find the header row below a preamble. With
    /// no hints the first record is the header.
    pub header_hints: Vec<String>,
}

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("No header row found in {0}")]
    NoHeader(String),
    #[error("Invalid date format: {0}")]
    InvalidDate(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
}

pub fn read_extract<R: Read>(
    name: &str,
    mut data: R,
    options: &ReadOptions,
) -> Result<TabularExtract, ExtractError> {
    let mut raw = Vec::new();
    data.read_to_end(&mut raw)?;
    // Excel exports often start with a UTF-8 BOM.
    let raw = raw.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(&raw[..]);

    let delimiter = options.delimiter.unwrap_or_else(|| sniff_delimiter(raw));
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(raw);

    let records: Vec<csv::StringRecord> = reader.records().collect::<Result<_, _>>()?;
    let header_idx = find_header_row(&records, &options.header_hints)
        .ok_or_else(|| ExtractError::NoHeader(name.to_string()))?;

    let headers: Vec<String> = records[header_idx]
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let rows = records[header_idx + 1..]
        .iter()
        .filter(|r| r.iter().any(|cell| !cell.trim().is_empty()))
        .map(|r| {
            headers
                .iter()
                .zip(r.iter())
                .filter(|(h, _)| !h.is_empty())
                .map(|(h, v)| (h.clone(), v.trim().to_string()))
                .collect::<Row>()
        })
        .collect();

    Ok(TabularExtract {
        name: name.to_string(),
        headers,
        rows,
    })
}

pub fn read_extract_file(path: &Path, options: &ReadOptions) -> Result<TabularExtract, ExtractError> {
    let file = std::fs::File::open(path)?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();
    read_extract(&name, file, options)
}

fn sniff_delimiter(raw: &[u8]) -> u8 {
    let first_line = raw.split(|b| *b == b'\n').next().unwrap_or_default();
    [b';', b'\t', b',']
        .into_iter()
        .max_by_key(|d| first_line.iter().filter(|b| *b == d).count())
        .filter(|d| first_line.contains(d))
        .unwrap_or(b',')
}

fn find_header_row(records: &[csv::StringRecord], hints: &[String]) -> Option<usize> {
    let first_non_empty = records
        .iter()
        .position(|r| r.iter().any(|c| !c.trim().is_empty()))?;
    if hints.is_empty() {
        return Some(first_non_empty);
    }

    let hints: Vec<String> = hints.iter().map(|h| normalize_header(h)).collect();
    records
        .iter()
        .position(|r| {
            r.iter()
                .map(normalize_header)
                .filter(|cell| !cell.is_empty())
                .filter(|cell| hints.iter().any(|h| cell == h || cell.contains(h.as_str())))
                .count()
                >= 2
        })
        .or(Some(first_non_empty))
}

/// Dates as they appear in Romanian bank and courier exports. A trailing time
/// component is ignored.
pub fn parse_date(s: &str) -> Result<NaiveDate, ExtractError> {
    let s = s.trim();
    let date_part = s.split([' ', 'T']).next().unwrap_or(s);

    for fmt in &["%d.%m.%Y", "%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d", "%Y.%m.%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(date_part, fmt) {
            return Ok(date);
        }
    }

    Err(ExtractError::InvalidDate(s.to_string()))
}

/// Parses both `1,234.56` and `1.234,56` layouts, accounting parentheses and
/// currency markers.
pub fn parse_amount(s: &str) -> Result<Money, ExtractError> {
    let original = s.trim();
    let (negative, s) = if original.starts_with('(') && original.ends_with(')') {
        (true, &original[1..original.len() - 1])
    } else {
        (false, original)
    };

    let mut cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-' | '+'))
        .collect();

    let last_dot = cleaned.rfind('.');
    let last_comma = cleaned.rfind(',');
    cleaned = match (last_dot, last_comma) {
        (Some(d), Some(c)) if c > d => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (None, Some(c)) => {
            let decimals = cleaned.len() - c - 1;
            if cleaned.matches(',').count() == 1 && decimals <= 2 {
                cleaned.replace(',', ".")
            } else {
                cleaned.replace(',', "")
            }
        }
        (Some(_), None) if cleaned.matches('.').count() > 1 => cleaned.replace('.', ""),
        _ => cleaned,
    };

    let mut dec =
        Decimal::from_str(&cleaned).map_err(|_| ExtractError::InvalidAmount(original.to_string()))?;
    if negative {
        dec = -dec;
    }
    Ok(Money::from_decimal(dec))
}
