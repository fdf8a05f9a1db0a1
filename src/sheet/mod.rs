//! Spreadsheet backends.
//!
//! The annotator only needs two capabilities from a spreadsheet: reading
//! every row, and writing single cells on the row holding a given sample.
//! Both are traits so the pipeline runs the same against Google Sheets
//! or an in-memory grid.

pub mod client;
pub mod memory;

pub use client::{Credentials, SheetsClient, SheetsConfig, WorksheetSelector};
pub use memory::MemorySheet;

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

/// Errors raised by spreadsheet backends.
#[derive(Error, Debug)]
pub enum SheetError {
    /// No cell in the sheet holds the key.
    #[error("No cell matching '{0}' found in the sheet")]
    NotFound(String),

    /// Cell reference is not in A1 notation.
    #[error("Invalid cell reference '{0}'")]
    InvalidCell(String),

    /// Worksheet could not be resolved.
    #[error("Worksheet not found: {0}")]
    UnknownWorksheet(String),

    /// Spreadsheet API base URL cannot carry a path.
    #[error("Invalid API URL: {0}")]
    InvalidUrl(String),

    /// No usable credentials were available.
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    /// Service-account key was rejected or the token exchange failed.
    #[error("Google authentication failed: {0}")]
    Auth(#[from] gcp_auth::Error),

    /// HTTP transport failure.
    #[error("Request to Google Sheets failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Sheets API answered with an error status.
    #[error("Google Sheets API error {status}: {body}")]
    Api { status: u16, body: String },

    /// Local file could not be read or written.
    #[error("Spreadsheet file error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV export could not be parsed or written.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Source of sheet rows, header included.
#[async_trait]
pub trait RowSource {
    /// Fetch every row of the worksheet, in sheet order.
    async fn fetch_rows(&mut self) -> Result<Vec<Vec<String>>, SheetError>;
}

/// Writable sheet with lookup by cell value.
#[async_trait]
pub trait RowSink {
    /// 1-based row number of the first cell equal to `key`, scanning row by row.
    async fn find_row(&mut self, key: &str) -> Result<usize, SheetError>;

    /// Write `value` into the cell at `cell`.
    async fn update_cell(&mut self, cell: &CellRef, value: &str) -> Result<(), SheetError>;
}

/// Cell address in A1 notation: column letters plus a 1-based row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CellRef {
    pub column: String,
    pub row: usize,
}

impl CellRef {
    pub fn new(column: impl Into<String>, row: usize) -> Self {
        Self {
            column: column.into(),
            row,
        }
    }

    /// Parse a reference such as `AQ12`.
    #[allow(dead_code)] // Used by tests and sheet inspection
    pub fn parse(reference: &str) -> Result<Self, SheetError> {
        let invalid = || SheetError::InvalidCell(reference.to_string());

        let split = reference
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(invalid)?;
        let (column, row) = reference.split_at(split);

        if column.is_empty() || !column.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(invalid());
        }
        let row: usize = row.parse().map_err(|_| invalid())?;
        if row == 0 {
            return Err(invalid());
        }

        Ok(Self::new(column.to_ascii_uppercase(), row))
    }

    /// Zero-based column index (`A` is 0, `AQ` is 42).
    pub fn column_index(&self) -> Result<usize, SheetError> {
        column_index(&self.column)
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.column, self.row)
    }
}

/// Zero-based index of a column given in letters.
pub fn column_index(column: &str) -> Result<usize, SheetError> {
    if column.is_empty() {
        return Err(SheetError::InvalidCell(column.to_string()));
    }

    let mut index = 0usize;
    for c in column.chars() {
        if !c.is_ascii_alphabetic() {
            return Err(SheetError::InvalidCell(column.to_string()));
        }
        let digit = (c.to_ascii_uppercase() as u8 - b'A') as usize + 1;
        index = index
            .checked_mul(26)
            .and_then(|i| i.checked_add(digit))
            .ok_or_else(|| SheetError::InvalidCell(column.to_string()))?;
    }

    Ok(index - 1)
}

/// Rows below the header row.
pub fn data_rows(rows: &[Vec<String>]) -> &[Vec<String>] {
    rows.get(1..).unwrap_or(&[])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_index() {
        assert_eq!(column_index("A").unwrap(), 0);
        assert_eq!(column_index("Z").unwrap(), 25);
        assert_eq!(column_index("AA").unwrap(), 26);
        assert_eq!(column_index("AQ").unwrap(), 42);
        assert_eq!(column_index("at").unwrap(), 45);
        assert!(column_index("").is_err());
        assert!(column_index("A1").is_err());
    }

    #[test]
    fn test_cell_ref_parse() {
        let cell = CellRef::parse("AQ12").unwrap();
        assert_eq!(cell, CellRef::new("AQ", 12));
        assert_eq!(cell.to_string(), "AQ12");
        assert_eq!(CellRef::parse("ar3").unwrap().column, "AR");
    }

    #[test]
    fn test_cell_ref_parse_invalid() {
        assert!(CellRef::parse("AQ").is_err());
        assert!(CellRef::parse("12").is_err());
        assert!(CellRef::parse("AQ0").is_err());
        assert!(CellRef::parse("A-1").is_err());
    }

    #[test]
    fn test_data_rows_skips_header() {
        let rows = vec![vec!["header".to_string()], vec!["value".to_string()]];
        assert_eq!(data_rows(&rows), &rows[1..]);
        assert!(data_rows(&[]).is_empty());
    }
}
