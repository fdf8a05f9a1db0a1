//! In-memory sheet backed by a CSV export.
//!
//! Used for offline runs against a downloaded sheet and as the
//! test double for the writer.

use crate::sheet::{CellRef, RowSink, RowSource, SheetError};
use async_trait::async_trait;
use std::path::Path;
use tracing::debug;

/// Rectangular grid of string cells. Row 1 is the header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemorySheet {
    rows: Vec<Vec<String>>,
}

impl MemorySheet {
    /// Build a sheet from rows, padding short rows with empty cells.
    pub fn from_rows(rows: Vec<Vec<String>>) -> Self {
        let mut sheet = Self { rows };
        sheet.pad_to_width(sheet.width());
        sheet
    }

    /// Load a CSV export. Every record, header included, becomes a row.
    pub fn from_csv_path(path: &Path) -> Result<Self, SheetError> {
        let file = std::fs::File::open(path)?;
        Self::from_csv_reader(file)
    }

    /// Load CSV data from any reader.
    ///
    /// Blank lines are skipped, so row numbers count records rather than
    /// file lines and a saved copy has no blank lines.
    pub fn from_csv_reader<R: std::io::Read>(reader: R) -> Result<Self, SheetError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut rows = Vec::new();
        for record in csv_reader.records() {
            let record = record?;
            rows.push(record.iter().map(String::from).collect());
        }

        debug!("Loaded {} CSV rows", rows.len());
        Ok(Self::from_rows(rows))
    }

    /// Write the grid back out as CSV.
    pub fn save_csv(&self, path: &Path) -> Result<(), SheetError> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(path)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Rows in sheet order, header first.
    #[allow(dead_code)] // Inspection helper
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Value at a cell, if the cell lies inside the grid.
    #[allow(dead_code)] // Inspection helper
    pub fn cell(&self, cell: &CellRef) -> Option<&str> {
        let column = cell.column_index().ok()?;
        self.rows
            .get(cell.row.checked_sub(1)?)?
            .get(column)
            .map(String::as_str)
    }

    fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    fn pad_to_width(&mut self, width: usize) {
        for row in self.rows.iter_mut() {
            if row.len() < width {
                row.resize(width, String::new());
            }
        }
    }
}

#[async_trait]
impl RowSource for MemorySheet {
    async fn fetch_rows(&mut self) -> Result<Vec<Vec<String>>, SheetError> {
        Ok(self.rows.clone())
    }
}

#[async_trait]
impl RowSink for MemorySheet {
    async fn find_row(&mut self, key: &str) -> Result<usize, SheetError> {
        self.rows
            .iter()
            .position(|row| row.iter().any(|value| value == key))
            .map(|index| index + 1)
            .ok_or_else(|| SheetError::NotFound(key.to_string()))
    }

    async fn update_cell(&mut self, cell: &CellRef, value: &str) -> Result<(), SheetError> {
        let column = cell.column_index()?;
        let row = cell
            .row
            .checked_sub(1)
            .ok_or_else(|| SheetError::InvalidCell(cell.to_string()))?;

        if row >= self.rows.len() {
            self.rows.resize(row + 1, Vec::new());
        }
        let width = self.width().max(column + 1);
        self.pad_to_width(width);

        self.rows[row][column] = value.to_string();
        Ok(())
    }
}
