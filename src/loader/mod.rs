//! Sheet row loader.
//!
//! This module turns raw sheet rows into studies, bucketing samples
//! by study accession while preserving first-seen order.

use crate::models::{Sample, Study};
use std::collections::HashMap;
use tracing::debug;

/// Value of the control column that marks a control sample.
pub const CONTROL_MARKER: &str = "Control";

/// Zero-based column positions of the fields read from each row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowLayout {
    pub study_accession: usize,
    pub sample_accession: usize,
    pub stress_type: usize,
    pub stress_intensity: usize,
    pub stress_duration: usize,
    pub control: usize,
    pub tissue: usize,
    pub age: usize,
    pub genotype: usize,
}

impl Default for RowLayout {
    fn default() -> Self {
        Self {
            study_accession: 6,
            sample_accession: 24,
            stress_type: 17,
            stress_intensity: 19,
            stress_duration: 20,
            control: 21,
            tissue: 29,
            age: 30,
            genotype: 31,
        }
    }
}

impl From<&crate::config::LayoutConfig> for RowLayout {
    fn from(config: &crate::config::LayoutConfig) -> Self {
        Self {
            study_accession: config.study_accession,
            sample_accession: config.sample_accession,
            stress_type: config.stress_type,
            stress_intensity: config.stress_intensity,
            stress_duration: config.stress_duration,
            control: config.control,
            tissue: config.tissue,
            age: config.age,
            genotype: config.genotype,
        }
    }
}

impl RowLayout {
    /// Number of fields a row needs for every position to be present.
    pub fn width(&self) -> usize {
        [
            self.study_accession,
            self.sample_accession,
            self.stress_type,
            self.stress_intensity,
            self.stress_duration,
            self.control,
            self.tissue,
            self.age,
            self.genotype,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
            + 1
    }

    /// Builds a sample from one row. Fields past the end of the row read as empty.
    pub fn sample_from_row(&self, row: &[String]) -> Sample {
        let field = |index: usize| row.get(index).map(String::as_str).unwrap_or("");

        Sample::new(
            field(self.sample_accession),
            field(self.stress_type),
            field(self.stress_intensity),
            field(self.stress_duration),
            field(self.control) == CONTROL_MARKER,
            field(self.tissue),
            field(self.age),
            field(self.genotype),
        )
    }

    /// Returns the study accession of a row.
    pub fn study_of<'a>(&self, row: &'a [String]) -> &'a str {
        row.get(self.study_accession)
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// Bucket rows into studies. Header rows must already be stripped.
///
/// Studies appear in the order their accession is first seen; samples keep
/// row order within their study.
pub fn load_studies(rows: &[Vec<String>], layout: &RowLayout) -> Vec<Study> {
    let mut studies: Vec<Study> = Vec::new();
    let mut index_by_accession: HashMap<String, usize> = HashMap::new();

    for row in rows {
        let accession = layout.study_of(row);

        let index = match index_by_accession.get(accession) {
            Some(&index) => index,
            None => {
                debug!("New study: {}", accession);
                studies.push(Study::new(accession));
                index_by_accession.insert(accession.to_string(), studies.len() - 1);
                studies.len() - 1
            }
        };

        studies[index].samples.push(layout.sample_from_row(row));
    }

    debug!("Loaded {} rows into {} studies", rows.len(), studies.len());
    studies
}
