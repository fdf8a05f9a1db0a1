//! Data models for the sample annotator.
//!
//! This module contains the core records built by the loader,
//! filled in by the annotator and read back by the writer.

use crate::analysis::{AnnotationSummary, StudySummary};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Most differentiating factors surfaced per sample (one per factor column).
pub const MAX_DIFFERENTIATING_FACTORS: usize = 3;

/// Experimental attributes that may distinguish samples within a study.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    StressIntensity,
    Tissue,
    Age,
    Genotype,
}

impl Attribute {
    /// Tracked attributes in factor priority order.
    pub const PRIORITY: [Attribute; 4] = [
        Attribute::StressIntensity,
        Attribute::Tissue,
        Attribute::Age,
        Attribute::Genotype,
    ];

    /// Returns the sample's value for this attribute.
    pub fn value_of<'a>(&self, sample: &'a Sample) -> &'a str {
        match self {
            Attribute::StressIntensity => &sample.stress_intensity,
            Attribute::Tissue => &sample.tissue,
            Attribute::Age => &sample.age,
            Attribute::Genotype => &sample.genotype,
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attribute::StressIntensity => write!(f, "Stress intensity"),
            Attribute::Tissue => write!(f, "Tissue"),
            Attribute::Age => write!(f, "Age"),
            Attribute::Genotype => write!(f, "Genotype"),
        }
    }
}

/// One experimental observation, built from a single sheet row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Sample accession, unique across the sheet.
    pub sample_accession: String,
    pub stress_type: String,
    pub stress_intensity: String,
    pub stress_duration: String,
    /// True when the row is marked as a control sample.
    pub is_control: bool,
    pub tissue: String,
    pub age: String,
    pub genotype: String,
    /// Experiment group label ("Group A", ...). Empty until annotated.
    #[serde(default)]
    pub experiment_group: String,
    /// Values of the attributes that vary within the study, in priority order.
    #[serde(default)]
    pub differentiating_factors: Vec<String>,
}

impl Sample {
    /// Creates a sample with no annotations yet.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sample_accession: impl Into<String>,
        stress_type: impl Into<String>,
        stress_intensity: impl Into<String>,
        stress_duration: impl Into<String>,
        is_control: bool,
        tissue: impl Into<String>,
        age: impl Into<String>,
        genotype: impl Into<String>,
    ) -> Self {
        Self {
            sample_accession: sample_accession.into(),
            stress_type: stress_type.into(),
            stress_intensity: stress_intensity.into(),
            stress_duration: stress_duration.into(),
            is_control,
            tissue: tissue.into(),
            age: age.into(),
            genotype: genotype.into(),
            experiment_group: String::new(),
            differentiating_factors: Vec::new(),
        }
    }

    /// Whether the annotator has assigned a group yet.
    pub fn is_annotated(&self) -> bool {
        !self.experiment_group.is_empty()
    }
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Sample {} under {} stress {} intensity for {} hours, taken from {} of {} plant of {}",
            self.sample_accession,
            self.stress_type,
            self.stress_intensity,
            self.stress_duration,
            self.tissue,
            self.age,
            self.genotype
        )?;
        if self.is_annotated() {
            write!(f, " ({})", self.experiment_group)?;
        }
        Ok(())
    }
}

/// Samples sharing one study accession, in sheet row order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Study {
    pub study_accession: String,
    pub samples: Vec<Sample>,
}

impl Study {
    /// Creates an empty study.
    pub fn new(study_accession: impl Into<String>) -> Self {
        Self {
            study_accession: study_accession.into(),
            samples: Vec::new(),
        }
    }
}

impl fmt::Display for Study {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Study {} with {} samples",
            self.study_accession,
            self.samples.len()
        )
    }
}

/// Metadata about an annotation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Spreadsheet ID or local file the rows came from.
    pub source: String,
    /// When the run started.
    pub run_date: DateTime<Utc>,
    /// Whether annotations were written back.
    pub written: bool,
    /// Cells written, zero on a dry run.
    pub cells_written: usize,
    /// Duration of the run in seconds.
    pub duration_seconds: f64,
}

/// The complete annotation report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub summary: AnnotationSummary,
    pub studies: Vec<StudySummary>,
    /// Annotated samples, grouped by study.
    pub samples: Vec<Study>,
}
