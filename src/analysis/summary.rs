//! Annotation statistics.
//!
//! This module condenses annotated studies into the per-study and
//! run-wide figures shown in reports and on the console.

use crate::analysis::varying_attributes;
use crate::models::{Attribute, Study};
use serde::{Deserialize, Serialize};

/// One experiment group within a study.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub label: String,
    pub factors: Vec<String>,
    pub samples: usize,
}

/// Figures for a single annotated study.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudySummary {
    pub study_accession: String,
    pub samples: usize,
    pub controls: usize,
    pub varying_attributes: Vec<Attribute>,
    /// Groups in label order.
    pub groups: Vec<GroupSummary>,
}

impl StudySummary {
    /// Summarize an annotated study.
    pub fn from_study(study: &Study) -> Self {
        let mut groups: Vec<GroupSummary> = Vec::new();

        for sample in &study.samples {
            match groups
                .iter_mut()
                .find(|g| g.label == sample.experiment_group)
            {
                Some(group) => group.samples += 1,
                None => groups.push(GroupSummary {
                    label: sample.experiment_group.clone(),
                    factors: sample.differentiating_factors.clone(),
                    samples: 1,
                }),
            }
        }

        Self {
            study_accession: study.study_accession.clone(),
            samples: study.samples.len(),
            controls: study.samples.iter().filter(|s| s.is_control).count(),
            varying_attributes: varying_attributes(study),
            groups,
        }
    }

    /// True when more attributes vary than there are factor columns.
    pub fn is_truncated(&self) -> bool {
        self.varying_attributes.len() > crate::models::MAX_DIFFERENTIATING_FACTORS
    }
}

/// Run-wide totals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnotationSummary {
    pub studies: usize,
    pub samples: usize,
    pub controls: usize,
    pub groups: usize,
    /// Studies where one varying attribute could not be written.
    pub truncated_studies: usize,
}

impl AnnotationSummary {
    /// Totals over a set of study summaries.
    pub fn from_studies(studies: &[StudySummary]) -> Self {
        let mut summary = Self {
            studies: studies.len(),
            ..Self::default()
        };

        for study in studies {
            summary.samples += study.samples;
            summary.controls += study.controls;
            summary.groups += study.groups.len();
            if study.is_truncated() {
                summary.truncated_studies += 1;
            }
        }

        summary
    }
}

/// Summaries for all studies, keeping study order.
pub fn summarize(studies: &[Study]) -> Vec<StudySummary> {
    studies.iter().map(StudySummary::from_study).collect()
}

/// Studies with the most experiment groups, largest first.
pub fn most_grouped_studies(studies: &[StudySummary], n: usize) -> Vec<&StudySummary> {
    let mut ranked: Vec<&StudySummary> = studies.iter().filter(|s| s.groups.len() > 1).collect();
    ranked.sort_by_key(|s| std::cmp::Reverse(s.groups.len()));
    ranked.truncate(n);
    ranked
}
