//! Experiment group assignment.

use crate::models::Study;
use std::collections::HashMap;
use tracing::warn;

/// Number of groups that get a letter from `A` to `Z`.
pub const LETTERED_GROUPS: usize = 26;

/// Label for the `index`-th distinct factor sequence, starting at "Group A".
///
/// Past `Z` the label continues with the code points following `Z`.
pub fn group_label(index: usize) -> String {
    let letter = u32::try_from(index)
        .ok()
        .and_then(|offset| offset.checked_add(u32::from(b'A')))
        .and_then(char::from_u32)
        .unwrap_or(char::REPLACEMENT_CHARACTER);
    format!("Group {}", letter)
}

/// Give every sample the label of its exact factor sequence.
///
/// Sequences are labelled in order of first appearance. Two samples share a
/// group only when their factors match element by element, in the same order.
/// Returns the number of distinct groups.
pub fn assign_experiment_groups(study: &mut Study) -> usize {
    let mut labels: HashMap<Vec<String>, String> = HashMap::new();

    for sample in study.samples.iter_mut() {
        let next = labels.len();
        let label = labels
            .entry(sample.differentiating_factors.clone())
            .or_insert_with(|| group_label(next));
        sample.experiment_group = label.clone();
    }

    if labels.len() > LETTERED_GROUPS {
        warn!(
            "Study {} has {} experiment groups; labels past Group Z are not letters",
            study.study_accession,
            labels.len()
        );
    }

    labels.len()
}
