//! Differentiating factor detection.

use crate::models::{Attribute, Study, MAX_DIFFERENTIATING_FACTORS};
use std::collections::HashSet;

/// Attributes taking more than one distinct value across the study, in priority order.
pub fn varying_attributes(study: &Study) -> Vec<Attribute> {
    Attribute::PRIORITY
        .into_iter()
        .filter(|attribute| {
            let distinct: HashSet<&str> = study
                .samples
                .iter()
                .map(|sample| attribute.value_of(sample))
                .collect();
            distinct.len() > 1
        })
        .collect()
}

/// Fill in each sample's differentiating factors.
///
/// A sample's factors are its own values for the varying attributes, in
/// priority order, cut to [`MAX_DIFFERENTIATING_FACTORS`]. When all four
/// attributes vary the genotype is dropped.
pub fn find_differentiating_factors(study: &mut Study) {
    let varying = varying_attributes(study);

    for sample in study.samples.iter_mut() {
        let factors: Vec<String> = varying
            .iter()
            .map(|attribute| attribute.value_of(sample).to_string())
            .take(MAX_DIFFERENTIATING_FACTORS)
            .collect();
        sample.differentiating_factors = factors;
    }
}
