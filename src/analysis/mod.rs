//! Study annotation.
//!
//! Each study is annotated in two passes: first the differentiating
//! factors of every sample, then the experiment group derived from them.

pub mod factors;
pub mod groups;
pub mod summary;

pub use factors::*;
pub use groups::*;
pub use summary::*;

use crate::models::Study;
use tracing::debug;

/// Annotate every study in place: factors first, then groups.
pub fn annotate_all(studies: &mut [Study]) {
    for study in studies.iter_mut() {
        find_differentiating_factors(study);
        assign_experiment_groups(study);
        debug!("{}", study);
        for sample in &study.samples {
            debug!("  {}", sample);
        }
    }
}
