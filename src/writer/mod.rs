//! Writes annotations back to the sheet.
//!
//! Every sample costs one row lookup and one to four cell writes. The
//! Sheets API enforces a per-minute write quota, so the writer waits a
//! fixed delay before each sample.

use crate::models::{Study, MAX_DIFFERENTIATING_FACTORS};
use crate::sheet::{CellRef, RowSink, SheetError};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing::{debug, info};

/// Destination columns for the annotations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    /// Column receiving the experiment group label.
    pub group: String,
    /// Columns receiving the differentiating factors, in factor order.
    pub factors: [String; MAX_DIFFERENTIATING_FACTORS],
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            group: "AQ".to_string(),
            factors: ["AR".to_string(), "AS".to_string(), "AT".to_string()],
        }
    }
}

impl From<&crate::config::ColumnsConfig> for ColumnMap {
    fn from(config: &crate::config::ColumnsConfig) -> Self {
        Self {
            group: config.group.clone(),
            factors: config.factors.clone(),
        }
    }
}

/// Delays imposed to stay under the API write quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pacing {
    /// Pause once before the first write.
    pub initial_delay: Duration,
    /// Pause before each sample.
    pub per_sample_delay: Duration,
}

/// Outcome of a write pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteSummary {
    pub samples: usize,
    pub cells: usize,
}

/// Push group labels and factors for every sample to the sink.
///
/// Samples are written in study order, then sample order. A sample with
/// fewer than three factors leaves the remaining factor columns untouched.
/// The first failing lookup or write aborts the pass; cells already
/// written stay written.
pub async fn write_annotations<S>(
    studies: &[Study],
    sink: &mut S,
    columns: &ColumnMap,
    pacing: Pacing,
    show_progress: bool,
) -> Result<WriteSummary, SheetError>
where
    S: RowSink + Send + ?Sized,
{
    let total: usize = studies.iter().map(|s| s.samples.len()).sum();
    let mut summary = WriteSummary::default();

    if total == 0 {
        info!("No samples to write");
        return Ok(summary);
    }

    if !pacing.initial_delay.is_zero() {
        println!(
            "⏳ Waiting {}s for the API write quota to reset...",
            pacing.initial_delay.as_secs()
        );
        tokio::time::sleep(pacing.initial_delay).await;
    }

    let progress = if show_progress {
        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb
    } else {
        ProgressBar::hidden()
    };

    for study in studies {
        for sample in &study.samples {
            progress.set_message(sample.sample_accession.clone());

            if !pacing.per_sample_delay.is_zero() {
                debug!(
                    "Sleeping {:?} before writing {}",
                    pacing.per_sample_delay, sample.sample_accession
                );
                tokio::time::sleep(pacing.per_sample_delay).await;
            }

            let row = sink.find_row(&sample.sample_accession).await?;

            sink.update_cell(&CellRef::new(columns.group.as_str(), row), &sample.experiment_group)
                .await?;
            summary.cells += 1;

            for (column, factor) in columns.factors.iter().zip(&sample.differentiating_factors) {
                sink.update_cell(&CellRef::new(column.as_str(), row), factor)
                    .await?;
                summary.cells += 1;
            }

            debug!(
                "Wrote {} ({}) to row {}",
                sample.sample_accession, sample.experiment_group, row
            );
            summary.samples += 1;
            progress.inc(1);
        }
    }

    progress.finish_with_message("done");
    info!(
        "Wrote {} cells for {} samples",
        summary.cells, summary.samples
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::annotate_all;
    use crate::models::Sample;
    use crate::sheet::MemorySheet;

    fn sheet_with_ids(ids: &[&str]) -> MemorySheet {
        let mut rows = vec![vec!["Sample Accession".to_string()]];
        rows.extend(ids.iter().map(|id| vec![id.to_string()]));
        MemorySheet::from_rows(rows)
    }

    fn make_sample(id: &str, intensity: &str, tissue: &str, age: &str) -> Sample {
        Sample::new(id, "Drought", intensity, "24", false, tissue, age, "WT")
    }

    /// Sheet that records when each lookup happens.
    struct TimedSheet {
        sheet: MemorySheet,
        start: tokio::time::Instant,
        lookups: Vec<Duration>,
    }

    #[async_trait::async_trait]
    impl RowSink for TimedSheet {
        async fn find_row(&mut self, key: &str) -> Result<usize, SheetError> {
            self.lookups.push(self.start.elapsed());
            self.sheet.find_row(key).await
        }

        async fn update_cell(&mut self, cell: &CellRef, value: &str) -> Result<(), SheetError> {
            self.sheet.update_cell(cell, value).await
        }
    }

    fn cell<'a>(sheet: &'a MemorySheet, reference: &str) -> Option<&'a str> {
        sheet.cell(&CellRef::parse(reference).unwrap())
    }

    #[tokio::test]
    async fn test_writes_group_and_factors() {
        let mut study = Study::new("PRJ1");
        study.samples = vec![
            make_sample("S1", "High", "Leaf", "7d"),
            make_sample("S2", "Low", "Leaf", "7d"),
        ];
        let mut studies = vec![study];
        annotate_all(&mut studies);
        let mut sheet = sheet_with_ids(&["S1", "S2"]);

        let summary = write_annotations(&studies, &mut sheet, &ColumnMap::default(), Pacing::default(), false)
            .await
            .unwrap();

        assert_eq!(summary, WriteSummary { samples: 2, cells: 4 });
        assert_eq!(cell(&sheet, "AQ2"), Some("Group A"));
        assert_eq!(cell(&sheet, "AR2"), Some("High"));
        assert_eq!(cell(&sheet, "AQ3"), Some("Group B"));
        assert_eq!(cell(&sheet, "AR3"), Some("Low"));
        assert_eq!(cell(&sheet, "AS3"), None);
    }

    #[tokio::test]
    async fn test_missing_factors_leave_columns_untouched() {
        let mut study = Study::new("PRJ1");
        study.samples = vec![make_sample("S1", "High", "Leaf", "7d")];
        let mut studies = vec![study];
        annotate_all(&mut studies);

        let mut sheet = sheet_with_ids(&["S1"]);
        sheet
            .update_cell(&CellRef::new("AR", 2), "previous")
            .await
            .unwrap();

        let summary = write_annotations(&studies, &mut sheet, &ColumnMap::default(), Pacing::default(), false)
            .await
            .unwrap();

        assert_eq!(summary.cells, 1);
        assert_eq!(cell(&sheet, "AQ2"), Some("Group A"));
        assert_eq!(cell(&sheet, "AR2"), Some("previous"));
    }

    #[tokio::test]
    async fn test_three_factors_fill_all_columns() {
        let mut study = Study::new("PRJ1");
        let mut other = make_sample("S2", "Low", "Root", "14d");
        other.genotype = "abi1".to_string();
        study.samples = vec![make_sample("S1", "High", "Leaf", "7d"), other];
        let mut studies = vec![study];
        annotate_all(&mut studies);
        let mut sheet = sheet_with_ids(&["S1", "S2"]);

        write_annotations(&studies, &mut sheet, &ColumnMap::default(), Pacing::default(), false)
            .await
            .unwrap();

        assert_eq!(cell(&sheet, "AR3"), Some("Low"));
        assert_eq!(cell(&sheet, "AS3"), Some("Root"));
        assert_eq!(cell(&sheet, "AT3"), Some("14d"));
        assert_eq!(cell(&sheet, "AU3"), None);
    }

    #[tokio::test]
    async fn test_unknown_sample_halts_run() {
        let mut study = Study::new("PRJ1");
        study.samples = vec![
            make_sample("S1", "High", "Leaf", "7d"),
            make_sample("MISSING", "Low", "Leaf", "7d"),
            make_sample("S3", "Low", "Leaf", "7d"),
        ];
        let mut studies = vec![study];
        annotate_all(&mut studies);
        let mut sheet = sheet_with_ids(&["S1", "S3"]);

        let err = write_annotations(&studies, &mut sheet, &ColumnMap::default(), Pacing::default(), false)
            .await
            .unwrap_err();

        assert!(matches!(err, SheetError::NotFound(ref id) if id == "MISSING"));
        assert_eq!(cell(&sheet, "AQ2"), Some("Group A"));
        assert_eq!(cell(&sheet, "AQ3"), Some(""));
    }

    #[test]
    fn test_custom_columns() {
        let columns = ColumnMap {
            group: "B".to_string(),
            factors: ["C".to_string(), "D".to_string(), "E".to_string()],
        };
        let mut study = Study::new("PRJ1");
        study.samples = vec![
            make_sample("S1", "High", "Leaf", "7d"),
            make_sample("S2", "Low", "Leaf", "7d"),
        ];
        let mut studies = vec![study];
        annotate_all(&mut studies);
        let mut sheet = sheet_with_ids(&["S1", "S2"]);

        tokio_test::block_on(write_annotations(&studies, &mut sheet, &columns, Pacing::default(), false))
            .unwrap();

        assert_eq!(cell(&sheet, "B2"), Some("Group A"));
        assert_eq!(cell(&sheet, "C3"), Some("Low"));
    }

    #[tokio::test]
    async fn test_empty_studies_write_nothing() {
        let mut sheet = sheet_with_ids(&[]);
        let pacing = Pacing {
            initial_delay: Duration::from_secs(3600),
            per_sample_delay: Duration::from_secs(3600),
        };

        let summary = write_annotations(&[], &mut sheet, &ColumnMap::default(), pacing, false)
            .await
            .unwrap();

        assert_eq!(summary, WriteSummary::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pacing_delays_are_awaited() {
        let mut study = Study::new("PRJ1");
        study.samples = vec![
            make_sample("S1", "High", "Leaf", "7d"),
            make_sample("S2", "Low", "Leaf", "7d"),
        ];
        let mut studies = vec![study];
        annotate_all(&mut studies);

        let start = tokio::time::Instant::now();
        let mut sheet = TimedSheet {
            sheet: sheet_with_ids(&["S1", "S2"]),
            start,
            lookups: Vec::new(),
        };
        let pacing = Pacing {
            initial_delay: Duration::from_secs(60),
            per_sample_delay: Duration::from_secs(10),
        };

        let summary = write_annotations(&studies, &mut sheet, &ColumnMap::default(), pacing, false)
            .await
            .unwrap();

        assert_eq!(summary.samples, 2);
        assert_eq!(
            sheet.lookups,
            vec![Duration::from_secs(70), Duration::from_secs(80)]
        );
        assert_eq!(start.elapsed(), Duration::from_secs(80));
        assert_eq!(cell(&sheet.sheet, "AQ3"), Some("Group B"));
    }
}
