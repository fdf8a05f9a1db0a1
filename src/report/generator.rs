//! Markdown and JSON report generation.
//!
//! This module renders the outcome of an annotation run: the run
//! metadata, totals, and one section per study listing its experiment
//! groups and samples.

use crate::analysis::{most_grouped_studies, AnnotationSummary, StudySummary};
use crate::models::{Report, ReportMetadata, Study};
use anyhow::Result;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report) -> String {
    let mut output = String::new();

    output.push_str("# Sample Annotation Report\n\n");

    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_summary_section(&report.summary, &report.studies));
    output.push_str(&generate_studies_section(&report.studies, &report.samples));
    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Source:** {}\n", metadata.source));
    section.push_str(&format!(
        "- **Run Date:** {}\n",
        metadata.run_date.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    if metadata.written {
        section.push_str(&format!(
            "- **Cells Written:** {}\n",
            metadata.cells_written
        ));
    } else {
        section.push_str("- **Mode:** dry run (sheet not modified)\n");
    }
    section.push_str(&format!(
        "- **Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// Generate the summary section.
fn generate_summary_section(summary: &AnnotationSummary, studies: &[StudySummary]) -> String {
    let mut section = String::new();

    section.push_str("## Summary\n\n");
    section.push_str("| Studies | Samples | Controls | Experiment Groups |\n");
    section.push_str("|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} | {} |\n\n",
        summary.studies, summary.samples, summary.controls, summary.groups
    ));

    if summary.truncated_studies > 0 {
        section.push_str(&format!(
            "> ⚠️ {} studies vary in all four tracked attributes; only the first three \
             differentiating factors were kept.\n\n",
            summary.truncated_studies
        ));
    }

    let top = most_grouped_studies(studies, 5);
    if !top.is_empty() {
        section.push_str("### Most Grouped Studies\n\n");
        section.push_str("| Study | Groups | Samples |\n");
        section.push_str("|:---|:---:|:---:|\n");
        for study in top {
            section.push_str(&format!(
                "| `{}` | {} | {} |\n",
                escape_cell(&study.study_accession),
                study.groups.len(),
                study.samples
            ));
        }
        section.push('\n');
    }

    section
}

/// Generate one subsection per study.
fn generate_studies_section(studies: &[StudySummary], samples: &[Study]) -> String {
    let mut section = String::new();

    section.push_str("## Studies\n\n");

    if studies.is_empty() {
        section.push_str("No samples were found in the sheet.\n\n");
        return section;
    }

    for summary in studies {
        let study = samples
            .iter()
            .find(|s| s.study_accession == summary.study_accession);
        section.push_str(&generate_study_block(summary, study));
    }

    section
}

/// Generate the block for a single study.
fn generate_study_block(summary: &StudySummary, study: Option<&Study>) -> String {
    let mut block = String::new();

    block.push_str(&format!("### {}\n\n", summary.study_accession));

    let varying = if summary.varying_attributes.is_empty() {
        "none".to_string()
    } else {
        summary
            .varying_attributes
            .iter()
            .map(|a| a.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    };
    block.push_str(&format!(
        "*Samples: {} | Controls: {} | Varying: {}*\n\n",
        summary.samples, summary.controls, varying
    ));

    block.push_str("| Group | Factors | Samples |\n");
    block.push_str("|:---|:---|:---:|\n");
    for group in &summary.groups {
        block.push_str(&format!(
            "| {} | {} | {} |\n",
            escape_cell(&group.label),
            format_factors(&group.factors),
            group.samples
        ));
    }
    block.push('\n');

    if let Some(study) = study {
        block.push_str("<details>\n<summary>Samples</summary>\n\n");
        block.push_str("| Sample | Stress | Control | Group | Factors |\n");
        block.push_str("|:---|:---|:---:|:---|:---|\n");
        for sample in &study.samples {
            block.push_str(&format!(
                "| `{}` | {} | {} | {} | {} |\n",
                escape_cell(&sample.sample_accession),
                escape_cell(&sample.stress_type),
                if sample.is_control { "yes" } else { "" },
                escape_cell(&sample.experiment_group),
                format_factors(&sample.differentiating_factors)
            ));
        }
        block.push_str("\n</details>\n\n");
    }

    block
}

fn format_factors(factors: &[String]) -> String {
    if factors.is_empty() {
        "-".to_string()
    } else {
        escape_cell(&factors.join(" / "))
    }
}

/// Escape pipes so free-form sheet values stay inside one table cell.
fn escape_cell(value: &str) -> String {
    value.replace('|', "\\|")
}

/// Generate the report footer.
fn generate_footer() -> String {
    format!(
        "---\n\n*Report generated by stress-annotator v{}*\n",
        env!("CARGO_PKG_VERSION")
    )
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}
