//! Stress Annotator - experiment groups for plant-stress samples
//!
//! A CLI tool that reads a sample sheet, groups samples by study,
//! finds the conditions that vary within each study and writes an
//! experiment group plus differentiating factors back to every row.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (bad arguments, config, sheet access, unknown sample, etc.)

mod analysis;
mod cli;
mod config;
mod loader;
mod models;
mod report;
mod sheet;
mod writer;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::{Config, CONFIG_FILE_NAME};
use loader::RowLayout;
use models::{Report, ReportMetadata, Study};
use sheet::{
    Credentials, MemorySheet, RowSink, RowSource, SheetsClient, SheetsConfig, WorksheetSelector,
};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use writer::{ColumnMap, Pacing, WriteSummary};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("stress-annotator v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    if let Err(e) = run(args).await {
        error!("Annotation failed: {:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle --init-config: generate a default .annotator.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to set the spreadsheet, columns and write delays.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level())
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("Warning: a tracing subscriber was already installed");
    }
}

/// Run the complete load, annotate and write workflow.
async fn run(args: Args) -> Result<()> {
    let start_time = Instant::now();
    let run_date = Utc::now();

    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    config.validate()?;

    let layout = RowLayout::from(&config.layout);
    let columns = ColumnMap::from(&config.columns);

    let (source, studies, written) = if let Some(ref local) = args.local {
        println!("📄 Reading local sheet: {}", local.display());
        let mut sheet = MemorySheet::from_csv_path(local)
            .with_context(|| format!("Failed to read {}", local.display()))?;

        let (studies, written) =
            annotate_sheet(&mut sheet, &layout, &columns, local_pacing(&args), &args).await?;

        if written.is_some() {
            let output = args.output.as_deref().unwrap_or(local);
            sheet
                .save_csv(output)
                .with_context(|| format!("Failed to save {}", output.display()))?;
            println!("💾 Saved annotated sheet to {}", output.display());
        }

        (local.display().to_string(), studies, written)
    } else {
        let sheets_config = build_sheets_config(&config, &args)?;
        let source = sheets_config.spreadsheet_id.clone();
        println!("📥 Reading spreadsheet: {}", source);

        let mut client = SheetsClient::new(sheets_config)?;
        let pacing = Pacing {
            initial_delay: Duration::from_secs(config.rate_limit.initial_delay_seconds),
            per_sample_delay: Duration::from_secs(config.rate_limit.write_delay_seconds),
        };

        let (studies, written) =
            annotate_sheet(&mut client, &layout, &columns, pacing, &args).await?;
        (source, studies, written)
    };

    let duration = start_time.elapsed().as_secs_f64();
    let summaries = analysis::summarize(&studies);
    let summary = analysis::AnnotationSummary::from_studies(&summaries);

    if let Some(ref path) = config.general.report {
        let report = Report {
            metadata: ReportMetadata {
                source,
                run_date,
                written: written.is_some(),
                cells_written: written.map(|w| w.cells).unwrap_or(0),
                duration_seconds: duration,
            },
            summary: summary.clone(),
            studies: summaries,
            samples: studies,
        };
        save_report(&report, Path::new(path), args.format)?;
        println!("📝 Report saved to: {}", path);
    }

    println!("\n📊 Annotation Summary:");
    println!("   Studies: {}", summary.studies);
    println!(
        "   Samples: {} ({} controls)",
        summary.samples, summary.controls
    );
    println!("   Experiment groups: {}", summary.groups);
    if summary.truncated_studies > 0 {
        println!(
            "   ⚠️  {} studies had a fourth varying attribute dropped",
            summary.truncated_studies
        );
    }
    match written {
        Some(w) => println!("   Cells written: {}", w.cells),
        None => println!("   Dry run: nothing was written"),
    }
    println!("   Duration: {:.1}s", duration);
    println!("\n✅ Annotation complete!");

    Ok(())
}

/// Load, annotate and (unless dry-running) write back one sheet.
///
/// Returns the annotated studies and the write summary, `None` on a dry run.
async fn annotate_sheet<S>(
    sheet: &mut S,
    layout: &RowLayout,
    columns: &ColumnMap,
    pacing: Pacing,
    args: &Args,
) -> Result<(Vec<Study>, Option<WriteSummary>)>
where
    S: RowSource + RowSink + Send,
{
    let rows = sheet.fetch_rows().await.context("Failed to read sheet rows")?;
    let data = sheet::data_rows(&rows);
    if let Some(last) = data.last() {
        debug!("Last row: {:?}", last);
    }

    let width = layout.width();
    let short_rows = data.iter().filter(|row| row.len() < width).count();
    if short_rows > 0 {
        warn!(
            "{} rows have fewer than {} fields; missing fields read as empty",
            short_rows, width
        );
    }

    let mut studies = loader::load_studies(data, layout);
    let sample_count: usize = studies.iter().map(|s| s.samples.len()).sum();
    println!(
        "   Found {} samples in {} studies",
        sample_count,
        studies.len()
    );

    println!("🧬 Annotating studies...");
    analysis::annotate_all(&mut studies);

    if args.dry_run {
        println!("\n🔍 Dry run: skipping writes.");
        for study in &studies {
            println!("   {}", study);
            for sample in &study.samples {
                println!(
                    "     {} → {} [{}]",
                    sample.sample_accession,
                    sample.experiment_group,
                    sample.differentiating_factors.join(", ")
                );
            }
        }
        return Ok((studies, None));
    }

    println!("✍️  Data ready to be saved. Writing {} samples...", sample_count);
    let summary = writer::write_annotations(&studies, sheet, columns, pacing, !args.quiet)
        .await
        .context("Failed to write annotations")?;

    Ok((studies, Some(summary)))
}

/// Delays for --local runs.
///
/// There is no API quota on a file, so only delays given explicitly on the
/// command line apply.
fn local_pacing(args: &Args) -> Pacing {
    Pacing {
        initial_delay: Duration::from_secs(args.initial_delay.unwrap_or(0)),
        per_sample_delay: Duration::from_secs(args.write_delay.unwrap_or(0)),
    }
}

/// Build Google Sheets connection settings from config and arguments.
fn build_sheets_config(config: &Config, args: &Args) -> Result<SheetsConfig> {
    let Some(spreadsheet_id) = config.sheet.spreadsheet_id.clone() else {
        bail!(
            "No spreadsheet ID given. Use --spreadsheet-id, ANNOTATOR_SPREADSHEET_ID \
             or [sheet] spreadsheet_id in {}",
            CONFIG_FILE_NAME
        );
    };

    let worksheet = match config.sheet.worksheet {
        Some(ref title) => WorksheetSelector::Title(title.clone()),
        None => WorksheetSelector::Index(config.sheet.worksheet_index),
    };

    let credentials = match args.token {
        Some(ref token) => Credentials::AccessToken(token.clone()),
        None => {
            let path = Path::new(&config.sheet.credentials);
            sheet::client::read_credentials(path).with_context(|| {
                format!(
                    "Failed to read credentials from {} (or set GOOGLE_OAUTH_TOKEN)",
                    path.display()
                )
            })?
        }
    };

    Ok(SheetsConfig {
        api_base: config.sheet.api_base.clone(),
        spreadsheet_id,
        worksheet,
        credentials,
        timeout_seconds: config.sheet.timeout_seconds,
    })
}

/// Render and write the report in the requested format.
fn save_report(report: &Report, path: &Path, format: OutputFormat) -> Result<()> {
    let output = match format {
        OutputFormat::Json => report::generate_json_report(report)?,
        OutputFormat::Markdown => report::generate_markdown_report(report),
    };

    std::fs::write(path, output)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE_NAME);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    const FIXTURE: &str = include_str!("../fixtures/plant_stress.csv");

    fn local_args(extra: &[&str]) -> Args {
        let mut argv = vec!["stress-annotator"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[tokio::test]
    async fn test_annotate_fixture_end_to_end() {
        let mut sheet = MemorySheet::from_csv_reader(FIXTURE.as_bytes()).unwrap();
        let args = local_args(&["--quiet"]);

        let (studies, written) = annotate_sheet(
            &mut sheet,
            &RowLayout::default(),
            &ColumnMap::default(),
            Pacing::default(),
            &args,
        )
        .await
        .unwrap();

        let order: Vec<_> = studies.iter().map(|s| s.study_accession.as_str()).collect();
        assert_eq!(order, vec!["PRJNA100", "PRJNA200", "PRJNA300", "PRJNA400"]);
        assert_eq!(written.unwrap().samples, 9);

        let cell = |r: &str| sheet.cell(&sheet::CellRef::parse(r).unwrap()).map(String::from);

        // PRJNA100: three intensities on rows 2, 3 and 5
        assert_eq!(cell("AQ2").as_deref(), Some("Group A"));
        assert_eq!(cell("AQ3").as_deref(), Some("Group B"));
        assert_eq!(cell("AQ5").as_deref(), Some("Group C"));
        assert_eq!(cell("AR5").as_deref(), Some("Severe"));

        // PRJNA200: tissue and genotype vary
        assert_eq!(cell("AR6").as_deref(), Some("Leaf"));
        assert_eq!(cell("AS6").as_deref(), Some("abi1-1"));

        // PRJNA300: uniform study
        assert_eq!(cell("AQ7").as_deref(), Some("Group A"));
        assert_eq!(cell("AQ8").as_deref(), Some("Group A"));
        assert_eq!(cell("AR8").as_deref(), Some(""));

        // PRJNA400: all four vary, genotype dropped
        assert_eq!(cell("AR10").as_deref(), Some("0C"));
        assert_eq!(cell("AS10").as_deref(), Some("Root"));
        assert_eq!(cell("AT10").as_deref(), Some("28d"));
        assert_eq!(cell("AQ10").as_deref(), Some("Group B"));
    }

    #[tokio::test]
    async fn test_dry_run_leaves_sheet_untouched() {
        let mut sheet = MemorySheet::from_csv_reader(FIXTURE.as_bytes()).unwrap();
        let before = sheet.clone();
        let args = local_args(&["--dry-run", "--quiet"]);

        let (studies, written) = annotate_sheet(
            &mut sheet,
            &RowLayout::default(),
            &ColumnMap::default(),
            Pacing::default(),
            &args,
        )
        .await
        .unwrap();

        assert!(written.is_none());
        assert_eq!(studies.len(), 4);
        assert_eq!(sheet, before);
    }

    #[test]
    fn test_build_sheets_config_requires_id() {
        let args = local_args(&["--token", "abc"]);
        let mut config = Config::default();
        config.sheet.spreadsheet_id = None;

        assert!(build_sheets_config(&config, &args).is_err());
    }

    #[test]
    fn test_build_sheets_config_selects_worksheet() {
        let args = local_args(&["--token", "abc"]);
        let mut config = Config::default();
        config.sheet.spreadsheet_id = Some("1AbC".to_string());

        let sheets = build_sheets_config(&config, &args).unwrap();
        assert_eq!(sheets.worksheet, WorksheetSelector::Index(1));
        assert_eq!(sheets.credentials, Credentials::AccessToken("abc".to_string()));

        config.sheet.worksheet = Some("Samples".to_string());
        let sheets = build_sheets_config(&config, &args).unwrap();
        assert_eq!(sheets.worksheet, WorksheetSelector::Title("Samples".to_string()));
    }

    #[test]
    fn test_build_sheets_config_reads_service_account() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(
            &path,
            r#"{"type": "service_account", "client_email": "bot@proj.iam.gserviceaccount.com", "private_key": "x"}"#,
        )
        .unwrap();

        let mut config = Config::default();
        config.sheet.spreadsheet_id = Some("1AbC".to_string());
        config.sheet.credentials = path.display().to_string();

        let mut args = local_args(&[]);
        args.token = None;

        let sheets = build_sheets_config(&config, &args).unwrap();
        assert!(matches!(
            sheets.credentials,
            Credentials::ServiceAccount { ref client_email, .. }
                if client_email == "bot@proj.iam.gserviceaccount.com"
        ));
    }

    #[test]
    fn test_local_pacing_honours_explicit_delays() {
        assert_eq!(local_pacing(&local_args(&[])), Pacing::default());

        let pacing = local_pacing(&local_args(&["--initial-delay", "5", "--write-delay", "2"]));
        assert_eq!(pacing.initial_delay, Duration::from_secs(5));
        assert_eq!(pacing.per_sample_delay, Duration::from_secs(2));
    }

    #[test]
    fn test_save_report_formats() {
        let dir = tempfile::tempdir().unwrap();
        let report = Report {
            metadata: ReportMetadata {
                source: "test.csv".to_string(),
                run_date: Utc::now(),
                written: false,
                cells_written: 0,
                duration_seconds: 0.1,
            },
            summary: analysis::AnnotationSummary::default(),
            studies: Vec::new(),
            samples: Vec::new(),
        };

        let md = dir.path().join("report.md");
        save_report(&report, &md, OutputFormat::Markdown).unwrap();
        assert!(std::fs::read_to_string(&md).unwrap().starts_with("# Sample Annotation Report"));

        let json = dir.path().join("report.json");
        save_report(&report, &json, OutputFormat::Json).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&json).unwrap()).unwrap();
        assert_eq!(value["metadata"]["source"], "test.csv");
    }
}
