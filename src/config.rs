//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.annotator.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".annotator.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Spreadsheet connection settings.
    #[serde(default)]
    pub sheet: SheetConfig,

    /// Input column positions.
    #[serde(default)]
    pub layout: LayoutConfig,

    /// Output columns.
    #[serde(default)]
    pub columns: ColumnsConfig,

    /// Write pacing.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Write an annotation report to this path after annotating.
    #[serde(default)]
    pub report: Option<String>,
}

/// Google Sheets settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetConfig {
    /// Spreadsheet ID (the long token in the sheet URL).
    #[serde(default)]
    pub spreadsheet_id: Option<String>,

    /// Worksheet title. Takes precedence over `worksheet_index`.
    #[serde(default)]
    pub worksheet: Option<String>,

    /// Zero-based worksheet tab position.
    #[serde(default = "default_worksheet_index")]
    pub worksheet_index: usize,

    /// Service-account key, or a JSON file holding an OAuth `access_token`.
    #[serde(default = "default_credentials")]
    pub credentials: String,

    /// Sheets API base URL.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: None,
            worksheet: None,
            worksheet_index: default_worksheet_index(),
            credentials: default_credentials(),
            api_base: default_api_base(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_worksheet_index() -> usize {
    1
}

fn default_credentials() -> String {
    "credentials.json".to_string()
}

fn default_api_base() -> String {
    crate::sheet::client::DEFAULT_API_BASE.to_string()
}

fn default_timeout() -> u64 {
    60
}

/// Zero-based positions of the fields read from each row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    #[serde(default = "default_study_accession")]
    pub study_accession: usize,
    #[serde(default = "default_sample_accession")]
    pub sample_accession: usize,
    #[serde(default = "default_stress_type")]
    pub stress_type: usize,
    #[serde(default = "default_stress_intensity")]
    pub stress_intensity: usize,
    #[serde(default = "default_stress_duration")]
    pub stress_duration: usize,
    #[serde(default = "default_control")]
    pub control: usize,
    #[serde(default = "default_tissue")]
    pub tissue: usize,
    #[serde(default = "default_age")]
    pub age: usize,
    #[serde(default = "default_genotype")]
    pub genotype: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            study_accession: default_study_accession(),
            sample_accession: default_sample_accession(),
            stress_type: default_stress_type(),
            stress_intensity: default_stress_intensity(),
            stress_duration: default_stress_duration(),
            control: default_control(),
            tissue: default_tissue(),
            age: default_age(),
            genotype: default_genotype(),
        }
    }
}

fn default_study_accession() -> usize {
    6
}

fn default_sample_accession() -> usize {
    24
}

fn default_stress_type() -> usize {
    17
}

fn default_stress_intensity() -> usize {
    19
}

fn default_stress_duration() -> usize {
    20
}

fn default_control() -> usize {
    21
}

fn default_tissue() -> usize {
    29
}

fn default_age() -> usize {
    30
}

fn default_genotype() -> usize {
    31
}

/// Columns the annotations are written to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnsConfig {
    /// Experiment group column.
    #[serde(default = "default_group_column")]
    pub group: String,

    /// Differentiating factor columns, in factor order.
    #[serde(default = "default_factor_columns")]
    pub factors: [String; 3],
}

impl Default for ColumnsConfig {
    fn default() -> Self {
        Self {
            group: default_group_column(),
            factors: default_factor_columns(),
        }
    }
}

fn default_group_column() -> String {
    "AQ".to_string()
}

fn default_factor_columns() -> [String; 3] {
    ["AR".to_string(), "AS".to_string(), "AT".to_string()]
}

/// Pauses between writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Pause before the first write, in seconds.
    #[serde(default = "default_initial_delay")]
    pub initial_delay_seconds: u64,

    /// Pause before each sample's writes, in seconds.
    #[serde(default = "default_write_delay")]
    pub write_delay_seconds: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            initial_delay_seconds: default_initial_delay(),
            write_delay_seconds: default_write_delay(),
        }
    }
}

fn default_initial_delay() -> u64 {
    60
}

fn default_write_delay() -> u64 {
    10
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Check that every configured column is valid A1 column notation.
    pub fn validate(&self) -> Result<()> {
        for column in std::iter::once(&self.columns.group).chain(self.columns.factors.iter()) {
            crate::sheet::column_index(column)
                .with_context(|| format!("Invalid output column '{}'", column))?;
        }
        Ok(())
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref id) = args.spreadsheet_id {
            self.sheet.spreadsheet_id = Some(id.clone());
        }

        // An explicit index on the command line beats a configured title
        if let Some(ref title) = args.worksheet {
            self.sheet.worksheet = Some(title.clone());
        } else if let Some(index) = args.worksheet_index {
            self.sheet.worksheet = None;
            self.sheet.worksheet_index = index;
        }

        if let Some(ref credentials) = args.credentials {
            self.sheet.credentials = credentials.display().to_string();
        }

        if let Some(delay) = args.initial_delay {
            self.rate_limit.initial_delay_seconds = delay;
        }
        if let Some(delay) = args.write_delay {
            self.rate_limit.write_delay_seconds = delay;
        }

        if let Some(ref report) = args.report {
            self.general.report = Some(report.display().to_string());
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.sheet.worksheet_index, 1);
        assert_eq!(config.sheet.credentials, "credentials.json");
        assert_eq!(config.columns.group, "AQ");
        assert_eq!(config.columns.factors, ["AR", "AS", "AT"]);
        assert_eq!(config.rate_limit.initial_delay_seconds, 60);
        assert_eq!(config.rate_limit.write_delay_seconds, 10);
        assert_eq!(config.layout.study_accession, 6);
        assert_eq!(config.layout.genotype, 31);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[sheet]
spreadsheet_id = "1AbC"
worksheet = "Samples"

[layout]
tissue = 12

[columns]
group = "B"
factors = ["C", "D", "E"]

[rate_limit]
write_delay_seconds = 2
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.sheet.spreadsheet_id.as_deref(), Some("1AbC"));
        assert_eq!(config.sheet.worksheet.as_deref(), Some("Samples"));
        assert_eq!(config.layout.tissue, 12);
        assert_eq!(config.layout.age, 30);
        assert_eq!(config.columns.group, "B");
        assert_eq!(config.columns.factors, ["C", "D", "E"]);
        assert_eq!(config.rate_limit.write_delay_seconds, 2);
        assert_eq!(config.rate_limit.initial_delay_seconds, 60);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_column_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[columns]\ngroup = \"A1\"\n").unwrap();

        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[sheet]"));
        assert!(toml_str.contains("[columns]"));
        assert!(toml_str.contains("[rate_limit]"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.columns.group, "AQ");
    }
}
