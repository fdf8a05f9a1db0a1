//! Google Sheets v4 backend.
//!
//! Reads a whole worksheet with one `values.get` call and writes single
//! cells with `values.update`. Requests carry a bearer OAuth token,
//! either given directly or minted from a service-account key.

use crate::sheet::{CellRef, RowSink, RowSource, SheetError};
use async_trait::async_trait;
use reqwest::Url;
use serde::de::DeserializeOwned;
use gcp_auth::{CustomServiceAccount, TokenProvider};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Default Sheets API endpoint.
pub const DEFAULT_API_BASE: &str = "https://sheets.googleapis.com";

/// OAuth scope requested for service-account tokens.
pub const SPREADSHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

/// Worksheet (tab) to operate on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorksheetSelector {
    /// Tab title, e.g. `Samples`.
    Title(String),
    /// Zero-based tab position.
    Index(usize),
}

/// Connection settings for [`SheetsClient`].
#[derive(Debug, Clone)]
pub struct SheetsConfig {
    pub api_base: String,
    pub spreadsheet_id: String,
    pub worksheet: WorksheetSelector,
    pub credentials: Credentials,
    pub timeout_seconds: u64,
}

/// How requests are authorized.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Ready OAuth access token.
    AccessToken(String),
    /// Service-account key file contents, exchanged for tokens on demand.
    ServiceAccount { client_email: String, key_json: String },
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::AccessToken(_) => write!(f, "AccessToken(..)"),
            Credentials::ServiceAccount { client_email, .. } => {
                write!(f, "ServiceAccount({})", client_email)
            }
        }
    }
}

/// `values.get` / `values.update` body.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValueRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    range: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    major_dimension: Option<String>,
    #[serde(default)]
    values: Vec<Vec<String>>,
}

/// Subset of the `spreadsheets.get` response.
#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
    #[serde(default)]
    index: usize,
}

/// Fields of a credentials file we care about.
///
/// Service-account keys carry `"type": "service_account"`; token files
/// carry only `access_token`.
#[derive(Debug, Deserialize)]
struct CredentialsFile {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    client_email: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
}

/// Read a JSON credentials file: a service-account key or an `access_token`.
pub fn read_credentials(path: &Path) -> Result<Credentials, SheetError> {
    let content = std::fs::read_to_string(path)?;
    let file: CredentialsFile = serde_json::from_str(&content).map_err(|e| {
        SheetError::MissingCredentials(format!("{} is not valid JSON: {}", path.display(), e))
    })?;

    if file.kind.as_deref() == Some("service_account") {
        let client_email = file.client_email.unwrap_or_default();
        debug!("Using service account {}", client_email);
        return Ok(Credentials::ServiceAccount {
            client_email,
            key_json: content,
        });
    }

    match file.access_token.as_deref().map(str::trim) {
        Some(token) if !token.is_empty() => Ok(Credentials::AccessToken(token.to_string())),
        _ => Err(SheetError::MissingCredentials(format!(
            "{} is neither a service-account key nor holds an access_token",
            path.display()
        ))),
    }
}

/// Source of bearer tokens for requests.
enum Authenticator {
    Static(String),
    ServiceAccount(CustomServiceAccount),
}

impl Authenticator {
    fn new(credentials: &Credentials) -> Result<Self, SheetError> {
        match credentials {
            Credentials::AccessToken(token) if token.is_empty() => Err(
                SheetError::MissingCredentials("no OAuth access token configured".to_string()),
            ),
            Credentials::AccessToken(token) => Ok(Authenticator::Static(token.clone())),
            Credentials::ServiceAccount { key_json, .. } => Ok(Authenticator::ServiceAccount(
                CustomServiceAccount::from_json(key_json)?,
            )),
        }
    }

    /// Current token. Service-account tokens are cached and refreshed by `gcp_auth`.
    async fn bearer_token(&self) -> Result<String, SheetError> {
        match self {
            Authenticator::Static(token) => Ok(token.clone()),
            Authenticator::ServiceAccount(account) => {
                let token = account.token(&[SPREADSHEETS_SCOPE]).await?;
                Ok(token.as_str().to_string())
            }
        }
    }
}

/// Quote a worksheet title for use in an A1 range.
pub fn quote_title(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

/// Right-pad rows so every row is as wide as the widest one.
pub fn pad_rows(mut rows: Vec<Vec<String>>) -> Vec<Vec<String>> {
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    for row in rows.iter_mut() {
        row.resize(width, String::new());
    }
    rows
}

/// Google Sheets client bound to one worksheet.
pub struct SheetsClient {
    config: SheetsConfig,
    http_client: reqwest::Client,
    auth: Authenticator,
    title: Option<String>,
    /// Last fetched grid, used for lookups.
    grid: Option<Vec<Vec<String>>>,
}

impl SheetsClient {
    /// Create a client. No request is made until the sheet is used.
    pub fn new(config: SheetsConfig) -> Result<Self, SheetError> {
        let auth = Authenticator::new(&config.credentials)?;

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        info!("Using spreadsheet {}", config.spreadsheet_id);

        Ok(Self {
            config,
            http_client,
            auth,
            title: None,
            grid: None,
        })
    }

    /// URL under `/v4/spreadsheets/{id}` with the given extra path segments.
    fn spreadsheet_url(&self, segments: &[&str]) -> Result<Url, SheetError> {
        let mut url = Url::parse(&self.config.api_base)
            .map_err(|e| SheetError::InvalidUrl(format!("{}: {}", self.config.api_base, e)))?;
        url.path_segments_mut()
            .map_err(|_| SheetError::InvalidUrl(self.config.api_base.clone()))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", self.config.spreadsheet_id.as_str()])
            .extend(segments);
        Ok(url)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, SheetError> {
        let token = self.auth.bearer_token().await?;
        let response = request.bearer_auth(token).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SheetError::Api { status, body });
        }

        Ok(response.json().await?)
    }

    /// Title of the selected worksheet, resolving a tab index on first use.
    pub async fn worksheet_title(&mut self) -> Result<String, SheetError> {
        if let Some(ref title) = self.title {
            return Ok(title.clone());
        }

        let title = match self.config.worksheet.clone() {
            WorksheetSelector::Title(title) => title,
            WorksheetSelector::Index(index) => {
                let mut url = self.spreadsheet_url(&[])?;
                url.query_pairs_mut().append_pair("fields", "sheets.properties");

                let meta: SpreadsheetMeta = self.send(self.http_client.get(url)).await?;
                meta.sheets
                    .into_iter()
                    .map(|sheet| sheet.properties)
                    .find(|properties| properties.index == index)
                    .map(|properties| properties.title)
                    .ok_or_else(|| SheetError::UnknownWorksheet(format!("tab index {}", index)))?
            }
        };

        debug!("Resolved worksheet: {}", title);
        self.title = Some(title.clone());
        Ok(title)
    }
}

#[async_trait]
impl RowSource for SheetsClient {
    async fn fetch_rows(&mut self) -> Result<Vec<Vec<String>>, SheetError> {
        let title = self.worksheet_title().await?;
        let range = quote_title(&title);
        let url = self.spreadsheet_url(&["values", range.as_str()])?;

        let value_range: ValueRange = self.send(self.http_client.get(url)).await?;
        let rows = pad_rows(value_range.values);
        info!("Fetched {} rows from '{}'", rows.len(), title);

        self.grid = Some(rows.clone());
        Ok(rows)
    }
}

#[async_trait]
impl RowSink for SheetsClient {
    async fn find_row(&mut self, key: &str) -> Result<usize, SheetError> {
        if self.grid.is_none() {
            self.fetch_rows().await?;
        }

        self.grid
            .as_ref()
            .and_then(|rows| {
                rows.iter()
                    .position(|row| row.iter().any(|value| value == key))
            })
            .map(|index| index + 1)
            .ok_or_else(|| SheetError::NotFound(key.to_string()))
    }

    async fn update_cell(&mut self, cell: &CellRef, value: &str) -> Result<(), SheetError> {
        let title = self.worksheet_title().await?;
        let range = format!("{}!{}", quote_title(&title), cell);

        let mut url = self.spreadsheet_url(&["values", range.as_str()])?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "USER_ENTERED");

        let body = ValueRange {
            range: Some(range),
            major_dimension: Some("ROWS".to_string()),
            values: vec![vec![value.to_string()]],
        };

        let _: serde_json::Value = self.send(self.http_client.put(url).json(&body)).await?;
        debug!("Updated {} = {:?}", cell, value);

        // Keep the lookup grid in step with the sheet.
        if let (Some(rows), Ok(column)) = (self.grid.as_mut(), cell.column_index()) {
            if let Some(row) = cell.row.checked_sub(1).and_then(|r| rows.get_mut(r)) {
                if row.len() <= column {
                    row.resize(column + 1, String::new());
                }
                row[column] = value.to_string();
            }
        }

        Ok(())
    }
}
