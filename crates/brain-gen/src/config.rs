//! Configuration for brain-gen.
//!
//! Supports loading from a TOML file with CLI argument overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use brain_client::{
    DataFieldQuery, RetryPolicy, DEFAULT_BASE_URL, DEFAULT_PAGE_SIZE, DEFAULT_SEARCH_RESULT_CAP,
};
use serde::Deserialize;

use crate::expr::ExpressionGrid;
use crate::task::AlphaSettings;

/// Top-level configuration for brain-gen.
#[derive(Debug, Clone)]
pub struct GenerateConfig {
    pub log_level: String,
    pub output_dir: PathBuf,
    pub base_url: String,
    pub credentials_file: PathBuf,
    pub login_timeout: Duration,
    pub login_retry_delay: Duration,
    pub retry: RetryPolicy,
    pub query: QueryConfig,
    pub grid: GridConfig,
    pub settings: AlphaSettings,
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            output_dir: PathBuf::from("data"),
            base_url: DEFAULT_BASE_URL.to_string(),
            credentials_file: PathBuf::from("credentials.json"),
            login_timeout: Duration::from_secs(300),
            login_retry_delay: Duration::from_secs(15),
            retry: RetryPolicy::default(),
            query: QueryConfig::default(),
            grid: GridConfig::default(),
            settings: AlphaSettings::default(),
        }
    }
}

/// Field-catalog query section.
#[derive(Debug, Clone)]
pub struct QueryConfig {
    pub instrument_type: String,
    pub region: String,
    pub delay: u32,
    pub universe: String,
    pub dataset_id: Option<String>,
    pub search: Option<String>,
    /// Data type of fields fed to the generator.
    pub dataset_type: String,
    pub page_size: usize,
    pub search_result_cap: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            instrument_type: "EQUITY".to_string(),
            region: "USA".to_string(),
            delay: 1,
            universe: "TOP3000".to_string(),
            dataset_id: Some("fundamental6".to_string()),
            search: None,
            dataset_type: "MATRIX".to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            search_result_cap: DEFAULT_SEARCH_RESULT_CAP,
        }
    }
}

impl QueryConfig {
    /// Query parameters for the field fetcher.
    pub fn to_query(&self) -> DataFieldQuery {
        DataFieldQuery {
            instrument_type: self.instrument_type.clone(),
            region: self.region.clone(),
            delay: self.delay,
            universe: self.universe.clone(),
            dataset_id: self.dataset_id.clone(),
            search: self.search.clone(),
        }
    }
}

/// Expression-grid axes, minus the fields (those come from the catalog).
#[derive(Debug, Clone)]
pub struct GridConfig {
    pub group_ops: Vec<String>,
    pub ts_ops: Vec<String>,
    pub windows: Vec<u32>,
    pub groups: Vec<String>,
}

impl Default for GridConfig {
    fn default() -> Self {
        let grid = ExpressionGrid::default();
        Self {
            group_ops: grid.group_ops,
            ts_ops: grid.ts_ops,
            windows: grid.windows,
            groups: grid.groups,
        }
    }
}

impl GridConfig {
    /// Combine the configured axes with the selected catalog fields.
    pub fn into_grid(self, fields: Vec<String>) -> ExpressionGrid {
        ExpressionGrid {
            group_ops: self.group_ops,
            ts_ops: self.ts_ops,
            fields,
            windows: self.windows,
            groups: self.groups,
        }
    }
}

impl GenerateConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: TomlConfig = toml::from_str(content).context("Failed to parse TOML config")?;
        Ok(Self::from(file))
    }

    /// Apply CLI overrides to the configuration.
    pub fn apply_overrides(
        &mut self,
        dataset: Option<String>,
        search: Option<String>,
        output_dir: Option<PathBuf>,
        credentials: Option<PathBuf>,
    ) {
        if let Some(dataset) = dataset {
            self.query.dataset_id = Some(dataset);
        }
        if let Some(search) = search {
            self.query.search = Some(search);
        }
        if let Some(output_dir) = output_dir {
            self.output_dir = output_dir;
        }
        if let Some(credentials) = credentials {
            self.credentials_file = credentials;
        }
    }
}

/// TOML file structure for deserialization.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TomlConfig {
    general: GeneralToml,
    api: ApiToml,
    retry: RetryToml,
    query: QueryToml,
    grid: GridToml,
    settings: AlphaSettings,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct GeneralToml {
    log_level: String,
    output_dir: PathBuf,
}

impl Default for GeneralToml {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            output_dir: PathBuf::from("data"),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct ApiToml {
    base_url: String,
    credentials_file: PathBuf,
}

impl Default for ApiToml {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            credentials_file: PathBuf::from("credentials.json"),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RetryToml {
    login_timeout_secs: u64,
    login_retry_delay_secs: u64,
    max_relogins: u32,
    window_timeout_secs: u64,
    retry_delay_secs: u64,
}

impl Default for RetryToml {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            login_timeout_secs: 300,
            login_retry_delay_secs: 15,
            max_relogins: policy.max_relogins,
            window_timeout_secs: policy.window_timeout.as_secs(),
            retry_delay_secs: policy.retry_delay.as_secs(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct QueryToml {
    instrument_type: String,
    region: String,
    delay: u32,
    universe: String,
    dataset_id: Option<String>,
    search: Option<String>,
    dataset_type: String,
    page_size: usize,
    search_result_cap: usize,
}

impl Default for QueryToml {
    fn default() -> Self {
        let query = QueryConfig::default();
        Self {
            instrument_type: query.instrument_type,
            region: query.region,
            delay: query.delay,
            universe: query.universe,
            dataset_id: query.dataset_id,
            search: query.search,
            dataset_type: query.dataset_type,
            page_size: query.page_size,
            search_result_cap: query.search_result_cap,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct GridToml {
    group_ops: Vec<String>,
    ts_ops: Vec<String>,
    windows: Vec<u32>,
    groups: Vec<String>,
}

impl Default for GridToml {
    fn default() -> Self {
        let grid = GridConfig::default();
        Self {
            group_ops: grid.group_ops,
            ts_ops: grid.ts_ops,
            windows: grid.windows,
            groups: grid.groups,
        }
    }
}

impl From<TomlConfig> for GenerateConfig {
    fn from(file: TomlConfig) -> Self {
        Self {
            log_level: file.general.log_level,
            output_dir: file.general.output_dir,
            base_url: file.api.base_url,
            credentials_file: file.api.credentials_file,
            login_timeout: Duration::from_secs(file.retry.login_timeout_secs),
            login_retry_delay: Duration::from_secs(file.retry.login_retry_delay_secs),
            retry: RetryPolicy {
                max_relogins: file.retry.max_relogins,
                window_timeout: Duration::from_secs(file.retry.window_timeout_secs),
                retry_delay: Duration::from_secs(file.retry.retry_delay_secs),
            },
            query: QueryConfig {
                instrument_type: file.query.instrument_type,
                region: file.query.region,
                delay: file.query.delay,
                universe: file.query.universe,
                dataset_id: file.query.dataset_id,
                search: file.query.search,
                dataset_type: file.query.dataset_type,
                page_size: file.query.page_size,
                search_result_cap: file.query.search_result_cap,
            },
            grid: GridConfig {
                group_ops: file.grid.group_ops,
                ts_ops: file.grid.ts_ops,
                windows: file.grid.windows,
                groups: file.grid.groups,
            },
            settings: file.settings,
        }
    }
}
