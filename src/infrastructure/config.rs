// Configuration loading - Service settings and the widget catalog
use crate::application::query_cache::DEFAULT_TTL;
use crate::domain::widget::{WidgetCatalog, WidgetDefinition};
use anyhow::Context;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

const SETTINGS_FILE: &str = "config/dashboard";
const CATALOG_FILE: &str = "config/widgets.toml";
const ENV_PREFIX: &str = "DASHBOARD";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub data_source: DataSourceSettings,
    #[serde(default)]
    pub export: ExportSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageSettings {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheSettings {
    #[serde(default = "default_ttl_ms")]
    pub ttl_ms: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_ms: default_ttl_ms(),
        }
    }
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DataSourceSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_fetch_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for DataSourceSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_ms: default_fetch_timeout_ms(),
        }
    }
}

impl DataSourceSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExportSettings {
    #[serde(default = "default_export_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            timeout_ms: default_export_timeout_ms(),
        }
    }
}

impl ExportSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data/dashboards")
}

fn default_ttl_ms() -> u64 {
    DEFAULT_TTL.as_millis() as u64
}

fn default_base_url() -> String {
    "http://localhost:9090/api".to_string()
}

fn default_fetch_timeout_ms() -> u64 {
    10_000
}

fn default_export_timeout_ms() -> u64 {
    30_000
}

/// `config/dashboard.{toml,yaml,json}` when present, overridden by
/// `DASHBOARD__SECTION__KEY` environment variables.
pub fn load_app_config() -> anyhow::Result<AppConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name(SETTINGS_FILE).required(false))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    widgets: Vec<WidgetDefinition>,
}

pub fn load_widget_catalog() -> anyhow::Result<WidgetCatalog> {
    let content = std::fs::read_to_string(CATALOG_FILE)
        .with_context(|| format!("Failed to read widget catalog {}", CATALOG_FILE))?;
    parse_widget_catalog(&content)
}

/// Parsed with `toml` directly so camelCase keys inside `default_config`
/// (`dataSource`) keep their case.
pub fn parse_widget_catalog(content: &str) -> anyhow::Result<WidgetCatalog> {
    let file: CatalogFile = toml::from_str(content).context("Failed to parse widget catalog")?;
    Ok(WidgetCatalog::from_definitions(file.widgets))
}
