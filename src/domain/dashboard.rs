// Dashboard domain model - Persisted dashboard state and its interchange shapes
use super::layout::{check_layouts, empty_layouts, Layouts};
use super::widget::{Widget, WidgetConfig};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const EXPORT_VERSION: &str = "1.0";

#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    #[error("dashboard validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("invalid dashboard file: {0}")]
    InvalidImport(String),

    #[error("unknown widget type '{0}'")]
    UnknownWidgetType(String),

    #[error("widget '{0}' not found")]
    WidgetNotFound(String),

    #[error("dashboard '{0}' not found")]
    NotFound(String),

    #[error("stored dashboard '{0}' is corrupt: {1}")]
    CorruptDashboard(String, String),

    #[error("storage error: {0:#}")]
    Storage(anyhow::Error),
}

/// The unit of save, load, import, export and clone.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardConfig {
    pub id: String,
    pub name: String,
    pub description: String,
    pub theme: String,
    pub settings: Map<String, Value>,
    pub layouts: Layouts,
    pub widgets: IndexMap<String, Widget>,
    pub configs: IndexMap<String, WidgetConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

/// Storage form: registries become `[key, value]` pairs so their order
/// survives the round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedDashboard {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub theme: String,
    #[serde(default)]
    pub settings: Map<String, Value>,
    #[serde(default)]
    pub layouts: Layouts,
    #[serde(default)]
    pub widgets: Vec<(String, Widget)>,
    #[serde(default)]
    pub configs: Vec<(String, WidgetConfig)>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub id: String,
    pub name: String,
    pub updated_at: DateTime<Utc>,
}

/// File interchange artifact produced by export and consumed by import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardExport {
    pub version: String,
    pub export_date: DateTime<Utc>,
    pub dashboard: ExportedDashboard,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedDashboard {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub theme: String,
    #[serde(default)]
    pub settings: Map<String, Value>,
    #[serde(default)]
    pub layouts: Layouts,
    #[serde(default)]
    pub widgets: Vec<(String, Widget)>,
    #[serde(default)]
    pub configs: Vec<(String, WidgetConfig)>,
}

impl DashboardConfig {
    pub fn new(id: String, name: String) -> Self {
        Self {
            id,
            name,
            description: String::new(),
            theme: "light".to_string(),
            settings: Map::new(),
            layouts: empty_layouts(),
            widgets: IndexMap::new(),
            configs: IndexMap::new(),
        }
    }

    /// Collects every violation instead of stopping at the first one.
    pub fn validate(&self) -> ValidationReport {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push("Dashboard name is required".to_string());
        }
        if self.layouts.is_empty() {
            errors.push("Dashboard must have at least one layout".to_string());
        }
        if self.widgets.is_empty() {
            errors.push("Dashboard must have at least one widget".to_string());
        }

        for id in self.widgets.keys() {
            let config = self.configs.get(id);
            if !has_setting(config, "title") {
                errors.push(format!("Widget {} is missing a title", id));
            }
            if !has_setting(config, "dataSource") {
                errors.push(format!("Widget {} is missing a data source", id));
            }
        }

        ValidationReport {
            is_valid: errors.is_empty(),
            errors,
        }
    }

    pub fn to_saved(&self, updated_at: DateTime<Utc>) -> SavedDashboard {
        SavedDashboard {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            theme: self.theme.clone(),
            settings: self.settings.clone(),
            layouts: self.layouts.clone(),
            widgets: pairs(&self.widgets),
            configs: pairs(&self.configs),
            updated_at,
        }
    }

    /// Rebuilds a stored dashboard, refusing layouts that break the grid.
    pub fn from_saved(saved: SavedDashboard) -> Result<Self, DashboardError> {
        check_layouts(&saved.layouts)
            .map_err(|reason| DashboardError::CorruptDashboard(saved.id.clone(), reason))?;
        Ok(Self {
            id: saved.id,
            name: saved.name,
            description: saved.description,
            theme: saved.theme,
            settings: saved.settings,
            layouts: saved.layouts,
            widgets: saved.widgets.into_iter().collect(),
            configs: saved.configs.into_iter().collect(),
        })
    }

    pub fn to_export(&self, export_date: DateTime<Utc>) -> DashboardExport {
        DashboardExport {
            version: EXPORT_VERSION.to_string(),
            export_date,
            dashboard: ExportedDashboard {
                name: self.name.clone(),
                description: self.description.clone(),
                theme: self.theme.clone(),
                settings: self.settings.clone(),
                layouts: self.layouts.clone(),
                widgets: pairs(&self.widgets),
                configs: pairs(&self.configs),
            },
        }
    }

    /// Parses an export artifact. Nothing is applied here; callers swap the
    /// result in only once parsing has fully succeeded.
    pub fn from_export_json(id: String, content: &str) -> Result<Self, DashboardError> {
        let value: Value = serde_json::from_str(content)
            .map_err(|e| DashboardError::InvalidImport(format!("malformed JSON: {}", e)))?;

        let object = value
            .as_object()
            .ok_or_else(|| DashboardError::InvalidImport("expected a JSON object".to_string()))?;
        for key in ["version", "dashboard"] {
            if object.get(key).is_none_or(Value::is_null) {
                return Err(DashboardError::InvalidImport(format!(
                    "missing '{}' field",
                    key
                )));
            }
        }

        let dashboard: ExportedDashboard = serde_json::from_value(object["dashboard"].clone())
            .map_err(|e| DashboardError::InvalidImport(e.to_string()))?;
        check_layouts(&dashboard.layouts).map_err(DashboardError::InvalidImport)?;

        Ok(Self {
            id,
            name: dashboard.name,
            description: dashboard.description,
            theme: dashboard.theme,
            settings: dashboard.settings,
            layouts: dashboard.layouts,
            widgets: dashboard.widgets.into_iter().collect(),
            configs: dashboard.configs.into_iter().collect(),
        })
    }
}

impl SavedDashboard {
    pub fn summary(&self) -> DashboardSummary {
        DashboardSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            updated_at: self.updated_at,
        }
    }
}

fn has_setting(config: Option<&WidgetConfig>, key: &str) -> bool {
    match config.and_then(|c| c.get(key)) {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(_) => true,
    }
}

fn pairs<V: Clone>(map: &IndexMap<String, V>) -> Vec<(String, V)> {
    map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
}
