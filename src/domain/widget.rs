// Widget domain model - Registry entries, per-widget settings and the widget catalog
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Arbitrary per-widget settings (title, dataSource, thresholds, ...).
pub type WidgetConfig = Map<String, Value>;

/// Identity of a placed widget, keyed by its id in the dashboard registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Widget {
    #[serde(rename = "type")]
    pub widget_type: String,
    pub category: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultSize {
    pub w: u32,
    pub h: u32,
    #[serde(default)]
    pub min_w: Option<u32>,
    #[serde(default)]
    pub min_h: Option<u32>,
}

/// Catalog entry describing how a widget kind is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetDefinition {
    #[serde(rename = "type")]
    pub widget_type: String,
    pub category: String,
    pub default_size: DefaultSize,
    #[serde(default)]
    pub default_config: Option<WidgetConfig>,
}

/// Widget kinds known to the dashboard, keyed by type. Adding a kind is a
/// registration, not a change to any dispatch code.
#[derive(Debug, Clone, Default)]
pub struct WidgetCatalog {
    definitions: IndexMap<String, WidgetDefinition>,
}

impl WidgetCatalog {
    pub fn from_definitions(definitions: Vec<WidgetDefinition>) -> Self {
        let mut catalog = Self::default();
        for definition in definitions {
            catalog.register(definition);
        }
        catalog
    }

    pub fn register(&mut self, definition: WidgetDefinition) {
        if self.definitions.contains_key(&definition.widget_type) {
            tracing::warn!(widget_type = %definition.widget_type, "duplicate widget kind replaced");
        }
        self.definitions
            .insert(definition.widget_type.clone(), definition);
    }

    pub fn get(&self, widget_type: &str) -> Option<&WidgetDefinition> {
        self.definitions.get(widget_type)
    }

    pub fn definitions(&self) -> impl Iterator<Item = &WidgetDefinition> {
        self.definitions.values()
    }
}
