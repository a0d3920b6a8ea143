// Report domain model - Renderer-agnostic report document
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type Row = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMetadata {
    pub title: String,
    pub widget_id: String,
    #[serde(default)]
    pub filters: Value,
    pub generated_at: DateTime<Utc>,
}

/// Raw rows arrive either flat or wrapped in an `accounts` object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawData {
    Rows(Vec<Row>),
    Accounts { accounts: Vec<Row> },
}

impl Default for RawData {
    fn default() -> Self {
        RawData::Rows(Vec::new())
    }
}

impl RawData {
    pub fn rows(&self) -> &[Row] {
        match self {
            RawData::Rows(rows) => rows,
            RawData::Accounts { accounts } => accounts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportDocument {
    pub metadata: ReportMetadata,
    #[serde(default)]
    pub overview: IndexMap<String, Value>,
    #[serde(default)]
    pub breakdown: IndexMap<String, IndexMap<String, Value>>,
    #[serde(default)]
    pub trends: Vec<Row>,
    #[serde(default)]
    pub raw: RawData,
}

/// Value shown for a breakdown entry: `balance`, else `count`, else the entry.
pub fn breakdown_value(entry: &Value) -> &Value {
    if let Value::Object(fields) = entry {
        for key in ["balance", "count"] {
            match fields.get(key) {
                Some(Value::Null) | None => continue,
                Some(value) => return value,
            }
        }
    }
    entry
}

/// Text form of a cell. Strings are unquoted, null is blank and nested
/// values fall back to compact JSON.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
