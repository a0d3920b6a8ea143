// Widget data source port - The external fetch function behind the cache
use crate::domain::report::ReportDocument;
use async_trait::async_trait;
use serde_json::Value;

/// Identical filters must always mean the same intended result, otherwise
/// cached values are served for the wrong question.
#[async_trait]
pub trait WidgetDataSource: Send + Sync {
    /// Fetch display data for one widget
    async fn fetch(&self, widget_id: &str, data_source: &str, filters: &Value) -> anyhow::Result<Value>;

    /// Fetch the canonical report document for one widget
    async fn fetch_report(&self, widget_id: &str, filters: &Value) -> anyhow::Result<ReportDocument>;
}
