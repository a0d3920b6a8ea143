// Repository trait for persisted dashboards
use crate::domain::dashboard::{DashboardSummary, SavedDashboard};
use async_trait::async_trait;

#[async_trait]
pub trait DashboardRepository: Send + Sync {
    /// Persist a dashboard, replacing any previous version with the same id
    async fn save(&self, dashboard: &SavedDashboard) -> anyhow::Result<()>;

    async fn load(&self, id: &str) -> anyhow::Result<Option<SavedDashboard>>;

    /// List stored dashboards, most recently saved first
    async fn list(&self) -> anyhow::Result<Vec<DashboardSummary>>;

    /// Returns false when nothing was stored under `id`
    async fn delete(&self, id: &str) -> anyhow::Result<bool>;
}
