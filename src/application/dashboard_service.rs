// Dashboard service - Use cases over the current dashboard and its stored copies
use crate::application::dashboard_repository::DashboardRepository;
use crate::application::dashboard_store::DashboardConfigStore;
use crate::application::widget_data_service::WidgetRequest;
use crate::domain::dashboard::{DashboardConfig, DashboardError, DashboardExport, DashboardSummary, ValidationReport};
use crate::domain::layout::{Breakpoint, Position};
use crate::domain::widget::{WidgetCatalog, WidgetConfig, WidgetDefinition};
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct DashboardService {
    repository: Arc<dyn DashboardRepository>,
    catalog: Arc<WidgetCatalog>,
    store: Arc<Mutex<DashboardConfigStore>>,
}

impl DashboardService {
    pub fn new(repository: Arc<dyn DashboardRepository>, catalog: Arc<WidgetCatalog>) -> Self {
        Self {
            repository,
            catalog,
            store: Arc::new(Mutex::new(DashboardConfigStore::default())),
        }
    }

    pub fn catalog(&self) -> Vec<WidgetDefinition> {
        self.catalog.definitions().cloned().collect()
    }

    pub async fn current(&self) -> DashboardConfig {
        self.store.lock().await.dashboard().clone()
    }

    pub async fn add_widget(&self, widget_type: &str) -> Result<Position, DashboardError> {
        let definition = self
            .catalog
            .get(widget_type)
            .ok_or_else(|| DashboardError::UnknownWidgetType(widget_type.to_string()))?;
        Ok(self.store.lock().await.add_widget(widget_type, definition))
    }

    pub async fn remove_widget(&self, id: &str) -> Result<(), DashboardError> {
        self.store.lock().await.remove_widget(id)
    }

    pub async fn update_widget_config(&self, id: &str, config: WidgetConfig) -> Result<(), DashboardError> {
        self.store.lock().await.update_widget_config(id, config)
    }

    pub async fn optimize_layout(&self) -> Vec<Position> {
        let mut store = self.store.lock().await;
        let breakpoint = store.active_breakpoint();
        let layout = store.optimize_layout().to_vec();
        tracing::info!(breakpoint = breakpoint.as_str(), widgets = layout.len(), "layout compacted");
        layout
    }

    pub async fn set_breakpoint(&self, breakpoint: Breakpoint) {
        self.store.lock().await.set_active_breakpoint(breakpoint);
    }

    pub async fn validate(&self) -> ValidationReport {
        self.store.lock().await.validate()
    }

    /// Validates, then writes. Nothing is persisted when validation fails.
    pub async fn save(&self) -> Result<DashboardSummary, DashboardError> {
        let saved = self.store.lock().await.to_saved(Utc::now())?;
        self.repository
            .save(&saved)
            .await
            .map_err(DashboardError::Storage)?;
        tracing::info!(dashboard_id = %saved.id, name = %saved.name, "dashboard saved");
        Ok(saved.summary())
    }

    pub async fn load(&self, id: &str) -> Result<DashboardConfig, DashboardError> {
        let saved = self
            .repository
            .load(id)
            .await
            .map_err(DashboardError::Storage)?
            .ok_or_else(|| DashboardError::NotFound(id.to_string()))?;

        let mut store = self.store.lock().await;
        store.load(saved)?;
        Ok(store.dashboard().clone())
    }

    pub async fn list(&self) -> Result<Vec<DashboardSummary>, DashboardError> {
        self.repository.list().await.map_err(DashboardError::Storage)
    }

    pub async fn delete(&self, id: &str) -> Result<(), DashboardError> {
        let removed = self
            .repository
            .delete(id)
            .await
            .map_err(DashboardError::Storage)?;
        if removed {
            Ok(())
        } else {
            Err(DashboardError::NotFound(id.to_string()))
        }
    }

    pub async fn export(&self) -> DashboardExport {
        self.store.lock().await.export_dashboard(Utc::now())
    }

    pub async fn import(&self, content: &str) -> Result<DashboardConfig, DashboardError> {
        self.store
            .lock()
            .await
            .import_dashboard(content)
            .cloned()
    }

    pub async fn clone_dashboard(&self, new_name: Option<&str>) -> DashboardConfig {
        self.store.lock().await.clone_dashboard(new_name).clone()
    }

    pub async fn contains_widget(&self, widget_id: &str) -> bool {
        self.store.lock().await.dashboard().widgets.contains_key(widget_id)
    }

    /// Data request for one widget, using the `dataSource` of its config.
    pub async fn widget_request(&self, widget_id: &str, filters: Value) -> Result<WidgetRequest, DashboardError> {
        let store = self.store.lock().await;
        let dashboard = store.dashboard();
        if !dashboard.widgets.contains_key(widget_id) {
            return Err(DashboardError::WidgetNotFound(widget_id.to_string()));
        }
        Ok(build_request(dashboard, widget_id, filters))
    }

    /// Data requests for every widget on the dashboard, sharing one filter set.
    pub async fn widget_requests(&self, filters: Value) -> Vec<WidgetRequest> {
        let store = self.store.lock().await;
        let dashboard = store.dashboard();
        dashboard
            .widgets
            .keys()
            .map(|id| build_request(dashboard, id, filters.clone()))
            .collect()
    }
}

fn build_request(dashboard: &DashboardConfig, widget_id: &str, filters: Value) -> WidgetRequest {
    let data_source = dashboard
        .configs
        .get(widget_id)
        .and_then(|config| config.get("dataSource"))
        .and_then(Value::as_str)
        .map(str::to_string);

    WidgetRequest {
        widget_id: widget_id.to_string(),
        data_source,
        filters,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::dashboard::SavedDashboard;
    use crate::domain::widget::DefaultSize;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MemoryRepository {
        dashboards: std::sync::Mutex<HashMap<String, SavedDashboard>>,
    }

    #[async_trait]
    impl DashboardRepository for MemoryRepository {
        async fn save(&self, dashboard: &SavedDashboard) -> anyhow::Result<()> {
            self.dashboards
                .lock()
                .unwrap()
                .insert(dashboard.id.clone(), dashboard.clone());
            Ok(())
        }

        async fn load(&self, id: &str) -> anyhow::Result<Option<SavedDashboard>> {
            Ok(self.dashboards.lock().unwrap().get(id).cloned())
        }

        async fn list(&self) -> anyhow::Result<Vec<DashboardSummary>> {
            Ok(self
                .dashboards
                .lock()
                .unwrap()
                .values()
                .map(SavedDashboard::summary)
                .collect())
        }

        async fn delete(&self, id: &str) -> anyhow::Result<bool> {
            Ok(self.dashboards.lock().unwrap().remove(id).is_some())
        }
    }

    fn catalog() -> Arc<WidgetCatalog> {
        Arc::new(WidgetCatalog::from_definitions(vec![
            WidgetDefinition {
                widget_type: "kpi_card".into(),
                category: "kpi".into(),
                default_size: DefaultSize {
                    w: 4,
                    h: 3,
                    min_w: None,
                    min_h: None,
                },
                default_config: Some(
                    json!({"title": "Deposits", "dataSource": "deposits"})
                        .as_object()
                        .unwrap()
                        .clone(),
                ),
            },
            WidgetDefinition {
                widget_type: "notes".into(),
                category: "misc".into(),
                default_size: DefaultSize {
                    w: 2,
                    h: 2,
                    min_w: None,
                    min_h: None,
                },
                default_config: None,
            },
        ]))
    }

    fn service() -> (DashboardService, Arc<MemoryRepository>) {
        let repository = Arc::new(MemoryRepository::default());
        (DashboardService::new(repository.clone(), catalog()), repository)
    }

    #[tokio::test]
    async fn test_unknown_widget_type_rejected() {
        let (service, _) = service();
        let err = service.add_widget("pie").await.unwrap_err();
        assert!(matches!(err, DashboardError::UnknownWidgetType(_)));
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let (service, repository) = service();
        let position = service.add_widget("kpi_card").await.unwrap();
        let summary = service.save().await.unwrap();
        let saved_before = service.current().await;

        service.clone_dashboard(Some("Scratch")).await;
        let loaded = service.load(&summary.id).await.unwrap();

        assert_eq!(loaded, saved_before);
        assert!(loaded.widgets.contains_key(&position.i));
        assert_eq!(repository.dashboards.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_dashboard_is_not_persisted() {
        let (service, repository) = service();
        service.add_widget("notes").await.unwrap();

        let err = service.save().await.unwrap_err();

        assert!(matches!(err, DashboardError::Validation(ref errors) if errors.len() == 2));
        assert!(repository.dashboards.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_load_missing_dashboard() {
        let (service, _) = service();
        assert!(matches!(
            service.load("dash-missing").await,
            Err(DashboardError::NotFound(_))
        ));
        assert!(matches!(
            service.delete("dash-missing").await,
            Err(DashboardError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_widget_requests_use_data_source() {
        let (service, _) = service();
        let kpi = service.add_widget("kpi_card").await.unwrap();
        let notes = service.add_widget("notes").await.unwrap();

        let requests = service.widget_requests(json!({"period": "Q2"})).await;

        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].widget_id, kpi.i);
        assert_eq!(requests[0].data_source.as_deref(), Some("deposits"));
        assert_eq!(requests[1].widget_id, notes.i);
        assert_eq!(requests[1].data_source, None);
        assert!(service.widget_request("missing", json!({})).await.is_err());
    }

    #[tokio::test]
    async fn test_contains_widget_tracks_removal() {
        let (service, _) = service();
        let kpi = service.add_widget("kpi_card").await.unwrap();
        assert!(service.contains_widget(&kpi.i).await);

        service.remove_widget(&kpi.i).await.unwrap();
        assert!(!service.contains_widget(&kpi.i).await);
        assert!(!service.contains_widget("widget-missing").await);
    }
}
