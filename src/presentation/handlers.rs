// HTTP request handlers
use crate::application::report_export::{ExportOutcome, ReportFormat};
use crate::application::widget_data_service::WidgetData;
use crate::domain::dashboard::{DashboardConfig, DashboardError, DashboardSummary, ValidationReport};
use crate::domain::layout::{Breakpoint, Position};
use crate::domain::report::ReportDocument;
use crate::domain::widget::{WidgetConfig, WidgetDefinition};
use crate::infrastructure::http_response::{accepts_brotli, download_response};
use crate::presentation::app_state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures::future::AbortHandle;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

const JSON_MIME: &str = "application/json";

/// Everything a handler can fail with, mapped onto a status and JSON body.
#[derive(Debug)]
pub enum ApiError {
    Dashboard(DashboardError),
    BadRequest(String),
    Upstream(anyhow::Error),
    Export(ExportOutcome),
    Internal(String),
}

impl From<DashboardError> for ApiError {
    fn from(err: DashboardError) -> Self {
        ApiError::Dashboard(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Dashboard(DashboardError::Validation(errors)) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ValidationReport {
                    is_valid: false,
                    errors,
                }),
            )
                .into_response(),
            ApiError::Dashboard(err) => {
                let status = match &err {
                    DashboardError::InvalidImport(_) | DashboardError::UnknownWidgetType(_) => {
                        StatusCode::BAD_REQUEST
                    }
                    DashboardError::WidgetNotFound(_) | DashboardError::NotFound(_) => {
                        StatusCode::NOT_FOUND
                    }
                    DashboardError::Storage(_)
                    | DashboardError::CorruptDashboard(..)
                    | DashboardError::Validation(_) => {
                        tracing::error!("dashboard request failed: {}", err);
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                error_body(status, err.to_string())
            }
            ApiError::BadRequest(message) => error_body(StatusCode::BAD_REQUEST, message),
            ApiError::Upstream(err) => {
                tracing::warn!("data source request failed: {:#}", err);
                error_body(StatusCode::BAD_GATEWAY, format!("{:#}", err))
            }
            ApiError::Export(outcome) => {
                (StatusCode::INTERNAL_SERVER_ERROR, Json(outcome)).into_response()
            }
            ApiError::Internal(message) => {
                tracing::error!("{}", message);
                error_body(StatusCode::INTERNAL_SERVER_ERROR, message)
            }
        }
    }
}

fn error_body(status: StatusCode, message: String) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// Query parameters other than `format` become the filter object.
fn filters_from_query(mut params: BTreeMap<String, String>) -> (Option<String>, Value) {
    let format = params.remove("format");
    let filters: Map<String, Value> = params
        .into_iter()
        .map(|(k, v)| (k, Value::String(v)))
        .collect();
    (format, Value::Object(filters))
}

fn parse_format(format: Option<&str>) -> Result<ReportFormat, ApiError> {
    let name = format.ok_or_else(|| ApiError::BadRequest("missing 'format' parameter".to_string()))?;
    ReportFormat::parse(name)
        .ok_or_else(|| ApiError::BadRequest(format!("unsupported export format '{}'", name)))
}

/// Aborts the background load when the request future is dropped.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[derive(Deserialize)]
pub struct AddWidgetRequest {
    #[serde(rename = "type")]
    pub widget_type: String,
}

#[derive(Deserialize)]
pub struct CloneRequest {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Deserialize)]
pub struct FormatQuery {
    pub format: Option<String>,
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

pub async fn list_catalog(State(state): State<Arc<AppState>>) -> Json<Vec<WidgetDefinition>> {
    Json(state.dashboard_service.catalog())
}

pub async fn get_dashboard(State(state): State<Arc<AppState>>) -> Json<DashboardConfig> {
    Json(state.dashboard_service.current().await)
}

pub async fn add_widget(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AddWidgetRequest>,
) -> Result<(StatusCode, Json<Position>), ApiError> {
    let position = state
        .dashboard_service
        .add_widget(&request.widget_type)
        .await?;
    Ok((StatusCode::CREATED, Json(position)))
}

pub async fn remove_widget(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<StatusCode, ApiError> {
    state.dashboard_service.remove_widget(&id).await?;
    state.widget_data_service.invalidate_widget(&id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_widget_config(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(config): Json<WidgetConfig>,
) -> Result<StatusCode, ApiError> {
    state
        .dashboard_service
        .update_widget_config(&id, config)
        .await?;
    // Cached results were fetched with the previous data source.
    state.widget_data_service.invalidate_widget(&id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn optimize_layout(State(state): State<Arc<AppState>>) -> Json<Vec<Position>> {
    Json(state.dashboard_service.optimize_layout().await)
}

pub async fn set_breakpoint(
    Path(name): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<StatusCode, ApiError> {
    let breakpoint = Breakpoint::parse(&name)
        .ok_or_else(|| ApiError::BadRequest(format!("unknown breakpoint '{}'", name)))?;
    state.dashboard_service.set_breakpoint(breakpoint).await;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn validate_dashboard(State(state): State<Arc<AppState>>) -> Json<ValidationReport> {
    Json(state.dashboard_service.validate().await)
}

pub async fn save_dashboard(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DashboardSummary>, ApiError> {
    Ok(Json(state.dashboard_service.save().await?))
}

pub async fn list_dashboards(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<DashboardSummary>>, ApiError> {
    Ok(Json(state.dashboard_service.list().await?))
}

pub async fn load_dashboard(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<DashboardConfig>, ApiError> {
    Ok(Json(state.dashboard_service.load(&id).await?))
}

pub async fn delete_dashboard(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<StatusCode, ApiError> {
    state.dashboard_service.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Dashboard interchange file as a download
pub async fn export_dashboard(
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Result<Response, ApiError> {
    let export = state.dashboard_service.export().await;
    let body = serde_json::to_vec_pretty(&export)
        .map_err(|e| ApiError::Internal(format!("dashboard export encoding failed: {}", e)))?;
    let filename = format!("dashboard_{}.json", export.export_date.timestamp_millis());

    download_response(body, &filename, JSON_MIME, accepts_brotli(&headers))
        .await
        .map_err(|status| ApiError::Internal(format!("download response failed: {}", status)))
}

pub async fn import_dashboard(
    State(state): State<Arc<AppState>>,
    body: String,
) -> Result<Json<DashboardConfig>, ApiError> {
    Ok(Json(state.dashboard_service.import(&body).await?))
}

pub async fn clone_dashboard(
    State(state): State<Arc<AppState>>,
    request: Option<Json<CloneRequest>>,
) -> Json<DashboardConfig> {
    let name = request.and_then(|Json(request)| request.name);
    Json(state.dashboard_service.clone_dashboard(name.as_deref()).await)
}

/// Cached data for one widget, or a widget-local error entry
pub async fn widget_data(
    Path(id): Path<String>,
    Query(params): Query<BTreeMap<String, String>>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<WidgetData>, ApiError> {
    let (_, filters) = filters_from_query(params);
    let request = state.dashboard_service.widget_request(&id, filters).await?;

    let (task, abort_handle) = state.widget_data_service.spawn_load(request);
    let _guard = AbortOnDrop(abort_handle);

    match task.await {
        Ok(Some(data)) => Ok(Json(data)),
        Ok(None) => Err(ApiError::Internal(format!("load of widget {} was cancelled", id))),
        Err(e) => Err(ApiError::Internal(format!("load of widget {} failed: {}", id, e))),
    }
}

/// Loads every widget concurrently. Individual failures stay in their entries.
pub async fn refresh_dashboard(
    Query(params): Query<BTreeMap<String, String>>,
    State(state): State<Arc<AppState>>,
) -> Json<Vec<WidgetData>> {
    let (_, filters) = filters_from_query(params);
    let requests = state.dashboard_service.widget_requests(filters).await;
    Json(state.widget_data_service.load_all(&requests).await)
}

pub async fn clear_widget_cache(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Json<Value> {
    let removed = state.widget_data_service.invalidate_widget(&id);
    Json(json!({ "removed": removed }))
}

pub async fn clear_cache(State(state): State<Arc<AppState>>) -> StatusCode {
    state.widget_data_service.clear_cache();
    StatusCode::NO_CONTENT
}

/// Fetches the widget's report document and exports it in the requested format
pub async fn widget_report(
    Path(id): Path<String>,
    Query(params): Query<BTreeMap<String, String>>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Result<Response, ApiError> {
    let (format, filters) = filters_from_query(params);
    let format = parse_format(format.as_deref())?;
    if !state.dashboard_service.contains_widget(&id).await {
        return Err(DashboardError::WidgetNotFound(id).into());
    }

    let doc = state
        .widget_data_service
        .fetch_report(&id, &filters)
        .await
        .map_err(ApiError::Upstream)?;

    export_download(&state, doc, format, &headers).await
}

/// Exports a report document supplied by the caller
pub async fn export_report(
    Query(query): Query<FormatQuery>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
    Json(doc): Json<ReportDocument>,
) -> Result<Response, ApiError> {
    let format = parse_format(query.format.as_deref())?;
    export_download(&state, doc, format, &headers).await
}

async fn export_download(
    state: &AppState,
    doc: ReportDocument,
    format: ReportFormat,
    headers: &HeaderMap,
) -> Result<Response, ApiError> {
    let artifact = state
        .report_pipeline
        .export(doc, format)
        .await
        .map_err(ApiError::Export)?;

    download_response(
        artifact.bytes,
        &artifact.filename,
        artifact.mime_type,
        accepts_brotli(headers),
    )
    .await
    .map_err(|status| ApiError::Internal(format!("download response failed: {}", status)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::dashboard_service::DashboardService;
    use crate::application::query_cache::{QueryResultCache, DEFAULT_TTL};
    use crate::application::report_export::ReportExportPipeline;
    use crate::application::widget_data_service::WidgetDataService;
    use crate::application::widget_data_source::WidgetDataSource;
    use crate::infrastructure::config::parse_widget_catalog;
    use crate::infrastructure::file_repository::FileDashboardRepository;
    use async_trait::async_trait;
    use axum::http::header;
    use std::time::Duration;

    struct StaticSource;

    #[async_trait]
    impl WidgetDataSource for StaticSource {
        async fn fetch(&self, widget_id: &str, data_source: &str, filters: &Value) -> anyhow::Result<Value> {
            Ok(json!({"widget": widget_id, "source": data_source, "filters": filters}))
        }

        async fn fetch_report(&self, widget_id: &str, filters: &Value) -> anyhow::Result<ReportDocument> {
            Ok(serde_json::from_value(json!({
                "metadata": {
                    "title": "Deposits",
                    "widgetId": widget_id,
                    "filters": filters,
                    "generatedAt": "2026-03-01T09:30:00Z"
                },
                "raw": [{"account": "A-1", "balance": 10}]
            }))?)
        }
    }

    fn state(dir: &std::path::Path) -> Arc<AppState> {
        let catalog = parse_widget_catalog(
            r#"
            [[widgets]]
            type = "kpi_card"
            category = "kpi"
            default_size = { w = 3, h = 2 }
            default_config = { title = "Deposits", dataSource = "deposits" }
            "#,
        )
        .unwrap();
        let cache = Arc::new(QueryResultCache::new(DEFAULT_TTL));
        Arc::new(AppState {
            dashboard_service: DashboardService::new(
                Arc::new(FileDashboardRepository::new(dir)),
                Arc::new(catalog),
            ),
            widget_data_service: WidgetDataService::new(
                Arc::new(StaticSource),
                cache,
                Duration::from_secs(5),
            ),
            report_pipeline: ReportExportPipeline::new(Duration::from_secs(30)),
        })
    }

    fn query(pairs: &[(&str, &str)]) -> Query<BTreeMap<String, String>> {
        Query(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_filters_exclude_format() {
        let (format, filters) = filters_from_query(query(&[("format", "csv"), ("branch", "north")]).0);
        assert_eq!(format.as_deref(), Some("csv"));
        assert_eq!(filters, json!({"branch": "north"}));
    }

    #[test]
    fn test_error_statuses() {
        let validation = ApiError::from(DashboardError::Validation(vec!["x".into()])).into_response();
        assert_eq!(validation.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let import = ApiError::from(DashboardError::InvalidImport("bad".into())).into_response();
        assert_eq!(import.status(), StatusCode::BAD_REQUEST);

        let missing = ApiError::from(DashboardError::NotFound("d".into())).into_response();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let export = ApiError::Export(ExportOutcome {
            success: false,
            message: "boom".into(),
        })
        .into_response();
        assert_eq!(export.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_add_save_and_list() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());

        let (status, Json(position)) = add_widget(
            State(state.clone()),
            Json(AddWidgetRequest {
                widget_type: "kpi_card".into(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!((position.x, position.y), (0, 0));

        let Json(summary) = save_dashboard(State(state.clone())).await.unwrap();
        let Json(listed) = list_dashboards(State(state.clone())).await.unwrap();
        assert_eq!(listed, vec![summary]);
    }

    #[tokio::test]
    async fn test_unknown_breakpoint_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let result = set_breakpoint(Path("huge".into()), State(state(dir.path()))).await;
        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_widget_data_is_cached_per_filters() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());
        let (_, Json(position)) = add_widget(
            State(state.clone()),
            Json(AddWidgetRequest {
                widget_type: "kpi_card".into(),
            }),
        )
        .await
        .unwrap();

        let first = widget_data(Path(position.i.clone()), query(&[("period", "Q1")]), State(state.clone()))
            .await
            .unwrap()
            .0;
        let second = widget_data(Path(position.i.clone()), query(&[("period", "Q1")]), State(state.clone()))
            .await
            .unwrap()
            .0;

        assert!(matches!(first, WidgetData::Ready { cached: false, .. }));
        assert!(matches!(second, WidgetData::Ready { cached: true, .. }));
    }

    #[tokio::test]
    async fn test_config_update_drops_cached_data() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());
        let (_, Json(position)) = add_widget(
            State(state.clone()),
            Json(AddWidgetRequest {
                widget_type: "kpi_card".into(),
            }),
        )
        .await
        .unwrap();

        widget_data(Path(position.i.clone()), query(&[]), State(state.clone()))
            .await
            .unwrap();

        let config = json!({"title": "Loans", "dataSource": "loans"})
            .as_object()
            .unwrap()
            .clone();
        let status = update_widget_config(Path(position.i.clone()), State(state.clone()), Json(config))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);

        let Json(reloaded) = widget_data(Path(position.i.clone()), query(&[]), State(state.clone()))
            .await
            .unwrap();
        match reloaded {
            WidgetData::Ready { data, cached, .. } => {
                assert!(!cached);
                assert_eq!(data["source"], "loans");
            }
            other => panic!("unexpected widget data: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_report_for_unknown_widget_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let result = widget_report(
            Path("widget-x".into()),
            query(&[("format", "csv")]),
            HeaderMap::new(),
            State(state(dir.path())),
        )
        .await;
        assert!(matches!(
            result,
            Err(ApiError::Dashboard(DashboardError::WidgetNotFound(ref id))) if id == "widget-x"
        ));
    }

    #[tokio::test]
    async fn test_widget_report_download() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());
        let (_, Json(position)) = add_widget(
            State(state.clone()),
            Json(AddWidgetRequest {
                widget_type: "kpi_card".into(),
            }),
        )
        .await
        .unwrap();

        let response = widget_report(
            Path(position.i.clone()),
            query(&[("format", "csv")]),
            HeaderMap::new(),
            State(state.clone()),
        )
        .await
        .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/csv");
        let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap();
        assert!(disposition.starts_with("attachment; filename=\"data_export_"));
    }

    #[tokio::test]
    async fn test_report_requires_known_format() {
        let dir = tempfile::tempdir().unwrap();
        let result = widget_report(
            Path("widget-x".into()),
            query(&[("format", "docx")]),
            HeaderMap::new(),
            State(state(dir.path())),
        )
        .await;
        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }
}
