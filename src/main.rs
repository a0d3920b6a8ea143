// Main entry point - Dependency injection and server setup
mod domain;
mod application;
mod infrastructure;
mod presentation;

use std::{net::SocketAddr, sync::Arc};
use anyhow::Context;
use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::application::dashboard_service::DashboardService;
use crate::application::query_cache::QueryResultCache;
use crate::application::report_export::ReportExportPipeline;
use crate::application::widget_data_service::WidgetDataService;
use crate::infrastructure::config::{load_app_config, load_widget_catalog};
use crate::infrastructure::file_repository::FileDashboardRepository;
use crate::infrastructure::http_data_source::HttpWidgetDataSource;
use crate::presentation::app_state::AppState;
use crate::presentation::handlers;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let app_config = load_app_config()?;
    let catalog = load_widget_catalog()?;
    tracing::info!(widget_kinds = catalog.definitions().count(), "widget catalog loaded");

    // Adapters (infrastructure layer)
    let repository = Arc::new(FileDashboardRepository::new(app_config.storage.data_dir.clone()));
    tracing::info!(data_dir = %repository.root().display(), "dashboard storage ready");
    let data_source = Arc::new(HttpWidgetDataSource::new(
        app_config.data_source.base_url.clone(),
        app_config.data_source.timeout(),
    )?);
    let cache = Arc::new(QueryResultCache::new(app_config.cache.ttl()));

    // Services (application layer)
    let state = Arc::new(AppState {
        dashboard_service: DashboardService::new(repository, Arc::new(catalog)),
        widget_data_service: WidgetDataService::new(data_source, cache, app_config.data_source.timeout()),
        report_pipeline: ReportExportPipeline::new(app_config.export.timeout()),
    });

    // Downloads are compressed in the handlers, so no CompressionLayer here.
    let router = Router::new()
        .route("/healthz", get(handlers::health_check))
        .route("/catalog", get(handlers::list_catalog))
        .route("/dashboard", get(handlers::get_dashboard))
        .route("/dashboard/widgets", post(handlers::add_widget))
        .route("/dashboard/widgets/:id", delete(handlers::remove_widget))
        .route("/dashboard/widgets/:id/config", put(handlers::update_widget_config))
        .route("/dashboard/layout/optimize", post(handlers::optimize_layout))
        .route("/dashboard/breakpoint/:name", put(handlers::set_breakpoint))
        .route("/dashboard/validate", get(handlers::validate_dashboard))
        .route("/dashboard/save", post(handlers::save_dashboard))
        .route("/dashboard/export", get(handlers::export_dashboard))
        .route("/dashboard/import", post(handlers::import_dashboard))
        .route("/dashboard/clone", post(handlers::clone_dashboard))
        .route("/dashboard/refresh", post(handlers::refresh_dashboard))
        .route("/dashboards", get(handlers::list_dashboards))
        .route("/dashboards/:id", delete(handlers::delete_dashboard))
        .route("/dashboards/:id/load", post(handlers::load_dashboard))
        .route("/widgets/:id/data", get(handlers::widget_data))
        .route("/widgets/:id/cache", delete(handlers::clear_widget_cache))
        .route("/widgets/:id/report", get(handlers::widget_report))
        .route("/cache", delete(handlers::clear_cache))
        .route("/reports/export", post(handlers::export_report))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = app_config
        .server
        .bind
        .parse()
        .with_context(|| format!("Invalid bind address {}", app_config.server.bind))?;
    tracing::info!("Starting dashboard-composer service on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router).await?;

    Ok(())
}
