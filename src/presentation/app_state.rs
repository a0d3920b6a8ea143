// Application state for HTTP handlers
use crate::application::dashboard_service::DashboardService;
use crate::application::report_export::ReportExportPipeline;
use crate::application::widget_data_service::WidgetDataService;

#[derive(Clone)]
pub struct AppState {
    pub dashboard_service: DashboardService,
    pub widget_data_service: WidgetDataService,
    pub report_pipeline: ReportExportPipeline,
}
