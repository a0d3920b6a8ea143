// Report export pipeline - Format dispatch, filenames and bounded export execution
use crate::domain::report::ReportDocument;
use crate::infrastructure::export::{csv, pdf, spreadsheet, ExportError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Pdf,
    Xlsx,
    Csv,
    Json,
}

impl ReportFormat {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "pdf" => Some(ReportFormat::Pdf),
            "xlsx" | "excel" => Some(ReportFormat::Xlsx),
            "csv" => Some(ReportFormat::Csv),
            "json" => Some(ReportFormat::Json),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ReportFormat::Pdf => "pdf",
            ReportFormat::Xlsx => "xlsx",
            ReportFormat::Csv => "csv",
            ReportFormat::Json => "json",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ReportFormat::Pdf => "application/pdf",
            ReportFormat::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            ReportFormat::Csv => "text/csv",
            ReportFormat::Json => "application/json",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportArtifact {
    pub filename: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Failure shape handed back to callers instead of an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportOutcome {
    pub success: bool,
    pub message: String,
}

impl ExportOutcome {
    fn failed(err: &ExportError) -> Self {
        Self {
            success: false,
            message: err.to_string(),
        }
    }
}

/// `{widgetId}_report_{ms}.{ext}`, or `data_export_{ms}.csv` for CSV.
pub fn export_filename(widget_id: &str, format: ReportFormat, exported_at: DateTime<Utc>) -> String {
    let stamp = exported_at.timestamp_millis();
    match format {
        ReportFormat::Csv => format!("data_export_{}.csv", stamp),
        other => format!("{}_report_{}.{}", widget_id, stamp, other.extension()),
    }
}

/// Pure rendering step; no I/O.
pub fn render_report(
    doc: &ReportDocument,
    format: ReportFormat,
    exported_at: DateTime<Utc>,
) -> Result<ExportArtifact, ExportError> {
    let bytes = match format {
        ReportFormat::Pdf => pdf::render(doc)?,
        ReportFormat::Xlsx => spreadsheet::render(doc)?,
        ReportFormat::Csv => csv::render(doc),
        ReportFormat::Json => serde_json::to_vec_pretty(doc)?,
    };

    Ok(ExportArtifact {
        filename: export_filename(&doc.metadata.widget_id, format, exported_at),
        mime_type: format.mime_type(),
        bytes,
    })
}

#[derive(Clone)]
pub struct ReportExportPipeline {
    timeout: Duration,
}

impl ReportExportPipeline {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Renders off the async workers and gives up after the configured
    /// timeout. Every failure comes back as `{success: false, message}`.
    pub async fn export(&self, doc: ReportDocument, format: ReportFormat) -> Result<ExportArtifact, ExportOutcome> {
        let widget_id = doc.metadata.widget_id.clone();
        self.run(widget_id, format, move || render_report(&doc, format, Utc::now()))
            .await
    }

    async fn run<F>(&self, widget_id: String, format: ReportFormat, render: F) -> Result<ExportArtifact, ExportOutcome>
    where
        F: FnOnce() -> Result<ExportArtifact, ExportError> + Send + 'static,
    {
        let task = tokio::task::spawn_blocking(render);

        let result = match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(rendered)) => rendered,
            Ok(Err(join_error)) => Err(ExportError::Task(join_error.to_string())),
            Err(_) => Err(ExportError::TimedOut(self.timeout)),
        };

        match result {
            Ok(artifact) => {
                tracing::info!(
                    widget_id = %widget_id,
                    filename = %artifact.filename,
                    size = artifact.bytes.len(),
                    "report exported"
                );
                Ok(artifact)
            }
            Err(e) => {
                tracing::warn!(widget_id = %widget_id, ?format, "report export failed: {}", e);
                Err(ExportOutcome::failed(&e))
            }
        }
    }
}
