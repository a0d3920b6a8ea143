// Report renderers - Turn a ReportDocument into downloadable artifacts
pub mod csv;
pub mod pdf;
pub mod spreadsheet;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("PDF rendering failed: {0}")]
    Pdf(String),

    #[error("spreadsheet rendering failed: {0}")]
    Spreadsheet(#[from] rust_xlsxwriter::XlsxError),

    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("export timed out after {0:?}")]
    TimedOut(std::time::Duration),

    #[error("export task failed: {0}")]
    Task(String),
}
