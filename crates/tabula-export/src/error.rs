//! Error types for the export sink.

use thiserror::Error;

/// Errors that can occur while building the export artifact.
#[derive(Debug, Error)]
pub enum ExportError {
    /// A row arrived before any header was recorded
    #[error("row appended before a header was recorded")]
    HeaderNotRecorded,

    /// Finalize was called on a sink that never received a row
    #[error("no data written: the job yielded zero result rows")]
    NoDataWritten,

    /// CSV serialization failed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Spreadsheet conversion failed
    #[error("spreadsheet error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    /// I/O error creating or flushing artifact files
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for export operations.
pub type Result<T> = std::result::Result<T, ExportError>;
