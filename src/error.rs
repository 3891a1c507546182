use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to load input: {0}")]
    Load(String),

    #[error("Input is missing required column: {0}")]
    MissingColumn(String),

    #[error("Input contains no data rows: {0}")]
    EmptyInput(String),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Export failed: {0}")]
    Export(String),

    #[error("Workbook error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("Chart rendering failed: {0}")]
    Chart(String),

    #[error("Report subsection '{key}' failed: {details}")]
    Subsection { key: String, details: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ReportError {
    /// Errors that mean the source table could not be turned into records.
    pub fn is_load_failure(&self) -> bool {
        matches!(
            self,
            ReportError::Load(_)
                | ReportError::MissingColumn(_)
                | ReportError::EmptyInput(_)
                | ReportError::Spreadsheet(_)
                | ReportError::Csv(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ReportError>;
