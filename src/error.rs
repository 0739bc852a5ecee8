use thiserror::Error;

/// Everything a data section can fail with.
///
/// Field-level problems (an unparseable date or amount) never show up here:
/// those are coerced to missing and counted in the load report instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("source file not found: {path}")]
    MissingSourceFile { path: String },

    #[error("unexpected layout in {source_name}: {detail}")]
    SchemaMismatch { source_name: String, detail: String },

    #[error("network failure: {0}")]
    Network(String),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("spreadsheet error: {0}")]
    Spreadsheet(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl PipelineError {
    pub fn schema(source_name: impl Into<String>, detail: impl Into<String>) -> Self {
        PipelineError::SchemaMismatch {
            source_name: source_name.into(),
            detail: detail.into(),
        }
    }

    /// True when the section has nothing to show because its input is absent.
    pub fn is_missing_source(&self) -> bool {
        matches!(self, PipelineError::MissingSourceFile { .. })
    }
}

impl From<calamine::Error> for PipelineError {
    fn from(e: calamine::Error) -> Self {
        PipelineError::Spreadsheet(e.to_string())
    }
}

impl From<reqwest::Error> for PipelineError {
    fn from(e: reqwest::Error) -> Self {
        PipelineError::Network(e.to_string())
    }
}

impl From<toml::de::Error> for PipelineError {
    fn from(e: toml::de::Error) -> Self {
        PipelineError::Config(e.to_string())
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
