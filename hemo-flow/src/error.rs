use thiserror::Error;

/// Document-level failures. Any of these aborts the whole submission and
/// leaves the previously displayed result set untouched.
#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("Unsupported file type: {0}. Please upload a PDF, JPG, or PNG file.")]
    InvalidFileType(String),

    #[error("No {0} API endpoint configured")]
    ConfigurationMissing(&'static str),

    #[error("OCR service error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Submission superseded by a newer document")]
    Superseded,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Failures of a single analysis request. They stay local to the analysis
/// session and never touch the measurement table.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("No {0} API endpoint configured")]
    ConfigurationMissing(&'static str),

    #[error("Agent service error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Something went wrong talking to an external service.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("request failed: {0}")]
    Network(String),

    #[error("server responded with status {0}")]
    Status(u16),

    #[error("malformed response: {0}")]
    Parse(String),
}

impl UpstreamError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            UpstreamError::Status(code) => Some(*code),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            UpstreamError::Parse(err.to_string())
        } else if let Some(status) = err.status() {
            UpstreamError::Status(status.as_u16())
        } else {
            UpstreamError::Network(err.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("All API endpoints are required ({0} is empty)")]
    Validation(&'static str),

    #[error("Configuration store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration store is corrupt: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A measurement value that does not read as a number. Absorbed by the
/// normalizer; the measurement is still shown with `unknown` status.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("not a number: {0:?}")]
pub struct MalformedNumeric(pub String);

pub type Result<T> = std::result::Result<T, SubmissionError>;
