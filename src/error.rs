use std::path::PathBuf;

/// Errors raised by the fitting library.
///
/// Variants follow the failure classes of a fit run: bad user configuration,
/// violated preconditions (integration bugs), unreadable inputs, and numerical
/// breakdowns.
#[derive(Debug, thiserror::Error)]
pub enum FitError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Precondition violated: {0}")]
    Precondition(String),

    #[error("Failed to load '{}': {message}", path.display())]
    DataSource { path: PathBuf, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Numerical error: {0}")]
    Numerical(String),
}

impl FitError {
    pub fn data_source(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::DataSource {
            path: path.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FitError>;

/// Error reported by the `jecfit` binary, carrying the process exit code.
#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<FitError> for AppError {
    fn from(err: FitError) -> Self {
        let exit_code = match &err {
            FitError::Config(_) => 2,
            FitError::DataSource { .. } | FitError::Io(_) | FitError::Json(_) => 3,
            FitError::Precondition(_) | FitError::Numerical(_) => 4,
        };
        Self::new(exit_code, err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}
