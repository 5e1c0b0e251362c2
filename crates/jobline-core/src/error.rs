use thiserror::Error;

#[derive(Debug, Error)]
pub enum JoblineError {
    #[error("Configuration error: {0}")]
    Config(String),
}

impl JoblineError {
    /// Short stable error code, suitable for logs and metrics labels.
    pub fn code(&self) -> &'static str {
        match self {
            JoblineError::Config(_) => "CONFIG_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, JoblineError>;
