use thiserror::Error;

/// Centralized error type for pipeline operations.
///
/// Hard failures only. Soft conditions (missing reconciled file, failed
/// post-processing, unknown size estimate) resolve through the normal
/// success path with degraded data and never appear here.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The external tool could not be started (not found, not executable)
    #[error("failed to spawn {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// The external tool ran but exited non-zero; carries its diagnostic output
    #[error("{tool} exited with code {code:?}: {stderr}")]
    ToolExit {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },

    /// Cooperative abort requested by the caller
    #[error("download cancelled")]
    Cancelled,

    /// Request validation errors
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Type alias for Result with PipelineError
pub type PipelineResult<T> = Result<T, PipelineError>;

impl PipelineError {
    /// Returns subcategory for logging
    pub fn subcategory(&self) -> &'static str {
        match self {
            PipelineError::Spawn { .. } => "spawn",
            PipelineError::ToolExit { .. } => "tool_exit",
            PipelineError::Cancelled => "cancelled",
            PipelineError::InvalidRequest(_) => "invalid_request",
            PipelineError::Io(_) => "io",
        }
    }

    /// Whether this error is a cooperative cancellation rather than a real failure.
    ///
    /// Callers use this to present a neutral message instead of an alarming one.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PipelineError::Cancelled)
    }
}
