//! Failure taxonomy for the load/compile pipeline
//!
//! Pipeline failures never reject the pipeline itself; they resolve into
//! absent-source/absent-module units and a [`PipelineError`] entry in the
//! orchestrator's error cache. Only registry misuse and configuration
//! mistakes are surfaced as `Err` to callers, because those indicate host
//! application programming errors.

use thiserror::Error;

/// Classification of a cached pipeline failure, used to decide retry
/// eligibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Connectivity was lost; the next request retries
    ConnectionLost,
    /// The source could not be loaded (bad URL, HTTP failure); the
    /// loader memoizes the name and stops re-fetching
    Load,
    /// Executing the bundle failed; sticky for the process lifetime
    /// unless the retry policy says otherwise
    Compile,
}

/// A classified failure recorded in the per-bundle error cache
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    #[error("internet connection lost while loading \"{name}\": {message}")]
    ConnectionLost { name: String, message: String },

    #[error("cant load bundle \"{name}\": {message}")]
    Load { name: String, message: String },

    #[error("cant compile bundle \"{name}\": {message}")]
    Compile { name: String, message: String },
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::ConnectionLost { .. } => ErrorKind::ConnectionLost,
            PipelineError::Load { .. } => ErrorKind::Load,
            PipelineError::Compile { .. } => ErrorKind::Compile,
        }
    }

    /// Name of the bundle the failure belongs to
    pub fn bundle_name(&self) -> &str {
        match self {
            PipelineError::ConnectionLost { name, .. }
            | PipelineError::Load { name, .. }
            | PipelineError::Compile { name, .. } => name,
        }
    }
}

/// What the narrow fetch primitive reports
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport-level failure; retryable on the next request
    #[error("internet connection lost: {0}")]
    ConnectionLost(String),

    /// The server answered with a non-success status; memoized as
    /// permanently dead
    #[error("http status {0}")]
    Status(u16),
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::ConnectionLost(_))
    }
}

/// Failure produced by a pluggable compile step
#[derive(Debug, Error)]
#[error("{0}")]
pub struct CompileError(pub String);

/// Failure produced by invoking an exported bundle function
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ExportError(pub String);
