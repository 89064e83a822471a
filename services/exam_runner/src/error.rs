//! services/exam_runner/src/error.rs
//!
//! Defines the primary error type for the runner service.

use crate::config::ConfigError;
use exam_session_core::ports::PortError;
use exam_session_core::session::SessionError;

/// The primary error type for the `exam_runner` service.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents a session transition that could not be made.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Represents an error while encoding console events.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Represents a standard Input/Output error (e.g., reading stdin).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
