//! crates/exam_session_core/src/ports.rs
//!
//! Defines the service contracts (traits) the session engine talks to.
//! These traits form the boundary of the hexagonal architecture, keeping the core
//! independent of where questions come from and where submissions go.

use crate::domain::{ExamInfo, Question, Snapshot, SubmissionReceipt};
use async_trait::async_trait;
use uuid::Uuid;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Rejected by the backend: {0}")]
    Rejected(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait SubmissionSink: Send + Sync {
    /// Delivers a finished session. Called at most once per submission attempt.
    async fn submit(&self, snapshot: &Snapshot) -> PortResult<SubmissionReceipt>;
}

#[async_trait]
pub trait QuestionSource: Send + Sync {
    /// Loads the exam header and its ordered question set.
    async fn load_exam(&self, exam_id: Uuid) -> PortResult<(ExamInfo, Vec<Question>)>;
}
