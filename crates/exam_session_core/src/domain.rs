//! crates/exam_session_core/src/domain.rs
//!
//! Defines the pure, core data structures for an exam session.
//! These structs are independent of any storage or serialization format.

use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

//=========================================================================================
// Identifiers
//=========================================================================================

/// Stable identifier of a question within an exam.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QuestionId(String);

impl QuestionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for QuestionId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Position of an option in a single-choice question. Always 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChoiceIndex(pub usize);

impl ChoiceIndex {
    pub fn get(self) -> usize {
        self.0
    }
}

/// Reference (usually a URI) to an image the learner attached to an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef(String);

impl ImageRef {
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ImageRef {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

//=========================================================================================
// Questions
//=========================================================================================

/// The shape of a question, carrying the data only that shape needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionKind {
    SingleChoice {
        choices: Vec<String>,
        /// The answer key, when the exam author supplied one.
        correct: Option<ChoiceIndex>,
    },
    FreeText,
    ImageAnnotated {
        reference_image: String,
    },
}

impl QuestionKind {
    pub fn is_choice(&self) -> bool {
        matches!(self, QuestionKind::SingleChoice { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            QuestionKind::SingleChoice { .. } => "single-choice",
            QuestionKind::FreeText => "free-text",
            QuestionKind::ImageAnnotated { .. } => "image-annotated",
        }
    }
}

/// A question as delivered before the session starts. Immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub id: QuestionId,
    pub kind: QuestionKind,
    pub prompt: String,
    pub points: u32,
}

//=========================================================================================
// Answers
//=========================================================================================

/// Text plus attached images, used by free-text and image-annotated questions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WrittenAnswer {
    pub text: String,
    pub images: Vec<ImageRef>,
}

/// The learner's current answer to one question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    Choice(ChoiceIndex),
    Written(WrittenAnswer),
}

impl Answer {
    pub fn as_choice(&self) -> Option<ChoiceIndex> {
        match self {
            Answer::Choice(choice) => Some(*choice),
            Answer::Written(_) => None,
        }
    }

    pub fn as_written(&self) -> Option<&WrittenAnswer> {
        match self {
            Answer::Written(written) => Some(written),
            Answer::Choice(_) => None,
        }
    }
}

//=========================================================================================
// Session identity and submission payloads
//=========================================================================================

/// The exam being taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExamInfo {
    pub id: Uuid,
    pub title: String,
    pub duration_secs: u64,
}

/// Who is taking which exam. Passed in when the session is built, never looked up
/// from global state.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub session_id: Uuid,
    pub learner_id: Uuid,
    pub exam: ExamInfo,
}

impl SessionContext {
    pub fn new(learner_id: Uuid, exam: ExamInfo) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            learner_id,
            exam,
        }
    }
}

/// What caused a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitTrigger {
    Manual,
    ClockExpired,
}

/// The payload handed to the submission sink.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub session_id: Uuid,
    pub learner_id: Uuid,
    pub exam_id: Uuid,
    pub answered_count: usize,
    pub total_count: usize,
    /// Answers in question order; unattempted questions are absent.
    pub answers: Vec<(QuestionId, Answer)>,
    pub flagged: Vec<QuestionId>,
    pub elapsed_secs: u64,
    pub trigger: SubmitTrigger,
    pub submitted_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn answer(&self, id: &QuestionId) -> Option<&Answer> {
        self.answers
            .iter()
            .find(|(question_id, _)| question_id == id)
            .map(|(_, answer)| answer)
    }
}

/// Acknowledgement returned by the sink for an accepted snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReceipt {
    pub submission_id: Uuid,
    pub accepted_at: DateTime<Utc>,
}
