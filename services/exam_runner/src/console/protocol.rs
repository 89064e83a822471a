//! services/exam_runner/src/console/protocol.rs
//!
//! Defines the JSON events the runner writes to stdout, one per line, for whatever
//! screen sits on top of it.

use exam_session_core::domain::{Question, QuestionKind};
use exam_session_core::grading::ResultSummary;
use exam_session_core::session::{QuestionStatus, SessionSummary};
use exam_session_core::time_fmt::{format_clock, format_time_taken};
use serde::Serialize;
use uuid::Uuid;

/// One cell of the navigation strip.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct StripCell {
    pub number: usize,
    pub id: String,
    pub answered: bool,
    pub flagged: bool,
    pub current: bool,
}

impl From<&QuestionStatus> for StripCell {
    fn from(status: &QuestionStatus) -> Self {
        Self {
            number: status.index + 1,
            id: status.id.to_string(),
            answered: status.answered,
            flagged: status.flagged,
            current: status.current,
        }
    }
}

/// Represents the structured events the runner emits.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConsoleEvent {
    /// The session is running and the clock has started.
    SessionStarted {
        session_id: Uuid,
        title: String,
        total_questions: usize,
        time_left: String,
    },

    /// The question the learner is currently looking at.
    Question {
        number: usize,
        total: usize,
        id: String,
        kind: &'static str,
        prompt: String,
        marks: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        choices: Option<Vec<String>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        reference_image: Option<String>,
        /// When true the screen offers "submit" instead of "next".
        is_last: bool,
    },

    /// Periodic countdown update for the header.
    Clock { time_left: String },

    /// Acknowledges a command that changed nothing visible elsewhere.
    Ack { message: String },

    Status {
        phase: String,
        answered: usize,
        total: usize,
        flagged: usize,
        time_left: String,
        strip: Vec<StripCell>,
    },

    /// Asks the learner to confirm before anything is delivered. `confirm` submits;
    /// `cancel` or any other command returns to answering.
    ConfirmSubmit {
        answered: usize,
        total: usize,
        flagged: usize,
    },

    /// The submission is in flight; further submits are ignored.
    Submitting,

    Submitted {
        submission_id: Uuid,
        answered: usize,
        total: usize,
        time_taken: String,
    },

    /// Submission failed. The answers are kept; the learner may retry, or resume
    /// answering while time remains.
    SubmitFailed { message: String, can_resume: bool },

    Result {
        obtained: u32,
        total: u32,
        correct: usize,
        incorrect: usize,
        pending_review: usize,
        unattempted: usize,
        accuracy: u32,
        time_taken: String,
    },

    /// The learner left without submitting.
    Abandoned,

    /// A command could not be applied.
    Error { message: String },
}

impl ConsoleEvent {
    pub fn question(question: &Question, index: usize, total: usize) -> Self {
        let (choices, reference_image) = match &question.kind {
            QuestionKind::SingleChoice { choices, .. } => (Some(choices.clone()), None),
            QuestionKind::FreeText => (None, None),
            QuestionKind::ImageAnnotated { reference_image } => {
                (None, Some(reference_image.clone()))
            }
        };
        ConsoleEvent::Question {
            number: index + 1,
            total,
            id: question.id.to_string(),
            kind: question.kind.label(),
            prompt: question.prompt.clone(),
            marks: question.points,
            choices,
            reference_image,
            is_last: index + 1 >= total,
        }
    }

    pub fn clock(remaining_secs: u64) -> Self {
        ConsoleEvent::Clock {
            time_left: format_clock(remaining_secs),
        }
    }

    pub fn status(summary: &SessionSummary, strip: &[QuestionStatus]) -> Self {
        ConsoleEvent::Status {
            phase: summary.phase.to_string(),
            answered: summary.answered_count,
            total: summary.total_count,
            flagged: summary.flagged_count,
            time_left: format_clock(summary.remaining_secs),
            strip: strip.iter().map(StripCell::from).collect(),
        }
    }

    pub fn confirm_submit(summary: &SessionSummary) -> Self {
        ConsoleEvent::ConfirmSubmit {
            answered: summary.answered_count,
            total: summary.total_count,
            flagged: summary.flagged_count,
        }
    }

    pub fn result(result: &ResultSummary) -> Self {
        ConsoleEvent::Result {
            obtained: result.obtained,
            total: result.total,
            correct: result.correct,
            incorrect: result.incorrect,
            pending_review: result.pending,
            unattempted: result.unattempted,
            accuracy: result.accuracy(),
            time_taken: format_time_taken(result.time_taken_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exam_session_core::domain::ChoiceIndex;

    #[test]
    fn question_event_is_tagged_and_skips_empty_fields() {
        let question = Question {
            id: "q1".into(),
            kind: QuestionKind::SingleChoice {
                choices: vec!["True".into(), "False".into()],
                correct: Some(ChoiceIndex(0)),
            },
            prompt: "The integral of 2x is x² + C".into(),
            points: 1,
        };

        let json = serde_json::to_value(ConsoleEvent::question(&question, 1, 2)).unwrap();

        assert_eq!(json["type"], "question");
        assert_eq!(json["number"], 2);
        assert_eq!(json["kind"], "single-choice");
        assert_eq!(json["choices"][1], "False");
        assert_eq!(json["is_last"], true);
        assert!(json.get("reference_image").is_none());
        assert!(json.get("correct").is_none(), "the answer key never leaves the core");
    }

    #[test]
    fn clock_event_uses_header_format() {
        let json = serde_json::to_value(ConsoleEvent::clock(3725)).unwrap();
        assert_eq!(json, serde_json::json!({"type": "clock", "time_left": "01:02:05"}));
    }
}
