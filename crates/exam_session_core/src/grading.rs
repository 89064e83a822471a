//! crates/exam_session_core/src/grading.rs
//!
//! Turns a submitted snapshot into a result summary. Single-choice questions with an
//! answer key are scored automatically; written answers need marks from a reviewer.

use crate::domain::{Answer, Question, QuestionId, QuestionKind, Snapshot};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MarksError {
    #[error("{given} exceeds the maximum of {max} marks")]
    ExceedsMaximum { given: u32, max: u32 },
    #[error("question {0} is scored automatically and takes no manual marks")]
    NotWritten(QuestionId),
}

/// Reads a marks entry the way the marking form does: leading digits are used and
/// input without leading digits counts as zero. Values above `max` are refused,
/// including ones too large to represent.
pub fn parse_marks(input: &str, max: u32) -> Result<u32, MarksError> {
    let digits: String = input
        .trim()
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    let given = if digits.is_empty() {
        0
    } else {
        // Only overflow can fail here; it saturates so the maximum check rejects it.
        digits.parse::<u32>().unwrap_or(u32::MAX)
    };
    if given > max {
        return Err(MarksError::ExceedsMaximum { given, max });
    }
    Ok(given)
}

/// Reviewer-entered marks for written answers.
#[derive(Debug, Clone, Default)]
pub struct MarkSheet {
    marks: HashMap<QuestionId, u32>,
}

impl MarkSheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates `input` against the question's point value and records it.
    pub fn record(&mut self, question: &Question, input: &str) -> Result<u32, MarksError> {
        if question.kind.is_choice() {
            return Err(MarksError::NotWritten(question.id.clone()));
        }
        let marks = parse_marks(input, question.points)?;
        self.marks.insert(question.id.clone(), marks);
        Ok(marks)
    }

    pub fn get(&self, id: &QuestionId) -> Option<u32> {
        self.marks.get(id).copied()
    }

    pub fn total(&self) -> u32 {
        self.marks.values().sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Correct,
    Incorrect,
    Unattempted,
    /// Written answer scored by a reviewer.
    Marked(u32),
    /// Attempted, but nothing can score it yet.
    PendingReview,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionResult {
    pub id: QuestionId,
    pub outcome: Outcome,
    pub awarded: u32,
    pub possible: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSummary {
    pub results: Vec<QuestionResult>,
    pub correct: usize,
    pub incorrect: usize,
    pub marked: usize,
    pub pending: usize,
    pub unattempted: usize,
    pub obtained: u32,
    pub total: u32,
    pub time_taken_secs: u64,
}

impl ResultSummary {
    /// Percentage of correct answers among automatically scored attempts.
    pub fn accuracy(&self) -> u32 {
        let scored = self.correct + self.incorrect;
        if scored == 0 {
            return 0;
        }
        ((self.correct * 100) / scored) as u32
    }
}

pub fn grade(questions: &[Question], snapshot: &Snapshot, marks: &MarkSheet) -> ResultSummary {
    let mut summary = ResultSummary {
        time_taken_secs: snapshot.elapsed_secs,
        ..ResultSummary::default()
    };

    for question in questions {
        let outcome = match (&question.kind, snapshot.answer(&question.id)) {
            (_, None) => Outcome::Unattempted,
            (QuestionKind::SingleChoice { correct: Some(key), .. }, Some(Answer::Choice(picked))) => {
                if picked == key {
                    Outcome::Correct
                } else {
                    Outcome::Incorrect
                }
            }
            (QuestionKind::SingleChoice { .. }, Some(_)) => Outcome::PendingReview,
            (_, Some(_)) => match marks.get(&question.id) {
                Some(awarded) => Outcome::Marked(awarded),
                None => Outcome::PendingReview,
            },
        };

        let awarded = match outcome {
            Outcome::Correct => question.points,
            Outcome::Marked(awarded) => awarded.min(question.points),
            _ => 0,
        };
        match outcome {
            Outcome::Correct => summary.correct += 1,
            Outcome::Incorrect => summary.incorrect += 1,
            Outcome::Unattempted => summary.unattempted += 1,
            Outcome::Marked(_) => summary.marked += 1,
            Outcome::PendingReview => summary.pending += 1,
        }
        summary.obtained += awarded;
        summary.total += question.points;
        summary.results.push(QuestionResult {
            id: question.id.clone(),
            outcome,
            awarded,
            possible: question.points,
        });
    }

    summary
}
