//! crates/exam_session_core/src/ledger.rs
//!
//! The answer ledger: question id to the learner's current answer.

use crate::domain::{Answer, ChoiceIndex, ImageRef, Question, QuestionId, QuestionKind, WrittenAnswer};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("question {0} is not part of this exam")]
    UnknownQuestion(QuestionId),
    #[error("question {id} is {kind}, which does not accept this kind of answer")]
    KindMismatch { id: QuestionId, kind: &'static str },
    #[error("choice {choice} is out of range for question {id} ({available} options)")]
    ChoiceOutOfRange {
        id: QuestionId,
        choice: usize,
        available: usize,
    },
}

/// What a question will accept, derived once from its kind.
#[derive(Debug, Clone, Copy)]
enum Slot {
    Choice { options: usize },
    Written { kind: &'static str },
}

#[derive(Debug, Clone)]
pub struct AnswerLedger {
    order: Vec<QuestionId>,
    slots: HashMap<QuestionId, Slot>,
    entries: HashMap<QuestionId, Answer>,
}

impl AnswerLedger {
    pub fn new(questions: &[Question]) -> Self {
        let mut order = Vec::with_capacity(questions.len());
        let mut slots = HashMap::with_capacity(questions.len());
        for question in questions {
            let slot = match &question.kind {
                QuestionKind::SingleChoice { choices, .. } => Slot::Choice {
                    options: choices.len(),
                },
                other => Slot::Written { kind: other.label() },
            };
            if slots.insert(question.id.clone(), slot).is_none() {
                order.push(question.id.clone());
            }
        }
        Self {
            order,
            slots,
            entries: HashMap::new(),
        }
    }

    fn slot(&self, id: &QuestionId) -> Result<Slot, LedgerError> {
        self.slots
            .get(id)
            .copied()
            .ok_or_else(|| LedgerError::UnknownQuestion(id.clone()))
    }

    /// Returns the written answer for `id`, creating an empty one on first touch.
    fn written_mut(&mut self, id: &QuestionId) -> Result<&mut WrittenAnswer, LedgerError> {
        match self.slot(id)? {
            Slot::Choice { .. } => Err(LedgerError::KindMismatch {
                id: id.clone(),
                kind: "single-choice",
            }),
            Slot::Written { kind } => {
                let entry = self
                    .entries
                    .entry(id.clone())
                    .or_insert_with(|| Answer::Written(WrittenAnswer::default()));
                match entry {
                    Answer::Written(written) => Ok(written),
                    // Slots are fixed at construction, so this arm is never taken.
                    Answer::Choice(_) => Err(LedgerError::KindMismatch {
                        id: id.clone(),
                        kind,
                    }),
                }
            }
        }
    }

    pub fn set_choice(&mut self, id: &QuestionId, choice: ChoiceIndex) -> Result<(), LedgerError> {
        match self.slot(id)? {
            Slot::Choice { options } if choice.get() < options => {
                self.entries.insert(id.clone(), Answer::Choice(choice));
                Ok(())
            }
            Slot::Choice { options } => Err(LedgerError::ChoiceOutOfRange {
                id: id.clone(),
                choice: choice.get(),
                available: options,
            }),
            Slot::Written { kind } => Err(LedgerError::KindMismatch {
                id: id.clone(),
                kind,
            }),
        }
    }

    /// Replaces the text of a written answer. Attached images are kept.
    pub fn set_text(&mut self, id: &QuestionId, text: impl Into<String>) -> Result<(), LedgerError> {
        self.written_mut(id)?.text = text.into();
        Ok(())
    }

    /// Appends an image to a written answer. The text is kept.
    pub fn add_image(&mut self, id: &QuestionId, image: ImageRef) -> Result<(), LedgerError> {
        self.written_mut(id)?.images.push(image);
        Ok(())
    }

    /// Removes the image at `index`. Returns `false` when there was nothing to remove.
    pub fn remove_image(&mut self, id: &QuestionId, index: usize) -> Result<bool, LedgerError> {
        if let Slot::Choice { .. } = self.slot(id)? {
            return Err(LedgerError::KindMismatch {
                id: id.clone(),
                kind: "single-choice",
            });
        }
        match self.entries.get_mut(id) {
            Some(Answer::Written(written)) if index < written.images.len() => {
                written.images.remove(index);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    pub fn get(&self, id: &QuestionId) -> Option<&Answer> {
        self.entries.get(id)
    }

    pub fn is_answered(&self, id: &QuestionId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn answered_count(&self) -> usize {
        self.entries.len()
    }

    pub fn total_count(&self) -> usize {
        self.order.len()
    }

    /// Every recorded answer, in question order.
    pub fn entries_in_order(&self) -> Vec<(QuestionId, Answer)> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id).map(|answer| (id.clone(), answer.clone())))
            .collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
