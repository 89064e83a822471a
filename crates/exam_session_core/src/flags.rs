//! crates/exam_session_core/src/flags.rs

use crate::domain::QuestionId;
use std::collections::BTreeSet;

/// Questions the learner wants to revisit before submitting.
#[derive(Debug, Clone, Default)]
pub struct ReviewFlags {
    flagged: BTreeSet<QuestionId>,
}

impl ReviewFlags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flips membership and returns whether the question is now flagged.
    pub fn toggle(&mut self, id: &QuestionId) -> bool {
        if self.flagged.remove(id) {
            false
        } else {
            self.flagged.insert(id.clone());
            true
        }
    }

    pub fn is_flagged(&self, id: &QuestionId) -> bool {
        self.flagged.contains(id)
    }

    pub fn flagged(&self) -> Vec<QuestionId> {
        self.flagged.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.flagged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flagged.is_empty()
    }

    pub fn clear(&mut self) {
        self.flagged.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_flips_membership() {
        let mut flags = ReviewFlags::new();
        let q2 = QuestionId::from("q2");

        assert!(flags.toggle(&q2));
        assert!(flags.is_flagged(&q2));
        assert!(!flags.toggle(&q2));
        assert!(!flags.is_flagged(&q2));
        assert!(flags.is_empty());
    }

    #[test]
    fn flagged_is_sorted() {
        let mut flags = ReviewFlags::new();
        for id in ["q5", "q1", "q3"] {
            flags.toggle(&id.into());
        }
        let ids: Vec<_> = flags.flagged().iter().map(ToString::to_string).collect();
        assert_eq!(ids, ["q1", "q3", "q5"]);
        assert_eq!(flags.len(), 3);
    }
}
