//! crates/exam_session_core/src/navigation.rs

/// Position of the learner in the ordered question list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuestionCursor {
    index: usize,
    len: usize,
}

impl QuestionCursor {
    pub fn new(len: usize) -> Self {
        Self { index: 0, len }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_first(&self) -> bool {
        self.index == 0
    }

    /// On the last question the caller offers "submit" instead of "next".
    pub fn is_last(&self) -> bool {
        self.index + 1 >= self.len
    }

    pub fn next(&mut self) -> usize {
        if !self.is_last() {
            self.index += 1;
        }
        self.index
    }

    pub fn previous(&mut self) -> usize {
        self.index = self.index.saturating_sub(1);
        self.index
    }

    /// Jumps to `index`, or returns `None` and stays put when it is out of range.
    pub fn go_to(&mut self, index: usize) -> Option<usize> {
        if index < self.len {
            self.index = index;
            Some(index)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stays_within_bounds() {
        let mut cursor = QuestionCursor::new(3);
        assert!(cursor.is_first());
        assert_eq!(cursor.previous(), 0);
        assert_eq!(cursor.next(), 1);
        assert_eq!(cursor.next(), 2);
        assert!(cursor.is_last());
        assert_eq!(cursor.next(), 2);
        assert_eq!(cursor.go_to(3), None);
        assert_eq!(cursor.index(), 2);
        assert_eq!(cursor.go_to(0), Some(0));
    }

    #[test]
    fn empty_exam_is_both_first_and_last() {
        let mut cursor = QuestionCursor::new(0);
        assert!(cursor.is_first());
        assert!(cursor.is_last());
        assert_eq!(cursor.next(), 0);
        assert_eq!(cursor.go_to(0), None);
    }
}
