//! crates/exam_session_core/src/session.rs
//!
//! The exam session: clock, answer ledger, review flags and the submission state
//! machine, owned together by one handle.
//!
//! Phases:
//! `NotStarted -> InProgress -> Submitting -> Submitted`, with
//! `Submitting -> SubmitFailed -> InProgress | Submitting` as the retry loop and
//! `Abandoned` when the learner leaves before submitting. Manual submission and clock
//! expiry share a single transition, so at most one snapshot is in flight.

use crate::clock::SessionClock;
use crate::domain::{
    Answer, ChoiceIndex, ImageRef, Question, QuestionId, SessionContext, Snapshot,
    SubmissionReceipt, SubmitTrigger,
};
use crate::ledger::{AnswerLedger, LedgerError};
use crate::flags::ReviewFlags;
use crate::navigation::QuestionCursor;
use crate::ports::{PortError, SubmissionSink};
use chrono::Utc;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::time;
use tracing::{debug, error, info, warn};

//=========================================================================================
// Public types
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    NotStarted,
    InProgress,
    Submitting,
    Submitted,
    SubmitFailed,
    Abandoned,
}

impl SessionPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionPhase::Submitted | SessionPhase::Abandoned)
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionPhase::NotStarted => "not started",
            SessionPhase::InProgress => "in progress",
            SessionPhase::Submitting => "submitting",
            SessionPhase::Submitted => "submitted",
            SessionPhase::SubmitFailed => "submit failed",
            SessionPhase::Abandoned => "abandoned",
        };
        f.write_str(label)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("the session has not been started")]
    NotStarted,
    #[error("cannot {action} while the session is {from}")]
    InvalidTransition {
        from: SessionPhase,
        action: &'static str,
    },
    #[error("answers are not accepted while the session is {0}")]
    NotAccepting(SessionPhase),
    #[error("no time remains on the clock")]
    TimeUp,
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("submission failed: {0}")]
    Submission(#[source] PortError),
}

/// What a call to `submit` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Delivered(SubmissionReceipt),
    /// Another submission is already in flight; this call was absorbed.
    InFlight,
    AlreadySubmitted,
}

/// Tuning for one session.
#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    pub tick_period: Duration,
    /// Upper bound on one sink call, so `Submitting` cannot get stuck.
    pub submit_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            tick_period: Duration::from_secs(1),
            submit_timeout: Duration::from_secs(30),
        }
    }
}

/// One cell of the navigation strip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionStatus {
    pub index: usize,
    pub id: QuestionId,
    pub answered: bool,
    pub flagged: bool,
    pub current: bool,
}

/// Everything the surrounding screen shows outside the question itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub phase: SessionPhase,
    pub answered_count: usize,
    pub total_count: usize,
    pub flagged_count: usize,
    pub remaining_secs: u64,
    pub current_index: usize,
    pub attempts: u32,
    pub receipt: Option<SubmissionReceipt>,
    pub last_error: Option<String>,
}

//=========================================================================================
// Internal state
//=========================================================================================

struct SessionState {
    phase: SessionPhase,
    ledger: AnswerLedger,
    flags: ReviewFlags,
    cursor: QuestionCursor,
    clock: Option<SessionClock>,
    attempts: u32,
    receipt: Option<SubmissionReceipt>,
    last_error: Option<String>,
    last_snapshot: Option<Snapshot>,
}

impl SessionState {
    fn remaining_secs(&self, duration_secs: u64) -> u64 {
        match &self.clock {
            Some(clock) => clock.remaining(),
            None if self.phase == SessionPhase::NotStarted => duration_secs,
            None => 0,
        }
    }

    fn ensure_accepting(&self) -> Result<(), SessionError> {
        if self.phase == SessionPhase::InProgress {
            Ok(())
        } else {
            Err(SessionError::NotAccepting(self.phase))
        }
    }
}

struct SessionInner {
    context: SessionContext,
    questions: Vec<Question>,
    sink: Arc<dyn SubmissionSink>,
    settings: SessionSettings,
    state: Mutex<SessionState>,
    phase_tx: watch::Sender<SessionPhase>,
}

impl SessionInner {
    fn set_phase(&self, state: &mut SessionState, next: SessionPhase) {
        let previous = state.phase;
        state.phase = next;
        self.phase_tx.send_replace(next);
        info!(
            session_id = %self.context.session_id,
            from = %previous,
            to = %next,
            "Session phase changed."
        );
    }

    fn snapshot(&self, state: &SessionState, trigger: SubmitTrigger) -> Snapshot {
        let duration = self.context.exam.duration_secs;
        let remaining = state.remaining_secs(duration);
        Snapshot {
            session_id: self.context.session_id,
            learner_id: self.context.learner_id,
            exam_id: self.context.exam.id,
            answered_count: state.ledger.answered_count(),
            total_count: self.questions.len(),
            answers: state.ledger.entries_in_order(),
            flagged: state.flags.flagged(),
            elapsed_secs: duration.saturating_sub(remaining),
            trigger,
            submitted_at: Utc::now(),
        }
    }
}

//=========================================================================================
// ExamSession
//=========================================================================================

/// Handle to one learner's attempt at one exam.
///
/// Clones share the same session. When the last handle is dropped the clock is
/// cancelled with it.
#[derive(Clone)]
pub struct ExamSession {
    inner: Arc<SessionInner>,
}

impl ExamSession {
    pub fn new(
        context: SessionContext,
        questions: Vec<Question>,
        sink: Arc<dyn SubmissionSink>,
        settings: SessionSettings,
    ) -> Self {
        let state = SessionState {
            phase: SessionPhase::NotStarted,
            ledger: AnswerLedger::new(&questions),
            flags: ReviewFlags::new(),
            cursor: QuestionCursor::new(questions.len()),
            clock: None,
            attempts: 0,
            receipt: None,
            last_error: None,
            last_snapshot: None,
        };
        let (phase_tx, _) = watch::channel(SessionPhase::NotStarted);
        Self {
            inner: Arc::new(SessionInner {
                context,
                questions,
                sink,
                settings,
                state: Mutex::new(state),
                phase_tx,
            }),
        }
    }

    pub fn context(&self) -> &SessionContext {
        &self.inner.context
    }

    pub fn questions(&self) -> &[Question] {
        &self.inner.questions
    }

    /// Observes phase changes, e.g. to route to the results view once submitted.
    pub fn watch_phase(&self) -> watch::Receiver<SessionPhase> {
        self.inner.phase_tx.subscribe()
    }

    /// Observes the remaining seconds once the session has started.
    pub async fn watch_remaining(&self) -> Option<watch::Receiver<u64>> {
        let state = self.inner.state.lock().await;
        state.clock.as_ref().map(SessionClock::subscribe)
    }

    /// Moves to `InProgress` and starts the countdown.
    pub async fn start(&self) -> Result<(), SessionError> {
        let mut state = self.inner.state.lock().await;
        if state.phase != SessionPhase::NotStarted {
            return Err(SessionError::InvalidTransition {
                from: state.phase,
                action: "start",
            });
        }

        let weak = Arc::downgrade(&self.inner);
        let clock = SessionClock::start(
            self.inner.context.exam.duration_secs,
            self.inner.settings.tick_period,
            move || submit_on_expiry(weak),
        );
        state.clock = Some(clock);
        self.inner.set_phase(&mut state, SessionPhase::InProgress);
        Ok(())
    }

    //-------------------------------------------------------------------------------------
    // Answers and flags
    //-------------------------------------------------------------------------------------

    pub async fn set_choice(&self, id: &QuestionId, choice: ChoiceIndex) -> Result<(), SessionError> {
        let mut state = self.inner.state.lock().await;
        state.ensure_accepting()?;
        state.ledger.set_choice(id, choice)?;
        debug!(question = %id, choice = choice.get(), "Choice recorded.");
        Ok(())
    }

    pub async fn set_text(&self, id: &QuestionId, text: impl Into<String>) -> Result<(), SessionError> {
        let mut state = self.inner.state.lock().await;
        state.ensure_accepting()?;
        state.ledger.set_text(id, text)?;
        Ok(())
    }

    pub async fn add_image(&self, id: &QuestionId, image: ImageRef) -> Result<(), SessionError> {
        let mut state = self.inner.state.lock().await;
        state.ensure_accepting()?;
        state.ledger.add_image(id, image)?;
        debug!(question = %id, "Image attached.");
        Ok(())
    }

    pub async fn remove_image(&self, id: &QuestionId, index: usize) -> Result<bool, SessionError> {
        let mut state = self.inner.state.lock().await;
        state.ensure_accepting()?;
        Ok(state.ledger.remove_image(id, index)?)
    }

    /// Flips the review flag and returns the new membership.
    pub async fn toggle_flag(&self, id: &QuestionId) -> Result<bool, SessionError> {
        let mut state = self.inner.state.lock().await;
        state.ensure_accepting()?;
        if !self.inner.questions.iter().any(|question| &question.id == id) {
            return Err(LedgerError::UnknownQuestion(id.clone()).into());
        }
        Ok(state.flags.toggle(id))
    }

    pub async fn answer(&self, id: &QuestionId) -> Option<Answer> {
        self.inner.state.lock().await.ledger.get(id).cloned()
    }

    pub async fn is_flagged(&self, id: &QuestionId) -> bool {
        self.inner.state.lock().await.flags.is_flagged(id)
    }

    //-------------------------------------------------------------------------------------
    // Navigation
    //-------------------------------------------------------------------------------------

    pub async fn current_question(&self) -> Option<Question> {
        let state = self.inner.state.lock().await;
        self.inner.questions.get(state.cursor.index()).cloned()
    }

    pub async fn next_question(&self) -> usize {
        self.inner.state.lock().await.cursor.next()
    }

    pub async fn previous_question(&self) -> usize {
        self.inner.state.lock().await.cursor.previous()
    }

    pub async fn go_to_question(&self, index: usize) -> Option<usize> {
        self.inner.state.lock().await.cursor.go_to(index)
    }

    pub async fn is_last_question(&self) -> bool {
        self.inner.state.lock().await.cursor.is_last()
    }

    /// Answered/flagged/current markers for every question, in order.
    pub async fn question_status(&self) -> Vec<QuestionStatus> {
        let state = self.inner.state.lock().await;
        self.inner
            .questions
            .iter()
            .enumerate()
            .map(|(index, question)| QuestionStatus {
                index,
                id: question.id.clone(),
                answered: state.ledger.is_answered(&question.id),
                flagged: state.flags.is_flagged(&question.id),
                current: state.cursor.index() == index,
            })
            .collect()
    }

    //-------------------------------------------------------------------------------------
    // Reads for the surrounding screen
    //-------------------------------------------------------------------------------------

    pub async fn phase(&self) -> SessionPhase {
        self.inner.state.lock().await.phase
    }

    pub async fn remaining_secs(&self) -> u64 {
        let state = self.inner.state.lock().await;
        state.remaining_secs(self.inner.context.exam.duration_secs)
    }

    pub async fn last_error(&self) -> Option<String> {
        self.inner.state.lock().await.last_error.clone()
    }

    /// The snapshot of the most recent submission attempt.
    pub async fn last_snapshot(&self) -> Option<Snapshot> {
        self.inner.state.lock().await.last_snapshot.clone()
    }

    pub async fn summary(&self) -> SessionSummary {
        let state = self.inner.state.lock().await;
        SessionSummary {
            phase: state.phase,
            answered_count: state.ledger.answered_count(),
            total_count: self.inner.questions.len(),
            flagged_count: state.flags.len(),
            remaining_secs: state.remaining_secs(self.inner.context.exam.duration_secs),
            current_index: state.cursor.index(),
            attempts: state.attempts,
            receipt: state.receipt.clone(),
            last_error: state.last_error.clone(),
        }
    }

    //-------------------------------------------------------------------------------------
    // Submission
    //-------------------------------------------------------------------------------------

    /// Submits on the learner's request.
    pub async fn submit(&self) -> Result<SubmitOutcome, SessionError> {
        self.submit_with(SubmitTrigger::Manual).await
    }

    /// Submits again after a failed attempt.
    pub async fn retry(&self) -> Result<SubmitOutcome, SessionError> {
        let phase = self.phase().await;
        if phase != SessionPhase::SubmitFailed {
            return Err(SessionError::InvalidTransition {
                from: phase,
                action: "retry",
            });
        }
        self.submit_with(SubmitTrigger::Manual).await
    }

    /// Returns to answering after a failed submission, while time remains.
    pub async fn resume(&self) -> Result<(), SessionError> {
        let mut state = self.inner.state.lock().await;
        if state.phase != SessionPhase::SubmitFailed {
            return Err(SessionError::InvalidTransition {
                from: state.phase,
                action: "resume",
            });
        }
        if state.remaining_secs(self.inner.context.exam.duration_secs) == 0 {
            return Err(SessionError::TimeUp);
        }
        self.inner.set_phase(&mut state, SessionPhase::InProgress);
        Ok(())
    }

    /// Leaves the session without submitting: stops the clock and discards answers.
    pub async fn abandon(&self) -> Result<(), SessionError> {
        let mut state = self.inner.state.lock().await;
        match state.phase {
            SessionPhase::Submitting => {
                return Err(SessionError::InvalidTransition {
                    from: state.phase,
                    action: "abandon",
                })
            }
            SessionPhase::Submitted | SessionPhase::Abandoned => return Ok(()),
            SessionPhase::NotStarted | SessionPhase::InProgress | SessionPhase::SubmitFailed => {}
        }
        if let Some(clock) = state.clock.take() {
            clock.stop();
        }
        state.ledger.clear();
        state.flags.clear();
        state.last_snapshot = None;
        warn!(
            session_id = %self.inner.context.session_id,
            "Session abandoned before submission; answers discarded."
        );
        self.inner.set_phase(&mut state, SessionPhase::Abandoned);
        Ok(())
    }

    async fn submit_with(&self, trigger: SubmitTrigger) -> Result<SubmitOutcome, SessionError> {
        let snapshot = {
            let mut state = self.inner.state.lock().await;
            match state.phase {
                SessionPhase::NotStarted => return Err(SessionError::NotStarted),
                SessionPhase::Submitting => {
                    debug!(?trigger, "Submission already in flight; ignoring.");
                    return Ok(SubmitOutcome::InFlight);
                }
                SessionPhase::Submitted => return Ok(SubmitOutcome::AlreadySubmitted),
                SessionPhase::Abandoned => {
                    return Err(SessionError::InvalidTransition {
                        from: state.phase,
                        action: "submit",
                    })
                }
                SessionPhase::InProgress | SessionPhase::SubmitFailed => {}
            }
            state.attempts += 1;
            let snapshot = self.inner.snapshot(&state, trigger);
            state.last_snapshot = Some(snapshot.clone());
            self.inner.set_phase(&mut state, SessionPhase::Submitting);
            snapshot
        };

        info!(
            session_id = %snapshot.session_id,
            ?trigger,
            answered = snapshot.answered_count,
            total = snapshot.total_count,
            "Submitting exam."
        );

        let timeout = self.inner.settings.submit_timeout;
        let result = match time::timeout(timeout, self.inner.sink.submit(&snapshot)).await {
            Ok(result) => result,
            Err(_) => Err(PortError::Unexpected(format!(
                "submission timed out after {}s",
                timeout.as_secs()
            ))),
        };

        let mut state = self.inner.state.lock().await;
        match result {
            Ok(receipt) => {
                if let Some(clock) = &state.clock {
                    clock.stop();
                }
                state.receipt = Some(receipt.clone());
                state.last_error = None;
                self.inner.set_phase(&mut state, SessionPhase::Submitted);
                Ok(SubmitOutcome::Delivered(receipt))
            }
            Err(e) => {
                error!(session_id = %snapshot.session_id, "Submission failed: {}", e);
                state.last_error = Some(e.to_string());
                self.inner.set_phase(&mut state, SessionPhase::SubmitFailed);
                Err(SessionError::Submission(e))
            }
        }
    }
}

/// The clock's expiry path. Holds only a weak reference so the clock never keeps a
/// discarded session alive.
async fn submit_on_expiry(session: Weak<SessionInner>) {
    let Some(inner) = session.upgrade() else {
        return;
    };
    let session = ExamSession { inner };
    match session.submit_with(SubmitTrigger::ClockExpired).await {
        Ok(outcome) => info!(?outcome, "Auto-submission on expiry finished."),
        Err(e) => warn!("Auto-submission on expiry failed: {}", e),
    }
}
