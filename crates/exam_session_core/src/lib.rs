pub mod clock;
pub mod domain;
pub mod flags;
pub mod grading;
pub mod ledger;
pub mod navigation;
pub mod ports;
pub mod session;
pub mod time_fmt;

pub use clock::{Countdown, SessionClock, Tick};
pub use domain::{
    Answer, ChoiceIndex, ExamInfo, ImageRef, Question, QuestionId, QuestionKind, SessionContext,
    Snapshot, SubmissionReceipt, SubmitTrigger, WrittenAnswer,
};
pub use grading::{grade, parse_marks, MarkSheet, MarksError, Outcome, ResultSummary};
pub use ledger::{AnswerLedger, LedgerError};
pub use flags::ReviewFlags;
pub use ports::{PortError, PortResult, QuestionSource, SubmissionSink};
pub use session::{
    ExamSession, QuestionStatus, SessionError, SessionPhase, SessionSettings, SessionSummary,
    SubmitOutcome,
};
