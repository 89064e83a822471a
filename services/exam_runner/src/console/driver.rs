//! services/exam_runner/src/console/driver.rs
//!
//! The main control loop for one console session. It reads learner commands, applies
//! them to the session, and reports clock and phase changes as JSON events.

use crate::console::commands::{Command, HELP};
use crate::console::protocol::ConsoleEvent;
use crate::error::RunnerError;
use exam_session_core::grading::{grade, MarkSheet};
use exam_session_core::session::{ExamSession, SessionError, SessionPhase, SubmitOutcome};
use exam_session_core::time_fmt::{format_clock, format_time_taken};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;
use tracing::{info, warn};

/// Writes one JSON event per line.
pub struct EventWriter<W> {
    out: W,
}

impl<W: AsyncWrite + Unpin> EventWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub async fn emit(&mut self, event: &ConsoleEvent) -> Result<(), RunnerError> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');
        self.out.write_all(&line).await?;
        self.out.flush().await?;
        Ok(())
    }
}

enum Flow {
    Continue,
    Quit,
}

/// Runs `session` to a terminal phase and returns that phase.
///
/// Closing the input (or `quit`) before submitting abandons the session. A submission
/// already in flight is allowed to finish first.
pub async fn run_session<R, W>(
    session: ExamSession,
    input: R,
    output: &mut W,
) -> Result<SessionPhase, RunnerError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut events = EventWriter::new(output);
    let mut phase_rx = session.watch_phase();

    session.start().await?;
    let context = session.context();
    events
        .emit(&ConsoleEvent::SessionStarted {
            session_id: context.session_id,
            title: context.exam.title.clone(),
            total_questions: session.questions().len(),
            time_left: format_clock(context.exam.duration_secs),
        })
        .await?;
    emit_current_question(&session, &mut events).await?;

    let mut remaining_rx = session.watch_remaining().await;
    let mut lines = input.lines();
    let mut input_open = true;
    let mut confirm_pending = false;

    loop {
        tokio::select! {
            biased;

            changed = phase_rx.changed() => {
                if changed.is_err() {
                    return Ok(session.phase().await);
                }
                let phase = *phase_rx.borrow_and_update();
                if phase != SessionPhase::InProgress {
                    confirm_pending = false;
                }
                match phase {
                    SessionPhase::Submitting => events.emit(&ConsoleEvent::Submitting).await?,
                    SessionPhase::Submitted => {
                        report_results(&session, &mut events).await?;
                        return Ok(phase);
                    }
                    SessionPhase::SubmitFailed => {
                        if input_open {
                            let message = session.last_error().await.unwrap_or_default();
                            let can_resume = session.remaining_secs().await > 0;
                            events.emit(&ConsoleEvent::SubmitFailed { message, can_resume }).await?;
                        } else {
                            // Nobody is left to press retry.
                            session.abandon().await?;
                        }
                    }
                    SessionPhase::Abandoned => {
                        events.emit(&ConsoleEvent::Abandoned).await?;
                        return Ok(phase);
                    }
                    SessionPhase::NotStarted | SessionPhase::InProgress => {}
                }
            }

            remaining = next_remaining(&mut remaining_rx) => {
                match remaining {
                    Some(secs) if secs % 60 == 0 || secs <= 10 => {
                        events.emit(&ConsoleEvent::clock(secs)).await?;
                    }
                    Some(_) => {}
                    None => remaining_rx = None,
                }
            }

            line = lines.next_line(), if input_open => {
                let flow = match line? {
                    Some(line) => {
                        handle_line(&session, &mut events, &mut confirm_pending, &line).await?
                    }
                    None => Flow::Quit,
                };
                if let Flow::Quit = flow {
                    input_open = false;
                    leave(&session).await;
                }
            }
        }
    }
}

/// Abandons the session unless a submission is in flight, in which case the loop
/// waits for it to settle.
async fn leave(session: &ExamSession) {
    match session.abandon().await {
        Ok(()) => info!("Learner left the session."),
        Err(e) => warn!("Input closed while submitting; waiting for the result: {}", e),
    }
}

async fn next_remaining(rx: &mut Option<watch::Receiver<u64>>) -> Option<u64> {
    match rx {
        Some(rx) => match rx.changed().await {
            Ok(()) => Some(*rx.borrow_and_update()),
            Err(_) => None,
        },
        None => std::future::pending().await,
    }
}

async fn emit_current_question<W>(
    session: &ExamSession,
    events: &mut EventWriter<W>,
) -> Result<(), RunnerError>
where
    W: AsyncWrite + Unpin,
{
    let index = session.summary().await.current_index;
    match session.questions().get(index) {
        Some(question) => {
            let event = ConsoleEvent::question(question, index, session.questions().len());
            events.emit(&event).await
        }
        None => {
            events
                .emit(&ConsoleEvent::Ack {
                    message: "This exam has no questions.".to_string(),
                })
                .await
        }
    }
}

async fn handle_line<W>(
    session: &ExamSession,
    events: &mut EventWriter<W>,
    confirm_pending: &mut bool,
    line: &str,
) -> Result<Flow, RunnerError>
where
    W: AsyncWrite + Unpin,
{
    if line.trim().is_empty() {
        return Ok(Flow::Continue);
    }
    let command = match line.parse::<Command>() {
        Ok(command) => command,
        Err(e) => {
            events.emit(&ConsoleEvent::Error { message: e.to_string() }).await?;
            return Ok(Flow::Continue);
        }
    };
    // Any command other than `confirm` backs out of a pending submission.
    let confirmed = std::mem::take(confirm_pending);

    let applied: Result<Option<String>, SessionError> = match command {
        Command::Choose { question, choice } => session
            .set_choice(&question, choice)
            .await
            .map(|()| Some(format!("Option {} selected for {}.", choice.get(), question))),
        Command::Text { question, text } => session
            .set_text(&question, text)
            .await
            .map(|()| Some(format!("Answer saved for {}.", question))),
        Command::Attach { question, image } => session
            .add_image(&question, image)
            .await
            .map(|()| Some(format!("Image attached to {}.", question))),
        Command::Detach { question, index } => {
            session.remove_image(&question, index).await.map(|removed| {
                Some(if removed {
                    format!("Image {} removed from {}.", index, question)
                } else {
                    format!("{} has no image {}.", question, index)
                })
            })
        }
        Command::Flag { question } => session.toggle_flag(&question).await.map(|flagged| {
            Some(if flagged {
                format!("{} marked for review.", question)
            } else {
                format!("{} no longer marked for review.", question)
            })
        }),
        Command::Next => {
            session.next_question().await;
            emit_current_question(session, events).await?;
            Ok(None)
        }
        Command::Previous => {
            session.previous_question().await;
            emit_current_question(session, events).await?;
            Ok(None)
        }
        Command::GoTo(number) => match session.go_to_question(number - 1).await {
            Some(_) => {
                emit_current_question(session, events).await?;
                Ok(None)
            }
            None => Ok(Some(format!("There is no question {}.", number))),
        },
        Command::Status => {
            let summary = session.summary().await;
            let strip = session.question_status().await;
            events.emit(&ConsoleEvent::status(&summary, &strip)).await?;
            Ok(None)
        }
        Command::Submit => {
            let summary = session.summary().await;
            if summary.phase == SessionPhase::InProgress {
                *confirm_pending = true;
                events.emit(&ConsoleEvent::confirm_submit(&summary)).await?;
                Ok(None)
            } else {
                submission_message(session.submit().await)
            }
        }
        Command::Confirm if confirmed => submission_message(session.submit().await),
        Command::Confirm => Ok(Some("Nothing to confirm; use submit first.".to_string())),
        Command::Cancel if confirmed => Ok(Some("Submission cancelled.".to_string())),
        Command::Cancel => Ok(None),
        Command::Retry => submission_message(session.retry().await),
        Command::Resume => match session.resume().await {
            Ok(()) => {
                emit_current_question(session, events).await?;
                Ok(None)
            }
            Err(e) => Err(e),
        },
        Command::Help => Ok(Some(HELP.to_string())),
        Command::Quit => return Ok(Flow::Quit),
    };

    match applied {
        Ok(Some(message)) => events.emit(&ConsoleEvent::Ack { message }).await?,
        Ok(None) => {}
        Err(e) => events.emit(&ConsoleEvent::Error { message: e.to_string() }).await?,
    }
    Ok(Flow::Continue)
}

/// Delivered and failed submissions are reported through the phase watch; only the
/// absorbed cases need a message here.
fn submission_message(
    result: Result<SubmitOutcome, SessionError>,
) -> Result<Option<String>, SessionError> {
    match result {
        Ok(SubmitOutcome::Delivered(_)) => Ok(None),
        Ok(SubmitOutcome::InFlight) => Ok(Some("Submission already in progress.".to_string())),
        Ok(SubmitOutcome::AlreadySubmitted) => Ok(Some("Exam already submitted.".to_string())),
        Err(SessionError::Submission(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

async fn report_results<W>(
    session: &ExamSession,
    events: &mut EventWriter<W>,
) -> Result<(), RunnerError>
where
    W: AsyncWrite + Unpin,
{
    let summary = session.summary().await;
    let Some(snapshot) = session.last_snapshot().await else {
        return Ok(());
    };
    if let Some(receipt) = &summary.receipt {
        events
            .emit(&ConsoleEvent::Submitted {
                submission_id: receipt.submission_id,
                answered: snapshot.answered_count,
                total: snapshot.total_count,
                time_taken: format_time_taken(snapshot.elapsed_secs),
            })
            .await?;
    }
    let result = grade(session.questions(), &snapshot, &MarkSheet::new());
    events.emit(&ConsoleEvent::result(&result)).await
}
