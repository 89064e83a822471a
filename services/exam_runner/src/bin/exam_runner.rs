//! services/exam_runner/src/bin/exam_runner.rs

use exam_runner_lib::{
    adapters::{JsonExamFile, JsonlSubmissionLog},
    config::Config,
    console::run_session,
    error::RunnerError,
};
use exam_session_core::{
    ports::QuestionSource,
    session::{ExamSession, SessionSettings},
    SessionContext,
};
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<(), RunnerError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    // Logs go to stderr; stdout carries the console events.
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    info!("Configuration loaded. Preparing exam session...");

    // --- 2. Initialize Service Adapters ---
    let source = JsonExamFile::new(&config.exam_file);
    let sink = Arc::new(JsonlSubmissionLog::new(&config.submissions_file));

    // --- 3. Load the Exam & Build the Session ---
    let (mut exam, questions) = source.load_exam(config.exam_id).await?;
    if let Some(secs) = config.duration_override_secs {
        exam.duration_secs = secs;
    }
    let learner_id = config.learner_id.unwrap_or_else(Uuid::new_v4);
    let context = SessionContext::new(learner_id, exam);
    info!(
        session_id = %context.session_id,
        learner_id = %learner_id,
        "Starting '{}' ({} questions)",
        context.exam.title,
        questions.len()
    );

    let settings = SessionSettings {
        tick_period: config.tick_period,
        submit_timeout: config.submit_timeout,
    };
    let session = ExamSession::new(context, questions, sink, settings);

    // --- 4. Run the Session on stdin/stdout ---
    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    let phase = run_session(session, stdin, &mut stdout).await?;

    info!("Session finished: {}", phase);
    Ok(())
}
