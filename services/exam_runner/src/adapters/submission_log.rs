//! services/exam_runner/src/adapters/submission_log.rs
//!
//! A `SubmissionSink` that appends each snapshot as one JSON line to a file, standing
//! in for the hosted submissions table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use exam_session_core::domain::{Answer, Snapshot, SubmissionReceipt, SubmitTrigger};
use exam_session_core::ports::{PortError, PortResult, SubmissionSink};
use serde::Serialize;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

pub struct JsonlSubmissionLog {
    path: PathBuf,
    // Serializes appends so lines from concurrent sessions never interleave.
    write_lock: Mutex<()>,
}

impl JsonlSubmissionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }
}

//=========================================================================================
// "Impure" Record Structs
//=========================================================================================

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum AnswerValueRecord<'a> {
    Choice { choice: usize },
    Written { text: &'a str, images: Vec<&'a str> },
}

#[derive(Serialize)]
struct AnswerRecord<'a> {
    question_id: &'a str,
    #[serde(flatten)]
    value: AnswerValueRecord<'a>,
}

#[derive(Serialize)]
struct SubmissionRecord<'a> {
    submission_id: Uuid,
    session_id: Uuid,
    learner_id: Uuid,
    exam_id: Uuid,
    answered_count: usize,
    total_count: usize,
    answers: Vec<AnswerRecord<'a>>,
    flagged: Vec<&'a str>,
    elapsed_secs: u64,
    trigger: &'static str,
    submitted_at: DateTime<Utc>,
    accepted_at: DateTime<Utc>,
}

impl<'a> SubmissionRecord<'a> {
    fn from_domain(snapshot: &'a Snapshot, submission_id: Uuid, accepted_at: DateTime<Utc>) -> Self {
        let answers = snapshot
            .answers
            .iter()
            .map(|(id, answer)| AnswerRecord {
                question_id: id.as_str(),
                value: match answer {
                    Answer::Choice(choice) => AnswerValueRecord::Choice {
                        choice: choice.get(),
                    },
                    Answer::Written(written) => AnswerValueRecord::Written {
                        text: &written.text,
                        images: written.images.iter().map(|image| image.as_str()).collect(),
                    },
                },
            })
            .collect();

        Self {
            submission_id,
            session_id: snapshot.session_id,
            learner_id: snapshot.learner_id,
            exam_id: snapshot.exam_id,
            answered_count: snapshot.answered_count,
            total_count: snapshot.total_count,
            answers,
            flagged: snapshot.flagged.iter().map(|id| id.as_str()).collect(),
            elapsed_secs: snapshot.elapsed_secs,
            trigger: match snapshot.trigger {
                SubmitTrigger::Manual => "manual",
                SubmitTrigger::ClockExpired => "clock_expired",
            },
            submitted_at: snapshot.submitted_at,
            accepted_at,
        }
    }
}

//=========================================================================================
// The Port Implementation
//=========================================================================================

#[async_trait]
impl SubmissionSink for JsonlSubmissionLog {
    async fn submit(&self, snapshot: &Snapshot) -> PortResult<SubmissionReceipt> {
        let receipt = SubmissionReceipt {
            submission_id: Uuid::new_v4(),
            accepted_at: Utc::now(),
        };
        let record = SubmissionRecord::from_domain(snapshot, receipt.submission_id, receipt.accepted_at);
        let mut line = serde_json::to_string(&record)
            .map_err(|e| PortError::Unexpected(format!("could not encode submission: {}", e)))?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| {
                PortError::Unexpected(format!("could not open {}: {}", self.path.display(), e))
            })?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| PortError::Unexpected(format!("could not write submission: {}", e)))?;
        file.flush()
            .await
            .map_err(|e| PortError::Unexpected(format!("could not flush submission: {}", e)))?;

        info!(
            submission_id = %receipt.submission_id,
            session_id = %snapshot.session_id,
            "Submission appended to {}",
            self.path.display()
        );
        Ok(receipt)
    }
}
