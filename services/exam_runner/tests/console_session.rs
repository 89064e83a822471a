use async_trait::async_trait;
use chrono::Utc;
use exam_runner_lib::console::run_session;
use exam_session_core::{
    Answer, ChoiceIndex, ExamInfo, ExamSession, PortError, PortResult, Question, QuestionKind,
    SessionContext, SessionPhase, SessionSettings, Snapshot, SubmissionReceipt, SubmissionSink,
    SubmitTrigger,
};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufReader};
use uuid::Uuid;

#[derive(Default)]
struct MemorySink {
    delivered: Mutex<Vec<Snapshot>>,
    failures_left: AtomicUsize,
}

#[async_trait]
impl SubmissionSink for MemorySink {
    async fn submit(&self, snapshot: &Snapshot) -> PortResult<SubmissionReceipt> {
        let fail = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if fail {
            return Err(PortError::Rejected("exam window closed".into()));
        }
        self.delivered.lock().unwrap().push(snapshot.clone());
        Ok(SubmissionReceipt {
            submission_id: Uuid::new_v4(),
            accepted_at: Utc::now(),
        })
    }
}

fn session(duration_secs: u64, sink: Arc<MemorySink>) -> ExamSession {
    let questions = vec![
        Question {
            id: "q1".into(),
            kind: QuestionKind::SingleChoice {
                choices: vec!["x".into(), "2x".into(), "2".into(), "x²".into()],
                correct: Some(ChoiceIndex(1)),
            },
            prompt: "What is the derivative of x²?".into(),
            points: 2,
        },
        Question {
            id: "q2".into(),
            kind: QuestionKind::SingleChoice {
                choices: vec!["delhi".into(), "mumbai".into()],
                correct: Some(ChoiceIndex(0)),
            },
            prompt: "What is the capital of India?".into(),
            points: 2,
        },
        Question {
            id: "q3".into(),
            kind: QuestionKind::FreeText,
            prompt: "What is the sum of the first 10 natural numbers?".into(),
            points: 3,
        },
    ];
    let exam = ExamInfo {
        id: Uuid::new_v4(),
        title: "Advanced Mathematics Final Exam".into(),
        duration_secs,
    };
    ExamSession::new(
        SessionContext::new(Uuid::new_v4(), exam),
        questions,
        sink,
        SessionSettings::default(),
    )
}

fn events(output: &[u8]) -> Vec<Value> {
    std::str::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

fn types(events: &[Value]) -> Vec<String> {
    events
        .iter()
        .map(|event| event["type"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test(start_paused = true)]
async fn manual_submission_reports_results() {
    let sink = Arc::new(MemorySink::default());
    let input: &[u8] = b"choose q1 1\nflag q2\nnext\nnext\ntext q3 fifty five\nstatus\nsubmit\nconfirm\n";
    let mut output = Vec::new();

    let phase = run_session(session(600, sink.clone()), input, &mut output)
        .await
        .unwrap();

    assert_eq!(phase, SessionPhase::Submitted);
    let events = events(&output);
    let types = types(&events);
    assert_eq!(types.first().map(String::as_str), Some("session_started"));
    assert!(types.ends_with(&["submitted".to_string(), "result".to_string()]));

    let confirm = events.iter().find(|e| e["type"] == "confirm_submit").unwrap();
    assert_eq!(confirm["answered"], 2);
    assert_eq!(confirm["total"], 3);
    assert_eq!(confirm["flagged"], 1);

    let status = events.iter().find(|e| e["type"] == "status").unwrap();
    assert_eq!(status["answered"], 2);
    assert_eq!(status["flagged"], 1);
    assert_eq!(status["strip"][1]["flagged"], true);
    assert_eq!(status["strip"][2]["current"], true);

    let result = events.last().unwrap();
    assert_eq!(result["correct"], 1);
    assert_eq!(result["pending_review"], 1);
    assert_eq!(result["unattempted"], 1);
    assert_eq!(result["obtained"], 2);
    assert_eq!(result["total"], 7);

    let delivered = sink.delivered.lock().unwrap();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].trigger, SubmitTrigger::Manual);
}

#[tokio::test(start_paused = true)]
async fn bad_commands_are_reported_without_ending_the_session() {
    let sink = Arc::new(MemorySink::default());
    let input: &[u8] = b"dance\nchoose q3 1\nchoose q1 9\ngoto 7\nsubmit\nconfirm\n";
    let mut output = Vec::new();

    run_session(session(600, sink.clone()), input, &mut output)
        .await
        .unwrap();

    let events = events(&output);
    let errors = events.iter().filter(|e| e["type"] == "error").count();
    assert_eq!(errors, 3);
    assert!(events
        .iter()
        .any(|e| e["type"] == "ack" && e["message"] == "There is no question 7."));
    assert_eq!(sink.delivered.lock().unwrap()[0].answered_count, 0);
}

#[tokio::test(start_paused = true)]
async fn clock_expiry_submits_while_waiting_for_input() {
    let sink = Arc::new(MemorySink::default());
    let (mut learner, runner_side) = tokio::io::duplex(1024);
    learner.write_all(b"choose q1 2\n").await.unwrap();
    let mut output = Vec::new();

    let phase = run_session(session(5, sink.clone()), BufReader::new(runner_side), &mut output)
        .await
        .unwrap();

    assert_eq!(phase, SessionPhase::Submitted);
    let delivered = sink.delivered.lock().unwrap();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].trigger, SubmitTrigger::ClockExpired);
    assert_eq!(
        delivered[0].answer(&"q1".into()),
        Some(&Answer::Choice(ChoiceIndex(2)))
    );

    let events = events(&output);
    let clock_updates: Vec<_> = events
        .iter()
        .filter(|e| e["type"] == "clock")
        .map(|e| e["time_left"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(clock_updates.first().map(String::as_str), Some("00:00:04"));
    drop(learner);
}

#[tokio::test(start_paused = true)]
async fn failed_submission_offers_retry() {
    let sink = Arc::new(MemorySink {
        failures_left: AtomicUsize::new(1),
        ..MemorySink::default()
    });
    let input: &[u8] = b"choose q2 0\nsubmit\nconfirm\nretry\n";
    let mut output = Vec::new();

    let phase = run_session(session(600, sink.clone()), input, &mut output)
        .await
        .unwrap();

    assert_eq!(phase, SessionPhase::Submitted);
    let events = events(&output);
    let failed = events.iter().find(|e| e["type"] == "submit_failed").unwrap();
    assert_eq!(failed["can_resume"], true);
    assert_eq!(failed["message"], "Rejected by the backend: exam window closed");
    assert_eq!(sink.delivered.lock().unwrap()[0].answered_count, 1);
}

#[tokio::test(start_paused = true)]
async fn closing_input_abandons_the_session() {
    let sink = Arc::new(MemorySink::default());
    let input: &[u8] = b"choose q1 0\n";
    let mut output = Vec::new();

    let phase = run_session(session(600, sink.clone()), input, &mut output)
        .await
        .unwrap();

    assert_eq!(phase, SessionPhase::Abandoned);
    assert_eq!(types(&events(&output)).last().map(String::as_str), Some("abandoned"));
    tokio::time::sleep(Duration::from_secs(700)).await;
    assert!(sink.delivered.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn submit_waits_for_confirmation() {
    let sink = Arc::new(MemorySink::default());
    let input: &[u8] = b"choose q1 1\nsubmit\ncancel\nchoose q2 0\nsubmit\nconfirm\n";
    let mut output = Vec::new();

    let phase = run_session(session(600, sink.clone()), input, &mut output)
        .await
        .unwrap();

    assert_eq!(phase, SessionPhase::Submitted);
    let events = events(&output);
    let prompts: Vec<_> = events
        .iter()
        .filter(|e| e["type"] == "confirm_submit")
        .map(|e| e["answered"].as_u64().unwrap())
        .collect();
    assert_eq!(prompts, vec![1, 2]);
    assert!(events
        .iter()
        .any(|e| e["type"] == "ack" && e["message"] == "Submission cancelled."));

    let delivered = sink.delivered.lock().unwrap();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].answered_count, 2);
}

#[tokio::test(start_paused = true)]
async fn another_command_backs_out_of_a_pending_submit() {
    let sink = Arc::new(MemorySink::default());
    let input: &[u8] = b"submit\nnext\nconfirm\n";
    let mut output = Vec::new();

    let phase = run_session(session(600, sink.clone()), input, &mut output)
        .await
        .unwrap();

    assert_eq!(phase, SessionPhase::Abandoned);
    let types = types(&events(&output));
    assert!(types.contains(&"confirm_submit".to_string()));
    assert!(!types.contains(&"submitting".to_string()));
    assert!(sink.delivered.lock().unwrap().is_empty());
}
