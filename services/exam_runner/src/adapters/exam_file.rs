//! services/exam_runner/src/adapters/exam_file.rs
//!
//! A `QuestionSource` backed by a JSON question bank on disk. The file mirrors the
//! exam and question tables of the hosted backend.

use async_trait::async_trait;
use exam_session_core::domain::{ChoiceIndex, ExamInfo, Question, QuestionId, QuestionKind};
use exam_session_core::ports::{PortError, PortResult, QuestionSource};
use serde::Deserialize;
use std::path::PathBuf;
use tracing::info;
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

#[derive(Clone, Debug)]
pub struct JsonExamFile {
    path: PathBuf,
}

impl JsonExamFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

//=========================================================================================
// "Impure" File Record Structs
//=========================================================================================

#[derive(Deserialize)]
struct QuestionBankRecord {
    exams: Vec<ExamRecord>,
}

#[derive(Deserialize)]
struct ExamRecord {
    id: Uuid,
    title: String,
    /// Minutes, as entered by the exam author.
    duration: u64,
    #[serde(default)]
    questions: Vec<QuestionRecord>,
}

#[derive(Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum QuestionTypeRecord {
    Mcq,
    Descriptive,
    Image,
}

#[derive(Deserialize)]
struct QuestionRecord {
    id: String,
    #[serde(rename = "type")]
    question_type: QuestionTypeRecord,
    question: String,
    #[serde(default)]
    options: Vec<String>,
    /// 0-based index into `options`.
    correct_option: Option<usize>,
    marks: u32,
    image_url: Option<String>,
}

impl QuestionRecord {
    fn to_domain(self) -> PortResult<Question> {
        let kind = match self.question_type {
            QuestionTypeRecord::Mcq => {
                if self.options.is_empty() {
                    return Err(PortError::Unexpected(format!(
                        "question {} is multiple choice but has no options",
                        self.id
                    )));
                }
                if let Some(correct) = self.correct_option {
                    if correct >= self.options.len() {
                        return Err(PortError::Unexpected(format!(
                            "question {} marks option {} correct but has {} options",
                            self.id,
                            correct,
                            self.options.len()
                        )));
                    }
                }
                QuestionKind::SingleChoice {
                    choices: self.options,
                    correct: self.correct_option.map(ChoiceIndex),
                }
            }
            QuestionTypeRecord::Descriptive => QuestionKind::FreeText,
            QuestionTypeRecord::Image => QuestionKind::ImageAnnotated {
                reference_image: self.image_url.ok_or_else(|| {
                    PortError::Unexpected(format!("image question {} has no image_url", self.id))
                })?,
            },
        };
        Ok(Question {
            id: QuestionId::new(self.id),
            kind,
            prompt: self.question,
            points: self.marks,
        })
    }
}

//=========================================================================================
// The Port Implementation
//=========================================================================================

#[async_trait]
impl QuestionSource for JsonExamFile {
    async fn load_exam(&self, exam_id: Uuid) -> PortResult<(ExamInfo, Vec<Question>)> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            PortError::Unexpected(format!("could not read {}: {}", self.path.display(), e))
        })?;
        let bank: QuestionBankRecord = serde_json::from_str(&raw)
            .map_err(|e| PortError::Unexpected(format!("malformed question bank: {}", e)))?;

        let exam = bank
            .exams
            .into_iter()
            .find(|exam| exam.id == exam_id)
            .ok_or_else(|| PortError::NotFound(format!("exam {}", exam_id)))?;

        let duration_secs = exam.duration.checked_mul(60).ok_or_else(|| {
            PortError::Unexpected(format!(
                "exam {} has an out-of-range duration of {} minutes",
                exam.id, exam.duration
            ))
        })?;

        let questions = exam
            .questions
            .into_iter()
            .map(QuestionRecord::to_domain)
            .collect::<PortResult<Vec<_>>>()?;

        info!(
            exam_id = %exam.id,
            questions = questions.len(),
            "Loaded exam from {}",
            self.path.display()
        );

        let info = ExamInfo {
            id: exam.id,
            title: exam.title,
            duration_secs,
        };
        Ok((info, questions))
    }
}
