pub mod exam_file;
pub mod submission_log;

pub use exam_file::JsonExamFile;
pub use submission_log::JsonlSubmissionLog;
