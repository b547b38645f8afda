use crate::{Answer, ErrorKind, Question};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// A coarse chunk that produced no questions because its request kept failing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedChunk {
    pub chunk_index: usize,
    pub attempts: u32,
    pub kind: ErrorKind,
    pub error: String,
}

/// A question whose answer degraded to the placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnansweredQuestion {
    pub number: usize,
    pub kind: ErrorKind,
    pub reason: String,
}

/// Everything that happened during one run, including degraded units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub source: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub coarse_chunks: usize,
    pub fine_chunks: usize,
    pub questions_generated: usize,
    pub questions_answered: usize,
    pub question_limit: Option<usize>,
    pub skipped_chunks: Vec<SkippedChunk>,
    pub unanswered: Vec<UnansweredQuestion>,
    /// Questions cut off by the question limit, never sent for answering
    pub unprocessed_questions: Vec<Question>,
}

impl RunReport {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            source: source.into(),
            started_at: Utc::now(),
            finished_at: None,
            coarse_chunks: 0,
            fine_chunks: 0,
            questions_generated: 0,
            questions_answered: 0,
            question_limit: None,
            skipped_chunks: Vec::new(),
            unanswered: Vec::new(),
            unprocessed_questions: Vec::new(),
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// True when no chunk was skipped and no answer degraded.
    pub fn is_clean(&self) -> bool {
        self.skipped_chunks.is_empty() && self.unanswered.is_empty()
    }

    pub fn elapsed_ms(&self) -> Option<i64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds())
    }

    pub fn summary(&self) -> String {
        let mut lines = vec![format!(
            "run {}: {} coarse / {} fine chunks, {} questions generated, {} answered",
            self.run_id,
            self.coarse_chunks,
            self.fine_chunks,
            self.questions_generated,
            self.questions_answered
        )];

        if !self.skipped_chunks.is_empty() {
            let indices: Vec<String> = self
                .skipped_chunks
                .iter()
                .map(|s| s.chunk_index.to_string())
                .collect();
            lines.push(format!(
                "skipped {} chunk(s): {}",
                self.skipped_chunks.len(),
                indices.join(", ")
            ));
        }
        if !self.unanswered.is_empty() {
            let numbers: Vec<String> = self
                .unanswered
                .iter()
                .map(|u| u.number.to_string())
                .collect();
            lines.push(format!(
                "unanswered question(s): {}",
                numbers.join(", ")
            ));
        }
        if !self.unprocessed_questions.is_empty() {
            lines.push(format!(
                "{} question(s) beyond the limit of {} were not answered",
                self.unprocessed_questions.len(),
                self.question_limit.unwrap_or_default()
            ));
        }
        lines.join("\n")
    }
}

/// Final artifact of a run, handed to an output sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutput {
    pub source: PathBuf,
    pub questions: Vec<Question>,
    /// One entry per answered question, same order as `questions`
    pub answers: Vec<Answer>,
    pub report: RunReport,
}

impl RunOutput {
    /// Question/answer pairs in question order.
    pub fn pairs(&self) -> impl Iterator<Item = (&Question, &Answer)> {
        self.questions.iter().zip(self.answers.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_report_is_clean() {
        let mut report = RunReport::new("doc.pdf");
        assert!(report.is_clean());
        assert!(report.elapsed_ms().is_none());
        report.finish();
        assert!(report.elapsed_ms().is_some());
    }

    #[test]
    fn test_summary_lists_degraded_units() {
        let mut report = RunReport::new("doc.pdf");
        report.question_limit = Some(3);
        report.skipped_chunks.push(SkippedChunk {
            chunk_index: 2,
            attempts: 3,
            kind: ErrorKind::Generation,
            error: "rate limited".into(),
        });
        report.unanswered.push(UnansweredQuestion {
            number: 5,
            kind: ErrorKind::Timeout,
            reason: "slow".into(),
        });
        report.unprocessed_questions.push(Question::new(4, "Why?"));

        let summary = report.summary();
        assert!(!report.is_clean());
        assert!(summary.contains("skipped 1 chunk(s): 2"));
        assert!(summary.contains("unanswered question(s): 5"));
        assert!(summary.contains("beyond the limit of 3"));
    }
}
