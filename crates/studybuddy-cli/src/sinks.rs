use std::fmt;
use std::path::{Path, PathBuf};
use studybuddy_core::{OutputFormat, OutputSink, Result, RunOutput};

const SEPARATOR: &str = "--------------------------------------------------";

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Plain-text answer sheet, one block per question.
pub struct TextFileSink {
    path: PathBuf,
}

impl TextFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn render(output: &RunOutput) -> String {
        AnswerSheet(output).to_string()
    }
}

struct AnswerSheet<'a>(&'a RunOutput);

impl fmt::Display for AnswerSheet<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let output = self.0;
        for (question, answer) in output.pairs() {
            writeln!(f, "Question {}: {}", question.number, question.text)?;
            writeln!(f, "Answer: {}", answer.text)?;
            writeln!(f, "{}", SEPARATOR)?;
            writeln!(f)?;
        }

        let unprocessed = &output.report.unprocessed_questions;
        if !unprocessed.is_empty() {
            writeln!(
                f,
                "Not answered (question limit {}):",
                output.report.question_limit.unwrap_or_default()
            )?;
            for question in unprocessed {
                writeln!(f, "{}", question)?;
            }
        }
        Ok(())
    }
}

impl OutputSink for TextFileSink {
    fn write(&self, output: &RunOutput) -> Result<PathBuf> {
        ensure_parent(&self.path)?;
        std::fs::write(&self.path, Self::render(output))?;
        Ok(self.path.clone())
    }
}

/// The whole run, report included, as pretty JSON.
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl OutputSink for JsonFileSink {
    fn write(&self, output: &RunOutput) -> Result<PathBuf> {
        ensure_parent(&self.path)?;
        let json = serde_json::to_string_pretty(output)?;
        std::fs::write(&self.path, json)?;
        Ok(self.path.clone())
    }
}

pub fn sink_for(format: OutputFormat, path: &Path) -> Box<dyn OutputSink> {
    match format {
        OutputFormat::Text => Box::new(TextFileSink::new(path)),
        OutputFormat::Json => Box::new(JsonFileSink::new(path)),
    }
}
