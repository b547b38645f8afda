use std::path::Path;
use studybuddy_core::{Document, DocumentLoader, Result, StudyBuddyError};
use tracing::{debug, info};

/// Loads PDFs and plain-text files from disk.
#[derive(Debug, Default, Clone)]
pub struct FileDocumentLoader;

impl FileDocumentLoader {
    pub fn new() -> Self {
        Self
    }

    fn extract(path: &Path) -> Result<String> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            // pdf-extract panics on some malformed inputs
            "pdf" => match std::panic::catch_unwind(|| pdf_extract::extract_text(path)) {
                Ok(Ok(text)) => Ok(text),
                Ok(Err(e)) => Err(StudyBuddyError::document_load(format!(
                    "failed to parse PDF {}: {}",
                    path.display(),
                    e
                ))),
                Err(_) => Err(StudyBuddyError::document_load(format!(
                    "PDF parser aborted on {}",
                    path.display()
                ))),
            },
            "txt" | "md" | "markdown" => std::fs::read_to_string(path).map_err(|e| {
                StudyBuddyError::document_load(format!(
                    "failed to read {}: {}",
                    path.display(),
                    e
                ))
            }),
            other => Err(StudyBuddyError::document_load(format!(
                "unsupported document type {:?} for {}",
                other,
                path.display()
            ))),
        }
    }
}

impl DocumentLoader for FileDocumentLoader {
    fn load(&self, path: &Path) -> Result<Document> {
        if !path.is_file() {
            return Err(StudyBuddyError::document_load(format!(
                "document not found: {}",
                path.display()
            )));
        }

        debug!("Extracting text from {}", path.display());
        let document = Document::new(path, Self::extract(path)?);
        if document.is_blank() {
            return Err(StudyBuddyError::document_load(format!(
                "no extractable text in {}",
                path.display()
            )));
        }

        info!(
            "Loaded {} ({} bytes of text)",
            document.display_name(),
            document.text.len()
        );
        Ok(document)
    }
}
