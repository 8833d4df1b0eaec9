use std::panic::{self, AssertUnwindSafe};

use lopdf::Document;
use oai_harvest_core::{Outcome, PAGE_SEPARATOR};

/// Classified result of extracting text from one PDF.
///
/// `text` is empty, or holds exactly `page_count` separator-delimited slots
/// with failed pages left empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionOutcome {
    pub outcome: Outcome,
    pub text: String,
    pub page_count: usize,
    /// 1-based numbers of pages that yielded no text.
    pub failed_pages: Vec<u32>,
    pub detail: Option<String>,
}

impl ExtractionOutcome {
    pub(crate) fn unreadable(detail: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Unreadable,
            text: String::new(),
            page_count: 0,
            failed_pages: Vec::new(),
            detail: Some(detail.into()),
        }
    }
}

/// Extracts text from PDF bytes. Never fails; bad input is classified instead.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8]) -> ExtractionOutcome;
}

#[derive(Debug, Clone, Default)]
pub struct LopdfExtractor {
    password: Option<String>,
}

impl LopdfExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Password tried on encrypted documents.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    fn open(&self, bytes: &[u8]) -> Result<Document, String> {
        let mut doc = Document::load_mem(bytes).map_err(|err| {
            let message = err.to_string();
            if message.contains("encrypt") || message.contains("password") {
                format!("encrypted document: {message}")
            } else {
                format!("cannot parse PDF structure: {message}")
            }
        })?;

        if doc.is_encrypted() {
            let Some(password) = self.password.as_deref() else {
                return Err("encrypted document and no password configured".to_string());
            };
            doc.decrypt(password)
                .map_err(|err| format!("cannot decrypt document: {err}"))?;
        }
        Ok(doc)
    }

    fn extract_document(&self, bytes: &[u8]) -> ExtractionOutcome {
        let doc = match self.open(bytes) {
            Ok(doc) => doc,
            Err(detail) => return ExtractionOutcome::unreadable(detail),
        };

        let pages = doc.get_pages();
        if pages.is_empty() {
            return ExtractionOutcome::unreadable("document has no pages");
        }

        let mut texts = Vec::with_capacity(pages.len());
        let mut failed_pages = Vec::new();
        let mut first_error = None;
        for &page_number in pages.keys() {
            let extracted = panic::catch_unwind(AssertUnwindSafe(|| doc.extract_text(&[page_number])));
            match extracted {
                Ok(Ok(text)) if !text.trim().is_empty() => {
                    texts.push(text.trim().to_string());
                    continue;
                }
                Ok(Ok(_)) => {}
                Ok(Err(err)) => {
                    first_error.get_or_insert_with(|| format!("page {page_number}: {err}"));
                }
                Err(_) => {
                    first_error.get_or_insert_with(|| format!("page {page_number}: extractor panicked"));
                }
            }
            // Failed pages keep an empty slot so page numbers stay aligned.
            texts.push(String::new());
            failed_pages.push(page_number);
        }

        let page_count = pages.len();
        let outcome = classify(page_count, failed_pages.len());
        let detail = match outcome {
            Outcome::Success => None,
            _ => Some(first_error.unwrap_or_else(|| {
                format!("{} of {page_count} pages had no extractable text", failed_pages.len())
            })),
        };
        engine_logging::engine_debug!(
            "extracted {} of {} pages ({:?})",
            page_count - failed_pages.len(),
            page_count,
            outcome
        );

        let text = match outcome {
            Outcome::Unreadable => String::new(),
            _ => texts.join(&PAGE_SEPARATOR.to_string()),
        };
        ExtractionOutcome {
            outcome,
            text,
            page_count,
            failed_pages,
            detail,
        }
    }
}

impl TextExtractor for LopdfExtractor {
    fn extract(&self, bytes: &[u8]) -> ExtractionOutcome {
        match panic::catch_unwind(AssertUnwindSafe(|| self.extract_document(bytes))) {
            Ok(outcome) => outcome,
            Err(_) => ExtractionOutcome::unreadable("PDF parser panicked"),
        }
    }
}

fn classify(page_count: usize, failed: usize) -> Outcome {
    if failed == 0 {
        Outcome::Success
    } else if failed < page_count {
        Outcome::PartialFailure
    } else {
        Outcome::Unreadable
    }
}
