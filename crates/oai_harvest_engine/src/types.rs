use std::time::Duration;

use oai_harvest_core::{ExtractionResult, HarvestRecord, Outcome, TransportErrorKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub final_url: String,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
    /// Server-provided `Retry-After` hint.
    pub retry_after: Option<Duration>,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retry_after: None,
        }
    }

    pub(crate) fn with_retry_after(mut self, retry_after: Option<Duration>) -> Self {
        self.retry_after = retry_after;
        self
    }
}

/// Progress notifications emitted while a batch runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    PageHarvested { page: usize },
    RecordStarted { identifier: String, file_refs: usize },
    RecordSkipped { identifier: String, deleted: bool },
    RecordFinished { identifier: String, outcome: Outcome },
}

impl RunEvent {
    pub(crate) fn started(record: &HarvestRecord, file_refs: usize) -> Self {
        RunEvent::RecordStarted {
            identifier: record.identifier.clone(),
            file_refs,
        }
    }

    pub(crate) fn finished(result: &ExtractionResult) -> Self {
        RunEvent::RecordFinished {
            identifier: result.identifier.clone(),
            outcome: result.outcome,
        }
    }
}
