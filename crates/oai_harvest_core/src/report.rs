use serde::{Deserialize, Serialize};

use crate::HarvestFailure;

/// Separator placed between the texts of consecutive PDF pages.
pub const PAGE_SEPARATOR: char = '\u{000C}';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Success,
    PartialFailure,
    Unreadable,
    FetchFailure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub identifier: String,
    pub outcome: Outcome,
    pub text: String,
    pub page_count: usize,
    pub failed_pages: usize,
    pub detail: Option<String>,
    pub file_refs: Vec<String>,
    /// Inner XML of the record's `<metadata>` element.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
}

impl ExtractionResult {
    pub fn fetch_failure(
        identifier: impl Into<String>,
        file_refs: Vec<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            outcome: Outcome::FetchFailure,
            text: String::new(),
            page_count: 0,
            failed_pages: 0,
            detail: Some(detail.into()),
            file_refs,
            metadata: None,
        }
    }

    /// Page texts in document order, one slot per page. Pages without text
    /// yield an empty slot; a result without any text yields nothing.
    pub fn pages(&self) -> impl Iterator<Item = &str> {
        (!self.text.is_empty())
            .then(|| self.text.split(PAGE_SEPARATOR))
            .into_iter()
            .flatten()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    Deleted,
    NoFileReference,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRecord {
    pub identifier: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunCounts {
    pub success: usize,
    pub partial: usize,
    pub unreadable: usize,
    pub fetch_failure: usize,
    pub skipped_deleted: usize,
    pub skipped_no_file: usize,
}

impl RunCounts {
    pub fn processed(&self) -> usize {
        self.success + self.partial + self.unreadable + self.fetch_failure
    }

    pub fn failed(&self) -> usize {
        self.unreadable + self.fetch_failure
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RunStatus {
    #[default]
    Running,
    Completed,
    Failed {
        reason: HarvestFailure,
    },
    Cancelled,
}

/// Outcome of one batch run. Always produced, even when the harvest stops early.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunReport {
    pub status: RunStatus,
    pub results: Vec<ExtractionResult>,
    pub skipped: Vec<SkippedRecord>,
    pub counts: RunCounts,
    pub pages_harvested: usize,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, result: ExtractionResult) {
        match result.outcome {
            Outcome::Success => self.counts.success += 1,
            Outcome::PartialFailure => self.counts.partial += 1,
            Outcome::Unreadable => self.counts.unreadable += 1,
            Outcome::FetchFailure => self.counts.fetch_failure += 1,
        }
        self.results.push(result);
    }

    pub fn skip(&mut self, identifier: impl Into<String>, reason: SkipReason) {
        match reason {
            SkipReason::Deleted => self.counts.skipped_deleted += 1,
            SkipReason::NoFileReference => self.counts.skipped_no_file += 1,
        }
        self.skipped.push(SkippedRecord {
            identifier: identifier.into(),
            reason,
        });
    }

    /// Seal the report. Later calls do not overwrite the first status.
    pub fn finish(&mut self, status: RunStatus) {
        if self.status == RunStatus::Running {
            self.status = status;
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, RunStatus::Failed { .. })
    }
}
