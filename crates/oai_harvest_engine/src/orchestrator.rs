use std::sync::Arc;
use std::time::Duration;

use engine_logging::{engine_info, engine_warn};
use futures_util::stream::{FuturesOrdered, StreamExt};
use oai_harvest_core::{
    ExtractionResult, HarvestRecord, HarvestRequest, Outcome, RetryPolicy, RunReport, RunStatus,
    SessionState, SkipReason, PAGE_SEPARATOR,
};
use tokio_util::sync::CancellationToken;

use crate::pdf::{ExtractionOutcome, TextExtractor};
use crate::{HarvestSession, PdfResolver, ProgressSink, RunEvent, Transport};

#[derive(Debug, Clone)]
pub struct RunSettings {
    pub endpoint: String,
    pub retry: RetryPolicy,
    /// Records fetched and extracted at the same time; 1 is sequential.
    pub workers: usize,
    /// Extra PDF location derived from ARK identifiers, e.g.
    /// `https://digital.library.unt.edu/{ark}/m2/1/high_res_d/`.
    pub pdf_url_template: Option<String>,
    /// Stop harvesting once this many records were sent to extraction.
    pub max_records: Option<usize>,
    /// Pause between dispatching two records.
    pub item_delay: Duration,
}

impl RunSettings {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            retry: RetryPolicy::default(),
            workers: 1,
            pdf_url_template: None,
            max_records: None,
            item_delay: Duration::ZERO,
        }
    }
}

struct NullProgressSink;

impl ProgressSink for NullProgressSink {
    fn emit(&self, _event: RunEvent) {}
}

/// Drives a harvest session and turns each record into an [`ExtractionResult`].
pub struct BatchOrchestrator {
    transport: Arc<dyn Transport>,
    extractor: Arc<dyn TextExtractor>,
    settings: RunSettings,
    sink: Arc<dyn ProgressSink>,
}

impl BatchOrchestrator {
    pub fn new(
        transport: Arc<dyn Transport>,
        extractor: Arc<dyn TextExtractor>,
        settings: RunSettings,
    ) -> Self {
        Self {
            transport,
            extractor,
            settings,
            sink: Arc::new(NullProgressSink),
        }
    }

    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Harvest `request` and extract text for every live record.
    ///
    /// Always returns a report; a failed or cancelled harvest keeps every
    /// result gathered before it stopped.
    pub async fn run(
        &self,
        request: HarvestRequest,
        resolver: Arc<dyn PdfResolver>,
        cancel: CancellationToken,
    ) -> RunReport {
        engine_info!(
            "starting {} harvest of {}",
            request.verb,
            self.settings.endpoint
        );
        let mut session = HarvestSession::new(
            self.transport.clone(),
            self.settings.endpoint.clone(),
            request,
            self.settings.retry.clone(),
        )
        .with_cancellation(cancel.clone());

        let workers = self.settings.workers.max(1);
        let mut report = RunReport::new();
        let mut in_flight = FuturesOrdered::new();
        let mut harvesting = true;
        let mut pages_seen = 0;
        let mut dispatched = 0usize;
        let mut capped = false;

        loop {
            while harvesting && in_flight.len() < workers {
                if cancel.is_cancelled() {
                    harvesting = false;
                    break;
                }
                if self.settings.max_records.is_some_and(|max| dispatched >= max) {
                    engine_info!("record limit of {} reached", dispatched);
                    capped = true;
                    harvesting = false;
                    break;
                }
                let record = match session.next_record().await {
                    Ok(Some(record)) => record,
                    Ok(None) => {
                        harvesting = false;
                        break;
                    }
                    Err(failure) => {
                        report.finish(RunStatus::Failed { reason: failure });
                        harvesting = false;
                        break;
                    }
                };

                while pages_seen < session.pages_harvested() {
                    pages_seen += 1;
                    self.sink.emit(RunEvent::PageHarvested { page: pages_seen });
                }

                if record.deleted {
                    self.skip(&mut report, record.identifier, SkipReason::Deleted);
                    continue;
                }
                let refs = self.file_refs(&record);
                if refs.is_empty() {
                    self.skip(&mut report, record.identifier, SkipReason::NoFileReference);
                    continue;
                }

                if dispatched > 0 && !self.settings.item_delay.is_zero() {
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            harvesting = false;
                            break;
                        }
                        _ = tokio::time::sleep(self.settings.item_delay) => {}
                    }
                }
                dispatched += 1;

                self.sink.emit(RunEvent::started(&record, refs.len()));
                let resolver = resolver.clone();
                let extractor = self.extractor.clone();
                let identifier = record.identifier;
                let metadata = record.metadata;
                let worker = tokio::spawn(process_record(
                    resolver,
                    extractor,
                    identifier.clone(),
                    refs.clone(),
                ));
                in_flight.push_back(async move {
                    let result = worker.await.unwrap_or_else(|err| {
                        engine_warn!("{}: record worker failed: {}", identifier, err);
                        ExtractionResult {
                            outcome: Outcome::Unreadable,
                            ..ExtractionResult::fetch_failure(
                                identifier,
                                refs,
                                format!("worker failed: {err}"),
                            )
                        }
                    });
                    ExtractionResult { metadata, ..result }
                });
            }

            let Some(result) = in_flight.next().await else {
                break;
            };
            self.sink.emit(RunEvent::finished(&result));
            report.push(result);
        }

        report.pages_harvested = session.pages_harvested();
        let status = match session.state() {
            SessionState::Exhausted => RunStatus::Completed,
            _ if capped => RunStatus::Completed,
            _ => RunStatus::Cancelled,
        };
        report.finish(status);
        engine_info!(
            "run finished ({:?}): {} ok, {} partial, {} unreadable, {} fetch failures, {} deleted",
            report.status,
            report.counts.success,
            report.counts.partial,
            report.counts.unreadable,
            report.counts.fetch_failure,
            report.counts.skipped_deleted
        );
        report
    }

    fn skip(&self, report: &mut RunReport, identifier: String, reason: SkipReason) {
        self.sink.emit(RunEvent::RecordSkipped {
            identifier: identifier.clone(),
            deleted: reason == SkipReason::Deleted,
        });
        report.skip(identifier, reason);
    }

    /// References from the metadata plus the templated ARK location, if any.
    fn file_refs(&self, record: &HarvestRecord) -> Vec<String> {
        let mut refs = record.file_refs.clone();
        let templated = self
            .settings
            .pdf_url_template
            .as_deref()
            .zip(record.ark())
            .map(|(template, ark)| {
                template
                    .replace("{ark}", ark)
                    .replace("{identifier}", &record.identifier)
            });
        if let Some(url) = templated {
            if !refs.contains(&url) {
                refs.push(url);
            }
        }
        refs
    }
}

async fn process_record(
    resolver: Arc<dyn PdfResolver>,
    extractor: Arc<dyn TextExtractor>,
    identifier: String,
    refs: Vec<String>,
) -> ExtractionResult {
    let mut documents = Vec::with_capacity(refs.len());
    let mut fetch_errors = Vec::new();
    for reference in &refs {
        match resolver.resolve(reference).await {
            Ok(bytes) => documents.push(bytes),
            Err(err) => {
                engine_warn!("{}: cannot fetch {}: {}", identifier, reference, err);
                fetch_errors.push(format!("{reference}: {err}"));
            }
        }
    }

    if documents.is_empty() {
        let detail = fetch_errors.join("; ");
        return ExtractionResult::fetch_failure(identifier, refs, detail);
    }

    let mut outcomes = Vec::with_capacity(documents.len());
    for bytes in documents {
        let extractor = extractor.clone();
        let outcome = tokio::task::spawn_blocking(move || extractor.extract(&bytes))
            .await
            .unwrap_or_else(|err| ExtractionOutcome::unreadable(format!("extraction task failed: {err}")));
        outcomes.push(outcome);
    }

    merge(identifier, refs, outcomes, fetch_errors)
}

/// One result per record, whatever the number of documents behind it.
fn merge(
    identifier: String,
    refs: Vec<String>,
    outcomes: Vec<ExtractionOutcome>,
    fetch_errors: Vec<String>,
) -> ExtractionResult {
    let all_ok = fetch_errors.is_empty() && outcomes.iter().all(|o| o.outcome == Outcome::Success);
    let any_text = outcomes.iter().any(|o| !o.text.is_empty());
    let outcome = if all_ok {
        Outcome::Success
    } else if any_text {
        Outcome::PartialFailure
    } else {
        Outcome::Unreadable
    };

    // Documents without text still occupy their pages.
    let mut slots: Vec<&str> = Vec::new();
    for o in &outcomes {
        if o.text.is_empty() {
            slots.extend(std::iter::repeat("").take(o.page_count));
        } else {
            slots.extend(o.text.split(PAGE_SEPARATOR));
        }
    }
    let text = if any_text {
        slots.join(&PAGE_SEPARATOR.to_string())
    } else {
        String::new()
    };
    let details: Vec<String> = fetch_errors
        .into_iter()
        .chain(outcomes.iter().filter_map(|o| o.detail.clone()))
        .collect();

    ExtractionResult {
        identifier,
        outcome,
        text,
        page_count: outcomes.iter().map(|o| o.page_count).sum(),
        failed_pages: outcomes.iter().map(|o| o.failed_pages.len()).sum(),
        detail: (!details.is_empty()).then(|| details.join("; ")),
        file_refs: refs,
        metadata: None,
    }
}
