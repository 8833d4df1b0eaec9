use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use engine_logging::{engine_debug, engine_error, engine_info, engine_warn};
use futures_util::Stream;
use oai_harvest_core::{
    update, Effect, HarvestFailure, HarvestMachine, HarvestRecord, HarvestRequest, Msg,
    RetryPolicy, SessionState,
};
use tokio_util::sync::CancellationToken;

use crate::{oai, Transport};

/// Pull-based OAI-PMH harvest over one endpoint.
///
/// Pages are requested only when the previous page has been drained, so at
/// most one page is held ahead of the consumer. Once exhausted, failed or
/// cancelled the session stays finished.
pub struct HarvestSession {
    transport: Arc<dyn Transport>,
    endpoint: String,
    machine: HarvestMachine,
    buffer: VecDeque<HarvestRecord>,
    pending_failure: Option<HarvestFailure>,
    cancel: CancellationToken,
    pages: usize,
}

impl HarvestSession {
    pub fn new(
        transport: Arc<dyn Transport>,
        endpoint: impl Into<String>,
        request: HarvestRequest,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            endpoint: endpoint.into(),
            machine: HarvestMachine::new(request, policy),
            buffer: VecDeque::new(),
            pending_failure: None,
            cancel: CancellationToken::new(),
            pages: 0,
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn state(&self) -> SessionState {
        self.machine.state()
    }

    pub fn failure(&self) -> Option<&HarvestFailure> {
        self.machine.failure()
    }

    pub fn requests_issued(&self) -> usize {
        self.machine.requests_issued()
    }

    /// Pages successfully parsed so far.
    pub fn pages_harvested(&self) -> usize {
        self.pages
    }

    /// `completeListSize` hint from the most recent resumption token.
    pub fn complete_list_size(&self) -> Option<u64> {
        self.machine
            .resumption_token()
            .and_then(|token| token.complete_list_size)
    }

    /// Next record, `Ok(None)` when the list is finished.
    ///
    /// A failure is returned once; later calls yield `Ok(None)`.
    pub async fn next_record(&mut self) -> Result<Option<HarvestRecord>, HarvestFailure> {
        loop {
            if let Some(record) = self.buffer.pop_front() {
                return Ok(Some(record));
            }
            if self.cancel.is_cancelled() && !self.machine.state().is_terminal() {
                self.drive(Msg::Cancel).await;
            }
            match self.machine.state() {
                SessionState::Idle => self.drive(Msg::Start).await,
                SessionState::Continuing => self.drive(Msg::Continue).await,
                SessionState::Requesting => {
                    // `drive` resolves every request it issues; reaching this is a bug.
                    engine_error!("harvest of {} stalled with a request in flight", self.endpoint);
                    self.drive(Msg::ParseFailed("request was never answered".to_string()))
                        .await;
                }
                SessionState::Exhausted | SessionState::Cancelled => return Ok(None),
                SessionState::Failed => return self.pending_failure.take().map_or(Ok(None), Err),
            }
        }
    }

    /// The remaining records as a stream; ends after the first failure.
    pub fn into_stream(self) -> impl Stream<Item = Result<HarvestRecord, HarvestFailure>> {
        futures_util::stream::unfold(Some(self), |session| async move {
            let mut session = session?;
            match session.next_record().await {
                Ok(Some(record)) => Some((Ok(record), Some(session))),
                Ok(None) => None,
                Err(failure) => Some((Err(failure), None)),
            }
        })
    }

    async fn drive(&mut self, msg: Msg) {
        let mut next = Some(msg);
        while let Some(msg) = next.take() {
            let before = self.machine.state();
            let (machine, effects) = update(std::mem::take(&mut self.machine), msg);
            self.machine = machine;

            for effect in effects {
                match effect {
                    Effect::Emit(records) => self.buffer.extend(records),
                    Effect::Request { params, delay } => {
                        next = Some(self.request_page(&params, delay).await);
                    }
                }
            }

            let after = self.machine.state();
            if before != after {
                engine_debug!("harvest session {:?} -> {:?}", before, after);
            }
            if after == SessionState::Failed && self.pending_failure.is_none() {
                if let Some(failure) = self.machine.failure() {
                    engine_warn!("harvest of {} failed: {}", self.endpoint, failure);
                    self.pending_failure = Some(failure.clone());
                }
            }
            if after == SessionState::Exhausted && before != after {
                engine_info!(
                    "harvest of {} finished: {} records in {} pages",
                    self.endpoint,
                    self.machine.records_emitted(),
                    self.pages
                );
            }
        }
    }

    async fn request_page(&mut self, params: &[(String, String)], delay: Duration) -> Msg {
        if !delay.is_zero() {
            engine_info!("retrying {} in {:?}", self.endpoint, delay);
            tokio::select! {
                _ = self.cancel.cancelled() => return Msg::Cancel,
                _ = tokio::time::sleep(delay) => {}
            }
        }
        if self.cancel.is_cancelled() {
            return Msg::Cancel;
        }

        match self.transport.fetch(&self.endpoint, params).await {
            Ok(response) => match oai::parse(&response.body) {
                Ok(page) => {
                    self.pages += 1;
                    Msg::PageParsed(page)
                }
                Err(err) => Msg::ParseFailed(err.to_string()),
            },
            Err(err) => {
                engine_warn!("page request to {} failed: {}", self.endpoint, err);
                Msg::TransportFailed {
                    kind: err.kind,
                    retry_after: err.retry_after,
                    detail: err.message,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RawResponse, TransportError};
    use oai_harvest_core::TransportErrorKind;

    struct Unreachable;

    #[async_trait::async_trait]
    impl Transport for Unreachable {
        async fn fetch(
            &self,
            _url: &str,
            _params: &[(String, String)],
        ) -> Result<RawResponse, TransportError> {
            Err(TransportError::new(TransportErrorKind::NetworkUnreachable, "offline"))
        }
    }

    #[tokio::test]
    async fn stalled_request_is_a_failure_not_an_end() {
        let mut session = HarvestSession::new(
            Arc::new(Unreachable),
            "https://example.org/oai",
            HarvestRequest::default(),
            RetryPolicy::default(),
        );
        let (machine, _) = update(std::mem::take(&mut session.machine), Msg::Start);
        session.machine = machine;
        assert_eq!(session.state(), SessionState::Requesting);

        let failure = session.next_record().await.expect_err("stall fails");
        assert!(matches!(failure, HarvestFailure::Malformed(_)));
        assert_eq!(session.state(), SessionState::Failed);
    }
}
