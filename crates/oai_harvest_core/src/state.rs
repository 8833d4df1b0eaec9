use std::collections::HashSet;
use std::time::Duration;

use crate::{HarvestFailure, HarvestRecord, HarvestRequest, OaiDate, ResumptionToken};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Requesting,
    Continuing,
    Exhausted,
    Failed,
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Exhausted | SessionState::Failed | SessionState::Cancelled
        )
    }
}

/// Bounds on how hard a session tries before giving up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries per page after the first attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Restarts allowed after `badResumptionToken` on a date-bounded harvest.
    pub max_token_restarts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            max_token_restarts: 1,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based).
    pub fn backoff(&self, retry: u32, retry_after: Option<Duration>) -> Duration {
        let computed = retry_after.unwrap_or_else(|| {
            let factor = 2u32.saturating_pow(retry.saturating_sub(1));
            self.base_delay.saturating_mul(factor)
        });
        computed.min(self.max_delay)
    }
}

/// Records already emitted at the datestamp a restarted harvest resumes from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct Boundary {
    pub(crate) key: String,
    pub(crate) identifiers: HashSet<String>,
}

/// Pure state of one harvest session. Advanced only by [`crate::update`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HarvestMachine {
    pub(crate) state: SessionState,
    pub(crate) request: HarvestRequest,
    pub(crate) policy: RetryPolicy,
    pub(crate) token: Option<ResumptionToken>,
    pub(crate) in_flight: Vec<(String, String)>,
    pub(crate) retries: u32,
    pub(crate) restarts: u32,
    pub(crate) requests: usize,
    pub(crate) emitted: usize,
    pub(crate) boundary: Option<Boundary>,
    pub(crate) replayed: Option<Boundary>,
    pub(crate) failure: Option<HarvestFailure>,
}

impl HarvestMachine {
    pub fn new(request: HarvestRequest, policy: RetryPolicy) -> Self {
        Self {
            request,
            policy,
            ..Self::default()
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn request(&self) -> &HarvestRequest {
        &self.request
    }

    pub fn failure(&self) -> Option<&HarvestFailure> {
        self.failure.as_ref()
    }

    pub fn resumption_token(&self) -> Option<&ResumptionToken> {
        self.token.as_ref()
    }

    /// Page requests issued so far, retries included.
    pub fn requests_issued(&self) -> usize {
        self.requests
    }

    pub fn records_emitted(&self) -> usize {
        self.emitted
    }

    pub fn retries_for_current_page(&self) -> u32 {
        self.retries
    }

    /// Highest datestamp handed to the consumer so far.
    pub fn last_datestamp(&self) -> Option<&str> {
        self.boundary.as_ref().map(|b| b.key.as_str())
    }

    /// True when the request bounds use day granularity.
    pub(crate) fn day_bounds(&self) -> bool {
        matches!(self.request.from, Some(OaiDate::Day(_)))
            || matches!(self.request.until, Some(OaiDate::Day(_)))
    }

    /// Restart keys use the granularity of the original request bounds.
    pub(crate) fn datestamp_key(&self, datestamp: &str) -> String {
        match datestamp.get(..10) {
            Some(day) if self.day_bounds() => day.to_string(),
            _ => datestamp.to_string(),
        }
    }

    /// Drop records a restarted harvest already delivered, then remember the rest.
    pub(crate) fn admit(&mut self, records: Vec<HarvestRecord>) -> Vec<HarvestRecord> {
        let track = self.request.is_date_bounded();
        let mut admitted = Vec::with_capacity(records.len());
        for record in records {
            let key = self.datestamp_key(&record.datestamp);
            if let Some(replayed) = &self.replayed {
                if replayed.key == key && replayed.identifiers.contains(&record.identifier) {
                    continue;
                }
            }
            if track {
                let boundary = self.boundary.get_or_insert_with(Boundary::default);
                if key > boundary.key {
                    boundary.identifiers.clear();
                    boundary.key = key.clone();
                }
                if key == boundary.key {
                    boundary.identifiers.insert(record.identifier.clone());
                }
            }
            admitted.push(record);
        }
        self.emitted += admitted.len();
        admitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            ..RetryPolicy::default()
        };
        assert_eq!(policy.backoff(1, None), Duration::from_secs(1));
        assert_eq!(policy.backoff(2, None), Duration::from_secs(2));
        assert_eq!(policy.backoff(4, None), Duration::from_secs(8));
        assert_eq!(policy.backoff(5, None), Duration::from_secs(10));
        assert_eq!(
            policy.backoff(1, Some(Duration::from_secs(3))),
            Duration::from_secs(3)
        );
        assert_eq!(
            policy.backoff(1, Some(Duration::from_secs(300))),
            Duration::from_secs(10)
        );
    }

    #[test]
    fn day_granularity_truncates_keys() {
        let request = HarvestRequest::list_records("oai_dc").with_from("2024-01-01".parse().unwrap());
        let machine = HarvestMachine::new(request, RetryPolicy::default());
        assert_eq!(machine.datestamp_key("2024-03-04T05:06:07Z"), "2024-03-04");

        let machine = HarvestMachine::new(HarvestRequest::default(), RetryPolicy::default());
        assert_eq!(
            machine.datestamp_key("2024-03-04T05:06:07Z"),
            "2024-03-04T05:06:07Z"
        );
    }
}
