use std::time::Duration;

use crate::state::Boundary;
use crate::{
    Effect, HarvestFailure, HarvestMachine, Msg, OaiDate, OaiErrorCode, ParsedPage, SessionState,
};

/// Pure update function: applies a message to a harvest session and returns any effects.
///
/// Messages that do not apply to the current state are ignored, and terminal
/// states ignore everything.
pub fn update(mut machine: HarvestMachine, msg: Msg) -> (HarvestMachine, Vec<Effect>) {
    if machine.state.is_terminal() {
        return (machine, Vec::new());
    }

    let effects = match msg {
        Msg::Start => {
            if machine.state != SessionState::Idle {
                return (machine, Vec::new());
            }
            let params = machine.request.query_params();
            vec![machine.issue(params, Duration::ZERO)]
        }
        Msg::Continue => {
            if machine.state != SessionState::Continuing {
                return (machine, Vec::new());
            }
            let params = match &machine.token {
                Some(token) => machine.request.continued_with(&token.value).query_params(),
                None => {
                    machine.state = SessionState::Exhausted;
                    return (machine, Vec::new());
                }
            };
            vec![machine.issue(params, Duration::ZERO)]
        }
        Msg::PageParsed(page) => {
            if machine.state != SessionState::Requesting {
                return (machine, Vec::new());
            }
            machine.retries = 0;
            match page {
                ParsedPage::RecordBatch {
                    records,
                    resumption_token,
                } => {
                    let records = machine.admit(records);
                    match resumption_token.filter(|token| !token.is_empty()) {
                        Some(token) => {
                            machine.token = Some(token);
                            machine.state = SessionState::Continuing;
                        }
                        None => {
                            machine.token = None;
                            machine.state = SessionState::Exhausted;
                        }
                    }
                    if records.is_empty() {
                        Vec::new()
                    } else {
                        vec![Effect::Emit(records)]
                    }
                }
                ParsedPage::OaiError { code, message } => match code {
                    OaiErrorCode::NoRecordsMatch => {
                        machine.token = None;
                        machine.state = SessionState::Exhausted;
                        Vec::new()
                    }
                    OaiErrorCode::BadResumptionToken => match machine.restart_params() {
                        Some(params) => {
                            machine.restarts += 1;
                            machine.token = None;
                            machine.replayed = machine.boundary.clone();
                            vec![machine.issue(params, Duration::ZERO)]
                        }
                        None => machine.fail(HarvestFailure::ResumptionExpired(message)),
                    },
                    code => machine.fail(HarvestFailure::OaiProtocol { code, message }),
                },
            }
        }
        Msg::TransportFailed {
            kind,
            retry_after,
            detail,
        } => {
            if machine.state != SessionState::Requesting {
                return (machine, Vec::new());
            }
            if !kind.is_transient() {
                machine.fail(HarvestFailure::Transport { kind, detail })
            } else if machine.retries >= machine.policy.max_retries {
                let retries = machine.retries;
                machine.fail(HarvestFailure::RetriesExhausted {
                    retries,
                    kind,
                    detail,
                })
            } else {
                machine.retries += 1;
                let delay = machine.policy.backoff(machine.retries, retry_after);
                let params = machine.in_flight.clone();
                vec![machine.issue(params, delay)]
            }
        }
        Msg::ParseFailed(detail) => {
            if machine.state != SessionState::Requesting {
                return (machine, Vec::new());
            }
            machine.fail(HarvestFailure::Malformed(detail))
        }
        Msg::Cancel => {
            machine.token = None;
            machine.state = SessionState::Cancelled;
            Vec::new()
        }
    };

    (machine, effects)
}

impl HarvestMachine {
    fn issue(&mut self, params: Vec<(String, String)>, delay: Duration) -> Effect {
        self.state = SessionState::Requesting;
        self.requests += 1;
        self.in_flight = params.clone();
        Effect::Request { params, delay }
    }

    fn fail(&mut self, failure: HarvestFailure) -> Vec<Effect> {
        self.token = None;
        self.failure = Some(failure);
        self.state = SessionState::Failed;
        Vec::new()
    }

    /// Parameters that resume a date-bounded harvest from the last confirmed
    /// datestamp, when that is allowed.
    fn restart_params(&self) -> Option<Vec<(String, String)>> {
        if !self.request.is_date_bounded() || self.restarts >= self.policy.max_token_restarts {
            return None;
        }
        let Boundary { key, .. } = self.boundary.as_ref()?;
        let from = match key.parse::<OaiDate>().ok()? {
            // A day datestamp under seconds bounds would mix granularities.
            OaiDate::Day(day) if !self.day_bounds() => {
                OaiDate::Seconds(day.and_hms_opt(0, 0, 0)?.and_utc())
            }
            from => from,
        };
        let mut restarted = self.request.clone();
        restarted.resumption_token = None;
        restarted.from = Some(from);
        Some(restarted.query_params())
    }
}
