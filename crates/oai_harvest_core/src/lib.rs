//! Harvest core: OAI-PMH data model, pure session state machine and run report.
mod effect;
mod failure;
mod msg;
mod record;
mod report;
mod request;
mod state;
mod update;

pub use effect::Effect;
pub use failure::{HarvestFailure, TransportErrorKind};
pub use msg::Msg;
pub use record::{HarvestRecord, OaiErrorCode, ParsedPage, ResumptionToken};
pub use report::{
    ExtractionResult, Outcome, RunCounts, RunReport, RunStatus, SkipReason, SkippedRecord,
    PAGE_SEPARATOR,
};
pub use request::{HarvestRequest, InvalidDate, OaiDate, Verb};
pub use state::{HarvestMachine, RetryPolicy, SessionState};
pub use update::update;
