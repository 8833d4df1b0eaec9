use std::time::Duration;

use crate::HarvestRecord;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Issue one page request after waiting `delay`.
    Request {
        params: Vec<(String, String)>,
        delay: Duration,
    },
    /// Hand a page of records to the consumer.
    Emit(Vec<HarvestRecord>),
}
