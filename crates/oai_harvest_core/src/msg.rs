use std::time::Duration;

use crate::{ParsedPage, TransportErrorKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Begin the harvest with the original request.
    Start,
    /// Consumer drained the buffered page and wants the next one.
    Continue,
    /// A response body was parsed into an OAI envelope.
    PageParsed(ParsedPage),
    /// The page request failed below the OAI layer.
    TransportFailed {
        kind: TransportErrorKind,
        retry_after: Option<Duration>,
        detail: String,
    },
    /// The response body was not a usable OAI-PMH document.
    ParseFailed(String),
    /// Cooperative cancellation; no new requests after this.
    Cancel,
}
