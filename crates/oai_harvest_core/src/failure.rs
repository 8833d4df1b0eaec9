use std::fmt;

use serde::{Deserialize, Serialize};

use crate::OaiErrorCode;

/// Classification of a failed HTTP exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportErrorKind {
    NetworkUnreachable,
    Timeout,
    /// 5xx response.
    Server(u16),
    /// 4xx response.
    Client(u16),
    Malformed,
    InvalidUrl,
}

impl TransportErrorKind {
    /// Timeouts and 5xx responses are worth another attempt.
    pub fn is_transient(self) -> bool {
        matches!(self, TransportErrorKind::Timeout | TransportErrorKind::Server(_))
    }

    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            400..=499 => Some(TransportErrorKind::Client(status)),
            500..=599 => Some(TransportErrorKind::Server(status)),
            _ => None,
        }
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportErrorKind::NetworkUnreachable => write!(f, "network unreachable"),
            TransportErrorKind::Timeout => write!(f, "timeout"),
            TransportErrorKind::Server(code) => write!(f, "server error (http {code})"),
            TransportErrorKind::Client(code) => write!(f, "client error (http {code})"),
            TransportErrorKind::Malformed => write!(f, "malformed response"),
            TransportErrorKind::InvalidUrl => write!(f, "invalid url"),
        }
    }
}

/// Why a harvest session stopped before exhausting its list.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum HarvestFailure {
    #[error("transport failure: {kind}: {detail}")]
    Transport {
        kind: TransportErrorKind,
        detail: String,
    },
    #[error("gave up after {retries} retries: {kind}: {detail}")]
    RetriesExhausted {
        retries: u32,
        kind: TransportErrorKind,
        detail: String,
    },
    #[error("malformed OAI response: {0}")]
    Malformed(String),
    #[error("OAI error {code}: {message}")]
    OaiProtocol { code: OaiErrorCode, message: String },
    #[error("resumption token expired: {0}")]
    ResumptionExpired(String),
}
