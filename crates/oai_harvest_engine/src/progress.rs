use std::sync::mpsc;

use crate::RunEvent;

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: RunEvent);
}

/// Forwards events over a channel; a dropped receiver is ignored.
pub struct ChannelProgressSink {
    tx: mpsc::Sender<RunEvent>,
}

impl ChannelProgressSink {
    pub fn new(tx: mpsc::Sender<RunEvent>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelProgressSink {
    fn emit(&self, event: RunEvent) {
        let _ = self.tx.send(event);
    }
}

/// Writes each event to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgressSink;

impl ProgressSink for LogProgressSink {
    fn emit(&self, event: RunEvent) {
        match event {
            RunEvent::PageHarvested { page } => {
                engine_logging::engine_info!("harvested page {}", page);
            }
            RunEvent::RecordStarted {
                identifier,
                file_refs,
            } => {
                engine_logging::engine_debug!("{}: resolving {} file(s)", identifier, file_refs);
            }
            RunEvent::RecordSkipped {
                identifier,
                deleted,
            } => {
                let reason = if deleted { "deleted" } else { "no file reference" };
                engine_logging::engine_debug!("{}: skipped ({})", identifier, reason);
            }
            RunEvent::RecordFinished {
                identifier,
                outcome,
            } => {
                engine_logging::engine_info!("{}: {:?}", identifier, outcome);
            }
        }
    }
}
