//! Harvest engine: OAI-PMH paging, PDF retrieval and text extraction, report output.
mod export;
mod fetch;
mod filename;
pub mod oai;
mod orchestrator;
mod pdf;
mod persist;
mod progress;
mod resolve;
mod session;
mod types;

pub use export::{write_run_report, ExportError, ExportOptions, ExportSummary};
pub use fetch::{build_url, FetchSettings, ReqwestTransport, Transport};
pub use filename::{fulltext_filename, metadata_filename};
pub use oai::{find_file_refs, ParseError};
pub use orchestrator::{BatchOrchestrator, RunSettings};
pub use pdf::{ExtractionOutcome, LopdfExtractor, TextExtractor};
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use progress::{ChannelProgressSink, LogProgressSink, ProgressSink};
pub use resolve::{PdfResolver, TransportPdfResolver};
pub use session::HarvestSession;
pub use types::{RawResponse, RunEvent, TransportError};
