use std::sync::Arc;

use anyhow::Context;
use engine_logging::{engine_info, engine_warn};
use oai_harvest_core::RunReport;
use oai_harvest_engine::{
    write_run_report, BatchOrchestrator, ExportSummary, LogProgressSink, LopdfExtractor,
    ReqwestTransport, TransportPdfResolver,
};
use tokio_util::sync::CancellationToken;

use crate::config::HarvestConfig;

/// Harvest, extract and export one configured run. Ctrl-C stops it after the
/// records in progress.
pub async fn run(config: &HarvestConfig) -> anyhow::Result<(RunReport, ExportSummary)> {
    let oai = ReqwestTransport::new(config.oai_fetch()).context("building OAI client")?;
    let pdf = ReqwestTransport::new(config.pdf_fetch()).context("building PDF client")?;
    let extractor = match config.pdf_password.as_deref() {
        Some(password) => LopdfExtractor::new().with_password(password),
        None => LopdfExtractor::new(),
    };

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            engine_warn!("interrupted; finishing records in progress");
            on_interrupt.cancel();
        }
    });

    let report = BatchOrchestrator::new(Arc::new(oai), Arc::new(extractor), config.run_settings())
        .with_progress(Arc::new(LogProgressSink))
        .run(
            config.request(),
            Arc::new(TransportPdfResolver::new(Arc::new(pdf))),
            cancel,
        )
        .await;

    let summary = write_run_report(&config.output_dir, &report, &config.export_options())
        .with_context(|| format!("writing results to {:?}", config.output_dir))?;
    engine_info!(
        "{} records processed, {} failed, report at {}",
        report.counts.processed(),
        report.counts.failed(),
        summary.report_path.display()
    );
    Ok((report, summary))
}
