use std::path::{Path, PathBuf};

use oai_harvest_core::{ExtractionResult, RunReport};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::filename::{fulltext_filename, metadata_filename};
use crate::persist::{AtomicFileWriter, PersistError};

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub report_filename: String,
    /// Write one `<document>` file per record that yielded text, plus the
    /// record's metadata next to it.
    pub write_fulltext: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            report_filename: "run_report.json".to_string(),
            write_fulltext: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub report_path: PathBuf,
    pub fulltext_paths: Vec<PathBuf>,
    pub metadata_paths: Vec<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
    #[error("cannot render full text for {identifier}: {message}")]
    Xml { identifier: String, message: String },
}

/// Write the report as JSON plus the full-text documents into `output_dir`.
pub fn write_run_report(
    output_dir: &Path,
    report: &RunReport,
    options: &ExportOptions,
) -> Result<ExportSummary, ExportError> {
    let writer = AtomicFileWriter::open(output_dir)?;

    let mut fulltext_paths = Vec::new();
    let mut metadata_paths = Vec::new();
    if options.write_fulltext {
        for result in report.results.iter().filter(|r| !r.text.is_empty()) {
            let xml = render_fulltext(result)?;
            fulltext_paths.push(writer.write(&fulltext_filename(&result.identifier), xml)?);
            if let Some(metadata) = &result.metadata {
                let xml = render_metadata(metadata);
                metadata_paths.push(writer.write(&metadata_filename(&result.identifier), xml)?);
            }
        }
    }
    let report_path = writer.write_json(&options.report_filename, report)?;

    engine_logging::engine_info!(
        "exported {} with {} full-text and {} metadata documents",
        report_path.display(),
        fulltext_paths.len(),
        metadata_paths.len()
    );
    Ok(ExportSummary {
        report_path,
        fulltext_paths,
        metadata_paths,
    })
}

/// The harvested `<metadata>` payload as a standalone document.
fn render_metadata(metadata: &str) -> Vec<u8> {
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{}\n", metadata.trim()).into_bytes()
}

/// `<document identifier="…"><page number="1">…</page>…</document>`, one
/// `<page>` per PDF page. Pages without text are written empty.
pub(crate) fn render_fulltext(result: &ExtractionResult) -> Result<Vec<u8>, ExportError> {
    let xml_err = |err| xml_error(&result.identifier, err);
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_err)?;
    let document = BytesStart::new("document")
        .with_attributes([("identifier", result.identifier.as_str())]);
    writer.write_event(Event::Start(document)).map_err(xml_err)?;
    for (index, page) in result.pages().enumerate() {
        let number = (index + 1).to_string();
        let start = BytesStart::new("page").with_attributes([("number", number.as_str())]);
        if page.is_empty() {
            writer.write_event(Event::Empty(start)).map_err(xml_err)?;
            continue;
        }
        writer.write_event(Event::Start(start)).map_err(xml_err)?;
        let text = xml_safe(page);
        writer
            .write_event(Event::Text(BytesText::new(&text)))
            .map_err(xml_err)?;
        writer
            .write_event(Event::End(BytesEnd::new("page")))
            .map_err(xml_err)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new("document")))
        .map_err(xml_err)?;
    Ok(writer.into_inner())
}

fn xml_error(identifier: &str, err: impl std::fmt::Display) -> ExportError {
    ExportError::Xml {
        identifier: identifier.to_string(),
        message: err.to_string(),
    }
}

/// Drops characters XML 1.0 cannot carry.
fn xml_safe(text: &str) -> String {
    text.chars()
        .filter(|&c| matches!(c, '\t' | '\n' | '\r') || c >= ' ')
        .filter(|&c| !matches!(c, '\u{FFFE}' | '\u{FFFF}'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use oai_harvest_core::{Outcome, PAGE_SEPARATOR};

    #[test]
    fn pages_become_escaped_page_elements() {
        let result = ExtractionResult {
            identifier: "oai:x:1".to_string(),
            outcome: Outcome::Success,
            text: format!("a < b{PAGE_SEPARATOR}second\u{0001} page"),
            page_count: 2,
            failed_pages: 0,
            detail: None,
            file_refs: Vec::new(),
            metadata: None,
        };
        let xml = String::from_utf8(render_fulltext(&result).unwrap()).unwrap();
        assert!(xml.contains(r#"<document identifier="oai:x:1">"#), "{xml}");
        assert!(xml.contains(r#"<page number="1">a &lt; b</page>"#), "{xml}");
        assert!(xml.contains(r#"<page number="2">second page</page>"#), "{xml}");
    }

    #[test]
    fn pages_without_text_keep_their_number() {
        let result = ExtractionResult {
            identifier: "oai:x:2".to_string(),
            outcome: Outcome::PartialFailure,
            text: format!("one{PAGE_SEPARATOR}{PAGE_SEPARATOR}three"),
            page_count: 3,
            failed_pages: 1,
            detail: Some("1 of 3 pages had no extractable text".to_string()),
            file_refs: Vec::new(),
            metadata: None,
        };
        let xml = String::from_utf8(render_fulltext(&result).unwrap()).unwrap();
        assert!(xml.contains(r#"<page number="2"/>"#), "{xml}");
        assert!(xml.contains(r#"<page number="3">three</page>"#), "{xml}");
    }
}
