//! OAI-PMH response parsing.
//!
//! Turns one response envelope into a [`ParsedPage`]: either a batch of
//! records with an optional resumption token, or the first OAI error.

use oai_harvest_core::{HarvestRecord, OaiErrorCode, ParsedPage, ResumptionToken};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("response is not valid UTF-8: {0}")]
    Encoding(String),
    #[error("malformed XML: {0}")]
    Xml(String),
    #[error("not an OAI-PMH envelope (root element {0:?})")]
    NotOai(String),
}

fn xml_err(err: impl std::fmt::Display) -> ParseError {
    ParseError::Xml(err.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Identifier,
    Datestamp,
    SetSpec,
    Token,
    Error,
}

/// Parse a raw OAI-PMH response body.
pub fn parse(raw: &[u8]) -> Result<ParsedPage, ParseError> {
    let text = std::str::from_utf8(raw).map_err(|err| ParseError::Encoding(err.to_string()))?;
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut saw_root = false;
    let mut in_record = false;
    let mut in_header = false;
    let mut current: Option<HarvestRecord> = None;
    let mut records = Vec::new();
    let mut token: Option<ResumptionToken> = None;
    let mut error: Option<(String, String)> = None;
    let mut error_code = String::new();
    let mut field: Option<Field> = None;
    let mut text_buf = String::new();
    let mut depth = 0usize;

    loop {
        match reader.read_event().map_err(xml_err)? {
            Event::Start(e) => {
                depth += 1;
                let name = e.local_name();
                if !saw_root {
                    check_root(name.as_ref())?;
                    saw_root = true;
                    continue;
                }
                match name.as_ref() {
                    b"record" => {
                        in_record = true;
                        current = Some(HarvestRecord::new("", ""));
                    }
                    b"header" => {
                        in_header = true;
                        let record = current.get_or_insert_with(|| HarvestRecord::new("", ""));
                        record.deleted = attribute(&e, "status")?.as_deref() == Some("deleted");
                    }
                    b"identifier" if in_header => field = Some(Field::Identifier),
                    b"datestamp" if in_header => field = Some(Field::Datestamp),
                    b"setSpec" if in_header => field = Some(Field::SetSpec),
                    b"metadata" if in_record => {
                        let end = e.to_end().into_owned();
                        let inner = reader.read_text(end.name()).map_err(xml_err)?;
                        depth -= 1;
                        if let Some(record) = current.as_mut() {
                            record.metadata = Some(inner.trim().to_string());
                        }
                    }
                    b"resumptionToken" => {
                        token = Some(token_hints(&e)?);
                        field = Some(Field::Token);
                    }
                    b"error" => {
                        error_code = attribute(&e, "code")?.unwrap_or_default();
                        field = Some(Field::Error);
                    }
                    _ => {}
                }
                text_buf.clear();
            }
            Event::Empty(e) => {
                let name = e.local_name();
                if !saw_root {
                    check_root(name.as_ref())?;
                    saw_root = true;
                    continue;
                }
                match name.as_ref() {
                    b"metadata" if in_record => {
                        if let Some(record) = current.as_mut() {
                            record.metadata = Some(String::new());
                        }
                    }
                    b"resumptionToken" => token = Some(token_hints(&e)?),
                    b"error" if error.is_none() => {
                        let code = attribute(&e, "code")?.unwrap_or_default();
                        error = Some((code, String::new()));
                    }
                    _ => {}
                }
            }
            Event::Text(t) => {
                if field.is_some() {
                    text_buf.push_str(&t.unescape().map_err(xml_err)?);
                }
            }
            Event::CData(c) => {
                if field.is_some() {
                    text_buf.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::End(e) => {
                depth = depth.saturating_sub(1);
                let value = text_buf.trim().to_string();
                match (e.local_name().as_ref(), field.take()) {
                    (b"identifier", Some(Field::Identifier)) => {
                        if let Some(record) = current.as_mut() {
                            record.identifier = value;
                        }
                    }
                    (b"datestamp", Some(Field::Datestamp)) => {
                        if let Some(record) = current.as_mut() {
                            record.datestamp = value;
                        }
                    }
                    (b"setSpec", Some(Field::SetSpec)) => {
                        if let Some(record) = current.as_mut() {
                            record.sets.push(value);
                        }
                    }
                    (b"resumptionToken", Some(Field::Token)) => {
                        if let Some(token) = token.as_mut() {
                            token.value = value;
                        }
                    }
                    (b"error", Some(Field::Error)) => {
                        if error.is_none() {
                            error = Some((std::mem::take(&mut error_code), value));
                        }
                    }
                    (b"header", _) => {
                        in_header = false;
                        // ListIdentifiers returns bare headers.
                        if !in_record {
                            records.extend(current.take().map(finish_record));
                        }
                    }
                    (b"record", _) => {
                        in_record = false;
                        records.extend(current.take().map(finish_record));
                    }
                    (_, other) => field = other,
                }
                text_buf.clear();
            }
            Event::Eof if depth > 0 => {
                return Err(ParseError::Xml(format!(
                    "unexpected end of document with {depth} element(s) open"
                )));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err(ParseError::NotOai(String::new()));
    }

    if let Some((code, message)) = error {
        return Ok(ParsedPage::OaiError {
            code: OaiErrorCode::from_code(&code),
            message,
        });
    }

    Ok(ParsedPage::RecordBatch {
        records,
        resumption_token: token.filter(|t| !t.is_empty()),
    })
}

fn check_root(name: &[u8]) -> Result<(), ParseError> {
    if name == b"OAI-PMH" {
        Ok(())
    } else {
        Err(ParseError::NotOai(String::from_utf8_lossy(name).into_owned()))
    }
}

fn attribute(e: &BytesStart<'_>, key: &str) -> Result<Option<String>, ParseError> {
    let attr = e.try_get_attribute(key).map_err(xml_err)?;
    attr.map(|a| a.unescape_value().map(|v| v.into_owned()).map_err(xml_err))
        .transpose()
}

fn token_hints(e: &BytesStart<'_>) -> Result<ResumptionToken, ParseError> {
    Ok(ResumptionToken {
        value: String::new(),
        expiration: attribute(e, "expirationDate")?,
        complete_list_size: attribute(e, "completeListSize")?.and_then(|v| v.parse().ok()),
        cursor: attribute(e, "cursor")?.and_then(|v| v.parse().ok()),
    })
}

fn finish_record(mut record: HarvestRecord) -> HarvestRecord {
    if record.deleted {
        record.metadata = None;
        record.file_refs.clear();
    } else if let Some(metadata) = record.metadata.as_deref() {
        record.file_refs = find_file_refs(metadata);
    }
    record
}

/// PDF references found in a metadata payload: text or attribute values that
/// are http(s)/file URLs whose path ends in `.pdf`.
pub fn find_file_refs(metadata: &str) -> Vec<String> {
    let mut refs: Vec<String> = Vec::new();
    let mut push = |candidate: &str| {
        let candidate = candidate.trim();
        if is_pdf_ref(candidate) && !refs.iter().any(|r| r == candidate) {
            refs.push(candidate.to_string());
        }
    };

    let mut reader = Reader::from_str(metadata);
    reader.config_mut().trim_text(true);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                for attr in e.attributes().flatten() {
                    if let Ok(value) = attr.unescape_value() {
                        push(&value);
                    }
                }
            }
            Ok(Event::Text(t)) => {
                if let Ok(text) = t.unescape() {
                    push(&text);
                }
            }
            Ok(Event::CData(c)) => push(&String::from_utf8_lossy(&c.into_inner())),
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => {
                engine_logging::engine_debug!("stopped scanning metadata for file refs: {}", err);
                break;
            }
        }
    }
    refs
}

fn is_pdf_ref(candidate: &str) -> bool {
    let Ok(url) = url::Url::parse(candidate) else {
        return false;
    };
    matches!(url.scheme(), "http" | "https" | "file")
        && url.path().to_ascii_lowercase().ends_with(".pdf")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_pdf_urls_in_text_and_attributes() {
        let metadata = r#"<untl:metadata xmlns:untl="http://digital2.library.unt.edu/untl/">
            <untl:identifier qualifier="pdf">https://example.org/files/thesis.PDF</untl:identifier>
            <untl:link href="https://example.org/a.pdf?download=1"/>
            <untl:identifier>https://example.org/item/</untl:identifier>
            <untl:note>see https://example.org/files/thesis.PDF</untl:note>
            <untl:identifier>https://example.org/files/thesis.PDF</untl:identifier>
        </untl:metadata>"#;
        assert_eq!(
            find_file_refs(metadata),
            vec![
                "https://example.org/files/thesis.PDF".to_string(),
                "https://example.org/a.pdf?download=1".to_string(),
            ]
        );
    }

    #[test]
    fn rejects_non_url_and_foreign_schemes() {
        assert!(!is_pdf_ref("thesis.pdf"));
        assert!(!is_pdf_ref("ftp://example.org/thesis.pdf"));
        assert!(is_pdf_ref("file:///data/thesis.pdf"));
    }
}
