#![allow(dead_code)]

use std::sync::Once;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream, StringFormat};
use md5::{Digest, Md5};

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engine_logging::initialize_for_tests);
}

/// A PDF whose pages carry the given texts; `None` is a page with graphics only.
pub fn pdf_with_pages(pages: &[Option<&str>]) -> Vec<u8> {
    save(build_document(pages))
}

/// Same pages, encrypted with the 40-bit RC4 standard security handler.
pub fn encrypted_pdf_with_pages(pages: &[Option<&str>], user_password: &str) -> Vec<u8> {
    const PAD: [u8; 32] = [
        0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01,
        0x08, 0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53,
        0x69, 0x7A,
    ];
    let padded = |password: &str| -> Vec<u8> {
        let bytes = &password.as_bytes()[..password.len().min(32)];
        bytes.iter().chain(PAD.iter()).take(32).copied().collect()
    };
    let file_id = b"oai-harvest-test".to_vec();
    let permissions: i32 = -4;

    let owner_key = Md5::digest(padded("owner secret"));
    let owner_entry = rc4(&owner_key[..5], &padded(user_password));
    let mut seed = padded(user_password);
    seed.extend_from_slice(&owner_entry);
    seed.extend_from_slice(&permissions.to_le_bytes());
    seed.extend_from_slice(&file_id);
    let key = Md5::digest(&seed)[..5].to_vec();
    let user_entry = rc4(&key, &PAD);

    let mut doc = build_document(pages);
    for (&id, object) in doc.objects.iter_mut() {
        // RC4 is symmetric, so the reader's per-object cipher also encrypts.
        if let Ok(content) = lopdf::encryption::decrypt_object(&key, id, object) {
            if let Object::Stream(stream) = object {
                stream.set_content(content);
            }
        }
    }
    let encrypt_id = doc.add_object(dictionary! {
        "Filter" => "Standard",
        "V" => 1,
        "R" => 2,
        "Length" => 40,
        "O" => Object::String(owner_entry, StringFormat::Hexadecimal),
        "U" => Object::String(user_entry, StringFormat::Hexadecimal),
        "P" => permissions as i64,
    });
    doc.trailer.set("Encrypt", encrypt_id);
    doc.trailer.set(
        "ID",
        vec![
            Object::String(file_id.clone(), StringFormat::Hexadecimal),
            Object::String(file_id, StringFormat::Hexadecimal),
        ],
    );
    save(doc)
}

fn rc4(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut state: Vec<u8> = (0..=255).collect();
    let mut j = 0u8;
    for i in 0..256 {
        j = j.wrapping_add(state[i]).wrapping_add(key[i % key.len()]);
        state.swap(i, j as usize);
    }
    let (mut i, mut j) = (0u8, 0u8);
    data.iter()
        .map(|byte| {
            i = i.wrapping_add(1);
            j = j.wrapping_add(state[i as usize]);
            state.swap(i as usize, j as usize);
            byte ^ state[state[i as usize].wrapping_add(state[j as usize]) as usize]
        })
        .collect()
}

fn save(mut doc: Document) -> Vec<u8> {
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("save pdf");
    bytes
}

fn build_document(pages: &[Option<&str>]) -> Document {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids = Vec::new();
    for page in pages {
        let operations = match page {
            Some(text) => vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 712.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
            None => vec![
                Operation::new("re", vec![72.into(), 72.into(), 200.into(), 100.into()]),
                Operation::new("f", vec![]),
            ],
        };
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("encode content"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        kids.push(Object::from(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc
}

pub struct TestRecord<'a> {
    pub identifier: &'a str,
    pub datestamp: &'a str,
    pub deleted: bool,
    pub pdf_url: Option<String>,
}

impl<'a> TestRecord<'a> {
    pub fn live(identifier: &'a str, pdf_url: impl Into<String>) -> Self {
        Self {
            identifier,
            datestamp: "2024-01-15",
            deleted: false,
            pdf_url: Some(pdf_url.into()),
        }
    }

    pub fn deleted(identifier: &'a str) -> Self {
        Self {
            identifier,
            datestamp: "2024-01-15",
            deleted: true,
            pdf_url: None,
        }
    }

    pub fn without_file(identifier: &'a str) -> Self {
        Self {
            identifier,
            datestamp: "2024-01-15",
            deleted: false,
            pdf_url: None,
        }
    }
}

fn envelope(verb: &str, body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<OAI-PMH xmlns="http://www.openarchives.org/OAI/2.0/">
  <responseDate>2024-02-01T10:00:00Z</responseDate>
  <request verb="{verb}">http://example.org/oai</request>
  {body}
</OAI-PMH>"#
    )
}

/// A `ListRecords` page; an empty `token` renders the closing empty token.
pub fn list_records(records: &[TestRecord<'_>], token: Option<&str>) -> String {
    let mut body = String::from("<ListRecords>");
    for record in records {
        let status = if record.deleted { r#" status="deleted""# } else { "" };
        body.push_str(&format!(
            "<record><header{status}><identifier>{}</identifier><datestamp>{}</datestamp><setSpec>theses</setSpec></header>",
            record.identifier, record.datestamp
        ));
        if !record.deleted {
            let link = record
                .pdf_url
                .as_deref()
                .map(|url| format!("<dc:identifier>{url}</dc:identifier>"))
                .unwrap_or_default();
            body.push_str(&format!(
                r#"<metadata><oai_dc:dc xmlns:oai_dc="http://www.openarchives.org/OAI/2.0/oai_dc/" xmlns:dc="http://purl.org/dc/elements/1.1/"><dc:title>Record {}</dc:title>{link}</oai_dc:dc></metadata>"#,
                record.identifier
            ));
        }
        body.push_str("</record>");
    }
    match token {
        Some("") => body.push_str(r#"<resumptionToken completeListSize="6" cursor="3"/>"#),
        Some(token) => body.push_str(&format!(
            r#"<resumptionToken completeListSize="6" cursor="0">{token}</resumptionToken>"#
        )),
        None => {}
    }
    body.push_str("</ListRecords>");
    envelope("ListRecords", &body)
}

pub fn oai_error(code: &str, message: &str) -> String {
    envelope(
        "ListRecords",
        &format!(r#"<error code="{code}">{message}</error>"#),
    )
}
