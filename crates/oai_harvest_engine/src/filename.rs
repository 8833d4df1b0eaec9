use sha2::{Digest, Sha256};

const MAX_STEM: usize = 80;

/// Deterministic, filesystem-safe name for a record's full-text document:
/// `{sanitized_identifier}--{short_hash}-fulltext.xml`.
///
/// The hash keeps identifiers that sanitize to the same stem apart.
pub fn fulltext_filename(identifier: &str) -> String {
    format!("{}-fulltext.xml", record_stem(identifier))
}

/// Name of the metadata file written next to [`fulltext_filename`].
pub fn metadata_filename(identifier: &str) -> String {
    format!("{}-metadata.xml", record_stem(identifier))
}

fn record_stem(identifier: &str) -> String {
    let stem = sanitize(identifier.rsplit_once("ark:/").map_or(identifier, |(_, ark)| ark));
    format!("{stem}--{}", short_hash(identifier))
}

fn sanitize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        let c = if is_forbidden(c) { '_' } else { c };
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }
    let mut out = out.trim_matches(&['_', ' ', '.'][..]).to_string();
    if out.is_empty() {
        out = "record".to_string();
    }
    if out.len() > MAX_STEM {
        let mut end = MAX_STEM;
        while !out.is_char_boundary(end) {
            end -= 1;
        }
        out.truncate(end);
    }
    if is_reserved_windows_name(&out) {
        out.push('_');
    }
    out
}

fn is_forbidden(c: char) -> bool {
    matches!(c, '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0'..='\u{1F}')
}

fn is_reserved_windows_name(name: &str) -> bool {
    const RESERVED: &[&str] = &[
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
        "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(name))
}

fn short_hash(input: &str) -> String {
    use std::fmt::Write;
    let digest = Sha256::digest(input.as_bytes());
    digest.iter().take(4).fold(String::with_capacity(8), |mut hex, byte| {
        let _ = write!(hex, "{byte:02x}");
        hex
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ark_identifiers_use_the_ark_path() {
        let name = fulltext_filename("info:ark/67531/metadc1234");
        assert!(name.starts_with("info_ark_67531_metadc1234--"), "{name}");
        let name = fulltext_filename("ark:/67531/metadc1234");
        assert!(name.starts_with("67531_metadc1234--"), "{name}");
        assert!(name.ends_with("-fulltext.xml"));
    }

    #[test]
    fn names_are_stable_and_distinct() {
        let a = fulltext_filename("oai:repo:a/b");
        assert_eq!(a, fulltext_filename("oai:repo:a/b"));
        assert_ne!(a, fulltext_filename("oai:repo:a:b"));
    }

    #[test]
    fn metadata_sits_next_to_fulltext() {
        let fulltext = fulltext_filename("ark:/67531/metadc1234");
        let metadata = metadata_filename("ark:/67531/metadc1234");
        assert_eq!(
            fulltext.strip_suffix("-fulltext.xml"),
            metadata.strip_suffix("-metadata.xml")
        );
    }

    #[test]
    fn reserved_and_empty_stems_are_escaped() {
        assert!(fulltext_filename("con").starts_with("con_--"));
        assert!(fulltext_filename("::").starts_with("record--"));
    }
}
