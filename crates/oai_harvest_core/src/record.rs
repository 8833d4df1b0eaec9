use std::fmt;

use serde::{Deserialize, Serialize};

/// One `<record>` (or bare `<header>`) from an OAI-PMH response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestRecord {
    pub identifier: String,
    pub datestamp: String,
    pub sets: Vec<String>,
    pub deleted: bool,
    /// Inner XML of the `<metadata>` element, verbatim.
    pub metadata: Option<String>,
    pub file_refs: Vec<String>,
}

impl HarvestRecord {
    pub fn new(identifier: impl Into<String>, datestamp: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            datestamp: datestamp.into(),
            sets: Vec::new(),
            deleted: false,
            metadata: None,
            file_refs: Vec::new(),
        }
    }

    /// ARK identifier (`ark:/NAAN/NAME`) embedded in the OAI identifier, if any.
    pub fn ark(&self) -> Option<&str> {
        let start = self.identifier.find("ark:/")?;
        let ark = &self.identifier[start..];
        let mut parts = ark["ark:/".len()..].split('/');
        match (parts.next(), parts.next()) {
            (Some(naan), Some(name)) if !naan.is_empty() && !name.is_empty() => {
                Some(&ark[..("ark:/".len() + naan.len() + 1 + name.len())])
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResumptionToken {
    pub value: String,
    pub expiration: Option<String>,
    pub complete_list_size: Option<u64>,
    pub cursor: Option<u64>,
}

impl ResumptionToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.value.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OaiErrorCode {
    BadArgument,
    BadResumptionToken,
    BadVerb,
    CannotDisseminateFormat,
    IdDoesNotExist,
    NoRecordsMatch,
    NoMetadataFormats,
    NoSetHierarchy,
    Other(String),
}

impl OaiErrorCode {
    pub fn from_code(code: &str) -> Self {
        match code {
            "badArgument" => OaiErrorCode::BadArgument,
            "badResumptionToken" => OaiErrorCode::BadResumptionToken,
            "badVerb" => OaiErrorCode::BadVerb,
            "cannotDisseminateFormat" => OaiErrorCode::CannotDisseminateFormat,
            "idDoesNotExist" => OaiErrorCode::IdDoesNotExist,
            "noRecordsMatch" => OaiErrorCode::NoRecordsMatch,
            "noMetadataFormats" => OaiErrorCode::NoMetadataFormats,
            "noSetHierarchy" => OaiErrorCode::NoSetHierarchy,
            other => OaiErrorCode::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            OaiErrorCode::BadArgument => "badArgument",
            OaiErrorCode::BadResumptionToken => "badResumptionToken",
            OaiErrorCode::BadVerb => "badVerb",
            OaiErrorCode::CannotDisseminateFormat => "cannotDisseminateFormat",
            OaiErrorCode::IdDoesNotExist => "idDoesNotExist",
            OaiErrorCode::NoRecordsMatch => "noRecordsMatch",
            OaiErrorCode::NoMetadataFormats => "noMetadataFormats",
            OaiErrorCode::NoSetHierarchy => "noSetHierarchy",
            OaiErrorCode::Other(code) => code,
        }
    }
}

impl fmt::Display for OaiErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed OAI-PMH response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedPage {
    RecordBatch {
        records: Vec<HarvestRecord>,
        resumption_token: Option<ResumptionToken>,
    },
    OaiError {
        code: OaiErrorCode,
        message: String,
    },
}
