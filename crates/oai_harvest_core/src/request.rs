use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Verb {
    #[default]
    ListRecords,
    GetRecord,
    ListIdentifiers,
}

impl Verb {
    pub fn as_str(self) -> &'static str {
        match self {
            Verb::ListRecords => "ListRecords",
            Verb::GetRecord => "GetRecord",
            Verb::ListIdentifiers => "ListIdentifiers",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A selective-harvesting bound in one of the two OAI granularities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum OaiDate {
    Day(NaiveDate),
    Seconds(DateTime<Utc>),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid OAI datestamp {0:?}")]
pub struct InvalidDate(pub String);

impl FromStr for OaiDate {
    type Err = InvalidDate;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        if let Ok(day) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            return Ok(OaiDate::Day(day));
        }
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| OaiDate::Seconds(dt.with_timezone(&Utc)))
            .map_err(|_| InvalidDate(raw.to_string()))
    }
}

impl fmt::Display for OaiDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OaiDate::Day(day) => write!(f, "{}", day.format("%Y-%m-%d")),
            OaiDate::Seconds(dt) => f.write_str(&dt.to_rfc3339_opts(SecondsFormat::Secs, true)),
        }
    }
}

impl Serialize for OaiDate {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for OaiDate {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Parameters of one OAI-PMH harvest.
///
/// When `resumption_token` is set it is the only selective argument sent on
/// the wire; the other fields are still kept so an expired token can be
/// recovered from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestRequest {
    pub verb: Verb,
    pub metadata_prefix: String,
    pub set: Option<String>,
    pub from: Option<OaiDate>,
    pub until: Option<OaiDate>,
    pub identifier: Option<String>,
    pub resumption_token: Option<String>,
}

impl Default for HarvestRequest {
    fn default() -> Self {
        Self {
            verb: Verb::ListRecords,
            metadata_prefix: "oai_dc".to_string(),
            set: None,
            from: None,
            until: None,
            identifier: None,
            resumption_token: None,
        }
    }
}

impl HarvestRequest {
    pub fn list_records(metadata_prefix: impl Into<String>) -> Self {
        Self {
            metadata_prefix: metadata_prefix.into(),
            ..Self::default()
        }
    }

    pub fn list_identifiers(metadata_prefix: impl Into<String>) -> Self {
        Self {
            verb: Verb::ListIdentifiers,
            metadata_prefix: metadata_prefix.into(),
            ..Self::default()
        }
    }

    pub fn get_record(metadata_prefix: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            verb: Verb::GetRecord,
            metadata_prefix: metadata_prefix.into(),
            identifier: Some(identifier.into()),
            ..Self::default()
        }
    }

    pub fn with_set(mut self, set: impl Into<String>) -> Self {
        self.set = Some(set.into());
        self
    }

    pub fn with_from(mut self, from: OaiDate) -> Self {
        self.from = Some(from);
        self
    }

    pub fn with_until(mut self, until: OaiDate) -> Self {
        self.until = Some(until);
        self
    }

    /// True when a `from` or `until` bound restricts the harvest.
    pub fn is_date_bounded(&self) -> bool {
        self.from.is_some() || self.until.is_some()
    }

    /// Query parameters for the wire, in a stable order.
    pub fn query_params(&self) -> Vec<(String, String)> {
        let mut params = vec![("verb".to_string(), self.verb.to_string())];
        if let Some(token) = self.resumption_token.as_deref().filter(|t| !t.is_empty()) {
            params.push(("resumptionToken".to_string(), token.to_string()));
            return params;
        }
        params.push(("metadataPrefix".to_string(), self.metadata_prefix.clone()));
        if self.verb == Verb::GetRecord {
            if let Some(identifier) = &self.identifier {
                params.push(("identifier".to_string(), identifier.clone()));
            }
            return params;
        }
        if let Some(set) = &self.set {
            params.push(("set".to_string(), set.clone()));
        }
        if let Some(from) = &self.from {
            params.push(("from".to_string(), from.to_string()));
        }
        if let Some(until) = &self.until {
            params.push(("until".to_string(), until.to_string()));
        }
        params
    }

    /// The request that continues this harvest with `token`.
    pub(crate) fn continued_with(&self, token: &str) -> Self {
        Self {
            resumption_token: Some(token.to_string()),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(params: &[(String, String)]) -> Vec<(&str, &str)> {
        params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }

    #[test]
    fn selective_params_are_rendered_in_order() {
        let request = HarvestRequest::list_records("untl_raw")
            .with_set("access_rights:public")
            .with_from("2024-01-01".parse().unwrap())
            .with_until("2024-02-01T12:00:00Z".parse().unwrap());

        assert_eq!(
            pairs(&request.query_params()),
            vec![
                ("verb", "ListRecords"),
                ("metadataPrefix", "untl_raw"),
                ("set", "access_rights:public"),
                ("from", "2024-01-01"),
                ("until", "2024-02-01T12:00:00Z"),
            ]
        );
    }

    #[test]
    fn token_supersedes_selective_params() {
        let request = HarvestRequest::list_records("oai_dc")
            .with_set("s")
            .continued_with("abc");
        assert_eq!(
            pairs(&request.query_params()),
            vec![("verb", "ListRecords"), ("resumptionToken", "abc")]
        );
    }

    #[test]
    fn get_record_sends_identifier_only() {
        let request = HarvestRequest::get_record("oai_dc", "ark:/67531/metadc1").with_set("ignored");
        assert_eq!(
            pairs(&request.query_params()),
            vec![
                ("verb", "GetRecord"),
                ("metadataPrefix", "oai_dc"),
                ("identifier", "ark:/67531/metadc1"),
            ]
        );
    }

    #[test]
    fn oai_dates_parse_both_granularities() {
        assert_eq!(
            "2023-05-06".parse::<OaiDate>().unwrap().to_string(),
            "2023-05-06"
        );
        assert_eq!(
            "2023-05-06T07:08:09Z".parse::<OaiDate>().unwrap().to_string(),
            "2023-05-06T07:08:09Z"
        );
        assert!("yesterday".parse::<OaiDate>().is_err());
    }
}
