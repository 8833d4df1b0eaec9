use std::time::Duration;

use futures_util::StreamExt;
use oai_harvest_core::TransportErrorKind;
use reqwest::header::{CONTENT_TYPE, RETRY_AFTER};

use crate::{RawResponse, TransportError};

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub redirect_limit: usize,
    pub max_bytes: u64,
    /// Accepted media types; empty accepts anything.
    pub allowed_content_types: Vec<String>,
    pub user_agent: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
            redirect_limit: 5,
            max_bytes: 64 * 1024 * 1024,
            allowed_content_types: Vec::new(),
            user_agent: concat!("oai_harvest/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl FetchSettings {
    /// Settings for OAI-PMH endpoints: XML bodies only.
    pub fn for_oai() -> Self {
        Self {
            max_bytes: 32 * 1024 * 1024,
            allowed_content_types: vec!["text/xml".to_string(), "application/xml".to_string()],
            ..Self::default()
        }
    }

    /// Settings for PDF downloads.
    pub fn for_pdf() -> Self {
        Self {
            request_timeout: Duration::from_secs(120),
            max_bytes: 256 * 1024 * 1024,
            allowed_content_types: vec![
                "application/pdf".to_string(),
                "application/x-pdf".to_string(),
                "application/octet-stream".to_string(),
            ],
            ..Self::default()
        }
    }
}

/// One HTTP GET. No retries happen at this level.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(
        &self,
        url: &str,
        params: &[(String, String)],
    ) -> Result<RawResponse, TransportError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    settings: FetchSettings,
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(settings: FetchSettings) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .redirect(reqwest::redirect::Policy::limited(settings.redirect_limit))
            .user_agent(settings.user_agent.clone())
            .build()
            .map_err(|err| TransportError::new(TransportErrorKind::NetworkUnreachable, err.to_string()))?;
        Ok(Self { settings, client })
    }

    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    fn is_content_type_allowed(&self, content_type: &str) -> bool {
        if self.settings.allowed_content_types.is_empty() {
            return true;
        }
        let ct = content_type.split(';').next().unwrap_or(content_type).trim();
        self.settings
            .allowed_content_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(ct))
    }

    fn too_large(&self, actual: u64) -> TransportError {
        TransportError::new(
            TransportErrorKind::Malformed,
            format!(
                "response too large (max {}, actual {actual})",
                self.settings.max_bytes
            ),
        )
    }
}

/// Append `params` to `url` as a query string.
pub fn build_url(url: &str, params: &[(String, String)]) -> Result<reqwest::Url, TransportError> {
    let mut parsed = reqwest::Url::parse(url)
        .map_err(|err| TransportError::new(TransportErrorKind::InvalidUrl, err.to_string()))?;
    if !params.is_empty() {
        parsed.query_pairs_mut().extend_pairs(params);
    }
    Ok(parsed)
}

#[async_trait::async_trait]
impl Transport for ReqwestTransport {
    async fn fetch(
        &self,
        url: &str,
        params: &[(String, String)],
    ) -> Result<RawResponse, TransportError> {
        let target = build_url(url, params)?;
        engine_logging::engine_debug!("GET {}", target);

        let response = self
            .client
            .get(target)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if let Some(kind) = TransportErrorKind::from_status(status.as_u16()) {
            let retry_after = parse_retry_after(response.headers().get(RETRY_AFTER));
            return Err(TransportError::new(kind, status.to_string()).with_retry_after(retry_after));
        }
        if !status.is_success() {
            return Err(TransportError::new(
                TransportErrorKind::Malformed,
                format!("unexpected status {status}"),
            ));
        }

        if let Some(content_len) = response.content_length() {
            if content_len > self.settings.max_bytes {
                return Err(self.too_large(content_len));
            }
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        if let Some(ct) = content_type.as_deref() {
            if !self.is_content_type_allowed(ct) {
                return Err(TransportError::new(
                    TransportErrorKind::Malformed,
                    format!("unsupported content type {ct}"),
                ));
            }
        }

        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = body.len() as u64 + chunk.len() as u64;
            if next_len > self.settings.max_bytes {
                return Err(self.too_large(next_len));
            }
            body.extend_from_slice(&chunk);
        }
        engine_logging::engine_trace!("{} -> {} bytes", final_url, body.len());

        Ok(RawResponse {
            status: status.as_u16(),
            final_url,
            content_type,
            body,
        })
    }
}

fn parse_retry_after(value: Option<&reqwest::header::HeaderValue>) -> Option<Duration> {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        return TransportError::new(TransportErrorKind::Timeout, err.to_string());
    }
    if err.is_redirect() {
        return TransportError::new(TransportErrorKind::Malformed, err.to_string());
    }
    if err.is_body() || err.is_decode() {
        return TransportError::new(TransportErrorKind::Malformed, err.to_string());
    }
    TransportError::new(TransportErrorKind::NetworkUnreachable, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_is_appended_and_encoded() {
        let url = build_url(
            "https://example.org/oai",
            &[
                ("verb".to_string(), "ListRecords".to_string()),
                ("set".to_string(), "access_rights:public".to_string()),
            ],
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://example.org/oai?verb=ListRecords&set=access_rights%3Apublic"
        );
        assert_eq!(
            build_url("https://example.org/x.pdf", &[]).unwrap().as_str(),
            "https://example.org/x.pdf"
        );
    }

    #[test]
    fn invalid_url_is_reported() {
        let err = build_url("not a url", &[]).unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::InvalidUrl);
    }

    #[test]
    fn retry_after_accepts_seconds_only() {
        let secs = reqwest::header::HeaderValue::from_static("7");
        assert_eq!(parse_retry_after(Some(&secs)), Some(Duration::from_secs(7)));
        let date = reqwest::header::HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT");
        assert_eq!(parse_retry_after(Some(&date)), None);
    }
}
