use std::path::PathBuf;
use std::sync::Arc;

use oai_harvest_core::TransportErrorKind;

use crate::{Transport, TransportError};

/// Fetches the bytes behind a file reference.
#[async_trait::async_trait]
pub trait PdfResolver: Send + Sync {
    async fn resolve(&self, reference: &str) -> Result<Vec<u8>, TransportError>;
}

/// Resolves `http(s)://` references through a [`Transport`] and `file://`
/// URLs or bare paths from the local filesystem.
#[derive(Clone)]
pub struct TransportPdfResolver {
    transport: Arc<dyn Transport>,
}

impl TransportPdfResolver {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }
}

fn local_path(reference: &str) -> Option<PathBuf> {
    if let Ok(url) = url::Url::parse(reference) {
        return match url.scheme() {
            "file" => url.to_file_path().ok(),
            // Windows drive letters parse as one-letter schemes.
            scheme if scheme.len() == 1 => Some(PathBuf::from(reference)),
            _ => None,
        };
    }
    Some(PathBuf::from(reference))
}

#[async_trait::async_trait]
impl PdfResolver for TransportPdfResolver {
    async fn resolve(&self, reference: &str) -> Result<Vec<u8>, TransportError> {
        if let Some(path) = local_path(reference) {
            return tokio::fs::read(&path).await.map_err(|err| {
                let kind = if err.kind() == std::io::ErrorKind::NotFound {
                    TransportErrorKind::Client(404)
                } else {
                    TransportErrorKind::NetworkUnreachable
                };
                TransportError::new(kind, format!("{}: {err}", path.display()))
            });
        }
        self.transport
            .fetch(reference, &[])
            .await
            .map(|response| response.body)
    }
}
