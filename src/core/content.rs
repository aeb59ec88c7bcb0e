//! Content descriptor (metadata JSON) resolution.

use crate::types::Metadata;
use crate::utils::error::{FeedIndexerError, Result};
use crate::utils::http::{read_bytes, send};
use crate::utils::uri::to_gateway;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tokio_util::sync::CancellationToken;

const DATA_JSON_PREFIX: &str = "data:application/json";

/// Fetches and parses the metadata behind a content URI.
#[async_trait]
pub trait MetadataFetcher: Send + Sync {
    async fn fetch(&self, uri: &str, cancel: &CancellationToken) -> Result<Metadata>;
}

/// Fetches metadata over HTTP, rewriting content-addressed URIs to a gateway.
pub struct HttpMetadataFetcher {
    client: reqwest::Client,
    gateway: String,
}

impl HttpMetadataFetcher {
    pub fn new(client: reqwest::Client, gateway: impl Into<String>) -> Self {
        Self {
            client,
            gateway: gateway.into(),
        }
    }

    /// Parses a metadata document and rewrites its image to the gateway.
    fn parse(&self, body: &[u8]) -> Result<Metadata> {
        let mut metadata: Metadata = serde_json::from_slice(body)?;
        if !metadata.image.is_empty() {
            metadata.image = to_gateway(&metadata.image, &self.gateway);
        }
        Ok(metadata)
    }
}

/// Decodes an inline `data:application/json[;base64],...` URI.
fn decode_data_uri(uri: &str) -> Result<Vec<u8>> {
    let (header, payload) = uri
        .split_once(',')
        .ok_or_else(|| FeedIndexerError::DecodingError("data uri without payload".to_string()))?;
    if header.ends_with(";base64") {
        STANDARD
            .decode(payload.trim())
            .map_err(|e| FeedIndexerError::DecodingError(format!("invalid base64 payload: {e}")))
    } else {
        Ok(payload.as_bytes().to_vec())
    }
}

#[async_trait]
impl MetadataFetcher for HttpMetadataFetcher {
    async fn fetch(&self, uri: &str, cancel: &CancellationToken) -> Result<Metadata> {
        let uri = uri.trim();
        if uri.starts_with(DATA_JSON_PREFIX) {
            return self.parse(&decode_data_uri(uri)?);
        }

        let url = to_gateway(uri, &self.gateway);
        let response = send(self.client.get(&url), cancel).await?;
        let body = read_bytes(response, cancel).await?;
        self.parse(&body)
    }
}
