//! Cancellable HTTP helpers shared by sources, the chain reader and the
//! metadata fetcher.

use crate::utils::error::{FeedIndexerError, Result};
use crate::utils::logging::redact_url;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Builds the shared `reqwest` client.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| FeedIndexerError::ConfigError(format!("Failed to build HTTP client: {e}")))
}

/// Sends `request`, aborting as soon as `cancel` fires.
///
/// Non-2xx responses become [`FeedIndexerError::HttpStatus`].
pub async fn send(
    request: reqwest::RequestBuilder,
    cancel: &CancellationToken,
) -> Result<reqwest::Response> {
    let response = tokio::select! {
        biased;
        () = cancel.cancelled() => return Err(FeedIndexerError::Cancelled),
        res = request.send() => res?,
    };

    let status = response.status();
    if !status.is_success() {
        return Err(FeedIndexerError::HttpStatus {
            status: status.as_u16(),
            url: redact_url(response.url().as_str()),
        });
    }
    Ok(response)
}

/// Reads the body of `response` as raw bytes, honoring cancellation.
pub async fn read_bytes(
    response: reqwest::Response,
    cancel: &CancellationToken,
) -> Result<Vec<u8>> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(FeedIndexerError::Cancelled),
        body = response.bytes() => Ok(body?.to_vec()),
    }
}

/// Sends `request` and decodes the JSON body.
pub async fn send_json<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
    cancel: &CancellationToken,
) -> Result<T> {
    let response = send(request, cancel).await?;
    let body = read_bytes(response, cancel).await?;
    Ok(serde_json::from_slice(&body)?)
}

