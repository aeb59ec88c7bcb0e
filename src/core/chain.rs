//! Read-only contract calls over JSON-RPC.

use crate::utils::abi::{
    OWNER_OF_SELECTOR, TOKEN_URI_SELECTOR, decode_hex, decode_string_at, encode_uint_call,
    word_at, word_to_address,
};
use crate::utils::error::{FeedIndexerError, Result};
use crate::utils::http::send_json;
use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;

/// Contract reads the enricher needs.
///
/// Implemented over JSON-RPC by [`RpcChainReader`]; tests substitute their
/// own implementation.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Current owner of `subject_id`.
    ///
    /// # Errors
    ///
    /// [`FeedIndexerError::ChainCallError`] when the subject does not resolve
    /// (reverted call, zero owner), which is how destroyed subjects show up.
    async fn owner_of(
        &self,
        contract: Address,
        subject_id: U256,
        cancel: &CancellationToken,
    ) -> Result<Address>;

    /// Content URI of `subject_id`.
    async fn token_uri(
        &self,
        contract: Address,
        subject_id: U256,
        cancel: &CancellationToken,
    ) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

/// [`ChainReader`] issuing `eth_call` requests to a JSON-RPC endpoint.
pub struct RpcChainReader {
    client: reqwest::Client,
    rpc_url: String,
    next_id: AtomicU64,
}

impl RpcChainReader {
    pub fn new(client: reqwest::Client, rpc_url: impl Into<String>) -> Self {
        Self {
            client,
            rpc_url: rpc_url.into(),
            next_id: AtomicU64::new(1),
        }
    }

    fn request_body(&self, contract: Address, data: &str) -> Value {
        json!({
            "jsonrpc": "2.0",
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "method": "eth_call",
            "params": [{ "to": format!("{contract:#x}"), "data": data }, "latest"],
        })
    }

    /// Runs `eth_call` and returns the raw return data.
    async fn call(
        &self,
        contract: Address,
        data: String,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>> {
        let body = self.request_body(contract, &data);
        let response: RpcResponse =
            send_json(self.client.post(&self.rpc_url).json(&body), cancel).await?;

        if let Some(error) = response.error {
            return Err(FeedIndexerError::ChainCallError(format!(
                "eth_call failed ({}): {}",
                error.code, error.message
            )));
        }
        let bytes = decode_hex(response.result.as_deref().unwrap_or("0x"))?;
        if bytes.is_empty() {
            return Err(FeedIndexerError::ChainCallError(
                "eth_call returned no data".to_string(),
            ));
        }
        Ok(bytes)
    }
}

#[async_trait]
impl ChainReader for RpcChainReader {
    async fn owner_of(
        &self,
        contract: Address,
        subject_id: U256,
        cancel: &CancellationToken,
    ) -> Result<Address> {
        let data = self
            .call(contract, encode_uint_call(OWNER_OF_SELECTOR, subject_id), cancel)
            .await?;
        let owner = word_to_address(&word_at(&data, 0)?);
        if owner == Address::ZERO {
            return Err(FeedIndexerError::ChainCallError(format!(
                "subject {subject_id} has no owner"
            )));
        }
        Ok(owner)
    }

    async fn token_uri(
        &self,
        contract: Address,
        subject_id: U256,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let data = self
            .call(contract, encode_uint_call(TOKEN_URI_SELECTOR, subject_id), cancel)
            .await?;
        decode_string_at(&data, 0)
    }
}
