//! Block-explorer log-scan source.
//!
//! Queries an Etherscan-style `module=logs&action=getLogs` endpoint once per
//! configured [`EventSignature`] and decodes each returned log into a
//! [`RawEvent`]. Ownership is never provided by this source, so every event
//! goes through the enricher's existence check.

use crate::sources::{EventSource, SourceRequest};
use crate::types::{ArgLocation, EventFilter, EventSignature, RawEvent};
use crate::utils::abi::{
    address_topic, decode_hex, decode_string_at, parse_quantity, parse_word, word_at,
    word_to_address,
};
use crate::utils::error::{FeedIndexerError, Result};
use crate::utils::http::send_json;
use alloy_primitives::{B256, U256};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// Envelope returned by the log API.
#[derive(Debug, Deserialize)]
struct LogScanResponse {
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    result: Value,
}

/// One log entry. Unused fields are ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogEntry {
    topics: Vec<String>,
    #[serde(default)]
    data: String,
    block_number: String,
    #[serde(default, rename = "timeStamp")]
    time_stamp: String,
    transaction_hash: String,
}

/// Log-scan [`EventSource`] backed by a block-explorer HTTP API.
pub struct LogScanSource {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    chain_id: u64,
    signatures: Vec<EventSignature>,
}

impl LogScanSource {
    /// Creates a source querying `signatures` on `api_url`.
    pub fn new(
        client: reqwest::Client,
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        chain_id: u64,
        signatures: Vec<EventSignature>,
    ) -> Self {
        Self {
            client,
            api_url: api_url.into(),
            api_key: api_key.into(),
            chain_id,
            signatures,
        }
    }

    /// Query string for one signature call.
    fn query_params(&self, filter: &EventFilter, signature: &EventSignature) -> Vec<(String, String)> {
        let mut params = vec![
            ("chainid".to_string(), self.chain_id.to_string()),
            ("module".to_string(), "logs".to_string()),
            ("action".to_string(), "getLogs".to_string()),
            ("address".to_string(), format!("{:#x}", filter.contract)),
            ("topic0".to_string(), format!("{:#x}", signature.topic0())),
        ];
        if let Some(actor) = &filter.actor {
            let n = signature.actor_topic;
            params.push((format!("topic{n}"), address_topic(actor)));
            params.push((format!("topic0_{n}_opr"), "and".to_string()));
        }
        params.push(("fromBlock".to_string(), filter.from_block.to_string()));
        params.push((
            "toBlock".to_string(),
            filter
                .to_block
                .map_or_else(|| "latest".to_string(), |b| b.to_string()),
        ));
        params.push(("apikey".to_string(), self.api_key.clone()));
        params
    }
}

/// Returns `true` when a `status = "0"` response describes a real fault
/// rather than an empty result set.
fn is_fault(message: &str, detail: &str) -> bool {
    if message.eq_ignore_ascii_case("NOTOK") {
        return true;
    }
    let detail = detail.to_ascii_lowercase();
    detail.contains("rate limit") || detail.contains("invalid api key") || detail.contains("missing")
}

/// Extracts the log array, treating a non-array "no records" result as empty.
fn log_items(response: LogScanResponse) -> Result<Vec<Value>> {
    match response.result {
        Value::Array(items) => Ok(items),
        Value::Null => Ok(Vec::new()),
        other => {
            let detail = match &other {
                Value::String(s) => s.clone(),
                v => v.to_string(),
            };
            if response.status != "1" && is_fault(&response.message, &detail) {
                return Err(FeedIndexerError::ApiError(format!(
                    "{}: {detail}",
                    response.message
                )));
            }
            tracing::debug!(message = %response.message, result = %detail, "log API returned no records");
            Ok(Vec::new())
        }
    }
}

fn read_u256(location: ArgLocation, topics: &[B256], data: &[u8]) -> Result<U256> {
    let word = match location {
        ArgLocation::Topic(n) => *topics
            .get(n)
            .ok_or_else(|| FeedIndexerError::DecodingError(format!("log has no topic {n}")))?,
        ArgLocation::Word(n) => word_at(data, n)?,
        ArgLocation::StringAt(_) => {
            return Err(FeedIndexerError::DecodingError(
                "subject id cannot be a string".to_string(),
            ));
        }
    };
    Ok(U256::from_be_bytes(word.0))
}

fn read_uri(location: ArgLocation, data: &[u8]) -> Result<String> {
    match location {
        ArgLocation::StringAt(n) => decode_string_at(data, n),
        other => Err(FeedIndexerError::DecodingError(format!(
            "content uri must be a string, got {other:?}"
        ))),
    }
}

/// Decodes one log entry for `signature`.
fn decode_log(entry: &LogEntry, signature: &EventSignature) -> Result<RawEvent> {
    let topics = entry
        .topics
        .iter()
        .map(|t| parse_word(t))
        .collect::<Result<Vec<B256>>>()?;

    match topics.first() {
        Some(topic0) if *topic0 == signature.topic0() => {}
        _ => {
            return Err(FeedIndexerError::DecodingError(format!(
                "log is not a {} event",
                signature.name
            )));
        }
    }

    let actor = topics
        .get(signature.actor_topic)
        .map(word_to_address)
        .ok_or_else(|| {
            FeedIndexerError::DecodingError(format!("log has no topic {}", signature.actor_topic))
        })?;

    let data = decode_hex(&entry.data)?;
    let subject_id = read_u256(signature.subject, &topics, &data)?;

    // A broken URI is recoverable: the enricher falls back to tokenURI.
    let content_uri = match signature.content_uri {
        Some(location) => match read_uri(location, &data) {
            Ok(uri) if !uri.trim().is_empty() => Some(uri),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!(subject_id = %subject_id, error = %e, "content uri not decodable");
                None
            }
        },
        None => None,
    };

    Ok(RawEvent {
        actor,
        subject_id,
        block_number: parse_quantity(&entry.block_number)?,
        tx_hash: parse_word(&entry.transaction_hash)?,
        timestamp: parse_quantity(&entry.time_stamp)?,
        content_uri,
        kind: signature.name.clone(),
        provided_owner: None,
        burned: None,
    })
}

/// Decodes every item, logging and skipping the malformed ones.
fn decode_items(items: Vec<Value>, signature: &EventSignature) -> Vec<RawEvent> {
    let total = items.len();
    let events: Vec<RawEvent> = items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| {
            let decoded = serde_json::from_value::<LogEntry>(item)
                .map_err(FeedIndexerError::from)
                .and_then(|entry| decode_log(&entry, signature));
            match decoded {
                Ok(event) => Some(event),
                Err(e) => {
                    tracing::warn!(event = %signature.name, index, error = %e, "Skipping malformed log");
                    None
                }
            }
        })
        .collect();
    if events.len() < total {
        tracing::warn!(
            event = %signature.name,
            decoded = events.len(),
            total,
            "Some logs could not be decoded"
        );
    }
    events
}

#[async_trait]
impl EventSource for LogScanSource {
    fn plan(&self, filter: &EventFilter) -> Result<Vec<SourceRequest>> {
        if self.api_url.trim().is_empty() {
            return Err(FeedIndexerError::ConfigError(
                "Log API endpoint is missing".to_string(),
            ));
        }
        if self.api_key.trim().is_empty() {
            return Err(FeedIndexerError::ConfigError(
                "Log API key is missing".to_string(),
            ));
        }
        if self.chain_id == 0 {
            return Err(FeedIndexerError::ConfigError(
                "Chain id is missing".to_string(),
            ));
        }
        if self.signatures.is_empty() {
            return Err(FeedIndexerError::ConfigError(
                "No event signatures configured".to_string(),
            ));
        }

        Ok(self
            .signatures
            .iter()
            .map(|signature| SourceRequest {
                filter: filter.clone(),
                signature: Some(signature.clone()),
            })
            .collect())
    }

    async fn execute(
        &self,
        request: &SourceRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<RawEvent>> {
        let signature = request.signature.as_ref().ok_or_else(|| {
            FeedIndexerError::InternalError("log-scan request without a signature".to_string())
        })?;
        let params = self.query_params(&request.filter, signature);
        let response: LogScanResponse =
            send_json(self.client.get(&self.api_url).query(&params), cancel).await?;
        let items = log_items(response)?;
        Ok(decode_items(items, signature))
    }

    fn provides_ownership(&self) -> bool {
        false
    }

    fn source_name(&self) -> &str {
        "log-scan"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, address};
    use serde_json::json;

    const CONTRACT: Address = address!("00000000000000000000000000000000000000aa");
    const ACTOR: Address = address!("00000000000000000000000000000000000000bb");

    fn source(api_key: &str) -> LogScanSource {
        LogScanSource::new(
            reqwest::Client::new(),
            "https://api.example/v2/api",
            api_key,
            8453,
            vec![EventSignature::minted(), EventSignature::paid_mint()],
        )
    }

    /// ABI data: `leading` static words followed by one dynamic string.
    fn string_data(leading: &[U256], s: &str) -> String {
        let mut words = Vec::new();
        for word in leading {
            words.extend_from_slice(&word.to_be_bytes::<32>());
        }
        let head = 32 * (leading.len() + 1);
        words.extend_from_slice(&U256::from(head).to_be_bytes::<32>());
        words.extend_from_slice(&U256::from(s.len()).to_be_bytes::<32>());
        let mut body = s.as_bytes().to_vec();
        body.resize(s.len().div_ceil(32) * 32, 0);
        words.extend_from_slice(&body);
        format!("0x{}", hex::encode(words))
    }

    fn minted_log(id: u64, block: u64, uri: &str) -> Value {
        json!({
            "address": format!("{CONTRACT:#x}"),
            "topics": [
                format!("{:#x}", EventSignature::minted().topic0()),
                address_topic(&ACTOR),
                format!("{:#x}", B256::from(U256::from(id).to_be_bytes::<32>())),
            ],
            "data": string_data(&[], uri),
            "blockNumber": format!("{block:#x}"),
            "timeStamp": "0x65000000",
            "transactionHash": format!("{:#x}", B256::repeat_byte(0x11)),
            "logIndex": "0x0"
        })
    }

    #[test]
    fn test_plan_requires_api_key() {
        let err = source("").plan(&EventFilter::new(CONTRACT)).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_plan_one_request_per_signature() {
        let plan = source("KEY").plan(&EventFilter::new(CONTRACT)).unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].label(), "Minted");
        assert_eq!(plan[1].label(), "PaidMint");
    }

    #[test]
    fn test_query_params_only_mine() {
        let src = source("KEY");
        let filter = EventFilter::new(CONTRACT).only(ACTOR);
        let params = src.query_params(&filter, &EventSignature::minted());
        let get = |k: &str| {
            params
                .iter()
                .find(|(key, _)| key == k)
                .map(|(_, v)| v.clone())
        };
        assert_eq!(get("module").as_deref(), Some("logs"));
        assert_eq!(get("action").as_deref(), Some("getLogs"));
        assert_eq!(get("topic1"), Some(address_topic(&ACTOR)));
        assert_eq!(get("topic0_1_opr").as_deref(), Some("and"));
        assert_eq!(get("fromBlock").as_deref(), Some("0"));
        assert_eq!(get("toBlock").as_deref(), Some("latest"));
    }

    #[test]
    fn test_query_params_without_actor() {
        let params = source("KEY").query_params(&EventFilter::new(CONTRACT), &EventSignature::minted());
        assert!(params.iter().all(|(k, _)| k != "topic1" && k != "topic0_1_opr"));
    }

    #[test]
    fn test_status_zero_no_records_is_empty() {
        let response = LogScanResponse {
            status: "0".into(),
            message: "No records found".into(),
            result: json!("No records found"),
        };
        assert!(log_items(response).unwrap().is_empty());
    }

    #[test]
    fn test_status_zero_notok_is_api_error() {
        let response = LogScanResponse {
            status: "0".into(),
            message: "NOTOK".into(),
            result: json!("Invalid API Key"),
        };
        assert!(matches!(log_items(response), Err(FeedIndexerError::ApiError(_))));
    }

    #[test]
    fn test_decode_minted_log() {
        let items = vec![minted_log(7, 0x10, "ipfs://QmHash/7.json")];
        let events = decode_items(items, &EventSignature::minted());
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.actor, ACTOR);
        assert_eq!(event.subject_id, U256::from(7u64));
        assert_eq!(event.block_number, 16);
        assert_eq!(event.content_uri.as_deref(), Some("ipfs://QmHash/7.json"));
        assert_eq!(event.kind, "Minted");
        assert!(!event.has_provided_ownership());
    }

    #[test]
    fn test_decode_skips_malformed_items() {
        let mut bad = minted_log(8, 0x11, "ipfs://x");
        bad["blockNumber"] = json!("0xnothex");
        let items = vec![minted_log(7, 0x10, "ipfs://a"), bad, json!({"topics": 3})];
        let events = decode_items(items, &EventSignature::minted());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].subject_id, U256::from(7u64));
    }

    #[test]
    fn test_decode_paid_mint_uri_after_price() {
        let signature = EventSignature::paid_mint();
        let mut log = minted_log(9, 0x20, "");
        log["topics"][0] = json!(format!("{:#x}", signature.topic0()));
        log["data"] = json!(string_data(&[U256::from(1_000u64)], "ar://tx9"));
        let events = decode_items(vec![log], &signature);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].content_uri.as_deref(), Some("ar://tx9"));
        assert_eq!(events[0].kind, "PaidMint");
    }

    #[test]
    fn test_decode_rejects_foreign_topic0() {
        let items = vec![minted_log(7, 0x10, "ipfs://a")];
        assert!(decode_items(items, &EventSignature::paid_mint()).is_empty());
    }
}
