//! Pre-indexed graph query source.
//!
//! Issues one GraphQL POST returning both the creation events and the
//! current state of each subject (owner, burn flag). The two lists are joined
//! by subject id, so the events this source emits carry provided ownership
//! and the enricher skips its chain lookup. Events whose state row was not in
//! the first page are looked up by id in a second query; events still
//! without state are dropped.

use crate::sources::{EventSource, SourceRequest};
use crate::types::{EventFilter, RawEvent};
use crate::utils::abi::parse_word;
use crate::utils::error::{FeedIndexerError, Result};
use crate::utils::http::send_json;
use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use tokio_util::sync::CancellationToken;

/// Upper bound on rows requested per list.
pub const MAX_ROWS: u32 = 1000;

const FEED_QUERY: &str = r"
query Feed($contract: String!, $first: Int!) {
  mintEvents(where: { contract: $contract }, orderBy: blockNumber, orderDirection: desc, first: $first) {
    tokenId minter tokenURI blockNumber blockTimestamp transactionHash
  }
  nfts(where: { contract: $contract }, first: $first) {
    tokenId owner isBurned tokenURI
  }
}";

const OWNED_FEED_QUERY: &str = r"
query OwnedFeed($contract: String!, $owner: String!, $first: Int!) {
  mintEvents(where: { contract: $contract }, orderBy: blockNumber, orderDirection: desc, first: $first) {
    tokenId minter tokenURI blockNumber blockTimestamp transactionHash
  }
  nfts(where: { contract: $contract, owner: $owner }, first: $first) {
    tokenId owner isBurned tokenURI
  }
}";

const SUBJECT_STATES_QUERY: &str = r"
query SubjectStates($contract: String!, $ids: [String!]!, $first: Int!) {
  nfts(where: { contract: $contract, tokenId_in: $ids }, first: $first) {
    tokenId owner isBurned tokenURI
  }
}";

#[derive(Debug, Deserialize)]
struct GraphResponse {
    data: Option<GraphData>,
    #[serde(default)]
    errors: Vec<GraphError>,
}

#[derive(Debug, Default, Deserialize)]
struct GraphData {
    #[serde(default, rename = "mintEvents")]
    mint_events: Option<Vec<Value>>,
    #[serde(default)]
    nfts: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct GraphError {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MintRow {
    token_id: Value,
    #[serde(alias = "to")]
    minter: String,
    #[serde(default, rename = "tokenURI", alias = "tokenUri")]
    token_uri: Option<String>,
    block_number: Value,
    #[serde(default, alias = "timestamp")]
    block_timestamp: Value,
    #[serde(default)]
    transaction_hash: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NftRow {
    token_id: Value,
    owner: Value,
    #[serde(default)]
    is_burned: bool,
    #[serde(default, rename = "tokenURI", alias = "tokenUri")]
    token_uri: Option<String>,
}

/// Current state of one subject as reported by the indexer.
#[derive(Debug, Clone)]
struct SubjectState {
    owner: Address,
    burned: bool,
    content_uri: Option<String>,
}

/// Graph indexers encode big numbers as strings and small ones as numbers.
fn flex_u256(value: &Value) -> Result<U256> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            let parsed = if let Some(hex) = s.strip_prefix("0x") {
                U256::from_str_radix(hex, 16)
            } else {
                U256::from_str_radix(s, 10)
            };
            parsed.map_err(|e| FeedIndexerError::DecodingError(format!("invalid number '{s}': {e}")))
        }
        Value::Number(n) => n
            .as_u64()
            .map(U256::from)
            .ok_or_else(|| FeedIndexerError::DecodingError(format!("invalid number {n}"))),
        other => Err(FeedIndexerError::DecodingError(format!(
            "expected number, got {other}"
        ))),
    }
}

fn flex_u64(value: &Value) -> Result<u64> {
    if value.is_null() {
        return Ok(0);
    }
    u64::try_from(flex_u256(value)?)
        .map_err(|_| FeedIndexerError::DecodingError(format!("number {value} overflows u64")))
}

/// Owners arrive either as a bare address or as an `{ id }` entity.
fn flex_address(value: &Value) -> Result<Address> {
    let raw = match value {
        Value::String(s) => s.as_str(),
        Value::Object(map) => map.get("id").and_then(Value::as_str).unwrap_or_default(),
        _ => "",
    };
    Address::from_str(raw.trim())
        .map_err(|e| FeedIndexerError::DecodingError(format!("invalid address '{raw}': {e}")))
}

fn non_empty(uri: Option<String>) -> Option<String> {
    uri.filter(|u| !u.trim().is_empty())
}

fn decode_states(rows: Vec<Value>) -> HashMap<U256, SubjectState> {
    let mut states = HashMap::with_capacity(rows.len());
    for (index, row) in rows.into_iter().enumerate() {
        let decoded = serde_json::from_value::<NftRow>(row)
            .map_err(FeedIndexerError::from)
            .and_then(|row| {
                Ok((
                    flex_u256(&row.token_id)?,
                    SubjectState {
                        owner: flex_address(&row.owner)?,
                        burned: row.is_burned,
                        content_uri: non_empty(row.token_uri),
                    },
                ))
            });
        match decoded {
            Ok((id, state)) => {
                states.insert(id, state);
            }
            Err(e) => tracing::warn!(index, error = %e, "Skipping malformed subject row"),
        }
    }
    states
}

fn decode_mint(row: MintRow) -> Result<RawEvent> {
    let tx_hash = match row.transaction_hash.as_deref() {
        Some(hash) => parse_word(hash)?,
        None => B256::ZERO,
    };
    Ok(RawEvent {
        actor: Address::from_str(row.minter.trim()).map_err(|e| {
            FeedIndexerError::DecodingError(format!("invalid minter '{}': {e}", row.minter))
        })?,
        subject_id: flex_u256(&row.token_id)?,
        block_number: flex_u64(&row.block_number)?,
        tx_hash,
        timestamp: flex_u64(&row.block_timestamp)?,
        content_uri: non_empty(row.token_uri),
        kind: "Minted".to_string(),
        provided_owner: None,
        burned: None,
    })
}

/// Decodes creation rows, skipping malformed ones and those outside the
/// filter's block bounds.
fn decode_mints(mint_rows: Vec<Value>, filter: &EventFilter) -> Vec<RawEvent> {
    let mut events = Vec::with_capacity(mint_rows.len());
    for (index, row) in mint_rows.into_iter().enumerate() {
        let event = match serde_json::from_value::<MintRow>(row)
            .map_err(FeedIndexerError::from)
            .and_then(decode_mint)
        {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(index, error = %e, "Skipping malformed mint row");
                continue;
            }
        };

        if event.block_number < filter.from_block
            || filter.to_block.is_some_and(|to| event.block_number > to)
        {
            continue;
        }
        events.push(event);
    }
    events
}

/// Ids of `events` that have no state row, each listed once.
fn missing_states(events: &[RawEvent], states: &HashMap<U256, SubjectState>) -> Vec<U256> {
    let mut seen = HashSet::new();
    events
        .iter()
        .map(|e| e.subject_id)
        .filter(|id| !states.contains_key(id) && seen.insert(*id))
        .collect()
}

/// Attaches current state to each event.
///
/// Events without a state row are dropped: the indexer cannot vouch for
/// their owner or burn status.
fn join_states(events: Vec<RawEvent>, states: &HashMap<U256, SubjectState>) -> Vec<RawEvent> {
    events
        .into_iter()
        .filter_map(|mut event| {
            let Some(state) = states.get(&event.subject_id) else {
                tracing::debug!(subject_id = %event.subject_id, "No subject state; dropping event");
                return None;
            };
            event.provided_owner = Some(state.owner);
            event.burned = Some(state.burned);
            if event.content_uri.is_none() {
                event.content_uri.clone_from(&state.content_uri);
            }
            Some(event)
        })
        .collect()
}

/// Graph-indexer [`EventSource`].
pub struct GraphIndexerSource {
    client: reqwest::Client,
    endpoint: String,
}

impl GraphIndexerSource {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    fn body(filter: &EventFilter) -> Value {
        match &filter.actor {
            Some(owner) => json!({
                "query": OWNED_FEED_QUERY,
                "variables": {
                    "contract": format!("{:#x}", filter.contract),
                    "owner": format!("{owner:#x}"),
                    "first": MAX_ROWS,
                }
            }),
            None => json!({
                "query": FEED_QUERY,
                "variables": {
                    "contract": format!("{:#x}", filter.contract),
                    "first": MAX_ROWS,
                }
            }),
        }
    }

    fn states_body(filter: &EventFilter, ids: &[U256]) -> Value {
        let ids: Vec<String> = ids.iter().map(ToString::to_string).collect();
        json!({
            "query": SUBJECT_STATES_QUERY,
            "variables": {
                "contract": format!("{:#x}", filter.contract),
                "ids": ids,
                "first": MAX_ROWS,
            }
        })
    }

    async fn post(&self, body: &Value, cancel: &CancellationToken) -> Result<GraphData> {
        let response: GraphResponse =
            send_json(self.client.post(&self.endpoint).json(body), cancel).await?;

        if !response.errors.is_empty() {
            let messages: Vec<&str> = response.errors.iter().map(|e| e.message.as_str()).collect();
            return Err(FeedIndexerError::GraphQlError(messages.join("; ")));
        }
        Ok(response.data.unwrap_or_default())
    }
}

#[async_trait]
impl EventSource for GraphIndexerSource {
    fn plan(&self, filter: &EventFilter) -> Result<Vec<SourceRequest>> {
        if self.endpoint.trim().is_empty() {
            return Err(FeedIndexerError::ConfigError(
                "Indexer endpoint is missing".to_string(),
            ));
        }
        Ok(vec![SourceRequest {
            filter: filter.clone(),
            signature: None,
        }])
    }

    async fn execute(
        &self,
        request: &SourceRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<RawEvent>> {
        let filter = &request.filter;
        let data = self.post(&Self::body(filter), cancel).await?;
        let mut states = decode_states(data.nfts.unwrap_or_default());
        let events = decode_mints(data.mint_events.unwrap_or_default(), filter);

        // The owned state list is complete for its owner; anything missing
        // belongs to someone else.
        if filter.actor.is_none() {
            let missing = missing_states(&events, &states);
            if !missing.is_empty() {
                tracing::debug!(missing = missing.len(), "Looking up state of unmatched subjects");
                let extra = self.post(&Self::states_body(filter, &missing), cancel).await?;
                states.extend(decode_states(extra.nfts.unwrap_or_default()));
            }
        }

        Ok(join_states(events, &states))
    }

    fn provides_ownership(&self) -> bool {
        true
    }

    fn source_name(&self) -> &str {
        "graph-indexer"
    }
}
