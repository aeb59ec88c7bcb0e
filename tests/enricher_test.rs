use alloy_primitives::{Address, B256, U256, address};
use feed_indexer::utils::abi::OWNER_OF_SELECTOR;
use feed_indexer::{
    ChainReader, EnrichMode, Enricher, FeedIndexerError, HttpMetadataFetcher, RawEvent,
    RpcChainReader,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CONTRACT: Address = address!("00000000000000000000000000000000000000aa");
const HOLDER: Address = address!("00000000000000000000000000000000000000cc");

fn word(bytes: &[u8]) -> String {
    let mut padded = vec![0u8; 32 - bytes.len()];
    padded.extend_from_slice(bytes);
    hex::encode(padded)
}

fn abi_string(s: &str) -> String {
    let mut out = String::from("0x");
    out.push_str(&word(&[0x20]));
    out.push_str(&word(&U256::from(s.len()).to_be_bytes::<32>()));
    let mut body = s.as_bytes().to_vec();
    body.resize(s.len().div_ceil(32) * 32, 0);
    out.push_str(&hex::encode(body));
    out
}

fn event(id: u64, uri: Option<String>) -> RawEvent {
    RawEvent {
        actor: Address::repeat_byte(0xbb),
        subject_id: U256::from(id),
        block_number: 1000 - id,
        tx_hash: B256::repeat_byte(0x01),
        timestamp: 1_700_000_000,
        content_uri: uri,
        kind: "Minted".into(),
        provided_owner: None,
        burned: None,
    }
}

async fn mount_owner(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/rpc"))
        .and(body_string_contains(hex::encode(OWNER_OF_SELECTOR)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": format!("0x{}", word(HOLDER.as_slice()))
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_rpc_owner_of_decodes_address() {
    let server = MockServer::start().await;
    mount_owner(&server).await;

    let reader = RpcChainReader::new(reqwest::Client::new(), format!("{}/rpc", server.uri()));
    let owner = reader
        .owner_of(CONTRACT, U256::from(1u64), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(owner, HOLDER);
}

#[tokio::test]
async fn test_rpc_error_object_is_chain_call_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": 3, "message": "execution reverted: ERC721: invalid token ID" }
        })))
        .mount(&server)
        .await;

    let reader = RpcChainReader::new(reqwest::Client::new(), server.uri());
    let err = reader
        .owner_of(CONTRACT, U256::from(9u64), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, FeedIndexerError::ChainCallError(ref m) if m.contains("invalid token ID")));
}

#[tokio::test]
async fn test_rpc_token_uri_decodes_string() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string_contains("c87b56dd"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": abi_string("ipfs://QmToken/5.json")
        })))
        .mount(&server)
        .await;

    let reader = RpcChainReader::new(reqwest::Client::new(), server.uri());
    let uri = reader
        .token_uri(CONTRACT, U256::from(5u64), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(uri, "ipfs://QmToken/5.json");
}

#[tokio::test]
async fn test_metadata_failure_keeps_entity_without_metadata() {
    let server = MockServer::start().await;
    mount_owner(&server).await;
    for id in [1, 3] {
        Mock::given(method("GET"))
            .and(path(format!("/meta/{id}.json")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": format!("Piece {id}"),
                "image": format!("ipfs://QmImage/{id}.png"),
                "attributes": [{ "trait_type": "Edition", "value": id }]
            })))
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/meta/2.json"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let chain: Arc<dyn ChainReader> = Arc::new(RpcChainReader::new(
        reqwest::Client::new(),
        format!("{}/rpc", server.uri()),
    ));
    let metadata = Arc::new(HttpMetadataFetcher::new(
        reqwest::Client::new(),
        format!("{}/ipfs/", server.uri()),
    ));
    let enricher = Enricher::new(CONTRACT, Some(chain), metadata, EnrichMode::Batched { width: 5 });

    let events: Vec<RawEvent> = (1..=3)
        .map(|id| event(id, Some(format!("{}/meta/{id}.json", server.uri()))))
        .collect();
    let entities = enricher
        .enrich(&events, &CancellationToken::new(), None)
        .await
        .unwrap();

    assert_eq!(entities.len(), 3);
    let ids: Vec<u64> = entities.iter().map(|e| e.subject_id.to::<u64>()).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert!(entities[1].metadata.is_none());
    let first = entities[0].metadata.as_ref().unwrap();
    assert_eq!(first.name, "Piece 1");
    assert_eq!(first.image, format!("{}/ipfs/QmImage/1.png", server.uri()));
    assert_eq!(first.attributes.len(), 1);
    assert!(entities.iter().all(|e| e.owner == HOLDER && !e.optimistic));
}

#[tokio::test]
async fn test_ipfs_uri_fetched_through_gateway() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ipfs/QmFolder/8.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": "Eight" })))
        .expect(1)
        .mount(&server)
        .await;

    let metadata = Arc::new(HttpMetadataFetcher::new(
        reqwest::Client::new(),
        format!("{}/ipfs/", server.uri()),
    ));
    let enricher = Enricher::new(CONTRACT, None, metadata, EnrichMode::default());
    let mut provided = event(8, Some("ipfs://ipfs/QmFolder/8.json".to_string()));
    provided.provided_owner = Some(HOLDER);
    provided.burned = Some(false);

    let entities = enricher
        .enrich(&[provided], &CancellationToken::new(), None)
        .await
        .unwrap();
    assert_eq!(entities[0].display_name(), "Eight");
    assert_eq!(entities[0].owner, HOLDER);
}

#[tokio::test]
async fn test_serial_mode_paces_items() {
    let server = MockServer::start().await;
    mount_owner(&server).await;

    let chain: Arc<dyn ChainReader> = Arc::new(RpcChainReader::new(
        reqwest::Client::new(),
        format!("{}/rpc", server.uri()),
    ));
    let metadata = Arc::new(HttpMetadataFetcher::new(reqwest::Client::new(), "http://unused/"));
    let enricher = Enricher::new(
        CONTRACT,
        Some(chain),
        metadata,
        EnrichMode::Serial {
            item_delay: Duration::from_millis(100),
        },
    );
    let events: Vec<RawEvent> = (1..=3).map(|id| event(id, Some(String::new()))).collect();

    let started = std::time::Instant::now();
    let entities = enricher
        .enrich(&events, &CancellationToken::new(), None)
        .await
        .unwrap();
    assert_eq!(entities.len(), 3);
    assert!(started.elapsed() >= Duration::from_millis(200));
}
