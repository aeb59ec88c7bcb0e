//! Feed Indexer - Example Usage
//!
//! Builds a feed from environment variables, runs one query and prints the
//! first page of the materialized view.
//!
//! Variables: `CONTRACT`, then either `GRAPH_ENDPOINT` or `LOG_API_KEY` +
//! `RPC_URL` (optionally `LOG_API_URL`, `CHAIN_ID`, `GATEWAY`, `OWNER`).

use feed_indexer::{
    FeedIndexer, FeedIndexerConfigBuilder, Result, SortOrder, TelemetryConfig, ViewOptions,
    init_telemetry,
};
use std::str::FromStr;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();
    let _telemetry = init_telemetry(TelemetryConfig::default());

    println!("=== Feed Indexer Example ===\n");

    let contract = std::env::var("CONTRACT")
        .unwrap_or_else(|_| "0x00000000000000000000000000000000000000aa".to_string());
    let mut builder = FeedIndexerConfigBuilder::new().contract(contract);

    builder = match std::env::var("GRAPH_ENDPOINT") {
        Ok(endpoint) => builder.with_graph_indexer(endpoint),
        Err(_) => builder
            .with_log_scan(
                std::env::var("LOG_API_URL")
                    .unwrap_or_else(|_| feed_indexer::config::DEFAULT_LOG_API_URL.to_string()),
                std::env::var("LOG_API_KEY").unwrap_or_default(),
                std::env::var("CHAIN_ID")
                    .ok()
                    .and_then(|id| id.parse().ok())
                    .unwrap_or(1),
            )
            .with_rpc(std::env::var("RPC_URL").unwrap_or_default()),
    };
    if let Ok(gateway) = std::env::var("GATEWAY") {
        builder = builder.with_gateway(gateway);
    }
    let config = builder.build()?;

    println!("Configuration:");
    println!("  Source: {}", config.source.name());
    println!("  Contract: {:#x}", config.contract);
    println!("  Gateway: {}", config.gateway);
    println!("  Page Size: {}\n", config.page_size);

    let indexer = FeedIndexer::new(config)?;

    let mut filter = indexer.filter();
    let mut options = ViewOptions::default().sort(SortOrder::Newest);
    if let Some(owner) = std::env::var("OWNER")
        .ok()
        .and_then(|o| alloy_primitives::Address::from_str(&o).ok())
    {
        filter = filter.only(owner);
        options = options.owned_by(owner);
    }

    let mut updates = indexer.query().subscribe();
    tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let snapshot = updates.borrow_and_update().clone();
            if let Some(progress) = snapshot.progress {
                println!("  enriched {}/{}", progress.completed, progress.total);
            }
        }
    });

    indexer.query().run(&filter).await?;

    let view = indexer.query().view(&options);
    let pager = indexer.pager();
    println!("\n{} entities, showing {}:", view.len(), pager.visible(view.len()));
    for entity in pager.slice(&view) {
        println!(
            "  #{} {} owner={:#x} uri={}",
            entity.subject_id,
            entity.display_name(),
            entity.owner,
            entity.content_uri
        );
    }

    indexer.shutdown();
    Ok(())
}
