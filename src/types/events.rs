//! Raw event types and event-signature descriptors.
//!
//! A [`RawEvent`] is the normalized shape both sources produce. An
//! [`EventSignature`] describes where the interesting arguments of a creation
//! event live, so the log-scan source can decode any mint flavor without
//! hard-coding a single ABI.

use alloy_primitives::{Address, B256, U256, keccak256};
use serde::{Deserialize, Serialize};

/// A single observed creation event, normalized across sources.
///
/// Immutable once observed. Only the sources construct these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Account that triggered the event (minter, contributor).
    pub actor: Address,
    /// Identifier of the subject the event describes.
    pub subject_id: U256,
    pub block_number: u64,
    pub tx_hash: B256,
    /// Unix timestamp in seconds.
    pub timestamp: u64,
    /// Content descriptor URI, when the event carried it.
    pub content_uri: Option<String>,
    /// Name of the event signature that produced this record.
    pub kind: String,
    /// Current owner as resolved by the source, when it provides one.
    pub provided_owner: Option<Address>,
    /// Destroyed flag as resolved by the source, when it provides one.
    pub burned: Option<bool>,
}

impl RawEvent {
    /// Returns `true` when the source already resolved ownership, so the
    /// enricher must not query the chain itself.
    #[must_use]
    pub fn has_provided_ownership(&self) -> bool {
        self.provided_owner.is_some() || self.burned.is_some()
    }
}

/// Location of an event argument inside a log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArgLocation {
    /// Indexed argument stored in `topics[n]` (1..=3).
    Topic(usize),
    /// Static 32-byte word at index `n` of the data section.
    Word(usize),
    /// Dynamic `string` whose head offset sits at data word `n`.
    StringAt(usize),
}

/// Describes one creation event the log-scan source queries for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSignature {
    /// Short label copied into [`RawEvent::kind`].
    pub name: String,
    /// Canonical signature, e.g. `Minted(address,uint256,string)`.
    pub signature: String,
    /// Topic index (1..=3) of the indexed actor address.
    pub actor_topic: usize,
    pub subject: ArgLocation,
    pub content_uri: Option<ArgLocation>,
}

impl EventSignature {
    /// Creates a descriptor from its parts.
    pub fn new(
        name: impl Into<String>,
        signature: impl Into<String>,
        actor_topic: usize,
        subject: ArgLocation,
        content_uri: Option<ArgLocation>,
    ) -> Self {
        Self {
            name: name.into(),
            signature: signature.into(),
            actor_topic,
            subject,
            content_uri,
        }
    }

    /// `Minted(address indexed minter, uint256 indexed tokenId, string tokenURI)`.
    #[must_use]
    pub fn minted() -> Self {
        Self::new(
            "Minted",
            "Minted(address,uint256,string)",
            1,
            ArgLocation::Topic(2),
            Some(ArgLocation::StringAt(0)),
        )
    }

    /// `PaidMint(address indexed minter, uint256 indexed tokenId, uint256 price, string tokenURI)`.
    #[must_use]
    pub fn paid_mint() -> Self {
        Self::new(
            "PaidMint",
            "PaidMint(address,uint256,uint256,string)",
            1,
            ArgLocation::Topic(2),
            Some(ArgLocation::StringAt(1)),
        )
    }

    /// The keccak-256 hash of the canonical signature (`topic0`).
    #[must_use]
    pub fn topic0(&self) -> B256 {
        keccak256(self.signature.as_bytes())
    }
}
