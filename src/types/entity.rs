//! Enriched domain entities and their metadata.

use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

/// A single `{trait, value}` pair from a metadata document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    #[serde(alias = "trait", default)]
    pub trait_type: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

/// Normalized off-chain metadata.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Image URL, already rewritten to a fetchable gateway form.
    #[serde(default, alias = "image_url")]
    pub image: String,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

/// The enriched domain object the view is built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub subject_id: U256,
    /// Current owner, re-derived by the enricher rather than copied from the
    /// event actor.
    pub owner: Address,
    pub content_uri: String,
    pub metadata: Option<Metadata>,
    pub kind: String,
    pub block_number: u64,
    pub timestamp: u64,
    pub tx_hash: Option<B256>,
    /// `true` for locally synthesized entries awaiting confirmation.
    pub optimistic: bool,
}

impl Entity {
    /// Builds an optimistic entry for a just-submitted action.
    ///
    /// `subject_id` must be the id the write transaction is expected to
    /// produce; reconciliation matches on it.
    pub fn optimistic(subject_id: U256, owner: Address, content_uri: impl Into<String>) -> Self {
        Self {
            subject_id,
            owner,
            content_uri: content_uri.into(),
            metadata: None,
            kind: "Optimistic".to_string(),
            block_number: u64::MAX,
            timestamp: 0,
            tx_hash: None,
            optimistic: true,
        }
    }

    /// Attaches metadata (typically the locally known name/image).
    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Display name, falling back to `#<id>` when metadata is absent.
    #[must_use]
    pub fn display_name(&self) -> String {
        match &self.metadata {
            Some(meta) if !meta.name.is_empty() => meta.name.clone(),
            _ => format!("#{}", self.subject_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_accepts_trait_alias() {
        let json = r#"{
            "name": "Genesis",
            "image": "https://ipfs.io/ipfs/Qm1",
            "attributes": [{ "trait": "Rarity", "value": "rare" }, { "trait_type": "Level", "value": 3 }]
        }"#;
        let meta: Metadata = serde_json::from_str(json).unwrap();
        assert_eq!(meta.name, "Genesis");
        assert_eq!(meta.description, "");
        assert_eq!(meta.attributes[0].trait_type, "Rarity");
        assert_eq!(meta.attributes[1].value, serde_json::json!(3));
    }

    #[test]
    fn test_display_name_fallback() {
        let entity = Entity::optimistic(U256::from(42u64), Address::ZERO, "ipfs://Qm");
        assert_eq!(entity.display_name(), "#42");
        let named = entity.with_metadata(Metadata {
            name: "Answer".into(),
            ..Metadata::default()
        });
        assert_eq!(named.display_name(), "Answer");
    }
}
