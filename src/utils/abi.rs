//! Minimal hex and ABI word helpers.
//!
//! Only the handful of shapes the feed needs: hex quantities, 32-byte words,
//! left-padded address topics, dynamic `string` returns and single-`uint256`
//! calldata.

use crate::utils::error::{FeedIndexerError, Result};
use alloy_primitives::{Address, B256, U256};

/// `ownerOf(uint256)`
pub const OWNER_OF_SELECTOR: [u8; 4] = [0x63, 0x52, 0x21, 0x1e];
/// `tokenURI(uint256)`
pub const TOKEN_URI_SELECTOR: [u8; 4] = [0xc8, 0x7b, 0x56, 0xdd];

const WORD: usize = 32;

fn strip_0x(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

/// Decodes a `0x`-prefixed hex string into bytes. `"0x"` decodes to empty.
pub fn decode_hex(s: &str) -> Result<Vec<u8>> {
    let body = strip_0x(s.trim());
    if body.len() % 2 == 1 {
        return hex::decode(format!("0{body}"))
            .map_err(|e| FeedIndexerError::DecodingError(format!("invalid hex '{s}': {e}")));
    }
    hex::decode(body).map_err(|e| FeedIndexerError::DecodingError(format!("invalid hex '{s}': {e}")))
}

/// Parses a hex quantity such as `0x1b4` into a `u64`. Empty quantities are 0.
pub fn parse_quantity(s: &str) -> Result<u64> {
    let body = strip_0x(s.trim());
    if body.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(body, 16)
        .map_err(|e| FeedIndexerError::DecodingError(format!("invalid quantity '{s}': {e}")))
}

/// Parses a 32-byte topic.
pub fn parse_word(s: &str) -> Result<B256> {
    let bytes = decode_hex(s)?;
    if bytes.len() != WORD {
        return Err(FeedIndexerError::DecodingError(format!(
            "expected 32-byte word, got {} bytes",
            bytes.len()
        )));
    }
    Ok(B256::from_slice(&bytes))
}

/// Interprets a word as a left-padded address.
#[must_use]
pub fn word_to_address(word: &B256) -> Address {
    Address::from_slice(&word[12..])
}

/// Left-pads an address to a 32-byte topic, rendered as `0x…` hex.
#[must_use]
pub fn address_topic(address: &Address) -> String {
    format!("{:#x}", address.into_word())
}

/// Returns data word `index`.
pub fn word_at(data: &[u8], index: usize) -> Result<B256> {
    index
        .checked_mul(WORD)
        .and_then(|start| Some(start..start.checked_add(WORD)?))
        .and_then(|range| data.get(range))
        .map(B256::from_slice)
        .ok_or_else(|| {
            FeedIndexerError::DecodingError(format!(
                "data too short for word {index} ({} bytes)",
                data.len()
            ))
        })
}

fn word_as_usize(word: &B256) -> Result<usize> {
    usize::try_from(U256::from_be_bytes(word.0))
        .map_err(|_| FeedIndexerError::DecodingError("offset overflows usize".to_string()))
}

/// Decodes a dynamic `string` whose head (offset) is at data word `head_index`.
pub fn decode_string_at(data: &[u8], head_index: usize) -> Result<String> {
    let offset = word_as_usize(&word_at(data, head_index)?)?;
    if offset % WORD != 0 {
        return Err(FeedIndexerError::DecodingError(format!(
            "misaligned string offset {offset}"
        )));
    }
    let len_word = word_at(data, offset / WORD)?;
    let len = word_as_usize(&len_word)?;
    let bytes = offset
        .checked_add(WORD)
        .and_then(|start| Some(start..start.checked_add(len)?))
        .and_then(|range| data.get(range))
        .ok_or_else(|| FeedIndexerError::DecodingError("string body out of bounds".to_string()))?;
    String::from_utf8(bytes.to_vec())
        .map_err(|e| FeedIndexerError::DecodingError(format!("string is not utf-8: {e}")))
}

/// Encodes `selector(uint256 arg)` calldata as `0x…` hex.
#[must_use]
pub fn encode_uint_call(selector: [u8; 4], arg: U256) -> String {
    let mut calldata = Vec::with_capacity(4 + WORD);
    calldata.extend_from_slice(&selector);
    calldata.extend_from_slice(&arg.to_be_bytes::<32>());
    format!("0x{}", hex::encode(calldata))
}
