//! Content-addressed URI rewriting.
//!
//! `ipfs://` and `ar://` locators, and bare IPFS CIDs, cannot be fetched by a
//! plain HTTP client. These helpers rewrite them to a gateway URL; everything
//! else passes through untouched.

const IPFS_SCHEME: &str = "ipfs://";
const ARWEAVE_SCHEME: &str = "ar://";
const ARWEAVE_GATEWAY: &str = "https://arweave.net/";

/// Returns `true` for a bare IPFS CID, optionally followed by a path:
/// CIDv0 (`Qm` + 44 base58 characters) or a base32 CIDv1 (`bafy…`).
fn is_bare_cid(uri: &str) -> bool {
    let cid = uri.split('/').next().unwrap_or_default();
    let base58 = |c: char| c.is_ascii_alphanumeric() && !matches!(c, '0' | 'O' | 'I' | 'l');
    if cid.len() == 46 && cid.starts_with("Qm") {
        return cid.chars().all(base58);
    }
    cid.len() > 50
        && cid.starts_with("bafy")
        && cid.chars().all(|c| c.is_ascii_lowercase() || ('2'..='7').contains(&c))
}

/// Joins a gateway base and a path with exactly one `/` between them.
fn join(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Rewrites a content-addressed `uri` to `gateway`.
///
/// `gateway` is the IPFS gateway base including its `/ipfs/` segment, e.g.
/// `https://ipfs.io/ipfs/`. Both `ipfs://<cid>` and the legacy
/// `ipfs://ipfs/<cid>` forms are accepted.
#[must_use]
pub fn to_gateway(uri: &str, gateway: &str) -> String {
    let trimmed = uri.trim();
    let lower = trimmed.to_ascii_lowercase();

    if lower.starts_with(IPFS_SCHEME) {
        let rest = &trimmed[IPFS_SCHEME.len()..];
        let rest = rest.strip_prefix("ipfs/").unwrap_or(rest);
        return join(gateway, rest);
    }
    if lower.starts_with(ARWEAVE_SCHEME) {
        return join(ARWEAVE_GATEWAY, &trimmed[ARWEAVE_SCHEME.len()..]);
    }
    if is_bare_cid(trimmed) {
        return join(gateway, trimmed);
    }
    trimmed.to_string()
}
