//! Shared helpers: errors, logging, HTTP, ABI words, URI rewriting and retry.

pub mod abi;
pub mod error;
pub mod http;
pub mod logging;
pub mod retry;
pub mod uri;

pub use error::{FeedIndexerError, Result};
