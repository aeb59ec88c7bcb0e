//! Domain types shared by every pipeline stage.

pub mod entity;
pub mod events;
pub mod filter;

pub use entity::{Attribute, Entity, Metadata};
pub use events::{ArgLocation, EventSignature, RawEvent};
pub use filter::{CacheKey, EventFilter};
