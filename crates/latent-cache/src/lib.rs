//! Retrieval contracts for cached training artifacts.
//!
//! The collation core never recomputes latents or text embeddings; it pulls
//! them from caches owned by the caller. This crate defines those call
//! contracts (`LatentStore`, `TextEmbedCache`) plus in-memory reference
//! stores used as test doubles.

pub mod embeds;
pub mod error;
pub mod store;

pub use embeds::{CaptionEmbedding, MemoryEmbedCache, TextEmbedCache, TextEmbeddings};
pub use error::{CacheError, Result};
pub use store::{LatentStore, MemoryLatentStore};
