//! Batch collation for latent diffusion training.
//!
//! Assembles one training batch from per-sample cached artifacts: latent
//! encodings fetched concurrently by key, text embeddings pulled in one
//! batched cache call, and synthesized size/crop conditioning vectors.
//! Caption dropout runs first and may clear captions and flag conditioning
//! for zeroing, so collation mutates the samples it is handed.
//!
//! The entry point is [`BatchCollator`]; cache clients are injected at
//! construction rather than looked up through any process-wide registry.

pub mod batch;
pub mod conditioning;
pub mod config;
pub mod dropout;
pub mod embed;
pub mod error;
pub mod fetch;
pub mod sample;
pub mod validate;

pub use batch::{BatchCollator, CollatedBatch};
pub use config::{CollateConfig, EmbedVariant, Precision};
pub use error::{CollateError, Result};
pub use sample::Sample;
