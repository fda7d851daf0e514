use latent_cache::CacheError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CollateError>;

/// Failure taxonomy for one collation call.
///
/// Every error aborts the call; no partially populated batch is ever
/// returned. Retries, if any, belong to the cache clients.
#[derive(Debug, Error)]
pub enum CollateError {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("latent cache miss for key '{key}'")]
    CacheMiss { key: String },

    #[error("latent cache i/o failure for key '{key}': {message}")]
    CacheIo { key: String, message: String },

    #[error("embedding cache failure: {0}")]
    EmbeddingCache(String),

    #[error("latent shape mismatch for '{key}': {actual:?} != {expected:?}")]
    ShapeMismatch {
        key: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("cannot compute size conditioning for '{key}': {field} was not provided")]
    MissingConditioningInput { field: &'static str, key: String },

    #[error("cannot collate an empty batch")]
    EmptyBatch,

    #[error("expected exactly one sample group per collate call (got {groups})")]
    MultiBatchNotSupported { groups: usize },

    #[error("tensor error: {0}")]
    Tensor(#[from] candle_core::Error),
}

impl From<CacheError> for CollateError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::Miss { key } => CollateError::CacheMiss { key },
            CacheError::Io { key, message } => CollateError::CacheIo { key, message },
            CacheError::Tensor(err) => CollateError::Tensor(err),
        }
    }
}
