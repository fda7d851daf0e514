use thiserror::Error;

pub type Result<T> = std::result::Result<T, CacheError>;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("no cached entry for key '{key}'")]
    Miss { key: String },

    #[error("cache i/o failure for key '{key}': {message}")]
    Io { key: String, message: String },

    #[error("tensor error: {0}")]
    Tensor(#[from] candle_core::Error),
}
