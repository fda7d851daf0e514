use std::collections::HashMap;
use std::sync::Mutex;

use candle_core::Tensor;

use crate::error::{CacheError, Result};

/// Batched text-embedding output, tagged by model variant.
///
/// Dual-encoder models produce a pooled summary alongside the sequence
/// embedding; single-encoder models only produce the sequence embedding.
/// The arity is fixed by the cache's model, not negotiated per call.
#[derive(Debug, Clone)]
pub enum TextEmbeddings {
    Dual { prompt: Tensor, pooled: Tensor },
    Single { prompt: Tensor },
}

impl TextEmbeddings {
    /// Normalize into the uniform `(prompt, pooled-or-none)` pair.
    pub fn into_parts(self) -> (Tensor, Option<Tensor>) {
        match self {
            TextEmbeddings::Dual { prompt, pooled } => (prompt, Some(pooled)),
            TextEmbeddings::Single { prompt } => (prompt, None),
        }
    }

    pub fn variant_name(&self) -> &'static str {
        match self {
            TextEmbeddings::Dual { .. } => "dual",
            TextEmbeddings::Single { .. } => "single",
        }
    }
}

/// Batched caption-to-embedding retrieval.
///
/// One call covers the whole batch. Results must be deterministic for
/// identical caption text; per-caption memoization is the implementation's
/// concern.
pub trait TextEmbedCache: Send + Sync {
    fn compute_embeddings(&self, captions: &[String]) -> Result<TextEmbeddings>;
}

/// Per-caption embedding rows produced by an encoder.
#[derive(Debug, Clone)]
pub struct CaptionEmbedding {
    pub prompt: Tensor,
    pub pooled: Option<Tensor>,
}

/// Reference embedding cache wrapping a deterministic encoder.
///
/// Each distinct caption is encoded once and memoized; batched calls stack
/// the per-caption rows in caption order.
pub struct MemoryEmbedCache {
    encode: Box<dyn Fn(&str) -> Result<CaptionEmbedding> + Send + Sync>,
    pooled: bool,
    memo: Mutex<HashMap<String, CaptionEmbedding>>,
}

impl MemoryEmbedCache {
    /// `pooled` declares whether the wrapped encoder emits a pooled row;
    /// an encoder that disagrees with the declaration is a cache failure.
    pub fn new<F>(pooled: bool, encode: F) -> Self
    where
        F: Fn(&str) -> Result<CaptionEmbedding> + Send + Sync + 'static,
    {
        Self {
            encode: Box::new(encode),
            pooled,
            memo: Mutex::new(HashMap::new()),
        }
    }

    fn embedding_for(&self, caption: &str) -> Result<CaptionEmbedding> {
        let mut memo = self.memo.lock().expect("embed cache lock poisoned");
        if let Some(hit) = memo.get(caption) {
            return Ok(hit.clone());
        }
        let row = (self.encode)(caption)?;
        memo.insert(caption.to_string(), row.clone());
        Ok(row)
    }
}

impl TextEmbedCache for MemoryEmbedCache {
    fn compute_embeddings(&self, captions: &[String]) -> Result<TextEmbeddings> {
        let mut prompt_rows = Vec::with_capacity(captions.len());
        let mut pooled_rows = Vec::with_capacity(captions.len());

        for caption in captions {
            let row = self.embedding_for(caption)?;
            prompt_rows.push(row.prompt);
            if self.pooled {
                pooled_rows.push(row.pooled.ok_or_else(|| CacheError::Io {
                    key: caption.clone(),
                    message: "encoder produced no pooled embedding".to_string(),
                })?);
            }
        }

        let prompt = Tensor::stack(&prompt_rows, 0)?;
        if self.pooled {
            let pooled = Tensor::stack(&pooled_rows, 0)?;
            Ok(TextEmbeddings::Dual { prompt, pooled })
        } else {
            Ok(TextEmbeddings::Single { prompt })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use candle_core::Device;

    use super::*;

    fn dual_row(caption: &str) -> Result<CaptionEmbedding> {
        let fill = caption.len() as f32;
        Ok(CaptionEmbedding {
            prompt: Tensor::full(fill, (4, 8), &Device::Cpu)?,
            pooled: Some(Tensor::full(fill, 8usize, &Device::Cpu)?),
        })
    }

    #[test]
    fn batched_call_stacks_rows_in_caption_order() {
        let cache = MemoryEmbedCache::new(true, dual_row);
        let captions = vec!["ab".to_string(), "abcd".to_string()];
        let embeddings = cache.compute_embeddings(&captions).unwrap();

        let (prompt, pooled) = embeddings.into_parts();
        assert_eq!(prompt.dims(), &[2, 4, 8]);
        let pooled = pooled.expect("dual cache returns pooled rows");
        let rows = pooled.to_vec2::<f32>().unwrap();
        assert_eq!(rows[0][0], 2.0);
        assert_eq!(rows[1][0], 4.0);
    }

    #[test]
    fn repeated_captions_are_encoded_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let cache = MemoryEmbedCache::new(true, move |caption| {
            counter.fetch_add(1, Ordering::SeqCst);
            dual_row(caption)
        });

        let captions = vec!["same".to_string(), "same".to_string(), "other".to_string()];
        cache.compute_embeddings(&captions).unwrap();
        cache.compute_embeddings(&captions).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn missing_pooled_row_is_a_cache_failure() {
        let cache = MemoryEmbedCache::new(true, |_| {
            Ok(CaptionEmbedding {
                prompt: Tensor::full(1.0f32, (4, 8), &Device::Cpu)?,
                pooled: None,
            })
        });
        let err = cache
            .compute_embeddings(&["caption".to_string()])
            .unwrap_err();
        assert!(matches!(err, CacheError::Io { .. }));
    }
}
