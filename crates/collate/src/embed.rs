use candle_core::Tensor;
use latent_cache::{TextEmbedCache, TextEmbeddings};
use log::debug;

use crate::config::EmbedVariant;
use crate::error::{CollateError, Result};

/// Pull embeddings for all captions in one batched cache call and normalize
/// the result into the uniform `(prompt, pooled-or-none)` pair.
///
/// The expected arity is fixed at configuration time; a cache that answers
/// with the other variant is reported as an embedding cache failure rather
/// than silently coerced.
pub fn dispatch_embeddings(
    cache: &dyn TextEmbedCache,
    captions: &[String],
    variant: EmbedVariant,
) -> Result<(Tensor, Option<Tensor>)> {
    debug!("pull cached text embeds for {} captions", captions.len());
    let embeddings = cache
        .compute_embeddings(captions)
        .map_err(|err| CollateError::EmbeddingCache(err.to_string()))?;

    match (variant, embeddings) {
        (EmbedVariant::Dual, TextEmbeddings::Dual { prompt, pooled }) => Ok((prompt, Some(pooled))),
        (EmbedVariant::Single, TextEmbeddings::Single { prompt }) => Ok((prompt, None)),
        (expected, got) => Err(CollateError::EmbeddingCache(format!(
            "cache returned {} embeddings but the collator is configured for {}",
            got.variant_name(),
            expected.name()
        ))),
    }
}
