use candle_core::Tensor;
use log::warn;

use crate::error::{CollateError, Result};

/// Strict shape validation: the first latent's shape is the reference and
/// every other latent must match it exactly. This is the canonical policy
/// on the collation path.
pub fn ensure_uniform_shapes(latents: &[Tensor], keys: &[String]) -> Result<()> {
    let reference = latents.first().ok_or(CollateError::EmptyBatch)?.dims();
    for (latent, key) in latents.iter().zip(keys) {
        if latent.dims() != reference {
            return Err(CollateError::ShapeMismatch {
                key: key.clone(),
                expected: reference.to_vec(),
                actual: latent.dims().to_vec(),
            });
        }
    }
    Ok(())
}

/// Lenient variant for coarse-grained tooling: logs each divergence and
/// returns the count instead of failing.
pub fn count_shape_mismatches(latents: &[Tensor], keys: &[String]) -> usize {
    let Some(reference) = latents.first().map(Tensor::dims) else {
        return 0;
    };
    let mut mismatches = 0;
    for (latent, key) in latents.iter().zip(keys) {
        if latent.dims() != reference {
            warn!(
                "latent shape mismatch for '{key}': {:?} != {reference:?}",
                latent.dims()
            );
            mismatches += 1;
        }
    }
    mismatches
}
