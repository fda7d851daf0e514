use candle_core::{DType, Device, Tensor};
use latent_cache::LatentStore;
use log::debug;
use rayon::prelude::*;
use rayon::ThreadPool;

use crate::error::{CollateError, Result};

/// Retrieve cached latents for `keys`, in parallel, preserving key order.
///
/// Each task reads only its own key and fills its own output slot, so the
/// result order matches the input order regardless of completion order.
/// The first failure aborts the whole batch; siblings still in flight are
/// left to the pool and their results discarded.
pub fn fetch_latents(
    pool: &ThreadPool,
    store: &dyn LatentStore,
    keys: &[String],
    backend_id: &str,
    dtype: DType,
) -> Result<Vec<Tensor>> {
    pool.install(|| {
        keys.par_iter()
            .map(|key| {
                debug!("pull latent for '{key}' from backend '{backend_id}'");
                let latent = store
                    .retrieve(key, backend_id)
                    .map_err(CollateError::from)?;
                Ok(stage_for_upload(latent, dtype)?)
            })
            .collect()
    })
}

/// Move a fetched latent into host memory, working dtype, and contiguous
/// layout so the training loop can upload it without extra copies.
fn stage_for_upload(latent: Tensor, dtype: DType) -> candle_core::Result<Tensor> {
    latent.to_device(&Device::Cpu)?.to_dtype(dtype)?.contiguous()
}
