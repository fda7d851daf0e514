use std::sync::Arc;

use candle_core::{DType, Tensor};
use latent_cache::{LatentStore, TextEmbedCache};
use log::debug;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::conditioning::stack_conditioning;
use crate::config::CollateConfig;
use crate::dropout::apply_caption_dropout;
use crate::embed::dispatch_embeddings;
use crate::error::{CollateError, Result};
use crate::fetch::fetch_latents;
use crate::sample::Sample;
use crate::validate::ensure_uniform_shapes;

/// Upper bound on the latent-fetch pool when the config does not cap it.
const FETCH_THREAD_CEILING: usize = 16;

/// One assembled training batch, handed to the training loop.
///
/// `pooled_embeds` and `conditioning` are populated together: both exist
/// for dual-encoder models and are absent for single-encoder models.
#[derive(Debug)]
pub struct CollatedBatch {
    /// Stacked latents, `(batch, ...)`, leading dim equals the sample count.
    pub latents: Tensor,
    /// Stacked sequence embeddings.
    pub prompt_embeds: Tensor,
    /// Stacked pooled embeddings, dual-encoder models only.
    pub pooled_embeds: Option<Tensor>,
    /// Stacked `(batch, 6)` size conditioning, dual-encoder models only.
    pub conditioning: Option<Tensor>,
    /// Arithmetic mean of the samples' pre-computed luminance.
    pub average_luminance: f64,
}

/// Top-level batch assembler.
///
/// Cache clients are injected at construction; nothing is resolved through
/// process-wide state. One `collate` call fully assembles one batch or
/// fails without returning anything partial.
pub struct BatchCollator {
    config: CollateConfig,
    dtype: DType,
    latents: Arc<dyn LatentStore>,
    embeds: Arc<dyn TextEmbedCache>,
    pool: ThreadPool,
    rng: StdRng,
}

impl BatchCollator {
    pub fn new(
        config: CollateConfig,
        latents: Arc<dyn LatentStore>,
        embeds: Arc<dyn TextEmbedCache>,
    ) -> Result<Self> {
        config.validate()?;
        let pool = build_fetch_pool(config.max_fetch_threads)?;
        let rng = StdRng::seed_from_u64(config.seed);
        let dtype = config.weight_dtype();
        Ok(Self {
            config,
            dtype,
            latents,
            embeds,
            pool,
            rng,
        })
    }

    /// Collate exactly one sample group into a batch.
    ///
    /// The dataloader hands groups through; this core assumes a single
    /// cache-backend context per call, so anything other than one group is
    /// refused. Samples are mutated in place by caption dropout.
    pub fn collate(&mut self, groups: &mut [Vec<Sample>]) -> Result<CollatedBatch> {
        match groups {
            [group] => self.collate_group(group),
            _ => Err(CollateError::MultiBatchNotSupported {
                groups: groups.len(),
            }),
        }
    }

    fn collate_group(&mut self, samples: &mut [Sample]) -> Result<CollatedBatch> {
        if samples.is_empty() {
            return Err(CollateError::EmptyBatch);
        }
        debug!("begin collate on {} samples", samples.len());

        apply_caption_dropout(
            samples,
            self.config.caption_dropout_probability,
            &mut self.rng,
        )?;

        let average_luminance =
            samples.iter().map(|s| s.luminance).sum::<f64>() / samples.len() as f64;

        let keys: Vec<String> = samples.iter().map(|s| s.image_path.clone()).collect();
        // Every sample in one batch is served by the same backend; the
        // dataset layer guarantees it, so the first sample's id covers the
        // whole fetch.
        let backend_id = samples[0].data_backend_id.clone();
        let latents = fetch_latents(
            &self.pool,
            self.latents.as_ref(),
            &keys,
            &backend_id,
            self.dtype,
        )?;
        ensure_uniform_shapes(&latents, &keys)?;

        let captions: Vec<String> = samples.iter().map(|s| s.caption.clone()).collect();
        let (prompt_embeds, pooled_embeds) = dispatch_embeddings(
            self.embeds.as_ref(),
            &captions,
            self.config.embed_variant,
        )?;

        let conditioning = if pooled_embeds.is_some() {
            Some(stack_conditioning(
                samples,
                &latents,
                self.config.vae_downscale_factor,
                self.dtype,
            )?)
        } else {
            None
        };

        let latents = Tensor::stack(&latents, 0)?;
        debug!("stacked latents to {:?}", latents.dims());

        Ok(CollatedBatch {
            latents,
            prompt_embeds,
            pooled_embeds,
            conditioning,
            average_luminance,
        })
    }
}

fn build_fetch_pool(ceiling: Option<usize>) -> Result<ThreadPool> {
    let available = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let threads = available.min(ceiling.unwrap_or(FETCH_THREAD_CEILING)).max(1);
    ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|idx| format!("latent-fetch-{idx}"))
        .build()
        .map_err(|err| {
            CollateError::Configuration(format!("failed to build latent fetch pool: {err}"))
        })
}
