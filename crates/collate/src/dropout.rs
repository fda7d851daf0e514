use rand::Rng;

use crate::error::{CollateError, Result};
use crate::sample::Sample;

/// Per-sample Bernoulli caption dropout.
///
/// Runs to completion over the whole batch before anything downstream reads
/// captions or `drop_conditioning`. A dropped sample has its caption cleared
/// and its conditioning flagged for zeroing; every other sample has the flag
/// explicitly reset. `None` means disabled.
pub fn apply_caption_dropout<R: Rng>(
    samples: &mut [Sample],
    probability: Option<f64>,
    rng: &mut R,
) -> Result<()> {
    let probability = probability.unwrap_or(0.0);
    if !(0.0..=1.0).contains(&probability) {
        return Err(CollateError::Configuration(format!(
            "caption_dropout_probability must be in [0, 1] (got {probability})"
        )));
    }

    for sample in samples.iter_mut() {
        let dropped = probability > 0.0 && rng.gen::<f64>() < probability;
        if dropped {
            log::debug!("dropping caption and conditioning for '{}'", sample.image_path);
            sample.caption.clear();
        }
        sample.drop_conditioning = dropped;
    }

    Ok(())
}
