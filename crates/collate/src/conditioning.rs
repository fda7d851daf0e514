use candle_core::{DType, Device, Tensor};
use log::debug;

use crate::error::{CollateError, Result};
use crate::sample::Sample;

/// Synthesize the per-sample size conditioning vector
/// `[orig_h, orig_w, crop_top, crop_left, target_h, target_w]`.
///
/// Images arrive width-major (`original_size` is `(w, h)`) while the
/// consuming model expects `[h, w, h, w, h, w]`; the swap here is
/// load-bearing. The target size is derived from the latent's spatial
/// dimensions scaled back up by the VAE downscale factor.
///
/// Dropped samples still get a slot so batch stacking stays rectangular,
/// but the vector is overwritten with zeros of the same shape and dtype.
pub fn size_conditioning_vector(
    sample: &Sample,
    latent_dims: &[usize],
    downscale_factor: usize,
    dtype: DType,
) -> Result<Tensor> {
    let (orig_w, orig_h) = sample
        .original_size
        .ok_or_else(|| missing("original_size", sample))?;
    let (crop_top, crop_left) = sample
        .crop_coordinates
        .ok_or_else(|| missing("crop_coordinates", sample))?;
    if latent_dims.len() < 2 {
        return Err(missing("target_size", sample));
    }

    let latent_h = latent_dims[latent_dims.len() - 2];
    let latent_w = latent_dims[latent_dims.len() - 1];
    let target_h = (latent_h * downscale_factor) as f32;
    let target_w = (latent_w * downscale_factor) as f32;

    debug!(
        "size conditioning for '{}': original=({orig_w}, {orig_h}) target=({target_w}, {target_h})",
        sample.image_path
    );

    let values = [
        orig_h as f32,
        orig_w as f32,
        crop_top as f32,
        crop_left as f32,
        target_h,
        target_w,
    ];
    let vector = Tensor::from_slice(&values, values.len(), &Device::Cpu)?.to_dtype(dtype)?;

    if sample.drop_conditioning {
        Ok(vector.zeros_like()?)
    } else {
        Ok(vector)
    }
}

/// Stack one conditioning vector per sample, in sample order, into a
/// `(batch, 6)` tensor.
pub fn stack_conditioning(
    samples: &[Sample],
    latents: &[Tensor],
    downscale_factor: usize,
    dtype: DType,
) -> Result<Tensor> {
    let mut vectors = Vec::with_capacity(samples.len());
    for (sample, latent) in samples.iter().zip(latents) {
        vectors.push(size_conditioning_vector(
            sample,
            latent.dims(),
            downscale_factor,
            dtype,
        )?);
    }
    Ok(Tensor::stack(&vectors, 0)?)
}

fn missing(field: &'static str, sample: &Sample) -> CollateError {
    CollateError::MissingConditioningInput {
        field,
        key: sample.image_path.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry_sample() -> Sample {
        let mut sample = Sample::new("img-0.png", "b1", "caption");
        sample.original_size = Some((512, 512));
        sample.crop_coordinates = Some((0, 0));
        sample
    }

    #[test]
    fn vector_follows_hw_ordering() {
        let mut sample = geometry_sample();
        sample.original_size = Some((768, 512));
        sample.crop_coordinates = Some((32, 64));
        let vector =
            size_conditioning_vector(&sample, &[4, 16, 24], 8, DType::F32).unwrap();
        assert_eq!(
            vector.to_vec1::<f32>().unwrap(),
            vec![512.0, 768.0, 32.0, 64.0, 128.0, 192.0]
        );
    }

    #[test]
    fn dropped_sample_yields_zero_vector() {
        let mut sample = geometry_sample();
        sample.drop_conditioning = true;
        let vector =
            size_conditioning_vector(&sample, &[4, 16, 16], 8, DType::F32).unwrap();
        assert_eq!(vector.dims(), &[6]);
        assert!(vector
            .to_vec1::<f32>()
            .unwrap()
            .iter()
            .all(|&v| v == 0.0));
    }

    #[test]
    fn missing_inputs_name_the_field() {
        let mut sample = geometry_sample();
        sample.original_size = None;
        let err = size_conditioning_vector(&sample, &[4, 16, 16], 8, DType::F32).unwrap_err();
        assert!(matches!(
            err,
            CollateError::MissingConditioningInput { field: "original_size", .. }
        ));

        let mut sample = geometry_sample();
        sample.crop_coordinates = None;
        let err = size_conditioning_vector(&sample, &[4, 16, 16], 8, DType::F32).unwrap_err();
        assert!(matches!(
            err,
            CollateError::MissingConditioningInput { field: "crop_coordinates", .. }
        ));

        let sample = geometry_sample();
        let err = size_conditioning_vector(&sample, &[16], 8, DType::F32).unwrap_err();
        assert!(matches!(
            err,
            CollateError::MissingConditioningInput { field: "target_size", .. }
        ));
    }
}
