use std::fs;
use std::path::Path;

use candle_core::DType;
use serde::Deserialize;

use crate::error::{CollateError, Result};

/// Knobs consumed by the collation core.
///
/// Loaded from TOML or JSON, or constructed directly by the trainer that
/// owns the caches.
#[derive(Debug, Clone, Deserialize)]
pub struct CollateConfig {
    /// Per-sample probability of clearing the caption and zeroing the size
    /// conditioning. Absent means disabled.
    #[serde(default)]
    pub caption_dropout_probability: Option<f64>,
    /// Working precision for latents and conditioning vectors.
    #[serde(default)]
    pub precision: Precision,
    /// Spatial ratio between pixel space and latent space.
    #[serde(default = "default_vae_downscale_factor")]
    pub vae_downscale_factor: usize,
    /// Which embedding arity the text-embed cache serves.
    #[serde(default)]
    pub embed_variant: EmbedVariant,
    /// Seed for the dropout RNG.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Ceiling on the latent-fetch pool; defaults to available parallelism.
    #[serde(default)]
    pub max_fetch_threads: Option<usize>,
}

impl Default for CollateConfig {
    fn default() -> Self {
        Self {
            caption_dropout_probability: None,
            precision: Precision::default(),
            vae_downscale_factor: default_vae_downscale_factor(),
            embed_variant: EmbedVariant::default(),
            seed: default_seed(),
            max_fetch_threads: None,
        }
    }
}

impl CollateConfig {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|err| {
            CollateError::Configuration(format!("failed to read {}: {err}", path.display()))
        })?;
        let config: CollateConfig = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(&contents).map_err(|err| {
                CollateError::Configuration(format!("failed to parse {}: {err}", path.display()))
            })?,
            Some("toml") | Some("tml") | None => toml::from_str(&contents).map_err(|err| {
                CollateError::Configuration(format!("failed to parse {}: {err}", path.display()))
            })?,
            Some(other) => {
                return Err(CollateError::Configuration(format!(
                    "unsupported configuration extension '{other}'"
                )));
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if let Some(probability) = self.caption_dropout_probability {
            if !(0.0..=1.0).contains(&probability) {
                errors.push(format!(
                    "caption_dropout_probability must be in [0, 1] (got {probability})"
                ));
            }
        }

        if self.vae_downscale_factor == 0 {
            errors.push("vae_downscale_factor must be greater than 0".to_string());
        }

        if let Some(0) = self.max_fetch_threads {
            errors.push("max_fetch_threads must be greater than 0".to_string());
        }

        if !errors.is_empty() {
            return Err(CollateError::Configuration(errors.join("; ")));
        }

        Ok(())
    }

    pub fn weight_dtype(&self) -> DType {
        precision_to_dtype(self.precision)
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Precision {
    Fp32,
    Fp16,
    Bf16,
}

impl Default for Precision {
    fn default() -> Self {
        Precision::Bf16
    }
}

/// Text-encoder arity, fixed when the collator is built rather than
/// re-dispatched on every call.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EmbedVariant {
    Dual,
    Single,
}

impl Default for EmbedVariant {
    fn default() -> Self {
        EmbedVariant::Dual
    }
}

impl EmbedVariant {
    pub fn name(self) -> &'static str {
        match self {
            EmbedVariant::Dual => "dual",
            EmbedVariant::Single => "single",
        }
    }
}

fn precision_to_dtype(precision: Precision) -> DType {
    match precision {
        Precision::Fp32 => DType::F32,
        Precision::Fp16 => DType::F16,
        Precision::Bf16 => DType::BF16,
    }
}

fn default_vae_downscale_factor() -> usize {
    8
}

fn default_seed() -> u64 {
    42
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable() {
        let config = CollateConfig::default();
        config.validate().unwrap();
        assert_eq!(config.vae_downscale_factor, 8);
        assert_eq!(config.embed_variant, EmbedVariant::Dual);
        assert_eq!(config.weight_dtype(), DType::BF16);
        assert!(config.caption_dropout_probability.is_none());
    }

    #[test]
    fn probability_outside_unit_interval_is_rejected() {
        let config = CollateConfig {
            caption_dropout_probability: Some(1.5),
            ..CollateConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, CollateError::Configuration(msg)
            if msg.contains("caption_dropout_probability")));
    }

    #[test]
    fn zero_downscale_factor_is_rejected() {
        let config = CollateConfig {
            vae_downscale_factor: 0,
            ..CollateConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
