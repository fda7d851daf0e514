/// One dataset example, as handed over by the sampler.
///
/// Collation mutates samples in place: caption dropout may clear `caption`
/// and always sets `drop_conditioning`. Callers reusing the same `Sample`
/// values across collate calls must account for that.
#[derive(Debug, Clone)]
pub struct Sample {
    /// Unique identifier; doubles as the latent cache key.
    pub image_path: String,
    /// Cache namespace serving this sample. All samples in one batch are
    /// assumed to share it.
    pub data_backend_id: String,
    pub caption: String,
    /// Source image size before encoding, as `(width, height)`.
    pub original_size: Option<(u32, u32)>,
    /// Preprocessing crop offset, as `(top, left)`.
    pub crop_coordinates: Option<(u32, u32)>,
    /// Set by caption dropout, read by the conditioning synthesizer.
    pub drop_conditioning: bool,
    /// Pre-computed mean luminance of the source image.
    pub luminance: f64,
}

impl Sample {
    pub fn new(
        image_path: impl Into<String>,
        data_backend_id: impl Into<String>,
        caption: impl Into<String>,
    ) -> Self {
        Self {
            image_path: image_path.into(),
            data_backend_id: data_backend_id.into(),
            caption: caption.into(),
            original_size: None,
            crop_coordinates: None,
            drop_conditioning: false,
            luminance: 0.0,
        }
    }
}
