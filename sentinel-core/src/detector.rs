use std::path::Path;

use anyhow::Result;
use image::{DynamicImage, GrayImage, RgbImage};
use serde::Serialize;
use sentinel_utils::{config::DetectionSettings, luminance_bt601, resize_exact, timing_guard};

use crate::cascade::{CascadeParams, HaarCascade};
use crate::error::SentinelError;

/// Axis-aligned face box in the coordinates of the image handed to the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FaceRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl FaceRegion {
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    pub(crate) fn as_i64(&self) -> (i64, i64, i64, i64) {
        (
            i64::from(self.x),
            i64::from(self.y),
            i64::from(self.width),
            i64::from(self.height),
        )
    }
}

/// Anything that can locate faces in a luminance image.
///
/// Implementations must be deterministic: the same image yields the same regions
/// in the same order.
pub trait FaceDetector: Send + Sync {
    fn detect(&self, gray: &GrayImage) -> Vec<FaceRegion>;
}

/// Haar cascade face detector.
#[derive(Debug, Clone)]
pub struct CascadeFaceDetector {
    cascade: HaarCascade,
    params: CascadeParams,
}

impl CascadeFaceDetector {
    pub fn new(cascade: HaarCascade, params: CascadeParams) -> Self {
        Self { cascade, params }
    }

    /// Load the cascade XML and take scan parameters from `settings`.
    pub fn from_settings<P: AsRef<Path>>(
        cascade_path: P,
        settings: &DetectionSettings,
    ) -> Result<Self> {
        settings.validate()?;
        let cascade = HaarCascade::from_path(cascade_path)?;
        Ok(Self::new(cascade, CascadeParams::from(settings)))
    }

    pub fn params(&self) -> &CascadeParams {
        &self.params
    }

    pub fn cascade(&self) -> &HaarCascade {
        &self.cascade
    }
}

impl FaceDetector for CascadeFaceDetector {
    fn detect(&self, gray: &GrayImage) -> Vec<FaceRegion> {
        self.cascade.detect_multi_scale(gray, &self.params)
    }
}

/// Image as handed to the detector, plus the colour buffer faces are cropped from.
#[derive(Debug, Clone)]
pub struct PreparedImage {
    /// Colour image, possibly resized to a square.
    pub color: RgbImage,
    /// BT.601 luminance of `color`.
    pub gray: GrayImage,
    /// Dimensions of the decoded input before any resize.
    pub original_size: (u32, u32),
}

impl PreparedImage {
    pub fn was_resized(&self) -> bool {
        self.color.dimensions() != self.original_size
    }
}

/// Convert a decoded image into detector input.
///
/// When either side exceeds `max_dimension` the image is stretched to a
/// `max_dimension` x `max_dimension` square; aspect ratio is not preserved.
pub fn prepare_for_detection(
    image: &DynamicImage,
    max_dimension: u32,
) -> Result<PreparedImage, SentinelError> {
    let _guard = timing_guard("sentinel_core::prepare_for_detection", log::Level::Trace);
    let original_size = (image.width(), image.height());
    if original_size.0 == 0 || original_size.1 == 0 {
        return Err(SentinelError::InvalidImage(
            "image has zero width or height".into(),
        ));
    }

    let mut color = image.to_rgb8();
    if original_size.0 > max_dimension || original_size.1 > max_dimension {
        log::debug!(
            "resizing {}x{} input to {max_dimension}x{max_dimension}",
            original_size.0,
            original_size.1
        );
        color = resize_exact(&color, max_dimension, max_dimension);
    }
    let gray = luminance_bt601(&color);
    Ok(PreparedImage {
        color,
        gray,
        original_size,
    })
}
