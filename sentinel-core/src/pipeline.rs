//! Face counting: detect, classify each face, tally.

use std::path::Path;

use anyhow::Result;
use image::DynamicImage;
use log::{debug, info};
use sentinel_utils::{config::AppSettings, decode_image, load_image, timing_guard};

use crate::demographics::{FaceCountOutcome, aggregate};
use crate::detector::{CascadeFaceDetector, FaceDetector, prepare_for_detection};
use crate::error::SentinelError;
use crate::gender::{GenderClassifier, OnnxGenderClassifier};

/// Detector plus classifier, shared read-only across requests.
pub struct FaceCounter {
    detector: Box<dyn FaceDetector>,
    classifier: Box<dyn GenderClassifier>,
    max_dimension: u32,
}

impl FaceCounter {
    pub fn new(
        detector: Box<dyn FaceDetector>,
        classifier: Box<dyn GenderClassifier>,
        max_dimension: u32,
    ) -> Self {
        Self {
            detector,
            classifier,
            max_dimension,
        }
    }

    /// Load the cascade and gender model named in `settings`.
    pub fn from_settings(settings: &AppSettings) -> Result<Self> {
        let detector =
            CascadeFaceDetector::from_settings(&settings.models.cascade, &settings.detection)?;
        let classifier = OnnxGenderClassifier::load(&settings.models.gender, &settings.gender)?;
        Ok(Self::new(
            Box::new(detector),
            Box::new(classifier),
            settings.detection.max_dimension,
        ))
    }

    pub fn max_dimension(&self) -> u32 {
        self.max_dimension
    }

    /// Count male and female faces in a decoded image.
    ///
    /// Faces are processed in detector order; the first classifier failure aborts
    /// the count.
    pub fn count_faces_by_gender(
        &self,
        image: &DynamicImage,
    ) -> Result<FaceCountOutcome, SentinelError> {
        let _guard = timing_guard("sentinel_core::count_faces_by_gender", log::Level::Debug);
        let prepared = prepare_for_detection(image, self.max_dimension)?;

        let regions = {
            let _guard = timing_guard("sentinel_core::face_detection", log::Level::Debug);
            self.detector.detect(&prepared.gray)
        };
        if regions.is_empty() {
            info!("no faces detected");
            return Ok(FaceCountOutcome::NoFaces);
        }
        debug!("detected {} face(s)", regions.len());

        let mut genders = Vec::with_capacity(regions.len());
        for region in &regions {
            let crop = image::imageops::crop_imm(
                &prepared.color,
                region.x,
                region.y,
                region.width,
                region.height,
            )
            .to_image();
            genders.push(self.classifier.classify(&crop)?);
        }

        let outcome = aggregate(genders);
        if let FaceCountOutcome::Counted(count) = outcome {
            info!(
                "counted {} face(s): {} male, {} female",
                count.total, count.male, count.female
            );
        }
        Ok(outcome)
    }

    /// Decode an uploaded payload and count faces in it.
    pub fn count_faces_in_bytes(
        &self,
        bytes: &[u8],
    ) -> Result<FaceCountOutcome, SentinelError> {
        let image =
            decode_image(bytes).map_err(|e| SentinelError::InvalidImage(format!("{e:#}")))?;
        self.count_faces_by_gender(&image)
    }

    /// Load an image file and count faces in it.
    pub fn count_faces_in_file<P: AsRef<Path>>(
        &self,
        path: P,
    ) -> Result<FaceCountOutcome, SentinelError> {
        let image = load_image(path).map_err(|e| SentinelError::InvalidImage(format!("{e:#}")))?;
        self.count_faces_by_gender(&image)
    }
}
