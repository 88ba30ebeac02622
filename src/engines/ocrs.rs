//! OCRS engine implementation
//!
//! Pure Rust OCR engine using the ocrs library. No system dependencies required.
//! Downloads neural network models into the model cache on first use.

use super::models::ensure_downloaded;
use crate::config::Config;
use crate::engine::{EngineLoader, TextRecognizer};
use crate::error::DocError;
use image::DynamicImage;
use ocrs::{DecodeMethod, ImageSource, OcrEngine as OcrsOcrEngine, OcrEngineParams};
use rten::Model;
use std::path::PathBuf;
use std::sync::Arc;

/// Default model URLs from the ocrs project
const DETECTION_MODEL_URL: &str =
    "https://ocrs-models.s3-accelerate.amazonaws.com/text-detection.rten";
const RECOGNITION_MODEL_URL: &str =
    "https://ocrs-models.s3-accelerate.amazonaws.com/text-recognition.rten";

pub struct OcrsLoader {
    model_dir: PathBuf,
    language: String,
}

impl OcrsLoader {
    pub fn new(config: &Config) -> Self {
        Self {
            model_dir: config.model_dir.clone(),
            language: config.language.clone(),
        }
    }
}

impl EngineLoader for OcrsLoader {
    fn name(&self) -> &'static str {
        "ocrs"
    }

    fn load(&self) -> Result<Arc<dyn TextRecognizer>, DocError> {
        tracing::info!("Initializing ocrs OCR engine...");

        if self.language != "eng" {
            // ocrs only ships a Latin-alphabet model
            tracing::warn!(
                "ocrs has no '{}' model, using its Latin recognizer",
                self.language
            );
        }

        let detection_model_path = ensure_downloaded(
            DETECTION_MODEL_URL,
            &self.model_dir,
            "text-detection.rten",
        )?;
        let recognition_model_path = ensure_downloaded(
            RECOGNITION_MODEL_URL,
            &self.model_dir,
            "text-recognition.rten",
        )?;

        let detection_model = Model::load_file(&detection_model_path).map_err(|e| {
            DocError::InitializationError(format!("Failed to load detection model: {}", e))
        })?;
        let recognition_model = Model::load_file(&recognition_model_path).map_err(|e| {
            DocError::InitializationError(format!("Failed to load recognition model: {}", e))
        })?;

        let engine = OcrsOcrEngine::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            decode_method: DecodeMethod::Greedy,
            ..Default::default()
        })
        .map_err(|e| {
            DocError::InitializationError(format!("Failed to create OCR engine: {}", e))
        })?;

        tracing::info!("ocrs engine initialized successfully");

        Ok(Arc::new(OcrsRecognizer {
            engine,
            language: self.language.clone(),
        }))
    }
}

/// Loaded ocrs engine
pub struct OcrsRecognizer {
    engine: OcrsOcrEngine,
    language: String,
}

impl TextRecognizer for OcrsRecognizer {
    fn name(&self) -> &'static str {
        "ocrs"
    }

    fn language(&self) -> &str {
        &self.language
    }

    fn recognize(&self, image: &DynamicImage) -> Result<String, DocError> {
        // ImageSource::from_bytes expects RGB8 in HWC layout
        let rgb_img = image.to_rgb8();
        let dimensions = rgb_img.dimensions();

        let img_source = ImageSource::from_bytes(rgb_img.as_raw(), dimensions).map_err(|e| {
            DocError::RecognitionError(format!("Failed to create image source: {}", e))
        })?;

        let ocr_input = self
            .engine
            .prepare_input(img_source)
            .map_err(|e| DocError::RecognitionError(format!("Failed to prepare input: {}", e)))?;

        let word_rects = self
            .engine
            .detect_words(&ocr_input)
            .map_err(|e| DocError::RecognitionError(format!("Failed to detect words: {}", e)))?;

        let line_rects = self.engine.find_text_lines(&ocr_input, &word_rects);

        let line_texts = self
            .engine
            .recognize_text(&ocr_input, &line_rects)
            .map_err(|e| DocError::RecognitionError(format!("Failed to recognize text: {}", e)))?;

        let text = line_texts
            .iter()
            .filter_map(|line| line.as_ref())
            .map(|line| {
                line.words()
                    .map(|word| word.to_string())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect::<Vec<_>>()
            .join("\n");

        Ok(text)
    }
}
