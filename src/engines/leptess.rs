//! Leptess/Tesseract engine implementation
//!
//! Tesseract-based OCR engine with per-language training data (`por` by default).
//! Uses tesseract-static for static linking. Downloads tessdata into the model
//! cache on first use.

use super::models::ensure_downloaded;
use crate::config::Config;
use crate::engine::{EngineLoader, TextRecognizer};
use crate::error::DocError;
use image::DynamicImage;
use std::path::PathBuf;
use std::sync::Arc;
use tesseract_static::tesseract::Tesseract;

pub struct LeptessLoader {
    tessdata_dir: PathBuf,
    language: String,
}

impl LeptessLoader {
    pub fn new(config: &Config) -> Self {
        Self {
            tessdata_dir: config.model_dir.join("tessdata"),
            language: config.language.clone(),
        }
    }
}

impl EngineLoader for LeptessLoader {
    fn name(&self) -> &'static str {
        "leptess"
    }

    fn load(&self) -> Result<Arc<dyn TextRecognizer>, DocError> {
        ensure_downloaded(
            &tessdata_url(&self.language),
            &self.tessdata_dir,
            &format!("{}.traineddata", self.language),
        )?;

        // Tesseract expects the directory, not the file
        let tessdata_path = self
            .tessdata_dir
            .to_str()
            .map(|s| s.to_string())
            .ok_or_else(|| DocError::InitializationError("Invalid tessdata path".to_string()))?;

        // unusable tessdata fails the load, not the first upload
        let probe = Tesseract::new(Some(&tessdata_path), Some(&self.language)).map_err(|e| {
            DocError::InitializationError(format!("Failed to initialize Tesseract: {}", e))
        })?;
        drop(probe);

        tracing::info!(
            "Leptess engine initialized (tessdata: {}, language: {})",
            tessdata_path,
            self.language
        );

        Ok(Arc::new(LeptessRecognizer {
            tessdata_path,
            language: self.language.clone(),
        }))
    }
}

/// Tesseract handles are not shareable across threads, so each call builds one
/// from the already validated tessdata.
pub struct LeptessRecognizer {
    tessdata_path: String,
    language: String,
}

impl TextRecognizer for LeptessRecognizer {
    fn name(&self) -> &'static str {
        "leptess"
    }

    fn language(&self) -> &str {
        &self.language
    }

    fn recognize(&self, image: &DynamicImage) -> Result<String, DocError> {
        let rgb_img = image.to_rgb8();
        let (width, height) = rgb_img.dimensions();

        // BMP is always supported by leptonica
        let mut bmp_data = Vec::new();
        rgb_img
            .write_to(&mut std::io::Cursor::new(&mut bmp_data), image::ImageFormat::Bmp)
            .map_err(|e| DocError::RecognitionError(format!("Failed to convert to BMP: {}", e)))?;

        tracing::debug!(
            "Recognizing image: {}x{}, BMP size: {} bytes",
            width,
            height,
            bmp_data.len()
        );

        let mut tess = Tesseract::new(Some(&self.tessdata_path), Some(&self.language))
            .map_err(|e| DocError::RecognitionError(format!("Failed to create Tesseract: {}", e)))?;

        tess = tess.set_image_from_mem(&bmp_data).map_err(|e| {
            DocError::RecognitionError(format!(
                "Failed to set image ({}x{}): {}",
                width, height, e
            ))
        })?;

        tess = tess
            .recognize()
            .map_err(|e| DocError::RecognitionError(format!("Failed to recognize text: {}", e)))?;

        let text = tess
            .get_text()
            .map_err(|e| DocError::RecognitionError(format!("Failed to get text: {}", e)))?;

        Ok(text.trim().to_string())
    }
}

/// tessdata_fast keeps the download small
fn tessdata_url(language: &str) -> String {
    format!(
        "https://github.com/tesseract-ocr/tessdata_fast/raw/main/{}.traineddata",
        language
    )
}
