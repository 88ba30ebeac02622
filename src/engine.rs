use crate::error::DocError;
use image::DynamicImage;
use std::sync::Arc;

/// Trait that all loaded OCR engines must implement
pub trait TextRecognizer: Send + Sync {
    /// Returns the engine identifier (e.g., "ocrs", "leptess")
    fn name(&self) -> &'static str;

    /// Language hint the engine was loaded with
    fn language(&self) -> &str;

    /// Recognize the text in a decoded image
    fn recognize(&self, image: &DynamicImage) -> Result<String, DocError>;
}

/// Performs the expensive one-time engine setup (model download and parsing).
pub trait EngineLoader: Send + Sync {
    fn name(&self) -> &'static str;

    /// Blocking. Runs on the blocking thread pool.
    fn load(&self) -> Result<Arc<dyn TextRecognizer>, DocError>;
}
