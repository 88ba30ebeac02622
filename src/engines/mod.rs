//! OCR engine implementations
//!
//! Each backend provides an `EngineLoader` for the recognition service. Backends
//! are conditionally compiled based on feature flags.

#[cfg(feature = "engine-ocrs")]
pub mod ocrs;

#[cfg(feature = "engine-leptess")]
pub mod leptess;

#[cfg(any(feature = "engine-ocrs", feature = "engine-leptess"))]
mod models;

use crate::config::Config;
use crate::engine::EngineLoader;
use crate::error::DocError;
use std::sync::Arc;

/// Names of the engines compiled into this binary, in preference order
pub fn available() -> Vec<&'static str> {
    let mut engines = Vec::new();

    #[cfg(feature = "engine-ocrs")]
    engines.push("ocrs");

    #[cfg(feature = "engine-leptess")]
    engines.push("leptess");

    engines
}

/// Pick the configured engine, or the first available one.
///
/// Only builds the loader; nothing is downloaded or parsed until
/// `EngineLoader::load` runs.
pub fn loader_for(config: &Config) -> Result<Arc<dyn EngineLoader>, DocError> {
    let engines = available();

    let name = match &config.engine {
        Some(name) => name.as_str(),
        None => engines.first().copied().ok_or_else(|| {
            DocError::InitializationError(
                "No OCR engines available. Build with --features engine-ocrs or --features engine-leptess".to_string(),
            )
        })?,
    };

    match name {
        #[cfg(feature = "engine-ocrs")]
        "ocrs" => Ok(Arc::new(ocrs::OcrsLoader::new(config))),

        #[cfg(feature = "engine-leptess")]
        "leptess" => Ok(Arc::new(leptess::LeptessLoader::new(config))),

        other => Err(DocError::InitializationError(format!(
            "Unknown OCR engine '{}'. Available: {:?}",
            other, engines
        ))),
    }
}
