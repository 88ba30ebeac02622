//! Document type validation with OCR.
//!
//! An uploaded image or PDF is turned into text by a recognition engine and
//! checked against the keywords of the document type the user selected
//! (CPF, CNH or RG). Only the verdict leaves the pipeline.

pub mod cancel;
pub mod category;
pub mod cli;
pub mod config;
pub mod engine;
pub mod engines;
pub mod error;
pub mod help;
pub mod keywords;
pub mod media;
pub mod pipeline;
pub mod rasterizer;
pub mod recognition;
pub mod server;
pub mod status;
pub mod validator;

#[cfg(test)]
mod test_support;

pub use category::DocumentCategory;
pub use error::DocError;
pub use pipeline::{CycleOutcome, CycleReport, DocumentPipeline, Selection};
pub use validator::Verdict;
