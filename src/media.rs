//! Accepted upload types and the per-cycle upload value.

use crate::error::DocError;
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Jpeg,
    Png,
    Pdf,
}

impl MediaType {
    pub const ACCEPTED_MIME_TYPES: [&'static str; 4] =
        ["image/jpeg", "image/png", "image/jpg", "application/pdf"];

    /// Parse a declared MIME type. Parameters such as `; charset=` are ignored.
    pub fn from_mime(mime: &str) -> Result<Self, DocError> {
        let essence = mime
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            "image/jpeg" | "image/jpg" => Ok(Self::Jpeg),
            "image/png" => Ok(Self::Png),
            "application/pdf" => Ok(Self::Pdf),
            _ => Err(DocError::UnsupportedMediaType(mime.to_string())),
        }
    }

    /// Guess the declared type of a local file from its extension.
    pub fn mime_for_path(path: &Path) -> &'static str {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "jpg" | "jpeg" => "image/jpeg",
            "png" => "image/png",
            "pdf" => "application/pdf",
            _ => "application/octet-stream",
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Pdf => "application/pdf",
        }
    }

    pub fn image_format(&self) -> Option<image::ImageFormat> {
        match self {
            Self::Jpeg => Some(image::ImageFormat::Jpeg),
            Self::Png => Some(image::ImageFormat::Png),
            Self::Pdf => None,
        }
    }
}

/// A selected file: raw bytes plus the type the client declared for it.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: Option<String>,
    pub declared_type: String,
    pub data: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: Option<String>, declared_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name,
            declared_type: declared_type.into(),
            data,
        }
    }

    pub fn from_path(path: &Path, declared_type: Option<&str>) -> std::io::Result<Self> {
        let data = std::fs::read(path)?;
        let declared = declared_type.unwrap_or_else(|| MediaType::mime_for_path(path));
        Ok(Self::new(
            path.file_name().map(|n| n.to_string_lossy().to_string()),
            declared,
            data,
        ))
    }

    pub fn media_type(&self) -> Result<MediaType, DocError> {
        MediaType::from_mime(&self.declared_type)
    }
}
