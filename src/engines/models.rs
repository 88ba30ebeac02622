//! Model and training-data cache shared by the engine loaders.

use crate::error::DocError;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Return `dir/filename`, downloading it from `url` first if it is not cached.
pub fn ensure_downloaded(url: &str, dir: &Path, filename: &str) -> Result<PathBuf, DocError> {
    std::fs::create_dir_all(dir).map_err(|e| {
        DocError::InitializationError(format!(
            "Failed to create model directory {}: {}",
            dir.display(),
            e
        ))
    })?;

    let path = dir.join(filename);

    if path.exists() {
        tracing::info!("Using cached {} from {:?}", filename, path);
        return Ok(path);
    }

    tracing::info!("Downloading {} (this may take a moment)...", filename);
    download_file(url, &path)?;
    tracing::info!("Downloaded {} to {:?}", filename, path);

    Ok(path)
}

/// Download into a sibling `.part` file and rename, so an interrupted
/// download never leaves a truncated model behind.
fn download_file(url: &str, path: &Path) -> Result<(), DocError> {
    let response = ureq::get(url).call().map_err(|e| {
        DocError::InitializationError(format!("Failed to download {}: {}", url, e))
    })?;

    let buffer = response.into_body().read_to_vec().map_err(|e| {
        DocError::InitializationError(format!("Failed to read response body: {}", e))
    })?;

    let partial = path.with_extension("part");
    let mut file = File::create(&partial).map_err(|e| {
        DocError::InitializationError(format!("Failed to create {}: {}", partial.display(), e))
    })?;

    file.write_all(&buffer).map_err(|e| {
        DocError::InitializationError(format!("Failed to write {}: {}", partial.display(), e))
    })?;

    std::fs::rename(&partial, path).map_err(|e| {
        DocError::InitializationError(format!("Failed to move model into place: {}", e))
    })?;

    Ok(())
}
