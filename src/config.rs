use crate::cli::Args;
use std::path::PathBuf;
use std::time::Duration;

/// Service configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub language: String,
    pub engine: Option<String>,
    pub keywords_file: Option<PathBuf>,
    pub max_file_size: usize,
    pub recognition_timeout: Duration,
    pub model_dir: PathBuf,
}

impl Config {
    /// Default model cache: `<cache dir>/identificadoc`
    pub fn default_model_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("identificadoc")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9393,
            language: "por".to_string(),
            engine: None,
            keywords_file: None,
            max_file_size: 20 * 1024 * 1024,
            recognition_timeout: Duration::from_secs(120),
            model_dir: Self::default_model_dir(),
        }
    }
}

impl From<&Args> for Config {
    fn from(args: &Args) -> Self {
        Self {
            host: args.host.clone(),
            port: args.port,
            language: args.language.clone(),
            engine: args.engine.clone(),
            keywords_file: args.keywords.clone(),
            max_file_size: args.max_file_size,
            recognition_timeout: Duration::from_secs(args.recognition_timeout_secs),
            model_dir: args
                .model_dir
                .clone()
                .unwrap_or_else(Self::default_model_dir),
        }
    }
}
