use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "identificadoc-server")]
#[command(about = "OCR-based document type validation (CPF, CNH, RG)")]
#[command(version)]
pub struct Args {
    /// Host address to bind to
    #[arg(long, global = true, env = "DOC_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(long, global = true, env = "DOC_PORT", default_value = "9393")]
    pub port: u16,

    /// Language hint for OCR (e.g., "por", "eng")
    #[arg(long, global = true, env = "DOC_OCR_LANGUAGE", default_value = "por")]
    pub language: String,

    /// OCR engine to load (defaults to the first compiled-in engine)
    #[arg(long, global = true, env = "DOC_OCR_ENGINE")]
    pub engine: Option<String>,

    /// JSON file mapping each document type to its keywords
    #[arg(long, global = true, env = "DOC_KEYWORDS_FILE")]
    pub keywords: Option<PathBuf>,

    /// Maximum upload size in bytes (default: 20MB)
    #[arg(long, global = true, env = "DOC_MAX_FILE_SIZE", default_value = "20971520")]
    pub max_file_size: usize,

    /// Seconds before a single recognition call is abandoned
    #[arg(
        long,
        global = true,
        env = "DOC_RECOGNITION_TIMEOUT_SECS",
        default_value = "120"
    )]
    pub recognition_timeout_secs: u64,

    /// Directory where OCR models are cached
    #[arg(long, global = true, env = "DOC_MODEL_DIR")]
    pub model_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP service (default)
    Serve,
    /// Validate a single local file and print the verdict
    Check {
        /// Image (JPG, PNG) or PDF file
        file: PathBuf,
        /// Expected document type: cpf, cnh, rg (or tax_id, drivers_license, national_id)
        #[arg(long)]
        category: Option<String>,
        /// Declared MIME type; guessed from the extension when omitted
        #[arg(long)]
        mime: Option<String>,
        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },
}
