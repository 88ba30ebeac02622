use clap::Parser;
use identificadoc::cancel::CancelToken;
use identificadoc::cli::{Args, Command};
use identificadoc::config::Config;
use identificadoc::media::UploadedFile;
use identificadoc::recognition::EngineState;
use identificadoc::{server, CycleOutcome, DocError, DocumentPipeline, Selection, Verdict};
use std::path::Path;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::from(&args);

    match args.command {
        None | Some(Command::Serve) => {
            tracing::info!(
                "Starting identificadoc-server v{}",
                env!("CARGO_PKG_VERSION")
            );
            tracing::info!("Binding to {}:{}", config.host, config.port);

            server::run(config).await?;
            Ok(ExitCode::SUCCESS)
        }
        Some(Command::Check {
            file,
            category,
            mime,
            json,
        }) => check(&config, &file, category, mime.as_deref(), json).await,
    }
}

/// Validate one local file.
///
/// Exit codes: 0 when a keyword was found, 1 when none was, 2 when the file
/// could not be processed.
async fn check(
    config: &Config,
    path: &Path,
    category: Option<String>,
    mime: Option<&str>,
    json: bool,
) -> anyhow::Result<ExitCode> {
    let pipeline = DocumentPipeline::from_config(config)?;

    let upload = UploadedFile::from_path(path, mime)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
    let selection = Selection {
        file: Some(upload),
        category,
    };
    // bad input is reported before the engine load starts
    if let Err(e) = selection.check_input() {
        eprintln!("{}", e.user_message());
        return Ok(ExitCode::from(2));
    }

    match pipeline.start().await? {
        EngineState::Ready => {}
        state => {
            tracing::error!("Recognition engine unavailable: {:?}", state);
            eprintln!(
                "{}",
                DocError::InitializationError(state.as_str().to_string()).user_message()
            );
            return Ok(ExitCode::from(2));
        }
    }

    let cancel = CancelToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    match pipeline.process(selection, &cancel).await {
        Ok(CycleOutcome::Completed(report)) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!(
                    "{} ({} as {}, {}ms)",
                    match report.verdict {
                        Verdict::Found => "FOUND",
                        Verdict::NotFound => "NOT FOUND",
                    },
                    path.display(),
                    report.category.short_code(),
                    report.processing_time_ms
                );
            }
            Ok(if report.verdict.is_found() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            })
        }
        Ok(CycleOutcome::Skipped) => Ok(ExitCode::from(2)),
        Err(e) => {
            eprintln!("{}", e.user_message());
            Ok(ExitCode::from(2))
        }
    }
}
