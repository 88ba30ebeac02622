use crate::cancel::CancelToken;
use crate::category::DocumentCategory;
use crate::config::Config;
use crate::error::DocError;
use crate::help;
use crate::media::{MediaType, UploadedFile};
use crate::pipeline::{CycleOutcome, CycleStage, DocumentPipeline, Selection};
use crate::recognition::EngineState;
use crate::status::StatusView;
use crate::validator::Verdict;
use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Room for multipart boundaries and the category field on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<DocumentPipeline>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(pipeline: Arc<DocumentPipeline>, config: Config) -> Self {
        Self {
            pipeline,
            config: Arc::new(config),
        }
    }
}

/// Validation response. Never carries the recognized text.
#[derive(Serialize)]
pub struct ValidateResponse {
    pub verdict: Verdict,
    pub message: &'static str,
    pub category: DocumentCategory,
    pub media_type: &'static str,
    pub processing_time_ms: u64,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub display: StatusView,
    pub message: Option<String>,
    pub engine: EngineState,
    pub stage: CycleStage,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub engine_state: String,
}

#[derive(Serialize)]
pub struct CategoryInfo {
    pub name: DocumentCategory,
    pub code: &'static str,
    pub keyword_count: usize,
}

/// Server info response
#[derive(Serialize)]
pub struct InfoResponse {
    pub version: String,
    pub engine: String,
    pub rasterizer: String,
    pub language: String,
    pub supported_formats: Vec<String>,
    pub categories: Vec<CategoryInfo>,
    pub max_file_size_bytes: usize,
}

/// Build the HTTP router over an already wired pipeline.
pub fn router(state: AppState) -> Router {
    let body_limit = state.config.max_file_size + MULTIPART_OVERHEAD;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/validate", post(handle_validate))
        .route("/status", get(handle_status))
        .route("/health", get(handle_health))
        .route("/info", get(handle_info))
        .route("/help", get(handle_help))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(state)
}

/// Run the HTTP server
///
/// The listener is bound before the engine finishes loading; uploads that
/// arrive in the meantime are answered with `NOT_READY`.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let pipeline = Arc::new(DocumentPipeline::from_config(&config)?);
    let addr = format!("{}:{}", config.host, config.port);

    let init = pipeline.start();
    tokio::spawn(async move {
        match init.await {
            Ok(EngineState::Ready) => tracing::info!("Recognition engine ready"),
            Ok(state) => tracing::error!("Recognition engine unavailable: {:?}", state),
            Err(e) => tracing::error!("Engine initialization task failed: {}", e),
        }
    });

    let app = router(AppState::new(pipeline, config));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Handle validation requests
async fn handle_validate(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, DocError> {
    let selection = match read_selection(&state, multipart).await {
        Ok(selection) => selection,
        Err(e) => {
            state.pipeline.report_rejected(&e);
            return Err(e);
        }
    };

    // a client that disconnects drops this future and cancels its cycle
    let cancel = CancelToken::new();
    let on_disconnect = cancel.drop_guard();
    let outcome = state.pipeline.process(selection, &cancel).await;
    on_disconnect.disarm();

    match outcome? {
        CycleOutcome::Skipped => Ok(StatusCode::NO_CONTENT.into_response()),
        CycleOutcome::Completed(report) => Ok(Json(ValidateResponse {
            verdict: report.verdict,
            message: match report.verdict {
                Verdict::Found => "FOUND",
                Verdict::NotFound => "NOT FOUND",
            },
            category: report.category,
            media_type: report.media_type.mime(),
            processing_time_ms: report.processing_time_ms,
        })
        .into_response()),
    }
}

/// Collect the `file` and `category` form fields.
async fn read_selection(
    state: &AppState,
    mut multipart: Multipart,
) -> Result<Selection, DocError> {
    let mut file: Option<UploadedFile> = None;
    let mut category: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| DocError::InvalidRequest(format!("Failed to parse multipart: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "file" => {
                let file_name = field.file_name().map(|s| s.to_string());
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field.bytes().await.map_err(|e| {
                    DocError::InvalidRequest(format!("Failed to read file data: {}", e))
                })?;

                if data.len() > state.config.max_file_size {
                    return Err(DocError::FileTooLarge {
                        size: data.len(),
                        max: state.config.max_file_size,
                    });
                }

                // browsers send an empty, unnamed part when nothing was picked
                let nothing_picked =
                    data.is_empty() && file_name.as_deref().map_or(true, str::is_empty);
                if !nothing_picked {
                    file = Some(UploadedFile::new(file_name, content_type, data.to_vec()));
                }
            }
            "category" => {
                category = Some(field.text().await.map_err(|e| {
                    DocError::InvalidRequest(format!("Invalid category: {}", e))
                })?);
            }
            _ => {}
        }
    }

    Ok(Selection { file, category })
}

async fn handle_status(State(state): State<AppState>) -> impl IntoResponse {
    let display = state.pipeline.status().current();
    Json(StatusResponse {
        message: display.message(),
        display,
        engine: state.pipeline.recognition().state(),
        stage: state.pipeline.stage(),
    })
}

/// Handle health check requests
async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        engine_state: state.pipeline.recognition().state().as_str().to_string(),
    })
}

/// Handle info requests
async fn handle_info(State(state): State<AppState>) -> impl IntoResponse {
    let keywords = state.pipeline.validator().keywords();
    Json(InfoResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        engine: state.pipeline.recognition().engine_name().to_string(),
        rasterizer: state.pipeline.rasterizer().name().to_string(),
        language: state.config.language.clone(),
        supported_formats: MediaType::ACCEPTED_MIME_TYPES
            .iter()
            .map(|s| s.to_string())
            .collect(),
        categories: DocumentCategory::ALL
            .iter()
            .map(|&category| CategoryInfo {
                name: category,
                code: category.short_code(),
                keyword_count: keywords.keywords(category).len(),
            })
            .collect(),
        max_file_size_bytes: state.config.max_file_size,
    })
}

async fn handle_help(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/markdown; charset=utf-8")],
        help::render(state.pipeline.validator().keywords()),
    )
}
