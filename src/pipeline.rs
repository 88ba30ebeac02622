//! Document processing pipeline.
//!
//! One call to [`DocumentPipeline::process`] is one processing cycle:
//!
//! ```text
//! Idle -> ValidatingInput -> AwaitingEngine -> Extracting -> Validating -> Reporting -> Idle
//! ```
//!
//! Input problems abort before the engine is touched. The engine gate rejects
//! instead of queueing. Anything that fails while extracting is logged in
//! detail and reported as one generic error, and no text moves on. Only one
//! cycle runs at a time; overlapping attempts are rejected with `Busy`.

use crate::cancel::CancelToken;
use crate::category::DocumentCategory;
use crate::config::Config;
use crate::engines;
use crate::error::DocError;
use crate::keywords::KeywordSet;
use crate::media::{MediaType, UploadedFile};
use crate::rasterizer::{default_rasterizer, Rasterizer};
use crate::recognition::{EngineState, RecognitionService};
use crate::status::StatusBoard;
use crate::validator::{KeywordValidator, Verdict};
use image::DynamicImage;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStage {
    Idle,
    ValidatingInput,
    AwaitingEngine,
    Extracting,
    Validating,
    Reporting,
}

/// What the user picked: possibly no file, possibly no category yet.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub file: Option<UploadedFile>,
    pub category: Option<String>,
}

impl Selection {
    pub fn new(file: UploadedFile, category: DocumentCategory) -> Self {
        Self {
            file: Some(file),
            category: Some(category.as_str().to_string()),
        }
    }

    /// Input checks that run before the engine is consulted.
    ///
    /// `Ok(None)` means no file was selected. Otherwise the media type is
    /// checked before the category.
    pub fn check_input(&self) -> Result<Option<(MediaType, DocumentCategory)>, DocError> {
        let Some(file) = &self.file else {
            return Ok(None);
        };
        let media_type = file.media_type()?;
        let category = match self.category.as_deref() {
            None => return Err(DocError::MissingCategory),
            Some(raw) => raw.parse::<DocumentCategory>()?,
        };
        Ok(Some((media_type, category)))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub verdict: Verdict,
    pub category: DocumentCategory,
    pub media_type: MediaType,
    pub processing_time_ms: u64,
}

#[derive(Debug, Clone)]
pub enum CycleOutcome {
    /// No file was selected; nothing happened.
    Skipped,
    Completed(CycleReport),
}

pub struct DocumentPipeline {
    recognition: Arc<RecognitionService>,
    rasterizer: Arc<dyn Rasterizer>,
    validator: KeywordValidator,
    status: Arc<StatusBoard>,
    stage: watch::Sender<CycleStage>,
    busy: Arc<Semaphore>,
}

impl DocumentPipeline {
    pub fn new(
        recognition: Arc<RecognitionService>,
        rasterizer: Arc<dyn Rasterizer>,
        validator: KeywordValidator,
        status: Arc<StatusBoard>,
    ) -> Self {
        let (stage, _rx) = watch::channel(CycleStage::Idle);
        Self {
            recognition,
            rasterizer,
            validator,
            status,
            stage,
            busy: Arc::new(Semaphore::new(1)),
        }
    }

    /// Wire the production collaborators described by `config`.
    ///
    /// Nothing heavy happens here; call [`DocumentPipeline::start`] to begin
    /// loading the engine.
    pub fn from_config(config: &Config) -> Result<Self, DocError> {
        let keywords = KeywordSet::load_or_default(config.keywords_file.as_deref())?;
        let loader = engines::loader_for(config)?;
        let recognition = RecognitionService::new(loader, config.recognition_timeout);
        let rasterizer = default_rasterizer();

        tracing::info!(
            "Pipeline configured (engine: {}, rasterizer: {}, language: {}, keywords: {})",
            recognition.engine_name(),
            rasterizer.name(),
            config.language,
            keywords.total()
        );

        Ok(Self::new(
            Arc::new(recognition),
            rasterizer,
            KeywordValidator::new(Arc::new(keywords)),
            Arc::new(StatusBoard::new()),
        ))
    }

    /// Mirror engine state on the status board and start loading the engine in
    /// the background.
    ///
    /// The returned handle resolves to the settled state once the status board
    /// has caught up with it.
    pub fn start(&self) -> JoinHandle<EngineState> {
        let follower = self.status.follow_engine(self.recognition.subscribe());
        let init = self.recognition.spawn_initialize();
        tokio::spawn(async move {
            match init.await {
                Ok(state) => {
                    let _ = follower.await;
                    state
                }
                Err(e) => {
                    follower.abort();
                    EngineState::Failed {
                        message: format!("initialization task failed: {}", e),
                    }
                }
            }
        })
    }

    pub fn recognition(&self) -> &Arc<RecognitionService> {
        &self.recognition
    }

    pub fn rasterizer(&self) -> &Arc<dyn Rasterizer> {
        &self.rasterizer
    }

    pub fn validator(&self) -> &KeywordValidator {
        &self.validator
    }

    pub fn status(&self) -> &Arc<StatusBoard> {
        &self.status
    }

    pub fn stage(&self) -> CycleStage {
        *self.stage.borrow()
    }

    pub fn subscribe_stage(&self) -> watch::Receiver<CycleStage> {
        self.stage.subscribe()
    }

    /// Show a request that was refused before it could become a cycle
    /// (oversized or malformed upload). A running cycle keeps the board.
    pub fn report_rejected(&self, error: &DocError) {
        if let Ok(_permit) = self.busy.try_acquire() {
            self.status.clear();
            self.status.error(error);
        }
    }

    fn enter(&self, stage: CycleStage) {
        tracing::trace!(?stage, "cycle stage");
        self.stage.send_replace(stage);
    }

    /// Run one processing cycle.
    pub async fn process(
        &self,
        selection: Selection,
        cancel: &CancelToken,
    ) -> Result<CycleOutcome, DocError> {
        let _permit = self
            .busy
            .clone()
            .try_acquire_owned()
            .map_err(|_| DocError::Busy)?;

        let mut guard = CycleGuard {
            pipeline: self,
            reported: false,
        };

        self.status.clear();
        let result = self.run_cycle(selection, cancel).await;

        if let Err(e) = &result {
            self.status.error(e);
        }
        guard.reported = true;

        result
    }

    async fn run_cycle(
        &self,
        selection: Selection,
        cancel: &CancelToken,
    ) -> Result<CycleOutcome, DocError> {
        let start = Instant::now();

        self.enter(CycleStage::ValidatingInput);
        let Some((media_type, category)) = selection.check_input()? else {
            tracing::debug!("No file selected, nothing to do");
            return Ok(CycleOutcome::Skipped);
        };
        let Some(file) = selection.file else {
            return Ok(CycleOutcome::Skipped);
        };

        self.enter(CycleStage::AwaitingEngine);
        match self.recognition.state() {
            EngineState::Ready => {}
            EngineState::Failed { message } => {
                return Err(DocError::InitializationError(message))
            }
            _ => return Err(DocError::NotReady),
        }

        self.status.processing();
        self.enter(CycleStage::Extracting);
        tracing::info!(
            "Processing {} ({}, {} bytes) as {}",
            file.name.as_deref().unwrap_or("upload"),
            media_type.mime(),
            file.data.len(),
            category
        );

        let text = match self.extract(file, media_type, cancel).await {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("Document processing failed: {}", e);
                return Err(e);
            }
        };

        self.enter(CycleStage::Validating);
        let verdict = self.validator.validate(&text, category);
        // extracted text is never kept or shown
        drop(text);

        self.enter(CycleStage::Reporting);
        self.status.verdict(verdict, category);

        let processing_time_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            "Validation finished in {}ms: {:?} for {}",
            processing_time_ms,
            verdict,
            category
        );

        Ok(CycleOutcome::Completed(CycleReport {
            verdict,
            category,
            media_type,
            processing_time_ms,
        }))
    }

    async fn extract(
        &self,
        file: UploadedFile,
        media_type: MediaType,
        cancel: &CancelToken,
    ) -> Result<String, DocError> {
        let data = file.data;

        let image = match media_type.image_format() {
            Some(format) => {
                run_blocking(cancel, move || {
                    image::load_from_memory_with_format(&data, format).map_err(|e| {
                        DocError::RecognitionError(format!("Failed to decode image: {}", e))
                    })
                })
                .await?
            }
            None => {
                let rasterizer = self.rasterizer.clone();
                run_blocking(cancel, move || rasterizer.rasterize_first_page(&data)).await?
            }
        };

        self.recognize(image, cancel).await
    }

    async fn recognize(&self, image: DynamicImage, cancel: &CancelToken) -> Result<String, DocError> {
        tracing::debug!("Recognizing {}x{} image", image.width(), image.height());
        self.recognition.recognize(image, cancel).await
    }
}

/// Returns the pipeline to Idle however a cycle ends, including when the
/// future driving it is dropped mid-flight.
struct CycleGuard<'a> {
    pipeline: &'a DocumentPipeline,
    reported: bool,
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        if !self.reported {
            tracing::warn!(
                "Processing cycle abandoned during {:?}",
                self.pipeline.stage()
            );
            self.pipeline.status.abandon();
        }
        self.pipeline.enter(CycleStage::Idle);
    }
}

/// Run CPU-bound work on the blocking pool, giving up early if `cancel` fires.
async fn run_blocking<T, F>(cancel: &CancelToken, work: F) -> Result<T, DocError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, DocError> + Send + 'static,
{
    if cancel.is_cancelled() {
        return Err(DocError::Cancelled);
    }

    tokio::select! {
        joined = tokio::task::spawn_blocking(work) => joined
            .map_err(|e| DocError::RecognitionError(format!("worker task failed: {}", e)))?,
        _ = cancel.cancelled() => Err(DocError::Cancelled),
    }
}
