//! Recognition service: owns the OCR engine and its one-time lifecycle.
//!
//! The service is built once at startup and handed to the pipeline by `Arc`.
//! `initialize` loads the engine on the blocking pool exactly once; the state
//! only ever moves forward:
//!
//! ```text
//! Uninitialized -> Initializing -> Ready
//!                              \-> Failed
//! ```
//!
//! There is no retry path. A failed engine stays failed until the process restarts.

use crate::cancel::CancelToken;
use crate::engine::{EngineLoader, TextRecognizer};
use crate::error::DocError;
use image::DynamicImage;
use serde::Serialize;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EngineState {
    Uninitialized,
    Initializing,
    Ready,
    Failed { message: String },
}

impl EngineState {
    /// Ready and Failed are final.
    pub fn is_settled(&self) -> bool {
        matches!(self, EngineState::Ready | EngineState::Failed { .. })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EngineState::Uninitialized => "uninitialized",
            EngineState::Initializing => "initializing",
            EngineState::Ready => "ready",
            EngineState::Failed { .. } => "failed",
        }
    }
}

pub struct RecognitionService {
    loader: Arc<dyn EngineLoader>,
    state: Arc<watch::Sender<EngineState>>,
    engine: Arc<OnceLock<Arc<dyn TextRecognizer>>>,
    timeout: Duration,
}

impl RecognitionService {
    pub fn new(loader: Arc<dyn EngineLoader>, timeout: Duration) -> Self {
        let (state, _rx) = watch::channel(EngineState::Uninitialized);
        Self {
            loader,
            state: Arc::new(state),
            engine: Arc::new(OnceLock::new()),
            timeout,
        }
    }

    pub fn engine_name(&self) -> &'static str {
        self.loader.name()
    }

    pub fn state(&self) -> EngineState {
        self.state.borrow().clone()
    }

    pub fn is_ready(&self) -> bool {
        matches!(*self.state.borrow(), EngineState::Ready)
    }

    pub fn subscribe(&self) -> watch::Receiver<EngineState> {
        self.state.subscribe()
    }

    /// Load the engine if nobody has yet, then wait for the final state.
    ///
    /// Only the first call starts loading; every other call (concurrent or later)
    /// just waits and returns the cached outcome. Loading keeps going even if the
    /// returned future is dropped.
    pub async fn initialize(&self) -> EngineState {
        let started = self.state.send_if_modified(|state| {
            if *state == EngineState::Uninitialized {
                *state = EngineState::Initializing;
                true
            } else {
                false
            }
        });

        if started {
            let loader = self.loader.clone();
            let state = self.state.clone();
            let slot = self.engine.clone();

            tokio::spawn(async move {
                let start = Instant::now();
                let name = loader.name();
                tracing::info!("Loading recognition engine '{}'...", name);

                let loaded = tokio::task::spawn_blocking(move || loader.load()).await;
                let next = match loaded {
                    Ok(Ok(engine)) => {
                        tracing::info!(
                            "Recognition engine '{}' ready in {}ms (language: {})",
                            engine.name(),
                            start.elapsed().as_millis(),
                            engine.language()
                        );
                        // The Uninitialized -> Initializing guard above makes this the only set.
                        let _ = slot.set(engine);
                        EngineState::Ready
                    }
                    Ok(Err(e)) => {
                        tracing::error!("Recognition engine failed to load: {}", e);
                        EngineState::Failed {
                            message: e.to_string(),
                        }
                    }
                    Err(join_error) => {
                        tracing::error!(
                            "Recognition engine '{}' loader crashed: {}",
                            name,
                            join_error
                        );
                        EngineState::Failed {
                            message: format!("engine loader crashed: {}", join_error),
                        }
                    }
                };
                state.send_replace(next);
            });
        }

        let mut rx = self.state.subscribe();
        let settled = match rx.wait_for(EngineState::is_settled).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        };
        settled
    }

    /// Start `initialize` in the background without waiting for it.
    pub fn spawn_initialize(self: &Arc<Self>) -> tokio::task::JoinHandle<EngineState> {
        let service = self.clone();
        tokio::spawn(async move { service.initialize().await })
    }

    /// Recognize text in `image`.
    ///
    /// Fails with `NotReady`/`InitializationError` when the engine is not loaded,
    /// `RecognitionError` when the engine errors, panics or exceeds the timeout,
    /// and `Cancelled` when `cancel` fires first.
    pub async fn recognize(
        &self,
        image: DynamicImage,
        cancel: &CancelToken,
    ) -> Result<String, DocError> {
        let engine = match self.engine.get() {
            Some(engine) => engine.clone(),
            None => {
                return Err(match self.state() {
                    EngineState::Failed { message } => DocError::InitializationError(message),
                    _ => DocError::NotReady,
                })
            }
        };

        if cancel.is_cancelled() {
            return Err(DocError::Cancelled);
        }

        let start = Instant::now();
        let task = tokio::task::spawn_blocking(move || engine.recognize(&image));

        let text = tokio::select! {
            result = tokio::time::timeout(self.timeout, task) => match result {
                Ok(Ok(result)) => result?,
                Ok(Err(join_error)) => {
                    return Err(DocError::RecognitionError(format!(
                        "engine task failed: {}",
                        join_error
                    )))
                }
                Err(_) => {
                    return Err(DocError::RecognitionError(format!(
                        "timed out after {}s",
                        self.timeout.as_secs()
                    )))
                }
            },
            _ = cancel.cancelled() => return Err(DocError::Cancelled),
        };

        tracing::debug!(
            "Recognition finished in {}ms, text length: {}",
            start.elapsed().as_millis(),
            text.len()
        );

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{GatedLoader, StubLoader, StubRecognizer};
    use tokio_test::{assert_err, assert_ok};

    fn service(loader: impl EngineLoader + 'static) -> Arc<RecognitionService> {
        Arc::new(RecognitionService::new(Arc::new(loader), Duration::from_secs(5)))
    }

    fn blank() -> DynamicImage {
        DynamicImage::new_rgb8(4, 4)
    }

    #[tokio::test]
    async fn test_initialize_reaches_ready() {
        let service = service(StubLoader::ok(StubRecognizer::text("CPF")));
        assert_eq!(service.state(), EngineState::Uninitialized);

        assert_eq!(service.initialize().await, EngineState::Ready);
        assert!(service.is_ready());
    }

    #[tokio::test]
    async fn test_initialize_runs_loader_once() {
        let loader = StubLoader::ok(StubRecognizer::text("CPF"));
        let loads = loader.loads.clone();
        let service = service(loader);

        let (a, b) = tokio::join!(service.initialize(), service.initialize());
        assert_eq!(a, EngineState::Ready);
        assert_eq!(b, EngineState::Ready);
        assert_eq!(service.initialize().await, EngineState::Ready);
        assert_eq!(loads.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_is_terminal() {
        let loader = StubLoader::failing("model download refused");
        let loads = loader.loads.clone();
        let service = service(loader);

        let state = service.initialize().await;
        assert!(matches!(&state, EngineState::Failed { message } if message.contains("refused")));

        // no retry on later calls
        assert_eq!(service.initialize().await, state);
        assert_eq!(loads.load(std::sync::atomic::Ordering::SeqCst), 1);

        let err = service.recognize(blank(), &CancelToken::new()).await;
        assert!(matches!(err, Err(DocError::InitializationError(_))));
    }

    struct PanickingLoader;

    impl EngineLoader for PanickingLoader {
        fn name(&self) -> &'static str {
            "panicking"
        }

        fn load(&self) -> Result<Arc<dyn TextRecognizer>, DocError> {
            panic!("truncated model file");
        }
    }

    #[tokio::test]
    async fn test_panicking_loader_settles_as_failed() {
        let service = service(PanickingLoader);

        let state = tokio::time::timeout(Duration::from_secs(5), service.initialize())
            .await
            .expect("initialize must settle");
        assert!(matches!(&state, EngineState::Failed { message } if message.contains("crashed")));
        assert_eq!(service.state(), state);

        let err = service.recognize(blank(), &CancelToken::new()).await;
        assert!(matches!(err, Err(DocError::InitializationError(_))));
    }

    #[tokio::test]
    async fn test_recognize_before_ready_is_not_ready() {
        let (loader, gate) = GatedLoader::new(StubRecognizer::text("CPF"));
        let service = service(loader);
        let init = service.spawn_initialize();

        let mut rx = service.subscribe();
        rx.wait_for(|s| *s == EngineState::Initializing).await.unwrap();

        let err = service.recognize(blank(), &CancelToken::new()).await;
        assert!(matches!(err, Err(DocError::NotReady)));

        gate.send(()).unwrap();
        assert_eq!(init.await.unwrap(), EngineState::Ready);
        assert_ok!(service.recognize(blank(), &CancelToken::new()).await);
    }

    #[tokio::test]
    async fn test_engine_error_surfaces_as_recognition_error() {
        let service = service(StubLoader::ok(StubRecognizer::failing("bad pixels")));
        service.initialize().await;

        let err = assert_err!(service.recognize(blank(), &CancelToken::new()).await);
        assert!(matches!(err, DocError::RecognitionError(_)));
    }

    #[tokio::test]
    async fn test_slow_engine_times_out() {
        let loader = StubLoader::ok(StubRecognizer::slow("late", Duration::from_millis(500)));
        let service = Arc::new(RecognitionService::new(
            Arc::new(loader),
            Duration::from_millis(50),
        ));
        service.initialize().await;

        let err = assert_err!(service.recognize(blank(), &CancelToken::new()).await);
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_cancelled_token_short_circuits() {
        let service = service(StubLoader::ok(StubRecognizer::text("CPF")));
        service.initialize().await;

        let cancel = CancelToken::new();
        cancel.cancel();
        let err = service.recognize(blank(), &cancel).await;
        assert!(matches!(err, Err(DocError::Cancelled)));
    }
}
