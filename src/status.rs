//! What the presentation layer should currently display.
//!
//! Exactly one `StatusView` is current at any time. A new processing cycle
//! clears the board before publishing anything, so messages from a previous
//! cycle never linger next to new ones.

use crate::category::DocumentCategory;
use crate::error::{DocError, ErrorKind};
use crate::recognition::EngineState;
use crate::validator::Verdict;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum StatusView {
    Idle,
    LoadingEngine,
    EngineFailed {
        message: String,
    },
    Processing,
    Verdict {
        verdict: Verdict,
        category: DocumentCategory,
    },
    Error {
        kind: ErrorKind,
        message: String,
    },
}

impl StatusView {
    pub fn message(&self) -> Option<String> {
        match self {
            StatusView::Idle => None,
            StatusView::LoadingEngine => Some("Loading recognition engine...".to_string()),
            StatusView::EngineFailed { message } | StatusView::Error { message, .. } => {
                Some(message.clone())
            }
            StatusView::Processing => Some("Processing document... Please wait.".to_string()),
            StatusView::Verdict { verdict, .. } => Some(
                match verdict {
                    Verdict::Found => "FOUND",
                    Verdict::NotFound => "NOT FOUND",
                }
                .to_string(),
            ),
        }
    }
}

pub struct StatusBoard {
    tx: watch::Sender<StatusView>,
}

impl StatusBoard {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(StatusView::Idle);
        Self { tx }
    }

    pub fn current(&self) -> StatusView {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<StatusView> {
        self.tx.subscribe()
    }

    fn publish(&self, view: StatusView) {
        tracing::debug!(state = ?view, "status changed");
        self.tx.send_replace(view);
    }

    pub fn clear(&self) {
        self.publish(StatusView::Idle);
    }

    pub fn processing(&self) {
        self.publish(StatusView::Processing);
    }

    /// A cycle stopped without reporting: drop its `Processing` view.
    pub fn abandon(&self) {
        self.tx.send_if_modified(|view| {
            let stale = *view == StatusView::Processing;
            if stale {
                *view = StatusView::Idle;
            }
            stale
        });
    }

    pub fn verdict(&self, verdict: Verdict, category: DocumentCategory) {
        self.publish(StatusView::Verdict { verdict, category });
    }

    pub fn error(&self, error: &DocError) {
        let view = match error.kind() {
            ErrorKind::Initialization => StatusView::EngineFailed {
                message: error.user_message(),
            },
            kind => StatusView::Error {
                kind,
                message: error.user_message(),
            },
        };
        self.publish(view);
    }

    /// Mirror an engine state change.
    ///
    /// Ready only clears messages that were about the engine still loading, so
    /// a cycle that already started is never overwritten.
    pub fn engine_changed(&self, state: &EngineState) {
        match state {
            EngineState::Uninitialized => {}
            EngineState::Initializing => self.publish(StatusView::LoadingEngine),
            EngineState::Ready => {
                self.tx.send_if_modified(|view| {
                    let stale = matches!(
                        view,
                        StatusView::LoadingEngine
                            | StatusView::Error {
                                kind: ErrorKind::NotReady,
                                ..
                            }
                    );
                    if stale {
                        *view = StatusView::Idle;
                    }
                    stale
                });
            }
            EngineState::Failed { .. } => self.error(&DocError::InitializationError(
                "engine failed to load".to_string(),
            )),
        }
    }

    /// Follow engine state changes until the engine settles.
    pub fn follow_engine(
        self: &Arc<Self>,
        mut states: watch::Receiver<EngineState>,
    ) -> tokio::task::JoinHandle<()> {
        let board = self.clone();
        tokio::spawn(async move {
            loop {
                let state = states.borrow_and_update().clone();
                board.engine_changed(&state);
                if state.is_settled() || states.changed().await.is_err() {
                    break;
                }
            }
        })
    }
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}
