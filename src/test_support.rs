//! Stub engines and rasterizers for unit tests.

use crate::engine::{EngineLoader, TextRecognizer};
use crate::error::DocError;
use crate::rasterizer::Rasterizer;
use image::DynamicImage;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

pub struct StubRecognizer {
    text: Result<String, String>,
    delay: Duration,
    pub calls: Arc<AtomicUsize>,
}

impl StubRecognizer {
    pub fn text(text: &str) -> Self {
        Self {
            text: Ok(text.to_string()),
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            text: Err(message.to_string()),
            ..Self::text("")
        }
    }

    pub fn slow(text: &str, delay: Duration) -> Self {
        Self {
            delay,
            ..Self::text(text)
        }
    }
}

impl TextRecognizer for StubRecognizer {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn language(&self) -> &str {
        "por"
    }

    fn recognize(&self, _image: &DynamicImage) -> Result<String, DocError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.text.clone().map_err(DocError::RecognitionError)
    }
}

pub struct StubLoader {
    outcome: Result<Arc<dyn TextRecognizer>, String>,
    pub loads: Arc<AtomicUsize>,
}

impl StubLoader {
    pub fn ok(recognizer: StubRecognizer) -> Self {
        Self {
            outcome: Ok(Arc::new(recognizer)),
            loads: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            outcome: Err(message.to_string()),
            loads: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl EngineLoader for StubLoader {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn load(&self) -> Result<Arc<dyn TextRecognizer>, DocError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.outcome
            .clone()
            .map_err(DocError::InitializationError)
    }
}

/// Loader that blocks until the test sends on the returned channel.
pub struct GatedLoader {
    inner: StubLoader,
    gate: Mutex<mpsc::Receiver<()>>,
}

impl GatedLoader {
    pub fn new(recognizer: StubRecognizer) -> (Self, mpsc::Sender<()>) {
        let (tx, rx) = mpsc::channel();
        (
            Self {
                inner: StubLoader::ok(recognizer),
                gate: Mutex::new(rx),
            },
            tx,
        )
    }
}

impl EngineLoader for GatedLoader {
    fn name(&self) -> &'static str {
        "gated"
    }

    fn load(&self) -> Result<Arc<dyn TextRecognizer>, DocError> {
        if let Ok(gate) = self.gate.lock() {
            let _ = gate.recv();
        }
        self.inner.load()
    }
}

/// Rasterizer that returns a fixed blank page and records how often it ran.
pub struct StubRasterizer {
    fail: bool,
    pub calls: Arc<AtomicUsize>,
}

impl StubRasterizer {
    pub fn ok() -> Self {
        Self {
            fail: false,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::ok()
        }
    }
}

impl Rasterizer for StubRasterizer {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn rasterize_first_page(&self, _pdf: &[u8]) -> Result<DynamicImage, DocError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(DocError::RasterizationError("document has no pages".into()));
        }
        Ok(DynamicImage::new_rgb8(8, 8))
    }
}

/// Encode a small white PNG.
pub fn png_bytes() -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
        16,
        16,
        image::Rgb([255, 255, 255]),
    ));
    let mut out = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)
        .expect("encode png");
    out
}
