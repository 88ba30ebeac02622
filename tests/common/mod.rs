//! Shared fixtures for the HTTP tests: stub engines, generated documents and
//! a hand-rolled multipart encoder for driving the router in-process.
#![allow(dead_code)]

use identificadoc::config::Config;
use identificadoc::engine::{EngineLoader, TextRecognizer};
use identificadoc::keywords::KeywordSet;
use identificadoc::rasterizer::{LopdfRasterizer, Rasterizer};
use identificadoc::recognition::RecognitionService;
use identificadoc::server::{router, AppState};
use identificadoc::status::StatusBoard;
use identificadoc::validator::KeywordValidator;
use identificadoc::{DocError, DocumentPipeline};
use image::DynamicImage;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const BOUNDARY: &str = "identificadoc-test-boundary";

/// Recognizer that returns canned text and remembers the size of what it saw.
pub struct CannedRecognizer {
    text: String,
    delay: Duration,
    pub seen: Arc<Mutex<Vec<(u32, u32)>>>,
}

impl CannedRecognizer {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            delay: Duration::ZERO,
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn slow(text: &str, delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new(text)
        }
    }
}

impl TextRecognizer for CannedRecognizer {
    fn name(&self) -> &'static str {
        "canned"
    }

    fn language(&self) -> &str {
        "por"
    }

    fn recognize(&self, image: &DynamicImage) -> Result<String, DocError> {
        self.seen.lock().unwrap().push((image.width(), image.height()));
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        Ok(self.text.clone())
    }
}

pub struct CannedLoader {
    recognizer: Result<Arc<CannedRecognizer>, String>,
}

impl EngineLoader for CannedLoader {
    fn name(&self) -> &'static str {
        "canned"
    }

    fn load(&self) -> Result<Arc<dyn TextRecognizer>, DocError> {
        match &self.recognizer {
            Ok(r) => Ok(r.clone()),
            Err(msg) => Err(DocError::InitializationError(msg.clone())),
        }
    }
}

pub struct TestApp {
    pub router: axum::Router,
    pub pipeline: Arc<DocumentPipeline>,
    pub seen: Arc<Mutex<Vec<(u32, u32)>>>,
}

fn build(loader: CannedLoader, seen: Arc<Mutex<Vec<(u32, u32)>>>, config: Config) -> TestApp {
    let recognition = Arc::new(RecognitionService::new(
        Arc::new(loader),
        Duration::from_secs(10),
    ));
    let rasterizer: Arc<dyn Rasterizer> = Arc::new(LopdfRasterizer);
    let pipeline = Arc::new(DocumentPipeline::new(
        recognition,
        rasterizer,
        KeywordValidator::new(Arc::new(KeywordSet::default())),
        Arc::new(StatusBoard::new()),
    ));
    TestApp {
        router: router(AppState::new(pipeline.clone(), config)),
        pipeline,
        seen,
    }
}

/// App whose engine has finished loading and reads `text` from every page.
pub async fn ready_app(recognizer: CannedRecognizer) -> TestApp {
    ready_app_with(recognizer, Config::default()).await
}

pub async fn ready_app_with(recognizer: CannedRecognizer, config: Config) -> TestApp {
    let seen = recognizer.seen.clone();
    let app = build(
        CannedLoader {
            recognizer: Ok(Arc::new(recognizer)),
        },
        seen,
        config,
    );
    app.pipeline.start().await.unwrap();
    app
}

/// App whose engine was never started.
pub fn unstarted_app() -> TestApp {
    let recognizer = CannedRecognizer::new("CPF");
    let seen = recognizer.seen.clone();
    build(
        CannedLoader {
            recognizer: Ok(Arc::new(recognizer)),
        },
        seen,
        Config::default(),
    )
}

/// App whose engine failed to load.
pub async fn failed_app() -> TestApp {
    let app = build(
        CannedLoader {
            recognizer: Err("model download refused".to_string()),
        },
        Arc::new(Mutex::new(Vec::new())),
        Config::default(),
    );
    app.pipeline.start().await.unwrap();
    app
}

pub enum Part<'a> {
    File {
        name: &'a str,
        content_type: &'a str,
        data: &'a [u8],
    },
    Text(&'a str, &'a str),
}

pub fn multipart_body(parts: &[Part]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::File {
                name,
                content_type,
                data,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                        name, content_type
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
            }
            Part::Text(field, value) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"\r\n\r\n{}",
                        field, value
                    )
                    .as_bytes(),
                );
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn validate_request(parts: &[Part]) -> axum::http::Request<axum::body::Body> {
    axum::http::Request::builder()
        .method("POST")
        .uri("/validate")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(axum::body::Body::from(multipart_body(parts)))
        .unwrap()
}

pub fn get_request(uri: &str) -> axum::http::Request<axum::body::Body> {
    axum::http::Request::builder()
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap()
}

pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// A white 40x20 PNG.
pub fn png_bytes() -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
        40,
        20,
        image::Rgb([255, 255, 255]),
    ));
    let mut out = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)
        .unwrap();
    out
}

/// A PDF of `pages` pages sized 300x200 points, each drawing a small gray image.
pub fn pdf_bytes(pages: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids: Vec<Object> = Vec::new();

    for _ in 0..pages {
        let image_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 2,
                "Height" => 2,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            vec![0u8; 4],
        ));
        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![100.into(), 0.into(), 0.into(), 50.into(), 10.into(), 10.into()],
                ),
                Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "MediaBox" => vec![0.into(), 0.into(), 300.into(), 200.into()],
            "Resources" => dictionary! { "XObject" => dictionary! { "Im0" => image_id } },
        });
        kids.push(page_id.into());
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}
