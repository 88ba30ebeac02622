//! PDF rasterization for the recognition engine.
//!
//! Only page 1 of a document is ever rendered, always at `RENDER_SCALE` times the
//! page's native size in points.

use crate::error::DocError;
use image::{imageops::FilterType, DynamicImage, RgbImage};
use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::sync::Arc;

/// Upscaling factor relative to the PDF page size (1 point -> 2 pixels).
pub const RENDER_SCALE: f32 = 2.0;

/// Refuse to allocate canvases larger than this on either side.
const MAX_CANVAS_SIDE: u32 = 12_000;

/// US Letter, used when a page has no usable MediaBox.
const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// How deep Form XObjects may nest before we stop following them.
const MAX_FORM_DEPTH: usize = 4;

pub trait Rasterizer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Render page index 0 of `pdf` into an image.
    ///
    /// Fails with `RasterizationError` if the bytes cannot be parsed or the
    /// document has no pages.
    fn rasterize_first_page(&self, pdf: &[u8]) -> Result<DynamicImage, DocError>;
}

/// Best available rasterizer for this build.
pub fn default_rasterizer() -> Arc<dyn Rasterizer> {
    #[cfg(feature = "rasterizer-pdfium")]
    {
        Arc::new(pdfium::PdfiumRasterizer)
    }

    #[cfg(not(feature = "rasterizer-pdfium"))]
    {
        Arc::new(LopdfRasterizer)
    }
}

/// Pure Rust rasterizer for scanned documents.
///
/// Paints the image XObjects of page 1 onto a white canvas at their placement
/// boxes. Vector text and paths are not drawn, so a born-digital PDF renders as
/// a blank page; build with `rasterizer-pdfium` for full rendering.
pub struct LopdfRasterizer;

impl Rasterizer for LopdfRasterizer {
    fn name(&self) -> &'static str {
        "lopdf"
    }

    fn rasterize_first_page(&self, pdf: &[u8]) -> Result<DynamicImage, DocError> {
        let doc = Document::load_mem(pdf)
            .map_err(|e| DocError::RasterizationError(format!("Failed to parse PDF: {}", e)))?;

        let pages = doc.get_pages();
        let page_count = pages.len();
        let page_id = *pages
            .values()
            .next()
            .ok_or_else(|| DocError::RasterizationError("document has no pages".to_string()))?;

        let media_box = media_box(&doc, page_id);
        let page_width = (media_box[2] - media_box[0]).abs();
        let page_height = (media_box[3] - media_box[1]).abs();
        let width = (page_width * RENDER_SCALE).round() as u32;
        let height = (page_height * RENDER_SCALE).round() as u32;

        if width == 0 || height == 0 || width > MAX_CANVAS_SIDE || height > MAX_CANVAS_SIDE {
            return Err(DocError::RasterizationError(format!(
                "unsupported page size {}x{} points",
                page_width, page_height
            )));
        }

        tracing::debug!(
            "Rasterizing page 1 of {}: {}x{} points -> {}x{} pixels",
            page_count,
            page_width,
            page_height,
            width,
            height
        );

        let content = doc.get_page_content(page_id).map_err(|e| {
            DocError::RasterizationError(format!("Failed to read page content: {}", e))
        })?;

        let mut painter = Painter {
            doc: &doc,
            canvas: RgbImage::from_pixel(width, height, image::Rgb([255, 255, 255])),
            origin: (media_box[0].min(media_box[2]), media_box[1].max(media_box[3])),
            painted: 0,
        };
        painter.run(&content, page_resources(&doc, page_id), IDENTITY, 0)?;

        // a blank canvas would be read as a confident NOT FOUND
        if painter.painted == 0 {
            tracing::warn!("Page 1 has no raster images; vector pages need rasterizer-pdfium");
            return Err(DocError::RasterizationError(
                "page 1 has no renderable raster content".to_string(),
            ));
        }

        Ok(DynamicImage::ImageRgb8(painter.canvas))
    }
}

// ============================================================================
// Content stream walking
// ============================================================================

type Matrix = [f32; 6];

const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// `m` applied first, then `n`
fn concat(m: &Matrix, n: &Matrix) -> Matrix {
    [
        m[0] * n[0] + m[1] * n[2],
        m[0] * n[1] + m[1] * n[3],
        m[2] * n[0] + m[3] * n[2],
        m[2] * n[1] + m[3] * n[3],
        m[4] * n[0] + m[5] * n[2] + n[4],
        m[4] * n[1] + m[5] * n[3] + n[5],
    ]
}

fn apply(m: &Matrix, x: f32, y: f32) -> (f32, f32) {
    (m[0] * x + m[2] * y + m[4], m[1] * x + m[3] * y + m[5])
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

fn matrix_from(operands: &[Object]) -> Option<Matrix> {
    if operands.len() != 6 {
        return None;
    }
    let mut m = IDENTITY;
    for (slot, obj) in m.iter_mut().zip(operands) {
        *slot = number(obj)?;
    }
    Some(m)
}

struct Painter<'a> {
    doc: &'a Document,
    canvas: RgbImage,
    /// Top-left corner of the MediaBox in user space
    origin: (f32, f32),
    painted: usize,
}

impl<'a> Painter<'a> {
    fn run(
        &mut self,
        content: &[u8],
        resources: Option<&'a Dictionary>,
        base: Matrix,
        depth: usize,
    ) -> Result<(), DocError> {
        let content = Content::decode(content).map_err(|e| {
            DocError::RasterizationError(format!("Failed to decode content stream: {}", e))
        })?;

        let mut ctm = base;
        let mut saved: Vec<Matrix> = Vec::new();

        for op in &content.operations {
            match op.operator.as_str() {
                "q" => saved.push(ctm),
                "Q" => ctm = saved.pop().unwrap_or(base),
                "cm" => {
                    if let Some(m) = matrix_from(&op.operands) {
                        ctm = concat(&m, &ctm);
                    }
                }
                "Do" => {
                    let Some(name) = op.operands.first().and_then(|o| o.as_name().ok()) else {
                        continue;
                    };
                    let Some(stream) = resources.and_then(|r| self.xobject(r, name)) else {
                        tracing::debug!(
                            "XObject {} not found in resources",
                            String::from_utf8_lossy(name)
                        );
                        continue;
                    };
                    self.draw_xobject(stream, resources, &ctm, depth)?;
                }
                _ => {}
            }
        }

        Ok(())
    }

    fn xobject(&self, resources: &'a Dictionary, name: &[u8]) -> Option<&'a Stream> {
        let xobjects = resolve(self.doc, resources.get(b"XObject").ok()?)?
            .as_dict()
            .ok()?;
        resolve(self.doc, xobjects.get(name).ok()?)?.as_stream().ok()
    }

    fn draw_xobject(
        &mut self,
        stream: &'a Stream,
        resources: Option<&'a Dictionary>,
        ctm: &Matrix,
        depth: usize,
    ) -> Result<(), DocError> {
        let subtype = stream
            .dict
            .get(b"Subtype")
            .ok()
            .and_then(|s| s.as_name().ok())
            .unwrap_or_default();

        match subtype {
            b"Image" => {
                match decode_image(self.doc, stream) {
                    Ok(img) => self.paint(&img, ctm),
                    Err(e) => tracing::warn!("Skipping undecodable page image: {}", e),
                }
                Ok(())
            }
            b"Form" if depth < MAX_FORM_DEPTH => {
                let matrix = stream
                    .dict
                    .get(b"Matrix")
                    .ok()
                    .and_then(|m| m.as_array().ok())
                    .and_then(|a| matrix_from(a))
                    .unwrap_or(IDENTITY);
                let form_resources = stream
                    .dict
                    .get(b"Resources")
                    .ok()
                    .and_then(|r| resolve(self.doc, r))
                    .and_then(|r| r.as_dict().ok())
                    .or(resources);
                let content = stream
                    .decompressed_content()
                    .unwrap_or_else(|_| stream.content.clone());
                self.run(&content, form_resources, concat(&matrix, ctm), depth + 1)
            }
            _ => Ok(()),
        }
    }

    /// Draw `img` into the device box of the unit square under `ctm`.
    fn paint(&mut self, img: &DynamicImage, ctm: &Matrix) {
        let corners = [
            apply(ctm, 0.0, 0.0),
            apply(ctm, 1.0, 0.0),
            apply(ctm, 0.0, 1.0),
            apply(ctm, 1.0, 1.0),
        ];
        let min_x = corners.iter().map(|c| c.0).fold(f32::INFINITY, f32::min);
        let max_x = corners.iter().map(|c| c.0).fold(f32::NEG_INFINITY, f32::max);
        let min_y = corners.iter().map(|c| c.1).fold(f32::INFINITY, f32::min);
        let max_y = corners.iter().map(|c| c.1).fold(f32::NEG_INFINITY, f32::max);

        let left = ((min_x - self.origin.0) * RENDER_SCALE).round();
        let top = ((self.origin.1 - max_y) * RENDER_SCALE).round();
        let width = ((max_x - min_x) * RENDER_SCALE).round();
        let height = ((max_y - min_y) * RENDER_SCALE).round();

        if width < 1.0
            || height < 1.0
            || width > MAX_CANVAS_SIDE as f32
            || height > MAX_CANVAS_SIDE as f32
        {
            return;
        }

        let mut placed = img.resize_exact(width as u32, height as u32, FilterType::Triangle);
        // mirrored placements
        if ctm[0] < 0.0 {
            placed = placed.fliph();
        }
        if ctm[3] < 0.0 {
            placed = placed.flipv();
        }

        image::imageops::overlay(&mut self.canvas, &placed.to_rgb8(), left as i64, top as i64);
        self.painted += 1;
    }
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

/// Look up an inheritable page attribute, walking up the page tree.
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = doc.get_dictionary(page_id).ok();
    // bounded to guard against cyclic Parent links
    for _ in 0..32 {
        let dict = current?;
        if let Ok(value) = dict.get(key) {
            return resolve(doc, value);
        }
        current = dict
            .get(b"Parent")
            .ok()
            .and_then(|p| p.as_reference().ok())
            .and_then(|id| doc.get_dictionary(id).ok());
    }
    None
}

fn media_box(doc: &Document, page_id: ObjectId) -> [f32; 4] {
    let values: Option<Vec<f32>> = inherited(doc, page_id, b"MediaBox")
        .and_then(|o| o.as_array().ok())
        .and_then(|a| a.iter().map(|o| resolve(doc, o).and_then(number)).collect());

    match values.as_deref() {
        Some([x0, y0, x1, y1]) => [*x0, *y0, *x1, *y1],
        _ => DEFAULT_MEDIA_BOX,
    }
}

fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    inherited(doc, page_id, b"Resources").and_then(|r| r.as_dict().ok())
}

// ============================================================================
// Image XObject decoding
// ============================================================================

fn filters(stream: &Stream) -> Vec<Vec<u8>> {
    match stream.dict.get(b"Filter") {
        Ok(Object::Name(name)) => vec![name.clone()],
        Ok(Object::Array(items)) => items
            .iter()
            .filter_map(|o| o.as_name().ok().map(|n| n.to_vec()))
            .collect(),
        _ => Vec::new(),
    }
}

fn dimension(stream: &Stream, key: &[u8]) -> Result<u32, DocError> {
    stream
        .dict
        .get(key)
        .ok()
        .and_then(|v| v.as_i64().ok())
        .filter(|v| *v > 0 && *v <= MAX_CANVAS_SIDE as i64 * 4)
        .map(|v| v as u32)
        .ok_or_else(|| {
            DocError::RasterizationError(format!(
                "missing or invalid image {}",
                String::from_utf8_lossy(key)
            ))
        })
}

fn decode_image(doc: &Document, stream: &Stream) -> Result<DynamicImage, DocError> {
    let filters = filters(stream);

    // JPEG data is embedded as-is
    if filters.len() == 1 && filters[0] == b"DCTDecode" {
        return image::load_from_memory_with_format(&stream.content, image::ImageFormat::Jpeg)
            .map_err(|e| DocError::RasterizationError(format!("Invalid JPEG image: {}", e)));
    }

    let width = dimension(stream, b"Width")?;
    let height = dimension(stream, b"Height")?;
    let bits_per_component = stream
        .dict
        .get(b"BitsPerComponent")
        .ok()
        .and_then(|b| b.as_i64().ok())
        .unwrap_or(8);

    let data = if filters.is_empty() {
        stream.content.clone()
    } else {
        stream.decompressed_content().map_err(|e| {
            DocError::RasterizationError(format!("Failed to decompress image: {}", e))
        })?
    };

    let pixels = (width as usize) * (height as usize);
    let color_space = color_space(doc, stream);

    match (color_space.as_str(), bits_per_component) {
        ("DeviceGray" | "CalGray", 8) => gray(width, height, data),
        ("DeviceGray" | "CalGray", 1) => Ok(unpack_bilevel(width, height, &data)),
        ("ICCBased", 8) if data.len() < pixels * 3 => gray(width, height, data),
        ("DeviceRGB" | "CalRGB" | "ICCBased", 8) => {
            if data.len() < pixels * 3 {
                return Err(short_data("RGB", data.len(), pixels * 3));
            }
            RgbImage::from_raw(width, height, data[..pixels * 3].to_vec())
                .map(DynamicImage::ImageRgb8)
                .ok_or_else(|| DocError::RasterizationError("Invalid RGB image data".to_string()))
        }
        ("DeviceCMYK", 8) => {
            if data.len() < pixels * 4 {
                return Err(short_data("CMYK", data.len(), pixels * 4));
            }
            let rgb = data[..pixels * 4]
                .chunks_exact(4)
                .flat_map(|px| {
                    let k = 1.0 - px[3] as f32 / 255.0;
                    [0, 1, 2].map(|i| ((1.0 - px[i] as f32 / 255.0) * k * 255.0) as u8)
                })
                .collect();
            RgbImage::from_raw(width, height, rgb)
                .map(DynamicImage::ImageRgb8)
                .ok_or_else(|| DocError::RasterizationError("Invalid CMYK image data".to_string()))
        }
        (other, bits) => Err(DocError::RasterizationError(format!(
            "Unsupported image format: {} at {} bits",
            other, bits
        ))),
    }
}

fn short_data(kind: &str, len: usize, expected: usize) -> DocError {
    DocError::RasterizationError(format!(
        "Truncated {} image data: {} bytes, expected {}",
        kind, len, expected
    ))
}

fn gray(width: u32, height: u32, data: Vec<u8>) -> Result<DynamicImage, DocError> {
    let pixels = (width as usize) * (height as usize);
    if data.len() < pixels {
        return Err(short_data("grayscale", data.len(), pixels));
    }
    image::GrayImage::from_raw(width, height, data[..pixels].to_vec())
        .map(DynamicImage::ImageLuma8)
        .ok_or_else(|| DocError::RasterizationError("Invalid grayscale image data".to_string()))
}

/// 1 bit per pixel, rows padded to a byte, 0 = black.
fn unpack_bilevel(width: u32, height: u32, data: &[u8]) -> DynamicImage {
    let row_bytes = (width as usize).div_ceil(8);
    let img = image::GrayImage::from_fn(width, height, |x, y| {
        let byte = data
            .get(y as usize * row_bytes + x as usize / 8)
            .copied()
            .unwrap_or(0xff);
        let bit = (byte >> (7 - (x % 8))) & 1;
        image::Luma([if bit == 1 { 255 } else { 0 }])
    });
    DynamicImage::ImageLuma8(img)
}

/// Color space name, resolving indirect references and `[/ICCBased ref]` arrays
fn color_space(doc: &Document, stream: &Stream) -> String {
    let Some(obj) = stream
        .dict
        .get(b"ColorSpace")
        .ok()
        .and_then(|o| resolve(doc, o))
    else {
        return "DeviceRGB".to_string();
    };

    let name = obj.as_name().ok().or_else(|| {
        obj.as_array()
            .ok()
            .and_then(|a| a.first())
            .and_then(|first| first.as_name().ok())
    });

    name.map(|n| String::from_utf8_lossy(n).to_string())
        .unwrap_or_else(|| "DeviceRGB".to_string())
}

// ============================================================================
// pdfium backend
// ============================================================================

#[cfg(feature = "rasterizer-pdfium")]
mod pdfium {
    use super::{Rasterizer, RENDER_SCALE};
    use crate::error::DocError;
    use image::DynamicImage;
    use pdfium_render::prelude::*;

    /// Full renderer backed by the system pdfium library.
    ///
    /// The library is bound per call since pdfium handles are not `Send`.
    pub struct PdfiumRasterizer;

    impl Rasterizer for PdfiumRasterizer {
        fn name(&self) -> &'static str {
            "pdfium"
        }

        fn rasterize_first_page(&self, pdf: &[u8]) -> Result<DynamicImage, DocError> {
            let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                .or_else(|_| Pdfium::bind_to_system_library())
                .map_err(|e| {
                    DocError::RasterizationError(format!("Failed to bind pdfium library: {}", e))
                })?;
            let pdfium = Pdfium::new(bindings);

            let document = pdfium.load_pdf_from_byte_slice(pdf, None).map_err(|e| {
                DocError::RasterizationError(format!("Failed to parse PDF: {}", e))
            })?;

            let pages = document.pages();
            if pages.len() == 0 {
                return Err(DocError::RasterizationError(
                    "document has no pages".to_string(),
                ));
            }

            let page = pages.get(0).map_err(|e| {
                DocError::RasterizationError(format!("Failed to open page 1: {}", e))
            })?;

            let bitmap = page
                .render_with_config(
                    &PdfRenderConfig::new()
                        .scale_page_by_factor(RENDER_SCALE)
                        .render_form_data(true),
                )
                .map_err(|e| {
                    DocError::RasterizationError(format!("Failed to render page 1: {}", e))
                })?;

            Ok(bitmap.as_image())
        }
    }
}
