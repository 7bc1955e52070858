//! PDF assembly: lay the generated outline onto a single A4 page.
//!
//! The page is built directly with `lopdf`:
//!
//! ```text
//! ┌──────────── 595.28 pt ────────────┐
//! │            margin 40              │
//! │   ┌───────────────────────────┐   │
//! │   │                           │   │
//! │   │   outline image, scaled   │   │  841.89 pt
//! │   │   to fit, never enlarged  │   │
//! │   │                           │   │
//! │   └───────────────────────────┘   │
//! │  Generated by AI Coloring Page ...│  caption band 70
//! └───────────────────────────────────┘
//! ```
//!
//! Pixels map to points 1:1 before scaling, so a 1024 px outline is shrunk to
//! the 515 pt content width and a 300 px one is drawn at 300 pt.
//!
//! ## Why spawn_blocking?
//!
//! Decoding a 1024² PNG and deflating 3 MiB of RGB takes tens of
//! milliseconds of pure CPU; [`render_pdf`] moves it off the Tokio workers.

use crate::error::ColoringError;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::{DynamicImage, RgbImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// A4 portrait, in points.
pub const A4_WIDTH_PT: f32 = 595.28;
pub const A4_HEIGHT_PT: f32 = 841.89;

pub const MARGIN_PT: f32 = 40.0;
pub const CAPTION_BAND_PT: f32 = 70.0;
pub const CAPTION_FONT_SIZE: f32 = 10.0;
pub const CAPTION_GRAY: f32 = 0.5;

pub const CAPTION: &str = "Generated by AI Coloring Page Generator";
pub const TITLE: &str = "AI Generated Coloring Page";

const PRODUCER: &str = concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"));

/// Helvetica cap height, per mille of the font size.
const HELVETICA_CAP_HEIGHT: f32 = 718.0;

// ── Layout ───────────────────────────────────────────────────────────────

/// Page geometry. PDF user space: origin bottom-left, y grows upward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageLayout {
    pub page_width: f32,
    pub page_height: f32,
    pub margin: f32,
    pub caption_band: f32,
}

impl Default for PageLayout {
    fn default() -> Self {
        Self {
            page_width: A4_WIDTH_PT,
            page_height: A4_HEIGHT_PT,
            margin: MARGIN_PT,
            caption_band: CAPTION_BAND_PT,
        }
    }
}

/// Where an image lands on the page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub scale: f32,
}

impl PageLayout {
    pub fn content_width(&self) -> f32 {
        self.page_width - 2.0 * self.margin
    }

    pub fn content_height(&self) -> f32 {
        self.page_height - self.margin - self.caption_band
    }

    /// Fit a `width_px × height_px` image into the content area.
    ///
    /// Aspect ratio is kept, the image is never enlarged, it is centered
    /// horizontally and its top edge sits on the top margin.
    pub fn fit(&self, width_px: u32, height_px: u32) -> Placement {
        let w = width_px.max(1) as f32;
        let h = height_px.max(1) as f32;
        let scale = (self.content_width() / w)
            .min(self.content_height() / h)
            .min(1.0);
        let width = w * scale;
        let height = h * scale;
        Placement {
            x: (self.page_width - width) / 2.0,
            y: self.page_height - self.margin - height,
            width,
            height,
            scale,
        }
    }

    /// Baseline origin for `text` set in Helvetica at `font_size`, centered
    /// in the caption band.
    pub fn caption_origin(&self, text: &str, font_size: f32) -> (f32, f32) {
        let text_width = helvetica_text_width(text, font_size);
        let cap_height = HELVETICA_CAP_HEIGHT / 1000.0 * font_size;
        (
            (self.page_width - text_width) / 2.0,
            (self.caption_band - cap_height) / 2.0,
        )
    }
}

/// Helvetica advance widths for ASCII 32..=126 (WinAnsi), per mille.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // '0'..'?'
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // '@'..'O'
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 'P'..'_'
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // '`'..'o'
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 'p'..'~'
];

/// Width of `text` in points when set in Helvetica.
pub fn helvetica_text_width(text: &str, font_size: f32) -> f32 {
    let units: u32 = text
        .chars()
        .map(|c| match c as u32 {
            code @ 32..=126 => HELVETICA_WIDTHS[(code - 32) as usize] as u32,
            _ => 556,
        })
        .sum();
    units as f32 / 1000.0 * font_size
}

// ── Image preparation ────────────────────────────────────────────────────

/// Composite any alpha channel onto opaque white.
///
/// Fully transparent pixels must print as paper, not black.
pub fn flatten_onto_white(img: &DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }
    let rgba = img.to_rgba8();
    let (w, h) = rgba.dimensions();
    RgbImage::from_fn(w, h, |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let a = a as u32;
        let blend = |c: u8| ((c as u32 * a + 255 * (255 - a) + 127) / 255) as u8;
        image::Rgb([blend(r), blend(g), blend(b)])
    })
}

fn deflate(raw: &[u8]) -> Result<Vec<u8>, ColoringError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(raw)
        .and_then(|_| encoder.finish())
        .map_err(|e| ColoringError::PdfBuild(format!("image compression failed: {e}")))
}

// ── Document assembly ────────────────────────────────────────────────────

/// Build the one-page PDF in memory.
pub fn build_document(img: &DynamicImage, layout: &PageLayout) -> Result<Vec<u8>, ColoringError> {
    let rgb = flatten_onto_white(img);
    let (width_px, height_px) = rgb.dimensions();
    if width_px == 0 || height_px == 0 {
        return Err(ColoringError::PdfBuild("image has no pixels".into()));
    }
    let placement = layout.fit(width_px, height_px);
    debug!(
        "Placing {}x{} px image at ({:.1}, {:.1}) size {:.1}x{:.1} pt (scale {:.3})",
        width_px, height_px, placement.x, placement.y, placement.width, placement.height, placement.scale
    );

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });

    let mut image_stream = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => Object::Integer(width_px as i64),
            "Height" => Object::Integer(height_px as i64),
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => Object::Integer(8),
            "Filter" => "FlateDecode",
        },
        deflate(rgb.as_raw())?,
    );
    image_stream.allows_compression = false;
    let image_id = doc.add_object(image_stream);

    let (caption_x, caption_y) = layout.caption_origin(CAPTION, CAPTION_FONT_SIZE);
    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    Object::Real(placement.width),
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Real(placement.height),
                    Object::Real(placement.x),
                    Object::Real(placement.y),
                ],
            ),
            Operation::new("Do", vec![Object::Name(b"Im1".to_vec())]),
            Operation::new("Q", vec![]),
            Operation::new("BT", vec![]),
            Operation::new(
                "rg",
                vec![
                    Object::Real(CAPTION_GRAY),
                    Object::Real(CAPTION_GRAY),
                    Object::Real(CAPTION_GRAY),
                ],
            ),
            Operation::new(
                "Tf",
                vec![Object::Name(b"F1".to_vec()), Object::Real(CAPTION_FONT_SIZE)],
            ),
            Operation::new("Td", vec![Object::Real(caption_x), Object::Real(caption_y)]),
            Operation::new("Tj", vec![Object::string_literal(CAPTION)]),
            Operation::new("ET", vec![]),
        ],
    };
    let content_bytes = content
        .encode()
        .map_err(|e| ColoringError::PdfBuild(format!("content stream: {e}")))?;
    let content_id = doc.add_object(Stream::new(dictionary! {}, content_bytes));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Real(layout.page_width),
            Object::Real(layout.page_height),
        ],
        "Contents" => content_id,
        "Resources" => dictionary! {
            "Font" => dictionary! { "F1" => font_id },
            "XObject" => dictionary! { "Im1" => image_id },
        },
    });

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => Object::Integer(1),
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::string_literal(TITLE),
        "Producer" => Object::string_literal(PRODUCER),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf)
        .map_err(|e| ColoringError::PdfBuild(format!("serialisation failed: {e}")))?;
    Ok(buf)
}

/// Decode `image_bytes`, build the page and write it to `dest`.
///
/// Runs on the blocking pool. `dest` only ever appears fully written.
pub async fn render_pdf(image_bytes: Vec<u8>, dest: PathBuf) -> Result<PathBuf, ColoringError> {
    tokio::task::spawn_blocking(move || -> Result<PathBuf, ColoringError> {
        let img = image::load_from_memory(&image_bytes)?;
        let pdf = build_document(&img, &PageLayout::default())?;
        write_atomically(&dest, &pdf)?;
        info!("PDF written: {} ({} bytes)", dest.display(), pdf.len());
        Ok(dest)
    })
    .await
    .map_err(|e| ColoringError::Internal(format!("Render task panicked: {}", e)))?
}

/// Write through a sibling temp file, then rename onto `dest`.
///
/// Fails if `dest` already exists.
fn write_atomically(dest: &Path, bytes: &[u8]) -> Result<(), ColoringError> {
    let dir = dest.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| ColoringError::io(dir, e))?;
    tmp.write_all(bytes).map_err(|e| ColoringError::io(tmp.path(), e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| ColoringError::io(tmp.path(), e))?;
    tmp.persist_noclobber(dest)
        .map_err(|e| ColoringError::io(dest, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;
    use tempfile::TempDir;

    fn num(o: &Object) -> f32 {
        match o {
            Object::Integer(i) => *i as f32,
            Object::Real(r) => *r,
            other => panic!("not a number: {other:?}"),
        }
    }

    fn png_bytes(img: &DynamicImage) -> Vec<u8> {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
        buf
    }

    /// Parse a built PDF and return (media box, `cm` operands, image dict).
    fn inspect(pdf: &[u8]) -> (Vec<f32>, Vec<f32>, lopdf::Dictionary) {
        let doc = Document::load_mem(pdf).unwrap();
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 1, "expected a single page");
        let page_id = *pages.values().next().unwrap();

        let page = doc.get_object(page_id).unwrap().as_dict().unwrap();
        let media_box: Vec<f32> = page
            .get(b"MediaBox")
            .unwrap()
            .as_array()
            .unwrap()
            .iter()
            .map(num)
            .collect();

        let content = Content::decode(&doc.get_page_content(page_id).unwrap()).unwrap();
        let cm: Vec<f32> = content
            .operations
            .iter()
            .find(|op| op.operator == "cm")
            .unwrap()
            .operands
            .iter()
            .map(num)
            .collect();

        let resources = page.get(b"Resources").unwrap().as_dict().unwrap();
        let xobjects = resources.get(b"XObject").unwrap().as_dict().unwrap();
        let image_ref = xobjects.get(b"Im1").unwrap().as_reference().unwrap();
        let image = doc.get_object(image_ref).unwrap().as_stream().unwrap();

        (media_box, cm, image.dict.clone())
    }

    #[test]
    fn default_layout_is_a4_with_margins() {
        let l = PageLayout::default();
        assert!((l.content_width() - 515.28).abs() < 0.01);
        assert!((l.content_height() - 731.89).abs() < 0.01);
    }

    #[test]
    fn fit_downscales_square_to_content_width() {
        let l = PageLayout::default();
        let p = l.fit(1024, 1024);
        assert!((p.width - l.content_width()).abs() < 0.01);
        assert!((p.width - p.height).abs() < 0.01);
        assert!((p.x - MARGIN_PT).abs() < 0.01);
        assert!((p.y + p.height - (A4_HEIGHT_PT - MARGIN_PT)).abs() < 0.01);
    }

    #[test]
    fn fit_never_upscales() {
        let p = PageLayout::default().fit(300, 200);
        assert_eq!(p.scale, 1.0);
        assert_eq!((p.width, p.height), (300.0, 200.0));
        assert!((p.x - (A4_WIDTH_PT - 300.0) / 2.0).abs() < 0.01);
    }

    #[test]
    fn fit_tall_image_is_height_bound() {
        let l = PageLayout::default();
        let p = l.fit(500, 2000);
        assert!((p.height - l.content_height()).abs() < 0.01);
        assert!((p.width / p.height - 0.25).abs() < 0.001);
        assert!(p.y >= l.caption_band - 0.01);
    }

    #[test]
    fn caption_is_centered_inside_band() {
        let l = PageLayout::default();
        let (x, y) = l.caption_origin(CAPTION, CAPTION_FONT_SIZE);
        let w = helvetica_text_width(CAPTION, CAPTION_FONT_SIZE);
        assert!(((x + w / 2.0) - A4_WIDTH_PT / 2.0).abs() < 0.01);
        assert!(y > 0.0 && y + CAPTION_FONT_SIZE < CAPTION_BAND_PT);
    }

    #[test]
    fn helvetica_widths_match_afm() {
        // "Hi" = H(722) + i(222)
        assert!((helvetica_text_width("Hi", 1000.0) - 944.0).abs() < 0.01);
        assert_eq!(HELVETICA_WIDTHS[('~' as usize) - 32], 584);
    }

    #[test]
    fn transparent_pixels_become_white() {
        let mut img = RgbaImage::from_pixel(2, 1, Rgba([0, 0, 0, 0]));
        img.put_pixel(1, 0, Rgba([0, 0, 0, 255]));
        let flat = flatten_onto_white(&DynamicImage::ImageRgba8(img));
        assert_eq!(flat.get_pixel(0, 0).0, [255, 255, 255]);
        assert_eq!(flat.get_pixel(1, 0).0, [0, 0, 0]);
    }

    #[test]
    fn built_document_is_single_a4_page_within_bounds() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(1024, 1024, image::Rgb([255; 3])));
        let pdf = build_document(&img, &PageLayout::default()).unwrap();
        assert!(pdf.starts_with(b"%PDF-"));

        let (media_box, cm, image) = inspect(&pdf);
        assert!((media_box[2] - A4_WIDTH_PT).abs() < 0.01);
        assert!((media_box[3] - A4_HEIGHT_PT).abs() < 0.01);

        let (w, h, x, y) = (cm[0], cm[3], cm[4], cm[5]);
        assert!(x >= MARGIN_PT - 0.01 && x + w <= A4_WIDTH_PT - MARGIN_PT + 0.01);
        assert!(y >= CAPTION_BAND_PT - 0.01 && y + h <= A4_HEIGHT_PT - MARGIN_PT + 0.01);
        assert!((w / h - 1.0).abs() < 0.001);

        assert_eq!(num(image.get(b"Width").unwrap()), 1024.0);
        assert!(matches!(image.get(b"Filter").unwrap(), Object::Name(n) if n == b"FlateDecode"));
    }

    #[test]
    fn built_document_carries_title() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(10, 10));
        let pdf = build_document(&img, &PageLayout::default()).unwrap();
        let doc = Document::load_mem(&pdf).unwrap();
        let info_ref = doc.trailer.get(b"Info").unwrap().as_reference().unwrap();
        let info = doc.get_object(info_ref).unwrap().as_dict().unwrap();
        match info.get(b"Title").unwrap() {
            Object::String(bytes, _) => assert_eq!(bytes.as_slice(), TITLE.as_bytes()),
            other => panic!("title is not a string: {other:?}"),
        }
    }

    #[tokio::test]
    async fn render_pdf_writes_file() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("page.pdf");
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(64, 32, Rgba([0, 0, 0, 128])));

        let out = render_pdf(png_bytes(&img), dest.clone()).await.unwrap();
        assert_eq!(out, dest);
        let bytes = std::fs::read(&dest).unwrap();
        let (_, cm, _) = inspect(&bytes);
        assert_eq!((cm[0], cm[3]), (64.0, 32.0));

        let leftovers: Vec<_> = std::fs::read_dir(tmp.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1, "temp file left behind");
    }

    #[tokio::test]
    async fn undecodable_bytes_leave_no_file() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("page.pdf");

        let err = render_pdf(b"not an image".to_vec(), dest.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, ColoringError::ImageDecode(_)), "got {err:?}");
        assert!(!dest.exists());
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn render_refuses_to_overwrite() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("page.pdf");
        std::fs::write(&dest, b"existing").unwrap();
        let img = DynamicImage::ImageRgb8(RgbImage::new(8, 8));

        let err = render_pdf(png_bytes(&img), dest.clone()).await.unwrap_err();
        assert!(matches!(err, ColoringError::Io { .. }), "got {err:?}");
        assert_eq!(std::fs::read(&dest).unwrap(), b"existing");
    }
}
