//! Post-render annotation: watermark every image, blur the ones past the
//! free-preview allowance.
//!
//! Blur is applied before the watermark so the mark itself stays legible on
//! obscured pages. The watermark is a grid of translucent grey marks, one
//! centred in each grid cell: a caller-supplied stamp PNG (alpha scaled to
//! the configured opacity), the configured text, or a plain band when
//! neither a stamp nor a usable font is available.

use crate::config::WatermarkConfig;
use crate::error::SheetError;
use ab_glyph::{FontArc, PxScale};
use image::{imageops, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut, text_size, Blend};
use imageproc::filter::gaussian_blur_f32;
use imageproc::rect::Rect;
use std::fmt;
use std::path::Path;
use tracing::{debug, warn};

const MARK_COLOR: [u8; 3] = [150, 150, 150];

/// Text height as a fraction of the image width.
const TEXT_SIZE_DIVISOR: u32 = 25;

/// Rewrites a rendered image in place.
pub trait ImageAnnotator: Send + Sync {
    /// Watermark `image`; blur it first when `obscure` is set.
    fn annotate(&self, image: &Path, obscure: bool) -> Result<(), SheetError>;
}

#[derive(Clone)]
enum Mark {
    Stamp(RgbaImage),
    Text { text: String, font: FontArc },
    Band,
}

impl fmt::Debug for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mark::Stamp(img) => write!(f, "Stamp({}x{})", img.width(), img.height()),
            Mark::Text { text, .. } => write!(f, "Text({text:?})"),
            Mark::Band => f.write_str("Band"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WatermarkAnnotator {
    config: WatermarkConfig,
    mark: Mark,
}

impl WatermarkAnnotator {
    /// Load the stamp image or font once, up front.
    ///
    /// A missing stamp is an error. A missing or unreadable font only
    /// downgrades the text to bands.
    pub fn new(config: WatermarkConfig) -> Result<Self, SheetError> {
        let mark = match (&config.stamp_image, &config.font_path) {
            (Some(path), _) => {
                let mut img = image::open(path)
                    .map_err(|e| SheetError::AnnotateFailed {
                        path: path.clone(),
                        detail: format!("watermark image: {e}"),
                    })?
                    .to_rgba8();
                scale_alpha(&mut img, config.opacity);
                Mark::Stamp(img)
            }
            (None, Some(font_path)) if !config.text.trim().is_empty() => {
                match load_font(font_path) {
                    Ok(font) => Mark::Text {
                        text: config.text.clone(),
                        font,
                    },
                    Err(detail) => {
                        warn!(
                            "Watermark font {} unusable ({}); drawing bands instead",
                            font_path.display(),
                            detail
                        );
                        Mark::Band
                    }
                }
            }
            _ => Mark::Band,
        };
        debug!(mark = ?mark, "Watermark ready");
        Ok(Self { config, mark })
    }

    /// Apply blur and watermark to an in-memory image.
    pub fn apply(&self, image: RgbaImage, obscure: bool) -> RgbaImage {
        let mut image = if obscure && self.config.blur_radius > 0.0 {
            gaussian_blur_f32(&image, self.config.blur_radius)
        } else {
            image
        };

        let (w, h) = image.dimensions();
        let cols = self.config.grid_cols.max(1);
        let rows = self.config.grid_rows.max(1);
        let cell_w = w / cols;
        let cell_h = h / rows;
        if cell_w == 0 || cell_h == 0 {
            return image;
        }

        let centres: Vec<(u32, u32)> = (0..rows)
            .flat_map(|row| {
                (0..cols).map(move |col| (col * cell_w + cell_w / 2, row * cell_h + cell_h / 2))
            })
            .collect();

        match &self.mark {
            Mark::Stamp(stamp) => {
                for (cx, cy) in centres {
                    let x = cx as i64 - stamp.width() as i64 / 2;
                    let y = cy as i64 - stamp.height() as i64 / 2;
                    imageops::overlay(&mut image, stamp, x, y);
                }
                image
            }
            Mark::Text { text, font } => {
                self.draw_text(&mut image, &centres, text, font);
                image
            }
            Mark::Band => centres
                .into_iter()
                .fold(image, |img, (cx, cy)| self.draw_band(img, cx, cy, cell_w, cell_h)),
        }
    }

    /// Draw every copy of the text on a transparent layer, then composite
    /// it once so overlapping glyph edges never stack their alpha.
    fn draw_text(&self, image: &mut RgbaImage, centres: &[(u32, u32)], text: &str, font: &FontArc) {
        let (w, h) = image.dimensions();
        let scale = PxScale::from((w / TEXT_SIZE_DIVISOR).max(1) as f32);
        let (text_w, text_h) = text_size(scale, font, text);
        let [r, g, b] = MARK_COLOR;

        let mut layer = RgbaImage::from_pixel(w, h, Rgba([r, g, b, 0]));
        for &(cx, cy) in centres {
            let x = cx as i32 - text_w as i32 / 2;
            let y = cy as i32 - text_h as i32 / 2;
            draw_text_mut(&mut layer, Rgba([r, g, b, self.config.opacity]), x, y, scale, font, text);
        }
        imageops::overlay(image, &layer, 0, 0);
    }

    fn draw_band(&self, image: RgbaImage, cx: u32, cy: u32, cell_w: u32, cell_h: u32) -> RgbaImage {
        let band_w = (cell_w * 3 / 5).max(1);
        let band_h = (cell_h / 6).max(1);
        let rect = Rect::at((cx - band_w / 2) as i32, (cy - band_h / 2) as i32).of_size(band_w, band_h);
        let [r, g, b] = MARK_COLOR;
        let mut canvas = Blend(image);
        draw_filled_rect_mut(&mut canvas, rect, Rgba([r, g, b, self.config.opacity]));
        canvas.0
    }
}

fn load_font(path: &Path) -> Result<FontArc, String> {
    let bytes = std::fs::read(path).map_err(|e| e.to_string())?;
    FontArc::try_from_vec(bytes).map_err(|e| e.to_string())
}

impl ImageAnnotator for WatermarkAnnotator {
    fn annotate(&self, image: &Path, obscure: bool) -> Result<(), SheetError> {
        let failed = |detail: String| SheetError::AnnotateFailed {
            path: image.to_path_buf(),
            detail,
        };
        let decoded = image::open(image).map_err(|e| failed(e.to_string()))?.to_rgba8();
        let annotated = self.apply(decoded, obscure);
        annotated.save(image).map_err(|e| failed(e.to_string()))?;
        debug!(obscured = obscure, "Annotated {}", image.display());
        Ok(())
    }
}

fn scale_alpha(img: &mut RgbaImage, opacity: u8) {
    for px in img.pixels_mut() {
        px[3] = ((px[3] as u16 * opacity as u16) / 255) as u8;
    }
}
