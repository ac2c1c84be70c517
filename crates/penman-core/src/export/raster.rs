//! Off-screen rendering of markup into a bitmap.
//!
//! Markup is mounted on a [`RenderHost`] as a scoped [`RenderTarget`]; the
//! target is released when dropped, on success and on every error path.
//! Glyph drawing sits behind the [`Rasterizer`] trait.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use ab_glyph::{Font, FontVec, PxScale, ScaleFont, point};
use image::{Rgb, RgbImage};
use tracing::debug;

use super::layout::{self, Block, Layout, PlacedRun, TextStyle};
use super::{ExportError, ExportErrorKind};

/// Pixel density multiplier applied to the logical layout.
pub const RASTER_SCALE: f32 = 2.0;

/// Largest bitmap edge the JPEG encoder accepts.
pub const MAX_RASTER_EDGE: u32 = 65_535;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

/// Fonts probed when no font is configured. Collections use face 0.
const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/noto-cjk/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/google-noto-cjk/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/truetype/wqy/wqy-microhei.ttc",
    "/System/Library/Fonts/PingFang.ttc",
    "/System/Library/Fonts/STHeiti Light.ttc",
    "C:\\Windows\\Fonts\\msyh.ttc",
    "C:\\Windows\\Fonts\\simsun.ttc",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
];

/// Tracks mounted render targets.
#[derive(Debug, Default)]
pub struct RenderHost {
    live: AtomicUsize,
}

impl RenderHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mounts `markup` for rendering. The target unmounts when dropped.
    pub fn mount(&self, markup: &str) -> RenderTarget<'_> {
        let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(live, "render target mounted");
        RenderTarget {
            host: self,
            blocks: layout::parse_blocks(markup),
        }
    }

    /// Number of targets currently mounted.
    pub fn live_targets(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

/// Markup mounted off-screen for the duration of one render.
#[derive(Debug)]
pub struct RenderTarget<'h> {
    host: &'h RenderHost,
    blocks: Vec<Block>,
}

impl RenderTarget<'_> {
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn layout(&self, rasterizer: &dyn Rasterizer) -> Layout {
        layout::layout(&self.blocks, |text, style| rasterizer.measure(text, style))
    }
}

impl Drop for RenderTarget<'_> {
    fn drop(&mut self) {
        let live = self.host.live.fetch_sub(1, Ordering::SeqCst) - 1;
        debug!(live, "render target unmounted");
    }
}

/// Draws text runs onto a canvas.
pub trait Rasterizer: Send + Sync {
    /// Advance width of `text` in logical units.
    fn measure(&self, text: &str, style: &TextStyle) -> f32;

    /// Draws one run. Positions are logical; `scale` maps them to pixels.
    ///
    /// # Errors
    /// Returns an error if the run cannot be drawn.
    fn draw_run(
        &self,
        canvas: &mut RgbImage,
        run: &PlacedRun,
        line_top: f32,
        line_height: f32,
        scale: f32,
    ) -> Result<(), ExportError>;
}

/// Renders a mounted target into an RGB bitmap on a white background.
///
/// # Errors
/// Returns an error if the bitmap would be too large or a run fails to draw.
pub fn rasterize(
    target: &RenderTarget<'_>,
    rasterizer: &dyn Rasterizer,
    scale: f32,
) -> Result<RgbImage, ExportError> {
    let layout = target.layout(rasterizer);
    let width = (layout.width * scale).ceil() as u32;
    let height = (layout.height * scale).ceil() as u32;
    if width == 0 || height == 0 || width > MAX_RASTER_EDGE || height > MAX_RASTER_EDGE {
        return Err(ExportError::new(
            ExportErrorKind::Rasterize,
            format!("document renders to {width}x{height} px, outside the supported size"),
        ));
    }

    debug!(width, height, lines = layout.lines.len(), "rasterizing");
    let mut canvas = RgbImage::from_pixel(width, height, WHITE);
    for line in &layout.lines {
        for run in &line.runs {
            rasterizer.draw_run(&mut canvas, run, line.top, line.height, scale)?;
        }
    }
    Ok(canvas)
}

/// Outline-font rasterizer with an optional bold face.
///
/// Without a bold face, bold runs are overstruck. Italic runs use the
/// upright face.
pub struct FontRasterizer {
    regular: FontVec,
    bold: Option<FontVec>,
}

impl FontRasterizer {
    /// # Errors
    /// Returns an error if a font cannot be parsed.
    pub fn from_bytes(regular: Vec<u8>, bold: Option<Vec<u8>>) -> Result<Self, ExportError> {
        let parse = |data: Vec<u8>| {
            FontVec::try_from_vec(data).map_err(|e| {
                ExportError::new(ExportErrorKind::Rasterize, format!("invalid font: {e}"))
            })
        };
        Ok(Self {
            regular: parse(regular)?,
            bold: bold.map(parse).transpose()?,
        })
    }

    /// # Errors
    /// Returns an error if a font file cannot be read or parsed.
    pub fn from_files(regular: &Path, bold: Option<&Path>) -> Result<Self, ExportError> {
        let read = |path: &Path| {
            std::fs::read(path).map_err(|e| {
                ExportError::new(
                    ExportErrorKind::Rasterize,
                    format!("read font {}: {e}", path.display()),
                )
            })
        };
        let regular_bytes = read(regular)?;
        let bold_bytes = bold.map(read).transpose()?;
        debug!(font = %regular.display(), bold = bold.is_some(), "loaded fonts");
        Self::from_bytes(regular_bytes, bold_bytes)
    }

    /// Loads the configured font, or the first installed system font found.
    ///
    /// # Errors
    /// Returns an error if no usable font exists.
    pub fn load(regular: Option<&Path>, bold: Option<&Path>) -> Result<Self, ExportError> {
        if let Some(path) = regular {
            return Self::from_files(path, bold);
        }
        let found = find_system_font().ok_or_else(|| {
            ExportError::new(
                ExportErrorKind::Rasterize,
                "no font found; set export.font_path in the config",
            )
        })?;
        Self::from_files(&found, bold)
    }

    fn face(&self, style: &TextStyle) -> (&FontVec, bool) {
        match (&self.bold, style.bold) {
            (Some(bold), true) => (bold, false),
            (None, true) => (&self.regular, true),
            (_, false) => (&self.regular, false),
        }
    }
}

/// Scale whose em square is `size` pixels.
fn em_scale(font: &FontVec, size: f32) -> PxScale {
    let units_per_em = font.units_per_em().unwrap_or(1000.0);
    PxScale::from(size * font.height_unscaled() / units_per_em)
}

fn find_system_font() -> Option<PathBuf> {
    SYSTEM_FONTS
        .iter()
        .map(PathBuf::from)
        .find(|path| path.is_file())
}

impl Rasterizer for FontRasterizer {
    fn measure(&self, text: &str, style: &TextStyle) -> f32 {
        let (font, _) = self.face(style);
        let scaled = font.as_scaled(em_scale(font, style.size));
        let mut width = 0.0;
        let mut prev = None;
        for c in text.chars() {
            let id = scaled.glyph_id(c);
            if let Some(p) = prev {
                width += scaled.kern(p, id);
            }
            width += scaled.h_advance(id);
            prev = Some(id);
        }
        width
    }

    fn draw_run(
        &self,
        canvas: &mut RgbImage,
        run: &PlacedRun,
        line_top: f32,
        line_height: f32,
        scale: f32,
    ) -> Result<(), ExportError> {
        let (font, overstrike) = self.face(&run.style);
        let px = em_scale(font, run.style.size * scale);
        let scaled = font.as_scaled(px);

        let glyph_height = scaled.ascent() - scaled.descent();
        let baseline = line_top * scale + (line_height * scale - glyph_height) / 2.0 + scaled.ascent();
        let strikes: &[i64] = if overstrike { &[0, 1] } else { &[0] };

        let mut caret = run.x * scale;
        let mut prev = None;
        for c in run.text.chars() {
            let id = scaled.glyph_id(c);
            if let Some(p) = prev {
                caret += scaled.kern(p, id);
            }
            let glyph = id.with_scale_and_position(px, point(caret, baseline));
            caret += scaled.h_advance(id);
            prev = Some(id);

            let Some(outlined) = font.outline_glyph(glyph) else {
                continue;
            };
            let bounds = outlined.px_bounds();
            outlined.draw(|gx, gy, coverage| {
                let y = bounds.min.y as i64 + i64::from(gy);
                for dx in strikes {
                    let x = bounds.min.x as i64 + i64::from(gx) + dx;
                    blend(canvas, x, y, coverage);
                }
            });
        }
        Ok(())
    }
}

/// Darkens the pixel at (x, y) by `coverage`, clipped to the canvas.
fn blend(canvas: &mut RgbImage, x: i64, y: i64, coverage: f32) {
    let (Ok(x), Ok(y)) = (u32::try_from(x), u32::try_from(y)) else {
        return;
    };
    if x >= canvas.width() || y >= canvas.height() {
        return;
    }
    let keep = 1.0 - coverage.clamp(0.0, 1.0);
    let pixel = canvas.get_pixel_mut(x, y);
    for channel in &mut pixel.0 {
        *channel = (f32::from(*channel) * keep).round() as u8;
    }
}
