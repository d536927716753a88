//! QR-art rendering.
//!
//! The generator only depends on the [`QrArtRenderer`] trait so tests can
//! swap in a fake. [`BlendRenderer`] is the real implementation: it encodes
//! the payload with `qrcode` and paints the modules over the caller's picture,
//! leaving enough of every module visible for scanners while the picture
//! shows through the rest.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use image::imageops::{self, FilterType};
use image::{Frame, ImageError, Rgba, RgbaImage};
use qrcode::types::QrError as EncodeError;
use qrcode::{Color, EcLevel, QrCode, Version};

use crate::frames;
use crate::validate::OutputFormat;

/// Pixels per module edge.
const MODULE_PX: usize = 3;
/// Quiet zone around the symbol, in modules.
const QUIET_ZONE: usize = 4;
const MAX_VERSION: i16 = 40;

const DARK: Rgba<u8> = Rgba([0, 0, 0, 255]);
const LIGHT: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Error-correction level of the encoded symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorLevel {
    L,
    M,
    Q,
    #[default]
    H,
}

impl From<ErrorLevel> for EcLevel {
    fn from(level: ErrorLevel) -> Self {
        match level {
            ErrorLevel::L => EcLevel::L,
            ErrorLevel::M => EcLevel::M,
            ErrorLevel::Q => EcLevel::Q,
            ErrorLevel::H => EcLevel::H,
        }
    }
}

impl From<EcLevel> for ErrorLevel {
    fn from(level: EcLevel) -> Self {
        match level {
            EcLevel::L => ErrorLevel::L,
            EcLevel::M => ErrorLevel::M,
            EcLevel::Q => ErrorLevel::Q,
            EcLevel::H => ErrorLevel::H,
        }
    }
}

impl FromStr for ErrorLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "L" => Ok(Self::L),
            "M" => Ok(Self::M),
            "Q" => Ok(Self::Q),
            "H" => Ok(Self::H),
            other => Err(format!("unknown error correction level {:?}", other)),
        }
    }
}

impl ErrorLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::L => "L",
            Self::M => "M",
            Self::Q => "Q",
            Self::H => "H",
        }
    }
}

impl fmt::Display for ErrorLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tuning knobs passed through to the renderer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderOptions {
    /// Minimum symbol version; grows until the payload fits. `None` picks the
    /// smallest version that fits.
    pub version: Option<i16>,
    pub level: ErrorLevel,
    /// Contrast factor applied to the picture, 1.0 leaves it unchanged.
    pub contrast: f32,
    /// Brightness factor applied to the picture, 1.0 leaves it unchanged.
    pub brightness: f32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            version: None,
            level: ErrorLevel::default(),
            contrast: 1.0,
            brightness: 1.0,
        }
    }
}

impl RenderOptions {
    pub fn check(&self) -> Result<(), RenderError> {
        if let Some(version) = self.version {
            if !(1..=MAX_VERSION).contains(&version) {
                return Err(RenderError::Version(version));
            }
        }
        for (name, factor) in [("contrast", self.contrast), ("brightness", self.brightness)] {
            if !(factor.is_finite() && factor > 0.0) {
                return Err(RenderError::Factor(name, factor));
            }
        }
        Ok(())
    }
}

/// One rendering request.
#[derive(Debug, Clone)]
pub struct RenderJob<'a> {
    pub words: &'a str,
    pub picture: &'a Path,
    pub colorized: bool,
    pub save_name: &'a str,
    pub save_dir: &'a Path,
    pub options: RenderOptions,
}

/// What the renderer produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedQr {
    pub version: i16,
    pub level: ErrorLevel,
    pub path: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("cannot encode payload: {0}")]
    Encode(#[from] EncodeError),

    #[error("unsupported QR version {0}, expected 1..=40")]
    Version(i16),

    #[error("invalid {0} factor {1}, expected a positive number")]
    Factor(&'static str, f32),

    #[error("picture has no frames")]
    NoFrames,

    #[error(transparent)]
    Image(#[from] ImageError),
}

/// Turns a payload and a picture into a QR-art image file.
pub trait QrArtRenderer: Send + Sync {
    fn render(&self, job: &RenderJob<'_>) -> Result<RenderedQr, RenderError>;
}

/// Renderer blending the QR modules into the supplied picture.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlendRenderer;

impl QrArtRenderer for BlendRenderer {
    fn render(&self, job: &RenderJob<'_>) -> Result<RenderedQr, RenderError> {
        job.options.check()?;

        let code = encode(job.words, &job.options)?;
        let layout = ModuleLayout::new(&code);
        let side = layout.canvas_side();
        let path = job.save_dir.join(job.save_name);

        let pictures = frames::read_frames(job.picture)?;
        if pictures.is_empty() {
            return Err(RenderError::NoFrames);
        }

        let paint = |frame: &Frame| {
            let background = prepare_background(
                frame.buffer(),
                side,
                job.colorized,
                job.options.contrast,
                job.options.brightness,
            );
            layout.paint(&background)
        };

        match OutputFormat::from_path(&path) {
            OutputFormat::Gif => {
                let rendered = pictures
                    .iter()
                    .map(|frame| Frame::from_parts(paint(frame), 0, 0, frame.delay()))
                    .collect::<Vec<_>>();
                frames::write_gif(&path, rendered)?;
            }
            OutputFormat::Png => paint(&pictures[0]).save(&path)?,
        }

        let version = version_number(code.version());
        tracing::debug!(
            version,
            level = %ErrorLevel::from(code.error_correction_level()),
            frames = pictures.len(),
            path = %path.display(),
            "rendered qr art"
        );

        Ok(RenderedQr {
            version,
            level: code.error_correction_level().into(),
            path,
        })
    }
}

fn version_number(version: Version) -> i16 {
    match version {
        Version::Normal(v) | Version::Micro(v) => v,
    }
}

fn encode(words: &str, options: &RenderOptions) -> Result<QrCode, RenderError> {
    let level = EcLevel::from(options.level);
    let Some(min_version) = options.version else {
        return Ok(QrCode::with_error_correction_level(words, level)?);
    };

    for version in min_version..=MAX_VERSION {
        match QrCode::with_version(words, Version::Normal(version), level) {
            Ok(code) => return Ok(code),
            Err(EncodeError::DataTooLong) => continue,
            Err(err) => return Err(err.into()),
        }
    }
    Err(EncodeError::DataTooLong.into())
}

/// Centre coordinates of alignment patterns along one axis.
fn alignment_centers(version: i16) -> Vec<usize> {
    if version < 2 {
        return Vec::new();
    }
    let v = version as usize;
    let count = v / 7 + 2;
    let size = 4 * v + 17;
    let step = if v == 32 {
        26
    } else {
        (v * 4 + count * 2 + 1) / (count * 2 - 2) * 2
    };

    let mut centers = vec![6];
    centers.extend((0..count - 1).rev().map(|i| size - 7 - i * step));
    centers
}

/// Which modules belong to function patterns, and where modules land on the canvas.
struct ModuleLayout<'a> {
    code: &'a QrCode,
    width: usize,
    version: i16,
    alignment: Vec<usize>,
}

impl<'a> ModuleLayout<'a> {
    fn new(code: &'a QrCode) -> Self {
        let version = version_number(code.version());
        Self {
            code,
            width: code.width(),
            version,
            alignment: alignment_centers(version),
        }
    }

    fn canvas_side(&self) -> u32 {
        ((self.width + 2 * QUIET_ZONE) * MODULE_PX) as u32
    }

    fn is_function(&self, x: usize, y: usize) -> bool {
        let n = self.width;

        // finders with separators and format information
        if (x < 9 && y < 9) || (x + 8 >= n && y < 9) || (x < 9 && y + 8 >= n) {
            return true;
        }
        if x == 6 || y == 6 {
            return true;
        }
        if self.version >= 7 {
            let band = |a: usize, b: usize| a + 11 >= n && a + 8 < n && b < 6;
            if band(x, y) || band(y, x) {
                return true;
            }
        }

        let last = self.alignment.last().copied().unwrap_or(0);
        self.alignment.iter().any(|&cy| {
            self.alignment.iter().any(|&cx| {
                let overlaps_finder =
                    (cx == 6 && cy == 6) || (cx == 6 && cy == last) || (cx == last && cy == 6);
                !overlaps_finder && x.abs_diff(cx) <= 2 && y.abs_diff(cy) <= 2
            })
        })
    }

    fn paint(&self, background: &RgbaImage) -> RgbaImage {
        let side = self.canvas_side();
        let mut canvas = RgbaImage::from_pixel(side, side, LIGHT);

        for y in 0..self.width {
            for x in 0..self.width {
                let origin_x = (x + QUIET_ZONE) * MODULE_PX;
                let origin_y = (y + QUIET_ZONE) * MODULE_PX;
                let color = match self.code[(x, y)] {
                    Color::Dark => DARK,
                    Color::Light => LIGHT,
                };
                let solid = self.is_function(x, y);

                for dy in 0..MODULE_PX {
                    for dx in 0..MODULE_PX {
                        let px = (origin_x + dx) as u32;
                        let py = (origin_y + dy) as u32;
                        let centre = dx == MODULE_PX / 2 && dy == MODULE_PX / 2;
                        let pixel = if solid || centre {
                            color
                        } else {
                            *background.get_pixel(px, py)
                        };
                        canvas.put_pixel(px, py, pixel);
                    }
                }
            }
        }
        canvas
    }
}

/// Fits the picture to the canvas, flattens it onto white and applies the
/// colour adjustments.
fn prepare_background(
    picture: &RgbaImage,
    side: u32,
    colorized: bool,
    contrast: f32,
    brightness: f32,
) -> RgbaImage {
    let resized = imageops::resize(picture, side, side, FilterType::Lanczos3);
    let mut canvas = RgbaImage::from_pixel(side, side, LIGHT);
    imageops::overlay(&mut canvas, &resized, 0, 0);

    for pixel in canvas.pixels_mut() {
        let [r, g, b, _] = pixel.0;
        let adjust = |c: u8| {
            let contrasted = 128.0 + contrast * (c as f32 - 128.0);
            (contrasted * brightness).round().clamp(0.0, 255.0) as u8
        };
        let (r, g, b) = (adjust(r), adjust(g), adjust(b));
        *pixel = if colorized {
            Rgba([r, g, b, 255])
        } else {
            let luma = (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32).round() as u8;
            Rgba([luma, luma, luma, 255])
        };
    }
    canvas
}
