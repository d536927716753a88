//! The generation wrapper: validate, delegate to the renderer, upscale.

use std::path::{Path, PathBuf};

use crate::error::QrError;
use crate::render::{ErrorLevel, QrArtRenderer, RenderJob, RenderOptions};
use crate::upscale::{self, DEFAULT_TARGET_WIDTH};
use crate::validate::{self, OutputFormat};

/// Inputs for one generation.
#[derive(Debug, Clone)]
pub struct GenerationRequest<'a> {
    pub payload: &'a str,
    /// A previously staged, readable image file.
    pub image_path: &'a Path,
    pub colorized: bool,
    pub output_dir: &'a Path,
    pub target_width: u32,
    pub options: RenderOptions,
}

impl<'a> GenerationRequest<'a> {
    pub fn new(payload: &'a str, image_path: &'a Path, output_dir: &'a Path) -> Self {
        Self {
            payload,
            image_path,
            colorized: true,
            output_dir,
            target_width: DEFAULT_TARGET_WIDTH,
            options: RenderOptions::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedQr {
    pub path: PathBuf,
    /// Canonical download name, `artistic_qrcode.png` or `artistic_qrcode.gif`.
    pub filename: &'static str,
    pub format: OutputFormat,
    pub version: i16,
    pub level: ErrorLevel,
    pub width: u32,
    pub height: u32,
}

/// Renders the artifact and upscales it to `request.target_width`.
///
/// An empty payload or a missing input file is a [`QrError::Validation`]
/// raised before the renderer is touched; anything failing afterwards is a
/// [`QrError::Generation`].
pub fn generate_artistic_qr(
    renderer: &dyn QrArtRenderer,
    request: &GenerationRequest<'_>,
) -> Result<GeneratedQr, QrError> {
    validate::validate_payload(request.payload)?;
    if !request.image_path.is_file() {
        return Err(QrError::validation(format!(
            "Image file not found: {}",
            request.image_path.display()
        )));
    }

    std::fs::create_dir_all(request.output_dir).map_err(QrError::generation)?;

    let format = OutputFormat::from_path(request.image_path);
    let filename = format.filename();

    let rendered = renderer
        .render(&RenderJob {
            words: request.payload,
            picture: request.image_path,
            colorized: request.colorized,
            save_name: filename,
            save_dir: request.output_dir,
            options: request.options,
        })
        .map_err(QrError::generation)?;

    let (width, height) =
        upscale::upscale_in_place(&rendered.path, request.target_width).map_err(QrError::generation)?;

    tracing::info!(
        version = rendered.version,
        level = %rendered.level,
        width,
        height,
        path = %rendered.path.display(),
        "generated artistic qr code"
    );

    Ok(GeneratedQr {
        path: rendered.path,
        filename,
        format,
        version: rendered.version,
        level: rendered.level,
        width,
        height,
    })
}
