use std::path::Path;

use image::imageops::{self, FilterType};
use image::{Frame, ImageError};

use crate::frames;
use crate::validate::OutputFormat;

pub const DEFAULT_TARGET_WIDTH: u32 = 2048;
const FILTER: FilterType = FilterType::Lanczos3;

#[derive(Debug, thiserror::Error)]
pub enum UpscaleError {
    #[error("target width must be greater than zero")]
    ZeroTargetWidth,

    #[error("artifact {0} is empty")]
    EmptyArtifact(String),

    #[error(transparent)]
    Image(#[from] ImageError),
}

/// Height keeping the aspect ratio of `width`x`height` at `target_width`,
/// truncated and never below one pixel.
pub fn target_height(width: u32, height: u32, target_width: u32) -> u32 {
    let scale = target_width as f64 / width as f64;
    ((height as f64 * scale) as u32).max(1)
}

/// Resizes the image at `path` to `target_width`, overwriting it in place.
///
/// GIF artifacts are resized frame by frame so animations survive. Returns
/// the new dimensions.
pub fn upscale_in_place(path: &Path, target_width: u32) -> Result<(u32, u32), UpscaleError> {
    if target_width == 0 {
        return Err(UpscaleError::ZeroTargetWidth);
    }

    match OutputFormat::from_path(path) {
        OutputFormat::Gif => {
            let frames = frames::read_gif_frames(path)?;
            let (width, height) = frames
                .first()
                .map(|frame| frame.buffer().dimensions())
                .filter(|&(w, h)| w > 0 && h > 0)
                .ok_or_else(|| UpscaleError::EmptyArtifact(path.display().to_string()))?;
            let new_height = target_height(width, height, target_width);

            // resized lazily so only one full-size frame is alive at a time
            let resized = frames.into_iter().map(|frame| {
                let delay = frame.delay();
                let buffer = imageops::resize(frame.buffer(), target_width, new_height, FILTER);
                Frame::from_parts(buffer, 0, 0, delay)
            });
            frames::write_gif(path, resized)?;
            Ok((target_width, new_height))
        }
        OutputFormat::Png => {
            let img = image::open(path)?;
            if img.width() == 0 || img.height() == 0 {
                return Err(UpscaleError::EmptyArtifact(path.display().to_string()));
            }
            let new_height = target_height(img.width(), img.height(), target_width);
            img.resize_exact(target_width, new_height, FILTER).save(path)?;
            Ok((target_width, new_height))
        }
    }
}
