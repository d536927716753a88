use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use image::codecs::gif::{GifDecoder, GifEncoder, Repeat};
use image::{AnimationDecoder, Frame, ImageError, ImageFormat, ImageReader, ImageResult};

/// NeuQuant sampling speed, 1 (best, slowest) to 30. The encoder default of 1
/// takes seconds per 2048px frame.
pub const GIF_ENCODE_SPEED: i32 = 10;

/// Decodes every frame of a GIF as a full-canvas RGBA frame.
pub fn read_gif_frames(path: &Path) -> ImageResult<Vec<Frame>> {
    let reader = BufReader::new(File::open(path).map_err(ImageError::IoError)?);
    GifDecoder::new(reader)?.into_frames().collect_frames()
}

/// Reads a picture as frames: all frames for a GIF, a single frame otherwise.
///
/// The format is sniffed from the file contents, the extension is only a
/// fallback.
pub fn read_frames(path: &Path) -> ImageResult<Vec<Frame>> {
    let reader = ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(ImageError::IoError)?;

    match reader.format() {
        Some(ImageFormat::Gif) => read_gif_frames(path),
        _ => Ok(vec![Frame::new(reader.decode()?.to_rgba8())]),
    }
}

/// Writes frames as an endlessly looping GIF, overwriting `path`.
pub fn write_gif<I>(path: &Path, frames: I) -> ImageResult<()>
where
    I: IntoIterator<Item = Frame>,
{
    let file = File::create(path).map_err(ImageError::IoError)?;
    let mut encoder = GifEncoder::new_with_speed(BufWriter::new(file), GIF_ENCODE_SPEED);
    encoder.set_repeat(Repeat::Infinite)?;
    encoder.encode_frames(frames)
}
