use std::path::Path;

use crate::error::QrError;

pub const ALLOWED_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "gif"];

/// Format of the artifact handed back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Png,
    Gif,
}

impl OutputFormat {
    /// Only gif input stays gif, everything else is rendered as png.
    pub fn from_extension(ext: &str) -> Self {
        if ext.eq_ignore_ascii_case("gif") {
            Self::Gif
        } else {
            Self::Png
        }
    }

    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(Self::Png)
    }

    pub fn filename(self) -> &'static str {
        match self {
            Self::Png => "artistic_qrcode.png",
            Self::Gif => "artistic_qrcode.gif",
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Gif => "image/gif",
        }
    }
}

pub fn validate_payload(payload: &str) -> Result<(), QrError> {
    if payload.trim().is_empty() {
        return Err(QrError::validation("Payload cannot be empty"));
    }
    Ok(())
}

/// Lower-cased extension of a declared upload filename, without the dot.
pub fn file_extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

/// Returns the normalized extension when it is on the allow-list.
pub fn validate_extension(filename: &str) -> Result<String, QrError> {
    match file_extension(filename) {
        Some(ext) if ALLOWED_EXTENSIONS.contains(&ext.as_str()) => Ok(ext),
        _ => Err(QrError::validation(format!(
            "Invalid file type. Allowed types: {}",
            ALLOWED_EXTENSIONS
                .iter()
                .map(|ext| format!(".{}", ext))
                .collect::<Vec<_>>()
                .join(", ")
        ))),
    }
}
