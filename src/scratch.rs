use std::io::ErrorKind::{AlreadyExists, NotFound};
use std::path::{Path, PathBuf};

use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use tokio::fs;

pub const SCRATCH_PREFIX: &str = "temp_qr_api_";
const SUFFIX_LEN: usize = 8;
const CREATE_ATTEMPTS: usize = 16;

pub fn generate_suffix() -> String {
    let mut rng = thread_rng();

    (0..SUFFIX_LEN)
        .map(|_| (rng.sample(Alphanumeric) as char).to_ascii_lowercase())
        .collect::<String>()
}

/// A per-request staging directory.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    /// Creates a fresh `temp_qr_api_*` directory under `root`, picking a new
    /// name whenever one is already taken.
    pub async fn create(root: &Path) -> std::io::Result<Self> {
        fs::create_dir_all(root).await?;

        for _ in 0..CREATE_ATTEMPTS {
            let path = root.join(format!("{}{}", SCRATCH_PREFIX, generate_suffix()));
            match fs::create_dir(&path).await {
                Ok(()) => {
                    tracing::debug!(path = %path.display(), "created scratch directory");
                    return Ok(Self { path });
                }
                Err(err) if err.kind() == AlreadyExists => continue,
                Err(err) => return Err(err),
            }
        }

        Err(std::io::Error::new(
            AlreadyExists,
            "could not find a free scratch directory name",
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the upload as `input.<ext>` and returns its path.
    pub async fn stage(&self, ext: &str, bytes: &[u8]) -> std::io::Result<PathBuf> {
        let path = self.path.join(format!("input.{}", ext));
        fs::write(&path, bytes).await?;
        Ok(path)
    }

    pub async fn cleanup(self) {
        cleanup_scratch_dir(&self.path).await;
    }
}

/// Best-effort recursive removal. Errors are logged and swallowed; returns
/// whether the directory is gone.
pub async fn cleanup_scratch_dir(path: &Path) -> bool {
    match fs::remove_dir_all(path).await {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "removed scratch directory");
            true
        }
        Err(err) if err.kind() == NotFound => true,
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                "Failed to cleanup temp directory: {}",
                err
            );
            false
        }
    }
}

/// Removes every scratch directory left under `root`, returning how many
/// were removed.
pub async fn sweep_scratch_dirs(root: &Path) -> usize {
    let mut entries = match fs::read_dir(root).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == NotFound => return 0,
        Err(err) => {
            tracing::warn!(root = %root.display(), "Failed to list scratch root: {}", err);
            return 0;
        }
    };

    let mut removed = 0;
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(err) => {
                tracing::warn!(root = %root.display(), "Failed to list scratch root: {}", err);
                break;
            }
        };

        let is_scratch = entry
            .file_name()
            .to_str()
            .map_or(false, |name| name.starts_with(SCRATCH_PREFIX));
        let is_dir = entry
            .file_type()
            .await
            .map_or(false, |kind| kind.is_dir());

        if is_scratch && is_dir && cleanup_scratch_dir(&entry.path()).await {
            removed += 1;
        }
    }
    removed
}
