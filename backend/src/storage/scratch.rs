use std::fs;
use std::path::{Path, PathBuf};
use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

use super::upload::{UploadError, UploadedImage, file_extension};

const WINDOWS_DEVICE_NAMES: [&str; 22] = [
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Reduces a client supplied filename to `[A-Za-z0-9_.-]` so it can never
/// address anything outside the scratch directory. Accented letters keep their
/// base letter after NFKD decomposition.
pub fn secure_filename(filename: &str) -> String {
    let spaced: String = filename
        .nfkd()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();

    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");
    let cleaned: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();
    let trimmed = cleaned.trim_matches(|c| c == '.' || c == '_');

    let stem = trimmed.split('.').next().unwrap_or_default();
    if WINDOWS_DEVICE_NAMES
        .iter()
        .any(|device| device.eq_ignore_ascii_case(stem))
    {
        return format!("_{trimmed}");
    }
    trimmed.to_string()
}

/// Uploads directory; every saved file is owned by a [`ScratchFile`] guard.
#[derive(Debug, Clone)]
pub struct ScratchDir {
    root: PathBuf,
}

impl ScratchDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn exists(&self) -> bool {
        self.root.is_dir()
    }

    pub fn scratch_path(&self, request_id: Uuid, filename: &str) -> PathBuf {
        let mut name = secure_filename(filename);
        if !name.contains('.') {
            let extension = file_extension(filename).unwrap_or("bin").to_ascii_lowercase();
            name = format!("upload.{extension}");
        }
        self.root.join(format!("{}_{}", request_id.simple(), name))
    }

    pub fn save(&self, upload: &UploadedImage) -> Result<ScratchFile, UploadError> {
        let path = self.scratch_path(Uuid::new_v4(), &upload.filename);
        fs::write(&path, &upload.bytes)?;
        log::debug!("Saved upload to {}", path.display());
        Ok(ScratchFile { path })
    }
}

/// Deletes its file when dropped, whichever way the request ended.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => log::debug!("Removed scratch file {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::warn!(
                "Failed to remove scratch file {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}
