use actix_multipart::Multipart;
use futures::{StreamExt, TryStreamExt};

pub const FILE_FIELD: &str = "file";
pub const ALLOWED_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("No file provided")]
    NoFile,
    #[error("No file selected")]
    NoFilename,
    #[error("Invalid file type")]
    InvalidFileType,
    #[error("File too large")]
    TooLarge { limit: usize },
    #[error("Malformed upload: {0}")]
    Multipart(String),
    #[error("Failed to save upload: {0}")]
    Io(#[from] std::io::Error),
}

/// An accepted upload: the client filename has a permitted extension.
#[derive(Debug)]
pub struct UploadedImage {
    pub filename: String,
    pub bytes: Vec<u8>,
}

pub fn file_extension(filename: &str) -> Option<&str> {
    filename.rsplit_once('.').map(|(_, extension)| extension)
}

pub fn allowed_file(filename: &str) -> bool {
    file_extension(filename).is_some_and(|extension| {
        ALLOWED_EXTENSIONS
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(extension))
    })
}

pub fn validate_filename(filename: Option<&str>) -> Result<&str, UploadError> {
    let filename = filename.ok_or(UploadError::NoFile)?;
    if filename.is_empty() {
        return Err(UploadError::NoFilename);
    }
    if !allowed_file(filename) {
        return Err(UploadError::InvalidFileType);
    }
    Ok(filename)
}

/// Pulls the `file` part out of a multipart body. The filename is validated
/// from the part headers before any of its bytes are buffered.
pub async fn read_upload(
    mut payload: Multipart,
    max_bytes: usize,
) -> Result<UploadedImage, UploadError> {
    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| UploadError::Multipart(e.to_string()))?
    {
        let disposition = field.content_disposition();
        if disposition.and_then(|cd| cd.get_name()) != Some(FILE_FIELD) {
            continue;
        }
        let filename = validate_filename(disposition.and_then(|cd| cd.get_filename()))?.to_string();

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let data = chunk.map_err(|e| UploadError::Multipart(e.to_string()))?;
            if bytes.len() + data.len() > max_bytes {
                return Err(UploadError::TooLarge { limit: max_bytes });
            }
            bytes.extend_from_slice(&data);
        }

        log::debug!("Received upload {} ({} bytes)", filename, bytes.len());
        return Ok(UploadedImage { filename, bytes });
    }
    Err(UploadError::NoFile)
}
