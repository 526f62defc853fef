use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use shared::{ErrorResponse, ScanType};

use crate::storage::upload::UploadError;

/// Request-level failure, rendered as `{"error": "..."}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("File too large")]
    PayloadTooLarge,
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Processing(String),
}

impl ApiError {
    /// MRI failures carry a prefix, spiral ones are passed through verbatim.
    pub fn prediction_failed(scan: ScanType, reason: impl std::fmt::Display) -> Self {
        match scan {
            ScanType::Spiral => ApiError::Processing(reason.to_string()),
            ScanType::Mri => ApiError::Processing(format!("MRI Prediction failed: {reason}")),
        }
    }
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::TooLarge { .. } => ApiError::PayloadTooLarge,
            UploadError::Io(_) => ApiError::Processing(err.to_string()),
            UploadError::NoFile
            | UploadError::NoFilename
            | UploadError::InvalidFileType
            | UploadError::Multipart(_) => ApiError::Validation(err.to_string()),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Processing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_errors_map_to_client_statuses() {
        let invalid = ApiError::from(UploadError::InvalidFileType);
        assert_eq!(invalid.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(invalid.to_string(), "Invalid file type");

        let too_large = ApiError::from(UploadError::TooLarge { limit: 10 });
        assert_eq!(too_large.status_code(), StatusCode::PAYLOAD_TOO_LARGE);

        let io = ApiError::from(UploadError::Io(std::io::Error::other("disk full")));
        assert_eq!(io.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn prediction_failures_follow_pipeline_wording() {
        let spiral = ApiError::prediction_failed(ScanType::Spiral, "bad pixels");
        let mri = ApiError::prediction_failed(ScanType::Mri, "bad pixels");
        assert_eq!(spiral.to_string(), "bad pixels");
        assert_eq!(mri.to_string(), "MRI Prediction failed: bad pixels");
        assert_eq!(mri.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
