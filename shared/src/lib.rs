use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

/// Which of the two diagnostic pipelines a request targets.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ScanType {
    Spiral,
    Mri,
}

impl ScanType {
    /// Wording used in the diagnosis message.
    pub fn analysis_name(&self) -> &'static str {
        match self {
            ScanType::Spiral => "spiral drawing",
            ScanType::Mri => "MRI scan",
        }
    }

    /// Spiral drawings are read as grayscale, MRI scans as RGB.
    pub fn channels(&self) -> usize {
        match self {
            ScanType::Spiral => 1,
            ScanType::Mri => 3,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DiagnosisResponse {
    pub prediction: bool,
    pub confidence: f64,
    pub raw_prediction: f64,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ReportPaths {
    pub mri: String,
    pub spiral: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ReportFilesResponse {
    pub mri: bool,
    pub spiral: bool,
    pub paths: ReportPaths,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn scan_type_parses_case_insensitively() {
        assert_eq!(ScanType::from_str("MRI").unwrap(), ScanType::Mri);
        assert_eq!(ScanType::from_str("Spiral").unwrap(), ScanType::Spiral);
        assert!(ScanType::from_str("xray").is_err());
    }

    #[test]
    fn scan_type_displays_lowercase() {
        let names: Vec<String> = ScanType::iter().map(|s| s.to_string()).collect();
        assert_eq!(names, vec!["spiral", "mri"]);
    }

    #[test]
    fn health_status_serializes_lowercase() {
        let body = HealthResponse {
            status: HealthStatus::Unhealthy,
            message: "Upload directory not found".into(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["status"], "unhealthy");
    }
}
