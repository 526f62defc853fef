use shared::{ReportFilesResponse, ReportPaths, ScanType};
use std::path::{Path, PathBuf};

/// Fixed PDF reports shipped under `<static>/reports`.
#[derive(Debug, Clone)]
pub struct ReportCatalog {
    reports_dir: PathBuf,
}

impl ReportCatalog {
    pub fn new(static_dir: &Path) -> Self {
        Self {
            reports_dir: static_dir.join("reports"),
        }
    }

    pub fn path_for(&self, scan: ScanType) -> PathBuf {
        let file_name = match scan {
            ScanType::Mri => "MRI Report.pdf",
            ScanType::Spiral => "Spiral Drawing Report.pdf",
        };
        self.reports_dir.join(file_name)
    }

    pub fn download_name(scan: ScanType) -> String {
        format!("parkinsons_{}_report.pdf", scan)
    }

    pub fn file_status(&self) -> ReportFilesResponse {
        let mri = self.path_for(ScanType::Mri);
        let spiral = self.path_for(ScanType::Spiral);
        ReportFilesResponse {
            mri: mri.is_file(),
            spiral: spiral.is_file(),
            paths: ReportPaths {
                mri: mri.display().to_string(),
                spiral: spiral.display().to_string(),
            },
        }
    }
}
