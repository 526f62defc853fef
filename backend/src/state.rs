use shared::ScanType;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::inference::{Classifier, ModelLoadError, load_classifier};
use crate::reports::ReportCatalog;
use crate::storage::scratch::ScratchDir;

/// Everything a handler needs, built once in `main` and shared read-only.
pub struct AppState {
    pub config: AppConfig,
    pub scratch: ScratchDir,
    pub reports: ReportCatalog,
    spiral: Arc<dyn Classifier>,
    mri: Arc<dyn Classifier>,
}

impl AppState {
    pub fn new(config: AppConfig, spiral: Arc<dyn Classifier>, mri: Arc<dyn Classifier>) -> Self {
        Self {
            scratch: ScratchDir::new(&config.upload_dir),
            reports: ReportCatalog::new(&config.static_dir),
            config,
            spiral,
            mri,
        }
    }

    /// Loads both models. Either one missing or failing to load aborts start-up.
    pub fn load(config: AppConfig) -> Result<Self, ModelLoadError> {
        log::info!("Looking for spiral model at: {}", config.models.spiral.path.display());
        log::info!("Looking for MRI model at: {}", config.models.mri.path.display());

        let spiral = load_classifier(&config.models.spiral)?;
        log::info!("Spiral model loaded successfully!");
        let mri = load_classifier(&config.models.mri)?;
        log::info!("MRI model loaded successfully!");

        Ok(Self::new(config, spiral, mri))
    }

    pub fn classifier(&self, scan: ScanType) -> Arc<dyn Classifier> {
        match scan {
            ScanType::Spiral => Arc::clone(&self.spiral),
            ScanType::Mri => Arc::clone(&self.mri),
        }
    }
}
