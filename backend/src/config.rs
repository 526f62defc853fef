use serde::{Deserialize, Serialize};
use shared::ScanType;
use std::path::{Path, PathBuf};
use strum::IntoEnumIterator;

use crate::inference::InputShape;

const DEFAULT_CONFIG_PATH: &str = "config/server.yaml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid value for {name}: {value}")]
    InvalidEnv { name: &'static str, value: String },
    #[error("{scan} model must declare {expected} input channel(s), found {found}")]
    ChannelMismatch {
        scan: ScanType,
        expected: usize,
        found: usize,
    },
    #[error("{scan} model input must have non-zero height and width")]
    EmptyInput { scan: ScanType },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Onnx,
    Torch,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub path: PathBuf,
    #[serde(default = "default_backend")]
    pub backend: BackendKind,
    pub input: InputShape,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    pub spiral: ModelConfig,
    pub mri: ModelConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub base_dir: PathBuf,
    pub upload_dir: PathBuf,
    pub static_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub allowed_origins: Vec<String>,
    pub models: ModelsConfig,
}

/// Under `cargo run` the shipped file sits next to the crate manifest, not in
/// the working directory.
fn default_config_path(manifest_dir: Option<String>) -> PathBuf {
    match manifest_dir {
        Some(manifest_dir) => Path::new(&manifest_dir).join(DEFAULT_CONFIG_PATH),
        None => PathBuf::from(DEFAULT_CONFIG_PATH),
    }
}

fn default_backend() -> BackendKind {
    BackendKind::Onnx
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            spiral: ModelConfig {
                path: PathBuf::from("spiral_model.onnx"),
                backend: BackendKind::Onnx,
                input: InputShape::new(128, 128, 1),
            },
            mri: ModelConfig {
                path: PathBuf::from("mri_classifier.onnx"),
                backend: BackendKind::Onnx,
                input: InputShape::new(224, 224, 3),
            },
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            base_dir: PathBuf::from("."),
            upload_dir: PathBuf::from("uploads"),
            static_dir: PathBuf::from("static"),
            max_upload_bytes: 16 * 1024 * 1024,
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
            models: ModelsConfig::default(),
        }
    }
}

impl ModelsConfig {
    pub fn for_scan(&self, scan: ScanType) -> &ModelConfig {
        match scan {
            ScanType::Spiral => &self.spiral,
            ScanType::Mri => &self.mri,
        }
    }
}

impl AppConfig {
    /// Reads `config/server.yaml` (or `$DIAGNOSIS_CONFIG`), applies `HOST`, `PORT`
    /// and `BASE_DIR` overrides and resolves relative paths against the base dir.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = std::env::var("DIAGNOSIS_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_config_path(std::env::var("CARGO_MANIFEST_DIR").ok()));

        let mut config = if config_path.exists() {
            log::info!("Loading configuration from {}", config_path.display());
            Self::from_file(&config_path)?
        } else {
            log::warn!(
                "No configuration file at {}, using built-in defaults",
                config_path.display()
            );
            Self::default()
        };

        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.resolve_paths();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let config_str = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&config_str)
    }

    pub fn from_yaml_str(config_str: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(config_str)?)
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.port = port.parse().map_err(|_| ConfigError::InvalidEnv {
                name: "PORT",
                value: port,
            })?;
        }
        if let Some(base_dir) = lookup("BASE_DIR") {
            self.base_dir = PathBuf::from(base_dir);
        }
        Ok(())
    }

    pub fn resolve_paths(&mut self) {
        let base = self.base_dir.clone();
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        resolve(&mut self.upload_dir);
        resolve(&mut self.static_dir);
        resolve(&mut self.models.spiral.path);
        resolve(&mut self.models.mri.path);
    }

    /// The colour mode of each pipeline is fixed, so the declared channel count
    /// has to agree with it.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for scan in ScanType::iter() {
            let expected = scan.channels();
            let input = self.models.for_scan(scan).input;
            if input.channels != expected {
                return Err(ConfigError::ChannelMismatch {
                    scan,
                    expected,
                    found: input.channels,
                });
            }
            if input.height == 0 || input.width == 0 {
                return Err(ConfigError::EmptyInput { scan });
            }
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
