pub mod batch;
pub mod config;
pub mod health;
pub mod process;

use std::path::{Path, PathBuf};

use clap::Args;
use tracing::debug;

use labelocr_core::{BackendKind, LabelConfig, Pipeline};

/// Default location of the configuration file.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("labelocr")
        .join("config.json")
}

/// Load the explicit config file, else the default one if present, else
/// built-in defaults.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<LabelConfig> {
    if let Some(path) = config_path {
        return Ok(LabelConfig::from_file(Path::new(path))?);
    }

    let default_path = default_config_path();
    if default_path.exists() {
        debug!("Using config file {}", default_path.display());
        Ok(LabelConfig::from_file(&default_path)?)
    } else {
        Ok(LabelConfig::default())
    }
}

/// Options shared by commands that build a pipeline.
#[derive(Args, Clone)]
pub struct EngineArgs {
    /// OCR backend (deep, light, classical)
    #[arg(short, long, env = "LABELOCR_BACKEND")]
    backend: Option<BackendKind>,

    /// Model directory
    #[arg(short, long)]
    model_dir: Option<PathBuf>,

    /// Credential for the extraction endpoint (default: the variable named
    /// by extraction.api_key_env)
    #[arg(long)]
    api_key: Option<String>,
}

impl EngineArgs {
    /// Apply command-line overrides to `config`.
    pub fn apply(&self, config: &mut LabelConfig) {
        if let Some(backend) = self.backend {
            config.ocr.backend = backend;
        }
        if let Some(dir) = &self.model_dir {
            config.models.model_dir = dir.clone();
        }
    }

    /// The credential, read once: the flag, else the configured variable.
    pub fn api_key(&self, config: &LabelConfig) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(&config.extraction.api_key_env).ok())
    }

    pub fn build_pipeline(&self, config: &LabelConfig) -> anyhow::Result<Pipeline> {
        Pipeline::from_config(config, self.api_key(config))
            .map_err(|e| anyhow::anyhow!("Failed to initialize pipeline: {}", e))
    }
}
