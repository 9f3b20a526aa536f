//! Configuration structures for the label OCR pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration for the labelocr pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelConfig {
    /// OCR backend configuration.
    pub ocr: OcrConfig,

    /// Orientation search tuning (classical backend only).
    pub orientation: OrientationConfig,

    /// Structured extraction (language model) configuration.
    pub extraction: ExtractionConfig,

    /// Model file locations.
    pub models: ModelConfig,

    /// Accepted uploads.
    pub upload: UploadConfig,
}

/// Which OCR backend the pipeline runs.
///
/// The default is the classical engine when it is compiled in, else the deep
/// backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Detection + recognition networks over ONNX Runtime.
    Deep,
    /// Pure Rust ONNX reader with mobile models.
    Light,
    /// Tesseract with four-way orientation search.
    Classical,
}

impl Default for BackendKind {
    fn default() -> Self {
        if cfg!(feature = "tesseract") || !cfg!(feature = "native") {
            BackendKind::Classical
        } else {
            BackendKind::Deep
        }
    }
}

impl BackendKind {
    /// Static identifier reported by the health probe.
    pub fn model_name(&self) -> &'static str {
        match self {
            BackendKind::Deep => "PaddleOCR (ort)",
            BackendKind::Light => "pure-onnx-ocr",
            BackendKind::Classical => "Tesseract",
        }
    }
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "deep" => Ok(BackendKind::Deep),
            "light" => Ok(BackendKind::Light),
            "classical" | "tesseract" => Ok(BackendKind::Classical),
            other => Err(format!("unknown OCR backend: {}", other)),
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BackendKind::Deep => "deep",
            BackendKind::Light => "light",
            BackendKind::Classical => "classical",
        };
        f.write_str(name)
    }
}

/// OCR engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Backend variant.
    pub backend: BackendKind,

    /// Tesseract language code.
    pub language: String,

    /// Enable 0/180 line direction classification (deep backend).
    pub enable_classification: bool,

    /// Detection probability threshold (0.0 - 1.0).
    pub detection_threshold: f32,

    /// Minimum mean probability for a detected box to be kept.
    pub box_threshold: f32,

    /// Recognition confidence threshold (0.0 - 1.0).
    pub recognition_threshold: f32,

    /// Maximum image dimension (longer side) for processing.
    pub max_image_size: u32,

    /// Number of CPU threads for model inference.
    pub num_threads: usize,

    /// Keep `[UNK]` markers emitted by the light reader.
    pub keep_unk: bool,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            language: "eng".to_string(),
            enable_classification: true,
            detection_threshold: 0.3,
            box_threshold: 0.6,
            recognition_threshold: 0.0, // CTC confidences run low; keep every line
            max_image_size: 2048,
            num_threads: 4,
            keep_unk: false,
        }
    }
}

/// Orientation search tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrientationConfig {
    /// Divisor applied to text length in the candidate score
    /// `avg_confidence * (1 + text_length / length_divisor)`.
    pub length_divisor: f64,
}

impl Default for OrientationConfig {
    fn default() -> Self {
        Self {
            length_divisor: 1000.0,
        }
    }
}

/// Language-model extraction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Base URL of an OpenAI-compatible chat-completions API.
    pub endpoint: String,

    /// Model identifier sent with every request.
    pub model: String,

    /// Sampling temperature.
    pub temperature: f32,

    /// Nucleus sampling mass.
    pub top_p: f32,

    /// Maximum tokens in the reply.
    pub max_tokens: u32,

    /// Request timeout in seconds.
    pub timeout_secs: u64,

    /// Environment variable holding the credential.
    pub api_key_env: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://models.github.ai/inference".to_string(),
            model: "openai/gpt-4o-mini".to_string(),
            temperature: 0.0,
            top_p: 1.0,
            max_tokens: 1000,
            timeout_secs: 60,
            api_key_env: "GITHUB_TOKEN".to_string(),
        }
    }
}

/// Model file paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Directory containing model files.
    pub model_dir: PathBuf,

    /// Text detection model file name.
    pub detection_model: String,

    /// Line direction classification model file name.
    pub classification_model: String,

    /// Text recognition model file name.
    pub recognition_model: String,

    /// Character dictionary file name.
    pub dictionary: String,

    /// Tesseract tessdata directory (system default when unset).
    pub tessdata_dir: Option<PathBuf>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            detection_model: "det.onnx".to_string(),
            classification_model: "cls.onnx".to_string(),
            recognition_model: "en_rec.onnx".to_string(),
            dictionary: "en_dict.txt".to_string(),
            tessdata_dir: None,
        }
    }
}

/// Upload acceptance rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Accepted file extensions, lowercase, without the dot.
    pub allowed_extensions: Vec<String>,

    /// Directory for the per-invocation copy of the upload. System temp
    /// directory when unset.
    pub temp_dir: Option<PathBuf>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            allowed_extensions: ["png", "jpg", "jpeg", "gif", "bmp", "tiff", "tif", "webp"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            temp_dir: None,
        }
    }
}

impl LabelConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        std::fs::write(path, content)
    }

    /// Get full path to a model file.
    pub fn model_path(&self, model_name: &str) -> PathBuf {
        self.models.model_dir.join(model_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: LabelConfig =
            serde_json::from_str(r#"{"ocr": {"backend": "light"}, "extraction": {"timeout_secs": 5}}"#)
                .unwrap();

        assert_eq!(config.ocr.backend, BackendKind::Light);
        assert_eq!(config.ocr.language, "eng");
        assert_eq!(config.extraction.timeout_secs, 5);
        assert_eq!(config.extraction.model, "openai/gpt-4o-mini");
        assert_eq!(config.orientation.length_divisor, 1000.0);
        assert_eq!(config.upload.allowed_extensions.len(), 8);
    }

    #[test]
    fn test_backend_kind_parsing() {
        assert_eq!("Deep".parse::<BackendKind>().unwrap(), BackendKind::Deep);
        assert_eq!("tesseract".parse::<BackendKind>().unwrap(), BackendKind::Classical);
        assert!("easyocr".parse::<BackendKind>().is_err());
        assert_eq!(BackendKind::Light.to_string(), "light");
    }

    #[test]
    fn test_default_backend_follows_features() {
        let expected = if cfg!(feature = "tesseract") {
            BackendKind::Classical
        } else {
            BackendKind::Deep
        };
        if cfg!(any(feature = "tesseract", feature = "native")) {
            assert_eq!(BackendKind::default(), expected);
        }
        assert_eq!(LabelConfig::default().ocr.backend, BackendKind::default());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = LabelConfig::default();
        config.ocr.backend = BackendKind::Deep;
        config.save(&path).unwrap();

        let loaded = LabelConfig::from_file(&path).unwrap();
        assert_eq!(loaded.ocr.backend, BackendKind::Deep);
        assert_eq!(loaded.model_path("det.onnx"), PathBuf::from("models/det.onnx"));
    }
}
