//! Upload validation and the scoped on-disk copy.

use std::io::Write;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageReader};
use tempfile::NamedTempFile;

use crate::error::{LabelError, ValidationError};

/// An image handed to the pipeline. Either part may be absent, mirroring a
/// multipart form with no file or an unnamed one.
#[derive(Debug, Clone, Default)]
pub struct Upload {
    pub filename: Option<String>,
    pub bytes: Option<Vec<u8>>,
}

impl Upload {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: Some(filename.into()),
            bytes: Some(bytes),
        }
    }

    /// Read a file from disk, named after its last path component.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(filename, bytes))
    }

    /// Check presence, filename and extension, in that order.
    ///
    /// Returns the filename and payload of an acceptable upload.
    pub fn validate(&self, allowed_extensions: &[String]) -> Result<(&str, &[u8]), ValidationError> {
        let bytes = self.bytes.as_deref().ok_or(ValidationError::MissingFile)?;
        let filename = match self.filename.as_deref() {
            None | Some("") => return Err(ValidationError::EmptyFilename),
            Some(name) => name,
        };

        let extension = extension_of(filename);
        if extension.is_empty() || !allowed_extensions.iter().any(|a| a.eq_ignore_ascii_case(&extension)) {
            return Err(ValidationError::UnsupportedExtension(extension));
        }

        Ok((filename, bytes))
    }
}

/// Lowercased text after the last dot, or empty.
fn extension_of(filename: &str) -> String {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default()
}

/// Reduce an upload name to a safe file name.
///
/// Directory components are dropped, whitespace runs become `_`, and only
/// ASCII alphanumerics, `.`, `-` and `_` are kept. Leading and trailing dots
/// and underscores are trimmed. Falls back to `upload` when nothing is left.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let joined = base.split_whitespace().collect::<Vec<_>>().join("_");

    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();

    let trimmed = kept.trim_matches(|c| c == '.' || c == '_');
    if trimmed.is_empty() {
        "upload".to_string()
    } else {
        trimmed.to_string()
    }
}

/// The upload written to a temporary file for the length of one invocation.
///
/// The file is deleted when this value is dropped, on success and error
/// paths alike.
pub struct ScopedUpload {
    file: NamedTempFile,
}

impl ScopedUpload {
    pub fn write(bytes: &[u8], filename: &str, dir: Option<&Path>) -> Result<Self, LabelError> {
        let suffix = format!("-{}", filename);
        let mut builder = tempfile::Builder::new();
        builder.prefix("labelocr-").suffix(&suffix);

        let mut file = match dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        file.write_all(bytes)?;
        file.flush()?;

        Ok(Self { file })
    }

    pub fn path(&self) -> PathBuf {
        self.file.path().to_path_buf()
    }

    /// Decode the stored image, sniffing the format from its content.
    pub fn decode(&self) -> Result<DynamicImage, LabelError> {
        let image = ImageReader::open(self.file.path())?
            .with_guessed_format()?
            .decode()?;
        Ok(image)
    }
}
