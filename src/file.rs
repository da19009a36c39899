//! Selected files attached to file-typed inputs

use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

const OCTET_STREAM: &str = "application/octet-stream";

/// A file in an input's selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    name: String,
    media_type: String,
    bytes: Arc<[u8]>,
}

impl SelectedFile {
    /// Create a file from its name, declared media type and contents
    pub fn new(
        name: impl Into<String>,
        media_type: impl Into<String>,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk, declaring its media type from the extension
    pub fn from_path(path: &Path) -> io::Result<Self> {
        let bytes = fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let media_type = image::ImageFormat::from_path(path)
            .map(|format| format.to_mime_type().to_string())
            .unwrap_or_else(|_| OCTET_STREAM.to_string());

        Ok(Self::new(name, media_type, bytes))
    }

    /// File name including extension
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared media type (e.g. "image/png")
    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    /// File contents
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Size in bytes
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Whether the declared media type is in the given family ("image", "audio", "video")
    pub fn is_kind(&self, family: &str) -> bool {
        self.media_type
            .strip_prefix(family)
            .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Whether the declared media type is an image type
    pub fn is_image(&self) -> bool {
        self.is_kind("image")
    }

    /// File name with its last extension removed ("photo.final.png" -> "photo.final")
    pub fn stem(&self) -> &str {
        file_stem(&self.name)
    }
}

/// Strip the last extension from a file name
///
/// The extension is everything after the last '.', provided it is non-empty
/// and contains no '/'. A name that is only an extension (".env") yields "".
pub fn file_stem(name: &str) -> &str {
    match name.rfind('.') {
        Some(dot) if dot + 1 < name.len() && !name[dot + 1..].contains('/') => &name[..dot],
        _ => name,
    }
}
