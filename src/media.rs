//! Media references passed alongside a query.
//!
//! Skue never decodes pixels itself. A [`MediaRef`] only names a file on disk
//! and knows enough about it to describe it to the planner or to ship its raw
//! bytes to a completion backend or remote tool.

use crate::error::{Result, SkueError};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "gif", "webp", "tif", "tiff"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv", "webm", "m4v"];

/// Kind of media attached to a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Image => write!(f, "image"),
            MediaKind::Video => write!(f, "video"),
        }
    }
}

/// A reference to an image or video file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    pub path: PathBuf,
    pub kind: MediaKind,
}

impl MediaRef {
    /// Create a media reference, inferring the kind from the file extension.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let extension = extension_of(path);

        let kind = if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
            MediaKind::Image
        } else if VIDEO_EXTENSIONS.contains(&extension.as_str()) {
            MediaKind::Video
        } else {
            return Err(SkueError::Media(format!(
                "Unsupported media extension '{}' for {}",
                extension,
                path.display()
            )));
        };

        Ok(Self {
            path: path.to_path_buf(),
            kind,
        })
    }

    /// Create an image reference without checking the extension.
    pub fn image(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: MediaKind::Image,
        }
    }

    /// The path as a string, used when the media is threaded into tool parameters.
    pub fn path_str(&self) -> String {
        self.path.to_string_lossy().to_string()
    }

    /// Lowercased file extension (empty if none).
    pub fn extension(&self) -> String {
        extension_of(&self.path)
    }

    /// One-line description of the media for planner prompts.
    pub fn describe(&self) -> String {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path_str());
        format!("{} file named '{}' (reference it as $input)", self.kind, name)
    }

    /// Read the file and encode it as base64.
    pub fn encode_base64(&self) -> Result<String> {
        encode_file(&self.path)
    }
}

/// Read a file and encode its bytes as standard base64.
pub fn encode_file(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).map_err(|e| {
        SkueError::Media(format!("Failed to read {}: {}", path.display(), e))
    })?;
    Ok(STANDARD.encode(bytes))
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_extension() {
        assert_eq!(MediaRef::from_path("a/b/apples.JPG").unwrap().kind, MediaKind::Image);
        assert_eq!(MediaRef::from_path("clip.mp4").unwrap().kind, MediaKind::Video);
        assert!(MediaRef::from_path("notes.txt").is_err());
    }

    #[test]
    fn test_describe_mentions_input_token() {
        let media = MediaRef::image("/tmp/apples.png");
        let text = media.describe();
        assert!(text.contains("apples.png"));
        assert!(text.contains("$input"));
    }

    #[test]
    fn test_encode_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pixel.png");
        std::fs::write(&path, b"abc").unwrap();

        let media = MediaRef::from_path(&path).unwrap();
        assert_eq!(media.encode_base64().unwrap(), "YWJj");
    }
}
