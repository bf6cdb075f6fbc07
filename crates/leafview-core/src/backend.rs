//! Interfaces of the content-extraction and narration services the engine drives.
//!
//! Every call is asynchronous and may fail; the engine decides when to call and
//! what to do with the answer, never how the work is done.

use crate::config::NarrationEngine;
use crate::error::BackendResult;
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64_STANDARD};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use ts_rs::TS;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DocumentInfo {
    pub filename: String,
    pub total_pages: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum TextFileType {
    Md,
    Txt,
}

impl TextFileType {
    /// Markdown for `.md`/`.markdown`, plain text otherwise.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("md" | "markdown") => TextFileType::Md,
            _ => TextFileType::Txt,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TextInfo {
    pub filename: String,
    pub file_type: TextFileType,
    pub char_count: usize,
    pub line_count: usize,
}

/// Encoded image bytes for one page. Cloning shares the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageImage {
    bytes: Arc<[u8]>,
}

impl PageImage {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// MIME type sniffed from the encoded bytes; JPEG when the format is unknown.
    pub fn mime(&self) -> &'static str {
        match image::guess_format(&self.bytes) {
            Ok(image::ImageFormat::Png) => "image/png",
            Ok(image::ImageFormat::Gif) => "image/gif",
            Ok(image::ImageFormat::Bmp) => "image/bmp",
            Ok(image::ImageFormat::WebP) => "image/webp",
            _ => "image/jpeg",
        }
    }

    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime(), BASE64_STANDARD.encode(&self.bytes))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum AudioFormat {
    Wav,
    Mp3,
}

impl AudioFormat {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "mp3" | "mpeg" => AudioFormat::Mp3,
            _ => AudioFormat::Wav,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Mp3 => "mp3",
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            AudioFormat::Wav => "audio/wav",
            AudioFormat::Mp3 => "audio/mpeg",
        }
    }
}

/// Synthesized speech as returned by the narration backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioPayload {
    pub bytes: Arc<[u8]>,
    pub format: AudioFormat,
}

impl AudioPayload {
    pub fn new(bytes: impl Into<Arc<[u8]>>, format: AudioFormat) -> Self {
        Self {
            bytes: bytes.into(),
            format,
        }
    }

    pub fn data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.format.mime(),
            BASE64_STANDARD.encode(&self.bytes)
        )
    }
}

/// Lifecycle state reported by the narration backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum BackendStatus {
    Stopped,
    Starting,
    Ready,
    Error,
}

impl BackendStatus {
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "stopped" => Some(BackendStatus::Stopped),
            "starting" => Some(BackendStatus::Starting),
            "ready" => Some(BackendStatus::Ready),
            "error" => Some(BackendStatus::Error),
            _ => None,
        }
    }
}

/// Page counts and page bytes of paginated image documents.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn document_info(&self, path: &Path) -> BackendResult<DocumentInfo>;

    async fn fetch_page(&self, path: &Path, index: usize) -> BackendResult<PageImage>;
}

/// Metadata and content of plain-text and Markdown documents.
#[async_trait]
pub trait TextSource: Send + Sync {
    async fn text_info(&self, path: &Path) -> BackendResult<TextInfo>;

    async fn load_text(&self, path: &Path) -> BackendResult<String>;
}

/// Remote text-to-speech service with an explicit process lifecycle.
#[async_trait]
pub trait NarrationBackend: Send + Sync {
    async fn start(&self) -> BackendResult<()>;

    async fn status(&self) -> BackendResult<BackendStatus>;

    async fn stop(&self) -> BackendResult<()>;

    async fn synthesize(&self, text: &str, engine: NarrationEngine) -> BackendResult<AudioPayload>;

    /// Persists audio somewhere the user chooses. `Err(BackendError::Cancelled)` when
    /// the user backs out.
    async fn save_audio(&self, audio: &AudioPayload) -> BackendResult<PathBuf>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffs_png_signature() {
        let page = PageImage::new(vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0]);
        assert_eq!(page.mime(), "image/png");
        assert!(page.data_uri().starts_with("data:image/png;base64,"));
    }

    #[test]
    fn unknown_bytes_default_to_jpeg() {
        let page = PageImage::new(vec![1, 2, 3]);
        assert_eq!(page.mime(), "image/jpeg");
    }

    #[test]
    fn parses_backend_status_labels() {
        assert_eq!(BackendStatus::parse(" Ready "), Some(BackendStatus::Ready));
        assert_eq!(BackendStatus::parse("booting"), None);
    }

    #[test]
    fn audio_payload_uses_format_mime() {
        let audio = AudioPayload::new(vec![1u8, 2, 3], AudioFormat::from_label("mp3"));
        assert_eq!(audio.data_uri(), "data:audio/mpeg;base64,AQID");
    }

    #[test]
    fn text_file_type_follows_extension() {
        assert_eq!(TextFileType::from_path(Path::new("notes/README.MD")), TextFileType::Md);
        assert_eq!(TextFileType::from_path(Path::new("story.txt")), TextFileType::Txt);
        assert_eq!(TextFileType::from_path(Path::new("LICENSE")), TextFileType::Txt);
    }
}
