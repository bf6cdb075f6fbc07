//! Plain text and markdown files from disk, plus a whole-document selection for
//! hosts without a pointer.

use async_trait::async_trait;
use leafview_core::geometry::Rect;
use leafview_core::selection::{RawSelection, SelectionEndpoint, SelectionSource};
use leafview_core::{BackendResult, TextFileType, TextInfo, TextSource};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Default)]
pub struct FileTextSource;

#[async_trait]
impl TextSource for FileTextSource {
    async fn text_info(&self, path: &Path) -> BackendResult<TextInfo> {
        let text = tokio::fs::read_to_string(path).await?;
        Ok(TextInfo {
            filename: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            file_type: TextFileType::from_path(path),
            char_count: text.chars().count(),
            line_count: text.lines().count(),
        })
    }

    async fn load_text(&self, path: &Path) -> BackendResult<String> {
        Ok(tokio::fs::read_to_string(path).await?)
    }
}

/// Selects a fixed passage, as if the user had dragged over it top to bottom.
#[derive(Debug, Default)]
pub struct DocumentSelection {
    text: Mutex<String>,
    bounds: Rect,
}

impl DocumentSelection {
    pub fn new(bounds: Rect) -> Self {
        Self {
            text: Mutex::new(String::new()),
            bounds,
        }
    }

    pub fn select(&self, text: &str) {
        *self.text.lock().unwrap_or_else(PoisonError::into_inner) = text.to_string();
    }
}

impl SelectionSource for DocumentSelection {
    fn read_selection(&self) -> Option<RawSelection> {
        let text = self
            .text
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if text.is_empty() {
            return None;
        }
        let len = text.chars().count();
        Some(RawSelection {
            text,
            bounds: self.bounds,
            anchor: Some(SelectionEndpoint { node: 0, offset: 0 }),
            focus: Some(SelectionEndpoint {
                node: 0,
                offset: len,
            }),
        })
    }
}
