//! A directory of image files read as one paginated document.

use async_trait::async_trait;
use leafview_core::{BackendError, BackendResult, DocumentInfo, PageImage, PageSource};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp"];

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|candidate| candidate.eq_ignore_ascii_case(ext))
        })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Image files directly inside `dir`, in natural filename order.
async fn scan_pages(dir: &Path) -> BackendResult<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut pages = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if entry.file_type().await?.is_file() && is_image_file(&path) {
            pages.push(path);
        }
    }
    pages.sort_by(|a, b| natord::compare(&file_name(a), &file_name(b)));
    Ok(pages)
}

#[derive(Default)]
pub struct FolderPageSource {
    listings: Mutex<HashMap<PathBuf, Arc<Vec<PathBuf>>>>,
}

impl FolderPageSource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn rescan(&self, dir: &Path) -> BackendResult<Arc<Vec<PathBuf>>> {
        let pages = Arc::new(scan_pages(dir).await?);
        self.listings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(dir.to_path_buf(), pages.clone());
        Ok(pages)
    }

    async fn pages(&self, dir: &Path) -> BackendResult<Arc<Vec<PathBuf>>> {
        let cached = self
            .listings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(dir)
            .cloned();
        match cached {
            Some(pages) => Ok(pages),
            None => self.rescan(dir).await,
        }
    }
}

#[async_trait]
impl PageSource for FolderPageSource {
    async fn document_info(&self, path: &Path) -> BackendResult<DocumentInfo> {
        let pages = self.rescan(path).await?;
        info!(path = %path.display(), pages = pages.len(), "Scanned page folder");
        Ok(DocumentInfo {
            filename: file_name(path),
            total_pages: pages.len(),
        })
    }

    async fn fetch_page(&self, path: &Path, index: usize) -> BackendResult<PageImage> {
        let pages = self.pages(path).await?;
        let page = pages.get(index).ok_or(BackendError::OutOfRange {
            index,
            total: pages.len(),
        })?;
        let bytes = tokio::fs::read(page).await?;
        debug!(index, path = %page.display(), bytes = bytes.len(), "Read page image");
        Ok(PageImage::new(bytes))
    }
}
