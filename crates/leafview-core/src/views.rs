//! Host-view compositions: the paginated image reader (scheduler + zoom) and the
//! text reader (selection + narration, with optional zoom).

use crate::backend::{DocumentInfo, PageSource, TextFileType, TextInfo, TextSource};
use crate::config::EngineConfig;
use crate::error::BackendResult;
use crate::geometry::{Point, Rect};
use crate::narration::{NarrationPhase, NarrationSession, NarrationSnapshot};
use crate::scheduler::{LoadScheduler, PageSlotView, ScrollViewport};
use crate::selection::{SelectionAnchor, SelectionBridge, SelectionSource};
use crate::shortcuts::KeyPress;
use crate::zoom::{ViewTransform, WheelInput, ZoomController};
use serde::Serialize;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};
use ts_rs::TS;

pub const MIN_FONT_SIZE: u32 = 12;
pub const MAX_FONT_SIZE: u32 = 32;
pub const FONT_SIZE_STEP: u32 = 2;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// File name without one of the given extensions (matched case-insensitively).
pub fn display_title(filename: &str, extensions: &[&str]) -> String {
    let Some((stem, ext)) = filename.rsplit_once('.') else {
        return filename.to_string();
    };
    if extensions
        .iter()
        .any(|candidate| candidate.eq_ignore_ascii_case(ext))
    {
        stem.to_string()
    } else {
        filename.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct PageIndicator {
    pub current: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export)]
pub struct ComicReaderSnapshot {
    pub title: String,
    pub pages: Vec<PageSlotView>,
    pub indicator: Option<PageIndicator>,
    pub transform: ViewTransform,
    pub zoom_label: Option<String>,
}

/// Paginated image document: lazy page loading plus zoom.
pub struct ComicReaderView {
    scheduler: LoadScheduler,
    zoom: Mutex<ZoomController>,
    info: Mutex<Option<DocumentInfo>>,
}

impl ComicReaderView {
    pub fn new(source: Arc<dyn PageSource>, config: &EngineConfig) -> Self {
        Self {
            scheduler: LoadScheduler::new(source, config),
            zoom: Mutex::new(ZoomController::new(config)),
            info: Mutex::new(None),
        }
    }

    pub fn scheduler(&self) -> &LoadScheduler {
        &self.scheduler
    }

    /// Opens `path`, resetting zoom. Returns `None` when another open superseded this one.
    pub async fn open(&self, path: &Path) -> BackendResult<Option<DocumentInfo>> {
        let Some(info) = self.scheduler.open(path).await? else {
            return Ok(None);
        };
        *lock(&self.info) = Some(info.clone());
        lock(&self.zoom).reset_view();
        Ok(Some(info))
    }

    pub fn close(&self) {
        self.scheduler.close();
        *lock(&self.info) = None;
    }

    pub fn info(&self) -> Option<DocumentInfo> {
        lock(&self.info).clone()
    }

    pub fn title(&self) -> Option<String> {
        lock(&self.info)
            .as_ref()
            .map(|info| display_title(&info.filename, &["zip", "cbz"]))
    }

    pub fn observe(&self, index: usize, bounds: Rect) {
        self.scheduler.observe(index, bounds);
    }

    pub fn set_viewport(&self, viewport: ScrollViewport) {
        self.scheduler.set_viewport(viewport);
    }

    pub fn set_container_bounds(&self, bounds: Rect) {
        lock(&self.zoom).set_container_bounds(bounds);
    }

    pub fn zoom_to(&self, scale: f64, focal: Option<Point>) {
        lock(&self.zoom).zoom_to(scale, focal);
    }

    pub fn on_wheel(&self, wheel: &WheelInput) -> bool {
        lock(&self.zoom).on_wheel(wheel)
    }

    pub fn on_key(&self, press: &KeyPress) -> bool {
        lock(&self.zoom).on_key(press)
    }

    pub fn transform(&self) -> ViewTransform {
        lock(&self.zoom).transform()
    }

    /// `current / total`, starting at page 1 before any placeholder is measured.
    pub fn page_indicator(&self) -> Option<PageIndicator> {
        let total = lock(&self.info).as_ref()?.total_pages;
        let current = self.scheduler.current_page().unwrap_or(1).min(total.max(1));
        Some(PageIndicator { current, total })
    }

    pub fn snapshot(&self) -> ComicReaderSnapshot {
        let transform = self.transform();
        ComicReaderSnapshot {
            title: self.title().unwrap_or_default(),
            pages: self.scheduler.slot_views(),
            indicator: self.page_indicator(),
            transform,
            zoom_label: transform.percent_label(),
        }
    }
}

/// Reading font size in pixels, stepped within `[12, 32]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FontSize {
    value: u32,
    default: u32,
}

impl FontSize {
    pub fn new(default: u32) -> Self {
        let default = default.clamp(MIN_FONT_SIZE, MAX_FONT_SIZE);
        Self {
            value: default,
            default,
        }
    }

    pub fn value(self) -> u32 {
        self.value
    }

    pub fn increase(&mut self) -> u32 {
        self.value = (self.value + FONT_SIZE_STEP).min(MAX_FONT_SIZE);
        self.value
    }

    pub fn decrease(&mut self) -> u32 {
        self.value = self
            .value
            .saturating_sub(FONT_SIZE_STEP)
            .max(MIN_FONT_SIZE);
        self.value
    }

    pub fn reset(&mut self) -> u32 {
        self.value = self.default;
        self.value
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextDocument {
    pub info: TextInfo,
    pub content: String,
}

/// The floating "speak" button: where to draw it and whether a request is running.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export)]
pub struct FloatingAction {
    pub anchor: SelectionAnchor,
    pub loading: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export)]
pub struct TextReaderSnapshot {
    pub title: String,
    pub file_type: Option<TextFileType>,
    pub font_size: u32,
    pub floating_action: Option<FloatingAction>,
    pub narration: NarrationSnapshot,
}

/// Plain text or markdown document with narration of selected passages.
pub struct TextReaderView {
    source: Arc<dyn TextSource>,
    selection: SelectionBridge,
    narration: NarrationSession,
    font_size: Mutex<FontSize>,
    zoom: Option<Mutex<ZoomController>>,
    open_request: AtomicU64,
    document: Mutex<Option<TextDocument>>,
}

impl TextReaderView {
    pub fn new(
        source: Arc<dyn TextSource>,
        selection_source: Arc<dyn SelectionSource>,
        narration: NarrationSession,
        config: &EngineConfig,
    ) -> Self {
        Self {
            source,
            selection: SelectionBridge::new(selection_source, config),
            narration,
            font_size: Mutex::new(FontSize::new(config.font_size)),
            zoom: None,
            open_request: AtomicU64::new(0),
            document: Mutex::new(None),
        }
    }

    pub fn with_zoom(mut self, config: &EngineConfig) -> Self {
        self.zoom = Some(Mutex::new(ZoomController::new(config)));
        self
    }

    pub fn selection(&self) -> &SelectionBridge {
        &self.selection
    }

    pub fn narration(&self) -> &NarrationSession {
        &self.narration
    }

    /// Loads info and content together. Returns `None` if a later open won the race.
    pub async fn open(&self, path: &Path) -> BackendResult<Option<TextInfo>> {
        let request_id = self.open_request.fetch_add(1, Ordering::AcqRel) + 1;
        let result = tokio::try_join!(self.source.text_info(path), self.source.load_text(path));
        if self.open_request.load(Ordering::Acquire) != request_id {
            debug!(request_id, path = %path.display(), "Ignoring stale text open");
            return Ok(None);
        }
        let (info, content) = result?;
        info!(
            path = %path.display(),
            chars = info.char_count,
            lines = info.line_count,
            "Opened text document"
        );
        *lock(&self.document) = Some(TextDocument {
            info: info.clone(),
            content,
        });
        self.selection.clear();
        Ok(Some(info))
    }

    pub fn document(&self) -> Option<TextDocument> {
        lock(&self.document).clone()
    }

    pub fn title(&self) -> Option<String> {
        lock(&self.document)
            .as_ref()
            .map(|doc| display_title(&doc.info.filename, &["md", "txt"]))
    }

    /// Starts narration when stopped or failed, stops it when ready, ignores it while starting.
    pub async fn toggle_narration(&self) {
        match self.narration.phase() {
            NarrationPhase::Stopped | NarrationPhase::Error => self.narration.start().await,
            NarrationPhase::Ready => self.narration.stop().await,
            NarrationPhase::Starting => debug!("Narration toggle ignored while starting"),
        }
    }

    /// Speaks the selected text and clears the anchor. Returns whether anything was spoken.
    pub async fn speak_selection(&self) -> bool {
        if self.narration.phase() != NarrationPhase::Ready {
            return false;
        }
        let Some(anchor) = self.selection.anchor() else {
            return false;
        };
        self.selection.clear();
        self.narration.speak(&anchor.text).await;
        true
    }

    /// The action button is only offered while narration is ready.
    pub fn floating_action(&self) -> Option<FloatingAction> {
        let narration = self.narration.snapshot();
        if narration.phase != NarrationPhase::Ready {
            return None;
        }
        self.selection.anchor().map(|anchor| FloatingAction {
            anchor,
            loading: narration.is_request_pending,
        })
    }

    pub fn font_size(&self) -> u32 {
        lock(&self.font_size).value()
    }

    pub fn increase_font(&self) -> u32 {
        lock(&self.font_size).increase()
    }

    pub fn decrease_font(&self) -> u32 {
        lock(&self.font_size).decrease()
    }

    pub fn reset_font(&self) -> u32 {
        lock(&self.font_size).reset()
    }

    /// Zoom is only wired up when the view was built [`with_zoom`](Self::with_zoom).
    pub fn set_container_bounds(&self, bounds: Rect) {
        if let Some(zoom) = &self.zoom {
            lock(zoom).set_container_bounds(bounds);
        }
    }

    pub fn zoom_to(&self, scale: f64, focal: Option<Point>) {
        if let Some(zoom) = &self.zoom {
            lock(zoom).zoom_to(scale, focal);
        }
    }

    pub fn on_wheel(&self, wheel: &WheelInput) -> bool {
        self.zoom
            .as_ref()
            .is_some_and(|zoom| lock(zoom).on_wheel(wheel))
    }

    pub fn on_key(&self, press: &KeyPress) -> bool {
        self.zoom
            .as_ref()
            .is_some_and(|zoom| lock(zoom).on_key(press))
    }

    pub fn transform(&self) -> Option<ViewTransform> {
        self.zoom.as_ref().map(|zoom| lock(zoom).transform())
    }

    pub fn snapshot(&self) -> TextReaderSnapshot {
        let document = lock(&self.document);
        TextReaderSnapshot {
            title: document
                .as_ref()
                .map(|doc| display_title(&doc.info.filename, &["md", "txt"]))
                .unwrap_or_default(),
            file_type: document.as_ref().map(|doc| doc.info.file_type),
            font_size: self.font_size(),
            floating_action: self.floating_action(),
            narration: self.narration.snapshot(),
        }
    }
}
