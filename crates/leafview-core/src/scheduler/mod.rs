//! Viewport-driven page loading for paginated image documents.
//!
//! A [`LoadScheduler`] owns the per-document load state: one [`PageSlot`] per page,
//! the in-flight and completed index sets, and the lazily created viewport watcher.
//! Everything is scoped to a document generation; switching documents drops the
//! whole scope, and fetch completions for an older generation are discarded.

mod slot;
mod watcher;

pub use slot::{PageSlot, PageSlotView};
pub use watcher::ScrollViewport;

use crate::backend::{DocumentInfo, PageSource};
use crate::config::EngineConfig;
use crate::error::BackendResult;
use crate::geometry::Rect;
use std::collections::BTreeSet;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use watcher::ViewportWatcher;

/// Indices covered by a preload burst starting at `index`, clamped to the document.
pub fn burst_range(index: usize, total_pages: usize, ahead: usize) -> Range<usize> {
    if index >= total_pages {
        return index..index;
    }
    let end = index.saturating_add(ahead).min(total_pages - 1);
    index..end + 1
}

#[derive(Debug)]
struct DocumentScope {
    generation: u64,
    path: PathBuf,
    slots: Vec<PageSlot>,
    in_flight: BTreeSet<usize>,
    completed: BTreeSet<usize>,
    watcher: Option<ViewportWatcher>,
}

impl DocumentScope {
    fn new(generation: u64, path: PathBuf, total_pages: usize) -> Self {
        Self {
            generation,
            path,
            slots: (0..total_pages).map(PageSlot::empty).collect(),
            in_flight: BTreeSet::new(),
            completed: BTreeSet::new(),
            watcher: None,
        }
    }

    fn total_pages(&self) -> usize {
        self.slots.len()
    }
}

#[derive(Debug, Default)]
struct SchedulerState {
    next_generation: u64,
    open_request: u64,
    viewport: Option<ScrollViewport>,
    document: Option<DocumentScope>,
}

struct Shared {
    source: Arc<dyn PageSource>,
    preload_ahead: usize,
    margin_ratio: f64,
    state: Mutex<SchedulerState>,
    revision: watch::Sender<u64>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn bump_revision(&self) {
        self.revision.send_modify(|revision| *revision = revision.wrapping_add(1));
    }
}

/// Loads page images ahead of the reader's scroll position.
///
/// Fetches are spawned on the ambient Tokio runtime, so the methods that can
/// trigger loads must be called from within one.
#[derive(Clone)]
pub struct LoadScheduler {
    shared: Arc<Shared>,
}

impl LoadScheduler {
    pub fn new(source: Arc<dyn PageSource>, config: &EngineConfig) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            shared: Arc::new(Shared {
                source,
                preload_ahead: config.preload_ahead,
                margin_ratio: config.viewport_margin_ratio,
                state: Mutex::new(SchedulerState::default()),
                revision,
            }),
        }
    }

    /// Asks the page source for the document's page count and opens it.
    ///
    /// Returns `Ok(None)` when another open was started while this one was waiting.
    pub async fn open(&self, path: &Path) -> BackendResult<Option<DocumentInfo>> {
        let request = {
            let mut state = self.shared.lock();
            state.open_request = state.open_request.wrapping_add(1);
            state.open_request
        };
        let info = self.shared.source.document_info(path).await?;
        {
            let state = self.shared.lock();
            if state.open_request != request {
                debug!(path = %path.display(), request, "Ignoring superseded document open");
                return Ok(None);
            }
        }
        self.set_document(path, info.total_pages);
        Ok(Some(info))
    }

    /// Switches to `path` with `total_pages` fresh slots. Re-setting the current
    /// document with the same page count keeps its state.
    pub fn set_document(&self, path: &Path, total_pages: usize) {
        {
            let mut state = self.shared.lock();
            if let Some(document) = &state.document {
                if document.path == path && document.total_pages() == total_pages {
                    return;
                }
            }
            state.next_generation = state.next_generation.wrapping_add(1);
            let generation = state.next_generation;
            state.document = Some(DocumentScope::new(generation, path.to_path_buf(), total_pages));
            info!(path = %path.display(), total_pages, generation, "Opened paginated document");
        }
        self.shared.bump_revision();
    }

    /// Drops the current document scope, its watcher and any pending results.
    pub fn close(&self) {
        let closed = self.shared.lock().document.take();
        if let Some(document) = closed {
            debug!(path = %document.path.display(), generation = document.generation, "Closed document");
            self.shared.bump_revision();
        }
    }

    pub fn document_path(&self) -> Option<PathBuf> {
        self.shared
            .lock()
            .document
            .as_ref()
            .map(|document| document.path.clone())
    }

    pub fn total_pages(&self) -> usize {
        self.shared
            .lock()
            .document
            .as_ref()
            .map(DocumentScope::total_pages)
            .unwrap_or(0)
    }

    pub fn slots(&self) -> Vec<PageSlot> {
        self.shared
            .lock()
            .document
            .as_ref()
            .map(|document| document.slots.clone())
            .unwrap_or_default()
    }

    pub fn slot(&self, index: usize) -> Option<PageSlot> {
        self.shared
            .lock()
            .document
            .as_ref()
            .and_then(|document| document.slots.get(index).cloned())
    }

    pub fn slot_views(&self) -> Vec<PageSlotView> {
        self.slots().iter().map(PageSlot::view).collect()
    }

    /// Receiver that ticks whenever any slot or the document changes.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.shared.revision.subscribe()
    }

    /// Registers the placeholder rendered for page `index`.
    ///
    /// The first registration for a document creates its viewport watcher. If the
    /// placeholder is already inside the watched area a preload burst starts.
    pub fn observe(&self, index: usize, bounds: Rect) {
        let entered = {
            let mut state = self.shared.lock();
            let viewport = state.viewport;
            let Some(document) = state.document.as_mut() else {
                return;
            };
            if index >= document.total_pages() {
                return;
            }
            let margin_ratio = self.shared.margin_ratio;
            let generation = document.generation;
            let watcher = document.watcher.get_or_insert_with(|| {
                debug!(generation, "Creating viewport watcher");
                ViewportWatcher::new(margin_ratio, viewport)
            });
            watcher.observe(index, bounds)
        };
        if entered {
            self.preload_from(index);
        }
    }

    /// Moves the scroll viewport, starting a burst for each placeholder that entered it.
    pub fn set_viewport(&self, viewport: ScrollViewport) {
        let entered = {
            let mut state = self.shared.lock();
            state.viewport = Some(viewport);
            match state.document.as_mut().and_then(|doc| doc.watcher.as_mut()) {
                Some(watcher) => watcher.set_viewport(viewport),
                None => Vec::new(),
            }
        };
        for index in entered {
            self.preload_from(index);
        }
    }

    /// 1-based page under the viewport midpoint, for the page indicator.
    pub fn current_page(&self) -> Option<usize> {
        let state = self.shared.lock();
        state
            .document
            .as_ref()
            .and_then(|document| document.watcher.as_ref())
            .and_then(ViewportWatcher::index_at_midpoint)
            .map(|index| index + 1)
    }

    pub fn observed_count(&self) -> usize {
        self.shared
            .lock()
            .document
            .as_ref()
            .and_then(|document| document.watcher.as_ref())
            .map(ViewportWatcher::len)
            .unwrap_or(0)
    }

    /// Requests page `index` and the configured number of pages after it.
    pub fn preload_from(&self, index: usize) {
        let total = self.total_pages();
        let range = burst_range(index, total, self.shared.preload_ahead);
        debug!(start = range.start, end = range.end, total, "Preload burst");
        for page in range {
            self.request(page);
        }
    }

    /// Starts fetching page `index` unless it is out of range, loaded or in flight.
    pub fn request(&self, index: usize) {
        let (generation, path) = {
            let mut state = self.shared.lock();
            let Some(document) = state.document.as_mut() else {
                return;
            };
            if index >= document.total_pages()
                || document.completed.contains(&index)
                || document.in_flight.contains(&index)
            {
                return;
            }
            document.in_flight.insert(index);
            document.slots[index].loading = true;
            (document.generation, document.path.clone())
        };
        self.shared.bump_revision();

        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            let result = shared.source.fetch_page(&path, index).await;
            let applied = {
                let mut state = shared.lock();
                match state.document.as_mut() {
                    Some(document)
                        if document.generation == generation && index < document.slots.len() =>
                    {
                        document.in_flight.remove(&index);
                        let slot = &mut document.slots[index];
                        slot.loading = false;
                        match result {
                            Ok(image) => {
                                debug!(index, bytes = image.len(), generation, "Loaded page");
                                slot.content = Some(image);
                                document.completed.insert(index);
                            }
                            Err(err) => {
                                warn!(index, generation, "Failed to load page: {err}");
                                slot.content = None;
                            }
                        }
                        true
                    }
                    _ => {
                        debug!(index, generation, "Ignoring page result for a closed document");
                        false
                    }
                }
            };
            if applied {
                shared.bump_revision();
            }
        });
    }
}
