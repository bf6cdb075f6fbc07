//! Turns a finished text selection into a floating "speak" affordance anchor.

use crate::config::EngineConfig;
use crate::geometry::{Point, Rect, ViewportSize};
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;
use ts_rs::TS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum AnchorSide {
    Above,
    Below,
}

/// Where to draw the action button for the selected text.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export)]
pub struct SelectionAnchor {
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub side: AnchorSide,
}

/// One end of a selection. `node` is the node's position in document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionEndpoint {
    pub node: u64,
    pub offset: usize,
}

/// Selection as read from the host platform.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSelection {
    pub text: String,
    pub bounds: Rect,
    pub anchor: Option<SelectionEndpoint>,
    pub focus: Option<SelectionEndpoint>,
}

/// Reads the platform's current text selection, or `None` when nothing is selected.
pub trait SelectionSource: Send + Sync {
    fn read_selection(&self) -> Option<RawSelection>;
}

/// Button geometry used when placing the anchor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionLayout {
    pub button_height: f64,
    pub margin: f64,
    pub edge_margin: f64,
}

impl SelectionLayout {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            button_height: config.selection_button_height,
            margin: config.selection_margin,
            edge_margin: config.selection_edge_margin,
        }
    }
}

/// Whether the selection was dragged from top to bottom.
///
/// Endpoint order decides when both are known; otherwise the pointer's vertical
/// movement during the drag stands in.
pub fn dragged_down(raw: &RawSelection, pointer_delta_y: Option<f64>) -> bool {
    match (raw.anchor, raw.focus) {
        (Some(anchor), Some(focus)) if anchor.node == focus.node => anchor.offset <= focus.offset,
        (Some(anchor), Some(focus)) => focus.node > anchor.node,
        _ => pointer_delta_y.is_some_and(|dy| dy > 0.0),
    }
}

pub fn compute_anchor(
    raw: &RawSelection,
    viewport: ViewportSize,
    layout: &SelectionLayout,
    pointer_delta_y: Option<f64>,
) -> Option<SelectionAnchor> {
    let text = raw.text.trim();
    if text.is_empty() {
        return None;
    }

    let bounds = raw.bounds;
    let below_y = bounds.bottom() + layout.margin;
    let above_y = bounds.top - layout.margin;
    let (y, side) = if dragged_down(raw, pointer_delta_y) {
        if below_y + layout.button_height > viewport.height {
            (above_y, AnchorSide::Above)
        } else {
            (below_y, AnchorSide::Below)
        }
    } else if above_y - layout.button_height < 0.0 {
        (below_y, AnchorSide::Below)
    } else {
        (above_y, AnchorSide::Above)
    };

    let x = bounds
        .center_x()
        .min(viewport.width - layout.edge_margin)
        .max(layout.edge_margin);

    Some(SelectionAnchor {
        text: text.to_string(),
        x,
        y,
        side,
    })
}

#[derive(Debug, Default)]
struct BridgeState {
    generation: u64,
    anchor: Option<SelectionAnchor>,
    viewport: ViewportSize,
    press_point: Option<Point>,
}

struct Shared {
    source: Arc<dyn SelectionSource>,
    layout: SelectionLayout,
    debounce: Duration,
    state: Mutex<BridgeState>,
    revision: watch::Sender<u64>,
}

impl Shared {
    fn lock(&self) -> std::sync::MutexGuard<'_, BridgeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn bump(&self) {
        self.revision.send_modify(|revision| *revision = revision.wrapping_add(1));
    }
}

/// Tracks pointer interaction and publishes the current [`SelectionAnchor`].
#[derive(Clone)]
pub struct SelectionBridge {
    shared: Arc<Shared>,
}

impl SelectionBridge {
    pub fn new(source: Arc<dyn SelectionSource>, config: &EngineConfig) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            shared: Arc::new(Shared {
                source,
                layout: SelectionLayout::from_config(config),
                debounce: config.selection_debounce(),
                state: Mutex::new(BridgeState::default()),
                revision,
            }),
        }
    }

    pub fn set_viewport_size(&self, viewport: ViewportSize) {
        self.shared.lock().viewport = viewport;
    }

    pub fn anchor(&self) -> Option<SelectionAnchor> {
        self.shared.lock().anchor.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.shared.revision.subscribe()
    }

    /// A fresh gesture starts: any visible anchor is dropped at once and a pending
    /// read from the previous gesture will not publish.
    pub fn on_pointer_down(&self, point: Point) {
        let had_anchor = {
            let mut state = self.shared.lock();
            state.generation = state.generation.wrapping_add(1);
            state.press_point = Some(point);
            state.anchor.take().is_some()
        };
        if had_anchor {
            self.shared.bump();
        }
    }

    /// The gesture finished; read the selection once it has settled.
    pub fn on_pointer_up(&self, point: Point) {
        let (generation, delta_y) = {
            let state = self.shared.lock();
            let delta_y = state.press_point.map(|press| point.y - press.y);
            (state.generation, delta_y)
        };
        let shared = self.shared.clone();
        tokio::spawn(async move {
            tokio::time::sleep(shared.debounce).await;
            let raw = shared.source.read_selection();
            let mut state = shared.lock();
            if state.generation != generation {
                debug!(generation, current = state.generation, "Ignoring stale selection read");
                return;
            }
            let anchor = raw.and_then(|raw| {
                compute_anchor(&raw, state.viewport, &shared.layout, delta_y)
            });
            if state.anchor != anchor {
                state.anchor = anchor;
                drop(state);
                shared.bump();
            }
        });
    }

    /// Drops the anchor, e.g. after its action has been taken.
    pub fn clear(&self) {
        let had_anchor = {
            let mut state = self.shared.lock();
            state.generation = state.generation.wrapping_add(1);
            state.anchor.take().is_some()
        };
        if had_anchor {
            self.shared.bump();
        }
    }
}
