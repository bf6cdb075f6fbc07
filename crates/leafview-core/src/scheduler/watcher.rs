use crate::geometry::Rect;
use std::collections::BTreeMap;

/// Visible window of the scroll container, in content coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScrollViewport {
    pub top: f64,
    pub height: f64,
}

impl ScrollViewport {
    pub fn new(top: f64, height: f64) -> Self {
        Self { top, height }
    }

    pub fn midpoint(&self) -> f64 {
        self.top + self.height / 2.0
    }
}

#[derive(Debug, Clone, Copy)]
struct Placeholder {
    bounds: Rect,
    intersecting: bool,
}

/// Intersection watcher shared by every page placeholder of one document.
///
/// A placeholder fires when it transitions into the watched area, which is the
/// viewport grown by `margin_ratio` viewport heights above and below. Leaving and
/// re-entering fires again.
#[derive(Debug)]
pub(crate) struct ViewportWatcher {
    margin_ratio: f64,
    viewport: Option<ScrollViewport>,
    placeholders: BTreeMap<usize, Placeholder>,
}

impl ViewportWatcher {
    pub(crate) fn new(margin_ratio: f64, viewport: Option<ScrollViewport>) -> Self {
        Self {
            margin_ratio,
            viewport,
            placeholders: BTreeMap::new(),
        }
    }

    /// Registers or moves a placeholder. Returns true when it just became visible.
    pub(crate) fn observe(&mut self, index: usize, bounds: Rect) -> bool {
        let now = self.intersects(bounds);
        let was = self
            .placeholders
            .get(&index)
            .map(|placeholder| placeholder.intersecting)
            .unwrap_or(false);
        self.placeholders.insert(
            index,
            Placeholder {
                bounds,
                intersecting: now,
            },
        );
        now && !was
    }

    /// Moves the viewport and returns the placeholders that entered the watched area,
    /// in index order.
    pub(crate) fn set_viewport(&mut self, viewport: ScrollViewport) -> Vec<usize> {
        self.viewport = Some(viewport);
        let mut entered = Vec::new();
        let keys: Vec<usize> = self.placeholders.keys().copied().collect();
        for index in keys {
            let Some(bounds) = self.placeholders.get(&index).map(|p| p.bounds) else {
                continue;
            };
            let now = self.intersects(bounds);
            if let Some(placeholder) = self.placeholders.get_mut(&index) {
                if now && !placeholder.intersecting {
                    entered.push(index);
                }
                placeholder.intersecting = now;
            }
        }
        entered
    }

    /// Placeholder containing the vertical midpoint of the viewport.
    pub(crate) fn index_at_midpoint(&self) -> Option<usize> {
        let mid = self.viewport?.midpoint();
        self.placeholders
            .iter()
            .find(|(_, placeholder)| {
                placeholder.bounds.top <= mid && placeholder.bounds.bottom() > mid
            })
            .map(|(index, _)| *index)
    }

    pub(crate) fn len(&self) -> usize {
        self.placeholders.len()
    }

    fn intersects(&self, bounds: Rect) -> bool {
        let Some(viewport) = self.viewport else {
            return false;
        };
        let margin = viewport.height.max(0.0) * self.margin_ratio;
        let watched_top = viewport.top - margin;
        let watched_bottom = viewport.top + viewport.height + margin;
        bounds.bottom() >= watched_top && bounds.top <= watched_bottom
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(index: usize) -> Rect {
        Rect::new(0.0, index as f64 * 400.0, 800.0, 400.0)
    }

    #[test]
    fn placeholder_fires_on_registration_when_already_visible() {
        let mut watcher = ViewportWatcher::new(0.0, Some(ScrollViewport::new(0.0, 600.0)));
        assert!(watcher.observe(0, page(0)));
        assert!(watcher.observe(1, page(1)));
        assert!(!watcher.observe(2, page(2)));
    }

    #[test]
    fn margin_extends_the_watched_area() {
        let mut watcher = ViewportWatcher::new(1.0, Some(ScrollViewport::new(0.0, 600.0)));
        assert!(watcher.observe(2, page(2)));
        assert!(!watcher.observe(4, page(4)));
    }

    #[test]
    fn fires_again_after_leaving_and_reentering() {
        let mut watcher = ViewportWatcher::new(0.0, Some(ScrollViewport::new(0.0, 400.0)));
        for index in 0..5 {
            watcher.observe(index, page(index));
        }
        assert_eq!(watcher.set_viewport(ScrollViewport::new(1700.0, 400.0)), vec![4]);
        assert_eq!(watcher.set_viewport(ScrollViewport::new(0.0, 400.0)), vec![0, 1]);
        assert_eq!(watcher.set_viewport(ScrollViewport::new(0.0, 400.0)), Vec::<usize>::new());
    }

    #[test]
    fn midpoint_lookup_uses_registered_geometry() {
        let mut watcher = ViewportWatcher::new(0.0, None);
        for index in 0..3 {
            watcher.observe(index, page(index));
        }
        watcher.set_viewport(ScrollViewport::new(500.0, 200.0));
        assert_eq!(watcher.index_at_midpoint(), Some(1));
    }
}
