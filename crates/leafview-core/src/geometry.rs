//! Plain screen-space geometry shared by the scheduler, zoom and selection code.
//! Coordinates follow the browser convention: y grows downward.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned box in client coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    pub fn center_x(&self) -> f64 {
        self.left + self.width / 2.0
    }

    /// Position of `point` inside this box as percentages of its size, or `None`
    /// when the box has no area to measure against.
    pub fn relative_percent(&self, point: Point) -> Option<(f64, f64)> {
        if !(self.width > 0.0 && self.height > 0.0) {
            return None;
        }
        let x = (point.x - self.left) / self.width * 100.0;
        let y = (point.y - self.top) / self.height * 100.0;
        if x.is_finite() && y.is_finite() {
            Some((x, y))
        } else {
            None
        }
    }
}

/// Size of the visible client area.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ViewportSize {
    pub width: f64,
    pub height: f64,
}

impl ViewportSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_percent_measures_from_top_left() {
        let rect = Rect::new(100.0, 50.0, 200.0, 100.0);
        assert_eq!(
            rect.relative_percent(Point::new(150.0, 75.0)),
            Some((25.0, 25.0))
        );
    }

    #[test]
    fn relative_percent_rejects_empty_box() {
        let rect = Rect::new(0.0, 0.0, 0.0, 10.0);
        assert_eq!(rect.relative_percent(Point::new(1.0, 1.0)), None);
    }
}
