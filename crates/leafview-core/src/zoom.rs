//! Continuous zoom with a focal point, driven by wheel gestures and shortcuts.

use crate::config::EngineConfig;
use crate::geometry::{Point, Rect};
use crate::shortcuts::{KeyPress, Modifiers, shortcut_matches};
use serde::Serialize;
use tracing::debug;
use ts_rs::TS;

pub const MIN_ZOOM: f64 = 0.25;
pub const MAX_ZOOM: f64 = 3.0;

/// Scale plus the transform origin as percentages of the content box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, TS)]
#[ts(export)]
pub struct ViewTransform {
    pub scale: f64,
    pub origin_x: f64,
    pub origin_y: f64,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self {
            scale: 1.0,
            origin_x: 50.0,
            origin_y: 50.0,
        }
    }
}

impl ViewTransform {
    pub fn css_transform(&self) -> String {
        format!("scale({})", self.scale)
    }

    pub fn css_origin(&self) -> String {
        format!("{}% {}%", self.origin_x, self.origin_y)
    }

    pub fn percent(&self) -> u32 {
        (self.scale * 100.0).round() as u32
    }

    /// Indicator text, hidden at exactly 100%.
    pub fn percent_label(&self) -> Option<String> {
        let percent = self.percent();
        (percent != 100).then(|| format!("{percent}%"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomCommand {
    In,
    Out,
    Reset,
}

/// Wheel event over the zoomable container.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelInput {
    pub delta_y: f64,
    pub position: Point,
    pub modifiers: Modifiers,
}

fn clamp_scale(value: f64, fallback: f64) -> f64 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(MIN_ZOOM, MAX_ZOOM)
    }
}

#[derive(Debug, Clone)]
pub struct ZoomController {
    transform: ViewTransform,
    step: f64,
    container: Option<Rect>,
    key_zoom_in: String,
    key_zoom_out: String,
    key_zoom_reset: String,
}

impl ZoomController {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            transform: ViewTransform::default(),
            step: config.zoom_step,
            container: None,
            key_zoom_in: config.key_zoom_in.clone(),
            key_zoom_out: config.key_zoom_out.clone(),
            key_zoom_reset: config.key_zoom_reset.clone(),
        }
    }

    pub fn transform(&self) -> ViewTransform {
        self.transform
    }

    /// Latest bounding box of the zoomed content container, in client coordinates.
    pub fn set_container_bounds(&mut self, bounds: Rect) {
        self.container = Some(bounds);
    }

    /// Sets the scale, refocusing on `focal` when given and measurable.
    pub fn zoom_to(&mut self, scale: f64, focal: Option<Point>) {
        let scale = clamp_scale(scale, self.transform.scale);
        self.transform.scale = scale;
        if let Some(focal) = focal {
            self.refocus(focal);
        }
        debug!(
            scale = self.transform.scale,
            origin_x = self.transform.origin_x,
            origin_y = self.transform.origin_y,
            "Zoom updated"
        );
    }

    /// Ctrl+wheel zooms one step around the pointer. Returns whether the event was
    /// consumed, in which case the host should suppress scrolling.
    pub fn on_wheel(&mut self, wheel: &WheelInput) -> bool {
        if !wheel.modifiers.ctrl {
            return false;
        }
        if wheel.delta_y == 0.0 || wheel.delta_y.is_nan() {
            return true;
        }
        let delta = if wheel.delta_y > 0.0 {
            -self.step
        } else {
            self.step
        };
        self.zoom_to(self.transform.scale + delta, Some(wheel.position));
        true
    }

    pub fn command_for_key(&self, press: &KeyPress) -> Option<ZoomCommand> {
        if shortcut_matches(&self.key_zoom_reset, "ctrl+0", press) {
            Some(ZoomCommand::Reset)
        } else if shortcut_matches(&self.key_zoom_in, "ctrl+=", press) {
            Some(ZoomCommand::In)
        } else if shortcut_matches(&self.key_zoom_out, "ctrl+-", press) {
            Some(ZoomCommand::Out)
        } else {
            None
        }
    }

    /// Applies a zoom shortcut. Returns whether the key was consumed.
    pub fn on_key(&mut self, press: &KeyPress) -> bool {
        match self.command_for_key(press) {
            Some(command) => {
                self.apply(command);
                true
            }
            None => false,
        }
    }

    /// Back to 100% around the center, for a freshly opened document.
    pub fn reset_view(&mut self) {
        self.transform = ViewTransform::default();
    }

    /// Keyboard zoom never moves the origin.
    pub fn apply(&mut self, command: ZoomCommand) {
        let scale = match command {
            ZoomCommand::In => self.transform.scale + self.step,
            ZoomCommand::Out => self.transform.scale - self.step,
            ZoomCommand::Reset => 1.0,
        };
        self.zoom_to(scale, None);
    }

    fn refocus(&mut self, focal: Point) {
        let Some(container) = self.container else {
            return;
        };
        if let Some((x, y)) = container.relative_percent(focal) {
            self.transform.origin_x = x.clamp(0.0, 100.0);
            self.transform.origin_y = y.clamp(0.0, 100.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> ZoomController {
        let mut zoom = ZoomController::new(&EngineConfig::default());
        zoom.set_container_bounds(Rect::new(0.0, 100.0, 800.0, 400.0));
        zoom
    }

    #[test]
    fn scale_is_clamped_for_any_input() {
        let mut zoom = controller();
        for input in [-5.0, 0.0, 0.1, 2.0, 3.5, 1e9, f64::INFINITY, f64::NEG_INFINITY] {
            zoom.zoom_to(input, None);
            let scale = zoom.transform().scale;
            assert!((MIN_ZOOM..=MAX_ZOOM).contains(&scale), "{input} -> {scale}");
        }
        zoom.zoom_to(2.0, None);
        zoom.zoom_to(f64::NAN, None);
        assert_eq!(zoom.transform().scale, 2.0);
    }

    #[test]
    fn focal_point_sets_origin_in_percent() {
        let mut zoom = controller();
        zoom.zoom_to(1.5, Some(Point::new(200.0, 200.0)));
        let transform = zoom.transform();
        assert_eq!(transform.scale, 1.5);
        assert_eq!(transform.origin_x, 25.0);
        assert_eq!(transform.origin_y, 25.0);
    }

    #[test]
    fn focal_point_outside_container_is_clamped() {
        let mut zoom = controller();
        zoom.zoom_to(1.5, Some(Point::new(-400.0, 9000.0)));
        assert_eq!(zoom.transform().origin_x, 0.0);
        assert_eq!(zoom.transform().origin_y, 100.0);
    }

    #[test]
    fn zoom_without_focal_point_keeps_origin() {
        let mut zoom = controller();
        zoom.zoom_to(2.0, Some(Point::new(600.0, 400.0)));
        zoom.zoom_to(0.5, None);
        let transform = zoom.transform();
        assert_eq!(transform.scale, 0.5);
        assert_eq!(transform.origin_x, 75.0);
        assert_eq!(transform.origin_y, 75.0);
    }

    #[test]
    fn reset_shortcut_restores_scale_and_keeps_origin() {
        let mut zoom = controller();
        zoom.zoom_to(2.4, Some(Point::new(80.0, 140.0)));
        assert!(zoom.on_key(&KeyPress::new("0", Modifiers::CTRL)));
        let transform = zoom.transform();
        assert_eq!(transform.scale, 1.0);
        assert_eq!(transform.origin_x, 10.0);
        assert_eq!(transform.origin_y, 10.0);
    }

    #[test]
    fn step_shortcuts_move_by_one_step_and_clamp() {
        let mut zoom = controller();
        assert!(zoom.on_key(&KeyPress::new("+", Modifiers::CTRL.with_shift())));
        assert!((zoom.transform().scale - 1.1).abs() < 1e-9);
        assert!(zoom.on_key(&KeyPress::new("-", Modifiers::CTRL)));
        assert!(zoom.on_key(&KeyPress::new("-", Modifiers::CTRL)));
        assert!((zoom.transform().scale - 0.9).abs() < 1e-9);
        for _ in 0..40 {
            zoom.apply(ZoomCommand::Out);
        }
        assert_eq!(zoom.transform().scale, MIN_ZOOM);
        assert!(!zoom.on_key(&KeyPress::new("-", Modifiers::NONE)));
    }

    #[test]
    fn wheel_requires_ctrl_and_focuses_under_pointer() {
        let mut zoom = controller();
        let plain = WheelInput {
            delta_y: -120.0,
            position: Point::new(400.0, 300.0),
            modifiers: Modifiers::NONE,
        };
        assert!(!zoom.on_wheel(&plain));
        assert_eq!(zoom.transform(), ViewTransform::default());

        let zoom_in = WheelInput {
            modifiers: Modifiers::CTRL,
            position: Point::new(800.0, 100.0),
            ..plain
        };
        assert!(zoom.on_wheel(&zoom_in));
        let transform = zoom.transform();
        assert!((transform.scale - 1.1).abs() < 1e-9);
        assert_eq!(transform.origin_x, 100.0);
        assert_eq!(transform.origin_y, 0.0);

        let zoom_out = WheelInput {
            delta_y: 120.0,
            ..zoom_in
        };
        zoom.on_wheel(&zoom_out);
        assert!((zoom.transform().scale - 1.0).abs() < 1e-9);
    }

    #[test]
    fn percent_label_hidden_at_full_size() {
        let mut zoom = controller();
        assert_eq!(zoom.transform().percent_label(), None);
        zoom.zoom_to(1.25, None);
        assert_eq!(zoom.transform().percent_label().as_deref(), Some("125%"));
        assert_eq!(zoom.transform().css_transform(), "scale(1.25)");
    }
}
