pub(crate) fn default_log_level() -> crate::config::LogLevel {
    crate::config::LogLevel::Debug
}

pub(crate) fn default_preload_ahead() -> usize {
    5
}

pub(crate) fn default_viewport_margin_ratio() -> f64 {
    1.0
}

pub(crate) fn default_zoom_step() -> f64 {
    0.1
}

pub(crate) fn default_key_zoom_in() -> String {
    "ctrl+=".to_string()
}

pub(crate) fn default_key_zoom_out() -> String {
    "ctrl+-".to_string()
}

pub(crate) fn default_key_zoom_reset() -> String {
    "ctrl+0".to_string()
}

pub(crate) fn default_selection_debounce_ms() -> u64 {
    10
}

pub(crate) fn default_selection_button_height() -> f64 {
    40.0
}

pub(crate) fn default_selection_margin() -> f64 {
    10.0
}

pub(crate) fn default_selection_edge_margin() -> f64 {
    50.0
}

pub(crate) fn default_narration_poll_interval_ms() -> u64 {
    2000
}

pub(crate) fn default_narration_base_url() -> String {
    "http://127.0.0.1:9966".to_string()
}

pub(crate) fn default_narration_health_timeout_secs() -> u64 {
    1
}

pub(crate) fn default_narration_speak_timeout_secs() -> u64 {
    300
}

pub(crate) fn default_font_size() -> u32 {
    18
}
