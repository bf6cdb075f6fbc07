use serde::{Deserialize, Serialize};
use std::time::Duration;
use ts_rs::TS;

/// Engine configuration; deserializable from TOML.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    #[serde(default = "crate::config::defaults::default_log_level")]
    pub log_level: LogLevel,
    #[serde(default = "crate::config::defaults::default_preload_ahead")]
    pub preload_ahead: usize,
    #[serde(default = "crate::config::defaults::default_viewport_margin_ratio")]
    pub viewport_margin_ratio: f64,
    #[serde(default = "crate::config::defaults::default_zoom_step")]
    pub zoom_step: f64,
    #[serde(default = "crate::config::defaults::default_key_zoom_in")]
    pub key_zoom_in: String,
    #[serde(default = "crate::config::defaults::default_key_zoom_out")]
    pub key_zoom_out: String,
    #[serde(default = "crate::config::defaults::default_key_zoom_reset")]
    pub key_zoom_reset: String,
    #[serde(default = "crate::config::defaults::default_selection_debounce_ms")]
    pub selection_debounce_ms: u64,
    #[serde(default = "crate::config::defaults::default_selection_button_height")]
    pub selection_button_height: f64,
    #[serde(default = "crate::config::defaults::default_selection_margin")]
    pub selection_margin: f64,
    #[serde(default = "crate::config::defaults::default_selection_edge_margin")]
    pub selection_edge_margin: f64,
    #[serde(default = "crate::config::defaults::default_narration_poll_interval_ms")]
    pub narration_poll_interval_ms: u64,
    #[serde(default)]
    pub narration_engine: NarrationEngine,
    #[serde(default = "crate::config::defaults::default_narration_base_url")]
    pub narration_base_url: String,
    #[serde(default)]
    pub narration_server_command: Vec<String>,
    #[serde(default = "crate::config::defaults::default_narration_health_timeout_secs")]
    pub narration_health_timeout_secs: u64,
    #[serde(default = "crate::config::defaults::default_narration_speak_timeout_secs")]
    pub narration_speak_timeout_secs: u64,
    #[serde(default)]
    pub audio_save_dir: Option<String>,
    #[serde(default = "crate::config::defaults::default_font_size")]
    pub font_size: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            log_level: crate::config::defaults::default_log_level(),
            preload_ahead: crate::config::defaults::default_preload_ahead(),
            viewport_margin_ratio: crate::config::defaults::default_viewport_margin_ratio(),
            zoom_step: crate::config::defaults::default_zoom_step(),
            key_zoom_in: crate::config::defaults::default_key_zoom_in(),
            key_zoom_out: crate::config::defaults::default_key_zoom_out(),
            key_zoom_reset: crate::config::defaults::default_key_zoom_reset(),
            selection_debounce_ms: crate::config::defaults::default_selection_debounce_ms(),
            selection_button_height: crate::config::defaults::default_selection_button_height(),
            selection_margin: crate::config::defaults::default_selection_margin(),
            selection_edge_margin: crate::config::defaults::default_selection_edge_margin(),
            narration_poll_interval_ms:
                crate::config::defaults::default_narration_poll_interval_ms(),
            narration_engine: NarrationEngine::default(),
            narration_base_url: crate::config::defaults::default_narration_base_url(),
            narration_server_command: Vec::new(),
            narration_health_timeout_secs:
                crate::config::defaults::default_narration_health_timeout_secs(),
            narration_speak_timeout_secs:
                crate::config::defaults::default_narration_speak_timeout_secs(),
            audio_save_dir: None,
            font_size: crate::config::defaults::default_font_size(),
        }
    }
}

impl EngineConfig {
    /// Pulls out-of-range values back into the ranges the engine relies on.
    pub fn sanitized(mut self) -> Self {
        if !self.viewport_margin_ratio.is_finite() || self.viewport_margin_ratio < 0.0 {
            self.viewport_margin_ratio = crate::config::defaults::default_viewport_margin_ratio();
        }
        if !self.zoom_step.is_finite() || self.zoom_step <= 0.0 {
            self.zoom_step = crate::config::defaults::default_zoom_step();
        }
        self.narration_poll_interval_ms = self.narration_poll_interval_ms.max(1);
        if !self.selection_button_height.is_finite() || self.selection_button_height < 0.0 {
            self.selection_button_height =
                crate::config::defaults::default_selection_button_height();
        }
        if !self.selection_margin.is_finite() || self.selection_margin < 0.0 {
            self.selection_margin = crate::config::defaults::default_selection_margin();
        }
        if !self.selection_edge_margin.is_finite() || self.selection_edge_margin < 0.0 {
            self.selection_edge_margin = crate::config::defaults::default_selection_edge_margin();
        }
        self
    }

    pub fn narration_poll_interval(&self) -> Duration {
        Duration::from_millis(self.narration_poll_interval_ms.max(1))
    }

    pub fn selection_debounce(&self) -> Duration {
        Duration::from_millis(self.selection_debounce_ms)
    }
}

/// Speech engine the narration backend should synthesize with.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default, TS)]
#[ts(export)]
pub enum NarrationEngine {
    #[serde(rename = "edge-tts")]
    EdgeTts,
    #[default]
    #[serde(rename = "chattts")]
    ChatTts,
}

impl NarrationEngine {
    pub fn as_str(self) -> &'static str {
        match self {
            NarrationEngine::EdgeTts => "edge-tts",
            NarrationEngine::ChatTts => "chattts",
        }
    }
}

impl std::fmt::Display for NarrationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            NarrationEngine::EdgeTts => "Edge TTS",
            NarrationEngine::ChatTts => "ChatTTS",
        };
        write!(f, "{}", label)
    }
}

/// Supported logging verbosity levels.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Debug
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_filter_str())
    }
}

impl LogLevel {
    pub fn as_filter_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}
