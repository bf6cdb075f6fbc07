//! Configuration loading for the reader engine.
//!
//! All user-tunable settings are centralized here and loaded from
//! `conf/config.toml` if present. Any missing or invalid entries fall back to
//! defaults so a host can always construct an engine.

mod defaults;
mod io;
mod models;

pub use io::{load_config, parse_config, serialize_config};
pub use models::{EngineConfig, LogLevel, NarrationEngine};
