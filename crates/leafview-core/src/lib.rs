//! Interactive reader engine: viewport-driven page loading, zoom, selection
//! actions and a narration session, composed into host views.

pub mod backend;
pub mod bindings;
pub mod cancellation;
pub mod config;
pub mod error;
pub mod geometry;
pub mod narration;
pub mod scheduler;
pub mod selection;
pub mod shortcuts;
pub mod views;
pub mod zoom;

#[cfg(test)]
mod test_support;

pub use backend::{
    AudioFormat, AudioPayload, BackendStatus, DocumentInfo, NarrationBackend, PageImage,
    PageSource, TextFileType, TextInfo, TextSource,
};
pub use bindings::export_ts_bindings;
pub use config::{EngineConfig, LogLevel, NarrationEngine};
pub use error::{BackendError, BackendResult};
pub use narration::{NarrationPhase, NarrationSession, NarrationSnapshot};
pub use scheduler::{LoadScheduler, PageSlot, ScrollViewport};
pub use selection::{SelectionAnchor, SelectionBridge};
pub use views::{ComicReaderView, TextReaderView};
pub use zoom::{ViewTransform, ZoomController};
