//! Concrete collaborators for the command-line host.

mod folder;
mod http;
mod text;

pub use folder::FolderPageSource;
pub use http::HttpNarrationBackend;
pub use text::{DocumentSelection, FileTextSource};
