use crate::backend::PageImage;
use serde::Serialize;
use ts_rs::TS;

/// Load state of one page of the open document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSlot {
    pub index: usize,
    pub content: Option<PageImage>,
    pub loading: bool,
}

impl PageSlot {
    pub(crate) fn empty(index: usize) -> Self {
        Self {
            index,
            content: None,
            loading: false,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.content.is_some()
    }

    pub fn view(&self) -> PageSlotView {
        PageSlotView {
            index: self.index,
            src: self.content.as_ref().map(PageImage::data_uri),
            loading: self.loading,
        }
    }
}

/// Renderer-facing form of a [`PageSlot`] with the image inlined as a data URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct PageSlotView {
    pub index: usize,
    pub src: Option<String>,
    pub loading: bool,
}
