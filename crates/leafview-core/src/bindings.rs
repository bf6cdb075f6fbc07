//! TypeScript declarations for every snapshot a web host consumes.

use crate::backend::{BackendStatus, DocumentInfo, TextFileType, TextInfo};
use crate::config::NarrationEngine;
use crate::geometry::{Point, Rect, ViewportSize};
use crate::narration::{NarrationPhase, NarrationSnapshot};
use crate::scheduler::PageSlotView;
use crate::selection::{AnchorSide, SelectionAnchor};
use crate::views::{ComicReaderSnapshot, FloatingAction, PageIndicator, TextReaderSnapshot};
use crate::zoom::ViewTransform;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use ts_rs::TS;

fn export_single_type<T: TS + 'static>(out_dir: &Path, index: &mut String) -> Result<()> {
    T::export_all_to(out_dir).with_context(|| format!("Failed to export {}", T::name()))?;
    let name = T::name();
    index.push_str(&format!("export type {{ {name} }} from \"./{name}\";\n"));
    Ok(())
}

/// Clears stale `.ts` files in `out_dir`, then writes one file per type plus `index.ts`.
pub fn export_ts_bindings(out_dir: &Path) -> Result<()> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    for entry in
        fs::read_dir(out_dir).with_context(|| format!("Failed to list {}", out_dir.display()))?
    {
        let path = entry.context("Failed to read entry")?.path();
        if path.extension().and_then(|ext| ext.to_str()) == Some("ts") {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove {}", path.display()))?;
        }
    }

    let mut index = String::new();
    export_single_type::<Point>(out_dir, &mut index)?;
    export_single_type::<Rect>(out_dir, &mut index)?;
    export_single_type::<ViewportSize>(out_dir, &mut index)?;
    export_single_type::<DocumentInfo>(out_dir, &mut index)?;
    export_single_type::<TextFileType>(out_dir, &mut index)?;
    export_single_type::<TextInfo>(out_dir, &mut index)?;
    export_single_type::<BackendStatus>(out_dir, &mut index)?;
    export_single_type::<NarrationEngine>(out_dir, &mut index)?;
    export_single_type::<PageSlotView>(out_dir, &mut index)?;
    export_single_type::<ViewTransform>(out_dir, &mut index)?;
    export_single_type::<AnchorSide>(out_dir, &mut index)?;
    export_single_type::<SelectionAnchor>(out_dir, &mut index)?;
    export_single_type::<NarrationPhase>(out_dir, &mut index)?;
    export_single_type::<NarrationSnapshot>(out_dir, &mut index)?;
    export_single_type::<PageIndicator>(out_dir, &mut index)?;
    export_single_type::<ComicReaderSnapshot>(out_dir, &mut index)?;
    export_single_type::<FloatingAction>(out_dir, &mut index)?;
    export_single_type::<TextReaderSnapshot>(out_dir, &mut index)?;

    let index_path = out_dir.join("index.ts");
    fs::write(&index_path, index)
        .with_context(|| format!("Failed to write {}", index_path.display()))?;
    Ok(())
}
