//! The two headless commands: scroll a page folder through the load scheduler,
//! and narrate a text file.

use crate::backend::{DocumentSelection, FileTextSource, FolderPageSource, HttpNarrationBackend};
use crate::playback;
use anyhow::{Context, Result, anyhow, bail};
use leafview_core::cancellation::CancellationToken;
use leafview_core::geometry::{Point, Rect, ViewportSize};
use leafview_core::{
    ComicReaderView, EngineConfig, NarrationPhase, NarrationSession, ScrollViewport,
    TextReaderView,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

const PAGE_WIDTH: f64 = 900.0;
const PAGE_HEIGHT: f64 = 1400.0;
const VIEWPORT_WIDTH: f64 = 1280.0;
const VIEWPORT_HEIGHT: f64 = 900.0;
const SETTLE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Pages { dir: PathBuf },
    Narrate { file: PathBuf, save: bool },
}

const USAGE: &str = "Usage: leafview pages <image-folder> | leafview narrate <text-file> [--save]";

pub fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Command> {
    let mut args = args.into_iter();
    let command = args.next().ok_or_else(|| anyhow!(USAGE))?;
    let path = args.next().map(PathBuf::from).ok_or_else(|| anyhow!(USAGE))?;
    let rest: Vec<String> = args.collect();
    let command = match command.as_str() {
        "pages" if rest.is_empty() => Command::Pages { dir: path },
        "narrate" => {
            let save = match rest.as_slice() {
                [] => false,
                [flag] if flag == "--save" => true,
                _ => bail!(USAGE),
            };
            Command::Narrate { file: path, save }
        }
        _ => bail!(USAGE),
    };
    Ok(command)
}

/// Waits for the next change on `revisions`, giving up on cancellation or timeout.
async fn next_change(
    revisions: &mut watch::Receiver<u64>,
    cancel: &CancellationToken,
) -> Result<bool> {
    tokio::select! {
        _ = cancel.cancelled() => Ok(false),
        changed = tokio::time::timeout(SETTLE_TIMEOUT, revisions.changed()) => {
            changed.context("Timed out waiting for the engine")??;
            Ok(true)
        }
    }
}

pub async fn run_pages(dir: &Path, config: &EngineConfig, cancel: &CancellationToken) -> Result<()> {
    let view = ComicReaderView::new(Arc::new(FolderPageSource::new()), config);
    let info = view
        .open(dir)
        .await
        .with_context(|| format!("Failed to open {}", dir.display()))?
        .context("Open was superseded")?;
    if info.total_pages == 0 {
        bail!("No images found in {}", dir.display());
    }
    info!(title = %view.title().unwrap_or_default(), pages = info.total_pages, "Reading page folder");

    let mut revisions = view.scheduler().subscribe();
    view.set_container_bounds(Rect::new(0.0, 0.0, PAGE_WIDTH, PAGE_HEIGHT * info.total_pages as f64));
    view.set_viewport(ScrollViewport::new(0.0, VIEWPORT_HEIGHT));
    for index in 0..info.total_pages {
        view.observe(index, Rect::new(0.0, index as f64 * PAGE_HEIGHT, PAGE_WIDTH, PAGE_HEIGHT));
    }

    let document_height = PAGE_HEIGHT * info.total_pages as f64;
    let mut top = 0.0;
    loop {
        while view.scheduler().slots().iter().any(|slot| slot.loading) {
            if !next_change(&mut revisions, cancel).await? {
                warn!("Interrupted");
                return Ok(());
            }
        }
        let slots = view.scheduler().slots();
        let loaded = slots.iter().filter(|slot| slot.is_loaded()).count();
        if let Some(indicator) = view.page_indicator() {
            info!(
                page = indicator.current,
                total = indicator.total,
                loaded,
                "Scrolled"
            );
        }
        if top + VIEWPORT_HEIGHT >= document_height || cancel.is_cancelled() {
            break;
        }
        top = (top + VIEWPORT_HEIGHT).min(document_height - VIEWPORT_HEIGHT).max(0.0);
        view.set_viewport(ScrollViewport::new(top, VIEWPORT_HEIGHT));
    }

    for slot in view.scheduler().slots() {
        match &slot.content {
            Some(image) => println!("{:>4}  {:<10}  {} bytes", slot.index + 1, image.mime(), image.len()),
            None => println!("{:>4}  {:<10}  not loaded", slot.index + 1, "-"),
        }
    }
    Ok(())
}

pub async fn run_narrate(
    file: &Path,
    save: bool,
    config: &EngineConfig,
    cancel: &CancellationToken,
) -> Result<()> {
    let selection = Arc::new(DocumentSelection::new(Rect::new(
        0.0,
        0.0,
        VIEWPORT_WIDTH,
        VIEWPORT_HEIGHT / 2.0,
    )));
    let session = NarrationSession::new(
        Arc::new(HttpNarrationBackend::new(config)),
        playback::default_output(),
        config,
    );
    let view = TextReaderView::new(Arc::new(FileTextSource), selection.clone(), session, config);
    view.selection()
        .set_viewport_size(ViewportSize::new(VIEWPORT_WIDTH, VIEWPORT_HEIGHT));

    view.open(file)
        .await
        .with_context(|| format!("Failed to open {}", file.display()))?
        .context("Open was superseded")?;
    let document = view.document().context("Document missing after open")?;
    info!(title = %view.title().unwrap_or_default(), chars = document.info.char_count, "Narrating text file");

    let result = narrate_document(&view, &selection, &document.content, save, cancel).await;
    view.narration().stop().await;
    result
}

async fn narrate_document(
    view: &TextReaderView,
    selection: &DocumentSelection,
    content: &str,
    save: bool,
    cancel: &CancellationToken,
) -> Result<()> {
    let narration = view.narration();
    let mut revisions = narration.subscribe();
    view.toggle_narration().await;
    while narration.phase() == NarrationPhase::Starting {
        if !next_change(&mut revisions, cancel).await? {
            return Ok(());
        }
    }
    let snapshot = narration.snapshot();
    if snapshot.phase != NarrationPhase::Ready {
        bail!(
            "Narration server did not start: {}",
            snapshot.error_message.unwrap_or_else(|| snapshot.phase.to_string())
        );
    }

    selection.select(content);
    view.selection().on_pointer_down(Point::new(0.0, 0.0));
    view.selection().on_pointer_up(Point::new(VIEWPORT_WIDTH / 2.0, VIEWPORT_HEIGHT / 2.0));
    let mut anchors = view.selection().subscribe();
    if view.floating_action().is_none() && !next_change(&mut anchors, cancel).await? {
        return Ok(());
    }
    if !view.speak_selection().await {
        bail!("Nothing to narrate in the document");
    }
    if let Some(message) = narration.snapshot().error_message {
        bail!("Narration failed: {message}");
    }

    loop {
        let snapshot = narration.snapshot();
        if !snapshot.is_audio_playing && !snapshot.is_request_pending {
            break;
        }
        tokio::select! {
            _ = cancel.cancelled() => {
                narration.stop_audio();
                break;
            }
            changed = revisions.changed() => changed?,
        }
    }
    if let Some(message) = narration.snapshot().error_message {
        warn!(%message, "Playback reported an error");
    }

    if save {
        match narration.save_audio().await {
            Some(path) => println!("Saved audio to {}", path.display()),
            None => match narration.snapshot().error_message {
                Some(message) => bail!("Saving audio failed: {message}"),
                None => println!("Audio not saved (set audio_save_dir in the config)"),
            },
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|item| item.to_string()).collect()
    }

    #[test]
    fn parses_both_commands() {
        assert_eq!(
            parse_args(args(&["pages", "comics/vol1"])).expect("pages"),
            Command::Pages {
                dir: PathBuf::from("comics/vol1")
            }
        );
        assert_eq!(
            parse_args(args(&["narrate", "notes.md", "--save"])).expect("narrate"),
            Command::Narrate {
                file: PathBuf::from("notes.md"),
                save: true
            }
        );
    }

    #[test]
    fn rejects_unknown_or_incomplete_input() {
        assert!(parse_args(args(&[])).is_err());
        assert!(parse_args(args(&["pages"])).is_err());
        assert!(parse_args(args(&["narrate", "a.txt", "--loud"])).is_err());
        assert!(parse_args(args(&["read", "a.txt"])).is_err());
    }

    #[tokio::test]
    async fn pages_command_loads_every_page() {
        let dir = tempfile::tempdir().expect("tempdir");
        for index in 1..=4 {
            std::fs::write(dir.path().join(format!("{index}.png")), [0x89, b'P', b'N', b'G'])
                .expect("write");
        }
        let config = EngineConfig {
            preload_ahead: 1,
            viewport_margin_ratio: 0.0,
            ..EngineConfig::default()
        };
        run_pages(dir.path(), &config, &CancellationToken::new())
            .await
            .expect("pages");
    }
}
