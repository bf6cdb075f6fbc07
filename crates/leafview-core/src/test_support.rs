//! In-crate fakes for the collaborator traits.

use crate::backend::{
    AudioFormat, AudioPayload, BackendStatus, DocumentInfo, NarrationBackend, PageImage,
    PageSource, TextFileType, TextInfo, TextSource,
};
use crate::config::NarrationEngine;
use crate::error::{BackendError, BackendResult};
use crate::narration::{AudioHandle, AudioOutput, PlaybackEvent, PlaybackListener};
use crate::selection::{RawSelection, SelectionSource};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

/// Lets spawned tasks on the current-thread runtime run to their next suspension point.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

fn gate(open: bool) -> watch::Sender<bool> {
    watch::channel(open).0
}

async fn pass(mut gate: watch::Receiver<bool>) {
    let _ = gate.wait_for(|open| *open).await;
}

pub struct FakePageSource {
    total: usize,
    failing: BTreeSet<usize>,
    gate: watch::Sender<bool>,
    calls: Mutex<Vec<usize>>,
}

impl FakePageSource {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            failing: BTreeSet::new(),
            gate: gate(true),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Fetches block until [`release_all`](Self::release_all).
    pub fn gated(self) -> Self {
        self.gate.send_replace(false);
        self
    }

    pub fn failing(mut self, pages: &[usize]) -> Self {
        self.failing.extend(pages.iter().copied());
        self
    }

    pub fn release_all(&self) {
        self.gate.send_replace(true);
    }

    pub fn fetch_count(&self, index: usize) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|&&called| called == index)
            .count()
    }

    pub fn requested_indices(&self) -> Vec<usize> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageSource for FakePageSource {
    async fn document_info(&self, path: &Path) -> BackendResult<DocumentInfo> {
        Ok(DocumentInfo {
            filename: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            total_pages: self.total,
        })
    }

    async fn fetch_page(&self, _path: &Path, index: usize) -> BackendResult<PageImage> {
        self.calls.lock().unwrap().push(index);
        pass(self.gate.subscribe()).await;
        if self.failing.contains(&index) {
            return Err(BackendError::Request(format!("page {index} unavailable")));
        }
        Ok(PageImage::new(vec![0x89, b'P', b'N', b'G', index as u8]))
    }
}

#[derive(Default)]
pub struct FakeTextSource {
    texts: Mutex<BTreeMap<PathBuf, String>>,
    held: Mutex<BTreeMap<PathBuf, watch::Sender<bool>>>,
}

impl FakeTextSource {
    pub fn with_text(self, path: &str, text: &str) -> Self {
        self.texts
            .lock()
            .unwrap()
            .insert(PathBuf::from(path), text.to_string());
        self
    }

    /// Loads of `path` block until [`release`](Self::release).
    pub fn hold(&self, path: &str) {
        self.held
            .lock()
            .unwrap()
            .insert(PathBuf::from(path), gate(false));
    }

    pub fn release(&self, path: &str) {
        if let Some(gate) = self.held.lock().unwrap().get(Path::new(path)) {
            gate.send_replace(true);
        }
    }

    fn text(&self, path: &Path) -> BackendResult<String> {
        self.texts
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| BackendError::Request(format!("no such file: {}", path.display())))
    }
}

#[async_trait]
impl TextSource for FakeTextSource {
    async fn text_info(&self, path: &Path) -> BackendResult<TextInfo> {
        let text = self.text(path)?;
        Ok(TextInfo {
            filename: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            file_type: TextFileType::from_path(path),
            char_count: text.chars().count(),
            line_count: text.lines().count(),
        })
    }

    async fn load_text(&self, path: &Path) -> BackendResult<String> {
        let gate = self.held.lock().unwrap().get(path).map(watch::Sender::subscribe);
        if let Some(gate) = gate {
            pass(gate).await;
        }
        self.text(path)
    }
}

pub struct FakeNarrationBackend {
    status: Mutex<BackendStatus>,
    start_error: Mutex<Option<String>>,
    status_fails: AtomicBool,
    stop_fails: AtomicBool,
    synthesis_error: Mutex<Option<String>>,
    synthesis_gate: watch::Sender<bool>,
    synthesis_delays: Mutex<BTreeMap<String, Duration>>,
    save_result: Mutex<Option<BackendResult<PathBuf>>>,
    texts: Mutex<Vec<String>>,
    last_engine: Mutex<Option<NarrationEngine>>,
    start_calls: AtomicUsize,
    status_calls: AtomicUsize,
    stop_calls: AtomicUsize,
    save_calls: AtomicUsize,
}

impl Default for FakeNarrationBackend {
    fn default() -> Self {
        Self {
            status: Mutex::new(BackendStatus::Starting),
            start_error: Mutex::new(None),
            status_fails: AtomicBool::new(false),
            stop_fails: AtomicBool::new(false),
            synthesis_error: Mutex::new(None),
            synthesis_gate: gate(true),
            synthesis_delays: Mutex::new(BTreeMap::new()),
            save_result: Mutex::new(None),
            texts: Mutex::new(Vec::new()),
            last_engine: Mutex::new(None),
            start_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            stop_calls: AtomicUsize::new(0),
            save_calls: AtomicUsize::new(0),
        }
    }
}

impl FakeNarrationBackend {
    pub fn set_status(&self, status: BackendStatus) {
        *self.status.lock().unwrap() = status;
    }

    pub fn fail_start(&self, message: &str) {
        *self.start_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn fail_status(&self, fails: bool) {
        self.status_fails.store(fails, Ordering::SeqCst);
    }

    pub fn fail_stop(&self, fails: bool) {
        self.stop_fails.store(fails, Ordering::SeqCst);
    }

    pub fn fail_synthesis(&self, message: Option<&str>) {
        *self.synthesis_error.lock().unwrap() = message.map(str::to_string);
    }

    pub fn gate_synthesis(&self) {
        self.synthesis_gate.send_replace(false);
    }

    pub fn release_synthesis(&self) {
        self.synthesis_gate.send_replace(true);
    }

    /// Makes synthesis of `text` take `delay` of (paused) tokio time.
    pub fn delay_synthesis(&self, text: &str, delay: Duration) {
        self.synthesis_delays
            .lock()
            .unwrap()
            .insert(text.to_string(), delay);
    }

    pub fn set_save_result(&self, result: BackendResult<PathBuf>) {
        *self.save_result.lock().unwrap() = Some(result);
    }

    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }

    pub fn save_calls(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }

    pub fn synthesize_calls(&self) -> usize {
        self.texts.lock().unwrap().len()
    }

    pub fn synthesized_texts(&self) -> Vec<String> {
        self.texts.lock().unwrap().clone()
    }

    pub fn last_engine(&self) -> Option<NarrationEngine> {
        *self.last_engine.lock().unwrap()
    }
}

#[async_trait]
impl NarrationBackend for FakeNarrationBackend {
    async fn start(&self) -> BackendResult<()> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        match self.start_error.lock().unwrap().clone() {
            Some(message) => Err(BackendError::Request(message)),
            None => Ok(()),
        }
    }

    async fn status(&self) -> BackendResult<BackendStatus> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        if self.status_fails.load(Ordering::SeqCst) {
            return Err(BackendError::Request("connection refused".to_string()));
        }
        Ok(*self.status.lock().unwrap())
    }

    async fn stop(&self) -> BackendResult<()> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        if self.stop_fails.load(Ordering::SeqCst) {
            return Err(BackendError::Request("already gone".to_string()));
        }
        Ok(())
    }

    async fn synthesize(&self, text: &str, engine: NarrationEngine) -> BackendResult<AudioPayload> {
        self.texts.lock().unwrap().push(text.to_string());
        *self.last_engine.lock().unwrap() = Some(engine);
        pass(self.synthesis_gate.subscribe()).await;
        let delay = self.synthesis_delays.lock().unwrap().get(text).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = self.synthesis_error.lock().unwrap().clone() {
            return Err(BackendError::Status {
                code: 500,
                message,
            });
        }
        Ok(AudioPayload::new(text.as_bytes().to_vec(), AudioFormat::Wav))
    }

    async fn save_audio(&self, _audio: &AudioPayload) -> BackendResult<PathBuf> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        self.save_result
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Ok(PathBuf::from("/tmp/tts-fake.wav")))
    }
}

pub struct FakeAudioHandle {
    clip: Vec<u8>,
    paused: AtomicBool,
    rewinds: AtomicUsize,
    listener: PlaybackListener,
}

impl FakeAudioHandle {
    pub fn rewinds(&self) -> usize {
        self.rewinds.load(Ordering::SeqCst)
    }

    /// Text the fake backend synthesized this clip from.
    pub fn clip(&self) -> String {
        String::from_utf8_lossy(&self.clip).into_owned()
    }

    /// Playback reached the end of the clip.
    pub fn finish(&self) {
        self.paused.store(true, Ordering::SeqCst);
        (self.listener)(PlaybackEvent::Ended);
    }

    pub fn fail(&self) {
        self.paused.store(true, Ordering::SeqCst);
        (self.listener)(PlaybackEvent::Failed);
    }
}

impl AudioHandle for FakeAudioHandle {
    fn play(&self) {
        self.paused.store(false, Ordering::SeqCst);
        (self.listener)(PlaybackEvent::Playing);
    }

    fn pause(&self) {
        if !self.paused.swap(true, Ordering::SeqCst) {
            (self.listener)(PlaybackEvent::Paused);
        }
    }

    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    fn rewind(&self) {
        self.rewinds.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct FakeAudioOutput {
    handles: Mutex<Vec<Arc<FakeAudioHandle>>>,
    fail_on_create: AtomicBool,
}

impl FakeAudioOutput {
    pub fn created(&self) -> usize {
        self.handles.lock().unwrap().len()
    }

    pub fn last_handle(&self) -> Option<Arc<FakeAudioHandle>> {
        self.handles.lock().unwrap().last().cloned()
    }

    /// New handles report `Failed` from inside `create`, like a player thread
    /// that cannot open the device.
    pub fn fail_on_create(&self) {
        self.fail_on_create.store(true, Ordering::SeqCst);
    }
}

impl AudioOutput for FakeAudioOutput {
    fn create(
        &self,
        audio: &AudioPayload,
        listener: PlaybackListener,
    ) -> BackendResult<Arc<dyn AudioHandle>> {
        let handle = Arc::new(FakeAudioHandle {
            clip: audio.bytes.to_vec(),
            paused: AtomicBool::new(true),
            rewinds: AtomicUsize::new(0),
            listener,
        });
        self.handles.lock().unwrap().push(handle.clone());
        if self.fail_on_create.load(Ordering::SeqCst) {
            handle.fail();
        }
        Ok(handle)
    }
}

#[derive(Default)]
pub struct FakeSelectionSource {
    current: Mutex<Option<RawSelection>>,
}

impl FakeSelectionSource {
    pub fn set(&self, selection: Option<RawSelection>) {
        *self.current.lock().unwrap() = selection;
    }
}

impl SelectionSource for FakeSelectionSource {
    fn read_selection(&self) -> Option<RawSelection> {
        self.current.lock().unwrap().clone()
    }
}
