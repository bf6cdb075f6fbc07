//! Audio output for synthesized narration.
//!
//! With the default `audio` feature each clip plays on its own thread through a
//! rodio sink. Builds with `--no-default-features` report clips as played and
//! point the user at `--save`.

use leafview_core::narration::{AudioHandle, AudioOutput, PlaybackEvent, PlaybackListener};
use leafview_core::{AudioPayload, BackendResult};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

pub fn default_output() -> Arc<dyn AudioOutput> {
    #[cfg(feature = "audio")]
    {
        Arc::new(rodio_output::RodioOutput)
    }
    #[cfg(not(feature = "audio"))]
    {
        Arc::new(DetachedOutput)
    }
}

/// Stand-in when the binary is built without the `audio` feature.
#[cfg_attr(feature = "audio", allow(dead_code))]
pub struct DetachedOutput;

impl AudioOutput for DetachedOutput {
    fn create(
        &self,
        audio: &AudioPayload,
        listener: PlaybackListener,
    ) -> BackendResult<Arc<dyn AudioHandle>> {
        warn!(
            bytes = audio.bytes.len(),
            "Built without the `audio` feature; use --save to keep the clip"
        );
        Ok(Arc::new(DetachedHandle {
            paused: AtomicBool::new(true),
            listener,
        }))
    }
}

struct DetachedHandle {
    paused: AtomicBool,
    listener: PlaybackListener,
}

impl AudioHandle for DetachedHandle {
    fn play(&self) {
        self.paused.store(false, Ordering::SeqCst);
        (self.listener)(PlaybackEvent::Playing);
        self.paused.store(true, Ordering::SeqCst);
        info!("Clip finished (no audio device)");
        (self.listener)(PlaybackEvent::Ended);
    }

    fn pause(&self) {
        if !self.paused.swap(true, Ordering::SeqCst) {
            (self.listener)(PlaybackEvent::Paused);
        }
    }

    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    fn rewind(&self) {}
}

#[cfg(feature = "audio")]
mod rodio_output {
    use super::*;
    use rodio::{Decoder, OutputStream, Sink};
    use std::io::Cursor;
    use std::sync::mpsc::{self, RecvTimeoutError};
    use std::thread;
    use std::time::Duration;
    use tracing::debug;

    const END_POLL: Duration = Duration::from_millis(100);

    enum PlayerCommand {
        Play,
        Pause,
        Rewind,
    }

    pub struct RodioOutput;

    impl AudioOutput for RodioOutput {
        fn create(
            &self,
            audio: &AudioPayload,
            listener: PlaybackListener,
        ) -> BackendResult<Arc<dyn AudioHandle>> {
            let (tx, rx) = mpsc::channel();
            let paused = Arc::new(AtomicBool::new(true));
            let bytes = audio.bytes.clone();
            let thread_paused = paused.clone();
            thread::Builder::new()
                .name("leafview-audio".to_string())
                .spawn(move || run_player(bytes, rx, thread_paused, listener))?;
            Ok(Arc::new(RodioHandle { commands: tx, paused }))
        }
    }

    fn decode(bytes: &Arc<[u8]>) -> Result<Decoder<Cursor<Vec<u8>>>, rodio::decoder::DecoderError> {
        Decoder::new(Cursor::new(bytes.to_vec()))
    }

    fn run_player(
        bytes: Arc<[u8]>,
        commands: mpsc::Receiver<PlayerCommand>,
        paused: Arc<AtomicBool>,
        listener: PlaybackListener,
    ) {
        let (_stream, stream_handle) = match OutputStream::try_default() {
            Ok(output) => output,
            Err(err) => {
                warn!(error = %err, "Opening audio output failed");
                listener(PlaybackEvent::Failed);
                return;
            }
        };
        let sink = match Sink::try_new(&stream_handle) {
            Ok(sink) => sink,
            Err(err) => {
                warn!(error = %err, "Creating sink failed");
                listener(PlaybackEvent::Failed);
                return;
            }
        };
        sink.pause();
        match decode(&bytes) {
            Ok(source) => sink.append(source),
            Err(err) => {
                warn!(error = %err, "Decoding narration audio failed");
                listener(PlaybackEvent::Failed);
                return;
            }
        }

        let mut ended = false;
        loop {
            match commands.recv_timeout(END_POLL) {
                Ok(PlayerCommand::Play) => {
                    if ended {
                        match decode(&bytes) {
                            Ok(source) => sink.append(source),
                            Err(_) => continue,
                        }
                        ended = false;
                    }
                    sink.play();
                    paused.store(false, Ordering::SeqCst);
                    listener(PlaybackEvent::Playing);
                }
                Ok(PlayerCommand::Pause) => {
                    if !sink.is_paused() {
                        sink.pause();
                        paused.store(true, Ordering::SeqCst);
                        listener(PlaybackEvent::Paused);
                    }
                }
                Ok(PlayerCommand::Rewind) => {
                    if let Err(err) = sink.try_seek(Duration::ZERO) {
                        debug!(error = %err, "Rewind not supported for this clip");
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    if !ended && !sink.is_paused() && sink.empty() {
                        ended = true;
                        sink.pause();
                        paused.store(true, Ordering::SeqCst);
                        listener(PlaybackEvent::Ended);
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        sink.stop();
        debug!("Audio player thread finished");
    }

    struct RodioHandle {
        commands: mpsc::Sender<PlayerCommand>,
        paused: Arc<AtomicBool>,
    }

    impl RodioHandle {
        fn send(&self, command: PlayerCommand) {
            if self.commands.send(command).is_err() {
                debug!("Audio player thread already gone");
            }
        }
    }

    impl AudioHandle for RodioHandle {
        fn play(&self) {
            self.send(PlayerCommand::Play);
        }

        fn pause(&self) {
            self.paused.store(true, Ordering::SeqCst);
            self.send(PlayerCommand::Pause);
        }

        fn is_paused(&self) -> bool {
            self.paused.load(Ordering::SeqCst)
        }

        fn rewind(&self) {
            self.send(PlayerCommand::Rewind);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leafview_core::AudioFormat;
    use std::sync::Mutex;

    #[test]
    fn detached_clip_reports_playing_then_ended() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let listener: PlaybackListener = Arc::new(move |event| sink.lock().unwrap().push(event));
        let handle = DetachedOutput
            .create(&AudioPayload::new(vec![0u8; 4], AudioFormat::Wav), listener)
            .expect("handle");

        handle.play();
        handle.pause();
        assert!(handle.is_paused());
        assert_eq!(
            *events.lock().unwrap(),
            vec![PlaybackEvent::Playing, PlaybackEvent::Ended]
        );
    }
}
