//! Narration backend reached over HTTP, optionally spawning the server process.
//!
//! `GET /health` answers once the server has loaded its voices; `POST /tts` with
//! `{ text, engine }` returns `{ audio, format }` (base64 audio) or `{ error, traceback }`.

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64_STANDARD};
use leafview_core::{
    AudioFormat, AudioPayload, BackendError, BackendResult, BackendStatus, EngineConfig,
    NarrationBackend, NarrationEngine,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

#[derive(Debug, Serialize)]
struct SpeakRequest<'a> {
    text: &'a str,
    engine: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct SpeakResponse {
    audio: Option<String>,
    format: Option<String>,
    error: Option<String>,
    traceback: Option<String>,
}

fn decode_speak_response(code: u16, body: SpeakResponse) -> BackendResult<AudioPayload> {
    if !(200..300).contains(&code) {
        let error = body.error.as_deref().unwrap_or("Unknown error");
        let message = match body.traceback.as_deref().filter(|tb| !tb.is_empty()) {
            Some(traceback) => format!("{error}\n\n{traceback}"),
            None => error.to_string(),
        };
        return Err(BackendError::Status { code, message });
    }
    let audio = body
        .audio
        .ok_or_else(|| BackendError::Decode("No audio field in TTS response".to_string()))?;
    let bytes = BASE64_STANDARD
        .decode(audio.trim())
        .map_err(|err| BackendError::Decode(format!("Failed to decode audio: {err}")))?;
    let format = AudioFormat::from_label(body.format.as_deref().unwrap_or("wav"));
    Ok(AudioPayload::new(bytes, format))
}

/// `tts-<first 16 hex digits of sha256>.<ext>`, stable for identical audio.
fn audio_file_name(audio: &AudioPayload) -> String {
    let mut hasher = Sha256::new();
    hasher.update(&audio.bytes);
    let hash = format!("{:x}", hasher.finalize());
    format!("tts-{}.{}", &hash[..16], audio.format.extension())
}

fn request_error(err: reqwest::Error) -> BackendError {
    BackendError::Request(err.to_string())
}

#[derive(Debug)]
struct ServerProcess {
    child: Option<Child>,
    status: BackendStatus,
}

pub struct HttpNarrationBackend {
    client: reqwest::Client,
    base_url: String,
    health_timeout: Duration,
    speak_timeout: Duration,
    server_command: Vec<String>,
    save_dir: Option<PathBuf>,
    process: Mutex<ServerProcess>,
}

impl HttpNarrationBackend {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.narration_base_url.trim_end_matches('/').to_string(),
            health_timeout: Duration::from_secs(config.narration_health_timeout_secs),
            speak_timeout: Duration::from_secs(config.narration_speak_timeout_secs),
            server_command: config.narration_server_command.clone(),
            save_dir: config.audio_save_dir.as_ref().map(PathBuf::from),
            process: Mutex::new(ServerProcess {
                child: None,
                status: BackendStatus::Stopped,
            }),
        }
    }

    fn process(&self) -> MutexGuard<'_, ServerProcess> {
        self.process.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn ping(&self) -> bool {
        match self
            .client
            .get(self.url("/health"))
            .timeout(self.health_timeout)
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(err) => {
                debug!(error = %err, "Health check failed");
                false
            }
        }
    }
}

#[async_trait]
impl NarrationBackend for HttpNarrationBackend {
    async fn start(&self) -> BackendResult<()> {
        let mut process = self.process();
        if process.child.is_some() {
            debug!("Narration server already running");
            return Ok(());
        }
        match self.server_command.split_first() {
            Some((program, args)) => {
                let child = Command::new(program)
                    .args(args)
                    .stdin(Stdio::null())
                    .stdout(Stdio::null())
                    .kill_on_drop(true)
                    .spawn()?;
                info!(pid = ?child.id(), %program, "Spawned narration server");
                process.child = Some(child);
            }
            None => info!(url = %self.base_url, "Using externally managed narration server"),
        }
        process.status = BackendStatus::Starting;
        Ok(())
    }

    async fn status(&self) -> BackendResult<BackendStatus> {
        let should_ping = {
            let mut process = self.process();
            if let Some(child) = process.child.as_mut() {
                if let Ok(Some(exit)) = child.try_wait() {
                    warn!(%exit, "Narration server exited");
                    process.child = None;
                    process.status = BackendStatus::Error;
                    return Ok(BackendStatus::Error);
                }
            }
            process.status == BackendStatus::Starting
        };

        if should_ping && self.ping().await {
            let mut process = self.process();
            if process.status == BackendStatus::Starting {
                process.status = BackendStatus::Ready;
            }
            return Ok(process.status);
        }
        Ok(self.process().status)
    }

    async fn stop(&self) -> BackendResult<()> {
        let child = {
            let mut process = self.process();
            process.status = BackendStatus::Stopped;
            process.child.take()
        };
        if let Some(mut child) = child {
            child.kill().await?;
            info!("Stopped narration server");
        }
        Ok(())
    }

    async fn synthesize(&self, text: &str, engine: NarrationEngine) -> BackendResult<AudioPayload> {
        if self.process().status != BackendStatus::Ready {
            return Err(BackendError::NotReady);
        }
        debug!(chars = text.chars().count(), %engine, "Sending speak request");
        let resp = self
            .client
            .post(self.url("/tts"))
            .json(&SpeakRequest {
                text,
                engine: engine.as_str(),
            })
            .timeout(self.speak_timeout)
            .send()
            .await
            .map_err(request_error)?;
        let code = resp.status().as_u16();
        let body: SpeakResponse = resp
            .json()
            .await
            .map_err(|err| BackendError::Decode(err.to_string()))?;
        decode_speak_response(code, body)
    }

    async fn save_audio(&self, audio: &AudioPayload) -> BackendResult<PathBuf> {
        let Some(dir) = &self.save_dir else {
            return Err(BackendError::Cancelled);
        };
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(audio_file_name(audio));
        tokio::fs::write(&path, &audio.bytes).await?;
        Ok(path)
    }
}
