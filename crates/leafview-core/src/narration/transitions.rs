use super::State;
use crate::backend::BackendStatus;
use serde::Serialize;
use tracing::{debug, info, warn};
use ts_rs::TS;

pub(super) const SERVER_FAILED_MESSAGE: &str = "Narration server failed to start";
pub(super) const SERVER_STOPPED_MESSAGE: &str = "Narration server stopped unexpectedly";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum NarrationPhase {
    #[default]
    Stopped,
    Starting,
    Ready,
    Error,
}

impl NarrationPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            NarrationPhase::Stopped => "stopped",
            NarrationPhase::Starting => "starting",
            NarrationPhase::Ready => "ready",
            NarrationPhase::Error => "error",
        }
    }

    pub fn can_start(self) -> bool {
        matches!(self, NarrationPhase::Stopped | NarrationPhase::Error)
    }
}

impl std::fmt::Display for NarrationPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub(super) enum PhaseEvent {
    StartRequested,
    StartAcknowledged {
        request_id: u64,
    },
    StartFailed {
        request_id: u64,
        message: String,
    },
    StatusReported {
        request_id: u64,
        status: BackendStatus,
    },
    StopRequested,
}

#[derive(Debug, PartialEq, Eq)]
pub(super) enum PhaseAction {
    RequestStart { request_id: u64 },
    BeginPolling { request_id: u64 },
    CancelPolling,
    ReleaseAudio,
    ShutdownBackend,
}

pub(super) fn transition(state: &mut State, event: PhaseEvent) -> Vec<PhaseAction> {
    match event {
        PhaseEvent::StartRequested => on_start_requested(state),
        PhaseEvent::StartAcknowledged { request_id } => on_start_acknowledged(state, request_id),
        PhaseEvent::StartFailed {
            request_id,
            message,
        } => on_start_failed(state, request_id, message),
        PhaseEvent::StatusReported { request_id, status } => {
            on_status_reported(state, request_id, status)
        }
        PhaseEvent::StopRequested => on_stop_requested(state),
    }
}

fn is_current_start(state: &State, request_id: u64, what: &str) -> bool {
    if request_id != state.request_id || state.phase != NarrationPhase::Starting {
        debug!(
            request_id,
            current = state.request_id,
            phase = %state.phase,
            "Ignoring stale narration {what}"
        );
        return false;
    }
    true
}

fn on_start_requested(state: &mut State) -> Vec<PhaseAction> {
    if !state.phase.can_start() {
        debug!(phase = %state.phase, "Ignoring narration start request");
        return Vec::new();
    }
    state.request_id = state.request_id.wrapping_add(1);
    state.phase = NarrationPhase::Starting;
    state.error_message = None;
    info!(request_id = state.request_id, "Starting narration backend");
    vec![PhaseAction::RequestStart {
        request_id: state.request_id,
    }]
}

fn on_start_acknowledged(state: &mut State, request_id: u64) -> Vec<PhaseAction> {
    if !is_current_start(state, request_id, "start acknowledgement") {
        return Vec::new();
    }
    vec![PhaseAction::BeginPolling { request_id }]
}

fn on_start_failed(state: &mut State, request_id: u64, message: String) -> Vec<PhaseAction> {
    if !is_current_start(state, request_id, "start failure") {
        return Vec::new();
    }
    warn!(request_id, error = %message, "Narration backend failed to start");
    state.phase = NarrationPhase::Error;
    state.error_message = Some(message);
    Vec::new()
}

fn on_status_reported(
    state: &mut State,
    request_id: u64,
    status: BackendStatus,
) -> Vec<PhaseAction> {
    if !is_current_start(state, request_id, "status report") {
        return Vec::new();
    }
    match status {
        BackendStatus::Starting => Vec::new(),
        BackendStatus::Ready => {
            info!(request_id, "Narration backend ready");
            state.phase = NarrationPhase::Ready;
            vec![PhaseAction::CancelPolling]
        }
        BackendStatus::Error => {
            warn!(request_id, "Narration backend reported an error");
            state.phase = NarrationPhase::Error;
            state.error_message = Some(SERVER_FAILED_MESSAGE.to_string());
            vec![PhaseAction::CancelPolling]
        }
        BackendStatus::Stopped => {
            warn!(request_id, "Narration backend stopped while starting");
            state.phase = NarrationPhase::Error;
            state.error_message = Some(SERVER_STOPPED_MESSAGE.to_string());
            vec![PhaseAction::CancelPolling]
        }
    }
}

fn on_stop_requested(state: &mut State) -> Vec<PhaseAction> {
    state.request_id = state.request_id.wrapping_add(1);
    state.epoch = state.epoch.wrapping_add(1);
    if state.phase != NarrationPhase::Stopped {
        info!(phase = %state.phase, "Stopping narration backend");
    }
    state.phase = NarrationPhase::Stopped;
    state.error_message = None;
    vec![
        PhaseAction::CancelPolling,
        PhaseAction::ReleaseAudio,
        PhaseAction::ShutdownBackend,
    ]
}
