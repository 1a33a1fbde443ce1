//! Per-connection session state.
//!
//! One [`Session`] exists per live client connection. It owns the audio
//! chain (gate + VAD), the transcript buffers, the bounded conversation
//! history, and the concurrency primitives the turn machinery relies on:
//! the reply epoch counter, the turn-processing lock, and the debounce
//! timer slot. Sessions never share data with one another.

mod registry;

pub use registry::SessionRegistry;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::core::audio::{EnergyGate, EnergyVad, VadConfig};
use crate::core::transcript::{StitchUpdate, TranscriptBuffers, TranscriptEvent};
use crate::handlers::ws::messages::OutgoingMessage;

/// Conversation history is bounded to this many entries; the oldest are
/// evicted first to cap prompt size.
pub const HISTORY_LIMIT: usize = 12;

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Conversational lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    Listening,
    Thinking,
    Speaking,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Idle => "idle",
            LifecycleState::Listening => "listening",
            LifecycleState::Thinking => "thinking",
            LifecycleState::Speaking => "speaking",
        }
    }
}

/// One exchanged message in the conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Latency breakdown emitted to the client after each turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TurnMetrics {
    pub stt_latency_ms: u64,
    pub llm_ttft_ms: u64,
    pub llm_total_ms: u64,
    pub tts_latency_ms: u64,
    pub e2e_latency_ms: u64,
    pub barge_in: bool,
}

/// Mutable session state guarded by one short-lived lock.
#[derive(Debug)]
pub struct SessionInner {
    pub state: LifecycleState,
    pub turn_id: u64,
    pub transcripts: TranscriptBuffers,
    pub messages: Vec<ChatMessage>,
    /// Replaceable system-instruction override, bumped on every update.
    pub dynamic_instruction: Option<String>,
    pub instruction_version: u32,
    pub interview_active: bool,
    pub barge_in_this_turn: bool,

    // Metric timestamps (ms since epoch), reset per turn
    pub turn_start_ms: u64,
    pub stt_finish_ms: u64,
    pub llm_start_ms: u64,
    pub llm_finish_ms: u64,
    pub tts_first_chunk_ms: u64,
}

impl SessionInner {
    fn new() -> Self {
        Self {
            state: LifecycleState::Idle,
            turn_id: 0,
            transcripts: TranscriptBuffers::new(),
            messages: Vec::new(),
            dynamic_instruction: None,
            instruction_version: 0,
            interview_active: false,
            barge_in_this_turn: false,
            turn_start_ms: 0,
            stt_finish_ms: 0,
            llm_start_ms: 0,
            llm_finish_ms: 0,
            tts_first_chunk_ms: 0,
        }
    }
}

/// Per-connection session.
pub struct Session {
    pub id: Uuid,
    outbound: mpsc::Sender<OutgoingMessage>,
    pub(crate) inner: Mutex<SessionInner>,

    /// Reply generation counter. Strictly increases on every new reply and
    /// every barge-in; in-flight segments carrying a stale value are
    /// discarded, never delivered.
    epoch: AtomicU64,

    /// Turn-processing lock. Checked-and-set atomically so a VAD
    /// speech_end and a heartbeat sweep racing to finalize the same turn
    /// result in exactly one execution.
    turn_lock: AtomicBool,

    /// Timestamp of the last received audio frame (ms since epoch).
    last_audio_ms: AtomicU64,

    pub gate: Mutex<EnergyGate>,
    pub vad: Mutex<EnergyVad>,

    /// At most one armed debounce timer per session.
    debounce: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    pub fn new(id: Uuid, vad_config: VadConfig, outbound: mpsc::Sender<OutgoingMessage>) -> Self {
        Self {
            id,
            outbound,
            inner: Mutex::new(SessionInner::new()),
            epoch: AtomicU64::new(0),
            turn_lock: AtomicBool::new(false),
            last_audio_ms: AtomicU64::new(now_ms()),
            gate: Mutex::new(EnergyGate::new()),
            vad: Mutex::new(EnergyVad::new(vad_config)),
            debounce: Mutex::new(None),
        }
    }

    /// Send a message to the client. A closed connection is not an error
    /// here; teardown is handled by the connection task.
    pub async fn send(&self, message: OutgoingMessage) {
        if self.outbound.send(message).await.is_err() {
            tracing::debug!("Session {}: client channel closed, message dropped", self.id);
        }
    }

    /// Update the lifecycle state and broadcast it to the client.
    pub async fn transition(&self, to: LifecycleState) {
        {
            let mut inner = self.inner.lock();
            if inner.state == to {
                return;
            }
            inner.state = to;
        }
        self.send(OutgoingMessage::State {
            value: to.as_str().to_string(),
        })
        .await;
    }

    pub fn state(&self) -> LifecycleState {
        self.inner.lock().state
    }

    // ── Epoch ────────────────────────────────────────────────────────────

    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Increment the reply epoch, invalidating any in-flight reply, and
    /// return the new value.
    pub fn bump_epoch(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::AcqRel) + 1
    }

    // ── Turn-processing lock ─────────────────────────────────────────────

    /// Try to acquire the turn-processing lock for this session.
    pub fn try_begin_turn(&self) -> bool {
        self.turn_lock
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Release the turn-processing lock.
    pub fn end_turn(&self) {
        self.turn_lock.store(false, Ordering::Release);
    }

    // ── Audio activity ───────────────────────────────────────────────────

    pub fn touch_audio(&self) {
        self.last_audio_ms.store(now_ms(), Ordering::Release);
    }

    pub fn ms_since_last_audio(&self) -> u64 {
        now_ms().saturating_sub(self.last_audio_ms.load(Ordering::Acquire))
    }

    pub fn is_vad_speaking(&self) -> bool {
        self.vad.lock().is_speaking()
    }

    // ── Debounce timer ───────────────────────────────────────────────────

    /// Arm the debounce timer, aborting any previously armed one so at most
    /// one is active per session.
    pub fn arm_debounce(&self, handle: JoinHandle<()>) {
        let mut slot = self.debounce.lock();
        if let Some(previous) = slot.take() {
            previous.abort();
        }
        *slot = Some(handle);
    }

    /// Cancel the armed debounce timer, if any. Returns whether one was armed.
    pub fn cancel_debounce(&self) -> bool {
        let mut slot = self.debounce.lock();
        match slot.take() {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    // ── Transcripts ──────────────────────────────────────────────────────

    pub fn apply_transcript_event(&self, event: TranscriptEvent) -> StitchUpdate {
        self.inner.lock().transcripts.apply(event)
    }

    pub fn clear_transcripts(&self) {
        self.inner.lock().transcripts.clear();
    }

    /// Take the transcript for the finishing turn, clearing both buffers.
    ///
    /// The stable buffer wins; when it is empty, a sufficiently populated
    /// unstable buffer (at least `interim_fallback_min_chars` characters)
    /// stands in for it. Returns `None` when nothing usable remains.
    pub fn take_turn_transcript(&self, interim_fallback_min_chars: usize) -> Option<String> {
        let mut inner = self.inner.lock();
        let stable = inner.transcripts.stable.trim().to_string();
        let unstable = inner.transcripts.unstable.trim().to_string();
        inner.transcripts.clear();

        if !stable.is_empty() {
            Some(stable)
        } else if unstable.chars().count() >= interim_fallback_min_chars && !unstable.is_empty() {
            Some(unstable)
        } else {
            None
        }
    }

    /// Whether either transcript buffer holds usable text.
    pub fn has_pending_transcript(&self) -> bool {
        let inner = self.inner.lock();
        !inner.transcripts.stable.trim().is_empty()
            || !inner.transcripts.unstable.trim().is_empty()
    }

    // ── Conversation history ─────────────────────────────────────────────

    /// Append a message, evicting the oldest entries beyond the cap.
    pub fn push_message(&self, message: ChatMessage) {
        let mut inner = self.inner.lock();
        inner.messages.push(message);
        let len = inner.messages.len();
        if len > HISTORY_LIMIT {
            inner.messages.drain(..len - HISTORY_LIMIT);
        }
    }

    pub fn message_history(&self) -> Vec<ChatMessage> {
        self.inner.lock().messages.clone()
    }

    // ── Dynamic instruction override ─────────────────────────────────────

    /// Replace the dynamic system instruction; returns the new version.
    pub fn set_dynamic_instruction(&self, content: String) -> u32 {
        let mut inner = self.inner.lock();
        inner.dynamic_instruction = Some(content);
        inner.instruction_version += 1;
        inner.instruction_version
    }

    pub fn dynamic_instruction(&self) -> Option<String> {
        self.inner.lock().dynamic_instruction.clone()
    }

    // ── Interview mode ───────────────────────────────────────────────────

    pub fn interview_active(&self) -> bool {
        self.inner.lock().interview_active
    }

    pub fn set_interview_active(&self, active: bool) {
        self.inner.lock().interview_active = active;
    }

    pub fn mark_barge_in(&self) {
        self.inner.lock().barge_in_this_turn = true;
    }

    // ── Metrics ──────────────────────────────────────────────────────────

    /// Stamp the moment the user started speaking, if a turn is not
    /// already being timed.
    pub fn mark_turn_start(&self) {
        let mut inner = self.inner.lock();
        if inner.turn_start_ms == 0 {
            inner.turn_start_ms = now_ms();
        }
    }

    /// Advance to a new turn: bump the turn id, stamp the
    /// recognizer-finished instant, and reset the downstream stamps.
    pub fn begin_turn_metrics(&self) -> u64 {
        let mut inner = self.inner.lock();
        inner.turn_id += 1;
        let now = now_ms();
        if inner.turn_start_ms == 0 {
            inner.turn_start_ms = now;
        }
        inner.stt_finish_ms = now;
        inner.llm_start_ms = 0;
        inner.llm_finish_ms = 0;
        inner.tts_first_chunk_ms = 0;
        inner.turn_id
    }

    pub fn stamp_llm_start(&self) {
        self.inner.lock().llm_start_ms = now_ms();
    }

    pub fn stamp_llm_finish(&self) {
        self.inner.lock().llm_finish_ms = now_ms();
    }

    /// Build the metrics payload for the turn that just finished and reset
    /// the barge-in flag for the next one.
    pub fn take_turn_metrics(&self) -> (u64, TurnMetrics) {
        let mut inner = self.inner.lock();
        let metrics = TurnMetrics {
            stt_latency_ms: inner.stt_finish_ms.saturating_sub(inner.turn_start_ms),
            llm_ttft_ms: inner.llm_start_ms.saturating_sub(inner.stt_finish_ms),
            llm_total_ms: inner.llm_finish_ms.saturating_sub(inner.stt_finish_ms),
            tts_latency_ms: inner.tts_first_chunk_ms.saturating_sub(inner.llm_finish_ms),
            e2e_latency_ms: if inner.tts_first_chunk_ms > 0 {
                inner.tts_first_chunk_ms.saturating_sub(inner.turn_start_ms)
            } else {
                now_ms().saturating_sub(inner.turn_start_ms)
            },
            barge_in: inner.barge_in_this_turn,
        };
        inner.barge_in_this_turn = false;
        inner.turn_start_ms = 0;
        (inner.turn_id, metrics)
    }

    pub fn record_tts_first_chunk(&self) {
        let mut inner = self.inner.lock();
        if inner.tts_first_chunk_ms == 0 {
            inner.tts_first_chunk_ms = now_ms();
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(handle) = self.debounce.lock().take() {
            handle.abort();
        }
    }
}
