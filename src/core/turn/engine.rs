//! The turn engine: detects turn boundaries, runs the reply pipeline, and
//! enforces the interruption rules.
//!
//! A turn ends either when the debounce timer fires after VAD speech end,
//! or when the heartbeat sweep observes sustained input silence with a
//! pending transcript. The two paths race; the per-session turn lock
//! guarantees exactly one of them runs the pipeline.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::core::dispatch;
use crate::core::llm::{LlmError, ReplyGenerator};
use crate::core::search::{format_search_context, should_trigger_search, SearchProvider};
use crate::core::session::{ChatMessage, LifecycleState, Session, SessionRegistry};
use crate::core::speech_format::format_for_speech;
use crate::core::transcript::{StitchUpdate, TranscriptEvent};
use crate::core::tts::SpeechSynthesizer;
use crate::handlers::ws::messages::OutgoingMessage;

use super::prompts;

/// Releases the turn-processing lock on every exit path of the pipeline.
struct TurnLockGuard<'a> {
    session: &'a Session,
}

impl Drop for TurnLockGuard<'_> {
    fn drop(&mut self) {
        self.session.end_turn();
    }
}

pub struct TurnEngine {
    generator: Arc<dyn ReplyGenerator>,
    search: Arc<dyn SearchProvider>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    debounce: Duration,
    heartbeat_interval: Duration,
    turn_end_silence_ms: u64,
    interim_fallback_min_chars: usize,
}

impl TurnEngine {
    pub fn new(
        config: &ServerConfig,
        generator: Arc<dyn ReplyGenerator>,
        search: Arc<dyn SearchProvider>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
    ) -> Self {
        Self {
            generator,
            search,
            synthesizer,
            debounce: config.turn_debounce(),
            heartbeat_interval: config.heartbeat_interval(),
            turn_end_silence_ms: config.turn_end_silence_ms,
            interim_fallback_min_chars: config.interim_fallback_min_chars,
        }
    }

    /// VAD reported the user started speaking.
    ///
    /// Speech over an active or pending reply is a barge-in: the epoch is
    /// bumped first so every in-flight stage of the old reply goes stale
    /// immediately, the client is told, and the transcript restarts clean.
    pub async fn on_speech_start(&self, session: &Arc<Session>) {
        session.cancel_debounce();
        session.mark_turn_start();

        match session.state() {
            LifecycleState::Speaking | LifecycleState::Thinking => {
                let epoch = session.bump_epoch();
                info!("Session {}: barge-in, epoch now {epoch}", session.id);
                session.mark_barge_in();
                session.send(OutgoingMessage::BargeIn).await;
                session.clear_transcripts();
                session.transition(LifecycleState::Listening).await;
            }
            LifecycleState::Idle => {
                session.transition(LifecycleState::Listening).await;
            }
            LifecycleState::Listening => {}
        }
    }

    /// VAD reported the user stopped speaking: arm the debounce timer.
    /// Renewed speech before it fires cancels it.
    pub fn on_speech_end(self: &Arc<Self>, session: &Arc<Session>) {
        let engine = Arc::clone(self);
        let task_session = Arc::clone(session);
        let debounce = self.debounce;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            engine.finalize_turn(&task_session).await;
        });
        session.arm_debounce(handle);
    }

    /// Apply one recognizer event and mirror the update to the client.
    pub async fn on_transcript(&self, session: &Arc<Session>, event: TranscriptEvent) {
        match session.apply_transcript_event(event) {
            StitchUpdate::Interim(text) => {
                session
                    .send(OutgoingMessage::TranscriptUser {
                        text,
                        is_interim: true,
                    })
                    .await;
            }
            StitchUpdate::Final(text) => {
                session
                    .send(OutgoingMessage::TranscriptUser {
                        text,
                        is_interim: false,
                    })
                    .await;
            }
            StitchUpdate::Dropped => {}
        }
    }

    /// Inject a typed line as if it were a final transcript and finalize
    /// the turn immediately.
    pub async fn on_debug_input(self: &Arc<Self>, session: &Arc<Session>, text: String) {
        session.mark_turn_start();
        session.apply_transcript_event(TranscriptEvent {
            text,
            is_final: true,
        });
        self.finalize_turn(session).await;
    }

    /// The client drained its audio buffer for the current reply.
    pub async fn on_playback_complete(&self, session: &Arc<Session>) {
        if session.state() != LifecycleState::Speaking {
            return;
        }
        let next = if session.interview_active() {
            LifecycleState::Listening
        } else {
            LifecycleState::Idle
        };
        session.transition(next).await;
    }

    /// Periodic fallback: finalize listening sessions whose audio frames
    /// simply stopped arriving.
    ///
    /// When frames stop mid-utterance the VAD never sees the quiet frames
    /// that would end speech, so no debounce is ever armed; the sweep is
    /// the only path that recovers such a session. The detector is reset
    /// on that path so resumed speech emits a fresh start event.
    pub async fn run_heartbeat(self: Arc<Self>, registry: Arc<SessionRegistry>) {
        let mut ticker = tokio::time::interval(self.heartbeat_interval);
        loop {
            ticker.tick().await;
            for session in registry.snapshot().await {
                if session.state() != LifecycleState::Listening
                    || session.ms_since_last_audio() < self.turn_end_silence_ms
                {
                    continue;
                }
                let stalled_mid_speech = session.is_vad_speaking();
                if !stalled_mid_speech && !session.has_pending_transcript() {
                    continue;
                }
                if stalled_mid_speech {
                    session.vad.lock().reset();
                }
                debug!("Session {}: heartbeat finalizing silent turn", session.id);
                let engine = Arc::clone(&self);
                tokio::spawn(async move {
                    engine.finalize_turn(&session).await;
                });
            }
        }
    }

    /// Run the full reply pipeline for a finished turn.
    ///
    /// The debounce timer and the heartbeat sweep both land here; the
    /// compare-and-swap on the turn lock resolves the race so the pipeline
    /// runs once per turn.
    pub async fn finalize_turn(self: &Arc<Self>, session: &Arc<Session>) {
        if !session.try_begin_turn() {
            debug!("Session {}: turn already being processed", session.id);
            return;
        }
        let _guard = TurnLockGuard { session };
        session.cancel_debounce();

        let Some(text) = session.take_turn_transcript(self.interim_fallback_min_chars) else {
            let fallback = if session.interview_active() {
                LifecycleState::Listening
            } else {
                LifecycleState::Idle
            };
            session.transition(fallback).await;
            return;
        };

        let turn_id = session.begin_turn_metrics();
        info!("Session {}: turn {turn_id} finalized: {text:?}", session.id);

        session
            .send(OutgoingMessage::TranscriptUser {
                text: text.clone(),
                is_interim: false,
            })
            .await;
        session.push_message(ChatMessage::user(text.clone()));
        session.transition(LifecycleState::Thinking).await;

        // A fresh epoch for this reply; barge-in during any stage below
        // moves past it and the remaining stages drop out.
        let epoch = session.bump_epoch();

        let reply = match self.produce_reply(session, &text).await {
            Ok(reply) => reply,
            Err(error) => {
                // A failed turn resolves to silence; the client only sees
                // the state move back to listening.
                warn!("Session {}: reply generation failed: {error}", session.id);
                session.transition(LifecycleState::Listening).await;
                return;
            }
        };

        let (reply, interview_finished) = if session.interview_active()
            && reply.contains(prompts::END_INTERVIEW_SENTINEL)
        {
            (
                reply
                    .replace(prompts::END_INTERVIEW_SENTINEL, "")
                    .trim()
                    .to_string(),
                true,
            )
        } else {
            (reply, false)
        };

        session.push_message(ChatMessage::assistant(reply.clone()));
        session
            .send(OutgoingMessage::TranscriptAssistant { text: reply.clone() })
            .await;

        let speakable = format_for_speech(&reply);
        session.transition(LifecycleState::Speaking).await;
        dispatch::stream_reply(session, self.synthesizer.as_ref(), &speakable, epoch).await;

        let (finished_turn, metrics) = session.take_turn_metrics();
        session
            .send(OutgoingMessage::Metrics {
                turn_id: finished_turn,
                data: metrics,
            })
            .await;

        if interview_finished {
            session.set_interview_active(false);
            session.send(OutgoingMessage::InterviewEnd).await;
        }
    }

    /// Build the system prompt, optionally enrich it with web results, and
    /// ask the model for the reply.
    async fn produce_reply(
        &self,
        session: &Arc<Session>,
        text: &str,
    ) -> Result<String, LlmError> {
        let mut system = if session.interview_active() {
            prompts::INTERVIEW_PROMPT.to_string()
        } else {
            prompts::ASSISTANT_PROMPT.to_string()
        };

        if let Some(instruction) = session.dynamic_instruction() {
            system.push_str("\n\nAdditional context from the host application:\n");
            system.push_str(&instruction);
        }

        if !session.interview_active() && should_trigger_search(text) {
            if let Some(query) = self.refine_search_query(text).await {
                let results = self.search.search(&query).await;
                if !results.is_empty() {
                    system.push_str("\n\n");
                    system.push_str(&format_search_context(&results));
                }
            }
        }

        let mut messages = vec![ChatMessage::system(system)];
        messages.extend(session.message_history());

        session.stamp_llm_start();
        let reply = self.generator.generate(&messages).await?;
        session.stamp_llm_finish();
        Ok(reply)
    }

    /// Ask the model whether the turn needs a search and with what query.
    /// Failures skip the search rather than fail the turn.
    async fn refine_search_query(&self, text: &str) -> Option<String> {
        let messages = vec![
            ChatMessage::system(prompts::SEARCH_DECISION_PROMPT),
            ChatMessage::user(text),
        ];
        match self.generator.generate(&messages).await {
            Ok(reply) => prompts::parse_search_decision(&reply),
            Err(error) => {
                warn!("Search decision failed, skipping lookup: {error}");
                None
            }
        }
    }

    /// Begin interview mode: the assistant opens with a greeting and the
    /// first question.
    pub async fn start_interview(self: &Arc<Self>, session: &Arc<Session>) {
        if session.interview_active() {
            return;
        }
        session.set_interview_active(true);
        if !session.try_begin_turn() {
            // A turn is mid-flight; the mode flag applies from the next one.
            return;
        }
        let _guard = TurnLockGuard { session };

        session.transition(LifecycleState::Thinking).await;
        let epoch = session.bump_epoch();

        let messages = vec![
            ChatMessage::system(prompts::INTERVIEW_PROMPT),
            ChatMessage::user("Please greet the candidate briefly and ask your first question."),
        ];
        session.stamp_llm_start();
        let opening = match self.generator.generate(&messages).await {
            Ok(opening) => opening,
            Err(error) => {
                warn!("Session {}: interview opening failed: {error}", session.id);
                session.set_interview_active(false);
                session.transition(LifecycleState::Idle).await;
                return;
            }
        };
        session.stamp_llm_finish();

        session.push_message(ChatMessage::assistant(opening.clone()));
        session
            .send(OutgoingMessage::TranscriptAssistant {
                text: opening.clone(),
            })
            .await;
        session.transition(LifecycleState::Speaking).await;
        dispatch::stream_reply(
            session,
            self.synthesizer.as_ref(),
            &format_for_speech(&opening),
            epoch,
        )
        .await;
    }

    /// Abort interview mode: cut off any reply in flight and speak a short
    /// closing line.
    pub async fn end_interview(&self, session: &Arc<Session>) {
        if !session.interview_active() {
            return;
        }
        session.set_interview_active(false);
        session.cancel_debounce();
        session.clear_transcripts();
        let epoch = session.bump_epoch();

        session
            .send(OutgoingMessage::TranscriptAssistant {
                text: prompts::INTERVIEW_CLOSING.to_string(),
            })
            .await;
        session.transition(LifecycleState::Speaking).await;
        dispatch::stream_reply(
            session,
            self.synthesizer.as_ref(),
            prompts::INTERVIEW_CLOSING,
            epoch,
        )
        .await;
        session.send(OutgoingMessage::InterviewEnd).await;
    }
}
