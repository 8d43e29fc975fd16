//! Voice interaction orchestrator
//!
//! Coordinates the wake-word, recording, and playback lifecycles around the
//! VAD gate and the external collaborators (transcription, LLM query, TTS).
//! The machines communicate through named events only; the orchestrator
//! never reaches into their state fields.
//!
//! The frame pump ([`Orchestrator::ingest_frame`]) is synchronous and does
//! no I/O, so continuous audio ingestion is never blocked by collaborator
//! calls. Collaborator failures are absorbed here into spoken fallback
//! messages; a cycle always ends back in idle.

use async_trait::async_trait;

use crate::config::VadConfig;
use crate::voice::capture::FRAME_DURATION;
use crate::voice::cues::{Cue, CueGate};
use crate::voice::playback::StopHandle;
use crate::voice::playback_state::{PlaybackEvent, PlaybackMachine, PlaybackState};
use crate::voice::recording::{RecordingEvent, RecordingMachine, RecordingState};
use crate::voice::vad::{UtteranceVerdict, VadGate};
use crate::voice::wake::{WakeEvent, WakeMachine, WakeState};
use crate::Result;

/// Spoken when the LLM or TTS path fails
const FALLBACK_REPLY: &str = "Sorry, something went wrong. Please try again.";

/// Spoken when a command utterance transcribes to nothing
const EMPTY_TRANSCRIPT_REPLY: &str = "Sorry, I didn't catch that.";

/// Transcription collaborator
#[async_trait(?Send)]
pub trait Transcriber {
    /// Transcribe an utterance; failures surface as an empty transcript
    async fn transcribe_or_empty(&self, utterance: &[f32]) -> String;
}

/// LLM query collaborator
#[async_trait(?Send)]
pub trait Responder {
    /// Produce a spoken-form response for a transcript
    ///
    /// # Errors
    ///
    /// Returns error if the query fails or exceeds its deadline
    async fn respond(&self, transcript: &str) -> Result<String>;
}

/// TTS collaborator
#[async_trait(?Send)]
pub trait Synthesizer {
    /// Synthesize text to MP3 bytes
    ///
    /// # Errors
    ///
    /// Returns error if synthesis fails or exceeds its deadline
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;
}

/// Audio output collaborator (speaker device)
#[async_trait(?Send)]
pub trait AudioSink {
    /// Play MP3 audio until done or the stop handle fires
    ///
    /// # Errors
    ///
    /// Returns error if decoding or the output device fails
    async fn play_mp3(&mut self, mp3: &[u8], stop: &StopHandle) -> Result<()>;

    /// Play a short cue tone
    ///
    /// # Errors
    ///
    /// Returns error if the output device fails
    async fn play_cue(&mut self, cue: Cue) -> Result<()>;
}

/// The external collaborators, grouped for construction
pub struct Collaborators {
    /// Transcription service
    pub transcriber: Box<dyn Transcriber>,
    /// LLM query service
    pub responder: Box<dyn Responder>,
    /// TTS service
    pub synthesizer: Box<dyn Synthesizer>,
    /// Speaker output
    pub sink: Box<dyn AudioSink>,
}

/// One captured utterance handed off by the frame pump
#[derive(Debug)]
pub struct CapturedUtterance {
    /// Buffered samples between recording start and stop
    pub samples: Vec<f32>,
    /// Whether the capture met the minimum-speech floor
    pub valid: bool,
}

/// Orchestrates the three lifecycle machines and the collaborators
pub struct Orchestrator {
    wake: WakeMachine,
    recording: RecordingMachine,
    playback: PlaybackMachine,
    vad: VadGate,
    collab: Collaborators,
    /// Wake acknowledged with no command; the next utterance is the command
    awaiting_command: bool,
    /// Stop handle for the current playback, refreshed per playback
    stop: StopHandle,
}

impl Orchestrator {
    /// Create an orchestrator over the given machines and collaborators
    #[must_use]
    pub fn new(
        vad_config: VadConfig,
        wake: WakeMachine,
        playback: PlaybackMachine,
        collab: Collaborators,
    ) -> Self {
        Self {
            wake,
            recording: RecordingMachine::new(),
            playback,
            vad: VadGate::new(vad_config),
            collab,
            awaiting_command: false,
            stop: StopHandle::new(),
        }
    }

    /// Start the wake detector lifecycle
    pub fn start(&mut self) {
        self.wake.handle(WakeEvent::Init);
    }

    /// Signal that the detector's internal buffers have filled
    pub fn detector_buffers_filled(&mut self) {
        self.wake.buffers_filled();
    }

    /// Advance time-driven transitions (warm-up settle, playback cooldown)
    ///
    /// Returns `true` exactly once per warm-up cycle when the detector
    /// becomes ready; callers gate startup announcements on it.
    pub fn poll(&mut self) -> bool {
        self.playback.poll();
        self.wake.poll()
    }

    /// Feed one audio frame through the VAD gate and the recording machine
    ///
    /// Synchronous and allocation-light; returns a captured utterance when
    /// the recording machine enters `Processing`, exactly once per capture.
    pub fn ingest_frame(&mut self, frame: &[f32]) -> Option<CapturedUtterance> {
        self.playback.poll();
        let obs = self.vad.observe(frame, FRAME_DURATION);

        match self.recording.state() {
            RecordingState::Idle => {
                if obs.is_speech && self.capture_armed() {
                    // Fresh counters for the new utterance; this frame counts
                    self.vad.reset();
                    let _ = self.vad.observe(frame, FRAME_DURATION);
                    self.recording.handle(RecordingEvent::StartRecording);
                    self.recording.push_frame(frame);
                }
                None
            }
            RecordingState::Recording => {
                self.recording.push_frame(frame);
                match self.vad.verdict() {
                    UtteranceVerdict::Continue => None,
                    UtteranceVerdict::SilenceTimeout => {
                        self.recording.handle(RecordingEvent::SilenceTimeout);
                        Some(self.finish_capture())
                    }
                    UtteranceVerdict::MaxDuration => {
                        tracing::debug!("utterance hit max duration cap");
                        self.recording.handle(RecordingEvent::MaxDuration);
                        Some(self.finish_capture())
                    }
                }
            }
            // Single active utterance: frames during processing are dropped
            RecordingState::Processing => None,
        }
    }

    /// Whether an idle recording machine should arm on speech
    fn capture_armed(&self) -> bool {
        self.wake.is_ready() || (self.wake.state() == WakeState::Triggered && self.awaiting_command)
    }

    fn finish_capture(&mut self) -> CapturedUtterance {
        let valid = self.vad.meets_min_speech();
        let samples = self.recording.take_utterance();
        self.vad.reset();
        CapturedUtterance { samples, valid }
    }

    /// Run the transcribe → respond → speak pipeline for one capture
    ///
    /// Every failure path ends with the recording machine back in `Idle`;
    /// collaborator errors become spoken fallbacks, never propagated.
    pub async fn process_capture(&mut self, capture: CapturedUtterance) {
        if self.recording.state() != RecordingState::Processing {
            tracing::warn!(state = ?self.recording.state(), "capture processed outside Processing");
        }

        if !capture.valid {
            tracing::debug!(samples = capture.samples.len(), "capture below min-speech floor, discarded");
            self.finish_cycle(false).await;
            return;
        }

        let transcript = self.collab.transcriber.transcribe_or_empty(&capture.samples).await;
        tracing::debug!(transcript = %transcript, "utterance transcribed");

        if self.awaiting_command {
            self.awaiting_command = false;
            if transcript.trim().is_empty() {
                self.speak(EMPTY_TRANSCRIPT_REPLY).await;
            } else {
                self.respond_and_speak(&transcript).await;
            }
            self.finish_cycle(true).await;
            return;
        }

        // Wake-listening phase: the utterance must contain a wake phrase
        let Some(phrase) = self.wake.match_phrase(&transcript).map(str::to_string) else {
            tracing::trace!("no wake phrase, discarding utterance");
            self.finish_cycle(false).await;
            return;
        };

        tracing::info!(phrase = %phrase, "wake phrase detected");
        self.wake.handle(WakeEvent::WakeDetected);

        let command = self.wake.extract_command(&transcript, &phrase).to_string();
        if command.is_empty() {
            // Bare wake phrase: acknowledge and capture the command next
            self.try_play_cue(Cue::Acknowledge).await;
            self.awaiting_command = true;
            self.recording.handle(RecordingEvent::Complete);
        } else {
            self.respond_and_speak(&command).await;
            self.finish_cycle(true).await;
        }
    }

    /// Play a cue tone if the suppression rules allow it right now
    pub async fn try_play_cue(&mut self, cue: Cue) {
        if !CueGate::may_play(self.recording.state(), self.playback.state()) {
            tracing::trace!(?cue, recording = ?self.recording.state(), playback = ?self.playback.state(), "cue suppressed");
            return;
        }
        if let Err(e) = self.collab.sink.play_cue(cue).await {
            tracing::warn!(error = %e, ?cue, "cue playback failed");
        }
    }

    async fn respond_and_speak(&mut self, transcript: &str) {
        let reply = match self.collab.responder.respond(transcript).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                tracing::warn!("empty LLM response");
                FALLBACK_REPLY.to_string()
            }
            Err(e) => {
                tracing::warn!(error = %e, "LLM query failed");
                FALLBACK_REPLY.to_string()
            }
        };
        self.speak(&reply).await;
    }

    async fn speak(&mut self, text: &str) {
        let mp3 = match self.collab.synthesizer.synthesize(text).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(error = %e, "TTS synthesis failed, skipping playback");
                return;
            }
        };

        self.stop = StopHandle::new();
        self.playback.handle(PlaybackEvent::StartPlayback);

        if let Err(e) = self.collab.sink.play_mp3(&mp3, &self.stop).await {
            tracing::warn!(error = %e, "playback failed");
        }

        if self.stop.is_stopped() {
            // A barge-in mid-playback; the sink wound down early
            if self.playback.is_playing() {
                self.playback.handle(PlaybackEvent::WakeDetected);
            }
            self.playback.handle(PlaybackEvent::Stopped);
            if self.wake.is_ready() {
                self.wake.handle(WakeEvent::WakeDetected);
                self.awaiting_command = true;
            }
        } else {
            self.playback.handle(PlaybackEvent::PlaybackDone);
        }
    }

    /// Close out the current interaction cycle
    async fn finish_cycle(&mut self, completed: bool) {
        self.recording.handle(RecordingEvent::Complete);

        if self.wake.state() == WakeState::Triggered && !self.awaiting_command {
            self.wake.handle(WakeEvent::Reset);
            // The energy-gate detector has no embedding buffers to refill;
            // re-arming is gated by the settle delay alone
            self.wake.buffers_filled();
        }

        if completed {
            self.try_play_cue(Cue::Done).await;
        }
    }

    /// Current recording state
    #[must_use]
    pub const fn recording_state(&self) -> RecordingState {
        self.recording.state()
    }

    /// Current wake state
    #[must_use]
    pub const fn wake_state(&self) -> WakeState {
        self.wake.state()
    }

    /// Current playback state
    #[must_use]
    pub const fn playback_state(&self) -> PlaybackState {
        self.playback.state()
    }

    /// `started_at` of the in-progress recording, if any
    #[must_use]
    pub const fn recording_started_at(&self) -> Option<std::time::Instant> {
        self.recording.started_at()
    }

    /// Whether a wake acknowledge is pending a command utterance
    #[must_use]
    pub const fn awaiting_command(&self) -> bool {
        self.awaiting_command
    }
}
