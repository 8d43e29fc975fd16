//! Wake-word lifecycle state machine
//!
//! Gates triggers behind a warm-up period: the detector must not accept
//! wake events, and the gateway must not announce readiness, until the
//! detector's internal buffers have filled and a fixed settle delay has
//! elapsed. Also carries the transcript-level wake-phrase matcher used to
//! confirm a trigger after transcription.

use std::time::{Duration, Instant};

/// Current state of the wake-word lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeState {
    /// Detector not started
    Off,
    /// Buffers filling / settle delay running
    WarmingUp,
    /// Trusted to report triggers
    Ready,
    /// Wake detected, interaction in progress
    Triggered,
}

/// Named events driving the wake-word lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeEvent {
    /// Start the detector
    Init,
    /// Wake phrase confirmed in a transcript
    WakeDetected,
    /// Interaction finished; re-arm through a fresh warm-up
    Reset,
}

/// The wake-word lifecycle machine
#[derive(Debug)]
pub struct WakeMachine {
    state: WakeState,
    settle: Duration,
    wake_phrases: Vec<String>,
    /// Set when buffers fill; `Ready` is gated on this deadline
    settle_deadline: Option<Instant>,
    /// The ready notification fires at most once per warm-up cycle
    ready_emitted: bool,
}

impl WakeMachine {
    /// Create a machine in `Off` with normalized wake phrases
    #[must_use]
    pub fn new(wake_phrases: Vec<String>, settle: Duration) -> Self {
        let normalized: Vec<String> = wake_phrases
            .into_iter()
            .map(|w| w.to_lowercase().trim().to_string())
            .filter(|w| !w.is_empty())
            .collect();

        tracing::debug!(wake_phrases = ?normalized, settle_ms = settle.as_millis(), "wake machine created");

        Self {
            state: WakeState::Off,
            settle,
            wake_phrases: normalized,
            settle_deadline: None,
            ready_emitted: false,
        }
    }

    /// Handle a named event, returning the new state if a transition fired
    pub fn handle(&mut self, event: WakeEvent) -> Option<WakeState> {
        let next = match (self.state, event) {
            (WakeState::Off, WakeEvent::Init) => WakeState::WarmingUp,
            (WakeState::Ready, WakeEvent::WakeDetected) => WakeState::Triggered,
            (WakeState::Triggered, WakeEvent::Reset) => WakeState::WarmingUp,
            (state, event) => {
                tracing::trace!(?state, ?event, "ignoring event with no transition");
                return None;
            }
        };

        tracing::debug!(from = ?self.state, to = ?next, ?event, "wake transition");
        self.state = next;
        if next == WakeState::WarmingUp {
            self.settle_deadline = None;
            self.ready_emitted = false;
        }
        Some(next)
    }

    /// Signal that the detector's internal buffers have filled
    ///
    /// Starts the settle delay; `Ready` is entered by a later [`Self::poll`]
    /// once the delay has elapsed. Ignored outside `WarmingUp`.
    pub fn buffers_filled(&mut self) {
        if self.state == WakeState::WarmingUp && self.settle_deadline.is_none() {
            self.settle_deadline = Some(Instant::now() + self.settle);
            tracing::debug!(settle_ms = self.settle.as_millis(), "buffers filled, settling");
        }
    }

    /// Advance time-driven transitions
    ///
    /// Returns `true` exactly once per warm-up cycle, when the machine
    /// enters `Ready`. Callers use this to gate startup orchestration such
    /// as speaking the welcome message.
    pub fn poll(&mut self) -> bool {
        if self.state != WakeState::WarmingUp || self.ready_emitted {
            return false;
        }
        let Some(deadline) = self.settle_deadline else {
            return false;
        };
        if Instant::now() < deadline {
            return false;
        }

        self.state = WakeState::Ready;
        self.ready_emitted = true;
        tracing::info!("wake detector ready");
        true
    }

    /// Check a transcript for any configured wake phrase
    ///
    /// Case-insensitive substring match over the normalized phrases.
    /// Returns the matched phrase without changing state; the caller decides
    /// whether to send [`WakeEvent::WakeDetected`].
    #[must_use]
    pub fn match_phrase(&self, transcript: &str) -> Option<&str> {
        let normalized = transcript.to_lowercase();
        self.wake_phrases
            .iter()
            .find(|phrase| normalized.contains(phrase.as_str()))
            .map(String::as_str)
    }

    /// Strip the wake phrase and anything before it from a transcript,
    /// leaving the spoken command
    ///
    /// Lowercasing can change byte lengths (e.g. 'İ' lowers to two chars),
    /// so the match position in the lowered text is mapped back to a char
    /// boundary of the original transcript before slicing.
    #[must_use]
    pub fn extract_command<'a>(&self, transcript: &'a str, phrase: &str) -> &'a str {
        let mut lower = String::with_capacity(transcript.len());
        let mut origin = Vec::with_capacity(transcript.len() + 1);
        for (idx, ch) in transcript.char_indices() {
            for low in ch.to_lowercase() {
                for _ in 0..low.len_utf8() {
                    origin.push(idx);
                }
                lower.push(low);
            }
        }
        origin.push(transcript.len());

        lower.find(phrase).map_or(transcript, |idx| {
            let end = origin[idx + phrase.len()];
            transcript[end..].trim_start_matches([',', '.', '!', '?', ' ']).trim()
        })
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> WakeState {
        self.state
    }

    /// Whether triggers are currently accepted
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state == WakeState::Ready
    }

    /// Configured wake phrases (normalized)
    #[must_use]
    pub fn wake_phrases(&self) -> &[String] {
        &self.wake_phrases
    }
}
