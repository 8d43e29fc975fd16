//! Playback lifecycle state machine
//!
//! Tracks TTS output through playing, a short cooldown, and barge-in
//! interruption. The cue gate queries this machine (together with the
//! recording machine) to decide whether ambient beeps may play.

use std::time::{Duration, Instant};

/// Current state of the playback lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// Nothing playing
    Idle,
    /// TTS audio playing
    Playing,
    /// Playback finished; brief quiet period before cues resume
    Cooldown,
    /// Wake trigger arrived mid-playback
    Interrupted,
}

/// Named events driving the playback lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// TTS audio starts
    StartPlayback,
    /// TTS audio ran to completion
    PlaybackDone,
    /// Cooldown period over
    CooldownElapsed,
    /// Wake trigger during playback (barge-in)
    WakeDetected,
    /// Interrupted playback fully stopped
    Stopped,
}

/// The playback lifecycle machine
#[derive(Debug)]
pub struct PlaybackMachine {
    state: PlaybackState,
    cooldown: Duration,
    entered_at: Instant,
}

impl PlaybackMachine {
    /// Create a machine in `Idle`
    #[must_use]
    pub fn new(cooldown: Duration) -> Self {
        Self {
            state: PlaybackState::Idle,
            cooldown,
            entered_at: Instant::now(),
        }
    }

    /// Handle a named event, returning the new state if a transition fired
    pub fn handle(&mut self, event: PlaybackEvent) -> Option<PlaybackState> {
        let next = match (self.state, event) {
            (PlaybackState::Idle, PlaybackEvent::StartPlayback) => PlaybackState::Playing,
            (PlaybackState::Playing, PlaybackEvent::PlaybackDone) => PlaybackState::Cooldown,
            (PlaybackState::Playing, PlaybackEvent::WakeDetected) => PlaybackState::Interrupted,
            (PlaybackState::Cooldown, PlaybackEvent::CooldownElapsed) => PlaybackState::Idle,
            (PlaybackState::Interrupted, PlaybackEvent::Stopped) => PlaybackState::Idle,
            (state, event) => {
                tracing::trace!(?state, ?event, "ignoring event with no transition");
                return None;
            }
        };

        tracing::debug!(from = ?self.state, to = ?next, ?event, "playback transition");
        self.state = next;
        self.entered_at = Instant::now();
        Some(next)
    }

    /// Advance the time-driven cooldown transition
    ///
    /// Sends `CooldownElapsed` once the configured cooldown has passed.
    pub fn poll(&mut self) -> Option<PlaybackState> {
        if self.state == PlaybackState::Cooldown && self.entered_at.elapsed() >= self.cooldown {
            return self.handle(PlaybackEvent::CooldownElapsed);
        }
        None
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> PlaybackState {
        self.state
    }

    /// Whether TTS audio is actively playing
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }
}
