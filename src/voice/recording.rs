//! Recording lifecycle state machine
//!
//! Tracks one utterance capture: idle until the orchestrator starts a
//! recording, buffering frames while recording, then handing the captured
//! utterance off for transcription. Cyclic; reused for every utterance.

use std::time::Instant;

/// Current state of the recording lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingState {
    /// Not capturing
    Idle,
    /// Buffering frames for the current utterance
    Recording,
    /// Utterance handed off, waiting for the pipeline to finish
    Processing,
}

/// Named events driving the recording lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingEvent {
    /// Begin capturing an utterance
    StartRecording,
    /// Trailing silence floor reached
    SilenceTimeout,
    /// Utterance hit the max-duration cap
    MaxDuration,
    /// Transcribe/respond/speak pipeline finished
    Complete,
}

/// The recording lifecycle machine
///
/// Transitions happen only through [`RecordingMachine::handle`]; events that
/// are not defined for the current state are ignored.
#[derive(Debug)]
pub struct RecordingMachine {
    state: RecordingState,
    /// Timestamp of the last transition
    entered_at: Instant,
    /// Stable for the duration of one `Recording` state
    started_at: Option<Instant>,
    utterance: Vec<f32>,
}

impl Default for RecordingMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingMachine {
    /// Create a machine in `Idle`
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RecordingState::Idle,
            entered_at: Instant::now(),
            started_at: None,
            utterance: Vec::new(),
        }
    }

    /// Handle a named event, returning the new state if a transition fired
    pub fn handle(&mut self, event: RecordingEvent) -> Option<RecordingState> {
        let next = match (self.state, event) {
            (RecordingState::Idle, RecordingEvent::StartRecording) => RecordingState::Recording,
            (
                RecordingState::Recording,
                RecordingEvent::SilenceTimeout | RecordingEvent::MaxDuration,
            ) => RecordingState::Processing,
            (RecordingState::Processing, RecordingEvent::Complete) => RecordingState::Idle,
            (state, event) => {
                tracing::trace!(?state, ?event, "ignoring event with no transition");
                return None;
            }
        };

        tracing::debug!(from = ?self.state, to = ?next, ?event, "recording transition");
        self.enter(next);
        Some(next)
    }

    fn enter(&mut self, next: RecordingState) {
        self.state = next;
        self.entered_at = Instant::now();

        match next {
            RecordingState::Recording => {
                self.utterance.clear();
                self.started_at = Some(self.entered_at);
            }
            RecordingState::Idle => {
                self.started_at = None;
            }
            RecordingState::Processing => {}
        }
    }

    /// Append a frame to the utterance buffer; no-op outside `Recording`
    pub fn push_frame(&mut self, frame: &[f32]) {
        if self.state == RecordingState::Recording {
            self.utterance.extend_from_slice(frame);
        }
    }

    /// Take the buffered utterance, leaving the buffer empty
    pub fn take_utterance(&mut self) -> Vec<f32> {
        std::mem::take(&mut self.utterance)
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> RecordingState {
        self.state
    }

    /// Timestamp captured on the last `Idle` → `Recording` transition
    ///
    /// Stable for the life of the `Recording` state; `None` in `Idle`.
    #[must_use]
    pub const fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    /// Whether the machine is actively buffering
    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.state == RecordingState::Recording
    }

    /// Samples buffered so far
    #[must_use]
    pub fn buffered_samples(&self) -> usize {
        self.utterance.len()
    }
}
