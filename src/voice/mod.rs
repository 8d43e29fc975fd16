//! Voice processing module
//!
//! Audio capture and playback, the VAD gate, the three lifecycle state
//! machines (wake, recording, playback), ambient cues, and the orchestrator
//! that coordinates them with the STT/LLM/TTS collaborators.

mod capture;
mod cues;
mod orchestrator;
mod playback;
mod playback_state;
mod recording;
mod stt;
mod tts;
mod vad;
mod wake;

pub use capture::{
    samples_to_wav, AudioCapture, CaptureTap, FRAME_DURATION, FRAME_SAMPLES, SAMPLE_RATE,
};
pub use cues::{cue_samples, Cue, CueGate, CUE_SAMPLE_RATE};
pub use orchestrator::{
    AudioSink, CapturedUtterance, Collaborators, Orchestrator, Responder, Synthesizer,
    Transcriber,
};
pub use playback::{AudioPlayback, StopHandle};
pub use playback_state::{PlaybackEvent, PlaybackMachine, PlaybackState};
pub use recording::{RecordingEvent, RecordingMachine, RecordingState};
pub use stt::SpeechToText;
pub use tts::TextToSpeech;
pub use vad::{rms_energy, UtteranceVerdict, VadGate, VadObservation};
pub use wake::{WakeEvent, WakeMachine, WakeState};
