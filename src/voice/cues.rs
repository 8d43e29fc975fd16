//! Ambient audio cues and their suppression rules
//!
//! Short notification beeps (wake acknowledge, done) must never play while
//! the microphone is capturing an utterance: the beep would land in the
//! recording and the transcription service renders it as a literal
//! "[BEEPING]" token. Cues are also held back while TTS output is playing.

use crate::voice::playback_state::PlaybackState;
use crate::voice::recording::RecordingState;

/// Sample rate for generated cue tones
pub const CUE_SAMPLE_RATE: u32 = 24_000;

/// Ambient cue kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    /// Wake phrase acknowledged, listening
    Acknowledge,
    /// Interaction cycle finished
    Done,
}

/// Decides whether an ambient cue may play right now
#[derive(Debug, Default, Clone, Copy)]
pub struct CueGate;

impl CueGate {
    /// Whether a cue may play given the combined lifecycle state
    #[must_use]
    pub fn may_play(recording: RecordingState, playback: PlaybackState) -> bool {
        recording != RecordingState::Recording && playback != PlaybackState::Playing
    }
}

/// Generate a short sine burst for a cue, with a linear fade-out to avoid
/// a click at the end
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn cue_samples(cue: Cue) -> Vec<f32> {
    let (frequency, duration_ms) = match cue {
        Cue::Acknowledge => (880.0_f32, 120),
        Cue::Done => (440.0_f32, 180),
    };

    let num_samples = (CUE_SAMPLE_RATE as usize * duration_ms) / 1000;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / CUE_SAMPLE_RATE as f32;
            let fade = 1.0 - i as f32 / num_samples as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.2 * fade
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suppressed_while_recording() {
        for playback in [
            PlaybackState::Idle,
            PlaybackState::Playing,
            PlaybackState::Cooldown,
            PlaybackState::Interrupted,
        ] {
            assert!(!CueGate::may_play(RecordingState::Recording, playback));
        }
    }

    #[test]
    fn suppressed_while_playing() {
        for recording in [
            RecordingState::Idle,
            RecordingState::Recording,
            RecordingState::Processing,
        ] {
            assert!(!CueGate::may_play(recording, PlaybackState::Playing));
        }
    }

    #[test]
    fn allowed_when_idle() {
        assert!(CueGate::may_play(RecordingState::Idle, PlaybackState::Idle));
        assert!(CueGate::may_play(RecordingState::Processing, PlaybackState::Cooldown));
        assert!(CueGate::may_play(RecordingState::Idle, PlaybackState::Interrupted));
    }

    #[test]
    fn cue_tones_have_expected_length() {
        let ack = cue_samples(Cue::Acknowledge);
        assert_eq!(ack.len(), (CUE_SAMPLE_RATE as usize * 120) / 1000);

        let done = cue_samples(Cue::Done);
        assert_eq!(done.len(), (CUE_SAMPLE_RATE as usize * 180) / 1000);
    }

    #[test]
    fn cue_tones_fade_out() {
        let samples = cue_samples(Cue::Done);
        // Early peak amplitude well above the tail
        let head_peak = samples[..100].iter().fold(0.0f32, |a, s| a.max(s.abs()));
        let tail_peak = samples[samples.len() - 100..]
            .iter()
            .fold(0.0f32, |a, s| a.max(s.abs()));
        assert!(head_peak > tail_peak);
    }
}
