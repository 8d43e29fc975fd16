//! Voice activity detection
//!
//! Classifies audio frames as speech or silence by RMS energy against a
//! configurable threshold, with hysteresis tracked as milliseconds of frame
//! time. Purely per-frame math plus two duration counters; no wall-clock
//! dependency, so the gate is fully deterministic under synthetic frames.

use std::time::Duration;

use crate::config::VadConfig;

/// Result of observing one audio frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VadObservation {
    /// Frame energy was above the threshold
    pub is_speech: bool,
    /// RMS energy of the frame
    pub energy: f32,
}

/// What the gate concluded about the utterance after a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UtteranceVerdict {
    /// Keep capturing
    Continue,
    /// Trailing silence floor reached; the utterance has ended
    SilenceTimeout,
    /// Max utterance duration reached without a silence gap
    MaxDuration,
}

/// Energy-threshold speech/silence gate with hysteresis counters
#[derive(Debug)]
pub struct VadGate {
    config: VadConfig,
    /// Continuous above-threshold frame time
    speech: Duration,
    /// Continuous below-threshold frame time
    silence: Duration,
    /// Total above-threshold frame time since last reset (min-speech filter)
    total_speech: Duration,
    /// Total frame time since last reset (max-utterance cap)
    total: Duration,
}

impl VadGate {
    /// Create a gate with the given tunables
    #[must_use]
    pub const fn new(config: VadConfig) -> Self {
        Self {
            config,
            speech: Duration::ZERO,
            silence: Duration::ZERO,
            total_speech: Duration::ZERO,
            total: Duration::ZERO,
        }
    }

    /// Observe one frame and update the duration counters
    ///
    /// Each counter resets to zero whenever the opposite condition is seen.
    pub fn observe(&mut self, frame: &[f32], frame_duration: Duration) -> VadObservation {
        let energy = rms_energy(frame);
        let is_speech = energy > self.config.energy_threshold;

        if is_speech {
            self.speech += frame_duration;
            self.total_speech += frame_duration;
            self.silence = Duration::ZERO;
        } else {
            self.silence += frame_duration;
            self.speech = Duration::ZERO;
        }
        self.total += frame_duration;

        VadObservation { is_speech, energy }
    }

    /// Decide whether the current capture should end
    ///
    /// Trailing silence past the configured floor ends the utterance; the
    /// max-duration cap fires even under continuous speech as a fail-safe
    /// against runaway capture.
    #[must_use]
    pub fn verdict(&self) -> UtteranceVerdict {
        if self.total >= self.config.max_utterance {
            UtteranceVerdict::MaxDuration
        } else if self.silence >= self.config.trailing_silence {
            UtteranceVerdict::SilenceTimeout
        } else {
            UtteranceVerdict::Continue
        }
    }

    /// Whether the capture accumulated enough speech to be worth transcribing
    ///
    /// The minimum-speech floor is a post-capture validity filter: captures
    /// that never reached it are discarded rather than sent to STT.
    #[must_use]
    pub fn meets_min_speech(&self) -> bool {
        self.total_speech >= self.config.min_speech
    }

    /// Continuous below-threshold time so far
    #[must_use]
    pub const fn trailing_silence(&self) -> Duration {
        self.silence
    }

    /// Continuous above-threshold time so far
    #[must_use]
    pub const fn continuous_speech(&self) -> Duration {
        self.speech
    }

    /// Reset all counters for the next capture
    pub fn reset(&mut self) {
        self.speech = Duration::ZERO;
        self.silence = Duration::ZERO;
        self.total_speech = Duration::ZERO;
        self.total = Duration::ZERO;
    }
}

/// Calculate RMS energy of audio samples
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn rms_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: Duration = Duration::from_millis(100);

    fn gate() -> VadGate {
        VadGate::new(VadConfig::default())
    }

    fn speech_frame() -> Vec<f32> {
        vec![0.05; 1600]
    }

    fn silence_frame() -> Vec<f32> {
        vec![0.001; 1600]
    }

    #[test]
    fn energy_of_silence_is_low() {
        assert!(rms_energy(&vec![0.0f32; 100]) < 0.001);
        assert!(rms_energy(&[]) == 0.0);
    }

    #[test]
    fn energy_of_loud_signal_is_high() {
        assert!(rms_energy(&vec![0.5f32; 100]) > 0.4);
    }

    #[test]
    fn speech_frame_observed_as_speech() {
        let mut gate = gate();
        let obs = gate.observe(&speech_frame(), FRAME);
        assert!(obs.is_speech);
        assert!(obs.energy > 0.003);
    }

    #[test]
    fn counters_reset_on_opposite_condition() {
        let mut gate = gate();

        gate.observe(&speech_frame(), FRAME);
        gate.observe(&speech_frame(), FRAME);
        assert_eq!(gate.continuous_speech(), Duration::from_millis(200));
        assert_eq!(gate.trailing_silence(), Duration::ZERO);

        gate.observe(&silence_frame(), FRAME);
        assert_eq!(gate.continuous_speech(), Duration::ZERO);
        assert_eq!(gate.trailing_silence(), Duration::from_millis(100));

        gate.observe(&speech_frame(), FRAME);
        assert_eq!(gate.trailing_silence(), Duration::ZERO);
    }

    #[test]
    fn silence_timeout_after_trailing_floor() {
        let mut gate = gate();
        gate.observe(&speech_frame(), FRAME);

        // 1.4s of silence: not yet
        for _ in 0..14 {
            gate.observe(&silence_frame(), FRAME);
        }
        assert_eq!(gate.verdict(), UtteranceVerdict::Continue);

        // 1.5s: utterance over
        gate.observe(&silence_frame(), FRAME);
        assert_eq!(gate.verdict(), UtteranceVerdict::SilenceTimeout);
    }

    #[test]
    fn max_duration_fires_under_continuous_speech() {
        let mut gate = gate();
        for _ in 0..99 {
            gate.observe(&speech_frame(), FRAME);
        }
        assert_eq!(gate.verdict(), UtteranceVerdict::Continue);

        gate.observe(&speech_frame(), FRAME);
        assert_eq!(gate.verdict(), UtteranceVerdict::MaxDuration);
    }

    #[test]
    fn min_speech_filter() {
        let mut gate = gate();

        // 600ms of speech: below the 700ms floor
        for _ in 0..6 {
            gate.observe(&speech_frame(), FRAME);
        }
        assert!(!gate.meets_min_speech());

        gate.observe(&speech_frame(), FRAME);
        assert!(gate.meets_min_speech());
    }

    #[test]
    fn min_speech_accumulates_across_silence_gaps() {
        let mut gate = gate();

        for _ in 0..4 {
            gate.observe(&speech_frame(), FRAME);
        }
        gate.observe(&silence_frame(), FRAME);
        for _ in 0..3 {
            gate.observe(&speech_frame(), FRAME);
        }

        // 700ms total speech despite the gap
        assert!(gate.meets_min_speech());
    }

    #[test]
    fn reset_clears_all_counters() {
        let mut gate = gate();
        for _ in 0..10 {
            gate.observe(&speech_frame(), FRAME);
        }
        gate.reset();

        assert_eq!(gate.continuous_speech(), Duration::ZERO);
        assert_eq!(gate.trailing_silence(), Duration::ZERO);
        assert!(!gate.meets_min_speech());
        assert_eq!(gate.verdict(), UtteranceVerdict::Continue);
    }

    #[test]
    fn custom_threshold_respected() {
        let mut gate = VadGate::new(VadConfig {
            energy_threshold: 0.1,
            ..VadConfig::default()
        });
        let obs = gate.observe(&speech_frame(), FRAME);
        assert!(!obs.is_speech);
    }
}
