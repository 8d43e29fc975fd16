//! Voice pipeline integration tests
//!
//! Drives the VAD gate, the lifecycle machines, and the orchestrator with
//! synthetic audio; no audio hardware or network required.

use std::cell::RefCell;
use std::io::Cursor;
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;

use oracle_gateway::config::VadConfig;
use oracle_gateway::voice::{
    samples_to_wav, AudioSink, Collaborators, Cue, Orchestrator, PlaybackMachine, Responder,
    StopHandle, Synthesizer, Transcriber, UtteranceVerdict, VadGate, WakeMachine, WakeState,
    FRAME_DURATION, FRAME_SAMPLES, SAMPLE_RATE,
};
use oracle_gateway::Result;

/// Generate sine wave audio samples
fn generate_sine_samples(frequency: f32, duration_secs: f32, amplitude: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}

/// Generate silence
fn generate_silence(duration_secs: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    vec![0.0; num_samples]
}

/// Split samples into whole VAD frames, dropping any remainder
fn frames(samples: &[f32]) -> Vec<&[f32]> {
    samples.chunks_exact(FRAME_SAMPLES).collect()
}

#[test]
fn vad_gate_distinguishes_sine_from_silence() {
    let mut gate = VadGate::new(VadConfig::default());

    let speech = generate_sine_samples(440.0, 0.1, 0.3);
    let obs = gate.observe(&speech, FRAME_DURATION);
    assert!(obs.is_speech);
    assert!(obs.energy > 0.1);

    let silence = generate_silence(0.1);
    let obs = gate.observe(&silence, FRAME_DURATION);
    assert!(!obs.is_speech);
}

#[test]
fn vad_gate_closes_utterance_after_trailing_silence() {
    let mut gate = VadGate::new(VadConfig::default());

    for frame in frames(&generate_sine_samples(440.0, 1.0, 0.3)) {
        gate.observe(frame, FRAME_DURATION);
        assert_eq!(gate.verdict(), UtteranceVerdict::Continue);
    }

    let silence = generate_silence(1.6);
    let mut ended = false;
    for frame in frames(&silence) {
        gate.observe(frame, FRAME_DURATION);
        if gate.verdict() == UtteranceVerdict::SilenceTimeout {
            ended = true;
            break;
        }
    }
    assert!(ended, "silence never closed the utterance");
    assert!(gate.meets_min_speech());
}

#[test]
fn wake_machine_full_lifecycle() {
    let mut wake = WakeMachine::new(vec!["hey oracle".to_string()], Duration::ZERO);
    assert_eq!(wake.state(), WakeState::Off);

    wake.handle(oracle_gateway::voice::WakeEvent::Init);
    wake.buffers_filled();
    assert!(wake.poll());
    assert_eq!(wake.state(), WakeState::Ready);

    assert_eq!(wake.match_phrase("Hey Oracle, lights on"), Some("hey oracle"));
    wake.handle(oracle_gateway::voice::WakeEvent::WakeDetected);
    assert_eq!(wake.state(), WakeState::Triggered);

    wake.handle(oracle_gateway::voice::WakeEvent::Reset);
    assert_eq!(wake.state(), WakeState::WarmingUp);
    // A fresh warm-up gates readiness again
    assert!(!wake.poll());
}

#[test]
fn samples_to_wav_has_riff_header() {
    let samples = generate_sine_samples(440.0, 0.1, 0.5);
    let wav_data = samples_to_wav(&samples, SAMPLE_RATE).unwrap();

    assert_eq!(&wav_data[0..4], b"RIFF");
    assert_eq!(&wav_data[8..12], b"WAVE");
    assert!(wav_data.len() > 44); // WAV header is 44 bytes
}

#[test]
fn wav_roundtrip_preserves_shape() {
    let original_samples: Vec<f32> = vec![0.0, 0.5, -0.5, 1.0, -1.0, 0.25];
    let wav_data = samples_to_wav(&original_samples, SAMPLE_RATE).unwrap();

    let cursor = Cursor::new(wav_data);
    let mut reader = hound::WavReader::new(cursor).unwrap();

    let spec = reader.spec();
    assert_eq!(spec.sample_rate, SAMPLE_RATE);
    assert_eq!(spec.channels, 1);

    let read_samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
    assert_eq!(read_samples.len(), original_samples.len());
}

// ---------------------------------------------------------------------------
// Orchestrator end-to-end with fake collaborators

#[derive(Default)]
struct Log {
    transcribed: usize,
    responses: Vec<String>,
    spoken: Vec<String>,
    cues: Vec<Cue>,
}

struct FakeTranscriber {
    text: String,
    log: Rc<RefCell<Log>>,
}

#[async_trait(?Send)]
impl Transcriber for FakeTranscriber {
    async fn transcribe_or_empty(&self, _utterance: &[f32]) -> String {
        self.log.borrow_mut().transcribed += 1;
        self.text.clone()
    }
}

struct FakeResponder {
    log: Rc<RefCell<Log>>,
}

#[async_trait(?Send)]
impl Responder for FakeResponder {
    async fn respond(&self, transcript: &str) -> Result<String> {
        let reply = format!("done: {transcript}");
        self.log.borrow_mut().responses.push(reply.clone());
        Ok(reply)
    }
}

struct FakeSynthesizer;

#[async_trait(?Send)]
impl Synthesizer for FakeSynthesizer {
    async fn synthesize(&self, _text: &str) -> Result<Vec<u8>> {
        Ok(vec![0u8; 8])
    }
}

struct FakeSink {
    log: Rc<RefCell<Log>>,
}

#[async_trait(?Send)]
impl AudioSink for FakeSink {
    async fn play_mp3(&mut self, _mp3: &[u8], _stop: &StopHandle) -> Result<()> {
        self.log.borrow_mut().spoken.push("mp3".to_string());
        Ok(())
    }

    async fn play_cue(&mut self, cue: Cue) -> Result<()> {
        self.log.borrow_mut().cues.push(cue);
        Ok(())
    }
}

fn build_orchestrator(transcript: &str) -> (Orchestrator, Rc<RefCell<Log>>) {
    let log = Rc::new(RefCell::new(Log::default()));
    let collab = Collaborators {
        transcriber: Box::new(FakeTranscriber {
            text: transcript.to_string(),
            log: Rc::clone(&log),
        }),
        responder: Box::new(FakeResponder {
            log: Rc::clone(&log),
        }),
        synthesizer: Box::new(FakeSynthesizer),
        sink: Box::new(FakeSink {
            log: Rc::clone(&log),
        }),
    };

    let wake = WakeMachine::new(vec!["hey oracle".to_string()], Duration::ZERO);
    let mut orch = Orchestrator::new(
        VadConfig::default(),
        wake,
        PlaybackMachine::new(Duration::ZERO),
        collab,
    );
    orch.start();
    orch.detector_buffers_filled();
    assert!(orch.poll());
    (orch, log)
}

#[tokio::test]
async fn sine_utterance_runs_full_pipeline() {
    let (mut orch, log) = build_orchestrator("hey oracle turn off the fan");

    // 3s of tone followed by 1.6s of silence
    let mut audio = generate_sine_samples(440.0, 3.0, 0.3);
    audio.extend(generate_silence(1.6));

    let mut captures = Vec::new();
    for frame in frames(&audio) {
        if let Some(capture) = orch.ingest_frame(frame) {
            captures.push(capture);
        }
    }

    assert_eq!(captures.len(), 1, "expected exactly one capture");
    let capture = captures.pop().unwrap();
    assert!(capture.valid);

    orch.process_capture(capture).await;

    let log = log.borrow();
    assert_eq!(log.transcribed, 1);
    assert_eq!(log.responses, vec!["done: turn off the fan"]);
    assert_eq!(log.spoken.len(), 1);
}

#[tokio::test]
async fn capture_closes_at_four_and_a_half_seconds() {
    // 3s speech + 1.6s silence with default thresholds: the capture must
    // close on the 45th frame (1.5s trailing silence after 3s of speech)
    let (mut orch, _log) = build_orchestrator("hey oracle hello");

    let mut audio = generate_sine_samples(440.0, 3.0, 0.3);
    audio.extend(generate_silence(1.6));

    let mut capture_frames = Vec::new();
    for (i, frame) in frames(&audio).into_iter().enumerate() {
        if orch.ingest_frame(frame).is_some() {
            capture_frames.push(i);
        }
    }

    assert_eq!(capture_frames, vec![44]);
}

#[tokio::test]
async fn brief_noise_burst_is_discarded() {
    let (mut orch, log) = build_orchestrator("hey oracle");

    // 300ms burst, far below the min-speech floor
    let mut audio = generate_sine_samples(440.0, 0.3, 0.3);
    audio.extend(generate_silence(1.6));

    let mut capture = None;
    for frame in frames(&audio) {
        if let Some(c) = orch.ingest_frame(frame) {
            capture = Some(c);
        }
    }

    let capture = capture.expect("capture");
    assert!(!capture.valid);

    orch.process_capture(capture).await;
    assert_eq!(log.borrow().transcribed, 0, "invalid capture reached STT");
}

#[tokio::test]
async fn bare_wake_phrase_then_command() {
    let (mut orch, log) = build_orchestrator("hey oracle");

    let mut audio = generate_sine_samples(440.0, 1.0, 0.3);
    audio.extend(generate_silence(1.6));

    let mut capture = None;
    for frame in frames(&audio) {
        if let Some(c) = orch.ingest_frame(frame) {
            capture = Some(c);
        }
    }
    orch.process_capture(capture.expect("capture")).await;

    // Acknowledged and waiting for the follow-up command
    assert!(orch.awaiting_command());
    assert_eq!(log.borrow().cues, vec![Cue::Acknowledge]);
    assert!(log.borrow().responses.is_empty());

    // The follow-up utterance is captured without a wake phrase
    let mut capture = None;
    for frame in frames(&audio) {
        if let Some(c) = orch.ingest_frame(frame) {
            capture = Some(c);
        }
    }
    orch.process_capture(capture.expect("follow-up capture")).await;

    assert!(!orch.awaiting_command());
    assert_eq!(log.borrow().responses, vec!["done: hey oracle"]);
}

#[tokio::test]
async fn unrelated_speech_never_reaches_the_responder() {
    let (mut orch, log) = build_orchestrator("people chatting in the background");

    let mut audio = generate_sine_samples(440.0, 1.0, 0.3);
    audio.extend(generate_silence(1.6));

    let mut capture = None;
    for frame in frames(&audio) {
        if let Some(c) = orch.ingest_frame(frame) {
            capture = Some(c);
        }
    }
    orch.process_capture(capture.expect("capture")).await;

    let log = log.borrow();
    assert_eq!(log.transcribed, 1);
    assert!(log.responses.is_empty());
    assert!(log.spoken.is_empty());
}
