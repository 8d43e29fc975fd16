//! Daemon - the gateway service
//!
//! Builds the voice pipeline from config (capture, orchestrator,
//! STT/LLM/TTS collaborators, MCP tool bridge) and runs the frame pump on
//! the main thread until interrupted. Audio device streams are not Send, so
//! the whole voice loop stays off the tokio worker pool.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::mpsc;

use crate::agent::Agent;
use crate::mcp::zwave::Device;
use crate::mcp::McpClient;
use crate::voice::{
    cue_samples, samples_to_wav, AudioCapture, AudioPlayback, AudioSink, CaptureTap,
    Collaborators, Cue, Orchestrator, PlaybackMachine, Responder, SpeechToText, StopHandle,
    Synthesizer, TextToSpeech, Transcriber, WakeMachine, FRAME_SAMPLES, SAMPLE_RATE,
};
use crate::{Config, Error, Result};

/// Frame pump tick interval
const TICK: Duration = Duration::from_millis(100);

/// Sustained speech required before a barge-in fires
const BARGE_IN_GRACE: Duration = Duration::from_millis(300);

/// Barge-in monitor poll interval
const BARGE_IN_POLL: Duration = Duration::from_millis(50);

/// The speaker bleeds into the microphone during playback, so barge-in
/// needs a margin well above the base VAD threshold
const BARGE_IN_THRESHOLD_FACTOR: f32 = 5.0;

/// The Oracle daemon - owns the voice pipeline
pub struct Daemon {
    config: Config,
}

impl Daemon {
    /// Create a new daemon instance
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run the daemon until interrupted
    ///
    /// # Errors
    ///
    /// Returns error if voice is disabled or a pipeline component fails to
    /// initialize
    #[allow(clippy::future_not_send)]
    pub async fn run(self) -> Result<()> {
        if !self.config.voice.enabled {
            return Err(Error::Config("voice is disabled".to_string()));
        }

        // MCP is optional: after retry exhaustion the agent runs tool-less
        let mcp = match &self.config.mcp {
            Some(mcp_config) => McpClient::connect_with_retry(mcp_config).await,
            None => None,
        };

        let devices = match &mcp {
            Some(mcp) => fetch_devices(mcp).await,
            None => Vec::new(),
        };

        let tools = mcp.as_ref().map(McpClient::tool_specs).unwrap_or_default();
        let system_prompt = crate::prompt::build_system_prompt(&tools, &devices);

        let agent = Agent::from_config(
            &self.config.llm,
            self.config.api_keys.anthropic.as_deref(),
            system_prompt,
            mcp,
        )?;

        let stt = build_stt(&self.config)?;
        let tts = build_tts(&self.config)?;

        let mut capture = AudioCapture::new()?;
        let playback = AudioPlayback::new()?;
        let tap = capture.tap();

        let collab = Collaborators {
            transcriber: Box::new(SttAdapter { stt }),
            responder: Box::new(AgentResponder { agent }),
            synthesizer: Box::new(TtsAdapter { tts }),
            sink: Box::new(DeviceSink {
                playback,
                tap,
                barge_in_threshold: self.config.vad.energy_threshold * BARGE_IN_THRESHOLD_FACTOR,
            }),
        };

        let wake = WakeMachine::new(
            self.config.voice.wake_phrases.clone(),
            self.config.voice.warmup_settle,
        );
        let playback_machine = PlaybackMachine::new(self.config.voice.playback_cooldown);
        let mut orchestrator = Orchestrator::new(self.config.vad, wake, playback_machine, collab);

        // Set up shutdown signal
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = shutdown_tx.send(()).await;
            }
        });

        capture.start()?;
        orchestrator.start();
        orchestrator.detector_buffers_filled();
        tracing::info!(
            wake_phrases = ?self.config.voice.wake_phrases,
            "listening for wake phrase"
        );

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("shutdown requested");
                    break;
                }
                () = tokio::time::sleep(TICK) => {
                    if orchestrator.poll() {
                        tracing::info!("wake detection ready");
                        orchestrator.try_play_cue(Cue::Done).await;
                    }

                    for frame in capture.drain_frames() {
                        if let Some(captured) = orchestrator.ingest_frame(&frame) {
                            orchestrator.process_capture(captured).await;
                            // Drop audio that piled up during the pipeline
                            // (including the speaker's own output)
                            capture.clear_buffer();
                        }
                    }
                }
            }
        }

        capture.stop();
        Ok(())
    }
}

/// Build the STT backend from config
///
/// # Errors
///
/// Returns error if the provider is unknown or its key/binary is missing
pub fn build_stt(config: &Config) -> Result<SpeechToText> {
    match config.voice.stt_provider.as_str() {
        "whisper-api" => SpeechToText::new_whisper_api(
            config.api_keys.openai.clone().unwrap_or_default(),
            config.voice.stt_model.clone(),
            config.voice.stt_timeout,
        ),
        "whisper-cli" => {
            SpeechToText::new_whisper_cli(config.voice.stt_model.clone(), config.voice.stt_timeout)
        }
        other => Err(Error::Config(format!("unknown STT provider: {other}"))),
    }
}

/// Build the TTS backend from config
///
/// # Errors
///
/// Returns error if the provider is unknown or its key is missing
pub fn build_tts(config: &Config) -> Result<TextToSpeech> {
    match config.voice.tts_provider.as_str() {
        "openai" => TextToSpeech::new_openai(
            config.api_keys.openai.clone().unwrap_or_default(),
            config.voice.tts_voice.clone(),
            config.voice.tts_speed,
            config.voice.tts_model.clone(),
            config.voice.tts_timeout,
        ),
        "elevenlabs" => TextToSpeech::new_elevenlabs(
            config.api_keys.elevenlabs.clone().unwrap_or_default(),
            config.voice.tts_voice.clone(),
            config.voice.tts_model.clone(),
            config.voice.tts_timeout,
        ),
        other => Err(Error::Config(format!("unknown TTS provider: {other}"))),
    }
}

/// Best-effort device-list fetch for prompt injection
async fn fetch_devices(mcp: &McpClient) -> Vec<Device> {
    let Some(list_tool) = mcp
        .tool_specs()
        .into_iter()
        .map(|t| t.name)
        .find(|name| name.contains("list") && name.contains("device"))
    else {
        return Vec::new();
    };

    match mcp.call_tool(&list_tool, json!({})).await {
        Ok(payload) => {
            let devices = crate::mcp::zwave::parse_devices(&payload);
            tracing::info!(devices = devices.len(), "device list loaded");
            devices
        }
        Err(e) => {
            tracing::debug!(error = %e, tool = %list_tool, "device list unavailable");
            Vec::new()
        }
    }
}

/// Transcription adapter: samples → WAV → STT backend
struct SttAdapter {
    stt: SpeechToText,
}

#[async_trait(?Send)]
impl Transcriber for SttAdapter {
    async fn transcribe_or_empty(&self, utterance: &[f32]) -> String {
        let wav = match samples_to_wav(utterance, SAMPLE_RATE) {
            Ok(wav) => wav,
            Err(e) => {
                tracing::warn!(error = %e, "WAV encoding failed");
                return String::new();
            }
        };
        self.stt.transcribe_or_empty(&wav).await
    }
}

/// LLM adapter over the agent's tool-running query loop
struct AgentResponder {
    agent: Agent,
}

#[async_trait(?Send)]
impl Responder for AgentResponder {
    async fn respond(&self, transcript: &str) -> Result<String> {
        self.agent.query(transcript).await
    }
}

/// TTS adapter
struct TtsAdapter {
    tts: TextToSpeech,
}

#[async_trait(?Send)]
impl Synthesizer for TtsAdapter {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        self.tts.synthesize(text).await
    }
}

/// Speaker output with barge-in monitoring
///
/// While TTS audio plays, a monitor thread watches microphone energy
/// through the capture tap; sustained speech fires the stop handle and the
/// output stream winds down.
struct DeviceSink {
    playback: AudioPlayback,
    tap: CaptureTap,
    barge_in_threshold: f32,
}

#[async_trait(?Send)]
impl AudioSink for DeviceSink {
    async fn play_mp3(&mut self, mp3: &[u8], stop: &StopHandle) -> Result<()> {
        let monitor_done = Arc::new(AtomicBool::new(false));
        let monitor = spawn_barge_in_monitor(
            self.tap.clone(),
            stop.clone(),
            self.barge_in_threshold,
            Arc::clone(&monitor_done),
        );

        let result = self.playback.play_mp3(mp3, stop).await;

        monitor_done.store(true, Ordering::Relaxed);
        if monitor.join().is_err() {
            tracing::warn!("barge-in monitor panicked");
        }
        self.tap.clear();
        result
    }

    async fn play_cue(&mut self, cue: Cue) -> Result<()> {
        let stop = StopHandle::new();
        self.playback.play(cue_samples(cue), &stop).await?;
        self.tap.clear();
        Ok(())
    }
}

/// Watch microphone energy during playback and fire the stop handle after
/// sustained speech
fn spawn_barge_in_monitor(
    tap: CaptureTap,
    stop: StopHandle,
    threshold: f32,
    done: Arc<AtomicBool>,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        let needed = BARGE_IN_GRACE.as_millis() / BARGE_IN_POLL.as_millis();
        let mut consecutive: u128 = 0;

        while !done.load(Ordering::Relaxed) && !stop.is_stopped() {
            if tap.tail_energy(FRAME_SAMPLES) > threshold {
                consecutive += 1;
                if consecutive >= needed {
                    tracing::info!("barge-in detected, interrupting playback");
                    stop.stop();
                    break;
                }
            } else {
                consecutive = 0;
            }
            std::thread::sleep(BARGE_IN_POLL);
        }
    })
}
