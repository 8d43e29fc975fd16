//! Configuration management for the Oracle voice gateway
//!
//! All the tunable magic numbers of the voice pipeline (energy threshold,
//! silence floors, warm-up settle delay) live here as explicit config
//! structs passed at construction time, never as module-level state.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::{Error, Result};

/// Oracle gateway configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Voice pipeline configuration
    pub voice: VoiceConfig,

    /// VAD gate tunables
    pub vad: VadConfig,

    /// API keys for external services
    pub api_keys: ApiKeys,

    /// LLM configuration
    pub llm: LlmConfig,

    /// MCP tool server configuration
    pub mcp: Option<McpConfig>,
}

/// Voice pipeline configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Enable voice input
    pub enabled: bool,

    /// Wake phrases (e.g. "hey oracle")
    pub wake_phrases: Vec<String>,

    /// Detector warm-up settle delay after buffers fill
    pub warmup_settle: Duration,

    /// Cooldown after playback before ambient cues may resume
    pub playback_cooldown: Duration,

    /// STT provider: "whisper-api" or "whisper-cli"
    pub stt_provider: String,

    /// STT model (e.g. "whisper-1") or CLI model name (e.g. "base.en")
    pub stt_model: String,

    /// Deadline for one transcription call
    pub stt_timeout: Duration,

    /// TTS provider: "openai" or "elevenlabs"
    pub tts_provider: String,

    /// TTS model
    pub tts_model: String,

    /// TTS voice identifier
    pub tts_voice: String,

    /// TTS speed multiplier (0.25 to 4.0)
    pub tts_speed: f64,

    /// Deadline for one synthesis call
    pub tts_timeout: Duration,
}

/// VAD gate tunables
///
/// Durations are tracked in milliseconds of frame time, not wall time, so
/// the gate behaves identically against synthetic frame sequences in tests.
#[derive(Debug, Clone, Copy)]
pub struct VadConfig {
    /// RMS energy above which a frame counts as speech
    pub energy_threshold: f32,

    /// Minimum accumulated speech for a capture to be considered valid.
    /// Applied as a post-capture filter, not a start-of-speech debounce.
    pub min_speech: Duration,

    /// Continuous below-threshold time that ends an utterance
    pub trailing_silence: Duration,

    /// Hard cap on a single utterance
    pub max_utterance: Duration,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            energy_threshold: 0.003,
            min_speech: Duration::from_millis(700),
            trailing_silence: Duration::from_millis(1500),
            max_utterance: Duration::from_millis(10_000),
        }
    }
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            wake_phrases: vec!["hey oracle".to_string()],
            warmup_settle: Duration::from_millis(2500),
            playback_cooldown: Duration::from_millis(500),
            stt_provider: "whisper-api".to_string(),
            stt_model: "whisper-1".to_string(),
            stt_timeout: Duration::from_secs(30),
            tts_provider: "openai".to_string(),
            tts_model: "tts-1".to_string(),
            tts_voice: "nova".to_string(),
            tts_speed: 1.0,
            tts_timeout: Duration::from_secs(30),
        }
    }
}

/// LLM configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Provider: "ollama" or "anthropic"
    pub provider: String,

    /// Model identifier (e.g. "qwen2.5:7b", "claude-sonnet-4-20250514")
    pub model: String,

    /// Ollama base URL
    pub ollama_url: String,

    /// Max tokens per response
    pub max_tokens: u32,

    /// Deadline for one chat completion
    pub timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: "qwen2.5:7b".to_string(),
            ollama_url: "http://localhost:11434".to_string(),
            max_tokens: 1024,
            timeout: Duration::from_secs(60),
        }
    }
}

/// MCP tool server configuration
#[derive(Debug, Clone)]
pub struct McpConfig {
    /// Command to spawn the tool server (stdio transport)
    pub command: String,

    /// Arguments for the command
    pub args: Vec<String>,

    /// Deadline for one tool call
    pub call_timeout: Duration,
}

/// API keys for external services
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    /// `OpenAI` API key (Whisper STT and TTS)
    pub openai: Option<String>,

    /// `Anthropic` API key (LLM)
    pub anthropic: Option<String>,

    /// `ElevenLabs` API key (optional TTS)
    pub elevenlabs: Option<String>,
}

/// TOML overrides file, all fields optional
///
/// Lives at `<config dir>/oracle/gateway.toml`; anything present overrides
/// the built-in defaults before env vars are applied.
#[derive(Debug, Default, Deserialize)]
struct FileOverrides {
    wake_phrases: Option<Vec<String>>,
    energy_threshold: Option<f32>,
    min_speech_ms: Option<u64>,
    trailing_silence_ms: Option<u64>,
    max_utterance_ms: Option<u64>,
    warmup_settle_ms: Option<u64>,
    playback_cooldown_ms: Option<u64>,
    stt_provider: Option<String>,
    stt_model: Option<String>,
    tts_provider: Option<String>,
    tts_model: Option<String>,
    tts_voice: Option<String>,
    tts_speed: Option<f64>,
    llm_provider: Option<String>,
    llm_model: Option<String>,
    ollama_url: Option<String>,
    mcp_command: Option<String>,
    mcp_args: Option<Vec<String>>,
}

/// Return the config file path (`~/.config/oracle/gateway.toml` on Linux)
#[must_use]
pub fn config_file_path() -> PathBuf {
    directories::ProjectDirs::from("dev", "oracle", "oracle").map_or_else(
        || PathBuf::from(".config/oracle/gateway.toml"),
        |d| d.config_dir().join("gateway.toml"),
    )
}

impl Config {
    /// Load configuration from defaults, TOML overrides file, and env vars
    ///
    /// # Errors
    ///
    /// Returns error if the overrides file exists but fails to parse
    pub fn load() -> Result<Self> {
        Self::load_with_options(false)
    }

    /// Load configuration with an explicit voice disable option
    ///
    /// # Errors
    ///
    /// Returns error if the overrides file exists but fails to parse
    pub fn load_with_options(disable_voice: bool) -> Result<Self> {
        let overrides = Self::load_overrides()?;

        let mut voice = VoiceConfig::default();
        let mut vad = VadConfig::default();
        let mut llm = LlmConfig::default();

        if let Some(ww) = overrides.wake_phrases {
            voice.wake_phrases = ww;
        }
        if let Some(t) = overrides.energy_threshold {
            vad.energy_threshold = t;
        }
        if let Some(ms) = overrides.min_speech_ms {
            vad.min_speech = Duration::from_millis(ms);
        }
        if let Some(ms) = overrides.trailing_silence_ms {
            vad.trailing_silence = Duration::from_millis(ms);
        }
        if let Some(ms) = overrides.max_utterance_ms {
            vad.max_utterance = Duration::from_millis(ms);
        }
        if let Some(ms) = overrides.warmup_settle_ms {
            voice.warmup_settle = Duration::from_millis(ms);
        }
        if let Some(ms) = overrides.playback_cooldown_ms {
            voice.playback_cooldown = Duration::from_millis(ms);
        }
        if let Some(p) = overrides.stt_provider {
            voice.stt_provider = p;
        }
        if let Some(m) = overrides.stt_model {
            voice.stt_model = m;
        }
        if let Some(p) = overrides.tts_provider {
            voice.tts_provider = p;
        }
        if let Some(m) = overrides.tts_model {
            voice.tts_model = m;
        }
        if let Some(v) = overrides.tts_voice {
            voice.tts_voice = v;
        }
        if let Some(s) = overrides.tts_speed {
            voice.tts_speed = s;
        }
        if let Some(p) = overrides.llm_provider {
            llm.provider = p;
        }
        if let Some(m) = overrides.llm_model {
            llm.model = m;
        }
        if let Some(u) = overrides.ollama_url {
            llm.ollama_url = u;
        }

        // Env vars win over the file
        if let Ok(t) = std::env::var("ORACLE_SILENCE_THRESHOLD") {
            vad.energy_threshold = t
                .parse()
                .map_err(|_| Error::Config(format!("invalid ORACLE_SILENCE_THRESHOLD: {t}")))?;
        }
        if let Ok(ms) = std::env::var("ORACLE_TRAILING_SILENCE_MS") {
            let parsed = ms
                .parse()
                .map_err(|_| Error::Config(format!("invalid ORACLE_TRAILING_SILENCE_MS: {ms}")))?;
            vad.trailing_silence = Duration::from_millis(parsed);
        }
        if let Ok(model) = std::env::var("ORACLE_LLM_MODEL") {
            llm.model = model;
        }
        if let Ok(provider) = std::env::var("ORACLE_LLM_PROVIDER") {
            llm.provider = provider;
        }

        if disable_voice {
            voice.enabled = false;
        }

        let mcp = overrides.mcp_command.map(|command| McpConfig {
            command,
            args: overrides.mcp_args.unwrap_or_default(),
            call_timeout: Duration::from_secs(30),
        });

        let api_keys = ApiKeys {
            openai: std::env::var("OPENAI_API_KEY").ok(),
            anthropic: std::env::var("ANTHROPIC_API_KEY").ok(),
            elevenlabs: std::env::var("ELEVENLABS_API_KEY").ok(),
        };

        Ok(Self {
            voice,
            vad,
            api_keys,
            llm,
            mcp,
        })
    }

    fn load_overrides() -> Result<FileOverrides> {
        let path = config_file_path();
        if !path.exists() {
            return Ok(FileOverrides::default());
        }

        let raw = std::fs::read_to_string(&path)?;
        let overrides = toml::from_str(&raw)?;
        tracing::debug!(path = %path.display(), "loaded config overrides");
        Ok(overrides)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_vad_thresholds() {
        let vad = VadConfig::default();
        assert!((vad.energy_threshold - 0.003).abs() < f32::EPSILON);
        assert_eq!(vad.trailing_silence, Duration::from_millis(1500));
        assert_eq!(vad.max_utterance, Duration::from_millis(10_000));
        assert_eq!(vad.min_speech, Duration::from_millis(700));
    }

    #[test]
    fn default_voice_config() {
        let voice = VoiceConfig::default();
        assert!(voice.enabled);
        assert_eq!(voice.warmup_settle, Duration::from_millis(2500));
        assert_eq!(voice.wake_phrases, vec!["hey oracle"]);
    }

    #[test]
    fn overrides_parse_partial_toml() {
        let overrides: FileOverrides =
            toml::from_str("energy_threshold = 0.01\ntrailing_silence_ms = 2000").unwrap();
        assert_eq!(overrides.energy_threshold, Some(0.01));
        assert_eq!(overrides.trailing_silence_ms, Some(2000));
        assert!(overrides.wake_phrases.is_none());
    }
}
