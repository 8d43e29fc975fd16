//! Speech-to-text (STT) processing
//!
//! Two backends: the hosted Whisper API and a local `whisper` CLI
//! subprocess. Every call carries a deadline; a timeout or failure is
//! absorbed into an empty transcript so the pipeline never hangs on STT.

use std::path::PathBuf;
use std::time::Duration;

use crate::{Error, Result};

/// Response from the Whisper transcription API
#[derive(serde::Deserialize)]
struct WhisperResponse {
    text: String,
}

/// STT provider backend
#[derive(Clone, Debug)]
enum SttProvider {
    /// Hosted Whisper API (multipart WAV upload)
    WhisperApi { api_key: String },
    /// Local whisper CLI subprocess
    WhisperCli { binary: PathBuf },
}

/// Transcribes speech to text
pub struct SpeechToText {
    client: reqwest::Client,
    model: String,
    timeout: Duration,
    provider: SttProvider,
}

impl SpeechToText {
    /// Create an STT instance backed by the hosted Whisper API
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing
    pub fn new_whisper_api(api_key: String, model: String, timeout: Duration) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(
                "OpenAI API key required for Whisper".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            model,
            timeout,
            provider: SttProvider::WhisperApi { api_key },
        })
    }

    /// Create an STT instance backed by a local whisper CLI
    ///
    /// # Errors
    ///
    /// Returns error if the `whisper` binary cannot be found on PATH
    pub fn new_whisper_cli(model: String, timeout: Duration) -> Result<Self> {
        let binary = which::which("whisper")
            .map_err(|e| Error::Config(format!("whisper CLI not found: {e}")))?;

        tracing::debug!(binary = %binary.display(), "using local whisper CLI");

        Ok(Self {
            client: reqwest::Client::new(),
            model,
            timeout,
            provider: SttProvider::WhisperCli { binary },
        })
    }

    /// Transcribe WAV audio, absorbing failures into an empty transcript
    ///
    /// This is the orchestrator-facing entry point: timeouts and backend
    /// errors are logged and surface as `""`, never as a pending future or
    /// an error the state machines would have to handle.
    pub async fn transcribe_or_empty(&self, audio: &[u8]) -> String {
        match tokio::time::timeout(self.timeout, self.transcribe(audio)).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "transcription failed");
                String::new()
            }
            Err(_) => {
                tracing::warn!(timeout_ms = self.timeout.as_millis(), "transcription timed out");
                String::new()
            }
        }
    }

    /// Transcribe WAV audio to text
    ///
    /// # Errors
    ///
    /// Returns error if transcription fails
    pub async fn transcribe(&self, audio: &[u8]) -> Result<String> {
        match &self.provider {
            SttProvider::WhisperApi { api_key } => self.transcribe_api(audio, api_key).await,
            SttProvider::WhisperCli { binary } => Self::transcribe_cli(audio, binary).await,
        }
    }

    /// Transcribe via the hosted Whisper API
    async fn transcribe_api(&self, audio: &[u8], api_key: &str) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), "starting Whisper transcription");

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio.to_vec())
                    .file_name("audio.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Stt(e.to_string()))?,
            )
            .text("model", self.model.clone());

        let response = self
            .client
            .post("https://api.openai.com/v1/audio/transcriptions")
            .header("Authorization", format!("Bearer {api_key}"))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Whisper API error");
            return Err(Error::Stt(format!("Whisper API error {status}: {body}")));
        }

        let result: WhisperResponse = response.json().await?;
        tracing::info!(transcript = %result.text, "transcription complete");
        Ok(result.text.trim().to_string())
    }

    /// Transcribe via the local whisper CLI
    ///
    /// Writes the WAV to a temp file and reads the transcript from stdout.
    async fn transcribe_cli(audio: &[u8], binary: &PathBuf) -> Result<String> {
        let dir = tempfile::tempdir()?;
        let wav_path = dir.path().join("utterance.wav");
        tokio::fs::write(&wav_path, audio).await?;

        tracing::debug!(audio_bytes = audio.len(), "starting whisper CLI transcription");

        let output = tokio::process::Command::new(binary)
            .arg(&wav_path)
            .args(["--output_format", "txt", "--output_dir"])
            .arg(dir.path())
            .arg("--fp16")
            .arg("False")
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Stt(format!("whisper CLI failed: {stderr}")));
        }

        let txt_path = dir.path().join("utterance.txt");
        let text = tokio::fs::read_to_string(&txt_path).await.unwrap_or_else(|_| {
            // Older whisper builds print to stdout only
            String::from_utf8_lossy(&output.stdout).to_string()
        });

        let transcript = text.trim().to_string();
        tracing::info!(transcript = %transcript, "transcription complete");
        Ok(transcript)
    }
}
