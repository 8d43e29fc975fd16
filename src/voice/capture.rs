//! Audio capture from microphone
//!
//! Produces fixed-size frames at a fixed sample rate for the VAD gate and
//! the recording machine. The cpal callback only appends to a shared
//! buffer; frame extraction happens on the caller's side so the ingestion
//! path never blocks on pipeline work.

use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig};

use crate::{Error, Result};

/// Sample rate for audio capture (16kHz for speech)
pub const SAMPLE_RATE: u32 = 16_000;

/// Frame length in samples (100ms at 16kHz)
pub const FRAME_SAMPLES: usize = 1600;

/// Frame duration corresponding to [`FRAME_SAMPLES`]
pub const FRAME_DURATION: std::time::Duration = std::time::Duration::from_millis(100);

/// Shared read-only view of the capture buffer
///
/// Lets the playback side watch microphone energy while the main loop is
/// blocked on audio output, without draining frames out from under it.
#[derive(Clone)]
pub struct CaptureTap(Arc<Mutex<Vec<f32>>>);

impl CaptureTap {
    /// RMS energy of the most recent `samples` buffered samples
    #[must_use]
    pub fn tail_energy(&self, samples: usize) -> f32 {
        let Ok(buf) = self.0.lock() else {
            return 0.0;
        };
        let start = buf.len().saturating_sub(samples);
        crate::voice::vad::rms_energy(&buf[start..])
    }

    /// Discard everything buffered so far
    pub fn clear(&self) {
        if let Ok(mut buf) = self.0.lock() {
            buf.clear();
        }
    }
}

/// Captures audio from the default input device
pub struct AudioCapture {
    #[allow(dead_code)]
    device: Device,
    config: StreamConfig,
    buffer: Arc<Mutex<Vec<f32>>>,
    stream: Option<Stream>,
}

impl AudioCapture {
    /// Create a new audio capture instance
    ///
    /// # Errors
    ///
    /// Returns error if audio device cannot be opened
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device available".to_string()))?;

        let supported_config = device
            .supported_input_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
            })
            .ok_or_else(|| Error::Audio("no suitable audio config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(SAMPLE_RATE))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = SAMPLE_RATE,
            channels = config.channels,
            "audio capture initialized"
        );

        Ok(Self {
            device,
            config,
            buffer: Arc::new(Mutex::new(Vec::new())),
            stream: None,
        })
    }

    /// Start capturing audio
    ///
    /// # Errors
    ///
    /// Returns error if capture fails
    pub fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let buffer = Arc::clone(&self.buffer);
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device".to_string()))?;

        let config = self.config.clone();

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut buf) = buffer.lock() {
                        buf.extend_from_slice(data);
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio capture error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;
        self.stream = Some(stream);

        tracing::debug!("audio capture started");
        Ok(())
    }

    /// Stop capturing audio
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            tracing::debug!("audio capture stopped");
        }
    }

    /// Drain complete frames of [`FRAME_SAMPLES`] samples
    ///
    /// Leftover samples shorter than one frame stay buffered for the next
    /// call, so no audio is dropped at frame boundaries.
    #[must_use]
    pub fn drain_frames(&self) -> Vec<Vec<f32>> {
        let Ok(mut buf) = self.buffer.lock() else {
            return Vec::new();
        };

        let whole = buf.len() / FRAME_SAMPLES;
        if whole == 0 {
            return Vec::new();
        }

        let mut frames = Vec::with_capacity(whole);
        for chunk in buf[..whole * FRAME_SAMPLES].chunks_exact(FRAME_SAMPLES) {
            frames.push(chunk.to_vec());
        }
        buf.drain(..whole * FRAME_SAMPLES);
        frames
    }

    /// A shared tap on the capture buffer
    #[must_use]
    pub fn tap(&self) -> CaptureTap {
        CaptureTap(Arc::clone(&self.buffer))
    }

    /// Clear any buffered audio
    pub fn clear_buffer(&self) {
        if let Ok(mut buf) = self.buffer.lock() {
            buf.clear();
        }
    }

    /// Check if currently capturing
    #[must_use]
    pub const fn is_capturing(&self) -> bool {
        self.stream.is_some()
    }

    /// Get the sample rate
    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }
}

/// Convert f32 samples to WAV bytes for STT upload
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            // Convert f32 [-1.0, 1.0] to i16
            #[allow(clippy::cast_possible_truncation)]
            let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(sample_i16)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}
