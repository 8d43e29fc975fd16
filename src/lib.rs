//! Oracle Gateway - wake-phrase voice assistant for the smart home
//!
//! This library provides the core functionality for the Oracle gateway:
//! - Voice pipeline (VAD gate, wake/recording/playback state machines)
//! - Speech-to-text and text-to-speech backends
//! - LLM query service with tool calling
//! - MCP bridge to a home-automation tool server
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                   Microphone                        │
//! └────────────────────┬────────────────────────────────┘
//!                      │ 100ms frames
//! ┌────────────────────▼────────────────────────────────┐
//! │               Oracle Gateway                        │
//! │  VAD Gate │ Wake │ Recording │ Playback │ Cues      │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │       STT  │  LLM (+ MCP tools)  │  TTS             │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod agent;
pub mod config;
pub mod daemon;
pub mod error;
pub mod mcp;
pub mod prompt;
pub mod voice;

pub use config::Config;
pub use daemon::Daemon;
pub use error::{Error, Result};
