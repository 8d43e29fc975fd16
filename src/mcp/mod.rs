//! MCP (Model Context Protocol) tool bridge
//!
//! Connects the agent to a home-automation tool server over the MCP stdio
//! transport. The one external subprocess connection gets a bounded retry
//! with backoff; everything else is single-shot with a deadline.

mod client;
pub mod zwave;

pub use client::{McpClient, ToolDescriptor};
