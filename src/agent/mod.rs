//! LLM query service
//!
//! Accepts a transcript plus the currently-available tool set and returns a
//! spoken-form response, running tool calls through the MCP bridge when the
//! model asks for them. Two providers: a local Ollama server and the
//! Anthropic Messages API.
//!
//! Small local models sometimes emit an empty message while clearly
//! intending a tool call. That malformed output is recovered with exactly
//! one same-turn retry with no tools bound (see [`Agent::query`]).

mod anthropic;
mod ollama;

use std::time::Duration;

use serde_json::Value;

use crate::config::LlmConfig;
use crate::mcp::McpClient;
use crate::{Error, Result};

pub use anthropic::AnthropicProvider;
pub use ollama::OllamaProvider;

/// Max tool-call rounds per user turn
const MAX_TOOL_ROUNDS: usize = 5;

/// A tool the model may call, in provider-neutral form
#[derive(Debug, Clone, serde::Serialize)]
pub struct ToolSpec {
    /// Tool name
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// JSON schema for the arguments
    pub input_schema: Value,
}

/// One chat message in provider-neutral form
#[derive(Debug, Clone)]
pub struct ChatMessage {
    /// "system", "user", "assistant", or "tool"
    pub role: String,
    /// Message text (may be empty for pure tool-call messages)
    pub content: String,
    /// Tool calls requested by an assistant message
    pub tool_calls: Vec<ToolCall>,
}

impl ChatMessage {
    /// A system message
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    /// A user message
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    /// A tool-result message
    #[must_use]
    pub fn tool(content: impl Into<String>) -> Self {
        Self {
            role: "tool".to_string(),
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }
}

/// A tool invocation requested by the model
#[derive(Debug, Clone)]
pub struct ToolCall {
    /// Provider-assigned call id (empty for Ollama)
    pub id: String,
    /// Tool name
    pub name: String,
    /// JSON arguments
    pub arguments: Value,
}

/// What one completion round produced
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    /// Assistant text, possibly empty
    pub text: String,
    /// Tool calls the model wants executed
    pub tool_calls: Vec<ToolCall>,
}

impl ChatOutcome {
    /// Empty text with no usable tool call: the malformed shape some small
    /// models produce when tool schemas confuse them
    #[must_use]
    pub fn is_malformed_tool_intent(&self) -> bool {
        let has_valid_call = self.tool_calls.iter().any(|c| !c.name.trim().is_empty());
        self.text.trim().is_empty() && !has_valid_call
    }
}

/// LLM chat provider
#[async_trait::async_trait]
pub trait ChatProvider: Send + Sync {
    /// Run one completion round
    ///
    /// # Errors
    ///
    /// Returns error if the provider call fails
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
        max_tokens: u32,
    ) -> Result<ChatOutcome>;
}

/// The LLM query service
pub struct Agent {
    provider: Box<dyn ChatProvider>,
    system_prompt: String,
    max_tokens: u32,
    timeout: Duration,
    mcp: Option<McpClient>,
}

impl Agent {
    /// Build an agent from config
    ///
    /// # Errors
    ///
    /// Returns error if the configured provider is unknown or its API key
    /// is missing
    pub fn from_config(
        config: &LlmConfig,
        anthropic_key: Option<&str>,
        system_prompt: String,
        mcp: Option<McpClient>,
    ) -> Result<Self> {
        let provider: Box<dyn ChatProvider> = match config.provider.as_str() {
            "ollama" => Box::new(OllamaProvider::new(
                config.ollama_url.clone(),
                config.model.clone(),
            )),
            "anthropic" => {
                let key = anthropic_key
                    .ok_or_else(|| Error::Config("ANTHROPIC_API_KEY required".to_string()))?;
                Box::new(AnthropicProvider::new(key.to_string(), config.model.clone()))
            }
            other => {
                return Err(Error::Config(format!("unknown LLM provider: {other}")));
            }
        };

        Ok(Self {
            provider,
            system_prompt,
            max_tokens: config.max_tokens,
            timeout: config.timeout,
            mcp,
        })
    }

    /// Answer a transcript, running tool calls as needed
    ///
    /// Tool execution loops until the model stops calling tools or
    /// [`MAX_TOOL_ROUNDS`] is reached. An empty response with an apparent
    /// tool-call intent gets one same-turn retry with no tools bound.
    ///
    /// # Errors
    ///
    /// Returns error if the provider call fails or exceeds the deadline
    pub async fn query(&self, transcript: &str) -> Result<String> {
        let tools = match &self.mcp {
            Some(mcp) => mcp.tool_specs(),
            None => Vec::new(),
        };

        let mut messages = vec![
            ChatMessage::system(&self.system_prompt),
            ChatMessage::user(transcript),
        ];

        let mut outcome = self.complete_with_deadline(&messages, &tools).await?;

        if !tools.is_empty() && outcome.is_malformed_tool_intent() {
            tracing::warn!("empty response with tool-call intent, retrying without tools");
            outcome = self.complete_with_deadline(&messages, &[]).await?;
        }

        let mut rounds = 0;
        while rounds < MAX_TOOL_ROUNDS {
            let calls: Vec<ToolCall> = outcome
                .tool_calls
                .iter()
                .filter(|c| !c.name.trim().is_empty())
                .cloned()
                .collect();
            if calls.is_empty() {
                break;
            }
            rounds += 1;

            messages.push(ChatMessage {
                role: "assistant".to_string(),
                content: outcome.text.clone(),
                tool_calls: calls.clone(),
            });

            for call in &calls {
                let result = self.execute_tool(call).await;
                tracing::debug!(tool = %call.name, "tool executed");
                messages.push(ChatMessage::tool(result));
            }

            outcome = self.complete_with_deadline(&messages, &tools).await?;
        }

        if rounds == MAX_TOOL_ROUNDS && !outcome.tool_calls.is_empty() {
            tracing::warn!(rounds, "tool round cap reached, returning partial answer");
        }

        Ok(outcome.text)
    }

    async fn complete_with_deadline(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
    ) -> Result<ChatOutcome> {
        tokio::time::timeout(
            self.timeout,
            self.provider.complete(messages, tools, self.max_tokens),
        )
        .await
        .map_err(|_| Error::Timeout(self.timeout))?
    }

    /// Run one tool call through the MCP bridge; errors become tool-result
    /// text the model can react to
    async fn execute_tool(&self, call: &ToolCall) -> String {
        let Some(mcp) = &self.mcp else {
            return "tool execution unavailable".to_string();
        };

        match mcp.call_tool(&call.name, call.arguments.clone()).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(tool = %call.name, error = %e, "tool call failed");
                format!("tool error: {e}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(text: &str, calls: Vec<ToolCall>) -> ChatOutcome {
        ChatOutcome {
            text: text.to_string(),
            tool_calls: calls,
        }
    }

    fn call(name: &str) -> ToolCall {
        ToolCall {
            id: String::new(),
            name: name.to_string(),
            arguments: serde_json::json!({}),
        }
    }

    #[test]
    fn empty_text_without_calls_is_malformed_intent() {
        assert!(outcome("", vec![]).is_malformed_tool_intent());
        assert!(outcome("  ", vec![]).is_malformed_tool_intent());
    }

    #[test]
    fn empty_text_with_nameless_call_is_malformed() {
        assert!(outcome("", vec![call("")]).is_malformed_tool_intent());
    }

    #[test]
    fn valid_tool_call_is_not_malformed() {
        assert!(!outcome("", vec![call("device_set")]).is_malformed_tool_intent());
    }

    #[test]
    fn text_response_is_not_malformed() {
        assert!(!outcome("the lights are on", vec![]).is_malformed_tool_intent());
    }
}
