//! Ollama chat provider (`/api/chat`, non-streaming)

use serde_json::{json, Value};

use super::{ChatMessage, ChatOutcome, ChatProvider, ToolCall, ToolSpec};
use crate::{Error, Result};

/// Chat provider backed by a local Ollama server
pub struct OllamaProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaProvider {
    /// Create a provider for the given server and model
    #[must_use]
    pub fn new(base_url: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        }
    }

    fn message_json(msg: &ChatMessage) -> Value {
        if msg.tool_calls.is_empty() {
            json!({ "role": msg.role, "content": msg.content })
        } else {
            let calls: Vec<Value> = msg
                .tool_calls
                .iter()
                .map(|c| {
                    json!({
                        "function": { "name": c.name, "arguments": c.arguments }
                    })
                })
                .collect();
            json!({ "role": msg.role, "content": msg.content, "tool_calls": calls })
        }
    }
}

#[async_trait::async_trait]
impl ChatProvider for OllamaProvider {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
        _max_tokens: u32,
    ) -> Result<ChatOutcome> {
        let mut body = json!({
            "model": self.model,
            "messages": messages.iter().map(Self::message_json).collect::<Vec<_>>(),
            "stream": false,
        });

        if !tools.is_empty() {
            let tool_json: Vec<Value> = tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.input_schema,
                        }
                    })
                })
                .collect();
            body["tools"] = Value::Array(tool_json);
        }

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Agent(format!("Ollama error {status}: {body}")));
        }

        let result: Value = response.json().await?;
        let message = result.get("message").cloned().unwrap_or_default();

        let text = message
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let tool_calls: Vec<ToolCall> = message
            .get("tool_calls")
            .and_then(Value::as_array)
            .map(|calls| {
                calls
                    .iter()
                    .map(|c| {
                        let func = c.get("function").cloned().unwrap_or_default();
                        ToolCall {
                            id: String::new(),
                            name: func
                                .get("name")
                                .and_then(Value::as_str)
                                .unwrap_or_default()
                                .to_string(),
                            arguments: func.get("arguments").cloned().unwrap_or(json!({})),
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        tracing::debug!(
            model = %self.model,
            text_len = text.len(),
            tool_calls = tool_calls.len(),
            "ollama completion"
        );

        Ok(ChatOutcome { text, tool_calls })
    }
}
