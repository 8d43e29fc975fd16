//! Anthropic Messages API chat provider

use serde_json::{json, Value};

use super::{ChatMessage, ChatOutcome, ChatProvider, ToolCall, ToolSpec};
use crate::{Error, Result};

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

/// Chat provider backed by the Anthropic Messages API
pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl AnthropicProvider {
    /// Create a provider for the given key and model
    #[must_use]
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
        }
    }

    /// Convert neutral messages to the Messages API shape
    ///
    /// The system message is lifted out; tool results become `tool_result`
    /// content blocks on a user message.
    fn to_api_messages(messages: &[ChatMessage]) -> (Option<String>, Vec<Value>) {
        let mut system = None;
        let mut out: Vec<Value> = Vec::new();

        for msg in messages {
            match msg.role.as_str() {
                "system" => system = Some(msg.content.clone()),
                "assistant" => {
                    let mut content: Vec<Value> = Vec::new();
                    if !msg.content.is_empty() {
                        content.push(json!({ "type": "text", "text": msg.content }));
                    }
                    for call in &msg.tool_calls {
                        content.push(json!({
                            "type": "tool_use",
                            "id": call.id,
                            "name": call.name,
                            "input": call.arguments,
                        }));
                    }
                    out.push(json!({ "role": "assistant", "content": content }));
                }
                "tool" => {
                    // Pair with the preceding assistant tool_use block
                    let tool_use_id = out
                        .last()
                        .and_then(|m| m.get("content"))
                        .and_then(Value::as_array)
                        .and_then(|blocks| {
                            blocks
                                .iter()
                                .rev()
                                .find(|b| b.get("type").and_then(Value::as_str) == Some("tool_use"))
                        })
                        .and_then(|b| b.get("id"))
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string();

                    out.push(json!({
                        "role": "user",
                        "content": [{
                            "type": "tool_result",
                            "tool_use_id": tool_use_id,
                            "content": msg.content,
                        }],
                    }));
                }
                _ => out.push(json!({ "role": "user", "content": msg.content })),
            }
        }

        (system, out)
    }
}

#[async_trait::async_trait]
impl ChatProvider for AnthropicProvider {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
        max_tokens: u32,
    ) -> Result<ChatOutcome> {
        let (system, api_messages) = Self::to_api_messages(messages);

        let mut body = json!({
            "model": self.model,
            "max_tokens": max_tokens,
            "messages": api_messages,
        });
        if let Some(system) = system {
            body["system"] = Value::String(system);
        }
        if !tools.is_empty() {
            let tool_json: Vec<Value> = tools
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name,
                        "description": t.description,
                        "input_schema": t.input_schema,
                    })
                })
                .collect();
            body["tools"] = Value::Array(tool_json);
        }

        let response = self
            .client
            .post(API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Agent(format!("Anthropic error {status}: {body}")));
        }

        let result: Value = response.json().await?;
        let blocks = result
            .get("content")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut text = String::new();
        let mut tool_calls = Vec::new();

        for block in blocks {
            match block.get("type").and_then(Value::as_str) {
                Some("text") => {
                    if let Some(t) = block.get("text").and_then(Value::as_str) {
                        text.push_str(t);
                    }
                }
                Some("tool_use") => {
                    tool_calls.push(ToolCall {
                        id: block
                            .get("id")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                        name: block
                            .get("name")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                        arguments: block.get("input").cloned().unwrap_or(json!({})),
                    });
                }
                _ => {}
            }
        }

        tracing::debug!(
            model = %self.model,
            text_len = text.len(),
            tool_calls = tool_calls.len(),
            "anthropic completion"
        );

        Ok(ChatOutcome { text, tool_calls })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_message_is_lifted_out() {
        let messages = vec![
            ChatMessage::system("be brief"),
            ChatMessage::user("hello"),
        ];
        let (system, api) = AnthropicProvider::to_api_messages(&messages);
        assert_eq!(system.as_deref(), Some("be brief"));
        assert_eq!(api.len(), 1);
        assert_eq!(api[0]["role"], "user");
    }

    #[test]
    fn tool_result_pairs_with_tool_use_id() {
        let messages = vec![
            ChatMessage::user("lights on"),
            ChatMessage {
                role: "assistant".to_string(),
                content: String::new(),
                tool_calls: vec![ToolCall {
                    id: "tc_1".to_string(),
                    name: "device_set".to_string(),
                    arguments: json!({"node": 5}),
                }],
            },
            ChatMessage::tool("ok"),
        ];

        let (_, api) = AnthropicProvider::to_api_messages(&messages);
        assert_eq!(api.len(), 3);
        assert_eq!(api[2]["content"][0]["tool_use_id"], "tc_1");
    }
}
