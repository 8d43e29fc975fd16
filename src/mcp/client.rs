//! MCP stdio client
//!
//! Speaks newline-delimited JSON-RPC 2.0 to a spawned tool-server
//! subprocess: `initialize`, `tools/list`, `tools/call`. One request is in
//! flight at a time, which matches the single-utterance interaction model.

use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use crate::agent::ToolSpec;
use crate::config::McpConfig;
use crate::{Error, Result};

/// Connection attempts before degrading to tool-less operation
const CONNECT_ATTEMPTS: u32 = 3;

/// Base delay between connection attempts; attempt n waits `n * base`
/// (0s, 2s, 4s)
const CONNECT_BACKOFF: Duration = Duration::from_secs(2);

/// Deadline for the initialize handshake
const INIT_TIMEOUT: Duration = Duration::from_secs(10);

/// A tool advertised by the server
#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    /// Tool name
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// JSON schema for the arguments
    pub input_schema: Value,
}

struct McpIo {
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    #[allow(dead_code)]
    child: Child,
}

/// Client for one MCP tool server subprocess
pub struct McpClient {
    io: tokio::sync::Mutex<McpIo>,
    tools: Vec<ToolDescriptor>,
    call_timeout: Duration,
}

impl McpClient {
    /// Connect with bounded retry: 3 attempts, delays 0s / 2s / 4s
    ///
    /// Returns `None` after exhausting the attempts; the caller degrades to
    /// tool-less operation rather than failing startup.
    pub async fn connect_with_retry(config: &McpConfig) -> Option<Self> {
        for attempt in 0..CONNECT_ATTEMPTS {
            let delay = CONNECT_BACKOFF * attempt;
            if !delay.is_zero() {
                tracing::info!(attempt = attempt + 1, delay_secs = delay.as_secs(), "retrying MCP connection");
                tokio::time::sleep(delay).await;
            }

            match Self::connect(config).await {
                Ok(client) => {
                    tracing::info!(
                        command = %config.command,
                        tools = client.tools.len(),
                        "MCP server connected"
                    );
                    return Some(client);
                }
                Err(e) => {
                    tracing::warn!(attempt = attempt + 1, error = %e, "MCP connection failed");
                }
            }
        }

        tracing::warn!("MCP server unavailable, continuing without tools");
        None
    }

    /// Connect once: spawn, handshake, list tools
    ///
    /// # Errors
    ///
    /// Returns error if the subprocess cannot be spawned or the handshake
    /// fails or times out
    pub async fn connect(config: &McpConfig) -> Result<Self> {
        let mut child = Command::new(&config.command)
            .args(&config.args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Mcp(format!("spawn {} failed: {e}", config.command)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Mcp("no stdin handle".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Mcp("no stdout handle".to_string()))?;

        let mut io = McpIo {
            stdin,
            stdout: BufReader::new(stdout),
            child,
        };

        let handshake = async {
            let init = Self::request_on(
                &mut io,
                "initialize",
                json!({
                    "protocolVersion": "2024-11-05",
                    "capabilities": {},
                    "clientInfo": { "name": "oracle-gateway", "version": env!("CARGO_PKG_VERSION") },
                }),
            )
            .await?;
            tracing::debug!(server = ?init.get("serverInfo"), "MCP initialized");

            Self::notify_on(&mut io, "notifications/initialized", json!({})).await?;

            let listed = Self::request_on(&mut io, "tools/list", json!({})).await?;
            Ok::<Value, Error>(listed)
        };

        let listed = tokio::time::timeout(INIT_TIMEOUT, handshake)
            .await
            .map_err(|_| Error::Timeout(INIT_TIMEOUT))??;

        let tools = listed
            .get("tools")
            .and_then(Value::as_array)
            .map(|tools| {
                tools
                    .iter()
                    .map(|t| ToolDescriptor {
                        name: t
                            .get("name")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                        description: t
                            .get("description")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                        input_schema: t.get("inputSchema").cloned().unwrap_or(json!({})),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            io: tokio::sync::Mutex::new(io),
            tools,
            call_timeout: config.call_timeout,
        })
    }

    /// Tools advertised by the server, as provider-neutral specs
    #[must_use]
    pub fn tool_specs(&self) -> Vec<ToolSpec> {
        self.tools
            .iter()
            .map(|t| ToolSpec {
                name: t.name.clone(),
                description: t.description.clone(),
                input_schema: t.input_schema.clone(),
            })
            .collect()
    }

    /// Invoke a tool, returning its text content
    ///
    /// # Errors
    ///
    /// Returns error if the call fails, reports an error result, or exceeds
    /// the configured deadline
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<String> {
        let mut io = self.io.lock().await;

        let call = Self::request_on(
            &mut io,
            "tools/call",
            json!({ "name": name, "arguments": arguments }),
        );

        let result = tokio::time::timeout(self.call_timeout, call)
            .await
            .map_err(|_| Error::Timeout(self.call_timeout))??;

        if result.get("isError").and_then(Value::as_bool) == Some(true) {
            return Err(Error::Mcp(format!("tool {name} reported an error")));
        }

        let text = result
            .get("content")
            .and_then(Value::as_array)
            .map(|blocks| {
                blocks
                    .iter()
                    .filter_map(|b| b.get("text").and_then(Value::as_str))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default();

        Ok(text)
    }

    /// Send a request and wait for its response, skipping server-initiated
    /// notifications
    async fn request_on(io: &mut McpIo, method: &str, params: Value) -> Result<Value> {
        let id = uuid::Uuid::new_v4().to_string();
        let request = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let mut line = serde_json::to_string(&request)?;
        line.push('\n');
        io.stdin.write_all(line.as_bytes()).await?;
        io.stdin.flush().await?;

        loop {
            let mut buf = String::new();
            let n = io.stdout.read_line(&mut buf).await?;
            if n == 0 {
                return Err(Error::Mcp("server closed stdout".to_string()));
            }

            let message: Value = match serde_json::from_str(buf.trim()) {
                Ok(v) => v,
                Err(e) => {
                    tracing::trace!(error = %e, "skipping non-JSON line from server");
                    continue;
                }
            };

            // Notifications have no id; keep waiting for our response
            if message.get("id").and_then(Value::as_str) != Some(id.as_str()) {
                continue;
            }

            if let Some(err) = message.get("error") {
                return Err(Error::Mcp(format!("{method} failed: {err}")));
            }

            return Ok(message.get("result").cloned().unwrap_or_default());
        }
    }

    /// Send a notification (no response expected)
    async fn notify_on(io: &mut McpIo, method: &str, params: Value) -> Result<()> {
        let notification = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
        });

        let mut line = serde_json::to_string(&notification)?;
        line.push('\n');
        io.stdin.write_all(line.as_bytes()).await?;
        io.stdin.flush().await?;
        Ok(())
    }
}
