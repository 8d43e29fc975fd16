//! System prompt builder
//!
//! Assembles the agent's system prompt from a fixed voice-assistant core,
//! the available tool names, and a page of the known device list.

use crate::agent::ToolSpec;
use crate::mcp::zwave::{self, Device};

const CORE_PROMPT: &str = "You are Oracle, a voice assistant for a smart home. \
Your answers are spoken aloud, so keep them short and conversational: one or \
two sentences, no markdown, no lists, no URLs. When asked to control a device, \
use the available tools rather than describing what you would do. If a request \
is ambiguous, pick the most likely device and say which one you chose.";

/// Build the full system prompt
///
/// Prompt layout:
/// 1. Core voice-assistant instructions
/// 2. Available tools (names and descriptions)
/// 3. First page of the known device list
#[must_use]
pub fn build_system_prompt(tools: &[ToolSpec], devices: &[Device]) -> String {
    let mut sections = vec![CORE_PROMPT.to_string()];

    if !tools.is_empty() {
        let lines: Vec<String> = tools
            .iter()
            .map(|t| format!("- {}: {}", t.name, t.description))
            .collect();
        sections.push(format!("Available tools:\n{}", lines.join("\n")));
    }

    if !devices.is_empty() {
        sections.push(zwave::format_device_page(devices, 1));
    }

    sections.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn no_tools_or_devices_is_core_only() {
        let prompt = build_system_prompt(&[], &[]);
        assert!(prompt.contains("You are Oracle"));
        assert!(!prompt.contains("Available tools"));
        assert!(!prompt.contains("Devices"));
    }

    #[test]
    fn tools_listed_after_core() {
        let tools = vec![ToolSpec {
            name: "device_set".to_string(),
            description: "Set a device value".to_string(),
            input_schema: json!({}),
        }];
        let prompt = build_system_prompt(&tools, &[]);

        let core_pos = prompt.find("You are Oracle").unwrap();
        let tools_pos = prompt.find("- device_set: Set a device value").unwrap();
        assert!(tools_pos > core_pos);
    }

    #[test]
    fn device_page_appears_last() {
        let devices = vec![Device {
            node_id: 3,
            name: "Desk Lamp".to_string(),
            location: "office".to_string(),
            device_type: String::new(),
        }];
        let prompt = build_system_prompt(&[], &devices);
        assert!(prompt.contains("- node 3: Desk Lamp (office)"));
    }
}
