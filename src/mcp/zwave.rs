//! Z-Wave over MQTT helpers
//!
//! Topic formatting for the zwave-js-ui MQTT gateway plus device-list
//! formatting for prompt injection. Topic shape:
//! `zwave/<node>/<command class>/endpoint_<n>/<property>[/set]`.

use serde::Deserialize;

/// Devices shown per page when the list is long
pub const DEVICE_PAGE_SIZE: usize = 20;

/// A Z-Wave node as reported by the tool server
#[derive(Debug, Clone, Deserialize)]
pub struct Device {
    /// Z-Wave node id
    pub node_id: u32,
    /// Human-assigned name
    #[serde(default)]
    pub name: String,
    /// Room or location label
    #[serde(default)]
    pub location: String,
    /// Device type, e.g. "Binary Switch"
    #[serde(default, rename = "type")]
    pub device_type: String,
}

/// MQTT topic that sets a value on a node
#[must_use]
pub fn set_topic(node_id: u32, command_class: &str, endpoint: u8, property: &str) -> String {
    format!("zwave/{node_id}/{command_class}/endpoint_{endpoint}/{property}/set")
}

/// MQTT topic that reads a value from a node
#[must_use]
pub fn get_topic(node_id: u32, command_class: &str, endpoint: u8, property: &str) -> String {
    format!("zwave/{node_id}/{command_class}/endpoint_{endpoint}/{property}")
}

/// Parse a device-list JSON payload, skipping entries that do not parse
#[must_use]
pub fn parse_devices(payload: &str) -> Vec<Device> {
    serde_json::from_str::<Vec<serde_json::Value>>(payload)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|v| serde_json::from_value(v).ok())
        .collect()
}

/// Format one page of the device list for prompt injection
///
/// Pages are 1-based; an out-of-range page clamps to the last page.
#[must_use]
pub fn format_device_page(devices: &[Device], page: usize) -> String {
    if devices.is_empty() {
        return "No devices known.".to_string();
    }

    let pages = devices.len().div_ceil(DEVICE_PAGE_SIZE);
    let page = page.clamp(1, pages);
    let start = (page - 1) * DEVICE_PAGE_SIZE;
    let end = (start + DEVICE_PAGE_SIZE).min(devices.len());

    let mut out = format!(
        "Devices (page {page} of {pages}, {total} total):\n",
        total = devices.len()
    );
    for device in &devices[start..end] {
        let name = if device.name.is_empty() {
            "unnamed"
        } else {
            &device.name
        };
        out.push_str(&format!("- node {}: {name}", device.node_id));
        if !device.location.is_empty() {
            out.push_str(&format!(" ({})", device.location));
        }
        if !device.device_type.is_empty() {
            out.push_str(&format!(" [{}]", device.device_type));
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(node_id: u32, name: &str) -> Device {
        Device {
            node_id,
            name: name.to_string(),
            location: String::new(),
            device_type: String::new(),
        }
    }

    #[test]
    fn set_topic_has_expected_shape() {
        assert_eq!(
            set_topic(5, "37", 0, "targetValue"),
            "zwave/5/37/endpoint_0/targetValue/set"
        );
    }

    #[test]
    fn get_topic_has_no_set_suffix() {
        assert_eq!(
            get_topic(12, "38", 1, "currentValue"),
            "zwave/12/38/endpoint_1/currentValue"
        );
    }

    #[test]
    fn empty_device_list_formats_placeholder() {
        assert_eq!(format_device_page(&[], 1), "No devices known.");
    }

    #[test]
    fn single_page_lists_all_devices() {
        let devices = vec![
            Device {
                node_id: 3,
                name: "Desk Lamp".to_string(),
                location: "office".to_string(),
                device_type: "Binary Switch".to_string(),
            },
            device(7, "Fan"),
        ];
        let out = format_device_page(&devices, 1);
        assert!(out.starts_with("Devices (page 1 of 1, 2 total):"));
        assert!(out.contains("- node 3: Desk Lamp (office) [Binary Switch]"));
        assert!(out.contains("- node 7: Fan"));
    }

    #[test]
    fn out_of_range_page_clamps_to_last() {
        let devices: Vec<Device> = (1..=45).map(|n| device(n, "d")).collect();
        let out = format_device_page(&devices, 99);
        assert!(out.starts_with("Devices (page 3 of 3, 45 total):"));
        assert!(out.contains("- node 41: d"));
        assert!(out.contains("- node 45: d"));
        assert!(!out.contains("- node 40: d"));
    }

    #[test]
    fn unnamed_devices_get_placeholder() {
        let out = format_device_page(&[device(9, "")], 1);
        assert!(out.contains("- node 9: unnamed"));
    }

    #[test]
    fn parse_devices_skips_bad_entries() {
        let payload = r#"[{"node_id": 4, "name": "Lamp"}, {"name": "no id"}, 17]"#;
        let devices = parse_devices(payload);
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].node_id, 4);
        assert_eq!(devices[0].name, "Lamp");
    }
}
