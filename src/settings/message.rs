//! Change messages broadcast to the page when settings are edited

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// One entry of a storage change set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingChange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_value: Option<Value>,
}

/// Message delivered to the tab by the popup or the storage listener
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum SettingsMessage {
    /// A single key edited in the popup
    #[serde(rename = "settingChanged")]
    SettingChanged { key: String, value: Value },

    /// A storage change set, keyed by setting name
    #[serde(rename = "settingsChanged")]
    SettingsChanged {
        changes: BTreeMap<String, SettingChange>,
    },
}

impl SettingsMessage {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Keys with their new values. Entries removed from storage (no new
    /// value) are skipped so the store keeps its last known value.
    pub fn new_values(&self) -> Vec<(&str, &Value)> {
        match self {
            SettingsMessage::SettingChanged { key, value } => vec![(key.as_str(), value)],
            SettingsMessage::SettingsChanged { changes } => changes
                .iter()
                .filter_map(|(key, change)| change.new_value.as_ref().map(|v| (key.as_str(), v)))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_single_setting_message() {
        let msg = SettingsMessage::from_json(
            r#"{"action": "settingChanged", "key": "stereoPan", "value": 35}"#,
        )
        .unwrap();
        assert_eq!(msg.new_values(), vec![("stereoPan", &json!(35))]);
    }

    #[test]
    fn test_change_set_skips_removed_keys() {
        let msg = SettingsMessage::from_json(
            r#"{
                "action": "settingsChanged",
                "changes": {
                    "popupPlayer": {"newValue": true, "oldValue": false},
                    "volumeBoost": {"oldValue": 150}
                }
            }"#,
        )
        .unwrap();
        let values = msg.new_values();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].0, "popupPlayer");
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        assert!(SettingsMessage::from_json(r#"{"action": "reload"}"#).is_err());
    }
}
