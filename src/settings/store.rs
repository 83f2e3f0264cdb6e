//! Settings store with typed defaults

use log::warn;
use serde_json::{json, Map, Value};

use super::keys;
use super::message::SettingsMessage;
use super::presets::{MiniPlayerPosition, MiniPlayerSize};
use crate::error::{EnhancerError, Result};

/// Flat key/value settings with a default for every known key.
///
/// Only the coordinator mutates the store, and only in response to a
/// change message. Feature components read through the accessors.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    values: Map<String, Value>,
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsStore {
    /// Create a store holding only the defaults
    pub fn new() -> Self {
        Self {
            values: Self::defaults(),
        }
    }

    /// The default value of every known key
    pub fn defaults() -> Map<String, Value> {
        let mut map = Map::new();
        map.insert(keys::ENABLE_COMPRESSOR.into(), json!(false));
        map.insert(keys::VOLUME_BOOST.into(), json!(100));
        map.insert(keys::COMPRESSOR_RATIO.into(), json!(12));
        map.insert(keys::ENABLE_STEREO_PAN.into(), json!(false));
        map.insert(keys::STEREO_PAN.into(), json!(0));
        map.insert(keys::POPUP_PLAYER.into(), json!(false));
        map.insert(
            keys::MINI_PLAYER_SIZE.into(),
            json!(MiniPlayerSize::default().as_str()),
        );
        map.insert(
            keys::MINI_PLAYER_POSITION.into(),
            json!(MiniPlayerPosition::default().as_str()),
        );
        map.insert(keys::ENABLE_PIP.into(), json!(true));
        map.insert(keys::ENABLE_SMALL_PLAYER_BUTTON.into(), json!(true));
        map
    }

    /// Build a store from a storage snapshot; missing keys keep their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Value = serde_json::from_str(json)?;
        let Value::Object(snapshot) = snapshot else {
            return Err(EnhancerError::InvalidSetting {
                key: "*".to_string(),
                reason: "settings snapshot must be a JSON object".to_string(),
            });
        };
        let mut store = Self::new();
        for (key, value) in snapshot {
            if !value.is_null() {
                store.values.insert(key, value);
            }
        }
        Ok(store)
    }

    /// Raw value for a key, if present
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key).filter(|v| !v.is_null())
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.get(key).and_then(Value::as_bool).unwrap_or(default)
    }

    pub fn get_f64(&self, key: &str, default: f64) -> f64 {
        self.get(key)
            .and_then(|v| match v {
                Value::Number(n) => n.as_f64(),
                // The popup's range inputs sometimes store strings
                Value::String(s) => s.trim().parse().ok(),
                _ => None,
            })
            .filter(|v| v.is_finite())
            .unwrap_or(default)
    }

    pub fn get_str<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).and_then(Value::as_str).unwrap_or(default)
    }

    /// Write a value directly. Returns true if the stored value changed.
    pub fn set(&mut self, key: impl Into<String>, value: Value) -> bool {
        let key = key.into();
        if self.values.get(&key) == Some(&value) {
            return false;
        }
        self.values.insert(key, value);
        true
    }

    /// Apply a change message and return the keys whose value actually changed
    pub fn apply_message(&mut self, message: &SettingsMessage) -> Vec<String> {
        let mut changed = Vec::new();
        for (key, value) in message.new_values() {
            if self.set(key, value.clone()) {
                changed.push(key.to_string());
            }
        }
        changed
    }

    /// True when at least one audio feature needs the processing graph
    pub fn is_audio_enabled(&self) -> bool {
        self.get_bool(keys::ENABLE_COMPRESSOR, false) || self.get_bool(keys::ENABLE_STEREO_PAN, false)
    }

    pub fn is_floating_player_enabled(&self) -> bool {
        self.get_bool(keys::POPUP_PLAYER, false)
    }

    pub fn is_compressor_enabled(&self) -> bool {
        self.get_bool(keys::ENABLE_COMPRESSOR, false)
    }

    pub fn is_stereo_pan_enabled(&self) -> bool {
        self.get_bool(keys::ENABLE_STEREO_PAN, false)
    }

    pub fn mini_player_size(&self) -> MiniPlayerSize {
        let raw = self.get_str(keys::MINI_PLAYER_SIZE, MiniPlayerSize::default().as_str());
        raw.parse().unwrap_or_else(|err| {
            warn!("[SETTINGS] {}; using default", err);
            MiniPlayerSize::default()
        })
    }

    pub fn mini_player_position(&self) -> MiniPlayerPosition {
        let raw = self.get_str(keys::MINI_PLAYER_POSITION, MiniPlayerPosition::default().as_str());
        raw.parse().unwrap_or_else(|err| {
            warn!("[SETTINGS] {}; using default", err);
            MiniPlayerPosition::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let store = SettingsStore::new();
        assert!(!store.is_audio_enabled());
        assert!(!store.is_floating_player_enabled());
        assert_eq!(store.get_f64(keys::VOLUME_BOOST, 0.0), 100.0);
        assert_eq!(store.mini_player_size(), MiniPlayerSize::S480x270);
    }

    #[test]
    fn test_from_json_overrides_and_keeps_defaults() {
        let store =
            SettingsStore::from_json(r#"{"enableStereoPan": true, "stereoPan": "-40"}"#).unwrap();
        assert!(store.is_audio_enabled());
        assert_eq!(store.get_f64(keys::STEREO_PAN, 0.0), -40.0);
        assert_eq!(store.get_f64(keys::COMPRESSOR_RATIO, 0.0), 12.0);
    }

    #[test]
    fn test_from_json_rejects_non_object() {
        assert!(SettingsStore::from_json("[1, 2]").is_err());
    }

    #[test]
    fn test_get_falls_back_to_default() {
        let store = SettingsStore::new();
        assert_eq!(store.get_str("missing", "fallback"), "fallback");
        assert!(store.get_bool("missing", true));
    }

    #[test]
    fn test_unknown_preset_falls_back() {
        let mut store = SettingsStore::new();
        store.set(keys::MINI_PLAYER_POSITION, json!("middle"));
        assert_eq!(store.mini_player_position(), MiniPlayerPosition::TopRight);
    }

    #[test]
    fn test_set_reports_change() {
        let mut store = SettingsStore::new();
        assert!(!store.set(keys::POPUP_PLAYER, json!(false)));
        assert!(store.set(keys::POPUP_PLAYER, json!(true)));
    }

    #[test]
    fn test_apply_message_reports_only_changed_keys() {
        let mut store = SettingsStore::new();
        store.set(keys::POPUP_PLAYER, json!(true));
        let message = SettingsMessage::from_json(
            r#"{"action": "settingsChanged", "changes": {
                "popupPlayer": {"newValue": true, "oldValue": false},
                "enableCompressor": {"newValue": true, "oldValue": false}
            }}"#,
        )
        .unwrap();
        assert_eq!(store.apply_message(&message), vec![keys::ENABLE_COMPRESSOR.to_string()]);
        assert!(store.apply_message(&message).is_empty(), "replaying the same change set is a no-op");
    }
}
