//! Timing and threshold configuration
//!
//! Every field has a default tuned against the host page; embedders may
//! override any subset from a JSON object.

use serde::{Deserialize, Serialize};

use crate::error::{EnhancerError, Result};

/// Tunables shared by the floating player, the audio graph and the coordinator.
///
/// All durations are milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EnhancerConfig {
    /// Intersection ratio below which the docked player is considered scrolled away
    pub floating_threshold: f64,
    /// Scroll offset must exceed the container height minus this margin (px)
    pub scroll_margin_px: f64,
    /// Delay after a host navigation before reading DOM state
    pub navigation_settle_ms: u64,
    /// Delay after start-up on a watch page before applying floating settings
    pub initial_settle_ms: u64,
    /// Delay between styling the page and installing observers
    pub observer_setup_ms: u64,
    /// Debounce for floating player settings changes
    pub floating_settings_debounce_ms: u64,
    /// Grace period after a native miniplayer/PiP exit before re-checking
    pub native_grace_ms: u64,
    /// Retry spacing while the media element reports zero natural size
    pub aspect_retry_ms: u64,
    /// Maximum aspect ratio retries per activation
    pub aspect_retry_limit: u32,
    /// Debounce for structural audio changes (node add/remove)
    pub audio_structural_debounce_ms: u64,
    /// Trailing debounce for audio parameter changes
    pub audio_param_debounce_ms: u64,
    /// Minimum spacing between audio parameter writes
    pub audio_param_throttle_ms: u64,
    /// One-shot delay before re-binding after a media element substitution
    pub media_retry_ms: u64,
    /// Audio context health check period
    pub health_check_ms: u64,
}

impl Default for EnhancerConfig {
    fn default() -> Self {
        Self {
            floating_threshold: 0.12,
            scroll_margin_px: 100.0,
            navigation_settle_ms: 1000,
            initial_settle_ms: 2000,
            observer_setup_ms: 1000,
            floating_settings_debounce_ms: 500,
            native_grace_ms: 500,
            aspect_retry_ms: 500,
            aspect_retry_limit: 10,
            audio_structural_debounce_ms: 150,
            audio_param_debounce_ms: 150,
            audio_param_throttle_ms: 100,
            media_retry_ms: 100,
            health_check_ms: 30_000,
        }
    }
}

impl EnhancerConfig {
    /// Parse a (possibly partial) JSON object and validate it
    pub fn from_json(json: &str) -> Result<Self> {
        let config: EnhancerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the state machines misbehave
    pub fn validate(&self) -> Result<()> {
        if !(self.floating_threshold > 0.0 && self.floating_threshold < 1.0) {
            return Err(EnhancerError::InvalidConfig {
                reason: format!(
                    "floatingThreshold must be in (0, 1), got {}",
                    self.floating_threshold
                ),
            });
        }
        if !self.scroll_margin_px.is_finite() || self.scroll_margin_px < 0.0 {
            return Err(EnhancerError::InvalidConfig {
                reason: "scrollMarginPx must be a non-negative number".to_string(),
            });
        }
        let windows = [
            ("audioStructuralDebounceMs", self.audio_structural_debounce_ms),
            ("audioParamDebounceMs", self.audio_param_debounce_ms),
            ("audioParamThrottleMs", self.audio_param_throttle_ms),
            ("floatingSettingsDebounceMs", self.floating_settings_debounce_ms),
            ("healthCheckMs", self.health_check_ms),
        ];
        for (name, value) in windows {
            if value == 0 {
                return Err(EnhancerError::InvalidConfig {
                    reason: format!("{} must be greater than zero", name),
                });
            }
        }
        Ok(())
    }
}
