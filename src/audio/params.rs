//! Parameter targets derived from settings
//!
//! Pure functions, so every write the graph manager makes can be
//! recomputed and checked without an audio context.

use crate::host::CompressorParams;
use crate::settings::{keys, SettingsStore};

// ============================================================================
// Constants
// ============================================================================

/// Valid compressor ratio range (1:1 to 20:1)
pub const MIN_RATIO: f32 = 1.0;
pub const MAX_RATIO: f32 = 20.0;

/// Stereo pan range of the panner node
pub const MIN_PAN: f32 = -1.0;
pub const MAX_PAN: f32 = 1.0;

/// Gain ceiling for the volume boost (600%)
pub const MAX_GAIN: f32 = 6.0;

const DEFAULT_VOLUME_BOOST: f64 = 100.0;
const DEFAULT_RATIO: f64 = 12.0;

/// Values the graph should currently hold
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioTargets {
    pub gain: f32,
    /// Present only while the compressor is enabled
    pub ratio: Option<f32>,
    /// Present only while stereo panning is enabled
    pub pan: Option<f32>,
}

/// Volume boost applies only while the compressor is on; otherwise unity
pub fn volume_gain(settings: &SettingsStore) -> f32 {
    if !settings.is_compressor_enabled() {
        return 1.0;
    }
    let percent = settings.get_f64(keys::VOLUME_BOOST, DEFAULT_VOLUME_BOOST);
    ((percent / 100.0) as f32).clamp(0.0, MAX_GAIN)
}

pub fn compressor_ratio(settings: &SettingsStore) -> f32 {
    let ratio = settings.get_f64(keys::COMPRESSOR_RATIO, DEFAULT_RATIO) as f32;
    ratio.clamp(MIN_RATIO, MAX_RATIO)
}

/// Settings store pan in percent (-100..100); the node wants -1..1
pub fn pan_value(settings: &SettingsStore) -> f32 {
    let percent = settings.get_f64(keys::STEREO_PAN, 0.0) as f32;
    (percent / 100.0).clamp(MIN_PAN, MAX_PAN)
}

pub fn compressor_params(settings: &SettingsStore) -> CompressorParams {
    CompressorParams {
        ratio: compressor_ratio(settings),
        ..CompressorParams::default()
    }
}

pub fn targets(settings: &SettingsStore) -> AudioTargets {
    AudioTargets {
        gain: volume_gain(settings),
        ratio: settings
            .is_compressor_enabled()
            .then(|| compressor_ratio(settings)),
        pan: settings.is_stereo_pan_enabled().then(|| pan_value(settings)),
    }
}
