//! Settings
//!
//! In-memory rendition of the synced settings store: typed defaults,
//! a single accessor with default fallback, and the change messages
//! broadcast to the tab when the user edits a setting.

mod message;
mod presets;
mod store;

pub use message::{SettingChange, SettingsMessage};
pub use presets::{MiniPlayerPosition, MiniPlayerSize};
pub use store::SettingsStore;

/// Setting keys shared with the popup and the storage area
pub mod keys {
    pub const ENABLE_COMPRESSOR: &str = "enableCompressor";
    pub const VOLUME_BOOST: &str = "volumeBoost";
    pub const COMPRESSOR_RATIO: &str = "compressorRatio";
    pub const ENABLE_STEREO_PAN: &str = "enableStereoPan";
    pub const STEREO_PAN: &str = "stereoPan";
    pub const POPUP_PLAYER: &str = "popupPlayer";
    pub const MINI_PLAYER_SIZE: &str = "miniPlayerSize";
    pub const MINI_PLAYER_POSITION: &str = "miniPlayerPosition";
    pub const ENABLE_PIP: &str = "enablePIP";
    pub const ENABLE_SMALL_PLAYER_BUTTON: &str = "enableSmallPlayerButton";

    /// Keys the audio graph reacts to
    pub const AUDIO: [&str; 5] = [
        ENABLE_COMPRESSOR,
        ENABLE_STEREO_PAN,
        VOLUME_BOOST,
        COMPRESSOR_RATIO,
        STEREO_PAN,
    ];

    /// Audio keys that add or remove a node from the chain
    pub const AUDIO_STRUCTURAL: [&str; 2] = [ENABLE_COMPRESSOR, ENABLE_STEREO_PAN];

    /// Keys the floating player reacts to
    pub const FLOATING: [&str; 3] = [POPUP_PLAYER, MINI_PLAYER_SIZE, MINI_PLAYER_POSITION];
}

/// True if any of `changed` appears in `watched`
pub fn touches(changed: &[String], watched: &[&str]) -> bool {
    changed.iter().any(|key| watched.contains(&key.as_str()))
}
