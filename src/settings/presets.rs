//! Floating player size and position presets

use std::fmt;
use std::str::FromStr;

use crate::error::EnhancerError;

/// Pixel size presets for the floating player (16:9 landscape boxes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MiniPlayerSize {
    S256x144,
    S320x180,
    S400x225,
    S426x240,
    #[default]
    S480x270,
    S560x315,
    S640x360,
    S720x405,
    S960x540,
}

impl MiniPlayerSize {
    pub const ALL: [MiniPlayerSize; 9] = [
        MiniPlayerSize::S256x144,
        MiniPlayerSize::S320x180,
        MiniPlayerSize::S400x225,
        MiniPlayerSize::S426x240,
        MiniPlayerSize::S480x270,
        MiniPlayerSize::S560x315,
        MiniPlayerSize::S640x360,
        MiniPlayerSize::S720x405,
        MiniPlayerSize::S960x540,
    ];

    /// (width, height) in CSS pixels
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            MiniPlayerSize::S256x144 => (256, 144),
            MiniPlayerSize::S320x180 => (320, 180),
            MiniPlayerSize::S400x225 => (400, 225),
            MiniPlayerSize::S426x240 => (426, 240),
            MiniPlayerSize::S480x270 => (480, 270),
            MiniPlayerSize::S560x315 => (560, 315),
            MiniPlayerSize::S640x360 => (640, 360),
            MiniPlayerSize::S720x405 => (720, 405),
            MiniPlayerSize::S960x540 => (960, 540),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MiniPlayerSize::S256x144 => "256x144",
            MiniPlayerSize::S320x180 => "320x180",
            MiniPlayerSize::S400x225 => "400x225",
            MiniPlayerSize::S426x240 => "426x240",
            MiniPlayerSize::S480x270 => "480x270",
            MiniPlayerSize::S560x315 => "560x315",
            MiniPlayerSize::S640x360 => "640x360",
            MiniPlayerSize::S720x405 => "720x405",
            MiniPlayerSize::S960x540 => "960x540",
        }
    }
}

impl fmt::Display for MiniPlayerSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MiniPlayerSize {
    type Err = EnhancerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MiniPlayerSize::ALL
            .into_iter()
            .find(|size| size.as_str() == s)
            .ok_or_else(|| EnhancerError::InvalidSetting {
                key: super::keys::MINI_PLAYER_SIZE.to_string(),
                reason: format!("unknown size preset '{}'", s),
            })
    }
}

/// Screen corner or edge the floating player is pinned to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MiniPlayerPosition {
    TopLeft,
    TopCenter,
    #[default]
    TopRight,
    BottomLeft,
    BottomCenter,
    BottomRight,
}

impl MiniPlayerPosition {
    pub const ALL: [MiniPlayerPosition; 6] = [
        MiniPlayerPosition::TopLeft,
        MiniPlayerPosition::TopCenter,
        MiniPlayerPosition::TopRight,
        MiniPlayerPosition::BottomLeft,
        MiniPlayerPosition::BottomCenter,
        MiniPlayerPosition::BottomRight,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MiniPlayerPosition::TopLeft => "top-left",
            MiniPlayerPosition::TopCenter => "top-center",
            MiniPlayerPosition::TopRight => "top-right",
            MiniPlayerPosition::BottomLeft => "bottom-left",
            MiniPlayerPosition::BottomCenter => "bottom-center",
            MiniPlayerPosition::BottomRight => "bottom-right",
        }
    }

    pub fn is_top(self) -> bool {
        matches!(
            self,
            MiniPlayerPosition::TopLeft | MiniPlayerPosition::TopCenter | MiniPlayerPosition::TopRight
        )
    }
}

impl fmt::Display for MiniPlayerPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MiniPlayerPosition {
    type Err = EnhancerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MiniPlayerPosition::ALL
            .into_iter()
            .find(|pos| pos.as_str() == s)
            .ok_or_else(|| EnhancerError::InvalidSetting {
                key: super::keys::MINI_PLAYER_POSITION.to_string(),
                reason: format!("unknown position '{}'", s),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_parse() {
        let size: MiniPlayerSize = "640x360".parse().unwrap();
        assert_eq!(size.dimensions(), (640, 360));
        assert!("641x360".parse::<MiniPlayerSize>().is_err());
    }

    #[test]
    fn test_position_parse() {
        let pos: MiniPlayerPosition = "bottom-center".parse().unwrap();
        assert_eq!(pos, MiniPlayerPosition::BottomCenter);
        assert!(!pos.is_top());
    }
}
