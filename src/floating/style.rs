//! Generated stylesheet and body marker classes for the floating player
//!
//! The sheet is injected as one element keyed by [`STYLE_ID`] and replaced
//! wholesale whenever the size or position preset changes.

use std::fmt::Write;

use crate::settings::{MiniPlayerPosition, MiniPlayerSize};

pub const STYLE_ID: &str = "efyt-floating-player-styles";

/// Body class marking the floating state
pub const FLOATING_CLASS: &str = "efyt-floating-player";
/// Body class marking a portrait video while floating
pub const VERTICAL_CLASS: &str = "efyt-floating-player-vertical";

pub const ASPECT_PROPERTY: &str = "--efyt-floating-player-aspect-ratio";
pub const WIDTH_PROPERTY: &str = "--efyt-floating-player-width";
pub const HEIGHT_PROPERTY: &str = "--efyt-floating-player-height";
pub const CENTER_LEFT_PROPERTY: &str = "--efyt-floating-player-center-left";

const PLAYER: &str = "#movie_player:not(.ytp-fullscreen)";
const VIDEO: &str = "#movie_player:not(.ytp-fullscreen) video.html5-main-video";

const EDGE_OFFSET_PX: u32 = 15;
const TOP_OFFSET_PX: u32 = 60;

pub fn size_class(size: MiniPlayerSize) -> String {
    format!("{}-{}", FLOATING_CLASS, size.as_str())
}

pub fn position_class(position: MiniPlayerPosition) -> String {
    format!("{}-{}", FLOATING_CLASS, position.as_str())
}

/// Every preset class, for removal before the current pair is added
pub fn all_preset_classes() -> Vec<String> {
    MiniPlayerSize::ALL
        .into_iter()
        .map(size_class)
        .chain(MiniPlayerPosition::ALL.into_iter().map(position_class))
        .collect()
}

/// Left offset that centres a player of `width` px horizontally
pub fn center_left(width: u32) -> String {
    format!("calc(100vw / 2 - {}px)", width as f64 / 2.0)
}

/// Render the complete stylesheet for a size preset
pub fn stylesheet(size: MiniPlayerSize) -> String {
    let (width, height) = size.dimensions();
    let mut css = String::new();

    let _ = writeln!(
        css,
        ":root {{ {}: {}; {}: {}px; {}: {}px; {}: {}; }}",
        ASPECT_PROPERTY,
        16.0 / 9.0,
        HEIGHT_PROPERTY,
        height,
        WIDTH_PROPERTY,
        width,
        CENTER_LEFT_PROPERTY,
        center_left(width),
    );

    // Progress bar, shown only while floating and not auto-hidden
    css.push_str(
        "#efyt-progress { appearance: none; background: #333; border: none; color: #f03; \
         cursor: pointer; display: none; height: 3px; position: absolute; width: 100%; \
         left: 0; bottom: 0; }\n",
    );
    let _ = writeln!(
        css,
        "body.{f} #movie_player:not(.unstarted-mode) #efyt-progress {{ display: block; }}\n\
         body.{f} #movie_player.ytp-autohide #efyt-progress {{ display: none; }}\n\
         body.{f} .ytp-contextmenu {{ z-index: 2147483647 !important; }}",
        f = FLOATING_CLASS
    );

    let _ = writeln!(
        css,
        "body.{f} {p} {{ background: #000 !important; position: fixed !important; \
         z-index: 2147483640 !important; border-radius: 8px !important; }}",
        f = FLOATING_CLASS,
        p = PLAYER
    );
    let _ = writeln!(
        css,
        "body.{f} {p}, body.{f} {v} {{ height: auto !important; width: var({w}) !important; \
         aspect-ratio: var({a}) !important; }}\n\
         body.{f} {v} {{ margin-left: 0 !important; left: 0 !important; top: 0 !important; }}\n\
         body.{f} {p} .ytp-chrome-bottom {{ width: calc(100% - 24px) !important; }}",
        f = FLOATING_CLASS,
        p = PLAYER,
        v = VIDEO,
        w = WIDTH_PROPERTY,
        a = ASPECT_PROPERTY
    );

    for hidden in [
        ".ytp-autoplay-icon",
        ".ytp-settings-button",
        ".ytp-right-controls > *:not(.ytp-subtitles-button)",
        ".ytp-cards-teaser",
        ".ytp-ce-element",
        ".ytp-cards-button",
        ".ytp-watermark",
    ] {
        let _ = writeln!(
            css,
            "body.{} {} {} {{ display: none !important; }}",
            FLOATING_CLASS, PLAYER, hidden
        );
    }

    for position in MiniPlayerPosition::ALL {
        let horizontal = match position {
            MiniPlayerPosition::TopLeft | MiniPlayerPosition::BottomLeft => {
                format!("left: {}px !important; right: auto !important;", EDGE_OFFSET_PX)
            }
            MiniPlayerPosition::TopCenter | MiniPlayerPosition::BottomCenter => {
                format!("left: var({}) !important;", CENTER_LEFT_PROPERTY)
            }
            MiniPlayerPosition::TopRight | MiniPlayerPosition::BottomRight => {
                format!("left: auto !important; right: {}px !important;", EDGE_OFFSET_PX)
            }
        };
        let vertical = if position.is_top() {
            format!("top: {}px !important;", TOP_OFFSET_PX)
        } else {
            format!("bottom: {}px !important;", EDGE_OFFSET_PX)
        };
        let _ = writeln!(
            css,
            "body.{}.{} {} {{ {} {} }}",
            FLOATING_CLASS,
            position_class(position),
            PLAYER,
            horizontal,
            vertical
        );
    }

    // Portrait videos keep the preset's long edge as their height
    let _ = writeln!(
        css,
        "body.{c} {p}, body.{c} {v} {{ height: auto !important; width: auto !important; \
         aspect-ratio: var({a}) !important; }}\n\
         body.{c} {p} .ytp-chrome-bottom {{ width: calc(100% - 24px) !important; }}",
        c = VERTICAL_CLASS,
        p = PLAYER,
        v = VIDEO,
        a = ASPECT_PROPERTY
    );
    for preset in MiniPlayerSize::ALL {
        let class = size_class(preset);
        let _ = writeln!(
            css,
            "body.{c}.{s} {p}, body.{c}.{s} {v} {{ height: {h}px !important; width: auto !important; }}",
            c = VERTICAL_CLASS,
            s = class,
            p = PLAYER,
            v = VIDEO,
            h = preset.dimensions().0
        );
    }

    css
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stylesheet_carries_size_properties() {
        let css = stylesheet(MiniPlayerSize::S640x360);
        assert!(css.contains("--efyt-floating-player-width: 640px"));
        assert!(css.contains("--efyt-floating-player-height: 360px"));
        assert!(css.contains("calc(100vw / 2 - 320px)"));
    }

    #[test]
    fn test_every_position_has_a_rule() {
        let css = stylesheet(MiniPlayerSize::default());
        for position in MiniPlayerPosition::ALL {
            assert!(css.contains(&position_class(position)), "{}", position);
        }
    }

    #[test]
    fn test_preset_classes() {
        assert_eq!(size_class(MiniPlayerSize::S256x144), "efyt-floating-player-256x144");
        assert_eq!(position_class(MiniPlayerPosition::BottomCenter), "efyt-floating-player-bottom-center");
        assert_eq!(all_preset_classes().len(), 15);
    }
}
