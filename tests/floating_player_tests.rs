//! Floating Player Tests
//!
//! Transitions, anchor restore, native-mode guard and observer lifecycle
//! against the mock watch page.

mod common;

use approx::assert_relative_eq;
use pretty_assertions::assert_eq;
use serde_json::json;

use common::Harness;
use tube_enhancer::floating::{style, Blocked, FloatingState, NativeMode};
use tube_enhancer::host::mock::ObserverKind;
use tube_enhancer::host::{Dom, EventKind, EventTarget};
use tube_enhancer::registry::TimerKey;

fn floating_harness() -> Harness {
    let mut h = Harness::new(&[("popupPlayer", json!(true))]);
    h.arm_floating();
    h
}

fn body_has(h: &Harness, class: &str) -> bool {
    h.page.has_class(h.page.body_node(), class)
}

// === Activation guards ===

#[test]
fn test_disabled_feature_never_moves_player() {
    let mut h = Harness::new(&[("popupPlayer", json!(false))]);
    h.page.set_scroll_y(900.0);

    let result = h.floating(|f, cx| f.activate(cx, 0.0));
    assert_eq!(result, Err(Blocked::Disabled));
    assert_eq!(h.page.parent(h.handles.player), Some(h.handles.anchor_parent));
    assert!(!body_has(&h, style::FLOATING_CLASS));
}

#[test]
fn test_guards_block_activation() {
    let mut h = floating_harness();

    h.page.set_scroll_y(100.0);
    assert_eq!(h.floating(|f, cx| f.activate(cx, 0.0)), Err(Blocked::NotScrolledPast));

    h.page.set_scroll_y(900.0);
    h.page.set_class(h.handles.player, "ended-mode", true);
    assert_eq!(h.floating(|f, cx| f.activate(cx, 0.0)), Err(Blocked::Ended));
    h.page.set_class(h.handles.player, "ended-mode", false);

    h.page.set_document_attribute("data-current-page-type", "shorts");
    assert_eq!(h.floating(|f, cx| f.activate(cx, 0.0)), Err(Blocked::Shorts));

    let mut h = floating_harness();
    h.page.set_scroll_y(900.0);
    h.page.set_pathname("/feed/subscriptions");
    assert_eq!(h.floating(|f, cx| f.activate(cx, 0.0)), Err(Blocked::NotWatchRoute));

    assert_eq!(h.page.parent(h.handles.player), Some(h.handles.anchor_parent));
}

// === Transitions ===

#[test]
fn test_scrolling_away_floats_the_player() {
    let mut h = floating_harness();
    let resizes = h.page.resize_count();

    h.scroll_away(0.0);

    assert!(h.floating.is_floating());
    assert_eq!(h.page.parent(h.handles.player), Some(h.page.body_node()));
    assert!(body_has(&h, style::FLOATING_CLASS));
    assert!(!body_has(&h, style::VERTICAL_CLASS));
    let aspect: f64 = h.page.root_property(style::ASPECT_PROPERTY).unwrap().parse().unwrap();
    assert_relative_eq!(aspect, 16.0 / 9.0, epsilon = 1e-9);
    assert!(h
        .page
        .is_listening(EventTarget::Media(h.handles.video), EventKind::TimeUpdate));
    assert_eq!(h.page.resize_count(), resizes + 1);

    match h.floating.state() {
        FloatingState::Floating { player, anchor } => {
            assert_eq!(player, h.handles.player);
            assert_eq!(anchor.parent, h.handles.anchor_parent);
            assert_eq!(anchor.next_sibling, Some(h.handles.sibling));
        }
        FloatingState::Docked => panic!("expected floating state"),
    }
}

#[test]
fn test_activation_and_deactivation_are_idempotent() {
    let mut h = floating_harness();
    h.scroll_away(0.0);
    let body_children = h.page.children(h.page.body_node());
    let resizes = h.page.resize_count();

    assert_eq!(h.floating(|f, cx| f.activate(cx, 0.0)), Err(Blocked::AlreadyFloating));
    assert_eq!(h.page.children(h.page.body_node()), body_children);
    assert_eq!(h.page.resize_count(), resizes);
    assert!(body_has(&h, style::FLOATING_CLASS));

    assert!(h.floating(|f, cx| f.deactivate(cx)));
    let docked_children = h.page.children(h.handles.anchor_parent);
    assert!(!h.floating(|f, cx| f.deactivate(cx)));
    assert_eq!(h.page.children(h.handles.anchor_parent), docked_children);
    assert!(!body_has(&h, style::FLOATING_CLASS));
}

#[test]
fn test_anchor_round_trip_restores_exact_position() {
    let mut h = floating_harness();
    let before = h.page.children(h.handles.anchor_parent);

    h.scroll_away(0.0);
    let observer = h.intersection_observer();
    h.floating(|f, cx| f.on_intersection(cx, observer, 1.0));

    assert_eq!(h.floating.state(), FloatingState::Docked);
    assert_eq!(h.page.parent(h.handles.player), Some(h.handles.anchor_parent));
    assert_eq!(h.page.next_sibling(h.handles.player), Some(h.handles.sibling));
    assert_eq!(h.page.children(h.handles.anchor_parent), before);
    assert!(!h
        .page
        .is_listening(EventTarget::Media(h.handles.video), EventKind::TimeUpdate));
}

#[test]
fn test_anchor_keeps_position_before_text_node() {
    let mut h = floating_harness();
    let text = h.page.insert_text(h.handles.anchor_parent, Some(h.handles.sibling));
    let before = h.page.children(h.handles.anchor_parent);
    assert_eq!(before, vec![h.handles.player, text, h.handles.sibling]);

    h.scroll_away(0.0);
    assert!(h.floating.is_floating());
    h.floating(|f, cx| f.deactivate(cx));

    assert_eq!(h.page.next_sibling(h.handles.player), Some(text));
    assert_eq!(h.page.children(h.handles.anchor_parent), before);
}

#[test]
fn test_removed_sibling_appends_to_original_parent() {
    let mut h = floating_harness();
    h.scroll_away(0.0);
    h.page.detach(h.handles.sibling);

    h.floating(|f, cx| f.deactivate(cx));
    assert_eq!(h.page.parent(h.handles.player), Some(h.handles.anchor_parent));
    assert_eq!(h.page.next_sibling(h.handles.player), None);
}

#[test]
fn test_removed_anchor_falls_back_to_player_container() {
    let mut h = floating_harness();
    h.scroll_away(0.0);
    h.page.detach(h.handles.anchor_parent);

    h.floating(|f, cx| f.deactivate(cx));
    assert_eq!(h.page.parent(h.handles.player), Some(h.handles.ytd_player));
    assert!(h.page.is_connected(h.handles.player));
}

#[test]
fn test_ratio_at_threshold_does_not_flap() {
    let mut h = floating_harness();
    h.scroll_away(0.0);
    let observer = h.intersection_observer();
    let threshold = h.config.floating_threshold;

    h.floating(|f, cx| f.on_intersection(cx, observer, threshold));
    assert!(!h.floating.is_floating());
    let resizes = h.page.resize_count();

    for _ in 0..5 {
        h.floating(|f, cx| f.on_intersection(cx, observer, threshold));
        assert!(!h.floating.is_floating());
    }
    assert_eq!(h.page.resize_count(), resizes);

    for _ in 0..5 {
        h.floating(|f, cx| f.on_intersection(cx, observer, threshold - 0.01));
        assert!(h.floating.is_floating());
    }
    assert_eq!(h.page.resize_count(), resizes + 1);
}

#[test]
fn test_leaving_watch_route_docks() {
    let mut h = floating_harness();
    h.scroll_away(0.0);

    h.page.set_pathname("/results");
    h.floating(|f, cx| f.on_navigation(cx));
    assert!(!h.floating.is_floating());
    assert_eq!(h.page.parent(h.handles.player), Some(h.handles.anchor_parent));
}

// === Native mode guard ===

#[test]
fn test_native_miniplayer_forces_dock_until_cleared() {
    let mut h = floating_harness();
    h.scroll_away(0.0);
    let class_observer = h.floating.observers().and_then(|p| p.class_changes).unwrap();

    h.page.set_class(h.handles.player, "ytp-player-minimized", true);
    h.floating(|f, cx| f.on_player_class_changed(cx, class_observer));
    assert!(!h.floating.is_floating());
    assert_eq!(h.floating.native_mode(), NativeMode::Active);
    assert_eq!(h.page.parent(h.handles.player), Some(h.handles.anchor_parent));

    // Still scrolled away, but the native miniplayer owns the player
    h.scroll_away(0.0);
    assert!(!h.floating.is_floating());

    h.page.set_class(h.handles.player, "ytp-player-minimized", false);
    h.floating(|f, cx| f.on_player_class_changed(cx, class_observer));
    assert_eq!(h.floating.native_mode(), NativeMode::Clearing);
    h.scroll_away(0.0);
    assert!(!h.floating.is_floating(), "grace period still running");

    h.advance(h.config.native_grace_ms);
    assert_eq!(h.floating.native_mode(), NativeMode::Inactive);
    assert!(h.floating.is_floating(), "re-evaluated with the last ratio");
}

#[test]
fn test_native_mode_returning_during_grace_stays_blocked() {
    let mut h = floating_harness();
    h.floating(|f, cx| f.on_picture_in_picture(cx, true));
    assert_eq!(h.floating.native_mode(), NativeMode::Active);

    h.floating(|f, cx| f.on_picture_in_picture(cx, false));
    assert!(h.registry.is_pending(TimerKey::NativeModeRecheck));
    h.advance(200);
    h.floating(|f, cx| f.on_picture_in_picture(cx, true));
    assert!(!h.registry.is_pending(TimerKey::NativeModeRecheck));

    h.advance(1000);
    assert_eq!(h.floating.native_mode(), NativeMode::Active);
    h.scroll_away(0.0);
    assert!(!h.floating.is_floating());
}

// === Observers ===

#[test]
fn test_observer_setup_is_reentrant() {
    let mut h = floating_harness();
    let pair = h.floating.observers().unwrap();
    let count = h.page.observer_count();

    h.floating(|f, cx| f.setup_observers(cx));
    assert_eq!(h.floating.observers(), Some(pair));
    assert_eq!(h.page.observer_count(), count);
}

#[test]
fn test_stale_container_observers_are_disconnected() {
    let mut h = floating_harness();
    let old = h.floating.observers().unwrap();

    // The host rebuilds the watch page container
    h.page.detach(h.handles.container);
    let body = h.page.body_node();
    let container = h.page.create(body, "div", Some("player-container"), &[]);
    h.page.set_height(container, 480.0);
    let ytd = h.page.create(container, "ytd-player", Some("ytd-player"), &[]);
    h.page.create(ytd, "div", Some("movie_player"), &["html5-video-player"]);

    h.floating(|f, cx| f.setup_observers(cx));
    let new = h.floating.observers().unwrap();
    assert_eq!(new.container, container);
    assert!(!h.page.is_observer_live(old.intersection));
    assert!(h.page.observers_on(h.handles.container, ObserverKind::Intersection).is_empty());
    assert_eq!(h.page.observers_on(container, ObserverKind::Intersection), vec![new.intersection]);

    // A late callback from the disconnected observer is ignored
    h.page.set_scroll_y(900.0);
    h.floating(|f, cx| f.on_intersection(cx, old.intersection, 0.0));
    assert!(!h.floating.is_floating());
}

// === Floating UI ===

#[test]
fn test_aspect_ratio_waits_for_metadata() {
    let mut h = floating_harness();
    h.page.set_video_size(h.handles.video, 0, 0);
    h.scroll_away(0.0);
    assert!(h.registry.is_pending(TimerKey::AspectRetry));

    h.advance(h.config.aspect_retry_ms);
    assert!(h.registry.is_pending(TimerKey::AspectRetry));

    h.page.set_video_size(h.handles.video, 1080, 1920);
    h.advance(h.config.aspect_retry_ms);
    assert!(!h.registry.is_pending(TimerKey::AspectRetry));
    assert!(body_has(&h, style::VERTICAL_CLASS));
    let aspect: f64 = h.page.root_property(style::ASPECT_PROPERTY).unwrap().parse().unwrap();
    assert_relative_eq!(aspect, 0.5625);
}

#[test]
fn test_aspect_retry_is_bounded() {
    let mut h = floating_harness();
    h.page.set_video_size(h.handles.video, 0, 0);
    h.scroll_away(0.0);

    h.advance(h.config.aspect_retry_ms * (h.config.aspect_retry_limit as u64 + 5));
    assert!(!h.registry.is_pending(TimerKey::AspectRetry));
    assert!(h.floating.is_floating());
}

#[test]
fn test_progress_bar_follows_and_seeks_media() {
    let mut h = floating_harness();
    assert_eq!(h.page.progress().map(|(parent, _)| parent), Some(h.handles.player));
    h.scroll_away(0.0);

    h.page.seek(h.handles.video, 300.0);
    h.floating(|f, cx| f.on_time_update(cx));
    assert_relative_eq!(h.page.progress().unwrap().1, 0.5);

    h.floating(|f, cx| f.on_progress_input(cx, 0.25));
    assert_relative_eq!(h.page.media(h.handles.video).unwrap().current_time, 150.0);
}

#[test]
fn test_progress_listener_moves_to_substituted_media() {
    let mut h = Harness::new(&[("popupPlayer", json!(true)), ("enableStereoPan", json!(true))]);
    h.arm_floating();
    h.scroll_away(0.0);
    assert!(h.page.is_listening(EventTarget::Media(h.handles.video), EventKind::TimeUpdate));

    // The audio graph swaps the refused element while the player floats
    h.page.refuse_source(h.handles.video);
    h.audio(|g, cx| g.init(cx));
    h.advance(100);

    let clone = h.page.query("#movie_player video").unwrap();
    assert_ne!(clone, h.handles.video);
    assert_eq!(h.audio.bound_media(), Some(clone));
    assert_eq!(h.floating.progress_source(), Some(clone));
    assert!(h.page.is_listening(EventTarget::Media(clone), EventKind::TimeUpdate));
    assert!(!h.page.is_listening(EventTarget::Media(h.handles.video), EventKind::TimeUpdate));

    h.page.seek(clone, 300.0);
    h.floating(|f, cx| f.on_time_update(cx));
    assert_relative_eq!(h.page.progress().unwrap().1, 0.5);

    // Docking releases the listener on the clone
    h.floating(|f, cx| f.deactivate(cx));
    assert!(!h.page.is_listening(EventTarget::Media(clone), EventKind::TimeUpdate));
}

// === Settings ===

#[test]
fn test_size_change_replaces_stylesheet_without_new_observers() {
    let mut h = floating_harness();
    assert!(h.page.style(style::STYLE_ID).unwrap().contains("480px"));
    assert!(body_has(&h, "efyt-floating-player-480x270"));
    let observers = h.floating.observers();

    h.set("miniPlayerSize", json!("640x360"));
    h.set("miniPlayerPosition", json!("bottom-left"));
    assert!(h.page.style(style::STYLE_ID).unwrap().contains("480px"), "debounced");

    h.advance(h.config.floating_settings_debounce_ms + h.config.observer_setup_ms);
    assert!(h.page.style(style::STYLE_ID).unwrap().contains("640px"));
    assert!(body_has(&h, "efyt-floating-player-640x360"));
    assert!(body_has(&h, "efyt-floating-player-bottom-left"));
    assert!(!body_has(&h, "efyt-floating-player-480x270"));
    assert!(!body_has(&h, "efyt-floating-player-top-right"));
    assert_eq!(h.floating.observers(), observers);
}

#[test]
fn test_disabling_cleans_up_everything() {
    let mut h = floating_harness();
    h.scroll_away(0.0);

    h.set("popupPlayer", json!(false));
    h.advance(h.config.floating_settings_debounce_ms);

    assert!(!h.floating.is_floating());
    assert_eq!(h.page.parent(h.handles.player), Some(h.handles.anchor_parent));
    assert!(h.page.style(style::STYLE_ID).is_none());
    assert_eq!(h.page.observer_count(), 0);
    assert!(h.page.progress().is_none());
    assert_eq!(h.registry.listener_count(), 0);
    assert!(!body_has(&h, style::FLOATING_CLASS));
    assert!(!body_has(&h, "efyt-floating-player-480x270"));
}
