//! Floating Player Controller
//!
//! Moves the player under the document body while its container is
//! scrolled out of view and puts it back at its captured anchor afterwards.
//! Every transition checks the explicit [`FloatingState`] and [`NativeMode`]
//! first, so repeated or out-of-order observer callbacks are no-ops.

use log::{debug, info, warn};

use super::state::{Anchor, FloatingState, NativeMode, ObserverPair};
use super::{is_shorts, is_watch_route, style};
use crate::context::PageContext;
use crate::host::{EventKind, EventTarget, Host, NodeRef, ObserverId};
use crate::registry::{Owner, TimerKey};
use crate::schedule::Debounce;
use crate::settings::{keys, touches, MiniPlayerPosition, MiniPlayerSize};

/// Container the visibility observer watches
pub const CONTAINER_SELECTOR: &str = "#player-container";

/// Parents tried, in order, when the captured anchor left the document
pub const FALLBACK_PARENTS: [&str; 2] = ["ytd-player", "#player-container"];

/// Player class set by the host while its own miniplayer is shown
pub const NATIVE_MINIPLAYER_CLASS: &str = "ytp-player-minimized";

/// Player class set by the host once playback has ended
pub const ENDED_CLASS: &str = "ended-mode";

/// Why an activation request did nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Blocked {
    Disabled,
    Shorts,
    NotWatchRoute,
    NativeMode,
    AlreadyFloating,
    NoPlayer,
    Ended,
    NotScrolledPast,
    Visible,
}

#[derive(Debug)]
pub struct FloatingPlayer {
    state: FloatingState,
    native: NativeMode,
    pip_active: bool,
    observers: Option<ObserverPair>,
    last_ratio: Option<f64>,
    /// Media element carrying the time-update listener while floating
    progress_source: Option<NodeRef>,
    preset: Option<(MiniPlayerSize, MiniPlayerPosition)>,
    aspect_attempts: u32,
    settings_debounce: Debounce,
}

impl FloatingPlayer {
    pub fn new(config: &crate::config::EnhancerConfig) -> Self {
        Self {
            state: FloatingState::Docked,
            native: NativeMode::Inactive,
            pip_active: false,
            observers: None,
            last_ratio: None,
            progress_source: None,
            preset: None,
            aspect_attempts: 0,
            settings_debounce: Debounce::new(TimerKey::FloatingSettings, config.floating_settings_debounce_ms),
        }
    }

    pub fn state(&self) -> FloatingState {
        self.state
    }

    pub fn is_floating(&self) -> bool {
        self.state.is_floating()
    }

    pub fn native_mode(&self) -> NativeMode {
        self.native
    }

    pub fn observers(&self) -> Option<ObserverPair> {
        self.observers
    }

    // ========================================================================
    // Settings application
    // ========================================================================

    /// Bring the page in line with the current floating settings
    pub fn apply<H: Host + ?Sized>(&mut self, cx: &mut PageContext<'_, H>) {
        if !cx.settings.is_floating_player_enabled() {
            self.cleanup(cx);
            return;
        }
        if is_shorts(&*cx.host) {
            debug!("[FLOATING] shorts view, staying docked");
            self.deactivate(cx);
            return;
        }

        self.install_stylesheet(cx);
        self.update_preset_classes(cx);
        if let Some(player) = cx.locator.player(&*cx.host) {
            cx.host.attach_progress_bar(player);
        }
        cx.registry.listen_once_per_target(
            cx.host,
            Owner::Floating,
            EventTarget::ProgressBar,
            EventKind::Input,
        );
        for kind in [EventKind::EnterPictureInPicture, EventKind::LeavePictureInPicture] {
            cx.registry
                .listen_once_per_target(cx.host, Owner::Floating, EventTarget::Document, kind);
        }

        cx.registry
            .schedule(TimerKey::FloatingObserverSetup, cx.now, cx.config.observer_setup_ms);
    }

    /// Replace the stylesheet only when the preset pair actually changed
    fn install_stylesheet<H: Host + ?Sized>(&mut self, cx: &mut PageContext<'_, H>) {
        let preset = (cx.settings.mini_player_size(), cx.settings.mini_player_position());
        if self.preset == Some(preset) {
            return;
        }
        cx.host.upsert_style(style::STYLE_ID, &style::stylesheet(preset.0));
        self.preset = Some(preset);
        debug!("[FLOATING] stylesheet installed for {} at {}", preset.0, preset.1);
    }

    fn update_preset_classes<H: Host + ?Sized>(&mut self, cx: &mut PageContext<'_, H>) {
        let Some(body) = cx.host.body() else {
            return;
        };
        for class in style::all_preset_classes() {
            cx.host.set_class(body, &class, false);
        }
        cx.host
            .set_class(body, &style::size_class(cx.settings.mini_player_size()), true);
        cx.host
            .set_class(body, &style::position_class(cx.settings.mini_player_position()), true);
    }

    /// Settings changed; floating keys are applied after a debounce
    pub fn on_settings_changed<H: Host + ?Sized>(&mut self, cx: &mut PageContext<'_, H>, changed: &[String]) {
        if touches(changed, &keys::FLOATING) {
            self.settings_debounce.arm(cx.registry, cx.now);
        }
    }

    // ========================================================================
    // Observers
    // ========================================================================

    /// Install the intersection/class observer pair for the current
    /// container, disconnecting any pair left over from a stale one.
    pub fn setup_observers<H: Host + ?Sized>(&mut self, cx: &mut PageContext<'_, H>) {
        if !cx.settings.is_floating_player_enabled() || is_shorts(&*cx.host) {
            return;
        }
        let Some(container) = cx.host.query(CONTAINER_SELECTOR) else {
            debug!("[FLOATING] no player container yet");
            return;
        };
        let player = cx.locator.player(&*cx.host);

        if let Some(pair) = self.observers {
            if pair.container == container && pair.player == player {
                return;
            }
            debug!("[FLOATING] replacing observers of stale container {}", pair.container);
            self.disconnect_observers(cx);
        }

        let thresholds = [0.0, cx.config.floating_threshold, 0.2];
        let intersection = match cx.host.observe_intersection(container, &thresholds) {
            Ok(id) => id,
            Err(err) => {
                warn!("[FLOATING] visibility observer unavailable: {}", err);
                return;
            }
        };
        let class_changes = player.and_then(|p| match cx.host.observe_class_changes(p) {
            Ok(id) => Some(id),
            Err(err) => {
                warn!("[FLOATING] class observer unavailable: {}", err);
                None
            }
        });

        self.observers = Some(ObserverPair {
            container,
            intersection,
            player,
            class_changes,
        });
        self.pip_active = cx.host.picture_in_picture_active();
        self.refresh_native_mode(cx);
        debug!("[FLOATING] observing {}", container);
    }

    fn disconnect_observers<H: Host + ?Sized>(&mut self, cx: &mut PageContext<'_, H>) {
        if let Some(pair) = self.observers.take() {
            for id in pair.ids() {
                cx.host.disconnect_observer(id);
            }
        }
        self.last_ratio = None;
    }

    fn is_current_intersection(&self, observer: ObserverId) -> bool {
        self.observers.map(|p| p.intersection == observer).unwrap_or(false)
    }

    fn is_current_class_observer(&self, observer: ObserverId) -> bool {
        self.observers.and_then(|p| p.class_changes) == Some(observer)
    }

    /// Visibility observer callback
    pub fn on_intersection<H: Host + ?Sized>(&mut self, cx: &mut PageContext<'_, H>, observer: ObserverId, ratio: f64) {
        if !self.is_current_intersection(observer) {
            debug!("[FLOATING] ignoring report from stale observer {:?}", observer);
            return;
        }
        self.last_ratio = Some(ratio);
        self.evaluate(cx, ratio);
    }

    /// Below the threshold the player should float; at or above it, dock.
    /// Both transitions are idempotent, so a repeated ratio cannot flap.
    fn evaluate<H: Host + ?Sized>(&mut self, cx: &mut PageContext<'_, H>, ratio: f64) {
        if ratio < cx.config.floating_threshold {
            if let Err(reason) = self.activate(cx, ratio) {
                debug!("[FLOATING] not floating at ratio {:.3}: {:?}", ratio, reason);
            }
        } else {
            self.deactivate(cx);
        }
    }

    /// Player class mutation callback
    pub fn on_player_class_changed<H: Host + ?Sized>(&mut self, cx: &mut PageContext<'_, H>, observer: ObserverId) {
        if !self.is_current_class_observer(observer) {
            return;
        }
        self.refresh_native_mode(cx);
    }

    pub fn on_picture_in_picture<H: Host + ?Sized>(&mut self, cx: &mut PageContext<'_, H>, active: bool) {
        self.pip_active = active;
        self.refresh_native_mode(cx);
    }

    fn native_mode_active<H: Host + ?Sized>(&self, cx: &mut PageContext<'_, H>) -> bool {
        let minimized = cx
            .locator
            .player(&*cx.host)
            .map(|p| cx.host.has_class(p, NATIVE_MINIPLAYER_CLASS))
            .unwrap_or(false);
        minimized || self.pip_active
    }

    /// Dock immediately when a native mode appears; when it goes away,
    /// wait out the grace period before allowing activation again.
    fn refresh_native_mode<H: Host + ?Sized>(&mut self, cx: &mut PageContext<'_, H>) {
        if self.native_mode_active(cx) {
            if self.native != NativeMode::Active {
                info!("[FLOATING] native miniplayer or PiP active, docking");
            }
            self.native = NativeMode::Active;
            cx.registry.cancel(TimerKey::NativeModeRecheck);
            self.deactivate(cx);
        } else if self.native == NativeMode::Active {
            self.native = NativeMode::Clearing;
            cx.registry
                .schedule(TimerKey::NativeModeRecheck, cx.now, cx.config.native_grace_ms);
        }
    }

    fn recheck_native_mode<H: Host + ?Sized>(&mut self, cx: &mut PageContext<'_, H>) {
        if self.native != NativeMode::Clearing {
            return;
        }
        if self.native_mode_active(cx) {
            self.native = NativeMode::Active;
            return;
        }
        self.native = NativeMode::Inactive;
        debug!("[FLOATING] native mode cleared");
        if let Some(ratio) = self.last_ratio {
            self.evaluate(cx, ratio);
        }
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    /// docked → floating, if every guard allows it
    pub fn activate<H: Host + ?Sized>(&mut self, cx: &mut PageContext<'_, H>, ratio: f64) -> Result<(), Blocked> {
        if !cx.settings.is_floating_player_enabled() {
            return Err(Blocked::Disabled);
        }
        if self.state.is_floating() {
            return Err(Blocked::AlreadyFloating);
        }
        if ratio >= cx.config.floating_threshold {
            return Err(Blocked::Visible);
        }
        if self.native.blocks_activation() {
            return Err(Blocked::NativeMode);
        }
        if !is_watch_route(&cx.host.pathname()) {
            return Err(Blocked::NotWatchRoute);
        }
        if is_shorts(&*cx.host) {
            return Err(Blocked::Shorts);
        }
        let Some(player) = cx.locator.player(&*cx.host) else {
            return Err(Blocked::NoPlayer);
        };
        if cx.host.has_class(player, ENDED_CLASS) {
            return Err(Blocked::Ended);
        }
        let container_height = cx
            .host
            .query(CONTAINER_SELECTOR)
            .map(|c| cx.host.offset_height(c))
            .unwrap_or(0.0);
        if cx.host.scroll_y() <= container_height - cx.config.scroll_margin_px {
            return Err(Blocked::NotScrolledPast);
        }
        let (Some(body), Some(parent)) = (cx.host.body(), cx.host.parent(player)) else {
            return Err(Blocked::NoPlayer);
        };

        let anchor = Anchor {
            parent,
            next_sibling: cx.host.next_sibling(player),
        };
        if let Err(err) = cx.host.insert_before(body, player, None) {
            warn!("[FLOATING] could not move player: {}", err);
            return Err(Blocked::NoPlayer);
        }
        self.state = FloatingState::Floating { player, anchor };
        cx.host.set_class(body, style::FLOATING_CLASS, true);

        self.aspect_attempts = 0;
        self.update_aspect_ratio(cx);

        self.follow_media(cx);
        cx.host.dispatch_resize();
        info!("[FLOATING] player floating (ratio {:.3})", ratio);
        Ok(())
    }

    /// floating → docked. Returns false when already docked.
    pub fn deactivate<H: Host + ?Sized>(&mut self, cx: &mut PageContext<'_, H>) -> bool {
        let FloatingState::Floating { player, anchor } = self.state else {
            return false;
        };
        self.state = FloatingState::Docked;
        cx.registry.cancel(TimerKey::AspectRetry);

        if let Some(media) = self.progress_source.take() {
            cx.registry
                .unlisten_matching(cx.host, Owner::Floating, EventTarget::Media(media), EventKind::TimeUpdate);
        }

        if cx.host.is_connected(player) {
            self.restore_anchor(cx, player, anchor);
        } else {
            debug!("[FLOATING] player {} left the document while floating", player);
        }

        if let Some(body) = cx.host.body() {
            cx.host.set_class(body, style::FLOATING_CLASS, false);
            cx.host.set_class(body, style::VERTICAL_CLASS, false);
        }
        cx.host.dispatch_resize();
        info!("[FLOATING] player docked");
        true
    }

    fn restore_anchor<H: Host + ?Sized>(&mut self, cx: &mut PageContext<'_, H>, player: NodeRef, anchor: Anchor) {
        let parent = if cx.host.is_connected(anchor.parent) {
            Some(anchor.parent)
        } else {
            FALLBACK_PARENTS.iter().find_map(|sel| cx.host.query(sel))
        };
        let Some(parent) = parent else {
            warn!("[FLOATING] no place to restore the player to");
            return;
        };
        let before = anchor
            .next_sibling
            .filter(|s| parent == anchor.parent && cx.host.parent(*s) == Some(parent));
        if let Err(err) = cx.host.insert_before(parent, player, before) {
            warn!("[FLOATING] could not restore player: {}", err);
        }
    }

    // ========================================================================
    // Floating UI
    // ========================================================================

    /// Derive the aspect ratio from the media's natural size, retrying a
    /// bounded number of times while metadata is missing.
    fn update_aspect_ratio<H: Host + ?Sized>(&mut self, cx: &mut PageContext<'_, H>) {
        let body = cx.host.body();
        if is_shorts(&*cx.host) {
            if let Some(body) = body {
                cx.host.set_class(body, style::VERTICAL_CLASS, false);
            }
            cx.host.set_root_property(style::ASPECT_PROPERTY, None);
            return;
        }
        let Some(media) = cx.locator.media(&*cx.host) else {
            return;
        };

        let (width, height) = cx.host.video_size(media);
        if width == 0 || height == 0 {
            if self.aspect_attempts < cx.config.aspect_retry_limit {
                self.aspect_attempts += 1;
                cx.registry
                    .schedule(TimerKey::AspectRetry, cx.now, cx.config.aspect_retry_ms);
            } else {
                debug!("[FLOATING] media size still unknown, keeping default aspect");
            }
            return;
        }

        let aspect = width as f64 / height as f64;
        if let Some(body) = body {
            cx.host.set_class(body, style::VERTICAL_CLASS, aspect < 1.0);
        }
        cx.host
            .set_root_property(style::ASPECT_PROPERTY, Some(&aspect.to_string()));
    }

    fn sync_progress<H: Host + ?Sized>(&mut self, cx: &mut PageContext<'_, H>) {
        let Some(media) = cx.locator.media(&*cx.host) else {
            return;
        };
        if let Some(snapshot) = cx.host.media_snapshot(media) {
            if snapshot.duration > 0.0 {
                cx.host.set_progress(snapshot.current_time / snapshot.duration);
            }
        }
    }

    pub fn on_time_update<H: Host + ?Sized>(&mut self, cx: &mut PageContext<'_, H>) {
        if self.state.is_floating() {
            self.follow_media(cx);
            self.sync_progress(cx);
        }
    }

    /// Move the time-update listener to the page's current media element.
    /// Call after anything that may swap the element, such as an audio
    /// substitution. No-op while docked.
    pub fn follow_media<H: Host + ?Sized>(&mut self, cx: &mut PageContext<'_, H>) {
        if !self.state.is_floating() {
            return;
        }
        let current = cx.locator.media(&*cx.host);
        if current == self.progress_source {
            return;
        }
        if let Some(old) = self.progress_source.take() {
            cx.registry
                .unlisten_matching(cx.host, Owner::Floating, EventTarget::Media(old), EventKind::TimeUpdate);
        }
        if let Some(media) = current {
            cx.registry.listen_once_per_target(
                cx.host,
                Owner::Floating,
                EventTarget::Media(media),
                EventKind::TimeUpdate,
            );
            debug!("[FLOATING] progress follows media element {}", media);
            self.progress_source = Some(media);
            self.sync_progress(cx);
        }
    }

    /// Media element the progress bar currently follows
    pub fn progress_source(&self) -> Option<NodeRef> {
        self.progress_source
    }

    /// The progress bar was dragged; seek to the same fraction
    pub fn on_progress_input<H: Host + ?Sized>(&mut self, cx: &mut PageContext<'_, H>, fraction: f64) {
        let Some(media) = cx.locator.media(&*cx.host) else {
            return;
        };
        let Some(snapshot) = cx.host.media_snapshot(media) else {
            return;
        };
        if snapshot.duration > 0.0 {
            cx.host.seek(media, fraction.clamp(0.0, 1.0) * snapshot.duration);
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    pub fn on_timer<H: Host + ?Sized>(&mut self, cx: &mut PageContext<'_, H>, key: TimerKey) {
        match key {
            TimerKey::FloatingObserverSetup => self.setup_observers(cx),
            TimerKey::FloatingSettings => self.apply(cx),
            TimerKey::NativeModeRecheck => self.recheck_native_mode(cx),
            TimerKey::AspectRetry => {
                if self.state.is_floating() {
                    self.update_aspect_ratio(cx);
                }
            }
            _ => {}
        }
    }

    /// The host finished a navigation and settled
    pub fn on_navigation<H: Host + ?Sized>(&mut self, cx: &mut PageContext<'_, H>) {
        if is_watch_route(&cx.host.pathname()) {
            self.apply(cx);
        } else {
            self.deactivate(cx);
        }
    }

    /// Dock, remove every trace from the page and release observers.
    /// Safe to call repeatedly.
    pub fn cleanup<H: Host + ?Sized>(&mut self, cx: &mut PageContext<'_, H>) {
        self.deactivate(cx);
        self.disconnect_observers(cx);
        cx.registry.dispose_owner(cx.host, Owner::Floating);

        cx.host.remove_style(style::STYLE_ID);
        cx.host.remove_progress_bar();
        if let Some(body) = cx.host.body() {
            cx.host.set_class(body, style::FLOATING_CLASS, false);
            cx.host.set_class(body, style::VERTICAL_CLASS, false);
            for class in style::all_preset_classes() {
                cx.host.set_class(body, &class, false);
            }
        }
        self.preset = None;
        self.native = NativeMode::Inactive;
        self.aspect_attempts = 0;
    }
}
