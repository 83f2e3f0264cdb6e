//! Feature coordinator
//!
//! Owns the host, the settings store and every component, routes
//! [`PageEvent`]s and due timers to the component that owns them, and
//! tears everything down with one call.

use log::{debug, info};

use crate::audio::AudioGraph;
use crate::config::EnhancerConfig;
use crate::context::PageContext;
use crate::error::Result;
use crate::floating::{is_watch_route, FloatingPlayer};
use crate::host::{EventKind, EventTarget, Host, PageEvent};
use crate::locator::ElementLocator;
use crate::registry::{Owner, Registry, TimerKey};
use crate::settings::SettingsStore;

pub struct Enhancer<H: Host> {
    host: H,
    settings: SettingsStore,
    config: EnhancerConfig,
    locator: ElementLocator,
    registry: Registry,
    floating: FloatingPlayer,
    audio: AudioGraph<H>,
    started: bool,
}

/// Borrow the shared collaborators as a [`PageContext`] alongside the
/// components, so a component method can take both.
macro_rules! split {
    ($self:ident, $now:expr) => {{
        let Enhancer {
            host,
            settings,
            config,
            locator,
            registry,
            floating,
            audio,
            ..
        } = $self;
        let cx = PageContext {
            host,
            registry,
            locator,
            settings: &*settings,
            config: &*config,
            now: $now,
        };
        (cx, floating, audio)
    }};
}

impl<H: Host> Enhancer<H> {
    pub fn new(host: H, settings: SettingsStore, config: EnhancerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            floating: FloatingPlayer::new(&config),
            audio: AudioGraph::new(&config),
            host,
            settings,
            config,
            locator: ElementLocator::new(),
            registry: Registry::new(),
            started: false,
        })
    }

    /// Coordinator with default settings and timings
    pub fn with_defaults(host: H) -> Self {
        let config = EnhancerConfig::default();
        Self {
            floating: FloatingPlayer::new(&config),
            audio: AudioGraph::new(&config),
            host,
            settings: SettingsStore::new(),
            config,
            locator: ElementLocator::new(),
            registry: Registry::new(),
            started: false,
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Subscribe to host navigation, bring up enabled features and start
    /// the periodic health check.
    pub fn start(&mut self, now: u64) {
        if self.started {
            debug!("[ENHANCER] already started");
            return;
        }
        self.started = true;
        info!(
            "[ENHANCER] starting (audio={}, floating={})",
            self.settings.is_audio_enabled(),
            self.settings.is_floating_player_enabled()
        );

        self.registry.listen_once_per_target(
            &mut self.host,
            Owner::Coordinator,
            EventTarget::Document,
            EventKind::NavigateFinish,
        );

        let initial_settle = self.config.initial_settle_ms;
        let health_period = self.config.health_check_ms;
        let (mut cx, _, audio) = split!(self, now);
        audio.init(&mut cx);
        if is_watch_route(&cx.host.pathname()) {
            cx.registry.schedule(TimerKey::NavigationSettle, now, initial_settle);
        }
        cx.registry.schedule_interval(TimerKey::HealthCheck, now, health_period);
    }

    /// Release every listener, timer, observer and the audio context
    pub fn shutdown(&mut self, now: u64) {
        let (mut cx, floating, audio) = split!(self, now);
        floating.cleanup(&mut cx);
        audio.cleanup(&mut cx);
        cx.registry.dispose_all(cx.host);
        cx.locator.clear();
        self.started = false;
        info!("[ENHANCER] shut down");
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Route one host signal to its component
    pub fn handle(&mut self, event: PageEvent, now: u64) {
        if let PageEvent::Settings(message) = &event {
            let changed = self.settings.apply_message(message);
            if changed.is_empty() {
                return;
            }
            debug!("[ENHANCER] settings changed: {:?}", changed);
            let (mut cx, floating, audio) = split!(self, now);
            floating.on_settings_changed(&mut cx, &changed);
            audio.on_settings_changed(&mut cx, &changed);
            floating.follow_media(&mut cx);
            return;
        }

        if event == PageEvent::NavigateFinish {
            self.on_navigate_finish(now);
            return;
        }

        let (mut cx, floating, audio) = split!(self, now);
        match event {
            PageEvent::Intersection { observer, ratio } => floating.on_intersection(&mut cx, observer, ratio),
            PageEvent::PlayerClassChanged { observer } => floating.on_player_class_changed(&mut cx, observer),
            PageEvent::PictureInPicture { active } => floating.on_picture_in_picture(&mut cx, active),
            PageEvent::TimeUpdate => floating.on_time_update(&mut cx),
            PageEvent::ProgressInput { fraction } => floating.on_progress_input(&mut cx, fraction),
            PageEvent::MediaPlay => audio.on_user_gesture(&mut cx, EventKind::Play),
            PageEvent::DocumentClick => audio.on_user_gesture(&mut cx, EventKind::Click),
            PageEvent::VisibilityChange { hidden } => audio.on_visibility_change(hidden),
            PageEvent::NavigateFinish | PageEvent::Settings(_) => {}
        }
    }

    /// Fire every timer due at `now`
    pub fn tick(&mut self, now: u64) {
        for key in self.registry.take_due(now) {
            let (mut cx, floating, audio) = split!(self, now);
            match key.owner() {
                Owner::Floating => floating.on_timer(&mut cx, key),
                Owner::Audio => {
                    audio.on_timer(&mut cx, key);
                    floating.follow_media(&mut cx);
                }
                Owner::Coordinator => match key {
                    TimerKey::NavigationSettle => {
                        if cx.settings.is_floating_player_enabled() || floating.is_floating() {
                            floating.on_navigation(&mut cx);
                        }
                        audio.on_navigation(&mut cx);
                        floating.follow_media(&mut cx);
                    }
                    TimerKey::HealthCheck => {
                        if is_watch_route(&cx.host.pathname()) {
                            audio.health_check(&mut cx);
                            floating.follow_media(&mut cx);
                        }
                    }
                    _ => {}
                },
            }
        }
    }

    /// Earliest time `tick` has work to do
    pub fn next_deadline(&self) -> Option<u64> {
        self.registry.next_deadline()
    }

    /// The host replaced its page content; cached elements are stale
    fn on_navigate_finish(&mut self, now: u64) {
        debug!("[ENHANCER] navigation finished");
        self.locator.clear();
        self.registry
            .schedule(TimerKey::NavigationSettle, now, self.config.navigation_settle_ms);
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn config(&self) -> &EnhancerConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn floating(&self) -> &FloatingPlayer {
        &self.floating
    }

    pub fn audio(&self) -> &AudioGraph<H> {
        &self.audio
    }

    pub fn is_started(&self) -> bool {
        self.started
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::mock::MockPage;
    use crate::settings::SettingsMessage;
    use serde_json::json;

    fn setting(key: &str, value: serde_json::Value) -> PageEvent {
        PageEvent::Settings(SettingsMessage::SettingChanged {
            key: key.to_string(),
            value,
        })
    }

    #[test]
    fn test_start_listens_for_navigation() {
        let (page, _) = MockPage::watch_page();
        let mut enhancer = Enhancer::with_defaults(page);
        enhancer.start(0);
        assert!(enhancer
            .host()
            .is_listening(EventTarget::Document, EventKind::NavigateFinish));
        assert_eq!(enhancer.next_deadline(), Some(2000));
    }

    #[test]
    fn test_settings_message_starts_audio() {
        let (page, _) = MockPage::watch_page();
        let mut enhancer = Enhancer::with_defaults(page);
        enhancer.start(0);
        assert!(enhancer.audio().context().is_none());

        enhancer.handle(setting("enableCompressor", json!(true)), 10);
        assert!(enhancer.audio().context().is_some());
        assert!(enhancer.audio().compressor_node().is_some());
    }

    #[test]
    fn test_shutdown_releases_everything() {
        let (page, _) = MockPage::watch_page();
        let mut settings = SettingsStore::new();
        settings.set("popupPlayer", json!(true));
        settings.set("enableStereoPan", json!(true));
        let mut enhancer = Enhancer::new(page, settings, EnhancerConfig::default()).unwrap();
        enhancer.start(0);
        enhancer.tick(2000);
        enhancer.tick(3000);
        assert!(enhancer.host().observer_count() > 0);

        enhancer.shutdown(3000);
        assert_eq!(enhancer.host().listener_count(), 0);
        assert_eq!(enhancer.host().observer_count(), 0);
        assert_eq!(enhancer.next_deadline(), None);
        assert!(enhancer.audio().context().is_none());
    }
}
