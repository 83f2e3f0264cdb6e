//! Shared test harness
//!
//! Owns a mock watch page plus the collaborators a component needs, and
//! routes due timers to the component that owns them.

#![allow(dead_code)]

use serde_json::Value;

use tube_enhancer::audio::AudioGraph;
use tube_enhancer::context::PageContext;
use tube_enhancer::floating::FloatingPlayer;
use tube_enhancer::host::mock::{MockPage, WatchPage};
use tube_enhancer::host::ObserverId;
use tube_enhancer::locator::ElementLocator;
use tube_enhancer::registry::{Owner, Registry};
use tube_enhancer::{EnhancerConfig, SettingsStore};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub struct Harness {
    pub page: MockPage,
    pub handles: WatchPage,
    pub registry: Registry,
    pub locator: ElementLocator,
    pub settings: SettingsStore,
    pub config: EnhancerConfig,
    pub audio: AudioGraph<MockPage>,
    pub floating: FloatingPlayer,
    pub now: u64,
}

impl Harness {
    /// A watch page with the given settings applied over the defaults
    pub fn new(settings: &[(&str, Value)]) -> Self {
        init_logging();
        let (page, handles) = MockPage::watch_page();
        let config = EnhancerConfig::default();
        let mut store = SettingsStore::new();
        for (key, value) in settings {
            store.set(*key, value.clone());
        }
        Self {
            page,
            handles,
            registry: Registry::new(),
            locator: ElementLocator::new(),
            settings: store,
            audio: AudioGraph::new(&config),
            floating: FloatingPlayer::new(&config),
            config,
            now: 0,
        }
    }

    pub fn audio<R>(&mut self, f: impl FnOnce(&mut AudioGraph<MockPage>, &mut PageContext<'_, MockPage>) -> R) -> R {
        let mut cx = PageContext {
            host: &mut self.page,
            registry: &mut self.registry,
            locator: &mut self.locator,
            settings: &self.settings,
            config: &self.config,
            now: self.now,
        };
        f(&mut self.audio, &mut cx)
    }

    pub fn floating<R>(&mut self, f: impl FnOnce(&mut FloatingPlayer, &mut PageContext<'_, MockPage>) -> R) -> R {
        let mut cx = PageContext {
            host: &mut self.page,
            registry: &mut self.registry,
            locator: &mut self.locator,
            settings: &self.settings,
            config: &self.config,
            now: self.now,
        };
        f(&mut self.floating, &mut cx)
    }

    /// Write one setting and notify both components
    pub fn set(&mut self, key: &str, value: Value) {
        self.settings.set(key, value);
        let changed = vec![key.to_string()];
        self.floating(|f, cx| f.on_settings_changed(cx, &changed));
        self.audio(|g, cx| g.on_settings_changed(cx, &changed));
        self.floating(|f, cx| f.follow_media(cx));
    }

    /// Move the clock forward, firing due timers along the way
    pub fn advance(&mut self, ms: u64) {
        let target = self.now + ms;
        while let Some(deadline) = self.registry.next_deadline().filter(|d| *d <= target) {
            self.now = self.now.max(deadline);
            for key in self.registry.take_due(self.now) {
                match key.owner() {
                    Owner::Audio => {
                        self.audio(|g, cx| g.on_timer(cx, key));
                        self.floating(|f, cx| f.follow_media(cx));
                    }
                    Owner::Floating => self.floating(|f, cx| f.on_timer(cx, key)),
                    Owner::Coordinator => {}
                }
            }
        }
        self.now = target;
    }

    pub fn intersection_observer(&self) -> ObserverId {
        self.floating
            .observers()
            .map(|pair| pair.intersection)
            .expect("observers installed")
    }

    /// Enable the floating player and install its observers
    pub fn arm_floating(&mut self) {
        self.floating(|f, cx| f.apply(cx));
        self.advance(self.config.observer_setup_ms);
        assert!(self.floating.observers().is_some());
    }

    /// Scroll past the container and report a ratio
    pub fn scroll_away(&mut self, ratio: f64) {
        self.page.set_scroll_y(900.0);
        let observer = self.intersection_observer();
        self.floating(|f, cx| f.on_intersection(cx, observer, ratio));
    }

    pub fn chain(&self) -> Vec<&'static str> {
        match self.audio.source_node() {
            Some(source) => self.page.chain_from(*source),
            None => Vec::new(),
        }
    }
}
