//! Audio Graph Manager
//!
//! Owns the single audio context and its node chain:
//!
//! ```text
//! source → gain → [compressor] → [panner] → destination
//! ```
//!
//! Gain always exists once the graph exists. Compressor and panner are
//! created the first time their feature is enabled and then kept, connected
//! only while the feature is on, so their parameters survive a toggle.

use log::{debug, info, warn};

use super::params;
use crate::context::PageContext;
use crate::error::EnhancerError;
use crate::host::{AudioBackend, AudioParam, ContextState, EventKind, EventTarget, Host, NodeKind, NodeRef};
use crate::locator::Element;
use crate::registry::{Owner, TimerKey};
use crate::schedule::{Debounce, ThrottledDebounce};
use crate::settings::{keys, touches};

/// One-shot retry bookkeeping for media element substitution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Substitution {
    Idle,
    /// A clone replaced the element; a re-bind is scheduled
    Scheduled,
    /// The re-bind ran; no further substitution until the next episode
    Spent,
}

/// What happened when binding the context to the page's media element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindOutcome {
    /// A new source node now feeds the chain
    Connected,
    /// The element was already feeding this context
    AlreadyConnected,
    /// The element was swapped for a clone; a re-bind is scheduled
    Substituted,
    /// Nothing to bind to (no context or no media element)
    Skipped,
    /// The browser refused the element and the one-shot retry is spent
    Failed,
}

pub struct AudioGraph<H: AudioBackend> {
    context: Option<H::Context>,
    gain: Option<H::Node>,
    compressor: Option<H::Node>,
    panner: Option<H::Node>,
    source: Option<H::Node>,
    bound_media: Option<NodeRef>,
    substitution: Substitution,
    structural: Debounce,
    params: ThrottledDebounce,
}

impl<H: Host> AudioGraph<H> {
    pub fn new(config: &crate::config::EnhancerConfig) -> Self {
        Self {
            context: None,
            gain: None,
            compressor: None,
            panner: None,
            source: None,
            bound_media: None,
            substitution: Substitution::Idle,
            structural: Debounce::new(TimerKey::AudioStructural, config.audio_structural_debounce_ms),
            params: ThrottledDebounce::new(
                TimerKey::AudioParams,
                config.audio_param_throttle_ms,
                config.audio_param_debounce_ms,
            ),
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Build the graph if any audio feature is enabled. Safe to call again.
    pub fn init(&mut self, cx: &mut PageContext<'_, H>) {
        if !cx.settings.is_audio_enabled() {
            debug!("[AUDIO] no audio features enabled, skipping init");
            return;
        }

        let reusable = self
            .context
            .as_ref()
            .map(|c| cx.host.context_state(c) != ContextState::Closed)
            .unwrap_or(false);

        if !reusable {
            self.drop_handles();
            match cx.host.create_context() {
                Ok(context) => self.context = Some(context),
                Err(err) => {
                    warn!("[AUDIO] could not create audio context: {}", err);
                    return;
                }
            }
            self.substitution = Substitution::Idle;
            self.register_lifecycle(cx);
            info!("[AUDIO] audio context created");
        }

        self.build_nodes(cx);
        self.connect_audio_nodes(cx);
        self.bind_media(cx);
    }

    /// Keep the context running across tab visibility changes; resume it on
    /// the first user gesture or playback if the autoplay policy suspended it.
    fn register_lifecycle(&mut self, cx: &mut PageContext<'_, H>) {
        cx.registry.listen_once_per_target(
            cx.host,
            Owner::Audio,
            EventTarget::Document,
            EventKind::VisibilityChange,
        );
        cx.registry.unlisten_matching(cx.host, Owner::Audio, EventTarget::Document, EventKind::Click);
        cx.registry
            .listen(cx.host, Owner::Audio, EventTarget::Document, EventKind::Click, true);
        self.listen_for_play(cx);
    }

    fn listen_for_play(&mut self, cx: &mut PageContext<'_, H>) {
        let Some(media) = cx.locator.media(&*cx.host) else {
            return;
        };
        if cx.registry.find(Owner::Audio, EventTarget::Media(media), EventKind::Play).is_none() {
            cx.registry
                .listen(cx.host, Owner::Audio, EventTarget::Media(media), EventKind::Play, true);
        }
    }

    /// Disconnect everything, close the context and release all references.
    /// Safe to call when never initialized.
    pub fn cleanup(&mut self, cx: &mut PageContext<'_, H>) {
        self.structural.cancel(cx.registry);
        self.params.cancel(cx.registry);
        cx.registry.dispose_owner(cx.host, Owner::Audio);

        for node in self.nodes() {
            cx.host.disconnect(&node);
        }

        if let Some(context) = self.context.as_ref() {
            if cx.host.context_state(context) != ContextState::Closed {
                if let Err(err) = cx.host.close(context) {
                    warn!("[AUDIO] closing audio context failed: {}", err);
                }
            }
        }

        let had_source = self.source.is_some();
        let media = self.bound_media;
        self.drop_handles();
        self.substitution = Substitution::Idle;

        // A closed context keeps the element captured and silent. Swap in a
        // clone so playback reaches the speakers directly again.
        if had_source && !cx.settings.is_audio_enabled() {
            if let Some(media) = media.filter(|m| cx.host.is_connected(*m)) {
                self.substitute_media(cx, media);
            }
        }
        debug!("[AUDIO] cleaned up");
    }

    fn drop_handles(&mut self) {
        self.context = None;
        self.gain = None;
        self.compressor = None;
        self.panner = None;
        self.source = None;
        self.bound_media = None;
    }

    fn nodes(&self) -> Vec<H::Node> {
        [&self.source, &self.gain, &self.compressor, &self.panner]
            .into_iter()
            .flatten()
            .cloned()
            .collect()
    }

    // ========================================================================
    // Graph construction
    // ========================================================================

    /// Create any node whose feature is enabled and which does not exist yet
    fn build_nodes(&mut self, cx: &mut PageContext<'_, H>) {
        let Some(context) = self.context.as_ref() else {
            return;
        };

        if self.gain.is_none() {
            match cx.host.create_node(context, NodeKind::Gain) {
                Ok(node) => self.gain = Some(node),
                Err(err) => warn!("[AUDIO] gain node creation failed: {}", err),
            }
        }

        if cx.settings.is_compressor_enabled() && self.compressor.is_none() {
            let kind = NodeKind::Compressor(params::compressor_params(cx.settings));
            match cx.host.create_node(context, kind) {
                Ok(node) => self.compressor = Some(node),
                Err(err) => warn!("[AUDIO] compressor creation failed: {}", err),
            }
        }

        if cx.settings.is_stereo_pan_enabled() && self.panner.is_none() {
            match cx.host.create_node(context, NodeKind::StereoPanner) {
                Ok(node) => self.panner = Some(node),
                Err(err) => warn!("[AUDIO] stereo panner creation failed: {}", err),
            }
        }
    }

    /// Disconnect every node, then connect only enabled features in the
    /// fixed order gain → compressor → panner → destination.
    pub fn connect_audio_nodes(&mut self, cx: &mut PageContext<'_, H>) {
        let (Some(context), Some(gain)) = (self.context.as_ref(), self.gain.as_ref()) else {
            return;
        };

        for node in self.nodes() {
            cx.host.disconnect(&node);
        }

        if let Some(source) = self.source.as_ref() {
            if let Err(err) = cx.host.connect(source, gain) {
                warn!("[AUDIO] source → gain failed: {}", err);
            }
        }

        let mut tail = gain.clone();
        let stages = [
            (cx.settings.is_compressor_enabled(), self.compressor.as_ref(), "compressor"),
            (cx.settings.is_stereo_pan_enabled(), self.panner.as_ref(), "panner"),
        ];
        for (enabled, node, name) in stages {
            let Some(node) = node.filter(|_| enabled) else {
                continue;
            };
            match cx.host.connect(&tail, node) {
                Ok(()) => tail = node.clone(),
                Err(err) => warn!("[AUDIO] connecting {} failed: {}", name, err),
            }
        }

        if let Err(err) = cx.host.connect_destination(context, &tail) {
            warn!("[AUDIO] connecting destination failed: {}", err);
        }
        debug!("[AUDIO] chain rebuilt");

        self.apply_audio_settings(cx);
    }

    /// Write current parameter targets to the live nodes. Idempotent.
    pub fn apply_audio_settings(&mut self, cx: &mut PageContext<'_, H>) {
        let (Some(context), Some(gain)) = (self.context.as_ref(), self.gain.as_ref()) else {
            debug!("[AUDIO] cannot apply settings: graph not built");
            return;
        };
        let targets = params::targets(cx.settings);

        let mut writes = vec![(gain, AudioParam::Gain, targets.gain)];
        if let (Some(ratio), Some(node)) = (targets.ratio, self.compressor.as_ref()) {
            writes.push((node, AudioParam::Ratio, ratio));
        }
        if let (Some(pan), Some(node)) = (targets.pan, self.panner.as_ref()) {
            writes.push((node, AudioParam::Pan, pan));
        }

        for (node, param, value) in writes {
            if let Err(err) = cx.host.set_param(context, node, param, value) {
                warn!("[AUDIO] writing {:?}={} failed: {}", param, value, err);
            }
        }
    }

    // ========================================================================
    // Media binding
    // ========================================================================

    /// Feed the page's current media element into the chain
    pub fn bind_media(&mut self, cx: &mut PageContext<'_, H>) -> BindOutcome {
        let Some(context) = self.context.as_ref() else {
            return BindOutcome::Skipped;
        };
        let Some(media) = cx.locator.media(&*cx.host) else {
            debug!("[AUDIO] no media element yet");
            return BindOutcome::Skipped;
        };
        if self.bound_media == Some(media) {
            return BindOutcome::AlreadyConnected;
        }

        if cx.host.context_state(context) == ContextState::Suspended {
            if let Err(err) = cx.host.resume(context) {
                debug!("[AUDIO] resume deferred: {}", err);
            }
        }

        match cx.host.create_media_source(context, media) {
            Ok(source) => {
                if let Some(old) = self.source.take() {
                    cx.host.disconnect(&old);
                }
                if let Some(gain) = self.gain.as_ref() {
                    if let Err(err) = cx.host.connect(&source, gain) {
                        warn!("[AUDIO] source → gain failed: {}", err);
                    }
                }
                self.source = Some(source);
                self.bound_media = Some(media);
                self.substitution = Substitution::Idle;
                info!("[AUDIO] bound to media element {}", media);
                BindOutcome::Connected
            }
            Err(EnhancerError::SourceAlreadyBound) => {
                debug!("[AUDIO] {} already sourced, treating as connected", media);
                self.bound_media = Some(media);
                BindOutcome::AlreadyConnected
            }
            Err(EnhancerError::InvalidState { reason }) => {
                if self.substitution != Substitution::Idle {
                    warn!("[AUDIO] media element refused again ({}), giving up", reason);
                    self.substitution = Substitution::Spent;
                    return BindOutcome::Failed;
                }
                warn!("[AUDIO] media element refused ({}), substituting a clone", reason);
                if self.substitute_media(cx, media) {
                    self.substitution = Substitution::Scheduled;
                    cx.registry
                        .schedule(TimerKey::AudioRebind, cx.now, cx.config.media_retry_ms);
                    BindOutcome::Substituted
                } else {
                    self.substitution = Substitution::Spent;
                    BindOutcome::Failed
                }
            }
            Err(err) => {
                warn!("[AUDIO] binding media failed: {}", err);
                BindOutcome::Failed
            }
        }
    }

    /// Replace `media` with a clone carrying the same playback state
    fn substitute_media(&mut self, cx: &mut PageContext<'_, H>, media: NodeRef) -> bool {
        let snapshot = cx.host.media_snapshot(media);
        let clone = match cx.host.replace_with_clone(media) {
            Ok(clone) => clone,
            Err(err) => {
                warn!("[AUDIO] media substitution failed: {}", err);
                return false;
            }
        };
        if let Some(snapshot) = snapshot {
            cx.host.restore_media(clone, &snapshot);
        }
        cx.locator.invalidate(Element::Media);
        cx.locator.invalidate(Element::Player);
        cx.registry
            .unlisten_matching(cx.host, Owner::Audio, EventTarget::Media(media), EventKind::Play);
        if self.bound_media == Some(media) {
            self.bound_media = None;
        }
        debug!("[AUDIO] {} replaced by {}", media, clone);
        true
    }

    // ========================================================================
    // Change handling
    // ========================================================================

    /// React to a batch of changed setting keys
    pub fn on_settings_changed(&mut self, cx: &mut PageContext<'_, H>, changed: &[String]) {
        if !touches(changed, &keys::AUDIO) {
            return;
        }

        if !cx.settings.is_audio_enabled() {
            info!("[AUDIO] all audio features disabled, tearing down");
            self.cleanup(cx);
            return;
        }

        if !self.is_live(cx) {
            self.init(cx);
            return;
        }

        if touches(changed, &keys::AUDIO_STRUCTURAL) {
            // The rebuild writes every parameter, so pending parameter
            // writes are folded into it.
            self.params.cancel(cx.registry);
            self.structural.arm(cx.registry, cx.now);
            return;
        }

        if self.structural.is_pending(cx.registry) {
            return;
        }

        if self.params.trigger(cx.registry, cx.now) {
            self.apply_audio_settings(cx);
        }
    }

    /// Handle one of this component's timers
    pub fn on_timer(&mut self, cx: &mut PageContext<'_, H>, key: TimerKey) {
        match key {
            TimerKey::AudioStructural => {
                debug!("[AUDIO] structural change, rebuilding chain");
                self.build_nodes(cx);
                self.connect_audio_nodes(cx);
            }
            TimerKey::AudioParams => {
                if self.params.on_trailing(cx.now) {
                    self.apply_audio_settings(cx);
                }
            }
            TimerKey::AudioRebind => {
                if self.substitution == Substitution::Scheduled {
                    self.substitution = Substitution::Spent;
                    let outcome = self.bind_media(cx);
                    if outcome == BindOutcome::Connected {
                        self.listen_for_play(cx);
                    }
                }
            }
            _ => {}
        }
    }

    /// Periodic check: re-create a context the browser closed while the
    /// feature is still on, and follow a swapped media element.
    pub fn health_check(&mut self, cx: &mut PageContext<'_, H>) {
        if !cx.settings.is_audio_enabled() {
            return;
        }
        if self.is_live(cx) {
            if self.bind_media(cx) == BindOutcome::Connected {
                self.listen_for_play(cx);
            }
            return;
        }
        info!("[AUDIO] audio context missing or closed, re-initializing");
        self.init(cx);
    }

    /// The host navigated; the media element may have been rebuilt
    pub fn on_navigation(&mut self, cx: &mut PageContext<'_, H>) {
        if self.is_live(cx) {
            self.substitution = Substitution::Idle;
            if self.bind_media(cx) == BindOutcome::Connected {
                self.listen_for_play(cx);
            }
        }
    }

    /// Resume a context the autoplay policy suspended. `kind` is the
    /// one-shot event that fired; the host already dropped its listener.
    pub fn on_user_gesture(&mut self, cx: &mut PageContext<'_, H>, kind: EventKind) {
        let target = match kind {
            EventKind::Play => self.bound_media.map(EventTarget::Media),
            _ => Some(EventTarget::Document),
        };
        if let Some(target) = target {
            cx.registry.unlisten_matching(cx.host, Owner::Audio, target, kind);
        }

        let Some(context) = self.context.as_ref() else {
            return;
        };
        if cx.host.context_state(context) == ContextState::Suspended {
            match cx.host.resume(context) {
                Ok(()) => debug!("[AUDIO] context resumed"),
                Err(err) => warn!("[AUDIO] resume failed: {}", err),
            }
        }
    }

    pub fn on_visibility_change(&mut self, hidden: bool) {
        // Suspending here interrupts background playback, so the context is
        // left running either way.
        debug!("[AUDIO] page hidden={}, context left as is", hidden);
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    fn is_live(&self, cx: &PageContext<'_, H>) -> bool {
        self.context
            .as_ref()
            .map(|c| cx.host.context_state(c) != ContextState::Closed)
            .unwrap_or(false)
    }

    pub fn context(&self) -> Option<&H::Context> {
        self.context.as_ref()
    }

    pub fn gain_node(&self) -> Option<&H::Node> {
        self.gain.as_ref()
    }

    pub fn compressor_node(&self) -> Option<&H::Node> {
        self.compressor.as_ref()
    }

    pub fn panner_node(&self) -> Option<&H::Node> {
        self.panner.as_ref()
    }

    pub fn source_node(&self) -> Option<&H::Node> {
        self.source.as_ref()
    }

    pub fn bound_media(&self) -> Option<NodeRef> {
        self.bound_media
    }
}
