//! Debounce and throttle on top of the registry's virtual timers
//!
//! Shared by the audio parameter path and the floating player settings path.

use crate::registry::{Registry, TimerKey};

/// Coalesce a burst of triggers into one firing `window` after the last one
#[derive(Debug, Clone, Copy)]
pub struct Debounce {
    key: TimerKey,
    window: u64,
}

impl Debounce {
    pub fn new(key: TimerKey, window_ms: u64) -> Self {
        Self {
            key,
            window: window_ms,
        }
    }

    /// (Re)start the window
    pub fn arm(&self, registry: &mut Registry, now: u64) {
        registry.schedule(self.key, now, self.window);
    }

    pub fn cancel(&self, registry: &mut Registry) {
        registry.cancel(self.key);
    }

    pub fn is_pending(&self, registry: &Registry) -> bool {
        registry.is_pending(self.key)
    }
}

/// Enforce a minimum spacing between applications
#[derive(Debug, Clone, Copy)]
pub struct Throttle {
    spacing: u64,
    last: Option<u64>,
}

impl Throttle {
    pub fn new(spacing_ms: u64) -> Self {
        Self {
            spacing: spacing_ms,
            last: None,
        }
    }

    pub fn ready(&self, now: u64) -> bool {
        match self.last {
            None => true,
            Some(last) => now.saturating_sub(last) >= self.spacing,
        }
    }

    pub fn mark(&mut self, now: u64) {
        self.last = Some(now);
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

/// Leading write when the throttle allows it, plus one trailing write that
/// captures the final value of a burst.
#[derive(Debug, Clone, Copy)]
pub struct ThrottledDebounce {
    debounce: Debounce,
    throttle: Throttle,
    dirty: bool,
}

impl ThrottledDebounce {
    pub fn new(key: TimerKey, throttle_ms: u64, debounce_ms: u64) -> Self {
        Self {
            debounce: Debounce::new(key, debounce_ms),
            throttle: Throttle::new(throttle_ms),
            dirty: false,
        }
    }

    /// Record a change. Returns true if the caller should write now.
    pub fn trigger(&mut self, registry: &mut Registry, now: u64) -> bool {
        self.debounce.arm(registry, now);
        if self.throttle.ready(now) {
            self.throttle.mark(now);
            self.dirty = false;
            true
        } else {
            self.dirty = true;
            false
        }
    }

    /// The trailing timer fired. Returns true if a write is still owed.
    pub fn on_trailing(&mut self, now: u64) -> bool {
        if !self.dirty {
            return false;
        }
        self.dirty = false;
        self.throttle.mark(now);
        true
    }

    /// Forget any owed write; the next trigger writes immediately
    pub fn cancel(&mut self, registry: &mut Registry) {
        self.debounce.cancel(registry);
        self.throttle.reset();
        self.dirty = false;
    }
}
