//! Event and timer registry
//!
//! Every listener and every timer in the crate goes through one
//! [`Registry`], so a full teardown is a single [`Registry::dispose_all`]
//! call. Timers live in virtual time: the host passes monotonic
//! milliseconds in and arms one real timer for [`Registry::next_deadline`].

use std::collections::BTreeMap;

use log::{debug, warn};

use crate::host::{Dom, EventKind, EventTarget, ListenerId};

/// Component that owns a listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Owner {
    Coordinator,
    Floating,
    Audio,
}

/// Every deferred callback in the crate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimerKey {
    /// Host navigation settled; re-read the page
    NavigationSettle,
    /// Floating player styling applied; install observers
    FloatingObserverSetup,
    /// Debounced floating player settings application
    FloatingSettings,
    /// Native miniplayer/PiP exited; confirm it stays cleared
    NativeModeRecheck,
    /// Media reported zero natural size; try the aspect ratio again
    AspectRetry,
    /// Debounced audio node rebuild
    AudioStructural,
    /// Trailing audio parameter write
    AudioParams,
    /// One-shot re-bind after a media element substitution
    AudioRebind,
    /// Periodic audio context health check
    HealthCheck,
}

impl TimerKey {
    pub fn owner(self) -> Owner {
        match self {
            TimerKey::NavigationSettle | TimerKey::HealthCheck => Owner::Coordinator,
            TimerKey::FloatingObserverSetup
            | TimerKey::FloatingSettings
            | TimerKey::NativeModeRecheck
            | TimerKey::AspectRetry => Owner::Floating,
            TimerKey::AudioStructural | TimerKey::AudioParams | TimerKey::AudioRebind => Owner::Audio,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Timer {
    deadline: u64,
    period: Option<u64>,
}

#[derive(Debug, Clone, Copy)]
struct Listener {
    owner: Owner,
    target: EventTarget,
    kind: EventKind,
}

/// Central registry of listeners and timers
#[derive(Debug, Default)]
pub struct Registry {
    timers: BTreeMap<TimerKey, Timer>,
    listeners: BTreeMap<ListenerId, Listener>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Timers
    // ========================================================================

    /// Schedule `key` to fire `delay_ms` after `now`. A pending timer with
    /// the same key is replaced, which makes repeated calls a debounce.
    pub fn schedule(&mut self, key: TimerKey, now: u64, delay_ms: u64) {
        self.timers.insert(
            key,
            Timer {
                deadline: now.saturating_add(delay_ms),
                period: None,
            },
        );
    }

    /// Schedule `key` to fire every `period_ms`
    pub fn schedule_interval(&mut self, key: TimerKey, now: u64, period_ms: u64) {
        let period = period_ms.max(1);
        self.timers.insert(
            key,
            Timer {
                deadline: now.saturating_add(period),
                period: Some(period),
            },
        );
    }

    pub fn cancel(&mut self, key: TimerKey) -> bool {
        self.timers.remove(&key).is_some()
    }

    pub fn is_pending(&self, key: TimerKey) -> bool {
        self.timers.contains_key(&key)
    }

    /// Earliest pending deadline, if any
    pub fn next_deadline(&self) -> Option<u64> {
        self.timers.values().map(|t| t.deadline).min()
    }

    /// Remove and return every timer due at `now`, in deadline order.
    /// Intervals are re-armed relative to `now`.
    pub fn take_due(&mut self, now: u64) -> Vec<TimerKey> {
        let mut due: Vec<(u64, TimerKey)> = self
            .timers
            .iter()
            .filter(|(_, t)| t.deadline <= now)
            .map(|(k, t)| (t.deadline, *k))
            .collect();
        due.sort();
        for (_, key) in &due {
            let rearm = self.timers.get(key).and_then(|t| t.period);
            match rearm {
                Some(period) => {
                    self.timers.insert(
                        *key,
                        Timer {
                            deadline: now.saturating_add(period),
                            period: Some(period),
                        },
                    );
                }
                None => {
                    self.timers.remove(key);
                }
            }
        }
        due.into_iter().map(|(_, key)| key).collect()
    }

    // ========================================================================
    // Listeners
    // ========================================================================

    /// Add a listener through the host and record it
    pub fn listen<D: Dom + ?Sized>(
        &mut self,
        dom: &mut D,
        owner: Owner,
        target: EventTarget,
        kind: EventKind,
        once: bool,
    ) -> Option<ListenerId> {
        match dom.add_listener(target, kind, once) {
            Ok(id) => {
                self.listeners.insert(id, Listener { owner, target, kind });
                Some(id)
            }
            Err(err) => {
                warn!("[REGISTRY] could not listen for {}: {}", kind.dom_name(), err);
                None
            }
        }
    }

    /// Add a listener unless the same owner already listens for it
    pub fn listen_once_per_target<D: Dom + ?Sized>(
        &mut self,
        dom: &mut D,
        owner: Owner,
        target: EventTarget,
        kind: EventKind,
    ) -> Option<ListenerId> {
        if let Some(id) = self.find(owner, target, kind) {
            return Some(id);
        }
        self.listen(dom, owner, target, kind, false)
    }

    pub fn find(&self, owner: Owner, target: EventTarget, kind: EventKind) -> Option<ListenerId> {
        self.listeners
            .iter()
            .find(|(_, l)| l.owner == owner && l.target == target && l.kind == kind)
            .map(|(id, _)| *id)
    }

    pub fn unlisten<D: Dom + ?Sized>(&mut self, dom: &mut D, id: ListenerId) {
        if self.listeners.remove(&id).is_some() {
            dom.remove_listener(id);
        }
    }

    /// Remove every listener matching owner, target and kind
    pub fn unlisten_matching<D: Dom + ?Sized>(
        &mut self,
        dom: &mut D,
        owner: Owner,
        target: EventTarget,
        kind: EventKind,
    ) {
        while let Some(id) = self.find(owner, target, kind) {
            self.unlisten(dom, id);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn timer_count(&self) -> usize {
        self.timers.len()
    }

    /// Release one component's listeners and timers
    pub fn dispose_owner<D: Dom + ?Sized>(&mut self, dom: &mut D, owner: Owner) {
        let ids: Vec<ListenerId> = self
            .listeners
            .iter()
            .filter(|(_, l)| l.owner == owner)
            .map(|(id, _)| *id)
            .collect();
        for id in ids {
            self.unlisten(dom, id);
        }
        self.timers.retain(|key, _| key.owner() != owner);
    }

    /// Remove every listener and cancel every timer
    pub fn dispose_all<D: Dom + ?Sized>(&mut self, dom: &mut D) {
        debug!(
            "[REGISTRY] disposing {} listeners and {} timers",
            self.listeners.len(),
            self.timers.len()
        );
        for id in std::mem::take(&mut self.listeners).into_keys() {
            dom.remove_listener(id);
        }
        self.timers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::mock::MockPage;

    #[test]
    fn test_schedule_replaces_pending_timer() {
        let mut registry = Registry::new();
        registry.schedule(TimerKey::AudioParams, 0, 150);
        registry.schedule(TimerKey::AudioParams, 100, 150);
        assert!(registry.take_due(150).is_empty());
        assert_eq!(registry.take_due(250), vec![TimerKey::AudioParams]);
        assert!(!registry.is_pending(TimerKey::AudioParams));
    }

    #[test]
    fn test_due_timers_come_out_in_deadline_order() {
        let mut registry = Registry::new();
        registry.schedule(TimerKey::HealthCheck, 0, 300);
        registry.schedule(TimerKey::AudioStructural, 0, 100);
        registry.schedule(TimerKey::NavigationSettle, 0, 200);
        assert_eq!(
            registry.take_due(1000),
            vec![
                TimerKey::AudioStructural,
                TimerKey::NavigationSettle,
                TimerKey::HealthCheck
            ]
        );
    }

    #[test]
    fn test_interval_rearms() {
        let mut registry = Registry::new();
        registry.schedule_interval(TimerKey::HealthCheck, 0, 1000);
        assert_eq!(registry.take_due(1000), vec![TimerKey::HealthCheck]);
        assert_eq!(registry.next_deadline(), Some(2000));
    }

    #[test]
    fn test_dispose_all_removes_listeners_from_host() {
        let mut page = MockPage::new();
        let mut registry = Registry::new();
        registry.listen(&mut page, Owner::Audio, EventTarget::Document, EventKind::Click, true);
        registry.listen(&mut page, Owner::Floating, EventTarget::Window, EventKind::Input, false);
        registry.schedule(TimerKey::AspectRetry, 0, 10);
        assert_eq!(page.listener_count(), 2);

        registry.dispose_all(&mut page);
        assert_eq!(page.listener_count(), 0);
        assert_eq!(registry.listener_count(), 0);
        assert_eq!(registry.next_deadline(), None);
    }

    #[test]
    fn test_dispose_owner_keeps_other_components() {
        let mut page = MockPage::new();
        let mut registry = Registry::new();
        registry.listen(&mut page, Owner::Audio, EventTarget::Document, EventKind::Click, true);
        registry.listen(&mut page, Owner::Coordinator, EventTarget::Document, EventKind::NavigateFinish, false);
        registry.schedule(TimerKey::AudioParams, 0, 10);
        registry.schedule(TimerKey::HealthCheck, 0, 10);

        registry.dispose_owner(&mut page, Owner::Audio);
        assert_eq!(page.listener_count(), 1);
        assert!(registry.is_pending(TimerKey::HealthCheck));
        assert!(!registry.is_pending(TimerKey::AudioParams));
    }
}
