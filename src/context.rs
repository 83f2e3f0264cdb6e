//! Per-call context handed to feature components
//!
//! Components own their state but borrow the shared collaborators (host,
//! registry, locator, settings, config) for the duration of one call.

use crate::config::EnhancerConfig;
use crate::locator::ElementLocator;
use crate::registry::Registry;
use crate::settings::SettingsStore;

pub struct PageContext<'a, H: ?Sized> {
    pub host: &'a mut H,
    pub registry: &'a mut Registry,
    pub locator: &'a mut ElementLocator,
    pub settings: &'a SettingsStore,
    pub config: &'a EnhancerConfig,
    /// Monotonic host time in milliseconds
    pub now: u64,
}
