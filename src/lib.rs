//! Tube Enhancer - floating player and audio shaping for a hosted video page
//!
//! Two features augment the page's player:
//! 1. Floating player - the player follows the reader as a pinned overlay
//!    once its container scrolls out of view, and returns to its exact
//!    place afterwards
//! 2. Audio shaping - gain boost, compression and stereo panning through a
//!    single Web Audio chain bound to the page's media element
//!
//! # Architecture
//!
//! The core is single-threaded and driven entirely by its host:
//! - [`host::Dom`] and [`host::AudioBackend`] are the only ways to touch the page
//! - every asynchronous signal arrives as a [`host::PageEvent`]
//! - timers are virtual; the host calls [`Enhancer::tick`] at
//!   [`Enhancer::next_deadline`]
//!
//! [`host::mock::MockPage`] drives the core in tests; `web` (wasm32 only)
//! drives it in the browser.

pub mod audio;
pub mod config;
pub mod context;
pub mod enhancer;
pub mod error;
pub mod floating;
pub mod host;
pub mod locator;
pub mod registry;
pub mod schedule;
pub mod settings;

#[cfg(target_arch = "wasm32")]
pub mod web;

pub use config::EnhancerConfig;
pub use enhancer::Enhancer;
pub use error::{EnhancerError, ErrorCategory, Result};
pub use host::{Host, PageEvent};
pub use settings::{SettingsMessage, SettingsStore};
