//! Audio enhancement: gain boost, dynamics compression and stereo panning
//! routed through a single Web Audio graph per page.

pub mod graph;
pub mod params;

pub use graph::{AudioGraph, BindOutcome};
pub use params::{AudioTargets, MAX_GAIN, MAX_PAN, MAX_RATIO, MIN_PAN, MIN_RATIO};
