//! Floating player state machine values

use crate::host::{NodeRef, ObserverId};

/// Where the player node lived before it was moved under the body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    pub parent: NodeRef,
    pub next_sibling: Option<NodeRef>,
}

/// Docked or floating; the anchor exists only while floating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FloatingState {
    #[default]
    Docked,
    Floating { player: NodeRef, anchor: Anchor },
}

impl FloatingState {
    pub fn is_floating(&self) -> bool {
        matches!(self, FloatingState::Floating { .. })
    }

    pub fn anchor(&self) -> Option<Anchor> {
        match self {
            FloatingState::Floating { anchor, .. } => Some(*anchor),
            FloatingState::Docked => None,
        }
    }
}

/// Whether the host's own miniplayer or system Picture-in-Picture competes
/// for the player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NativeMode {
    #[default]
    Inactive,
    Active,
    /// The native mode reported exit; waiting out the grace period
    Clearing,
}

impl NativeMode {
    /// Activation is allowed only once the native mode is confirmed cleared
    pub fn blocks_activation(self) -> bool {
        self != NativeMode::Inactive
    }
}

/// Observers installed for one player container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObserverPair {
    pub container: NodeRef,
    pub intersection: ObserverId,
    pub player: Option<NodeRef>,
    pub class_changes: Option<ObserverId>,
}

impl ObserverPair {
    pub fn ids(&self) -> impl Iterator<Item = ObserverId> {
        std::iter::once(self.intersection).chain(self.class_changes)
    }
}
