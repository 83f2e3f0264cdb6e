//! Element locator
//!
//! Resolves and memoizes the two host elements everything else depends on:
//! the player and its media element. Entries are dropped on navigation, on
//! explicit invalidation, or when the cached node has left the document.

use log::debug;

use crate::host::{Dom, NodeRef};

/// Selector fallbacks for the player, most specific first
pub const PLAYER_SELECTORS: [&str; 3] = ["#movie_player", ".html5-video-player", "ytd-player#ytd-player"];

/// Selector fallbacks for the media element, most specific first
pub const MEDIA_SELECTORS: [&str; 3] = ["#movie_player video", ".html5-video-player video", "video"];

/// Element kinds the locator caches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Element {
    Player,
    Media,
}

impl Element {
    fn selectors(self) -> &'static [&'static str] {
        match self {
            Element::Player => &PLAYER_SELECTORS,
            Element::Media => &MEDIA_SELECTORS,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Element::Player => "player",
            Element::Media => "media",
        }
    }
}

/// Cached, non-owning references to host elements
#[derive(Debug, Default)]
pub struct ElementLocator {
    player: Option<NodeRef>,
    media: Option<NodeRef>,
}

impl ElementLocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn player<D: Dom + ?Sized>(&mut self, dom: &D) -> Option<NodeRef> {
        self.resolve(dom, Element::Player)
    }

    pub fn media<D: Dom + ?Sized>(&mut self, dom: &D) -> Option<NodeRef> {
        self.resolve(dom, Element::Media)
    }

    /// Resolve an element, reusing the cached reference while it is still attached
    pub fn resolve<D: Dom + ?Sized>(&mut self, dom: &D, element: Element) -> Option<NodeRef> {
        let slot = match element {
            Element::Player => &mut self.player,
            Element::Media => &mut self.media,
        };
        if let Some(node) = *slot {
            if dom.is_connected(node) {
                return Some(node);
            }
            debug!("[LOCATOR] cached {} {} detached, re-resolving", element.name(), node);
            *slot = None;
        }
        let found = element.selectors().iter().find_map(|sel| dom.query(sel));
        *slot = found;
        found
    }

    /// Forget one cached element
    pub fn invalidate(&mut self, element: Element) {
        match element {
            Element::Player => self.player = None,
            Element::Media => self.media = None,
        }
    }

    /// Forget everything; called on navigation
    pub fn clear(&mut self) {
        self.player = None;
        self.media = None;
    }

    pub fn cached(&self, element: Element) -> Option<NodeRef> {
        match element {
            Element::Player => self.player,
            Element::Media => self.media,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::mock::MockPage;

    #[test]
    fn test_resolves_with_fallback_selectors() {
        let mut page = MockPage::new();
        let body = page.body_node();
        let player = page.create(body, "div", Some("movie_player"), &["html5-video-player"]);
        let video = page.create(player, "video", None, &[]);

        let mut locator = ElementLocator::new();
        assert_eq!(locator.player(&page), Some(player));
        assert_eq!(locator.media(&page), Some(video));
    }

    #[test]
    fn test_detached_cache_entry_is_re_resolved() {
        let mut page = MockPage::new();
        let body = page.body_node();
        let player = page.create(body, "div", Some("movie_player"), &[]);
        let first = page.create(player, "video", None, &[]);

        let mut locator = ElementLocator::new();
        assert_eq!(locator.media(&page), Some(first));

        page.detach(first);
        let second = page.create(player, "video", None, &[]);
        assert_eq!(locator.media(&page), Some(second));
    }

    #[test]
    fn test_clear_forgets_everything() {
        let mut page = MockPage::new();
        let body = page.body_node();
        page.create(body, "div", Some("movie_player"), &[]);

        let mut locator = ElementLocator::new();
        locator.player(&page);
        assert!(locator.cached(Element::Player).is_some());
        locator.clear();
        assert!(locator.cached(Element::Player).is_none());
    }
}
