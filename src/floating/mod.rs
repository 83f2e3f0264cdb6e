//! Floating ("mini") player
//!
//! - `state`: docked/floating state, anchor and native-mode guard
//! - `controller`: observer wiring and transitions
//! - `style`: generated stylesheet and body marker classes

pub mod controller;
pub mod state;
pub mod style;

pub use controller::{Blocked, FloatingPlayer};
pub use state::{Anchor, FloatingState, NativeMode, ObserverPair};

use crate::host::Dom;

/// Elements only present on short-form video pages
const SHORTS_SELECTORS: [&str; 4] = ["ytd-shorts", "[is-shorts]", "#shorts-player", "ytd-reel-video-renderer"];

/// Watch and live pages are the only routes with a floatable player
pub fn is_watch_route(pathname: &str) -> bool {
    pathname.contains("/watch") || pathname.contains("/live")
}

/// Short-form video view, detected by route, page elements, body class or
/// the document's page-type attribute
pub fn is_shorts<D: Dom + ?Sized>(dom: &D) -> bool {
    if dom.pathname().contains("/shorts") {
        return true;
    }
    if SHORTS_SELECTORS.iter().any(|sel| dom.query(sel).is_some()) {
        return true;
    }
    if dom.body().map(|b| dom.has_class(b, "shorts")).unwrap_or(false) {
        return true;
    }
    dom.document_attribute("data-current-page-type").as_deref() == Some("shorts")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::mock::MockPage;
    use test_case::test_case;

    #[test_case("/watch", true ; "watch page")]
    #[test_case("/live/abc", true ; "live stream")]
    #[test_case("/results", false ; "search results")]
    #[test_case("/shorts/xyz", false ; "shorts")]
    #[test_case("/", false ; "home")]
    fn test_watch_routes(path: &str, expected: bool) {
        assert_eq!(is_watch_route(path), expected);
    }

    #[test]
    fn test_shorts_detection() {
        let (mut page, _) = MockPage::watch_page();
        assert!(!is_shorts(&page));

        page.set_document_attribute("data-current-page-type", "shorts");
        assert!(is_shorts(&page));

        let (mut page, _) = MockPage::watch_page();
        let body = page.body_node();
        page.create(body, "ytd-reel-video-renderer", None, &[]);
        assert!(is_shorts(&page));

        let (mut page, _) = MockPage::watch_page();
        page.set_pathname("/shorts/abc");
        assert!(is_shorts(&page));
    }
}
