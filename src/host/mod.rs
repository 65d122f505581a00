//! The host page: the third-party workflow list this crate augments
//!
//! Everything the engine knows about the host comes through the
//! [`HostPage`] trait. Selectors are opaque strings interpreted by the
//! implementation (a live document evaluates them as CSS; [`FixturePage`]
//! understands a small CSS subset). Which selectors to try, and in which
//! order, is configuration: see [`probe`].

pub mod fixture;
pub mod probe;
mod wait;

pub use fixture::{FixtureNode, FixturePage};
pub use probe::{first_match, ChipProbe, FilterInputProbe, SidebarProbe, TagProbe};
pub use wait::wait_until;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque handle to an element of the host document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(pub u64);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "el#{}", self.0)
    }
}

/// Layout box in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Current navigation location, split into path and query string.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Location {
    pub path: String,
    /// Query string without the leading `?`; empty when absent
    pub query: String,
}

impl Location {
    /// Parse a path-and-query such as `/home/workflows?tags=1`. A scheme and
    /// host, if present, are ignored.
    pub fn parse(url: &str) -> Self {
        let without_origin = match url.find("://") {
            Some(i) => {
                let rest = &url[i + 3..];
                rest.find('/').map(|j| &rest[j..]).unwrap_or("/")
            }
            None => url,
        };
        let without_fragment = without_origin.split('#').next().unwrap_or_default();
        match without_fragment.split_once('?') {
            Some((path, query)) => Self {
                path: path.to_string(),
                query: query.to_string(),
            },
            None => Self {
                path: without_fragment.to_string(),
                query: String::new(),
            },
        }
    }

    /// True when on `route`, filtered or not.
    pub fn is_on(&self, route: &str) -> bool {
        self.path.trim_end_matches('/') == route.trim_end_matches('/')
    }

    /// True when on `route` with no query string (no active filter).
    pub fn is_unfiltered(&self, route: &str) -> bool {
        self.is_on(route) && self.query.is_empty()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.query.is_empty() {
            write!(f, "{}", self.path)
        } else {
            write!(f, "{}?{}", self.path, self.query)
        }
    }
}

/// Read and act on the host document.
///
/// Reads are side-effect free. Actions (`click`, `set_value`, `submit`,
/// `navigate`) are best effort and report whether the element accepted them.
pub trait HostPage: Send + Sync {
    fn location(&self) -> Location;

    /// The visible viewport, used by layout heuristics.
    fn viewport(&self) -> Rect;

    /// All elements matching `selector` inside `scope` (the whole document
    /// when `None`), in document order.
    fn query_all(&self, scope: Option<ElementId>, selector: &str) -> Vec<ElementId>;

    /// First element matching `selector` inside `scope`.
    fn query(&self, scope: Option<ElementId>, selector: &str) -> Option<ElementId> {
        self.query_all(scope, selector).into_iter().next()
    }

    /// Nearest ancestor-or-self matching `selector`.
    fn closest(&self, element: ElementId, selector: &str) -> Option<ElementId>;

    /// Text content of an element and its descendants.
    fn text(&self, element: ElementId) -> String;

    /// Layout box, if the element is rendered.
    fn bounds(&self, element: ElementId) -> Option<Rect>;

    fn click(&self, element: ElementId) -> bool;

    /// Set the value of an input element.
    fn set_value(&self, element: ElementId, value: &str) -> bool;

    /// Simulate submitting an input (Enter key).
    fn submit(&self, element: ElementId) -> bool;

    /// Navigate to a path on the host origin.
    fn navigate(&self, url: &str);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_parse_splits_query() {
        let loc = Location::parse("/home/workflows?tags=12&sort=x");
        assert_eq!(loc.path, "/home/workflows");
        assert_eq!(loc.query, "tags=12&sort=x");
        assert_eq!(loc.to_string(), "/home/workflows?tags=12&sort=x");
    }

    #[test]
    fn location_parse_strips_origin_and_fragment() {
        let loc = Location::parse("https://n8n.example.com/home/workflows#top");
        assert_eq!(loc.path, "/home/workflows");
        assert!(loc.query.is_empty());

        assert_eq!(Location::parse("https://example.com").path, "/");
    }

    #[test]
    fn unfiltered_requires_route_and_empty_query() {
        let route = "/home/workflows";
        assert!(Location::parse("/home/workflows/").is_unfiltered(route));
        assert!(!Location::parse("/home/workflows?tags=1").is_unfiltered(route));
        assert!(Location::parse("/home/workflows?tags=1").is_on(route));
        assert!(!Location::parse("/workflow/42").is_on(route));
    }
}
