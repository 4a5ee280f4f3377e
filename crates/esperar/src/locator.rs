//! Locators: declarative descriptions used to find elements.
//!
//! A locator is never bound to a live element. Every wait, read and action
//! re-issues it against the current UI state, so a locator stays valid while
//! the elements it matches are replaced underneath it.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::driver::ElementRef;

/// Selector strategy for locating elements
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "by", content = "value", rename_all = "snake_case")]
pub enum Selector {
    /// CSS selector (e.g., "#tbodyid .hrefch")
    Css(String),
    /// XPath selector
    XPath(String),
    /// Element id attribute
    Id(String),
    /// Anchor whose normalised text equals the value
    LinkText(String),
}

impl Selector {
    /// Create a CSS selector
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    /// Create an XPath selector
    #[must_use]
    pub fn xpath(selector: impl Into<String>) -> Self {
        Self::XPath(selector.into())
    }

    /// Create an id selector
    #[must_use]
    pub fn id(id: impl Into<String>) -> Self {
        Self::Id(id.into())
    }

    /// Create a link text selector
    #[must_use]
    pub fn link_text(text: impl Into<String>) -> Self {
        Self::LinkText(text.into())
    }

    /// JavaScript expression evaluating to an array of all matches in document order
    #[must_use]
    pub fn to_query_all(&self) -> String {
        match self {
            Self::Css(s) => format!("Array.from(document.querySelectorAll({s:?}))"),
            Self::XPath(s) => format!(
                "(() => {{ const r = document.evaluate({s:?}, document, null, \
                 XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null); \
                 const out = []; for (let i = 0; i < r.snapshotLength; i++) {{ out.push(r.snapshotItem(i)); }} \
                 return out; }})()"
            ),
            Self::Id(id) => format!(
                "(() => {{ const el = document.getElementById({id:?}); return el ? [el] : []; }})()"
            ),
            Self::LinkText(t) => format!(
                "Array.from(document.querySelectorAll('a')).filter(el => \
                 el.textContent.replace(/\\s+/g, ' ').trim() === {t:?})"
            ),
        }
    }

    /// Strategy name used in descriptions
    #[must_use]
    pub const fn strategy(&self) -> &'static str {
        match self {
            Self::Css(_) => "css",
            Self::XPath(_) => "xpath",
            Self::Id(_) => "id",
            Self::LinkText(_) => "link text",
        }
    }

    /// Raw selector value
    #[must_use]
    pub fn value(&self) -> &str {
        match self {
            Self::Css(s) | Self::XPath(s) | Self::Id(s) | Self::LinkText(s) => s,
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.strategy(), self.value())
    }
}

/// A query plus an optional human-readable name for logs and errors
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Locator {
    selector: Selector,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

impl Locator {
    /// Create a locator from a selector
    #[must_use]
    pub const fn new(selector: Selector) -> Self {
        Self {
            selector,
            description: None,
        }
    }

    /// CSS locator
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::new(Selector::css(selector))
    }

    /// XPath locator
    #[must_use]
    pub fn xpath(selector: impl Into<String>) -> Self {
        Self::new(Selector::xpath(selector))
    }

    /// Id locator
    #[must_use]
    pub fn id(id: impl Into<String>) -> Self {
        Self::new(Selector::id(id))
    }

    /// Link text locator
    #[must_use]
    pub fn link_text(text: impl Into<String>) -> Self {
        Self::new(Selector::link_text(text))
    }

    /// Attach a description used in logs and timeout errors
    #[must_use]
    pub fn named(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Get the selector
    #[must_use]
    pub const fn selector(&self) -> &Selector {
        &self.selector
    }

    /// Key identifying the query regardless of its description
    #[must_use]
    pub fn key(&self) -> String {
        self.selector.to_string()
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.description {
            Some(desc) => write!(f, "{desc} ({})", self.selector),
            None => write!(f, "{}", self.selector),
        }
    }
}

impl From<Selector> for Locator {
    fn from(selector: Selector) -> Self {
        Self::new(selector)
    }
}

/// What a wait or action operates on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Re-issued on every poll tick
    Locator(Locator),
    /// Previously resolved handle; may go stale
    Element(ElementRef),
}

impl Target {
    /// Description for logs and errors
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Locator(locator) => locator.to_string(),
            Self::Element(element) => format!("element {element}"),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

impl From<Locator> for Target {
    fn from(locator: Locator) -> Self {
        Self::Locator(locator)
    }
}

impl From<&Locator> for Target {
    fn from(locator: &Locator) -> Self {
        Self::Locator(locator.clone())
    }
}

impl From<ElementRef> for Target {
    fn from(element: ElementRef) -> Self {
        Self::Element(element)
    }
}

impl From<&ElementRef> for Target {
    fn from(element: &ElementRef) -> Self {
        Self::Element(element.clone())
    }
}
