//! Markup-agnostic element lookup.
//!
//! Field extraction asks for elements by role, tag, accessibility label or
//! attribute; only [`HtmlLocator`] knows how that maps onto a DOM snapshot.

use std::collections::HashMap;

use scraper::{ElementRef, Html};

/// ARIA roles the extractor asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Heading,
    Button,
    Link,
    Feed,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Heading => "heading",
            Role::Button => "button",
            Role::Link => "link",
            Role::Feed => "feed",
        }
    }

    /// Tags that carry this role without an explicit `role` attribute.
    fn implicit_tags(self) -> &'static [&'static str] {
        match self {
            Role::Heading => &["h1", "h2", "h3", "h4", "h5", "h6"],
            Role::Button => &["button"],
            Role::Link => &["a"],
            Role::Feed => &[],
        }
    }
}

/// How an attribute or label value is compared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextMatch {
    Exact(String),
    Contains(String),
}

impl TextMatch {
    pub fn exact(value: impl Into<String>) -> Self {
        TextMatch::Exact(value.into())
    }

    pub fn contains(value: impl Into<String>) -> Self {
        TextMatch::Contains(value.into())
    }

    pub fn matches(&self, candidate: &str) -> bool {
        match self {
            TextMatch::Exact(v) => candidate == v,
            TextMatch::Contains(v) => candidate.contains(v.as_str()),
        }
    }

    /// CSS attribute selector matching `name` the same way.
    pub fn css_attribute(&self, name: &str) -> String {
        let (op, value) = match self {
            TextMatch::Exact(v) => ("=", v),
            TextMatch::Contains(v) => ("*=", v),
        };
        format!(r#"[{name}{op}"{}"]"#, value.replace('\\', "\\\\").replace('"', "\\\""))
    }
}

/// An element found by a [`Locator`], detached from the document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Located {
    text: String,
    attrs: HashMap<String, String>,
}

impl Located {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attrs: HashMap::new(),
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    /// Rendered text with whitespace runs collapsed.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }
}

pub trait Locator {
    fn find_by_role(&self, role: Role) -> Option<Located>;

    /// First element with the given tag name.
    fn find_by_tag(&self, tag: &str) -> Option<Located>;

    /// First element whose `aria-label` matches.
    fn find_by_label(&self, label: &TextMatch) -> Option<Located>;

    fn find_by_attribute(&self, name: &str, value: &TextMatch) -> Option<Located>;

    /// Every matching element, in document order.
    fn find_all_by_attribute(&self, name: &str, value: &TextMatch) -> Vec<Located>;

    /// Narrow the search to the subtree of the first matching element.
    fn within(&self, name: &str, value: &TextMatch) -> Option<Self>
    where
        Self: Sized;
}

/// [`Locator`] over a parsed HTML snapshot.
#[derive(Clone, Copy)]
pub struct HtmlLocator<'a> {
    root: ElementRef<'a>,
}

impl<'a> HtmlLocator<'a> {
    pub fn new(document: &'a Html) -> Self {
        Self {
            root: document.root_element(),
        }
    }

    fn elements(&self) -> impl Iterator<Item = ElementRef<'a>> + 'a {
        self.root.descendants().filter_map(ElementRef::wrap)
    }

    fn first_with_attr(&self, name: &str, value: &TextMatch) -> Option<ElementRef<'a>> {
        self.elements()
            .find(|el| el.value().attr(name).is_some_and(|v| value.matches(v)))
    }
}

fn has_role(el: &ElementRef<'_>, role: Role) -> bool {
    let element = el.value();
    if element.attr("role") == Some(role.as_str()) {
        return true;
    }
    if !role.implicit_tags().contains(&element.name()) {
        return false;
    }
    // An anchor is only a link when it points somewhere.
    role != Role::Link || element.attr("href").is_some()
}

fn detach(el: ElementRef<'_>) -> Located {
    let text = el.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" ");
    let attrs = el
        .value()
        .attrs()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Located { text, attrs }
}

impl Locator for HtmlLocator<'_> {
    fn find_by_role(&self, role: Role) -> Option<Located> {
        self.elements().find(|el| has_role(el, role)).map(detach)
    }

    fn find_by_tag(&self, tag: &str) -> Option<Located> {
        self.elements()
            .find(|el| el.value().name().eq_ignore_ascii_case(tag))
            .map(detach)
    }

    fn find_by_label(&self, label: &TextMatch) -> Option<Located> {
        self.first_with_attr("aria-label", label).map(detach)
    }

    fn find_by_attribute(&self, name: &str, value: &TextMatch) -> Option<Located> {
        self.first_with_attr(name, value).map(detach)
    }

    fn find_all_by_attribute(&self, name: &str, value: &TextMatch) -> Vec<Located> {
        self.elements()
            .filter(|el| el.value().attr(name).is_some_and(|v| value.matches(v)))
            .map(detach)
            .collect()
    }

    fn within(&self, name: &str, value: &TextMatch) -> Option<Self> {
        self.first_with_attr(name, value).map(|root| Self { root })
    }
}
