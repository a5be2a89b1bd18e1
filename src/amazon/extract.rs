//! Ordered extraction strategies for individual page fields.
//!
//! Amazon markup drifts between layouts and markets, so every field is read
//! through a [`Cascade`]: a list of [`Extractor`]s tried in order until one
//! returns a non-empty value.

use regex_lite::Regex;
use scraper::{ElementRef, Selector};
use tracing::trace;

/// Strategy that reads one value out of a page fragment.
pub trait Extractor: Send + Sync {
    /// Returns the extracted value, if this strategy found one.
    fn extract(&self, scope: ElementRef) -> Option<String>;

    /// Returns a short description used in trace logs.
    fn describe(&self) -> String;
}

/// Text content of the first element matching a selector.
pub struct CssText {
    selector: Selector,
    source: &'static str,
}

impl CssText {
    pub fn new(css: &'static str) -> Option<Self> {
        Selector::parse(css).ok().map(|selector| Self { selector, source: css })
    }
}

impl Extractor for CssText {
    fn extract(&self, scope: ElementRef) -> Option<String> {
        scope.select(&self.selector).find_map(|e| non_empty(&squash(&e.text().collect::<String>())))
    }

    fn describe(&self) -> String {
        format!("text({})", self.source)
    }
}

/// Attribute value of the first matching element that carries it.
pub struct CssAttr {
    selector: Selector,
    attr: &'static str,
    source: &'static str,
}

impl CssAttr {
    pub fn new(css: &'static str, attr: &'static str) -> Option<Self> {
        Selector::parse(css).ok().map(|selector| Self { selector, attr, source: css })
    }
}

impl Extractor for CssAttr {
    fn extract(&self, scope: ElementRef) -> Option<String> {
        scope
            .select(&self.selector)
            .find_map(|e| e.value().attr(self.attr).and_then(|v| non_empty(v.trim())))
    }

    fn describe(&self) -> String {
        format!("attr({} @{})", self.source, self.attr)
    }
}

/// Attribute on the scope element itself (e.g. `data-asin` on a result card).
pub struct OwnAttr(pub &'static str);

impl Extractor for OwnAttr {
    fn extract(&self, scope: ElementRef) -> Option<String> {
        scope.value().attr(self.0).and_then(|v| non_empty(v.trim()))
    }

    fn describe(&self) -> String {
        format!("own-attr({})", self.0)
    }
}

/// First capture group of a regex run over the fragment's raw HTML.
pub struct RawPattern {
    regex: Regex,
}

impl RawPattern {
    pub fn new(pattern: &str) -> Option<Self> {
        Regex::new(pattern).ok().map(|regex| Self { regex })
    }
}

impl Extractor for RawPattern {
    fn extract(&self, scope: ElementRef) -> Option<String> {
        let html = scope.html();
        self.regex.captures(&html).and_then(|c| c.get(1)).and_then(|m| non_empty(m.as_str()))
    }

    fn describe(&self) -> String {
        format!("regex({})", self.regex.as_str())
    }
}

/// Ordered fallbacks for a single field.
pub struct Cascade {
    field: &'static str,
    strategies: Vec<Box<dyn Extractor>>,
    accept: Option<fn(&str) -> bool>,
}

impl Cascade {
    pub fn new(field: &'static str) -> Self {
        Self { field, strategies: Vec::new(), accept: None }
    }

    /// Only values passing `check` count as hits; others fall through to
    /// the next strategy.
    pub fn accepting(mut self, check: fn(&str) -> bool) -> Self {
        self.accept = Some(check);
        self
    }

    /// Appends a strategy. Strategies that failed to build are ignored.
    pub fn then(mut self, strategy: Option<impl Extractor + 'static>) -> Self {
        match strategy {
            Some(s) => self.strategies.push(Box::new(s)),
            None => trace!("{}: dropped strategy that failed to compile", self.field),
        }
        self
    }

    /// Runs strategies in order and returns the first hit.
    pub fn run(&self, scope: ElementRef) -> Option<String> {
        self.strategies.iter().find_map(|s| {
            let hit = s.extract(scope)?;
            if let Some(check) = self.accept {
                if !check(&hit) {
                    trace!("{}: rejected {:?} from {}", self.field, hit, s.describe());
                    return None;
                }
            }
            trace!("{} <- {}", self.field, s.describe());
            Some(hit)
        })
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

/// Collapses runs of whitespace into single spaces.
pub fn squash(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}
