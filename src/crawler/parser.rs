//! Content parsers
//!
//! Turns a rendered document into structured content for downstream use. The
//! crawl loop never branches on parser output.

use scraper::{Html, Selector};
use std::collections::HashMap;

/// Number of text characters kept by the default parser
const SUMMARY_CHARS: usize = 100;

/// Structured content extracted from a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuredContent {
    pub title: String,
    pub text: String,
}

/// A named document parser
pub trait ContentParser: Send + Sync {
    fn name(&self) -> &'static str;

    fn parse(&self, html: &str) -> StructuredContent;
}

/// Title plus the first characters of the page text
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultParser;

impl ContentParser for DefaultParser {
    fn name(&self) -> &'static str {
        "default"
    }

    fn parse(&self, html: &str) -> StructuredContent {
        let document = Html::parse_document(html);
        let text: String = document
            .root_element()
            .text()
            .collect::<String>()
            .chars()
            .take(SUMMARY_CHARS)
            .collect();

        StructuredContent {
            title: extract_title(&document),
            text: format!("{}...", text),
        }
    }
}

/// Full page text without scripts or styles, whitespace collapsed
#[derive(Debug, Default, Clone, Copy)]
pub struct CleanTextParser;

impl ContentParser for CleanTextParser {
    fn name(&self) -> &'static str {
        "clean-text"
    }

    fn parse(&self, html: &str) -> StructuredContent {
        let document = Html::parse_document(html);

        let mut words = Vec::new();
        for node in document.root_element().descendants() {
            let Some(text) = node.value().as_text() else {
                continue;
            };
            let hidden = node.ancestors().any(|ancestor| {
                ancestor
                    .value()
                    .as_element()
                    .is_some_and(|element| matches!(element.name(), "script" | "style"))
            });
            if !hidden {
                words.extend(text.split_whitespace().map(str::to_string));
            }
        }

        StructuredContent {
            title: extract_title(&document),
            text: words.join(" "),
        }
    }
}

/// Extracts the page title, or "No title"
fn extract_title(document: &Html) -> String {
    Selector::parse("title")
        .ok()
        .and_then(|selector| {
            document
                .select(&selector)
                .next()
                .map(|element| element.text().collect::<String>().trim().to_string())
        })
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| "No title".to_string())
}

/// Parsers registered at startup, looked up by name
pub struct ParserRegistry {
    parsers: HashMap<&'static str, Box<dyn ContentParser>>,
    fallback: Box<dyn ContentParser>,
}

impl ParserRegistry {
    /// Create a registry with all built-in parsers
    pub fn new() -> Self {
        let mut registry = Self {
            parsers: HashMap::new(),
            fallback: Box::new(DefaultParser),
        };
        registry.register(Box::new(DefaultParser));
        registry.register(Box::new(CleanTextParser));
        registry
    }

    pub fn register(&mut self, parser: Box<dyn ContentParser>) {
        self.parsers.insert(parser.name(), parser);
    }

    /// Looks up a parser; unknown names resolve to the default parser
    pub fn resolve(&self, name: &str) -> &dyn ContentParser {
        match self.parsers.get(name) {
            Some(parser) => parser.as_ref(),
            None => {
                tracing::warn!("Unknown parser '{}', using default", name);
                self.fallback.as_ref()
            }
        }
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.parsers.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}
