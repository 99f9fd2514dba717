use scraper::{ElementRef, Selector};
use std::fmt;

/// How a sub-element is located inside a listing.
#[derive(Debug, Clone)]
pub enum Locator {
    /// CSS selector, first match in document order.
    Css { source: String, selector: Selector },
    /// Element whose own text equals the marker exactly.
    Text(String),
}

impl Locator {
    pub fn css(source: &str) -> anyhow::Result<Self> {
        let selector = Selector::parse(source)
            .map_err(|e| anyhow::anyhow!("Failed to parse selector '{}': {:?}", source, e))?;
        Ok(Locator::Css {
            source: source.to_string(),
            selector,
        })
    }

    pub fn text(marker: &str) -> Self {
        Locator::Text(marker.to_string())
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css { source, .. } => write!(f, "css '{}'", source),
            Locator::Text(marker) => write!(f, "text '{}'", marker),
        }
    }
}

/// Read-only view of one listing on a page.
///
/// `find_one` returning `None` is an ordinary outcome: callers decide
/// whether a missing element is fatal for the field they are reading.
pub trait ListingElement: Sized {
    fn find_one(&self, locator: &Locator) -> Option<Self>;
    fn attribute(&self, name: &str) -> Option<String>;
    fn text_content(&self) -> String;

    fn exists(&self, locator: &Locator) -> bool {
        self.find_one(locator).is_some()
    }
}

impl<'a> ListingElement for ElementRef<'a> {
    fn find_one(&self, locator: &Locator) -> Option<Self> {
        match locator {
            Locator::Css { selector, .. } => self.select(selector).next(),
            Locator::Text(marker) => self
                .descendants()
                .skip(1)
                .filter_map(ElementRef::wrap)
                .find(|element| {
                    element
                        .children()
                        .filter_map(|child| child.value().as_text())
                        .any(|text| text.trim() == marker.as_str())
                }),
        }
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.value().attr(name).map(|value| value.to_string())
    }

    fn text_content(&self) -> String {
        self.text().collect::<Vec<_>>().join("")
    }
}
