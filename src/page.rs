use anyhow::{Context, Result};
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

pub const LISTING_SELECTOR: &str = "[data-marker='item']";

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

pub fn fetch_page(url: &str) -> Result<String> {
    debug!("Fetching search page: {}", url);

    let response = reqwest::blocking::Client::new()
        .get(url)
        .header("User-Agent", USER_AGENT)
        .send()
        .context("Failed to fetch search page")?
        .error_for_status()
        .context("Search page returned an error status")?;

    response.text().context("Failed to read response body")
}

/// Every listing on the page, in page order.
pub fn listing_elements(document: &Html) -> Result<Vec<ElementRef<'_>>> {
    let selector = Selector::parse(LISTING_SELECTOR)
        .map_err(|e| anyhow::anyhow!("Failed to parse listing selector: {:?}", e))?;

    let elements: Vec<ElementRef<'_>> = document.select(&selector).collect();
    debug!("Found {} listings on page", elements.len());
    Ok(elements)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_listings_in_order() {
        let html = Html::parse_document(
            r#"<div data-marker="item" data-item-id="1"></div>
               <div data-marker="item-title"></div>
               <div data-marker="item" data-item-id="2"></div>"#,
        );
        let ids: Vec<_> = listing_elements(&html)
            .unwrap()
            .iter()
            .map(|e| e.value().attr("data-item-id").unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["1", "2"]);
    }
}
