use crate::page;
use anyhow::{Context, Result};
use std::path::PathBuf;

/// Where the search page comes from.
pub trait PageSource {
    fn name(&self) -> String;
    fn fetch_page(&self) -> Result<String>;
}

pub struct HttpPage {
    pub url: String,
}

impl PageSource for HttpPage {
    fn name(&self) -> String {
        self.url.clone()
    }

    fn fetch_page(&self) -> Result<String> {
        page::fetch_page(&self.url)
    }
}

/// A page saved to disk earlier, for offline re-runs.
pub struct SavedPage {
    pub path: PathBuf,
}

impl PageSource for SavedPage {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    fn fetch_page(&self) -> Result<String> {
        std::fs::read_to_string(&self.path)
            .context(format!("Failed to read saved page: {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saved_page_reads_file() {
        let path = std::env::temp_dir().join(format!("avitofinder_saved_{}.html", std::process::id()));
        std::fs::write(&path, "<html></html>").unwrap();
        let source = SavedPage { path: path.clone() };
        assert_eq!(source.fetch_page().unwrap(), "<html></html>");
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn missing_saved_page_is_an_error() {
        let source = SavedPage {
            path: PathBuf::from("/nonexistent/avitofinder/page.html"),
        };
        assert!(source.fetch_page().is_err());
    }
}
