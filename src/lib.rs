pub mod currency;
pub mod element;
pub mod error;
pub mod export;
pub mod extractor;
pub mod models;
pub mod page;
pub mod parser;
pub mod pipeline;
pub mod reconciler;
pub mod sources;
pub mod store;
pub mod tui;
