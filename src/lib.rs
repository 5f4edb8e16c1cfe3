pub use article::ArticleRecord;
pub use date::DateNormalizer;
pub use error::KioskError;
pub use extract::{DefaultExtractor, Extractor};
pub use kiosk::{Config, ConfigBuilder, Fetcher, HttpFetcher, Kiosk, KioskBuilder};
pub use query::{Filter, QueryState};
pub use storage::ResultStore;

pub mod article;
pub mod date;
mod error;
pub mod extract;
pub mod kiosk;
pub mod query;
pub mod storage;

/// Rexported to implement custom extractors.
pub use select;
