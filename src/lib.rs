pub mod analyzer;
pub mod browser;
pub mod cli;
pub mod config;
pub mod dataset;
pub mod error;
pub mod logging;
pub mod parser;
pub mod report;
pub mod scraper;
pub mod templates;

pub use analyzer::ProductAnalyzer;
pub use browser::BrowserSession;
pub use config::Config;
pub use dataset::OfflineCatalog;
pub use error::{Result, ScrapingError};
pub use parser::ProductRecord;
pub use scraper::AmazonScraper;
pub use templates::PromptTemplates;
