use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::{LlmProviderKind, ScrapeConfig};

#[derive(Parser, Debug)]
#[command(name = "review-insight")]
#[command(about = "Scrape Amazon product reviews and ask an LLM how to improve the product", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, global = true, default_value = "config.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in, scrape a product listing with its reviews, then analyze it
    Scrape {
        /// Product URL containing a /dp/<ASIN> segment
        #[arg(short, long)]
        url: String,

        /// Maximum number of review pages to read (defaults to scrape.max_review_pages)
        #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..))]
        max_pages: Option<u32>,

        /// Print the record and analysis as JSON
        #[arg(long)]
        json: bool,
    },

    /// Work with a locally downloaded review dataset
    Offline {
        /// Product metadata JSONL (overrides paths.metadata)
        #[arg(long)]
        metadata: Option<PathBuf>,

        /// Reviews JSONL (overrides paths.reviews)
        #[arg(long)]
        reviews: Option<PathBuf>,

        #[command(subcommand)]
        command: OfflineCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum OfflineCommands {
    /// List products, optionally filtered
    Products {
        /// Case-insensitive title search
        #[arg(short, long)]
        search: Option<String>,

        /// Main category, or "All Categories"
        #[arg(short = 'C', long)]
        category: Option<String>,

        /// List the known categories instead of products
        #[arg(long)]
        list_categories: bool,
    },

    /// Show product details and run the improvement analysis
    Analyze {
        /// Parent ASIN of the product
        #[arg(short, long)]
        asin: String,

        /// Number of lowest-rated reviews sent to the model
        #[arg(short, long, default_value = "5")]
        limit: usize,

        /// LLM backend (overrides llm.provider)
        #[arg(short, long, value_enum)]
        provider: Option<ProviderArg>,
    },
}

/// Page limit from the command line, or the configured one.
pub fn review_page_limit(max_pages: Option<u32>, settings: &ScrapeConfig) -> u32 {
    max_pages.unwrap_or(settings.max_review_pages)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProviderArg {
    Gemini,
    Ollama,
}

impl From<ProviderArg> for LlmProviderKind {
    fn from(arg: ProviderArg) -> Self {
        match arg {
            ProviderArg::Gemini => LlmProviderKind::Gemini,
            ProviderArg::Ollama => LlmProviderKind::Ollama,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scrape_defaults() {
        let cli = Cli::parse_from(["review-insight", "scrape", "--url", "https://www.amazon.com/dp/B000000001"]);
        assert_eq!(cli.config, PathBuf::from("config.toml"));
        match cli.command {
            Commands::Scrape { url, max_pages, json } => {
                assert!(url.ends_with("B000000001"));
                assert_eq!(max_pages, None);
                assert!(!json);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_page_limit_falls_back_to_config() {
        let settings = ScrapeConfig {
            max_review_pages: 8,
            ..ScrapeConfig::default()
        };
        assert_eq!(review_page_limit(None, &settings), 8);
        assert_eq!(review_page_limit(Some(2), &settings), 2);

        let cli = Cli::parse_from(["review-insight", "scrape", "-u", "x", "-m", "3"]);
        match cli.command {
            Commands::Scrape { max_pages, .. } => assert_eq!(review_page_limit(max_pages, &settings), 3),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_zero_pages_rejected() {
        let result = Cli::try_parse_from(["review-insight", "scrape", "--url", "x", "--max-pages", "0"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_offline_analyze_with_provider() {
        let cli = Cli::parse_from([
            "review-insight",
            "offline",
            "--metadata",
            "meta.jsonl",
            "analyze",
            "--asin",
            "B0LAMP0001",
            "--provider",
            "ollama",
            "--config",
            "other.toml",
        ]);
        assert_eq!(cli.config, PathBuf::from("other.toml"));
        match cli.command {
            Commands::Offline {
                metadata,
                reviews,
                command: OfflineCommands::Analyze { asin, limit, provider },
            } => {
                assert_eq!(metadata, Some(PathBuf::from("meta.jsonl")));
                assert_eq!(reviews, None);
                assert_eq!(asin, "B0LAMP0001");
                assert_eq!(limit, 5);
                assert_eq!(provider.map(LlmProviderKind::from), Some(LlmProviderKind::Ollama));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
