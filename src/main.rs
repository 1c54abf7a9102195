use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use std::path::PathBuf;
use tracing::{error, info, warn};

use review_insight::cli::{review_page_limit, Cli, Commands, OfflineCommands};
use review_insight::config::{Config, ConfigManager, FileConfigManager, LlmProviderKind};
use review_insight::dataset::OfflineCatalog;
use review_insight::{logging, report, AmazonScraper, ProductAnalyzer, PromptTemplates, ScrapingError};

/// Prints a short warning for the user; the full error is already in the log.
fn warn_user(message: &str) {
    eprintln!("warning: {}", message);
}

fn report_error(context: &str, err: &ScrapingError) {
    error!("{}: {}", context, err);
    warn_user(err.user_message());
    if let Some(hint) = err.recovery_strategy().hint() {
        warn_user(hint);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config_manager = FileConfigManager::new(cli.config.clone());
    let config = config_manager
        .load_config()
        .await
        .with_context(|| format!("Failed to load configuration from {:?}", cli.config))?;

    let _log_guard = logging::setup_logging(&config.logging)?;
    info!("Starting review-insight");

    match cli.command {
        Commands::Scrape { url, max_pages, json } => {
            let max_pages = review_page_limit(max_pages, &config.scrape);
            run_scrape(&config, &url, max_pages, json).await
        }
        Commands::Offline {
            metadata,
            reviews,
            command,
        } => run_offline(config, metadata, reviews, command).await,
    }
}

fn build_analyzer(config: &Config) -> Result<Option<ProductAnalyzer>> {
    if config.llm.provider == LlmProviderKind::Gemini && !config.credentials.has_api_key() {
        warn!("GOOGLE_API_KEY not set, skipping analysis");
        warn_user("Google API Key is missing.");
        return Ok(None);
    }
    let templates = PromptTemplates::load(&config.paths.templates)?;
    let analyzer = ProductAnalyzer::from_config(templates, &config.llm, &config.credentials)?;
    info!("Analyzing tools ready to use ({})", analyzer.provider_name());
    Ok(Some(analyzer))
}

async fn run_scrape(config: &Config, url: &str, max_pages: u32, as_json: bool) -> Result<()> {
    if url.trim().is_empty() {
        warn_user("Please enter a product URL.");
        return Ok(());
    }
    if !config.credentials.has_login() {
        warn_user("Amazon credentials are incomplete.");
        return Ok(());
    }
    let analyzer = build_analyzer(config)?;

    let mut scraper = match AmazonScraper::launch(config).await {
        Ok(scraper) => scraper,
        Err(e) => {
            report_error("Failed to launch browser", &e);
            return Ok(());
        }
    };
    if let Err(e) = scraper.open_connection().await {
        report_error("Failed to connect to Amazon", &e);
        return Ok(());
    }
    info!("Amazon connected successfully!");

    let fetched = scraper.fetch_product_data(url, max_pages).await;
    if let Err(e) = scraper.close_connection().await {
        warn!("Failed to close browser: {}", e);
    }
    let record = match fetched {
        Ok(record) => record,
        Err(e) => {
            report_error("Failed to fetch product data", &e);
            return Ok(());
        }
    };
    info!("Product data loaded successfully!");

    let analysis = match analyzer {
        Some(analyzer) => match analyzer.analyze_product(&record).await {
            Ok(text) => Some(text),
            Err(e) => {
                report_error("Analysis failed", &e);
                None
            }
        },
        None => None,
    };

    if as_json {
        let output = json!({ "product": record, "analysis": analysis });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print!("{}", report::render_product(&record, analysis.as_deref()));
    }
    Ok(())
}

async fn run_offline(
    mut config: Config,
    metadata: Option<PathBuf>,
    reviews: Option<PathBuf>,
    command: OfflineCommands,
) -> Result<()> {
    let metadata = metadata
        .or_else(|| config.paths.metadata.clone())
        .context("No metadata dataset given (use --metadata or paths.metadata)")?;
    let reviews = reviews
        .or_else(|| config.paths.reviews.clone())
        .context("No reviews dataset given (use --reviews or paths.reviews)")?;

    let catalog = match OfflineCatalog::load(&metadata, &reviews) {
        Ok(catalog) => catalog,
        Err(e) => {
            report_error("Failed to load offline dataset", &e);
            return Ok(());
        }
    };

    match command {
        OfflineCommands::Products {
            search,
            category,
            list_categories,
        } => {
            if list_categories {
                for category in catalog.categories() {
                    println!("{}", category);
                }
            } else {
                let products = catalog.filter_products(search.as_deref(), category.as_deref());
                print!("{}", report::render_product_list(&products));
            }
        }
        OfflineCommands::Analyze { asin, limit, provider } => {
            if let Some(provider) = provider {
                config.llm.provider = provider.into();
            }
            let details = match catalog.product_details(&asin) {
                Ok(details) => details,
                Err(e) => {
                    report_error("Failed to read product details", &e);
                    return Ok(());
                }
            };
            let record = catalog.analysis_input(&asin, limit)?;

            let analysis = match build_analyzer(&config)? {
                Some(analyzer) => match analyzer.analyze_product(&record).await {
                    Ok(text) => Some(text),
                    Err(e) => {
                        report_error("Analysis failed", &e);
                        None
                    }
                },
                None => None,
            };
            print!("{}", report::render_details(&asin, &details, analysis.as_deref()));
        }
    }
    Ok(())
}
