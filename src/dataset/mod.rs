//! Offline product catalog backed by JSON-lines exports of listing metadata
//! and customer reviews.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info};

use crate::error::{Result, ScrapingError};
use crate::parser::{product_url, ProductRecord, MISSING_RATING, NO_DESCRIPTION};

pub const ALL_CATEGORIES: &str = "All Categories";
pub const DEFAULT_REVIEW_LIMIT: usize = 5;
const DATASET_BASE_URL: &str = "https://www.amazon.com";
const NO_PRICE: &str = "No price available";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatasetProduct {
    pub parent_asin: String,
    pub title: String,
    #[serde(default)]
    pub main_category: Option<String>,
    #[serde(default)]
    pub categories: Vec<Option<String>>,
    #[serde(default)]
    pub description: Vec<String>,
    /// Exports mix numbers, strings and nulls here.
    #[serde(default)]
    pub price: Option<Value>,
}

impl DatasetProduct {
    /// Description lines joined with spaces, `None` when there are none.
    fn description_text(&self) -> Option<String> {
        if self.description.is_empty() {
            None
        } else {
            Some(self.description.join(" "))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatasetReview {
    pub parent_asin: String,
    pub rating: f64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub helpful_vote: u32,
}

impl DatasetReview {
    fn render(&self, position: usize) -> String {
        format!(
            "Review #{}:\nTitle: {}\nHelpful Votes: {}\nContent: {}",
            position, self.title, self.helpful_vote, self.text
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProductSummary {
    pub title: String,
    pub asin: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductDetails {
    pub title: String,
    pub description: String,
    pub category: String,
    pub reviews_count: usize,
    pub average_rating: Option<f64>,
    pub price: String,
}

pub struct OfflineCatalog {
    products: Vec<DatasetProduct>,
    reviews: Vec<DatasetReview>,
}

fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = File::open(path)
        .map_err(|e| ScrapingError::DatasetError(format!("Failed to open {:?}: {}", path, e)))?;

    let mut rows = Vec::new();
    for (ix, line) in BufReader::new(file).lines().enumerate() {
        let line_no = ix + 1;
        let line = line.map_err(|e| {
            ScrapingError::DatasetError(format!("Failed to read {:?} line {}: {}", path, line_no, e))
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let row = serde_json::from_str(&line).map_err(|e| {
            ScrapingError::DatasetError(format!("Malformed record in {:?} line {}: {}", path, line_no, e))
        })?;
        rows.push(row);
    }
    Ok(rows)
}

fn price_text(price: &Option<Value>) -> String {
    match price {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => NO_PRICE.to_string(),
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

impl OfflineCatalog {
    pub fn load(metadata_path: &Path, reviews_path: &Path) -> Result<Self> {
        let products = read_jsonl(metadata_path)?;
        let reviews = read_jsonl(reviews_path)?;
        let catalog = Self::from_records(products, reviews);
        info!(
            "Data loaded successfully: {} products, {} reviews",
            catalog.products.len(),
            catalog.reviews.len()
        );
        Ok(catalog)
    }

    pub fn from_records(products: Vec<DatasetProduct>, reviews: Vec<DatasetReview>) -> Self {
        Self { products, reviews }
    }

    pub fn available_products(&self) -> Vec<ProductSummary> {
        let mut seen = HashSet::new();
        self.products
            .iter()
            .map(|p| ProductSummary {
                title: p.title.clone(),
                asin: p.parent_asin.clone(),
            })
            .filter(|summary| seen.insert(summary.clone()))
            .collect()
    }

    pub fn categories(&self) -> Vec<String> {
        self.products
            .iter()
            .filter_map(|p| p.main_category.clone())
            .filter(|c| !c.trim().is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn filter_products(&self, search: Option<&str>, category: Option<&str>) -> Vec<ProductSummary> {
        let needle = search.map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty());
        let category = category.filter(|c| *c != ALL_CATEGORIES);

        let mut seen = HashSet::new();
        self.products
            .iter()
            .filter(|p| match &needle {
                Some(needle) => p.title.to_lowercase().contains(needle.as_str()),
                None => true,
            })
            .filter(|p| match category {
                Some(category) => p.main_category.as_deref() == Some(category),
                None => true,
            })
            .map(|p| ProductSummary {
                title: p.title.clone(),
                asin: p.parent_asin.clone(),
            })
            .filter(|summary| seen.insert(summary.clone()))
            .collect()
    }

    fn product(&self, asin: &str) -> Result<&DatasetProduct> {
        self.products
            .iter()
            .find(|p| p.parent_asin == asin)
            .ok_or_else(|| ScrapingError::DatasetError(format!("Unknown product ASIN '{}'", asin)))
    }

    fn reviews_for<'a>(&'a self, asin: &'a str) -> impl Iterator<Item = &'a DatasetReview> + 'a {
        self.reviews.iter().filter(move |r| r.parent_asin == asin)
    }

    pub fn product_details(&self, asin: &str) -> Result<ProductDetails> {
        let product = self.product(asin)?;
        let reviews: Vec<_> = self.reviews_for(asin).collect();

        let description = product.description_text().unwrap_or_else(|| NO_DESCRIPTION.to_string());
        let category = product
            .categories
            .iter()
            .map(|c| c.as_deref().unwrap_or(""))
            .collect::<Vec<_>>()
            .join("/");

        Ok(ProductDetails {
            title: product.title.clone(),
            description,
            category,
            reviews_count: reviews.len(),
            average_rating: mean(reviews.iter().map(|r| r.rating)),
            price: price_text(&product.price),
        })
    }

    /// The product plus its `limit` lowest-rated reviews, shaped for the analyzer.
    pub fn analysis_input(&self, asin: &str, limit: usize) -> Result<ProductRecord> {
        let product = self.product(asin)?;

        let mut reviews: Vec<_> = self.reviews_for(asin).collect();
        reviews.sort_by(|a, b| a.rating.total_cmp(&b.rating));
        reviews.truncate(limit);
        debug!("Selected {} reviews for {}", reviews.len(), asin);

        let comments = reviews
            .iter()
            .enumerate()
            .map(|(ix, review)| review.render(ix + 1))
            .collect();

        Ok(ProductRecord {
            title: product.title.clone(),
            price: price_text(&product.price),
            category: product.main_category.clone().unwrap_or_default(),
            description: product.description_text(),
            rating: mean(reviews.iter().map(|r| r.rating)).unwrap_or(MISSING_RATING),
            url: product_url(DATASET_BASE_URL, asin),
            comments,
            fetched_at: chrono::Utc::now(),
        })
    }
}
