use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Rating value used when a listing shows no usable rating.
pub const MISSING_RATING: f64 = -1.0;

pub const NO_DESCRIPTION: &str = "No description available";

/// Listing fields pulled from a product page; `None` means the element was absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingDetails {
    pub title: Option<String>,
    pub price: Option<String>,
    pub category: Option<String>,
    pub rating: Option<f64>,
}

impl ListingDetails {
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.title.is_none() {
            missing.push("title");
        }
        if self.price.is_none() {
            missing.push("price");
        }
        if self.category.is_none() {
            missing.push("category");
        }
        if self.rating.is_none() {
            missing.push("rating");
        }
        missing
    }
}

/// One analysis run's worth of product data
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductRecord {
    pub title: String,
    pub price: String,
    pub category: String,
    /// Only dataset products carry one; live listings leave it empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub rating: f64,
    pub url: String,
    pub comments: Vec<String>,
    pub fetched_at: DateTime<Utc>,
}

impl ProductRecord {
    pub fn from_listing(url: String, details: ListingDetails, comments: Vec<String>) -> Self {
        Self {
            title: details.title.unwrap_or_default(),
            price: details.price.unwrap_or_default(),
            category: details.category.unwrap_or_default(),
            description: None,
            rating: details.rating.unwrap_or(MISSING_RATING),
            url,
            comments,
            fetched_at: Utc::now(),
        }
    }

    pub fn has_rating(&self) -> bool {
        self.rating > 0.0
    }

    pub fn comment_count(&self) -> usize {
        self.comments.len()
    }
}
