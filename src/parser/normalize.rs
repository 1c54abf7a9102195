use regex::Regex;
use std::sync::OnceLock;

use crate::error::{Result, ScrapingError};
use crate::parser::product::MISSING_RATING;

fn asin_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"/dp/([A-Z0-9]{10})").expect("static ASIN pattern is valid"))
}

/// Pulls the 10-character ASIN out of a `/dp/` listing URL.
pub fn extract_asin(url: &str) -> Option<&str> {
    asin_pattern()
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Canonical product URL for `url`, dropping tracking segments and query strings.
pub fn cleanse_url(base_url: &str, url: &str) -> Result<String> {
    let asin = extract_asin(url)
        .ok_or_else(|| ScrapingError::ParseError(format!("Invalid URL format: {}", url)))?;
    Ok(product_url(base_url, asin))
}

pub fn product_url(base_url: &str, asin: &str) -> String {
    format!("{}/dp/{}", base_url.trim_end_matches('/'), asin)
}

/// Numeric rating, or [`MISSING_RATING`] when the text is not a number.
pub fn parse_rating(text: &str) -> f64 {
    text.trim()
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|r| r.is_finite())
        .unwrap_or(MISSING_RATING)
}

/// Trims a price block and joins its rendered lines with `.`, e.g. `"$19\n99"` -> `"$19.99"`.
pub fn normalize_price(text: &str) -> String {
    text.trim()
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(".")
}

/// Collapses runs of whitespace into single spaces.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
