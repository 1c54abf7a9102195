//! Plain-text rendering for the terminal.

use std::fmt::Write;

use crate::dataset::{ProductDetails, ProductSummary};
use crate::parser::ProductRecord;

pub const MAX_URL_CHARS: usize = 100;
const RULE_WIDTH: usize = 60;

pub fn truncate_url(url: &str) -> String {
    if url.chars().count() <= MAX_URL_CHARS {
        return url.to_string();
    }
    let head: String = url.chars().take(MAX_URL_CHARS - 3).collect();
    format!("{}...", head)
}

/// `4.5/5`, or `?/5` when the rating is unknown.
pub fn format_rating(rating: f64) -> String {
    if rating > 0.0 {
        format!("{}/5", rating)
    } else {
        "?/5".to_string()
    }
}

fn rule(out: &mut String, ch: char) {
    let _ = writeln!(out, "{}", ch.to_string().repeat(RULE_WIDTH));
}

fn analysis_section(out: &mut String, analysis: Option<&str>) {
    if let Some(analysis) = analysis {
        out.push('\n');
        let _ = writeln!(out, "Improvement Analysis");
        rule(out, '-');
        let _ = writeln!(out, "{}", analysis.trim_end());
    }
}

pub fn render_product(record: &ProductRecord, analysis: Option<&str>) -> String {
    let mut out = String::new();
    rule(&mut out, '=');
    let _ = writeln!(out, "{}", record.title);
    rule(&mut out, '=');
    let category = if record.category.is_empty() { "-" } else { &record.category };
    let _ = writeln!(out, "Category: {}", category);
    let _ = writeln!(out, "URL:      {}", truncate_url(&record.url));
    let _ = writeln!(out, "Price:    {}", record.price);
    let _ = writeln!(out, "Rating:   {}", format_rating(record.rating));
    let _ = writeln!(out, "Comments: {} fetched", record.comment_count());
    analysis_section(&mut out, analysis);
    out
}

pub fn render_details(asin: &str, details: &ProductDetails, analysis: Option<&str>) -> String {
    let mut out = String::new();
    rule(&mut out, '=');
    let _ = writeln!(out, "{}", details.title);
    rule(&mut out, '=');
    let _ = writeln!(out, "ASIN:        {}", asin);
    let _ = writeln!(out, "Category:    {}", details.category);
    let _ = writeln!(out, "Price:       {}", details.price);
    let rating = details
        .average_rating
        .map(|r| format!("{:.2}/5", r))
        .unwrap_or_else(|| "?/5".to_string());
    let _ = writeln!(out, "Rating:      {}", rating);
    let _ = writeln!(out, "Reviews:     {}", details.reviews_count);
    let _ = writeln!(out, "Description: {}", details.description);
    analysis_section(&mut out, analysis);
    out
}

pub fn render_product_list(products: &[ProductSummary]) -> String {
    if products.is_empty() {
        return "No products match the current filters.\n".to_string();
    }
    let mut out = String::new();
    for product in products {
        let _ = writeln!(out, "{}  {}", product.asin, product.title);
    }
    let _ = writeln!(out, "{} products", products.len());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(rating: f64, url: &str) -> ProductRecord {
        ProductRecord {
            title: "Trail Backpack".to_string(),
            price: "$49.00".to_string(),
            category: "Outdoors".to_string(),
            description: None,
            rating,
            url: url.to_string(),
            comments: vec!["Zip broke".to_string(), "Roomy".to_string()],
            fetched_at: Utc::now(),
        }
    }

    #[test]
    fn test_truncate_url() {
        let short = "https://www.amazon.com/dp/B000000001";
        assert_eq!(truncate_url(short), short);

        let exact = "a".repeat(100);
        assert_eq!(truncate_url(&exact), exact);

        let long = "b".repeat(150);
        let truncated = truncate_url(&long);
        assert_eq!(truncated.chars().count(), 100);
        assert!(truncated.ends_with("..."));
        assert_eq!(&truncated[..97], &long[..97]);
    }

    #[test]
    fn test_format_rating() {
        assert_eq!(format_rating(4.5), "4.5/5");
        assert_eq!(format_rating(0.0), "?/5");
        assert_eq!(format_rating(-1.0), "?/5");
    }

    #[test]
    fn test_render_product_without_analysis() {
        let text = render_product(&record(-1.0, "https://www.amazon.com/dp/B000000001"), None);
        assert!(text.contains("Trail Backpack"));
        assert!(text.contains("Rating:   ?/5"));
        assert!(text.contains("Comments: 2 fetched"));
        assert!(!text.contains("Improvement Analysis"));
    }

    #[test]
    fn test_render_product_with_analysis() {
        let text = render_product(&record(4.2, "https://www.amazon.com/dp/B000000001"), Some("1. Better zip\n"));
        assert!(text.contains("Rating:   4.2/5"));
        assert!(text.contains("Improvement Analysis"));
        assert!(text.trim_end().ends_with("1. Better zip"));
    }

    #[test]
    fn test_render_details() {
        let details = ProductDetails {
            title: "Desk Lamp".to_string(),
            description: "Bright".to_string(),
            category: "Home/Lighting".to_string(),
            reviews_count: 3,
            average_rating: Some(2.0 / 3.0),
            price: "No price available".to_string(),
        };
        let text = render_details("B0LAMP0001", &details, None);
        assert!(text.contains("Rating:      0.67/5"));
        assert!(text.contains("Reviews:     3"));
        assert!(text.contains("Home/Lighting"));
    }

    #[test]
    fn test_render_empty_list() {
        assert_eq!(render_product_list(&[]), "No products match the current filters.\n");
        let list = render_product_list(&[ProductSummary {
            title: "Clip Lamp".to_string(),
            asin: "B0LAMP0002".to_string(),
        }]);
        assert!(list.starts_with("B0LAMP0002  Clip Lamp"));
        assert!(list.ends_with("1 products\n"));
    }
}
