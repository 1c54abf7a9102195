use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::error::ScrapingError;
use crate::parser::normalize::{collapse_whitespace, normalize_price, parse_rating};
use crate::parser::product::ListingDetails;

/// CSS selectors for the retail site's markup.
pub mod selectors {
    pub const SIGN_IN_LINK: &str = "a[data-nav-role='signin']";
    pub const EMAIL_INPUT: &str = "#ap_email";
    pub const CONTINUE_BUTTON: &str = "#continue";
    pub const PASSWORD_INPUT: &str = "#ap_password";
    pub const SIGN_IN_SUBMIT: &str = "#signInSubmit";
    pub const ACCOUNT_MARKER: &str = "#nav-link-accountList-nav-line-1";

    pub const TITLE: &str = "#productTitle";
    pub const PRICE_BLOCK: &str = "#corePrice_feature_div";
    pub const PRICE_OFFSCREEN: &str = "span.a-offscreen";
    pub const CATEGORY: &str = "#wayfinding-breadcrumbs_feature_div li";
    pub const RATING: &str = "#averageCustomerReviews_feature_div span.a-size-base.a-color-base";

    pub const SEE_MORE_REVIEWS_TEXT: &str = "See more reviews";
    pub const REVIEW_TEXT: &str = "span[class*='review-text']";
    pub const NEXT_PAGE: &str = "ul.a-pagination li.a-last a";

    pub const CAPTCHA: &str = "form[action*='validateCaptcha'], #captchacharacters, #auth-captcha-image";
}

/// Anti-automation interstitial shown instead of the requested page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageChallenge {
    Captcha,
    RobotCheck,
}

impl std::fmt::Display for PageChallenge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PageChallenge::Captcha => write!(f, "captcha challenge"),
            PageChallenge::RobotCheck => write!(f, "robot check"),
        }
    }
}

/// html parser for product listings and review pages
pub struct ProductPageParser {
    title_selector: Selector,
    price_block_selector: Selector,
    price_offscreen_selector: Selector,
    category_selector: Selector,
    rating_selector: Selector,
    review_text_selector: Selector,
    account_marker_selector: Selector,
    captcha_selector: Selector,
}

fn compile(name: &str, css: &str) -> Result<Selector, ScrapingError> {
    Selector::parse(css)
        .map_err(|e| ScrapingError::ParseError(format!("Invalid {} selector: {}", name, e)))
}

impl ProductPageParser {
    pub fn new() -> Result<Self, ScrapingError> {
        Ok(Self {
            title_selector: compile("title", selectors::TITLE)?,
            price_block_selector: compile("price", selectors::PRICE_BLOCK)?,
            price_offscreen_selector: compile("price offscreen", selectors::PRICE_OFFSCREEN)?,
            category_selector: compile("category", selectors::CATEGORY)?,
            rating_selector: compile("rating", selectors::RATING)?,
            review_text_selector: compile("review text", selectors::REVIEW_TEXT)?,
            account_marker_selector: compile("account marker", selectors::ACCOUNT_MARKER)?,
            captcha_selector: compile("captcha", selectors::CAPTCHA)?,
        })
    }

    /// Pulls listing fields; each one is extracted independently so one
    /// missing element does not hide the others.
    pub fn parse_listing(&self, html: &str) -> ListingDetails {
        let document = Html::parse_document(html);

        let title = document
            .select(&self.title_selector)
            .next()
            .map(element_text)
            .filter(|t| !t.is_empty());

        let price = document
            .select(&self.price_block_selector)
            .next()
            .and_then(|block| self.extract_price(block));

        let category = document
            .select(&self.category_selector)
            .next()
            .map(element_text)
            .filter(|t| !t.is_empty());

        let rating = document
            .select(&self.rating_selector)
            .next()
            .map(|el| parse_rating(&element_text(el)));

        let details = ListingDetails {
            title,
            price,
            category,
            rating,
        };
        debug!("Parsed listing details: {:?}", details);
        details
    }

    fn extract_price(&self, block: ElementRef) -> Option<String> {
        if let Some(offscreen) = block.select(&self.price_offscreen_selector).next() {
            let text = element_text(offscreen);
            if !text.is_empty() {
                return Some(text);
            }
        }
        let raw = block.text().collect::<String>();
        let price = normalize_price(&raw);
        (!price.is_empty()).then_some(price)
    }

    /// Review bodies on the current page, in document order.
    pub fn parse_reviews(&self, html: &str) -> Vec<String> {
        let document = Html::parse_document(html);
        let reviews: Vec<String> = document
            .select(&self.review_text_selector)
            .map(element_text)
            .filter(|t| !t.is_empty())
            .collect();
        debug!("Parsed {} reviews from page", reviews.len());
        reviews
    }

    pub fn is_signed_in(&self, html: &str) -> bool {
        Html::parse_document(html)
            .select(&self.account_marker_selector)
            .next()
            .is_some()
    }

    pub fn detect_challenge(&self, html: &str) -> Option<PageChallenge> {
        let document = Html::parse_document(html);
        if document.select(&self.captcha_selector).next().is_some() {
            return Some(PageChallenge::Captcha);
        }
        let lowered = html.to_lowercase();
        if lowered.contains("to discuss automated access to amazon data")
            || lowered.contains("sorry, we just need to make sure you're not a robot")
        {
            return Some(PageChallenge::RobotCheck);
        }
        None
    }
}

impl Default for ProductPageParser {
    fn default() -> Self {
        Self::new().expect("Failed to create default ProductPageParser")
    }
}

fn element_text(element: ElementRef) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}
