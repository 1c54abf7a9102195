use async_trait::async_trait;
use scraper::{Html, Selector};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::browser::PageDriver;
use crate::config::{Credentials, ScrapeConfig};
use crate::error::{Result, ScrapingError};
use crate::parser::{selectors, PageChallenge, MISSING_RATING};
use crate::scraper::{AmazonScraper, Jitter, SessionState, StopReason};

const HOME: &str = "https://www.amazon.com";
const PRODUCT_URL: &str = "https://www.amazon.com/dp/B0TESTCASE";

const HOME_HTML: &str = r#"<a data-nav-role="signin" href="/ap/signin">Hello, sign in</a>"#;
const INTERSTITIAL_HTML: &str =
    r#"<p>Click the button below to continue shopping</p><a data-nav-role="signin" href="/ap/signin">Sign in</a>"#;
const EMAIL_HTML: &str = r#"<input id="ap_email"><input id="continue" type="submit">"#;
const PASSWORD_HTML: &str = r#"<input id="ap_password"><input id="signInSubmit" type="submit">"#;
const SIGNED_IN_HTML: &str = r#"<span id="nav-link-accountList-nav-line-1">Hello, Ada</span>"#;
const CAPTCHA_HTML: &str =
    r#"<form action="/errors/validateCaptcha"><input id="captchacharacters"></form>"#;

const LISTING_HTML: &str = r#"
<div id="wayfinding-breadcrumbs_feature_div"><ul><li><a>Cell Phones &amp; Accessories</a></li></ul></div>
<span id="productTitle"> Rugged Armor Case </span>
<div id="corePrice_feature_div"><span class="a-offscreen">$15.99</span></div>
<div id="averageCustomerReviews_feature_div"><span class="a-size-base a-color-base">4.4</span></div>
<span class="review-text">Top review on the listing</span>
<a href="/product-reviews/B0TESTCASE">See more reviews</a>
"#;

fn review_page(page: u32, has_next: bool) -> String {
    let next = if has_next {
        r#"<li class="a-last"><a href="?pageNumber=next">Next page</a></li>"#
    } else {
        r#"<li class="a-disabled a-last">Next page</li>"#
    };
    format!(
        r#"<span class="a-size-base review-text">Page {page} review A</span>
           <span class="a-size-base review-text">Page {page} review B</span>
           <ul class="a-pagination">{next}</ul>"#
    )
}

#[derive(Default)]
struct FakeState {
    current: String,
    routes: HashMap<String, String>,
    transitions: HashMap<String, VecDeque<String>>,
    visited: Vec<String>,
    filled: Vec<(String, String)>,
    clicks: Vec<String>,
    content_calls: usize,
    fail_content_after: Option<usize>,
    shutdowns: usize,
}

/// In-memory browser: selectors are evaluated against the current HTML and
/// clicks advance to the next queued page for that selector.
#[derive(Default)]
struct FakeDriver {
    state: Mutex<FakeState>,
}

impl FakeDriver {
    fn new() -> Self {
        Self::default()
    }

    fn route(self, url: &str, html: &str) -> Self {
        self.state.lock().unwrap().routes.insert(url.to_string(), html.to_string());
        self
    }

    fn on_click(self, key: &str, pages: Vec<String>) -> Self {
        self.state
            .lock()
            .unwrap()
            .transitions
            .entry(key.to_string())
            .or_default()
            .extend(pages);
        self
    }

    fn fail_content_after(self, calls: usize) -> Self {
        self.state.lock().unwrap().fail_content_after = Some(calls);
        self
    }

    fn matches(html: &str, css: &str) -> bool {
        let selector = Selector::parse(css).expect("test selector");
        Html::parse_document(html).select(&selector).next().is_some()
    }

    fn advance(state: &mut FakeState, key: &str) {
        if let Some(next) = state.transitions.get_mut(key).and_then(|q| q.pop_front()) {
            state.current = next;
        }
    }

    fn filled(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().filled.clone()
    }

    fn clicks_on(&self, css: &str) -> usize {
        self.state.lock().unwrap().clicks.iter().filter(|c| c.as_str() == css).count()
    }

    fn shutdowns(&self) -> usize {
        self.state.lock().unwrap().shutdowns
    }

    fn visited(&self) -> Vec<String> {
        self.state.lock().unwrap().visited.clone()
    }
}

#[async_trait]
impl PageDriver for FakeDriver {
    async fn goto(&self, url: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let html = state
            .routes
            .get(url)
            .cloned()
            .ok_or_else(|| ScrapingError::BrowserError(format!("net::ERR_NAME_NOT_RESOLVED at {}", url)))?;
        state.current = html;
        state.visited.push(url.to_string());
        Ok(())
    }

    async fn content(&self) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        state.content_calls += 1;
        if let Some(limit) = state.fail_content_after {
            if state.content_calls > limit {
                return Err(ScrapingError::BrowserError("target closed".to_string()));
            }
        }
        Ok(state.current.clone())
    }

    async fn click(&self, selector: &str) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        if !Self::matches(&state.current, selector) {
            return Ok(false);
        }
        state.clicks.push(selector.to_string());
        Self::advance(&mut state, selector);
        Ok(true)
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        if !Self::matches(&state.current, selector) {
            return Ok(false);
        }
        state.filled.push((selector.to_string(), value.to_string()));
        Ok(true)
    }

    async fn click_link_with_text(&self, text: &str) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        let anchors = Selector::parse("a").expect("anchor selector");
        let found = Html::parse_document(&state.current)
            .select(&anchors)
            .any(|a| a.text().collect::<String>().contains(text));
        if found {
            let key = format!("link:{}", text);
            state.clicks.push(key.clone());
            Self::advance(&mut state, &key);
        }
        Ok(found)
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.state.lock().unwrap().shutdowns += 1;
        Ok(())
    }
}

fn credentials() -> Credentials {
    Credentials {
        email: "ada@example.com".to_string(),
        password: "correct horse".to_string(),
        api_key: String::new(),
    }
}

fn settings(max_sign_in_attempts: u32) -> ScrapeConfig {
    ScrapeConfig {
        max_sign_in_attempts,
        ..ScrapeConfig::default()
    }
}

fn scraper_with(driver: FakeDriver, max_sign_in_attempts: u32) -> AmazonScraper<FakeDriver> {
    AmazonScraper::new(driver, credentials(), &settings(max_sign_in_attempts))
        .unwrap()
        .with_delays(Jitter::none(), Jitter::none())
}

fn login_driver(interstitials: usize) -> FakeDriver {
    let mut after_sign_in: Vec<String> = vec![INTERSTITIAL_HTML.to_string(); interstitials];
    after_sign_in.push(EMAIL_HTML.to_string());
    FakeDriver::new()
        .route(HOME, HOME_HTML)
        .on_click(selectors::SIGN_IN_LINK, after_sign_in)
        .on_click(selectors::CONTINUE_BUTTON, vec![PASSWORD_HTML.to_string()])
        .on_click(selectors::SIGN_IN_SUBMIT, vec![SIGNED_IN_HTML.to_string()])
}

/// Logged-in driver that also serves a listing with `review_pages` review pages.
fn shop_driver(review_pages: u32) -> FakeDriver {
    let pages: Vec<String> = (1..=review_pages)
        .map(|p| review_page(p, p < review_pages))
        .collect();
    let (first, rest) = pages.split_first().expect("at least one review page");
    login_driver(0)
        .route(PRODUCT_URL, LISTING_HTML)
        .on_click("link:See more reviews", vec![first.clone(), first.clone()])
        .on_click(selectors::NEXT_PAGE, rest.to_vec())
}

#[tokio::test]
async fn test_login_fills_credentials_and_authenticates() {
    let mut scraper = scraper_with(login_driver(0), 3);
    assert_eq!(scraper.state(), &SessionState::Disconnected);

    scraper.open_connection().await.unwrap();

    assert_eq!(scraper.state(), &SessionState::Authenticated);
    assert_eq!(
        scraper.driver().filled(),
        vec![
            (selectors::EMAIL_INPUT.to_string(), "ada@example.com".to_string()),
            (selectors::PASSWORD_INPUT.to_string(), "correct horse".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_login_retries_until_email_field_appears() {
    let mut scraper = scraper_with(login_driver(2), 3);

    scraper.open_connection().await.unwrap();

    assert_eq!(scraper.driver().clicks_on(selectors::SIGN_IN_LINK), 3);
    assert_eq!(scraper.state(), &SessionState::Authenticated);
}

#[tokio::test]
async fn test_login_gives_up_after_max_attempts_and_closes_browser() {
    let mut scraper = scraper_with(login_driver(5), 2);

    let err = scraper.open_connection().await.unwrap_err();

    assert!(matches!(err, ScrapingError::AuthError(_)));
    assert!(err.to_string().contains("after 2 attempts"));
    assert_eq!(scraper.driver().clicks_on(selectors::SIGN_IN_LINK), 2);
    assert_eq!(scraper.driver().shutdowns(), 1);
    assert!(matches!(scraper.state(), SessionState::Failed(_)));
}

#[tokio::test]
async fn test_login_reports_captcha() {
    let driver = FakeDriver::new()
        .route(HOME, HOME_HTML)
        .on_click(selectors::SIGN_IN_LINK, vec![EMAIL_HTML.to_string()])
        .on_click(selectors::CONTINUE_BUTTON, vec![CAPTCHA_HTML.to_string()]);
    let mut scraper = scraper_with(driver, 3);

    let err = scraper.open_connection().await.unwrap_err();

    assert!(matches!(err, ScrapingError::AuthError(_)));
    assert!(err.to_string().contains(&PageChallenge::Captcha.to_string()));
}

#[tokio::test]
async fn test_login_fails_without_account_marker() {
    let driver = FakeDriver::new()
        .route(HOME, HOME_HTML)
        .on_click(selectors::SIGN_IN_LINK, vec![EMAIL_HTML.to_string()])
        .on_click(selectors::CONTINUE_BUTTON, vec![PASSWORD_HTML.to_string()])
        .on_click(selectors::SIGN_IN_SUBMIT, vec!["<p>There was a problem</p>".to_string()]);
    let mut scraper = scraper_with(driver, 3);

    let err = scraper.open_connection().await.unwrap_err();
    assert!(err.to_string().contains("Could not find logged-in element"));
}

#[tokio::test]
async fn test_login_requires_credentials() {
    let mut scraper = AmazonScraper::new(login_driver(0), Credentials::default(), &settings(3))
        .unwrap()
        .with_delays(Jitter::none(), Jitter::none());

    let err = scraper.open_connection().await.unwrap_err();
    assert!(matches!(err, ScrapingError::ConfigError(_)));
    assert!(scraper.driver().visited().is_empty());
}

#[tokio::test]
async fn test_fetch_before_connect_is_rejected() {
    let mut scraper = scraper_with(shop_driver(1), 3);

    let err = scraper.fetch_product_details(PRODUCT_URL).await.unwrap_err();
    assert!(err.to_string().contains("Connection not opened"));
}

#[tokio::test]
async fn test_review_loop_stops_without_next_page() {
    let mut scraper = scraper_with(shop_driver(3), 3);
    scraper.open_connection().await.unwrap();

    let harvest = scraper.fetch_product_comments(PRODUCT_URL, 10).await.unwrap();

    assert_eq!(harvest.stop, StopReason::NoNextPage);
    assert_eq!(harvest.pages_visited, 3);
    assert_eq!(harvest.comments.len(), 6);
    assert_eq!(harvest.comments[0], "Page 1 review A");
    assert_eq!(harvest.comments[5], "Page 3 review B");
    assert_eq!(scraper.state(), &SessionState::Done);
}

#[tokio::test]
async fn test_review_loop_stops_at_page_ceiling() {
    let mut scraper = scraper_with(shop_driver(10), 3);
    scraper.open_connection().await.unwrap();

    let harvest = scraper.fetch_product_comments(PRODUCT_URL, 2).await.unwrap();

    assert_eq!(harvest.stop, StopReason::PageLimit);
    assert_eq!(harvest.pages_visited, 2);
    assert_eq!(harvest.comments.len(), 4);
    // no click past the ceiling
    assert_eq!(scraper.driver().clicks_on(selectors::NEXT_PAGE), 1);
}

#[tokio::test]
async fn test_review_loop_keeps_comments_when_browser_fails() {
    // content() calls: 1 after login, then one per review page
    let driver = shop_driver(5).fail_content_after(3);
    let mut scraper = scraper_with(driver, 3);
    scraper.open_connection().await.unwrap();

    let harvest = scraper.fetch_product_comments(PRODUCT_URL, 5).await.unwrap();

    assert!(matches!(harvest.stop, StopReason::Interrupted(_)));
    assert_eq!(harvest.pages_visited, 2);
    assert_eq!(harvest.comments.len(), 4);
}

#[tokio::test]
async fn test_review_loop_stops_on_robot_check() {
    let driver = login_driver(0)
        .route(PRODUCT_URL, LISTING_HTML)
        .on_click("link:See more reviews", vec![review_page(1, true)])
        .on_click(
            selectors::NEXT_PAGE,
            vec!["<p>Sorry, we just need to make sure you're not a robot.</p>".to_string()],
        );
    let mut scraper = scraper_with(driver, 3);
    scraper.open_connection().await.unwrap();

    let harvest = scraper.fetch_product_comments(PRODUCT_URL, 5).await.unwrap();

    assert_eq!(harvest.stop, StopReason::Blocked(PageChallenge::RobotCheck));
    assert_eq!(harvest.comments.len(), 2);
}

#[tokio::test]
async fn test_reviews_fall_back_to_listing_without_link() {
    let driver = login_driver(0).route(
        PRODUCT_URL,
        r#"<span class="review-text">Only review on the listing</span>"#,
    );
    let mut scraper = scraper_with(driver, 3);
    scraper.open_connection().await.unwrap();

    let harvest = scraper.fetch_product_comments(PRODUCT_URL, 5).await.unwrap();

    assert_eq!(harvest.comments, vec!["Only review on the listing"]);
    assert_eq!(harvest.stop, StopReason::NoNextPage);
}

#[tokio::test]
async fn test_fetch_product_data_assembles_record() {
    let mut scraper = scraper_with(shop_driver(2), 3);
    scraper.open_connection().await.unwrap();

    let record = scraper
        .fetch_product_data("https://www.amazon.com/Rugged-Armor/dp/B0TESTCASE/ref=sr_1_1?th=1", 5)
        .await
        .unwrap();

    assert_eq!(record.url, PRODUCT_URL);
    assert_eq!(record.title, "Rugged Armor Case");
    assert_eq!(record.price, "$15.99");
    assert_eq!(record.category, "Cell Phones & Accessories");
    assert_eq!(record.rating, 4.4);
    assert_eq!(record.comments.len(), 4);
}

#[tokio::test]
async fn test_fetch_product_data_rejects_bad_url_before_navigating() {
    let mut scraper = scraper_with(shop_driver(1), 3);
    scraper.open_connection().await.unwrap();
    let visited_before = scraper.driver().visited().len();

    let err = scraper
        .fetch_product_data("https://www.amazon.com/gp/bestsellers", 5)
        .await
        .unwrap_err();

    assert!(matches!(err, ScrapingError::ParseError(_)));
    assert_eq!(scraper.driver().visited().len(), visited_before);
}

#[tokio::test]
async fn test_missing_listing_fields_degrade_to_defaults() {
    let driver = login_driver(0).route(PRODUCT_URL, "<span id=\"productTitle\">Just a title</span>");
    let mut scraper = scraper_with(driver, 3);
    scraper.open_connection().await.unwrap();

    let record = scraper.fetch_product_data(PRODUCT_URL, 1).await.unwrap();

    assert_eq!(record.title, "Just a title");
    assert_eq!(record.price, "");
    assert_eq!(record.rating, MISSING_RATING);
    assert!(record.comments.is_empty());
}

#[tokio::test]
async fn test_navigation_failure_keeps_session_usable() {
    let mut scraper = scraper_with(shop_driver(1), 3);
    scraper.open_connection().await.unwrap();

    let err = scraper.fetch_product_details("https://www.amazon.com/dp/B0UNROUTED").await.unwrap_err();

    assert!(matches!(err, ScrapingError::BrowserError(_)));
    assert_eq!(scraper.state(), &SessionState::Authenticated);
    assert_eq!(scraper.driver().shutdowns(), 0);

    let details = scraper.fetch_product_details(PRODUCT_URL).await.unwrap();
    assert_eq!(details.title.as_deref(), Some("Rugged Armor Case"));
    assert_eq!(scraper.state(), &SessionState::Done);
}

#[tokio::test]
async fn test_reconnect_after_failed_fetch_does_not_sign_in_again() {
    let mut scraper = scraper_with(shop_driver(1), 3);
    scraper.open_connection().await.unwrap();
    let _ = scraper.fetch_product_details("https://www.amazon.com/dp/B0UNROUTED").await;

    scraper.open_connection().await.unwrap();

    assert_eq!(scraper.driver().clicks_on(selectors::SIGN_IN_LINK), 1);
}

#[tokio::test]
async fn test_close_connection_is_idempotent() {
    let mut scraper = scraper_with(login_driver(0), 3);
    scraper.open_connection().await.unwrap();

    scraper.close_connection().await.unwrap();
    scraper.close_connection().await.unwrap();

    assert_eq!(scraper.state(), &SessionState::Disconnected);
    assert_eq!(scraper.driver().shutdowns(), 2);
}
