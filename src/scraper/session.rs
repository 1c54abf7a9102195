use std::fmt;
use tracing::{debug, error, info, warn};

use crate::browser::{BrowserSession, PageDriver};
use crate::config::{Config, Credentials, ScrapeConfig};
use crate::error::{Result, ScrapingError};
use crate::parser::{cleanse_url, selectors, ListingDetails, PageChallenge, ProductPageParser, ProductRecord};
use crate::scraper::jitter::Jitter;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Disconnected,
    Authenticating,
    Authenticated,
    Navigating,
    ExtractingPage(u32),
    Paginating(u32),
    Done,
    Failed(String),
}

impl SessionState {
    /// Whether a new fetch may start from this state.
    pub fn is_ready(&self) -> bool {
        matches!(self, SessionState::Authenticated | SessionState::Done)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Disconnected => write!(f, "disconnected"),
            SessionState::Authenticating => write!(f, "authenticating"),
            SessionState::Authenticated => write!(f, "authenticated"),
            SessionState::Navigating => write!(f, "navigating"),
            SessionState::ExtractingPage(n) => write!(f, "extracting page {}", n),
            SessionState::Paginating(n) => write!(f, "paginating from page {}", n),
            SessionState::Done => write!(f, "done"),
            SessionState::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Why the review loop stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum StopReason {
    NoNextPage,
    PageLimit,
    Blocked(PageChallenge),
    /// The browser failed mid-loop; comments gathered so far are kept.
    Interrupted(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReviewHarvest {
    pub comments: Vec<String>,
    pub pages_visited: u32,
    pub stop: StopReason,
}

/// Drives one logged-in browser session through listing and review pages.
pub struct AmazonScraper<D: PageDriver> {
    driver: D,
    credentials: Credentials,
    base_url: String,
    max_sign_in_attempts: u32,
    step_delay: Jitter,
    landing_delay: Jitter,
    parser: ProductPageParser,
    state: SessionState,
}

impl AmazonScraper<BrowserSession> {
    /// Launches Chrome according to `config` and wraps it in a disconnected scraper.
    pub async fn launch(config: &Config) -> Result<Self> {
        let session = BrowserSession::launch(&config.browser).await?;
        Self::new(session, config.credentials.clone(), &config.scrape)
    }
}

impl<D: PageDriver> AmazonScraper<D> {
    pub fn new(driver: D, credentials: Credentials, settings: &ScrapeConfig) -> Result<Self> {
        Ok(Self {
            driver,
            credentials,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            max_sign_in_attempts: settings.max_sign_in_attempts,
            step_delay: settings.step_delay.into(),
            landing_delay: settings.landing_delay.into(),
            parser: ProductPageParser::new()?,
            state: SessionState::Disconnected,
        })
    }

    pub fn with_delays(mut self, step_delay: Jitter, landing_delay: Jitter) -> Self {
        self.step_delay = step_delay;
        self.landing_delay = landing_delay;
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    fn transition(&mut self, next: SessionState) {
        debug!("Scraper state {} -> {}", self.state, next);
        self.state = next;
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.state.is_ready() {
            Ok(())
        } else {
            Err(ScrapingError::BrowserError(format!(
                "Connection not opened (state: {}). Call open_connection() first.",
                self.state
            )))
        }
    }

    pub async fn open_connection(&mut self) -> Result<()> {
        if self.state.is_ready() {
            debug!("Connection already open");
            return Ok(());
        }
        if !self.credentials.has_login() {
            return Err(ScrapingError::ConfigError("Amazon credentials are incomplete.".to_string()));
        }

        self.transition(SessionState::Authenticating);
        match self.sign_in().await {
            Ok(()) => {
                info!("Logged in successfully!");
                self.transition(SessionState::Authenticated);
                Ok(())
            }
            Err(e) => {
                error!("Error during login: {}", e);
                if let Err(close_err) = self.close_connection().await {
                    warn!("Failed to close browser after login error: {}", close_err);
                }
                self.transition(SessionState::Failed(e.to_string()));
                Err(e)
            }
        }
    }

    async fn sign_in(&mut self) -> Result<()> {
        self.driver.goto(&self.base_url).await?;
        self.step_delay.pause().await;
        self.landing_delay.pause().await;

        // the sign-in link sometimes lands on an interstitial without the form
        let mut attempt = 0;
        loop {
            attempt += 1;
            if attempt > self.max_sign_in_attempts {
                return Err(ScrapingError::AuthError(format!(
                    "Sign-in form did not appear after {} attempts",
                    self.max_sign_in_attempts
                )));
            }

            if !self.driver.click(selectors::SIGN_IN_LINK).await? {
                return Err(self.auth_failure("Sign-in link not found").await);
            }
            self.landing_delay.pause().await;

            if self.driver.fill(selectors::EMAIL_INPUT, &self.credentials.email).await? {
                break;
            }
            if let Some(challenge) = self.current_challenge().await {
                return Err(ScrapingError::AuthError(format!("Blocked by {}", challenge)));
            }
            debug!("Email field missing after sign-in attempt {}, retrying", attempt);
        }

        if !self.driver.click(selectors::CONTINUE_BUTTON).await? {
            return Err(self.auth_failure("Continue button not found").await);
        }
        self.step_delay.pause().await;

        if !self.driver.fill(selectors::PASSWORD_INPUT, &self.credentials.password).await? {
            return Err(self.auth_failure("Password field not found").await);
        }
        if !self.driver.click(selectors::SIGN_IN_SUBMIT).await? {
            return Err(self.auth_failure("Sign-in button not found").await);
        }
        self.step_delay.pause().await;

        let html = self.driver.content().await?;
        if let Some(challenge) = self.parser.detect_challenge(&html) {
            return Err(ScrapingError::AuthError(format!("Blocked by {}", challenge)));
        }
        if !self.parser.is_signed_in(&html) {
            return Err(ScrapingError::AuthError(
                "Login failed. Could not find logged-in element.".to_string(),
            ));
        }
        Ok(())
    }

    async fn current_challenge(&self) -> Option<PageChallenge> {
        match self.driver.content().await {
            Ok(html) => self.parser.detect_challenge(&html),
            Err(e) => {
                debug!("Could not read page while checking for challenges: {}", e);
                None
            }
        }
    }

    /// Auth error for a missing element, naming the challenge page if one is showing.
    async fn auth_failure(&self, missing: &str) -> ScrapingError {
        match self.current_challenge().await {
            Some(challenge) => ScrapingError::AuthError(format!("{} (blocked by {})", missing, challenge)),
            None => ScrapingError::AuthError(missing.to_string()),
        }
    }

    pub async fn close_connection(&mut self) -> Result<()> {
        self.driver.shutdown().await?;
        self.transition(SessionState::Disconnected);
        Ok(())
    }

    pub async fn fetch_product_data(&mut self, product_url: &str, max_review_pages: u32) -> Result<ProductRecord> {
        let url = cleanse_url(&self.base_url, product_url)?;
        let details = self.fetch_product_details(&url).await?;
        let harvest = self.fetch_product_comments(&url, max_review_pages).await?;
        info!(
            "Fetched {} comments over {} pages ({:?})",
            harvest.comments.len(),
            harvest.pages_visited,
            harvest.stop
        );
        Ok(ProductRecord::from_listing(url, details, harvest.comments))
    }

    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.ensure_ready()?;
        self.transition(SessionState::Navigating);
        if let Err(e) = self.driver.goto(url).await {
            return Err(self.abandon_fetch(e));
        }
        self.step_delay.pause().await;
        Ok(())
    }

    /// A failed fetch leaves the signed-in browser usable for the next one.
    fn abandon_fetch(&mut self, err: ScrapingError) -> ScrapingError {
        warn!("Fetch abandoned: {}", err);
        self.transition(SessionState::Authenticated);
        err
    }

    pub async fn fetch_product_details(&mut self, product_url: &str) -> Result<ListingDetails> {
        self.navigate(product_url).await?;

        let html = match self.driver.content().await {
            Ok(html) => html,
            Err(e) => return Err(self.abandon_fetch(e)),
        };
        if let Some(challenge) = self.parser.detect_challenge(&html) {
            warn!("Product page for {} replaced by {}", product_url, challenge);
        }

        let details = self.parser.parse_listing(&html);
        let missing = details.missing_fields();
        if !missing.is_empty() {
            error!("Error fetching details for {}: missing {}", product_url, missing.join(", "));
        }

        self.transition(SessionState::Done);
        Ok(details)
    }

    pub async fn fetch_product_comments(&mut self, product_url: &str, max_pages: u32) -> Result<ReviewHarvest> {
        self.navigate(product_url).await?;
        self.navigate_to_reviews().await;

        let mut comments = Vec::new();
        let mut pages_visited = 0;
        let mut page_ix = 1;

        let stop = loop {
            if page_ix > max_pages {
                break StopReason::PageLimit;
            }

            self.transition(SessionState::ExtractingPage(page_ix));
            self.step_delay.pause().await;
            let html = match self.driver.content().await {
                Ok(html) => html,
                Err(e) => {
                    error!("Error fetching comments on page {}: {}", page_ix, e);
                    break StopReason::Interrupted(e.to_string());
                }
            };
            if let Some(challenge) = self.parser.detect_challenge(&html) {
                warn!("Review page {} replaced by {}", page_ix, challenge);
                break StopReason::Blocked(challenge);
            }

            let page_comments = self.parser.parse_reviews(&html);
            info!("{} comments fetched from page {}.", page_comments.len(), page_ix);
            comments.extend(page_comments);
            pages_visited = page_ix;

            if page_ix >= max_pages {
                break StopReason::PageLimit;
            }

            self.transition(SessionState::Paginating(page_ix));
            self.step_delay.pause().await;
            match self.driver.click(selectors::NEXT_PAGE).await {
                Ok(true) => page_ix += 1,
                Ok(false) => break StopReason::NoNextPage,
                Err(e) => {
                    error!("Error changing review page after page {}: {}", page_ix, e);
                    break StopReason::Interrupted(e.to_string());
                }
            }
        };

        if stop == StopReason::NoNextPage {
            info!("No more pages of reviews.");
        }
        self.transition(SessionState::Done);
        Ok(ReviewHarvest {
            comments,
            pages_visited,
            stop,
        })
    }

    async fn navigate_to_reviews(&mut self) {
        match self.driver.click_link_with_text(selectors::SEE_MORE_REVIEWS_TEXT).await {
            Ok(true) => self.step_delay.pause().await,
            Ok(false) => {
                warn!("Could not find 'See more reviews' link. Falling back to product page comments.")
            }
            Err(e) => warn!(
                "Failed to open the reviews page ({}). Falling back to product page comments.",
                e
            ),
        }
    }
}
