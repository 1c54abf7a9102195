use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{Result, ScrapingError};

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub scrape: ScrapeConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub logging: LogConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    /// Never written to disk; filled from the environment.
    #[serde(skip)]
    pub credentials: Credentials,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BrowserConfig {
    pub headful: bool,
    pub window_size: (u32, u32),
    pub user_agent: Option<String>,
    pub randomize_fingerprint: bool,
    pub launch_attempts: u32,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    pub executable: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
pub struct DelayRange {
    #[serde(with = "humantime_serde")]
    pub min: Duration,
    #[serde(with = "humantime_serde")]
    pub max: Duration,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScrapeConfig {
    pub base_url: String,
    pub max_review_pages: u32,
    pub max_sign_in_attempts: u32,
    pub step_delay: DelayRange,
    pub landing_delay: DelayRange,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LlmProviderKind {
    Gemini,
    Ollama,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    pub provider: LlmProviderKind,
    pub model: Option<String>,
    pub temperature: f32,
    pub base_url: Option<String>,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogConfig {
    pub debug: bool,
    pub level: String,
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PathsConfig {
    pub templates: PathBuf,
    pub metadata: Option<PathBuf>,
    pub reviews: Option<PathBuf>,
}

#[derive(Clone, Default)]
pub struct Credentials {
    pub email: String,
    pub password: String,
    pub api_key: String,
}

impl Credentials {
    pub fn has_login(&self) -> bool {
        !self.email.is_empty() && !self.password.is_empty()
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mask = |s: &str| if s.is_empty() { "<unset>" } else { "<redacted>" };
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &mask(&self.password))
            .field("api_key", &mask(&self.api_key))
            .finish()
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headful: false,
            window_size: (1920, 1080),
            user_agent: Some(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/111.0.0.0 Safari/537.36"
                    .to_string(),
            ),
            randomize_fingerprint: false,
            launch_attempts: 3,
            request_timeout: Duration::from_secs(30),
            executable: None,
        }
    }
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.amazon.com".to_string(),
            max_review_pages: 5,
            max_sign_in_attempts: 5,
            step_delay: DelayRange {
                min: Duration::from_millis(500),
                max: Duration::from_secs(2),
            },
            landing_delay: DelayRange {
                min: Duration::from_secs(2),
                max: Duration::from_secs(4),
            },
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProviderKind::Gemini,
            model: None,
            temperature: 0.7,
            base_url: None,
            timeout: Duration::from_secs(60),
        }
    }
}

impl LlmConfig {
    pub fn model_name(&self) -> &str {
        match (&self.model, self.provider) {
            (Some(model), _) => model,
            (None, LlmProviderKind::Gemini) => "gemini-1.5-flash-8b",
            (None, LlmProviderKind::Ollama) => "mistral",
        }
    }

    pub fn endpoint(&self) -> &str {
        match (&self.base_url, self.provider) {
            (Some(url), _) => url,
            (None, LlmProviderKind::Gemini) => "https://generativelanguage.googleapis.com",
            (None, LlmProviderKind::Ollama) => "http://localhost:11434",
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            debug: false,
            level: "info".to_string(),
            file: Some(PathBuf::from("app.log")),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            templates: PathBuf::from("templates.yaml"),
            metadata: None,
            reviews: None,
        }
    }
}

/// Truthy env flag in the `"true"`/`"1"` sense, case-insensitive.
pub fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1")
}

impl Config {
    /// Overlays environment values on top of the file config.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(debug) = lookup("DEBUG") {
            self.logging.debug = parse_flag(&debug);
        }
        if let Some(headful) = lookup("HEADFUL_BROWSER") {
            self.browser.headful = parse_flag(&headful);
        }
        if let Some(email) = lookup("EMAIL") {
            self.credentials.email = email;
        }
        if let Some(password) = lookup("PASSWORD") {
            self.credentials.password = password;
        }
        if let Some(api_key) = lookup("GOOGLE_API_KEY") {
            self.credentials.api_key = api_key;
        }
    }
}

#[async_trait::async_trait]
pub trait ConfigManager {
    async fn load_config(&self) -> Result<Config>;
    fn validate_config(&self, config: &Config) -> Result<()>;
}

pub struct FileConfigManager {
    config_path: PathBuf,
}

impl FileConfigManager {
    pub fn new(config_path: PathBuf) -> Self {
        Self { config_path }
    }
}

#[async_trait::async_trait]
impl ConfigManager for FileConfigManager {
    async fn load_config(&self) -> Result<Config> {
        info!("Loading configuration from {:?}", self.config_path);

        // check if config file exists, create default if not
        if !self.config_path.exists() {
            warn!("Configuration file not found, creating default config at {:?}", self.config_path);
            self.create_default_config().await?;
        }

        let config_content = fs::read_to_string(&self.config_path)
            .map_err(|e| ScrapingError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let mut config: Config = toml::from_str(&config_content)
            .map_err(|e| ScrapingError::ConfigError(format!("Failed to parse TOML config: {}", e)))?;

        config.apply_env_overrides(|key| std::env::var(key).ok());

        self.validate_config(&config)?;

        info!("Configuration loaded successfully");
        debug!("Resolved credentials: {:?}", config.credentials);
        Ok(config)
    }

    fn validate_config(&self, config: &Config) -> Result<()> {
        debug!("Validating configuration");

        let (width, height) = config.browser.window_size;
        if width == 0 || height == 0 {
            return Err(ScrapingError::ConfigError("window_size must be non-zero".to_string()));
        }
        if config.browser.launch_attempts == 0 {
            return Err(ScrapingError::ConfigError("launch_attempts must be greater than 0".to_string()));
        }
        if config.browser.launch_attempts > 10 {
            return Err(ScrapingError::ConfigError("launch_attempts cannot exceed 10".to_string()));
        }

        if !is_http_url(&config.scrape.base_url) {
            return Err(ScrapingError::ConfigError(
                "scrape.base_url must start with http:// or https://".to_string(),
            ));
        }
        if config.scrape.max_review_pages == 0 {
            return Err(ScrapingError::ConfigError("max_review_pages must be at least 1".to_string()));
        }
        if config.scrape.max_sign_in_attempts == 0 {
            return Err(ScrapingError::ConfigError("max_sign_in_attempts must be at least 1".to_string()));
        }
        for (name, range) in [
            ("step_delay", config.scrape.step_delay),
            ("landing_delay", config.scrape.landing_delay),
        ] {
            if range.min > range.max {
                return Err(ScrapingError::ConfigError(format!(
                    "{} minimum must not exceed maximum",
                    name
                )));
            }
            if range.max > Duration::from_secs(60) {
                return Err(ScrapingError::ConfigError(format!(
                    "{} maximum cannot exceed 60 seconds",
                    name
                )));
            }
        }

        if !(0.0..=2.0).contains(&config.llm.temperature) {
            return Err(ScrapingError::ConfigError("llm.temperature must be within 0.0..=2.0".to_string()));
        }
        if let Some(ref url) = config.llm.base_url {
            if !is_http_url(url) {
                return Err(ScrapingError::ConfigError(
                    "llm.base_url must start with http:// or https://".to_string(),
                ));
            }
        }

        debug!("Configuration validation passed");
        Ok(())
    }
}

impl FileConfigManager {
    /// Create a default configuration file
    async fn create_default_config(&self) -> Result<()> {
        let default_config = Config::default();
        let toml_content = toml::to_string_pretty(&default_config)
            .map_err(|e| ScrapingError::ConfigError(format!("Failed to serialize default config: {}", e)))?;

        if let Some(parent) = self.config_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| ScrapingError::ConfigError(format!("Failed to create config directory: {}", e)))?;
            }
        }

        fs::write(&self.config_path, toml_content)
            .map_err(|e| ScrapingError::ConfigError(format!("Failed to write default config: {}", e)))?;

        info!("Default configuration file created at {:?}", self.config_path);
        Ok(())
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}
