use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScrapingError>;

#[derive(Error, Debug)]
pub enum ScrapingError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Browser error: {0}")]
    BrowserError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Analysis error: {0}")]
    AnalysisError(String),

    #[error("Template error: {0}")]
    TemplateError(String),

    #[error("Dataset error: {0}")]
    DatasetError(String),
}

#[derive(Debug, PartialEq, Eq)]
pub enum RecoveryStrategy {
    RetryWithBackoff,
    Reconnect,
    LogAndContinue,
    FixConfiguration,
    SolveChallenge,
    Abort,
}

impl RecoveryStrategy {
    /// Next step to suggest to the user, if there is one worth printing.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            RecoveryStrategy::RetryWithBackoff => Some("Wait a moment, then run the command again."),
            RecoveryStrategy::Reconnect => Some("Run the command again to open a fresh browser session."),
            RecoveryStrategy::FixConfiguration => {
                Some("Check config.toml, templates.yaml and the EMAIL / PASSWORD / GOOGLE_API_KEY variables.")
            }
            RecoveryStrategy::SolveChallenge => {
                Some("Sign in once from a regular browser (HEADFUL_BROWSER=true) and solve the captcha.")
            }
            RecoveryStrategy::LogAndContinue | RecoveryStrategy::Abort => None,
        }
    }
}

impl ScrapingError {
    pub fn recovery_strategy(&self) -> RecoveryStrategy {
        match self {
            ScrapingError::NetworkError(_) => RecoveryStrategy::RetryWithBackoff,
            ScrapingError::BrowserError(_) => RecoveryStrategy::Reconnect,
            ScrapingError::ParseError(_) => RecoveryStrategy::LogAndContinue,
            ScrapingError::ConfigError(_) => RecoveryStrategy::FixConfiguration,
            ScrapingError::AuthError(_) => RecoveryStrategy::SolveChallenge,
            ScrapingError::AnalysisError(_) => RecoveryStrategy::Abort,
            ScrapingError::TemplateError(_) => RecoveryStrategy::FixConfiguration,
            ScrapingError::DatasetError(_) => RecoveryStrategy::Abort,
        }
    }

    /// Short message for the user; details stay in the log.
    pub fn user_message(&self) -> &'static str {
        match self {
            ScrapingError::AuthError(_) => {
                "Error connecting Amazon. If the problem persists, try to solve captcha on your account."
            }
            ScrapingError::BrowserError(_) | ScrapingError::NetworkError(_) => {
                "Error loading product data. Try to establish connection again."
            }
            ScrapingError::ParseError(_) => "Could not read the product page or URL.",
            ScrapingError::AnalysisError(_) => "An error occurred during analysis.",
            ScrapingError::ConfigError(_) | ScrapingError::TemplateError(_) => {
                "Configuration is incomplete or invalid."
            }
            ScrapingError::DatasetError(_) => "Error loading offline dataset.",
        }
    }
}

// Conversion implementations for common error types
impl From<std::io::Error> for ScrapingError {
    fn from(err: std::io::Error) -> Self {
        ScrapingError::ConfigError(err.to_string())
    }
}

impl From<serde_json::Error> for ScrapingError {
    fn from(err: serde_json::Error) -> Self {
        ScrapingError::ParseError(err.to_string())
    }
}

impl From<serde_yaml::Error> for ScrapingError {
    fn from(err: serde_yaml::Error) -> Self {
        ScrapingError::TemplateError(err.to_string())
    }
}

impl From<toml::de::Error> for ScrapingError {
    fn from(err: toml::de::Error) -> Self {
        ScrapingError::ConfigError(err.to_string())
    }
}

impl From<reqwest::Error> for ScrapingError {
    fn from(err: reqwest::Error) -> Self {
        ScrapingError::NetworkError(err.to_string())
    }
}

impl From<regex::Error> for ScrapingError {
    fn from(err: regex::Error) -> Self {
        ScrapingError::ParseError(err.to_string())
    }
}

impl From<chromiumoxide::error::CdpError> for ScrapingError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        ScrapingError::BrowserError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recovery_strategy_mapping() {
        assert_eq!(
            ScrapingError::AuthError("captcha".to_string()).recovery_strategy(),
            RecoveryStrategy::SolveChallenge
        );
        assert_eq!(
            ScrapingError::NetworkError("timeout".to_string()).recovery_strategy(),
            RecoveryStrategy::RetryWithBackoff
        );
        assert_eq!(
            ScrapingError::ParseError("bad".to_string()).recovery_strategy(),
            RecoveryStrategy::LogAndContinue
        );
    }

    #[test]
    fn test_recovery_hints() {
        let browser = ScrapingError::BrowserError("target closed".to_string());
        assert!(browser.recovery_strategy().hint().unwrap().contains("fresh browser session"));

        let config = ScrapingError::TemplateError("Missing template variable 'x'".to_string());
        assert!(config.recovery_strategy().hint().unwrap().contains("config.toml"));

        let analysis = ScrapingError::AnalysisError("No comments found".to_string());
        assert_eq!(analysis.recovery_strategy().hint(), None);
    }

    #[test]
    fn test_display_includes_category() {
        let err = ScrapingError::AnalysisError("No comments found".to_string());
        assert_eq!(err.to_string(), "Analysis error: No comments found");
    }

    #[test]
    fn test_user_message_hides_details() {
        let err = ScrapingError::AuthError("captcha form at /errors/validateCaptcha".to_string());
        assert!(!err.user_message().contains("validateCaptcha"));
        assert!(err.user_message().contains("captcha"));
    }
}
