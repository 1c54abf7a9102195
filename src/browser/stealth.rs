use rand::seq::SliceRandom;
use rand::Rng;

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
];

pub struct UserAgentGenerator {
    user_agents: Vec<String>,
}

impl UserAgentGenerator {
    pub fn new() -> Self {
        Self {
            user_agents: USER_AGENTS.iter().map(|ua| ua.to_string()).collect(),
        }
    }

    pub fn random_user_agent(&self) -> &str {
        self.user_agents
            .choose(&mut rand::thread_rng())
            .map(String::as_str)
            .unwrap_or(USER_AGENTS[0])
    }
}

impl Default for UserAgentGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewportSize {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct BrowserFingerprint {
    pub viewport: ViewportSize,
    pub language: String,
    pub platform: String,
    pub hardware_concurrency: u32,
}

impl BrowserFingerprint {
    /// Fingerprint that matches a desktop Chrome at `viewport`.
    pub fn fixed(viewport: ViewportSize) -> Self {
        Self {
            viewport,
            language: "en-US,en;q=0.9".to_string(),
            platform: "Win32".to_string(),
            hardware_concurrency: 8,
        }
    }

    pub fn primary_language(&self) -> &str {
        self.language.split(',').next().unwrap_or("en-US")
    }
}

pub struct FingerprintRandomizer {
    viewports: Vec<ViewportSize>,
    languages: Vec<&'static str>,
    platforms: Vec<&'static str>,
}

impl FingerprintRandomizer {
    pub fn new() -> Self {
        Self {
            viewports: vec![
                ViewportSize { width: 1920, height: 1080 },
                ViewportSize { width: 1536, height: 864 },
                ViewportSize { width: 1440, height: 900 },
                ViewportSize { width: 1366, height: 768 },
            ],
            languages: vec!["en-US,en;q=0.9", "en-GB,en;q=0.9", "en-CA,en;q=0.9"],
            platforms: vec!["Win32", "MacIntel", "Linux x86_64"],
        }
    }

    pub fn generate_fingerprint(&self) -> BrowserFingerprint {
        let mut rng = rand::thread_rng();
        BrowserFingerprint {
            viewport: self.viewports[rng.gen_range(0..self.viewports.len())],
            language: self.languages[rng.gen_range(0..self.languages.len())].to_string(),
            platform: self.platforms[rng.gen_range(0..self.platforms.len())].to_string(),
            hardware_concurrency: rng.gen_range(4..=16),
        }
    }
}

impl Default for FingerprintRandomizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Script registered for every new document so the automation flags are hidden
/// before the site's own scripts run.
pub fn generate_stealth_script(fingerprint: &BrowserFingerprint) -> String {
    let languages = fingerprint
        .language
        .split(',')
        .map(|l| l.split(';').next().unwrap_or(l))
        .map(|l| format!("'{}'", l))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"
    (function() {{
        Object.defineProperty(navigator, 'webdriver', {{ get: () => undefined }});
        Object.defineProperty(navigator, 'language', {{ get: () => '{language}' }});
        Object.defineProperty(navigator, 'languages', {{ get: () => [{languages}] }});
        Object.defineProperty(navigator, 'platform', {{ get: () => '{platform}' }});
        Object.defineProperty(navigator, 'hardwareConcurrency', {{ get: () => {cores} }});
        Object.defineProperty(navigator, 'plugins', {{
            get: () => [
                {{ name: 'Chrome PDF Plugin', description: 'Portable Document Format' }},
                {{ name: 'Chrome PDF Viewer', description: 'PDF Viewer' }}
            ]
        }});
        window.chrome = window.chrome || {{ runtime: {{}} }};
    }})();
    "#,
        language = fingerprint.primary_language(),
        languages = languages,
        platform = fingerprint.platform,
        cores = fingerprint.hardware_concurrency,
    )
}
