pub mod driver;
pub mod manager;
pub mod stealth;

pub use driver::PageDriver;
pub use manager::BrowserSession;
pub use stealth::{BrowserFingerprint, FingerprintRandomizer, UserAgentGenerator, ViewportSize};
