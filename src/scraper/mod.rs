pub mod jitter;
pub mod session;

#[cfg(test)]
mod tests;

pub use jitter::Jitter;
pub use session::{AmazonScraper, ReviewHarvest, SessionState, StopReason};
