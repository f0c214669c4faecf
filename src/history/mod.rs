//! # History
//!
//! Ranked browsing history kept as a line-oriented text log. Every visit
//! merges into the list in memory and rewrites the whole log.

pub mod import;
pub mod key;
pub mod loader;
pub mod log;
pub mod store;

use thiserror::Error;

pub use loader::PendingHistory;
pub use store::HistoryStore;

/// One ranked page. `hit` only grows through visits; the retention filter is
/// what removes entries.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub title: String,
    pub url: String,
    pub hit: f64,
}

impl HistoryEntry {
    pub fn new(title: impl Into<String>, url: impl Into<String>, hit: f64) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            hit,
        }
    }
}

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("history loader stopped before sending a result")]
    LoaderGone,
}
