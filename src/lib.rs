pub mod buffer;
pub mod cli;
pub mod closed_pages;
pub mod config;
pub mod credentials;
pub mod downloads;
pub mod history;
pub mod host;
pub mod logging;
