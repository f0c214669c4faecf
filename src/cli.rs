use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::history::import::Browser;

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum BrowserArg {
    Chrome,
    Safari,
}

impl From<BrowserArg> for Browser {
    fn from(arg: BrowserArg) -> Self {
        match arg {
            BrowserArg::Chrome => Browser::Chrome,
            BrowserArg::Safari => Browser::Safari,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct CliOptions {
    /// Optional path to config file (YAML)
    #[arg(long)]
    pub config_path: Option<PathBuf>,

    /// Override the data directory from the config
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Answer yes to every confirmation prompt
    #[arg(long)]
    pub yes: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Record a page visit in the history log
    Visit {
        #[arg(long)]
        title: String,
        #[arg(long)]
        url: String,
    },
    /// Print the ranked history
    History {
        /// Only show the first N entries
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Remember a closed page for later recovery
    Close { url: String },
    /// Reopen the most recently closed page
    Recover,
    /// Save a password for the page's host
    SavePassword {
        #[arg(long)]
        url: String,
        #[arg(long)]
        password: String,
        /// Form fields as name=selector (password kind when the name
        /// contains "pass", text otherwise)
        #[arg(long = "field", value_delimiter = ',')]
        fields: Vec<String>,
    },
    /// Show the saved credential after the given id for a page
    Autofill {
        #[arg(long)]
        url: String,
        #[arg(long, default_value_t = 0)]
        after: i64,
    },
    /// Import history from another browser
    Import {
        #[arg(value_enum)]
        browser: BrowserArg,
    },
    /// Delete the history log
    ClearHistory,
    /// Start the download daemon and open its page
    Downloads,
    /// Open a url, or search for the text
    Open { input: String },
    /// Open a page through the translation service
    Translate { url: String },
}

pub fn parse() -> CliOptions {
    CliOptions::parse()
}
