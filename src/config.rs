use std::path::{Path, PathBuf};

use anyhow::Result;
use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::host::Host;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Aria2Config {
    pub auto_file_renaming: bool,
    pub proxy_host: String,
    pub proxy_port: String,
    pub download_path: String,
    pub rpc_port: u16,
}

impl Default for Aria2Config {
    fn default() -> Self {
        Self {
            auto_file_renaming: false,
            proxy_host: String::new(),
            proxy_port: String::new(),
            download_path: "~/Downloads".to_string(),
            rpc_port: 6800,
        }
    }
}

/// Settings for one browser buffer, resolved once at construction.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BrowserConfig {
    pub data_dir: String,
    pub remember_history: bool,
    pub enable_autofill: bool,
    pub enable_adblocker: bool,
    pub ignore_history_list: Vec<String>,
    pub blank_page_url: String,
    pub search_url: String,
    pub chrome_history_file: String,
    pub safari_history_file: String,
    pub downloads_index: String,
    /// Empty means the system locale.
    pub translate_language: String,
    pub readability_js: String,
    /// Prepended to reader-mode html.
    pub reader_mode_style: String,
    pub aria2: Aria2Config,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            data_dir: String::new(),
            remember_history: true,
            enable_autofill: false,
            enable_adblocker: false,
            ignore_history_list: Vec::new(),
            blank_page_url: "https://www.google.com".to_string(),
            search_url: "https://www.google.com/search?ie=utf-8&q=%s".to_string(),
            chrome_history_file: String::new(),
            safari_history_file: String::new(),
            downloads_index: String::new(),
            translate_language: String::new(),
            readability_js: String::new(),
            reader_mode_style: String::new(),
            aria2: Aria2Config::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: BrowserConfig,
    pub config_hash: String,
}

pub fn load_config(path: Option<&Path>) -> Result<LoadedConfig> {
    let bytes: Vec<u8> = if let Some(p) = path {
        std::fs::read(p)?
    } else {
        include_bytes!("../config/default.yml").to_vec()
    };

    let config: BrowserConfig = serde_yaml::from_slice(&bytes)?;
    let config_hash = hash_bytes(&bytes);

    Ok(LoadedConfig { config, config_hash })
}

fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    hex::encode(digest)
}

/// Expand a leading `~` the way the editor expands user paths.
pub fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}

impl BrowserConfig {
    pub fn data_dir(&self) -> PathBuf {
        if self.data_dir.trim().is_empty() {
            PathBuf::from("./webtrail-data")
        } else {
            expand_path(&self.data_dir)
        }
    }

    pub fn history_log_path(&self) -> PathBuf {
        self.data_dir().join("history").join("log.txt")
    }

    pub fn closed_pages_path(&self) -> PathBuf {
        self.data_dir().join("history").join("close.txt")
    }

    pub fn password_db_path(&self) -> PathBuf {
        self.data_dir().join("password.db")
    }

    pub fn safari_marker_path(&self) -> PathBuf {
        self.data_dir().join("safari_history_last_update_time.txt")
    }

    /// Compile the ignore list. Patterns are matched case-insensitively
    /// anywhere in the url; invalid ones are dropped with a warning.
    pub fn ignore_patterns(&self) -> Vec<Regex> {
        self.ignore_history_list
            .iter()
            .filter_map(|raw| {
                match RegexBuilder::new(raw).case_insensitive(true).build() {
                    Ok(re) => Some(re),
                    Err(err) => {
                        warn!("skipping invalid ignore-history pattern {raw:?}: {err}");
                        None
                    }
                }
            })
            .collect()
    }

    /// Overlay values the host exposes as settings. Unknown or unparsable
    /// values keep what the config file said.
    pub fn apply_host_settings<H: Host + ?Sized>(&mut self, host: &H) {
        if let Some(v) = host.get_setting("remember-history").and_then(|v| parse_flag(&v)) {
            self.remember_history = v;
        }
        if let Some(v) = host.get_setting("enable-autofill").and_then(|v| parse_flag(&v)) {
            self.enable_autofill = v;
        }
        if let Some(v) = host.get_setting("enable-adblocker").and_then(|v| parse_flag(&v)) {
            self.enable_adblocker = v;
        }
        if let Some(v) = host.get_setting("blank-page-url") {
            if !v.trim().is_empty() {
                self.blank_page_url = v;
            }
        }
        if let Some(v) = host.get_setting("translate-language") {
            self.translate_language = v.trim().to_string();
        }
        if let Some(v) = host.get_setting("ignore-history-list") {
            self.ignore_history_list = v
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect();
        }
        debug!(
            remember_history = self.remember_history,
            enable_autofill = self.enable_autofill,
            enable_adblocker = self.enable_adblocker,
            "applied host settings"
        );
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "t" | "true" | "1" | "yes" => Some(true),
        "nil" | "false" | "0" | "no" => Some(false),
        _ => None,
    }
}
