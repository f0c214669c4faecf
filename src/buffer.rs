//! # Browser Buffer
//!
//! Glue between page callbacks, user commands and the stores. Every failure
//! below this layer is logged and turned into a host notification; nothing
//! here propagates errors back into the page callbacks.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};
use url::Url;

use crate::closed_pages::ClosedPages;
use crate::config::{BrowserConfig, expand_path};
use crate::credentials::{CredentialStore, FormFields};
use crate::downloads::{self, DownloadError};
use crate::history::import::{self, Browser, ImportError};
use crate::history::{HistoryEntry, HistoryStore, PendingHistory, loader};
use crate::host::{CookieScope, Host, RenderTarget};

const BLANK_URL: &str = "about:blank";

const ADBLOCK_STYLE_ID: &str = "adblocker";
const ADBLOCK_CSS: &str = include_str!("../assets/adblocker.css");

const READER_ACTIVE_JS: &str = "document.getElementById('readability-page-1') != null;";
const READER_HTML_JS: &str = "new Readability(document).parse().content;";
const READER_TEXT_JS: &str = "new Readability(document).parse().textContent;";

const TRANSLATE_URL: &str = "https://translate.google.com/translate?hl=en&sl=auto";

/// Actions that run only after the user confirms a yes-or-no prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmAction {
    ClearHistory,
    ImportHistory(Browser),
    DeleteAllCookies,
    DeleteCookie,
}

impl ConfirmAction {
    pub fn prompt(self) -> String {
        match self {
            ConfirmAction::ClearHistory => {
                "Are you sure you want to clear all browsing history?".to_string()
            }
            ConfirmAction::ImportHistory(browser) => {
                format!("Are you sure you want to import all history from {}?", browser.name())
            }
            ConfirmAction::DeleteAllCookies => {
                "Are you sure you want to delete all browsing cookies?".to_string()
            }
            ConfirmAction::DeleteCookie => {
                "Are you sure you want to delete cookies for the current page?".to_string()
            }
        }
    }
}

/// What the buffer was opened on.
#[derive(Debug, Clone)]
pub enum BufferSource {
    Url(String),
    /// Rendered once and deleted; such buffers never touch history.
    TempHtml(PathBuf),
}

enum HistoryState {
    Disabled,
    Loading(PendingHistory),
    Ready(HistoryStore),
}

pub struct BrowserBuffer<H: Host> {
    config: BrowserConfig,
    host: H,
    temp_html: bool,
    history: HistoryState,
    credentials: Option<CredentialStore>,
    closed: ClosedPages,
    current_url: String,
    autofill_enabled: bool,
    autofill_cursor: i64,
    adblocker_enabled: bool,
    page_closed: bool,
    readability: Option<String>,
}

impl<H: Host> BrowserBuffer<H> {
    /// Build the buffer and display `source`. The history log starts loading
    /// on a background thread and is joined on first use.
    pub fn new(mut config: BrowserConfig, host: H, source: BufferSource) -> Self {
        config.apply_host_settings(&host);

        let history = if config.remember_history {
            HistoryState::Loading(loader::spawn_load(
                config.history_log_path(),
                config.ignore_patterns(),
            ))
        } else {
            HistoryState::Disabled
        };

        let credentials = match CredentialStore::open(&config.password_db_path()) {
            Ok(store) => Some(store),
            Err(err) => {
                warn!("password store unavailable: {err}");
                None
            }
        };

        let (current_url, temp_html) = match &source {
            BufferSource::Url(url) => (url.clone(), false),
            BufferSource::TempHtml(_) => (BLANK_URL.to_string(), true),
        };

        let buffer = Self {
            closed: ClosedPages::new(&config.closed_pages_path()),
            autofill_enabled: config.enable_autofill,
            adblocker_enabled: config.enable_adblocker,
            config,
            host,
            temp_html,
            history,
            credentials,
            current_url,
            autofill_cursor: 0,
            page_closed: false,
            readability: None,
        };
        buffer.show(source);
        buffer
    }

    fn show(&self, source: BufferSource) {
        match source {
            BufferSource::Url(url) => self.host.render(RenderTarget::Url(url)),
            BufferSource::TempHtml(path) => match std::fs::read_to_string(&path) {
                Ok(html) => {
                    self.host.render(RenderTarget::Html(html));
                    if let Err(err) = std::fs::remove_file(&path) {
                        warn!("failed to remove temp html {}: {err}", path.display());
                    }
                }
                Err(err) => {
                    error!("failed to read temp html {}: {err}", path.display());
                    self.host
                        .notify_user(&format!("Failed to open {}: {err}", path.display()));
                }
            },
        }
    }

    pub fn config(&self) -> &BrowserConfig {
        &self.config
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn current_url(&self) -> &str {
        &self.current_url
    }

    pub fn autofill_enabled(&self) -> bool {
        self.autofill_enabled
    }

    pub fn autofill_cursor(&self) -> i64 {
        self.autofill_cursor
    }

    pub fn adblocker_enabled(&self) -> bool {
        self.adblocker_enabled
    }

    pub fn page_closed(&self) -> bool {
        self.page_closed
    }

    /// Wait for the background load if it is still running.
    fn history_mut(&mut self) -> Option<&mut HistoryStore> {
        if matches!(self.history, HistoryState::Loading(_)) {
            if let HistoryState::Loading(pending) =
                std::mem::replace(&mut self.history, HistoryState::Disabled)
            {
                let store = pending.wait_or_empty(self.config.ignore_patterns());
                self.history = HistoryState::Ready(store);
            }
        }
        match &mut self.history {
            HistoryState::Ready(store) => Some(store),
            _ => None,
        }
    }

    /// Ranked history, or an empty slice when history is disabled.
    pub fn history_entries(&mut self) -> &[HistoryEntry] {
        match self.history_mut() {
            Some(store) => store.entries(),
            None => &[],
        }
    }

    pub fn on_url_changed(&mut self, url: &str) {
        self.current_url = url.to_string();
        if self.adblocker_enabled && !self.page_closed {
            self.host.load_css(ADBLOCK_STYLE_ID, ADBLOCK_CSS);
        }
    }

    /// Title updates are what drive history recording.
    pub fn on_title_changed(&mut self, title: &str, url: &str) {
        self.current_url = url.to_string();
        if !self.config.remember_history || self.temp_html {
            return;
        }
        if title.trim().is_empty() || title == BLANK_URL || url == BLANK_URL {
            return;
        }
        self.record_history(title, url);
    }

    fn record_history(&mut self, title: &str, url: &str) {
        let Some(store) = self.history_mut() else {
            return;
        };
        if let Err(err) = store.record_visit(title, url) {
            error!("failed to record history for {url}: {err}");
            self.host.notify_user(&format!("Error in record_history: {err}"));
        }
    }

    /// Point autofill at the first saved credential for the loaded page and
    /// reapply the adblocker.
    pub fn on_page_loaded(&mut self) {
        if self.autofill_enabled {
            self.autofill_cursor = self.autofill_from(0);
        }
        if self.adblocker_enabled {
            self.host.load_css(ADBLOCK_STYLE_ID, ADBLOCK_CSS);
        }
    }

    /// Fill the first credential after `after_id` and return its id, or 0 when
    /// the host has none left.
    fn autofill_from(&self, after_id: i64) -> i64 {
        let Some(host_name) = page_host(&self.current_url) else {
            return 0;
        };
        let Some(store) = self.credentials.as_ref() else {
            return 0;
        };
        match store.next_after(&host_name, after_id) {
            Ok(Some(record)) => {
                self.host.fill_credentials(&record);
                record.id
            }
            Ok(None) => 0,
            Err(err) => {
                error!("autofill lookup failed for {host_name}: {err}");
                self.host.notify_user(&format!("Error in autofill: {err}"));
                0
            }
        }
    }

    /// Save the password the page currently holds. Returns whether anything
    /// was stored.
    pub fn save_page_password(&mut self, password: &str, fields: &FormFields) -> bool {
        if !self.autofill_enabled {
            self.host.notify_user(
                "Password autofill is not enabled! Enable it with toggle_password_autofill",
            );
            return false;
        }
        if password.is_empty() {
            self.host.notify_user("There is no password present in this page!");
            return false;
        }
        let Some(host_name) = page_host(&self.current_url) else {
            self.host.notify_user("This page has no host to save a password for.");
            return false;
        };
        let Some(store) = self.credentials.as_mut() else {
            self.host.notify_user("Password store is unavailable.");
            return false;
        };
        match store.upsert(&host_name, password, fields) {
            Ok(()) => {
                self.host.notify_user("Successfully recorded this page's password!");
                true
            }
            Err(err) => {
                error!("failed to save password for {host_name}: {err}");
                self.host.notify_user(&format!("Error in save_page_password: {err}"));
                false
            }
        }
    }

    /// Turn autofill on, or cycle to the next saved credential; running out
    /// of credentials turns it off again.
    pub fn toggle_password_autofill(&mut self) {
        if !self.autofill_enabled {
            self.host.set_setting("enable-autofill", "t");
            self.autofill_enabled = true;
            self.autofill_cursor = self.autofill_from(0);
            self.host.notify_user("Successfully enabled autofill!");
            return;
        }
        self.autofill_cursor = self.autofill_from(self.autofill_cursor);
        if self.autofill_cursor == 0 {
            self.host.set_setting("enable-autofill", "nil");
            self.autofill_enabled = false;
            self.host.notify_user("Successfully disabled password autofill!");
        } else {
            self.host.notify_user("Successfully changed password autofill id!");
        }
    }

    pub fn toggle_adblocker(&mut self) {
        self.adblocker_enabled = !self.adblocker_enabled;
        if self.adblocker_enabled {
            self.host.set_setting("enable-adblocker", "t");
            self.host.load_css(ADBLOCK_STYLE_ID, ADBLOCK_CSS);
            self.host.notify_user("Successfully enabled adblocker!");
        } else {
            self.host.set_setting("enable-adblocker", "nil");
            self.host.remove_css(ADBLOCK_STYLE_ID);
            self.host.notify_user("Successfully disabled adblocker!");
        }
    }

    pub fn record_close_page(&mut self, url: &str) {
        self.page_closed = true;
        if !self.config.remember_history || self.temp_html || url == BLANK_URL {
            return;
        }
        if let Err(err) = self.closed.record(url) {
            error!("failed to record closed page {url}: {err}");
        }
    }

    pub fn recover_prev_close_page(&mut self) {
        match self.closed.recover() {
            Ok(Some(url)) => {
                self.host.navigate_new_tab(&url);
                self.host.notify_user(&format!("Recovery {url}"));
            }
            Ok(None) => self.host.notify_user("No page need recovery."),
            Err(err) => {
                error!("failed to read closed pages: {err}");
                self.host.notify_user(&format!("Failed to recover closed page: {err}"));
            }
        }
    }

    /// Ask the user, then run `action` if they agree.
    pub fn request(&mut self, action: ConfirmAction) {
        if self.host.ask_yes_no(&action.prompt()) {
            self.confirm(action);
        } else {
            debug!("user declined {action:?}");
        }
    }

    pub fn confirm(&mut self, action: ConfirmAction) {
        match action {
            ConfirmAction::ClearHistory => self.clear_history(),
            ConfirmAction::ImportHistory(browser) => self.import_history(browser),
            ConfirmAction::DeleteAllCookies => {
                self.host.delete_cookies(CookieScope::All);
                self.host.notify_user("Deleted all cookies.");
            }
            ConfirmAction::DeleteCookie => {
                self.host.delete_cookies(CookieScope::CurrentPage);
                self.host.notify_user("Deleted cookies for the current page.");
            }
        }
    }

    fn clear_history(&mut self) {
        let log_path = self.config.history_log_path();
        let result = match self.history_mut() {
            Some(store) => store.clear(),
            None => HistoryStore::empty(&log_path, Vec::new()).clear(),
        };
        match result {
            Ok(true) => self.host.notify_user("Cleared browsing history."),
            Ok(false) => self.host.notify_user("There is no browsing history."),
            Err(err) => {
                error!("failed to clear history: {err}");
                self.host.notify_user(&format!("Failed to clear history: {err}"));
            }
        }
    }

    fn import_history(&mut self, browser: Browser) {
        if self.history_mut().is_none() {
            self.host.notify_user("Browsing history is disabled, nothing to import into.");
            return;
        }
        let db_path = match browser {
            Browser::Chrome => expand_path(&self.config.chrome_history_file),
            Browser::Safari => expand_path(&self.config.safari_history_file),
        };
        self.host
            .notify_user(&format!("Importing from {}...", db_path.display()));

        let read = match browser {
            Browser::Chrome => import::read_chrome(&db_path),
            Browser::Safari => import::read_safari(&db_path, &self.config.safari_marker_path()),
        };
        let pages = match read {
            Ok(pages) => import::dedupe_by_title(pages),
            Err(err) => {
                self.report_import_error(browser, &db_path, &err);
                return;
            }
        };

        let total = pages.len();
        // Loaded by the check at the top.
        let HistoryState::Ready(store) = &mut self.history else {
            return;
        };
        for (i, page) in pages.iter().enumerate() {
            store.apply_visit(&page.title, &page.url);
            let done = i + 1;
            if done % 100 == 0 || done == total {
                self.host.notify_user(&format!("Importing {done} / {total} ..."));
            }
        }
        if let Err(err) = store.flush() {
            error!("failed to write imported history: {err}");
            self.host.notify_user(&format!("Error in record_history: {err}"));
            return;
        }
        info!("imported {total} {} history entries", browser.name());
        self.host.notify_user(&format!(
            "{total} {} history entries imported.",
            browser.name()
        ));
    }

    fn report_import_error(&self, browser: Browser, path: &Path, err: &ImportError) {
        warn!("{} history import failed: {err}", browser.name());
        let message = match err {
            ImportError::Missing(_) => format!(
                "The {} history file: '{}' not exist, please check your setting.",
                browser.name(),
                path.display()
            ),
            ImportError::Locked(_) => format!(
                "The {} history file is locked, please close your {} app first.",
                browser.name(),
                browser.name()
            ),
            ImportError::Malformed(_) => format!("Parse {} history file error.", browser.name()),
            other => format!("Failed to read {} history entries: {other}.", browser.name()),
        };
        self.host.notify_user(&message);
    }

    /// Open `input` as a url when it looks like one, otherwise search for it.
    pub fn open_url_or_search(&mut self, input: &str) {
        let target = resolve_input(input, &self.config.search_url);
        self.current_url = target.clone();
        self.host.render(RenderTarget::Url(target));
    }

    pub fn new_blank_page(&self) {
        self.host.navigate_new_tab(&self.config.blank_page_url);
    }

    fn refresh_page(&self) {
        self.host.render(RenderTarget::Url(self.current_url.clone()));
    }

    /// Evaluate the readability script in the page, reading it from disk the
    /// first time.
    fn load_readability(&mut self) -> bool {
        if self.readability.is_none() {
            let path = expand_path(&self.config.readability_js);
            match std::fs::read_to_string(&path) {
                Ok(source) => self.readability = Some(source),
                Err(err) => {
                    warn!("failed to read readability script {}: {err}", path.display());
                    self.host.notify_user(&format!(
                        "Cannot load readability script {}: {err}",
                        path.display()
                    ));
                    return false;
                }
            }
        }
        if let Some(source) = self.readability.as_deref() {
            self.host.execute_js(source);
        }
        true
    }

    /// Reader html with the configured style prepended, or `None` when the
    /// page has no readable content.
    fn readable_html(&mut self) -> Option<String> {
        if !self.load_readability() {
            return None;
        }
        let html = self.host.execute_js(READER_HTML_JS).filter(|h| !h.trim().is_empty())?;
        Some(format!("{}{html}", self.config.reader_mode_style))
    }

    pub fn switch_to_reader_mode(&mut self) {
        if self.host.execute_js(READER_ACTIVE_JS).as_deref() == Some("true") {
            self.host.notify_user("Reader mode is already enabled in current page.");
            return;
        }
        match self.readable_html() {
            Some(html) => self.host.render(RenderTarget::Html(html)),
            None => {
                self.refresh_page();
                self.host.notify_user(
                    "Cannot parse text content of current page, failed to switch reader mode.",
                );
            }
        }
    }

    /// Hand the page's readable text to the host as a text view.
    pub fn export_text(&mut self) {
        if !self.load_readability() {
            return;
        }
        let text = self.host.execute_js(READER_TEXT_JS);
        self.refresh_page();
        match text {
            Some(text) => {
                let name = format!("WEBTRAIL-TEXT-{}", self.current_url);
                self.host.show_text(&name, &text);
            }
            None => self
                .host
                .notify_user("Cannot parse text content of current page, failed to export text."),
        }
    }

    /// Save the reader version of the page to a temp file and open it in the
    /// host's text browser.
    pub fn render_reader_view(&mut self) {
        let Some(html) = self.readable_html() else {
            self.refresh_page();
            self.host
                .notify_user("Cannot parse text content of current page, failed to render it.");
            return;
        };
        self.refresh_page();
        match write_reader_file(&html) {
            Ok(path) => self.host.open_reader_view(&self.current_url, &path),
            Err(err) => {
                error!("failed to write reader view: {err}");
                self.host.notify_user(&format!("Failed to write reader view: {err}"));
            }
        }
    }

    /// Open the current page through the translation service in a new tab.
    pub fn translate_page(&self) {
        let language = if self.config.translate_language.is_empty() {
            system_language()
        } else {
            self.config.translate_language.clone()
        };
        self.host.navigate_new_tab(&translate_url(&self.current_url, &language));
        self.host.notify_user("Translating page...");
    }

    /// Make sure the download daemon runs, then open its web UI in a new tab.
    pub fn open_downloads_setting(&mut self) {
        let index = expand_path(&self.config.downloads_index);
        let index = match std::fs::canonicalize(&index) {
            Ok(path) if path.is_file() => path,
            _ => {
                let err = DownloadError::MissingIndex(index);
                warn!("{err}");
                self.host.notify_user(&format!("{err}."));
                return;
            }
        };
        if let Err(err) = downloads::ensure_daemon(&self.config.aria2) {
            error!("{err}");
            self.host.notify_user(&format!("{err}"));
            return;
        }
        match Url::from_file_path(&index) {
            Ok(url) => self.host.navigate_new_tab(url.as_str()),
            Err(()) => self
                .host
                .notify_user(&format!("Cannot open {}", index.display())),
        }
    }
}

fn write_reader_file(html: &str) -> std::io::Result<PathBuf> {
    let file = tempfile::Builder::new()
        .prefix("webtrail-reader-")
        .suffix(".html")
        .tempfile()?;
    let (mut out, path) = file.keep().map_err(|err| err.error)?;
    out.write_all(html.as_bytes())?;
    Ok(path)
}

/// Translation url for `page_url` into `language`.
pub fn translate_url(page_url: &str, language: &str) -> String {
    format!(
        "{TRANSLATE_URL}&tl={language}&u={}",
        urlencoding::encode(page_url)
    )
}

/// Language tag from the locale environment, e.g. `en_US.UTF-8` -> `en-US`.
fn system_language() -> String {
    ["LC_ALL", "LC_MESSAGES", "LANG"]
        .iter()
        .filter_map(|key| std::env::var(key).ok())
        .find_map(|raw| locale_tag(&raw))
        .unwrap_or_else(|| "en".to_string())
}

fn locale_tag(raw: &str) -> Option<String> {
    let base = raw.split(['.', '@']).next().unwrap_or("").trim();
    if base.is_empty() || base == "C" || base == "POSIX" {
        return None;
    }
    Some(base.replace('_', "-"))
}

fn page_host(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .host_str()
        .filter(|h| !h.is_empty())
        .map(str::to_string)
}

/// Turn user input into the url to load.
pub fn resolve_input(input: &str, search_template: &str) -> String {
    let trimmed = input.trim();
    if let Ok(url) = Url::parse(trimmed) {
        if matches!(url.scheme(), "http" | "https" | "file") {
            return url.to_string();
        }
    }
    if !trimmed.contains(char::is_whitespace) && trimmed.contains('.') {
        if let Ok(url) = Url::parse(&format!("http://{trimmed}")) {
            return url.to_string();
        }
    }
    search_template.replace("%s", &urlencoding::encode(trimmed))
}
