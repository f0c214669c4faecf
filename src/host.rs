//! # Host
//!
//! Capabilities the embedding editor provides to a browser buffer. Rendering,
//! prompts and tab management all live on the other side of this trait.

use std::cell::RefCell;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::credentials::CredentialRecord;

/// What the buffer asks the host to display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderTarget {
    Url(String),
    Html(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CookieScope {
    All,
    CurrentPage,
}

/// A stylesheet change applied to the current page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StyleChange {
    Load(String),
    Remove(String),
}

pub trait Host {
    fn render(&self, target: RenderTarget);
    fn notify_user(&self, message: &str);
    fn ask_yes_no(&self, prompt: &str) -> bool;
    fn get_setting(&self, name: &str) -> Option<String>;
    fn navigate_new_tab(&self, url: &str);
    fn delete_cookies(&self, scope: CookieScope);
    /// Fill the current page's login form from a saved record.
    fn fill_credentials(&self, record: &CredentialRecord);
    /// Persist a setting so later buffers start with it.
    fn set_setting(&self, name: &str, value: &str);
    /// Inject `css` into the page under `id`, replacing an earlier sheet with
    /// the same id.
    fn load_css(&self, id: &str, css: &str);
    fn remove_css(&self, id: &str);
    /// Evaluate a script in the page and return its result as a string, or
    /// `None` when the script produced nothing.
    fn execute_js(&self, script: &str) -> Option<String>;
    /// Show extracted page text in a plain text view named `name`.
    fn show_text(&self, name: &str, text: &str);
    /// Open a saved reader-mode page in the host's text browser.
    fn open_reader_view(&self, source_url: &str, html_path: &Path);
}

/// Host backed by the terminal. Settings come from `WEBTRAIL_*` environment
/// variables, e.g. `enable-autofill` reads `WEBTRAIL_ENABLE_AUTOFILL`.
pub struct ConsoleHost {
    assume_yes: bool,
}

impl ConsoleHost {
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }
}

impl Host for ConsoleHost {
    fn render(&self, target: RenderTarget) {
        match target {
            RenderTarget::Url(url) => info!("render {url}"),
            RenderTarget::Html(html) => info!("render html ({} bytes)", html.len()),
        }
    }

    fn notify_user(&self, message: &str) {
        println!("{message}");
    }

    fn ask_yes_no(&self, prompt: &str) -> bool {
        if self.assume_yes {
            return true;
        }
        print!("{prompt} (yes or no) ");
        let _ = std::io::stdout().flush();
        let mut answer = String::new();
        if std::io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }

    fn get_setting(&self, name: &str) -> Option<String> {
        let key = format!("WEBTRAIL_{}", name.replace('-', "_").to_ascii_uppercase());
        std::env::var(key).ok()
    }

    fn navigate_new_tab(&self, url: &str) {
        println!("open tab {url}");
    }

    fn delete_cookies(&self, scope: CookieScope) {
        println!("delete cookies ({scope:?})");
    }

    fn fill_credentials(&self, record: &CredentialRecord) {
        println!(
            "autofill {} with saved entry {} ({} fields)",
            record.host,
            record.id,
            record.form_fields.0.len()
        );
    }

    fn set_setting(&self, name: &str, value: &str) {
        info!("setting {name} = {value}");
    }

    fn load_css(&self, id: &str, css: &str) {
        info!("load css {id} ({} bytes)", css.len());
    }

    fn remove_css(&self, id: &str) {
        info!("remove css {id}");
    }

    fn execute_js(&self, script: &str) -> Option<String> {
        debug!("no page to run {} bytes of script in", script.len());
        None
    }

    fn show_text(&self, name: &str, text: &str) {
        println!("== {name} ==\n{text}");
    }

    fn open_reader_view(&self, source_url: &str, html_path: &Path) {
        println!("reader view of {source_url}: {}", html_path.display());
    }
}

/// In-memory host that records every call; answers prompts with a fixed reply
/// and scripts from `js_answers`, keyed by the exact script text.
#[derive(Default)]
pub struct MemoryHost {
    pub answer: bool,
    pub settings: Vec<(String, String)>,
    pub js_answers: Vec<(String, String)>,
    pub messages: RefCell<Vec<String>>,
    pub rendered: RefCell<Vec<RenderTarget>>,
    pub tabs: RefCell<Vec<String>>,
    pub prompts: RefCell<Vec<String>>,
    pub cookie_deletions: RefCell<Vec<CookieScope>>,
    pub fills: RefCell<Vec<CredentialRecord>>,
    pub settings_written: RefCell<Vec<(String, String)>>,
    pub styles: RefCell<Vec<StyleChange>>,
    pub scripts: RefCell<Vec<String>>,
    pub texts: RefCell<Vec<(String, String)>>,
    pub reader_views: RefCell<Vec<(String, PathBuf)>>,
}

impl MemoryHost {
    pub fn answering(answer: bool) -> Self {
        Self {
            answer,
            ..Self::default()
        }
    }

    pub fn last_message(&self) -> Option<String> {
        self.messages.borrow().last().cloned()
    }
}

impl Host for MemoryHost {
    fn render(&self, target: RenderTarget) {
        self.rendered.borrow_mut().push(target);
    }

    fn notify_user(&self, message: &str) {
        self.messages.borrow_mut().push(message.to_string());
    }

    fn ask_yes_no(&self, prompt: &str) -> bool {
        self.prompts.borrow_mut().push(prompt.to_string());
        self.answer
    }

    fn get_setting(&self, name: &str) -> Option<String> {
        self.settings
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
    }

    fn navigate_new_tab(&self, url: &str) {
        self.tabs.borrow_mut().push(url.to_string());
    }

    fn delete_cookies(&self, scope: CookieScope) {
        self.cookie_deletions.borrow_mut().push(scope);
    }

    fn fill_credentials(&self, record: &CredentialRecord) {
        self.fills.borrow_mut().push(record.clone());
    }

    fn set_setting(&self, name: &str, value: &str) {
        self.settings_written
            .borrow_mut()
            .push((name.to_string(), value.to_string()));
    }

    fn load_css(&self, id: &str, _css: &str) {
        self.styles.borrow_mut().push(StyleChange::Load(id.to_string()));
    }

    fn remove_css(&self, id: &str) {
        self.styles.borrow_mut().push(StyleChange::Remove(id.to_string()));
    }

    fn execute_js(&self, script: &str) -> Option<String> {
        self.scripts.borrow_mut().push(script.to_string());
        self.js_answers
            .iter()
            .find(|(key, _)| key == script)
            .map(|(_, value)| value.clone())
    }

    fn show_text(&self, name: &str, text: &str) {
        self.texts
            .borrow_mut()
            .push((name.to_string(), text.to_string()));
    }

    fn open_reader_view(&self, source_url: &str, html_path: &Path) {
        self.reader_views
            .borrow_mut()
            .push((source_url.to_string(), html_path.to_path_buf()));
    }
}
