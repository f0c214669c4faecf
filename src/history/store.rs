use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::{debug, info};

use super::key::url_keys;
use super::log::{read_log, write_log};
use super::{HistoryEntry, HistoryError};

/// Score for a page seen for the first time.
pub const NEW_PAGE_HIT: f64 = 1.0;
/// Added when the visited page is already recorded.
pub const EXACT_HIT: f64 = 0.5;
/// Added to the recorded page whose url is the visited url minus its query
/// and fragment.
pub const PARENT_HIT: f64 = 0.25;

pub struct HistoryStore {
    path: PathBuf,
    entries: Vec<HistoryEntry>,
    ignore: Vec<Regex>,
}

impl HistoryStore {
    /// Load the log at `path`, creating it when missing.
    pub fn open(path: &Path, ignore: Vec<Regex>) -> Result<Self, HistoryError> {
        let entries = read_log(path)?;
        debug!("loaded {} history entries from {}", entries.len(), path.display());
        Ok(Self {
            path: path.to_path_buf(),
            entries,
            ignore,
        })
    }

    /// A store with nothing loaded that still writes to `path`.
    pub fn empty(path: &Path, ignore: Vec<Regex>) -> Self {
        Self {
            path: path.to_path_buf(),
            entries: Vec::new(),
            ignore,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Entries ordered by descending score.
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Merge a visit into the ranked list and rewrite the log.
    ///
    /// On error the in-memory list keeps whatever state the merge reached;
    /// the next successful visit writes it out.
    pub fn record_visit(&mut self, title: &str, url: &str) -> Result<(), HistoryError> {
        self.apply_visit(title, url);
        self.flush()
    }

    /// Merge, sort and prune for one visit without touching the log. Bulk
    /// imports apply every page this way and call [`flush`](Self::flush) once.
    pub fn apply_visit(&mut self, title: &str, url: &str) {
        merge_visit(&mut self.entries, title, url);
        self.entries.sort_by(|a, b| b.hit.total_cmp(&a.hit));
        let ignore = &self.ignore;
        self.entries.retain(|entry| keep_entry(entry, url, ignore));
    }

    /// Rewrite the log from the in-memory list.
    pub fn flush(&self) -> Result<(), HistoryError> {
        write_log(&self.path, &self.entries)
    }

    /// Drop every entry and delete the log. Returns false when there was no
    /// log to delete.
    pub fn clear(&mut self) -> Result<bool, HistoryError> {
        self.entries.clear();
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
            info!("removed history log {}", self.path.display());
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

/// Apply the exact-page and parent-page hits for a visit, appending a new
/// entry when the page is not recorded yet.
///
/// The parent hit goes to the first entry whose url equals the visited url
/// cut at its query or fragment; it may be the same row as the exact hit.
pub fn merge_visit(entries: &mut Vec<HistoryEntry>, title: &str, url: &str) {
    let Some(keys) = url_keys(url) else {
        debug!("not merging history for unsupported url {url}");
        return;
    };

    let mut exact: Option<usize> = None;
    let mut parent: Option<usize> = None;
    for (idx, entry) in entries.iter().enumerate() {
        if parent.is_none() && keys.stripped.as_deref() == Some(entry.url.as_str()) {
            parent = Some(idx);
        }
        if exact.is_none() && url_keys(&entry.url).is_some_and(|k| k.prefix == keys.prefix) {
            exact = Some(idx);
        }
        if exact.is_some() && (parent.is_some() || keys.stripped.is_none()) {
            break;
        }
    }

    if let Some(idx) = parent {
        entries[idx].hit += PARENT_HIT;
    }
    match exact {
        Some(idx) => {
            let entry = &mut entries[idx];
            entry.title = title.to_string();
            entry.url = url.to_string();
            entry.hit += EXACT_HIT;
        }
        None => entries.push(HistoryEntry::new(title, url, NEW_PAGE_HIT)),
    }
}

/// An ignore-listed entry survives only while it is the page being visited
/// or after it has been revisited.
fn keep_entry(entry: &HistoryEntry, visited_url: &str, ignore: &[Regex]) -> bool {
    if !ignore.iter().any(|re| re.is_match(&entry.url)) {
        return true;
    }
    entry.url == visited_url || entry.hit > NEW_PAGE_HIT
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::RegexBuilder;
    use tempfile::tempdir;

    fn store_in(dir: &Path, ignore: &[&str]) -> HistoryStore {
        let ignore = ignore
            .iter()
            .map(|p| RegexBuilder::new(p).case_insensitive(true).build().expect("regex"))
            .collect();
        HistoryStore::open(&dir.join("log.txt"), ignore).expect("open")
    }

    #[test]
    fn first_visit_appends_with_unit_score() {
        let mut entries = Vec::new();
        merge_visit(&mut entries, "A", "http://x/a");
        assert_eq!(entries, vec![HistoryEntry::new("A", "http://x/a", 1.0)]);
    }

    #[test]
    fn two_revisits_reach_two() {
        let dir = tempdir().expect("tempdir");
        let mut store = store_in(dir.path(), &[]);
        store.record_visit("Page", "http://x/?q=1").expect("visit");
        store.record_visit("Page", "http://x/?q=1").expect("visit");
        store.record_visit("Page", "http://x/?q=1").expect("visit");
        assert_eq!(store.entries().len(), 1);
        assert_eq!(store.entries()[0].hit, 2.0);
    }

    #[test]
    fn query_visit_bumps_stripped_url_once() {
        let mut entries = vec![
            HistoryEntry::new("Docs", "http://x/docs", 1.0),
            HistoryEntry::new("Docs copy", "http://x/docs", 1.0),
        ];
        merge_visit(&mut entries, "Tab", "http://x/docs?tab=2");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], HistoryEntry::new("Tab", "http://x/docs?tab=2", 1.75));
        assert_eq!(entries[1].hit, 1.0);
    }

    #[test]
    fn parent_and_exact_hits_can_land_on_different_rows() {
        let mut entries = vec![
            HistoryEntry::new("Tab one", "http://x/docs?tab=1", 1.0),
            HistoryEntry::new("Docs", "http://x/docs", 1.0),
        ];
        merge_visit(&mut entries, "Tab two", "http://x/docs?tab=2");
        assert_eq!(entries[0], HistoryEntry::new("Tab two", "http://x/docs?tab=2", 1.5));
        assert_eq!(entries[1], HistoryEntry::new("Docs", "http://x/docs", 1.25));
    }

    #[test]
    fn query_variant_takes_both_hits_on_one_row() {
        let mut entries = Vec::new();
        merge_visit(&mut entries, "A", "http://x/");
        merge_visit(&mut entries, "B", "http://x/?q=1");
        assert_eq!(entries, vec![HistoryEntry::new("B", "http://x/?q=1", 1.75)]);
    }

    #[test]
    fn path_child_does_not_touch_parent_directory() {
        let mut entries = vec![HistoryEntry::new("Docs", "http://x/docs/", 1.0)];
        merge_visit(&mut entries, "Intro", "http://x/docs/intro");
        assert_eq!(entries[0].hit, 1.0);
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn applied_visits_reach_disk_only_on_flush() {
        let dir = tempdir().expect("tempdir");
        let mut store = store_in(dir.path(), &[]);
        store.apply_visit("A", "http://a/");
        store.apply_visit("B", "http://b/");
        store.apply_visit("A", "http://a/");
        assert_eq!(std::fs::read_to_string(store.path()).expect("read"), "");

        store.flush().expect("flush");
        assert_eq!(
            std::fs::read_to_string(store.path()).expect("read"),
            "Aᛝhttp://a/ᛡ1.5\nBᛝhttp://b/ᛡ1\n"
        );
    }

    #[test]
    fn unsupported_scheme_is_not_recorded() {
        let mut entries = vec![HistoryEntry::new("A", "http://x/", 1.0)];
        merge_visit(&mut entries, "Blank", "about:blank");
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn sorts_descending_with_insertion_tiebreak() {
        let dir = tempdir().expect("tempdir");
        let mut store = store_in(dir.path(), &[]);
        store.record_visit("One", "http://one/").expect("visit");
        store.record_visit("Two", "http://two/").expect("visit");
        store.record_visit("Three", "http://three/").expect("visit");
        store.record_visit("Two", "http://two/").expect("visit");
        let urls: Vec<&str> = store.entries().iter().map(|e| e.url.as_str()).collect();
        assert_eq!(urls, vec!["http://two/", "http://one/", "http://three/"]);
    }

    #[test]
    fn ignored_single_hit_dropped_on_next_write() {
        let dir = tempdir().expect("tempdir");
        let mut store = store_in(dir.path(), &["search"]);
        store.record_visit("Results", "https://example.com/search?q=rust").expect("visit");
        assert_eq!(store.entries().len(), 1);
        let on_disk = std::fs::read_to_string(store.path()).expect("read");
        assert!(on_disk.contains("search?q=rust"));

        store.record_visit("Home", "https://example.com/home").expect("visit");
        assert_eq!(store.entries().len(), 1);
        assert_eq!(store.entries()[0].url, "https://example.com/home");
        let on_disk = std::fs::read_to_string(store.path()).expect("read");
        assert!(!on_disk.contains("search"));
    }

    #[test]
    fn revisited_ignored_entry_survives() {
        let dir = tempdir().expect("tempdir");
        let mut store = store_in(dir.path(), &["SEARCH"]);
        store.record_visit("Results", "https://example.com/search").expect("visit");
        store.record_visit("Results", "https://example.com/search").expect("visit");
        store.record_visit("Home", "https://example.com/home").expect("visit");
        assert_eq!(store.entries().len(), 2);
        assert_eq!(store.entries()[0].hit, 1.5);
    }

    #[test]
    fn clear_removes_log() {
        let dir = tempdir().expect("tempdir");
        let mut store = store_in(dir.path(), &[]);
        store.record_visit("A", "http://a/").expect("visit");
        assert!(store.clear().expect("clear"));
        assert!(store.entries().is_empty());
        assert!(!store.clear().expect("clear again"));
    }
}
