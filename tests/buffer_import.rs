mod common;

use rusqlite::Connection;

use webtrail::buffer::ConfirmAction;
use webtrail::history::import::Browser;
use webtrail::host::MemoryHost;

#[test]
fn chrome_import_records_deduplicated_pages() {
    let dir = tempfile::tempdir().expect("tempdir");
    let chrome = dir.path().join("History");
    common::write_chrome_history(
        &chrome,
        &[
            ("https://docs.rs/serde", "serde", 30),
            ("https://crates.io/", "crates.io", 10),
            ("https://docs.rs/serde/latest", "serde", 40),
            ("https://docs.rs/", "Docs.rs", 20),
        ],
    );

    let mut config = common::config_in(dir.path());
    config.chrome_history_file = chrome.to_string_lossy().to_string();
    let mut buffer = common::open_buffer(config, MemoryHost::answering(true));

    buffer.request(ConfirmAction::ImportHistory(Browser::Chrome));

    let messages = buffer.host().messages.borrow().clone();
    assert_eq!(
        messages.last().map(String::as_str),
        Some("3 chrome history entries imported.")
    );
    assert!(messages.iter().any(|m| m == "Importing 3 / 3 ..."));

    let urls: Vec<String> = buffer
        .history_entries()
        .iter()
        .map(|e| e.url.clone())
        .collect();
    assert_eq!(urls.len(), 3);
    assert!(urls.contains(&"https://docs.rs/serde/latest".to_string()));
    assert!(!urls.contains(&"https://docs.rs/serde".to_string()));

    let log = std::fs::read_to_string(dir.path().join("history").join("log.txt")).expect("log");
    assert_eq!(log.lines().count(), 3);
    assert!(log.contains("serdeᛝhttps://docs.rs/serde/latestᛡ1\n"));
}

#[test]
fn locked_chrome_history_gets_its_own_message() {
    let dir = tempfile::tempdir().expect("tempdir");
    let chrome = dir.path().join("History");
    common::write_chrome_history(&chrome, &[("https://a.example/", "A", 1)]);

    let holder = Connection::open(&chrome).expect("holder");
    holder.execute_batch("BEGIN EXCLUSIVE;").expect("lock");

    let mut config = common::config_in(dir.path());
    config.chrome_history_file = chrome.to_string_lossy().to_string();
    let mut buffer = common::open_buffer(config, MemoryHost::answering(true));
    buffer.confirm(ConfirmAction::ImportHistory(Browser::Chrome));

    assert_eq!(
        buffer.host().last_message().as_deref(),
        Some("The chrome history file is locked, please close your chrome app first.")
    );
    assert!(buffer.history_entries().is_empty());
    holder.execute_batch("COMMIT;").expect("unlock");
}

#[test]
fn declined_import_does_nothing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let chrome = dir.path().join("History");
    common::write_chrome_history(&chrome, &[("https://a.example/", "A", 1)]);

    let mut config = common::config_in(dir.path());
    config.chrome_history_file = chrome.to_string_lossy().to_string();
    let mut buffer = common::open_buffer(config, MemoryHost::answering(false));
    buffer.request(ConfirmAction::ImportHistory(Browser::Chrome));

    assert!(buffer.host().messages.borrow().is_empty());
    assert!(buffer.history_entries().is_empty());
    assert_eq!(
        buffer.host().prompts.borrow().as_slice(),
        &["Are you sure you want to import all history from chrome?".to_string()]
    );
}
