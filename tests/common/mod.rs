//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::path::Path;

use rusqlite::Connection;

use webtrail::buffer::{BrowserBuffer, BufferSource};
use webtrail::config::BrowserConfig;
use webtrail::host::MemoryHost;

pub fn config_in(dir: &Path) -> BrowserConfig {
    BrowserConfig {
        data_dir: dir.to_string_lossy().to_string(),
        ..BrowserConfig::default()
    }
}

pub fn open_buffer(config: BrowserConfig, host: MemoryHost) -> BrowserBuffer<MemoryHost> {
    BrowserBuffer::new(
        config,
        host,
        BufferSource::Url("https://start.example/".to_string()),
    )
}

/// Write a minimal Chrome `History` database.
pub fn write_chrome_history(path: &Path, rows: &[(&str, &str, i64)]) {
    let conn = Connection::open(path).expect("conn");
    conn.execute(
        "CREATE TABLE urls (id INTEGER PRIMARY KEY, url TEXT, title TEXT, last_visit_time INTEGER)",
        [],
    )
    .expect("create");
    for (url, title, time) in rows {
        conn.execute(
            "INSERT INTO urls (url, title, last_visit_time) VALUES (?1, ?2, ?3)",
            (url, title, time),
        )
        .expect("insert");
    }
}
