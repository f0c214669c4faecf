use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{Connection, ErrorCode, OpenFlags};
use thiserror::Error;
use tracing::{debug, warn};

/// Browsers whose history databases can be imported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Browser {
    Chrome,
    Safari,
}

impl Browser {
    pub fn name(self) -> &'static str {
        match self {
            Browser::Chrome => "chrome",
            Browser::Safari => "safari",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedPage {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("history file {0} does not exist")]
    Missing(PathBuf),
    #[error("history file {0} is locked")]
    Locked(PathBuf),
    #[error("malformed history database: {0}")]
    Malformed(String),
    #[error("sqlite error: {0}")]
    Sqlite(rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ImportError {
    fn from_sqlite(path: &Path, err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => {
                ImportError::Locked(path.to_path_buf())
            }
            _ => ImportError::Sqlite(err),
        }
    }
}

fn open_read_only(path: &Path) -> Result<Connection, ImportError> {
    if !path.exists() {
        return Err(ImportError::Missing(path.to_path_buf()));
    }
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|err| ImportError::from_sqlite(path, err))?;
    // A running browser keeps its history locked; fail fast instead of waiting.
    conn.busy_timeout(Duration::from_millis(250))
        .map_err(|err| ImportError::from_sqlite(path, err))?;
    Ok(conn)
}

/// Read a Chrome `History` database, oldest visit first.
pub fn read_chrome(path: &Path) -> Result<Vec<ImportedPage>, ImportError> {
    let conn = open_read_only(path)?;
    let sqlite_err = |err: rusqlite::Error| ImportError::from_sqlite(path, err);

    let mut stmt = conn
        .prepare("SELECT title, url FROM urls ORDER BY last_visit_time ASC")
        .map_err(sqlite_err)?;
    let rows = stmt
        .query_map([], |row| {
            let title: Option<String> = row.get(0)?;
            let url: String = row.get(1)?;
            Ok((title, url))
        })
        .map_err(sqlite_err)?;

    let mut out = Vec::new();
    for row in rows {
        let (title, url) = row.map_err(sqlite_err)?;
        out.push(ImportedPage {
            title: title.unwrap_or_default(),
            url,
        });
    }
    debug!("read {} chrome history rows from {}", out.len(), path.display());
    Ok(out)
}

/// Read a Safari `History.db`.
///
/// Only visits at or after the time saved in `marker_path` update a page's
/// title; the newest visit time is written back to the marker. Pages that end
/// up without a title are not imported.
pub fn read_safari(path: &Path, marker_path: &Path) -> Result<Vec<ImportedPage>, ImportError> {
    let conn = open_read_only(path)?;
    let sqlite_err = |err: rusqlite::Error| ImportError::from_sqlite(path, err);

    let mut stmt = conn
        .prepare("SELECT id, url FROM history_items")
        .map_err(sqlite_err)?;
    let items: Vec<(i64, String)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .map_err(sqlite_err)?
        .collect::<Result<_, _>>()
        .map_err(sqlite_err)?;

    let mut stmt = conn
        .prepare(
            "SELECT history_item, visit_time, title FROM history_visits ORDER BY visit_time ASC",
        )
        .map_err(sqlite_err)?;
    let visits: Vec<(i64, f64, Option<String>)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
        .map_err(sqlite_err)?
        .collect::<Result<_, _>>()
        .map_err(sqlite_err)?;

    let since = read_marker(marker_path);
    let mut titles: HashMap<i64, String> = items.iter().map(|(id, _)| (*id, String::new())).collect();
    for (item, visit_time, title) in &visits {
        if *visit_time < since {
            continue;
        }
        let Some(slot) = titles.get_mut(item) else {
            return Err(ImportError::Malformed(format!(
                "visit references unknown history item {item}"
            )));
        };
        *slot = title.clone().unwrap_or_default();
    }

    if let Some((_, latest, _)) = visits.last() {
        if let Some(parent) = marker_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(marker_path, latest.to_string())?;
    }

    let out: Vec<ImportedPage> = items
        .into_iter()
        .filter_map(|(id, url)| {
            let title = titles.remove(&id)?;
            (!title.is_empty()).then_some(ImportedPage { title, url })
        })
        .collect();
    debug!("read {} safari history rows from {}", out.len(), path.display());
    Ok(out)
}

fn read_marker(path: &Path) -> f64 {
    let Ok(raw) = fs::read_to_string(path) else {
        return 0.0;
    };
    match raw.trim().parse::<f64>() {
        Ok(value) => value,
        Err(err) => {
            warn!("failed to read {}: {err}", path.display());
            0.0
        }
    }
}

/// Keep one page per title: the first occurrence fixes the position, the
/// last one supplies the url.
pub fn dedupe_by_title(pages: Vec<ImportedPage>) -> Vec<ImportedPage> {
    let mut out: Vec<ImportedPage> = Vec::with_capacity(pages.len());
    let mut index: HashMap<String, usize> = HashMap::new();
    for page in pages {
        match index.get(&page.title) {
            Some(&pos) => out[pos].url = page.url,
            None => {
                index.insert(page.title.clone(), out.len());
                out.push(page);
            }
        }
    }
    out
}
