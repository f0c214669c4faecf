use std::fs;
use std::io::Write;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::{HistoryEntry, HistoryError};

/// Separates title from url.
pub const TITLE_SEP: char = 'ᛝ';
/// Separates url from score.
pub const SCORE_SEP: char = 'ᛡ';

static LEGACY_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.*)\s((?:https?|file):\S+)$").expect("legacy history pattern"));

/// Parse one log line. Current lines are `title ᛝ url ᛡ score`; older logs
/// stored `title url` with an implicit score of 1.
pub fn parse_line(raw: &str) -> Option<HistoryEntry> {
    let line = raw.trim_end_matches(['\n', '\r']);
    if line.is_empty() {
        return None;
    }

    if let Some((head, score)) = line.rsplit_once(SCORE_SEP) {
        if let Some((title, url)) = head.rsplit_once(TITLE_SEP) {
            if title.is_empty() || url.is_empty() {
                return None;
            }
            let hit: f64 = score.trim().parse().ok()?;
            if !hit.is_finite() || hit < 0.0 {
                return None;
            }
            return Some(HistoryEntry::new(title, url, hit));
        }
    }

    let caps = LEGACY_LINE.captures(line)?;
    Some(HistoryEntry::new(&caps[1], &caps[2], 1.0))
}

pub fn format_line(entry: &HistoryEntry) -> String {
    let title = entry.title.replace(['\n', '\r'], " ");
    format!("{title}{TITLE_SEP}{}{SCORE_SEP}{}\n", entry.url, entry.hit)
}

/// Read the log, creating an empty one (and its directory) when absent.
/// Lines that do not parse are skipped.
pub fn read_log(path: &Path) -> Result<Vec<HistoryEntry>, HistoryError> {
    if !path.exists() {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::File::create(path)?;
        return Ok(Vec::new());
    }
    parse_log(path)
}

/// Read the log without creating anything; a missing log is empty.
pub fn read_existing(path: &Path) -> Result<Vec<HistoryEntry>, HistoryError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    parse_log(path)
}

fn parse_log(path: &Path) -> Result<Vec<HistoryEntry>, HistoryError> {
    let bytes = fs::read(path)?;
    let content = String::from_utf8_lossy(&bytes);
    let mut entries = Vec::new();
    let mut skipped = 0usize;
    for line in content.lines() {
        match parse_line(line) {
            Some(entry) => entries.push(entry),
            None if line.trim().is_empty() => {}
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        debug!("skipped {skipped} malformed history lines in {}", path.display());
    }
    Ok(entries)
}

/// Replace the log with `entries`, writing through a sibling temp file.
pub fn write_log(path: &Path, entries: &[HistoryEntry]) -> Result<(), HistoryError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("txt.tmp");
    {
        let mut out = std::io::BufWriter::new(fs::File::create(&tmp)?);
        for entry in entries {
            out.write_all(format_line(entry).as_bytes())?;
        }
        out.flush()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parses_current_format() {
        let entry = parse_line("Rust Blog ᛝhttps://blog.rust-lang.org/ᛡ2.25\n").expect("entry");
        assert_eq!(entry.title, "Rust Blog ");
        assert_eq!(entry.url, "https://blog.rust-lang.org/");
        assert_eq!(entry.hit, 2.25);
    }

    #[test]
    fn parses_legacy_format_with_implicit_score() {
        let entry = parse_line("Example Domain https://example.com/").expect("entry");
        assert_eq!(entry.title, "Example Domain");
        assert_eq!(entry.url, "https://example.com/");
        assert_eq!(entry.hit, 1.0);
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(parse_line("no url here").is_none());
        assert!(parse_line("titleᛝhttp://x/ᛡlots").is_none());
        assert!(parse_line("titleᛝhttp://x/ᛡ-1").is_none());
        assert!(parse_line("ᛝhttp://x/ᛡ1").is_none());
        assert!(parse_line("").is_none());
    }

    #[test]
    fn formats_shortest_score() {
        let line = format_line(&HistoryEntry::new("Home", "http://x/", 1.0));
        assert_eq!(line, "Homeᛝhttp://x/ᛡ1\n");
        let line = format_line(&HistoryEntry::new("multi\nline", "http://x/", 1.25));
        assert_eq!(line, "multi lineᛝhttp://x/ᛡ1.25\n");
    }

    #[test]
    fn read_creates_missing_log_and_skips_garbage() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("history").join("log.txt");
        assert!(read_log(&path).expect("read").is_empty());
        assert!(path.exists());

        fs::write(
            &path,
            "Aᛝhttp://a/ᛡ1.5\ngarbage\n\nOld http://old.example/\nBᛝhttp://b/ᛡnope\n",
        )
        .expect("write");
        let entries = read_log(&path).expect("read");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].url, "http://a/");
        assert_eq!(entries[1].title, "Old");
    }

    #[test]
    fn read_existing_leaves_missing_log_alone() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("history").join("log.txt");
        assert!(read_existing(&path).expect("read").is_empty());
        assert!(!path.exists());
        assert!(!dir.path().join("history").exists());

        fs::create_dir_all(dir.path().join("history")).expect("dir");
        fs::write(&path, "Aᛝhttp://a/ᛡ2\n").expect("write");
        assert_eq!(read_existing(&path).expect("read").len(), 1);
    }

    #[test]
    fn write_replaces_whole_file() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("log.txt");
        fs::write(&path, "stale content\n").expect("write");
        write_log(&path, &[HistoryEntry::new("A", "http://a/", 2.0)]).expect("write log");
        assert_eq!(fs::read_to_string(&path).expect("read"), "Aᛝhttp://a/ᛡ2\n");
    }
}
