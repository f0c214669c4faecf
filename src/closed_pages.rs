use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Stack of recently closed page urls, one per line.
pub struct ClosedPages {
    path: PathBuf,
}

impl ClosedPages {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(&self, url: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", url.trim())?;
        Ok(())
    }

    /// Pop the most recently closed url and drop it from the file.
    pub fn recover(&self) -> std::io::Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)?;
        let mut urls: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
        let Some(last) = urls.pop() else {
            return Ok(None);
        };
        let last = last.trim().to_string();

        let mut rest = urls.join("\n");
        if !rest.is_empty() {
            rest.push('\n');
        }
        fs::write(&self.path, rest)?;
        Ok(Some(last))
    }
}
