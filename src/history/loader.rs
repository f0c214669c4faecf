//! Background load of the history log.
//!
//! The buffer starts loading at construction so page display is not held up,
//! then joins the loader the first time it needs the list. Nothing touches the
//! entries before that join.

use std::path::PathBuf;
use std::thread;

use crossbeam_channel::{Receiver, bounded};
use regex::Regex;
use tracing::{debug, warn};

use super::{HistoryError, HistoryStore};

pub struct PendingHistory {
    path: PathBuf,
    rx: Receiver<Result<HistoryStore, HistoryError>>,
    handle: Option<thread::JoinHandle<()>>,
}

/// Spawn the loader thread for the log at `path`.
pub fn spawn_load(path: PathBuf, ignore: Vec<Regex>) -> PendingHistory {
    let (tx, rx) = bounded(1);
    let thread_path = path.clone();
    let handle = thread::spawn(move || {
        let result = HistoryStore::open(&thread_path, ignore);
        if tx.send(result).is_err() {
            debug!("history load finished after its receiver was dropped");
        }
    });
    PendingHistory {
        path,
        rx,
        handle: Some(handle),
    }
}

impl PendingHistory {
    /// Block until the loader is done.
    pub fn wait(mut self) -> Result<HistoryStore, HistoryError> {
        let result = self.rx.recv().map_err(|_| HistoryError::LoaderGone);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("history loader for {} panicked", self.path.display());
            }
        }
        result?
    }

    /// Like [`wait`](Self::wait) but never fails: a load error yields an
    /// empty store bound to the same log.
    pub fn wait_or_empty(self, ignore: Vec<Regex>) -> HistoryStore {
        let path = self.path.clone();
        match self.wait() {
            Ok(store) => store,
            Err(err) => {
                warn!("history load failed for {}: {err}", path.display());
                HistoryStore::empty(&path, ignore)
            }
        }
    }
}
