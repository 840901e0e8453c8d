//! Write journal for compensating rollback

use super::fs::Filesystem;
use camino::Utf8PathBuf;
use tracing::{debug, warn};

#[derive(Debug)]
enum JournalEntry {
    CreatedDir(Utf8PathBuf),
    CreatedFile(Utf8PathBuf),
    ReplacedFile {
        path: Utf8PathBuf,
        original: Vec<u8>,
    },
}

/// Every change made to disk during one materialization, in order
#[derive(Debug, Default)]
pub struct WriteJournal {
    entries: Vec<JournalEntry>,
}

impl WriteJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn created_dir(&mut self, path: Utf8PathBuf) {
        self.entries.push(JournalEntry::CreatedDir(path));
    }

    pub fn created_file(&mut self, path: Utf8PathBuf) {
        self.entries.push(JournalEntry::CreatedFile(path));
    }

    pub fn replaced_file(&mut self, path: Utf8PathBuf, original: Vec<u8>) {
        self.entries.push(JournalEntry::ReplacedFile { path, original });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Undo every recorded change, newest first.
    ///
    /// Directories are recorded parent before child, so undoing in reverse
    /// removes files before their directories and the deepest directories
    /// first. Returns the paths that could not be restored.
    pub fn rollback(self, fs: &dyn Filesystem) -> Vec<Utf8PathBuf> {
        let mut failed = Vec::new();
        debug!("Rolling back {} change(s)", self.entries.len());

        for entry in self.entries.into_iter().rev() {
            let (path, result) = match entry {
                JournalEntry::CreatedFile(path) => {
                    let result = fs.remove_file(&path);
                    (path, result)
                }
                JournalEntry::ReplacedFile { path, original } => {
                    let result = fs.write_file(&path, &original);
                    (path, result)
                }
                JournalEntry::CreatedDir(path) => {
                    let result = fs.remove_dir(&path);
                    (path, result)
                }
            };
            if let Err(e) = result {
                warn!("Rollback could not restore {}: {}", path, e);
                failed.push(path);
            }
        }

        failed
    }
}
