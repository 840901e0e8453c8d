//! Materializer
//!
//! Writes the rendered file set into the output directory as one unit.
//! Every change is journaled; any failure or cancellation replays the
//! journal backwards before the error is returned, so a failed run leaves
//! the output directory as it found it.

mod fs;
mod journal;

pub use fs::{Filesystem, LocalFilesystem};
pub use journal::WriteJournal;

use camino::{Utf8Path, Utf8PathBuf};
use kiln_core::types::{RenderedFile, WriteMode};
use kiln_core::{Error, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What a successful materialization did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterializeReport {
    /// Written paths relative to the output directory, sorted
    pub written: Vec<Utf8PathBuf>,

    /// Existing files left untouched in merge mode, sorted
    pub kept: Vec<Utf8PathBuf>,
}

/// Single writer of the output directory
#[derive(Clone)]
pub struct Materializer {
    fs: Arc<dyn Filesystem>,
}

impl Materializer {
    pub fn new(fs: Arc<dyn Filesystem>) -> Self {
        Self { fs }
    }

    /// Write `files` (paths relative to `output_dir`) under `mode`
    pub fn materialize(
        &self,
        output_dir: &Utf8Path,
        files: &[RenderedFile],
        mode: WriteMode,
        cancel: &CancellationToken,
    ) -> Result<MaterializeReport> {
        let mut journal = WriteJournal::new();
        match self.write_all(output_dir, files, mode, cancel, &mut journal) {
            Ok(report) => {
                info!(
                    "Materialized {} file(s) into {}",
                    report.written.len(),
                    output_dir
                );
                Ok(report)
            }
            Err(e) => {
                warn!("Materialization failed, rolling back: {}", e);
                let failed = journal.rollback(self.fs.as_ref());
                if !failed.is_empty() {
                    warn!("{} path(s) could not be rolled back", failed.len());
                }
                Err(e)
            }
        }
    }

    fn write_all(
        &self,
        output_dir: &Utf8Path,
        files: &[RenderedFile],
        mode: WriteMode,
        cancel: &CancellationToken,
        journal: &mut WriteJournal,
    ) -> Result<MaterializeReport> {
        self.prepare_output_dir(output_dir, mode, journal)?;

        let mut ordered: Vec<&RenderedFile> = files.iter().collect();
        ordered.sort_by(|a, b| a.path.cmp(&b.path));

        let mut report = MaterializeReport::default();
        for file in ordered {
            if cancel.is_cancelled() {
                return Err(Error::cancelled("materialize"));
            }

            let target = output_dir.join(&file.path);
            if let Some(parent) = target.parent() {
                self.ensure_dir(parent, journal)?;
            }

            if self.fs.exists(&target) {
                if self.fs.is_dir(&target) {
                    return Err(Error::materialize(
                        target.as_str(),
                        "a directory exists at this path",
                    ));
                }
                match mode {
                    WriteMode::Create => {
                        return Err(Error::materialize(target.as_str(), "file already exists"));
                    }
                    WriteMode::Merge => {
                        debug!("Keeping existing {}", target);
                        report.kept.push(file.path.clone());
                        continue;
                    }
                    WriteMode::Overwrite => {
                        let original = self
                            .fs
                            .read_file(&target)
                            .map_err(|e| Error::materialize(target.as_str(), e.to_string()))?;
                        self.fs
                            .write_file(&target, &file.contents)
                            .map_err(|e| Error::materialize(target.as_str(), e.to_string()))?;
                        journal.replaced_file(target, original);
                    }
                }
            } else {
                self.fs
                    .write_file(&target, &file.contents)
                    .map_err(|e| Error::materialize(target.as_str(), e.to_string()))?;
                journal.created_file(target);
            }

            debug!("Wrote {}", file.path);
            report.written.push(file.path.clone());
        }

        Ok(report)
    }

    fn prepare_output_dir(
        &self,
        output_dir: &Utf8Path,
        mode: WriteMode,
        journal: &mut WriteJournal,
    ) -> Result<()> {
        if !self.fs.exists(output_dir) {
            return self.ensure_dir(output_dir, journal);
        }
        if !self.fs.is_dir(output_dir) {
            return Err(Error::materialize(
                output_dir.as_str(),
                "output path exists and is not a directory",
            ));
        }
        if mode == WriteMode::Create {
            let empty = self
                .fs
                .is_dir_empty(output_dir)
                .map_err(|e| Error::materialize(output_dir.as_str(), e.to_string()))?;
            if !empty {
                return Err(Error::materialize(
                    output_dir.as_str(),
                    "output directory is not empty (use overwrite or merge mode)",
                ));
            }
        }
        Ok(())
    }

    /// Create `dir` and any missing ancestors, journaling each level
    fn ensure_dir(&self, dir: &Utf8Path, journal: &mut WriteJournal) -> Result<()> {
        let mut missing = Vec::new();
        let mut current = Some(dir);
        while let Some(path) = current {
            if path.as_str().is_empty() || self.fs.exists(path) {
                break;
            }
            missing.push(path);
            current = path.parent();
        }

        for path in missing.into_iter().rev() {
            self.fs
                .create_dir(path)
                .map_err(|e| Error::materialize(path.as_str(), e.to_string()))?;
            journal.created_dir(path.to_path_buf());
        }

        if !self.fs.is_dir(dir) {
            return Err(Error::materialize(dir.as_str(), "not a directory"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs as stdfs;
    use tempfile::TempDir;

    fn temp_root() -> (TempDir, Utf8PathBuf) {
        let temp = TempDir::new().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        (temp, root)
    }

    fn files() -> Vec<RenderedFile> {
        vec![
            RenderedFile::new("cmd/svc/main.go", "package main\n"),
            RenderedFile::new("README.md", "# svc\n"),
        ]
    }

    fn materializer() -> Materializer {
        Materializer::new(Arc::new(LocalFilesystem))
    }

    #[test]
    fn test_creates_output_dir_and_files() {
        let (_temp, root) = temp_root();
        let out = root.join("nested/out");

        let report = materializer()
            .materialize(&out, &files(), WriteMode::Create, &CancellationToken::new())
            .unwrap();

        assert_eq!(
            report.written,
            vec![Utf8PathBuf::from("README.md"), Utf8PathBuf::from("cmd/svc/main.go")]
        );
        assert_eq!(stdfs::read_to_string(out.join("README.md")).unwrap(), "# svc\n");
    }

    #[test]
    fn test_create_mode_refuses_non_empty_dir() {
        let (_temp, root) = temp_root();
        stdfs::write(root.join("existing.txt"), "x").unwrap();

        let err = materializer()
            .materialize(&root, &files(), WriteMode::Create, &CancellationToken::new())
            .unwrap_err();
        assert_eq!(err.kind(), kiln_core::ErrorKind::Io);
        assert!(!root.join("README.md").exists());
    }

    #[test]
    fn test_merge_mode_keeps_existing() {
        let (_temp, root) = temp_root();
        stdfs::write(root.join("README.md"), "mine").unwrap();

        let report = materializer()
            .materialize(&root, &files(), WriteMode::Merge, &CancellationToken::new())
            .unwrap();
        assert_eq!(report.kept, vec![Utf8PathBuf::from("README.md")]);
        assert_eq!(stdfs::read_to_string(root.join("README.md")).unwrap(), "mine");
        assert!(root.join("cmd/svc/main.go").exists());
    }

    #[test]
    fn test_overwrite_mode_replaces() {
        let (_temp, root) = temp_root();
        stdfs::write(root.join("README.md"), "mine").unwrap();

        materializer()
            .materialize(&root, &files(), WriteMode::Overwrite, &CancellationToken::new())
            .unwrap();
        assert_eq!(stdfs::read_to_string(root.join("README.md")).unwrap(), "# svc\n");
    }

    #[test]
    fn test_cancelled_before_first_write() {
        let (_temp, root) = temp_root();
        let out = root.join("out");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = materializer()
            .materialize(&out, &files(), WriteMode::Create, &cancel)
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled { .. }));
        assert!(!out.exists());
    }
}
