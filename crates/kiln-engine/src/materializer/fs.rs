//! Filesystem seam used by the materializer

use camino::Utf8Path;
use std::fs;
use std::io;

/// Filesystem operations needed to write and roll back a generated tree
pub trait Filesystem: Send + Sync {
    fn exists(&self, path: &Utf8Path) -> bool;

    fn is_dir(&self, path: &Utf8Path) -> bool;

    /// Whether a directory has no entries
    fn is_dir_empty(&self, path: &Utf8Path) -> io::Result<bool>;

    /// Create a single directory level
    fn create_dir(&self, path: &Utf8Path) -> io::Result<()>;

    /// Replace the file at `path` with `contents` as one step
    fn write_file(&self, path: &Utf8Path, contents: &[u8]) -> io::Result<()>;

    fn read_file(&self, path: &Utf8Path) -> io::Result<Vec<u8>>;

    fn remove_file(&self, path: &Utf8Path) -> io::Result<()>;

    /// Remove an empty directory
    fn remove_dir(&self, path: &Utf8Path) -> io::Result<()>;
}

/// The local disk
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFilesystem;

impl Filesystem for LocalFilesystem {
    fn exists(&self, path: &Utf8Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Utf8Path) -> bool {
        path.is_dir()
    }

    fn is_dir_empty(&self, path: &Utf8Path) -> io::Result<bool> {
        Ok(fs::read_dir(path)?.next().is_none())
    }

    fn create_dir(&self, path: &Utf8Path) -> io::Result<()> {
        fs::create_dir(path)
    }

    fn write_file(&self, path: &Utf8Path, contents: &[u8]) -> io::Result<()> {
        let file_name = path.file_name().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, format!("not a file path: {}", path))
        })?;
        let temp = path.with_file_name(format!(".{}.kiln-tmp", file_name));

        if let Err(e) = fs::write(&temp, contents) {
            let _ = fs::remove_file(&temp);
            return Err(e);
        }
        if let Err(e) = fs::rename(&temp, path) {
            let _ = fs::remove_file(&temp);
            return Err(e);
        }
        Ok(())
    }

    fn read_file(&self, path: &Utf8Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn remove_file(&self, path: &Utf8Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn remove_dir(&self, path: &Utf8Path) -> io::Result<()> {
        fs::remove_dir(path)
    }
}
