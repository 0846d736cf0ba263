//! File-system collaborator.
//!
//! Paths are relative to the project root the implementation is bound to.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Read/write/exists over a project tree. Writes are atomic per file.
pub trait FileSystem: Send + Sync {
    /// Current content, `None` when the file does not exist.
    fn read(&self, path: &Path) -> io::Result<Option<String>>;

    /// Replace the file's content atomically, creating parent directories.
    fn write(&self, path: &Path, content: &str) -> io::Result<()>;

    fn exists(&self, path: &Path) -> io::Result<bool> {
        Ok(self.read(path)?.is_some())
    }
}

/// The real file system under a root directory.
#[derive(Debug, Clone)]
pub struct LocalFileSystem {
    root: PathBuf,
}

impl LocalFileSystem {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }
}

impl FileSystem for LocalFileSystem {
    fn read(&self, path: &Path) -> io::Result<Option<String>> {
        match std::fs::read_to_string(self.resolve(path)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write(&self, path: &Path, content: &str) -> io::Result<()> {
        let target = self.resolve(path);
        let dir = target
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());
        std::fs::create_dir_all(&dir)?;

        // Temp file in the target directory so the rename stays on one device.
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&target).map_err(|e| e.error)?;
        Ok(())
    }

    fn exists(&self, path: &Path) -> io::Result<bool> {
        Ok(self.resolve(path).is_file())
    }
}

/// In-memory tree. Counts writes so idempotence can be observed.
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    files: Mutex<BTreeMap<PathBuf, String>>,
    writes: Mutex<usize>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        if let Ok(mut files) = self.files.lock() {
            files.insert(path.into(), content.into());
        }
        self
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.writes.lock().map(|w| *w).unwrap_or(0)
    }

    /// Snapshot of every file.
    pub fn files(&self) -> BTreeMap<PathBuf, String> {
        self.files.lock().map(|f| f.clone()).unwrap_or_default()
    }

    /// Content of one file, if present.
    pub fn get(&self, path: impl AsRef<Path>) -> Option<String> {
        self.files
            .lock()
            .ok()
            .and_then(|f| f.get(path.as_ref()).cloned())
    }
}

fn poisoned() -> io::Error {
    io::Error::other("file map lock poisoned")
}

impl FileSystem for MemoryFileSystem {
    fn read(&self, path: &Path) -> io::Result<Option<String>> {
        let files = self.files.lock().map_err(|_| poisoned())?;
        Ok(files.get(path).cloned())
    }

    fn write(&self, path: &Path, content: &str) -> io::Result<()> {
        let mut files = self.files.lock().map_err(|_| poisoned())?;
        files.insert(path.to_path_buf(), content.to_string());
        *self.writes.lock().map_err(|_| poisoned())? += 1;
        Ok(())
    }
}

/// Overlay that reads through to a base file system and records writes
/// without applying them. Used for `--dry-run`.
pub struct DryRunFileSystem<'a> {
    base: &'a dyn FileSystem,
    overlay: Mutex<BTreeMap<PathBuf, String>>,
}

impl<'a> DryRunFileSystem<'a> {
    pub fn new(base: &'a dyn FileSystem) -> Self {
        Self {
            base,
            overlay: Mutex::new(BTreeMap::new()),
        }
    }

    /// Paths that would have been written, in path order.
    pub fn planned(&self) -> Vec<PathBuf> {
        self.overlay
            .lock()
            .map(|o| o.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl FileSystem for DryRunFileSystem<'_> {
    fn read(&self, path: &Path) -> io::Result<Option<String>> {
        if let Some(content) = self.overlay.lock().map_err(|_| poisoned())?.get(path) {
            return Ok(Some(content.clone()));
        }
        self.base.read(path)
    }

    fn write(&self, path: &Path, content: &str) -> io::Result<()> {
        self.overlay
            .lock()
            .map_err(|_| poisoned())?
            .insert(path.to_path_buf(), content.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_local_write_creates_dirs_and_replaces() {
        let dir = TempDir::new().unwrap();
        let fs = LocalFileSystem::new(dir.path());
        let path = Path::new("src/Domain/Entities/Invoice.cs");

        assert_eq!(fs.read(path).unwrap(), None);
        assert!(!fs.exists(path).unwrap());

        fs.write(path, "one").unwrap();
        fs.write(path, "two").unwrap();
        assert_eq!(fs.read(path).unwrap().as_deref(), Some("two"));
        assert!(fs.exists(path).unwrap());

        // No stray temp files left next to the target.
        let entries = std::fs::read_dir(dir.path().join("src/Domain/Entities"))
            .unwrap()
            .count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn test_dry_run_does_not_touch_base() {
        let base = MemoryFileSystem::new().with_file("a.txt", "base");
        let dry = DryRunFileSystem::new(&base);
        dry.write(Path::new("a.txt"), "planned").unwrap();
        dry.write(Path::new("b.txt"), "new").unwrap();

        assert_eq!(dry.read(Path::new("a.txt")).unwrap().as_deref(), Some("planned"));
        assert_eq!(base.get("a.txt").as_deref(), Some("base"));
        assert_eq!(base.write_count(), 0);
        assert_eq!(dry.planned(), vec![PathBuf::from("a.txt"), PathBuf::from("b.txt")]);
    }
}
