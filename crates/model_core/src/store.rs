//! Artifact storage shared by the pipeline stages
//!
//! Stages never touch paths directly; they read and write named artifacts
//! through an [`ArtifactStore`]. Names are `/`-separated and relative to the
//! store root (`""` is the root itself).
//!
//! [`LocalStore`] persists to disk with atomic writes (temp file + rename)
//! and an atomic directory swap for [`ArtifactStore::replace_contents`].
//! The store root itself, and directories that cannot be renamed (mount
//! points, read-only parents), are updated file by file instead.
//! [`MemoryStore`] keeps everything in a map and is used by tests.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Artifact not found: {0}")]
    NotFound(String),

    #[error("Invalid artifact name: {0:?}")]
    InvalidName(String),

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, StoreError>;

// errno values shared by Linux and macOS
const EBUSY: i32 = 16;
const EXDEV: i32 = 18;

/// The directory swap is not possible here but per-file writes may be.
fn swap_unsupported(err: &StoreError) -> bool {
    match err {
        StoreError::Io { source, .. } => {
            source.kind() == std::io::ErrorKind::PermissionDenied
                || matches!(source.raw_os_error(), Some(EBUSY) | Some(EXDEV))
        }
        _ => false,
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Join a directory prefix and an entry name.
pub fn join_name(prefix: &str, name: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}

fn parent_of(name: &str) -> &str {
    name.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("")
}

/// Reject absolute names and anything that could escape the store root.
fn check_name(name: &str) -> Result<()> {
    let path = Path::new(name);
    let escapes = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_)));
    if escapes || name.contains('\\') {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Named-artifact storage.
pub trait ArtifactStore {
    fn read(&self, name: &str) -> Result<Vec<u8>>;

    /// Create or overwrite one artifact.
    fn write(&self, name: &str, bytes: &[u8]) -> Result<()>;

    /// Full names of the files directly under `prefix`, sorted.
    fn list(&self, prefix: &str) -> Result<Vec<String>>;

    fn exists(&self, name: &str) -> bool;

    /// Replace every file directly under `prefix` with `entries` in one step.
    ///
    /// Entry names are plain file names. Nested directories under `prefix`
    /// are carried over unchanged. Where the backend can swap directories,
    /// readers observe either the old file set or the new one, never a mix.
    fn replace_contents(&self, prefix: &str, entries: &[(&str, &[u8])]) -> Result<()>;

    /// Human readable location, used in logs and error messages.
    fn describe(&self, name: &str) -> String;
}

/// Store rooted at a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();
        fs::create_dir_all(root).map_err(io_error(root))?;
        let root = root.canonicalize().map_err(io_error(root))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path of an artifact name.
    pub fn path_of(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() {
            return Ok(self.root.clone());
        }
        check_name(name)?;
        Ok(self.root.join(name))
    }

    fn swap_directory(&self, target: &Path, staged: &Path) -> Result<()> {
        let parent = target
            .parent()
            .ok_or_else(|| StoreError::InvalidName(target.display().to_string()))?;

        if !target.exists() {
            return fs::rename(staged, target).map_err(io_error(target));
        }

        // The previous contents live in `holder` until the swap has completed.
        let holder = tempfile::Builder::new()
            .prefix(".previous-")
            .tempdir_in(parent)
            .map_err(io_error(parent))?;
        let previous = holder.path().join("contents");
        fs::rename(target, &previous).map_err(io_error(target))?;

        if let Err(source) = fs::rename(staged, target) {
            // Put the old directory back before reporting.
            if let Err(restore) = fs::rename(&previous, target) {
                let kept = holder.into_path();
                tracing::error!(
                    "could not restore {} (previous contents kept at {}): {}",
                    target.display(),
                    kept.display(),
                    restore
                );
            }
            return Err(StoreError::Io {
                path: target.to_path_buf(),
                source,
            });
        }

        for entry in fs::read_dir(&previous).map_err(io_error(&previous))? {
            let entry = entry.map_err(io_error(&previous))?;
            let is_dir = entry.file_type().map_err(io_error(&entry.path()))?.is_dir();
            if is_dir {
                let dest = target.join(entry.file_name());
                if let Err(source) = fs::rename(entry.path(), &dest) {
                    let kept = holder.into_path();
                    tracing::error!(
                        "could not carry over {} (previous contents kept at {})",
                        entry.path().display(),
                        kept.display()
                    );
                    return Err(StoreError::Io { path: dest, source });
                }
            }
        }

        Ok(())
    }

    fn replace_by_swap(&self, target: &Path, entries: &[(&str, &[u8])]) -> Result<()> {
        let parent = target
            .parent()
            .ok_or_else(|| StoreError::InvalidName(target.display().to_string()))?
            .to_path_buf();
        fs::create_dir_all(&parent).map_err(io_error(&parent))?;

        let staged = tempfile::Builder::new()
            .prefix(".staged-")
            .tempdir_in(&parent)
            .map_err(io_error(&parent))?;
        for (name, bytes) in entries {
            let path = staged.path().join(name);
            let mut file = fs::File::create(&path).map_err(io_error(&path))?;
            file.write_all(bytes).map_err(io_error(&path))?;
            file.sync_all().map_err(io_error(&path))?;
        }

        self.swap_directory(target, staged.path())?;
        // `staged` has been renamed onto `target`; dropping it finds nothing to remove.
        drop(staged);

        debug!(
            "replaced contents of {} with {} file(s)",
            target.display(),
            entries.len()
        );
        Ok(())
    }

    /// Persist each entry atomically inside `target`, then remove the
    /// top-level files that are not part of the new set. Each file is
    /// replaced atomically; the set as a whole is not.
    fn replace_in_place(&self, target: &Path, entries: &[(&str, &[u8])]) -> Result<()> {
        fs::create_dir_all(target).map_err(io_error(target))?;

        for (name, bytes) in entries {
            let path = target.join(name);
            let mut temp = NamedTempFile::new_in(target).map_err(io_error(target))?;
            temp.write_all(bytes).map_err(io_error(temp.path()))?;
            temp.as_file().sync_all().map_err(io_error(temp.path()))?;
            temp.persist(&path).map_err(|e| StoreError::Io {
                path: path.clone(),
                source: e.error,
            })?;
        }

        let mut removed = 0;
        for entry in fs::read_dir(target).map_err(io_error(target))? {
            let entry = entry.map_err(io_error(target))?;
            if !entry.file_type().map_err(io_error(&entry.path()))?.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            let keep = entries
                .iter()
                .any(|(name, _)| file_name.to_str() == Some(*name));
            if !keep {
                fs::remove_file(entry.path()).map_err(io_error(&entry.path()))?;
                removed += 1;
            }
        }

        debug!(
            "rewrote {} file(s) in place under {}, removed {} stale",
            entries.len(),
            target.display(),
            removed
        );
        Ok(())
    }
}

impl ArtifactStore for LocalStore {
    fn read(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.path_of(name)?;
        if !path.is_file() {
            return Err(StoreError::NotFound(path.display().to_string()));
        }
        fs::read(&path).map_err(io_error(&path))
    }

    fn write(&self, name: &str, bytes: &[u8]) -> Result<()> {
        if name.is_empty() {
            return Err(StoreError::InvalidName(name.to_string()));
        }
        let path = self.path_of(name)?;
        let parent = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(parent).map_err(io_error(parent))?;

        let mut temp = NamedTempFile::new_in(parent).map_err(io_error(parent))?;
        temp.write_all(bytes).map_err(io_error(temp.path()))?;
        temp.as_file().sync_all().map_err(io_error(temp.path()))?;
        temp.persist(&path).map_err(|e| StoreError::Io {
            path: path.clone(),
            source: e.error,
        })?;

        debug!("wrote {} bytes to {}", bytes.len(), path.display());
        Ok(())
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let dir = self.path_of(prefix.trim_matches('/'))?;
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&dir).map_err(io_error(&dir))? {
            let entry = entry.map_err(io_error(&dir))?;
            if entry.file_type().map_err(io_error(&entry.path()))?.is_file() {
                names.push(join_name(prefix, &entry.file_name().to_string_lossy()));
            }
        }
        names.sort();
        Ok(names)
    }

    fn exists(&self, name: &str) -> bool {
        self.path_of(name).map(|p| p.is_file()).unwrap_or(false)
    }

    fn replace_contents(&self, prefix: &str, entries: &[(&str, &[u8])]) -> Result<()> {
        for (name, _) in entries {
            if name.is_empty() || name.contains('/') {
                return Err(StoreError::InvalidName(name.to_string()));
            }
            check_name(name)?;
        }

        let prefix = prefix.trim_matches('/');
        let target = self.path_of(prefix)?;
        if prefix.is_empty() {
            return self.replace_in_place(&target, entries);
        }

        match self.replace_by_swap(&target, entries) {
            Err(e) if swap_unsupported(&e) && target.is_dir() => {
                debug!(
                    "directory swap unavailable for {} ({}), replacing files in place",
                    target.display(),
                    e
                );
                self.replace_in_place(&target, entries)
            }
            other => other,
        }
    }

    fn describe(&self, name: &str) -> String {
        self.root.join(name).display().to_string()
    }
}

/// In-memory store; every operation is atomic under a single lock.
#[derive(Debug, Default)]
pub struct MemoryStore {
    files: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored name, including nested ones.
    pub fn names(&self) -> Vec<String> {
        self.files.read().keys().cloned().collect()
    }
}

impl ArtifactStore for MemoryStore {
    fn read(&self, name: &str) -> Result<Vec<u8>> {
        check_name(name)?;
        self.files
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    fn write(&self, name: &str, bytes: &[u8]) -> Result<()> {
        if name.is_empty() {
            return Err(StoreError::InvalidName(name.to_string()));
        }
        check_name(name)?;
        self.files.write().insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let prefix = prefix.trim_matches('/');
        Ok(self
            .files
            .read()
            .keys()
            .filter(|name| parent_of(name) == prefix)
            .cloned()
            .collect())
    }

    fn exists(&self, name: &str) -> bool {
        self.files.read().contains_key(name)
    }

    fn replace_contents(&self, prefix: &str, entries: &[(&str, &[u8])]) -> Result<()> {
        let prefix = prefix.trim_matches('/');
        for (name, _) in entries {
            if name.is_empty() || name.contains('/') {
                return Err(StoreError::InvalidName(name.to_string()));
            }
        }

        let mut files = self.files.write();
        files.retain(|name, _| parent_of(name) != prefix);
        for (name, bytes) in entries {
            files.insert(join_name(prefix, name), bytes.to_vec());
        }
        Ok(())
    }

    fn describe(&self, name: &str) -> String {
        format!("memory://{name}")
    }
}
