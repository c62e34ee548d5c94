//! Artifact backends: where serialized models live.
//!
//! Backends are byte-oriented key-value stores. The in-memory backend is the
//! default for tests and ephemeral runs; the filesystem backend persists one
//! file per key and replaces it atomically.

use crate::{Error, Result};
use dashmap::DashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Byte-oriented artifact storage.
///
/// Implementations must make `put` atomic with respect to `get`: a reader
/// sees either the previous artifact or the new one, never a partial write.
pub trait ArtifactBackend: Send + Sync {
    /// Get the artifact stored under `key`.
    ///
    /// Returns `None` if the key doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns error if the artifact exists but cannot be read
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store an artifact, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns error if the artifact cannot be written
    fn put(&self, key: &str, bytes: &[u8]) -> Result<()>;
}

/// In-memory artifact store using lock-free concurrent hashmap.
///
/// Data is lost on process restart.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    store: DashMap<String, Vec<u8>>,
    writes: AtomicU64,
}

impl MemoryArtifactStore {
    /// Create a new in-memory artifact store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of stored artifacts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Check if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Number of `put` calls served so far.
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }
}

impl ArtifactBackend for MemoryArtifactStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.store.get(key).map(|v| v.value().clone()))
    }

    fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        self.store.insert(key.to_string(), bytes.to_vec());
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Filesystem artifact store: `<root>/<key>.json`.
///
/// Writes go to a uniquely named temp file in the same directory, are
/// flushed to disk, then renamed over the target. A crash mid-write leaves
/// at most a stray `.tmp` file that is never read as an artifact.
#[derive(Debug)]
pub struct FsArtifactStore {
    root: PathBuf,
    sequence: AtomicU64,
}

impl FsArtifactStore {
    const EXTENSION: &'static str = "json";

    /// Open (creating if needed) an artifact directory.
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|e| {
            Error::ModelStore(format!("failed to create {}: {e}", root.display()))
        })?;
        Ok(Self {
            root,
            sequence: AtomicU64::new(0),
        })
    }

    /// Artifact directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the artifact stored under `key`.
    #[must_use]
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.{}", sanitize(key), Self::EXTENSION))
    }

    fn temp_path_for(&self, key: &str) -> PathBuf {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        self.root.join(format!(
            ".{}.{}.{seq}.tmp",
            sanitize(key),
            std::process::id()
        ))
    }
}

impl ArtifactBackend for FsArtifactStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::ModelStore(format!("failed to read artifact {key}: {e}"))),
        }
    }

    fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let target = self.path_for(key);
        let tmp = self.temp_path_for(key);

        let write = || -> std::io::Result<()> {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(bytes)?;
            file.sync_all()?;
            fs::rename(&tmp, &target)
        };

        write().map_err(|e| {
            let _ = fs::remove_file(&tmp);
            Error::ModelStore(format!(
                "failed to persist artifact {key} to {}: {e}",
                target.display()
            ))
        })
    }
}

/// Map a key onto a file stem.
///
/// ASCII alphanumerics, `-` and `_` pass through. Every other byte becomes
/// `%XX`, so distinct keys always get distinct stems and no stem starts
/// with a dot.
fn sanitize(key: &str) -> String {
    use std::fmt::Write as _;

    let mut stem = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_') {
            stem.push(char::from(byte));
        } else {
            let _ = write!(stem, "%{byte:02X}");
        }
    }
    stem
}
