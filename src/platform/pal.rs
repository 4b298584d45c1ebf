//! PAL trait and its host (Unix) and in-memory implementations.

#![allow(missing_docs)]

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::errors::{DfgError, Result};
use crate::scanner::glob::GlobPattern;

/// Byte and inode figures for the filesystem holding a path.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct FsStats {
    pub total_bytes: u64,
    /// Space available to unprivileged users.
    pub free_bytes: u64,
    pub total_inodes: u64,
    /// Inodes available to unprivileged users.
    pub free_inodes: u64,
}

/// What a filesystem entry resolves to (symlinks followed).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
    /// Sockets, FIFOs, device nodes.
    Other,
}

/// OS abstraction used by the measuring and reclaiming steps.
pub trait Platform: Send + Sync {
    fn fs_stats(&self, path: &Path) -> Result<FsStats>;
    /// Device id of `path`, following symlinks.
    fn device_id(&self, path: &Path) -> Result<u64>;
    /// Device id of the directory entry itself (`lstat`), so a symlink
    /// reports the filesystem the link lives on.
    fn entry_device_id(&self, path: &Path) -> Result<u64>;
    /// Entries matching a shell-style pattern, in discovery order.
    fn expand_glob(&self, pattern: &str) -> Result<Vec<PathBuf>>;
    fn entry_kind(&self, path: &Path) -> Result<EntryKind>;
    fn remove_file(&self, path: &Path) -> Result<()>;
    fn remove_dir_all(&self, path: &Path) -> Result<()>;
}

/// Host implementation backed by `statvfs` and `std::fs`.
#[derive(Debug, Default)]
pub struct HostPlatform;

impl HostPlatform {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[cfg(unix)]
impl Platform for HostPlatform {
    #[allow(clippy::useless_conversion)]
    fn fs_stats(&self, path: &Path) -> Result<FsStats> {
        let stat = nix::sys::statvfs::statvfs(path).map_err(|error| DfgError::FsStats {
            path: path.to_path_buf(),
            details: error.to_string(),
        })?;
        let fragment = u64::from(stat.fragment_size());
        Ok(FsStats {
            total_bytes: u64::from(stat.blocks()).saturating_mul(fragment),
            free_bytes: u64::from(stat.blocks_available()).saturating_mul(fragment),
            total_inodes: u64::from(stat.files()),
            free_inodes: u64::from(stat.files_available()),
        })
    }

    fn device_id(&self, path: &Path) -> Result<u64> {
        use std::os::unix::fs::MetadataExt;
        let meta = fs::metadata(path).map_err(|e| DfgError::io(path, e))?;
        Ok(meta.dev())
    }

    fn entry_device_id(&self, path: &Path) -> Result<u64> {
        use std::os::unix::fs::MetadataExt;
        let meta = fs::symlink_metadata(path).map_err(|e| DfgError::io(path, e))?;
        Ok(meta.dev())
    }

    fn expand_glob(&self, pattern: &str) -> Result<Vec<PathBuf>> {
        Ok(GlobPattern::compile(pattern)?.expand())
    }

    fn entry_kind(&self, path: &Path) -> Result<EntryKind> {
        let meta = fs::metadata(path).map_err(|e| DfgError::io(path, e))?;
        Ok(if meta.is_file() {
            EntryKind::File
        } else if meta.is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::Other
        })
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        fs::remove_file(path).map_err(|e| DfgError::io(path, e))
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        // A symlink to a directory is unlinked, never descended into.
        let is_link = fs::symlink_metadata(path)
            .map_err(|e| DfgError::io(path, e))?
            .file_type()
            .is_symlink();
        if is_link {
            fs::remove_file(path).map_err(|e| DfgError::io(path, e))
        } else {
            fs::remove_dir_all(path).map_err(|e| DfgError::io(path, e))
        }
    }
}

#[cfg(not(unix))]
impl Platform for HostPlatform {
    fn fs_stats(&self, path: &Path) -> Result<FsStats> {
        Err(unsupported(path))
    }

    fn device_id(&self, path: &Path) -> Result<u64> {
        Err(unsupported(path))
    }

    fn entry_device_id(&self, path: &Path) -> Result<u64> {
        Err(unsupported(path))
    }

    fn expand_glob(&self, pattern: &str) -> Result<Vec<PathBuf>> {
        Ok(GlobPattern::compile(pattern)?.expand())
    }

    fn entry_kind(&self, path: &Path) -> Result<EntryKind> {
        Err(unsupported(path))
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        Err(unsupported(path))
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        Err(unsupported(path))
    }
}

#[cfg(not(unix))]
fn unsupported(path: &Path) -> DfgError {
    DfgError::UnsupportedPlatform {
        details: format!("statvfs is unavailable (path {})", path.display()),
    }
}

/// A file, directory or special node held by [`MockPlatform`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockEntry {
    pub kind: EntryKind,
    /// Device of the resolved target.
    pub device: u64,
    /// Device the entry itself lives on when it is a symlink.
    pub link_device: Option<u64>,
    pub size_bytes: u64,
    /// Removal fails with `PermissionDenied` when set.
    pub deny_removal: bool,
}

impl MockEntry {
    #[must_use]
    pub fn file(device: u64, size_bytes: u64) -> Self {
        Self {
            kind: EntryKind::File,
            device,
            link_device: None,
            size_bytes,
            deny_removal: false,
        }
    }

    #[must_use]
    pub fn dir(device: u64) -> Self {
        Self {
            kind: EntryKind::Directory,
            device,
            link_device: None,
            size_bytes: 0,
            deny_removal: false,
        }
    }

    #[must_use]
    pub fn other(device: u64) -> Self {
        Self {
            kind: EntryKind::Other,
            device,
            link_device: None,
            size_bytes: 0,
            deny_removal: false,
        }
    }

    /// Turn the entry into a symlink living on `device` that resolves to
    /// the original target.
    #[must_use]
    pub fn symlink_on(mut self, device: u64) -> Self {
        self.link_device = Some(device);
        self
    }

    #[must_use]
    pub fn denied(mut self) -> Self {
        self.deny_removal = true;
        self
    }
}

#[derive(Debug)]
struct MockState {
    stats: FsStats,
    entries: BTreeMap<PathBuf, MockEntry>,
    removed: Vec<PathBuf>,
    stat_calls: usize,
}

/// In-memory filesystem for deterministic tests.
///
/// Removing an entry credits its size to `free_bytes` and one inode per
/// removed entry to `free_inodes`, so re-measuring after a reclaim pass
/// reflects what was deleted.
#[derive(Debug)]
pub struct MockPlatform {
    state: Mutex<MockState>,
}

impl MockPlatform {
    #[must_use]
    pub fn new(stats: FsStats) -> Self {
        Self {
            state: Mutex::new(MockState {
                stats,
                entries: BTreeMap::new(),
                removed: Vec::new(),
                stat_calls: 0,
            }),
        }
    }

    /// Register an entry. Parent directories are not created implicitly.
    #[must_use]
    pub fn with_entry(self, path: impl Into<PathBuf>, entry: MockEntry) -> Self {
        self.state.lock().entries.insert(path.into(), entry);
        self
    }

    /// Paths removed so far, in removal order.
    #[must_use]
    pub fn removed(&self) -> Vec<PathBuf> {
        self.state.lock().removed.clone()
    }

    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.state.lock().entries.contains_key(path)
    }

    /// Number of `fs_stats` calls served.
    #[must_use]
    pub fn stat_calls(&self) -> usize {
        self.state.lock().stat_calls
    }

    fn lookup(&self, path: &Path) -> Result<MockEntry> {
        self.state
            .lock()
            .entries
            .get(path)
            .cloned()
            .ok_or_else(|| {
                DfgError::io(
                    path,
                    std::io::Error::new(std::io::ErrorKind::NotFound, "no such mock entry"),
                )
            })
    }
}

impl Platform for MockPlatform {
    fn fs_stats(&self, path: &Path) -> Result<FsStats> {
        let mut state = self.state.lock();
        if !state.entries.contains_key(path) {
            return Err(DfgError::FsStats {
                path: path.to_path_buf(),
                details: "mock path not found".to_string(),
            });
        }
        state.stat_calls += 1;
        Ok(state.stats)
    }

    fn device_id(&self, path: &Path) -> Result<u64> {
        self.lookup(path).map(|entry| entry.device)
    }

    fn entry_device_id(&self, path: &Path) -> Result<u64> {
        self.lookup(path)
            .map(|entry| entry.link_device.unwrap_or(entry.device))
    }

    fn expand_glob(&self, pattern: &str) -> Result<Vec<PathBuf>> {
        let glob = GlobPattern::compile(pattern)?;
        let state = self.state.lock();
        Ok(state
            .entries
            .keys()
            .filter(|path| glob.matches(path))
            .cloned()
            .collect())
    }

    fn entry_kind(&self, path: &Path) -> Result<EntryKind> {
        self.lookup(path).map(|entry| entry.kind)
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        let entry = self.lookup(path)?;
        if entry.deny_removal {
            return Err(DfgError::PermissionDenied {
                path: path.to_path_buf(),
            });
        }
        let mut state = self.state.lock();
        state.entries.remove(path);
        state.stats.free_bytes = state.stats.free_bytes.saturating_add(entry.size_bytes);
        state.stats.free_inodes = state.stats.free_inodes.saturating_add(1);
        state.removed.push(path.to_path_buf());
        Ok(())
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        let mut state = self.state.lock();
        let doomed: Vec<PathBuf> = state
            .entries
            .keys()
            .filter(|candidate| candidate.starts_with(path))
            .cloned()
            .collect();
        if doomed.is_empty() {
            return Err(DfgError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "no such mock entry"),
            ));
        }
        if let Some(denied) = doomed
            .iter()
            .find(|candidate| state.entries[*candidate].deny_removal)
        {
            return Err(DfgError::PermissionDenied {
                path: denied.clone(),
            });
        }
        for candidate in doomed {
            if let Some(entry) = state.entries.remove(&candidate) {
                state.stats.free_bytes = state.stats.free_bytes.saturating_add(entry.size_bytes);
                state.stats.free_inodes = state.stats.free_inodes.saturating_add(1);
            }
        }
        state.removed.push(path.to_path_buf());
        Ok(())
    }
}

/// Detect active platform implementation.
pub fn detect_platform() -> Result<Arc<dyn Platform>> {
    #[cfg(unix)]
    {
        Ok(Arc::new(HostPlatform::new()))
    }
    #[cfg(not(unix))]
    {
        Err(DfgError::UnsupportedPlatform {
            details: "only Unix-like systems expose statvfs".to_string(),
        })
    }
}
