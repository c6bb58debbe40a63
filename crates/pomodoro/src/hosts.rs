//! Hosts file patching
//!
//! Applies and reverts a [`BlockTemplate`] against an open hosts file. Both
//! operations are idempotent and may be called in any order.
//!
//! The file is handled as raw bytes, so comments in any encoding survive a
//! patch untouched. The handle is owned by one session at a time. Concurrent
//! writers to the same file are not coordinated against.
//!
//! Neither operation is transactional. An I/O error aborts the operation and
//! is returned as-is; the file keeps whatever state the failing call left.
//! `revert` writes the new contents before truncating, so an interrupted
//! revert can leave a stale tail but never an empty file.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::blocklist::BlockTemplate;

/// Errors raised while touching the hosts file
#[derive(Error, Debug)]
pub enum HostsError {
    #[error("Failed to open hosts file {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to {op} hosts file {}: {source}", .path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result of [`HostsFile::apply`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The block was appended
    Applied,
    /// The block was already in the file
    AlreadyPresent,
}

/// Result of [`HostsFile::revert`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevertOutcome {
    /// Every copy of the block was removed
    Removed,
    /// The block was not in the file
    NotPresent,
}

/// Random-access storage behind a [`HostsFile`]
pub trait HostsStorage: Read + Write + Seek + Send {
    /// Cut the storage to `len` bytes
    fn truncate(&mut self, len: u64) -> std::io::Result<()>;

    /// Push written bytes to durable storage
    fn sync(&mut self) -> std::io::Result<()>;
}

impl HostsStorage for File {
    fn truncate(&mut self, len: u64) -> std::io::Result<()> {
        self.set_len(len)
    }

    fn sync(&mut self) -> std::io::Result<()> {
        self.sync_all()
    }
}

/// An open, read-write hosts file
pub struct HostsFile {
    storage: Box<dyn HostsStorage>,
    path: PathBuf,
}

impl fmt::Debug for HostsFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostsFile")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl HostsFile {
    /// Open an existing hosts file for reading and writing
    pub fn open(path: &Path) -> Result<Self, HostsError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|source| HostsError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        debug!(path = %path.display(), "opened hosts file");
        Ok(Self::with_storage(file, path))
    }

    /// Wrap already-open storage. `path` is only used in logs and errors.
    pub fn with_storage(storage: impl HostsStorage + 'static, path: impl Into<PathBuf>) -> Self {
        Self {
            storage: Box::new(storage),
            path: path.into(),
        }
    }

    /// Append the block unless the file already contains it
    pub fn apply(&mut self, template: &BlockTemplate) -> Result<ApplyOutcome, HostsError> {
        let contents = self.read_all()?;
        if find(&contents, template.as_bytes()).is_some() {
            info!(path = %self.path.display(), "block template already in hosts file");
            return Ok(ApplyOutcome::AlreadyPresent);
        }

        self.storage
            .seek(SeekFrom::End(0))
            .map_err(|e| self.io("seek", e))?;
        self.storage
            .write_all(template.as_bytes())
            .map_err(|e| self.io("write", e))?;
        self.storage.flush().map_err(|e| self.io("flush", e))?;

        info!(path = %self.path.display(), "block template added to hosts file");
        Ok(ApplyOutcome::Applied)
    }

    /// Remove every copy of the block, leaving the rest of the file untouched
    pub fn revert(&mut self, template: &BlockTemplate) -> Result<RevertOutcome, HostsError> {
        let contents = self.read_all()?;
        if find(&contents, template.as_bytes()).is_none() {
            debug!(path = %self.path.display(), "block template not found in hosts file");
            return Ok(RevertOutcome::NotPresent);
        }

        let restored = remove_all(&contents, template.as_bytes());

        // Removal only shrinks the file, so write first and cut the tail after.
        self.storage
            .seek(SeekFrom::Start(0))
            .map_err(|e| self.io("seek", e))?;
        self.storage
            .write_all(&restored)
            .map_err(|e| self.io("write", e))?;
        self.storage
            .truncate(restored.len() as u64)
            .map_err(|e| self.io("truncate", e))?;
        if let Err(e) = self.storage.sync() {
            warn!(path = %self.path.display(), "could not sync hosts file: {}", e);
        }

        info!(path = %self.path.display(), "block template removed from hosts file");
        Ok(RevertOutcome::Removed)
    }

    /// Whether the file currently contains the block
    pub fn contains(&mut self, template: &BlockTemplate) -> Result<bool, HostsError> {
        Ok(find(&self.read_all()?, template.as_bytes()).is_some())
    }

    fn read_all(&mut self) -> Result<Vec<u8>, HostsError> {
        self.storage
            .seek(SeekFrom::Start(0))
            .map_err(|e| self.io("seek", e))?;
        let mut bytes = Vec::new();
        self.storage
            .read_to_end(&mut bytes)
            .map_err(|e| self.io("read", e))?;
        Ok(bytes)
    }

    fn io(&self, op: &'static str, source: std::io::Error) -> HostsError {
        HostsError::Io {
            op,
            path: self.path.clone(),
            source,
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack.windows(needle.len()).position(|window| window == needle)
}

fn remove_all(haystack: &[u8], needle: &[u8]) -> Vec<u8> {
    if needle.is_empty() {
        return haystack.to_vec();
    }
    let mut out = Vec::with_capacity(haystack.len());
    let mut rest = haystack;
    while let Some(at) = find(rest, needle) {
        out.extend_from_slice(&rest[..at]);
        rest = &rest[at + needle.len()..];
    }
    out.extend_from_slice(rest);
    out
}

/// Owns the hosts file and the block for one session.
///
/// Tracks whether the file may currently hold the block. [`release`] reverts
/// it on the normal exit path; `Drop` reverts it on any other path, such as
/// unwinding, so the block never outlives the session.
///
/// [`release`]: HostsBlocker::release
#[derive(Debug)]
pub struct HostsBlocker {
    file: HostsFile,
    template: BlockTemplate,
    patched: bool,
}

impl HostsBlocker {
    pub fn new(file: HostsFile, template: BlockTemplate) -> Self {
        Self {
            file,
            template,
            patched: false,
        }
    }

    /// Open the hosts file and prepare the block for the given sites
    pub fn open(path: &Path, sites: &[String]) -> Result<Self, HostsError> {
        let template = BlockTemplate::build(sites);
        Ok(Self::new(HostsFile::open(path)?, template))
    }

    /// Apply the block. The blocker counts as patched even when this fails,
    /// since a failed append may still have written part of the block.
    pub fn block(&mut self) -> Result<ApplyOutcome, HostsError> {
        self.patched = true;
        self.file.apply(&self.template)
    }

    /// Revert the block
    pub fn unblock(&mut self) -> Result<RevertOutcome, HostsError> {
        let outcome = self.file.revert(&self.template)?;
        self.patched = false;
        Ok(outcome)
    }

    /// Whether the file may currently hold the block
    pub fn is_patched(&self) -> bool {
        self.patched
    }

    /// Revert the block if it may be active, then close the file
    pub fn release(mut self) -> Result<(), HostsError> {
        if !self.patched {
            return Ok(());
        }
        let result = self.file.revert(&self.template);
        self.patched = false;
        result.map(|_| ())
    }
}

impl Drop for HostsBlocker {
    fn drop(&mut self) {
        if !self.patched {
            return;
        }
        match self.file.revert(&self.template) {
            Ok(_) => self.patched = false,
            Err(e) => tracing::error!("Error during hosts cleanup: {}", e),
        }
    }
}
