//! Store entries: a reference to a stored resource plus on-demand identity.
//!
//! An entry is a read-only view. It does not own the resource's lifecycle and it
//! never remembers a digest; every identity query re-reads the bytes.

use std::fmt;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::time::SystemTime;

use crate::digest::{Algorithm, DigestValue};
use crate::error::{Error, Result};
use crate::hash::HashComputer;

/// Where an entry's bytes currently live.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceReference(PathBuf);

impl ResourceReference {
    pub const fn new(path: PathBuf) -> Self {
        Self(path)
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }
}

impl From<PathBuf> for ResourceReference {
    fn from(path: PathBuf) -> Self {
        Self(path)
    }
}

impl From<&Path> for ResourceReference {
    fn from(path: &Path) -> Self {
        Self(path.to_path_buf())
    }
}

impl AsRef<Path> for ResourceReference {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for ResourceReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Cheap observation of a resource used to notice changes across one read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceSnapshot {
    pub len: u64,
    pub modified: Option<SystemTime>,
}

/// Maps a [`ResourceReference`] to a sequential read handle.
///
/// This is the seam between an entry and whatever store owns the bytes.
pub trait ResourceResolver {
    type Handle: io::Read;

    /// Opens the resource for reading.
    ///
    /// # Errors
    ///
    /// [`Error::ResourceUnavailable`] if nothing readable lives at `location`.
    fn open(&self, location: &ResourceReference) -> Result<Self::Handle>;

    /// Observes an opened handle without reading from it. Entries compare the
    /// snapshots taken before and after a read to reject torn reads.
    fn snapshot(&self, _handle: &Self::Handle) -> Option<ResourceSnapshot> {
        None
    }
}

/// Resolves references as paths on the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsResolver;

impl ResourceResolver for FsResolver {
    type Handle = File;

    fn open(&self, location: &ResourceReference) -> Result<File> {
        // Opening a FIFO blocks until a writer shows up, so refuse it by path first.
        let metadata = fs::metadata(location.as_path()).map_err(|e| Error::unavailable(location, e))?;
        ensure_regular_file(location, &metadata)?;

        let file = File::open(location.as_path()).map_err(|e| Error::unavailable(location, e))?;
        let metadata = file.metadata().map_err(|e| Error::unavailable(location, e))?;
        ensure_regular_file(location, &metadata)?;
        Ok(file)
    }

    fn snapshot(&self, handle: &File) -> Option<ResourceSnapshot> {
        let metadata = handle.metadata().ok()?;
        Some(ResourceSnapshot {
            len: metadata.len(),
            modified: metadata.modified().ok(),
        })
    }
}

fn ensure_regular_file(location: &ResourceReference, metadata: &fs::Metadata) -> Result<()> {
    if metadata.is_file() {
        Ok(())
    } else {
        Err(Error::unavailable(
            location,
            io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"),
        ))
    }
}

/// One addressable resource in a file store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileStoreEntry {
    location: ResourceReference,
}

impl FileStoreEntry {
    /// Binds an entry to `location` without reading anything.
    pub const fn new(location: ResourceReference) -> Self {
        Self { location }
    }

    pub const fn location(&self) -> &ResourceReference {
        &self.location
    }

    pub fn into_location(self) -> ResourceReference {
        self.location
    }

    /// Derives the digest of the file as it is on disk right now.
    ///
    /// # Errors
    ///
    /// [`Error::ResourceUnavailable`] if the file is missing, unreadable, or
    /// changed while it was being read.
    pub fn current_digest(&self, algorithm: Algorithm) -> Result<DigestValue> {
        self.current_digest_with(&FsResolver, &HashComputer::new(), algorithm)
    }

    /// Parses `algorithm` first; an unknown name fails before the file is opened.
    pub fn current_digest_named(&self, algorithm: &str) -> Result<DigestValue> {
        let algorithm = algorithm.parse()?;
        self.current_digest(algorithm)
    }

    pub fn sha1(&self) -> Result<DigestValue> {
        self.current_digest(Algorithm::Sha1)
    }

    /// Re-derives the digest with `expected`'s algorithm and compares.
    pub fn matches(&self, expected: &DigestValue) -> Result<bool> {
        Ok(self.current_digest(expected.algorithm())? == *expected)
    }

    pub fn current_digest_with<S: ResourceResolver>(
        &self,
        resolver: &S,
        computer: &HashComputer,
        algorithm: Algorithm,
    ) -> Result<DigestValue> {
        self.derive(resolver, computer, algorithm, None)
    }

    /// Like [`FileStoreEntry::current_digest_with`], but gives up with
    /// [`Error::Cancelled`] once `cancel` is set. The torn-read check still applies.
    pub fn current_digest_cancellable<S: ResourceResolver>(
        &self,
        resolver: &S,
        computer: &HashComputer,
        algorithm: Algorithm,
        cancel: &AtomicBool,
    ) -> Result<DigestValue> {
        self.derive(resolver, computer, algorithm, Some(cancel))
    }

    #[tracing::instrument(level = "trace", skip(self, resolver, computer, cancel), fields(location = %self.location))]
    fn derive<S: ResourceResolver>(
        &self,
        resolver: &S,
        computer: &HashComputer,
        algorithm: Algorithm,
        cancel: Option<&AtomicBool>,
    ) -> Result<DigestValue> {
        let mut handle = resolver.open(&self.location)?;
        let before = resolver.snapshot(&handle);
        let (digest, total) = computer
            .compute_counted(&mut handle, algorithm, cancel)
            .map_err(|e| e.at(&self.location))?;

        if let Some(before) = before {
            let after = resolver.snapshot(&handle);
            if after != Some(before) || before.len != total {
                tracing::warn!(
                    location = %self.location,
                    expected_len = before.len,
                    read_len = total,
                    "Resource changed while computing its digest"
                );
                return Err(Error::unavailable(
                    &self.location,
                    io::Error::other("resource modified during read"),
                ));
            }
        }

        Ok(digest)
    }
}
