//! Reference content-addressed file store
//!
//! Objects live at `objects/<algorithm>/<first two hex chars>/<rest of hex>`
//! under the store's base directory. New content is staged in `temp/`, hashed
//! through a [`FileStoreEntry`], and renamed into place, so an object path is
//! never reused for different content and objects are never rewritten in place.
#[cfg(test)]
pub mod tests;

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use crate::digest::{Algorithm, DigestValue};
use crate::entry::{FileStoreEntry, ResourceReference};
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct FileStore {
    base_path: PathBuf,
}

impl FileStore {
    const OBJECTS_DIR: &'static str = "objects";
    const TEMP_DIR: &'static str = "temp";
    const TEMP_PREFIX: &'static str = "filestore_";

    /// Opens the store at `base_path`, creating its directories as needed.
    pub fn open(base_path: PathBuf) -> Result<Self> {
        let store = Self { base_path };
        for dir in [store.objects_path(), store.temp_path()] {
            fs::create_dir_all(&dir).map_err(|e| Error::store(&dir, e))?;
        }
        tracing::debug!(base_path = %store.base_path.display(), "Opened file store");
        Ok(store)
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn objects_path(&self) -> PathBuf {
        self.base_path.join(Self::OBJECTS_DIR)
    }

    fn temp_path(&self) -> PathBuf {
        self.base_path.join(Self::TEMP_DIR)
    }

    fn algorithm_path(&self, algorithm: Algorithm) -> PathBuf {
        self.objects_path().join(algorithm.name())
    }

    /// Where the object with this digest lives, whether or not it exists.
    pub fn object_path(&self, digest: &DigestValue) -> PathBuf {
        let hex = digest.to_hex();
        let (shard, rest) = hex.split_at(2);
        self.algorithm_path(digest.algorithm()).join(shard).join(rest)
    }

    /// Copies everything from `reader` into the store and returns the entry for it.
    ///
    /// If an object with the same digest already exists, the new copy is
    /// discarded and the existing entry is returned.
    #[tracing::instrument(level = "debug", skip(self, reader))]
    pub fn insert_reader<R: Read>(&self, mut reader: R, algorithm: Algorithm) -> Result<FileStoreEntry> {
        let temp_dir = self.temp_path();
        let mut staged = tempfile::Builder::new()
            .prefix(Self::TEMP_PREFIX)
            .tempfile_in(&temp_dir)
            .map_err(|e| Error::store(&temp_dir, e))?;

        let mut source = SourceReader {
            inner: &mut reader,
            failed: false,
        };
        let copied = match io::copy(&mut source, staged.as_file_mut()) {
            Ok(copied) => copied,
            Err(e) if source.failed => return Err(Error::read_failure(e)),
            Err(e) => return Err(Error::store(staged.path(), e)),
        };
        staged
            .as_file()
            .sync_all()
            .map_err(|e| Error::store(staged.path(), e))?;

        let digest = FileStoreEntry::new(staged.path().into()).current_digest(algorithm)?;
        let object_path = self.object_path(&digest);

        if object_path.is_file() {
            tracing::debug!(digest = %digest.to_prefixed(), "Object already stored, discarding copy");
            return Ok(FileStoreEntry::new(object_path.into()));
        }

        let shard_dir = object_path
            .parent()
            .map_or_else(|| self.algorithm_path(algorithm), Path::to_path_buf);
        fs::create_dir_all(&shard_dir).map_err(|e| Error::store(&shard_dir, e))?;

        let mut permissions = staged
            .as_file()
            .metadata()
            .map_err(|e| Error::store(staged.path(), e))?
            .permissions();
        permissions.set_readonly(true);
        fs::set_permissions(staged.path(), permissions).map_err(|e| Error::store(staged.path(), e))?;

        match staged.persist_noclobber(&object_path) {
            Ok(_) => {}
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                tracing::debug!(digest = %digest.to_prefixed(), "Object stored concurrently, discarding copy");
                return Ok(FileStoreEntry::new(object_path.into()));
            }
            Err(e) => return Err(Error::store(&object_path, e.error)),
        }

        if let Err(e) = sync_dir(&shard_dir) {
            tracing::warn!(
                "Failed to fsync object directory {}: {}",
                shard_dir.display(),
                e
            );
        }

        tracing::info!(digest = %digest.to_prefixed(), size = copied, "Stored object");
        Ok(FileStoreEntry::new(object_path.into()))
    }

    /// Inserts a copy of the file at `path`. The source file is left untouched.
    pub fn insert_file(&self, path: &Path, algorithm: Algorithm) -> Result<FileStoreEntry> {
        let location = ResourceReference::from(path);
        let file = File::open(path).map_err(|e| Error::unavailable(&location, e))?;
        self.insert_reader(file, algorithm).map_err(|e| e.at(&location))
    }

    /// Looks up the entry for `digest`, or `None` if nothing is stored under it.
    pub fn get(&self, digest: &DigestValue) -> Option<FileStoreEntry> {
        let object_path = self.object_path(digest);
        object_path
            .is_file()
            .then(|| FileStoreEntry::new(object_path.into()))
    }

    pub fn contains(&self, digest: &DigestValue) -> bool {
        self.object_path(digest).is_file()
    }

    /// Re-hashes the stored object and checks it still matches its name.
    ///
    /// # Errors
    ///
    /// [`Error::ResourceUnavailable`] if no object is stored under `digest`.
    pub fn verify(&self, digest: &DigestValue) -> Result<bool> {
        let entry = FileStoreEntry::new(self.object_path(digest).into());
        let intact = entry.matches(digest)?;
        if !intact {
            tracing::warn!(digest = %digest.to_prefixed(), location = %entry.location(), "Stored object is corrupt");
        }
        Ok(intact)
    }

    /// Deletes the object. Returns `false` if it wasn't there.
    ///
    /// Entries already handed out for this object fail with
    /// [`Error::ResourceUnavailable`] from now on.
    pub fn remove(&self, digest: &DigestValue) -> Result<bool> {
        let object_path = self.object_path(digest);
        match fs::remove_file(&object_path) {
            Ok(()) => {
                tracing::info!(digest = %digest.to_prefixed(), "Removed object");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::store(&object_path, e)),
        }
    }

    /// Lists the digests of every object stored under `algorithm`, sorted.
    ///
    /// Files whose names don't form a valid digest are skipped.
    pub fn digests(&self, algorithm: Algorithm) -> Result<Vec<DigestValue>> {
        let algorithm_path = self.algorithm_path(algorithm);
        let shards = match fs::read_dir(&algorithm_path) {
            Ok(shards) => shards,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::store(&algorithm_path, e)),
        };

        let mut digests = Vec::new();
        for shard in shards {
            let shard = shard.map_err(|e| Error::store(&algorithm_path, e))?;
            let shard_path = shard.path();
            if !shard_path.is_dir() {
                continue;
            }
            let shard_name = shard.file_name().to_string_lossy().into_owned();

            for object in fs::read_dir(&shard_path).map_err(|e| Error::store(&shard_path, e))? {
                let object = object.map_err(|e| Error::store(&shard_path, e))?;
                let hex = format!("{shard_name}{}", object.file_name().to_string_lossy());
                match DigestValue::from_hex(algorithm, &hex) {
                    // Only files at their canonical path are reachable through `get`
                    Ok(digest) if self.object_path(&digest) == object.path() => digests.push(digest),
                    Ok(_) => tracing::debug!(path = %object.path().display(), "Skipping misplaced object"),
                    Err(e) => tracing::debug!(path = %object.path().display(), error = %e, "Skipping stray file"),
                }
            }
        }

        digests.sort_by(|a, b| a.as_bytes().cmp(b.as_bytes()));
        Ok(digests)
    }
}

/// Remembers whether an error came from the source rather than the staged file.
struct SourceReader<'a, R> {
    inner: &'a mut R,
    failed: bool,
}

impl<R: Read> Read for SourceReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let result = self.inner.read(buf);
        if let Err(e) = &result {
            self.failed = e.kind() != io::ErrorKind::Interrupted;
        }
        result
    }
}

fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}
