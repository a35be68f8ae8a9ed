//! Streaming digest computation.
//!
//! [`HashComputer`] feeds a reader through an incremental accumulator one
//! bounded chunk at a time, so peak memory is the chunk size no matter how
//! large the resource is. It holds no state between calls and there is no
//! process-wide algorithm registry: the algorithm is always an argument.

use sha2::{Digest, Sha256, Sha512};
use sha1::Sha1;
use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::digest::{Algorithm, DigestValue};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashComputer {
    chunk_size: usize,
}

impl Default for HashComputer {
    fn default() -> Self {
        Self::new()
    }
}

impl HashComputer {
    pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

    pub const fn new() -> Self {
        Self {
            chunk_size: Self::DEFAULT_CHUNK_SIZE,
        }
    }

    /// Reads at most `chunk_size` bytes per call to the underlying reader.
    /// A zero chunk size is clamped to one byte.
    pub const fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            chunk_size: if chunk_size == 0 { 1 } else { chunk_size },
        }
    }

    pub const fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Digests everything `reader` yields until EOF.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ResourceUnavailable`] if a read fails part way through.
    /// No digest is produced in that case.
    pub fn compute<R: Read>(&self, mut reader: R, algorithm: Algorithm) -> Result<DigestValue> {
        self.compute_counted(&mut reader, algorithm, None)
            .map(|(digest, _)| digest)
    }

    /// Like [`HashComputer::compute`], but checks `cancel` before every chunk and
    /// returns [`Error::Cancelled`] once it is set.
    pub fn compute_cancellable<R: Read>(
        &self,
        mut reader: R,
        algorithm: Algorithm,
        cancel: &AtomicBool,
    ) -> Result<DigestValue> {
        self.compute_counted(&mut reader, algorithm, Some(cancel))
            .map(|(digest, _)| digest)
    }

    /// Resolves `algorithm` by name before touching the reader, so an unknown
    /// name never causes a read.
    pub fn compute_named<R: Read>(&self, reader: R, algorithm: &str) -> Result<DigestValue> {
        let algorithm = algorithm.parse()?;
        self.compute(reader, algorithm)
    }

    /// Digest of an in-memory buffer; identical to streaming the same bytes.
    pub fn digest_bytes(bytes: &[u8], algorithm: Algorithm) -> DigestValue {
        match algorithm {
            Algorithm::Sha1 => DigestValue::from_output(algorithm, &Sha1::digest(bytes)),
            Algorithm::Sha256 => DigestValue::from_output(algorithm, &Sha256::digest(bytes)),
            Algorithm::Sha512 => DigestValue::from_output(algorithm, &Sha512::digest(bytes)),
        }
    }

    /// Returns the digest together with the number of bytes that went into it.
    #[tracing::instrument(level = "trace", skip(self, reader, cancel))]
    pub(crate) fn compute_counted<R: Read>(
        &self,
        reader: &mut R,
        algorithm: Algorithm,
        cancel: Option<&AtomicBool>,
    ) -> Result<(DigestValue, u64)> {
        let (digest, total) = match algorithm {
            Algorithm::Sha1 => self.accumulate::<Sha1, R>(reader, algorithm, cancel)?,
            Algorithm::Sha256 => self.accumulate::<Sha256, R>(reader, algorithm, cancel)?,
            Algorithm::Sha512 => self.accumulate::<Sha512, R>(reader, algorithm, cancel)?,
        };

        tracing::trace!(%algorithm, bytes = total, digest = %digest, "Computed digest");
        Ok((digest, total))
    }

    fn accumulate<D: Digest, R: Read>(
        &self,
        reader: &mut R,
        algorithm: Algorithm,
        cancel: Option<&AtomicBool>,
    ) -> Result<(DigestValue, u64)> {
        let mut hasher = D::new();
        let mut buffer = vec![0u8; self.chunk_size];
        let mut total: u64 = 0;

        loop {
            if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                tracing::debug!(%algorithm, bytes = total, "Digest computation cancelled");
                return Err(Error::Cancelled);
            }

            let read = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::read_failure(e)),
            };

            hasher.update(&buffer[..read]);
            total += read as u64;
        }

        Ok((DigestValue::from_output(algorithm, &hasher.finalize()), total))
    }
}
