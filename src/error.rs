//! Error types shared by the digest, entry and store layers.

use std::io;
use std::path::PathBuf;

use crate::entry::ResourceReference;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The resource behind a reference could not be opened or read to the end.
    ///
    /// Callers must treat this the same as the entry not existing.
    #[error("resource unavailable{}: {source}", describe(location.as_ref()))]
    ResourceUnavailable {
        /// Unset when the failure came from a bare reader with no known location.
        location: Option<ResourceReference>,
        #[source]
        source: io::Error,
    },

    #[error("unsupported digest algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("invalid digest: {0}")]
    InvalidDigest(String),

    #[error("digest computation cancelled")]
    Cancelled,

    #[error("store I/O error at {}: {source}", path.display())]
    Store {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    pub(crate) fn unavailable(location: &ResourceReference, source: io::Error) -> Self {
        Self::ResourceUnavailable {
            location: Some(location.clone()),
            source,
        }
    }

    pub(crate) const fn read_failure(source: io::Error) -> Self {
        Self::ResourceUnavailable {
            location: None,
            source,
        }
    }

    /// Attaches a location to a `ResourceUnavailable` that doesn't have one yet.
    #[must_use]
    pub(crate) fn at(self, location: &ResourceReference) -> Self {
        match self {
            Self::ResourceUnavailable {
                location: None,
                source,
            } => Self::unavailable(location, source),
            other => other,
        }
    }

    pub(crate) fn store(path: &std::path::Path, source: io::Error) -> Self {
        Self::Store {
            path: path.to_path_buf(),
            source,
        }
    }

    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::ResourceUnavailable { .. })
    }
}

fn describe(location: Option<&ResourceReference>) -> String {
    location.map(|l| format!(" at {l}")).unwrap_or_default()
}
