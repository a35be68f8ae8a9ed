//! Content-addressed file store entries.
//!
//! A [`FileStoreEntry`] is a read-only view over one stored file whose identity
//! is the digest of its bytes. The digest is derived on demand by streaming the
//! file through [`HashComputer`] and is never cached, so it always reflects what
//! is on disk at the time of the call. [`FileStore`] is a small store built on
//! top of entries.
pub mod digest;
pub mod entry;
pub mod error;
pub mod hash;
pub mod store;

pub use digest::{Algorithm, DigestValue};
pub use entry::{FileStoreEntry, FsResolver, ResourceReference, ResourceResolver, ResourceSnapshot};
pub use error::{Error, Result};
pub use hash::HashComputer;
pub use store::FileStore;
