use clap::{Parser, Subcommand};
use filestore::{Algorithm, DigestValue, FileStore, FileStoreEntry};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(version, about, author)]
pub struct Cli {
    /// Base directory of the store
    #[clap(long, global = true, env = "FILESTORE_DIR", default_value = ".filestore")]
    pub store: PathBuf,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the digest of one or more files without storing them.
    Digest {
        /// Digest algorithm (sha1, sha256, sha512)
        #[clap(short, long, default_value = "sha256")]
        algorithm: Algorithm,

        #[clap(value_parser, required = true)]
        paths: Vec<PathBuf>,
    },

    /// Copy files into the store, printing the digest each is stored under.
    Put {
        /// Digest algorithm (sha1, sha256, sha512)
        #[clap(short, long, default_value = "sha256")]
        algorithm: Algorithm,

        #[clap(value_parser, required = true)]
        paths: Vec<PathBuf>,
    },

    /// Print the path of a stored object.
    Get {
        /// Digest in `<algorithm>:<hex>` form
        #[clap(value_parser)]
        digest: DigestValue,
    },

    /// Re-hash a stored object and check it against its digest.
    Verify {
        /// Digest in `<algorithm>:<hex>` form
        #[clap(value_parser)]
        digest: DigestValue,
    },

    /// Delete a stored object.
    Remove {
        /// Digest in `<algorithm>:<hex>` form
        #[clap(value_parser)]
        digest: DigestValue,
    },

    /// List every object stored under an algorithm.
    List {
        #[clap(short, long, default_value = "sha256")]
        algorithm: Algorithm,
    },
}

impl Cli {
    pub fn run(self) -> Result<(), String> {
        tracing::trace!("Running command: {:?}", self.command);
        match self.command {
            Commands::Digest { algorithm, paths } => {
                for path in paths {
                    let digest = FileStoreEntry::new(path.clone().into())
                        .current_digest(algorithm)
                        .map_err(|e| e.to_string())?;
                    println!("{digest}  {}", path.display());
                }
                Ok(())
            }
            Commands::Put { algorithm, paths } => {
                let store = open_store(self.store)?;
                for path in paths {
                    let entry = store
                        .insert_file(&path, algorithm)
                        .map_err(|e| format!("Failed to store '{}': {}", path.display(), e))?;
                    let digest = entry
                        .current_digest(algorithm)
                        .map_err(|e| e.to_string())?;
                    println!("{}  {}", digest.to_prefixed(), path.display());
                }
                Ok(())
            }
            Commands::Get { digest } => {
                let store = open_store(self.store)?;
                let entry = store
                    .get(&digest)
                    .ok_or_else(|| format!("No object stored under {}", digest.to_prefixed()))?;
                println!("{}", entry.location());
                Ok(())
            }
            Commands::Verify { digest } => {
                let store = open_store(self.store)?;
                let intact = store.verify(&digest).map_err(|e| e.to_string())?;
                if !intact {
                    return Err(format!("Object {} is corrupt", digest.to_prefixed()));
                }
                tracing::info!("Object {} verified", digest.to_prefixed());
                println!("OK  {}", digest.to_prefixed());
                Ok(())
            }
            Commands::Remove { digest } => {
                let store = open_store(self.store)?;
                if !store.remove(&digest).map_err(|e| e.to_string())? {
                    return Err(format!("No object stored under {}", digest.to_prefixed()));
                }
                println!("Removed {}", digest.to_prefixed());
                Ok(())
            }
            Commands::List { algorithm } => {
                let store = open_store(self.store)?;
                for digest in store.digests(algorithm).map_err(|e| e.to_string())? {
                    println!("{}", digest.to_prefixed());
                }
                Ok(())
            }
        }
    }
}

fn open_store(base_path: PathBuf) -> Result<FileStore, String> {
    FileStore::open(base_path).map_err(|e| format!("Failed to open store: {e}"))
}
