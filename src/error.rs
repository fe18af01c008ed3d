use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot read manifest {}: {source}", .path.display())]
    ManifestRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Covers both invalid JSON and a document missing `layers`, `config`
    /// or a `digest`.
    #[error("cannot parse manifest {}: {source}", .path.display())]
    ManifestParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot create archive {}: {source}", .path.display())]
    ArchiveCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot add {} to archive: {source}", .path.display())]
    ArchiveWrite {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("cannot remove {}: {source}", .path.display())]
    Deletion {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid model reference {0:?}, expected name:version or namespace/name:version")]
    InvalidModelRef(String),

    #[error("cannot determine home directory for the default model store")]
    NoHomeDir,
}
