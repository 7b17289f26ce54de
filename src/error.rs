//! Error types for the package-search indexing engine

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexError>;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("index files at {0} are present at incompatible versions")]
    InconsistentIndex(PathBuf),

    #[error("index directory {0} is not writable")]
    ProblematicPermissions(PathBuf),

    #[error("a prior update was interrupted; {0} must be removed before retrying")]
    PartialIndexing(PathBuf),

    #[error("corrupt index data: {0}")]
    CorruptIndex(String),

    #[error("unknown update input type: {0}")]
    UnknownInput(String),
}

impl From<bincode::Error> for IndexError {
    fn from(err: bincode::Error) -> Self {
        IndexError::Serialization(err.to_string())
    }
}
